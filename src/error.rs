//! Error types, one enum per failure family.

use std::io;

use thiserror::Error;

/// Canonicalizer and codec failures. Always fatal for the value at hand.
#[derive(Debug, Error)]
pub enum EncodingError {
    /// The value has a shape the canonical form cannot express.
    #[error("unsupported value shape: {0}")]
    UnsupportedShape(String),

    /// Floats never reach canonical bytes, finite or not.
    #[error("non-finite or fractional number: {0}")]
    NonInteger(String),

    /// Input bytes decode, but are not the canonical encoding of what they decode to.
    #[error("non-canonical encoding: first difference at byte {offset}")]
    NonCanonical {
        /// Offset of the first differing byte.
        offset: usize,
    },

    /// Two point edits in one delta target the same index.
    #[error("duplicate index {0} in point-edit delta")]
    DuplicateIndex(usize),

    /// Two tree-patch ops in one delta target the same path.
    #[error("duplicate path {0} in tree-patch delta")]
    DuplicatePath(String),

    /// A key and an index compete for the same position under the same prefix.
    #[error("mixed key/index segments under {0}")]
    MixedPath(String),

    /// Tree-patch ops need at least one path segment.
    #[error("empty tree-patch path")]
    EmptyPath,

    /// `new == old` while the no-op policy rejects it.
    #[error("no-op edit at index {0}")]
    NoOpEdit(usize),

    /// Delta op shape is neither a point edit nor a tree patch.
    #[error("malformed delta: {0}")]
    MalformedDelta(String),

    /// Underlying JSON syntax error.
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failures while applying a delta to a state. The affected stream is poisoned.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ApplyError {
    /// `state[idx] != old`.
    #[error("precondition failed at index {idx}: expected {expected}, found {actual}")]
    Precondition {
        /// Edited index.
        idx: usize,
        /// The `old` value the edit expected.
        expected: i64,
        /// The value actually present.
        actual: i64,
    },

    /// The edit addresses an index past the end of the state.
    #[error("index {idx} out of range for state of length {len}")]
    IndexOutOfRange {
        /// Edited index.
        idx: usize,
        /// State length.
        len: usize,
    },

    /// A tree-patch path segment does not exist.
    #[error("path not found: {path}")]
    PathNotFound {
        /// Rendered path.
        path: String,
    },

    /// A point edit was applied to a template that is not a flat integer list.
    #[error("template is not a flat integer state vector")]
    NotAStateVector,

    /// The delta kind does not match the state kind.
    #[error("delta kind does not match state kind")]
    KindMismatch,
}

/// Stream framing failures. Fatal at the frame boundary.
#[derive(Debug, Error)]
pub enum FrameError {
    /// The input ended inside a frame.
    #[error("truncated frame: needed {needed} bytes, {available} available")]
    Truncated {
        /// Bytes the frame declared.
        needed: usize,
        /// Bytes that were actually there.
        available: usize,
    },

    /// Declared length exceeds the configured maximum.
    #[error("frame of {len} bytes exceeds limit of {max}")]
    OverLong {
        /// Declared length.
        len: u64,
        /// Configured limit.
        max: u32,
    },

    /// A previous framing error closed the reader.
    #[error("stream reader refused input after a framing error")]
    ReaderPoisoned,

    /// The stream has no template frame.
    #[error("stream has no template frame")]
    MissingTemplate,

    /// I/O error from the underlying reader or writer.
    #[error("io: {0}")]
    Io(#[from] io::Error),
}

/// Aggregator failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AggregateError {
    /// The edit's `old` disagrees with the aggregator's view.
    #[error("aggregator view mismatch at index {idx}: expected {expected}, found {actual}")]
    Precondition {
        /// Edited index.
        idx: usize,
        /// `old` carried by the edit.
        expected: i64,
        /// Value in the aggregator's view.
        actual: i64,
    },

    /// The aggregator refuses edits until reset.
    #[error("aggregator is poisoned")]
    Poisoned,

    /// The edit addresses an index past `n_agents`.
    #[error("index {idx} out of range for {n_agents} agents")]
    IndexOutOfRange {
        /// Edited index.
        idx: usize,
        /// State length.
        n_agents: usize,
    },

    /// The declared scope or parameters do not fit the state.
    #[error("invalid query scope: {0}")]
    ScopeMismatch(String),

    /// An exact aggregate left the i128 range.
    #[error("{0} overflows i128")]
    Overflow(&'static str),

    /// No aggregator is registered under the given id.
    #[error("unknown query id {0}")]
    UnknownQuery(u32),
}

/// Receipt-chain failures. Verification mismatches are never reported here.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChainError {
    /// The chain refuses further receipts.
    #[error("receipt chain is poisoned")]
    Poisoned,

    /// HMAC could not be initialised.
    #[error("hmac failure: {0}")]
    Mac(String),

    /// A receipt record has the wrong length.
    #[error("malformed receipt: expected {expected} bytes, got {actual}")]
    MalformedReceipt {
        /// Expected record length.
        expected: usize,
        /// Actual length.
        actual: usize,
    },

    /// `alg_id` is not a known algorithm suite.
    #[error("unknown alg_id {0}")]
    UnknownAlg(u8),
}

/// Lock report and lock book parse failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LockError {
    /// A line is not `key=value`.
    #[error("line {line}: expected key=value")]
    MalformedLine {
        /// 1-based line number.
        line: usize,
    },

    /// The report does not end with `drift_sha256`.
    #[error("report has no trailing drift_sha256 line")]
    MissingDrift,

    /// The stated drift digest does not match the fields above it.
    #[error("drift_sha256 mismatch: stated {stated}, computed {computed}")]
    DriftMismatch {
        /// Digest written in the report.
        stated: String,
        /// Digest recomputed from the fields.
        computed: String,
    },
}

/// Umbrella error for operations that span several components.
#[derive(Debug, Error)]
pub enum WirePackError {
    #[error(transparent)]
    Encoding(#[from] EncodingError),

    #[error(transparent)]
    Apply(#[from] ApplyError),

    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error(transparent)]
    Aggregate(#[from] AggregateError),

    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error(transparent)]
    Lock(#[from] LockError),

    /// A poisoned stream session refuses further deltas.
    #[error("stream session is poisoned")]
    SessionPoisoned,

    #[error("io: {0}")]
    Io(#[from] io::Error),
}

/// Result alias for cross-component operations.
pub type Result<T> = std::result::Result<T, WirePackError>;
