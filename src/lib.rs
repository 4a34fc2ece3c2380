//! WirePack: delta-template stream compression with authenticated replay.
//!
//! A stream is one canonical template frame followed by canonical delta frames.
//! Every delta is folded into exact incremental aggregates and bound into an
//! HMAC receipt chain as it is consumed.

pub mod aggregate;
pub mod canon;
pub mod compress;
pub mod config;
pub mod crypto;
pub mod delta;
pub mod error;
pub mod frame;
pub mod journal;
pub mod lock;
pub mod receipt;
pub mod session;
pub mod stream;
pub mod template;
pub mod value;

pub use aggregate::{
    AggregateBank, AggregateKind, AggregateValue, Aggregator, QueryId, QueryScope, Ranked,
};
pub use canon::canon;
pub use config::{CodecConfig, MixedPathPolicy, NoOpPolicy, DEFAULT_MAX_FRAME_LEN, SCHEMA_VER};
pub use crypto::{ChainKey, Digest};
pub use delta::{Delta, PatchOp, PathSeg, PointEdit, PointEditDelta, TreePatch};
pub use error::{
    AggregateError, ApplyError, ChainError, EncodingError, FrameError, LockError, Result,
    WirePackError,
};
pub use journal::{LogStorage, ReceiptLog};
pub use receipt::{verify_chain, verify_chain_bytes, AlgId, ChainState, Receipt, ReceiptChain};
pub use session::StreamSession;
pub use stream::{Stream, StreamItem, StreamReader, StreamWriter};
pub use template::{Template, TemplateStore};
pub use value::Value;
