//! HMAC-authenticated receipt chain.
//!
//! Receipt layout (137 bytes):
//!
//! ```text
//! [1B  alg_id]            1 = SHA-256 + HMAC-SHA-256
//! [4B  schema_ver]        little-endian
//! [4B  phase_id]          little-endian
//! [32B template_hash]     SHA-256(template canonical bytes)
//! [32B delta_hash]        SHA-256(delta canonical bytes)
//! [32B parent]            receipt_hash of the previous receipt, zero for the first
//! [32B tag]               HMAC-SHA256(key, first 105 bytes)
//! ```
//!
//! `receipt_hash = SHA-256(all 137 bytes)`.

use byteorder::{ByteOrder, LittleEndian};
use subtle::{Choice, ConstantTimeEq};

use crate::crypto::{digest_eq, hmac_sha256, sha256, ChainKey, Digest, ZERO_DIGEST};
use crate::error::ChainError;

/// Bytes covered by the tag.
pub const PREIMAGE_LEN: usize = 1 + 4 + 4 + 32 * 3;
/// Full record length.
pub const RECEIPT_LEN: usize = PREIMAGE_LEN + 32;

/// Algorithm suite identifier.
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AlgId {
    Sha256HmacSha256 = 1,
}

impl AlgId {
    pub fn from_u8(val: u8) -> Option<Self> {
        match val {
            1 => Some(AlgId::Sha256HmacSha256),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Receipt {
    pub alg: AlgId,
    pub schema_ver: u32,
    pub phase_id: u32,
    pub template_hash: Digest,
    pub delta_hash: Digest,
    pub parent: Digest,
    pub tag: Digest,
}

impl Receipt {
    /// Build and sign a receipt.
    pub fn sign(
        key: &ChainKey,
        schema_ver: u32,
        phase_id: u32,
        template_hash: Digest,
        delta_hash: Digest,
        parent: Digest,
    ) -> Result<Self, ChainError> {
        let mut receipt = Self {
            alg: AlgId::Sha256HmacSha256,
            schema_ver,
            phase_id,
            template_hash,
            delta_hash,
            parent,
            tag: ZERO_DIGEST,
        };
        receipt.tag = hmac_sha256(key, &receipt.preimage())?;
        Ok(receipt)
    }

    pub fn preimage(&self) -> [u8; PREIMAGE_LEN] {
        let mut buf = [0u8; PREIMAGE_LEN];
        buf[0] = self.alg as u8;
        LittleEndian::write_u32(&mut buf[1..5], self.schema_ver);
        LittleEndian::write_u32(&mut buf[5..9], self.phase_id);
        buf[9..41].copy_from_slice(&self.template_hash);
        buf[41..73].copy_from_slice(&self.delta_hash);
        buf[73..105].copy_from_slice(&self.parent);
        buf
    }

    pub fn to_bytes(&self) -> [u8; RECEIPT_LEN] {
        let mut buf = [0u8; RECEIPT_LEN];
        buf[..PREIMAGE_LEN].copy_from_slice(&self.preimage());
        buf[PREIMAGE_LEN..].copy_from_slice(&self.tag);
        buf
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ChainError> {
        if bytes.len() != RECEIPT_LEN {
            return Err(ChainError::MalformedReceipt {
                expected: RECEIPT_LEN,
                actual: bytes.len(),
            });
        }
        let alg = AlgId::from_u8(bytes[0]).ok_or(ChainError::UnknownAlg(bytes[0]))?;
        Ok(Self {
            alg,
            schema_ver: LittleEndian::read_u32(&bytes[1..5]),
            phase_id: LittleEndian::read_u32(&bytes[5..9]),
            template_hash: digest_at(bytes, 9),
            delta_hash: digest_at(bytes, 41),
            parent: digest_at(bytes, 73),
            tag: digest_at(bytes, 105),
        })
    }

    /// `SHA-256(preimage || tag)`; the next receipt's parent.
    pub fn receipt_hash(&self) -> Digest {
        sha256(&self.to_bytes())
    }
}

fn digest_at(bytes: &[u8], offset: usize) -> Digest {
    let mut out = [0u8; 32];
    out.copy_from_slice(&bytes[offset..offset + 32]);
    out
}

/// Chain lifecycle. `Poisoned` is terminal.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ChainState {
    Fresh,
    Extended,
    Verified,
    Poisoned,
}

/// Receipts for one stream, owned by that stream.
#[derive(Debug)]
pub struct ReceiptChain {
    key: ChainKey,
    schema_ver: u32,
    template_hash: Digest,
    receipts: Vec<Receipt>,
    head: Digest,
    state: ChainState,
}

impl ReceiptChain {
    pub fn new(key: ChainKey, template_hash: Digest, schema_ver: u32) -> Self {
        Self {
            key,
            schema_ver,
            template_hash,
            receipts: Vec::new(),
            head: ZERO_DIGEST,
            state: ChainState::Fresh,
        }
    }

    /// Continue a chain from receipts reloaded off storage. Nothing is checked
    /// here; `verify` decides whether the reloaded chain is sound.
    pub fn resume(
        key: ChainKey,
        template_hash: Digest,
        schema_ver: u32,
        receipts: Vec<Receipt>,
    ) -> Self {
        let head = receipts.last().map_or(ZERO_DIGEST, Receipt::receipt_hash);
        let state = if receipts.is_empty() {
            ChainState::Fresh
        } else {
            ChainState::Extended
        };
        Self {
            key,
            schema_ver,
            template_hash,
            receipts,
            head,
            state,
        }
    }

    pub fn state(&self) -> ChainState {
        self.state
    }

    pub fn receipts(&self) -> &[Receipt] {
        &self.receipts
    }

    pub fn len(&self) -> usize {
        self.receipts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receipts.is_empty()
    }

    /// `receipt_hash` of the last receipt, or zero for an empty chain.
    pub fn head(&self) -> Digest {
        self.head
    }

    pub fn template_hash(&self) -> Digest {
        self.template_hash
    }

    /// Bind the next delta's canonical bytes into a receipt.
    pub fn extend(&mut self, delta_bytes: &[u8], phase_id: u32) -> Result<&Receipt, ChainError> {
        if self.state == ChainState::Poisoned {
            return Err(ChainError::Poisoned);
        }
        let receipt = Receipt::sign(
            &self.key,
            self.schema_ver,
            phase_id,
            self.template_hash,
            sha256(delta_bytes),
            self.head,
        )?;
        self.head = receipt.receipt_hash();
        self.state = ChainState::Extended;
        tracing::debug!(
            index = self.receipts.len(),
            phase_id,
            head = %hex::encode(self.head),
            "receipt appended"
        );
        let idx = self.receipts.len();
        self.receipts.push(receipt);
        Ok(&self.receipts[idx])
    }

    /// Verify the whole chain against the template and delta bytes it claims to bind.
    pub fn verify<D: AsRef<[u8]>>(&mut self, template_bytes: &[u8], deltas: &[D]) -> bool {
        if self.state == ChainState::Poisoned {
            return false;
        }
        let ok = verify_chain(template_bytes, deltas, &self.receipts, &self.key);
        if ok {
            self.state = ChainState::Verified;
        } else {
            self.poison();
        }
        ok
    }

    /// Force the terminal state, e.g. after a precondition failure upstream.
    pub fn poison(&mut self) {
        if self.state != ChainState::Poisoned {
            tracing::warn!(receipts = self.receipts.len(), "receipt chain poisoned");
        }
        self.state = ChainState::Poisoned;
    }

    /// All receipts as one contiguous blob.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.receipts.iter().flat_map(|r| r.to_bytes()).collect()
    }
}

/// Verify a receipt chain.
///
/// Every receipt is checked in full regardless of earlier failures, and checks
/// are combined without branching, so timing does not reveal which check or
/// which receipt failed.
pub fn verify_chain<D: AsRef<[u8]>>(
    template_bytes: &[u8],
    deltas: &[D],
    receipts: &[Receipt],
    key: &ChainKey,
) -> bool {
    if deltas.len() != receipts.len() {
        return false;
    }
    let template_hash = sha256(template_bytes);
    let mut ok = Choice::from(1u8);
    let mut parent = ZERO_DIGEST;
    for (receipt, delta) in receipts.iter().zip(deltas) {
        ok &= digest_eq(&receipt.template_hash, &template_hash);
        ok &= digest_eq(&receipt.parent, &parent);
        ok &= digest_eq(&receipt.delta_hash, &sha256(delta.as_ref()));
        ok &= match hmac_sha256(key, &receipt.preimage()) {
            Ok(tag) => tag.ct_eq(&receipt.tag),
            Err(_) => Choice::from(0u8),
        };
        parent = receipt.receipt_hash();
    }
    bool::from(ok)
}

/// Verify a contiguous blob of fixed-width receipts.
pub fn verify_chain_bytes<D: AsRef<[u8]>>(
    template_bytes: &[u8],
    deltas: &[D],
    receipt_bytes: &[u8],
    key: &ChainKey,
) -> bool {
    if receipt_bytes.len() % RECEIPT_LEN != 0 {
        return false;
    }
    let receipts: Result<Vec<_>, _> = receipt_bytes
        .chunks_exact(RECEIPT_LEN)
        .map(Receipt::from_bytes)
        .collect();
    match receipts {
        Ok(receipts) => verify_chain(template_bytes, deltas, &receipts, key),
        Err(_) => false,
    }
}
