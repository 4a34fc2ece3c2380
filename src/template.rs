//! Immutable templates and a hash-keyed template store.

use std::collections::HashMap;
use std::sync::Arc;

use crate::canon::{self, canon};
use crate::crypto::{sha256, Digest};
use crate::delta::Delta;
use crate::error::{ApplyError, EncodingError};
use crate::value::Value;

/// A registered base value with its cached canonical bytes and hash.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Template {
    value: Value,
    canonical_bytes: Vec<u8>,
    hash: Digest,
    schema_ver: u32,
}

impl Template {
    pub fn register(value: Value, schema_ver: u32) -> Result<Self, EncodingError> {
        let canonical_bytes = canon(&value)?;
        let hash = sha256(&canonical_bytes);
        Ok(Self {
            value,
            canonical_bytes,
            hash,
            schema_ver,
        })
    }

    /// Rebuild from a stream's template frame. The bytes must already be canonical.
    pub fn from_frame(payload: &[u8], schema_ver: u32) -> Result<Self, EncodingError> {
        let value = canon::decode_canonical(payload)?;
        Ok(Self {
            value,
            canonical_bytes: payload.to_vec(),
            hash: sha256(payload),
            schema_ver,
        })
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn canonical_bytes(&self) -> &[u8] {
        &self.canonical_bytes
    }

    pub fn hash(&self) -> Digest {
        self.hash
    }

    pub fn schema_ver(&self) -> u32 {
        self.schema_ver
    }

    /// The template as a flat state vector, when it is an integer list.
    pub fn state_vector(&self) -> Result<Vec<i64>, ApplyError> {
        self.value.as_int_list().ok_or(ApplyError::NotAStateVector)
    }

    /// Apply a delta, returning a fresh value. The template is never modified.
    pub fn apply(&self, delta: &Delta) -> Result<Value, ApplyError> {
        delta.apply(&self.value)
    }
}

/// Templates keyed by content hash and schema version. Equal canonical bytes
/// under the same schema share one entry.
#[derive(Debug, Default)]
pub struct TemplateStore {
    templates: HashMap<(Digest, u32), Arc<Template>>,
}

impl TemplateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, value: Value, schema_ver: u32) -> Result<Arc<Template>, EncodingError> {
        let template = Template::register(value, schema_ver)?;
        Ok(self.insert(template))
    }

    /// Insert an already-built template, reusing an existing entry with the same
    /// hash and schema version.
    pub fn insert(&mut self, template: Template) -> Arc<Template> {
        let hash = template.hash();
        let key = (hash, template.schema_ver);
        let entry = self.templates.entry(key).or_insert_with(|| {
            tracing::debug!(
                hash = %hex::encode(hash),
                schema_ver = template.schema_ver,
                bytes = template.canonical_bytes.len(),
                "template registered"
            );
            Arc::new(template)
        });
        Arc::clone(entry)
    }

    pub fn get(&self, hash: &Digest, schema_ver: u32) -> Option<Arc<Template>> {
        self.templates.get(&(*hash, schema_ver)).cloned()
    }

    pub fn release(&mut self, hash: &Digest, schema_ver: u32) -> Option<Arc<Template>> {
        self.templates.remove(&(*hash, schema_ver))
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}
