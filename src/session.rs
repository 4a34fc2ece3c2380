//! One live stream: template, current state, aggregates and receipt chain.

use std::io::Read;
use std::sync::Arc;

use crate::aggregate::{AggregateBank, AggregateKind, AggregateValue, QueryId, QueryScope};
use crate::canon::canon;
use crate::config::CodecConfig;
use crate::crypto::{sha256_hex, ChainKey};
use crate::delta::{self, encode_state, Delta};
use crate::error::{AggregateError, ApplyError, EncodingError, FrameError, Result, WirePackError};
use crate::receipt::{Receipt, ReceiptChain};
use crate::stream::{StreamItem, StreamReader};
use crate::template::Template;
use crate::value::Value;

#[derive(Clone, Debug, PartialEq, Eq)]
enum State {
    Vector(Vec<i64>),
    Tree(Value),
}

/// Single-writer view of one stream. Deltas are consumed strictly in order.
#[derive(Debug)]
pub struct StreamSession {
    template: Arc<Template>,
    config: CodecConfig,
    state: State,
    bank: Option<AggregateBank>,
    chain: ReceiptChain,
    deltas: Vec<Vec<u8>>,
    poisoned: bool,
}

impl StreamSession {
    /// Open a session over `template`. Integer-list templates get point-edit
    /// state and an aggregate bank; anything else is patched as a tree.
    pub fn new(template: Arc<Template>, key: ChainKey, config: CodecConfig) -> Self {
        let (state, bank) = match template.state_vector() {
            Ok(vector) => {
                let bank = AggregateBank::new(template.hash(), vector.len());
                (State::Vector(vector), Some(bank))
            }
            Err(_) => (State::Tree(template.value().clone()), None),
        };
        let chain = ReceiptChain::new(key, template.hash(), template.schema_ver());
        Self {
            template,
            config,
            state,
            bank,
            chain,
            deltas: Vec::new(),
            poisoned: false,
        }
    }

    /// Open from the first frame of a stream.
    pub fn from_reader<R: Read>(
        reader: &mut StreamReader<R>,
        key: ChainKey,
        config: CodecConfig,
        schema_ver: u32,
    ) -> Result<Self> {
        match reader.next() {
            Some(Ok(StreamItem::Template(payload))) => {
                let template = Template::from_frame(&payload, schema_ver)?;
                Ok(Self::new(Arc::new(template), key, config))
            }
            Some(Err(e)) => Err(e.into()),
            Some(Ok(StreamItem::Delta(_))) | None => {
                Err(FrameError::MissingTemplate.into())
            }
        }
    }

    pub fn template(&self) -> &Arc<Template> {
        &self.template
    }

    pub fn chain(&self) -> &ReceiptChain {
        &self.chain
    }

    pub fn receipts(&self) -> &[Receipt] {
        self.chain.receipts()
    }

    /// Canonical bytes of every delta consumed so far.
    pub fn delta_bytes(&self) -> &[Vec<u8>] {
        &self.deltas
    }

    pub fn deltas_applied(&self) -> usize {
        self.deltas.len()
    }

    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    /// Current flat state, for point-edit streams.
    pub fn state_vector(&self) -> Option<&[i64]> {
        match &self.state {
            State::Vector(v) => Some(v),
            State::Tree(_) => None,
        }
    }

    /// Current state as a value.
    pub fn state_value(&self) -> Value {
        match &self.state {
            State::Vector(v) => Value::int_list(v),
            State::Tree(t) => t.clone(),
        }
    }

    /// Declare a query over the current state.
    pub fn declare(&mut self, kind: AggregateKind, scope: QueryScope) -> Result<QueryId> {
        if self.poisoned {
            return Err(WirePackError::SessionPoisoned);
        }
        match (&mut self.bank, &self.state) {
            (Some(bank), State::Vector(state)) => Ok(bank.declare(kind, scope, state)?),
            _ => Err(WirePackError::from(AggregateError::ScopeMismatch(
                "stream state is not a flat vector".into(),
            ))),
        }
    }

    pub fn release(&mut self, id: QueryId) -> bool {
        self.bank
            .as_mut()
            .map_or(false, |bank| bank.release(id).is_some())
    }

    pub fn value(&self, id: QueryId) -> Result<AggregateValue> {
        match &self.bank {
            Some(bank) => Ok(bank.value(id)?),
            None => Err(AggregateError::UnknownQuery(id.0).into()),
        }
    }

    pub fn query_ids(&self) -> Vec<QueryId> {
        self.bank
            .as_ref()
            .map(|bank| bank.ids().collect())
            .unwrap_or_default()
    }

    /// Consume the next delta: canonicalize, apply, fold, then receipt it.
    ///
    /// A precondition failure poisons the session, its aggregates and its chain.
    /// Nothing is mutated when any step fails.
    pub fn ingest(&mut self, delta: &Delta, phase_id: u32) -> Result<&Receipt> {
        if self.poisoned {
            return Err(WirePackError::SessionPoisoned);
        }
        let bytes = delta.encode()?;
        if let Err(e) = self.apply(delta) {
            self.poison(&e);
            return Err(e);
        }
        self.deltas.push(bytes);
        let bytes = &self.deltas[self.deltas.len() - 1];
        Ok(self.chain.extend(bytes, phase_id)?)
    }

    /// Decode canonical delta bytes and ingest them.
    pub fn ingest_bytes(&mut self, bytes: &[u8], phase_id: u32) -> Result<&Receipt> {
        let delta = delta::decode_canonical(bytes, &self.config)?;
        self.ingest(&delta, phase_id)
    }

    /// Drain the remaining delta frames of `reader`. Phase ids continue from
    /// the number of deltas already consumed.
    pub fn replay<R: Read>(&mut self, reader: &mut StreamReader<R>) -> Result<usize> {
        if reader.is_poisoned() {
            let e = WirePackError::from(FrameError::ReaderPoisoned);
            self.poison(&e);
            return Err(e);
        }
        let mut consumed = 0;
        for item in reader {
            let payload = match item {
                Ok(StreamItem::Delta(payload)) => payload,
                Ok(StreamItem::Template(_)) => {
                    let e = WirePackError::Encoding(EncodingError::MalformedDelta(
                        "second template frame".into(),
                    ));
                    self.poison(&e);
                    return Err(e);
                }
                Err(e) => {
                    let e = WirePackError::from(e);
                    self.poison(&e);
                    return Err(e);
                }
            };
            let phase_id = u32::try_from(self.deltas.len()).unwrap_or(u32::MAX);
            let result = self.ingest_bytes(&payload, phase_id).map(|_| ());
            if let Err(e) = result {
                self.poison(&e);
                return Err(e);
            }
            consumed += 1;
        }
        tracing::info!(
            deltas = self.deltas.len(),
            template = %hex::encode(self.template.hash()),
            "stream replayed"
        );
        Ok(consumed)
    }

    /// Verify the chain against everything consumed.
    pub fn verify(&mut self) -> bool {
        let ok = self
            .chain
            .verify(self.template.canonical_bytes(), &self.deltas);
        if !ok {
            self.poisoned = true;
        }
        ok
    }

    pub fn final_state_bytes(&self) -> Result<Vec<u8>> {
        Ok(match &self.state {
            State::Vector(v) => encode_state(v)?,
            State::Tree(t) => canon(t)?,
        })
    }

    /// Hex SHA-256 of the canonical final state.
    pub fn final_state_sha256(&self) -> Result<String> {
        Ok(sha256_hex(&self.final_state_bytes()?))
    }

    fn apply(&mut self, delta: &Delta) -> Result<()> {
        match (&mut self.state, delta) {
            (State::Vector(state), Delta::PointEdit(d)) => {
                d.check(state)?;
                if let Some(bank) = self.bank.as_mut() {
                    bank.on_delta(d)?;
                }
                d.apply_in_place(state)?;
            }
            (State::Vector(state), Delta::TreePatch(p)) => {
                let d = p.as_point_edits(state)?;
                if let Some(bank) = self.bank.as_mut() {
                    bank.on_delta(&d)?;
                }
                d.apply_in_place(state)?;
            }
            (State::Tree(root), Delta::TreePatch(p)) => p.apply_in_place(root)?,
            // An empty delta decodes as a point edit; on a tree it is a no-op.
            (State::Tree(_), Delta::PointEdit(d)) if d.is_empty() => {}
            _ => return Err(ApplyError::KindMismatch.into()),
        }
        Ok(())
    }

    fn poison(&mut self, cause: &WirePackError) {
        if !self.poisoned {
            tracing::warn!(
                deltas = self.deltas.len(),
                error = %cause,
                "stream session poisoned"
            );
        }
        self.poisoned = true;
        self.chain.poison();
        if let Some(bank) = self.bank.as_mut() {
            bank.poison_all(&AggregateError::Poisoned);
        }
    }
}
