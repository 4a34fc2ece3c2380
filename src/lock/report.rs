use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use crate::canon::canon;
use crate::crypto::sha256_hex;
use crate::error::{EncodingError, LockError, Result};
use crate::value::Value;

/// Key of the sealing line.
pub const DRIFT_KEY: &str = "drift_sha256";

/// Ordered `key=value` fields of one scenario run.
///
/// Integers are emitted as integers; everything else (flags, ratios, digests,
/// integers beyond i64) as strings, so the drift digest never sees a float.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LockReport {
    fields: Vec<(String, Value)>,
}

impl LockReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field. Re-setting a key keeps its original position.
    pub fn push(&mut self, key: impl Into<String>, value: Value) -> &mut Self {
        let key = key.into();
        match self.fields.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((key, value)),
        }
        self
    }

    pub fn push_int(&mut self, key: impl Into<String>, value: i64) -> &mut Self {
        self.push(key, Value::Int(value))
    }

    /// Counts and sizes.
    pub fn push_count(&mut self, key: impl Into<String>, value: usize) -> &mut Self {
        self.push_u64(key, value as u64)
    }

    pub fn push_u64(&mut self, key: impl Into<String>, value: u64) -> &mut Self {
        match i64::try_from(value) {
            Ok(v) => self.push(key, Value::Int(v)),
            Err(_) => self.push(key, Value::Str(value.to_string())),
        }
    }

    pub fn push_str(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.push(key, Value::Str(value.into()))
    }

    pub fn push_flag(&mut self, key: impl Into<String>, ok: bool) -> &mut Self {
        self.push_str(key, if ok { "true" } else { "false" })
    }

    /// `num / den` to three decimals; `inf` when `den` is zero.
    pub fn push_ratio(&mut self, key: impl Into<String>, num: usize, den: usize) -> &mut Self {
        let text = if den == 0 {
            "inf".to_string()
        } else {
            format!("{:.3}", num as f64 / den as f64)
        };
        self.push_str(key, text)
    }

    /// Aggregate results. Values outside i64 travel as text.
    pub fn push_wide(&mut self, key: impl Into<String>, value: i128) -> &mut Self {
        match i64::try_from(value) {
            Ok(v) => self.push(key, Value::Int(v)),
            Err(_) => self.push(key, Value::Str(value.to_string())),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Every field whose key ends in `_ok` reads `true`.
    pub fn all_flags_ok(&self) -> bool {
        self.fields
            .iter()
            .filter(|(k, _)| k.ends_with("_ok"))
            .all(|(_, v)| *v == Value::Str("true".into()))
    }

    /// Names of `_ok` fields that read anything but `true`.
    pub fn failed_flags(&self) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|(k, v)| k.ends_with("_ok") && *v != Value::Str("true".into()))
            .map(|(k, _)| k.as_str())
            .collect()
    }

    /// SHA-256 of the canonical JSON object of all fields.
    pub fn drift_sha256(&self) -> std::result::Result<String, EncodingError> {
        let map: BTreeMap<String, Value> = self.fields.iter().cloned().collect();
        Ok(sha256_hex(&canon(&Value::Map(map))?))
    }

    /// Fields in order, one per line, sealed by `drift_sha256`.
    pub fn render(&self) -> std::result::Result<String, EncodingError> {
        let mut out = String::new();
        for (key, value) in &self.fields {
            // Writing to a String cannot fail.
            let _ = match value {
                Value::Int(i) => writeln!(out, "{key}={i}"),
                Value::Str(s) => writeln!(out, "{key}={s}"),
                other => writeln!(out, "{key}={}", other.to_json()),
            };
        }
        let _ = writeln!(out, "{DRIFT_KEY}={}", self.drift_sha256()?);
        Ok(out)
    }

    /// Read a rendered report back and check its seal.
    pub fn parse(text: &str) -> Result<Self> {
        let mut report = Self::new();
        let mut stated = None;
        for (n, line) in text.lines().enumerate() {
            if line.is_empty() {
                continue;
            }
            if stated.is_some() {
                return Err(LockError::MalformedLine { line: n + 1 }.into());
            }
            let (key, raw) = line
                .split_once('=')
                .ok_or(LockError::MalformedLine { line: n + 1 })?;
            if key == DRIFT_KEY {
                stated = Some(raw.to_string());
                continue;
            }
            report.push(key, parse_field(raw));
        }
        let stated = stated.ok_or(LockError::MissingDrift)?;
        let computed = report.drift_sha256()?;
        if stated != computed {
            return Err(LockError::DriftMismatch { stated, computed }.into());
        }
        Ok(report)
    }
}

fn parse_field(raw: &str) -> Value {
    match raw.parse::<i64>() {
        Ok(i) if i.to_string() == raw => Value::Int(i),
        _ => Value::Str(raw.to_string()),
    }
}

/// Result of checking a drift digest against the stored lock.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LockStatus {
    Match,
    Mismatch { expected: String, actual: String },
    /// No lock recorded for the scenario yet.
    Unlocked,
}

/// Stored `scenario=drift_sha256` lines.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LockBook {
    locks: BTreeMap<String, String>,
}

impl LockBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse(text: &str) -> Result<Self> {
        let mut locks = BTreeMap::new();
        for (n, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (name, digest) = line
                .split_once('=')
                .ok_or(LockError::MalformedLine { line: n + 1 })?;
            locks.insert(name.to_string(), digest.to_string());
        }
        Ok(Self { locks })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::parse(&fs::read_to_string(path)?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        fs::write(path, self.render())?;
        Ok(())
    }

    pub fn render(&self) -> String {
        self.locks
            .iter()
            .map(|(name, digest)| format!("{name}={digest}\n"))
            .collect()
    }

    pub fn insert(&mut self, scenario: impl Into<String>, drift: impl Into<String>) {
        self.locks.insert(scenario.into(), drift.into());
    }

    pub fn get(&self, scenario: &str) -> Option<&str> {
        self.locks.get(scenario).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }

    pub fn check(&self, scenario: &str, drift: &str) -> LockStatus {
        match self.locks.get(scenario) {
            None => LockStatus::Unlocked,
            Some(expected) if expected == drift => LockStatus::Match,
            Some(expected) => LockStatus::Mismatch {
                expected: expected.clone(),
                actual: drift.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WirePackError;

    fn sample() -> LockReport {
        let mut report = LockReport::new();
        report
            .push_str("scenario", "demo")
            .push_int("seed", 7)
            .push_count("raw_delta_stream", 1200)
            .push_ratio("raw_ratio", 60_000, 1200)
            .push_flag("sum_ok", true);
        report
    }

    #[test]
    fn test_render_order_and_seal() {
        let text = sample().render().unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            &lines[..5],
            &[
                "scenario=demo",
                "seed=7",
                "raw_delta_stream=1200",
                "raw_ratio=50.000",
                "sum_ok=true"
            ]
        );
        assert!(lines[5].starts_with("drift_sha256="));
        assert_eq!(lines[5].len(), "drift_sha256=".len() + 64);
    }

    #[test]
    fn test_drift_is_over_canonical_json() {
        let expected = sha256_hex(
            br#"{"raw_delta_stream":1200,"raw_ratio":"50.000","scenario":"demo","seed":7,"sum_ok":"true"}"#,
        );
        assert_eq!(sample().drift_sha256().unwrap(), expected);
    }

    #[test]
    fn test_parse_round_trip_and_tamper() {
        let report = sample();
        let text = report.render().unwrap();
        assert_eq!(LockReport::parse(&text).unwrap(), report);

        let tampered = text.replace("seed=7", "seed=8");
        assert!(matches!(
            LockReport::parse(&tampered),
            Err(WirePackError::Lock(LockError::DriftMismatch { .. }))
        ));
        assert!(matches!(
            LockReport::parse("seed=7\n"),
            Err(WirePackError::Lock(LockError::MissingDrift))
        ));
    }

    #[test]
    fn test_wide_values_survive_parse() {
        let mut report = sample();
        report
            .push_wide("sum_final", 517)
            .push_wide("dot_final", -42)
            .push_wide("norm_final", i128::from(i64::MAX) + 1);
        assert_eq!(report.get("sum_final"), Some(&Value::Int(517)));
        assert_eq!(
            report.get("norm_final"),
            Some(&Value::Str("9223372036854775808".into()))
        );
        let parsed = LockReport::parse(&report.render().unwrap()).unwrap();
        assert_eq!(parsed, report);
        assert_eq!(parsed.drift_sha256().unwrap(), report.drift_sha256().unwrap());
    }

    #[test]
    fn test_flags() {
        let mut report = sample();
        assert!(report.all_flags_ok());
        report.push_flag("topk_ok", false);
        assert!(!report.all_flags_ok());
        assert_eq!(report.failed_flags(), vec!["topk_ok"]);
        report.push_flag("topk_ok", true);
        assert!(report.all_flags_ok());
        assert_eq!(report.fields().count(), 6, "re-set keeps one entry");
    }

    #[test]
    fn test_lock_book() {
        let mut book = LockBook::parse("# locks\ns1=aa\n\ns2=bb\n").unwrap();
        assert_eq!(book.len(), 2);
        assert_eq!(book.check("s1", "aa"), LockStatus::Match);
        assert_eq!(
            book.check("s2", "cc"),
            LockStatus::Mismatch {
                expected: "bb".into(),
                actual: "cc".into()
            }
        );
        assert_eq!(book.check("s3", "dd"), LockStatus::Unlocked);
        book.insert("s3", "dd");
        assert_eq!(LockBook::parse(&book.render()).unwrap(), book);
        assert!(LockBook::parse("no equals sign").is_err());
    }
}
