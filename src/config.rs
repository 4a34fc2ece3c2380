//! Codec configuration.

use serde::{Deserialize, Serialize};

/// Receipt schema version stamped by default.
pub const SCHEMA_VER: u32 = 1;

/// Default upper bound on a single frame's payload.
pub const DEFAULT_MAX_FRAME_LEN: u32 = 16 * 1024 * 1024;

/// Whether a point edit may carry `new == old`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoOpPolicy {
    #[default]
    Reject,
    Allow,
}

/// How tree-patch paths that put a key and an index at the same position are handled.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MixedPathPolicy {
    #[default]
    Reject,
    /// Order indices before keys and accept the delta.
    IndexBeforeKey,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    pub noop_policy: NoOpPolicy,
    pub mixed_path_policy: MixedPathPolicy,
    pub max_frame_len: u32,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            noop_policy: NoOpPolicy::Reject,
            mixed_path_policy: MixedPathPolicy::Reject,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }
}

impl CodecConfig {
    pub fn allowing_noops(mut self) -> Self {
        self.noop_policy = NoOpPolicy::Allow;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_strict() {
        let cfg = CodecConfig::default();
        assert_eq!(cfg.noop_policy, NoOpPolicy::Reject);
        assert_eq!(cfg.mixed_path_policy, MixedPathPolicy::Reject);
    }

    #[test]
    fn test_partial_json_config_fills_defaults() {
        let cfg: CodecConfig = serde_json::from_str(r#"{"noop_policy":"allow"}"#).unwrap();
        assert_eq!(cfg.noop_policy, NoOpPolicy::Allow);
        assert_eq!(cfg.max_frame_len, DEFAULT_MAX_FRAME_LEN);
    }
}
