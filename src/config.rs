use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::encoder::UnknownPolicy;
use crate::pooling::Pooling;

/// Settings shared by both table builders.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Hidden-state layer to read; negative values count back from the deepest.
    pub layer: isize,
    pub pooling: Pooling,
    /// Fallback for words that encode to nothing. Decontextualized builds only.
    pub unknown: UnknownPolicy,
    /// Show a progress bar while building.
    #[serde(skip)]
    pub verbose: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        BuildConfig {
            layer: 1,
            pooling: Pooling::Mean,
            unknown: UnknownPolicy::Substitute,
            verbose: false,
        }
    }
}

/// How a table's vectors were derived.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Approach {
    Decontextualized,
    Aggregated,
}

/// Cooperative cancellation flag, checked before each model invocation.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_from_partial_json() {
        let config: BuildConfig = serde_json::from_str(r#"{"pooling": "max", "layer": -1}"#).unwrap();
        assert_eq!(config.pooling, Pooling::Max);
        assert_eq!(config.layer, -1);
        assert_eq!(config.unknown, UnknownPolicy::Substitute);
    }

    #[test]
    fn cancel_is_shared() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }
}
