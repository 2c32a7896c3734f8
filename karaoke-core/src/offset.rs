//! Per-track persisted sync offset.

use crate::error::{CoreError, Result};
use crate::kv::KeyValueStore;
use std::sync::Arc;
use tracing::{debug, warn};

const LOG_TARGET: &str = "karaoke::offset";

/// Default key namespace; entries are stored as `<namespace>_<trackId>`.
pub const DEFAULT_OFFSET_NAMESPACE: &str = "karaoke_offset";

/// Typed wrapper that stores one floating-point offset (seconds) per track.
#[derive(Clone)]
pub struct OffsetStore {
    store: Arc<dyn KeyValueStore>,
    namespace: String,
}

impl OffsetStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_namespace(store, DEFAULT_OFFSET_NAMESPACE)
    }

    pub fn with_namespace(store: Arc<dyn KeyValueStore>, namespace: impl Into<String>) -> Self {
        Self {
            store,
            namespace: namespace.into(),
        }
    }

    fn key(&self, track_id: &str) -> String {
        format!("{}_{track_id}", self.namespace)
    }

    /// Last persisted offset for `track_id`, or `0.0`.
    ///
    /// Unreadable storage and malformed values are treated as absent.
    #[must_use]
    pub fn get(&self, track_id: &str) -> f64 {
        let key = self.key(track_id);
        match self.store.get(&key) {
            Ok(Some(raw)) => match raw.trim().parse::<f64>() {
                Ok(value) if value.is_finite() => value,
                Ok(value) => {
                    warn!(target: LOG_TARGET, "Ignoring non-finite offset {} under {}", value, key);
                    0.0
                }
                Err(e) => {
                    warn!(
                        target: LOG_TARGET,
                        "Ignoring malformed offset {:?} under {}: {}",
                        raw,
                        key,
                        e
                    );
                    0.0
                }
            },
            Ok(None) => 0.0,
            Err(e) => {
                warn!(target: LOG_TARGET, "Failed to read offset under {}: {}", key, e);
                0.0
            }
        }
    }

    /// Persist `value` for `track_id`.
    ///
    /// The value is written in its shortest round-trip form, so `get` returns
    /// exactly the same float.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidOffset`] for NaN or infinite values, or an
    /// error if the backing store fails to persist the value.
    pub fn set(&self, track_id: &str, value: f64) -> Result<()> {
        if !value.is_finite() {
            return Err(CoreError::InvalidOffset { value });
        }
        let key = self.key(track_id);
        debug!(target: LOG_TARGET, "Persisting offset {} under {}", value, key);
        self.store.set(&key, &value.to_string())
    }

    /// Offset that aligns the current raw clock reading with the first line.
    ///
    /// Only meaningful for a non-empty timeline; callers guard that.
    #[must_use]
    pub fn tap_to_sync(current_raw_time: f64, first_line_time: f64) -> f64 {
        first_line_time - current_raw_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryStore;

    fn store() -> (Arc<MemoryStore>, OffsetStore) {
        let kv = Arc::new(MemoryStore::new());
        let offsets = OffsetStore::new(kv.clone());
        (kv, offsets)
    }

    #[test]
    fn test_unseen_track_defaults_to_zero() {
        let (_, offsets) = store();
        assert_eq!(offsets.get("unknown"), 0.0);
    }

    #[test]
    fn test_roundtrip_exact() {
        let (_, offsets) = store();
        let accumulated = -0.1 + 0.2;
        for value in [0.0, -0.0, 1.5, -12.3, accumulated, 1e-12, 41.7, f64::MAX] {
            offsets.set("track", value).unwrap();
            assert_eq!(offsets.get("track").to_bits(), value.to_bits());
        }
    }

    #[test]
    fn test_key_layout() {
        let (kv, offsets) = store();
        offsets.set("123", 2.5).unwrap();
        assert_eq!(kv.get("karaoke_offset_123").unwrap().as_deref(), Some("2.5"));
    }

    #[test]
    fn test_tracks_are_independent() {
        let (_, offsets) = store();
        offsets.set("a", 1.0).unwrap();
        offsets.set("b", -1.0).unwrap();
        assert_eq!(offsets.get("a"), 1.0);
        assert_eq!(offsets.get("b"), -1.0);
    }

    #[test]
    fn test_malformed_value_is_absent() {
        let (kv, offsets) = store();
        kv.set("karaoke_offset_bad", "not a number").unwrap();
        assert_eq!(offsets.get("bad"), 0.0);
    }

    #[test]
    fn test_non_finite_value_is_absent() {
        let (kv, offsets) = store();
        for raw in ["NaN", "inf", "-infinity"] {
            kv.set("karaoke_offset_odd", raw).unwrap();
            assert_eq!(offsets.get("odd"), 0.0);
        }
    }

    #[test]
    fn test_non_finite_value_is_rejected() {
        let (kv, offsets) = store();
        offsets.set("t", 1.0).unwrap();
        assert!(matches!(
            offsets.set("t", f64::NAN),
            Err(CoreError::InvalidOffset { .. })
        ));
        assert!(offsets.set("t", f64::INFINITY).is_err());
        assert_eq!(kv.get("karaoke_offset_t").unwrap().as_deref(), Some("1"));
    }

    #[test]
    fn test_unreadable_store_is_absent() {
        struct Broken;
        impl KeyValueStore for Broken {
            fn get(&self, _key: &str) -> Result<Option<String>> {
                Err(CoreError::StorageUnavailable {
                    reason: "offline".into(),
                })
            }
            fn set(&self, _key: &str, _value: &str) -> Result<()> {
                Err(CoreError::StorageUnavailable {
                    reason: "offline".into(),
                })
            }
        }

        let offsets = OffsetStore::new(Arc::new(Broken));
        assert_eq!(offsets.get("x"), 0.0);
        assert!(offsets.set("x", 1.0).is_err());
    }

    #[test]
    fn test_tap_to_sync() {
        assert_eq!(OffsetStore::tap_to_sync(3.0, 12.5), 9.5);
        assert_eq!(OffsetStore::tap_to_sync(20.0, 12.5), -7.5);
    }
}
