use std::sync::Arc;

/// Callback resolving an external power condition to its current value
///
/// Returns `None` when the condition identifier is unknown to the host.
pub type ConditionLookup = Arc<dyn Fn(&str) -> Option<bool> + Send + Sync>;

/// Policy when the configured condition cannot be resolved: fail open.
/// A device without a detectable power switch must remain usable.
const UNRESOLVED_CONDITION_AVAILABLE: bool = true;

/// Decides whether the device should currently be treated as powered
///
/// The gate is consulted before every transport operation and recomputed on
/// each call; it never caches and never performs I/O beyond the injected
/// in-memory lookup. It exists to decouple protocol activity from an
/// unrelated power-control signal: a projector booth often cuts mains power
/// to the processor, and talking to a dead socket on every poll would drown
/// the logs in connection errors.
#[derive(Clone)]
pub struct AvailabilityGate {
    condition: Option<String>,
    lookup: ConditionLookup,
}

impl AvailabilityGate {
    /// Gate that always reports the device as available
    pub fn open() -> Self {
        Self::new(None, Arc::new(|_| None))
    }

    /// Gate on `condition`, resolved through `lookup`
    pub fn new(condition: Option<String>, lookup: ConditionLookup) -> Self {
        Self { condition, lookup }
    }

    /// Current availability
    ///
    /// Always true when no condition is configured. An unresolvable
    /// condition fails open with a warning.
    pub fn is_available(&self) -> bool {
        let Some(condition) = &self.condition else {
            return true;
        };
        match (self.lookup)(condition) {
            Some(on) => on,
            None => {
                tracing::warn!("power condition {condition} not found, treating device as powered");
                UNRESOLVED_CONDITION_AVAILABLE
            }
        }
    }
}
