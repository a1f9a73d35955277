use serde::{Deserialize, Serialize};

/// Backend-assigned identifier for one submitted prompt (a work unit).
pub type PromptId = String;

/// Identifier of one node (computation step) within a prompt's graph.
///
/// ComfyUI encodes these as strings on the wire even when they look
/// numeric, so they stay strings here.
pub type NodeId = String;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Step-level progress of the currently executing node, as reported by
/// the backend (`value` of `max` steps).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    /// Current step number.
    pub value: u32,
    /// Total number of steps.
    pub max: u32,
}

impl Progress {
    /// Completion as a fraction in `0.0..=1.0`. Returns 0.0 when `max`
    /// is zero rather than dividing by it.
    pub fn fraction(&self) -> f64 {
        if self.max == 0 {
            return 0.0;
        }
        (self.value as f64 / self.max as f64).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fraction_of_half_done() {
        let p = Progress { value: 10, max: 20 };
        assert_eq!(p.fraction(), 0.5);
    }

    #[test]
    fn fraction_with_zero_max_is_zero() {
        let p = Progress { value: 5, max: 0 };
        assert_eq!(p.fraction(), 0.0);
    }

    #[test]
    fn fraction_clamps_overshoot() {
        // Some samplers report value == max + 1 on their final callback.
        let p = Progress { value: 21, max: 20 };
        assert_eq!(p.fraction(), 1.0);
    }
}
