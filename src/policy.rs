//! Which pipeline steps may degrade and which must succeed

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Probe,
    Fetch,
    Watermark,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Step::Probe => "probe",
            Step::Fetch => "fetch",
            Step::Watermark => "watermark",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureMode {
    /// Log and continue with a degraded result.
    BestEffort,
    /// Abort the request.
    Required,
}

/// Failure table for the download pipeline.
///
/// The fetch step has no entry: without a fetched file there is nothing to
/// deliver, so it is always `Required`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepPolicy {
    pub probe: FailureMode,
    pub watermark: FailureMode,
}

impl StepPolicy {
    pub fn mode(&self, step: Step) -> FailureMode {
        match step {
            Step::Probe => self.probe,
            Step::Fetch => FailureMode::Required,
            Step::Watermark => self.watermark,
        }
    }

    pub fn is_required(&self, step: Step) -> bool {
        self.mode(step) == FailureMode::Required
    }
}

impl Default for StepPolicy {
    fn default() -> Self {
        Self {
            probe: FailureMode::BestEffort,
            watermark: FailureMode::BestEffort,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_table() {
        let policy = StepPolicy::default();
        assert_eq!(policy.mode(Step::Probe), FailureMode::BestEffort);
        assert_eq!(policy.mode(Step::Watermark), FailureMode::BestEffort);
        assert!(policy.is_required(Step::Fetch));
    }

    #[test]
    fn test_fetch_cannot_be_relaxed() {
        let policy = StepPolicy {
            probe: FailureMode::Required,
            watermark: FailureMode::Required,
        };
        assert!(policy.is_required(Step::Probe));
        assert!(policy.is_required(Step::Fetch));
        assert!(policy.is_required(Step::Watermark));
    }
}
