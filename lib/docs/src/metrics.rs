//! Run health metrics.

use flowscribe_workflow::{RunOutcomeSample, RunStatus};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Counts of sampled runs per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunMetrics {
    pub succeeded: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub running: usize,
    pub other: usize,
    pub total: usize,
}

impl RunMetrics {
    /// Reduces samples to counts. Order of the samples does not matter.
    #[must_use]
    pub fn aggregate<'a>(samples: impl IntoIterator<Item = &'a RunOutcomeSample>) -> Self {
        samples.into_iter().fold(Self::default(), |mut metrics, sample| {
            match sample.status {
                RunStatus::Succeeded => metrics.succeeded += 1,
                RunStatus::Failed => metrics.failed += 1,
                RunStatus::Cancelled => metrics.cancelled += 1,
                RunStatus::Running => metrics.running += 1,
                RunStatus::Other => metrics.other += 1,
            }
            metrics.total += 1;
            metrics
        })
    }

    /// Count for one status.
    #[must_use]
    pub fn count(&self, status: RunStatus) -> usize {
        match status {
            RunStatus::Succeeded => self.succeeded,
            RunStatus::Failed => self.failed,
            RunStatus::Cancelled => self.cancelled,
            RunStatus::Running => self.running,
            RunStatus::Other => self.other,
        }
    }

    /// Share of succeeded runs, derived from the counts.
    #[must_use]
    pub fn success_rate(&self) -> SuccessRate {
        if self.total == 0 {
            return SuccessRate::NotAvailable;
        }
        // Round half up on hundredths of a percent: floor(s * 10000 / t + 1/2).
        let succeeded = self.succeeded as u128;
        let total = self.total as u128;
        let hundredths = (succeeded * 20_000 + total) / (2 * total);
        SuccessRate::Percent {
            hundredths: hundredths as u64,
        }
    }
}

/// Success rate as a percentage with two decimals, or not available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuccessRate {
    /// No runs were sampled.
    NotAvailable,
    /// Percentage in hundredths (7000 = 70%).
    Percent { hundredths: u64 },
}

impl fmt::Display for SuccessRate {
    /// Renders `N/A`, or the percentage without trailing zeros (`70`, `12.5`, `33.33`).
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotAvailable => f.write_str("N/A"),
            Self::Percent { hundredths } => {
                let whole = hundredths / 100;
                let fraction = hundredths % 100;
                if fraction == 0 {
                    write!(f, "{whole}")
                } else if fraction % 10 == 0 {
                    write!(f, "{whole}.{}", fraction / 10)
                } else {
                    write!(f, "{whole}.{fraction:02}")
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn samples(succeeded: usize, failed: usize) -> Vec<RunOutcomeSample> {
        std::iter::repeat_n(RunStatus::Succeeded, succeeded)
            .chain(std::iter::repeat_n(RunStatus::Failed, failed))
            .map(|status| RunOutcomeSample::new(status, None))
            .collect()
    }

    fn rate(succeeded: usize, failed: usize) -> String {
        RunMetrics::aggregate(&samples(succeeded, failed))
            .success_rate()
            .to_string()
    }

    #[test]
    fn empty_sample_has_no_rate() {
        let metrics = RunMetrics::aggregate(&[]);
        assert_eq!(metrics.total, 0);
        assert_eq!(metrics.success_rate(), SuccessRate::NotAvailable);
        assert_eq!(metrics.success_rate().to_string(), "N/A");
    }

    #[test]
    fn whole_percentages_have_no_decimals() {
        assert_eq!(rate(7, 3), "70");
        assert_eq!(rate(4, 0), "100");
        assert_eq!(rate(0, 5), "0");
    }

    #[test]
    fn fractional_percentages_round_half_up() {
        assert_eq!(rate(1, 2), "33.33");
        assert_eq!(rate(2, 1), "66.67");
        assert_eq!(rate(1, 7), "12.5");
        // 1/1600 = 0.0625% rounds up to 0.06
        assert_eq!(rate(1, 1599), "0.06");
        // 1/800 = 0.125% sits exactly on the half and rounds up
        assert_eq!(rate(1, 799), "0.13");
    }

    #[test]
    fn counts_every_status() {
        let all: Vec<_> = RunStatus::ALL
            .iter()
            .map(|&status| RunOutcomeSample::new(status, None))
            .collect();
        let metrics = RunMetrics::aggregate(&all);
        assert_eq!(metrics.total, 5);
        for status in RunStatus::ALL {
            assert_eq!(metrics.count(status), 1);
        }
        assert_eq!(metrics.success_rate().to_string(), "20");
    }
}
