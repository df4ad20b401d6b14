use serde::{Deserialize, Serialize};

use crate::advisory::InsightError;

/// Longest accepted insight window (about ten years).
pub const MAX_WINDOW_DAYS: u32 = 3_660;

/// Thresholds of the business-health rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InsightConfig {
    /// Length of the current (and prior) window in days.
    pub window_days: u32,
    /// Days of stock left at or below which REORDER_SOON fires.
    pub reorder_soon_days: i64,
    /// Days of stock left at or below which RUNNING_LOW fires instead.
    pub running_low_days: i64,
    /// current / prior usage above this is SALES_INCREASING.
    pub increase_ratio: f64,
    /// current / prior usage below this is SALES_DECLINING.
    pub decline_ratio: f64,
    /// Order lines in the current window needed for HIGH_DEMAND.
    pub high_demand_order_lines: usize,
}

impl Default for InsightConfig {
    fn default() -> Self {
        Self {
            window_days: 30,
            reorder_soon_days: 14,
            running_low_days: 7,
            increase_ratio: 1.3,
            decline_ratio: 0.7,
            high_demand_order_lines: 3,
        }
    }
}

impl InsightConfig {
    pub fn validate(&self) -> Result<(), InsightError> {
        if self.window_days == 0 {
            return Err(InsightError::InvalidInput("window_days must be > 0".to_string()));
        }
        if self.window_days > MAX_WINDOW_DAYS {
            return Err(InsightError::InvalidInput(format!(
                "window_days must be at most {MAX_WINDOW_DAYS}"
            )));
        }
        if self.running_low_days > self.reorder_soon_days {
            return Err(InsightError::InvalidInput(
                "running_low_days must not exceed reorder_soon_days".to_string(),
            ));
        }
        if !(self.decline_ratio.is_finite()
            && self.increase_ratio.is_finite()
            && self.decline_ratio > 0.0
            && self.decline_ratio < self.increase_ratio)
        {
            return Err(InsightError::InvalidInput(
                "trend ratios must be finite with 0 < decline_ratio < increase_ratio".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        InsightConfig::default().validate().unwrap();
    }

    #[test]
    fn window_must_be_positive_and_bounded() {
        for window_days in [0, MAX_WINDOW_DAYS + 1, 200_000_000] {
            let config = InsightConfig {
                window_days,
                ..InsightConfig::default()
            };
            match config.validate() {
                Err(InsightError::InvalidInput(msg)) => assert!(msg.contains("window_days")),
                other => panic!("window of {window_days} days should be rejected, got {other:?}"),
            }
        }

        let longest = InsightConfig {
            window_days: MAX_WINDOW_DAYS,
            ..InsightConfig::default()
        };
        assert!(longest.validate().is_ok());
    }
}
