use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Trailing-window comparison used by the trend classifier.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrendConfig {
    pub window_days: i64,
    pub up_factor:   Decimal,
    pub down_factor: Decimal,
}

impl Default for TrendConfig {
    fn default() -> Self {
        Self {
            window_days: 30,
            up_factor:   Decimal::new(11, 1),
            down_factor: Decimal::new(9, 1),
        }
    }
}

/// Multipliers are applied to the merchant-wide average spend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SegmentThresholds {
    pub vip_multiplier:     Decimal,
    pub regular_multiplier: Decimal,
    pub inactive_after_days: i64,
    pub new_within_days:    i64,
}

impl Default for SegmentThresholds {
    fn default() -> Self {
        Self {
            vip_multiplier:      Decimal::new(25, 1),
            regular_multiplier:  Decimal::new(12, 1),
            inactive_after_days: 90,
            new_within_days:     30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DirectoryConfig {
    pub page_size:           usize,
    pub high_band_multiplier: Decimal,
    pub low_band_multiplier:  Decimal,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            page_size:            10,
            high_band_multiplier: Decimal::new(15, 1),
            low_band_multiplier:  Decimal::new(5, 1),
        }
    }
}

/// Whether a staff debit may leave an account below zero.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum NegativeBalancePolicy {
    #[default]
    Allow,
    Reject,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct LoyaltyConfig {
    pub trend:            TrendConfig,
    pub segments:         SegmentThresholds,
    pub directory:        DirectoryConfig,
    pub negative_balance: NegativeBalancePolicy,
}

impl LoyaltyConfig {
    /// Load from a JSON file. Missing sections fall back to defaults.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let config: LoyaltyConfig = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Cannot parse {path}: {e}"))?;
        config.validate()?;
        log::debug!("loaded loyalty config from {path}");
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.trend.window_days <= 0 {
            anyhow::bail!("trend.window_days must be positive");
        }
        if self.trend.down_factor > self.trend.up_factor {
            anyhow::bail!("trend.down_factor must not exceed trend.up_factor");
        }
        if self.segments.regular_multiplier > self.segments.vip_multiplier {
            anyhow::bail!("segments.regular_multiplier must not exceed vip_multiplier");
        }
        if self.directory.page_size == 0 {
            anyhow::bail!("directory.page_size must be positive");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config: LoyaltyConfig =
            serde_json::from_str(r#"{ "negative_balance": "reject" }"#).unwrap();
        assert_eq!(config.negative_balance, NegativeBalancePolicy::Reject);
        assert_eq!(config.trend, TrendConfig::default());
        assert_eq!(config.segments.inactive_after_days, 90);
    }

    #[test]
    fn load_reports_missing_file() {
        let err = LoyaltyConfig::load("/nonexistent/loyalty.json").unwrap_err();
        assert!(err.to_string().contains("Cannot read"));
    }

    #[test]
    fn inverted_trend_factors_are_rejected() {
        let mut config = LoyaltyConfig::default();
        config.trend.down_factor = Decimal::new(2, 0);
        assert!(config.validate().is_err());
    }
}
