use std::time::Duration;

use clmock_types::{aliases::U256, constants};
use serde::{Deserialize, Serialize};

/// Tuning knobs for [`ClMocker`](crate::ClMocker).
///
/// Durations are stored in milliseconds so the config stays readable in TOML.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MockerConfig {
    /// Total difficulty at which block production switches to the Engine API.
    pub terminal_total_difficulty: U256,

    /// Polling interval of the terminal-condition detector.
    pub terminal_check_period_ms: u64,

    /// Delay between the end of a production cycle and the start of the next.
    pub block_production_period_ms: u64,

    /// How long proposer selection may wait for a client that is caught up with the
    /// finalized block before the run is aborted.
    pub proposer_selection_timeout_ms: u64,

    /// Pause between two rejected proposer candidates.
    pub proposer_retry_delay_ms: u64,

    /// Seed for proposer selection and `prevRandao` values. A random seed is drawn and logged
    /// when unset.
    pub seed: Option<u64>,
}

impl MockerConfig {
    pub fn terminal_check_period(&self) -> Duration {
        Duration::from_millis(self.terminal_check_period_ms)
    }

    pub fn block_production_period(&self) -> Duration {
        Duration::from_millis(self.block_production_period_ms)
    }

    pub fn proposer_selection_timeout(&self) -> Duration {
        Duration::from_millis(self.proposer_selection_timeout_ms)
    }

    pub fn proposer_retry_delay(&self) -> Duration {
        Duration::from_millis(self.proposer_retry_delay_ms)
    }
}

impl Default for MockerConfig {
    fn default() -> Self {
        Self {
            terminal_total_difficulty: U256::ZERO,
            terminal_check_period_ms: constants::TERMINAL_CHECK_PERIOD.as_millis() as u64,
            block_production_period_ms: constants::BLOCK_PRODUCTION_PERIOD.as_millis() as u64,
            proposer_selection_timeout_ms: constants::PROPOSER_SELECTION_TIMEOUT.as_millis()
                as u64,
            proposer_retry_delay_ms: constants::PROPOSER_RETRY_DELAY.as_millis() as u64,
            seed: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_falls_back_to_defaults() {
        let config: MockerConfig = toml::from_str(
            r#"
            terminal_total_difficulty = "0x20000"
            seed = 7
            "#,
        )
        .expect("parse mocker config");

        assert_eq!(config.terminal_total_difficulty, U256::from(0x20000));
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.block_production_period(), constants::BLOCK_PRODUCTION_PERIOD);
        assert_eq!(config.proposer_selection_timeout(), constants::PROPOSER_SELECTION_TIMEOUT);
    }
}
