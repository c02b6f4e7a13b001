//! Timing defaults shared by the mocker and the CLI.

use std::time::Duration;

/// How often the terminal-condition detector samples a client's total difficulty.
pub const TERMINAL_CHECK_PERIOD: Duration = Duration::from_secs(1);

/// Delay between the end of one production cycle and the start of the next.
pub const BLOCK_PRODUCTION_PERIOD: Duration = Duration::from_secs(1);

/// Upper bound on how long proposer selection may wait for a caught-up client.
pub const PROPOSER_SELECTION_TIMEOUT: Duration = Duration::from_secs(60);

/// Pause between two rejected proposer candidates.
pub const PROPOSER_RETRY_DELAY: Duration = Duration::from_millis(50);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selection_timeout_spans_many_production_periods() {
        assert!(PROPOSER_SELECTION_TIMEOUT > BLOCK_PRODUCTION_PERIOD * 10);
        assert!(PROPOSER_RETRY_DELAY < BLOCK_PRODUCTION_PERIOD);
    }
}
