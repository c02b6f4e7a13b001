//! Terminal total difficulty detection and the switch to Engine API block production.

use clmock_types::{
    aliases::{BlockNumberOrTag, U256},
    engine_api::forkchoice_at,
};
use rand::Rng;
use tracing::{debug, info};

use crate::{
    broadcast::{broadcast_forkchoice_updated, log_forkchoice_outcomes},
    cycle::Driver,
    error::MockerError,
};

/// Result of one terminal check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TerminalPoll {
    /// Nothing to sample.
    NoClients,
    /// The sampled client is still below the terminal total difficulty.
    Below(U256),
    /// The transition has happened, in this poll or an earlier one.
    Reached,
}

impl Driver<'_> {
    /// Polls every terminal check period until the transition happens. Returns `false` if
    /// shutdown was requested first.
    pub(crate) async fn detect_terminal(&mut self) -> Result<bool, MockerError> {
        let period = self.mocker.config.terminal_check_period();
        loop {
            if self.mocker.shutdown.is_cancelled() {
                return Ok(false);
            }
            if self.poll_terminal().await? == TerminalPoll::Reached {
                return Ok(true);
            }
            if !self.sleep(period).await {
                return Ok(false);
            }
        }
    }

    /// Samples the total difficulty of one random client and performs the transition once it
    /// is at or above the terminal total difficulty.
    pub(crate) async fn poll_terminal(&mut self) -> Result<TerminalPoll, MockerError> {
        let mocker = self.mocker;
        if mocker.terminal_reached() {
            return Ok(TerminalPoll::Reached);
        }

        let clients = mocker.registry.lock().await;
        if clients.is_empty() {
            debug!("No execution clients registered, waiting for terminal total difficulty");
            return Ok(TerminalPoll::NoClients);
        }

        let client = clients[self.rng.gen_range(0..clients.len())].clone();
        let ttd = mocker.config.terminal_total_difficulty;
        let td = client.total_difficulty().await.map_err(|e| MockerError::DifficultyQuery {
            client: client.name().to_string(),
            source: e.into(),
        })?;
        if td < ttd {
            debug!(client = client.name(), %td, %ttd, "Terminal total difficulty not reached");
            return Ok(TerminalPoll::Below(td));
        }

        let header = client.header_by_number(BlockNumberOrTag::Latest).await.map_err(|e| {
            MockerError::HeaderQuery { client: client.name().to_string(), source: e.into() }
        })?;
        info!(
            client = client.name(),
            %td,
            %ttd,
            number = header.block_number,
            hash = %header.block_hash,
            "Terminal total difficulty reached"
        );

        let forkchoice = forkchoice_at(header.block_hash);
        {
            let mut state = mocker.state.write();
            state.terminal_reached = true;
            state.forkchoice = forkchoice.clone();
            state.latest_header = Some(header);
        }

        let outcomes = broadcast_forkchoice_updated(&clients, &forkchoice, None).await;
        log_forkchoice_outcomes(&outcomes, "terminal", &forkchoice);
        mocker.terminal.send_replace(true);
        Ok(TerminalPoll::Reached)
    }
}

#[cfg(test)]
mod tests {
    use alloy_rpc_types_engine::ForkchoiceState;
    use clmock_test_support::MockExecutionNode;

    use super::*;
    use crate::{ClMocker, MockerConfig};

    fn mocker(ttd: u64) -> ClMocker {
        ClMocker::new(MockerConfig {
            terminal_total_difficulty: U256::from(ttd),
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn empty_registry_is_a_noop() {
        let mocker = mocker(0);
        let mut driver = mocker.driver(1).expect("fresh mocker");

        for _ in 0..3 {
            assert_eq!(driver.poll_terminal().await.unwrap(), TerminalPoll::NoClients);
        }
        assert!(!mocker.terminal_reached());
        assert_eq!(mocker.forkchoice(), ForkchoiceState::default());
        assert!(mocker.latest_header().is_none());
    }

    #[tokio::test]
    async fn transition_happens_exactly_once_for_any_seed() {
        for seed in 0..16 {
            let mocker = mocker(100);
            let nodes = [
                MockExecutionNode::with_difficulty("below-1", 10),
                MockExecutionNode::with_difficulty("below-2", 50),
                MockExecutionNode::with_difficulty("above", 200),
            ];
            for node in &nodes {
                mocker.register_client(node.client()).await;
            }
            let mut terminal = mocker.terminal.subscribe();
            let mut driver = mocker.driver(seed).expect("fresh mocker");

            let mut polls = 0;
            loop {
                polls += 1;
                assert!(polls < 500, "seed {seed}: transition never happened");
                match driver.poll_terminal().await.unwrap() {
                    TerminalPoll::Reached => break,
                    TerminalPoll::Below(td) => assert!(td < U256::from(100)),
                    TerminalPoll::NoClients => panic!("clients are registered"),
                }
            }
            for _ in 0..5 {
                assert_eq!(driver.poll_terminal().await.unwrap(), TerminalPoll::Reached);
            }

            assert!(mocker.terminal_reached());
            assert!(terminal.has_changed().unwrap());
            assert!(*terminal.borrow_and_update());
            let header = mocker.latest_header().expect("terminal header");
            assert_eq!(header.total_difficulty, Some(U256::from(200)));
            assert_eq!(mocker.forkchoice(), forkchoice_at(header.block_hash));
            for node in &nodes {
                assert_eq!(node.forkchoice_updates().len(), 1, "seed {seed}: {}", node.name());
            }
        }
    }

    #[tokio::test]
    async fn failed_difficulty_query_is_fatal() {
        let mocker = mocker(100);
        let node = MockExecutionNode::with_difficulty("down", 0);
        node.set_fail_rpc(true);
        mocker.register_client(node.client()).await;
        let mut driver = mocker.driver(3).expect("fresh mocker");

        let err = driver.poll_terminal().await.unwrap_err();
        assert!(matches!(err, MockerError::DifficultyQuery { ref client, .. } if client == "down"));
        assert!(!mocker.terminal_reached());
    }
}
