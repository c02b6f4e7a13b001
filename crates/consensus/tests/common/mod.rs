//! Shared harness for the mocker integration tests.
//!
//! Every test runs a [`ClMocker`] against in-memory execution nodes with millisecond periods,
//! so a block is produced every few milliseconds.

#![allow(dead_code)]

use std::{future::Future, sync::Arc, time::Duration};

use clmock_consensus::{ClMocker, MockerConfig, MockerError};
use clmock_execution::ExecutionClient;
use clmock_test_support::MockExecutionNode;
use clmock_types::aliases::U256;
use tokio::task::JoinHandle;

/// Upper bound for anything a test waits on.
pub(crate) const TEST_TIMEOUT: Duration = Duration::from_secs(10);

pub(crate) fn fast_config(ttd: u64, seed: u64) -> MockerConfig {
    MockerConfig {
        terminal_total_difficulty: U256::from(ttd),
        terminal_check_period_ms: 5,
        block_production_period_ms: 5,
        proposer_selection_timeout_ms: 200,
        proposer_retry_delay_ms: 1,
        seed: Some(seed),
    }
}

/// Fails the test instead of hanging when `fut` never completes.
pub(crate) async fn within<F: Future>(fut: F) -> F::Output {
    tokio::time::timeout(TEST_TIMEOUT, fut).await.expect("test step timed out")
}

/// A running mocker and the nodes it drives.
pub(crate) struct Network {
    pub mocker: Arc<ClMocker>,
    pub nodes: Vec<MockExecutionNode>,
    pub clients: Vec<Arc<ExecutionClient>>,
    pub driver: JoinHandle<Result<(), MockerError>>,
}

impl Network {
    /// Registers one node per name, all at total difficulty `td`, and starts the mocker.
    pub(crate) async fn start(names: &[&str], td: u64, config: MockerConfig) -> Self {
        let nodes: Vec<_> =
            names.iter().map(|name| MockExecutionNode::with_difficulty(*name, td)).collect();
        Self::start_with(nodes, config).await
    }

    pub(crate) async fn start_with(nodes: Vec<MockExecutionNode>, config: MockerConfig) -> Self {
        let mocker = Arc::new(ClMocker::new(config));
        let mut clients = Vec::with_capacity(nodes.len());
        for node in &nodes {
            let client = node.client();
            mocker.register_client(client.clone()).await;
            clients.push(client);
        }
        let driver = tokio::spawn({
            let mocker = mocker.clone();
            async move { mocker.run().await }
        });
        Self { mocker, nodes, clients, driver }
    }

    pub(crate) fn node(&self, name: &str) -> &MockExecutionNode {
        self.nodes.iter().find(|n| n.name() == name).expect("unknown node")
    }

    pub(crate) fn client(&self, name: &str) -> &Arc<ExecutionClient> {
        self.clients.iter().find(|c| c.name() == name).expect("unknown client")
    }

    /// Result of the run once it ended on its own.
    pub(crate) async fn outcome(self) -> Result<(), MockerError> {
        within(self.driver).await.expect("driver task panicked")
    }

    /// Stops the mocker and waits for the driver to finish.
    pub(crate) async fn shutdown(self) -> Result<(), MockerError> {
        self.mocker.stop();
        self.outcome().await
    }
}
