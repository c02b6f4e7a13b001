use std::{path::Path, sync::Arc};

use clap::Parser;
use clmock_consensus::{ClMocker, MockerConfig};
use clmock_execution::ExecutionClient;
use color_eyre::eyre::{self, eyre};
use tracing::{info, warn};

use crate::config::Config;

#[derive(Parser, Debug, Clone, Default, PartialEq)]
pub struct StartCmd {
    /// Stop after this many blocks past the terminal block (0 runs until Ctrl-C)
    #[clap(long, default_value_t = 0)]
    pub blocks: u64,
}

impl StartCmd {
    /// Connects to every configured client and runs the mocker.
    pub async fn run(&self, config: Config, config_file: &Path) -> eyre::Result<()> {
        let clients = config
            .clients
            .iter()
            .map(|client| -> eyre::Result<Arc<ExecutionClient>> {
                let execution = client.to_execution_config(config_file)?;
                Ok(Arc::new(ExecutionClient::new(execution)?))
            })
            .collect::<eyre::Result<Vec<_>>>()?;
        if clients.is_empty() {
            return Err(eyre!("no execution clients configured in {}", config_file.display()));
        }

        info!(clients = clients.len(), "Consensus-layer mock is starting...");
        start(config.mocker, clients, self.blocks).await?;
        info!("Consensus-layer mock has stopped");
        Ok(())
    }
}

/// Runs the mocker over `clients` until `blocks` blocks have been produced after the terminal
/// block, Ctrl-C is received, or block production fails.
pub async fn start(
    config: MockerConfig,
    clients: Vec<Arc<ExecutionClient>>,
    blocks: u64,
) -> eyre::Result<()> {
    let mocker = Arc::new(ClMocker::new(config));
    for client in clients {
        mocker.register_client(client).await;
    }

    let mut driver = tokio::spawn({
        let mocker = mocker.clone();
        async move { mocker.run().await }
    });

    let target = async {
        if blocks == 0 {
            return std::future::pending().await;
        }
        mocker.wait_for_terminal().await?;
        mocker.produce_blocks(blocks).await
    };

    tokio::select! {
        result = &mut driver => return Ok(result??),
        _ = tokio::signal::ctrl_c() => info!("Received Ctrl-C, stopping"),
        done = target => match done {
            Ok(()) => info!(blocks, "Produced requested blocks, stopping"),
            Err(e) => warn!(error = %e, "Block production ended early"),
        },
    }

    mocker.stop();
    driver.await??;
    Ok(())
}
