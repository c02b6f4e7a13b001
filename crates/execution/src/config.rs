#![allow(missing_docs)]
use std::path::PathBuf;

use url::Url;

/// Defines the endpoint for the Engine API, which can be HTTP or IPC.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineApiEndpoint {
    Http(Url),
    Ipc(PathBuf),
}

/// Everything needed to connect to one execution client.
#[derive(Debug, Clone)]
pub struct ExecutionConfig {
    /// Name used in logs, e.g. the client implementation or container id.
    pub name: String,
    /// Engine API endpoints. The first one is used initially; the client rotates through the
    /// rest each time its transport is cycled.
    pub engine_api_endpoints: Vec<EngineApiEndpoint>,
    /// The URL for the standard Eth1 JSON-RPC endpoint (must be HTTP).
    pub eth1_rpc_url: Url,
    /// The JWT secret for authenticating HTTP Engine API connections.
    pub jwt_secret: [u8; 32],
}
