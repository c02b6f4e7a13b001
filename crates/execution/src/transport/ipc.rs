#![allow(missing_docs)]
use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use async_trait::async_trait;
use color_eyre::eyre;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::UnixStream,
};

use super::{JsonRpcRequest, JsonRpcResponse, Transport};

// Matches the HTTP transport; payload building on a loaded client can take several seconds.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub struct IpcTransport {
    path: PathBuf,
}

impl IpcTransport {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self { path: path.as_ref().to_path_buf() }
    }

    async fn connect(&self) -> eyre::Result<UnixStream> {
        let stream_future = UnixStream::connect(&self.path);
        let stream = tokio::time::timeout(REQUEST_TIMEOUT, stream_future).await??;
        Ok(stream)
    }
}

#[async_trait]
impl Transport for IpcTransport {
    async fn send(&self, req: &JsonRpcRequest) -> eyre::Result<JsonRpcResponse> {
        // One connection per request, half-closed after the write so the server answers and
        // closes its side; the response is then read to EOF.
        let mut stream = self.connect().await?;

        let req_bytes = serde_json::to_vec(req)?;
        tokio::time::timeout(REQUEST_TIMEOUT, stream.write_all(&req_bytes)).await??;
        tokio::time::timeout(REQUEST_TIMEOUT, stream.shutdown()).await??;

        let mut resp_bytes = Vec::new();
        tokio::time::timeout(REQUEST_TIMEOUT, stream.read_to_end(&mut resp_bytes)).await??;

        serde_json::from_slice(&resp_bytes).map_err(|e| e.into())
    }

    fn kind(&self) -> &'static str {
        "ipc"
    }
}

#[cfg(test)]
mod tests {
    use tokio::net::UnixListener;

    use super::*;

    #[tokio::test]
    async fn round_trips_a_request_over_a_unix_socket() {
        let dir = std::env::temp_dir().join(format!("clmock-ipc-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("engine.ipc");
        let _ = std::fs::remove_file(&path);
        let listener = UnixListener::bind(&path).unwrap();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            socket.read_to_end(&mut buf).await.unwrap();
            let req: serde_json::Value = serde_json::from_slice(&buf).unwrap();
            let resp = serde_json::json!({
                "jsonrpc": "2.0",
                "id": req["id"],
                "result": "0x2a",
            });
            socket.write_all(&serde_json::to_vec(&resp).unwrap()).await.unwrap();
            req["method"].as_str().unwrap().to_string()
        });

        let transport = IpcTransport::new(&path);
        let resp = transport
            .send(&JsonRpcRequest::new("eth_blockNumber", serde_json::json!([])))
            .await
            .unwrap();

        assert_eq!(resp.result, Some(serde_json::json!("0x2a")));
        assert_eq!(server.await.unwrap(), "eth_blockNumber");
        let _ = std::fs::remove_file(&path);
    }
}
