//! TCP listener for the tool server
//!
//! Accepts clients on the configured address and speaks newline-delimited
//! JSON with each of them. A connection handles one request at a time; a
//! long-running collect occupies its connection until done, so cancels come
//! in over a second connection.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::config::ServerConfig;
use crate::error::{HarvestrError, Result};
use crate::server::handler::ToolHandler;
use crate::server::messages::{ToolError, ToolRequest, ToolResponse};

/// Tool server accept loop
pub struct ToolServer {
    config: ServerConfig,
    handler: Arc<ToolHandler>,
    clients: Arc<RwLock<HashMap<u64, SocketAddr>>>,
    next_client_id: AtomicU64,
}

impl ToolServer {
    pub fn new(config: ServerConfig, handler: Arc<ToolHandler>) -> Self {
        Self {
            config,
            handler,
            clients: Arc::new(RwLock::new(HashMap::new())),
            next_client_id: AtomicU64::new(1),
        }
    }

    pub async fn client_count(&self) -> usize {
        self.clients.read().await.len()
    }

    /// Bind the configured address and serve until shutdown
    pub async fn run(&self, shutdown: CancellationToken) -> Result<()> {
        let addr = format!("{}:{}", self.config.bind_addr, self.config.listen_port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| HarvestrError::Config(format!("cannot bind {}: {}", addr, e)))?;
        tracing::info!(addr = %addr, "tool server listening");
        self.serve(listener, shutdown).await
    }

    /// Serve on an already-bound listener until shutdown
    pub async fn serve(&self, listener: TcpListener, shutdown: CancellationToken) -> Result<()> {
        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => self.accept_client(stream, peer, &shutdown).await,
                        Err(e) => {
                            tracing::warn!(error = %e, "accept failed");
                        }
                    }
                }
                _ = shutdown.cancelled() => {
                    tracing::info!("tool server shutting down");
                    break;
                }
            }
        }
        Ok(())
    }

    async fn accept_client(&self, stream: TcpStream, peer: SocketAddr, shutdown: &CancellationToken) {
        if self.client_count().await >= self.config.max_clients {
            tracing::warn!(peer = %peer, "rejecting client, at capacity");
            return;
        }

        let client_id = self.next_client_id.fetch_add(1, Ordering::Relaxed);
        self.clients.write().await.insert(client_id, peer);
        tracing::debug!(client_id, peer = %peer, "client connected");

        let handler = self.handler.clone();
        let clients = self.clients.clone();
        let shutdown = shutdown.child_token();

        tokio::spawn(async move {
            if let Err(e) = handle_client(stream, &handler, shutdown).await {
                tracing::debug!(client_id, error = %e, "client handler ended with error");
            }
            clients.write().await.remove(&client_id);
            tracing::debug!(client_id, "client disconnected");
        });
    }
}

/// Serve one client connection to EOF or shutdown
async fn handle_client(
    stream: TcpStream,
    handler: &ToolHandler,
    shutdown: CancellationToken,
) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    loop {
        tokio::select! {
            read = reader.read_line(&mut line) => {
                match read {
                    Ok(0) => break,
                    Ok(_) => {
                        let trimmed = line.trim();
                        if trimmed.is_empty() {
                            line.clear();
                            continue;
                        }

                        let response = match serde_json::from_str::<ToolRequest>(trimmed) {
                            Ok(request) => handler.dispatch(request).await,
                            Err(e) => {
                                // No usable request id on an undecodable line
                                ToolResponse::error(0, ToolError::parse_error(e.to_string()))
                            }
                        };

                        if write_response(&mut writer, &response).await.is_err() {
                            break;
                        }
                        line.clear();
                    }
                    Err(_) => break,
                }
            }
            _ = shutdown.cancelled() => break,
        }
    }

    Ok(())
}

async fn write_response(writer: &mut OwnedWriteHalf, response: &ToolResponse) -> std::io::Result<()> {
    let json = serde_json::to_string(response).unwrap_or_default();
    writer.write_all(json.as_bytes()).await?;
    writer.write_all(b"\n").await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JobsConfig;
    use crate::executor::{JobExecutor, MockBackend, MockBehavior};
    use crate::loot::LootStore;
    use crate::orchestrator::Orchestrator;
    use crate::server::messages::ErrorCode;
    use std::time::Duration;
    use tempfile::TempDir;

    async fn spawn_server(
        mock: MockBackend,
        dir: &TempDir,
        max_clients: usize,
    ) -> (SocketAddr, CancellationToken) {
        let executor = JobExecutor::new(Arc::new(mock), Duration::from_millis(200));
        let store = Arc::new(LootStore::open(dir.path()).unwrap());
        let orchestrator = Arc::new(Orchestrator::new(executor, store));
        let shutdown = CancellationToken::new();
        let handler = Arc::new(ToolHandler::new(
            orchestrator,
            JobsConfig::default(),
            shutdown.clone(),
        ));

        let config = ServerConfig {
            max_clients,
            ..ServerConfig::default()
        };
        let server = ToolServer::new(config, handler);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let serve_shutdown = shutdown.clone();
        tokio::spawn(async move { server.serve(listener, serve_shutdown).await });

        (addr, shutdown)
    }

    async fn send_line(writer: &mut tokio::net::tcp::OwnedWriteHalf, line: &str) {
        writer.write_all(line.as_bytes()).await.unwrap();
        writer.write_all(b"\n").await.unwrap();
    }

    async fn read_response(reader: &mut BufReader<tokio::net::tcp::OwnedReadHalf>) -> ToolResponse {
        let mut line = String::new();
        reader.read_line(&mut line).await.unwrap();
        serde_json::from_str(&line).unwrap()
    }

    async fn roundtrip(addr: SocketAddr, request: &str) -> ToolResponse {
        let stream = TcpStream::connect(addr).await.unwrap();
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);
        write_half.write_all(request.as_bytes()).await.unwrap();
        write_half.write_all(b"\n").await.unwrap();
        read_response(&mut reader).await
    }

    #[tokio::test]
    async fn test_ping_over_tcp() {
        let dir = TempDir::new().unwrap();
        let (addr, shutdown) = spawn_server(
            MockBackend::new(MockBehavior::succeed("")),
            &dir,
            16,
        )
        .await;

        let response = roundtrip(addr, r#"{"id":1,"tool":"ping"}"#).await;
        assert_eq!(response.id, 1);
        assert_eq!(response.result.unwrap()["pong"], true);

        shutdown.cancel();
    }

    #[tokio::test]
    async fn test_malformed_json_gets_parse_error() {
        let dir = TempDir::new().unwrap();
        let (addr, shutdown) = spawn_server(
            MockBackend::new(MockBehavior::succeed("")),
            &dir,
            16,
        )
        .await;

        let response = roundtrip(addr, "this is not json").await;
        assert_eq!(response.id, 0);
        assert_eq!(response.error.unwrap().code, ErrorCode::PARSE_ERROR);

        shutdown.cancel();
    }

    #[tokio::test]
    async fn test_collect_over_tcp() {
        let dir = TempDir::new().unwrap();
        let (addr, shutdown) = spawn_server(
            MockBackend::new(MockBehavior::succeed("[SAM] admin:hash")),
            &dir,
            16,
        )
        .await;

        let response = roundtrip(
            addr,
            r#"{"id":3,"tool":"collect","args":{"targets":"10.0.0.1,10.0.0.2"}}"#,
        )
        .await;
        assert_eq!(response.id, 3);
        let result = response.result.unwrap();
        assert_eq!(result["status"], "All-Succeeded");
        assert_eq!(result["results"].as_array().unwrap().len(), 2);

        shutdown.cancel();
    }

    #[tokio::test]
    async fn test_requests_on_one_connection_are_sequential() {
        let dir = TempDir::new().unwrap();
        let (addr, shutdown) = spawn_server(
            MockBackend::new(MockBehavior::succeed("")),
            &dir,
            16,
        )
        .await;

        let stream = TcpStream::connect(addr).await.unwrap();
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);

        // Two pipelined requests come back in order, one response each
        write_half
            .write_all(b"{\"id\":1,\"tool\":\"ping\"}\n{\"id\":2,\"tool\":\"ping\"}\n")
            .await
            .unwrap();

        assert_eq!(read_response(&mut reader).await.id, 1);
        assert_eq!(read_response(&mut reader).await.id, 2);

        shutdown.cancel();
    }

    #[tokio::test]
    async fn test_cancel_from_second_connection() {
        let dir = TempDir::new().unwrap();
        let mock = MockBackend::new(MockBehavior::Hang {
            partial: "[SAM] partial:cred\n".to_string(),
        });
        let (addr, shutdown) = spawn_server(mock, &dir, 16).await;

        // First connection starts a slow collect
        let stream = TcpStream::connect(addr).await.unwrap();
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);
        send_line(
            &mut write_half,
            r#"{"id":10,"tool":"collect","args":{"targets":"10.0.0.1"}}"#,
        )
        .await;

        // Second connection cancels it once it is in flight
        tokio::time::sleep(Duration::from_millis(150)).await;
        let cancel = roundtrip(addr, r#"{"id":11,"tool":"cancel","args":{"requestId":10}}"#).await;
        assert_eq!(cancel.result.unwrap()["cancelled"], true);

        let response = read_response(&mut reader).await;
        assert_eq!(response.id, 10);
        let result = response.result.unwrap();
        assert_eq!(result["results"][0]["state"], "Cancelled");
        // Partial output claimed before teardown
        assert_eq!(result["results"][0]["lootCount"], 1);

        shutdown.cancel();
    }

    #[tokio::test]
    async fn test_client_limit_rejects_excess_connections() {
        let dir = TempDir::new().unwrap();
        let (addr, shutdown) = spawn_server(
            MockBackend::new(MockBehavior::succeed("")),
            &dir,
            1,
        )
        .await;

        // First client occupies the only slot
        let stream = TcpStream::connect(addr).await.unwrap();
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);
        write_half
            .write_all(b"{\"id\":1,\"tool\":\"ping\"}\n")
            .await
            .unwrap();
        assert!(read_response(&mut reader).await.is_success());

        // Second client is dropped without a response
        let mut second = TcpStream::connect(addr).await.unwrap();
        second
            .write_all(b"{\"id\":2,\"tool\":\"ping\"}\n")
            .await
            .unwrap();
        let mut buf = Vec::new();
        let read = tokio::io::AsyncReadExt::read_to_end(&mut second, &mut buf).await;
        assert!(matches!(read, Ok(0)));

        shutdown.cancel();
    }

    #[tokio::test]
    async fn test_shutdown_stops_accepting() {
        let dir = TempDir::new().unwrap();
        let (addr, shutdown) = spawn_server(
            MockBackend::new(MockBehavior::succeed("")),
            &dir,
            16,
        )
        .await;

        shutdown.cancel();
        tokio::time::sleep(Duration::from_millis(50)).await;

        // Either the connect fails outright or the connection is never served
        if let Ok(mut stream) = TcpStream::connect(addr).await {
            stream
                .write_all(b"{\"id\":1,\"tool\":\"ping\"}\n")
                .await
                .ok();
            let mut buf = Vec::new();
            let read = tokio::io::AsyncReadExt::read_to_end(&mut stream, &mut buf).await;
            assert!(matches!(read, Ok(0) | Err(_)));
        }
    }
}
