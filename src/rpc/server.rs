//! RPC transport.
//!
//! # Responsibilities
//! - Accept TCP connections up to `rpc.max_connections`
//! - Read one request per line, dispatch by service name, write one response per line
//! - Close a connection whose request line exceeds `rpc.max_frame_bytes`
//! - Stop gracefully: stop accepting, let in-flight calls finish, reject new ones
//!
//! # Design Decisions
//! - Graceful stop has no timeout of its own; a call that never returns blocks it
//! - Calls on one connection are served in order; connections run concurrently

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use futures_util::StreamExt;
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, LinesCodec, LinesCodecError};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::config::RpcConfig;
use crate::net::connection::{CallTracker, ConnectionId};
use crate::net::listener::{ConnectionPermit, Listener, ListenerError};
use crate::observability::metrics;
use crate::rpc::protocol::{RpcError, RpcRequest, RpcResponse};

/// One named service reachable over RPC.
#[async_trait]
pub trait RpcService: Send + Sync {
    fn name(&self) -> &'static str;

    async fn call(&self, method: &str, params: Value) -> Result<Value, RpcError>;
}

type Registry = HashMap<&'static str, Arc<dyn RpcService>>;

/// State shared by the accept loop and every connection.
struct Shared {
    services: Registry,
    max_frame_bytes: usize,
    calls: CallTracker,
    stopping: AtomicBool,
    /// Cancelled once in-flight calls drained; idle connections close.
    closing: CancellationToken,
}

pub struct RpcServer {
    config: RpcConfig,
    shared: Arc<Shared>,
    accepting: CancellationToken,
    connections: TaskTracker,
    accept_task: Mutex<Option<JoinHandle<()>>>,
    local_addr: OnceLock<SocketAddr>,
}

impl RpcServer {
    pub fn new(config: &RpcConfig, services: Vec<Arc<dyn RpcService>>) -> Self {
        let services = services.into_iter().map(|s| (s.name(), s)).collect();
        Self {
            config: config.clone(),
            shared: Arc::new(Shared {
                services,
                max_frame_bytes: config.max_frame_bytes,
                calls: CallTracker::new(),
                stopping: AtomicBool::new(false),
                closing: CancellationToken::new(),
            }),
            accepting: CancellationToken::new(),
            connections: TaskTracker::new(),
            accept_task: Mutex::new(None),
            local_addr: OnceLock::new(),
        }
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr.get().copied()
    }

    /// Number of calls currently being served.
    pub fn in_flight(&self) -> u64 {
        self.shared.calls.active()
    }

    /// Bind and spawn the accept loop.
    pub async fn start(&self) -> Result<SocketAddr, ListenerError> {
        let mut accept_task = self.accept_task.lock().await;
        if let Some(addr) = self.local_addr() {
            return Ok(addr);
        }

        let listener = Listener::bind(&self.config.bind_address(), self.config.max_connections).await?;
        let addr = listener
            .local_addr()
            .map_err(|source| ListenerError::Bind {
                address: self.config.bind_address(),
                source,
            })?;
        let _ = self.local_addr.set(addr);

        let shared = Arc::clone(&self.shared);
        let accepting = self.accepting.clone();
        let connections = self.connections.clone();
        *accept_task = Some(tokio::spawn(async move {
            loop {
                let accepted = tokio::select! {
                    _ = accepting.cancelled() => break,
                    accepted = listener.accept() => accepted,
                };
                match accepted {
                    Ok((stream, peer, permit)) => {
                        connections.spawn(serve_connection(stream, peer, permit, Arc::clone(&shared)));
                    }
                    Err(ListenerError::Closed) => break,
                    Err(e) => tracing::warn!(error = %e, "RPC accept failed"),
                }
            }
            tracing::debug!("RPC accept loop exited");
        }));

        tracing::info!(address = %addr, services = self.shared.services.len(), "RPC transport listening");
        Ok(addr)
    }

    /// Stop accepting, wait for in-flight calls, then close every connection.
    pub async fn stop(&self) {
        self.shared.stopping.store(true, Ordering::SeqCst);
        self.accepting.cancel();
        if let Some(task) = self.accept_task.lock().await.take() {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "RPC accept loop ended abnormally");
            }
        }

        let pending = self.shared.calls.active();
        if pending > 0 {
            tracing::info!(pending, "Waiting for in-flight RPC calls");
        }
        self.shared.calls.wait_for_drain().await;

        self.shared.closing.cancel();
        self.connections.close();
        self.connections.wait().await;
        tracing::info!("RPC transport stopped");
    }
}

async fn serve_connection(stream: TcpStream, peer: SocketAddr, _permit: ConnectionPermit, shared: Arc<Shared>) {
    let id = ConnectionId::new();
    tracing::debug!(connection_id = %id, %peer, "RPC connection opened");

    let (read, mut write) = stream.into_split();
    let mut lines = FramedRead::new(read, LinesCodec::new_with_max_length(shared.max_frame_bytes));
    loop {
        let line = tokio::select! {
            _ = shared.closing.cancelled() => break,
            line = lines.next() => line,
        };
        let line = match line {
            Some(Ok(line)) => line,
            None => break,
            Some(Err(LinesCodecError::MaxLineLengthExceeded)) => {
                tracing::warn!(connection_id = %id, %peer, limit = shared.max_frame_bytes, "RPC request line too long");
                let limit = shared.max_frame_bytes;
                let response = RpcResponse::err(Value::Null, &RpcError::FrameTooLarge { limit });
                // The connection closes either way.
                let _ = write_response(&mut write, &response).await;
                break;
            }
            Some(Err(e)) => {
                tracing::debug!(connection_id = %id, error = %e, "RPC read failed");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        // Tracked before the stopping check so stop() either waits for this
        // call or the call sees the flag.
        let guard = shared.calls.track();
        let response = if shared.stopping.load(Ordering::SeqCst) {
            RpcResponse::err(request_id(&line), &RpcError::Unavailable)
        } else {
            dispatch(&shared.services, &line).await
        };

        let written = write_response(&mut write, &response).await;
        drop(guard);
        if let Err(e) = written {
            tracing::debug!(connection_id = %id, error = %e, "RPC write failed");
            break;
        }
    }

    tracing::debug!(connection_id = %id, "RPC connection closed");
}

async fn write_response(write: &mut OwnedWriteHalf, response: &RpcResponse) -> std::io::Result<()> {
    let mut encoded = serde_json::to_string(response)?;
    encoded.push('\n');
    write.write_all(encoded.as_bytes()).await
}

fn request_id(line: &str) -> Value {
    serde_json::from_str::<Value>(line)
        .ok()
        .and_then(|v| v.get("id").cloned())
        .unwrap_or(Value::Null)
}

async fn dispatch(services: &Registry, line: &str) -> RpcResponse {
    let request: RpcRequest = match serde_json::from_str(line) {
        Ok(request) => request,
        Err(e) => return RpcResponse::err(request_id(line), &RpcError::Parse(e.to_string())),
    };

    let Some(service) = services.get(request.service.as_str()) else {
        metrics::record_rpc_call(&request.service, &request.method, false);
        return RpcResponse::err(request.id, &RpcError::UnknownService(request.service));
    };

    let outcome = service.call(&request.method, request.params).await;
    metrics::record_rpc_call(service.name(), &request.method, outcome.is_ok());
    match outcome {
        Ok(result) => RpcResponse::ok(request.id, result),
        Err(e) => {
            tracing::debug!(service = service.name(), method = %request.method, error = %e, "RPC call failed");
            RpcResponse::err(request.id, &e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use tokio::io::{AsyncBufReadExt, BufReader};
    use tokio::sync::Notify;

    /// `echo` returns its params; `sleep` waits for a release before answering.
    struct Sampler {
        entered: Arc<Notify>,
        release: Arc<Notify>,
    }

    #[async_trait]
    impl RpcService for Sampler {
        fn name(&self) -> &'static str {
            "sample"
        }

        async fn call(&self, method: &str, params: Value) -> Result<Value, RpcError> {
            match method {
                "echo" => Ok(params),
                "sleep" => {
                    self.entered.notify_one();
                    self.release.notified().await;
                    Ok(json!("slept"))
                }
                _ => Err(RpcError::UnknownMethod {
                    service: "sample".into(),
                    method: method.into(),
                }),
            }
        }
    }

    struct Client {
        lines: tokio::io::Lines<BufReader<tokio::net::tcp::OwnedReadHalf>>,
        write: tokio::net::tcp::OwnedWriteHalf,
    }

    impl Client {
        async fn connect(addr: SocketAddr) -> Self {
            let stream = TcpStream::connect(("127.0.0.1", addr.port())).await.unwrap();
            let (read, write) = stream.into_split();
            Self {
                lines: BufReader::new(read).lines(),
                write,
            }
        }

        async fn send(&mut self, request: Value) {
            let mut line = request.to_string();
            line.push('\n');
            self.write.write_all(line.as_bytes()).await.unwrap();
        }

        async fn recv(&mut self) -> Option<RpcResponse> {
            let line = self.lines.next_line().await.unwrap()?;
            Some(serde_json::from_str(&line).unwrap())
        }
    }

    fn server() -> (RpcServer, Arc<Notify>, Arc<Notify>) {
        server_with_limit(1_048_576)
    }

    fn server_with_limit(max_frame_bytes: usize) -> (RpcServer, Arc<Notify>, Arc<Notify>) {
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let sampler = Sampler {
            entered: Arc::clone(&entered),
            release: Arc::clone(&release),
        };
        let config = RpcConfig {
            host: "127.0.0.1".into(),
            port: 0,
            max_connections: 8,
            max_frame_bytes,
        };
        (RpcServer::new(&config, vec![Arc::new(sampler)]), entered, release)
    }

    #[tokio::test]
    async fn dispatches_by_service_and_reports_errors() {
        let (server, _, _) = server();
        let addr = server.start().await.unwrap();
        let mut client = Client::connect(addr).await;

        client.send(json!({ "id": 1, "service": "sample", "method": "echo", "params": { "x": 1 } })).await;
        let response = client.recv().await.unwrap();
        assert_eq!(response.id, json!(1));
        assert_eq!(response.result, Some(json!({ "x": 1 })));

        client.send(json!({ "id": 2, "service": "billing", "method": "charge" })).await;
        assert_eq!(client.recv().await.unwrap().error.unwrap().code, -32601);

        client.write.write_all(b"{not json\n").await.unwrap();
        assert_eq!(client.recv().await.unwrap().error.unwrap().code, -32700);

        server.stop().await;
    }

    #[tokio::test]
    async fn in_flight_call_finishes_across_stop() {
        let (server, entered, release) = server();
        let addr = server.start().await.unwrap();
        let server = Arc::new(server);

        let mut slow = Client::connect(addr).await;
        let mut other = Client::connect(addr).await;
        other.send(json!({ "id": 1, "service": "sample", "method": "echo" })).await;
        assert!(other.recv().await.unwrap().error.is_none());

        slow.send(json!({ "id": 7, "service": "sample", "method": "sleep" })).await;
        entered.notified().await;
        assert_eq!(server.in_flight(), 1);

        let stopping = tokio::spawn({
            let server = Arc::clone(&server);
            async move { server.stop().await }
        });
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!stopping.is_finished(), "stop must wait for the in-flight call");

        // New calls on an open connection are turned away while draining.
        other.send(json!({ "id": 8, "service": "sample", "method": "echo" })).await;
        let rejected = other.recv().await.unwrap();
        assert_eq!(rejected.error.unwrap().code, RpcError::Unavailable.code());

        release.notify_one();
        let finished = slow.recv().await.unwrap();
        assert_eq!(finished.id, json!(7));
        assert_eq!(finished.result, Some(json!("slept")));

        tokio::time::timeout(Duration::from_secs(2), stopping)
            .await
            .unwrap()
            .unwrap();
        assert!(TcpStream::connect(("127.0.0.1", addr.port())).await.is_err());
    }

    #[tokio::test]
    async fn oversized_line_gets_an_error_then_the_connection_closes() {
        let (server, _, _) = server_with_limit(64);
        let addr = server.start().await.unwrap();

        let mut client = Client::connect(addr).await;
        client.send(json!({ "id": 1, "service": "sample", "method": "echo" })).await;
        assert!(client.recv().await.unwrap().error.is_none());

        let mut long = "x".repeat(256);
        long.push('\n');
        client.write.write_all(long.as_bytes()).await.unwrap();
        let rejected = client.recv().await.unwrap();
        assert_eq!(rejected.id, Value::Null);
        assert_eq!(rejected.error.unwrap().code, -32600);
        assert!(client.recv().await.is_none());

        // Other connections are unaffected.
        let mut fresh = Client::connect(addr).await;
        fresh.send(json!({ "id": 2, "service": "sample", "method": "echo", "params": [1] })).await;
        assert_eq!(fresh.recv().await.unwrap().result, Some(json!([1])));

        server.stop().await;
    }
}
