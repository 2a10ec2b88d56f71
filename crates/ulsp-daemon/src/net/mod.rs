//! Connection Host (§4.I): the TCP acceptor loop and per-connection
//! `InitSession`/`EndSession` lifecycle. One accepted connection becomes
//! one [`Session`](crate::session::Session); every framed request on it is
//! handed to [`router::handle`].

mod router;

use std::io;
use std::sync::Arc;

use tokio::io::BufReader;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::session::{Session, SessionContext};
use crate::Daemon;
use ulsp_protocol::methods;

/// Bind the configured address and run the accept loop until `shutdown_rx`
/// receives a signal (Idle Supervisor or `ulsp/requestFullShutdown` + `exit`).
/// Writes (and on return, removes) the server info file if configured.
pub async fn serve(daemon: Arc<Daemon>, mut shutdown_rx: mpsc::Receiver<()>) -> io::Result<()> {
    let listener = TcpListener::bind(&daemon.config.jsonrpc_address).await?;
    let local_addr = listener.local_addr()?;
    tracing::info!(address = %local_addr, "ulsp-daemon listening");
    write_server_info(&daemon, local_addr);

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(pair) => pair,
                    Err(e) => {
                        tracing::warn!(error = %e, "failed to accept connection");
                        continue;
                    }
                };
                let _ = stream.set_nodelay(true);
                tracing::debug!(peer = %peer, "connection accepted");
                let daemon = Arc::clone(&daemon);
                tokio::spawn(async move {
                    handle_connection(daemon, stream).await;
                });
            }
            _ = shutdown_rx.recv() => {
                tracing::info!("shutdown signal received; closing listener");
                break;
            }
        }
    }

    remove_server_info(&daemon);
    Ok(())
}

async fn handle_connection(daemon: Arc<Daemon>, stream: tokio::net::TcpStream) {
    let (read_half, write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let client = ulsp_transport::MessageWriter::new(
        Box::new(write_half) as Box<dyn tokio::io::AsyncWrite + Send + Unpin>
    );

    let session_id = Uuid::new_v4();
    let session = Arc::new(Session::new(session_id, client.clone(), Arc::clone(&daemon.gateway), daemon.config.max_file_size_bytes));
    daemon.gateway.register(session_id, client);
    daemon.sessions.set(Arc::clone(&session));
    daemon.idle.refresh();
    tracing::info!(session = %session_id, "session started");

    let ctx = SessionContext::new(session_id);
    loop {
        let request = match ulsp_transport::read_message(&mut reader).await {
            Ok(Some(request)) => request,
            Ok(None) => {
                tracing::debug!(session = %session_id, "connection closed by peer");
                break;
            }
            Err(e) => {
                tracing::warn!(session = %session_id, error = %e, "framing error; closing connection");
                break;
            }
        };

        let outcome = router::handle(&daemon, &session, ctx, request).await;
        if let Some(response) = outcome.response {
            if let Err(e) = session.client().send_response(&response).await {
                tracing::warn!(session = %session_id, error = %e, "failed to send response");
                break;
            }
        }
        if outcome.close {
            break;
        }
    }

    end_session(&daemon, ctx, session_id).await;
}

/// Tear down a session (§4.I). Fans the end-session method out to the
/// session's plugins first, while it's still registered in both the
/// Session Repository and the IDE Gateway, then removes all daemon-side
/// state for it.
async fn end_session(daemon: &Arc<Daemon>, ctx: SessionContext, session_id: Uuid) {
    router::dispatch_method(daemon, ctx, methods::ULSP_END_SESSION, serde_json::Value::Null).await;

    daemon.indexer.clean_session(session_id);
    daemon.diagnostics.clear_session(session_id);
    daemon.gateway.deregister(session_id);
    daemon.sessions.delete(session_id);
    daemon.idle.refresh();
    tracing::info!(session = %session_id, "session ended");
}

fn write_server_info(daemon: &Arc<Daemon>, addr: std::net::SocketAddr) {
    let Some(path) = &daemon.config.server_info_file_path else { return };
    let payload = serde_json::json!({ "lsp-address": addr.to_string() });
    match serde_json::to_vec_pretty(&payload) {
        Ok(bytes) => {
            if let Err(e) = std::fs::write(path, bytes) {
                tracing::warn!(path = %path.display(), error = %e, "failed to write server info file");
            }
        }
        Err(e) => tracing::warn!(error = %e, "failed to serialize server info"),
    }
}

fn remove_server_info(daemon: &Arc<Daemon>) {
    let Some(path) = &daemon.config.server_info_file_path else { return };
    if let Err(e) = std::fs::remove_file(path) {
        if e.kind() != io::ErrorKind::NotFound {
            tracing::warn!(path = %path.display(), error = %e, "failed to remove server info file");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    fn frame(method: &str, id: Option<i64>, params: serde_json::Value) -> Vec<u8> {
        let mut obj = serde_json::Map::new();
        obj.insert("jsonrpc".to_string(), serde_json::Value::String("2.0".to_string()));
        if let Some(id) = id {
            obj.insert("id".to_string(), serde_json::Value::from(id));
        }
        obj.insert("method".to_string(), serde_json::Value::String(method.to_string()));
        obj.insert("params".to_string(), params);
        let body = serde_json::to_vec(&serde_json::Value::Object(obj)).unwrap();
        let mut out = Vec::new();
        out.extend_from_slice(format!("Content-Length: {}\r\n\r\n", body.len()).as_bytes());
        out.extend_from_slice(&body);
        out
    }

    async fn read_one_response(stream: &mut TcpStream) -> serde_json::Value {
        let mut reader = BufReader::new(stream);
        let mut line = String::new();
        let mut content_length = 0usize;
        loop {
            line.clear();
            reader.read_line(&mut line).await.unwrap();
            let trimmed = line.trim_end_matches(['\r', '\n']);
            if trimmed.is_empty() {
                break;
            }
            if let Some(v) = trimmed.strip_prefix("Content-Length:") {
                content_length = v.trim().parse().unwrap();
            }
        }
        let mut body = vec![0u8; content_length];
        reader.read_exact(&mut body).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn a_full_connection_lifecycle_registers_and_tears_down_a_session() {
        let mut config = Config::default();
        config.jsonrpc_address = "127.0.0.1:0".to_string();
        let (daemon, shutdown_rx) = Daemon::new(config).unwrap();
        let daemon = Arc::new(daemon);

        let listener = TcpListener::bind(&daemon.config.jsonrpc_address).await.unwrap();
        let addr = listener.local_addr().unwrap();
        let daemon_for_accept = Arc::clone(&daemon);
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            handle_connection(daemon_for_accept, stream).await;
        });
        drop(shutdown_rx);

        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(&frame("initialize", Some(1), serde_json::json!({}))).await.unwrap();
        let response = read_one_response(&mut stream).await;
        assert_eq!(response["id"], serde_json::json!(1));
        assert!(response["result"]["capabilities"].is_object());

        assert_eq!(daemon.sessions.session_count(), 1);

        stream.write_all(&frame("shutdown", Some(2), serde_json::Value::Null)).await.unwrap();
        let response = read_one_response(&mut stream).await;
        assert_eq!(response["id"], serde_json::json!(2));

        stream.write_all(&frame("exit", None, serde_json::Value::Null)).await.unwrap();
        drop(stream);

        for _ in 0..50 {
            if daemon.sessions.session_count() == 0 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        assert_eq!(daemon.sessions.session_count(), 0);
    }

    #[tokio::test]
    async fn ending_a_session_dispatches_the_end_session_method_to_its_plugins() {
        use crate::plugin::test_support::RecordingPlugin;
        use crate::plugin::{PluginHandle, PluginStartupInfo, Priority};
        use std::collections::HashMap;

        let recording = RecordingPlugin::new(PluginStartupInfo {
            name: "teardown-watcher".to_string(),
            methods: vec![methods::ULSP_END_SESSION],
            priorities: HashMap::from([(methods::ULSP_END_SESSION, Priority::High)]),
            relevant_repos: None,
        });
        let plugin: PluginHandle = recording.clone();

        let mut config = Config::default();
        config.jsonrpc_address = "127.0.0.1:0".to_string();
        let (daemon, shutdown_rx) = Daemon::with_plugins(config, vec![plugin], None).unwrap();
        let daemon = Arc::new(daemon);

        let listener = TcpListener::bind(&daemon.config.jsonrpc_address).await.unwrap();
        let addr = listener.local_addr().unwrap();
        let daemon_for_accept = Arc::clone(&daemon);
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            handle_connection(daemon_for_accept, stream).await;
        });
        drop(shutdown_rx);

        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(&frame("initialize", Some(1), serde_json::json!({}))).await.unwrap();
        read_one_response(&mut stream).await;

        stream.write_all(&frame("exit", None, serde_json::Value::Null)).await.unwrap();
        drop(stream);

        for _ in 0..50 {
            if daemon.sessions.session_count() == 0 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        assert_eq!(daemon.sessions.session_count(), 0);
        assert_eq!(*recording.calls.lock(), vec!["teardown-watcher".to_string()]);
    }
}
