//! Localhost control surface for the editor plugin: editor/workspace/config
//! events in, commands in, status and notifications out.

use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use tiny_http::{Method, Response, Server};
use url::Url;

use crate::notify::NotificationHub;
use crate::presence::PresenceManager;
use crate::settings::Settings;

pub const DEFAULT_PORT: u16 = 48732;

/// Cap on request bodies; editor events are tiny.
const MAX_BODY_BYTES: u64 = 64 * 1024;

/// CORS headers so webview-hosted editor clients can reach the bridge.
fn cors_headers() -> Vec<tiny_http::Header> {
    vec![
        tiny_http::Header::from_bytes(&b"Access-Control-Allow-Origin"[..], &b"*"[..]).unwrap(),
        tiny_http::Header::from_bytes(
            &b"Access-Control-Allow-Methods"[..],
            &b"GET, POST, OPTIONS"[..],
        )
        .unwrap(),
        tiny_http::Header::from_bytes(&b"Access-Control-Allow-Headers"[..], &b"Content-Type"[..])
            .unwrap(),
    ]
}

/// Helper to create a JSON response with CORS headers
fn json_response(status: u16, body: serde_json::Value) -> Response<std::io::Cursor<Vec<u8>>> {
    let mut response = Response::from_string(body.to_string())
        .with_header(
            tiny_http::Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]).unwrap(),
        )
        .with_status_code(status);

    for header in cors_headers() {
        response.add_header(header);
    }

    response
}

/// Helper to create an empty response for OPTIONS preflight requests
fn preflight_response() -> Response<std::io::Empty> {
    let mut response = Response::empty(204);
    for header in cors_headers() {
        response.add_header(header);
    }
    response
}

/// Active-editor-changed event payload.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct EditorFocus {
    file_name: Option<String>,
    language_id: Option<String>,
}

/// Workspace-folders-changed event payload.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct WorkspaceChange {
    workspace_name: Option<String>,
}

pub struct ControlServer {
    pub port: u16,
    server: Arc<Server>,
    stopped: Arc<AtomicBool>,
    worker: Option<thread::JoinHandle<()>>,
}

impl ControlServer {
    pub fn start(
        port: u16,
        manager: Arc<PresenceManager>,
        notifications: Arc<NotificationHub>,
        runtime: tokio::runtime::Handle,
    ) -> Result<Self, String> {
        let addr = format!("127.0.0.1:{}", port);
        let server = Server::http(addr.as_str())
            .map_err(|e| format!("Failed to start control server: {}", e))?;
        let server = Arc::new(server);

        let port = server
            .server_addr()
            .to_ip()
            .ok_or("Failed to get server address")?
            .port();

        tracing::info!("Control server listening on 127.0.0.1:{}", port);

        let stopped = Arc::new(AtomicBool::new(false));
        let worker = {
            let server = Arc::clone(&server);
            let stopped = Arc::clone(&stopped);
            thread::spawn(move || {
                Self::run_server(server, stopped, manager, notifications, runtime);
            })
        };

        Ok(Self {
            port,
            server,
            stopped,
            worker: Some(worker),
        })
    }

    /// Stop accepting requests and wait for the worker thread to exit.
    pub fn stop(mut self) {
        self.stopped.store(true, Ordering::SeqCst);
        self.server.unblock();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }

    fn run_server(
        server: Arc<Server>,
        stopped: Arc<AtomicBool>,
        manager: Arc<PresenceManager>,
        notifications: Arc<NotificationHub>,
        runtime: tokio::runtime::Handle,
    ) {
        loop {
            if stopped.load(Ordering::SeqCst) {
                break;
            }
            let request = match server.recv() {
                Ok(request) => request,
                Err(_) => break,
            };
            Self::handle_request(request, &manager, &notifications, &runtime);
        }
    }

    fn handle_request(
        mut request: tiny_http::Request,
        manager: &Arc<PresenceManager>,
        notifications: &Arc<NotificationHub>,
        runtime: &tokio::runtime::Handle,
    ) {
        // Handle CORS preflight requests
        if request.method() == &Method::Options {
            request.respond(preflight_response()).ok();
            return;
        }

        let full_url = format!("http://127.0.0.1{}", request.url());
        let url = match Url::parse(&full_url) {
            Ok(url) => url,
            Err(e) => {
                tracing::error!("Failed to parse control server URL: {}", e);
                let response = json_response(400, serde_json::json!({"error": e.to_string()}));
                request.respond(response).ok();
                return;
            }
        };

        let method = request.method().clone();
        let path = url.path().to_string();
        tracing::debug!("Control server received request: {} {}", method, path);

        let response = match (&method, path.as_str()) {
            (Method::Get, "/status") => {
                let report = runtime.block_on(manager.status());
                match serde_json::to_value(&report) {
                    Ok(body) => json_response(200, body),
                    Err(e) => json_response(500, serde_json::json!({"error": e.to_string()})),
                }
            }
            (Method::Get, "/notifications") => {
                let pending = notifications.drain();
                match serde_json::to_value(&pending) {
                    Ok(body) => json_response(200, body),
                    Err(e) => json_response(500, serde_json::json!({"error": e.to_string()})),
                }
            }
            (Method::Post, "/enable") => {
                let manager = Arc::clone(manager);
                runtime.spawn(async move { manager.enable().await });
                json_response(200, serde_json::json!({"status": "enabling"}))
            }
            (Method::Post, "/disable") => {
                let manager = Arc::clone(manager);
                runtime.spawn(async move { manager.disable().await });
                json_response(200, serde_json::json!({"status": "disabling"}))
            }
            (Method::Post, "/reconnect") => {
                let manager = Arc::clone(manager);
                runtime.spawn(async move { manager.reconnect().await });
                json_response(200, serde_json::json!({"status": "reconnecting"}))
            }
            (Method::Post, "/editor") => match read_json_body::<EditorFocus>(&mut request) {
                Ok(focus) => {
                    manager.set_active_editor(focus.file_name, focus.language_id);
                    let manager = Arc::clone(manager);
                    runtime.spawn(async move { manager.update_activity().await });
                    json_response(200, serde_json::json!({"status": "ok"}))
                }
                Err(e) => json_response(400, serde_json::json!({"error": e})),
            },
            (Method::Post, "/workspace") => match read_json_body::<WorkspaceChange>(&mut request) {
                Ok(change) => {
                    manager.set_workspace(change.workspace_name);
                    let manager = Arc::clone(manager);
                    runtime.spawn(async move { manager.update_activity().await });
                    json_response(200, serde_json::json!({"status": "ok"}))
                }
                Err(e) => json_response(400, serde_json::json!({"error": e})),
            },
            (Method::Post, "/settings") => match read_json_body::<Settings>(&mut request) {
                Ok(settings) => {
                    let manager = Arc::clone(manager);
                    runtime.spawn(async move { manager.apply_settings(settings).await });
                    json_response(200, serde_json::json!({"status": "applied"}))
                }
                Err(e) => json_response(400, serde_json::json!({"error": e})),
            },
            _ => json_response(404, serde_json::json!({"error": "Not found"})),
        };

        request.respond(response).ok();
    }
}

fn read_json_body<T: DeserializeOwned>(request: &mut tiny_http::Request) -> Result<T, String> {
    let mut body = String::new();
    request
        .as_reader()
        .take(MAX_BODY_BYTES)
        .read_to_string(&mut body)
        .map_err(|e| format!("Failed to read request body: {}", e))?;

    serde_json::from_str(&body).map_err(|e| format!("Invalid request body: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presence::testing::{MockBehavior, MockClient};
    use crate::settings::SettingsStore;
    use std::io::Write;
    use std::net::TcpStream;

    struct Rig {
        manager: Arc<PresenceManager>,
        hub: Arc<NotificationHub>,
        _dir: tempfile::TempDir,
    }

    fn rig() -> Rig {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(SettingsStore::load(dir.path().join("settings.json")));
        let (client, _state) = MockClient::with_behavior(MockBehavior::default());
        let hub = Arc::new(NotificationHub::new());
        let manager = Arc::new(PresenceManager::new(Box::new(client), store, hub.clone()));

        Rig {
            manager,
            hub,
            _dir: dir,
        }
    }

    fn request(port: u16, method: &str, path: &str, body: Option<&str>) -> (u16, String) {
        let mut stream = TcpStream::connect(("127.0.0.1", port)).unwrap();
        let body = body.unwrap_or("");
        let raw = format!(
            "{} {} HTTP/1.1\r\nHost: 127.0.0.1\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            method,
            path,
            body.len(),
            body
        );
        stream.write_all(raw.as_bytes()).unwrap();

        let mut response = String::new();
        stream.read_to_string(&mut response).unwrap();

        let status = response
            .split_whitespace()
            .nth(1)
            .and_then(|code| code.parse().ok())
            .unwrap_or(0);
        let payload = response
            .split_once("\r\n\r\n")
            .map(|(_, rest)| rest.to_string())
            .unwrap_or_default();
        (status, payload)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn editor_events_are_mirrored_into_status() {
        let rig = rig();
        let server = ControlServer::start(
            0,
            Arc::clone(&rig.manager),
            Arc::clone(&rig.hub),
            tokio::runtime::Handle::current(),
        )
        .unwrap();
        let port = server.port;

        let (status, _) = request(
            port,
            "POST",
            "/editor",
            Some(r#"{"fileName":"/work/app/src/main.rs","languageId":"rust"}"#),
        );
        assert_eq!(status, 200);

        let (status, _) = request(port, "POST", "/workspace", Some(r#"{"workspaceName":"app"}"#));
        assert_eq!(status, 200);

        let (status, body) = request(port, "GET", "/status", None);
        assert_eq!(status, 200);
        assert!(body.contains("\"fileName\":\"/work/app/src/main.rs\""));
        assert!(body.contains("\"workspaceName\":\"app\""));
        assert!(body.contains("\"connected\":false"));
        assert!(body.contains("\"enabled\":true"));

        server.stop();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn malformed_bodies_and_unknown_paths_are_rejected() {
        let rig = rig();
        let server = ControlServer::start(
            0,
            Arc::clone(&rig.manager),
            Arc::clone(&rig.hub),
            tokio::runtime::Handle::current(),
        )
        .unwrap();
        let port = server.port;

        let (status, body) = request(port, "POST", "/editor", Some("{not json"));
        assert_eq!(status, 400);
        assert!(body.contains("error"));

        let (status, _) = request(port, "GET", "/nope", None);
        assert_eq!(status, 404);

        server.stop();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn notifications_are_drained_once() {
        let rig = rig();
        let server = ControlServer::start(
            0,
            Arc::clone(&rig.manager),
            Arc::clone(&rig.hub),
            tokio::runtime::Handle::current(),
        )
        .unwrap();
        let port = server.port;

        // Connect without an application id queues the remediation warning.
        rig.manager.connect().await;

        let (status, body) = request(port, "GET", "/notifications", None);
        assert_eq!(status, 200);
        assert!(body.contains("\"warning\""));
        assert!(body.contains("\"openSettings\""));

        let (_, body) = request(port, "GET", "/notifications", None);
        assert_eq!(body.trim(), "[]");

        server.stop();
    }
}
