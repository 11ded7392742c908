//! Test server harness for objdav integration tests.
//!
//! Provides a `TestServer` running an `ObjDavServer` over a seeded
//! `MemoryBackend`, along with HTTP convenience methods.

#![allow(dead_code)]

use objdav_tree::{MemoryBackend, NodeRegistry, TreeMutator};
use objdav_webdav::{ObjDavServer, ServerConfig};
use reqwest::{Client, Method, Response, StatusCode};
use std::sync::Arc;
use std::time::Duration;

/// Percent-encode a path for use in Destination headers.
fn url_encode_path(path: &str) -> String {
    let mut result = String::with_capacity(path.len() * 3);
    for byte in path.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b'.' | b'~' | b'/') {
            result.push(byte as char);
        } else {
            result.push_str(&format!("%{byte:02X}"));
        }
    }
    result
}

/// Running server with an HTTP client.
pub struct TestServer {
    server: ObjDavServer,
    client: Client,
    pub store: Arc<MemoryBackend>,
    pub registry: Arc<NodeRegistry>,
    pub base_url: String,
}

impl TestServer {
    /// Start a server over a store seeded with `paths` (trailing `/` for
    /// directories).
    pub async fn with_paths(paths: &[&str]) -> Self {
        let store = Arc::new(MemoryBackend::new());
        for path in paths {
            store.seed(path).expect("Failed to seed store");
        }
        let registry = NodeRegistry::new(store.clone(), store.root_real_path()).into_shared();
        let mutator = TreeMutator::new(store.clone(), registry.clone());

        let server = ObjDavServer::start(mutator, ServerConfig::default())
            .await
            .expect("Failed to start server");
        let base_url = server.url();
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        let test_server = Self {
            server,
            client,
            store,
            registry,
            base_url,
        };
        test_server.wait_ready().await;
        test_server
    }

    async fn wait_ready(&self) {
        for _ in 0..50 {
            if let Ok(resp) = self
                .client
                .request(Method::OPTIONS, &self.base_url)
                .send()
                .await
                && resp.status().is_success()
            {
                return;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        panic!("Server did not become ready in time");
    }

    /// Build a full URL from a path.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, url_encode_path(path))
    }

    /// Send a request with an arbitrary method and optional headers.
    pub async fn request(&self, method: &str, path: &str, headers: &[(&str, &str)]) -> Response {
        let mut builder = self
            .client
            .request(Method::from_bytes(method.as_bytes()).unwrap(), self.url(path));
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.send().await.expect("request failed")
    }

    /// COPY with an absolute-URI Destination.
    pub async fn copy(&self, from: &str, to: &str, overwrite: Option<&str>) -> Response {
        self.transfer("COPY", from, to, overwrite).await
    }

    /// MOVE with an absolute-URI Destination.
    pub async fn move_(&self, from: &str, to: &str, overwrite: Option<&str>) -> Response {
        self.transfer("MOVE", from, to, overwrite).await
    }

    async fn transfer(&self, method: &str, from: &str, to: &str, overwrite: Option<&str>) -> Response {
        let destination = self.url(to);
        let mut headers = vec![("Destination", destination.as_str())];
        if let Some(value) = overwrite {
            headers.push(("Overwrite", value));
        }
        self.request(method, from, &headers).await
    }

    /// Assert a response status, showing the body on failure.
    pub async fn assert_status(resp: Response, expected: StatusCode) {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        assert_eq!(status, expected, "unexpected status, body: {body}");
    }

    /// Stop the server explicitly (otherwise happens on drop).
    pub async fn stop(self) {
        self.server.stop().await;
    }
}
