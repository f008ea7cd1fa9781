//! In-process fixture registry for pull tests.
//!
//! Serves canned responses over plain HTTP on a loopback port and records
//! every request it receives.

#![allow(dead_code, clippy::expect_used, clippy::unwrap_used)]

use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};

use hatch_common::config::RegistryConfig;
use hatch_common::types::Digest;
use sha2::{Digest as _, Sha256};

/// A canned response for one request target.
#[derive(Debug, Clone)]
pub struct Route {
    /// Path, optionally with query string. A route without `?` matches any query.
    pub path: String,
    /// HTTP status to answer with.
    pub status: u16,
    /// Response body.
    pub body: Vec<u8>,
}

impl Route {
    pub fn ok(path: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            path: path.into(),
            status: 200,
            body: body.into(),
        }
    }

    pub fn status(path: impl Into<String>, status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            path: path.into(),
            status,
            body: body.into(),
        }
    }
}

/// A request seen by the fixture.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub target: String,
    pub authorization: Option<String>,
    pub accept: Option<String>,
}

impl Recorded {
    pub fn path(&self) -> &str {
        self.target.split('?').next().unwrap_or(&self.target)
    }
}

/// Loopback HTTP server answering from a fixed route table.
pub struct FixtureRegistry {
    url: String,
    requests: Arc<Mutex<Vec<Recorded>>>,
}

impl FixtureRegistry {
    pub fn start(routes: Vec<Route>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind fixture registry");
        let url = format!("http://{}", listener.local_addr().expect("local addr"));
        let requests = Arc::new(Mutex::new(Vec::new()));

        let recorded = Arc::clone(&requests);
        let _ = std::thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { continue };
                serve(stream, &routes, &recorded);
            }
        });

        Self { url, requests }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Registry configuration pointing both endpoints at this fixture.
    pub fn config(&self) -> RegistryConfig {
        RegistryConfig {
            url: self.url.clone(),
            auth_url: self.url.clone(),
            ..RegistryConfig::default()
        }
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    pub fn count(&self, path_prefix: &str) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.path().starts_with(path_prefix))
            .count()
    }
}

fn serve(stream: TcpStream, routes: &[Route], recorded: &Mutex<Vec<Recorded>>) {
    let mut reader = BufReader::new(stream.try_clone().expect("clone stream"));
    let mut request_line = String::new();
    if reader.read_line(&mut request_line).is_err() {
        return;
    }
    let target = request_line
        .split_whitespace()
        .nth(1)
        .unwrap_or("/")
        .to_string();

    let mut authorization = None;
    let mut accept = None;
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).unwrap_or(0) == 0 {
            break;
        }
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            match name.trim().to_ascii_lowercase().as_str() {
                "authorization" => authorization = Some(value.trim().to_string()),
                "accept" => accept = Some(value.trim().to_string()),
                _ => {}
            }
        }
    }

    recorded.lock().unwrap().push(Recorded {
        target: target.clone(),
        authorization,
        accept,
    });

    let path = target.split('?').next().unwrap_or(&target);
    let route = routes
        .iter()
        .find(|r| r.path == target || (!r.path.contains('?') && r.path == path));
    let (status, body) = route.map_or((404, b"not found".to_vec()), |r| (r.status, r.body.clone()));

    let mut stream = stream;
    let head = format!(
        "HTTP/1.1 {status} {}\r\nContent-Length: {}\r\nContent-Type: application/octet-stream\r\nConnection: close\r\n\r\n",
        if status == 200 { "OK" } else { "Error" },
        body.len()
    );
    let _ = stream.write_all(head.as_bytes());
    let _ = stream.write_all(&body);
    let _ = stream.flush();
}

/// Builds a gzip-compressed tar layer from `(path, content)` pairs.
pub fn layer(files: &[(&str, &[u8])]) -> Vec<u8> {
    let encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for (path, content) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        builder
            .append_data(&mut header, path, *content)
            .expect("append layer file");
    }
    builder
        .into_inner()
        .expect("finish tar")
        .finish()
        .expect("finish gzip")
}

/// SHA-256 digest of `data`.
pub fn digest_of(data: &[u8]) -> Digest {
    let hex = Sha256::digest(data)
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect::<String>();
    Digest::from_hex(hex).expect("digest")
}

/// Manifest JSON listing `layers` in order.
pub fn manifest_for(layers: &[Vec<u8>]) -> String {
    let layers = layers
        .iter()
        .map(|blob| {
            serde_json::json!({
                "mediaType": "application/vnd.docker.image.rootfs.diff.tar.gzip",
                "size": blob.len(),
                "digest": digest_of(blob).to_string(),
            })
        })
        .collect::<Vec<_>>();
    serde_json::json!({
        "schemaVersion": 2,
        "mediaType": "application/vnd.docker.distribution.manifest.v2+json",
        "config": {
            "mediaType": "application/vnd.docker.container.image.v1+json",
            "size": 2,
            "digest": digest_of(b"{}").to_string(),
        },
        "layers": layers,
    })
    .to_string()
}

pub const TOKEN: &str = "fixture-token";

/// Routes for a complete pull of `library/<image>:latest`.
pub fn image_routes(image: &str, layers: &[Vec<u8>]) -> Vec<Route> {
    let mut routes = vec![
        Route::ok(
            "/token",
            format!(
                r#"{{"token":"{TOKEN}","expires_in":300,"issued_at":"2026-01-01T00:00:00Z"}}"#
            ),
        ),
        Route::ok(
            format!("/v2/library/{image}/manifests/latest"),
            manifest_for(layers),
        ),
    ];
    for blob in layers {
        routes.push(Route::ok(
            format!("/v2/library/{image}/blobs/{}", digest_of(blob)),
            blob.clone(),
        ));
    }
    routes
}
