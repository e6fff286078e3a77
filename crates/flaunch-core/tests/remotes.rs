//! End-to-end tests of both remote backends over loopback TCP.

use async_trait::async_trait;
use flaunch_core::remote::{HttpConfig, RpcConfig};
use flaunch_core::{
    serve_until_interrupted, Config, Entry, EntryOptions, EntryRegistry, EntryVariant,
    HttpRemote, LaunchError, Remote, RemoteBackend, RemoteKind, Result, RpcRemote,
};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

const BUILD: &str = "remote-tests";

/// Writes the `note` option to `path` when launched remotely.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct WriteNote {
    path: PathBuf,
}

#[async_trait]
impl Entry for WriteNote {
    async fn launch_local(&self, _: &mut Config, _: &mut EntryOptions) -> Result<()> {
        Err(LaunchError::RemoteRequired)
    }

    async fn launch_remote(&self, options: &EntryOptions) -> Result<()> {
        let note = options.get("note").cloned().unwrap_or_default();
        tokio::fs::write(&self.path, note).await?;
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl EntryVariant for WriteNote {}

/// Always fails remotely.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Broken;

#[async_trait]
impl Entry for Broken {
    async fn launch_local(&self, _: &mut Config, _: &mut EntryOptions) -> Result<()> {
        Err(LaunchError::RemoteRequired)
    }

    async fn launch_remote(&self, _: &EntryOptions) -> Result<()> {
        Err(LaunchError::LaunchFailed {
            entry: "broken".to_string(),
            message: "refuses to start".to_string(),
        })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl EntryVariant for Broken {}

fn registry(build_version: &str) -> Arc<EntryRegistry> {
    let mut registry = EntryRegistry::with_build_version(build_version);
    registry.register::<WriteNote>().unwrap();
    registry.register::<Broken>().unwrap();
    Arc::new(registry)
}

fn backend(kind: RemoteKind, addr: &str, registry: Arc<EntryRegistry>) -> RemoteBackend {
    match kind {
        RemoteKind::Http => RemoteBackend::Http(HttpRemote::new(
            HttpConfig {
                addr: addr.to_string(),
            },
            registry,
        )),
        RemoteKind::Rpc => RemoteBackend::Rpc(RpcRemote::new(
            RpcConfig {
                addr: addr.to_string(),
            },
            registry,
        )),
    }
}

/// Start a server of `kind` on an ephemeral port.
async fn spawn_server(kind: RemoteKind) -> (String, JoinHandle<Result<()>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();

    let handle = match backend(kind, &addr, registry(BUILD)) {
        RemoteBackend::Http(remote) => tokio::spawn(async move { remote.serve(listener).await }),
        RemoteBackend::Rpc(remote) => tokio::spawn(async move { remote.serve(listener).await }),
    };
    (addr, handle)
}

/// An address nothing listens on.
fn free_addr() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().to_string()
}

async fn full_session(kind: RemoteKind) {
    let temp_dir = TempDir::new().unwrap();
    let (addr, server) = spawn_server(kind).await;
    let client = backend(kind, &addr, registry(BUILD));

    client.connect().await.unwrap();

    let note_path = temp_dir.path().join("note.txt");
    let entry = WriteNote {
        path: note_path.clone(),
    };
    let options = EntryOptions::from([("note".to_string(), "hello".to_string())]);
    client.handle_entry(&entry, &options).await.unwrap();
    assert_eq!(std::fs::read_to_string(&note_path).unwrap(), "hello");

    // a failed launch is reported and the server keeps running
    let err = client
        .handle_entry(&Broken, &EntryOptions::new())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("refuses to start"), "{}", err);
    client.connect().await.unwrap();

    client.close().await.unwrap();
    tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .expect("server must stop after close")
        .unwrap()
        .unwrap();

    assert!(client.connect().await.is_err());
    // closing a stopped remote succeeds
    client.close().await.unwrap();
}

#[tokio::test]
async fn test_http_full_session() {
    full_session(RemoteKind::Http).await;
}

#[tokio::test]
async fn test_rpc_full_session() {
    full_session(RemoteKind::Rpc).await;
}

#[tokio::test]
async fn test_envelope_from_another_build_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let entry = WriteNote {
        path: temp_dir.path().join("never"),
    };

    for kind in [RemoteKind::Http, RemoteKind::Rpc] {
        let (addr, server) = spawn_server(kind).await;
        let client = backend(kind, &addr, registry("another-build"));

        let err = client
            .handle_entry(&entry, &EntryOptions::new())
            .await
            .unwrap_err();
        match kind {
            RemoteKind::Http => {
                assert!(matches!(err, LaunchError::RemoteStatus { status: 400, .. }), "{}", err)
            }
            RemoteKind::Rpc => assert!(
                matches!(err, LaunchError::RemoteCall { code: -32001, .. }),
                "{}",
                err
            ),
        }
        assert!(!entry.path.exists());

        client.close().await.unwrap();
        server.await.unwrap().unwrap();
    }
}

#[tokio::test]
async fn test_close_without_server_succeeds() {
    for kind in [RemoteKind::Http, RemoteKind::Rpc] {
        let client = backend(kind, &free_addr(), registry(BUILD));
        client.close().await.unwrap();

        let err = client.connect().await.unwrap_err();
        assert!(err.is_unreachable(), "{}: {}", kind, err);
    }
}

#[tokio::test]
async fn test_connect_to_silent_peer_times_out() {
    // accepts connections (kernel backlog) but never answers
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();

    for kind in [RemoteKind::Http, RemoteKind::Rpc] {
        let client = backend(kind, &addr, registry(BUILD));
        let started = std::time::Instant::now();
        let err = client.connect().await.unwrap_err();
        assert!(matches!(err, LaunchError::Timeout(_)), "{}: {}", kind, err);
        assert!(started.elapsed() < Duration::from_secs(5));
    }
    drop(listener);
}

#[tokio::test]
async fn test_serve_until_interrupted_closes_a_real_backend() {
    for kind in [RemoteKind::Http, RemoteKind::Rpc] {
        let addr = free_addr();
        let server = backend(kind, &addr, registry(BUILD));
        let client = backend(kind, &addr, registry(BUILD));

        let shutdown = async {
            // wait until the server answers, then interrupt it
            for _ in 0..50 {
                if client.connect().await.is_ok() {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
            panic!("{} server never came up", kind);
        };

        tokio::time::timeout(Duration::from_secs(10), serve_until_interrupted(&server, shutdown))
            .await
            .expect("serve_until_interrupted must return")
            .unwrap();
        assert!(client.connect().await.is_err());
    }
}
