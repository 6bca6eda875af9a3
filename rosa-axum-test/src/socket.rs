//! Unix socket endpoints for the end-to-end runner.
//!
//! Each scenario gets its own socket file under the temp directory, removed
//! again when the [`TestSocket`] is dropped.

use std::path::PathBuf;
use std::time::Duration;

use tokio::net::{UnixListener, UnixStream};

const READY_ATTEMPTS: u32 = 100;
const READY_INTERVAL: Duration = Duration::from_millis(50);

pub struct TestSocket {
    path: PathBuf,
}

impl TestSocket {
    pub fn new(name: &str) -> std::io::Result<Self> {
        let dir = std::env::temp_dir().join("rosa-axum-test");
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            path: dir.join(format!("{name}.sock")),
        })
    }

    /// Bind the socket, replacing a stale file left by an earlier run.
    pub fn bind(&self) -> std::io::Result<UnixListener> {
        let _ = std::fs::remove_file(&self.path);
        UnixListener::bind(&self.path)
    }

    pub async fn connect(&self) -> std::io::Result<UnixStream> {
        UnixStream::connect(&self.path).await
    }

    pub async fn wait_ready(&self) -> anyhow::Result<()> {
        for _ in 0..READY_ATTEMPTS {
            if self.connect().await.is_ok() {
                return Ok(());
            }
            tokio::time::sleep(READY_INTERVAL).await;
        }
        anyhow::bail!("server not accepting on {}", self.path.display())
    }
}

impl Drop for TestSocket {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

/// Establish an HTTP/1.1 connection over a Unix socket.
/// Returns (sender, connection_join_handle).
pub async fn http1_connect(
    sock: &TestSocket,
) -> anyhow::Result<(
    hyper::client::conn::http1::SendRequest<http_body_util::Full<bytes::Bytes>>,
    tokio::task::JoinHandle<()>,
)> {
    let stream = sock.connect().await?;
    let io = hyper_util::rt::TokioIo::new(stream);

    let (sender, conn) = hyper::client::conn::http1::handshake(io).await?;

    let handle = tokio::spawn(async move {
        if let Err(e) = conn.await {
            eprintln!("h1 connection error: {e}");
        }
    });

    Ok((sender, handle))
}

/// Send one request on a fresh connection and collect the full response.
pub async fn send(
    sock: &TestSocket,
    request: http::Request<http_body_util::Full<bytes::Bytes>>,
) -> anyhow::Result<(http::response::Parts, bytes::Bytes)> {
    use http_body_util::BodyExt;

    let (mut sender, conn) = http1_connect(sock).await?;
    let response = sender.send_request(request).await?;
    let (parts, body) = response.into_parts();
    let body = body.collect().await?.to_bytes();
    conn.abort();
    Ok((parts, body))
}
