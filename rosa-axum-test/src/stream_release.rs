//! Release hooks on streaming bodies.
//!
//! The hook must run once when the stream completes, and once when the
//! client disconnects mid-stream.

use std::convert::Infallible;
use std::time::Duration;

use axum::{Router, routing::get};
use bytes::Bytes;
use futures::StreamExt;
use http::{Method, Request, StatusCode, header};
use http_body_util::{BodyExt, Full};
use rosa_axum::prelude::*;
use tokio::net::UnixListener;
use tokio::sync::mpsc;

use crate::report::{CaseResult, report};
use crate::socket::{TestSocket, http1_connect, send};

const RELEASE_TIMEOUT: Duration = Duration::from_secs(2);

pub async fn run(sock: &TestSocket) -> anyhow::Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let listener = sock.bind()?;
    let server = tokio::spawn(start(listener, tx));
    sock.wait_ready().await?;

    let cases = vec![
        CaseResult::from_result(
            "completed stream releases once",
            completed(sock, &mut rx).await,
        ),
        CaseResult::from_result(
            "client disconnect releases stream",
            disconnect(sock, &mut rx).await,
        ),
    ];

    server.abort();
    report("Stream Release", &cases)
}

async fn start(
    listener: UnixListener,
    released: mpsc::UnboundedSender<&'static str>,
) -> anyhow::Result<()> {
    let finite = released.clone();
    let app = Router::new()
        .route(
            "/rows",
            get(endpoint(move |_: &mut RequestContext, res: &mut ResponseContext| {
                let released = finite.clone();
                res.set_header("content-type", "text/csv");
                let rows = futures::stream::iter(["a\n", "b\n"])
                    .map(|row| Ok::<_, Infallible>(Bytes::from_static(row.as_bytes())));
                Outcome::<()>::stream(Streamable::new(rows).on_release(move || {
                    let _ = released.send("rows");
                }))
            })),
        )
        .route(
            "/tail",
            get(endpoint(move |_: &mut RequestContext, _: &mut ResponseContext| {
                let released = released.clone();
                let ticks = futures::stream::unfold(0u64, |i| async move {
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    Some((Ok::<_, Infallible>(Bytes::from(format!("{i}\n"))), i + 1))
                });
                Outcome::<()>::stream(Streamable::new(ticks).on_release(move || {
                    let _ = released.send("tail");
                }))
            })),
        );

    axum::serve(listener, app).await?;
    Ok(())
}

fn get_request(uri: &str) -> anyhow::Result<Request<Full<Bytes>>> {
    Ok(Request::builder()
        .method(Method::GET)
        .uri(uri)
        .header(header::HOST, "localhost")
        .body(Full::new(Bytes::new()))?)
}

async fn next_release(
    rx: &mut mpsc::UnboundedReceiver<&'static str>,
) -> anyhow::Result<&'static str> {
    match tokio::time::timeout(RELEASE_TIMEOUT, rx.recv()).await {
        Ok(Some(label)) => Ok(label),
        Ok(None) => anyhow::bail!("release channel closed"),
        Err(_) => anyhow::bail!("stream was not released within {RELEASE_TIMEOUT:?}"),
    }
}

async fn completed(
    sock: &TestSocket,
    rx: &mut mpsc::UnboundedReceiver<&'static str>,
) -> anyhow::Result<()> {
    let (parts, body) = send(sock, get_request("/rows")?).await?;
    if parts.status != StatusCode::OK {
        anyhow::bail!("expected 200, got {}", parts.status);
    }
    if body != Bytes::from_static(b"a\nb\n") {
        anyhow::bail!("unexpected body {body:?}");
    }

    let label = next_release(rx).await?;
    if label != "rows" {
        anyhow::bail!("unexpected release {label}");
    }
    tokio::time::sleep(Duration::from_millis(50)).await;
    if let Ok(extra) = rx.try_recv() {
        anyhow::bail!("stream released twice ({extra})");
    }
    Ok(())
}

async fn disconnect(
    sock: &TestSocket,
    rx: &mut mpsc::UnboundedReceiver<&'static str>,
) -> anyhow::Result<()> {
    let (mut sender, conn) = http1_connect(sock).await?;
    let response = sender.send_request(get_request("/tail")?).await?;
    if response.status() != StatusCode::OK {
        anyhow::bail!("expected 200, got {}", response.status());
    }

    let mut body = response.into_body();
    match body.frame().await {
        Some(Ok(_)) => {}
        other => anyhow::bail!("expected a first chunk, got {other:?}"),
    }

    drop(body);
    drop(sender);
    conn.abort();

    let label = next_release(rx).await?;
    if label != "tail" {
        anyhow::bail!("unexpected release {label}");
    }
    Ok(())
}
