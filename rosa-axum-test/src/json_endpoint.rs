//! JSON endpoint over a real HTTP/1.1 connection.
//!
//! Covers default content type, classified problems, malformed bodies,
//! absent results and unclassified faults.

use bytes::Bytes;
use http::{Method, Request, StatusCode, header};
use http_body_util::Full;
use serde_json::Value;

use crate::demo_server;
use crate::report::{CaseResult, report};
use crate::socket::{TestSocket, send};

pub async fn run(sock: &TestSocket) -> anyhow::Result<()> {
    let listener = sock.bind()?;
    let server = tokio::spawn(demo_server::start(listener));
    sock.wait_ready().await?;

    let cases = vec![
        CaseResult::from_result("deferred value renders json", deferred_value(sock).await),
        CaseResult::from_result("classified problem keeps its status", not_found(sock).await),
        CaseResult::from_result("malformed body is 400.1", malformed_body(sock).await),
        CaseResult::from_result("decoded body reaches the handler", greeting(sock).await),
        CaseResult::from_result("absent result is 500.3", absent_result(sock).await),
        CaseResult::from_result("fault renders generic 500", fault(sock).await),
    ];

    server.abort();
    report("JSON Endpoint", &cases)
}

fn get(uri: &str) -> anyhow::Result<Request<Full<Bytes>>> {
    Ok(Request::builder()
        .method(Method::GET)
        .uri(uri)
        .header(header::HOST, "localhost")
        .body(Full::new(Bytes::new()))?)
}

fn post_json(uri: &str, body: &'static str) -> anyhow::Result<Request<Full<Bytes>>> {
    Ok(Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::HOST, "localhost")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Full::new(Bytes::from_static(body.as_bytes())))?)
}

fn expect_status(actual: StatusCode, expected: StatusCode) -> anyhow::Result<()> {
    if actual != expected {
        anyhow::bail!("expected status {expected}, got {actual}");
    }
    Ok(())
}

fn json(body: &Bytes) -> anyhow::Result<Value> {
    Ok(serde_json::from_slice(body)?)
}

async fn deferred_value(sock: &TestSocket) -> anyhow::Result<()> {
    let (parts, body) = send(sock, get("/v1/projects")?).await?;
    expect_status(parts.status, StatusCode::OK)?;

    let content_type = parts.headers.get(header::CONTENT_TYPE);
    if content_type.map(|v| v.as_bytes()) != Some(b"application/json".as_slice()) {
        anyhow::bail!("unexpected content-type {content_type:?}");
    }
    let projects = json(&body)?;
    if projects[1]["name"] != "Water Points" {
        anyhow::bail!("unexpected body {projects}");
    }
    Ok(())
}

async fn not_found(sock: &TestSocket) -> anyhow::Result<()> {
    let (parts, body) = send(sock, get("/v1/projects/missing")?).await?;
    expect_status(parts.status, StatusCode::NOT_FOUND)?;

    let problem = json(&body)?;
    if problem["code"] != 404.1 {
        anyhow::bail!("expected code 404.1, got {}", problem["code"]);
    }
    Ok(())
}

async fn malformed_body(sock: &TestSocket) -> anyhow::Result<()> {
    let (parts, body) = send(sock, post_json("/v1/greetings", "{\"name\":")?).await?;
    expect_status(parts.status, StatusCode::BAD_REQUEST)?;

    let problem = json(&body)?;
    if problem["code"] != 400.1 || problem["details"]["format"] != "json" {
        anyhow::bail!("unexpected problem {problem}");
    }
    if problem["details"]["rawLength"] != 8 {
        anyhow::bail!("expected rawLength 8, got {}", problem["details"]["rawLength"]);
    }
    Ok(())
}

async fn greeting(sock: &TestSocket) -> anyhow::Result<()> {
    let (parts, body) = send(sock, post_json("/v1/greetings", r#"{"name":"ana"}"#)?).await?;
    expect_status(parts.status, StatusCode::OK)?;

    let reply = json(&body)?;
    if reply["message"] != "hello, ana" {
        anyhow::bail!("unexpected reply {reply}");
    }
    Ok(())
}

async fn absent_result(sock: &TestSocket) -> anyhow::Result<()> {
    let (parts, body) = send(sock, get("/v1/empty")?).await?;
    expect_status(parts.status, StatusCode::INTERNAL_SERVER_ERROR)?;

    let problem = json(&body)?;
    if problem["code"] != 500.3 {
        anyhow::bail!("expected code 500.3, got {}", problem["code"]);
    }
    Ok(())
}

async fn fault(sock: &TestSocket) -> anyhow::Result<()> {
    let (parts, body) = send(sock, get("/v1/broken")?).await?;
    expect_status(parts.status, StatusCode::INTERNAL_SERVER_ERROR)?;

    let reply = json(&body)?;
    if reply["message"] != "unhandled exception: connection pool exhausted" {
        anyhow::bail!("unexpected reply {reply}");
    }
    if reply.get("code").is_some() {
        anyhow::bail!("fault response must not carry a problem code");
    }
    Ok(())
}
