//! OpenRosa routes over a real HTTP/1.1 connection.

use bytes::Bytes;
use http::{HeaderMap, Method, Request, StatusCode, header};
use http_body_util::Full;

use crate::demo_server;
use crate::report::{CaseResult, report};
use crate::socket::{TestSocket, send};

const DATE: &str = "Wed, 16 Oct 2030 10:00:00 GMT";

pub async fn run(sock: &TestSocket) -> anyhow::Result<()> {
    let listener = sock.bind()?;
    let server = tokio::spawn(demo_server::start(listener));
    sock.wait_ready().await?;

    let cases = vec![
        CaseResult::from_result("form list served as xml", form_list(sock).await),
        CaseResult::from_result(
            "missing version rejected with headers",
            missing_version(sock).await,
        ),
        CaseResult::from_result("unreadable date rejected", bad_date(sock).await),
        CaseResult::from_result("gmt offset date accepted", offset_date(sock).await),
        CaseResult::from_result("client toString date accepted", client_date(sock).await),
        CaseResult::from_result("submission accepted", submission(sock).await),
        CaseResult::from_result(
            "empty submission is xml problem",
            empty_submission(sock).await,
        ),
        CaseResult::from_result("head probe", head_probe(sock).await),
    ];

    server.abort();
    report("OpenRosa Protocol", &cases)
}

fn request(
    method: Method,
    uri: &str,
    version: Option<&str>,
    date: Option<&str>,
    body: &'static str,
) -> anyhow::Result<Request<Full<Bytes>>> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::HOST, "localhost");
    if let Some(version) = version {
        builder = builder.header("x-openrosa-version", version);
    }
    if let Some(date) = date {
        builder = builder.header(header::DATE, date);
    }
    Ok(builder.body(Full::new(Bytes::from_static(body.as_bytes())))?)
}

fn check_headers(headers: &HeaderMap) -> anyhow::Result<()> {
    let expected = [
        ("content-language", "en"),
        ("x-openrosa-version", "1.0"),
        ("x-openrosa-accept-content-length", "20000000"),
    ];
    for (name, value) in expected {
        match headers.get(name) {
            Some(v) if v == value => {}
            other => anyhow::bail!("header {name}: expected {value}, got {other:?}"),
        }
    }
    let date = headers
        .get(header::DATE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if !date.ends_with(" GMT") {
        anyhow::bail!("unexpected date header {date:?}");
    }
    Ok(())
}

fn expect_status(actual: StatusCode, expected: StatusCode) -> anyhow::Result<()> {
    if actual != expected {
        anyhow::bail!("expected status {expected}, got {actual}");
    }
    Ok(())
}

fn text(body: &Bytes) -> anyhow::Result<&str> {
    Ok(std::str::from_utf8(body)?)
}

async fn form_list(sock: &TestSocket) -> anyhow::Result<()> {
    let req = request(Method::GET, "/formList", Some("1.0"), Some(DATE), "")?;
    let (parts, body) = send(sock, req).await?;
    expect_status(parts.status, StatusCode::OK)?;
    check_headers(&parts.headers)?;

    if parts.headers.get("x-openrosa-form-count").is_none() {
        anyhow::bail!("handler header missing");
    }
    if !text(&body)?.starts_with("<xforms") {
        anyhow::bail!("unexpected body {:?}", text(&body)?);
    }
    Ok(())
}

async fn missing_version(sock: &TestSocket) -> anyhow::Result<()> {
    let req = request(Method::GET, "/formList", None, Some(DATE), "")?;
    let (parts, body) = send(sock, req).await?;
    expect_status(parts.status, StatusCode::BAD_REQUEST)?;
    check_headers(&parts.headers)?;

    let body = text(&body)?;
    if !body.contains("<OpenRosaResponse") || !body.contains("nature=\"error\"") {
        anyhow::bail!("expected xml envelope, got {body:?}");
    }
    if parts.headers.get("x-openrosa-form-count").is_some() {
        anyhow::bail!("handler ran for a rejected request");
    }
    Ok(())
}

async fn bad_date(sock: &TestSocket) -> anyhow::Result<()> {
    let req = request(Method::GET, "/formList", Some("1.0"), Some("soon"), "")?;
    let (parts, body) = send(sock, req).await?;
    expect_status(parts.status, StatusCode::BAD_REQUEST)?;

    if !text(&body)?.contains("soon") {
        anyhow::bail!("rejection should echo the header value");
    }
    Ok(())
}

async fn offset_date(sock: &TestSocket) -> anyhow::Result<()> {
    let req = request(
        Method::GET,
        "/formList",
        Some("1.0"),
        Some("Wed, 16 Oct 2030 10:00:00 GMT+0500"),
        "",
    )?;
    let (parts, _) = send(sock, req).await?;
    expect_status(parts.status, StatusCode::OK)
}

async fn client_date(sock: &TestSocket) -> anyhow::Result<()> {
    let req = request(
        Method::GET,
        "/formList",
        Some("1.0"),
        Some("Tue Oct 15 2030 10:00:00 GMT+0500 (Pakistan Standard Time)"),
        "",
    )?;
    let (parts, _) = send(sock, req).await?;
    expect_status(parts.status, StatusCode::OK)
}

async fn submission(sock: &TestSocket) -> anyhow::Result<()> {
    let req = request(
        Method::POST,
        "/submission",
        Some("1.0"),
        Some(DATE),
        "<data id=\"simple\"><name>Alice</name></data>",
    )?;
    let (parts, body) = send(sock, req).await?;
    expect_status(parts.status, StatusCode::CREATED)?;
    check_headers(&parts.headers)?;

    if !text(&body)?.contains("nature=\"success\"") {
        anyhow::bail!("expected success envelope");
    }
    Ok(())
}

async fn empty_submission(sock: &TestSocket) -> anyhow::Result<()> {
    let req = request(Method::POST, "/submission", Some("1.0"), Some(DATE), "")?;
    let (parts, body) = send(sock, req).await?;
    expect_status(parts.status, StatusCode::BAD_REQUEST)?;

    let content_type = parts
        .headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if !content_type.starts_with("text/xml") {
        anyhow::bail!("expected xml content-type, got {content_type:?}");
    }
    if !text(&body)?.contains("xml_submission_file") {
        anyhow::bail!("expected missing parameter message");
    }
    Ok(())
}

async fn head_probe(sock: &TestSocket) -> anyhow::Result<()> {
    let req = request(Method::HEAD, "/submission", Some("1.0"), Some(DATE), "")?;
    let (parts, _) = send(sock, req).await?;
    expect_status(parts.status, StatusCode::NO_CONTENT)?;
    check_headers(&parts.headers)
}
