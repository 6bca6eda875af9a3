//! Demo Server
//!
//! Mounts JSON and OpenRosa routes on one router, all failures rendered by a
//! single translator configured from the environment.
//!
//! Run with: cargo run --bin demo-server
//! Set ROSA_EXPOSE_STACK=1 (and RUST_BACKTRACE=1) to see stack lines on faults.

use rosa_axum::Adapters;
use rosa_axum_examples::{init_tracing, routes, server_addr};
use tower_http::trace::TraceLayer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let adapters = Adapters::from_env();
    let app = routes(&adapters).layer(TraceLayer::new_for_http());

    let addr = server_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!(%addr, "demo server listening");
    println!("=== rosa-axum Demo Server ===");
    println!("Server listening on http://{}", addr);
    println!();
    println!("Test with:");
    println!("  curl -i http://localhost:3000/v1/projects");
    println!("  curl -i -X POST http://localhost:3000/v1/greetings -d '{{\"name\": \"Alice\"}}'");
    println!("  curl -i -X POST http://localhost:3000/v1/greetings -d '{{oops'");
    println!("  curl -i http://localhost:3000/formList \\");
    println!("    -H 'X-OpenRosa-Version: 1.0' \\");
    println!("    -H 'Date: Tue, 01 Jan 2030 00:00:00 GMT+0500'");
    println!("  curl -i http://localhost:3000/formList   # rejected, missing headers");

    axum::serve(listener, app).await?;
    Ok(())
}
