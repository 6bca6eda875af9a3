use rosa_axum::Adapters;
use tokio::net::UnixListener;

/// Serve the demo routes with default adapters.
pub async fn start(listener: UnixListener) -> anyhow::Result<()> {
    let app = rosa_axum_examples::routes(&Adapters::new());
    axum::serve(listener, app).await?;
    Ok(())
}
