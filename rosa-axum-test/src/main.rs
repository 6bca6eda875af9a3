pub mod report;
pub mod socket;
mod demo_server;
mod json_endpoint;
mod openrosa_protocol;
mod stream_release;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let pid = std::process::id();

    let sock = socket::TestSocket::new(&format!("{pid}-json"))?;
    json_endpoint::run(&sock).await?;

    let sock = socket::TestSocket::new(&format!("{pid}-openrosa"))?;
    openrosa_protocol::run(&sock).await?;

    let sock = socket::TestSocket::new(&format!("{pid}-stream"))?;
    stream_release::run(&sock).await
}
