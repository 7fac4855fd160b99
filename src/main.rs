#[tokio::main]
async fn main() -> anyhow::Result<()> {
    github_proxy::run().await?;
    Ok(())
}
