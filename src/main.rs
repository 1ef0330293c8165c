#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dropwatch_cli::cli::run().await
}
