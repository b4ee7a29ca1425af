use anyhow::Result;
use mailbridge::cli;

#[tokio::main]
async fn main() -> Result<()> {
    cli::run().await
}
