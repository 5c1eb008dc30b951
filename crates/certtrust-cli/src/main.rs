//! certcheck - test HTTPS endpoints against the certtrust engine.

use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    certtrust_cli::run().await
}
