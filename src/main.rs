use std::io::Result;

#[tokio::main]
async fn main() -> Result<()> {
    relay_server::run_with_config().await
}
