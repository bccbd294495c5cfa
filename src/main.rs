#[tokio::main]
async fn main() -> anyhow::Result<()> {
    blendfarm_client::run().await
}
