#[tokio::main]
async fn main() -> anyhow::Result<()> {
    crud_engine::run_server().await
}
