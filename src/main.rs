#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cf_admin::bootstrapper::run().await
}
