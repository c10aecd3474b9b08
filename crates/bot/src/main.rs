use anyhow::Context;

use dbtc_bot::app::build_app;
use dbtc_bot::config::BotConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dbtc_observability::init();

    let config = BotConfig::from_env().context("invalid configuration")?;
    config
        .require_gateway()
        .context("no message gateway configured")?;
    let app = build_app(config).context("failed to wire services")?;

    app.run().await.context("inbound subscription failed")?;
    Ok(())
}
