//! 积分引擎命令行入口

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};

use points_engine::cli::{Cli, CommandRunner};
use points_shared::{config::AppConfig, observability};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = AppConfig::load("points-engine").context("加载配置失败")?;
    let _guard = observability::init(&config.observability).await?;
    info!(environment = %config.environment, "Configuration loaded");

    let runner = CommandRunner::connect(&config, !cli.no_notify).await?;
    let result = runner.run(cli.command).await;
    runner.shutdown().await;

    if let Err(e) = &result {
        error!(error = %e, "命令执行失败");
    }
    result
}
