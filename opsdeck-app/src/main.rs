use anyhow::{bail, Context};
use opsdeck_app::config::AppConfig;
use opsdeck_app::{build_service, Console};
use opsdeck_interfaces::TerminalInterface;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const LOG_ENV: &str = "OPSDECK_LOG";

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();
}

fn parse_args() -> anyhow::Result<Option<PathBuf>> {
    let mut args = std::env::args().skip(1);
    let mut config = None;
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" | "-c" => {
                let path = args.next().context("--config needs a path")?;
                config = Some(PathBuf::from(path));
            }
            "--help" | "-h" => {
                println!("usage: opsdeck [--config <file.yaml>]");
                std::process::exit(0);
            }
            other => bail!("unexpected argument '{}'", other),
        }
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config_path = parse_args()?;
    let config = AppConfig::load(config_path.as_deref()).context("Failed to load configuration")?;
    let service = Arc::new(build_service(&config)?);

    let console = Console::new(
        service.clone(),
        Arc::new(TerminalInterface::new()),
        config.console_context(),
    );
    console.run().await;

    service.shutdown();
    Ok(())
}
