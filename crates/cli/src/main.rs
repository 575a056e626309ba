use clap::Parser;

#[derive(Parser)]
#[command(name = "restobot")]
#[command(about = "LINE webhook that echoes text and answers locations with nearby restaurants", long_about = None)]
struct Cli {
    /// Config file path (default: RESTOBOT_CONFIG_PATH or ./config.json)
    #[arg(long, short, value_name = "PATH")]
    config: Option<std::path::PathBuf>,

    /// HTTP port (default from PORT env, config, or 8080)
    #[arg(long, short)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        log::error!("restobot failed: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let (mut config, path) = restobot::config::load_config(cli.config)?;
    if let Some(p) = cli.port {
        config.server.port = p;
    }
    log::info!(
        "starting restobot on {}:{} (config {})",
        config.server.bind,
        config.server.port,
        path.display()
    );
    restobot::server::run_server(config).await
}
