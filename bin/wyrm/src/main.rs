use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use wyrm_config::{ConfigResult, ServerConfig};
use wyrm_core::extensions::result_ext::BoxedResult;
use wyrm_core::fuzz::Fuzzer;
use wyrm_core::server::Server;
use wyrm_site::assets::AssetStore;
use wyrm_site::SiteState;

/// Pause between a listener shutting down and the next bind.
const RESTART_PAUSE: Duration = Duration::from_secs(1);

#[derive(Parser, Debug)]
#[command(version, about = "HTTP server that misbehaves on purpose", long_about = None)]
struct Args {
    /// TOML config file; flags below override its values
    #[arg(short, long, env = "WYRM_CONFIG")]
    config: Option<PathBuf>,

    #[arg(long, env = "WYRM_HOST")]
    host: Option<String>,

    #[arg(short, long, env = "WYRM_PORT")]
    port: Option<u16>,

    /// Seed of the random stream behind every fuzz decision
    #[arg(long, env = "WYRM_SEED")]
    seed: Option<u64>,

    /// Fuzz sessions per intensity cycle
    #[arg(long, env = "WYRM_FUZZ_PERIOD")]
    fuzz_period: Option<u64>,

    /// Requests served before the listener is restarted
    #[arg(long, env = "WYRM_RESTART_INTERVAL")]
    restart_interval: Option<u64>,

    #[arg(long, env = "WYRM_ASSET_DIR")]
    asset_dir: Option<PathBuf>,

    #[arg(long, env = "WYRM_LOG_LEVEL", default_value = "info")]
    log_level: Level,
}

impl Args {
    fn into_config(self) -> ConfigResult<ServerConfig> {
        let mut config = match &self.config {
            Some(path) => ServerConfig::load(path)?,
            None => ServerConfig::default(),
        };

        if let Some(host) = self.host {
            config.host = host;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(fuzz_period) = self.fuzz_period {
            config.fuzz_period = fuzz_period;
        }
        if let Some(restart_interval) = self.restart_interval {
            config.restart_interval = restart_interval;
        }
        if let Some(asset_dir) = self.asset_dir {
            config.asset_dir = asset_dir;
        }

        config.validate()?;
        Ok(config)
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> BoxedResult<()> {
    let args = Args::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.log_level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = args.into_config()?;
    tracing::info!(
        "Seed {} Period {} Interval {}",
        config.seed,
        config.fuzz_period,
        config.restart_interval
    );

    let fuzzer = Arc::new(Fuzzer::new(config.seed, config.fuzz_period));
    let state = Arc::new(SiteState::new(AssetStore::new(&config.asset_dir)));
    let router = Arc::new(wyrm_site::router(&state)?);

    loop {
        let listener = TcpListener::bind(config.bind_address()).await?;

        Server::new(fuzzer.clone(), router.clone(), config.restart_interval)
            .serve(listener)
            .await?;

        tracing::info!("Listener stopped, rebinding in {:?}", RESTART_PAUSE);
        tokio::time::sleep(RESTART_PAUSE).await;
    }
}
