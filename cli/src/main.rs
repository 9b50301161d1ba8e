use basilica::node::Node;
use color_eyre::eyre;

mod args;
mod config;
mod error;
mod logging;

use args::{Args, Commands};
use config::Config;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    color_eyre::install()?;

    let args = Args::new();
    let _log_guard = logging::init(args.log_level.as_deref(), args.log_file.as_deref());

    match args.command.clone().unwrap_or(Commands::Start) {
        Commands::Start => start(&args).await,
    }
}

async fn start(args: &Args) -> eyre::Result<()> {
    let config_file = args.config_file();
    let config = Config::load(&config_file)?;
    let node_config = config.into_node_config()?;

    tracing::info!(
        config = %config_file.display(),
        agora = %node_config.agora_endpoint,
        db = %node_config.database_path.display(),
        "starting basilica"
    );

    Node::new(node_config).run().await
}
