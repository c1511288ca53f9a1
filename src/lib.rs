pub mod builder;
pub mod cache;
pub mod cli;
pub mod clients;
pub mod config;
pub mod consolidate;
pub mod constants;
pub mod domain;
pub mod matching;
pub mod models;
pub mod parser;
pub mod policy;
pub mod resolve;
pub mod services;
pub mod sql;

use clap::{CommandFactory, Parser};
use cli::{
    Cli, Commands, cmd_fetch, cmd_generate, cmd_list, cmd_process, cmd_run, cmd_search,
};
pub use config::Config;
use tracing_subscriber::EnvFilter;

pub async fn run() -> anyhow::Result<()> {
    let config = Config::load()?;
    config.validate()?;

    init_tracing(&config);

    let cli = Cli::parse();

    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        return Ok(());
    };

    match command {
        Commands::Fetch { title, root_id } => cmd_fetch(&config, &title.join(" "), root_id).await,
        Commands::Process { slug } => cmd_process(&config, &slug).await,
        Commands::Generate { slug } => cmd_generate(&config, &slug).await,
        Commands::Run { title, root_id } => cmd_run(&config, &title.join(" "), root_id).await,
        Commands::Search { query } => cmd_search(&config, &query.join(" ")).await,
        Commands::List => cmd_list(&config).await,
        Commands::Init => {
            if Config::create_default_if_missing()? {
                println!("✓ Config file created. Edit config.toml and run again.");
            } else {
                println!("config.toml already exists, leaving it untouched.");
            }
            Ok(())
        }
    }
}

fn init_tracing(config: &Config) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.general.log_level));

    let registry = tracing_subscriber::registry().with(env_filter);

    // stdout carries command output
    if config.general.log_format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
