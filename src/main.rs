use anyhow::Result;
use clap::Parser;

mod cli;

use neoreg::{config, init_tracing, server};

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();

    init_tracing();

    match args.get_command() {
        cli::Commands::Serve => {
            let cfg = config::load_config()?;
            server::start_server(cfg).await?;
        }
        cli::Commands::Config { action } => match action {
            cli::ConfigCommands::Show => {
                let mut cfg = config::load_config()?;
                if !cfg.gemini.api_key.is_empty() {
                    cfg.gemini.api_key = "***".to_string();
                }
                println!("{}", serde_json::to_string_pretty(&cfg)?);
            }
            cli::ConfigCommands::Validate => {
                config::load_config()?;
                println!("Configuration is valid");
            }
        },
        cli::Commands::Version => {
            println!("{} v{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
