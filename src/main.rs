use clap::Parser;

use ipresolver::cli::{Cli, Commands, ConfigCommands};
use ipresolver::config::{get_config, init_config};
use ipresolver::runtime::modes;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // config generate 不依赖现有配置
    if let Some(Commands::Config {
        action: ConfigCommands::Generate { output_path, force },
    }) = &cli.command
    {
        let code = modes::config_generate(output_path.clone(), *force);
        std::process::exit(code);
    }

    if let Err(e) = init_config(cli.config.as_deref()) {
        eprintln!("{}", e.format_colored());
        std::process::exit(2);
    }
    let config = get_config();
    if let Err(e) = config.validate() {
        eprintln!("{}", e.format_colored());
        std::process::exit(2);
    }

    let code = match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => modes::run_serve(&config).await,
        Commands::Refresh => modes::run_refresh(&config).await,
        Commands::Lookup { ip } => modes::run_lookup(&config, &ip).await,
        Commands::Config { .. } => 0,
    };

    std::process::exit(code);
}
