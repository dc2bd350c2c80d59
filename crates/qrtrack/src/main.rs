//! `qrtrack` - CLI for the qrtrack inventory tracker
//!
//! Runs the web server and provides maintenance commands for the item store
//! and code images.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use anyhow::Context;
use clap::Parser;

use qrtrack::cli::{Cli, CodesCommand, Command, ConfigCommand, ItemsCommand, ServeCommand};
use qrtrack::storage::import_items;
use qrtrack::{init_logging, web, Config, Inventory, JsonFileStore};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    // Load configuration
    let config = Config::load_from(cli.config.clone()).context("failed to load configuration")?;

    match cli.command {
        Command::Serve(serve_cmd) => handle_serve(config, serve_cmd),
        Command::Items(items_cmd) => handle_items(&config, items_cmd),
        Command::Codes(codes_cmd) => handle_codes(&config, &codes_cmd),
        Command::Config(config_cmd) => handle_config(&config, config_cmd),
    }
}

fn handle_serve(mut config: Config, cmd: ServeCommand) -> anyhow::Result<()> {
    if let Some(bind) = cmd.bind {
        config.server.bind = bind;
        config.validate()?;
    }

    let inventory = Inventory::open(&config)?;
    let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    runtime.block_on(web::serve(&config, inventory))?;
    Ok(())
}

fn handle_items(config: &Config, cmd: ItemsCommand) -> anyhow::Result<()> {
    match cmd {
        ItemsCommand::List { json } => {
            let items = Inventory::open(config)?.list()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&items)?);
            } else if items.is_empty() {
                println!("No items.");
            } else {
                for item in &items {
                    println!("{}  {}  {}", item.id, item.created_at_display(), item.title);
                    if !item.description.is_empty() {
                        println!("    {}", item.description);
                    }
                }
                println!();
                println!("{} item(s)", items.len());
            }
        }
        ItemsCommand::Import { file } => {
            anyhow::ensure!(file.is_file(), "{} is not a file", file.display());
            let source = JsonFileStore::open(&file)?
                .load()
                .with_context(|| format!("failed to read {}", file.display()))?;
            let inventory = Inventory::open(config)?;
            let stats = import_items(inventory.store(), &source)?;
            println!(
                "Imported {} item(s), skipped {} already present.",
                stats.imported, stats.skipped
            );
            if stats.imported > 0 {
                println!("Run `qrtrack codes regenerate` to render their codes.");
            }
        }
    }
    Ok(())
}

fn handle_codes(config: &Config, cmd: &CodesCommand) -> anyhow::Result<()> {
    match cmd {
        CodesCommand::Regenerate => {
            let inventory = Inventory::open(config)?;
            let base_url = config.base_url();
            let count = inventory.regenerate_codes(&base_url)?;
            println!(
                "Regenerated {count} code(s) in {} for {base_url}",
                inventory.codes().dir().display()
            );
        }
    }
    Ok(())
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                let mut shown = config.clone();
                if shown.codes.signing_secret.is_some() {
                    shown.codes.signing_secret = Some("(redacted)".to_string());
                }
                println!("{}", serde_json::to_string_pretty(&shown)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Server]");
                println!("  Bind address:       {}", config.server.bind);
                println!(
                    "  Public URL:         {}",
                    config.server.public_url.as_deref().unwrap_or("(from Host header)")
                );
                println!();
                println!("[Storage]");
                println!("  Backend:            {}", config.storage.backend);
                println!("  Data path:          {}", config.data_path().display());
                println!("  Codes directory:    {}", config.codes_dir().display());
                println!();
                println!("[Codes]");
                match config.codes.token_ttl_days {
                    0 => println!("  Token lifetime:     never expires"),
                    days => println!("  Token lifetime:     {days} days"),
                }
                if config.codes.signing_secret.is_some() {
                    println!("  Signing key:        (configured)");
                } else {
                    println!(
                        "  Signing key:        {}",
                        config.signing_key_path().display()
                    );
                }
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => anyhow::bail!("Configuration error: {e}"),
            }
        }
    }
    Ok(())
}
