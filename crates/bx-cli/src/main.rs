//! Blockex CLI
//!
//! Manages a block list kept in a JSON copy of the extension storage, and
//! exports the declarative rules the extension would install.

mod store;

use std::fs;

use clap::{Parser, Subcommand};

use bx_core::features::HiddenFeature;
use bx_core::matcher::find_match;
use bx_core::pattern::normalize_pattern;
use bx_core::popup::{PopupController, PopupError, PopupView};
use bx_core::rules::build_rules;
use bx_core::store::BlockStore;
use bx_core::sync::RuleSynchronizer;

use crate::store::{FileFilterEngine, JsonFileStore};

#[derive(Parser)]
#[command(name = "bx-cli")]
#[command(about = "Blockex block list manager and tools")]
struct Cli {
    /// Storage file (JSON copy of chrome.storage.local)
    #[arg(long, env = "BLOCKEX_STORE", default_value = "blockex-storage.json", global = true)]
    store: String,

    /// Dynamic rules file
    #[arg(long, env = "BLOCKEX_RULES", default_value = "blockex-rules.json", global = true)]
    rules: String,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the canonical pattern for an input
    Normalize {
        input: String,
    },

    /// Block a site or path
    Add {
        input: String,
    },

    /// Unblock a stored pattern
    Remove {
        pattern: String,
    },

    /// List blocked patterns
    List,

    /// Check whether a URL would be blocked
    Check {
        url: String,
    },

    /// List hide features
    Features,

    /// Enable or disable a hide feature
    Toggle {
        /// Feature id, e.g. youtube-shorts
        id: String,

        /// Disable instead of enable
        #[arg(long)]
        off: bool,
    },

    /// Rewrite the rules file from the stored block list
    Sync,

    /// Print the rules for the stored block list
    Rules {
        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "info" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter)).init();

    let result = tokio::runtime::Runtime::new()
        .map_err(|e| format!("Failed to start tokio runtime: {}", e))
        .and_then(|runtime| runtime.block_on(run(cli)));

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), String> {
    log::debug!("Using storage '{}' and rules '{}'", cli.store, cli.rules);
    let store = JsonFileStore::new(&cli.store);
    let engine = FileFilterEngine::new(&cli.rules);

    match cli.command {
        Commands::Normalize { input } => cmd_normalize(&input),
        Commands::Add { input } => {
            let popup = PopupController::new(store, engine);
            let view = popup.add_pattern(&input).await.map_err(describe)?;
            print_patterns(&view);
            Ok(())
        }
        Commands::Remove { pattern } => {
            let popup = PopupController::new(store, engine);
            let view = popup.remove_pattern(&pattern).await.map_err(describe)?;
            print_patterns(&view);
            Ok(())
        }
        Commands::List => {
            let popup = PopupController::new(store, engine);
            let view = popup.load().await.map_err(describe)?;
            print_patterns(&view);
            Ok(())
        }
        Commands::Check { url } => cmd_check(store, &url).await,
        Commands::Features => {
            let popup = PopupController::new(store, engine);
            let view = popup.load().await.map_err(describe)?;
            print_features(&view);
            Ok(())
        }
        Commands::Toggle { id, off } => {
            let feature = HiddenFeature::from_id(&id).ok_or_else(|| {
                let known: Vec<&str> = HiddenFeature::ALL.iter().map(|f| f.id()).collect();
                format!("Unknown feature '{}' (known: {})", id, known.join(", "))
            })?;
            let popup = PopupController::new(store, engine);
            let view = popup.set_feature(feature, !off).await.map_err(describe)?;
            print_features(&view);
            Ok(())
        }
        Commands::Sync => cmd_sync(store, engine).await,
        Commands::Rules { output } => cmd_rules(store, output.as_deref()).await,
    }
}

fn describe(err: PopupError) -> String {
    match &err {
        PopupError::InvalidPattern(inner) => inner.to_string(),
        _ => err.to_string(),
    }
}

fn cmd_normalize(input: &str) -> Result<(), String> {
    let pattern = normalize_pattern(input).map_err(|e| e.to_string())?;
    println!("{}", pattern);
    Ok(())
}

async fn cmd_check(store: JsonFileStore, url: &str) -> Result<(), String> {
    let list = BlockStore::new(store)
        .load_block_list()
        .await
        .map_err(|e| e.to_string())?;

    match find_match(url, &list) {
        Some(pattern) => println!("blocked by '{}'", pattern),
        None => println!("allowed"),
    }
    Ok(())
}

async fn cmd_sync(store: JsonFileStore, engine: FileFilterEngine) -> Result<(), String> {
    let list = BlockStore::new(store)
        .load_block_list()
        .await
        .map_err(|e| e.to_string())?;

    let update = RuleSynchronizer::new(engine)
        .sync(&list)
        .await
        .map_err(|e| e.to_string())?;

    println!(
        "Synced rules: removed {}, added {}",
        update.remove_rule_ids.len(),
        update.add_rules.len()
    );
    Ok(())
}

async fn cmd_rules(store: JsonFileStore, output: Option<&str>) -> Result<(), String> {
    let list = BlockStore::new(store)
        .load_block_list()
        .await
        .map_err(|e| e.to_string())?;

    let json = serde_json::to_string_pretty(&build_rules(&list))
        .map_err(|e| format!("Failed to serialize JSON: {}", e))?;

    match output {
        Some(path) => {
            fs::write(path, json).map_err(|e| format!("Failed to write '{}': {}", path, e))?;
            println!("Wrote {} rules to '{}'", list.len(), path);
        }
        None => println!("{}", json),
    }
    Ok(())
}

fn print_patterns(view: &PopupView) {
    if view.is_empty() {
        println!("No sites blocked yet.");
        return;
    }
    for (i, pattern) in view.patterns.iter().enumerate() {
        println!("  [{}] {}", i + 1, pattern);
    }
}

fn print_features(view: &PopupView) {
    for toggle in &view.features {
        let mark = if toggle.enabled { "x" } else { " " };
        println!("  [{}] {:<16} {}", mark, toggle.id, toggle.label);
    }
}
