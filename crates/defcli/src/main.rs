// crates/defcli/src/main.rs

use anyhow::Result;
use clap::{Parser, Subcommand};
use defcore::{naming, Kind, NamingMode, ReloadEvent};
use defruntime::{builtin_bundle, DefinitionRuntime, LoaderConfig, RunMode};
use std::path::PathBuf;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "defs")]
#[command(about = "Definition loader CLI", long_about = None)]
struct Cli {
    /// JSON config file (defaults to DEFS_* environment variables)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Show debug logs
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load every configured root and report what was found
    Check,

    /// List loaded identifiers
    List {
        /// Only this kind (models, flows, apis, plugins)
        #[arg(short, long, value_parser = parse_kind)]
        kind: Option<Kind>,
    },

    /// Print the identifier a file is registered under
    Name {
        /// Root the file lives under
        root: PathBuf,

        /// Definition file
        file: PathBuf,

        /// Engine prefix; without it the application convention is used
        #[arg(short, long)]
        prefix: Option<String>,
    },

    /// Load, then follow changes until Ctrl-C
    Watch {
        /// Watch application roots as well (debug mode)
        #[arg(short, long)]
        debug: bool,
    },

    /// Write an example config file
    Init {
        /// Output file path
        #[arg(short, long, default_value = "defs.json")]
        output: PathBuf,
    },
}

fn parse_kind(value: &str) -> Result<Kind, String> {
    Kind::ALL
        .into_iter()
        .find(|kind| kind.dir_name() == value || kind.as_str() == value)
        .ok_or_else(|| format!("unknown kind '{}'", value))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    match cli.command {
        Commands::Check => {
            check(load_config(cli.config)?)?;
        }

        Commands::List { kind } => {
            list(load_config(cli.config)?, kind)?;
        }

        Commands::Name { root, file, prefix } => {
            print_name(root, file, prefix);
        }

        Commands::Watch { debug } => {
            let mut config = load_config(cli.config)?;
            if debug {
                config.mode = RunMode::Debug;
            }
            watch(config).await?;
        }

        Commands::Init { output } => {
            create_example_config(output)?;
        }
    }

    Ok(())
}

fn load_config(path: Option<PathBuf>) -> Result<LoaderConfig> {
    let config = match path {
        Some(path) => LoaderConfig::from_file(path)?,
        None => LoaderConfig::from_env()?,
    };
    tracing::debug!("Loader config: {:?}", config);
    Ok(config)
}

fn print_roots(config: &LoaderConfig) {
    if let Some(root) = &config.engine_root {
        println!("   Engine: {} (prefix '{}')", root, config.engine_prefix);
    }
    for kind in Kind::ALL {
        if let Some(root) = config.app_root(kind) {
            println!("   {}: {}", kind.dir_name(), root);
        }
    }
}

fn check(config: LoaderConfig) -> Result<()> {
    println!("🔍 Checking definition roots:");
    print_roots(&config);

    let mut runtime = DefinitionRuntime::new(config).with_bundle(builtin_bundle());
    let summary = runtime.load()?;

    println!();
    println!("✅ Loaded {} definitions:", summary.total());
    for kind in Kind::ALL {
        println!("   {}: {}", kind.dir_name(), summary.count(kind));
    }

    let watched = runtime.watch_targets();
    if !watched.is_empty() {
        println!();
        println!("👀 Would watch:");
        for target in watched {
            println!("   {} ({})", target.watch_root.display(), target.kind);
        }
    }

    Ok(())
}

fn list(config: LoaderConfig, only: Option<Kind>) -> Result<()> {
    let mut runtime = DefinitionRuntime::new(config).with_bundle(builtin_bundle());
    runtime.load()?;

    for kind in Kind::ALL {
        if only.is_some_and(|only| only != kind) {
            continue;
        }

        let ids = runtime.registries().for_kind(kind).ids();
        println!("📦 {} ({}):", kind.dir_name(), ids.len());
        for id in ids {
            println!("  • {}", id);
        }
    }

    Ok(())
}

fn print_name(root: PathBuf, file: PathBuf, prefix: Option<String>) {
    let mode = match prefix {
        Some(prefix) => NamingMode::engine(prefix),
        None => NamingMode::Application,
    };

    let named = naming::identifier(&root, &file, &mode);
    println!("{}", named.id);
    if let Some(segment) = named.kind_segment {
        match Kind::from_dir_name(&segment) {
            Some(kind) => println!("   kind: {}", kind),
            None => println!("   ⚠️  '{}' is not a definition directory", segment),
        }
    }
    if let Some(definition) = naming::companion_definition(&file) {
        println!("   companion of: {}", definition.display());
    }
}

async fn watch(config: LoaderConfig) -> Result<()> {
    println!("🚀 Loading definitions");
    print_roots(&config);

    let mut runtime = DefinitionRuntime::new(config).with_bundle(builtin_bundle());
    let summary = runtime.load()?;
    println!("✅ Loaded {} definitions", summary.total());

    let mut events = runtime.events().subscribe();
    let watching = runtime.start_watching(None)?;
    if watching == 0 {
        println!("⚠️  Nothing to watch (application roots are only watched in debug mode)");
        return Ok(());
    }
    println!("👀 Watching {} roots, Ctrl-C to stop", watching);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,

            event = events.recv() => {
                match event {
                    Ok(event) => print_event(&event),
                    Err(RecvError::Lagged(missed)) => println!("  ⚠️  {} events missed", missed),
                    Err(RecvError::Closed) => break,
                }
            }
        }
    }

    println!();
    println!("👋 Stopping watchers");
    runtime.shutdown().await;

    Ok(())
}

fn print_event(event: &ReloadEvent) {
    match event {
        ReloadEvent::Loaded { kind, id, .. } => println!("  ✅ Reloaded {} {}", kind, id),
        ReloadEvent::Removed { kind, id, .. } => println!("  🗑️  Removed {} {}", kind, id),
        ReloadEvent::Failed {
            kind, path, error, ..
        } => println!("  ❌ {} {} failed: {}", kind, path.display(), error),
        ReloadEvent::ServiceStopped { generation, .. } => {
            println!("  ⏹️  Service stopped (generation {})", generation)
        }
        ReloadEvent::ServiceStarted { generation, .. } => {
            println!("  ▶️  Service started (generation {})", generation)
        }
    }
}

fn create_example_config(output: PathBuf) -> Result<()> {
    let config = LoaderConfig {
        engine_root: Some("bin://xiang".to_string()),
        api_root: Some("./app/apis".to_string()),
        flow_root: Some("./app/flows".to_string()),
        model_root: Some("./app/models".to_string()),
        mode: RunMode::Debug,
        ..LoaderConfig::default()
    };

    let json = serde_json::to_string_pretty(&config)?;
    std::fs::write(&output, json)?;

    println!("✨ Created example config: {}", output.display());
    println!();
    println!("Check it with:");
    println!("  defs --config {} check", output.display());

    Ok(())
}
