#![forbid(unsafe_code)]

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{Level as TraceLevel, info};
use tracing_subscriber::FmtSubscriber;

use winsys_persistence::{
    BlobFactory, ExtensionRegistry, PermissiveRegistry, PersistenceManager, Settings, StaticExtensionRegistry,
};

#[derive(Parser)]
#[command(name = "winsys-layout", version, about = "Inspect and rewrite a persisted window layout")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Settings file (default: <config_dir>/winsys-layout/settings.json)
    #[arg(long, value_name = "PATH", global = true)]
    settings: Option<PathBuf>,

    /// Module layer root, overrides the settings file
    #[arg(long, value_name = "DIR", global = true)]
    module_root: Option<PathBuf>,

    /// Local layer root, overrides the settings file
    #[arg(long, value_name = "DIR", global = true)]
    local_root: Option<PathBuf>,

    /// Extension list as `{"extensions": [...]}`
    #[arg(long, value_name = "PATH", global = true)]
    extensions: Option<PathBuf>,

    /// trace, debug, info, warn or error (default: LOG_LEVEL, then the settings file)
    #[arg(long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Print the loaded layout as JSON
    Dump,

    /// Load the layout and write it back to the local layer
    Resave,

    /// Print modes as they would be saved
    ModeXml {
        /// Only this mode
        name: Option<String>,
    },

    /// Load a single mode file and print it as JSON
    ModeFile {
        #[arg(value_name = "FILE")]
        path: PathBuf,
    },

    /// Write the effective settings, including root and extension overrides, to the settings file
    SaveSettings,
}

fn parse_level(value: &str) -> TraceLevel {
    match value.to_lowercase().as_str() {
        "trace" => TraceLevel::TRACE,
        "debug" => TraceLevel::DEBUG,
        "warn" => TraceLevel::WARN,
        "error" => TraceLevel::ERROR,
        _ => TraceLevel::INFO,
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // settings.log_level already carries the LOG_LEVEL override
    let mut settings = match &cli.settings {
        Some(path) => Settings::load_from(path)?,
        None => Settings::load()?,
    };
    let log_level = cli.log_level.clone().unwrap_or_else(|| settings.log_level.clone());
    let subscriber = FmtSubscriber::builder()
        .with_max_level(parse_level(&log_level))
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("Failed to set tracing subscriber")?;

    if let Some(root) = cli.module_root {
        settings.module_root = root;
    }
    if let Some(root) = cli.local_root {
        settings.local_root = root;
    }
    if let Some(path) = cli.extensions {
        settings.extensions_file = Some(path);
    }

    if let Command::SaveSettings = cli.command {
        match &cli.settings {
            Some(path) => settings.save_to(path)?,
            None => settings.save()?,
        }
        info!(path = %cli.settings.unwrap_or_else(Settings::config_path).display(), "Settings saved");
        return Ok(());
    }

    let extensions: Arc<dyn ExtensionRegistry> = match &settings.extensions_file {
        Some(path) => Arc::new(StaticExtensionRegistry::load(path)?),
        None => Arc::new(PermissiveRegistry),
    };
    let manager = PersistenceManager::new(
        &settings.module_root,
        &settings.local_root,
        &settings.window_manager_name,
        extensions,
        Arc::new(BlobFactory),
    );

    match cli.command {
        Command::Dump => {
            let config = manager.load_window_system()?;
            let json = serde_json::to_string_pretty(&config).context("Failed to serialize layout")?;
            println!("{json}");
        }
        Command::Resave => {
            let config = manager.load_window_system()?;
            let saved = manager.save_window_system(&config)?;
            info!(
                modes = saved.modes.len(),
                groups = saved.groups.len(),
                local = %manager.local_root().display(),
                "Layout rewritten"
            );
        }
        Command::ModeXml { name } => {
            let mut config = manager.load_window_system()?;
            if let Some(name) = &name {
                config.modes.retain(|m| &m.name == name);
                if config.modes.is_empty() {
                    anyhow::bail!("No mode named '{name}'");
                }
            }
            for xml in manager.mode_config_xmls(&config)? {
                println!("{xml}");
            }
        }
        Command::ModeFile { path } => {
            let mode = manager
                .load_mode_config_from(&path)
                .with_context(|| format!("Failed to load mode file {}", path.display()))?;
            let json = serde_json::to_string_pretty(&mode).context("Failed to serialize mode")?;
            println!("{json}");
        }
        Command::SaveSettings => {}
    }
    Ok(())
}
