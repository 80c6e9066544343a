//! `signbox`: runs the upload store and the integrated signing builder.
//!
//! Usage: `signbox [--config <file>]`. The settings path can also come from
//! `SIGNBOX_CONFIG`; without either, defaults are used.

mod script;
mod settings;

use std::error::Error;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use signbox_core::{Builder, CleanupLoop, IntegratedBuilder, UploadResolver};
use tracing_subscriber::EnvFilter;

use crate::script::ScriptProcessor;
use crate::settings::Settings;

const CONFIG_ENV: &str = "SIGNBOX_CONFIG";

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn Error>> {
    let settings = match config_path()? {
        Some(path) => {
            tracing::info!(path = %path.display(), "loading settings");
            Settings::from_file(&path)?
        }
        None => {
            tracing::warn!("no settings file given, using defaults");
            Settings::default()
        }
    };

    let resolver = Arc::new(UploadResolver::open(&settings.storage.uploads_dir)?);
    tracing::info!(
        dir = %resolver.dir().display(),
        uploads = resolver.len(),
        "upload store ready"
    );
    let cleanup = CleanupLoop::from_config(Arc::clone(&resolver), &settings.storage)?.spawn();

    let builder = if settings.integrated.enable {
        let builder = IntegratedBuilder::new(settings.integrated.clone())?;
        builder.set_secrets(settings.secrets.clone())?;
        let processor = ScriptProcessor::new(
            &settings.integrated,
            resolver.dir(),
            builder.secrets_handle(),
        )
        .with_interpreter(settings.interpreter.clone());
        builder.set_processor(processor)?;
        if !resolver.is_empty() {
            builder.trigger()?;
        }
        tracing::info!(status = %builder.status_url()?, "builder status");
        Some(builder)
    } else {
        tracing::info!("integrated builder disabled");
        None
    };

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");
    cleanup.shutdown_and_join().await;
    if let Some(builder) = builder {
        let status = builder.status();
        tracing::info!(
            pending = status.pending_jobs,
            active = status.active_jobs,
            "builder stopped"
        );
    }
    Ok(())
}

fn config_path() -> Result<Option<PathBuf>, Box<dyn Error>> {
    let mut args = std::env::args().skip(1);
    match args.next().as_deref() {
        None => Ok(std::env::var_os(CONFIG_ENV).map(PathBuf::from)),
        Some("--config" | "-c") => match args.next() {
            Some(path) => Ok(Some(PathBuf::from(path))),
            None => Err("--config requires a file path".into()),
        },
        Some("--help" | "-h") => {
            print_help();
            process::exit(0);
        }
        Some(other) => Err(format!("unknown argument: {other}").into()),
    }
}

fn print_help() {
    println!("signbox - local signing orchestration");
    println!();
    println!("USAGE:");
    println!("    signbox [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("    -c, --config <FILE>    JSON settings file (default: ${CONFIG_ENV})");
    println!("    -h, --help             Print help information");
    println!();
    println!("Log level is read from RUST_LOG (default: info).");
}
