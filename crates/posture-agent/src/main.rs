//! # posture-agent
//!
//! Posture monitoring server binary. Loads settings, installs logging and
//! metrics, picks a classifier and serves `/stream` and `/dashboard` until
//! Ctrl-C.

#![deny(unsafe_code)]

mod classifier_factory;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use posture_core::logging;
use posture_server::metrics::install_recorder;
use posture_server::{PostureServer, ServerConfig};
use posture_settings::{ClassifierKind, PostureSettings};

/// Posture monitoring server.
#[derive(Parser, Debug)]
#[command(name = "posture-server", about = "Posture monitoring server", version)]
struct Cli {
    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides settings).
    #[arg(long)]
    port: Option<u16>,

    /// Settings file (default `~/.posture/settings.json`).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Classifier to use: `rules` or `model`.
    #[arg(long)]
    classifier: Option<ClassifierKind>,

    /// Path to a forest model artifact.
    #[arg(long)]
    model_path: Option<String>,

    /// Log filter, e.g. `info` or `posture_server=debug`.
    #[arg(long)]
    log_level: Option<String>,

    /// Emit logs as JSON lines.
    #[arg(long)]
    json_logs: bool,
}

impl Cli {
    /// Apply flags over file and environment settings.
    fn apply(&self, settings: &mut PostureSettings) {
        if let Some(host) = &self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if let Some(kind) = self.classifier {
            settings.classifier.kind = kind;
        }
        if let Some(path) = &self.model_path {
            settings.classifier.model_path = Some(path.clone());
            // A model path on the command line implies the model classifier.
            if self.classifier.is_none() {
                settings.classifier.kind = ClassifierKind::Model;
            }
        }
        if let Some(level) = &self.log_level {
            settings.logging.level.clone_from(level);
        }
        if self.json_logs {
            settings.logging.json = true;
        }
    }
}

fn load_settings(cli: &Cli) -> Result<PostureSettings> {
    let path = cli
        .settings
        .clone()
        .unwrap_or_else(posture_settings::settings_path);
    let mut settings = posture_settings::load_settings_from_path(&path)
        .with_context(|| format!("Failed to load settings from {}", path.display()))?;
    cli.apply(&mut settings);
    settings.validate().context("Invalid settings")?;
    Ok(settings)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = load_settings(&cli)?;

    if settings.logging.json {
        logging::init_json_subscriber(&settings.logging.level);
    } else {
        logging::init_subscriber(&settings.logging.level);
    }

    let provider = classifier_factory::build_provider(&settings.classifier);
    let mut server = PostureServer::new(ServerConfig::from(&settings.server), provider);
    match install_recorder() {
        Ok(handle) => server = server.with_metrics(handle),
        Err(e) => tracing::warn!(error = %e, "metrics disabled"),
    }

    let (addr, handle) = server
        .listen()
        .await
        .context("Failed to bind server")?;
    tracing::info!(
        classifier = server.provider().name(),
        "Posture server listening on http://{addr} (senders: ws://{addr}/stream, observers: ws://{addr}/dashboard)"
    );

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutting down...");
    if !server.shutdown().graceful_shutdown(vec![handle], None).await {
        tracing::warn!("server did not stop in time");
    }
    tracing::info!("Shutdown complete");
    Ok(())
}
