//! Terminal runner: engine + stdin commands + stdout notifications

use std::path::PathBuf;
use std::sync::Arc;

use rndemon_app::config;
use rndemon_app::{spawn_stdin_reader, ConsoleNotifier, Engine, HeadlessNotifier, Message};
use rndemon_core::prelude::*;
use rndemon_core::{logging, Notifier};

/// What the binary was asked to do
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Directory searched for the React Native project
    pub project_path: PathBuf,
    /// Emit NDJSON instead of plain text
    pub headless: bool,
    /// Start the packager right away
    pub auto_start: bool,
    /// Extra arguments for the first start
    pub packager_args: Vec<String>,
    /// Write a default `.rndemon/config.toml` first
    pub init_config: bool,
}

pub async fn run(options: RunOptions) -> Result<()> {
    color_eyre::install().map_err(|e| Error::terminal(e.to_string()))?;

    // Logs go to a file; stdout carries notifications
    logging::init()?;

    info!("═══════════════════════════════════════════════════════");
    info!("RN Demon starting{}", if options.headless { " in HEADLESS mode" } else { "" });
    info!("Project: {}", options.project_path.display());
    info!("═══════════════════════════════════════════════════════");

    if options.init_config {
        config::init_config_dir(&options.project_path)?;
    }

    let notifier: Arc<dyn Notifier> = if options.headless {
        Arc::new(HeadlessNotifier)
    } else {
        Arc::new(ConsoleNotifier)
    };

    let mut engine = Engine::new(options.project_path, notifier);
    spawn_stdin_reader(engine.msg_sender());

    if options.auto_start {
        engine
            .process_message(Message::start(options.packager_args))
            .await;
    }

    engine.run().await;
    engine.shutdown().await;

    info!("RN Demon exiting");
    Ok(())
}
