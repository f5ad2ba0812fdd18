//! Command router
//!
//! [`DevCommands`] starts the packager, subscribes to it after every
//! successful start, and exposes the packager sub-commands only while it
//! runs. Packager handlers forward into an unbounded channel that the
//! engine drains right after each supervisor event, so router state is
//! only touched from the engine loop.

use std::sync::Arc;

use tokio::sync::mpsc;

use rndemon_core::prelude::*;
use rndemon_core::{is_expected_exit, Notifier, OutputFilter};
use rndemon_daemon::{ProcessSupervisor, NOT_RUNNING_MESSAGE};

use crate::browser::UrlOpener;
use crate::commands::{find_dev_command, CommandCallback, CommandRegistry};

pub const NO_PROFILER_URL_MESSAGE: &str = "No profiler URL available yet";

/// What a packager handler observed, queued for the router
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackagerUpdate {
    Stdout(Vec<String>),
    Stderr(Vec<String>),
    Exited(Option<i32>),
    Error(String),
}

/// Router options taken from settings
#[derive(Debug, Clone)]
pub struct RouterOptions {
    /// Arguments placed before the user's `start` arguments
    pub base_args: Vec<String>,
    /// Surface filtered stderr lines as well as stdout
    pub show_stderr: bool,
}

impl Default for RouterOptions {
    fn default() -> Self {
        Self {
            base_args: vec!["start".to_string()],
            show_stderr: false,
        }
    }
}

pub struct DevCommands {
    options: RouterOptions,
    registry: CommandRegistry,
    filter: OutputFilter,
    profiler_url: Option<String>,
    notifier: Arc<dyn Notifier>,
    opener: Arc<dyn UrlOpener>,
    updates_tx: mpsc::UnboundedSender<PackagerUpdate>,
    updates_rx: mpsc::UnboundedReceiver<PackagerUpdate>,
}

impl DevCommands {
    pub fn new(
        options: RouterOptions,
        filter: OutputFilter,
        notifier: Arc<dyn Notifier>,
        opener: Arc<dyn UrlOpener>,
    ) -> Self {
        let (updates_tx, updates_rx) = mpsc::unbounded_channel();
        Self {
            options,
            registry: CommandRegistry::new(),
            filter,
            profiler_url: None,
            notifier,
            opener,
            updates_tx,
            updates_rx,
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Commands
    // ─────────────────────────────────────────────────────────────────────

    /// Start (or restart) the packager with the configured base arguments
    /// followed by `args`
    pub async fn start(&mut self, supervisor: &mut ProcessSupervisor, args: &[String]) -> bool {
        let mut full_args = self.options.base_args.clone();
        full_args.extend_from_slice(args);
        info!(
            "start packager: {:?} (running: {})",
            full_args,
            supervisor.is_running()
        );

        // Anything queued by the previous instance is stale now
        self.registry.unregister_all();
        self.profiler_url = None;
        while self.updates_rx.try_recv().is_ok() {}

        if !supervisor.start(&full_args).await {
            return false;
        }

        let tx = self.updates_tx.clone();
        supervisor.on_error(move |message| {
            let _ = tx.send(PackagerUpdate::Error(message.to_string()));
        });
        let tx = self.updates_tx.clone();
        supervisor.on_exit(move |code| {
            let _ = tx.send(PackagerUpdate::Exited(code));
        });
        let tx = self.updates_tx.clone();
        supervisor.on_stdout(move |lines| {
            let _ = tx.send(PackagerUpdate::Stdout(lines.to_vec()));
        });
        let tx = self.updates_tx.clone();
        supervisor.on_stderr(move |lines| {
            let _ = tx.send(PackagerUpdate::Stderr(lines.to_vec()));
        });

        debug!("register commands");
        self.registry.register_all();
        true
    }

    /// Stop the packager and withdraw the sub-commands
    pub async fn stop(&mut self, supervisor: &mut ProcessSupervisor) {
        supervisor.stop().await;
        debug!("unregister commands");
        self.registry.unregister_all();
    }

    /// Run a packager sub-command by id.
    ///
    /// Returns `true` if the command ran.
    pub async fn execute(&mut self, supervisor: &mut ProcessSupervisor, id: &str) -> bool {
        let Some(descriptor) = self.registry.get(id) else {
            if find_dev_command(id).is_some() {
                self.notifier.message(NOT_RUNNING_MESSAGE);
            } else {
                warn!("Unknown command: {}", id);
                self.notifier.warning(&format!("Unknown command: {id}"));
            }
            return false;
        };

        if !supervisor.is_running() {
            self.notifier.message(NOT_RUNNING_MESSAGE);
            return false;
        }

        debug!("execute {}", descriptor.id);
        if let Some(bytes) = descriptor.bytes {
            supervisor.send_command(Some(bytes)).await;
        }

        match descriptor.callback {
            Some(CommandCallback::Stop) => self.stop(supervisor).await,
            Some(CommandCallback::Notify(text)) => self.notifier.message(text),
            Some(CommandCallback::OpenProfiler) => self.open_profiler(),
            None => {}
        }
        true
    }

    fn open_profiler(&self) {
        let Some(url) = self.profiler_url.as_deref() else {
            self.notifier.message(NO_PROFILER_URL_MESSAGE);
            return;
        };

        info!("Opening profiler at {}", url);
        if let Err(e) = self.opener.open(url) {
            error!("Open browser fail: {}", e);
            self.notifier.message(&format!("Open browser fail: {e}"));
        }
    }

    /// Registered `(id, title)` pairs, `start` first
    pub fn titles(&self) -> Vec<(&'static str, &'static str)> {
        self.registry.titles()
    }

    pub fn is_registered(&self, id: &str) -> bool {
        self.registry.is_registered(id)
    }

    pub fn has_commands(&self) -> bool {
        !self.registry.is_empty()
    }

    pub fn profiler_url(&self) -> Option<&str> {
        self.profiler_url.as_deref()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Packager updates
    // ─────────────────────────────────────────────────────────────────────

    /// Apply every update queued by packager handlers
    pub fn drain_updates(&mut self) {
        while let Ok(update) = self.updates_rx.try_recv() {
            self.apply(update);
        }
    }

    fn apply(&mut self, update: PackagerUpdate) {
        match update {
            PackagerUpdate::Stdout(lines) => self.handle_stdout(&lines),
            PackagerUpdate::Stderr(lines) => self.handle_stderr(&lines),
            PackagerUpdate::Exited(code) => self.handle_exit(code),
            PackagerUpdate::Error(message) => self.handle_error(&message),
        }
    }

    fn handle_stdout(&mut self, lines: &[String]) {
        let processed = self.filter.process(lines);
        if let Some(url) = processed.profiler_url {
            debug!("Profiler available at {}", url);
            self.profiler_url = Some(url);
        }
        self.notifier.lines(processed.lines);
    }

    fn handle_stderr(&mut self, lines: &[String]) {
        for line in lines {
            debug!("packager stderr: {}", line);
        }
        if self.options.show_stderr {
            self.notifier.lines(self.filter.filter(lines));
        }
    }

    fn handle_exit(&mut self, code: Option<i32>) {
        info!("packager exit with: {:?}", code);
        self.registry.unregister_all();
        if !is_expected_exit(code) {
            let code = match code {
                Some(code) => code.to_string(),
                None => "a signal".to_string(),
            };
            self.notifier
                .message(&format!("react native packager exited with {code}"));
        }
    }

    fn handle_error(&mut self, message: &str) {
        error!("packager error: {}", message);
        self.registry.unregister_all();
        self.notifier.message(message);
    }

    pub async fn shutdown(&mut self, supervisor: &mut ProcessSupervisor) {
        self.registry.unregister_all();
        supervisor.shutdown().await;
    }
}
