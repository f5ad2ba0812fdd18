//! Engine - the single control loop
//!
//! Owns the supervisor and the router and processes packager events and
//! user messages one at a time.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;

use rndemon_core::prelude::*;
use rndemon_core::{MarkerResolver, Notifier, OutputFilter, WorkspaceResolver};
use rndemon_daemon::{ProcessSupervisor, TaggedEvent};

use crate::browser::{SystemBrowser, UrlOpener};
use crate::config::{self, Settings};
use crate::message::Message;
use crate::router::{DevCommands, RouterOptions};
use crate::signals;

const MESSAGE_CHANNEL_CAPACITY: usize = 256;

/// One unit of work picked by the loop
enum Next {
    Packager(TaggedEvent),
    Message(Message),
    Closed,
}

pub struct Engine {
    supervisor: ProcessSupervisor,
    router: DevCommands,
    notifier: Arc<dyn Notifier>,

    /// Clone this to give to input sources (stdin reader, signal handler)
    msg_tx: mpsc::Sender<Message>,
    msg_rx: mpsc::Receiver<Message>,

    pub settings: Settings,
    pub project_path: PathBuf,
    quit: bool,
}

impl Engine {
    /// Create an engine for the project under `project_path`.
    ///
    /// Loads `.rndemon/config.toml`, searches for the React Native project
    /// below `project_path`, and spawns the signal handler.
    pub fn new(project_path: PathBuf, notifier: Arc<dyn Notifier>) -> Self {
        let settings = config::load_settings(&project_path);

        let resolver = MarkerResolver::new(&project_path)
            .with_marker(settings.packager.marker.clone())
            .with_max_depth(settings.packager.search_depth);
        let opener = SystemBrowser::new(settings.devtools.browser.clone());

        let engine = Self::with_parts(
            project_path,
            settings,
            Arc::new(resolver),
            notifier,
            Arc::new(opener),
        );
        signals::spawn_signal_handler(engine.msg_sender());
        engine
    }

    /// Assemble an engine from explicit collaborators
    pub fn with_parts(
        project_path: PathBuf,
        settings: Settings,
        resolver: Arc<dyn WorkspaceResolver>,
        notifier: Arc<dyn Notifier>,
        opener: Arc<dyn UrlOpener>,
    ) -> Self {
        let filter = settings.output_filter().unwrap_or_else(|e| {
            warn!("Using the built-in denylist: {}", e);
            OutputFilter::default()
        });
        let options = RouterOptions {
            base_args: settings.packager.args.clone(),
            show_stderr: settings.output.show_stderr,
        };

        let supervisor =
            ProcessSupervisor::new(settings.supervisor_config(), resolver, notifier.clone());
        let router = DevCommands::new(options, filter, notifier.clone(), opener);
        let (msg_tx, msg_rx) = mpsc::channel(MESSAGE_CHANNEL_CAPACITY);

        Self {
            supervisor,
            router,
            notifier,
            msg_tx,
            msg_rx,
            settings,
            project_path,
            quit: false,
        }
    }

    pub fn msg_sender(&self) -> mpsc::Sender<Message> {
        self.msg_tx.clone()
    }

    pub fn should_quit(&self) -> bool {
        self.quit
    }

    pub fn supervisor(&self) -> &ProcessSupervisor {
        &self.supervisor
    }

    pub fn router(&self) -> &DevCommands {
        &self.router
    }

    /// Handle one user message
    pub async fn process_message(&mut self, msg: Message) {
        debug!("Processing {:?}", msg);
        match msg {
            Message::Start { args } => {
                self.router.start(&mut self.supervisor, &args).await;
            }
            Message::Command(id) => {
                self.router.execute(&mut self.supervisor, &id).await;
            }
            Message::Help => {
                let titles = self
                    .router
                    .titles()
                    .into_iter()
                    .map(|(id, title)| format!("{id}: {title}"))
                    .collect();
                self.notifier.lines(titles);
            }
            Message::Quit => {
                info!("Quit requested");
                self.quit = true;
            }
        }
    }

    /// Handle one packager event and everything its handlers queued
    pub fn process_packager_event(&mut self, event: TaggedEvent) {
        self.supervisor.handle_event(event);
        self.router.drain_updates();
    }

    /// Wait for and process the next packager event or message.
    ///
    /// Returns `false` once the loop should end.
    pub async fn step(&mut self) -> bool {
        let next = tokio::select! {
            Some(event) = self.supervisor.recv() => Next::Packager(event),
            msg = self.msg_rx.recv() => match msg {
                Some(msg) => Next::Message(msg),
                None => Next::Closed,
            },
        };

        match next {
            Next::Packager(event) => self.process_packager_event(event),
            Next::Message(msg) => self.process_message(msg).await,
            Next::Closed => {
                info!("Message channel closed");
                return false;
            }
        }
        !self.quit
    }

    /// Run until quit
    pub async fn run(&mut self) {
        while self.step().await {}
    }

    /// Stop the packager; never fails
    pub async fn shutdown(&mut self) {
        self.router.shutdown(&mut self.supervisor).await;
        info!("Engine shut down");
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::commands::{RELOAD_COMMAND, STOP_COMMAND};
    use mockall::mock;
    use rndemon_core::test_utils::RecordingNotifier;
    use rndemon_core::FixedResolver;
    use std::time::Duration;

    mock! {
        Opener {}
        impl UrlOpener for Opener {
            fn open(&self, url: &str) -> std::io::Result<()>;
        }
    }

    fn engine(script: &str) -> (Engine, Arc<RecordingNotifier>) {
        let notifier = Arc::new(RecordingNotifier::new());
        let mut settings = Settings::default();
        settings.packager.program = "sh".to_string();
        settings.packager.args = vec!["-c".to_string(), script.to_string()];
        settings.packager.stop_timeout_ms = 2000;

        let engine = Engine::with_parts(
            std::env::temp_dir(),
            settings,
            Arc::new(FixedResolver(Some(std::env::temp_dir()))),
            notifier.clone(),
            Arc::new(MockOpener::new()),
        );
        (engine, notifier)
    }

    async fn step_until(engine: &mut Engine, mut done: impl FnMut(&Engine) -> bool) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !done(engine) {
                engine.step().await;
            }
        })
        .await
        .expect("engine did not reach the expected state");
    }

    #[tokio::test]
    async fn test_start_registers_commands() {
        let (mut engine, notifier) = engine("sleep 30");

        engine.process_message(Message::start(Vec::<String>::new())).await;
        assert!(engine.supervisor().is_running());
        assert!(engine.router().is_registered(RELOAD_COMMAND));
        assert!(notifier.contains("Starting the React Native packager..."));

        engine.shutdown().await;
        assert!(!engine.supervisor().is_running());
    }

    #[tokio::test]
    async fn test_output_reaches_notifier_and_exit_unregisters() {
        let (mut engine, notifier) = engine("echo 'Welcome to Metro'; exit 1");

        engine.process_message(Message::start(Vec::<String>::new())).await;
        step_until(&mut engine, |e| !e.router().has_commands()).await;

        assert!(notifier.contains("Welcome to Metro"));
        engine.process_message(Message::command(RELOAD_COMMAND)).await;
        assert!(notifier.contains("React Native packager is not running!"));
    }

    #[tokio::test]
    async fn test_messages_from_channel() {
        let (mut engine, notifier) = engine("sleep 30");
        let tx = engine.msg_sender();

        tx.send(Message::start(Vec::<String>::new())).await.unwrap();
        tx.send(Message::command(STOP_COMMAND)).await.unwrap();
        tx.send(Message::Quit).await.unwrap();

        tokio::time::timeout(Duration::from_secs(5), engine.run())
            .await
            .expect("engine did not quit");

        assert!(engine.should_quit());
        assert!(!engine.supervisor().is_running());
        assert!(notifier.contains("React Native packager stopped."));
    }

    #[tokio::test]
    async fn test_help_lists_commands() {
        let (mut engine, notifier) = engine("sleep 30");

        engine.process_message(Message::Help).await;
        assert_eq!(notifier.texts(), vec!["rn.start: start React Native packager"]);

        engine.process_message(Message::start(Vec::<String>::new())).await;
        notifier.clear();
        engine.process_message(Message::Help).await;
        assert!(notifier.contains("rn.dev.reload: Reload the app"));

        engine.shutdown().await;
    }
}
