//! Packager supervision
//!
//! [`ProcessSupervisor`] owns at most one [`PackagerProcess`] and turns its
//! raw events into line batches, exit codes and error messages for
//! subscribers. The owning control loop pulls events with
//! [`recv`](ProcessSupervisor::recv) and hands them back through
//! [`handle_event`](ProcessSupervisor::handle_event), so handlers always run
//! on that loop, one event at a time.

use std::collections::VecDeque;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use rndemon_core::events::{OutputStream, ProcessEvent};
use rndemon_core::prelude::*;
use rndemon_core::{LineBuffer, Notifier, WorkspaceResolver, DEFAULT_LINE_BREAK};

use crate::commands::INTERRUPT;
use crate::process::{PackagerProcess, SpawnSpec, TaggedEvent};

pub const WORKSPACE_NOT_FOUND_MESSAGE: &str = "React Native project workspaceFolder not found!";
pub const STARTING_MESSAGE: &str = "Starting the React Native packager...";
pub const STOPPED_MESSAGE: &str = "React Native packager stopped.";
pub const NOT_RUNNING_MESSAGE: &str = "React Native packager is not running!";

/// Default program used to run the packager
pub const DEFAULT_PROGRAM: &str = "react-native";

/// Default bound on waiting for a killed packager to exit
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(5);

const EVENT_CHANNEL_CAPACITY: usize = 256;

pub type ExitHandler = Box<dyn FnMut(Option<i32>) + Send>;
pub type ErrorHandler = Box<dyn FnMut(&str) + Send>;
pub type LinesHandler = Box<dyn FnMut(&[String]) + Send>;

/// A handler installation, applied to the current process or queued until
/// the next one starts
pub enum Subscription {
    Exit(ExitHandler),
    Error(ErrorHandler),
    Stdout(LinesHandler),
    Stderr(LinesHandler),
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            Self::Exit(_) => "Exit",
            Self::Error(_) => "Error",
            Self::Stdout(_) => "Stdout",
            Self::Stderr(_) => "Stderr",
        };
        write!(f, "Subscription::{kind}")
    }
}

/// Handlers attached to one process instance
#[derive(Default)]
struct Listeners {
    exit: Vec<ExitHandler>,
    error: Vec<ErrorHandler>,
    stdout: Vec<LinesHandler>,
    stderr: Vec<LinesHandler>,
}

impl Listeners {
    fn attach(&mut self, subscription: Subscription) {
        match subscription {
            Subscription::Exit(h) => self.exit.push(h),
            Subscription::Error(h) => self.error.push(h),
            Subscription::Stdout(h) => self.stdout.push(h),
            Subscription::Stderr(h) => self.stderr.push(h),
        }
    }

    fn emit_lines(&mut self, stream: OutputStream, lines: &[String]) {
        let handlers = match stream {
            OutputStream::Stdout => &mut self.stdout,
            OutputStream::Stderr => &mut self.stderr,
        };
        for handler in handlers.iter_mut() {
            handler(lines);
        }
    }
}

/// Per-instance state: its generation, handlers and line buffers
struct Session {
    generation: u64,
    listeners: Listeners,
    stdout: LineBuffer,
    stderr: LineBuffer,
}

impl Session {
    fn new(generation: u64, line_break: &str) -> Self {
        Self {
            generation,
            listeners: Listeners::default(),
            stdout: LineBuffer::with_delimiter(line_break),
            stderr: LineBuffer::with_delimiter(line_break),
        }
    }

    fn buffer(&mut self, stream: OutputStream) -> &mut LineBuffer {
        match stream {
            OutputStream::Stdout => &mut self.stdout,
            OutputStream::Stderr => &mut self.stderr,
        }
    }

    fn push(&mut self, stream: OutputStream, chunk: &[u8]) {
        let lines = self.buffer(stream).push(chunk);
        if !lines.is_empty() {
            self.listeners.emit_lines(stream, &lines);
        }
    }

    /// Surface unterminated trailing output on both channels
    fn flush(&mut self) {
        for stream in [OutputStream::Stdout, OutputStream::Stderr] {
            if let Some(line) = self.buffer(stream).finish() {
                self.listeners.emit_lines(stream, &[line]);
            }
        }
    }
}

enum State {
    /// No process. Subscriptions wait here for the next start.
    Idle { pending: Vec<Subscription> },
    Running {
        session: Session,
        process: PackagerProcess,
    },
    /// Spawn was attempted and failed; the error event is still deferred
    SpawnFailed { session: Session },
}

impl State {
    fn idle() -> Self {
        Self::Idle {
            pending: Vec::new(),
        }
    }

    fn session_mut(&mut self) -> Option<&mut Session> {
        match self {
            Self::Idle { .. } => None,
            Self::Running { session, .. } | Self::SpawnFailed { session } => Some(session),
        }
    }
}

/// Supervisor configuration
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Executable name or path (resolved through `PATH`)
    pub program: String,
    /// Line break sequence used to segment output
    pub line_break: String,
    /// How long `stop()` waits for the killed process to exit
    pub stop_timeout: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            program: DEFAULT_PROGRAM.to_string(),
            line_break: DEFAULT_LINE_BREAK.to_string(),
            stop_timeout: DEFAULT_STOP_TIMEOUT,
        }
    }
}

/// Owns the packager process and its subscriptions
pub struct ProcessSupervisor {
    config: SupervisorConfig,
    resolver: Arc<dyn WorkspaceResolver>,
    notifier: Arc<dyn Notifier>,
    state: State,
    generation: u64,
    event_tx: mpsc::Sender<TaggedEvent>,
    event_rx: mpsc::Receiver<TaggedEvent>,
    /// Events raised by the supervisor itself, served before the channel
    deferred: VecDeque<TaggedEvent>,
}

impl ProcessSupervisor {
    pub fn new(
        config: SupervisorConfig,
        resolver: Arc<dyn WorkspaceResolver>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            config,
            resolver,
            notifier,
            state: State::idle(),
            generation: 0,
            event_tx,
            event_rx,
            deferred: VecDeque::new(),
        }
    }

    /// Start the packager with `args`, replacing any running instance.
    ///
    /// Returns `false` only when no project directory could be resolved.
    /// A failed spawn still returns `true`; the failure arrives as an error
    /// event through [`recv`](Self::recv).
    pub async fn start(&mut self, args: &[String]) -> bool {
        self.stop().await;

        let Some(cwd) = self.resolver.resolve() else {
            warn!("No React Native project found; not starting packager");
            self.notifier.message(WORKSPACE_NOT_FOUND_MESSAGE);
            return false;
        };

        self.notifier.message(STARTING_MESSAGE);

        let pending = match std::mem::replace(&mut self.state, State::idle()) {
            State::Idle { pending } => pending,
            // stop() always leaves the supervisor idle
            _ => Vec::new(),
        };

        self.generation += 1;
        let mut session = Session::new(self.generation, &self.config.line_break);
        let drained = pending.len();
        for subscription in pending {
            session.listeners.attach(subscription);
        }
        if drained > 0 {
            debug!("Installed {} pending subscription(s)", drained);
        }

        self.state = match self.spawn(cwd, args) {
            Ok(process) => State::Running { session, process },
            Err(e) => {
                error!("Failed to start packager: {}", e);
                self.deferred.push_back(TaggedEvent {
                    generation: self.generation,
                    event: ProcessEvent::Error {
                        message: e.to_string(),
                    },
                });
                State::SpawnFailed { session }
            }
        };

        true
    }

    fn spawn(&self, cwd: PathBuf, args: &[String]) -> Result<PackagerProcess> {
        let spec = SpawnSpec {
            program: self.config.program.clone(),
            args: args.to_vec(),
            cwd,
        };
        PackagerProcess::spawn(&spec, self.generation, self.event_tx.clone())
    }

    /// Stop the running packager, if any. Always returns `true`.
    ///
    /// The instance's handlers are released with it and do not fire; any of
    /// its events still in flight are discarded as stale.
    pub async fn stop(&mut self) -> bool {
        match std::mem::replace(&mut self.state, State::idle()) {
            State::Running { mut process, .. } => {
                if process.is_writable() {
                    if let Err(e) = process.send(INTERRUPT.to_vec()).await {
                        debug!("Interrupt not delivered: {}", e);
                    }
                    if !process.terminate(self.config.stop_timeout).await {
                        warn!(
                            "Packager (PID {:?}) did not exit within {:?}; releasing handle",
                            process.id(),
                            self.config.stop_timeout
                        );
                    }
                    info!("Packager stopped");
                    self.notifier.message(STOPPED_MESSAGE);
                }
            }
            State::SpawnFailed { .. } => {}
            idle @ State::Idle { .. } => self.state = idle,
        }
        true
    }

    /// Write raw bytes to the packager's stdin.
    ///
    /// Empty input is ignored. Returns whether the bytes were queued.
    pub async fn send_command(&mut self, bytes: Option<&[u8]>) -> bool {
        let Some(bytes) = bytes.filter(|b| !b.is_empty()) else {
            return false;
        };

        if let State::Running { process, .. } = &self.state {
            if process.is_writable() {
                match process.send(bytes.to_vec()).await {
                    Ok(()) => return true,
                    Err(e) => warn!("Failed to send command: {}", e),
                }
            }
        }

        self.notifier.message(NOT_RUNNING_MESSAGE);
        false
    }

    /// True while a process is alive and accepting input
    pub fn is_running(&self) -> bool {
        matches!(&self.state, State::Running { process, .. } if process.is_writable())
    }

    /// Generation of the most recent start, 0 before the first
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn pid(&self) -> Option<u32> {
        match &self.state {
            State::Running { process, .. } => process.id(),
            _ => None,
        }
    }

    /// Subscriptions waiting for the next start
    pub fn pending_subscriptions(&self) -> usize {
        match &self.state {
            State::Idle { pending } => pending.len(),
            _ => 0,
        }
    }

    /// Attach to the current instance, or queue for the next one
    pub fn subscribe(&mut self, subscription: Subscription) {
        match &mut self.state {
            State::Idle { pending } => {
                trace!("Queueing {:?}", subscription);
                pending.push(subscription);
            }
            State::Running { session, .. } | State::SpawnFailed { session } => {
                session.listeners.attach(subscription);
            }
        }
    }

    pub fn on_exit(&mut self, handler: impl FnMut(Option<i32>) + Send + 'static) {
        self.subscribe(Subscription::Exit(Box::new(handler)));
    }

    pub fn on_error(&mut self, handler: impl FnMut(&str) + Send + 'static) {
        self.subscribe(Subscription::Error(Box::new(handler)));
    }

    pub fn on_stdout(&mut self, handler: impl FnMut(&[String]) + Send + 'static) {
        self.subscribe(Subscription::Stdout(Box::new(handler)));
    }

    pub fn on_stderr(&mut self, handler: impl FnMut(&[String]) + Send + 'static) {
        self.subscribe(Subscription::Stderr(Box::new(handler)));
    }

    /// Next event: a deferred spawn failure first, then raw events from the
    /// process tasks.
    ///
    /// Cancel-safe; intended for use in `tokio::select!`.
    pub async fn recv(&mut self) -> Option<TaggedEvent> {
        if let Some(event) = self.deferred.pop_front() {
            return Some(event);
        }
        self.event_rx.recv().await
    }

    /// Dispatch one event to the current instance's handlers.
    ///
    /// Events from a previous generation are dropped. Exit and error flush
    /// pending partial lines first, then return the supervisor to idle.
    pub fn handle_event(&mut self, tagged: TaggedEvent) {
        let current = self.state.session_mut().map(|s| s.generation);
        if current != Some(tagged.generation) {
            trace!(
                "Discarding stale event from generation {} (current {:?})",
                tagged.generation,
                current
            );
            return;
        }

        match tagged.event {
            ProcessEvent::Output { stream, chunk } => {
                if let Some(session) = self.state.session_mut() {
                    session.push(stream, &chunk);
                }
            }
            ProcessEvent::Exited { code } => {
                info!("Packager exited with code {:?}", code);
                if let Some(mut session) = self.finish_session() {
                    for handler in session.listeners.exit.iter_mut() {
                        handler(code);
                    }
                }
            }
            ProcessEvent::Error { message } => {
                error!("Packager error: {}", message);
                if let Some(mut session) = self.finish_session() {
                    for handler in session.listeners.error.iter_mut() {
                        handler(&message);
                    }
                }
            }
        }
    }

    /// Flush the current session and go idle, handing the session back
    fn finish_session(&mut self) -> Option<Session> {
        let mut session = match std::mem::replace(&mut self.state, State::idle()) {
            State::Running { session, .. } | State::SpawnFailed { session } => session,
            idle @ State::Idle { .. } => {
                self.state = idle;
                return None;
            }
        };
        session.flush();
        Some(session)
    }

    /// Stop the packager during teardown
    pub async fn shutdown(&mut self) {
        if self.is_running() {
            info!("Shutting down packager");
        }
        self.stop().await;
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use mockall::mock;
    use rndemon_core::test_utils::RecordingNotifier;
    use rndemon_core::FixedResolver;
    use std::sync::Mutex;

    mock! {
        Resolver {}
        impl WorkspaceResolver for Resolver {
            fn resolve(&self) -> Option<PathBuf>;
        }
    }

    fn supervisor_with(
        resolver: Arc<dyn WorkspaceResolver>,
    ) -> (ProcessSupervisor, Arc<RecordingNotifier>) {
        let notifier = Arc::new(RecordingNotifier::new());
        let config = SupervisorConfig {
            program: "sh".to_string(),
            stop_timeout: Duration::from_secs(2),
            ..Default::default()
        };
        let supervisor = ProcessSupervisor::new(config, resolver, notifier.clone());
        (supervisor, notifier)
    }

    fn supervisor() -> (ProcessSupervisor, Arc<RecordingNotifier>) {
        supervisor_with(Arc::new(FixedResolver(Some(std::env::temp_dir()))))
    }

    fn script(s: &str) -> Vec<String> {
        vec!["-c".to_string(), s.to_string()]
    }

    /// Pump events until the current generation terminates
    async fn drive_to_exit(supervisor: &mut ProcessSupervisor) {
        loop {
            let event = tokio::time::timeout(Duration::from_secs(5), supervisor.recv())
                .await
                .expect("timed out waiting for packager event")
                .expect("event channel open");
            let done = event.event.is_terminal() && event.generation == supervisor.generation();
            supervisor.handle_event(event);
            if done {
                break;
            }
        }
    }

    fn collector() -> (Arc<Mutex<Vec<String>>>, impl FnMut(&[String]) + Send + 'static) {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let sink = lines.clone();
        (lines, move |batch: &[String]| {
            sink.lock().unwrap().extend_from_slice(batch)
        })
    }

    #[tokio::test]
    async fn test_pending_subscriptions_drained_on_start() {
        let (mut supervisor, _) = supervisor();
        let (lines, handler) = collector();
        supervisor.on_stdout(handler);
        assert_eq!(supervisor.pending_subscriptions(), 1);

        assert!(supervisor.start(&script("printf 'hello\\nworld\\n'")).await);
        assert_eq!(supervisor.pending_subscriptions(), 0);

        drive_to_exit(&mut supervisor).await;
        assert_eq!(*lines.lock().unwrap(), vec!["hello", "world"]);
    }

    #[tokio::test]
    async fn test_partial_line_flushed_before_exit() {
        let (mut supervisor, _) = supervisor();
        let order = Arc::new(Mutex::new(Vec::new()));

        let o = order.clone();
        supervisor.on_stdout(move |batch| o.lock().unwrap().extend(batch.iter().cloned()));
        let o = order.clone();
        supervisor.on_exit(move |code| o.lock().unwrap().push(format!("exit {code:?}")));

        supervisor.start(&script("printf 'done\\nno newline'")).await;
        drive_to_exit(&mut supervisor).await;

        assert_eq!(
            *order.lock().unwrap(),
            vec!["done", "no newline", "exit Some(0)"]
        );
    }

    #[tokio::test]
    async fn test_exit_code_reported() {
        let (mut supervisor, _) = supervisor();
        let codes = Arc::new(Mutex::new(Vec::new()));
        let c = codes.clone();
        supervisor.on_exit(move |code| c.lock().unwrap().push(code));

        supervisor.start(&script("exit 3")).await;
        drive_to_exit(&mut supervisor).await;

        assert_eq!(*codes.lock().unwrap(), vec![Some(3)]);
        assert!(!supervisor.is_running());
    }

    #[tokio::test]
    async fn test_restart_discards_previous_instance() {
        let (mut supervisor, _) = supervisor();

        supervisor.start(&script("echo first; sleep 30")).await;
        let first_pid = supervisor.pid();
        let first_generation = supervisor.generation();
        let first_exits = Arc::new(Mutex::new(0));
        let f = first_exits.clone();
        supervisor.on_exit(move |_| *f.lock().unwrap() += 1);
        let (first_lines, handler) = collector();
        supervisor.on_stdout(handler);

        supervisor.start(&script("echo second")).await;
        assert_ne!(supervisor.pid(), first_pid);
        assert_eq!(supervisor.generation(), first_generation + 1);

        let second_exits = Arc::new(Mutex::new(0));
        let s = second_exits.clone();
        supervisor.on_exit(move |_| *s.lock().unwrap() += 1);

        drive_to_exit(&mut supervisor).await;

        assert_eq!(*first_exits.lock().unwrap(), 0);
        assert_eq!(*second_exits.lock().unwrap(), 1);
        assert!(first_lines.lock().unwrap().iter().all(|l| l != "second"));
    }

    #[tokio::test]
    async fn test_stale_generation_ignored() {
        let (mut supervisor, _) = supervisor();
        supervisor.start(&script("sleep 30")).await;

        let exits = Arc::new(Mutex::new(0));
        let e = exits.clone();
        supervisor.on_exit(move |_| *e.lock().unwrap() += 1);

        supervisor.handle_event(TaggedEvent {
            generation: supervisor.generation() - 1,
            event: ProcessEvent::Exited { code: Some(0) },
        });

        assert!(supervisor.is_running());
        assert_eq!(*exits.lock().unwrap(), 0);
        supervisor.shutdown().await;
    }

    #[tokio::test]
    async fn test_stop_running_packager() {
        let (mut supervisor, notifier) = supervisor();
        supervisor.start(&script("sleep 30")).await;
        assert!(supervisor.is_running());

        assert!(supervisor.stop().await);
        assert!(!supervisor.is_running());
        assert!(notifier.contains(STOPPED_MESSAGE));
    }

    #[tokio::test]
    async fn test_stop_when_idle_is_silent() {
        let (mut supervisor, notifier) = supervisor();
        supervisor.on_exit(|_| {});

        assert!(supervisor.stop().await);
        assert!(notifier.shown().is_empty());
        assert_eq!(supervisor.pending_subscriptions(), 1);
    }

    #[tokio::test]
    async fn test_send_command_when_idle() {
        let (mut supervisor, notifier) = supervisor();

        assert!(!supervisor.send_command(Some(b"r\n")).await);
        assert!(notifier.contains(NOT_RUNNING_MESSAGE));
    }

    #[tokio::test]
    async fn test_send_command_ignores_empty_bytes() {
        let (mut supervisor, notifier) = supervisor();

        assert!(!supervisor.send_command(None).await);
        assert!(!supervisor.send_command(Some(b"")).await);
        assert!(notifier.shown().is_empty());
    }

    #[tokio::test]
    async fn test_send_command_reaches_stdin() {
        let (mut supervisor, _) = supervisor();
        let (lines, handler) = collector();
        supervisor.on_stdout(handler);

        supervisor.start(&script("read key; echo \"got $key\"")).await;
        assert!(supervisor.send_command(Some(b"r\n")).await);
        drive_to_exit(&mut supervisor).await;

        assert_eq!(*lines.lock().unwrap(), vec!["got r"]);
    }

    #[tokio::test]
    async fn test_missing_workspace() {
        let mut resolver = MockResolver::new();
        resolver.expect_resolve().times(1).return_const(None::<PathBuf>);
        let (mut supervisor, notifier) = supervisor_with(Arc::new(resolver));
        supervisor.on_exit(|_| {});

        assert!(!supervisor.start(&[]).await);
        assert!(notifier.contains(WORKSPACE_NOT_FOUND_MESSAGE));
        assert!(!notifier.contains(STARTING_MESSAGE));
        assert_eq!(supervisor.pending_subscriptions(), 1);
        assert_eq!(supervisor.generation(), 0);
    }

    #[tokio::test]
    async fn test_spawn_failure_reported_through_error_event() {
        let notifier = Arc::new(RecordingNotifier::new());
        let config = SupervisorConfig {
            program: "rndemon-definitely-missing-binary".to_string(),
            ..Default::default()
        };
        let mut supervisor = ProcessSupervisor::new(
            config,
            Arc::new(FixedResolver(Some(std::env::temp_dir()))),
            notifier.clone(),
        );
        let errors = Arc::new(Mutex::new(Vec::new()));
        let e = errors.clone();
        supervisor.on_error(move |message| e.lock().unwrap().push(message.to_string()));

        assert!(supervisor.start(&[]).await);
        assert!(!supervisor.is_running());
        assert!(notifier.contains(STARTING_MESSAGE));

        drive_to_exit(&mut supervisor).await;

        let errors = errors.lock().unwrap();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("not found"));
    }

    #[tokio::test]
    async fn test_spawn_failure_delivered_when_channel_is_full() {
        let (mut supervisor, _) = supervisor();
        supervisor.config.program = "rndemon-definitely-missing-binary".to_string();
        // Saturate the channel with stale events
        while supervisor
            .event_tx
            .try_send(TaggedEvent {
                generation: 0,
                event: ProcessEvent::Exited { code: Some(0) },
            })
            .is_ok()
        {}

        let errors = Arc::new(Mutex::new(Vec::new()));
        let e = errors.clone();
        supervisor.on_error(move |message| e.lock().unwrap().push(message.to_string()));

        assert!(supervisor.start(&[]).await);
        drive_to_exit(&mut supervisor).await;

        assert_eq!(errors.lock().unwrap().len(), 1);
        assert_eq!(supervisor.pending_subscriptions(), 0);
        assert!(!supervisor.is_running());
    }

    #[tokio::test]
    async fn test_not_running_once_child_exits_with_pipes_open() {
        let (mut supervisor, notifier) = supervisor();
        // The background sleep inherits stdout/stderr past the shell's exit
        supervisor.start(&script("sleep 3 & exit 0")).await;

        tokio::time::timeout(Duration::from_millis(400), async {
            while supervisor.is_running() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("supervisor still reports a running packager");

        assert!(!supervisor.send_command(Some(b"r\n")).await);
        assert!(notifier.contains(NOT_RUNNING_MESSAGE));
    }

    #[tokio::test]
    async fn test_subscription_after_start_attaches_immediately() {
        let (mut supervisor, _) = supervisor();
        supervisor.start(&script("sleep 0.2; echo late")).await;

        let (lines, handler) = collector();
        supervisor.on_stdout(handler);
        assert_eq!(supervisor.pending_subscriptions(), 0);

        drive_to_exit(&mut supervisor).await;
        assert_eq!(*lines.lock().unwrap(), vec!["late"]);
    }

    #[tokio::test]
    async fn test_crlf_line_break() {
        let notifier = Arc::new(RecordingNotifier::new());
        let config = SupervisorConfig {
            program: "sh".to_string(),
            line_break: "\r\n".to_string(),
            ..Default::default()
        };
        let mut supervisor = ProcessSupervisor::new(
            config,
            Arc::new(FixedResolver(Some(std::env::temp_dir()))),
            notifier,
        );
        let (lines, handler) = collector();
        supervisor.on_stdout(handler);

        supervisor.start(&script("printf 'a\\r\\nb\\r\\n'")).await;
        drive_to_exit(&mut supervisor).await;

        assert_eq!(*lines.lock().unwrap(), vec!["a", "b"]);
    }
}
