//! Packager process management

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot, Notify};
use tokio::task::JoinHandle;

use rndemon_core::events::{OutputStream, ProcessEvent};
use rndemon_core::prelude::*;

/// Size of a single pipe read
const READ_CHUNK_SIZE: usize = 8 * 1024;

/// How long the wait task lets the readers drain after the child exits.
///
/// Grandchildren (Metro's node workers) can keep the pipes open after the
/// CLI itself is gone, so the drain cannot be unbounded.
const READER_DRAIN_TIMEOUT: Duration = Duration::from_millis(500);

/// A process event tagged with the session generation that produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedEvent {
    pub generation: u64,
    pub event: ProcessEvent,
}

/// What to run and where
#[derive(Debug, Clone)]
pub struct SpawnSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
}

/// Manages the packager child process.
///
/// The `Child` handle is moved into a dedicated `wait_for_exit` task. That
/// task also drains the stdout/stderr readers before reporting the exit, so
/// every output chunk is sent before `ProcessEvent::Exited`.
///
/// `PackagerProcess` keeps a kill channel, an atomic exit flag for
/// synchronous liveness checks, and a [`Notify`] so termination can be
/// awaited with a timeout.
pub struct PackagerProcess {
    /// Sender for raw stdin bytes
    stdin_tx: mpsc::Sender<Vec<u8>>,
    /// Cleared by the writer task when stdin can no longer be written
    stdin_open: Arc<AtomicBool>,
    /// Process ID for logging
    pid: Option<u32>,
    /// One-shot sender that tells the wait task to force-kill the process
    kill_tx: Option<oneshot::Sender<()>>,
    /// Set by the wait task once the child has exited
    exited: Arc<AtomicBool>,
    /// Notified by the wait task immediately after the child exits
    exit_notify: Arc<Notify>,
}

impl PackagerProcess {
    /// Spawn the packager. Output and exit are reported on `event_tx`,
    /// tagged with `generation`.
    pub fn spawn(
        spec: &SpawnSpec,
        generation: u64,
        event_tx: mpsc::Sender<TaggedEvent>,
    ) -> Result<Self> {
        let program = which::which(&spec.program)
            .map_err(|_| Error::packager_not_found(spec.program.clone()))?;

        info!(
            "Spawning packager: {} {} (cwd: {})",
            spec.program,
            spec.args.join(" "),
            spec.cwd.display()
        );

        let mut child = Command::new(&program)
            .args(&spec.args)
            .current_dir(&spec.cwd)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound && !spec.cwd.exists() {
                    Error::workspace_not_found(spec.cwd.clone())
                } else {
                    Error::process_spawn(e.to_string())
                }
            })?;

        let pid = child.id();
        info!("Packager process started with PID: {:?}", pid);

        Ok(Self::attach(&mut child, pid, generation, event_tx).finish(child))
    }

    /// Wire the I/O tasks around a freshly spawned child
    fn attach(
        child: &mut Child,
        pid: Option<u32>,
        generation: u64,
        event_tx: mpsc::Sender<TaggedEvent>,
    ) -> Attached {
        let stdin_open = Arc::new(AtomicBool::new(true));
        let (stdin_tx, stdin_rx) = mpsc::channel::<Vec<u8>>(32);
        match child.stdin.take() {
            Some(stdin) => {
                tokio::spawn(Self::stdin_writer(stdin, stdin_rx, Arc::clone(&stdin_open)));
            }
            None => stdin_open.store(false, Ordering::Release),
        }

        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(tokio::spawn(Self::output_reader(
                stdout,
                OutputStream::Stdout,
                generation,
                event_tx.clone(),
            )));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(tokio::spawn(Self::output_reader(
                stderr,
                OutputStream::Stderr,
                generation,
                event_tx.clone(),
            )));
        }

        Attached {
            stdin_tx,
            stdin_open,
            pid,
            generation,
            event_tx,
            readers,
        }
    }

    /// Background task: owns `child`, waits for it to exit, marks it exited,
    /// drains the readers, then emits `ProcessEvent::Exited`.
    async fn wait_for_exit(
        mut child: Child,
        kill_rx: oneshot::Receiver<()>,
        readers: Vec<JoinHandle<()>>,
        generation: u64,
        event_tx: mpsc::Sender<TaggedEvent>,
        exited: Arc<AtomicBool>,
        exit_notify: Arc<Notify>,
    ) {
        let outcome = tokio::select! {
            result = child.wait() => result,
            _ = kill_rx => {
                info!("Kill signal received, force-killing packager");
                if let Err(e) = child.kill().await {
                    error!("Failed to kill packager: {}", e);
                }
                child.wait().await
            }
        };

        // Liveness flips as soon as the child is reaped, even while a
        // grandchild still holds the pipes open.
        exited.store(true, Ordering::Release);
        exit_notify.notify_waiters();

        for reader in readers {
            if tokio::time::timeout(READER_DRAIN_TIMEOUT, reader).await.is_err() {
                warn!("Output reader still open {:?} after exit", READER_DRAIN_TIMEOUT);
            }
        }

        let event = match outcome {
            Ok(status) => {
                info!("Packager exited with status: {:?}", status);
                ProcessEvent::Exited {
                    code: status.code(),
                }
            }
            Err(e) => {
                error!("Error waiting for packager: {}", e);
                ProcessEvent::Error {
                    message: e.to_string(),
                }
            }
        };

        debug!("Sending {:?} for generation {}", event, generation);
        let _ = event_tx.send(TaggedEvent { generation, event }).await;
    }

    /// Read raw chunks from one pipe and forward them unchanged
    async fn output_reader<R>(
        mut pipe: R,
        stream: OutputStream,
        generation: u64,
        tx: mpsc::Sender<TaggedEvent>,
    ) where
        R: AsyncRead + Unpin,
    {
        let mut buf = vec![0u8; READ_CHUNK_SIZE];
        loop {
            match pipe.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => {
                    trace!("{}: {} bytes", stream, n);
                    let event = ProcessEvent::Output {
                        stream,
                        chunk: buf[..n].to_vec(),
                    };
                    if tx.send(TaggedEvent { generation, event }).await.is_err() {
                        debug!("{} channel closed", stream);
                        break;
                    }
                }
                Err(e) => {
                    warn!("Failed to read {}: {}", stream, e);
                    break;
                }
            }
        }
        debug!("{} reader finished", stream);
    }

    /// Write raw bytes to stdin
    async fn stdin_writer(
        mut stdin: tokio::process::ChildStdin,
        mut rx: mpsc::Receiver<Vec<u8>>,
        open: Arc<AtomicBool>,
    ) {
        while let Some(bytes) = rx.recv().await {
            debug!("Writing {} byte(s) to packager stdin", bytes.len());

            if let Err(e) = stdin.write_all(&bytes).await {
                error!("Failed to write to stdin: {}", e);
                break;
            }
            if let Err(e) = stdin.flush().await {
                error!("Failed to flush stdin: {}", e);
                break;
            }
        }

        open.store(false, Ordering::Release);
        debug!("stdin writer finished");
    }

    /// Queue raw bytes for the packager's stdin
    pub async fn send(&self, bytes: Vec<u8>) -> Result<()> {
        self.stdin_tx
            .send(bytes)
            .await
            .map_err(|_| Error::channel_send("stdin channel closed"))
    }

    /// Force-kill and wait up to `timeout` for the exit to be confirmed.
    ///
    /// Returns `false` if the process was still alive when the timeout hit.
    pub async fn terminate(&mut self, timeout: Duration) -> bool {
        // Create the waiter before signalling so the wakeup cannot be missed
        let notified = self.exit_notify.notified();
        if self.has_exited() {
            return true;
        }

        warn!("Force killing packager (PID {:?})", self.pid);
        if let Some(tx) = self.kill_tx.take() {
            // The wait task may have finished already
            let _ = tx.send(());
        }

        match tokio::time::timeout(timeout, notified).await {
            Ok(()) => true,
            Err(_) => self.has_exited(),
        }
    }

    /// Non-blocking check backed by the wait task's atomic flag
    pub fn has_exited(&self) -> bool {
        self.exited.load(Ordering::Acquire)
    }

    pub fn is_running(&self) -> bool {
        !self.has_exited()
    }

    /// True while the process is alive and its stdin still accepts bytes
    pub fn is_writable(&self) -> bool {
        self.is_running() && self.stdin_open.load(Ordering::Acquire) && !self.stdin_tx.is_closed()
    }

    pub fn id(&self) -> Option<u32> {
        self.pid
    }
}

impl Drop for PackagerProcess {
    fn drop(&mut self) {
        if !self.has_exited() {
            warn!("PackagerProcess dropped while process may still be running");
            if let Some(tx) = self.kill_tx.take() {
                let _ = tx.send(());
            }
        }
        // kill_on_drop(true) on the Child is the final safety net
        debug!("PackagerProcess dropped");
    }
}

/// I/O tasks are running; the wait task is started by [`Attached::finish`]
struct Attached {
    stdin_tx: mpsc::Sender<Vec<u8>>,
    stdin_open: Arc<AtomicBool>,
    pid: Option<u32>,
    generation: u64,
    event_tx: mpsc::Sender<TaggedEvent>,
    readers: Vec<JoinHandle<()>>,
}

impl Attached {
    fn finish(self, child: Child) -> PackagerProcess {
        let exited = Arc::new(AtomicBool::new(false));
        let exit_notify = Arc::new(Notify::new());
        let (kill_tx, kill_rx) = oneshot::channel::<()>();

        tokio::spawn(PackagerProcess::wait_for_exit(
            child,
            kill_rx,
            self.readers,
            self.generation,
            self.event_tx,
            Arc::clone(&exited),
            Arc::clone(&exit_notify),
        ));

        PackagerProcess {
            stdin_tx: self.stdin_tx,
            stdin_open: self.stdin_open,
            pid: self.pid,
            kill_tx: Some(kill_tx),
            exited,
            exit_notify,
        }
    }
}
