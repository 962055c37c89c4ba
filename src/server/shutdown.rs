//! Graceful shutdown handling for the demo services
//!
//! Handles SIGTERM, SIGINT and SIGQUIT:
//! - Background tasks are told to stop through a watch channel
//! - The api waits for in-flight requests up to a deadline
//! - The worker simulates flushing pending work

use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::info;

use super::health::InflightCounter;

/// Shutdown signal receiver
///
/// Cloned and handed to every background task.
#[derive(Clone)]
pub struct ShutdownSignal {
    receiver: watch::Receiver<bool>,
}

impl ShutdownSignal {
    /// Wait for shutdown signal
    pub async fn wait(&mut self) {
        while !*self.receiver.borrow() {
            if self.receiver.changed().await.is_err() {
                // Sender dropped, treat as shutdown
                break;
            }
        }
    }

    /// Check if shutdown was signaled (non-blocking)
    pub fn is_shutdown(&self) -> bool {
        *self.receiver.borrow()
    }
}

/// Controller for triggering shutdown
pub struct ShutdownController {
    sender: watch::Sender<bool>,
}

impl ShutdownController {
    pub fn shutdown(&self) {
        let _ = self.sender.send(true);
        info!("Shutdown signal sent");
    }
}

/// Create a new shutdown signal pair
///
/// Returns (controller, signal) where:
/// - controller: Used to trigger shutdown
/// - signal: Cloned and passed to components that need to listen
pub fn shutdown_channel() -> (ShutdownController, ShutdownSignal) {
    let (sender, receiver) = watch::channel(false);
    (ShutdownController { sender }, ShutdownSignal { receiver })
}

/// How the shutdown sequence ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    Clean,
    /// The drain deadline passed with requests still in flight
    DeadlineExceeded { inflight: i64 },
}

impl ShutdownOutcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            ShutdownOutcome::Clean => 0,
            ShutdownOutcome::DeadlineExceeded { .. } => 1,
        }
    }
}

/// Poll `inflight` until it reaches zero or `deadline` elapses
pub async fn drain_inflight(
    inflight: &InflightCounter,
    deadline: Duration,
    poll: Duration,
) -> ShutdownOutcome {
    let give_up_at = Instant::now() + deadline;

    loop {
        let remaining = inflight.current();
        if remaining <= 0 {
            return ShutdownOutcome::Clean;
        }
        if Instant::now() >= give_up_at {
            return ShutdownOutcome::DeadlineExceeded {
                inflight: remaining,
            };
        }
        tokio::time::sleep(poll).await;
    }
}

/// Simulate flushing buffered work before exit
pub async fn flush_pending(duration: Duration) -> ShutdownOutcome {
    info!("Flushing pending work");
    tokio::time::sleep(duration).await;
    ShutdownOutcome::Clean
}

/// Termination signals this process reacts to
///
/// Handlers are installed by [`SignalListener::register`], so a signal that
/// arrives before [`SignalListener::recv`] is first polled is still caught.
/// SIGKILL cannot be caught.
#[cfg(unix)]
pub struct SignalListener {
    sigterm: tokio::signal::unix::Signal,
    sigint: tokio::signal::unix::Signal,
    sigquit: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl SignalListener {
    /// Install the SIGTERM, SIGINT and SIGQUIT handlers
    pub fn register() -> std::io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};

        Ok(Self {
            sigterm: signal(SignalKind::terminate())?,
            sigint: signal(SignalKind::interrupt())?,
            sigquit: signal(SignalKind::quit())?,
        })
    }

    /// Wait for the next signal and return its name
    pub async fn recv(&mut self) -> &'static str {
        tokio::select! {
            _ = self.sigterm.recv() => "SIGTERM",
            _ = self.sigint.recv() => "SIGINT",
            _ = self.sigquit.recv() => "SIGQUIT",
        }
    }
}

/// Ctrl+C listener (Windows)
#[cfg(not(unix))]
pub struct SignalListener {
    ctrl_c: tokio::signal::windows::CtrlC,
}

#[cfg(not(unix))]
impl SignalListener {
    pub fn register() -> std::io::Result<Self> {
        Ok(Self {
            ctrl_c: tokio::signal::windows::ctrl_c()?,
        })
    }

    pub async fn recv(&mut self) -> &'static str {
        self.ctrl_c.recv().await;
        "CTRL_C"
    }
}
