//! DNS hijack notifications
//!
//! Unregistered clients get their DNS redirected to the captive portal by
//! an external script; registered clients get the redirect removed. The
//! callouts only enqueue the request: a worker task runs the script, and
//! nobody waits for or reacts to its outcome.

use crate::error::{PolicyError, Result};
use async_trait::async_trait;
use std::fmt;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Side effect requested for a client address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HijackAction {
    /// Redirect the address's DNS to the portal
    Hijack,
    /// Remove the redirect
    Unhijack,
}

impl HijackAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            HijackAction::Hijack => "hijack",
            HijackAction::Unhijack => "unhijack",
        }
    }
}

impl fmt::Display for HijackAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fire-and-forget notification sink
///
/// `notify` must return without blocking on the side effect.
pub trait Notifier: Send + Sync {
    fn notify(&self, action: HijackAction, ip: Ipv4Addr);
}

/// Notifier that drops everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn notify(&self, action: HijackAction, ip: Ipv4Addr) {
        debug!(action = %action, ip = %ip, "Notifications disabled");
    }
}

/// Trait for carrying out a hijack action
#[async_trait]
pub trait ActionRunner: Send + Sync {
    async fn run(&self, action: HijackAction, ip: Ipv4Addr) -> Result<()>;
}

/// Runs `<script> <action> <ip>` with stdio discarded
#[derive(Debug, Clone)]
pub struct ScriptRunner {
    script: PathBuf,
}

impl ScriptRunner {
    pub fn new(script: impl Into<PathBuf>) -> Self {
        Self {
            script: script.into(),
        }
    }

    pub fn script(&self) -> &Path {
        &self.script
    }
}

#[async_trait]
impl ActionRunner for ScriptRunner {
    async fn run(&self, action: HijackAction, ip: Ipv4Addr) -> Result<()> {
        let status = Command::new(&self.script)
            .arg(action.as_str())
            .arg(ip.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|e| {
                PolicyError::NotifyFailed(format!("{}: {}", self.script.display(), e))
            })?;

        if !status.success() {
            return Err(PolicyError::NotifyFailed(format!(
                "{} {} {} exited with {}",
                self.script.display(),
                action,
                ip,
                status
            )));
        }
        Ok(())
    }
}

#[derive(Debug)]
struct Job {
    action: HijackAction,
    ip: Ipv4Addr,
}

/// Notifier backed by a bounded queue and a worker task
///
/// Jobs run one at a time in submission order, so a hijack followed by an
/// unhijack for the same address is applied in that order. When the queue
/// is full new jobs are dropped.
pub struct QueuedNotifier {
    tx: mpsc::Sender<Job>,
}

impl QueuedNotifier {
    /// Start the worker on `handle` with room for `depth` pending jobs
    pub fn spawn(runner: Arc<dyn ActionRunner>, depth: usize, handle: &Handle) -> Self {
        let (tx, mut rx) = mpsc::channel::<Job>(depth.max(1));

        handle.spawn(async move {
            while let Some(job) = rx.recv().await {
                match runner.run(job.action, job.ip).await {
                    Ok(()) => debug!(action = %job.action, ip = %job.ip, "Notification delivered"),
                    Err(e) => warn!(action = %job.action, ip = %job.ip, error = %e, "Notification failed"),
                }
            }
            info!("Notification worker stopped");
        });

        Self { tx }
    }

    /// Enqueue a job without waiting
    pub fn try_notify(&self, action: HijackAction, ip: Ipv4Addr) -> Result<()> {
        self.tx.try_send(Job { action, ip }).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => PolicyError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => {
                PolicyError::NotifyFailed("notification worker stopped".to_string())
            }
        })
    }
}

impl Notifier for QueuedNotifier {
    fn notify(&self, action: HijackAction, ip: Ipv4Addr) {
        match self.try_notify(action, ip) {
            Ok(()) => debug!(action = %action, ip = %ip, "Notification queued"),
            Err(e) => warn!(action = %action, ip = %ip, error = %e, "Dropping notification"),
        }
    }
}

impl fmt::Debug for QueuedNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueuedNotifier")
            .field("capacity", &self.tx.max_capacity())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::{mpsc::UnboundedSender, Semaphore};
    use tokio::time::timeout;

    struct RecordingRunner {
        seen: UnboundedSender<(HijackAction, Ipv4Addr)>,
    }

    #[async_trait]
    impl ActionRunner for RecordingRunner {
        async fn run(&self, action: HijackAction, ip: Ipv4Addr) -> Result<()> {
            let _ = self.seen.send((action, ip));
            Ok(())
        }
    }

    /// Reports each job as started, then blocks until a permit is released
    struct GatedRunner {
        started: UnboundedSender<Ipv4Addr>,
        gate: Arc<Semaphore>,
    }

    #[async_trait]
    impl ActionRunner for GatedRunner {
        async fn run(&self, _action: HijackAction, ip: Ipv4Addr) -> Result<()> {
            let _ = self.started.send(ip);
            let permit = self
                .gate
                .acquire()
                .await
                .map_err(|e| PolicyError::NotifyFailed(e.to_string()))?;
            permit.forget();
            Ok(())
        }
    }

    struct FailingRunner;

    #[async_trait]
    impl ActionRunner for FailingRunner {
        async fn run(&self, _action: HijackAction, _ip: Ipv4Addr) -> Result<()> {
            Err(PolicyError::NotifyFailed("boom".to_string()))
        }
    }

    #[test]
    fn test_action_strings() {
        assert_eq!(HijackAction::Hijack.as_str(), "hijack");
        assert_eq!(HijackAction::Unhijack.to_string(), "unhijack");
    }

    #[tokio::test]
    async fn test_jobs_run_in_order() {
        let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();
        let notifier = QueuedNotifier::spawn(
            Arc::new(RecordingRunner { seen: seen_tx }),
            8,
            &Handle::current(),
        );

        let ip = Ipv4Addr::new(192, 168, 1, 20);
        notifier.notify(HijackAction::Hijack, ip);
        notifier.notify(HijackAction::Unhijack, ip);

        let first = timeout(Duration::from_secs(5), seen_rx.recv()).await.unwrap();
        let second = timeout(Duration::from_secs(5), seen_rx.recv()).await.unwrap();
        assert_eq!(first, Some((HijackAction::Hijack, ip)));
        assert_eq!(second, Some((HijackAction::Unhijack, ip)));
    }

    #[tokio::test]
    async fn test_full_queue_drops_job() {
        let (started_tx, mut started_rx) = mpsc::unbounded_channel();
        let gate = Arc::new(Semaphore::new(0));
        let notifier = QueuedNotifier::spawn(
            Arc::new(GatedRunner {
                started: started_tx,
                gate: Arc::clone(&gate),
            }),
            1,
            &Handle::current(),
        );

        let ip = |last| Ipv4Addr::new(192, 168, 1, last);

        // First job is picked up by the worker and held at the gate
        notifier.try_notify(HijackAction::Hijack, ip(1)).unwrap();
        let started = timeout(Duration::from_secs(5), started_rx.recv()).await.unwrap();
        assert_eq!(started, Some(ip(1)));

        // Second fills the queue, third has nowhere to go
        notifier.try_notify(HijackAction::Hijack, ip(2)).unwrap();
        assert!(matches!(
            notifier.try_notify(HijackAction::Hijack, ip(3)),
            Err(PolicyError::QueueFull)
        ));

        // notify() swallows the same condition
        notifier.notify(HijackAction::Hijack, ip(4));

        gate.add_permits(2);
        let started = timeout(Duration::from_secs(5), started_rx.recv()).await.unwrap();
        assert_eq!(started, Some(ip(2)));
    }

    #[tokio::test]
    async fn test_failing_runner_keeps_worker_alive() {
        let notifier = QueuedNotifier::spawn(Arc::new(FailingRunner), 4, &Handle::current());

        notifier.notify(HijackAction::Hijack, Ipv4Addr::new(10, 0, 0, 1));
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(notifier
            .try_notify(HijackAction::Unhijack, Ipv4Addr::new(10, 0, 0, 1))
            .is_ok());
    }

    #[tokio::test]
    async fn test_script_runner_missing_script() {
        let runner = ScriptRunner::new("/nonexistent/dns-hijack.sh");
        let result = runner
            .run(HijackAction::Hijack, Ipv4Addr::new(192, 168, 1, 20))
            .await;

        assert!(matches!(result, Err(PolicyError::NotifyFailed(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_script_runner_exit_status() {
        let ok = ScriptRunner::new("true");
        assert!(ok
            .run(HijackAction::Unhijack, Ipv4Addr::new(192, 168, 1, 20))
            .await
            .is_ok());

        let failing = ScriptRunner::new("false");
        assert!(matches!(
            failing
                .run(HijackAction::Hijack, Ipv4Addr::new(192, 168, 1, 20))
                .await,
            Err(PolicyError::NotifyFailed(_))
        ));
    }
}
