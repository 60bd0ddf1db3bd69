//! Dispatch loop: poll the transport, handle each message on its own task,
//! drain in-flight handlers on shutdown.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use planner_core::Inbound;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{info, info_span, warn, Instrument};

use crate::router::CommandRouter;
use crate::transport::Transport;

/// Default wait for in-flight handlers after shutdown is requested.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Pause after a failed poll before trying again.
pub const DEFAULT_POLL_BACKOFF: Duration = Duration::from_secs(1);

/// What happened during one [`Runtime::run`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Messages handed to a handler task.
    pub dispatched: u64,
    /// Handlers still running when the grace period ran out.
    pub abandoned: usize,
}

pub struct Runtime {
    transport: Arc<dyn Transport>,
    router: Arc<CommandRouter>,
    tracker: TaskTracker,
    shutdown_grace: Duration,
    poll_backoff: Duration,
    dispatched: AtomicU64,
}

impl Runtime {
    pub fn new(transport: Arc<dyn Transport>, router: Arc<CommandRouter>) -> Self {
        Self {
            transport,
            router,
            tracker: TaskTracker::new(),
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
            poll_backoff: DEFAULT_POLL_BACKOFF,
            dispatched: AtomicU64::new(0),
        }
    }

    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    pub fn with_poll_backoff(mut self, backoff: Duration) -> Self {
        self.poll_backoff = backoff;
        self
    }

    /// Run until `shutdown` is cancelled, then wait up to the grace period
    /// for handlers that are still running.
    pub async fn run(self, shutdown: CancellationToken) -> RunSummary {
        info!("dispatch loop started");

        loop {
            let polled = tokio::select! {
                () = shutdown.cancelled() => break,
                polled = self.transport.poll() => polled,
            };

            match polled {
                Ok(batch) => {
                    for msg in batch {
                        self.spawn_handler(msg);
                    }
                }
                Err(e) => {
                    warn!(error = %e, backoff_ms = self.poll_backoff.as_millis() as u64, "poll failed");
                    tokio::select! {
                        () = shutdown.cancelled() => break,
                        () = tokio::time::sleep(self.poll_backoff) => {}
                    }
                }
            }
        }

        self.drain().await
    }

    fn spawn_handler(&self, msg: Inbound) {
        let transport = Arc::clone(&self.transport);
        let router = Arc::clone(&self.router);
        let span = info_span!("message", sender_id = %msg.sender_id, chat_id = msg.chat_id);

        self.dispatched.fetch_add(1, Ordering::Relaxed);
        self.tracker.spawn(
            async move {
                let reply = router.handle(&msg);
                if let Err(e) = transport.send(reply).await {
                    warn!(error = %e, "failed to deliver reply");
                }
            }
            .instrument(span),
        );
    }

    async fn drain(self) -> RunSummary {
        self.tracker.close();
        let in_flight = self.tracker.len();
        info!(
            in_flight,
            grace_secs = self.shutdown_grace.as_secs(),
            "shutdown requested, draining handlers"
        );

        let abandoned = match tokio::time::timeout(self.shutdown_grace, self.tracker.wait()).await {
            Ok(()) => 0,
            Err(_) => {
                let left = self.tracker.len();
                warn!(abandoned = left, "grace period expired with handlers still running");
                left
            }
        };

        let summary = RunSummary {
            dispatched: self.dispatched.load(Ordering::Relaxed),
            abandoned,
        };
        info!(dispatched = summary.dispatched, abandoned, "dispatch loop stopped");
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::IdentityResolver;
    use crate::transport::TransportError;
    use async_trait::async_trait;
    use planner_core::{Outbound, PlatformId};
    use planner_store::Database;
    use std::sync::atomic::AtomicU32;
    use std::sync::Mutex;

    type Sent = Arc<Mutex<Vec<Outbound>>>;

    /// Hands out one scripted batch, then blocks until shutdown.
    struct ScriptedTransport {
        batch: Mutex<Option<Vec<Inbound>>>,
        sent: Sent,
        send_delay: Duration,
        failures_before_batch: AtomicU32,
    }

    impl ScriptedTransport {
        fn new(batch: Vec<Inbound>, send_delay: Duration) -> Self {
            Self {
                batch: Mutex::new(Some(batch)),
                sent: Sent::default(),
                send_delay,
                failures_before_batch: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn poll(&self) -> Result<Vec<Inbound>, TransportError> {
            if self.failures_before_batch.load(Ordering::SeqCst) > 0 {
                self.failures_before_batch.fetch_sub(1, Ordering::SeqCst);
                return Err(TransportError::Http("connection reset".into()));
            }
            let next = self.batch.lock().unwrap().take();
            match next {
                Some(batch) => Ok(batch),
                None => std::future::pending().await,
            }
        }

        async fn send(&self, msg: Outbound) -> Result<(), TransportError> {
            tokio::time::sleep(self.send_delay).await;
            self.sent.lock().unwrap().push(msg);
            Ok(())
        }
    }

    fn router() -> Arc<CommandRouter> {
        let db = Database::in_memory().unwrap();
        Arc::new(CommandRouter::new(db.clone(), IdentityResolver::new(db)))
    }

    fn msg(from: i64, text: &str) -> Inbound {
        Inbound::from_text(PlatformId::new(from), "Tester", from, text)
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_waits_for_in_flight_handler() {
        let transport = Arc::new(ScriptedTransport::new(
            vec![msg(100, "/help")],
            Duration::from_secs(2),
        ));
        let sent = Arc::clone(&transport.sent);
        let runtime = Runtime::new(transport, router()).with_shutdown_grace(Duration::from_secs(5));

        let shutdown = CancellationToken::new();
        let trigger = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let summary = runtime.run(shutdown).await;
        assert_eq!(summary, RunSummary { dispatched: 1, abandoned: 0 });
        assert_eq!(sent.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn handlers_past_grace_are_abandoned() {
        let transport = Arc::new(ScriptedTransport::new(
            vec![msg(100, "/help"), msg(200, "/help")],
            Duration::from_secs(60),
        ));
        let sent = Arc::clone(&transport.sent);
        let runtime = Runtime::new(transport, router()).with_shutdown_grace(Duration::from_secs(1));

        let shutdown = CancellationToken::new();
        let trigger = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let summary = runtime.run(shutdown).await;
        assert_eq!(summary.dispatched, 2);
        assert_eq!(summary.abandoned, 2);
        assert!(sent.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn poll_errors_back_off_and_recover() {
        let transport = ScriptedTransport::new(vec![msg(100, "hi")], Duration::ZERO);
        transport.failures_before_batch.store(3, Ordering::SeqCst);
        let transport = Arc::new(transport);
        let sent = Arc::clone(&transport.sent);
        let runtime = Runtime::new(transport, router()).with_poll_backoff(Duration::from_millis(10));

        let shutdown = CancellationToken::new();
        let trigger = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });

        let summary = runtime.run(shutdown).await;
        assert_eq!(summary.dispatched, 1);
        let sent = sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].text.contains("hi"));
    }

    #[tokio::test]
    async fn already_cancelled_returns_immediately() {
        let transport = Arc::new(ScriptedTransport::new(Vec::new(), Duration::ZERO));
        let shutdown = CancellationToken::new();
        shutdown.cancel();
        let summary = Runtime::new(transport, router()).run(shutdown).await;
        assert_eq!(summary, RunSummary::default());
    }
}
