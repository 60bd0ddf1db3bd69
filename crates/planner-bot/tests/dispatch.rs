//! End-to-end: runtime + router + store, driven through an in-memory transport.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use planner_bot::replies;
use planner_bot::{CommandRouter, IdentityResolver, RunSummary, Runtime, Transport, TransportError};
use planner_core::{Inbound, Outbound, PlatformId};
use planner_store::{Database, EventRepo, UserRepo};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Inbound messages come from a channel; replies go to another.
struct ChannelTransport {
    inbound: Mutex<mpsc::UnboundedReceiver<Inbound>>,
    outbound: mpsc::UnboundedSender<Outbound>,
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn poll(&self) -> Result<Vec<Inbound>, TransportError> {
        match self.inbound.lock().await.recv().await {
            Some(msg) => Ok(vec![msg]),
            None => std::future::pending().await,
        }
    }

    async fn send(&self, msg: Outbound) -> Result<(), TransportError> {
        self.outbound
            .send(msg)
            .map_err(|e| TransportError::Http(e.to_string()))
    }
}

struct Harness {
    db: Database,
    to_bot: mpsc::UnboundedSender<Inbound>,
    from_bot: mpsc::UnboundedReceiver<Outbound>,
    shutdown: CancellationToken,
    task: JoinHandle<RunSummary>,
}

impl Harness {
    fn start(bootstrap_admins: &[i64]) -> Self {
        let db = Database::in_memory().unwrap();
        let identity = IdentityResolver::new(db.clone())
            .with_bootstrap_admins(bootstrap_admins.iter().copied().map(PlatformId::new));
        let router = Arc::new(CommandRouter::new(db.clone(), identity));

        let (to_bot, inbound) = mpsc::unbounded_channel();
        let (outbound, from_bot) = mpsc::unbounded_channel();
        let transport = Arc::new(ChannelTransport {
            inbound: Mutex::new(inbound),
            outbound,
        });

        let shutdown = CancellationToken::new();
        let runtime = Runtime::new(transport, router).with_shutdown_grace(Duration::from_secs(5));
        let task = tokio::spawn(runtime.run(shutdown.clone()));

        Self {
            db,
            to_bot,
            from_bot,
            shutdown,
            task,
        }
    }

    async fn ask(&mut self, from: i64, text: &str) -> String {
        self.to_bot
            .send(Inbound::from_text(PlatformId::new(from), format!("User{from}"), from, text))
            .unwrap();
        let reply = tokio::time::timeout(Duration::from_secs(5), self.from_bot.recv())
            .await
            .expect("reply within timeout")
            .expect("transport open");
        assert_eq!(reply.chat_id, from);
        reply.text
    }

    async fn stop(self) -> RunSummary {
        self.shutdown.cancel();
        self.task.await.unwrap()
    }
}

#[tokio::test]
async fn create_then_list_and_filter() {
    let mut bot = Harness::start(&[]);

    let reply = bot
        .ask(100, "/create Conference|Tech talk|2024-12-31|Hall A")
        .await;
    assert!(reply.contains("31.12.2024"), "{reply}");

    let events = EventRepo::new(bot.db.clone()).get_all().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].title, "Conference");
    assert_eq!(events[0].location, "Hall A");
    assert_eq!(events[0].event_date.to_string(), "2024-12-31");
    assert_eq!(events[0].created_by, PlatformId::new(100));

    assert!(bot.ask(200, "/events").await.contains("Conference"));
    assert_eq!(bot.ask(200, "/myevents").await, replies::NO_OWN_EVENTS);
    assert!(bot.ask(100, "/myevents").await.contains("Conference"));

    let summary = bot.stop().await;
    assert_eq!(summary.dispatched, 4);
    assert_eq!(summary.abandoned, 0);
}

#[tokio::test]
async fn bad_payloads_persist_nothing() {
    let mut bot = Harness::start(&[]);

    for text in [
        "/create Conference|Tech talk|2024-12-31",
        "/create Conference|Tech talk|31.12.2024|Hall A",
        "/create",
    ] {
        let reply = bot.ask(100, text).await;
        assert!(reply.contains("/create Title|Description|YYYY-MM-DD|Location"), "{reply}");
    }
    assert_eq!(EventRepo::new(bot.db.clone()).count().unwrap(), 0);

    bot.stop().await;
}

#[tokio::test]
async fn admin_gate_and_bootstrap_admin() {
    let mut bot = Harness::start(&[1]);

    let denied = bot.ask(300, "/admin").await;
    assert_eq!(denied, replies::PERMISSION_DENIED);
    assert!(!denied.contains("Admin menu"));

    assert!(bot.ask(1, "/admin").await.contains("Admin menu"));
    assert!(bot.ask(1, "/admin_makeadmin 300").await.contains("300"));
    assert!(bot.ask(300, "/admin").await.contains("Admin menu"));

    let stats = bot.ask(1, "/admin_stats").await;
    assert!(stats.contains("Users: 2"), "{stats}");
    assert!(stats.contains("Admins: 2"), "{stats}");

    bot.stop().await;
}

#[tokio::test]
async fn burst_from_new_user_registers_once() {
    let mut bot = Harness::start(&[]);

    for i in 0..10 {
        bot.to_bot
            .send(Inbound::from_text(PlatformId::new(42), "Burst", 42, format!("ping {i}")))
            .unwrap();
    }
    for _ in 0..10 {
        tokio::time::timeout(Duration::from_secs(5), bot.from_bot.recv())
            .await
            .unwrap()
            .unwrap();
    }

    let users = UserRepo::new(bot.db.clone());
    assert_eq!(users.count().unwrap(), 1);
    assert!(users.get_by_platform_id(PlatformId::new(42)).unwrap().is_some());

    let summary = bot.stop().await;
    assert_eq!(summary.dispatched, 10);
}

#[tokio::test]
async fn update_respects_ownership() {
    let mut bot = Harness::start(&[]);
    bot.ask(100, "/create Draft|x|2024-05-05|Room 1").await;
    let id = EventRepo::new(bot.db.clone()).get_all().unwrap()[0].id;

    let denied = bot.ask(200, &format!("/update {id} Stolen|x|2024-05-05|Room 1")).await;
    assert_eq!(denied, replies::PERMISSION_DENIED);

    let ok = bot.ask(100, &format!("/update {id} Final|y|2024-06-06|Room 2")).await;
    assert!(ok.contains("06.06.2024"), "{ok}");
    assert_eq!(EventRepo::new(bot.db.clone()).get_by_id(id).unwrap().title, "Final");

    assert!(bot.ask(100, "/update 999 A|b|2024-01-01|c").await.contains("Not found"));

    bot.stop().await;
}
