//! End-to-end suite driving both channels over live connections.

use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

use tokio::time::sleep;
use tokio::time::timeout;

use tetherrun::BindState;
use tetherrun::ConnEvent;
use tetherrun::Error;
use tetherrun::FailureReason;
use tetherrun::Message;
use tetherrun::Registry;
use tetherrun::Service;
use tetherrun::ServiceName;
use tetherrun::Value;
use tetherrun::demo::INFO_SERVICE;
use tetherrun::demo::InfoClient;
use tetherrun::demo::InfoService;
use tetherrun::demo::ROSTER_SERVICE;
use tetherrun::demo::RosterService;
use tetherrun::demo::Student;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

/// A service whose calls take effectively forever; used to park a call in
/// flight while the connection is torn down around it.
struct SlowService;

#[async_trait::async_trait]
impl Service for SlowService {
    async fn call(
        &self,
        _method: &str,
        _args: &[Value],
    ) -> std::result::Result<Value, FailureReason> {
        sleep(Duration::from_secs(30)).await;
        Ok(Value::Unit)
    }
}

/// Tracks how many handler invocations overlap.
#[derive(Clone, Default)]
struct GaugeService {
    active: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

#[async_trait::async_trait]
impl Service for GaugeService {
    async fn call(
        &self,
        _method: &str,
        _args: &[Value],
    ) -> std::result::Result<Value, FailureReason> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        sleep(Duration::from_millis(50)).await;
        self.active.fetch_sub(1, Ordering::SeqCst);
        Ok(Value::Unit)
    }
}

// --- Lifecycle ---

#[tokio::test]
async fn test_bind_then_unbind() -> anyhow::Result<()> {
    init_tracing();
    let registry = Registry::new();
    registry.register(INFO_SERVICE, InfoService)?;

    let (conn, mut events) = registry.connect(INFO_SERVICE);
    assert_eq!(conn.state(), BindState::Binding);

    assert_eq!(
        events.recv().await,
        Some(ConnEvent::Connected(ServiceName::from(INFO_SERVICE)))
    );
    assert_eq!(conn.state(), BindState::Bound);

    conn.disconnect();
    assert_eq!(conn.state(), BindState::Unbound);
    // Client-initiated teardown is silent: no event after disconnect returns.
    assert_eq!(events.recv().await, None);
    Ok(())
}

#[tokio::test]
async fn test_call_before_bind_completes() -> anyhow::Result<()> {
    let registry = Registry::new();
    registry.register(INFO_SERVICE, InfoService)?;

    let (conn, _events) = registry.connect(INFO_SERVICE);
    // The binding task has not run yet; the call must fail fast, not block.
    assert_eq!(conn.state(), BindState::Binding);
    let err = conn
        .call("add", &[Value::I32(1), Value::I32(2)])
        .await
        .unwrap_err();
    assert_eq!(err, Error::NotConnected);
    Ok(())
}

#[tokio::test]
async fn test_call_after_disconnect() -> anyhow::Result<()> {
    let registry = Registry::new();
    registry.register(INFO_SERVICE, InfoService)?;

    let (conn, mut events) = registry.connect(INFO_SERVICE);
    events.recv().await;
    conn.disconnect();

    let err = conn.call("get_message", &[]).await.unwrap_err();
    assert_eq!(err, Error::NotConnected);

    let err = conn.post(Message::new().with_int("id", 1)).await.unwrap_err();
    assert_eq!(err, Error::NotConnected);
    Ok(())
}

#[tokio::test]
async fn test_disconnect_is_idempotent() -> anyhow::Result<()> {
    let registry = Registry::new();
    registry.register(INFO_SERVICE, InfoService)?;

    let (conn, mut events) = registry.connect(INFO_SERVICE);
    events.recv().await;
    conn.disconnect();
    conn.disconnect();
    assert_eq!(conn.state(), BindState::Unbound);
    Ok(())
}

#[tokio::test]
async fn test_unknown_service_never_binds() -> anyhow::Result<()> {
    let registry = Registry::new();

    // Resolution fails synchronously...
    assert!(matches!(
        registry.resolve("tether.demo.Ghost"),
        Err(Error::NotFound(_))
    ));

    // ...while connect reports the failure through the event channel.
    let (conn, mut events) = registry.connect("tether.demo.Ghost");
    assert_eq!(
        events.recv().await,
        Some(ConnEvent::Disconnected(ServiceName::from("tether.demo.Ghost")))
    );
    assert_eq!(conn.state(), BindState::Disconnected);
    assert_eq!(events.recv().await, None);
    Ok(())
}

// --- RPC channel ---

#[tokio::test]
async fn test_add_returns_sum() -> anyhow::Result<()> {
    let registry = Registry::new();
    registry.register(INFO_SERVICE, InfoService)?;

    let (conn, mut events) = registry.connect(INFO_SERVICE);
    events.recv().await;

    for (a, b) in [(10, 20), (0, 0), (-5, 3), (i32::MAX, 0)] {
        let sum = conn.call("add", &[Value::I32(a), Value::I32(b)]).await?;
        assert_eq!(sum, Value::I32(a + b));
    }
    Ok(())
}

#[tokio::test]
async fn test_get_message() -> anyhow::Result<()> {
    let registry = Registry::new();
    registry.register(INFO_SERVICE, InfoService)?;

    let (conn, mut events) = registry.connect(INFO_SERVICE);
    events.recv().await;

    let message = conn.call("get_message", &[]).await?;
    assert_eq!(message, Value::Str("Hello from the info service!".into()));
    Ok(())
}

#[tokio::test]
async fn test_student_info_returns_mutated_copy() -> anyhow::Result<()> {
    init_tracing();
    let registry = Registry::new();
    registry.register(INFO_SERVICE, InfoService)?;

    let (conn, mut events) = registry.connect(INFO_SERVICE);
    events.recv().await;

    let original = Student {
        name: "张三".into(),
        age: 10,
        grade: "Grade 5".into(),
    };

    let returned = conn
        .call("get_student_info", &[Value::I32(12), original.to_value()])
        .await?;
    let updated = Student::from_value(&returned)?;

    assert_eq!(updated.age, 12);
    assert_eq!(updated.grade, "Grade 3");
    assert_eq!(updated.name, "张三");

    // The boundary copies: the caller's record is untouched.
    assert_eq!(
        original,
        Student { name: "张三".into(), age: 10, grade: "Grade 5".into() }
    );
    Ok(())
}

#[tokio::test]
async fn test_typed_proxy_forwards_calls() -> anyhow::Result<()> {
    let registry = Registry::new();
    registry.register(INFO_SERVICE, InfoService)?;

    let (conn, mut events) = registry.connect(INFO_SERVICE);
    events.recv().await;

    let client = InfoClient::new(&conn);
    assert_eq!(client.add(10, 20).await?, 30);
    assert_eq!(client.get_message().await?, "Hello from the info service!");

    let student = Student { name: "zhangsan".into(), age: 10, grade: "Grade 2".into() };
    let updated = client.get_student_info(18, &student).await?;
    assert_eq!(updated.age, 18);
    assert_eq!(updated.grade, "Grade 4");
    Ok(())
}

#[tokio::test]
async fn test_unknown_method_is_remote_failure() -> anyhow::Result<()> {
    let registry = Registry::new();
    registry.register(INFO_SERVICE, InfoService)?;

    let (conn, mut events) = registry.connect(INFO_SERVICE);
    events.recv().await;

    let err = conn.call("subtract", &[]).await.unwrap_err();
    assert_eq!(err, Error::Remote(FailureReason::MethodNotFound));
    Ok(())
}

#[tokio::test]
async fn test_disconnect_resolves_inflight_call() -> anyhow::Result<()> {
    init_tracing();
    let registry = Registry::new();
    registry.register("tether.test.Slow", SlowService)?;

    let (conn, mut events) = registry.connect("tether.test.Slow");
    events.recv().await;
    let conn = Arc::new(conn);

    let inflight = tokio::spawn({
        let conn = conn.clone();
        async move { conn.call("nap", &[]).await }
    });

    // Let the call reach the service before pulling the plug.
    sleep(Duration::from_millis(20)).await;
    conn.disconnect();

    assert_eq!(inflight.await?, Err(Error::ConnectionLost));
    Ok(())
}

#[tokio::test]
async fn test_shutdown_disconnects_bound_clients() -> anyhow::Result<()> {
    let registry = Registry::new();
    registry.register("tether.test.Slow", SlowService)?;

    let (conn, mut events) = registry.connect("tether.test.Slow");
    events.recv().await;
    let conn = Arc::new(conn);

    let inflight = tokio::spawn({
        let conn = conn.clone();
        async move { conn.call("nap", &[]).await }
    });
    sleep(Duration::from_millis(20)).await;

    // The service process dies.
    assert!(registry.shutdown("tether.test.Slow"));

    assert_eq!(
        events.recv().await,
        Some(ConnEvent::Disconnected(ServiceName::from("tether.test.Slow")))
    );
    assert_eq!(inflight.await?, Err(Error::ConnectionLost));
    // Exactly one Disconnected, then silence.
    assert_eq!(events.recv().await, None);
    assert_eq!(conn.state(), BindState::Disconnected);

    let err = conn.call("nap", &[]).await.unwrap_err();
    assert_eq!(err, Error::NotConnected);
    Ok(())
}

#[tokio::test]
async fn test_calls_serialized_per_connection() -> anyhow::Result<()> {
    let registry = Registry::new();
    let gauge = GaugeService::default();
    registry.register("tether.test.Gauge", gauge.clone())?;

    let (conn, mut events) = registry.connect("tether.test.Gauge");
    events.recv().await;
    let conn = Arc::new(conn);

    let mut handles = Vec::new();
    for _ in 0..3 {
        let conn = conn.clone();
        handles.push(tokio::spawn(async move { conn.call("tick", &[]).await }));
    }
    for handle in handles {
        assert_eq!(handle.await?, Ok(Value::Unit));
    }

    assert_eq!(gauge.peak.load(Ordering::SeqCst), 1);
    Ok(())
}

#[tokio::test]
async fn test_connections_served_concurrently() -> anyhow::Result<()> {
    let registry = Registry::new();
    let gauge = GaugeService::default();
    registry.register("tether.test.Gauge", gauge.clone())?;

    let (conn_a, mut events_a) = registry.connect("tether.test.Gauge");
    let (conn_b, mut events_b) = registry.connect("tether.test.Gauge");
    events_a.recv().await;
    events_b.recv().await;

    let a = tokio::spawn({
        let conn = Arc::new(conn_a);
        async move { conn.call("tick", &[]).await }
    });
    let b = tokio::spawn({
        let conn = Arc::new(conn_b);
        async move { conn.call("tick", &[]).await }
    });

    assert_eq!(a.await?, Ok(Value::Unit));
    assert_eq!(b.await?, Ok(Value::Unit));
    assert_eq!(gauge.peak.load(Ordering::SeqCst), 2);
    Ok(())
}

// --- Messenger channel ---

#[tokio::test]
async fn test_roster_reply_exactly_once() -> anyhow::Result<()> {
    init_tracing();
    let registry = Registry::new();
    registry.register(ROSTER_SERVICE, RosterService::new())?;

    let (conn, mut events) = registry.connect(ROSTER_SERVICE);
    events.recv().await;

    let mut mailbox = conn.mailbox();
    conn.post(Message::new().with_int("id", 1000).reply_to(&mailbox))
        .await?;

    let reply = mailbox.recv().await.expect("one reply");
    assert_eq!(reply.str("name"), Some("zhangsan"));
    assert_eq!(reply.int("age"), Some(18));

    // Exactly one: nothing else arrives.
    assert!(timeout(Duration::from_millis(50), mailbox.recv()).await.is_err());
    Ok(())
}

#[tokio::test]
async fn test_post_without_reply_address_is_silent() -> anyhow::Result<()> {
    let registry = Registry::new();
    registry.register(ROSTER_SERVICE, RosterService::new())?;

    let (conn, mut events) = registry.connect(ROSTER_SERVICE);
    events.recv().await;

    // No reply address: the service processes and stays quiet.
    conn.post(Message::new().with_int("id", 1000)).await?;

    // The channel still works afterwards.
    let mut mailbox = conn.mailbox();
    conn.post(Message::new().with_int("id", 1000).reply_to(&mailbox))
        .await?;
    assert!(mailbox.recv().await.is_some());
    Ok(())
}

#[tokio::test]
async fn test_unknown_id_gets_no_reply() -> anyhow::Result<()> {
    let registry = Registry::new();
    registry.register(ROSTER_SERVICE, RosterService::new())?;

    let (conn, mut events) = registry.connect(ROSTER_SERVICE);
    events.recv().await;

    let mut mailbox = conn.mailbox();
    conn.post(Message::new().with_int("id", 4242).reply_to(&mailbox))
        .await?;

    assert!(timeout(Duration::from_millis(50), mailbox.recv()).await.is_err());
    Ok(())
}

#[tokio::test]
async fn test_watchers_receive_announcements() -> anyhow::Result<()> {
    let registry = Registry::new();
    let roster = RosterService::new();
    registry.register(ROSTER_SERVICE, roster.clone())?;

    let (conn, mut events) = registry.connect(ROSTER_SERVICE);
    events.recv().await;

    let mut mailbox = conn.mailbox();
    conn.post(Message::new().with_int("watch", 1).reply_to(&mailbox))
        .await?;
    // Let the watch registration land before announcing.
    sleep(Duration::from_millis(20)).await;

    roster.insert(1001, "lisi", 20);
    roster.announce("lisi", 20);

    let note = mailbox.recv().await.expect("announcement");
    assert_eq!(note.str("name"), Some("lisi"));
    assert_eq!(note.int("age"), Some(20));
    Ok(())
}

#[tokio::test]
async fn test_dropped_mailbox_swallows_reply() -> anyhow::Result<()> {
    let registry = Registry::new();
    registry.register(ROSTER_SERVICE, RosterService::new())?;

    let (conn, mut events) = registry.connect(ROSTER_SERVICE);
    events.recv().await;

    let mailbox = conn.mailbox();
    let message = Message::new().with_int("id", 1000).reply_to(&mailbox);
    drop(mailbox);

    // The reply has nowhere to land; nothing crashes, and the connection
    // keeps working.
    conn.post(message).await?;
    sleep(Duration::from_millis(20)).await;

    let err = conn.call("anything", &[]).await.unwrap_err();
    assert_eq!(err, Error::Remote(FailureReason::MethodNotFound));
    Ok(())
}
