use std::sync::{Arc, Mutex};

use junction::{
    channel::{Channel, ChannelContext, ChannelError, ChannelLifecycle, ChannelStore},
    config::WorkerOptions,
    message::ApiMessage,
    sender::{LocalMessageSender, MessageSender},
    store::{FileStore, StoreManager},
    supervisor::{ServiceParent, Supervisor, WorkerFactory},
};
use junction_worker::{
    TransportMessage, WorkerConfig, WorkerState,
    worker_test_util::{SimulatedProbe, SimulatedWorker},
};
use serde_json::{Map, Value, json};
use tempfile::TempDir;

const TELNET: &str = "transports.telnet.TelnetServerTransport";
const XMPP: &str = "transports.xmpp.XMPPTransport";

type Probes = Arc<Mutex<Vec<SimulatedProbe>>>;

fn simulated_factory(probes: &Probes) -> WorkerFactory {
    let factory = WorkerFactory::with_defaults();
    for implementation in [TELNET, XMPP] {
        let sink = Arc::clone(probes);
        factory.register_constructor(
            implementation,
            Arc::new(move |config: WorkerConfig, _options: &WorkerOptions| {
                let (handle, probe) = SimulatedWorker::spawn(implementation, config);
                sink.lock().unwrap().push(probe);
                handle
            }),
        );
    }
    factory
}

fn context_with(store: ChannelStore) -> (ChannelContext, Probes) {
    let probes: Probes = Arc::new(Mutex::new(Vec::new()));
    let supervisor = Supervisor::new(simulated_factory(&probes), WorkerOptions::default());
    (ChannelContext::new(store, Arc::new(supervisor)), probes)
}

fn properties(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap()
}

fn telnet(mo_url: &str) -> Map<String, Value> {
    properties(json!({
        "type": "telnet",
        "config": {"twisted_endpoint": "tcp:0"},
        "mo_url": mo_url,
    }))
}

#[tokio::test]
async fn create_save_load_keeps_properties_and_generated_id() {
    let (ctx, _) = context_with(ChannelStore::in_memory());
    let parent = ServiceParent::new("test");

    let channel = Channel::new(ctx.clone(), telnet("http://example.com/mo"), None).unwrap();
    assert!(!channel.id().is_empty());
    channel.save().await.unwrap();

    let loaded = Channel::from_id(ctx, channel.id(), &parent).await.unwrap();
    assert_eq!(loaded.status(), channel.status());
    assert_eq!(loaded.status()["id"], json!(channel.id()));
}

#[tokio::test]
async fn file_store_survives_a_restart() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("channels.json");

    let id = {
        let backend = FileStore::open(&path).await.unwrap();
        let (ctx, _) = context_with(ChannelStore::new(StoreManager::new(Arc::new(backend))));
        let channel = Channel::new(ctx, telnet("http://example.com/mo"), None).unwrap();
        channel.save().await.unwrap();
        channel.id().to_string()
    };

    let backend = FileStore::open(&path).await.unwrap();
    let (ctx, _) = context_with(ChannelStore::new(StoreManager::new(Arc::new(backend))));
    let ids = Channel::get_all(&ctx.store).await.unwrap();
    assert!(ids.contains(&id));

    let loaded = Channel::from_id(ctx, &id, &ServiceParent::new("test")).await.unwrap();
    assert_eq!(loaded.properties()["mo_url"], json!("http://example.com/mo"));
}

#[tokio::test]
async fn start_configures_both_workers() {
    let (ctx, probes) = context_with(ChannelStore::in_memory());
    let parent = ServiceParent::new("test");
    let mut channel =
        Channel::new(ctx, telnet("http://example.com/mo"), Some("chan".into())).unwrap();
    channel.start(&parent, None).await.unwrap();

    let probe = probes.lock().unwrap()[0].clone();
    assert_eq!(probe.state().await, WorkerState::Running);
    assert_eq!(
        Value::Object(probe.started_with().await[0].clone()),
        json!({"twisted_endpoint": "tcp:0", "transport_name": "chan"})
    );
    assert_eq!(parent.child_names(), vec!["application:chan", "chan"]);
}

#[tokio::test]
async fn xmpp_channels_use_the_xmpp_transport() {
    let (ctx, _) = context_with(ChannelStore::in_memory());
    let parent = ServiceParent::new("test");
    let mut p = telnet("http://example.com/mo");
    p.insert("type".into(), json!("xmpp"));
    let mut channel = Channel::new(ctx, p, None).unwrap();
    channel.start(&parent, None).await.unwrap();
    assert_eq!(channel.transport_worker().unwrap().implementation(), XMPP);
}

#[tokio::test]
async fn config_update_restarts_and_mo_url_update_does_not() {
    let (ctx, probes) = context_with(ChannelStore::in_memory());
    let parent = ServiceParent::new("test");
    let mut channel =
        Channel::new(ctx.clone(), telnet("http://example.com/mo"), Some("chan".into())).unwrap();
    channel.save().await.unwrap();
    channel.start(&parent, None).await.unwrap();
    let original = channel.transport_worker().unwrap().instance_id().to_string();

    channel
        .update(properties(json!({"mo_url": "http://example.com/v2"})))
        .await
        .unwrap();
    assert_eq!(channel.transport_worker().unwrap().instance_id(), original);
    assert_eq!(probes.lock().unwrap().len(), 1);

    let status = channel
        .update(properties(json!({"config": {"twisted_endpoint": "tcp:2323"}})))
        .await
        .unwrap();
    assert_ne!(channel.transport_worker().unwrap().instance_id(), original);
    assert_eq!(status["config"], json!({"twisted_endpoint": "tcp:2323"}));
    assert_eq!(status["mo_url"], json!("http://example.com/v2"));

    let first = probes.lock().unwrap()[0].clone();
    assert_eq!(first.state().await, WorkerState::Stopped);
    assert_eq!(probes.lock().unwrap().len(), 2);

    let stored = Channel::from_id(ctx, "chan", &ServiceParent::new("other"))
        .await
        .unwrap();
    assert_eq!(stored.properties()["config"], json!({"twisted_endpoint": "tcp:2323"}));
}

#[tokio::test]
async fn invalid_type_creates_no_workers() {
    let (ctx, probes) = context_with(ChannelStore::in_memory());
    let parent = ServiceParent::new("test");
    let mut p = telnet("http://example.com/mo");
    p.insert("type".into(), json!("carrier-pigeon"));
    let mut channel = Channel::new(ctx, p, None).unwrap();

    let err = channel.start(&parent, None).await.unwrap_err();
    assert_eq!(err.name(), "InvalidChannelType");
    assert!(err.to_string().contains("telnet, xmpp"));
    assert!(probes.lock().unwrap().is_empty());
    assert!(parent.is_empty());
}

#[tokio::test]
async fn delete_leaves_other_channels_alone() {
    let (ctx, _) = context_with(ChannelStore::in_memory());
    let parent = ServiceParent::new("test");
    let mut first = Channel::new(ctx.clone(), telnet("http://a.example"), None).unwrap();
    let second = Channel::new(ctx.clone(), telnet("http://b.example"), None).unwrap();
    first.save().await.unwrap();
    second.save().await.unwrap();
    first.start(&parent, None).await.unwrap();

    first.delete().await.unwrap();
    assert_eq!(first.lifecycle(), ChannelLifecycle::Deleted);
    // delete does not stop workers
    assert!(first.is_running());

    let err = Channel::from_id(ctx.clone(), first.id(), &parent).await.unwrap_err();
    assert!(matches!(err, ChannelError::ChannelNotFound { .. }));
    let ids = Channel::get_all(&ctx.store).await.unwrap();
    assert!(!ids.contains(first.id()));
    assert!(ids.contains(second.id()));

    first.stop().await.unwrap();
    assert!(parent.is_empty());
}

#[tokio::test]
async fn restore_after_reload_can_stop_running_workers() {
    let (ctx, probes) = context_with(ChannelStore::in_memory());
    let parent = ServiceParent::new("test");
    let mut channel =
        Channel::new(ctx.clone(), telnet("http://example.com/mo"), Some("chan".into())).unwrap();
    channel.save().await.unwrap();
    channel.start(&parent, None).await.unwrap();
    drop(channel);

    let mut restored = Channel::from_id(ctx, "chan", &parent).await.unwrap();
    assert!(restored.is_running());
    restored.stop().await.unwrap();

    let probe = probes.lock().unwrap()[0].clone();
    assert_eq!(probe.stop_count().await, 1);
    assert_eq!(probes.lock().unwrap().len(), 1);
    assert!(parent.is_empty());
}

#[tokio::test]
async fn outbound_and_inbound_flow_through_local_sender() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/mo")
        .match_body(mockito::Matcher::PartialJson(json!({
            "from": "+27000",
            "content": "ping",
            "channel_id": "chan",
        })))
        .with_status(200)
        .create_async()
        .await;

    let (ctx, probes) = context_with(ChannelStore::in_memory());
    let parent = ServiceParent::new("test");
    let mut channel =
        Channel::new(ctx, telnet(&format!("{}/mo", server.url())), Some("chan".into())).unwrap();
    channel.start(&parent, None).await.unwrap();

    let sender = LocalMessageSender::new(parent.clone());
    let reply = Channel::send_message(
        "chan",
        &sender,
        &ApiMessage::new("+27111", "pong")
            .to("+27000")
            .with_channel_data("session_event", json!("close")),
    )
    .await
    .unwrap();
    assert_eq!(reply.channel_data["session_event"], json!("close"));

    let probe = probes.lock().unwrap()[0].clone();
    let outbound = probe.outbound().await;
    assert_eq!(outbound[0].to_addr.as_deref(), Some("+27000"));

    let inbound = TransportMessage::send("chan", Some("+27111".into()), "+27000", Some("ping".into()));
    sender.send_message(inbound, "chan.inbound").await.unwrap();
    mock.assert_async().await;
}

#[tokio::test]
async fn send_to_unknown_channel_is_a_send_error() {
    let sender = LocalMessageSender::new(ServiceParent::new("test"));
    let err = Channel::send_message("ghost", &sender, &ApiMessage::new("a", "b"))
        .await
        .unwrap_err();
    assert!(matches!(err, ChannelError::Send(_)));
    assert_eq!(err.code(), 502);
}
