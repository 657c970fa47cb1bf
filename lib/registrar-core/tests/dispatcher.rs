mod common;

use common::*;
use registrar_core::{
    BindingMode, DispatchOutcome, EventDispatcher, InMemoryRegistry, Protocol, RuntimeError,
    RuntimeEvent, ServiceRegistry, SkipReason, StreamEnd,
};
use std::sync::Arc;
use tokio::sync::watch;

fn dispatcher(runtime: Arc<FakeRuntime>, registry: Arc<dyn ServiceRegistry>) -> EventDispatcher {
    EventDispatcher::new(context(runtime, registry, BindingMode::Canonical))
}

#[tokio::test]
async fn start_event_registers_opted_in_container() {
    let runtime = FakeRuntime::new();
    runtime.add_container(opted_in("c1"));
    let registry = Arc::new(InMemoryRegistry::new());
    let dispatcher = dispatcher(runtime, registry.clone());

    let outcome = dispatcher.handle(&RuntimeEvent::container("start", "c1")).await;
    assert_eq!(outcome, DispatchOutcome::Registered(vec!["c1".to_string()]));

    let record = registry.get("c1").await.unwrap();
    assert_eq!(record.service_name, "c1-name");
    assert_eq!(record.address.to_string(), "10.0.0.5");
    assert_eq!(record.port, 8080);
    assert_eq!(record.check.protocol, Protocol::Tcp);
    assert_eq!(record.check.endpoint, "10.0.0.5:8080");
    assert_eq!(record.tags, vec!["nginx:1.25".to_string()]);
}

#[tokio::test]
async fn start_event_without_opt_in_makes_no_registry_call() {
    let runtime = FakeRuntime::new();
    runtime.add_container(container("c1", &[], &[("80/tcp", "0.0.0.0", "8080")]));
    let registry = Arc::new(InMemoryRegistry::new());
    let dispatcher = dispatcher(runtime, registry.clone());

    let outcome = dispatcher.handle(&RuntimeEvent::container("start", "c1")).await;
    assert_eq!(outcome, DispatchOutcome::Skipped(SkipReason::NotOptedIn));
    assert_eq!(registry.mutation_count(), 0);
    assert_eq!(registry.service_count().await, 0);
}

#[tokio::test]
async fn replayed_start_event_is_idempotent() {
    let runtime = FakeRuntime::new();
    runtime.add_container(opted_in("c1"));
    let registry = Arc::new(InMemoryRegistry::new());
    let dispatcher = dispatcher(runtime, registry.clone());

    for _ in 0..3 {
        dispatcher.handle(&RuntimeEvent::container("start", "c1")).await;
    }
    assert_eq!(registry.service_ids().await, vec!["c1"]);
    assert_eq!(registry.mutation_count(), 1);
}

#[tokio::test]
async fn destroy_of_never_registered_workload_is_a_noop() {
    let registry = Arc::new(InMemoryRegistry::new());
    let dispatcher = dispatcher(FakeRuntime::new(), registry.clone());

    let outcome = dispatcher.handle(&RuntimeEvent::container("destroy", "ghost")).await;
    assert_eq!(outcome, DispatchOutcome::Deregistered(vec![]));
    assert_eq!(registry.mutation_count(), 0);
}

#[tokio::test]
async fn destroy_removes_registration() {
    let runtime = FakeRuntime::new();
    runtime.add_container(opted_in("c1"));
    let registry = Arc::new(InMemoryRegistry::new());
    let dispatcher = dispatcher(runtime.clone(), registry.clone());

    dispatcher.handle(&RuntimeEvent::container("start", "c1")).await;
    runtime.remove_container("c1");
    let outcome = dispatcher.handle(&RuntimeEvent::container("destroy", "c1")).await;

    assert_eq!(outcome, DispatchOutcome::Deregistered(vec!["c1".to_string()]));
    assert_eq!(registry.service_count().await, 0);
}

#[tokio::test]
async fn per_binding_destroy_removes_every_owned_entry() {
    let runtime = FakeRuntime::new();
    runtime.add_container(container(
        "c1",
        &[("register", "yes")],
        &[("80/tcp", "0.0.0.0", "8080"), ("53/udp", "0.0.0.0", "5353")],
    ));
    runtime.add_container(opted_in("c10"));
    let registry = Arc::new(InMemoryRegistry::new());
    let ctx = context(runtime, registry.clone(), BindingMode::PerBinding);
    let dispatcher = EventDispatcher::new(ctx);

    dispatcher.handle(&RuntimeEvent::container("start", "c1")).await;
    dispatcher.handle(&RuntimeEvent::container("start", "c10")).await;
    assert_eq!(
        registry.service_ids().await,
        vec!["c10_tcp_8080", "c1_tcp_8080", "c1_udp_5353"]
    );

    let DispatchOutcome::Deregistered(mut removed) =
        dispatcher.handle(&RuntimeEvent::container("destroy", "c1")).await
    else {
        panic!("expected deregistration");
    };
    removed.sort();
    assert_eq!(removed, vec!["c1_tcp_8080", "c1_udp_5353"]);
    assert_eq!(registry.service_ids().await, vec!["c10_tcp_8080"]);
}

#[tokio::test]
async fn orchestrated_task_registers_under_service_name() {
    let runtime = FakeRuntime::new();
    runtime.add_container(task("t1", "svc1"));
    runtime.add_service(service("svc1", "api", &[30080, 30443]));
    let registry = Arc::new(InMemoryRegistry::new());
    let dispatcher = dispatcher(runtime, registry.clone());

    let outcome = dispatcher.handle(&RuntimeEvent::container("start", "t1")).await;
    assert_eq!(outcome, DispatchOutcome::Registered(vec!["t1".to_string()]));

    let record = registry.get("t1").await.unwrap();
    assert_eq!(record.service_name, "api");
    assert_eq!(record.port, 30080);
    assert_eq!(record.address.to_string(), "10.0.0.5");
    assert_eq!(record.tags, vec!["api:2".to_string()]);
}

#[tokio::test]
async fn task_whose_service_vanished_is_skipped_not_fatal() {
    let runtime = FakeRuntime::new();
    runtime.add_container(task("t1", "gone"));
    let registry = Arc::new(InMemoryRegistry::new());
    let dispatcher = dispatcher(runtime, registry.clone());

    let outcome = dispatcher.handle(&RuntimeEvent::container("start", "t1")).await;
    assert!(matches!(outcome, DispatchOutcome::Failed(_)));
    assert_eq!(registry.mutation_count(), 0);
}

#[tokio::test]
async fn start_event_for_vanished_container_fails_quietly() {
    let registry = Arc::new(InMemoryRegistry::new());
    let dispatcher = dispatcher(FakeRuntime::new(), registry.clone());

    let outcome = dispatcher.handle(&RuntimeEvent::container("start", "gone")).await;
    assert!(matches!(outcome, DispatchOutcome::Failed(_)));
}

#[tokio::test]
async fn registry_rejection_is_reported_and_dropped() {
    let runtime = FakeRuntime::new();
    runtime.add_container(opted_in("c1"));
    let registry = FlakyRegistry::new();
    registry.reject(true);
    let dispatcher = dispatcher(runtime, registry.clone());

    let outcome = dispatcher.handle(&RuntimeEvent::container("start", "c1")).await;
    assert!(matches!(outcome, DispatchOutcome::Failed(ref msg) if msg.contains("500")));
    assert_eq!(registry.inner.service_count().await, 0);
}

#[tokio::test]
async fn ignored_events_do_not_touch_registry() {
    let runtime = FakeRuntime::new();
    runtime.add_container(opted_in("c1"));
    let registry = Arc::new(InMemoryRegistry::new());
    let dispatcher = dispatcher(runtime, registry.clone());

    let mut network = RuntimeEvent::container("start", "c1");
    network.kind = "network".to_string();
    assert_eq!(dispatcher.handle(&network).await, DispatchOutcome::Ignored);
    assert_eq!(
        dispatcher.handle(&RuntimeEvent::container("die", "c1")).await,
        DispatchOutcome::Ignored
    );
    assert_eq!(registry.mutation_count(), 0);
}

#[tokio::test]
async fn run_consumes_events_in_order_until_stream_closes() {
    let runtime = FakeRuntime::new();
    runtime.add_container(opted_in("c1"));
    let registry = Arc::new(InMemoryRegistry::new());
    let dispatcher = dispatcher(runtime.clone(), registry.clone());

    let events = runtime.subscription();
    events.unbounded_send(Ok(RuntimeEvent::container("start", "c1"))).unwrap();
    events.unbounded_send(Ok(RuntimeEvent::container("destroy", "c1"))).unwrap();
    events.unbounded_send(Ok(RuntimeEvent::container("start", "c1"))).unwrap();
    drop(events);

    let (_tx, mut shutdown) = watch::channel(false);
    let end = dispatcher.run(runtime_stream(&runtime), &mut shutdown).await;

    assert_eq!(end, StreamEnd::Closed);
    assert_eq!(registry.service_ids().await, vec!["c1"]);
    assert_eq!(registry.mutation_count(), 3);
}

#[tokio::test]
async fn run_reports_stream_failure() {
    let runtime = FakeRuntime::new();
    let dispatcher = dispatcher(runtime.clone(), Arc::new(InMemoryRegistry::new()));

    let events = runtime.subscription();
    events
        .unbounded_send(Err(RuntimeError::Unreachable("connection reset".to_string())))
        .unwrap();

    let (_tx, mut shutdown) = watch::channel(false);
    let end = dispatcher.run(runtime_stream(&runtime), &mut shutdown).await;
    assert_eq!(
        end,
        StreamEnd::Failed(RuntimeError::Unreachable("connection reset".to_string()))
    );
}

#[tokio::test]
async fn run_stops_on_shutdown() {
    let runtime = FakeRuntime::new();
    let dispatcher = dispatcher(runtime.clone(), Arc::new(InMemoryRegistry::new()));
    let _events = runtime.subscription();

    let (tx, mut shutdown) = watch::channel(false);
    tx.send(true).unwrap();
    let end = dispatcher.run(runtime_stream(&runtime), &mut shutdown).await;
    assert_eq!(end, StreamEnd::Shutdown);
}

fn runtime_stream(runtime: &FakeRuntime) -> registrar_core::EventStream {
    use registrar_core::WorkloadRuntime;
    runtime.stream_events()
}
