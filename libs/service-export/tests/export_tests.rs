#![allow(clippy::unwrap_used, clippy::expect_used)]

//! End-to-end export/release behaviour against an in-process store.

mod support;

use service_export::{CoordClient, ExportError, ExporterConfig, Network, ServiceExporter, bind_host};
use std::net::SocketAddr;
use std::sync::Arc;
use support::FlakyStore;
use tokio::net::TcpListener;

fn exporter_on(store: &Arc<FlakyStore>) -> ServiceExporter {
    ServiceExporter::new(store.clone())
}

#[tokio::test]
async fn skips_occupied_slots_and_publishes_bound_address() {
    let store = Arc::new(FlakyStore::new());
    store.occupy("/ns/service/echo/0", "10.0.0.1:4000").await;
    store.occupy("/ns/service/echo/1", "10.0.0.2:4000").await;
    let exporter = exporter_on(&store);

    let listener = exporter
        .export_port(Network::Tcp, "127.0.0.1:0", "echo")
        .await
        .unwrap();
    let bound = listener.local_addr().unwrap();

    assert_eq!(store.value("/ns/service/echo/2"), Some(bound.to_string()));
    assert_eq!(store.value("/ns/service/echo/0").as_deref(), Some("10.0.0.1:4000"));
    let registration = exporter.published().await.unwrap();
    assert_eq!(registration.path, "/ns/service/echo/2");
    assert_eq!(registration.address, bound);
}

#[tokio::test]
async fn requested_port_is_ignored() {
    assert_eq!(bind_host("10.0.0.5:9999"), "10.0.0.5");

    // Hold 9999 if we can so the OS cannot hand it out by coincidence.
    let _guard = TcpListener::bind("127.0.0.1:9999").await.ok();
    let store = Arc::new(FlakyStore::new());
    let exporter = exporter_on(&store);

    let listener = exporter
        .export_port(Network::Tcp4, "127.0.0.1:9999", "echo")
        .await
        .unwrap();
    let bound = listener.local_addr().unwrap();

    assert_ne!(bound.port(), 9999);
    assert_ne!(bound.port(), 0);
    assert_eq!(bound.ip().to_string(), "127.0.0.1");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_exporters_claim_distinct_slots() {
    let store = Arc::new(FlakyStore::new());

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let store = store.clone();
        tasks.push(tokio::spawn(async move {
            let exporter = ServiceExporter::new(store);
            let listener = exporter
                .export_port(Network::Tcp4, "127.0.0.1", "echo")
                .await
                .unwrap();
            let path = exporter.published().await.unwrap().path;
            (path, listener)
        }));
    }

    let mut paths = Vec::new();
    let mut listeners = Vec::new();
    for task in tasks {
        let (path, listener) = task.await.unwrap();
        paths.push(path);
        listeners.push(listener);
    }
    paths.sort();
    paths.dedup();

    assert_eq!(paths.len(), 8);
    assert_eq!(store.inner.keys_with_prefix("/ns/service/echo/").len(), 8);
}

#[tokio::test]
async fn store_failure_closes_listener_and_reports_error() {
    let store = Arc::new(FlakyStore::new());
    store.fail_next_sets(1);
    let exporter = exporter_on(&store);

    let err = exporter
        .export_port(Network::Tcp4, "127.0.0.1", "echo")
        .await
        .unwrap_err();

    assert!(
        matches!(&err, ExportError::Store { path, .. } if path == "/ns/service/echo/0"),
        "{err}"
    );
    assert!(exporter.published().await.is_none());
    assert!(store.inner.is_empty());

    // The address the exporter tried to publish is free again.
    let attempted: SocketAddr = store.last_value().unwrap().parse().unwrap();
    let rebound = TcpListener::bind(attempted).await.unwrap();
    assert_eq!(rebound.local_addr().unwrap(), attempted);
}

#[tokio::test]
async fn claim_cap_reports_exhaustion() {
    let store = Arc::new(FlakyStore::new());
    store.occupy("/ns/service/echo/0", "a").await;
    store.occupy("/ns/service/echo/1", "b").await;
    let cfg = ExporterConfig::default().with_max_claim_attempts(2);
    let exporter = ServiceExporter::with_config(store.clone(), &cfg);

    let err = exporter
        .export_port(Network::Tcp4, "127.0.0.1", "echo")
        .await
        .unwrap_err();

    assert!(
        matches!(&err, ExportError::Exhausted { service, attempts: 2 } if service == "echo"),
        "{err}"
    );
    assert!(exporter.published().await.is_none());
    assert_eq!(store.inner.len(), 2);
}

#[tokio::test]
async fn release_deletes_slot_once() {
    let store = Arc::new(FlakyStore::new());
    let exporter = exporter_on(&store);
    let _listener = exporter
        .export_port(Network::Tcp4, "127.0.0.1", "echo")
        .await
        .unwrap();

    exporter.unexport_port().await.unwrap();
    exporter.unexport_port().await.unwrap();

    assert_eq!(store.delete_calls(), 1);
    assert!(store.inner.is_empty());
    assert!(exporter.published().await.is_none());
}

#[tokio::test]
async fn release_without_export_is_noop() {
    let store = Arc::new(FlakyStore::new());
    let exporter = exporter_on(&store);

    exporter.unexport_port().await.unwrap();

    assert_eq!(store.delete_calls(), 0);
}

#[tokio::test]
async fn failed_release_keeps_registration_for_retry() {
    let store = Arc::new(FlakyStore::new());
    let exporter = exporter_on(&store);
    let _listener = exporter
        .export_port(Network::Tcp4, "127.0.0.1", "echo")
        .await
        .unwrap();

    store.fail_next_deletes(1);
    let err = exporter.unexport_port().await.unwrap_err();
    assert!(matches!(err, ExportError::Store { .. }), "{err}");
    assert!(exporter.published().await.is_some());
    assert!(store.value("/ns/service/echo/0").is_some());

    exporter.unexport_port().await.unwrap();
    assert!(exporter.published().await.is_none());
    assert!(store.inner.is_empty());
}

#[tokio::test]
async fn release_of_vanished_slot_counts_as_done() {
    let store = Arc::new(FlakyStore::new());
    let exporter = exporter_on(&store);
    let _listener = exporter
        .export_port(Network::Tcp4, "127.0.0.1", "echo")
        .await
        .unwrap();
    let registration = exporter.published().await.unwrap();

    // Someone else removed the slot and re-created it.
    let removed = store
        .inner
        .delete(&registration.path, registration.revision)
        .await
        .unwrap();
    assert_eq!(removed, coord_client::DeleteOutcome::Deleted);
    store.occupy(&registration.path, "10.9.9.9:1").await;

    exporter.unexport_port().await.unwrap();

    assert!(exporter.published().await.is_none());
    assert_eq!(store.value(&registration.path).as_deref(), Some("10.9.9.9:1"));
}

#[tokio::test]
async fn second_export_replaces_tracked_registration() {
    let store = Arc::new(FlakyStore::new());
    let exporter = exporter_on(&store);
    let _first = exporter
        .export_port(Network::Tcp4, "127.0.0.1", "alpha")
        .await
        .unwrap();
    let _second = exporter
        .export_port(Network::Tcp4, "127.0.0.1", "beta")
        .await
        .unwrap();

    assert_eq!(
        exporter.published().await.map(|r| r.path).as_deref(),
        Some("/ns/service/beta/0")
    );

    exporter.unexport_port().await.unwrap();

    assert!(store.value("/ns/service/beta/0").is_none());
    assert!(store.value("/ns/service/alpha/0").is_some());
}

#[tokio::test]
async fn released_slot_is_reused_by_next_export() {
    let store = Arc::new(FlakyStore::new());
    let first = exporter_on(&store);
    let second = exporter_on(&store);

    let _a = first
        .export_port(Network::Tcp4, "127.0.0.1", "echo")
        .await
        .unwrap();
    let _b = second
        .export_port(Network::Tcp4, "127.0.0.1", "echo")
        .await
        .unwrap();
    first.unexport_port().await.unwrap();

    let third = exporter_on(&store);
    let _c = third
        .export_port(Network::Tcp4, "127.0.0.1", "echo")
        .await
        .unwrap();

    assert_eq!(
        third.published().await.map(|r| r.path).as_deref(),
        Some("/ns/service/echo/0")
    );
}

#[tokio::test]
async fn connect_with_memory_backend() {
    let cfg = ExporterConfig::new(service_export::CoordClientConfig::memory());
    let exporter = ServiceExporter::connect(&cfg).await.unwrap();

    let _listener = exporter
        .export_port(Network::Tcp4, "127.0.0.1", "echo")
        .await
        .unwrap();

    assert_eq!(
        exporter.published().await.map(|r| r.path).as_deref(),
        Some("/ns/service/echo/0")
    );
}

#[tokio::test]
async fn connect_without_endpoints_is_a_connection_error() {
    let mut coord = service_export::CoordClientConfig::default();
    coord.endpoints.clear();
    let cfg = ExporterConfig::new(coord);

    let err = ServiceExporter::connect(&cfg).await.unwrap_err();

    assert!(matches!(err, ExportError::Connection(_)), "{err}");
}
