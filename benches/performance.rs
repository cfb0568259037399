//! Performance benchmarks for folder collections and the subscription manager.

use async_trait::async_trait;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use feed_subscriptions::{
    Action, CredentialError, CredentialIssuer, CredentialPayload, Feed, FeedTransport,
    FolderCollection, ListFeedsResponse, PcdRegistry, PermissionRequest, PollRequest,
    PollResponse, RequesterIdentity, SerializedPcd, SubscriptionManager, TransportError,
};
use std::sync::Arc;

fn ticket(n: usize) -> SerializedPcd {
    SerializedPcd::new("ticket-pcd", format!("{{\"ticket\":{},\"owner\":\"0xabc\"}}", n))
}

fn tickets(count: usize) -> Vec<SerializedPcd> {
    (0..count).map(ticket).collect()
}

/// Answers every poll with one replace action on the feed's own folder.
struct Echo;

#[async_trait]
impl FeedTransport for Echo {
    async fn list_feeds(&self, _: &str) -> Result<ListFeedsResponse, TransportError> {
        Ok(ListFeedsResponse { feeds: vec![] })
    }

    async fn poll_feed(&self, _: &str, request: &PollRequest) -> Result<PollResponse, TransportError> {
        Ok(PollResponse::ok(vec![Action::ReplaceInFolder {
            folder: request.feed_id.clone(),
            pcds: tickets(4),
        }]))
    }
}

#[async_trait]
impl CredentialIssuer for Echo {
    async fn issue(
        &self,
        identity: &RequesterIdentity,
        _: &CredentialPayload,
    ) -> Result<SerializedPcd, CredentialError> {
        Ok(SerializedPcd::new("signature", identity.commitment.clone()))
    }
}

fn manager_with(subscriptions: usize) -> SubscriptionManager {
    let manager = SubscriptionManager::new(Arc::new(Echo), Arc::new(Echo));
    for n in 0..subscriptions {
        let id = format!("feed-{}", n);
        let feed = Feed::new(id.clone(), "bench feed")
            .with_permission(PermissionRequest::SignedIdentity)
            .with_permission(PermissionRequest::ReplaceInFolder { folder: id });
        manager
            .subscribe("https://bench.example/feeds", feed, None, false)
            .unwrap();
    }
    manager
}

/// Benchmark batch application against collections of growing size
fn bench_apply_batch(c: &mut Criterion) {
    let mut group = c.benchmark_group("apply_batch");

    for folders in [10, 100, 1000] {
        group.bench_with_input(
            BenchmarkId::new("existing_folders", folders),
            &folders,
            |b, &folders| {
                let collection = FolderCollection::new();
                let seed: Vec<Action> = (0..folders)
                    .map(|n| Action::ReplaceInFolder {
                        folder: format!("Events/{}", n),
                        pcds: tickets(8),
                    })
                    .collect();
                collection.apply_actions(&seed).unwrap();

                let batch = vec![
                    Action::ReplaceInFolder {
                        folder: "Events/0".into(),
                        pcds: tickets(8),
                    },
                    Action::AppendToFolder {
                        folder: "Inbox".into(),
                        pcds: tickets(1),
                    },
                ];

                b.iter(|| {
                    black_box(collection.apply_actions(&batch).unwrap());
                });
            },
        );
    }

    group.finish();
}

/// Benchmark verified application, cold and warm verification cache
fn bench_verified_apply(c: &mut Criterion) {
    let mut group = c.benchmark_group("verified_apply");
    let batch = vec![Action::ReplaceInFolder {
        folder: "Tickets".into(),
        pcds: tickets(64),
    }];

    group.bench_function("cold_cache", |b| {
        b.iter(|| {
            let registry = Arc::new(PcdRegistry::new(1024));
            registry.register_fn("ticket-pcd", |pcd| {
                serde_json::from_str::<serde_json::Value>(&pcd.pcd)
                    .map(|_| ())
                    .map_err(|e| e.to_string())
            });
            let collection = FolderCollection::with_registry(registry);
            black_box(collection.apply_actions(&batch).unwrap());
        });
    });

    group.bench_function("warm_cache", |b| {
        let registry = Arc::new(PcdRegistry::new(1024));
        registry.register_fn("ticket-pcd", |pcd| {
            serde_json::from_str::<serde_json::Value>(&pcd.pcd)
                .map(|_| ())
                .map_err(|e| e.to_string())
        });
        let collection = FolderCollection::with_registry(registry);
        collection.apply_actions(&batch).unwrap();

        b.iter(|| {
            black_box(collection.apply_actions(&batch).unwrap());
        });
    });

    group.finish();
}

/// Benchmark a full poll round with many subscriptions
fn bench_poll_round(c: &mut Criterion) {
    let mut group = c.benchmark_group("poll_round");
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap();
    let identity = RequesterIdentity::new("0xbench");

    for subscriptions in [1, 10, 100] {
        group.bench_with_input(
            BenchmarkId::new("subscriptions", subscriptions),
            &subscriptions,
            |b, &subscriptions| {
                let manager = manager_with(subscriptions);
                b.iter(|| {
                    let batches = runtime.block_on(manager.poll_subscriptions(&identity));
                    black_box(batches);
                });
            },
        );
    }

    group.finish();
}

/// Benchmark snapshot serialization
fn bench_serialize(c: &mut Criterion) {
    let mut group = c.benchmark_group("serialize");

    for subscriptions in [10, 100, 1000] {
        group.bench_with_input(
            BenchmarkId::new("subscriptions", subscriptions),
            &subscriptions,
            |b, &subscriptions| {
                let manager = manager_with(subscriptions);
                b.iter(|| {
                    black_box(manager.serialize().unwrap());
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_apply_batch,
    bench_verified_apply,
    bench_poll_round,
    bench_serialize,
);

criterion_main!(benches);
