//! # Example: watching an in-memory store
//!
//! Two applications are published on the `apps` topic. Each gets one listener that
//! emits a tick per stream identifier, then ends. `watch` returns once both have
//! reported.
//!
//! Run with `RUST_LOG=appwatch=debug cargo run --example watch_memory`.

use std::{sync::Arc, time::Duration};

use appwatch::{
    AppWatcher, ApplicationRecord, DEFAULT_IDENTIFIER_KEY, ListenerError, LogWriter, MemoryStore,
    RunContext, SourceFn, StatusChannel, StoreError, StreamListenerFactory, Subscribe, UserRecord,
    WatcherConfig, output_channel,
};
use tracing_subscriber::EnvFilter;

async fn seed(store: &MemoryStore, app: &str, users: &[&str]) -> Result<(), StoreError> {
    store
        .put_application(&ApplicationRecord::new(app).with_setting("track", "rust"))
        .await?;
    for user in users {
        let id = format!("user:{user}");
        store.add_member(app, &id).await;
        store
            .put_user(&id, &UserRecord::new(*user).with_metadata(DEFAULT_IDENTIFIER_KEY, *user))
            .await?;
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("appwatch=info")),
        )
        .init();

    let store = Arc::new(MemoryStore::new());
    seed(&store, "alpha", &["ada", "grace"]).await?;
    seed(&store, "beta", &["linus"]).await?;
    seed(&store, "gamma", &[]).await?;

    let factory = StreamListenerFactory::new(SourceFn::new(|ctx: RunContext<String>| async move {
        for id in ctx.identifiers.iter() {
            tokio::select! {
                _ = ctx.token.cancelled() => return Err(ListenerError::Canceled),
                _ = tokio::time::sleep(Duration::from_millis(100)) => {}
            }
            let _ = ctx.output.send(format!("{} <- {id}", ctx.app.name)).await;
        }
        Ok(())
    }));

    let cfg = WatcherConfig::default();
    let (output, mut items) = output_channel(cfg.output_capacity);
    let status = StatusChannel::new(cfg.status_capacity);
    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
    let watcher = AppWatcher::builder(cfg, Arc::clone(&store), factory)
        .with_subscribers(subs)
        .build();

    let printer = tokio::spawn(async move {
        while let Some(item) = items.recv().await {
            println!("[item] {item}");
        }
    });

    let publisher = Arc::clone(&store);
    tokio::spawn(async move {
        while publisher.publish("apps", "alpha").await == 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        // No identifiers: skipped.
        publisher.publish("apps", "gamma").await;
        publisher.publish("apps", "beta").await;
    });

    watcher.watch(output, status).await?;
    printer.abort();
    println!("all listeners reported");
    Ok(())
}
