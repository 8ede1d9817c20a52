use loanflow::gateway::{LocalDocumentStore, LogNotifier, WebhookNotifier};
use loanflow::orchestration::{seed_catalog_csv, PaymentService};
use loanflow::{api, config::Config, db::init_db, ApprovalEvaluator, DocumentStore, Notifier};
use loanflow::{Policy, QueueWorker, Repository};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    let config = Config::from_env()?;
    let port = config.port;

    let pool = init_db(&config.database_path).await?;
    let repo = Arc::new(Repository::new(pool));

    if let Some(path) = &config.catalog_path {
        seed_catalog_csv(&repo, path).await?;
    }

    let store: Arc<dyn DocumentStore> = Arc::new(LocalDocumentStore::new(
        config.document_store_dir.clone(),
        config.document_base_url.clone(),
    ));
    let notifier: Arc<dyn Notifier> = match &config.notify_webhook_url {
        Some(url) => Arc::new(WebhookNotifier::new(url.clone())),
        None => Arc::new(LogNotifier),
    };
    let policy = Policy::from_config(&config);

    // Background evaluation of queued contracts
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let worker = QueueWorker::new(
        repo.clone(),
        ApprovalEvaluator::new(repo.clone(), notifier.clone(), policy),
        PaymentService::new(repo.clone()),
        config.queue_lease_ms,
    );
    let worker_handle = worker.spawn(Duration::from_millis(config.queue_poll_ms), shutdown_rx);

    let app = api::create_router(api::AppState::new(repo, store, notifier, policy));

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!(error = %e, "failed to listen for shutdown signal");
            }
        })
        .await?;

    let _ = shutdown_tx.send(true);
    worker_handle.await?;
    Ok(())
}
