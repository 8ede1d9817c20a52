pub mod auth;
pub mod contracts;
pub mod documents;
pub mod health;
pub mod loans;

use crate::db::Repository;
use crate::gateway::{DocumentStore, Notifier};
use crate::orchestration::{ContractService, DocumentService, PaymentService, Policy};
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub contracts: ContractService,
    pub documents: DocumentService,
    pub payments: PaymentService,
}

impl AppState {
    pub fn new(
        repo: Arc<Repository>,
        store: Arc<dyn DocumentStore>,
        notifier: Arc<dyn Notifier>,
        policy: Policy,
    ) -> Self {
        let contracts = ContractService::new(repo.clone(), store, notifier, policy);
        Self {
            documents: contracts.documents().clone(),
            payments: PaymentService::new(repo.clone()),
            contracts,
            repo,
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/v1/contracts", post(contracts::create_contract))
        .route("/v1/contracts/:id", get(contracts::get_contract))
        .route(
            "/v1/contracts/:id/sponsor-decision",
            post(contracts::sponsor_decision),
        )
        .route("/v1/contracts/:id/documents", post(documents::upload_document))
        .route("/v1/documents/:id/review", post(documents::review_document))
        .route("/v1/loans/:id", get(loans::get_loan))
        .route("/v1/payments/:id/pay", post(loans::pay))
        .layer(cors)
        .with_state(state)
}
