use crate::api::AppState;
use crate::domain::{ContractId, Decimal, EmploymentStatus, SponsorDecision, TimeMs, UserId};
use crate::error::AppError;
use crate::orchestration::{Caller, ContractView, NewContract, Upload};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use std::str::FromStr;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateContractRequest {
    pub sponsor1_id: String,
    pub sponsor2_id: String,
    pub loan_type: String,
    pub loan_term: String,
    pub amount: Decimal,
    pub term_months: u32,
    pub employment_status: EmploymentStatus,
    #[serde(default)]
    pub documents: Vec<InlineDocument>,
}

/// A document sent inline with the application; `content` is the file text.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineDocument {
    pub document_type: String,
    pub file_name: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct SponsorDecisionRequest {
    pub decision: SponsorDecision,
}

pub async fn create_contract(
    State(state): State<AppState>,
    caller: Caller,
    body: Result<Json<CreateContractRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ContractView>), AppError> {
    let Json(body) = body?;
    let request = NewContract {
        sponsor1_id: UserId::new(body.sponsor1_id.trim()),
        sponsor2_id: UserId::new(body.sponsor2_id.trim()),
        loan_type: body.loan_type,
        loan_term: body.loan_term,
        amount: body.amount,
        term_months: body.term_months,
        employment_status: body.employment_status,
        documents: body
            .documents
            .into_iter()
            .map(|d| Upload {
                document_type: d.document_type,
                file_name: d.file_name,
                bytes: d.content.into_bytes(),
            })
            .collect(),
    };

    let view = state
        .contracts
        .create(&caller, request, TimeMs::now())
        .await?;
    Ok((StatusCode::CREATED, Json(view)))
}

pub async fn get_contract(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<Json<ContractView>, AppError> {
    let id = ContractId::from_str(&id)?;
    Ok(Json(state.contracts.get(&caller, &id).await?))
}

pub async fn sponsor_decision(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
    body: Result<Json<SponsorDecisionRequest>, JsonRejection>,
) -> Result<Json<ContractView>, AppError> {
    let id = ContractId::from_str(&id)?;
    let Json(body) = body?;
    let view = state
        .contracts
        .sponsor_decide(&caller, &id, body.decision, TimeMs::now())
        .await?;
    Ok(Json(view))
}
