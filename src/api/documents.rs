use crate::api::AppState;
use crate::domain::{ContractId, DocumentId, DocumentRecord, TimeMs};
use crate::error::AppError;
use crate::orchestration::{Caller, ReviewDecision, Upload};
use axum::body::Bytes;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use std::str::FromStr;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadQuery {
    pub document_type: String,
    pub file_name: String,
}

#[derive(Debug, Deserialize)]
pub struct ReviewRequest {
    pub decision: ReviewDecision,
    pub note: Option<String>,
}

pub async fn upload_document(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
    Query(params): Query<UploadQuery>,
    body: Bytes,
) -> Result<(StatusCode, Json<DocumentRecord>), AppError> {
    let contract_id = ContractId::from_str(&id)?;
    let upload = Upload {
        document_type: params.document_type,
        file_name: params.file_name,
        bytes: body.to_vec(),
    };

    let record = state
        .documents
        .upload(&caller, &contract_id, upload, TimeMs::now())
        .await?;
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn review_document(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
    body: Result<Json<ReviewRequest>, JsonRejection>,
) -> Result<Json<DocumentRecord>, AppError> {
    let document_id = DocumentId::from_str(&id)?;
    let Json(body) = body?;
    let record = state
        .documents
        .review(&caller, &document_id, body.decision, body.note, TimeMs::now())
        .await?;
    Ok(Json(record))
}
