use crate::api::AppState;
use crate::domain::{LoanId, Payment, PaymentId, TimeMs};
use crate::error::AppError;
use crate::orchestration::{Caller, LoanView};
use axum::extract::{Path, State};
use axum::Json;
use std::str::FromStr;

pub async fn get_loan(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<Json<LoanView>, AppError> {
    let loan_id = LoanId::from_str(&id)?;
    Ok(Json(state.payments.get_loan(&caller, &loan_id).await?))
}

pub async fn pay(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<Json<Payment>, AppError> {
    let payment_id = PaymentId::from_str(&id)?;
    let payment = state
        .payments
        .record_payment(&caller, &payment_id, TimeMs::now())
        .await?;
    Ok(Json(payment))
}
