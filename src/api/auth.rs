//! Caller identity from request headers.
//!
//! Authentication happens upstream; this service trusts `x-user-id` and
//! `x-user-role` as set by the gateway in front of it.

use crate::error::AppError;
use crate::orchestration::{Caller, Role};
use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

pub fn caller_from_headers(headers: &HeaderMap) -> Result<Caller, AppError> {
    let user_id = header(headers, USER_ID_HEADER)
        .ok_or_else(|| AppError::Unauthorized(format!("missing {} header", USER_ID_HEADER)))?;
    let role = match header(headers, USER_ROLE_HEADER) {
        None => Role::User,
        Some(raw) => Role::parse(raw)
            .ok_or_else(|| AppError::Validation(format!("unknown role: {}", raw)))?,
    };

    Ok(match role {
        Role::User => Caller::user(user_id),
        Role::Admin => Caller::admin(user_id),
    })
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Caller {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        caller_from_headers(&parts.headers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_role_defaults_to_user() {
        let mut headers = HeaderMap::new();
        headers.insert(USER_ID_HEADER, HeaderValue::from_static("alice"));
        let caller = caller_from_headers(&headers).unwrap();
        assert_eq!(caller.user_id.as_str(), "alice");
        assert!(!caller.is_admin());
    }

    #[test]
    fn test_admin_role() {
        let mut headers = HeaderMap::new();
        headers.insert(USER_ID_HEADER, HeaderValue::from_static("ops"));
        headers.insert(USER_ROLE_HEADER, HeaderValue::from_static("Admin"));
        assert!(caller_from_headers(&headers).unwrap().is_admin());
    }

    #[test]
    fn test_missing_user_is_unauthorized() {
        let headers = HeaderMap::new();
        assert!(matches!(
            caller_from_headers(&headers),
            Err(AppError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_unknown_role_is_rejected() {
        let mut headers = HeaderMap::new();
        headers.insert(USER_ID_HEADER, HeaderValue::from_static("bob"));
        headers.insert(USER_ROLE_HEADER, HeaderValue::from_static("root"));
        assert!(matches!(
            caller_from_headers(&headers),
            Err(AppError::Validation(_))
        ));
    }
}
