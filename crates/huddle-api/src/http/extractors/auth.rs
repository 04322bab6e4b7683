//! Bearer authentication extractor.
//!
//! Identity verification is owned by an external provider; this extractor
//! stands in for it by accepting `Authorization: Bearer <user-token>`
//! where the token carries the caller's profile id. Swapping in real
//! token verification only changes this file.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use uuid::Uuid;

use crate::http::error::AppError;
use crate::state::AppState;

/// Authenticated request marker carrying the caller's user id.
pub struct Authenticated(pub Uuid);

impl FromRequestParts<AppState> for Authenticated {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_bearer_token(parts)?;

        let user_id = token.parse::<Uuid>().map_err(|_| {
            AppError::Unauthorized("Invalid or expired token".to_string())
        })?;

        Ok(Authenticated(user_id))
    }
}

/// Extract the bearer token from the Authorization header.
fn extract_bearer_token(parts: &Parts) -> Result<String, AppError> {
    let auth = parts
        .headers
        .get("authorization")
        .ok_or_else(|| AppError::Unauthorized("Missing Authorization header".to_string()))?;

    let auth_str = auth
        .to_str()
        .map_err(|_| AppError::Unauthorized("Invalid Authorization header encoding".to_string()))?;

    auth_str
        .strip_prefix("Bearer ")
        .map(|token| token.trim().to_string())
        .ok_or_else(|| {
            AppError::Unauthorized("Authorization header must use the Bearer scheme".to_string())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts_with_auth(value: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/");
        if let Some(value) = value {
            builder = builder.header("authorization", value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn bearer_token_is_extracted() {
        let id = Uuid::now_v7();
        let parts = parts_with_auth(Some(&format!("Bearer {id}")));
        assert_eq!(extract_bearer_token(&parts).unwrap(), id.to_string());
    }

    #[test]
    fn missing_header_is_rejected() {
        let parts = parts_with_auth(None);
        assert!(extract_bearer_token(&parts).is_err());
    }

    #[test]
    fn non_bearer_scheme_is_rejected() {
        let parts = parts_with_auth(Some("Basic dXNlcjpwYXNz"));
        assert!(extract_bearer_token(&parts).is_err());
    }
}
