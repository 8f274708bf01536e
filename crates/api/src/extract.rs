//! Caller identity from the headers set by the auth proxy.

use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::request::Parts;
use common::{Caller, Role, UserId};

use crate::error::ApiError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";
pub const USER_BLOCKED_HEADER: &str = "x-user-blocked";

/// The authenticated caller of a request.
#[derive(Debug, Clone, Copy)]
pub struct Identity(pub Caller);

impl Identity {
    pub fn from_headers(headers: &HeaderMap) -> Result<Self, ApiError> {
        let user_id: UserId = header(headers, USER_ID_HEADER)?
            .parse()
            .map_err(|e| ApiError::Unauthenticated(format!("{USER_ID_HEADER}: {e}")))?;
        let role: Role = header(headers, USER_ROLE_HEADER)?
            .parse()
            .map_err(|e| ApiError::Unauthenticated(format!("{USER_ROLE_HEADER}: {e}")))?;
        let blocked = match headers.get(USER_BLOCKED_HEADER) {
            None => false,
            Some(value) => matches!(
                value.to_str().map(str::trim).unwrap_or_default(),
                "true" | "1" | "yes"
            ),
        };

        Ok(Identity(Caller {
            user_id,
            role,
            blocked,
        }))
    }
}

fn header<'a>(headers: &'a HeaderMap, name: &'static str) -> Result<&'a str, ApiError> {
    headers
        .get(name)
        .ok_or_else(|| ApiError::Unauthenticated(format!("missing {name} header")))?
        .to_str()
        .map(str::trim)
        .map_err(|_| ApiError::Unauthenticated(format!("{name} is not valid text")))
}

impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Identity::from_headers(&parts.headers)
    }
}
