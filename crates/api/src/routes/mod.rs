//! Request handlers, one module per resource.
//!
//! Amounts cross the wire as integer cents in `*_cents` fields.

pub mod admin;
pub mod health;
pub mod metrics;
pub mod needs;
pub mod orders;
pub mod sellers;
pub mod wallet;
pub mod withdrawals;

use std::str::FromStr;

use common::Caller;
use domain::DomainError;

use crate::error::ApiError;

/// Parses an identifier taken from the path or body.
pub(crate) fn parse_id<T>(field: &'static str, raw: &str) -> Result<T, ApiError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e: T::Err| ApiError::bad_request(field, e.to_string()))
}

pub(crate) fn ensure_active(caller: &Caller) -> Result<(), ApiError> {
    if caller.blocked {
        return Err(DomainError::forbidden("caller is blocked").into());
    }
    Ok(())
}
