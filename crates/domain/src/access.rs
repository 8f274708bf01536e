//! Caller checks shared by the engines.

use common::{Caller, Role};

use crate::error::DomainError;
use crate::ports::{MarketPorts, SellerProfile};

pub(crate) fn ensure_active(caller: &Caller) -> Result<(), DomainError> {
    if caller.blocked {
        return Err(DomainError::forbidden("account is blocked"));
    }
    Ok(())
}

pub(crate) fn ensure_role(caller: &Caller, role: Role) -> Result<(), DomainError> {
    ensure_active(caller)?;
    if caller.role != role {
        return Err(DomainError::forbidden(format!(
            "{} role required, caller is {}",
            role, caller.role
        )));
    }
    Ok(())
}

/// The seller profile behind a seller-role caller.
pub(crate) async fn seller_profile(
    ports: &MarketPorts,
    caller: &Caller,
) -> Result<SellerProfile, DomainError> {
    ensure_role(caller, Role::Seller)?;
    ports
        .sellers
        .seller_for_user(caller.user_id)
        .await?
        .ok_or_else(|| DomainError::forbidden("caller has no seller profile"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::UserId;

    #[test]
    fn blocked_callers_are_refused() {
        let mut caller = Caller::customer(UserId::new());
        assert!(ensure_role(&caller, Role::Customer).is_ok());

        caller.blocked = true;
        assert!(matches!(
            ensure_role(&caller, Role::Customer),
            Err(DomainError::Forbidden(_))
        ));
    }

    #[test]
    fn role_must_match() {
        let caller = Caller::seller(UserId::new());
        let err = ensure_role(&caller, Role::Admin).unwrap_err();
        assert!(err.to_string().contains("admin role required"));
    }
}
