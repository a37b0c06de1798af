//! Current-user contract.
//!
//! Token verification lives outside the core; the service only asks who is
//! acting and treats absence as `AuthenticationRequired`.

use crate::model::UserId;

/// Authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub user_id: UserId,
    pub email: String,
    pub nickname: String,
}

impl CurrentUser {
    /// Builds a user whose nickname is the local part of `email`.
    pub fn from_email(user_id: impl Into<UserId>, email: impl Into<String>) -> Self {
        let email = email.into();
        let nickname = email.split('@').next().unwrap_or_default().to_string();
        Self {
            user_id: user_id.into(),
            email,
            nickname,
        }
    }
}

pub trait IdentityProvider: Send + Sync {
    fn current_user(&self) -> Option<CurrentUser>;
}

/// Fixed identity, or none.
#[derive(Debug, Clone, Default)]
pub struct StaticIdentity {
    user: Option<CurrentUser>,
}

impl StaticIdentity {
    pub fn signed_in(user: CurrentUser) -> Self {
        Self { user: Some(user) }
    }

    pub fn anonymous() -> Self {
        Self { user: None }
    }
}

impl IdentityProvider for StaticIdentity {
    fn current_user(&self) -> Option<CurrentUser> {
        self.user.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::CurrentUser;

    #[test]
    fn nickname_defaults_to_email_local_part() {
        let user = CurrentUser::from_email("u1", "ada@example.com");
        assert_eq!(user.nickname, "ada");
    }
}
