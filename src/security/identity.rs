//! Per-request caller identity.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::http::error::ApiError;
use crate::storage::User;

/// The resolved caller of a request.
///
/// Inserted into the request extensions by the authentication middleware,
/// so it lives and dies with the request.
#[derive(Debug, Clone)]
pub enum Identity {
    Anonymous,
    Authenticated(User),
}

impl Identity {
    pub fn is_anonymous(&self) -> bool {
        matches!(self, Identity::Anonymous)
    }

    /// The authenticated user, if any.
    pub fn user(&self) -> Option<&User> {
        match self {
            Identity::Anonymous => None,
            Identity::Authenticated(user) => Some(user),
        }
    }
}

impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Identity>()
            .cloned()
            .ok_or_else(|| ApiError::Internal("identity not resolved for request".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn anonymous_has_no_user() {
        assert!(Identity::Anonymous.is_anonymous());
        assert!(Identity::Anonymous.user().is_none());
    }

    #[test]
    fn authenticated_exposes_user() {
        let identity = Identity::Authenticated(User {
            id: 3,
            created_at: Utc::now(),
            name: "Bob".into(),
            email: "bob@example.com".into(),
            password_hash: String::new(),
            activated: false,
            version: 1,
        });
        assert!(!identity.is_anonymous());
        assert_eq!(identity.user().map(|u| u.id), Some(3));
    }
}
