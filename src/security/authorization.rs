//! Activation and permission gates.
//!
//! A [`Policy`] is an ordered list of [`Gate`]s evaluated with early exit.
//! The constructors enforce the nesting: a permission policy also checks
//! activation, and activation also checks authentication.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::http::error::ApiError;
use crate::observability::metrics;
use crate::security::{Identity, SecurityError};
use crate::storage::Storage;

/// A single admission check on the resolved identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Gate {
    /// Identity must not be anonymous.
    Authenticated,
    /// Authenticated identity must be activated.
    Activated,
    /// Identity must hold the permission code (fetched fresh per request).
    Permission(String),
}

impl Gate {
    pub async fn check(&self, identity: &Identity, storage: &dyn Storage) -> Result<(), SecurityError> {
        match self {
            Gate::Authenticated => {
                if identity.is_anonymous() {
                    return Err(SecurityError::AuthenticationRequired);
                }
                Ok(())
            }
            Gate::Activated => match identity.user() {
                Some(user) if user.activated => Ok(()),
                Some(_) => Err(SecurityError::InactiveAccount),
                None => Err(SecurityError::AuthenticationRequired),
            },
            Gate::Permission(code) => {
                let user = identity.user().ok_or(SecurityError::AuthenticationRequired)?;
                let permissions = storage.get_permissions(user.id).await?;
                if permissions.include(code) {
                    Ok(())
                } else {
                    Err(SecurityError::NotPermitted(code.clone()))
                }
            }
        }
    }
}

/// Ordered gates guarding a route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Policy {
    gates: Vec<Gate>,
}

impl Policy {
    /// Any authenticated caller.
    pub fn authenticated() -> Self {
        Self {
            gates: vec![Gate::Authenticated],
        }
    }

    /// Authenticated and activated callers.
    pub fn activated() -> Self {
        Self {
            gates: vec![Gate::Authenticated, Gate::Activated],
        }
    }

    /// Activated callers holding `code`.
    pub fn permission(code: impl Into<String>) -> Self {
        Self {
            gates: vec![
                Gate::Authenticated,
                Gate::Activated,
                Gate::Permission(code.into()),
            ],
        }
    }

    pub fn gates(&self) -> &[Gate] {
        &self.gates
    }

    /// Run the gates in order, reporting the first failure.
    pub async fn evaluate(&self, identity: &Identity, storage: &dyn Storage) -> Result<(), SecurityError> {
        for gate in &self.gates {
            gate.check(identity, storage).await?;
        }
        Ok(())
    }
}

/// State for [`authorize`]: one policy bound to a storage handle.
#[derive(Clone)]
pub struct Authorization {
    pub policy: Arc<Policy>,
    pub storage: Arc<dyn Storage>,
}

impl Authorization {
    pub fn new(policy: Policy, storage: Arc<dyn Storage>) -> Self {
        Self {
            policy: Arc::new(policy),
            storage,
        }
    }
}

/// Route-level middleware enforcing an [`Authorization`] policy.
pub async fn authorize(
    State(authorization): State<Authorization>,
    identity: Identity,
    request: Request<Body>,
    next: Next,
) -> Response {
    match authorization
        .policy
        .evaluate(&identity, authorization.storage.as_ref())
        .await
    {
        Ok(()) => next.run(request).await,
        Err(e) => {
            tracing::debug!(reason = e.reason(), "Request not authorized");
            metrics::record_auth_rejection(e.reason());
            ApiError::from(e).into_response()
        }
    }
}
