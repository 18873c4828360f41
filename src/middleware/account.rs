//! Best-effort account identification for request samples.
//!
//! Strategies are tried in order and the first one that yields an id wins.
//! A failing strategy is logged and skipped so the next one still runs.

use axum::extract::Request;
use axum::http::HeaderName;

pub type AccountId = String;

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct LookupError(pub String);

/// Tenant resolved by an upstream layer and stored in request extensions.
#[derive(Debug, Clone)]
pub struct CurrentTenant {
    pub account_id: AccountId,
}

/// Signed-in user placed in request extensions by an auth layer.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: String,
    pub account_id: Option<AccountId>,
}

pub trait AccountLookup: Send + Sync {
    fn name(&self) -> &'static str;

    fn lookup(&self, req: &Request) -> Result<Option<AccountId>, LookupError>;
}

pub struct TenantLookup;

impl AccountLookup for TenantLookup {
    fn name(&self) -> &'static str {
        "tenant"
    }

    fn lookup(&self, req: &Request) -> Result<Option<AccountId>, LookupError> {
        Ok(req
            .extensions()
            .get::<CurrentTenant>()
            .map(|t| t.account_id.clone()))
    }
}

pub struct UserAccountLookup;

impl AccountLookup for UserAccountLookup {
    fn name(&self) -> &'static str {
        "user"
    }

    fn lookup(&self, req: &Request) -> Result<Option<AccountId>, LookupError> {
        Ok(req
            .extensions()
            .get::<AuthenticatedUser>()
            .and_then(|u| u.account_id.clone()))
    }
}

pub struct HeaderLookup {
    header: HeaderName,
}

impl HeaderLookup {
    pub fn new(header: HeaderName) -> Self {
        Self { header }
    }
}

impl Default for HeaderLookup {
    fn default() -> Self {
        Self::new(HeaderName::from_static("x-account-id"))
    }
}

impl AccountLookup for HeaderLookup {
    fn name(&self) -> &'static str {
        "header"
    }

    fn lookup(&self, req: &Request) -> Result<Option<AccountId>, LookupError> {
        let Some(value) = req.headers().get(&self.header) else {
            return Ok(None);
        };
        let id = value
            .to_str()
            .map_err(|e| LookupError(format!("{}: {e}", self.header)))?
            .trim();
        Ok((!id.is_empty()).then(|| id.to_string()))
    }
}

/// Ordered chain of lookup strategies.
pub struct AccountLookups {
    strategies: Vec<Box<dyn AccountLookup>>,
}

impl AccountLookups {
    pub fn new(strategies: Vec<Box<dyn AccountLookup>>) -> Self {
        Self { strategies }
    }

    pub fn resolve(&self, req: &Request) -> Option<AccountId> {
        self.strategies.iter().find_map(|s| match s.lookup(req) {
            Ok(found) => found,
            Err(e) => {
                tracing::debug!(strategy = s.name(), error = %e, "account lookup failed");
                None
            }
        })
    }
}

impl Default for AccountLookups {
    /// Tenant context, then the signed-in user's account, then `X-Account-Id`.
    fn default() -> Self {
        Self::new(vec![
            Box::new(TenantLookup),
            Box::new(UserAccountLookup),
            Box::new(HeaderLookup::default()),
        ])
    }
}
