use std::collections::HashMap;

use axum::http::{HeaderMap, header};

use crate::{
    auth::{Identity, TokenCodec},
    error::ApiError,
    models::UserRole,
};

/// Endpoint
///
/// Static identity of every handler in the API. Policies are keyed by this
/// enum rather than by route-path strings, so a registry lookup cannot miss
/// because of a typo'd key at a call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Health,
    Login,
    Register,
    UsersList,
    UsersCreate,
    UsersUpdate,
    UsersDelete,
    ProductsList,
    ProductsCreate,
    ProductsUpdate,
    ProductsDelete,
}

/// AccessPolicy
///
/// The declared authentication/role requirement for one endpoint. Created at
/// process start from the declaration table below and never mutated.
#[derive(Debug, Clone, Copy)]
pub struct AccessPolicy {
    pub protected: bool,
    /// Exact set membership, no hierarchy: admin does not implicitly gain
    /// access to a user-only endpoint unless listed.
    pub allowed_roles: &'static [UserRole],
}

impl AccessPolicy {
    /// The policy applied to endpoints with no declared entry: open access.
    /// This fail-open default is deliberate and only reachable for endpoints
    /// left out of DECLARATIONS; the gates themselves always fail closed.
    pub const OPEN: AccessPolicy = AccessPolicy {
        protected: false,
        allowed_roles: &[],
    };
}

/// Per-endpoint requirements, declared in one place. Endpoints absent from
/// this table (health, login, register) are public by the OPEN default.
const DECLARATIONS: &[(Endpoint, &[UserRole])] = &[
    (Endpoint::UsersList, &[UserRole::Admin]),
    (Endpoint::UsersCreate, &[UserRole::Admin]),
    (Endpoint::UsersUpdate, &[UserRole::Admin, UserRole::User]),
    (Endpoint::UsersDelete, &[UserRole::Admin]),
    (Endpoint::ProductsList, &[UserRole::Admin]),
    (Endpoint::ProductsCreate, &[UserRole::Admin, UserRole::User]),
    (Endpoint::ProductsUpdate, &[UserRole::Admin]),
    (Endpoint::ProductsDelete, &[UserRole::Admin]),
];

/// PolicyRegistry
///
/// Immutable, process-wide table mapping each endpoint to its AccessPolicy.
/// Built once at startup; read-only afterwards, so concurrent lookups need
/// no synchronization.
pub struct PolicyRegistry {
    policies: HashMap<Endpoint, AccessPolicy>,
}

impl PolicyRegistry {
    pub fn new() -> Self {
        let policies = DECLARATIONS
            .iter()
            .map(|(endpoint, roles)| {
                (
                    *endpoint,
                    AccessPolicy {
                        protected: true,
                        allowed_roles: *roles,
                    },
                )
            })
            .collect();
        Self { policies }
    }

    pub fn lookup(&self, endpoint: Endpoint) -> AccessPolicy {
        self.policies
            .get(&endpoint)
            .copied()
            .unwrap_or(AccessPolicy::OPEN)
    }
}

impl Default for PolicyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// AccessGate
///
/// The authentication and role-authorization stages of the request pipeline,
/// wired together at startup with their dependencies (registry, codec) passed
/// in explicitly. Both stages are pure functions of the request plus this
/// immutable shared state; no locks are held across them.
pub struct AccessGate {
    registry: PolicyRegistry,
    codec: TokenCodec,
}

impl AccessGate {
    pub fn new(registry: PolicyRegistry, codec: TokenCodec) -> Self {
        Self { registry, codec }
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    /// check
    ///
    /// Runs the full gate chain for one request: policy lookup, then
    /// authentication, then role authorization. Returns the authenticated
    /// identity, or None when the endpoint is open and the request proceeds
    /// anonymously. The first failure short-circuits.
    pub fn check(
        &self,
        endpoint: Endpoint,
        headers: &HeaderMap,
    ) -> Result<Option<Identity>, ApiError> {
        let policy = self.registry.lookup(endpoint);
        let identity = self.authenticate(&policy, headers)?;
        self.authorize(&policy, identity.as_ref())?;
        Ok(identity)
    }

    /// authenticate
    ///
    /// Open policies short-circuit to anonymous without touching the header,
    /// so a stale or garbled token never blocks a public endpoint. Protected
    /// policies require a well-formed `Bearer <token>` header whose token
    /// verifies; every failure mode collapses to Unauthenticated.
    fn authenticate(
        &self,
        policy: &AccessPolicy,
        headers: &HeaderMap,
    ) -> Result<Option<Identity>, ApiError> {
        if !policy.protected {
            return Ok(None);
        }

        let auth_header = headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(ApiError::Unauthenticated)?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(ApiError::Unauthenticated)?;

        let identity = self
            .codec
            .verify(token)
            .map_err(|_| ApiError::Unauthenticated)?;

        Ok(Some(identity))
    }

    /// authorize
    ///
    /// Open policies always allow. Protected policies require an identity
    /// whose role is a member of the allowed set.
    fn authorize(
        &self,
        policy: &AccessPolicy,
        identity: Option<&Identity>,
    ) -> Result<(), ApiError> {
        if !policy.protected {
            return Ok(());
        }

        // authenticate() always yields an identity for protected policies;
        // a missing one here is a pipeline bug, treated as unauthenticated.
        let identity = identity.ok_or(ApiError::Unauthenticated)?;

        if policy.allowed_roles.contains(&identity.role) {
            Ok(())
        } else {
            Err(ApiError::Forbidden)
        }
    }
}
