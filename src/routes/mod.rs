/// Router Module Index
///
/// Routing is organized per resource. Access control is not applied here:
/// every handler opens with an AccessGate check against its own Endpoint
/// identity, so the requirements live in the policy registry, not in the
/// router shape.

/// Unprotected endpoints: health probe and the identity flow.
pub mod public;

/// The /users resource.
pub mod users;

/// The /products resource.
pub mod products;
