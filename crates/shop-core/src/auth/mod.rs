//! Request authentication and authorization.

pub mod guard;
pub mod session;

pub use guard::AuthorizationGuard;
pub use session::SessionResolver;
