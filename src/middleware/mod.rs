//! HTTP middleware.
//!
//! # Layer order (outermost first)
//!
//! 1. `TraceLayer` (request spans)
//! 2. `CorsLayer`
//! 3. Session layer (tower-sessions)

pub mod auth;
pub mod session;

pub use auth::{clear_current_user, set_current_user, CurrentUser, OptionalAuth, RequireAdmin, RequireAuth};
pub use session::create_session_layer;
