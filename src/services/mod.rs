pub mod auth_service;
pub use auth_service::{AuthError, AuthService, LoginOutcome, SessionStatus};

pub mod auth_service_impl;
pub use auth_service_impl::LocalAuthService;
