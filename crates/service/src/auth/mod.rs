//! Auth module: three-layer architecture (domain, repository, service).
//!
//! `LocalAuthProvider` implements the Auth Service contract on top of an
//! `AuthRepository`; the rest of the crate only sees `AuthProvider`.

pub mod domain;
pub mod errors;
pub mod repository;
pub mod service;
pub mod repo;

pub use domain::{Principal, PrincipalEvent};
pub use errors::AuthError;
pub use service::{AuthConfig, AuthProvider, LocalAuthProvider};
