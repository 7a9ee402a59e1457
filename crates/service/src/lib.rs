//! Service layer: identity resolution, tenant bootstrap, and the collaborators they talk to.
//! - `store` and `storage` abstract the relational store and per-user client storage.
//! - `identity` turns an auth principal into an application profile.
//! - `tenant` provisions organizations and manages project selection.
//! - `auth` is a local implementation of the Auth Service contract.

pub mod errors;
pub mod retry;
pub mod auth;
pub mod store;
pub mod storage;
pub mod identity;
pub mod tenant;
pub mod session;
pub mod prompts;
pub mod runtime;
#[cfg(test)]
pub mod test_support;
