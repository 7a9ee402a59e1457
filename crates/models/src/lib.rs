pub mod errors;
pub mod db;
pub mod auth_identity;
pub mod user;
pub mod organization;
pub mod organization_member;
pub mod project;

#[cfg(test)]
mod tests;
