//! Runtime environment helpers
//!
//! Thin wrapper around `common::env` so binary crates only depend on `service`.

/// Ensure the directory holding the client state file exists.
pub async fn ensure_env(client_state_path: &str) -> anyhow::Result<()> {
    common::env::ensure_state_dir(client_state_path).await
}
