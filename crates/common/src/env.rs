//! Environment/runtime helpers
//!
//! Sanity checks to ensure expected directories exist at startup.

use std::path::Path;

use tracing::{debug, warn};

/// Ensure the parent directory of the client state file exists.
pub async fn ensure_state_dir(state_file: &str) -> anyhow::Result<()> {
    let parent = match Path::new(state_file).parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => return Ok(()),
    };
    if tokio::fs::metadata(parent).await.is_err() {
        warn!(dir = %parent.display(), "state directory missing; creating it");
    }
    tokio::fs::create_dir_all(parent)
        .await
        .map_err(|e| anyhow::anyhow!("cannot create {}: {e}", parent.display()))?;
    debug!(dir = %parent.display(), "state directory ready");
    Ok(())
}
