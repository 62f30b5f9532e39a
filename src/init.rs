use crate::logi;
use anyhow::{Context, Result};
use std::path::Path;
use tokio::fs;

/// Creates the channel root if needed. Safe to call repeatedly.
pub async fn ensure_directories(channel_root: &Path) -> Result<()> {
    if !channel_root.exists() {
        fs::create_dir_all(channel_root)
            .await
            .with_context(|| format!("Failed to create {}", channel_root.display()))?;
        logi(format!("Created directory: {}", channel_root.display()));
    }
    Ok(())
}

pub async fn check_ffmpeg() -> bool {
    match tokio::process::Command::new("ffmpeg")
        .arg("-version")
        .output()
        .await
    {
        Ok(output) => output.status.success(),
        Err(_) => false,
    }
}
