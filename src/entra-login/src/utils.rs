//! Utility functions for the entra-login crate.

use anyhow::{Context, Result};
use std::path::Path;

/// Mask a token for safe display in logs.
pub fn safe_format_token(token: &str) -> String {
    if token.len() <= 13 {
        return "***".to_string();
    }
    let prefix = &token[..8];
    format!("{prefix}*** ({} chars)", token.len())
}

/// Set restrictive file permissions (0600 on Unix).
pub fn set_file_permissions(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(path, perms)
            .with_context(|| format!("Failed to set permissions on {}", path.display()))?;
    }

    #[cfg(not(unix))]
    {
        let _ = path;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks_long_tokens() {
        let masked = safe_format_token("eyJ0eXAiOiJKV1QiLCJhbGciOiJSUzI1NiJ9");
        assert!(masked.starts_with("eyJ0eXAi***"));
        assert!(!masked.contains("JSUzI1NiJ9"));
    }

    #[test]
    fn masks_short_tokens_entirely() {
        assert_eq!(safe_format_token("short"), "***");
    }
}
