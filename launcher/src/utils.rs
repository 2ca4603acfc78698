//! Utility functions

use serde::{Deserialize, Serialize};

/// Prefix of generated deployment branches
pub const BRANCH_PREFIX: &str = "xylo-";

/// Version information for the launcher
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionInfo {
    pub version: String,
    pub git_hash: String,
    pub build_time: String,
}

/// Get version information
pub fn version_info() -> VersionInfo {
    VersionInfo {
        version: env!("CARGO_PKG_VERSION").to_string(),
        git_hash: option_env!("GIT_HASH").unwrap_or("unknown").to_string(),
        build_time: option_env!("BUILD_TIME").unwrap_or("unknown").to_string(),
    }
}

/// Generate a random UUID v4
pub fn generate_uuid() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Generate a branch name of the form `xylo-xxxxxx` (lowercase hex)
pub fn generate_branch_name() -> String {
    let suffix: String = uuid::Uuid::new_v4().simple().to_string().chars().take(6).collect();
    format!("{}{}", BRANCH_PREFIX, suffix)
}

/// Check a user supplied branch name against git's ref naming rules
pub fn validate_branch_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("Branch name must not be empty".to_string());
    }
    if name.len() > 100 {
        return Err("Branch name must be at most 100 characters".to_string());
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/'))
    {
        return Err(format!(
            "Branch name '{}' may only contain letters, digits, '-', '_', '.' and '/'",
            name
        ));
    }
    if name.starts_with('-') || name.starts_with('/') || name.starts_with('.') {
        return Err(format!("Branch name '{}' has an invalid first character", name));
    }
    if name.ends_with('/') || name.ends_with('.') || name.ends_with(".lock") {
        return Err(format!("Branch name '{}' has an invalid ending", name));
    }
    if name.contains("..") || name.contains("//") || name.contains("/.") {
        return Err(format!("Branch name '{}' contains an invalid sequence", name));
    }
    Ok(())
}
