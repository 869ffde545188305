//! Utility functions for value validation and normalization

use regex::Regex;

/// Validate an IAM role ARN (e.g., "arn:aws:iam::123456789012:role/deploy")
pub fn validate_role_arn(arn: &str) -> Result<(), String> {
    let re = Regex::new(r"^arn:aws[a-z-]*:iam::\d{12}:role/[\w+=,.@/-]+$")
        .map_err(|e| e.to_string())?;
    if re.is_match(arn) {
        Ok(())
    } else {
        Err(format!("Invalid IAM role ARN '{}'", arn))
    }
}

/// Validate a tenant name: lowercase letters, digits and hyphens, not
/// starting or ending with a hyphen (it becomes a DNS label)
pub fn validate_tenant(tenant: &str) -> Result<(), String> {
    let re = Regex::new(r"^[a-z0-9]([a-z0-9-]{0,61}[a-z0-9])?$").map_err(|e| e.to_string())?;
    if re.is_match(tenant) {
        Ok(())
    } else {
        Err(format!("Invalid tenant '{}'", tenant))
    }
}

/// Strip surrounding slashes from an API path segment
/// e.g., "/trust-providers/" -> "trust-providers"
pub fn normalize_path(path: &str) -> &str {
    path.trim_matches('/')
}
