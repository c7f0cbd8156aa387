//! Access control for depot
//!
//! A single shared secret gates retrieval (and, unless configured otherwise,
//! upload). Callers pass the secret as the `access_key` query parameter.

use subtle::ConstantTimeEq;

/// Compares caller-supplied access keys against the configured secret.
///
/// An empty secret never matches anything, so a misconfigured guard fails
/// closed. Custom `Debug` redacts the secret to keep it out of logs.
#[derive(Clone)]
pub struct AccessGuard {
    secret: String,
}

impl AccessGuard {
    /// Create a guard for `secret`
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Returns `true` only when `provided` equals the configured secret.
    ///
    /// A missing token is treated the same as a wrong one.
    pub fn check(&self, provided: Option<&str>) -> bool {
        if self.secret.is_empty() {
            return false;
        }
        match provided {
            Some(provided) => constant_time_token_eq(provided, &self.secret),
            None => false,
        }
    }
}

impl std::fmt::Debug for AccessGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessGuard")
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

/// Constant-time comparison of access keys.
///
/// When lengths differ, a dummy comparison keeps timing independent of the
/// provided length.
fn constant_time_token_eq(provided: &str, expected: &str) -> bool {
    let provided = provided.as_bytes();
    let expected = expected.as_bytes();
    if provided.len() != expected.len() {
        let _ = expected.ct_eq(expected);
        return false;
    }
    provided.ct_eq(expected).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matching_key() {
        let guard = AccessGuard::new("s3cret");
        assert!(guard.check(Some("s3cret")));
    }

    #[test]
    fn test_mismatched_key() {
        let guard = AccessGuard::new("s3cret");
        assert!(!guard.check(Some("s3cre")));
        assert!(!guard.check(Some("s3cret ")));
        assert!(!guard.check(Some("S3CRET")));
        assert!(!guard.check(Some("")));
    }

    #[test]
    fn test_missing_key() {
        let guard = AccessGuard::new("s3cret");
        assert!(!guard.check(None));
    }

    #[test]
    fn test_empty_secret_fails_closed() {
        let guard = AccessGuard::new("");
        assert!(!guard.check(Some("")));
        assert!(!guard.check(None));
        assert!(!guard.check(Some("anything")));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let guard = AccessGuard::new("s3cret");
        let debug = format!("{:?}", guard);
        assert!(!debug.contains("s3cret"));
        assert!(debug.contains("[REDACTED]"));
    }
}
