//! Noise filtering for change lists.
//!
//! Lock files, vendored trees, build outputs and obvious binary formats are
//! excluded before language detection. Extra globs can be layered per call.

use crate::errors::{DetectError, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};

/// Globs filtered out of every scan unless overridden.
pub const DEFAULT_IGNORES: &[&str] = &[
    "**/*.lock",
    "**/package-lock.json",
    "**/yarn.lock",
    "**/pnpm-lock.yaml",
    "**/Cargo.lock",
    "**/node_modules/**",
    "**/vendor/**",
    "**/target/**",
    "**/build/**",
    "**/dist/**",
    "**/.git/**",
    "**/*.min.js",
    "**/*.map",
    "**/*.png",
    "**/*.jpg",
    "**/*.jpeg",
    "**/*.gif",
    "**/*.ico",
    "**/*.pdf",
    "**/*.zip",
    "**/*.jar",
    "**/*.class",
    "**/*.pyc",
    "**/__pycache__/**",
];

/// Compiled scan configuration.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    ignore: GlobSet,
}

impl Default for ScanConfig {
    fn default() -> Self {
        // The built-in globs are static and known-valid.
        Self::with_extra_ignores(&[]).unwrap()
    }
}

impl ScanConfig {
    /// Default ignores plus caller-supplied globs.
    pub fn with_extra_ignores(extra: &[String]) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();
        for pat in DEFAULT_IGNORES.iter().copied() {
            builder.add(Glob::new(pat).map_err(|e| DetectError::InvalidGlob(e.to_string()))?);
        }
        for pat in extra {
            builder.add(Glob::new(pat).map_err(|e| DetectError::InvalidGlob(e.to_string()))?);
        }
        let ignore = builder
            .build()
            .map_err(|e| DetectError::InvalidGlob(e.to_string()))?;
        Ok(Self { ignore })
    }

    pub fn is_ignored(&self, path: &str) -> bool {
        self.ignore.is_match(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_ignores_cover_noise() {
        let cfg = ScanConfig::default();
        assert!(cfg.is_ignored("package-lock.json"));
        assert!(cfg.is_ignored("node_modules/lib/index.js"));
        assert!(cfg.is_ignored("assets/logo.png"));
        assert!(cfg.is_ignored("target/debug/app"));
        assert!(!cfg.is_ignored("src/app.py"));
    }

    #[test]
    fn extra_globs_are_layered() {
        let cfg = ScanConfig::with_extra_ignores(&["generated/**".to_string()]).unwrap();
        assert!(cfg.is_ignored("generated/api.ts"));
        assert!(!cfg.is_ignored("src/api.ts"));
    }

    #[test]
    fn bad_glob_is_rejected() {
        let err = ScanConfig::with_extra_ignores(&["a[".to_string()]).unwrap_err();
        assert!(matches!(err, DetectError::InvalidGlob(_)));
    }
}
