use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use time::format_description::well_known::Rfc3339;

pub fn ensure_dir(p: &Path) -> Result<()> {
    std::fs::create_dir_all(p).with_context(|| format!("create_dir_all {}", p.display()))
}

pub fn now_rfc3339() -> String {
    time::OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(rest);
        }
    }
    PathBuf::from(path)
}

/// Splits `KEY=VALUE`; a missing `=` yields an empty value.
pub fn split_pair(raw: &str) -> (String, String) {
    match raw.split_once('=') {
        Some((k, v)) => (k.trim().to_string(), v.to_string()),
        None => (raw.trim().to_string(), String::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_pair_variants() {
        assert_eq!(split_pair("a=b=c"), ("a".into(), "b=c".into()));
        assert_eq!(split_pair("grayscale"), ("grayscale".into(), "".into()));
    }
}
