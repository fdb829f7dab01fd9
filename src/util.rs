// src/util.rs

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Resolve a path relative to the location of `config.yaml`.
///
/// Absolute paths are returned unchanged.
///
/// Example:
/// config.yaml at `/project/config.yaml`
/// tool.script = "dutyAssign.py"
/// → resolves to `/project/dutyAssign.py`
pub fn resolve_relative_to_config(config_path: &Path, rel: &Path) -> Result<PathBuf> {
    if rel.is_absolute() {
        return Ok(rel.to_path_buf());
    }

    let base = config_path
        .parent()
        .context("Config path has no parent directory")?;
    Ok(base.join(rel))
}

/// Ensure a directory exists (create it if missing).
pub fn ensure_dir(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path)
        .with_context(|| format!("Failed to create directory {:?}", path))
}

/// Case-insensitive extension match. `*` in `allowed` accepts anything.
pub fn has_allowed_extension(path: &Path, allowed: &[String]) -> bool {
    if allowed.iter().any(|e| e == "*") {
        return true;
    }

    let Some(ext) = path.extension().and_then(|s| s.to_str()) else {
        return false;
    };

    allowed
        .iter()
        .any(|a| a.trim_start_matches('.').eq_ignore_ascii_case(ext))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exts(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn relative_paths_join_config_dir() {
        let got = resolve_relative_to_config(Path::new("/project/config.yaml"), Path::new("tool/run.py"))
            .unwrap();
        assert_eq!(got, PathBuf::from("/project/tool/run.py"));
    }

    #[test]
    fn absolute_paths_are_kept() {
        let got = resolve_relative_to_config(Path::new("/project/config.yaml"), Path::new("/bin/tool"))
            .unwrap();
        assert_eq!(got, PathBuf::from("/bin/tool"));
    }

    #[test]
    fn extension_filter_is_case_insensitive() {
        let allowed = exts(&["xlsx", ".xlsm"]);
        assert!(has_allowed_extension(Path::new("roster.XLSX"), &allowed));
        assert!(has_allowed_extension(Path::new("roster.xlsm"), &allowed));
        assert!(!has_allowed_extension(Path::new("roster.csv"), &allowed));
        assert!(!has_allowed_extension(Path::new("roster"), &allowed));
    }

    #[test]
    fn wildcard_accepts_any_file() {
        assert!(has_allowed_extension(Path::new("notes"), &exts(&["*"])));
    }
}
