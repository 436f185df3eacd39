use std::ffi::OsStr;
use std::path::{Path, PathBuf};

pub trait PathExt {
    /// Tree manifests are TOML files, anything else is read as a table.
    fn is_manifest(&self) -> bool;
    /// Name a tree gets when it is loaded straight from a table file.
    fn tree_name(&self) -> String;
}

impl PathExt for Path {
    fn is_manifest(&self) -> bool {
        self.extension() == Some(OsStr::new("toml"))
    }

    fn tree_name(&self) -> String {
        self.file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Expand `~`, `$VAR` and `${VAR}`; on failure the input is kept.
pub fn expand_env_vars(path: &str) -> String {
    shellexpand::full(path)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| path.to_string())
}

/// Expand `path` and anchor it at `base_dir` unless it is absolute.
pub fn resolve_relative(base_dir: &Path, path: &Path) -> PathBuf {
    let expanded = PathBuf::from(expand_env_vars(&path.to_string_lossy()));
    if expanded.is_absolute() {
        expanded
    } else {
        base_dir.join(expanded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_manifest() {
        assert!(Path::new("trees/qa.toml").is_manifest());
        assert!(!Path::new("trees/qa.tsv").is_manifest());
        assert_eq!(Path::new("trees/qa.tsv").tree_name(), "qa");
    }

    #[test]
    fn test_resolve_relative() {
        let base = Path::new("/data/trees");
        assert_eq!(
            resolve_relative(base, Path::new("qa.tsv")),
            PathBuf::from("/data/trees/qa.tsv")
        );
        assert_eq!(
            resolve_relative(base, Path::new("/abs/qa.tsv")),
            PathBuf::from("/abs/qa.tsv")
        );
        let home = std::env::var("HOME").expect("HOME should be set");
        assert_eq!(
            resolve_relative(base, Path::new("~/qa.tsv")),
            PathBuf::from(home).join("qa.tsv")
        );
    }
}
