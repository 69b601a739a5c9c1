use std::path::{Path, PathBuf};

use dirs_next::home_dir;

/// Separator for `PATH`-style search lists on the platforms the compiler runs on.
const SEARCH_PATH_SEPARATOR: &str = ":";

pub fn expand_tilde(path: &str) -> PathBuf {
    let p = path.trim();
    if p == "~" {
        return home_dir().unwrap_or_else(|| PathBuf::from("~"));
    }
    if let Some(rest) = p.strip_prefix("~/") {
        return home_dir().unwrap_or_else(|| PathBuf::from("~")).join(rest);
    }
    PathBuf::from(p)
}

/// Expand `~` and anchor relative paths at `base`.
pub fn resolve_path(path: &str, base: &Path) -> PathBuf {
    let expanded = expand_tilde(path);
    if expanded.is_absolute() {
        expanded
    } else {
        base.join(expanded)
    }
}

/// Append `extra` to an inherited search list such as `PATH` or `PYTHONPATH`.
///
/// The inherited value is kept verbatim, even when empty, so the result reads
/// the same way a shell would join the two.
pub fn append_search_path(inherited: Option<&str>, extra: &Path) -> String {
    [inherited.unwrap_or(""), &extra.to_string_lossy()].join(SEARCH_PATH_SEPARATOR)
}
