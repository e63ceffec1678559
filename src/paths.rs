use std::path::{Path, PathBuf};

const BASE_DIR_ENV: &str = "GAME_ITEM_ANALYZER_DIR";
const DEFAULT_DIR_NAME: &str = ".game-item-analyzer";

pub(crate) fn app_dir() -> Option<PathBuf> {
    if let Some(dir) = base_dir_override() {
        return Some(dir);
    }
    default_base_dir()
}

pub(crate) fn preferences_path() -> PathBuf {
    app_dir()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DIR_NAME))
        .join("preferences.json")
}

fn base_dir_override() -> Option<PathBuf> {
    std::env::var(BASE_DIR_ENV)
        .ok()
        .and_then(|value| normalize_dir(&value))
}

fn default_base_dir() -> Option<PathBuf> {
    home_dir().map(|home| home.join(DEFAULT_DIR_NAME))
}

fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().and_then(|home| {
        let home = home.trim();
        if home.is_empty() {
            None
        } else {
            Some(PathBuf::from(home))
        }
    })
}

fn normalize_dir(value: &str) -> Option<PathBuf> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(normalize_path(&expand_tilde(trimmed)))
}

fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        normalized.push(component.as_os_str());
    }
    normalized
}

fn expand_tilde(value: &str) -> PathBuf {
    if value == "~" || value.starts_with("~/") {
        if let Some(home) = home_dir() {
            if value == "~" {
                return home;
            }
            return home.join(&value[2..]);
        }
    }
    PathBuf::from(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_dir_ignores_blank_values() {
        assert_eq!(normalize_dir("   "), None);
    }

    #[test]
    fn normalize_dir_collapses_redundant_separators() {
        assert_eq!(
            normalize_dir("/tmp//analyzer/"),
            Some(PathBuf::from("/tmp/analyzer"))
        );
    }
}
