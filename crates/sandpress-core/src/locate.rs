//! Project root and database discovery
//!
//! The project root is the nearest ancestor of the working directory holding
//! a marker file. The database is then looked up in the conventional install
//! locations under that root. Both lookups fail softly with `None`.

use crate::config::CONFIG_FILE;
use std::path::{Path, PathBuf};

/// Files whose presence marks a project root, in priority order
pub const PROJECT_MARKERS: &[&str] = &[CONFIG_FILE, "composer.json", "wp-config.php"];

/// Database locations relative to the project root, in search order
pub const DATABASE_CANDIDATES: &[&str] = &[
    "wp-content/database/.ht.sqlite",
    "wordpress/wp-content/database/.ht.sqlite",
    ".sandpress/wordpress/wp-content/database/.ht.sqlite",
    "tests/wordpress/wp-content/database/.ht.sqlite",
];

/// Walk upward from `start` to the first directory containing a marker
pub fn locate_project_root(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| PROJECT_MARKERS.iter().any(|m| dir.join(m).is_file()))
        .map(Path::to_path_buf)
}

/// First conventional database location under `project_root` that exists
pub fn locate_database(project_root: &Path) -> Option<PathBuf> {
    DATABASE_CANDIDATES
        .iter()
        .map(|rel| project_root.join(rel))
        .find(|path| path.is_file())
}

/// Resolve the live database: an explicit path wins if it exists,
/// otherwise the conventional locations are searched
pub fn resolve_database(project_root: &Path, explicit: Option<&Path>) -> Option<PathBuf> {
    match explicit {
        Some(path) => {
            let path = if path.is_relative() {
                project_root.join(path)
            } else {
                path.to_path_buf()
            };
            path.is_file().then_some(path)
        }
        None => locate_database(project_root),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"").unwrap();
    }

    #[test]
    fn test_root_found_from_nested_directory() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("composer.json"));
        let nested = dir.path().join("tests/Unit/Posts");
        fs::create_dir_all(&nested).unwrap();

        assert_eq!(locate_project_root(&nested), Some(dir.path().to_path_buf()));
    }

    #[test]
    fn test_nearest_marker_wins() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("composer.json"));
        let inner = dir.path().join("plugin");
        touch(&inner.join("sandpress.toml"));

        let src = inner.join("src");
        fs::create_dir_all(&src).unwrap();

        assert_eq!(locate_project_root(&src), Some(inner));
    }

    #[test]
    fn test_database_search_order() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("tests/wordpress/wp-content/database/.ht.sqlite"));
        touch(&dir.path().join("wordpress/wp-content/database/.ht.sqlite"));

        assert_eq!(
            locate_database(dir.path()),
            Some(dir.path().join("wordpress/wp-content/database/.ht.sqlite"))
        );
    }

    #[test]
    fn test_missing_database_is_none() {
        let dir = TempDir::new().unwrap();
        assert_eq!(locate_database(dir.path()), None);
    }

    #[test]
    fn test_explicit_relative_path_resolved_against_root() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("db/live.db"));

        assert_eq!(
            resolve_database(dir.path(), Some(Path::new("db/live.db"))),
            Some(dir.path().join("db/live.db"))
        );
        assert_eq!(resolve_database(dir.path(), Some(Path::new("db/nope.db"))), None);
    }
}
