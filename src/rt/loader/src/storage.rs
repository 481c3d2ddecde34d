use std::path::{Path, PathBuf};

use tracing::debug;

/// The slice of the storage service the loader needs.
pub trait Storage: Send + Sync {
    /// Does a file exist at this device path?
    fn exists(&self, path: &Path) -> bool;

    /// Device paths of the files directly inside `dir`, sorted. Subdirectories are skipped, and
    /// a missing or unreadable directory lists as empty.
    fn list_dir(&self, _dir: &Path) -> Vec<PathBuf> {
        Vec::new()
    }
}

/// Storage backed by the host file system. Device paths (such as `/ext/apps/x.fap`) are looked up
/// under `root` when one is set.
#[derive(Clone, Debug, Default)]
pub struct HostStorage {
    root: Option<PathBuf>,
}

impl HostStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    /// Map a device path onto the host.
    pub fn host_path(&self, path: &Path) -> PathBuf {
        match &self.root {
            Some(root) => root.join(path.strip_prefix("/").unwrap_or(path)),
            None => path.to_path_buf(),
        }
    }
}

impl Storage for HostStorage {
    fn exists(&self, path: &Path) -> bool {
        // An empty line in a menu file is not a path.
        !path.as_os_str().is_empty() && self.host_path(path).is_file()
    }

    fn list_dir(&self, dir: &Path) -> Vec<PathBuf> {
        let entries = match std::fs::read_dir(self.host_path(dir)) {
            Ok(entries) => entries,
            Err(e) => {
                debug!("cannot list {}: {}", dir.display(), e);
                return Vec::new();
            }
        };
        let mut files: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_ok_and(|ty| ty.is_file()))
            .map(|entry| dir.join(entry.file_name()))
            .collect();
        files.sort();
        files
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn rooted_paths() {
        let storage = HostStorage::with_root("/srv/sd");
        assert_eq!(
            storage.host_path(Path::new("/ext/apps/x.fap")),
            Path::new("/srv/sd/ext/apps/x.fap")
        );
        assert_eq!(
            storage.host_path(Path::new("rel.fap")),
            Path::new("/srv/sd/rel.fap")
        );
    }

    #[test]
    fn empty_path_does_not_exist() {
        assert!(!HostStorage::new().exists(Path::new("")));
    }

    #[test]
    fn directories_are_not_files() {
        let dir = std::env::temp_dir();
        assert!(!HostStorage::new().exists(&dir));
    }

    #[test]
    fn list_dir_maps_back_to_device_paths() {
        let root = std::env::temp_dir().join(format!("loader-list-dir-{}", std::process::id()));
        let games = root.join("ext/apps/Games");
        std::fs::create_dir_all(games.join("nested")).unwrap();
        std::fs::write(games.join("snake.fap"), b"").unwrap();
        std::fs::write(games.join("dice.fap"), b"").unwrap();

        let storage = HostStorage::with_root(&root);
        let listed = storage.list_dir(Path::new("/ext/apps/Games"));
        std::fs::remove_dir_all(&root).unwrap();

        assert_eq!(
            listed,
            [
                PathBuf::from("/ext/apps/Games/dice.fap"),
                PathBuf::from("/ext/apps/Games/snake.fap"),
            ]
        );
        assert!(storage.list_dir(Path::new("/nowhere")).is_empty());
    }
}
