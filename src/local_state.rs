use std::{
    fs::{self, OpenOptions},
    io::{self, Write},
    path::{Path, PathBuf},
};

const LOCK_FILE: &str = ".lock";

/// Per-application local state directory, `<state_dir>/<application_id>`.
#[derive(Debug, Clone)]
pub struct LocalState {
    dir: PathBuf,
}

impl LocalState {
    pub fn new(state_dir: &Path, application_id: &str) -> Self {
        Self {
            dir: state_dir.join(application_id),
        }
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Removes whatever a previous run left behind. Returns whether anything
    /// was removed. Fails while another instance holds the lock.
    pub fn clean_up(&self) -> io::Result<bool> {
        let lock_path = self.dir.join(LOCK_FILE);
        if lock_path.exists() {
            return Err(locked_error(&lock_path));
        }

        match fs::remove_dir_all(&self.dir) {
            Ok(()) => Ok(true),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(error) => Err(error),
        }
    }

    /// Creates the directory and a lock file holding our pid. Fails with
    /// [`io::ErrorKind::AlreadyExists`] if the lock file is already there. The
    /// lock file is removed when the returned guard is dropped.
    ///
    /// A process killed without unwinding leaves the lock file behind, it has
    /// to be removed by hand.
    pub fn lock(&self) -> io::Result<StateLock> {
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(LOCK_FILE);

        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(error) if error.kind() == io::ErrorKind::AlreadyExists => {
                return Err(locked_error(&path));
            }
            Err(error) => return Err(error),
        };
        let lock = StateLock { path };
        file.write_all(std::process::id().to_string().as_bytes())?;

        Ok(lock)
    }
}

fn locked_error(lock_path: &Path) -> io::Error {
    let owner = fs::read_to_string(lock_path)
        .ok()
        .filter(|pid| !pid.trim().is_empty())
        .unwrap_or_else(|| "unknown".to_string());

    io::Error::new(
        io::ErrorKind::AlreadyExists,
        format!("{} is held by process {}", lock_path.display(), owner.trim()),
    )
}

#[derive(Debug)]
pub struct StateLock {
    path: PathBuf,
}

impl Drop for StateLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_up_is_idempotent() {
        let root = tempfile::tempdir().unwrap();
        let state = LocalState::new(root.path(), "filter");
        fs::create_dir_all(state.path().join("0_0")).unwrap();
        fs::write(state.path().join("0_0").join("checkpoint"), b"42").unwrap();

        assert!(state.clean_up().unwrap());
        assert!(!state.path().exists());

        assert!(!state.clean_up().unwrap());
        assert!(!state.path().exists());
    }

    #[test]
    fn test_clean_up_on_fresh_install() {
        let root = tempfile::tempdir().unwrap();
        let state = LocalState::new(&root.path().join("missing"), "filter");

        assert!(!state.clean_up().unwrap());
    }

    #[test]
    fn test_lock_released_on_drop() {
        let root = tempfile::tempdir().unwrap();
        let state = LocalState::new(root.path(), "filter");

        let lock = state.lock().unwrap();
        let lock_path = state.path().join(LOCK_FILE);
        assert_eq!(
            fs::read_to_string(&lock_path).unwrap(),
            std::process::id().to_string()
        );

        drop(lock);
        assert!(!lock_path.exists());
        assert!(state.path().exists());
    }

    #[test]
    fn test_lock_is_exclusive() {
        let root = tempfile::tempdir().unwrap();
        let first = LocalState::new(root.path(), "filter");
        let second = LocalState::new(root.path(), "filter");

        let lock = first.lock().unwrap();

        let err = second.lock().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
        assert!(err.to_string().contains(&std::process::id().to_string()));

        let err = second.clean_up().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
        assert!(first.path().join(LOCK_FILE).exists());

        drop(lock);
        second.lock().map(drop).unwrap();
        assert!(second.clean_up().unwrap());
    }

    #[test]
    fn test_clean_up_leaves_siblings_alone() {
        let root = tempfile::tempdir().unwrap();
        let ours = LocalState::new(root.path(), "filter");
        let theirs = LocalState::new(root.path(), "other");
        let _lock = theirs.lock().unwrap();
        ours.lock().map(drop).unwrap();

        assert!(ours.clean_up().unwrap());
        assert!(theirs.path().exists());
    }
}
