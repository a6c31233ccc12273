use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Keeps locator edits inside the repository that will be published.
///
/// A file outside the repository, or inside its `.git` directory, can be
/// edited but never shipped by the publisher, so it is rejected up front.
#[derive(Debug, Clone)]
pub struct RepoGuard {
    /// Canonical repository root
    repo_root: PathBuf,
}

#[derive(Error, Debug)]
pub enum SafetyError {
    #[error("Path is outside repository: {path} (repository: {repo})")]
    OutsideRepository { path: PathBuf, repo: PathBuf },

    #[error("Path is inside the git directory: {0}")]
    GitDirectory(PathBuf),

    #[error("Failed to canonicalize {}", .path.display())]
    Canonicalize {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn canonicalize(path: &Path) -> Result<PathBuf, SafetyError> {
    path.canonicalize().map_err(|source| SafetyError::Canonicalize {
        path: path.to_path_buf(),
        source,
    })
}

impl RepoGuard {
    /// The root is canonicalized so symlinked checkouts compare correctly.
    pub fn new(repo_root: impl AsRef<Path>) -> Result<Self, SafetyError> {
        Ok(Self {
            repo_root: canonicalize(repo_root.as_ref())?,
        })
    }

    /// Resolve `path` (relative paths against the repository root) and check
    /// that it lies inside the working tree.
    ///
    /// Returns the canonical absolute path.
    pub fn validate_path(&self, path: impl AsRef<Path>) -> Result<PathBuf, SafetyError> {
        let path = path.as_ref();
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.repo_root.join(path)
        };

        let canonical = canonicalize(&absolute)?;

        let relative = canonical
            .strip_prefix(&self.repo_root)
            .map_err(|_| SafetyError::OutsideRepository {
                path: canonical.clone(),
                repo: self.repo_root.clone(),
            })?;

        if relative.components().any(|c| c == Component::Normal(".git".as_ref())) {
            return Err(SafetyError::GitDirectory(canonical));
        }

        Ok(canonical)
    }

    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_validate_path_inside_repo() {
        let temp_dir = tempfile::tempdir().unwrap();
        let repo = temp_dir.path();
        let guard = RepoGuard::new(repo).unwrap();

        let file = repo.join("pages/locators.py");
        fs::create_dir_all(file.parent().unwrap()).unwrap();
        fs::write(&file, b"").unwrap();

        assert!(guard.validate_path(&file).is_ok());
    }

    #[test]
    fn test_validate_relative_path() {
        let temp_dir = tempfile::tempdir().unwrap();
        let repo = temp_dir.path();
        let guard = RepoGuard::new(repo).unwrap();
        fs::write(repo.join("locators.py"), b"").unwrap();

        let resolved = guard.validate_path("locators.py").unwrap();
        assert_eq!(resolved, guard.repo_root().join("locators.py"));
    }

    #[test]
    fn test_validate_path_outside_repo() {
        let temp_dir = tempfile::tempdir().unwrap();
        let repo = temp_dir.path().join("repo");
        fs::create_dir_all(&repo).unwrap();
        let guard = RepoGuard::new(&repo).unwrap();

        let outside = temp_dir.path().join("locators.py");
        fs::write(&outside, b"").unwrap();

        assert!(matches!(
            guard.validate_path(&outside),
            Err(SafetyError::OutsideRepository { .. })
        ));
        assert!(matches!(
            guard.validate_path("../locators.py"),
            Err(SafetyError::OutsideRepository { .. })
        ));
    }

    #[test]
    fn test_validate_path_in_git_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        let repo = temp_dir.path();
        fs::create_dir_all(repo.join(".git")).unwrap();
        fs::write(repo.join(".git/config"), b"").unwrap();
        let guard = RepoGuard::new(repo).unwrap();

        assert!(matches!(
            guard.validate_path(".git/config"),
            Err(SafetyError::GitDirectory(_))
        ));
    }

    #[test]
    fn test_validate_missing_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let guard = RepoGuard::new(temp_dir.path()).unwrap();
        let err = guard.validate_path("missing.py").unwrap_err();
        assert!(matches!(err, SafetyError::Canonicalize { .. }));

        // The io cause is reachable through source(), not repeated inline.
        let cause = std::error::Error::source(&err).unwrap().to_string();
        assert!(!err.to_string().contains(&cause), "{err}");
    }

    #[test]
    #[cfg(unix)]
    fn test_validate_symlink_escape() {
        use std::os::unix::fs::symlink;

        let temp_dir = tempfile::tempdir().unwrap();
        let repo = temp_dir.path().join("repo");
        fs::create_dir_all(&repo).unwrap();

        let outside = temp_dir.path().join("outside.py");
        fs::write(&outside, b"").unwrap();
        symlink(&outside, repo.join("escape.py")).unwrap();

        let guard = RepoGuard::new(&repo).unwrap();
        assert!(matches!(
            guard.validate_path("escape.py"),
            Err(SafetyError::OutsideRepository { .. })
        ));
    }
}
