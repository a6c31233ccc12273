use super::{Vcs, VcsError, VcsOp};
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tracing::{debug, warn};

/// [`Vcs`] backed by the `git` executable, run as `git -C <repo> ...`.
#[derive(Debug, Clone)]
pub struct GitCli {
    repo: PathBuf,
}

impl GitCli {
    /// Open the repository containing `repo`.
    pub fn open(repo: impl AsRef<Path>) -> Result<Self, VcsError> {
        let cli = Self {
            repo: repo.as_ref().to_path_buf(),
        };
        let out = cli.output(VcsOp::Open, &["rev-parse", "--is-inside-work-tree"])?;
        if out.status.success() {
            Ok(cli)
        } else {
            Err(VcsError::NotARepository(cli.repo))
        }
    }

    pub fn repo(&self) -> &Path {
        &self.repo
    }

    fn output(&self, op: VcsOp, args: &[&str]) -> Result<Output, VcsError> {
        debug!(repo = %self.repo.display(), ?args, "git");
        Command::new("git")
            .arg("-C")
            .arg(&self.repo)
            .args(args)
            // Fail instead of blocking on a credential prompt.
            .env("GIT_TERMINAL_PROMPT", "0")
            .env("LC_ALL", "C")
            .output()
            .map_err(|source| VcsError::Spawn { op, source })
    }

    /// Run git and return trimmed stdout, failing on a non-zero exit.
    fn run(&self, op: VcsOp, args: &[&str]) -> Result<String, VcsError> {
        let out = self.output(op, args)?;
        if !out.status.success() {
            return Err(command_error(op, &out));
        }
        Ok(String::from_utf8_lossy(&out.stdout).trim().to_string())
    }

    fn local_branch_exists(&self, branch: &str) -> Result<bool, VcsError> {
        let reference = format!("refs/heads/{branch}");
        let out = self.output(
            VcsOp::CreateBranch,
            &["rev-parse", "--verify", "--quiet", &reference],
        )?;
        Ok(out.status.success())
    }
}

fn command_error(op: VcsOp, out: &Output) -> VcsError {
    let stderr = String::from_utf8_lossy(&out.stderr);
    let stdout = String::from_utf8_lossy(&out.stdout);
    let message = if stderr.trim().is_empty() {
        stdout.trim().to_string()
    } else {
        stderr.trim().to_string()
    };
    VcsError::Command { op, message }
}

impl Vcs for GitCli {
    fn is_dirty(&self) -> Result<bool, VcsError> {
        let status = self.run(
            VcsOp::Status,
            &["status", "--porcelain", "--untracked-files=all"],
        )?;
        Ok(!status.is_empty())
    }

    fn stage_all(&self) -> Result<(), VcsError> {
        self.run(VcsOp::Stage, &["add", "--all"]).map(drop)
    }

    fn commit(&self, message: &str) -> Result<String, VcsError> {
        self.run(VcsOp::Commit, &["commit", "--quiet", "-m", message])?;
        self.head_commit()
    }

    fn current_branch(&self) -> Result<Option<String>, VcsError> {
        let out = self.output(VcsOp::Head, &["symbolic-ref", "--quiet", "--short", "HEAD"])?;
        match out.status.code() {
            Some(0) => Ok(Some(String::from_utf8_lossy(&out.stdout).trim().to_string())),
            // Exit status 1 with --quiet means HEAD is detached.
            Some(1) => Ok(None),
            _ => Err(command_error(VcsOp::Head, &out)),
        }
    }

    fn head_commit(&self) -> Result<String, VcsError> {
        self.run(VcsOp::Head, &["rev-parse", "HEAD"])
    }

    fn checkout(&self, branch: &str) -> Result<(), VcsError> {
        self.run(VcsOp::Checkout, &["checkout", "--quiet", branch])
            .map(drop)
    }

    fn create_branch(&self, branch: &str) -> Result<(), VcsError> {
        if self.local_branch_exists(branch)? {
            return Err(VcsError::BranchExists(branch.to_string()));
        }
        match self.run(VcsOp::CreateBranch, &["checkout", "--quiet", "-b", branch]) {
            Ok(_) => Ok(()),
            Err(VcsError::Command { message, .. }) if message.contains("already exists") => {
                Err(VcsError::BranchExists(branch.to_string()))
            }
            Err(e) => Err(e),
        }
    }

    fn pull(&self, remote: &str, branch: &str) -> Result<(), VcsError> {
        self.run(
            VcsOp::Pull,
            &["pull", "--quiet", "--no-rebase", "--no-edit", remote, branch],
        )
        .map(drop)
    }

    fn fetch(&self, remote: &str, branch: &str) -> Result<(), VcsError> {
        self.run(VcsOp::Fetch, &["fetch", "--quiet", remote, branch])
            .map(drop)
    }

    fn merge(&self, reference: &str) -> Result<(), VcsError> {
        match self.run(VcsOp::Merge, &["merge", "--quiet", "--no-edit", reference]) {
            Ok(_) => Ok(()),
            Err(err) => {
                // Leave the working tree as it was before the merge attempt.
                if let Err(abort) = self.run(VcsOp::Merge, &["merge", "--abort"]) {
                    warn!(%abort, "git merge --abort failed");
                }
                Err(err)
            }
        }
    }

    fn push(&self, remote: &str, branch: &str, set_upstream: bool) -> Result<(), VcsError> {
        let mut args = vec!["push", "--quiet"];
        if set_upstream {
            args.push("--set-upstream");
        }
        args.extend([remote, branch]);
        self.run(VcsOp::Push, &args).map(drop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn run_git(root: &Path, args: &[&str]) {
        let status = Command::new("git")
            .arg("-C")
            .arg(root)
            .args(args)
            .status()
            .expect("run git");
        assert!(status.success(), "git {:?} failed", args);
    }

    fn init_repo() -> TempDir {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        run_git(root, &["init", "--quiet"]);
        run_git(root, &["symbolic-ref", "HEAD", "refs/heads/main"]);
        run_git(root, &["config", "user.email", "test@example.com"]);
        run_git(root, &["config", "user.name", "Test User"]);
        run_git(root, &["config", "commit.gpgsign", "false"]);
        fs::write(root.join("locators.py"), "A = (By.ID, 'a')\n").unwrap();
        run_git(root, &["add", "."]);
        run_git(root, &["commit", "--quiet", "-m", "init"]);
        dir
    }

    #[test]
    fn test_open_rejects_plain_directory() {
        let dir = TempDir::new().unwrap();
        let plain = dir.path().join("plain");
        fs::create_dir(&plain).unwrap();
        // A temp dir could sit inside some outer repository; only assert
        // when git itself agrees there is none.
        let inside = Command::new("git")
            .arg("-C")
            .arg(&plain)
            .args(["rev-parse", "--is-inside-work-tree"])
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false);
        if !inside {
            assert!(matches!(
                GitCli::open(&plain),
                Err(VcsError::NotARepository(_))
            ));
        }
    }

    #[test]
    fn test_dirty_detection_includes_untracked() {
        let repo = init_repo();
        let git = GitCli::open(repo.path()).unwrap();
        assert!(!git.is_dirty().unwrap());

        fs::write(repo.path().join("new.py"), "B = (By.ID, 'b')\n").unwrap();
        assert!(git.is_dirty().unwrap());
    }

    #[test]
    fn test_commit_returns_head() {
        let repo = init_repo();
        let git = GitCli::open(repo.path()).unwrap();
        fs::write(repo.path().join("locators.py"), "A = (By.XPATH, \"//a\")\n").unwrap();
        git.stage_all().unwrap();
        let commit = git.commit("fix locator").unwrap();
        assert_eq!(commit, git.head_commit().unwrap());
        assert!(!git.is_dirty().unwrap());
    }

    #[test]
    fn test_create_branch_collision() {
        let repo = init_repo();
        let git = GitCli::open(repo.path()).unwrap();

        git.create_branch("ai-fix-1").unwrap();
        assert_eq!(git.current_branch().unwrap().as_deref(), Some("ai-fix-1"));

        git.checkout("main").unwrap();
        assert!(matches!(
            git.create_branch("ai-fix-1"),
            Err(VcsError::BranchExists(b)) if b == "ai-fix-1"
        ));
    }

    #[test]
    fn test_current_branch_detached() {
        let repo = init_repo();
        let git = GitCli::open(repo.path()).unwrap();
        let head = git.head_commit().unwrap();
        git.checkout(&head).unwrap();
        assert_eq!(git.current_branch().unwrap(), None);
    }

    #[test]
    fn test_checkout_missing_branch_names_operation() {
        let repo = init_repo();
        let git = GitCli::open(repo.path()).unwrap();
        let err = git.checkout("does-not-exist").unwrap_err();
        assert_eq!(err.op(), VcsOp::Checkout);
    }

    #[test]
    fn test_push_without_remote_fails_with_push_op() {
        let repo = init_repo();
        let git = GitCli::open(repo.path()).unwrap();
        let err = git.push("origin", "main", true).unwrap_err();
        assert_eq!(err.op(), VcsOp::Push);
    }
}
