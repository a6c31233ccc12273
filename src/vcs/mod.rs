//! Version-control abstraction used by the publisher.
//!
//! [`Vcs`] is the seam between the publish state machine and a real
//! repository. [`GitCli`] drives the `git` executable; tests substitute an
//! in-memory implementation.

pub mod git;

pub use git::GitCli;

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Which repository operation was running when something failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VcsOp {
    Open,
    Status,
    Stage,
    Commit,
    Head,
    Checkout,
    CreateBranch,
    Pull,
    Fetch,
    Merge,
    Push,
}

impl fmt::Display for VcsOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            VcsOp::Open => "open",
            VcsOp::Status => "status",
            VcsOp::Stage => "add",
            VcsOp::Commit => "commit",
            VcsOp::Head => "rev-parse",
            VcsOp::Checkout => "checkout",
            VcsOp::CreateBranch => "checkout -b",
            VcsOp::Pull => "pull",
            VcsOp::Fetch => "fetch",
            VcsOp::Merge => "merge",
            VcsOp::Push => "push",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum VcsError {
    #[error("branch '{0}' already exists")]
    BranchExists(String),

    #[error("not a git repository: {0}")]
    NotARepository(PathBuf),

    #[error("git {op} failed: {message}")]
    Command { op: VcsOp, message: String },

    #[error("failed to run git {op}")]
    Spawn {
        op: VcsOp,
        #[source]
        source: std::io::Error,
    },
}

impl VcsError {
    /// The operation this error came from.
    pub fn op(&self) -> VcsOp {
        match self {
            VcsError::BranchExists(_) => VcsOp::CreateBranch,
            VcsError::NotARepository(_) => VcsOp::Open,
            VcsError::Command { op, .. } | VcsError::Spawn { op, .. } => *op,
        }
    }
}

/// Operations the publisher needs from a repository.
pub trait Vcs {
    /// Whether the working tree has modified, staged or untracked content.
    fn is_dirty(&self) -> Result<bool, VcsError>;

    fn stage_all(&self) -> Result<(), VcsError>;

    /// Commit the index and return the new commit id.
    fn commit(&self, message: &str) -> Result<String, VcsError>;

    /// Current branch name, or `None` on a detached HEAD.
    fn current_branch(&self) -> Result<Option<String>, VcsError>;

    fn head_commit(&self) -> Result<String, VcsError>;

    fn checkout(&self, branch: &str) -> Result<(), VcsError>;

    /// Create `branch` from HEAD and switch to it.
    ///
    /// Fails with [`VcsError::BranchExists`] if a local branch of that name
    /// already exists.
    fn create_branch(&self, branch: &str) -> Result<(), VcsError>;

    fn pull(&self, remote: &str, branch: &str) -> Result<(), VcsError>;

    fn fetch(&self, remote: &str, branch: &str) -> Result<(), VcsError>;

    /// Merge `reference` (branch, remote-tracking ref or commit) into HEAD.
    fn merge(&self, reference: &str) -> Result<(), VcsError>;

    fn push(&self, remote: &str, branch: &str, set_upstream: bool) -> Result<(), VcsError>;
}
