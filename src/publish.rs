//! Publishing a locator fix on a git branch.
//!
//! Two reconciliation orders are supported, chosen through
//! [`ReconcileStrategy`]:
//!
//! - **Mainline first** (default): commit local edits, switch to mainline,
//!   pull, create or reuse the fix branch, merge mainline and the fix commit
//!   into it, push.
//! - **Feature branch first**: create or reuse the fix branch from the
//!   current branch, fetch and merge the remote mainline, commit local
//!   edits, push.
//!
//! Either way the branch ends up on the remote with upstream tracking,
//! carrying both the fix and the latest mainline. Re-running with no new
//! edits makes no commit.

use crate::report::{NullReporter, Reporter, StatusEvent};
use crate::vcs::{GitCli, Vcs, VcsError, VcsOp};
use serde::Deserialize;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;
use tracing::{info, warn};

pub const DEFAULT_REMOTE: &str = "origin";
pub const DEFAULT_MAINLINE: &str = "main";
pub const DEFAULT_COMMIT_MESSAGE: &str = "Auto-staged: Save changes before branch switch";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReconcileStrategy {
    #[default]
    MainlineFirst,
    FeatureBranchFirst,
}

impl fmt::Display for ReconcileStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReconcileStrategy::MainlineFirst => f.write_str("mainline-first"),
            ReconcileStrategy::FeatureBranchFirst => f.write_str("feature-branch-first"),
        }
    }
}

impl FromStr for ReconcileStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mainline-first" => Ok(ReconcileStrategy::MainlineFirst),
            "feature-branch-first" => Ok(ReconcileStrategy::FeatureBranchFirst),
            other => Err(format!(
                "unknown strategy '{other}' (expected mainline-first or feature-branch-first)"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishOptions {
    pub remote: String,
    pub mainline: String,
    pub commit_message: String,
    pub strategy: ReconcileStrategy,
}

impl Default for PublishOptions {
    fn default() -> Self {
        Self {
            remote: DEFAULT_REMOTE.to_string(),
            mainline: DEFAULT_MAINLINE.to_string(),
            commit_message: DEFAULT_COMMIT_MESSAGE.to_string(),
            strategy: ReconcileStrategy::default(),
        }
    }
}

/// What a successful publish did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReport {
    pub branch: String,
    pub strategy: ReconcileStrategy,
    /// Commit created from local edits, if the tree was dirty.
    pub fix_commit: Option<String>,
    /// False when the branch already existed and was reused.
    pub branch_created: bool,
}

#[derive(Error, Debug)]
pub enum PublishError {
    #[error("invalid branch name '{branch}': {reason}")]
    InvalidBranch { branch: String, reason: &'static str },

    #[error("not a git repository: {}", .0.display())]
    NotARepository(std::path::PathBuf),

    /// A git step failed; [`VcsError::op`] names which one.
    #[error(transparent)]
    Vcs(VcsError),
}

impl PublishError {
    /// The failing repository operation, if any.
    pub fn op(&self) -> Option<VcsOp> {
        match self {
            PublishError::Vcs(source) => Some(source.op()),
            PublishError::NotARepository(_) => Some(VcsOp::Open),
            PublishError::InvalidBranch { .. } => None,
        }
    }
}

impl From<VcsError> for PublishError {
    fn from(source: VcsError) -> Self {
        match source {
            VcsError::NotARepository(path) => PublishError::NotARepository(path),
            source => PublishError::Vcs(source),
        }
    }
}

/// Check a branch name against the rules of `git check-ref-format`.
pub fn validate_branch_name(name: &str) -> Result<(), &'static str> {
    if name.is_empty() {
        return Err("branch name is empty");
    }
    if name.starts_with('-') {
        return Err("must not start with '-'");
    }
    if name.starts_with('/') || name.ends_with('/') || name.contains("//") {
        return Err("misplaced '/'");
    }
    if name.ends_with('.') || name.ends_with(".lock") {
        return Err("must not end with '.' or '.lock'");
    }
    if name.contains("..") || name.contains("@{") || name == "@" {
        return Err("must not contain '..' or '@{'");
    }
    if name
        .chars()
        .any(|c| c.is_whitespace() || c.is_control() || "~^:?*[\\".contains(c))
    {
        return Err("contains a character git does not allow");
    }
    if name.split('/').any(|part| part.starts_with('.')) {
        return Err("path components must not start with '.'");
    }
    Ok(())
}

/// Drives a [`Vcs`] through the publish sequence.
pub struct Publisher<'r, V> {
    vcs: V,
    options: PublishOptions,
    reporter: &'r dyn Reporter,
}

impl<V: Vcs> Publisher<'static, V> {
    pub fn new(vcs: V, options: PublishOptions) -> Self {
        Self {
            vcs,
            options,
            reporter: &NullReporter,
        }
    }
}

impl<'r, V: Vcs> Publisher<'r, V> {
    pub fn with_reporter<'n>(self, reporter: &'n dyn Reporter) -> Publisher<'n, V> {
        Publisher {
            vcs: self.vcs,
            options: self.options,
            reporter,
        }
    }

    pub fn options(&self) -> &PublishOptions {
        &self.options
    }

    pub fn vcs(&self) -> &V {
        &self.vcs
    }

    /// Commit outstanding edits and push them on `branch`.
    pub fn publish(&self, branch: &str) -> Result<PublishReport, PublishError> {
        validate_branch_name(branch).map_err(|reason| PublishError::InvalidBranch {
            branch: branch.to_string(),
            reason,
        })?;
        validate_branch_name(&self.options.mainline).map_err(|reason| {
            PublishError::InvalidBranch {
                branch: self.options.mainline.clone(),
                reason,
            }
        })?;

        info!(branch, strategy = %self.options.strategy, "publishing");
        let report = match self.options.strategy {
            ReconcileStrategy::MainlineFirst => self.mainline_first(branch)?,
            ReconcileStrategy::FeatureBranchFirst => self.feature_branch_first(branch)?,
        };

        self.vcs.push(&self.options.remote, branch, true)?;
        self.reporter.report(StatusEvent::Pushed {
            remote: self.options.remote.clone(),
            branch: branch.to_string(),
        });
        info!(branch, remote = %self.options.remote, "pushed");
        Ok(report)
    }

    fn mainline_first(&self, branch: &str) -> Result<PublishReport, PublishError> {
        let mainline = self.options.mainline.as_str();
        let start_branch = self.vcs.current_branch()?;

        // Edits must be committed before the checkout below can touch them.
        let fix_commit = self.commit_if_dirty()?;

        self.checkout(mainline)?;
        self.vcs.pull(&self.options.remote, mainline)?;
        self.reporter.report(StatusEvent::Pulled {
            remote: self.options.remote.clone(),
            branch: mainline.to_string(),
        });

        let branch_created = self.ensure_branch(branch)?;
        if !branch_created {
            self.merge(mainline)?;
        }

        // A fix committed on some other branch would otherwise be left behind.
        let fixed_elsewhere = start_branch
            .as_deref()
            .map_or(true, |b| b != mainline && b != branch);
        if let (Some(commit), true) = (&fix_commit, fixed_elsewhere) {
            self.merge(commit)?;
        }

        Ok(PublishReport {
            branch: branch.to_string(),
            strategy: ReconcileStrategy::MainlineFirst,
            fix_commit,
            branch_created,
        })
    }

    fn feature_branch_first(&self, branch: &str) -> Result<PublishReport, PublishError> {
        let remote = self.options.remote.as_str();
        let mainline = self.options.mainline.as_str();

        let already_on_branch = self.vcs.current_branch()?.as_deref() == Some(branch);
        let branch_created = if already_on_branch {
            false
        } else {
            self.ensure_branch(branch)?
        };

        self.vcs.fetch(remote, mainline)?;
        self.reporter.report(StatusEvent::Fetched {
            remote: remote.to_string(),
            branch: mainline.to_string(),
        });
        self.merge(&format!("{remote}/{mainline}"))?;

        let fix_commit = self.commit_if_dirty()?;

        Ok(PublishReport {
            branch: branch.to_string(),
            strategy: ReconcileStrategy::FeatureBranchFirst,
            fix_commit,
            branch_created,
        })
    }

    fn commit_if_dirty(&self) -> Result<Option<String>, PublishError> {
        if !self.vcs.is_dirty()? {
            self.reporter.report(StatusEvent::NothingToCommit);
            return Ok(None);
        }
        self.vcs.stage_all()?;
        let commit = self.vcs.commit(&self.options.commit_message)?;
        info!(%commit, "committed local changes");
        self.reporter.report(StatusEvent::Committed {
            message: self.options.commit_message.clone(),
            commit: commit.clone(),
        });
        Ok(Some(commit))
    }

    /// Create `branch` from HEAD, or check it out if it already exists.
    ///
    /// Returns whether the branch was newly created.
    fn ensure_branch(&self, branch: &str) -> Result<bool, PublishError> {
        match self.vcs.create_branch(branch) {
            Ok(()) => {
                self.reporter.report(StatusEvent::BranchCreated {
                    branch: branch.to_string(),
                });
                Ok(true)
            }
            Err(VcsError::BranchExists(_)) => {
                warn!(branch, "branch exists, switching to it");
                self.reporter.report(StatusEvent::BranchExists {
                    branch: branch.to_string(),
                });
                self.checkout(branch)?;
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn checkout(&self, branch: &str) -> Result<(), PublishError> {
        self.vcs.checkout(branch)?;
        self.reporter.report(StatusEvent::SwitchedBranch {
            branch: branch.to_string(),
        });
        Ok(())
    }

    fn merge(&self, reference: &str) -> Result<(), PublishError> {
        self.vcs.merge(reference)?;
        self.reporter.report(StatusEvent::Merged {
            reference: reference.to_string(),
        });
        Ok(())
    }
}

/// Publish local changes in the git repository at `repo` on `branch`.
pub fn publish(
    repo: impl AsRef<Path>,
    branch: &str,
    options: &PublishOptions,
    reporter: &dyn Reporter,
) -> Result<PublishReport, PublishError> {
    let git = GitCli::open(repo)?;
    Publisher::new(git, options.clone())
        .with_reporter(reporter)
        .publish(branch)
}
