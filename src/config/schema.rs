use crate::locator::{NewLocator, RewriteError, Strategy, DEFAULT_NAMESPACE};
use crate::publish::{validate_branch_name, PublishOptions, ReconcileStrategy};
use serde::Deserialize;
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

/// A repair plan: one locator file, the updates to make in it, and
/// optionally where to publish the result.
#[derive(Debug, Deserialize, Clone)]
pub struct RepairPlan {
    pub target: Target,
    #[serde(default)]
    pub publish: Option<PublishSection>,
    #[serde(default)]
    pub locators: Vec<LocatorEntry>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Target {
    /// Locator file, relative to the repository unless absolute.
    pub locator_file: String,
    /// Repository root, relative to the plan file's directory. Absent means
    /// the repository the plan is applied to.
    #[serde(default)]
    pub repo: Option<PathBuf>,
    #[serde(default)]
    pub namespace: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PublishSection {
    pub branch: String,
    #[serde(default)]
    pub remote: Option<String>,
    #[serde(default)]
    pub mainline: Option<String>,
    #[serde(default)]
    pub strategy: Option<ReconcileStrategy>,
    #[serde(default)]
    pub commit_message: Option<String>,
}

impl PublishSection {
    pub fn options(&self) -> PublishOptions {
        let defaults = PublishOptions::default();
        PublishOptions {
            remote: self.remote.clone().unwrap_or(defaults.remote),
            mainline: self.mainline.clone().unwrap_or(defaults.mainline),
            commit_message: self
                .commit_message
                .clone()
                .unwrap_or(defaults.commit_message),
            strategy: self.strategy.unwrap_or(defaults.strategy),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LocatorEntry {
    pub name: String,
    pub strategy: String,
    pub selector: String,
}

impl LocatorEntry {
    pub fn new_locator(&self) -> Result<NewLocator, RewriteError> {
        NewLocator::parse(&self.strategy, self.selector.clone())
    }
}

impl RepairPlan {
    pub fn namespace(&self) -> &str {
        self.target.namespace.as_deref().unwrap_or(DEFAULT_NAMESPACE)
    }

    /// Repository root: `target.repo` resolved against `repo_dir`, or
    /// `repo_dir` itself when the plan names none.
    pub fn repo_path(&self, repo_dir: &Path) -> PathBuf {
        match &self.target.repo {
            Some(repo) => repo_dir.join(repo),
            None => repo_dir.to_path_buf(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut issues = Vec::new();

        if self.target.locator_file.trim().is_empty() {
            issues.push(ValidationIssue::MissingField {
                locator: None,
                field: "target.locator_file",
            });
        }
        if let Some(repo) = &self.target.repo {
            if repo.as_os_str().is_empty() {
                issues.push(ValidationIssue::MissingField {
                    locator: None,
                    field: "target.repo",
                });
            }
        }
        if let Some(namespace) = &self.target.namespace {
            if namespace.trim().is_empty() {
                issues.push(ValidationIssue::MissingField {
                    locator: None,
                    field: "target.namespace",
                });
            }
        }

        if self.locators.is_empty() {
            issues.push(ValidationIssue::EmptyLocatorList);
        }

        let mut seen = HashSet::new();
        for entry in &self.locators {
            if entry.name.trim().is_empty() {
                issues.push(ValidationIssue::MissingField {
                    locator: None,
                    field: "name",
                });
                continue;
            }
            if !seen.insert(entry.name.as_str()) {
                issues.push(ValidationIssue::DuplicateLocator(entry.name.clone()));
            }
            if entry.strategy.parse::<Strategy>().is_err() {
                issues.push(ValidationIssue::UnknownStrategy {
                    locator: entry.name.clone(),
                    strategy: entry.strategy.clone(),
                });
            }
            if entry.selector.is_empty() {
                issues.push(ValidationIssue::MissingField {
                    locator: Some(entry.name.clone()),
                    field: "selector",
                });
            }
        }

        if let Some(publish) = &self.publish {
            let options = publish.options();
            for branch in [&publish.branch, &options.mainline] {
                if let Err(reason) = validate_branch_name(branch) {
                    issues.push(ValidationIssue::InvalidBranch {
                        branch: branch.clone(),
                        reason,
                    });
                }
            }
            if options.remote.trim().is_empty() {
                issues.push(ValidationIssue::MissingField {
                    locator: None,
                    field: "publish.remote",
                });
            }
            if options.commit_message.trim().is_empty() {
                issues.push(ValidationIssue::MissingField {
                    locator: None,
                    field: "publish.commit_message",
                });
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { issues })
        }
    }
}

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, issue) in self.issues.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    EmptyLocatorList,
    MissingField {
        locator: Option<String>,
        field: &'static str,
    },
    DuplicateLocator(String),
    UnknownStrategy {
        locator: String,
        strategy: String,
    },
    InvalidBranch {
        branch: String,
        reason: &'static str,
    },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::EmptyLocatorList => write!(f, "repair plan contains no locators"),
            ValidationIssue::MissingField { locator, field } => match locator {
                Some(name) => write!(f, "locator '{name}' missing required field '{field}'"),
                None => write!(f, "missing required field '{field}'"),
            },
            ValidationIssue::DuplicateLocator(name) => {
                write!(f, "locator '{name}' is listed more than once")
            }
            ValidationIssue::UnknownStrategy { locator, strategy } => {
                write!(f, "locator '{locator}' has unknown strategy '{strategy}'")
            }
            ValidationIssue::InvalidBranch { branch, reason } => {
                write!(f, "invalid branch name '{branch}': {reason}")
            }
        }
    }
}
