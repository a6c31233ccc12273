//! Plan applicator - runs every locator update in a repair plan
//!
//! Resolves the plan's paths, checks the locator file belongs to the
//! repository, applies each update in order and reports per-locator results.
//! Publishing is a separate step so callers can inspect the results first.

use crate::config::schema::RepairPlan;
use crate::locator::{LocatorRewriter, RewriteError, UpdateOutcome};
use crate::publish::{publish, PublishError, PublishReport};
use crate::report::Reporter;
use crate::safety::{RepoGuard, SafetyError};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

/// Result for one `[[locators]]` entry.
#[derive(Debug)]
pub struct LocatorResult {
    pub name: String,
    pub outcome: Result<UpdateOutcome, RewriteError>,
}

/// Results of applying a plan.
#[derive(Debug)]
pub struct PlanOutcome {
    pub repo: PathBuf,
    pub locator_file: PathBuf,
    /// File content before any update.
    pub original: String,
    /// File content after all updates (predicted, for a dry run).
    pub modified: String,
    pub results: Vec<LocatorResult>,
}

impl PlanOutcome {
    fn count(&self, pred: impl Fn(&UpdateOutcome) -> bool) -> usize {
        self.results
            .iter()
            .filter(|r| r.outcome.as_ref().is_ok_and(&pred))
            .count()
    }

    pub fn updated_count(&self) -> usize {
        self.count(|o| matches!(o, UpdateOutcome::Updated { .. }))
    }

    pub fn unchanged_count(&self) -> usize {
        self.count(|o| matches!(o, UpdateOutcome::AlreadyCurrent { .. }))
    }

    pub fn not_found(&self) -> Vec<&str> {
        self.results
            .iter()
            .filter(|r| matches!(r.outcome, Ok(UpdateOutcome::NotFound { .. })))
            .map(|r| r.name.as_str())
            .collect()
    }

    pub fn failed_count(&self) -> usize {
        self.results.iter().filter(|r| r.outcome.is_err()).count()
    }

    /// True when at least one locator now holds its requested value.
    pub fn publish_needed(&self) -> bool {
        self.count(UpdateOutcome::updated) > 0
    }
}

#[derive(Error, Debug)]
pub enum ApplicationError {
    #[error(transparent)]
    Safety(#[from] SafetyError),

    #[error("failed to read {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Publish(#[from] PublishError),
}

/// Apply every locator update in `plan`.
///
/// The plan targets `repo_dir` unless it names its own `target.repo`. The
/// locator file resolves against that repository root. With `dry_run`,
/// updates are computed in memory and the file is left untouched.
pub fn apply_plan(
    plan: &RepairPlan,
    repo_dir: &Path,
    dry_run: bool,
    reporter: &dyn Reporter,
) -> Result<PlanOutcome, ApplicationError> {
    let guard = RepoGuard::new(plan.repo_path(repo_dir))?;
    let locator_file = guard.validate_path(&plan.target.locator_file)?;

    let rewriter = LocatorRewriter::new()
        .with_namespace(plan.namespace())
        .with_reporter(reporter);

    let read = |path: &Path| {
        fs::read_to_string(path).map_err(|source| ApplicationError::Io {
            path: path.to_path_buf(),
            source,
        })
    };
    let original = read(&locator_file)?;
    let mut modified = original.clone();
    let mut results = Vec::with_capacity(plan.locators.len());

    for entry in &plan.locators {
        let outcome = entry.new_locator().and_then(|locator| {
            if dry_run {
                let (next, outcome) =
                    rewriter.rewrite_text(&locator_file, &modified, &entry.name, &locator)?;
                modified = next;
                Ok(outcome)
            } else {
                rewriter.update(&locator_file, &entry.name, &locator)
            }
        });
        results.push(LocatorResult {
            name: entry.name.clone(),
            outcome,
        });
    }

    if !dry_run {
        modified = read(&locator_file)?;
    }

    let outcome = PlanOutcome {
        repo: guard.repo_root().to_path_buf(),
        locator_file,
        original,
        modified,
        results,
    };
    info!(
        updated = outcome.updated_count(),
        unchanged = outcome.unchanged_count(),
        not_found = outcome.not_found().len(),
        failed = outcome.failed_count(),
        "repair plan applied"
    );
    Ok(outcome)
}

/// Publish the plan's repository per its `[publish]` section.
///
/// Returns `Ok(None)` when the plan has no `[publish]` section.
pub fn publish_plan(
    plan: &RepairPlan,
    repo_dir: &Path,
    reporter: &dyn Reporter,
) -> Result<Option<PublishReport>, ApplicationError> {
    let Some(section) = &plan.publish else {
        return Ok(None);
    };
    let report = publish(
        plan.repo_path(repo_dir),
        &section.branch,
        &section.options(),
        reporter,
    )?;
    Ok(Some(report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_from_str;
    use crate::report::{NullReporter, RecordingReporter, StatusEvent};

    const LOCATORS: &str = "EMAILBOX_LOCATOR = (By.ID, \"email\")\n\
PASSWORD_LOCATOR = (By.ID, \"password\")\n";

    fn plan(locators: &str) -> RepairPlan {
        load_from_str(&format!(
            "[target]\nlocator_file = \"locators.py\"\n{locators}"
        ))
        .unwrap()
    }

    fn setup() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("locators.py"), LOCATORS).unwrap();
        dir
    }

    #[test]
    fn test_apply_plan_updates_each_locator() {
        let dir = setup();
        let plan = plan(
            r##"
[[locators]]
name = "EMAILBOX_LOCATOR"
strategy = "xpath"
selector = "//input[@id='email']"

[[locators]]
name = "PASSWORD_LOCATOR"
strategy = "css selector"
selector = "#pw"
"##,
        );

        let reporter = RecordingReporter::new();
        let outcome = apply_plan(&plan, dir.path(), false, &reporter).unwrap();

        assert_eq!(outcome.updated_count(), 2);
        assert!(outcome.publish_needed());
        assert_eq!(
            outcome.modified,
            "EMAILBOX_LOCATOR = (By.XPATH, \"//input[@id='email']\")\n\
PASSWORD_LOCATOR = (By.CSS_SELECTOR, \"#pw\")\n"
        );
        assert_eq!(outcome.original, LOCATORS);
        assert_eq!(reporter.events().len(), 2);
    }

    #[test]
    fn test_apply_plan_dry_run_leaves_file() {
        let dir = setup();
        let plan = plan(
            r#"
[[locators]]
name = "EMAILBOX_LOCATOR"
strategy = "xpath"
selector = "//input"

[[locators]]
name = "PASSWORD_LOCATOR"
strategy = "name"
selector = "pw"
"#,
        );

        let outcome = apply_plan(&plan, dir.path(), true, &NullReporter).unwrap();

        assert_eq!(outcome.updated_count(), 2);
        assert!(outcome.modified.contains("EMAILBOX_LOCATOR = (By.XPATH, \"//input\")"));
        assert!(outcome.modified.contains("PASSWORD_LOCATOR = (By.NAME, \"pw\")"));
        assert_eq!(
            fs::read_to_string(dir.path().join("locators.py")).unwrap(),
            LOCATORS
        );
    }

    #[test]
    fn test_apply_plan_reports_not_found() {
        let dir = setup();
        let plan = plan(
            r#"
[[locators]]
name = "SUBMIT_BUTTON"
strategy = "id"
selector = "submit"
"#,
        );

        let reporter = RecordingReporter::new();
        let outcome = apply_plan(&plan, dir.path(), false, &reporter).unwrap();

        assert_eq!(outcome.not_found(), vec!["SUBMIT_BUTTON"]);
        assert!(!outcome.publish_needed());
        assert!(matches!(
            reporter.events().as_slice(),
            [StatusEvent::LocatorNotFound { .. }]
        ));
    }

    #[test]
    fn test_apply_plan_rejects_file_outside_repo() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("repo")).unwrap();
        fs::write(dir.path().join("locators.py"), LOCATORS).unwrap();
        let plan = load_from_str(
            r#"
[target]
repo = "repo"
locator_file = "../locators.py"

[[locators]]
name = "EMAILBOX_LOCATOR"
strategy = "id"
selector = "e"
"#,
        )
        .unwrap();

        let err = apply_plan(&plan, dir.path(), false, &NullReporter).unwrap_err();
        assert!(matches!(
            err,
            ApplicationError::Safety(SafetyError::OutsideRepository { .. })
        ));
    }

    #[test]
    fn test_publish_plan_without_section() {
        let dir = setup();
        let plan = plan(
            r#"
[[locators]]
name = "EMAILBOX_LOCATOR"
strategy = "id"
selector = "e"
"#,
        );
        assert!(publish_plan(&plan, dir.path(), &NullReporter)
            .unwrap()
            .is_none());
    }
}
