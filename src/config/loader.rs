//! Repair plan loading.
//!
//! A plan read from disk has an explicit `target.repo` anchored to the plan
//! file's directory, so the loaded plan no longer depends on where the file
//! lived. A plan without `target.repo` applies to whichever repository the
//! caller hands to [`apply_plan`](crate::config::apply_plan).

use crate::config::schema::{RepairPlan, ValidationError};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read repair plan {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed repair plan{}", origin(.path))]
    Toml {
        path: Option<PathBuf>,
        #[source]
        source: toml_edit::de::Error,
    },

    /// Every problem found, listed in the message.
    #[error("invalid repair plan{}: {error}", origin(.path))]
    Validation {
        path: Option<PathBuf>,
        error: ValidationError,
    },
}

fn origin(path: &Option<PathBuf>) -> String {
    match path {
        Some(path) => format!(" {}", path.display()),
        None => String::new(),
    }
}

fn parse(input: &str, path: Option<&Path>) -> Result<RepairPlan, ConfigError> {
    let plan: RepairPlan = toml_edit::de::from_str(input).map_err(|source| ConfigError::Toml {
        path: path.map(Path::to_path_buf),
        source,
    })?;
    plan.validate().map_err(|error| ConfigError::Validation {
        path: path.map(Path::to_path_buf),
        error,
    })?;
    Ok(plan)
}

/// Parse and validate a plan. A relative `target.repo` stays relative and
/// resolves against the directory given to `apply_plan`.
pub fn load_from_str(input: &str) -> Result<RepairPlan, ConfigError> {
    parse(input, None)
}

/// Read, parse and validate the plan at `path`.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RepairPlan, ConfigError> {
    let path = path.as_ref();
    let io_error = |source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    };

    let contents = fs::read_to_string(path).map_err(io_error)?;
    let mut plan = parse(&contents, Some(path))?;

    if let Some(repo) = plan.target.repo.as_mut().filter(|r| r.is_relative()) {
        let plan_dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        let anchored = plan_dir.canonicalize().map_err(io_error)?.join(&*repo);
        debug!(plan = %path.display(), repo = %anchored.display(), "anchored plan repository");
        *repo = anchored;
    }
    Ok(plan)
}
