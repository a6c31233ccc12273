//! Status reporting.
//!
//! Every user-visible progress message goes through a [`Reporter`] as a
//! structured [`StatusEvent`]. The CLI prints them with colour; tests record
//! them and assert on the events themselves.

use colored::Colorize;
use std::fmt;
use std::path::PathBuf;
use std::sync::Mutex;

/// A single progress or status notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusEvent {
    /// A locator line was replaced.
    LocatorUpdated {
        file: PathBuf,
        name: String,
        line_number: usize,
        new_line: String,
    },
    /// The locator already had the requested value.
    LocatorUnchanged { file: PathBuf, name: String },
    /// No assignment with this name exists in the file.
    LocatorNotFound {
        file: PathBuf,
        name: String,
        suggestion: Option<String>,
    },
    /// Local edits were staged and committed.
    Committed { message: String, commit: String },
    /// Working tree was clean, nothing to commit.
    NothingToCommit,
    SwitchedBranch { branch: String },
    Pulled { remote: String, branch: String },
    Fetched { remote: String, branch: String },
    Merged { reference: String },
    BranchCreated { branch: String },
    /// Branch creation collided with an existing branch; checked it out instead.
    BranchExists { branch: String },
    Pushed { remote: String, branch: String },
}

impl fmt::Display for StatusEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusEvent::LocatorUpdated {
                name,
                line_number,
                new_line,
                ..
            } => write!(f, "Updated {name} (line {line_number}) -> {new_line}"),
            StatusEvent::LocatorUnchanged { name, .. } => {
                write!(f, "Locator {name} already up to date")
            }
            StatusEvent::LocatorNotFound {
                file,
                name,
                suggestion,
            } => {
                write!(
                    f,
                    "Locator variable '{name}' not found in {}",
                    file.display()
                )?;
                if let Some(suggestion) = suggestion {
                    write!(f, " (did you mean '{suggestion}'?)")?;
                }
                Ok(())
            }
            StatusEvent::Committed { message, commit } => {
                write!(f, "Committed {commit}: {message}")
            }
            StatusEvent::NothingToCommit => write!(f, "Working tree clean, nothing to commit"),
            StatusEvent::SwitchedBranch { branch } => write!(f, "Switched to '{branch}'"),
            StatusEvent::Pulled { remote, branch } => write!(f, "Pulled {remote}/{branch}"),
            StatusEvent::Fetched { remote, branch } => write!(f, "Fetched {remote}/{branch}"),
            StatusEvent::Merged { reference } => write!(f, "Merged {reference}"),
            StatusEvent::BranchCreated { branch } => write!(f, "Created branch '{branch}'"),
            StatusEvent::BranchExists { branch } => {
                write!(f, "Branch '{branch}' exists. Switching to it.")
            }
            StatusEvent::Pushed { remote, branch } => {
                write!(f, "Changes pushed to branch '{branch}' on {remote}")
            }
        }
    }
}

impl StatusEvent {
    fn is_warning(&self) -> bool {
        matches!(
            self,
            StatusEvent::LocatorNotFound { .. } | StatusEvent::BranchExists { .. }
        )
    }
}

/// Sink for status events.
pub trait Reporter {
    fn report(&self, event: StatusEvent);
}

impl<R: Reporter + ?Sized> Reporter for &R {
    fn report(&self, event: StatusEvent) {
        (**self).report(event)
    }
}

/// Prints events to stdout (warnings to stderr) with colour.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleReporter;

impl Reporter for ConsoleReporter {
    fn report(&self, event: StatusEvent) {
        let text = event.to_string();
        match &event {
            e if e.is_warning() => eprintln!("{} {}", "⚠".yellow(), text.yellow()),
            StatusEvent::LocatorUpdated { .. } | StatusEvent::Pushed { .. } => {
                println!("{} {}", "✓".green(), text)
            }
            StatusEvent::LocatorUnchanged { .. } | StatusEvent::NothingToCommit => {
                println!("{} {}", "⊙".yellow(), text.dimmed())
            }
            _ => println!("{} {}", "→".cyan(), text),
        }
    }
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn report(&self, _event: StatusEvent) {}
}

/// Keeps events in memory, in arrival order.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    events: Mutex<Vec<StatusEvent>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<StatusEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl Reporter for RecordingReporter {
    fn report(&self, event: StatusEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}
