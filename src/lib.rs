//! Locator Repair: rewrite broken UI locators and ship the fix on a branch
//!
//! Two independent pieces, composed by the caller:
//!
//! - [`LocatorRewriter`] finds the single `NAME = (By.STRATEGY, "selector")`
//!   line bound to a locator name and replaces it. Every other line is
//!   written back byte-for-byte.
//! - [`Publisher`] commits outstanding edits and pushes them to a fix branch
//!   reconciled with mainline, through the [`Vcs`] trait ([`GitCli`] drives
//!   the `git` executable).
//!
//! Status messages flow through a [`Reporter`]; [`config`] ties both pieces
//! together behind a TOML repair plan.
//!
//! # Example
//!
//! ```no_run
//! use locator_repair::{publish, LocatorRewriter, NewLocator, PublishOptions, Strategy};
//! use locator_repair::report::ConsoleReporter;
//!
//! let rewriter = LocatorRewriter::new().with_reporter(&ConsoleReporter);
//! let outcome = rewriter.update(
//!     "pages/locators.py",
//!     "EMAILBOX_LOCATOR",
//!     &NewLocator::new(Strategy::Xpath, "//input[@id='email']"),
//! )?;
//!
//! if outcome.updated() {
//!     publish(".", "ai-fix-1", &PublishOptions::default(), &ConsoleReporter)?;
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod config;
pub mod locator;
pub mod publish;
pub mod report;
pub mod safety;
pub mod vcs;

// Re-exports
pub use config::{
    apply_plan, load_from_path, load_from_str, publish_plan, ApplicationError, ConfigError,
    PlanOutcome, RepairPlan,
};
pub use locator::{
    LocatorAssignment, LocatorRewriter, NewLocator, RewriteError, Strategy, UpdateOutcome,
};
pub use publish::{
    publish, PublishError, PublishOptions, PublishReport, Publisher, ReconcileStrategy,
};
pub use report::{Reporter, StatusEvent};
pub use safety::{RepoGuard, SafetyError};
pub use vcs::{GitCli, Vcs, VcsError, VcsOp};
