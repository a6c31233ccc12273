//! Locator rewriting.
//!
//! Finds the single `NAME = (By.STRATEGY, "selector")` line bound to a
//! locator name and replaces it with a new strategy/selector pair. Every other
//! line of the file is written back byte-for-byte.

pub mod errors;
pub mod matcher;
pub mod rewriter;
pub mod strategy;

pub use errors::RewriteError;
pub use matcher::{matches_name, parse_assignment, LocatorAssignment};
pub use rewriter::{
    list_assignments, render_line, rewrite_content, LineChange, LocatorRewriter, NewLocator, Preview,
    UpdateOutcome, DEFAULT_NAMESPACE,
};
pub use strategy::{Strategy, UnknownStrategy};
