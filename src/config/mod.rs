pub mod applicator;
pub mod loader;
pub mod schema;

pub use applicator::{
    apply_plan, publish_plan, ApplicationError, LocatorResult, PlanOutcome,
};
pub use loader::{load_from_path, load_from_str, ConfigError};
pub use schema::{
    LocatorEntry, PublishSection, RepairPlan, Target, ValidationError, ValidationIssue,
};
