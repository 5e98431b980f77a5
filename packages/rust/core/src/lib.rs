//! Import pipeline and reconciliation for curriculum outlines.
//!
//! This crate ties the outline parser to a [`CourseStore`]: a parsed course is
//! reconciled against its stored tree into a [`MergePlan`], which is then
//! applied parent-before-child (see [`import_course`]).
//!
//! [`CourseStore`]: curriculum_shared::CourseStore

pub mod apply;
pub mod memory;
pub mod pipeline;
pub mod reconcile;

pub use apply::{AppliedPlan, apply_plan};
pub use memory::{MemoryStore, StoreCall};
pub use pipeline::{ImportOptions, ImportResult, ProgressReporter, SilentProgress, import_course};
pub use reconcile::{
    CourseOp, Level, MergePlan, NodeFields, ParentRef, PlanOp, PlanSummary, UntouchedNode,
    reconcile,
};
