//! The inference engines.
//!
//! Three layers, leaf to root: [`entity`] rebuilds one physical entity in
//! the target species, [`reaction`] orchestrates a whole reaction through
//! its eligibility and abort rules, and [`hierarchy`] re-creates the
//! enclosing pathway tree after the reaction pass completes.

pub mod entity;
pub mod hierarchy;
pub mod reaction;

pub use entity::EntityInference;
pub use hierarchy::{HierarchyProjector, ProjectionStats};
pub use reaction::{ReactionInference, ReactionOutcome, RejectStage};
