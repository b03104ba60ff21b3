//! # orthoinfer - Orthology-based event projection
//!
//! `orthoinfer` projects manually curated biochemical reactions and pathways
//! from a source species onto target species, using protein homology
//! mappings as evidence. The curated source data stays read-only apart from
//! provenance links; each target species gets newly persisted counterpart
//! instances.
//!
//! ## Core Concepts
//!
//! - **Physical entity**: a protein, complex, polymer, set, or small
//!   molecule participating in reactions
//! - **Homology index**: source-protein to target-protein mappings, plus
//!   gene cross-references, loaded from tab-delimited files
//! - **Coverage**: the fraction of a subtree's leaf proteins with homology
//!   evidence; the 75% threshold gates composite and set inference
//! - **Run context**: per-species memoization (identity cache, structural
//!   signature cache, paralog counters, event counterparts)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use orthoinfer::run::SpeciesRun;
//! use orthoinfer::species::{SpeciesConfig, SpeciesTag};
//!
//! let config = SpeciesConfig::load(Path::new("config/mmus.json"))?;
//! let run = SpeciesRun::bootstrap(
//!     &store,
//!     SpeciesTag::new("Homo sapiens"),
//!     config,
//!     homology,
//!     skip_list,
//! )?;
//! let outcome = run.execute()?;
//! outcome.report.write_files(Path::new("reports"), "mmus")?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Schema types
pub mod entity;
pub mod error;
pub mod event;
pub mod identity;
pub mod species;

// Evidence and run state
pub mod context;
pub mod coverage;
pub mod homology;

// Inference passes, storage, and reporting
pub mod infer;
pub mod report;
pub mod run;
pub mod storage;

// Re-export primary types at crate root for convenience
pub use context::RunContext;
pub use coverage::Coverage;
pub use entity::{DbId, PhysicalEntity};
pub use error::{OrthoError, OrthoResult, ReportError, SetupError, StoreError};
pub use event::Event;
pub use homology::HomologyIndex;
pub use identity::{entity_signature, Signature, StableId};
pub use infer::{
    EntityInference, HierarchyProjector, ProjectionStats, ReactionInference, ReactionOutcome,
    RejectStage,
};
pub use report::{RunReport, RunSummary};
pub use run::{run_species, RunOutcome, SpeciesRun};
pub use species::{SpeciesConfig, SpeciesTag};
pub use storage::{InMemoryStore, OrthologyStore, ReferenceDatabase, StoreDump};
