//! Per-run inference context.
//!
//! The legacy implementation this engine replaces kept its memoization in
//! global statics keyed by raw object identity. Here all of it lives in one
//! explicit context that is threaded through the recursive calls and
//! discarded at the end of each species run: the identity cache (exact
//! source-instance reuse), the signature cache (content-based reuse), the
//! paralog counter, the event-counterpart map, and the read-only homology
//! index. Nothing is shared across species runs.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};

use crate::entity::DbId;
use crate::homology::HomologyIndex;
use crate::identity::{Signature, StableId, StableIdGenerator};
use crate::species::{SpeciesConfig, SpeciesTag};

/// Mutable per-run state for one target species.
#[derive(Debug)]
pub struct RunContext {
    /// Species of the curated source events.
    pub source_species: SpeciesTag,

    /// Target species bootstrap record.
    pub target: SpeciesConfig,

    /// Homolog and gene cross-reference lookups.
    pub homology: HomologyIndex,

    /// Reactions excluded by manual curation decision.
    pub skip_list: HashSet<DbId>,

    /// Reference database seeded for this run's inferred proteins.
    pub reference_db: DbId,

    /// Optional alternate reference database.
    pub alt_reference_db: Option<DbId>,

    /// Timestamp applied by the exactly-once modified stamp.
    pub run_stamp: DateTime<Utc>,

    /// Source event id -> inferred counterpart id, filled by the reaction
    /// pass and the hierarchy projector.
    pub event_counterparts: HashMap<DbId, DbId>,

    identity_cache: HashMap<DbId, DbId>,
    signature_cache: HashMap<Signature, DbId>,
    stable_ids: StableIdGenerator,
}

impl RunContext {
    /// Creates a fresh context for one species run.
    #[must_use]
    pub fn new(
        source_species: SpeciesTag,
        target: SpeciesConfig,
        homology: HomologyIndex,
        skip_list: HashSet<DbId>,
        reference_db: DbId,
        alt_reference_db: Option<DbId>,
    ) -> Self {
        Self {
            source_species,
            target,
            homology,
            skip_list,
            reference_db,
            alt_reference_db,
            run_stamp: Utc::now(),
            event_counterparts: HashMap::new(),
            identity_cache: HashMap::new(),
            signature_cache: HashMap::new(),
            stable_ids: StableIdGenerator::new(),
        }
    }

    /// Species tag stamped onto inferred instances.
    #[must_use]
    pub fn target_species(&self) -> SpeciesTag {
        self.target.tag()
    }

    /// Inferred instance previously produced for this exact source instance.
    #[must_use]
    pub fn cached(&self, source: DbId) -> Option<DbId> {
        self.identity_cache.get(&source).copied()
    }

    /// Records the inferred counterpart of a source instance.
    pub fn remember(&mut self, source: DbId, inferred: DbId) {
        self.identity_cache.insert(source, inferred);
    }

    /// Persisted instance previously produced for this structural signature.
    #[must_use]
    pub fn cached_signature(&self, signature: Signature) -> Option<DbId> {
        self.signature_cache.get(&signature).copied()
    }

    /// Records the persisted instance for a structural signature.
    pub fn remember_signature(&mut self, signature: Signature, id: DbId) {
        self.signature_cache.entry(signature).or_insert(id);
    }

    /// Mints the target-species stable id for a source stable id, counting
    /// paralogs. `None` when the source has no stable id.
    pub fn mint_stable_id(&mut self, source: Option<&StableId>) -> Option<StableId> {
        source.map(|id| self.stable_ids.mint(id, &self.target.abbreviation))
    }
}
