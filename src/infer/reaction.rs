//! Reaction-level inference orchestration.
//!
//! One reaction moves through `Skip-checked -> Counted -> Inputs -> Outputs
//! -> Catalysts -> Regulations -> Persisted`, with an abort to `Rejected` at
//! any stage. Inputs and outputs are mandatory at the reaction level but are
//! *not* repaired by ghost substitution: a single failed input or output
//! rejects the whole reaction. Every rejection is local to its reaction and
//! logged with its stage; the engine proceeds to the next reaction
//! unconditionally.

use std::collections::HashSet;
use std::fmt;

use tracing::{debug, info};

use crate::context::RunContext;
use crate::coverage::count_reaction;
use crate::entity::DbId;
use crate::error::{OrthoResult, StoreError};
use crate::event::{CatalystActivity, Event, EventCore, Reaction, Regulation, RegulationKind};
use crate::infer::entity::EntityInference;
use crate::report::RunReport;
use crate::species::SpeciesTag;
use crate::storage::OrthologyStore;

/// The stage at which a reaction was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectStage {
    /// On the manual skip list.
    SkipList,
    /// Flagged chimeric.
    Chimeric,
    /// Carries related-species annotations.
    RelatedSpecies,
    /// Already inferred manually by a curator.
    ManuallyInferred,
    /// Disease-associated.
    Disease,
    /// Referenced entities span more than one species.
    MultiSpecies,
    /// No leaf proteins at all.
    NoProteins,
    /// An input could not be inferred.
    Input,
    /// An output could not be inferred.
    Output,
    /// A catalyst physical entity could not be inferred.
    Catalyst,
    /// A Requirement-class regulator could not be inferred.
    Regulation,
}

impl fmt::Display for RejectStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::SkipList => "skip-list",
            Self::Chimeric => "chimeric",
            Self::RelatedSpecies => "related-species",
            Self::ManuallyInferred => "manually-inferred",
            Self::Disease => "disease",
            Self::MultiSpecies => "multi-species",
            Self::NoProteins => "no-proteins",
            Self::Input => "input",
            Self::Output => "output",
            Self::Catalyst => "catalyst",
            Self::Regulation => "regulation",
        };
        write!(f, "{s}")
    }
}

/// Result of processing one reaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReactionOutcome {
    /// The reaction was rejected at the given stage.
    Rejected(RejectStage),

    /// The reaction was inferred and persisted.
    Inferred {
        /// Source reaction id.
        source: DbId,
        /// Persisted inferred reaction id.
        inferred: DbId,
    },
}

/// Outcome of inferring one regulation edge. A failed Requirement regulator
/// is a distinguished marker, not the same "nothing there" as a droppable
/// regulator.
enum RegulationOutcome {
    Kept(Regulation),
    Dropped,
    AbortRequirement,
}

/// Reaction inference engine for one species run.
pub struct ReactionInference<'a> {
    store: &'a dyn OrthologyStore,
    ctx: &'a mut RunContext,
}

impl<'a> ReactionInference<'a> {
    /// Creates an engine over the given store and run context.
    pub fn new(store: &'a dyn OrthologyStore, ctx: &'a mut RunContext) -> Self {
        Self { store, ctx }
    }

    /// Processes one source reaction end to end.
    pub fn infer(
        &mut self,
        reaction_id: DbId,
        report: &mut RunReport,
    ) -> OrthoResult<ReactionOutcome> {
        let event = self
            .store
            .event(reaction_id)?
            .ok_or(StoreError::NotFound(reaction_id))?;
        let Event::Reaction(source) = event else {
            return Err(StoreError::ClassMismatch {
                id: reaction_id,
                expected: "Reaction",
                actual: "Pathway",
            }
            .into());
        };

        if let Some(stage) = self.skip_stage(&source)? {
            info!(reaction = %reaction_id, stage = %stage, "reaction ineligible");
            return Ok(ReactionOutcome::Rejected(stage));
        }

        let coverage = count_reaction(self.store, &self.ctx.homology, &source)?;
        if coverage.total == 0 {
            info!(reaction = %reaction_id, stage = %RejectStage::NoProteins, "reaction ineligible");
            return Ok(ReactionOutcome::Rejected(RejectStage::NoProteins));
        }
        report.record_eligible(reaction_id, &source.core.display_name);
        debug!(
            reaction = %reaction_id,
            total = coverage.total,
            inferrable = coverage.inferrable,
            max_fanout = coverage.max_fanout,
            "reaction counted"
        );

        let Some(inputs) = self.infer_participants(&source.inputs)? else {
            info!(reaction = %reaction_id, stage = %RejectStage::Input, "reaction aborted");
            return Ok(ReactionOutcome::Rejected(RejectStage::Input));
        };
        let Some(outputs) = self.infer_participants(&source.outputs)? else {
            info!(reaction = %reaction_id, stage = %RejectStage::Output, "reaction aborted");
            return Ok(ReactionOutcome::Rejected(RejectStage::Output));
        };

        let mut catalysts = Vec::with_capacity(source.catalysts.len());
        for catalyst in &source.catalysts {
            match self.infer_catalyst(catalyst)? {
                Some(inferred) => catalysts.push(inferred),
                None => {
                    info!(reaction = %reaction_id, stage = %RejectStage::Catalyst, "reaction aborted");
                    return Ok(ReactionOutcome::Rejected(RejectStage::Catalyst));
                }
            }
        }

        let mut regulations = Vec::new();
        for regulation in &source.regulations {
            match self.infer_regulation(regulation)? {
                RegulationOutcome::Kept(r) => regulations.push(r),
                RegulationOutcome::Dropped => {
                    debug!(
                        reaction = %reaction_id,
                        regulator = %regulation.regulator,
                        "droppable regulation omitted"
                    );
                }
                RegulationOutcome::AbortRequirement => {
                    info!(reaction = %reaction_id, stage = %RejectStage::Regulation, "reaction aborted");
                    return Ok(ReactionOutcome::Rejected(RejectStage::Regulation));
                }
            }
        }

        let inferred = self.persist(&source, inputs, outputs, catalysts, regulations)?;
        report.record_inferred(reaction_id, &source.core.display_name);
        self.ctx.event_counterparts.insert(reaction_id, inferred);
        info!(reaction = %reaction_id, inferred = %inferred, "reaction inferred");
        Ok(ReactionOutcome::Inferred {
            source: reaction_id,
            inferred,
        })
    }

    /// Skip checks, in the curated order. Returns the first failing stage.
    fn skip_stage(&self, source: &Reaction) -> OrthoResult<Option<RejectStage>> {
        if self.ctx.skip_list.contains(&source.core.id) {
            return Ok(Some(RejectStage::SkipList));
        }
        if source.flags.chimeric {
            return Ok(Some(RejectStage::Chimeric));
        }
        if !source.flags.related_species.is_empty() {
            return Ok(Some(RejectStage::RelatedSpecies));
        }
        if source.flags.manually_inferred {
            return Ok(Some(RejectStage::ManuallyInferred));
        }
        if source.flags.disease {
            return Ok(Some(RejectStage::Disease));
        }
        if self.species_span(source)?.len() > 1 {
            return Ok(Some(RejectStage::MultiSpecies));
        }
        Ok(None)
    }

    /// Distinct species tags across all referenced entities, flattened
    /// through membership/component/unit edges.
    fn species_span(&self, source: &Reaction) -> OrthoResult<HashSet<SpeciesTag>> {
        let mut roots: Vec<DbId> = Vec::new();
        roots.extend_from_slice(&source.inputs);
        roots.extend_from_slice(&source.outputs);
        for catalyst in &source.catalysts {
            if let Some(entity) = catalyst.entity {
                roots.push(entity);
            }
            roots.extend_from_slice(&catalyst.active_units);
        }
        for regulation in &source.regulations {
            roots.push(regulation.regulator);
        }

        let mut tags = HashSet::new();
        let mut visited = HashSet::new();
        let mut stack = roots;
        while let Some(id) = stack.pop() {
            if !visited.insert(id) {
                continue;
            }
            // Regulators may reference events; those carry no entity subtree.
            let Some(entity) = self.store.entity(id)? else {
                continue;
            };
            if let Some(tag) = &entity.core().species {
                tags.insert(tag.clone());
            }
            stack.extend(entity.children());
        }
        Ok(tags)
    }

    /// Infers an input/output list. `None` aborts the reaction: no ghost
    /// substitution at the reaction level, unlike inside composites.
    fn infer_participants(&mut self, ids: &[DbId]) -> OrthoResult<Option<Vec<DbId>>> {
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            let mut engine = EntityInference::new(self.store, self.ctx);
            match engine.infer(*id, false)? {
                Some(inferred) => out.push(inferred),
                None => return Ok(None),
            }
        }
        Ok(Some(out))
    }

    /// Infers one catalyst activity. A failed physical entity aborts;
    /// failed active units are dropped from the collection.
    fn infer_catalyst(
        &mut self,
        source: &CatalystActivity,
    ) -> OrthoResult<Option<CatalystActivity>> {
        let entity = match source.entity {
            None => None,
            Some(id) => {
                let mut engine = EntityInference::new(self.store, self.ctx);
                match engine.infer(id, false)? {
                    Some(inferred) => Some(inferred),
                    None => return Ok(None),
                }
            }
        };

        let mut active_units = Vec::new();
        for unit in &source.active_units {
            let mut engine = EntityInference::new(self.store, self.ctx);
            if let Some(inferred) = engine.infer(*unit, false)? {
                if !active_units.contains(&inferred) {
                    active_units.push(inferred);
                }
            }
        }

        Ok(Some(CatalystActivity {
            activity: source.activity.clone(),
            entity,
            active_units,
        }))
    }

    fn infer_regulation(&mut self, source: &Regulation) -> OrthoResult<RegulationOutcome> {
        // Only physical-entity regulators can be inferred; an id that names
        // an event (or nothing) is uninferrable.
        let failed = |kind: RegulationKind| match kind {
            RegulationKind::Requirement => RegulationOutcome::AbortRequirement,
            RegulationKind::Positive | RegulationKind::Negative => RegulationOutcome::Dropped,
        };

        if self.store.entity(source.regulator)?.is_none() {
            return Ok(failed(source.kind));
        }

        let mut engine = EntityInference::new(self.store, self.ctx);
        match engine.infer(source.regulator, false)? {
            Some(inferred) => Ok(RegulationOutcome::Kept(Regulation {
                kind: source.kind,
                regulator: inferred,
            })),
            None => Ok(failed(source.kind)),
        }
    }

    fn persist(
        &mut self,
        source: &Reaction,
        inputs: Vec<DbId>,
        outputs: Vec<DbId>,
        catalysts: Vec<CatalystActivity>,
        regulations: Vec<Regulation>,
    ) -> OrthoResult<DbId> {
        let mut core = EventCore::new(source.core.name.clone());
        core.species = Some(self.ctx.target_species());
        core.stable_id = self.ctx.mint_stable_id(source.core.stable_id.as_ref());
        core.go_biological_process = source.core.go_biological_process.clone();
        core.release_date = source.core.release_date.clone();
        core.add_inferred_from(source.core.id);
        core.add_orthologous_event(source.core.id);

        let inferred = self.store.insert_event(Event::Reaction(Reaction {
            core,
            inputs,
            outputs,
            catalysts,
            regulations,
            flags: Default::default(),
        }))?;

        // Union the event-level link back onto the source.
        let mut src = self
            .store
            .event(source.core.id)?
            .ok_or(StoreError::NotFound(source.core.id))?;
        src.core_mut().add_orthologous_event(inferred);
        self.store.update_event(src)?;
        Ok(inferred)
    }
}
