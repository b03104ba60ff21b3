//! One end-to-end species run.
//!
//! Bootstraps the target species (config validation, reference-database
//! seeding, run context), drives the reaction pass over every curated source
//! reaction, projects the event hierarchy, and produces the run report.
//! Per-reaction failures never abort the run; only setup and store faults do.

use std::collections::HashSet;
use std::path::Path;

use tracing::info;

use crate::context::RunContext;
use crate::entity::DbId;
use crate::error::{OrthoResult, SetupError};
use crate::homology::HomologyIndex;
use crate::infer::{HierarchyProjector, ProjectionStats, ReactionInference, ReactionOutcome};
use crate::report::RunReport;
use crate::species::{ReferenceDatabaseConfig, SpeciesConfig, SpeciesTag};
use crate::storage::{OrthologyStore, ReferenceDatabase};

/// Everything a finished run hands back.
#[derive(Debug)]
pub struct RunOutcome {
    /// Eligible/inferred reaction lists.
    pub report: RunReport,

    /// Hierarchy projection counters.
    pub projection: ProjectionStats,
}

/// A bootstrapped species run, ready to execute.
pub struct SpeciesRun<'a> {
    store: &'a dyn OrthologyStore,
    ctx: RunContext,
}

impl std::fmt::Debug for SpeciesRun<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpeciesRun")
            .field("ctx", &self.ctx)
            .finish_non_exhaustive()
    }
}

impl<'a> SpeciesRun<'a> {
    /// Validates the target config, seeds its reference databases, and
    /// builds the run context.
    ///
    /// # Errors
    /// Fatal [`SetupError`]s for an invalid config or a missing reference
    /// database; the run must not start without them.
    pub fn bootstrap(
        store: &'a dyn OrthologyStore,
        source_species: SpeciesTag,
        target: SpeciesConfig,
        homology: HomologyIndex,
        skip_list: HashSet<DbId>,
    ) -> OrthoResult<Self> {
        target.validate()?;
        if target.reference_db.name.trim().is_empty() {
            return Err(SetupError::MissingReferenceDatabase {
                species: target.name.clone(),
            }
            .into());
        }

        let reference_db = ensure_reference_db(store, &target.reference_db)?;
        let alt_reference_db = target
            .alt_reference_db
            .as_ref()
            .map(|config| ensure_reference_db(store, config))
            .transpose()?;

        info!(
            target = %target.name,
            homologs = homology.len(),
            skip_list = skip_list.len(),
            "species run bootstrapped"
        );
        let ctx = RunContext::new(
            source_species,
            target,
            homology,
            skip_list,
            reference_db,
            alt_reference_db,
        );
        Ok(Self { store, ctx })
    }

    /// Runs the reaction pass over every curated source reaction, then the
    /// hierarchy projection.
    pub fn execute(mut self) -> OrthoResult<RunOutcome> {
        let reactions = self.store.reactions_by_species(&self.ctx.source_species)?;
        info!(reactions = reactions.len(), "reaction pass started");

        let mut report = RunReport::new();
        let mut inferred = 0u32;
        let mut rejected = 0u32;
        for id in reactions {
            let mut engine = ReactionInference::new(self.store, &mut self.ctx);
            match engine.infer(id, &mut report)? {
                ReactionOutcome::Inferred { .. } => inferred += 1,
                ReactionOutcome::Rejected(_) => rejected += 1,
            }
        }
        info!(inferred, rejected, "reaction pass finished");

        let projection = HierarchyProjector::new(self.store, &mut self.ctx).project()?;

        let summary = report.summary();
        info!(
            eligible = summary.eligible,
            inferred = summary.inferred,
            percent = summary.percent,
            "species run finished"
        );
        Ok(RunOutcome { report, projection })
    }
}

/// Loads the homology tables for a target, runs it end to end, and writes
/// the report files into `output_dir`.
pub fn run_species(
    store: &dyn OrthologyStore,
    source_species: SpeciesTag,
    source_code: &str,
    target: SpeciesConfig,
    homology_dir: &Path,
    skip_list: HashSet<DbId>,
    output_dir: &Path,
) -> OrthoResult<RunOutcome> {
    let homology = HomologyIndex::load(homology_dir, source_code, &target.code)?;
    let target_code = target.code.clone();
    let run = SpeciesRun::bootstrap(store, source_species, target, homology, skip_list)?;
    let outcome = run.execute()?;
    outcome.report.write_files(output_dir, &target_code)?;
    Ok(outcome)
}

fn ensure_reference_db(
    store: &dyn OrthologyStore,
    config: &ReferenceDatabaseConfig,
) -> OrthoResult<DbId> {
    if let Some(id) = store.find_reference_db(&config.name)? {
        return Ok(id);
    }
    let id = store.insert_reference_db(ReferenceDatabase {
        id: DbId::UNSET,
        name: config.name.clone(),
        url: config.url.clone(),
        access_url: config.access_url.clone(),
    })?;
    info!(name = %config.name, id = %id, "reference database seeded");
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{EntityCore, PhysicalEntity, Protein};
    use crate::event::{Event, EventCore, Pathway, Reaction};
    use crate::identity::StableId;
    use crate::storage::InMemoryStore;

    fn mouse() -> SpeciesConfig {
        SpeciesConfig {
            name: "Mus musculus".to_string(),
            code: "mmus".to_string(),
            abbreviation: "MMU".to_string(),
            reference_db: ReferenceDatabaseConfig {
                name: "ENSEMBL".to_string(),
                url: "https://www.ensembl.org".to_string(),
                access_url: "https://www.ensembl.org/id/###ID###".to_string(),
            },
            alt_reference_db: None,
        }
    }

    fn human_protein(store: &InMemoryStore, name: &str, accession: &str) -> DbId {
        let mut core = EntityCore::new(name);
        core.species = Some(SpeciesTag::new("Homo sapiens"));
        core.stable_id = Some(StableId::new("HSA", "100"));
        store
            .insert_entity(PhysicalEntity::Protein(Protein {
                core,
                accession: accession.to_string(),
                reference_db: None,
                gene_ids: Vec::new(),
                modifications: Vec::new(),
                start: None,
                end: None,
            }))
            .unwrap()
    }

    fn reaction(store: &InMemoryStore, name: &str, inputs: Vec<DbId>, outputs: Vec<DbId>) -> DbId {
        let mut core = EventCore::new(name);
        core.species = Some(SpeciesTag::new("Homo sapiens"));
        core.stable_id = Some(StableId::new("HSA", "5000"));
        store
            .insert_event(Event::Reaction(Reaction {
                core,
                inputs,
                outputs,
                catalysts: Vec::new(),
                regulations: Vec::new(),
                flags: Default::default(),
            }))
            .unwrap()
    }

    #[test]
    fn bootstrap_rejects_missing_reference_database() {
        let store = InMemoryStore::new();
        let mut config = mouse();
        config.reference_db.name = String::new();

        let err = SpeciesRun::bootstrap(
            &store,
            SpeciesTag::new("Homo sapiens"),
            config,
            HomologyIndex::from_records::<_, &str>([]),
            HashSet::new(),
        )
        .unwrap_err();
        assert!(err.is_setup());
        assert!(format!("{err}").contains("Mus musculus"));
    }

    #[test]
    fn bootstrap_reuses_existing_reference_database() {
        let store = InMemoryStore::new();
        let bootstrap = || {
            SpeciesRun::bootstrap(
                &store,
                SpeciesTag::new("Homo sapiens"),
                mouse(),
                HomologyIndex::from_records::<_, &str>([]),
                HashSet::new(),
            )
            .unwrap()
        };
        let first = bootstrap().ctx.reference_db;
        let second = bootstrap().ctx.reference_db;
        assert_eq!(first, second);
    }

    #[test]
    fn execute_infers_covered_reactions_and_projects_hierarchy() {
        let store = InMemoryStore::new();
        let a = human_protein(&store, "A", "P1");
        let b = human_protein(&store, "B", "P2");
        let orphan = human_protein(&store, "C", "P9");
        let good = reaction(&store, "covered", vec![a], vec![b]);
        let bad = reaction(&store, "uncovered output", vec![a], vec![orphan]);
        let parent = store
            .insert_event(Event::Pathway(Pathway {
                core: {
                    let mut core = EventCore::new("parent");
                    core.species = Some(SpeciesTag::new("Homo sapiens"));
                    core
                },
                has_event: vec![good, bad],
            }))
            .unwrap();

        let homology = HomologyIndex::from_records([("P1", vec!["T1"]), ("P2", vec!["T2"])]);
        let run = SpeciesRun::bootstrap(
            &store,
            SpeciesTag::new("Homo sapiens"),
            mouse(),
            homology,
            HashSet::new(),
        )
        .unwrap();
        let outcome = run.execute().unwrap();

        let summary = outcome.report.summary();
        assert_eq!(summary.eligible, 2);
        assert_eq!(summary.inferred, 1);
        assert_eq!(summary.percent, 50);
        assert!(outcome.report.is_inferred(good));
        assert!(outcome.report.is_eligible(bad));
        assert!(!outcome.report.is_inferred(bad));

        // The parent pathway gained a mouse counterpart holding the one
        // inferred reaction.
        assert_eq!(outcome.projection.pathways_created, 1);
        let counterpart = store
            .event(parent)
            .unwrap()
            .unwrap()
            .core()
            .orthologous_event[0];
        let Event::Pathway(p) = store.event(counterpart).unwrap().unwrap() else {
            panic!("expected pathway counterpart");
        };
        assert_eq!(p.core.species, Some(SpeciesTag::new("Mus musculus")));
        assert_eq!(p.has_event.len(), 1);
    }

    #[test]
    fn skip_listed_reaction_is_never_counted() {
        let store = InMemoryStore::new();
        let a = human_protein(&store, "A", "P1");
        let b = human_protein(&store, "B", "P2");
        let skipped = reaction(&store, "skipped", vec![a], vec![b]);

        let homology = HomologyIndex::from_records([("P1", vec!["T1"]), ("P2", vec!["T2"])]);
        let run = SpeciesRun::bootstrap(
            &store,
            SpeciesTag::new("Homo sapiens"),
            mouse(),
            homology,
            HashSet::from([skipped]),
        )
        .unwrap();
        let outcome = run.execute().unwrap();
        assert_eq!(outcome.report.summary().eligible, 0);
    }
}
