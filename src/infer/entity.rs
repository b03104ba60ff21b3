//! Recursive entity inference.
//!
//! `infer(entity, required)` rebuilds one physical entity in the target
//! species, dispatching over the variant union. `required = false` means a
//! failed inference is acceptable and answered with `None`; `required =
//! true` is used only for mandatory sub-parts of a structure that already
//! passed its own eligibility gate, and substitutes a ghost placeholder so
//! the parent can still be assembled. With `required = true` the call always
//! produces an instance.
//!
//! Successful inferences are memoized in the run context's identity cache.
//! Ghosts are deliberately *not* identity-cached: a ghost is a stand-in for
//! a failure, and the same source entity must still answer `None` when a
//! later caller asks without `required`. Ghosts are deduplicated through the
//! signature cache instead.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;
use tracing::{debug, info};

use crate::context::RunContext;
use crate::coverage::count_entity;
use crate::entity::{
    CandidateSet, Complex, DbId, DefinedSet, EntityCore, Ghost, ModifiedResidue, PhysicalEntity,
    Polymer, Protein,
};
use crate::error::{OrthoResult, StoreError};
use crate::identity::entity_signature;
use crate::storage::OrthologyStore;

static UNIPROT_RE: OnceLock<Regex> = OnceLock::new();

fn uniprot_re() -> &'static Regex {
    UNIPROT_RE.get_or_init(|| {
        Regex::new(r"^[A-NR-Z][0-9][A-Z][A-Z0-9]{2}[0-9](-[0-9]+)?$|^[OPQ][0-9][A-Z0-9]{3}[0-9](-[0-9]+)?$")
            .expect("uniprot regex is valid")
    })
}

/// Recursive entity inference engine for one species run.
pub struct EntityInference<'a> {
    store: &'a dyn OrthologyStore,
    ctx: &'a mut RunContext,
}

impl<'a> EntityInference<'a> {
    /// Creates an engine over the given store and run context.
    pub fn new(store: &'a dyn OrthologyStore, ctx: &'a mut RunContext) -> Self {
        Self { store, ctx }
    }

    /// Infers the target-species counterpart of `source`.
    ///
    /// Returns `Ok(None)` only when `required` is false and the entity (or
    /// its eligibility gate) cannot be satisfied. With `required = true` the
    /// result is always `Some`, degrading to a ghost where necessary.
    pub fn infer(&mut self, source: DbId, required: bool) -> OrthoResult<Option<DbId>> {
        if let Some(hit) = self.ctx.cached(source) {
            debug!(source = %source, inferred = %hit, "identity cache hit");
            return Ok(Some(hit));
        }

        let entity = self
            .store
            .entity(source)?
            .ok_or(StoreError::NotFound(source))?;

        // Species-agnostic subtrees are referenced as-is, never copied.
        if !self.subtree_has_species(&entity)? {
            self.ctx.remember(source, source);
            return Ok(Some(source));
        }

        match &entity {
            PhysicalEntity::Protein(p) => self.infer_protein(p, required),
            PhysicalEntity::Complex(_) | PhysicalEntity::Polymer(_) => {
                self.infer_composite(&entity, required)
            }
            PhysicalEntity::DefinedSet(s) => self.infer_defined_set(s, required),
            PhysicalEntity::CandidateSet(s) => self.infer_candidate_set(s, required),
            // Chemicals carry no species concept; a tagged one is still
            // referenced as-is.
            PhysicalEntity::SimpleEntity(_) => {
                self.ctx.remember(source, source);
                Ok(Some(source))
            }
            // Species-bearing but not sequence-accessioned: no homology
            // evidence can ever apply.
            PhysicalEntity::Ghost(_) | PhysicalEntity::Other(_) => {
                if required {
                    Ok(Some(self.ghost_for(entity.core())?))
                } else {
                    Ok(None)
                }
            }
        }
    }

    fn subtree_has_species(&self, entity: &PhysicalEntity) -> OrthoResult<bool> {
        let mut visited: HashSet<DbId> = HashSet::new();
        self.subtree_has_species_inner(entity, &mut visited)
    }

    // Visited ids are skipped so a cyclic snapshot cannot recurse forever.
    fn subtree_has_species_inner(
        &self,
        entity: &PhysicalEntity,
        visited: &mut HashSet<DbId>,
    ) -> OrthoResult<bool> {
        if entity.core().species.is_some() {
            return Ok(true);
        }
        for child in entity.children() {
            if !visited.insert(child) {
                continue;
            }
            let child_entity = self
                .store
                .entity(child)?
                .ok_or(StoreError::NotFound(child))?;
            if self.subtree_has_species_inner(&child_entity, visited)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn infer_protein(&mut self, source: &Protein, required: bool) -> OrthoResult<Option<DbId>> {
        let homologs: Vec<String> = self
            .ctx
            .homology
            .homologs(&source.accession)
            .to_vec();

        match homologs.len() {
            0 => {
                if required {
                    Ok(Some(self.ghost_for(&source.core)?))
                } else {
                    debug!(accession = %source.accession, "no homolog, protein not inferred");
                    Ok(None)
                }
            }
            1 => {
                let inferred = self.orthologous_protein(source, &homologs[0])?;
                self.ctx.remember(source.core.id, inferred);
                Ok(Some(inferred))
            }
            _ => {
                // Paralog expansion: one inferred protein per homolog,
                // wrapped in a synthetic defined set.
                let mut members = Vec::with_capacity(homologs.len());
                for accession in &homologs {
                    let member = self.orthologous_protein(source, accession)?;
                    if !members.contains(&member) {
                        members.push(member);
                    }
                }

                let mut core = EntityCore::new(source.core.name.clone());
                core.species = Some(self.ctx.target_species());
                core.compartment = source.core.compartment;
                core.display_name =
                    self.rendered_display_name(&core.name, core.compartment)?;
                let set = PhysicalEntity::DefinedSet(DefinedSet { core, members });
                let inferred = self.persist_inferred(set, &source.core)?;
                self.ctx.remember(source.core.id, inferred);
                Ok(Some(inferred))
            }
        }
    }

    /// Builds and persists one inferred protein against a homolog accession.
    ///
    /// Residue modifications are re-derived: catalog names survive, source
    /// sequence coordinates do not. A modification catalog name containing
    /// "phospho" rewrites the protein name with a `phospho-` prefix.
    fn orthologous_protein(&mut self, source: &Protein, accession: &str) -> OrthoResult<DbId> {
        let modifications: Vec<ModifiedResidue> = source
            .modifications
            .iter()
            .map(|m| ModifiedResidue {
                coordinate: None,
                psi_mod: m.psi_mod.clone(),
            })
            .collect();

        let mut name = source.core.name.clone();
        let has_phospho = modifications
            .iter()
            .any(|m| m.psi_mod.to_ascii_lowercase().contains("phospho"));
        if has_phospho && !name.starts_with("phospho") {
            name = format!("phospho-{name}");
        }

        let reference_db = if uniprot_re().is_match(accession) {
            self.ctx.alt_reference_db.unwrap_or(self.ctx.reference_db)
        } else {
            self.ctx.reference_db
        };

        let mut core = EntityCore::new(name);
        core.species = Some(self.ctx.target_species());
        core.compartment = source.core.compartment;
        core.display_name = self.rendered_display_name(&core.name, core.compartment)?;

        let gene_ids = self.ctx.homology.genes_for(accession).to_vec();
        let protein = PhysicalEntity::Protein(Protein {
            core,
            accession: accession.to_string(),
            reference_db: Some(reference_db),
            gene_ids,
            modifications,
            start: None,
            end: None,
        });
        self.persist_inferred(protein, &source.core)
    }

    fn infer_composite(
        &mut self,
        source: &PhysicalEntity,
        required: bool,
    ) -> OrthoResult<Option<DbId>> {
        let source_id = source.id();
        if !required {
            let coverage = count_entity(self.store, &self.ctx.homology, source_id)?;
            if !coverage.passes_threshold() {
                info!(
                    source = %source_id,
                    class = source.class_name(),
                    total = coverage.total,
                    inferrable = coverage.inferrable,
                    "composite below coverage threshold"
                );
                return Ok(None);
            }
        }

        // Children are mandatory parts of a composite: they degrade to
        // ghosts rather than abort individually.
        let (children, rebuild): (Vec<DbId>, fn(EntityCore, Vec<DbId>) -> PhysicalEntity) =
            match source {
                PhysicalEntity::Complex(c) => (c.components.clone(), |core, components| {
                    PhysicalEntity::Complex(Complex { core, components })
                }),
                PhysicalEntity::Polymer(p) => (p.repeated_unit.clone(), |core, repeated_unit| {
                    PhysicalEntity::Polymer(Polymer { core, repeated_unit })
                }),
                _ => unreachable!("infer_composite is only called for Complex/Polymer"),
            };

        let mut inferred_children = Vec::with_capacity(children.len());
        for child in children {
            let inferred = self.infer(child, true)?.ok_or_else(|| {
                StoreError::Backend("required inference returned no instance".to_string())
            })?;
            inferred_children.push(inferred);
        }

        let source_core = source.core();
        let mut core = EntityCore::new(source_core.name.clone());
        core.species = Some(self.ctx.target_species());
        core.compartment = source_core.compartment;
        core.display_name = self.rendered_display_name(&core.name, core.compartment)?;

        let inferred = self.persist_inferred(rebuild(core, inferred_children), source_core)?;
        self.ctx.remember(source_id, inferred);
        Ok(Some(inferred))
    }

    fn infer_defined_set(&mut self, source: &DefinedSet, required: bool) -> OrthoResult<Option<DbId>> {
        if !required && !self.set_passes_gate(&source.core)? {
            return Ok(None);
        }

        let mut seen_names: Vec<String> = Vec::new();
        let members = self.infer_optional_children(&source.members, &mut seen_names)?;
        match members.len() {
            0 => {
                if required {
                    Ok(Some(self.ghost_for(&source.core)?))
                } else {
                    Ok(None)
                }
            }
            // A set with a single surviving member collapses to that member,
            // never to a one-element set.
            1 => {
                let member = members[0];
                self.ctx.remember(source.core.id, member);
                if !self.is_passthrough(member) {
                    self.link_provenance(member, &source.core)?;
                }
                Ok(Some(member))
            }
            _ => {
                let set = self.build_set(&source.core, members)?;
                let inferred = self.persist_inferred(set, &source.core)?;
                self.ctx.remember(source.core.id, inferred);
                Ok(Some(inferred))
            }
        }
    }

    fn infer_candidate_set(
        &mut self,
        source: &CandidateSet,
        required: bool,
    ) -> OrthoResult<Option<DbId>> {
        if !required && !self.set_passes_gate(&source.core)? {
            return Ok(None);
        }

        // One name pool across both lists: a member must not duplicate a
        // candidate's derived display name within the same set.
        let mut seen_names: Vec<String> = Vec::new();
        let candidates = self.infer_optional_children(&source.candidates, &mut seen_names)?;
        let members = self.infer_optional_children(&source.members, &mut seen_names)?;

        if !candidates.is_empty() {
            let mut core = self.inferred_core(&source.core)?;
            core.display_name = self.rendered_display_name(&core.name, core.compartment)?;
            let set = PhysicalEntity::CandidateSet(CandidateSet {
                core,
                candidates,
                members,
            });
            let inferred = self.persist_inferred(set, &source.core)?;
            self.ctx.remember(source.core.id, inferred);
            return Ok(Some(inferred));
        }

        // No candidate survived; fall back to the confirmed members.
        match members.len() {
            0 => {
                if required {
                    Ok(Some(self.ghost_for(&source.core)?))
                } else {
                    Ok(None)
                }
            }
            1 => {
                let member = members[0];
                self.ctx.remember(source.core.id, member);
                if !self.is_passthrough(member) {
                    self.link_provenance(member, &source.core)?;
                }
                Ok(Some(member))
            }
            _ => {
                let set = self.build_set(&source.core, members)?;
                let inferred = self.persist_inferred(set, &source.core)?;
                self.ctx.remember(source.core.id, inferred);
                Ok(Some(inferred))
            }
        }
    }

    fn set_passes_gate(&mut self, core: &EntityCore) -> OrthoResult<bool> {
        let coverage = count_entity(self.store, &self.ctx.homology, core.id)?;
        if coverage.passes_threshold() {
            Ok(true)
        } else {
            info!(
                source = %core.id,
                total = coverage.total,
                inferrable = coverage.inferrable,
                "set below coverage threshold"
            );
            Ok(false)
        }
    }

    /// Infers a member/candidate list with `required = false`, dropping
    /// failures and deduplicating by derived display name against the
    /// caller's name pool (first wins).
    fn infer_optional_children(
        &mut self,
        ids: &[DbId],
        seen_names: &mut Vec<String>,
    ) -> OrthoResult<Vec<DbId>> {
        let mut out: Vec<DbId> = Vec::new();
        for id in ids {
            let Some(inferred) = self.infer(*id, false)? else {
                continue;
            };
            let display = self
                .store
                .entity(inferred)?
                .ok_or(StoreError::NotFound(inferred))?
                .core()
                .display_name
                .clone();
            if seen_names.contains(&display) {
                continue;
            }
            seen_names.push(display);
            if !out.contains(&inferred) {
                out.push(inferred);
            }
        }
        Ok(out)
    }

    fn inferred_core(&mut self, source: &EntityCore) -> OrthoResult<EntityCore> {
        let mut core = EntityCore::new(source.name.clone());
        core.species = Some(self.ctx.target_species());
        core.compartment = source.compartment;
        Ok(core)
    }

    fn build_set(&mut self, source: &EntityCore, members: Vec<DbId>) -> OrthoResult<PhysicalEntity> {
        let mut core = self.inferred_core(source)?;
        core.display_name = self.rendered_display_name(&core.name, core.compartment)?;
        Ok(PhysicalEntity::DefinedSet(DefinedSet { core, members }))
    }

    /// Creates (or reuses) the ghost placeholder for a source entity.
    fn ghost_for(&mut self, source: &EntityCore) -> OrthoResult<DbId> {
        let mut core = self.inferred_core(source)?;
        core.display_name = self.rendered_display_name(&core.name, core.compartment)?;
        let ghost = PhysicalEntity::Ghost(Ghost { core });
        debug!(source = %source.id, "substituting ghost placeholder");
        self.persist_inferred(ghost, source)
    }

    /// Deduplicates, persists, and provenance-links one inferred entity.
    ///
    /// Structurally identical instances already in the store (or produced
    /// earlier in this run via a different path) win over fresh ones; stable
    /// ids are only minted when an insert actually happens, so paralog
    /// counters never advance for deduplicated results.
    fn persist_inferred(
        &mut self,
        mut entity: PhysicalEntity,
        source: &EntityCore,
    ) -> OrthoResult<DbId> {
        let signature = entity_signature(&entity);
        let existing = match self.ctx.cached_signature(signature) {
            Some(id) => Some(id),
            None => self.store.find_identical_entity(signature)?,
        };

        let id = match existing {
            Some(id) => {
                debug!(signature = %signature, inferred = %id, "reusing identical instance");
                id
            }
            None => {
                entity.core_mut().stable_id = self.ctx.mint_stable_id(source.stable_id.as_ref());
                self.store.insert_entity(entity)?
            }
        };

        self.ctx.remember_signature(signature, id);
        self.link_provenance(id, source)?;
        Ok(id)
    }

    /// True when an id was answered by referencing the curated instance
    /// itself (species-agnostic passthrough). Such instances carry no
    /// inference provenance.
    fn is_passthrough(&self, id: DbId) -> bool {
        self.ctx.cached(id) == Some(id)
    }

    /// Unions the bidirectional provenance links between a source entity and
    /// an inferred instance. Additive and value-deduplicated on both sides.
    fn link_provenance(&mut self, inferred: DbId, source: &EntityCore) -> OrthoResult<()> {
        if inferred == source.id {
            return Ok(());
        }

        let mut stored = self
            .store
            .entity(inferred)?
            .ok_or(StoreError::NotFound(inferred))?;
        stored.core_mut().add_inferred_from(source.id);
        self.store.update_entity(stored)?;

        let mut src = self
            .store
            .entity(source.id)?
            .ok_or(StoreError::NotFound(source.id))?;
        src.core_mut().add_inferred_to(inferred);
        self.store.update_entity(src)?;
        Ok(())
    }

    fn rendered_display_name(
        &self,
        name: &str,
        compartment: Option<DbId>,
    ) -> OrthoResult<String> {
        match compartment {
            None => Ok(name.to_string()),
            Some(id) => match self.store.compartment_name(id)? {
                Some(comp) => Ok(format!("{name} [{comp}]")),
                None => Ok(name.to_string()),
            },
        }
    }
}
