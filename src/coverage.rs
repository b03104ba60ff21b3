//! Protein coverage counting.
//!
//! Flattens a reaction or entity subtree to its leaf proteins and reports
//! how many of them have homology evidence. The resulting [`Coverage`] gates
//! eligibility: composites and sets require at least 75% inferrable leaves,
//! reactions require a non-zero total.
//!
//! One deliberate quirk is preserved from the legacy behavior: a candidate
//! set with no confirmed members contributes its candidates' protein count,
//! but the whole contribution is folded to zero inferrable as soon as any
//! candidate lacks coverage. A candidate set is only inferrable when it is
//! homogeneously inferrable, never partially. Downstream report numbers are
//! calibrated against this rule; do not "fix" it.

use std::collections::HashSet;

use crate::entity::{DbId, PhysicalEntity};
use crate::error::StoreError;
use crate::event::Reaction;
use crate::homology::HomologyIndex;
use crate::storage::OrthologyStore;

/// Leaf-protein coverage of a subtree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Coverage {
    /// Distinct leaf-protein occurrences.
    pub total: u32,

    /// Leaf proteins with at least one homolog.
    pub inferrable: u32,

    /// Largest homolog fan-out seen on any single leaf.
    pub max_fanout: u32,
}

impl Coverage {
    /// The empty coverage.
    #[must_use]
    pub const fn zero() -> Self {
        Self {
            total: 0,
            inferrable: 0,
            max_fanout: 0,
        }
    }

    /// Accumulates another subtree's coverage into this one.
    pub fn absorb(&mut self, other: Self) {
        self.total += other.total;
        self.inferrable += other.inferrable;
        self.max_fanout = self.max_fanout.max(other.max_fanout);
    }

    /// Truncating integer percentage of inferrable leaves. Zero when the
    /// subtree contains no proteins at all.
    #[must_use]
    pub const fn percent_inferrable(&self) -> u32 {
        if self.total == 0 {
            0
        } else {
            self.inferrable * 100 / self.total
        }
    }

    /// The composite/set eligibility gate: at least 75% of leaves
    /// inferrable, and not all-uninferrable.
    #[must_use]
    pub const fn passes_threshold(&self) -> bool {
        if self.total == 0 {
            // No protein leaves means nothing to gate on.
            return true;
        }
        self.inferrable > 0 && self.percent_inferrable() >= 75
    }
}

/// Counts leaf proteins across a whole reaction: inputs, outputs, and
/// catalyst physical entities.
pub fn count_reaction(
    store: &dyn OrthologyStore,
    homology: &HomologyIndex,
    reaction: &Reaction,
) -> Result<Coverage, StoreError> {
    let mut coverage = Coverage::zero();
    let mut participants: Vec<DbId> = Vec::new();
    participants.extend_from_slice(&reaction.inputs);
    participants.extend_from_slice(&reaction.outputs);
    for catalyst in &reaction.catalysts {
        if let Some(entity) = catalyst.entity {
            participants.push(entity);
        }
    }
    participants.sort_unstable();

    for id in participants {
        coverage.absorb(count_entity(store, homology, id)?);
    }
    Ok(coverage)
}

/// Counts leaf proteins in one entity subtree.
pub fn count_entity(
    store: &dyn OrthologyStore,
    homology: &HomologyIndex,
    id: DbId,
) -> Result<Coverage, StoreError> {
    count_entity_guarded(store, homology, id, &mut HashSet::new())
}

/// An id already on the recursion path contributes nothing: a cyclic
/// snapshot must not overflow the stack, while a repeated sibling still
/// counts once per occurrence.
fn count_entity_guarded(
    store: &dyn OrthologyStore,
    homology: &HomologyIndex,
    id: DbId,
    active: &mut HashSet<DbId>,
) -> Result<Coverage, StoreError> {
    if !active.insert(id) {
        return Ok(Coverage::zero());
    }
    let entity = store.entity(id)?.ok_or(StoreError::NotFound(id))?;
    let coverage = count_entity_inner(store, homology, &entity, active)?;
    active.remove(&id);
    Ok(coverage)
}

fn count_children(
    store: &dyn OrthologyStore,
    homology: &HomologyIndex,
    children: &[DbId],
    active: &mut HashSet<DbId>,
) -> Result<Coverage, StoreError> {
    let mut ids = children.to_vec();
    ids.sort_unstable();
    let mut coverage = Coverage::zero();
    for child in ids {
        coverage.absorb(count_entity_guarded(store, homology, child, active)?);
    }
    Ok(coverage)
}

fn count_entity_inner(
    store: &dyn OrthologyStore,
    homology: &HomologyIndex,
    entity: &PhysicalEntity,
    active: &mut HashSet<DbId>,
) -> Result<Coverage, StoreError> {
    match entity {
        PhysicalEntity::Protein(p) => {
            #[allow(clippy::cast_possible_truncation)]
            let fanout = homology.homolog_count(&p.accession) as u32;
            Ok(Coverage {
                total: 1,
                inferrable: u32::from(fanout > 0),
                max_fanout: fanout,
            })
        }
        PhysicalEntity::Complex(c) => count_children(store, homology, &c.components, active),
        PhysicalEntity::Polymer(p) => count_children(store, homology, &p.repeated_unit, active),
        PhysicalEntity::DefinedSet(s) => count_children(store, homology, &s.members, active),
        PhysicalEntity::CandidateSet(s) => {
            if !s.members.is_empty() {
                return count_children(store, homology, &s.members, active);
            }

            // All-or-nothing candidate rule (see module docs).
            let mut ids = s.candidates.clone();
            ids.sort_unstable();
            let mut coverage = Coverage::zero();
            let mut homogeneous = true;
            for candidate in ids {
                let c = count_entity_guarded(store, homology, candidate, active)?;
                if c.total > 0 && c.inferrable == 0 {
                    homogeneous = false;
                }
                coverage.absorb(c);
            }
            if !homogeneous {
                coverage.inferrable = 0;
            }
            Ok(coverage)
        }
        PhysicalEntity::SimpleEntity(_) | PhysicalEntity::Ghost(_) | PhysicalEntity::Other(_) => {
            Ok(Coverage::zero())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{
        CandidateSet, Complex, DefinedSet, EntityCore, Protein, SimpleEntity,
    };
    use crate::event::EventCore;
    use crate::storage::InMemoryStore;

    fn protein(store: &InMemoryStore, name: &str, accession: &str) -> DbId {
        store
            .insert_entity(PhysicalEntity::Protein(Protein {
                core: EntityCore::new(name),
                accession: accession.to_string(),
                reference_db: None,
                gene_ids: Vec::new(),
                modifications: Vec::new(),
                start: None,
                end: None,
            }))
            .unwrap()
    }

    fn index() -> HomologyIndex {
        HomologyIndex::from_records([
            ("P1", vec!["T1a", "T1b"]),
            ("P2", vec!["T2"]),
            // P3 has no homologs
        ])
    }

    #[test]
    fn single_protein_counts() {
        let store = InMemoryStore::new();
        let homology = index();
        let covered = protein(&store, "A", "P1");
        let uncovered = protein(&store, "B", "P3");

        let c = count_entity(&store, &homology, covered).unwrap();
        assert_eq!(c, Coverage { total: 1, inferrable: 1, max_fanout: 2 });

        let u = count_entity(&store, &homology, uncovered).unwrap();
        assert_eq!(u, Coverage { total: 1, inferrable: 0, max_fanout: 0 });
    }

    #[test]
    fn complex_sums_components() {
        let store = InMemoryStore::new();
        let homology = index();
        let a = protein(&store, "A", "P1");
        let b = protein(&store, "B", "P2");
        let c = protein(&store, "C", "P3");
        let cplx = store
            .insert_entity(PhysicalEntity::Complex(Complex {
                core: EntityCore::new("ABC"),
                components: vec![a, b, c],
            }))
            .unwrap();

        let cov = count_entity(&store, &homology, cplx).unwrap();
        assert_eq!(cov, Coverage { total: 3, inferrable: 2, max_fanout: 2 });
        assert_eq!(cov.percent_inferrable(), 66);
        assert!(!cov.passes_threshold());
    }

    #[test]
    fn threshold_boundary_is_75_exactly() {
        let three_of_four = Coverage { total: 4, inferrable: 3, max_fanout: 1 };
        assert_eq!(three_of_four.percent_inferrable(), 75);
        assert!(three_of_four.passes_threshold());

        let two_of_four = Coverage { total: 4, inferrable: 2, max_fanout: 1 };
        assert_eq!(two_of_four.percent_inferrable(), 50);
        assert!(!two_of_four.passes_threshold());
    }

    #[test]
    fn simple_entities_do_not_count() {
        let store = InMemoryStore::new();
        let homology = index();
        let atp = store
            .insert_entity(PhysicalEntity::SimpleEntity(SimpleEntity {
                core: EntityCore::new("ATP"),
                reference_molecule: Some("CHEBI:30616".to_string()),
            }))
            .unwrap();
        assert_eq!(count_entity(&store, &homology, atp).unwrap(), Coverage::zero());
    }

    #[test]
    fn candidate_set_all_or_nothing() {
        let store = InMemoryStore::new();
        let homology = index();
        let good = protein(&store, "A", "P1");
        let bad = protein(&store, "B", "P3");
        let cs = store
            .insert_entity(PhysicalEntity::CandidateSet(CandidateSet {
                core: EntityCore::new("cands"),
                candidates: vec![good, bad],
                members: Vec::new(),
            }))
            .unwrap();

        // One inferrable of two candidates still counts as zero inferrable.
        let cov = count_entity(&store, &homology, cs).unwrap();
        assert_eq!(cov, Coverage { total: 2, inferrable: 0, max_fanout: 2 });
    }

    #[test]
    fn candidate_set_homogeneous_counts_normally() {
        let store = InMemoryStore::new();
        let homology = index();
        let a = protein(&store, "A", "P1");
        let b = protein(&store, "B", "P2");
        let cs = store
            .insert_entity(PhysicalEntity::CandidateSet(CandidateSet {
                core: EntityCore::new("cands"),
                candidates: vec![a, b],
                members: Vec::new(),
            }))
            .unwrap();

        let cov = count_entity(&store, &homology, cs).unwrap();
        assert_eq!(cov, Coverage { total: 2, inferrable: 2, max_fanout: 2 });
    }

    #[test]
    fn candidate_set_with_members_counts_members() {
        let store = InMemoryStore::new();
        let homology = index();
        let member = protein(&store, "A", "P2");
        let uncovered = protein(&store, "B", "P3");
        let cs = store
            .insert_entity(PhysicalEntity::CandidateSet(CandidateSet {
                core: EntityCore::new("cands"),
                candidates: vec![uncovered],
                members: vec![member],
            }))
            .unwrap();

        // Confirmed members take precedence over the candidate quirk.
        let cov = count_entity(&store, &homology, cs).unwrap();
        assert_eq!(cov, Coverage { total: 1, inferrable: 1, max_fanout: 1 });
    }

    #[test]
    fn defined_set_counts_all_members() {
        let store = InMemoryStore::new();
        let homology = index();
        let a = protein(&store, "A", "P1");
        let b = protein(&store, "B", "P3");
        let ds = store
            .insert_entity(PhysicalEntity::DefinedSet(DefinedSet {
                core: EntityCore::new("set"),
                members: vec![a, b],
            }))
            .unwrap();

        let cov = count_entity(&store, &homology, ds).unwrap();
        assert_eq!(cov, Coverage { total: 2, inferrable: 1, max_fanout: 2 });
    }

    #[test]
    fn cyclic_components_terminate() {
        let store = InMemoryStore::new();
        let homology = index();
        let p = protein(&store, "A", "P1");
        let inner = store
            .insert_entity(PhysicalEntity::Complex(Complex {
                core: EntityCore::new("inner"),
                components: vec![p],
            }))
            .unwrap();
        let outer = store
            .insert_entity(PhysicalEntity::Complex(Complex {
                core: EntityCore::new("outer"),
                components: vec![inner],
            }))
            .unwrap();
        // Close the loop: inner now also contains outer.
        let mut back = store.entity(inner).unwrap().unwrap();
        let PhysicalEntity::Complex(ref mut c) = back else {
            panic!("expected complex");
        };
        c.components.push(outer);
        store.update_entity(back).unwrap();

        let cov = count_entity(&store, &homology, outer).unwrap();
        assert_eq!(cov, Coverage { total: 1, inferrable: 1, max_fanout: 2 });
    }

    #[test]
    fn repeated_component_counts_per_occurrence() {
        let store = InMemoryStore::new();
        let homology = index();
        let p = protein(&store, "A", "P1");
        let cplx = store
            .insert_entity(PhysicalEntity::Complex(Complex {
                core: EntityCore::new("dimer"),
                components: vec![p, p],
            }))
            .unwrap();

        let cov = count_entity(&store, &homology, cplx).unwrap();
        assert_eq!(cov, Coverage { total: 2, inferrable: 2, max_fanout: 2 });
    }

    #[test]
    fn reaction_counts_inputs_outputs_and_catalysts() {
        let store = InMemoryStore::new();
        let homology = index();
        let input = protein(&store, "A", "P1");
        let output = protein(&store, "B", "P3");
        let enzyme = protein(&store, "E", "P2");

        let reaction = Reaction {
            core: EventCore::new("r"),
            inputs: vec![input],
            outputs: vec![output],
            catalysts: vec![crate::event::CatalystActivity {
                activity: Some("kinase activity".to_string()),
                entity: Some(enzyme),
                active_units: Vec::new(),
            }],
            regulations: Vec::new(),
            flags: Default::default(),
        };

        let cov = count_reaction(&store, &homology, &reaction).unwrap();
        assert_eq!(cov, Coverage { total: 3, inferrable: 2, max_fanout: 2 });
    }
}
