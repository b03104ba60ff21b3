//! Incremental hierarchy projection across successive runs.

use std::collections::HashSet;

use orthoinfer::entity::{EntityCore, Protein};
use orthoinfer::event::{Event, EventCore, Pathway, Reaction};
use orthoinfer::species::{ReferenceDatabaseConfig, SpeciesConfig, SpeciesTag};
use orthoinfer::storage::InMemoryStore;
use orthoinfer::{DbId, HomologyIndex, OrthologyStore, PhysicalEntity, SpeciesRun, StableId};

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

fn pathway(store: &InMemoryStore, name: &str, children: Vec<DbId>) -> DbId {
    let mut core = EventCore::new(name);
    core.species = Some(SpeciesTag::new("Homo sapiens"));
    core.stable_id = Some(StableId::new("HSA", "70000"));
    store
        .insert_event(Event::Pathway(Pathway {
            core,
            has_event: children,
        }))
        .unwrap()
}

fn run_with_skips(store: &InMemoryStore, homology: HomologyIndex, skips: HashSet<DbId>) {
    SpeciesRun::bootstrap(
        store,
        SpeciesTag::new("Homo sapiens"),
        mouse(),
        homology,
        skips,
    )
    .unwrap()
    .execute()
    .unwrap();
}

#[test]
fn nested_pathways_are_projected_to_the_top() {
    let store = InMemoryStore::new();
    let a = human_protein(&store, "A", "P1");
    let b = human_protein(&store, "B", "P2");
    let rxn = reaction(&store, "R", vec![a], vec![b]);
    let inner = pathway(&store, "Inner", vec![rxn]);
    let outer = pathway(&store, "Outer", vec![inner]);
    let top = pathway(&store, "Top", vec![outer]);

    let homology = HomologyIndex::from_records([("P1", vec!["T1"]), ("P2", vec!["T2"])]);
    run_with_skips(&store, homology, HashSet::new());

    // Every level gained exactly one mouse counterpart, chained together.
    let counterpart = |id: DbId| -> DbId {
        let links = store.event(id).unwrap().unwrap().core().orthologous_event.clone();
        assert_eq!(links.len(), 1, "one counterpart per source event");
        links[0]
    };
    let inner_cp = counterpart(inner);
    let outer_cp = counterpart(outer);
    let top_cp = counterpart(top);
    let rxn_cp = counterpart(rxn);

    let children = |id: DbId| -> Vec<DbId> {
        let Event::Pathway(p) = store.event(id).unwrap().unwrap() else {
            panic!("expected a pathway");
        };
        p.has_event
    };
    assert_eq!(children(inner_cp), vec![rxn_cp]);
    assert_eq!(children(outer_cp), vec![inner_cp]);
    assert_eq!(children(top_cp), vec![outer_cp]);

    // Exactly one modified stamp on each touched node.
    for id in [rxn, inner, outer, top, rxn_cp, inner_cp, outer_cp, top_cp] {
        assert_eq!(store.event(id).unwrap().unwrap().core().modified.len(), 1);
    }
}

#[test]
fn later_run_reuses_counterparts_and_appends_children() {
    let store = InMemoryStore::new();
    let a = human_protein(&store, "A", "P1");
    let b = human_protein(&store, "B", "P2");
    let c = human_protein(&store, "C", "P3");
    let r1 = reaction(&store, "R1", vec![a], vec![b]);
    let r2 = reaction(&store, "R2", vec![a], vec![c]);
    let parent = pathway(&store, "Parent", vec![r1, r2]);

    // First run: only R1's proteins are covered.
    let first = HomologyIndex::from_records([("P1", vec!["T1"]), ("P2", vec!["T2"])]);
    run_with_skips(&store, first, HashSet::new());

    let parent_cp = store.event(parent).unwrap().unwrap().core().orthologous_event[0];
    let children_after_first = {
        let Event::Pathway(p) = store.event(parent_cp).unwrap().unwrap() else {
            panic!("expected a pathway");
        };
        p.has_event.clone()
    };
    assert_eq!(children_after_first.len(), 1);

    // Second run with updated mappings covering R2. R1 is skip-listed so the
    // rerun only adds the newly coverable reaction.
    let second = HomologyIndex::from_records([
        ("P1", vec!["T1"]),
        ("P2", vec!["T2"]),
        ("P3", vec!["T3"]),
    ]);
    run_with_skips(&store, second, HashSet::from([r1]));

    // Same counterpart pathway, one more child, old edge first.
    let links = store.event(parent).unwrap().unwrap().core().orthologous_event.clone();
    assert_eq!(links, vec![parent_cp]);
    let Event::Pathway(p) = store.event(parent_cp).unwrap().unwrap() else {
        panic!("expected a pathway");
    };
    assert_eq!(p.has_event.len(), 2);
    assert_eq!(p.has_event[0], children_after_first[0]);

    // Each run left its own stamp.
    assert_eq!(store.event(parent).unwrap().unwrap().core().modified.len(), 2);
    assert_eq!(store.event(parent_cp).unwrap().unwrap().core().modified.len(), 2);
}

#[test]
fn preceding_links_are_carried_only_between_counterparts() {
    let store = InMemoryStore::new();
    let a = human_protein(&store, "A", "P1");
    let b = human_protein(&store, "B", "P2");
    let orphan = human_protein(&store, "C", "P9");
    let r1 = reaction(&store, "R1", vec![a], vec![b]);
    let r3 = reaction(&store, "R3", vec![a], vec![orphan]);

    let mut core = EventCore::new("R2");
    core.species = Some(SpeciesTag::new("Homo sapiens"));
    core.stable_id = Some(StableId::new("HSA", "5002"));
    core.add_preceding(r1);
    core.add_preceding(r3);
    let r2 = store
        .insert_event(Event::Reaction(Reaction {
            core,
            inputs: vec![b],
            outputs: vec![a],
            catalysts: Vec::new(),
            regulations: Vec::new(),
            flags: Default::default(),
        }))
        .unwrap();
    pathway(&store, "Parent", vec![r1, r2, r3]);

    let homology = HomologyIndex::from_records([("P1", vec!["T1"]), ("P2", vec!["T2"])]);
    run_with_skips(&store, homology, HashSet::new());

    let r1_cp = store.event(r1).unwrap().unwrap().core().orthologous_event[0];
    let r2_cp = store.event(r2).unwrap().unwrap().core().orthologous_event[0];
    // R3 was rejected, so only the R1 link is carried.
    assert_eq!(store.event(r2_cp).unwrap().unwrap().core().preceding, vec![r1_cp]);
}

#[test]
fn curated_substitute_is_not_duplicated_by_a_full_run() {
    let store = InMemoryStore::new();
    let a = human_protein(&store, "A", "P1");
    let b = human_protein(&store, "B", "P2");
    let rxn = reaction(&store, "R", vec![a], vec![b]);
    let parent = pathway(&store, "Parent", vec![rxn]);

    // A curator already supplied the mouse-side event for the parent, as a
    // plain reaction rather than a pathway.
    let mut sub_core = EventCore::new("Parent substitute");
    sub_core.species = Some(SpeciesTag::new("Mus musculus"));
    let substitute = store
        .insert_event(Event::Reaction(Reaction {
            core: sub_core,
            inputs: Vec::new(),
            outputs: Vec::new(),
            catalysts: Vec::new(),
            regulations: Vec::new(),
            flags: Default::default(),
        }))
        .unwrap();
    let mut source = store.event(parent).unwrap().unwrap();
    source.core_mut().add_orthologous_event(substitute);
    store.update_event(source).unwrap();

    let homology = HomologyIndex::from_records([("P1", vec!["T1"]), ("P2", vec!["T2"])]);
    run_with_skips(&store, homology, HashSet::new());

    // The substitute was reused; no fresh pathway counterpart appeared.
    let links = store.event(parent).unwrap().unwrap().core().orthologous_event.clone();
    assert_eq!(links, vec![substitute]);

    // Its schema has no child list, so the inferred reaction hangs free but
    // the substitute itself carries the run stamp.
    let stored = store.event(substitute).unwrap().unwrap();
    assert!(matches!(&stored, Event::Reaction(_)));
    assert_eq!(stored.core().modified.len(), 1);
}

#[test]
fn pathways_without_inferred_reactions_gain_no_counterpart() {
    let store = InMemoryStore::new();
    let a = human_protein(&store, "A", "P1");
    let orphan = human_protein(&store, "B", "P9");
    let rxn = reaction(&store, "R", vec![a], vec![orphan]);
    let unreached = pathway(&store, "Unreached", vec![rxn]);

    let homology = HomologyIndex::from_records([("P1", vec!["T1"])]);
    run_with_skips(&store, homology, HashSet::new());

    assert!(store
        .event(unreached)
        .unwrap()
        .unwrap()
        .core()
        .orthologous_event
        .is_empty());
}
