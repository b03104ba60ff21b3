//! In-memory store backend.
//!
//! Thread-safe reference implementation of [`OrthologyStore`], used for
//! tests and embedded runs. Mirrors what a relational backend would index:
//! instances by id, entities by structural signature, and the reverse
//! `has_event` edge for referrer queries.

use std::collections::{BTreeSet, HashMap};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::entity::{DbId, PhysicalEntity};
use crate::error::StoreError;
use crate::event::Event;
use crate::identity::{entity_signature, Signature};
use crate::species::SpeciesTag;
use crate::storage::traits::{OrthologyStore, ReferenceDatabase};

fn lock_err(context: &'static str) -> StoreError {
    StoreError::Backend(format!("poisoned lock: {context}"))
}

#[derive(Debug, Default)]
struct StoreState {
    next_id: u64,
    entities: HashMap<DbId, PhysicalEntity>,
    events: HashMap<DbId, Event>,
    compartments: HashMap<DbId, String>,
    compartments_by_name: HashMap<String, DbId>,
    reference_dbs: HashMap<DbId, ReferenceDatabase>,
    by_signature: HashMap<Signature, DbId>,
    // event id -> pathways whose has_event references it
    parents: HashMap<DbId, BTreeSet<DbId>>,
}

impl StoreState {
    fn assign_id(&mut self) -> DbId {
        self.next_id += 1;
        DbId(self.next_id)
    }

    fn index_signature(&mut self, entity: &PhysicalEntity) {
        // First persisted instance wins; later identical inserts are not
        // re-pointed, matching "existing identical instances win".
        let sig = entity_signature(entity);
        self.by_signature.entry(sig).or_insert(entity.id());
    }

    fn unindex_signature(&mut self, entity: &PhysicalEntity) {
        let sig = entity_signature(entity);
        if self.by_signature.get(&sig) == Some(&entity.id()) {
            self.by_signature.remove(&sig);
        }
    }

    fn index_parent_edges(&mut self, event: &Event) {
        if let Event::Pathway(pathway) = event {
            for child in &pathway.has_event {
                self.parents.entry(*child).or_default().insert(pathway.core.id);
            }
        }
    }

    fn unindex_parent_edges(&mut self, event: &Event) {
        if let Event::Pathway(pathway) = event {
            for child in &pathway.has_event {
                if let Some(set) = self.parents.get_mut(child) {
                    set.remove(&pathway.core.id);
                }
            }
        }
    }
}

/// A named compartment in a serialized snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompartmentRecord {
    pub id: DbId,
    pub name: String,
}

/// Serialized snapshot of a curated database.
///
/// Instances carry their assigned ids; [`InMemoryStore::from_dump`] preserves
/// them so cross-references inside the snapshot stay valid.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct StoreDump {
    #[serde(default)]
    pub entities: Vec<PhysicalEntity>,

    #[serde(default)]
    pub events: Vec<Event>,

    #[serde(default)]
    pub compartments: Vec<CompartmentRecord>,

    #[serde(default)]
    pub reference_dbs: Vec<ReferenceDatabase>,
}

/// Thread-safe in-memory object store.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: RwLock<StoreState>,
}

impl InMemoryStore {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a snapshot, keeping the ids it carries. Later inserts continue
    /// above the highest loaded id.
    pub fn from_dump(dump: StoreDump) -> Result<Self, StoreError> {
        let mut state = StoreState::default();

        let mut claim = |state: &mut StoreState, id: DbId| -> Result<(), StoreError> {
            if id == DbId::UNSET {
                return Err(StoreError::Backend("snapshot instance has no id".to_string()));
            }
            state.next_id = state.next_id.max(id.0);
            Ok(())
        };

        // Ascending id order so the signature index keeps its
        // first-persisted-wins property across a save/load cycle.
        let mut entities = dump.entities;
        entities.sort_unstable_by_key(PhysicalEntity::id);
        for entity in entities {
            let id = entity.id();
            claim(&mut state, id)?;
            if state.entities.contains_key(&id) {
                return Err(StoreError::Backend(format!("duplicate entity id {id}")));
            }
            state.index_signature(&entity);
            state.entities.insert(id, entity);
        }

        for event in dump.events {
            let id = event.id();
            claim(&mut state, id)?;
            if state.events.contains_key(&id) {
                return Err(StoreError::Backend(format!("duplicate event id {id}")));
            }
            state.index_parent_edges(&event);
            state.events.insert(id, event);
        }

        for compartment in dump.compartments {
            claim(&mut state, compartment.id)?;
            state
                .compartments_by_name
                .insert(compartment.name.clone(), compartment.id);
            state.compartments.insert(compartment.id, compartment.name);
        }

        for db in dump.reference_dbs {
            claim(&mut state, db.id)?;
            state.reference_dbs.insert(db.id, db);
        }

        Ok(Self {
            state: RwLock::new(state),
        })
    }

    /// Snapshots the whole store, ids included, for serialization.
    pub fn to_dump(&self) -> Result<StoreDump, StoreError> {
        let state = self.state.read().map_err(|_| lock_err("to_dump"))?;
        let mut dump = StoreDump {
            entities: state.entities.values().cloned().collect(),
            events: state.events.values().cloned().collect(),
            compartments: state
                .compartments
                .iter()
                .map(|(id, name)| CompartmentRecord {
                    id: *id,
                    name: name.clone(),
                })
                .collect(),
            reference_dbs: state.reference_dbs.values().cloned().collect(),
        };
        dump.entities.sort_unstable_by_key(PhysicalEntity::id);
        dump.events.sort_unstable_by_key(Event::id);
        dump.compartments.sort_unstable_by_key(|c| c.id);
        dump.reference_dbs.sort_unstable_by_key(|db| db.id);
        Ok(dump)
    }

    /// Number of stored entities. Test/diagnostic helper.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.state.read().map(|s| s.entities.len()).unwrap_or(0)
    }

    /// Number of stored events. Test/diagnostic helper.
    #[must_use]
    pub fn event_count(&self) -> usize {
        self.state.read().map(|s| s.events.len()).unwrap_or(0)
    }
}

impl OrthologyStore for InMemoryStore {
    fn entity(&self, id: DbId) -> Result<Option<PhysicalEntity>, StoreError> {
        let state = self.state.read().map_err(|_| lock_err("entity"))?;
        Ok(state.entities.get(&id).cloned())
    }

    fn event(&self, id: DbId) -> Result<Option<Event>, StoreError> {
        let state = self.state.read().map_err(|_| lock_err("event"))?;
        Ok(state.events.get(&id).cloned())
    }

    fn insert_entity(&self, mut entity: PhysicalEntity) -> Result<DbId, StoreError> {
        let mut state = self.state.write().map_err(|_| lock_err("insert_entity"))?;
        let id = state.assign_id();
        entity.core_mut().id = id;
        state.index_signature(&entity);
        state.entities.insert(id, entity);
        Ok(id)
    }

    fn insert_event(&self, mut event: Event) -> Result<DbId, StoreError> {
        let mut state = self.state.write().map_err(|_| lock_err("insert_event"))?;
        let id = state.assign_id();
        event.core_mut().id = id;
        state.index_parent_edges(&event);
        state.events.insert(id, event);
        Ok(id)
    }

    fn update_entity(&self, entity: PhysicalEntity) -> Result<(), StoreError> {
        let id = entity.id();
        let mut state = self.state.write().map_err(|_| lock_err("update_entity"))?;
        let Some(previous) = state.entities.remove(&id) else {
            return Err(StoreError::NotFound(id));
        };
        state.unindex_signature(&previous);
        state.index_signature(&entity);
        state.entities.insert(id, entity);
        Ok(())
    }

    fn update_event(&self, event: Event) -> Result<(), StoreError> {
        let id = event.id();
        let mut state = self.state.write().map_err(|_| lock_err("update_event"))?;
        let Some(previous) = state.events.remove(&id) else {
            return Err(StoreError::NotFound(id));
        };
        state.unindex_parent_edges(&previous);
        state.index_parent_edges(&event);
        state.events.insert(id, event);
        Ok(())
    }

    fn find_identical_entity(&self, signature: Signature) -> Result<Option<DbId>, StoreError> {
        let state = self
            .state
            .read()
            .map_err(|_| lock_err("find_identical_entity"))?;
        Ok(state.by_signature.get(&signature).copied())
    }

    fn reactions_by_species(&self, species: &SpeciesTag) -> Result<Vec<DbId>, StoreError> {
        let state = self
            .state
            .read()
            .map_err(|_| lock_err("reactions_by_species"))?;
        let mut ids: Vec<DbId> = state
            .events
            .values()
            .filter_map(|event| match event {
                Event::Reaction(r) if r.core.species.as_ref() == Some(species) => Some(r.core.id),
                _ => None,
            })
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }

    fn pathways_containing(&self, event: DbId) -> Result<Vec<DbId>, StoreError> {
        let state = self
            .state
            .read()
            .map_err(|_| lock_err("pathways_containing"))?;
        Ok(state
            .parents
            .get(&event)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default())
    }

    fn ensure_compartment(&self, name: &str) -> Result<DbId, StoreError> {
        let mut state = self
            .state
            .write()
            .map_err(|_| lock_err("ensure_compartment"))?;
        if let Some(id) = state.compartments_by_name.get(name) {
            return Ok(*id);
        }
        let id = state.assign_id();
        state.compartments.insert(id, name.to_string());
        state.compartments_by_name.insert(name.to_string(), id);
        Ok(id)
    }

    fn compartment_name(&self, id: DbId) -> Result<Option<String>, StoreError> {
        let state = self
            .state
            .read()
            .map_err(|_| lock_err("compartment_name"))?;
        Ok(state.compartments.get(&id).cloned())
    }

    fn insert_reference_db(&self, mut db: ReferenceDatabase) -> Result<DbId, StoreError> {
        let mut state = self
            .state
            .write()
            .map_err(|_| lock_err("insert_reference_db"))?;
        let id = state.assign_id();
        db.id = id;
        state.reference_dbs.insert(id, db);
        Ok(id)
    }

    fn find_reference_db(&self, name: &str) -> Result<Option<DbId>, StoreError> {
        let state = self
            .state
            .read()
            .map_err(|_| lock_err("find_reference_db"))?;
        let mut ids: Vec<DbId> = state
            .reference_dbs
            .values()
            .filter(|db| db.name == name)
            .map(|db| db.id)
            .collect();
        ids.sort_unstable();
        Ok(ids.first().copied())
    }
}
