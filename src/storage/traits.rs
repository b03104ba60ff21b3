//! Abstract store contract for the inference engine.
//!
//! The curated source database is conventionally a schema-driven relational
//! store; the engine only needs the operations below over the entity/event
//! schema. Any backend offering them is sufficient. The
//! "find-identical-or-insert" pair must be linearized per run: the engine is
//! single-threaded per species precisely so the at-most-one-instance-per-
//! signature invariant holds without store-side transactions.

use serde::{Deserialize, Serialize};

use crate::entity::{DbId, PhysicalEntity};
use crate::error::StoreError;
use crate::event::Event;
use crate::identity::Signature;
use crate::species::SpeciesTag;

/// A reference database seeded at run start; inferred proteins point at one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceDatabase {
    /// Store-assigned id (`DbId::UNSET` before insert).
    pub id: DbId,

    /// Display name, e.g. `ENSEMBL`.
    pub name: String,

    /// Landing-page URL.
    pub url: String,

    /// Per-identifier access URL template.
    pub access_url: String,
}

/// Object-store contract over the entity/event schema.
///
/// Source instances are read-only by convention: the engine only calls the
/// update operations to append provenance links and modified stamps, never
/// to rewrite curated content.
pub trait OrthologyStore: Send + Sync {
    /// Fetch a physical entity by id. `Ok(None)` if the id names no entity
    /// (including when it names an event).
    fn entity(&self, id: DbId) -> Result<Option<PhysicalEntity>, StoreError>;

    /// Fetch an event by id.
    fn event(&self, id: DbId) -> Result<Option<Event>, StoreError>;

    /// Insert a new entity, assigning and returning its id.
    fn insert_entity(&self, entity: PhysicalEntity) -> Result<DbId, StoreError>;

    /// Insert a new event, assigning and returning its id.
    fn insert_event(&self, event: Event) -> Result<DbId, StoreError>;

    /// Replace a stored entity. The id must already exist.
    fn update_entity(&self, entity: PhysicalEntity) -> Result<(), StoreError>;

    /// Replace a stored event. The id must already exist.
    fn update_event(&self, event: Event) -> Result<(), StoreError>;

    /// Find a persisted entity identical by defining attributes.
    ///
    /// When several identical instances exist, the earliest persisted one is
    /// returned (existing instances win over fresh ones).
    fn find_identical_entity(&self, signature: Signature) -> Result<Option<DbId>, StoreError>;

    /// Ids of all reactions belonging to a species, ascending by id.
    fn reactions_by_species(&self, species: &SpeciesTag) -> Result<Vec<DbId>, StoreError>;

    /// Ids of pathways whose `has_event` references the given event,
    /// ascending by id. This is the referrer query the hierarchy projector
    /// walks upward.
    fn pathways_containing(&self, event: DbId) -> Result<Vec<DbId>, StoreError>;

    /// Insert (or reuse) a compartment by display name, returning its id.
    fn ensure_compartment(&self, name: &str) -> Result<DbId, StoreError>;

    /// Display name of a compartment.
    fn compartment_name(&self, id: DbId) -> Result<Option<String>, StoreError>;

    /// Insert a reference database, assigning and returning its id.
    fn insert_reference_db(&self, db: ReferenceDatabase) -> Result<DbId, StoreError>;

    /// Find a reference database by display name.
    fn find_reference_db(&self, name: &str) -> Result<Option<DbId>, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    // Compile-time test: the store trait must stay object-safe; the engine
    // holds it as &dyn.
    fn _assert_store_object_safe(_: &dyn OrthologyStore) {}

    #[test]
    fn reference_database_roundtrips() {
        let db = ReferenceDatabase {
            id: DbId(3),
            name: "ENSEMBL".to_string(),
            url: "https://www.ensembl.org".to_string(),
            access_url: "https://www.ensembl.org/id/###ID###".to_string(),
        };
        let json = serde_json::to_string(&db).unwrap();
        let back: ReferenceDatabase = serde_json::from_str(&json).unwrap();
        assert_eq!(back, db);
    }
}
