//! Physical entity types.
//!
//! The entity layer is the substrate everything else walks over. A curated
//! reaction references physical entities; inference rebuilds those entities
//! in the target species. Variants are a tagged union rather than a class
//! hierarchy so the required-vs-optional behavior of each variant stays
//! explicit in one `match` per engine.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::identity::StableId;
use crate::species::SpeciesTag;

/// Store-assigned instance identifier.
///
/// Ids are unique across all instance classes (entities, events, compartments,
/// reference databases). `DbId(0)` is the unassigned sentinel carried by
/// in-memory instances that have not been persisted yet.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct DbId(pub u64);

impl DbId {
    /// Sentinel for instances not yet persisted.
    pub const UNSET: Self = Self(0);

    /// Returns true if the store has not assigned an id yet.
    #[must_use]
    pub const fn is_unset(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for DbId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Attributes shared by every physical-entity variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityCore {
    /// Store-assigned id (`DbId::UNSET` before insert).
    pub id: DbId,

    /// Primary name.
    pub name: String,

    /// Rendered display name (name plus compartment when present).
    pub display_name: String,

    /// Species this instance belongs to. `None` means species-agnostic:
    /// such instances are referenced as-is, never copied per species.
    pub species: Option<SpeciesTag>,

    /// Compartment reference.
    pub compartment: Option<DbId>,

    /// Stable identifier, when assigned.
    pub stable_id: Option<StableId>,

    /// Source instances this one was inferred from. Additive, deduplicated
    /// by value, never overwritten wholesale.
    #[serde(default)]
    pub inferred_from: Vec<DbId>,

    /// Inferred instances derived from this one. Same additive contract.
    #[serde(default)]
    pub inferred_to: Vec<DbId>,
}

impl EntityCore {
    /// Creates an unpersisted core with the given name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: DbId::UNSET,
            display_name: name.clone(),
            name,
            species: None,
            compartment: None,
            stable_id: None,
            inferred_from: Vec::new(),
            inferred_to: Vec::new(),
        }
    }

    /// Appends `source` to `inferred_from` unless already present.
    pub fn add_inferred_from(&mut self, source: DbId) {
        if !self.inferred_from.contains(&source) {
            self.inferred_from.push(source);
        }
    }

    /// Appends `inferred` to `inferred_to` unless already present.
    pub fn add_inferred_to(&mut self, inferred: DbId) {
        if !self.inferred_to.contains(&inferred) {
            self.inferred_to.push(inferred);
        }
    }
}

/// A translational modification on a protein.
///
/// Coordinates are sequence positions on the *source* accession and are
/// dropped when the modification is re-derived against a homolog accession,
/// since they are not transferable across sequences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModifiedResidue {
    /// Sequence coordinate, when known.
    pub coordinate: Option<u32>,

    /// Catalog (PSI-MOD) name of the modification.
    pub psi_mod: String,
}

/// A sequence-accessioned protein.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Protein {
    pub core: EntityCore,

    /// Reference sequence accession (UniProt style).
    pub accession: String,

    /// Reference database the accession resolves against.
    pub reference_db: Option<DbId>,

    /// Gene identifiers cross-referenced to the accession.
    #[serde(default)]
    pub gene_ids: Vec<String>,

    /// Modified residues on this form of the protein.
    #[serde(default)]
    pub modifications: Vec<ModifiedResidue>,

    /// Start coordinate of this form on the reference sequence.
    pub start: Option<u32>,

    /// End coordinate of this form on the reference sequence.
    pub end: Option<u32>,
}

/// A complex of components.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Complex {
    pub core: EntityCore,

    /// Component entity ids. Every component is a mandatory part.
    pub components: Vec<DbId>,
}

/// A polymer of one or more repeated units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polymer {
    pub core: EntityCore,

    /// Repeated-unit entity ids.
    pub repeated_unit: Vec<DbId>,
}

/// A set whose members are interchangeable alternatives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefinedSet {
    pub core: EntityCore,

    /// Member entity ids. Members are optional parts: the set degrades by
    /// shrinking, it does not abort.
    pub members: Vec<DbId>,
}

/// A set of candidate members whose membership is not yet confirmed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateSet {
    pub core: EntityCore,

    /// Candidate entity ids.
    pub candidates: Vec<DbId>,

    /// Confirmed member entity ids (may be empty).
    #[serde(default)]
    pub members: Vec<DbId>,
}

/// A small chemical. Species-agnostic by construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimpleEntity {
    pub core: EntityCore,

    /// Reference molecule identifier (ChEBI style), when known.
    pub reference_molecule: Option<String>,
}

/// Minimal placeholder substituted for a mandatory sub-part that could not
/// be faithfully inferred. Carries only name/species/compartment plus
/// provenance back to the source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ghost {
    pub core: EntityCore,
}

/// A species-bearing entity with no sequence accession (and therefore no
/// homology evidence). Never inferrable; degrades to a ghost when required.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OtherEntity {
    pub core: EntityCore,
}

/// Tagged union over all physical-entity variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "class")]
pub enum PhysicalEntity {
    Protein(Protein),
    Complex(Complex),
    Polymer(Polymer),
    DefinedSet(DefinedSet),
    CandidateSet(CandidateSet),
    SimpleEntity(SimpleEntity),
    Ghost(Ghost),
    Other(OtherEntity),
}

impl PhysicalEntity {
    /// Shared attributes of any variant.
    #[must_use]
    pub fn core(&self) -> &EntityCore {
        match self {
            Self::Protein(e) => &e.core,
            Self::Complex(e) => &e.core,
            Self::Polymer(e) => &e.core,
            Self::DefinedSet(e) => &e.core,
            Self::CandidateSet(e) => &e.core,
            Self::SimpleEntity(e) => &e.core,
            Self::Ghost(e) => &e.core,
            Self::Other(e) => &e.core,
        }
    }

    /// Mutable shared attributes.
    pub fn core_mut(&mut self) -> &mut EntityCore {
        match self {
            Self::Protein(e) => &mut e.core,
            Self::Complex(e) => &mut e.core,
            Self::Polymer(e) => &mut e.core,
            Self::DefinedSet(e) => &mut e.core,
            Self::CandidateSet(e) => &mut e.core,
            Self::SimpleEntity(e) => &mut e.core,
            Self::Ghost(e) => &mut e.core,
            Self::Other(e) => &mut e.core,
        }
    }

    /// Schema class name, for logs and class-mismatch errors.
    #[must_use]
    pub const fn class_name(&self) -> &'static str {
        match self {
            Self::Protein(_) => "Protein",
            Self::Complex(_) => "Complex",
            Self::Polymer(_) => "Polymer",
            Self::DefinedSet(_) => "DefinedSet",
            Self::CandidateSet(_) => "CandidateSet",
            Self::SimpleEntity(_) => "SimpleEntity",
            Self::Ghost(_) => "Ghost",
            Self::Other(_) => "OtherEntity",
        }
    }

    /// Store-assigned id of this instance.
    #[must_use]
    pub fn id(&self) -> DbId {
        self.core().id
    }

    /// Direct child entity ids followed by structural recursion:
    /// components, repeated units, members and candidates.
    #[must_use]
    pub fn children(&self) -> Vec<DbId> {
        match self {
            Self::Complex(e) => e.components.clone(),
            Self::Polymer(e) => e.repeated_unit.clone(),
            Self::DefinedSet(e) => e.members.clone(),
            Self::CandidateSet(e) => {
                let mut out = e.candidates.clone();
                out.extend_from_slice(&e.members);
                out
            }
            Self::Protein(_) | Self::SimpleEntity(_) | Self::Ghost(_) | Self::Other(_) => {
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn db_id_unset_sentinel() {
        assert!(DbId::UNSET.is_unset());
        assert!(!DbId(1).is_unset());
    }

    #[test]
    fn core_provenance_is_deduplicated() {
        let mut core = EntityCore::new("PROT1");
        core.add_inferred_from(DbId(10));
        core.add_inferred_from(DbId(10));
        core.add_inferred_from(DbId(11));
        assert_eq!(core.inferred_from, vec![DbId(10), DbId(11)]);

        core.add_inferred_to(DbId(20));
        core.add_inferred_to(DbId(20));
        assert_eq!(core.inferred_to, vec![DbId(20)]);
    }

    #[test]
    fn children_follow_structural_edges() {
        let complex = PhysicalEntity::Complex(Complex {
            core: EntityCore::new("cplx"),
            components: vec![DbId(1), DbId(2)],
        });
        assert_eq!(complex.children(), vec![DbId(1), DbId(2)]);

        let cs = PhysicalEntity::CandidateSet(CandidateSet {
            core: EntityCore::new("cands"),
            candidates: vec![DbId(3)],
            members: vec![DbId(4)],
        });
        assert_eq!(cs.children(), vec![DbId(3), DbId(4)]);

        let protein = PhysicalEntity::Protein(Protein {
            core: EntityCore::new("p"),
            accession: "P12345".to_string(),
            reference_db: None,
            gene_ids: Vec::new(),
            modifications: Vec::new(),
            start: None,
            end: None,
        });
        assert!(protein.children().is_empty());
    }

    #[test]
    fn class_names_are_stable() {
        let ghost = PhysicalEntity::Ghost(Ghost {
            core: EntityCore::new("g"),
        });
        assert_eq!(ghost.class_name(), "Ghost");
    }

    #[test]
    fn entity_serde_tags_by_class() {
        let simple = PhysicalEntity::SimpleEntity(SimpleEntity {
            core: EntityCore::new("ATP"),
            reference_molecule: Some("CHEBI:30616".to_string()),
        });
        let json = serde_json::to_string(&simple).unwrap();
        assert!(json.contains("\"class\":\"SimpleEntity\""));
        let back: PhysicalEntity = serde_json::from_str(&json).unwrap();
        assert_eq!(back, simple);
    }
}
