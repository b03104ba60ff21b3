//! Stable identifiers and structural identity.
//!
//! Two identity mechanisms live here:
//!
//! - [`StableId`] and [`StableIdGenerator`]: human-readable, species-scoped
//!   identifiers minted for inferred instances by substituting the species
//!   abbreviation token in the source id. Paralogs (the same base id minted
//!   more than once in a run) get a monotonically increasing numeric suffix.
//! - [`Signature`]: a blake3 hash over a variant's defining attributes, used
//!   to represent "structurally identical" for deduplication. Child id lists
//!   are sorted before hashing so the signature is insensitive to store
//!   iteration order.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::entity::{DbId, PhysicalEntity};

/// A stable identifier such as `R-HSA-69620` or `R-MMU-69620-2`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StableId {
    /// Species abbreviation token, e.g. `HSA`.
    pub abbreviation: String,

    /// Numeric body of the identifier.
    pub number: String,

    /// Paralog suffix. `None` for the first instance minted from a base id;
    /// `Some(n)` with `n >= 2` for later ones.
    pub suffix: Option<u32>,
}

impl StableId {
    /// Creates a suffix-free stable id.
    #[must_use]
    pub fn new(abbreviation: impl Into<String>, number: impl Into<String>) -> Self {
        Self {
            abbreviation: abbreviation.into(),
            number: number.into(),
            suffix: None,
        }
    }

    /// Same id re-scoped to another species abbreviation, suffix cleared.
    #[must_use]
    pub fn with_abbreviation(&self, abbreviation: &str) -> Self {
        Self {
            abbreviation: abbreviation.to_string(),
            number: self.number.clone(),
            suffix: None,
        }
    }

    /// Base form of this id (suffix stripped), as text.
    #[must_use]
    pub fn base(&self) -> String {
        format!("R-{}-{}", self.abbreviation, self.number)
    }
}

impl fmt::Display for StableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.suffix {
            None => write!(f, "R-{}-{}", self.abbreviation, self.number),
            Some(n) => write!(f, "R-{}-{}-{}", self.abbreviation, self.number, n),
        }
    }
}

/// Mints target-species stable ids with paralog disambiguation.
///
/// The counter is per-run state: suffixes are assigned in first-seen order
/// and persist for the remainder of the run.
#[derive(Debug, Default)]
pub struct StableIdGenerator {
    minted: HashMap<String, u32>,
}

impl StableIdGenerator {
    /// Creates an empty generator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Derives the target-species id for `source`, counting paralogs.
    ///
    /// The first mint of a base id returns it unsuffixed; the second returns
    /// `-2`, the third `-3`, and so on.
    pub fn mint(&mut self, source: &StableId, target_abbreviation: &str) -> StableId {
        let mut id = source.with_abbreviation(target_abbreviation);
        let count = self.minted.entry(id.base()).or_insert(0);
        *count += 1;
        if *count > 1 {
            id.suffix = Some(*count);
        }
        id
    }
}

/// Canonical structural signature of an inferred entity.
///
/// Two entities with equal signatures are "identical by defining attributes"
/// and must be represented by one persisted instance per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Signature([u8; 32]);

impl Signature {
    /// Hex rendering for logs.
    #[must_use]
    pub fn to_hex(self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

fn hash_str(hasher: &mut blake3::Hasher, value: &str) {
    hasher.update(&(value.len() as u64).to_le_bytes());
    hasher.update(value.as_bytes());
}

fn hash_opt_id(hasher: &mut blake3::Hasher, value: Option<DbId>) {
    match value {
        None => hasher.update(&[0u8]),
        Some(id) => {
            hasher.update(&[1u8]);
            hasher.update(&id.0.to_le_bytes())
        }
    };
}

fn hash_ids_sorted(hasher: &mut blake3::Hasher, ids: &[DbId]) {
    let mut sorted = ids.to_vec();
    sorted.sort_unstable();
    hasher.update(&(sorted.len() as u64).to_le_bytes());
    for id in sorted {
        hasher.update(&id.0.to_le_bytes());
    }
}

/// Computes the structural signature of an entity.
///
/// Defining attributes are the variant tag, name, species, compartment, and
/// the variant payload: accession and modifications for proteins, child id
/// lists (sorted) for composites and sets, the reference molecule for simple
/// entities. Provenance links and stable ids are deliberately excluded.
#[must_use]
pub fn entity_signature(entity: &PhysicalEntity) -> Signature {
    let mut hasher = blake3::Hasher::new();
    hash_str(&mut hasher, entity.class_name());

    let core = entity.core();
    hash_str(&mut hasher, &core.name);
    match &core.species {
        None => hash_str(&mut hasher, ""),
        Some(tag) => hash_str(&mut hasher, &tag.0),
    }
    hash_opt_id(&mut hasher, core.compartment);

    match entity {
        PhysicalEntity::Protein(p) => {
            hash_str(&mut hasher, &p.accession);
            hasher.update(&(p.modifications.len() as u64).to_le_bytes());
            for m in &p.modifications {
                hash_str(&mut hasher, &m.psi_mod);
                match m.coordinate {
                    None => hasher.update(&[0u8]),
                    Some(c) => {
                        hasher.update(&[1u8]);
                        hasher.update(&c.to_le_bytes())
                    }
                };
            }
        }
        PhysicalEntity::Complex(c) => hash_ids_sorted(&mut hasher, &c.components),
        PhysicalEntity::Polymer(p) => hash_ids_sorted(&mut hasher, &p.repeated_unit),
        PhysicalEntity::DefinedSet(s) => hash_ids_sorted(&mut hasher, &s.members),
        PhysicalEntity::CandidateSet(s) => {
            hash_ids_sorted(&mut hasher, &s.candidates);
            hash_ids_sorted(&mut hasher, &s.members);
        }
        PhysicalEntity::SimpleEntity(s) => {
            hash_str(&mut hasher, s.reference_molecule.as_deref().unwrap_or(""));
        }
        PhysicalEntity::Ghost(_) | PhysicalEntity::Other(_) => {}
    }

    Signature(*hasher.finalize().as_bytes())
}
