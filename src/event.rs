//! Event types: reaction-like events and pathways.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::DbId;
use crate::identity::StableId;
use crate::species::SpeciesTag;

/// Attributes shared by reactions and pathways.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventCore {
    /// Store-assigned id (`DbId::UNSET` before insert).
    pub id: DbId,

    /// Primary name.
    pub name: String,

    /// Rendered display name.
    pub display_name: String,

    /// Species the event belongs to.
    pub species: Option<SpeciesTag>,

    /// Stable identifier, when assigned.
    pub stable_id: Option<StableId>,

    /// GO biological-process term, copied onto inferred counterparts.
    pub go_biological_process: Option<String>,

    /// Release date metadata, copied onto inferred counterparts.
    pub release_date: Option<String>,

    /// Source events this one was inferred from. Additive, value-deduplicated.
    #[serde(default)]
    pub inferred_from: Vec<DbId>,

    /// Event-level orthology links, both directions. Additive.
    #[serde(default)]
    pub orthologous_event: Vec<DbId>,

    /// Events that must precede this one.
    #[serde(default)]
    pub preceding: Vec<DbId>,

    /// Modification stamps. The hierarchy projector appends exactly one
    /// stamp per touched node per run.
    #[serde(default)]
    pub modified: Vec<DateTime<Utc>>,
}

impl EventCore {
    /// Creates an unpersisted core with the given name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: DbId::UNSET,
            display_name: name.clone(),
            name,
            species: None,
            stable_id: None,
            go_biological_process: None,
            release_date: None,
            inferred_from: Vec::new(),
            orthologous_event: Vec::new(),
            preceding: Vec::new(),
            modified: Vec::new(),
        }
    }

    /// Appends `source` to `inferred_from` unless already present.
    pub fn add_inferred_from(&mut self, source: DbId) {
        if !self.inferred_from.contains(&source) {
            self.inferred_from.push(source);
        }
    }

    /// Appends `other` to `orthologous_event` unless already present.
    pub fn add_orthologous_event(&mut self, other: DbId) {
        if !self.orthologous_event.contains(&other) {
            self.orthologous_event.push(other);
        }
    }

    /// Appends `event` to `preceding` unless already present.
    pub fn add_preceding(&mut self, event: DbId) {
        if !self.preceding.contains(&event) {
            self.preceding.push(event);
        }
    }
}

/// A catalyst activity attached to a reaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalystActivity {
    /// GO molecular-function name of the activity.
    pub activity: Option<String>,

    /// The catalyzing physical entity.
    pub entity: Option<DbId>,

    /// Active units within the catalyzing entity.
    #[serde(default)]
    pub active_units: Vec<DbId>,
}

/// Classification of a regulation edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegulationKind {
    /// The regulator is required for the reaction to occur. A requirement
    /// that cannot be inferred aborts the whole reaction.
    Requirement,
    /// Positive regulation. Droppable if the regulator cannot be inferred.
    Positive,
    /// Negative regulation. Droppable if the regulator cannot be inferred.
    Negative,
}

/// A regulation edge on a reaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Regulation {
    /// What kind of regulation this is.
    pub kind: RegulationKind,

    /// The regulating instance. Only physical-entity regulators are
    /// inferrable; an event or catalyst-activity regulator is treated as
    /// uninferrable.
    pub regulator: DbId,
}

/// Eligibility flags consulted by the skip check. All of them mark curation
/// states that must never be projected automatically.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ReactionFlags {
    /// Entities from more than one species were deliberately combined.
    #[serde(default)]
    pub chimeric: bool,

    /// Disease-associated event.
    #[serde(default)]
    pub disease: bool,

    /// Annotated related species.
    #[serde(default)]
    pub related_species: Vec<SpeciesTag>,

    /// A curator already inferred this event by hand.
    #[serde(default)]
    pub manually_inferred: bool,
}

/// A reaction-like event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reaction {
    pub core: EventCore,

    /// Input entity ids, in curated order.
    pub inputs: Vec<DbId>,

    /// Output entity ids, in curated order.
    pub outputs: Vec<DbId>,

    /// Catalyst activities.
    #[serde(default)]
    pub catalysts: Vec<CatalystActivity>,

    /// Regulation edges.
    #[serde(default)]
    pub regulations: Vec<Regulation>,

    /// Eligibility flags.
    #[serde(default)]
    pub flags: ReactionFlags,
}

/// A pathway grouping child events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pathway {
    pub core: EventCore,

    /// Child events (reactions or sub-pathways), in curated order.
    #[serde(default)]
    pub has_event: Vec<DbId>,
}

impl Pathway {
    /// Appends `event` to `has_event` unless already present.
    pub fn add_event(&mut self, event: DbId) {
        if !self.has_event.contains(&event) {
            self.has_event.push(event);
        }
    }
}

/// Tagged union over event classes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "class")]
pub enum Event {
    Reaction(Reaction),
    Pathway(Pathway),
}

impl Event {
    /// Shared attributes of either class.
    #[must_use]
    pub fn core(&self) -> &EventCore {
        match self {
            Self::Reaction(e) => &e.core,
            Self::Pathway(e) => &e.core,
        }
    }

    /// Mutable shared attributes.
    pub fn core_mut(&mut self) -> &mut EventCore {
        match self {
            Self::Reaction(e) => &mut e.core,
            Self::Pathway(e) => &mut e.core,
        }
    }

    /// Schema class name, for logs and class-mismatch errors.
    #[must_use]
    pub const fn class_name(&self) -> &'static str {
        match self {
            Self::Reaction(_) => "Reaction",
            Self::Pathway(_) => "Pathway",
        }
    }

    /// Store-assigned id of this instance.
    #[must_use]
    pub fn id(&self) -> DbId {
        self.core().id
    }
}
