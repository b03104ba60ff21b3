//! Species bootstrap configuration.
//!
//! A species run is parameterized by one `SpeciesConfig` record per target
//! species: display name, the abbreviation token used in stable identifiers,
//! and the reference-database URLs used to seed placeholder instances at run
//! start. The record is read once; the engine never mutates it.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::SetupError;

/// Species tag carried by species-bound instances.
///
/// Compared by value when collecting the distinct species a reaction spans.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpeciesTag(pub String);

impl SpeciesTag {
    /// Creates a tag from a species display name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

impl fmt::Display for SpeciesTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Descriptor for one reference database to seed at run start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceDatabaseConfig {
    /// Display name, e.g. `ENSEMBL`.
    pub name: String,

    /// Landing-page URL.
    pub url: String,

    /// Per-identifier access URL template.
    pub access_url: String,
}

/// Per-species bootstrap record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeciesConfig {
    /// Display name, e.g. `Mus musculus`.
    pub name: String,

    /// Short lowercase code used in homology file names, e.g. `mmus`.
    pub code: String,

    /// Stable-identifier abbreviation token, e.g. `MMU`.
    pub abbreviation: String,

    /// Primary reference database for inferred proteins.
    pub reference_db: ReferenceDatabaseConfig,

    /// Optional alternate reference database (some species resolve
    /// accessions against a secondary resource).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt_reference_db: Option<ReferenceDatabaseConfig>,
}

impl SpeciesConfig {
    /// Loads a config record from a JSON file.
    ///
    /// # Errors
    /// Returns a fatal [`SetupError`] if the file is unreadable, unparsable,
    /// or missing a mandatory field value.
    pub fn load(path: &Path) -> Result<Self, SetupError> {
        let text = std::fs::read_to_string(path).map_err(|source| {
            SetupError::SpeciesConfigUnreadable {
                path: path.to_path_buf(),
                source,
            }
        })?;
        let config: Self =
            serde_json::from_str(&text).map_err(|source| SetupError::SpeciesConfigInvalid {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that mandatory fields are non-empty.
    ///
    /// # Errors
    /// Returns [`SetupError::MissingSpeciesField`] naming the first empty field.
    pub fn validate(&self) -> Result<(), SetupError> {
        let missing = |field: &str| SetupError::MissingSpeciesField {
            field: field.to_string(),
        };
        if self.name.trim().is_empty() {
            return Err(missing("name"));
        }
        if self.code.trim().is_empty() {
            return Err(missing("code"));
        }
        if self.abbreviation.trim().is_empty() {
            return Err(missing("abbreviation"));
        }
        Ok(())
    }

    /// Species tag stamped onto every inferred instance of this run.
    #[must_use]
    pub fn tag(&self) -> SpeciesTag {
        SpeciesTag::new(self.name.clone())
    }
}
