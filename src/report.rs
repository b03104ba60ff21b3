//! Run reports.
//!
//! Two append-only line files per run, consumed externally: "eligible
//! reactions" (passed the skip and protein-count checks) and "inferred
//! reactions" (persisted successfully), each `id<TAB>display name`, plus a
//! final summary with a truncated percentage.

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::entity::DbId;
use crate::error::ReportError;

/// Final counts for one species run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Reactions that passed eligibility.
    pub eligible: usize,

    /// Reactions actually inferred and persisted.
    pub inferred: usize,

    /// Truncated integer percentage of eligible reactions inferred.
    pub percent: u32,
}

/// Accumulates report lines during a species run.
#[derive(Debug, Default)]
pub struct RunReport {
    eligible: Vec<(DbId, String)>,
    inferred: Vec<(DbId, String)>,
}

impl RunReport {
    /// Creates an empty report.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a reaction that passed eligibility.
    pub fn record_eligible(&mut self, id: DbId, display_name: &str) {
        self.eligible.push((id, display_name.to_string()));
    }

    /// Records a successfully inferred reaction.
    pub fn record_inferred(&mut self, id: DbId, display_name: &str) {
        self.inferred.push((id, display_name.to_string()));
    }

    /// Eligible report lines, in recording order.
    #[must_use]
    pub fn eligible(&self) -> &[(DbId, String)] {
        &self.eligible
    }

    /// Inferred report lines, in recording order.
    #[must_use]
    pub fn inferred(&self) -> &[(DbId, String)] {
        &self.inferred
    }

    /// Returns true if a reaction id was recorded as eligible.
    #[must_use]
    pub fn is_eligible(&self, id: DbId) -> bool {
        self.eligible.iter().any(|(e, _)| *e == id)
    }

    /// Returns true if a reaction id was recorded as inferred.
    #[must_use]
    pub fn is_inferred(&self, id: DbId) -> bool {
        self.inferred.iter().any(|(e, _)| *e == id)
    }

    /// Final counts.
    #[must_use]
    pub fn summary(&self) -> RunSummary {
        let eligible = self.eligible.len();
        let inferred = self.inferred.len();
        #[allow(clippy::cast_possible_truncation)]
        let percent = if eligible == 0 {
            0
        } else {
            (inferred * 100 / eligible) as u32
        };
        RunSummary {
            eligible,
            inferred,
            percent,
        }
    }

    /// Writes both report files into `dir`, named after the target species
    /// code and the 75% threshold the run applies.
    ///
    /// # Errors
    /// [`ReportError::Write`] naming the file that failed.
    pub fn write_files(&self, dir: &Path, target_code: &str) -> Result<(), ReportError> {
        write_lines(
            &dir.join(format!("eligible_{target_code}_75.txt")),
            &self.eligible,
        )?;
        write_lines(
            &dir.join(format!("inferred_{target_code}_75.txt")),
            &self.inferred,
        )
    }
}

fn write_lines(path: &PathBuf, lines: &[(DbId, String)]) -> Result<(), ReportError> {
    let write = || -> std::io::Result<()> {
        let mut file = std::fs::File::create(path)?;
        for (id, name) in lines {
            writeln!(file, "{id}\t{name}")?;
        }
        file.flush()
    };
    write().map_err(|source| ReportError::Write {
        path: path.clone(),
        source,
    })
}
