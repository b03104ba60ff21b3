//! Homology lookup tables.
//!
//! Two flat text formats per target species, loaded once before a run and
//! never mutated afterwards:
//!
//! - `{source}_{target}_mapping.txt` — tab-separated: source protein id,
//!   then a space-separated list of target homolog ids.
//! - `{target}_gene_protein_mapping.txt` — tab-separated: gene id, then a
//!   space-separated list of protein ids.
//!
//! The index is pure lookup. The gene table is inverted at load time so
//! inferred proteins can be annotated with their gene cross-references.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;

use crate::error::SetupError;

static IDENTIFIER_RE: OnceLock<Regex> = OnceLock::new();

fn identifier_re() -> &'static Regex {
    IDENTIFIER_RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.:-]*$").expect("identifier regex is valid")
    })
}

/// Read-only homolog and gene cross-reference index for one species pair.
#[derive(Debug, Default)]
pub struct HomologyIndex {
    homologs: HashMap<String, Vec<String>>,
    genes_by_protein: HashMap<String, Vec<String>>,
}

impl HomologyIndex {
    /// Loads both mapping files for a species pair from `dir`.
    ///
    /// # Errors
    /// Fatal [`SetupError`] if either file is unreadable or contains a
    /// malformed record.
    pub fn load(dir: &Path, source_code: &str, target_code: &str) -> Result<Self, SetupError> {
        let mapping_path = dir.join(format!("{source_code}_{target_code}_mapping.txt"));
        let gene_path = dir.join(format!("{target_code}_gene_protein_mapping.txt"));

        let homologs = parse_mapping(&mapping_path)?;
        let gene_to_proteins = parse_mapping(&gene_path)?;

        let mut genes_by_protein: HashMap<String, Vec<String>> = HashMap::new();
        for (gene, proteins) in &gene_to_proteins {
            for protein in proteins {
                let genes = genes_by_protein.entry(protein.clone()).or_default();
                if !genes.contains(gene) {
                    genes.push(gene.clone());
                }
            }
        }
        for genes in genes_by_protein.values_mut() {
            genes.sort_unstable();
        }

        Ok(Self {
            homologs,
            genes_by_protein,
        })
    }

    /// Builds an index directly from homolog records. Intended for tests and
    /// embedded use; input order within each record is preserved.
    #[must_use]
    pub fn from_records<I, S>(records: I) -> Self
    where
        I: IntoIterator<Item = (S, Vec<S>)>,
        S: Into<String>,
    {
        let mut homologs = HashMap::new();
        for (source, targets) in records {
            let mut seen = Vec::new();
            for t in targets {
                let t = t.into();
                if !seen.contains(&t) {
                    seen.push(t);
                }
            }
            homologs.insert(source.into(), seen);
        }
        Self {
            homologs,
            genes_by_protein: HashMap::new(),
        }
    }

    /// Homolog ids for a source accession. Empty when none are known.
    #[must_use]
    pub fn homologs(&self, accession: &str) -> &[String] {
        self.homologs.get(accession).map_or(&[], Vec::as_slice)
    }

    /// Number of homologs for a source accession.
    #[must_use]
    pub fn homolog_count(&self, accession: &str) -> usize {
        self.homologs(accession).len()
    }

    /// Returns true if the accession has at least one homolog.
    #[must_use]
    pub fn has_homolog(&self, accession: &str) -> bool {
        self.homolog_count(accession) > 0
    }

    /// Gene ids cross-referenced to a target protein id (sorted).
    #[must_use]
    pub fn genes_for(&self, protein: &str) -> &[String] {
        self.genes_by_protein
            .get(protein)
            .map_or(&[], Vec::as_slice)
    }

    /// Number of source accessions with at least one record.
    #[must_use]
    pub fn len(&self) -> usize {
        self.homologs.len()
    }

    /// Returns true if no homolog records were loaded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.homologs.is_empty()
    }
}

fn malformed(path: &Path, line: usize, reason: impl Into<String>) -> SetupError {
    SetupError::MalformedHomologyRecord {
        path: path.to_path_buf(),
        line,
        reason: reason.into(),
    }
}

/// Parses one tab-separated mapping file: key, then space-separated values.
///
/// Blank lines are skipped. Values are deduplicated preserving file order.
fn parse_mapping(path: &Path) -> Result<HashMap<String, Vec<String>>, SetupError> {
    let text =
        std::fs::read_to_string(path).map_err(|source| SetupError::HomologyFileUnreadable {
            path: PathBuf::from(path),
            source,
        })?;

    let mut map: HashMap<String, Vec<String>> = HashMap::new();
    for (idx, raw) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.trim_end();
        if line.is_empty() {
            continue;
        }

        let mut fields = line.splitn(2, '\t');
        let key = fields
            .next()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| malformed(path, line_no, "missing key column"))?;
        if !identifier_re().is_match(key) {
            return Err(malformed(path, line_no, format!("invalid identifier '{key}'")));
        }

        let values = map.entry(key.to_string()).or_default();
        if let Some(rest) = fields.next() {
            for value in rest.split_whitespace() {
                if !identifier_re().is_match(value) {
                    return Err(malformed(
                        path,
                        line_no,
                        format!("invalid identifier '{value}'"),
                    ));
                }
                let value = value.to_string();
                if !values.contains(&value) {
                    values.push(value);
                }
            }
        }
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &Path, name: &str, content: &str) {
        let mut f = std::fs::File::create(dir.join(name)).unwrap();
        f.write_all(content.as_bytes()).unwrap();
    }

    #[test]
    fn loads_both_tables() {
        let dir = tempfile::tempdir().unwrap();
        write_file(
            dir.path(),
            "hsap_mmus_mapping.txt",
            "P01116\tENSMUSP001 ENSMUSP002\nP04637\tENSMUSP003\nQ00001\t\n",
        );
        write_file(
            dir.path(),
            "mmus_gene_protein_mapping.txt",
            "ENSMUSG010\tENSMUSP001 ENSMUSP002\nENSMUSG011\tENSMUSP001\n",
        );

        let index = HomologyIndex::load(dir.path(), "hsap", "mmus").unwrap();
        assert_eq!(index.homologs("P01116"), ["ENSMUSP001", "ENSMUSP002"]);
        assert_eq!(index.homolog_count("P04637"), 1);
        assert_eq!(index.homolog_count("Q00001"), 0);
        assert!(!index.has_homolog("UNKNOWN"));
        assert_eq!(index.genes_for("ENSMUSP001"), ["ENSMUSG010", "ENSMUSG011"]);
        assert_eq!(index.genes_for("ENSMUSP003"), [] as [&str; 0]);
    }

    #[test]
    fn missing_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let err = HomologyIndex::load(dir.path(), "hsap", "mmus").unwrap_err();
        assert!(matches!(err, SetupError::HomologyFileUnreadable { .. }));
    }

    #[test]
    fn malformed_identifier_reports_line() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "hsap_mmus_mapping.txt", "P01116\tok\n\tbad\n");
        write_file(dir.path(), "mmus_gene_protein_mapping.txt", "");
        let err = HomologyIndex::load(dir.path(), "hsap", "mmus").unwrap_err();
        match err {
            SetupError::MalformedHomologyRecord { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn duplicate_homologs_are_collapsed() {
        let index = HomologyIndex::from_records([("P1", vec!["T1", "T1", "T2"])]);
        assert_eq!(index.homologs("P1"), ["T1", "T2"]);
        assert_eq!(index.len(), 1);
        assert!(!index.is_empty());
    }
}
