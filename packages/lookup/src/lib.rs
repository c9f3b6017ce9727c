#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Curve number lookup table.
//!
//! A delimited text table mapping a composite `GDCode` key (land-cover
//! class + `_` + hydrologic soil group letter, with the special open-water
//! key `11_`) to a curve number in `0..=100`. A default table ships
//! compiled into the binary; a user-supplied CSV with the same two columns
//! can replace it per run. An optional OGR-style `.csvt` sidecar next to a
//! user table is validated when present.

use std::collections::BTreeMap;
use std::path::Path;

/// The bundled default table, compiled in.
const DEFAULT_TABLE_CSV: &str = include_str!("../assets/default_lookup.csv");

/// Composite-key column header.
const KEY_COLUMN: &str = "GDCode";
/// Curve-number column header.
const VALUE_COLUMN: &str = "CN_Join";

/// Errors that can occur while loading a lookup table.
#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    /// I/O error (file read).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV parsing failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// A required column header was not found.
    #[error("Lookup table is missing the '{name}' column")]
    MissingColumn {
        /// The absent header.
        name: &'static str,
    },

    /// A curve number was not an integer in `0..=100`.
    #[error("Curve number for key '{key}' is out of range: {value}")]
    ValueOutOfRange {
        /// The composite key of the offending row.
        key: String,
        /// The raw cell content.
        value: String,
    },

    /// The `.csvt` sidecar disagrees with the table.
    #[error("Type sidecar mismatch: {message}")]
    Sidecar {
        /// Description of the disagreement.
        message: String,
    },
}

/// An immutable curve number lookup table, loaded once per run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupTable {
    map: BTreeMap<String, u16>,
}

impl LookupTable {
    /// Loads the bundled default table.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError`] only if the compiled-in asset is malformed,
    /// which the test suite guards against.
    pub fn bundled() -> Result<Self, LookupError> {
        Self::parse(DEFAULT_TABLE_CSV.as_bytes())
    }

    /// Loads a user-supplied table, validating the `.csvt` sidecar when one
    /// exists next to it.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError`] if the file cannot be read, the required
    /// columns are absent, a value is out of range, or the sidecar
    /// disagrees with the table layout.
    pub fn from_path(path: &Path) -> Result<Self, LookupError> {
        let content = std::fs::read_to_string(path)?;

        let sidecar = path.with_extension("csvt");
        if sidecar.exists() {
            let declarations = std::fs::read_to_string(&sidecar)?;
            validate_sidecar(&content, &declarations)?;
        }

        let table = Self::parse(content.as_bytes())?;
        log::info!(
            "Loaded lookup table from {} ({} keys)",
            path.display(),
            table.len()
        );
        Ok(table)
    }

    fn parse(reader: impl std::io::Read) -> Result<Self, LookupError> {
        let mut csv_reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);

        let headers = csv_reader.headers()?.clone();
        let key_idx = headers
            .iter()
            .position(|h| h == KEY_COLUMN)
            .ok_or(LookupError::MissingColumn { name: KEY_COLUMN })?;
        let value_idx = headers
            .iter()
            .position(|h| h == VALUE_COLUMN)
            .ok_or(LookupError::MissingColumn { name: VALUE_COLUMN })?;

        let mut map = BTreeMap::new();
        for record in csv_reader.records() {
            let record = record?;
            let key = record.get(key_idx).unwrap_or("").to_string();
            let raw = record.get(value_idx).unwrap_or("");
            if key.is_empty() {
                continue;
            }
            let value: u16 = raw.parse().map_err(|_| LookupError::ValueOutOfRange {
                key: key.clone(),
                value: raw.to_string(),
            })?;
            if value > 100 {
                return Err(LookupError::ValueOutOfRange {
                    key,
                    value: raw.to_string(),
                });
            }
            map.insert(key, value);
        }

        Ok(Self { map })
    }

    /// The curve number for a composite key, if present.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<u16> {
        self.map.get(key).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Validates an OGR `.csvt` declaration line against the table header.
///
/// The sidecar carries one quoted type per column; the column count must
/// match and the curve-number column must be declared as an integer type.
fn validate_sidecar(table: &str, declarations: &str) -> Result<(), LookupError> {
    let header = table.lines().next().unwrap_or("");
    let columns: Vec<&str> = header.split(',').map(str::trim).collect();

    let types: Vec<String> = declarations
        .lines()
        .next()
        .unwrap_or("")
        .split(',')
        .map(|t| t.trim().trim_matches('"').to_ascii_lowercase())
        .collect();

    if types.len() != columns.len() {
        return Err(LookupError::Sidecar {
            message: format!(
                "{} type declarations for {} columns",
                types.len(),
                columns.len()
            ),
        });
    }

    if let Some(idx) = columns.iter().position(|c| *c == VALUE_COLUMN)
        && !types[idx].starts_with("integer")
    {
        return Err(LookupError::Sidecar {
            message: format!("'{VALUE_COLUMN}' declared as '{}', expected Integer", types[idx]),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_table_parses() {
        let table = LookupTable::bundled().unwrap();
        assert!(!table.is_empty());
    }

    #[test]
    fn bundled_table_has_open_water_override() {
        let table = LookupTable::bundled().unwrap();
        assert_eq!(table.get("11_"), Some(100));
    }

    #[test]
    fn bundled_table_covers_all_four_groups_for_pasture() {
        let table = LookupTable::bundled().unwrap();
        for group in ["A", "B", "C", "D"] {
            assert!(table.get(&format!("81_{group}")).is_some(), "81_{group}");
        }
    }

    #[test]
    fn bundled_values_are_valid_curve_numbers() {
        let table = LookupTable::bundled().unwrap();
        // Parsing enforces 0..=100; spot-check a known row too.
        assert_eq!(table.get("21_C"), Some(79));
    }

    #[test]
    fn unknown_key_is_a_miss() {
        let table = LookupTable::bundled().unwrap();
        assert_eq!(table.get("21_"), None);
    }

    #[test]
    fn rejects_out_of_range_values() {
        let err = LookupTable::parse("GDCode,CN_Join\n21_A,101\n".as_bytes()).unwrap_err();
        assert!(matches!(err, LookupError::ValueOutOfRange { .. }));
    }

    #[test]
    fn rejects_missing_key_column() {
        let err = LookupTable::parse("Code,CN_Join\n21_A,49\n".as_bytes()).unwrap_err();
        assert!(matches!(
            err,
            LookupError::MissingColumn { name: "GDCode" }
        ));
    }

    #[test]
    fn sidecar_with_matching_types_passes() {
        validate_sidecar("GDCode,CN_Join\n21_A,49\n", "\"String\",\"Integer\"\n").unwrap();
    }

    #[test]
    fn sidecar_with_wrong_arity_fails() {
        let err = validate_sidecar("GDCode,CN_Join\n", "\"String\"\n").unwrap_err();
        assert!(matches!(err, LookupError::Sidecar { .. }));
    }

    #[test]
    fn sidecar_with_non_integer_value_column_fails() {
        let err = validate_sidecar("GDCode,CN_Join\n", "\"String\",\"Real\"\n").unwrap_err();
        assert!(matches!(err, LookupError::Sidecar { .. }));
    }
}
