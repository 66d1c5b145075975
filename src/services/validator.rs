//! Shapefile archive validation.
//!
//! Every unit in an archive is inspected and every defect is collected, so one
//! submission surfaces everything the uploader has to fix. Only a broken
//! container, an archive without geometry, or an unknown activity abort early.
//!
//! Nothing here logs; callers decide what to record.

use crate::models::{AppError, Result};
use crate::services::archive::{ShapefileArchive, UnitEntries, ATTRIBUTE_EXT};
use crate::services::dbf::{DbfReader, DbfResult};
use crate::services::schema::{Activity, AREA_FIELD};
use bytes::Bytes;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::io::{BufReader, Read};

/// Largest fractional hectare part accepted in the area column.
const MAX_AREA_FRACTION: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AreaIssue {
    NotNumeric,
    ExcessFraction,
}

impl fmt::Display for AreaIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AreaIssue::NotNumeric => f.write_str("must be numeric"),
            AreaIssue::ExcessFraction => {
                write!(f, "fractional part exceeds {}", MAX_AREA_FRACTION)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AreaDefect {
    pub row: usize,
    pub issue: AreaIssue,
}

/// Schema and value defects of one attribute table. Rows are 1-based.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UnitDefects {
    pub missing_fields: BTreeSet<String>,
    pub empty_fields: BTreeMap<String, Vec<usize>>,
    pub invalid_area: Vec<AreaDefect>,
}

impl UnitDefects {
    pub fn is_empty(&self) -> bool {
        self.missing_fields.is_empty() && self.empty_fields.is_empty() && self.invalid_area.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UnitOutcome {
    Valid { records: usize },
    Incomplete { missing: Vec<&'static str> },
    Empty,
    Unreadable { reason: String },
    Defective { records: usize, defects: UnitDefects },
}

impl UnitOutcome {
    pub fn is_valid(&self) -> bool {
        matches!(self, UnitOutcome::Valid { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnitReport {
    pub name: String,
    #[serde(flatten)]
    pub outcome: UnitOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchiveReport {
    pub activity: Activity,
    pub units: Vec<UnitReport>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub report: String,
}

impl ArchiveReport {
    pub fn is_valid(&self) -> bool {
        !self.units.is_empty() && self.units.iter().all(|unit| unit.outcome.is_valid())
    }

    pub fn render(&self) -> String {
        self.to_string()
    }

    pub fn into_result(self) -> ValidationResult {
        ValidationResult {
            valid: self.is_valid(),
            report: self.render(),
        }
    }
}

impl fmt::Display for ArchiveReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            return write!(
                f,
                "All {} shapefile(s) passed validation for activity '{}'.",
                self.units.len(),
                self.activity
            );
        }

        writeln!(f, "Validation failed for activity '{}'.", self.activity)?;
        for unit in &self.units {
            writeln!(f)?;
            write_unit(f, unit)?;
        }
        writeln!(f)?;
        write!(f, "Please fix the issues above and upload the archive again.")
    }
}

fn write_unit(f: &mut fmt::Formatter<'_>, unit: &UnitReport) -> fmt::Result {
    match &unit.outcome {
        UnitOutcome::Valid { records } => {
            writeln!(f, "Shapefile '{}': OK ({} records)", unit.name, records)
        }
        UnitOutcome::Incomplete { missing } => {
            let missing: Vec<String> = missing.iter().map(|ext| format!(".{}", ext)).collect();
            writeln!(
                f,
                "Shapefile '{}': incomplete, .shp, .shx and .dbf are all required (missing {})",
                unit.name,
                missing.join(", ")
            )
        }
        UnitOutcome::Empty => {
            writeln!(f, "Shapefile '{}': no data, the attribute table has no records", unit.name)
        }
        UnitOutcome::Unreadable { reason } => {
            writeln!(f, "Shapefile '{}': attribute table could not be read: {}", unit.name, reason)
        }
        UnitOutcome::Defective { records, defects } => {
            writeln!(f, "Shapefile '{}' ({} records):", unit.name, records)?;
            if !defects.missing_fields.is_empty() {
                let fields: Vec<&str> = defects.missing_fields.iter().map(String::as_str).collect();
                writeln!(f, "  Missing fields: {}", fields.join(", "))?;
            }
            if !defects.empty_fields.is_empty() {
                writeln!(f, "  Empty fields:")?;
                for (field, rows) in &defects.empty_fields {
                    let rows: Vec<String> = rows.iter().map(usize::to_string).collect();
                    writeln!(f, "    - {}: rows {}", field, rows.join(", "))?;
                }
            }
            if !defects.invalid_area.is_empty() {
                writeln!(f, "  Invalid {} values:", AREA_FIELD)?;
                for defect in &defects.invalid_area {
                    writeln!(f, "    - row {}: {}", defect.row, defect.issue)?;
                }
            }
            Ok(())
        }
    }
}

/// Validates an archive against the schema of an activity given by its label.
pub fn validate_label(bytes: Bytes, label: &str) -> Result<ArchiveReport> {
    let activity = label.parse::<Activity>()?;
    validate(bytes, activity)
}

pub fn validate(bytes: Bytes, activity: Activity) -> Result<ArchiveReport> {
    let mut archive = ShapefileArchive::open(bytes)?;

    let units = archive.units();
    if units.is_empty() {
        return Err(AppError::NoGeometryFound);
    }

    let units = units
        .into_iter()
        .map(|unit| UnitReport {
            outcome: inspect_unit(&mut archive, &unit, activity),
            name: unit.base_name,
        })
        .collect();

    Ok(ArchiveReport { activity, units })
}

/// Failures stay scoped to the unit so the rest of the archive is still checked.
fn inspect_unit(archive: &mut ShapefileArchive, unit: &UnitEntries, activity: Activity) -> UnitOutcome {
    let attributes = match unit.attributes {
        Some(index) if unit.is_complete() => index,
        _ => {
            return UnitOutcome::Incomplete {
                missing: unit.missing_extensions(),
            }
        }
    };

    let entry = match archive.open_entry(attributes) {
        Ok(entry) => entry,
        Err(e) => {
            return UnitOutcome::Unreadable {
                reason: format!("cannot open .{} entry: {}", ATTRIBUTE_EXT, e),
            }
        }
    };

    match evaluate_table(BufReader::new(entry), activity) {
        Ok(outcome) => outcome,
        Err(e) => UnitOutcome::Unreadable {
            reason: e.to_string(),
        },
    }
}

fn evaluate_table<R: Read>(reader: R, activity: Activity) -> DbfResult<UnitOutcome> {
    let table = DbfReader::new(reader)?;
    let mut defects = UnitDefects::default();
    let mut records = 0;

    for (offset, record) in table.enumerate() {
        let record = record?;
        let row = offset + 1;
        records = row;

        for field in activity.required_fields() {
            match record.get(field) {
                None => {
                    defects.missing_fields.insert(field.to_string());
                }
                Some(value) if value.is_blank() => {
                    defects
                        .empty_fields
                        .entry(field.to_string())
                        .or_default()
                        .push(row);
                }
                Some(_) => {}
            }
        }

        // Blank areas are already reported as empty fields.
        if let Some(value) = record.get(AREA_FIELD).filter(|value| !value.is_blank()) {
            match value.as_number() {
                None => defects.invalid_area.push(AreaDefect {
                    row,
                    issue: AreaIssue::NotNumeric,
                }),
                Some(area) if area % 1.0 > MAX_AREA_FRACTION => {
                    defects.invalid_area.push(AreaDefect {
                        row,
                        issue: AreaIssue::ExcessFraction,
                    })
                }
                Some(_) => {}
            }
        }
    }

    Ok(match records {
        0 => UnitOutcome::Empty,
        records if defects.is_empty() => UnitOutcome::Valid { records },
        records => UnitOutcome::Defective { records, defects },
    })
}
