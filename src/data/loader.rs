//! CSV loading and merging
//!
//! Reads the per-split `measurements.csv` / `hwg_metadata.csv` pairs, joins
//! them on `subject_id`, and reads or writes the merged single-file layout.

use std::collections::HashMap;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord, WriterBuilder};

use crate::{BodyError, BodyRecord, Gender, Measurement, Result};

pub const MEASUREMENTS_FILE: &str = "measurements.csv";
pub const METADATA_FILE: &str = "hwg_metadata.csv";

const SUBJECT_ID: &str = "subject_id";
const GENDER: &str = "gender";
const HEIGHT_CM: &str = "height_cm";
const WEIGHT_KG: &str = "weight_kg";

/// A CSV file held in memory with its header index
struct Table {
    file: String,
    columns: HashMap<String, usize>,
    rows: Vec<StringRecord>,
}

impl Table {
    fn read(path: &Path) -> Result<Self> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_path(path)?;

        let columns = reader
            .headers()?
            .iter()
            .enumerate()
            .map(|(i, name)| (name.to_string(), i))
            .collect();

        let rows = reader.records().collect::<std::result::Result<Vec<_>, _>>()?;

        log::debug!("Read {} rows from {}", rows.len(), path.display());

        Ok(Table {
            file: path.display().to_string(),
            columns,
            rows,
        })
    }

    fn column(&self, name: &str) -> Result<usize> {
        self.columns
            .get(name)
            .copied()
            .ok_or_else(|| BodyError::MissingColumn {
                file: self.file.clone(),
                column: name.to_string(),
            })
    }

    fn optional_column(&self, name: &str) -> Option<usize> {
        self.columns.get(name).copied()
    }

    fn measurement_columns(&self) -> Result<Vec<(Measurement, usize)>> {
        Measurement::ALL
            .iter()
            .map(|m| Ok((*m, self.column(m.column())?)))
            .collect()
    }
}

/// Parse a numeric cell; empty and NaN-like cells are missing values
pub fn parse_cell(cell: &str) -> Result<Option<f64>> {
    let cell = cell.trim();
    if cell.is_empty() || matches!(cell.to_lowercase().as_str(), "nan" | "na" | "null") {
        return Ok(None);
    }
    cell.parse::<f64>()
        .map(|v| if v.is_nan() { None } else { Some(v) })
        .map_err(|_| BodyError::Parse(format!("invalid number '{}'", cell)))
}

fn cell<'a>(row: &'a StringRecord, index: usize) -> &'a str {
    row.get(index).unwrap_or("")
}

struct Metadata {
    gender: Gender,
    height_cm: Option<f64>,
    weight_kg: Option<f64>,
}

fn read_metadata(path: &Path) -> Result<HashMap<String, Metadata>> {
    let table = Table::read(path)?;
    let id_col = table.column(SUBJECT_ID)?;
    let gender_col = table.column(GENDER)?;
    let height_col = table.column(HEIGHT_CM)?;
    let weight_col = table.column(WEIGHT_KG)?;

    let mut metadata = HashMap::with_capacity(table.rows.len());
    for row in &table.rows {
        let subject_id = cell(row, id_col).to_string();
        let entry = Metadata {
            gender: Gender::parse(cell(row, gender_col)),
            height_cm: parse_cell(cell(row, height_col))?,
            weight_kg: parse_cell(cell(row, weight_col))?,
        };
        if metadata.insert(subject_id.clone(), entry).is_some() {
            log::warn!("Duplicate subject_id {} in {}, keeping last", subject_id, table.file);
        }
    }
    Ok(metadata)
}

/// Load one split folder, inner-joining measurements with metadata on `subject_id`.
///
/// Rows keep the order of `measurements.csv`; subjects without metadata are dropped.
pub fn load_split(dir: impl AsRef<Path>) -> Result<Vec<BodyRecord>> {
    let dir = dir.as_ref();
    let metadata = read_metadata(&dir.join(METADATA_FILE))?;
    let table = Table::read(&dir.join(MEASUREMENTS_FILE))?;
    let id_col = table.column(SUBJECT_ID)?;
    let measurement_cols = table.measurement_columns()?;

    let mut records = Vec::with_capacity(table.rows.len());
    let mut unmatched = 0usize;

    for row in &table.rows {
        let subject_id = cell(row, id_col);
        let Some(meta) = metadata.get(subject_id) else {
            unmatched += 1;
            continue;
        };

        let mut record = BodyRecord::new(subject_id, meta.gender.clone());
        record.height_cm = meta.height_cm;
        record.weight_kg = meta.weight_kg;
        for (m, col) in &measurement_cols {
            record.set_measurement(*m, parse_cell(cell(row, *col))?);
        }
        records.push(record);
    }

    if unmatched > 0 {
        log::warn!(
            "{}: {} measurement rows had no matching metadata",
            dir.display(),
            unmatched
        );
    }
    log::info!("Loaded {} subjects from {}", records.len(), dir.display());

    Ok(records)
}

/// Load and concatenate several split folders under `root`, in order
pub fn load_splits<S: AsRef<str>>(root: impl AsRef<Path>, splits: &[S]) -> Result<Vec<BodyRecord>> {
    let root = root.as_ref();
    let mut records = Vec::new();
    for split in splits {
        records.extend(load_split(root.join(split.as_ref()))?);
    }
    Ok(records)
}

/// Load a merged CSV (measurements and metadata columns in one file).
///
/// A missing `subject_id` column is tolerated; rows are then numbered.
pub fn load_merged(path: impl AsRef<Path>) -> Result<Vec<BodyRecord>> {
    let table = Table::read(path.as_ref())?;
    let id_col = table.optional_column(SUBJECT_ID);
    let gender_col = table.column(GENDER)?;
    let height_col = table.column(HEIGHT_CM)?;
    let weight_col = table.column(WEIGHT_KG)?;
    let measurement_cols = table.measurement_columns()?;

    let mut records = Vec::with_capacity(table.rows.len());
    for (i, row) in table.rows.iter().enumerate() {
        let subject_id = match id_col {
            Some(col) => cell(row, col).to_string(),
            None => i.to_string(),
        };
        let mut record = BodyRecord::new(subject_id, Gender::parse(cell(row, gender_col)));
        record.height_cm = parse_cell(cell(row, height_col))?;
        record.weight_kg = parse_cell(cell(row, weight_col))?;
        for (m, col) in &measurement_cols {
            record.set_measurement(*m, parse_cell(cell(row, *col))?);
        }
        records.push(record);
    }

    log::info!("Loaded {} subjects from {}", records.len(), table.file);
    Ok(records)
}

fn format_cell(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Write records in the merged layout: subject_id, measurements, then metadata columns
pub fn write_merged(path: impl AsRef<Path>, records: &[BodyRecord]) -> Result<()> {
    let mut writer = WriterBuilder::new().from_path(path.as_ref())?;

    let mut header = vec![SUBJECT_ID];
    header.extend(Measurement::ALL.iter().map(|m| m.column()));
    header.extend([GENDER, HEIGHT_CM, WEIGHT_KG]);
    writer.write_record(&header)?;

    for record in records {
        let mut row = vec![record.subject_id.clone()];
        row.extend(record.measurements.iter().map(|v| format_cell(*v)));
        row.push(record.gender.to_string());
        row.push(format_cell(record.height_cm));
        row.push(format_cell(record.weight_kg));
        writer.write_record(&row)?;
    }

    writer.flush()?;
    log::info!("Wrote {} rows to {}", records.len(), path.as_ref().display());
    Ok(())
}

/// Row counts for `data status`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatasetSummary {
    pub total: usize,
    pub male: usize,
    pub female: usize,
    pub other: usize,
    /// Male rows with no missing values
    pub complete_male: usize,
}

impl DatasetSummary {
    pub fn from_records(records: &[BodyRecord]) -> Self {
        let mut summary = DatasetSummary {
            total: records.len(),
            ..Default::default()
        };
        for record in records {
            match record.gender {
                Gender::Male => {
                    summary.male += 1;
                    if record.is_complete() {
                        summary.complete_male += 1;
                    }
                }
                Gender::Female => summary.female += 1,
                Gender::Other(_) => summary.other += 1,
            }
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const MEASUREMENT_HEADER: &str = "subject_id,ankle,arm-length,bicep,calf,chest,forearm,height,hip,leg-length,shoulder-breadth,shoulder-to-crotch,thigh,waist,wrist";

    fn write_split(dir: &Path, measurements: &[&str], metadata: &[&str]) {
        fs::create_dir_all(dir).unwrap();
        let mut m = String::from(MEASUREMENT_HEADER);
        for row in measurements {
            m.push('\n');
            m.push_str(row);
        }
        fs::write(dir.join(MEASUREMENTS_FILE), m).unwrap();

        let mut h = String::from("subject_id,gender,height_cm,weight_kg");
        for row in metadata {
            h.push('\n');
            h.push_str(row);
        }
        fs::write(dir.join(METADATA_FILE), h).unwrap();
    }

    #[test]
    fn test_parse_cell() {
        assert_eq!(parse_cell("12.5").unwrap(), Some(12.5));
        assert_eq!(parse_cell(" 3 ").unwrap(), Some(3.0));
        assert_eq!(parse_cell("").unwrap(), None);
        assert_eq!(parse_cell("NaN").unwrap(), None);
        assert_eq!(parse_cell("NA").unwrap(), None);
        assert!(parse_cell("abc").is_err());
    }

    #[test]
    fn test_load_split_joins_on_subject_id() {
        let dir = tempfile::tempdir().unwrap();
        write_split(
            dir.path(),
            &[
                "a,22,60,30,37,100,27,170,98,80,36,65,55,85,17",
                "b,23,61,31,38,,28,171,99,81,37,66,56,86,18",
                "orphan,1,1,1,1,1,1,1,1,1,1,1,1,1,1",
            ],
            &["b,female,165,60", "a,male,180,80.5"],
        );

        let records = load_split(dir.path()).unwrap();
        assert_eq!(records.len(), 2);

        assert_eq!(records[0].subject_id, "a");
        assert_eq!(records[0].gender, Gender::Male);
        assert_eq!(records[0].weight_kg, Some(80.5));
        assert_eq!(records[0].measurement(Measurement::Chest), Some(100.0));
        assert_eq!(records[0].measurement(Measurement::ShoulderToCrotch), Some(65.0));

        assert_eq!(records[1].subject_id, "b");
        assert_eq!(records[1].gender, Gender::Female);
        assert_eq!(records[1].measurement(Measurement::Chest), None);
    }

    #[test]
    fn test_load_split_missing_column() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(MEASUREMENTS_FILE), "subject_id,ankle\na,1").unwrap();
        fs::write(
            dir.path().join(METADATA_FILE),
            "subject_id,gender,height_cm,weight_kg\na,male,1,1",
        )
        .unwrap();

        let err = load_split(dir.path()).unwrap_err();
        assert!(matches!(err, BodyError::MissingColumn { .. }));
    }

    #[test]
    fn test_load_splits_concatenates_in_order() {
        let root = tempfile::tempdir().unwrap();
        write_split(
            &root.path().join("train"),
            &["a,22,60,30,37,100,27,170,98,80,36,65,55,85,17"],
            &["a,male,180,80"],
        );
        write_split(
            &root.path().join("testA"),
            &["b,22,60,30,37,100,27,170,98,80,36,65,55,85,17"],
            &["b,male,175,70"],
        );

        let records = load_splits(root.path(), &["train", "testA"]).unwrap();
        let ids: Vec<_> = records.iter().map(|r| r.subject_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_merged_write_then_load() {
        let dir = tempfile::tempdir().unwrap();
        write_split(
            dir.path(),
            &[
                "a,22,60,30,37,100,27,170,98,80,36,65,55,85,17",
                "b,23,61,31,38,,28,171,99,81,37,66,56,86,18",
            ],
            &["a,male,180,80", "b,female,165,"],
        );
        let records = load_split(dir.path()).unwrap();

        let merged = dir.path().join("merged_dataset.csv");
        write_merged(&merged, &records).unwrap();
        let loaded = load_merged(&merged).unwrap();

        assert_eq!(loaded, records);
    }

    #[test]
    fn test_load_merged_without_subject_id() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("merged.csv");
        fs::write(
            &path,
            "ankle,arm-length,bicep,calf,chest,forearm,height,hip,leg-length,shoulder-breadth,shoulder-to-crotch,thigh,waist,wrist,gender,height_cm,weight_kg\n\
             22,60,30,37,100,27,170,98,80,36,65,55,85,17,male,180,80\n",
        )
        .unwrap();

        let records = load_merged(&path).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].subject_id, "0");
        assert!(records[0].is_complete());
    }

    #[test]
    fn test_dataset_summary() {
        let mut complete = BodyRecord::new("a", Gender::Male);
        complete.height_cm = Some(180.0);
        complete.weight_kg = Some(80.0);
        for m in Measurement::ALL {
            complete.set_measurement(m, Some(1.0));
        }
        let records = vec![
            complete,
            BodyRecord::new("b", Gender::Male),
            BodyRecord::new("c", Gender::Female),
            BodyRecord::new("d", Gender::Other("unknown".into())),
        ];

        let summary = DatasetSummary::from_records(&records);
        assert_eq!(
            summary,
            DatasetSummary {
                total: 4,
                male: 2,
                female: 1,
                other: 1,
                complete_male: 1,
            }
        );
    }
}
