//! CSV exports.
//!
//! - per-observation residuals, for spreadsheets or external plotting
//! - whole datasets (used by `cfe simulate`)

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::domain::Dataset;
use crate::error::AppError;
use crate::report::residuals::ResidualSet;

pub const RESIDUALS_HEADER: &str = "row,group,observed,fitted,residual,upper_limit,lower_limit";

/// Write per-observation residuals to a CSV file.
pub fn write_residuals_csv(path: &Path, residuals: &ResidualSet) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::usage(format!("Failed to create residuals CSV '{}': {e}", path.display())))?;
    write_residuals(file, residuals)
}

pub fn write_residuals<W: Write>(out: W, residuals: &ResidualSet) -> Result<(), AppError> {
    let mut writer = csv::Writer::from_writer(out);
    let map_err = |e: csv::Error| AppError::usage(format!("Failed to write residuals CSV: {e}"));

    writer
        .write_record(RESIDUALS_HEADER.split(','))
        .map_err(map_err)?;
    for p in &residuals.points {
        writer
            .write_record([
                p.row.to_string(),
                p.group.clone(),
                p.observed.to_string(),
                format!("{:.10}", p.fitted),
                format!("{:.10}", p.residual),
                format!("{:.10}", p.upper_limit),
                format!("{:.10}", p.lower_limit),
            ])
            .map_err(map_err)?;
    }
    writer
        .flush()
        .map_err(|e| AppError::usage(format!("Failed to flush residuals CSV: {e}")))?;
    Ok(())
}

/// Write a dataset as a delimited table with a header row.
pub fn write_dataset_csv(path: &Path, dataset: &Dataset) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::usage(format!("Failed to create dataset CSV '{}': {e}", path.display())))?;
    let mut writer = csv::Writer::from_writer(file);
    let map_err = |e: csv::Error| AppError::usage(format!("Failed to write dataset CSV: {e}"));

    let mut header = vec![
        dataset.columns.group.clone(),
        dataset.columns.pre.clone(),
        dataset.columns.post.clone(),
    ];
    header.extend(dataset.extra_columns.iter().cloned());
    writer.write_record(&header).map_err(map_err)?;

    let fmt = |v: Option<f64>| v.map(|x| x.to_string()).unwrap_or_else(|| "NA".to_string());
    for o in &dataset.observations {
        let mut record = vec![o.group.clone(), fmt(o.pre_score), fmt(o.post_score)];
        record.extend(o.extra.iter().map(|v| fmt(*v)));
        writer.write_record(&record).map_err(map_err)?;
    }
    writer
        .flush()
        .map_err(|e| AppError::usage(format!("Failed to flush dataset CSV: {e}")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Bounds, ColumnNames, Observation};
    use crate::io::ingest::{IngestOptions, read_dataset};
    use crate::report::residuals::ResidualPoint;

    #[test]
    fn residual_rows_follow_header() {
        let set = ResidualSet {
            points: vec![ResidualPoint {
                row: 4,
                group: "B".to_string(),
                observed: 20.0,
                linear_predictor: 21.0,
                fitted: 19.25,
                residual: 0.75,
                upper_limit: 0.75,
                lower_limit: -19.25,
            }],
            qq: vec![(0.0, 0.75)],
            qq_correlation: f64::NAN,
        };
        let mut buf = Vec::new();
        write_residuals(&mut buf, &set).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some(RESIDUALS_HEADER));
        let row: Vec<&str> = lines.next().unwrap().split(',').collect();
        assert_eq!(row[0], "4");
        assert_eq!(row[1], "B");
        assert_eq!(row[2], "20");
        assert_eq!(row[4], "0.7500000000");
    }

    #[test]
    fn residual_rows_quote_labels_with_delimiters() {
        let point = |row: usize, group: &str| ResidualPoint {
            row,
            group: group.to_string(),
            observed: 12.0,
            linear_predictor: 11.5,
            fitted: 11.5,
            residual: 0.5,
            upper_limit: 8.5,
            lower_limit: -11.5,
        };
        let set = ResidualSet {
            points: vec![point(2, "Smith, J"), point(3, "Other")],
            qq: Vec::new(),
            qq_correlation: f64::NAN,
        };
        let mut buf = Vec::new();
        write_residuals(&mut buf, &set).unwrap();

        let mut reader = csv::Reader::from_reader(buf.as_slice());
        assert_eq!(reader.headers().unwrap().len(), 7);
        let records: Vec<csv::StringRecord> = reader.records().collect::<Result<_, _>>().unwrap();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.len() == 7));
        assert_eq!(&records[0][1], "Smith, J");
        assert_eq!(&records[1][1], "Other");
    }

    #[test]
    fn dataset_csv_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.csv");
        let dataset = Dataset::new(
            ColumnNames::default(),
            vec![
                Observation {
                    row: 2,
                    group: "A".to_string(),
                    pre_score: Some(3.0),
                    post_score: Some(20.0),
                    extra: Vec::new(),
                },
                Observation {
                    row: 3,
                    group: "B".to_string(),
                    pre_score: None,
                    post_score: Some(7.5),
                    extra: Vec::new(),
                },
            ],
        );
        write_dataset_csv(&path, &dataset).unwrap();

        let opts = IngestOptions {
            delimiter: b',',
            columns: ColumnNames::default(),
            extra_covariates: Vec::new(),
            bounds: Bounds::new(0.0, 20.0).unwrap(),
        };
        let loaded = read_dataset(File::open(&path).unwrap(), &opts).unwrap();
        assert_eq!(loaded.dataset, dataset);
    }
}
