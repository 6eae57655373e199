//! The results table: a CSV file with a header and a leading row index column.
//!
//! ```text
//! ,system,threads,trial_num,num_keys,throughput
//! 0,original,1,0,10000000,1234567.8
//! ```

use std::{fs, path::Path};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::experiments::{ResultRow, System};

/// On-disk layout of a row. The index column has an empty header name.
#[derive(Debug, Serialize, Deserialize)]
struct Record {
    #[serde(rename = "", default)]
    index: Option<usize>,
    system: System,
    threads: usize,
    trial_num: usize,
    num_keys: usize,
    throughput: f64,
}

impl Record {
    fn new(index: usize, row: &ResultRow) -> Self {
        Record {
            index: Some(index),
            system: row.system,
            threads: row.threads,
            trial_num: row.trial_num,
            num_keys: row.num_keys,
            throughput: row.throughput,
        }
    }
}

impl From<Record> for ResultRow {
    fn from(r: Record) -> Self {
        ResultRow {
            system: r.system,
            threads: r.threads,
            trial_num: r.trial_num,
            num_keys: r.num_keys,
            throughput: r.throughput,
        }
    }
}

pub fn write_results(path: &Path, rows: &[ResultRow]) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
    }
    let mut wtr = csv::Writer::from_path(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    // An empty table still gets its header.
    if rows.is_empty() {
        wtr.write_record(["", "system", "threads", "trial_num", "num_keys", "throughput"])?;
    }
    for (i, row) in rows.iter().enumerate() {
        wtr.serialize(Record::new(i, row))?;
    }
    wtr.flush()?;
    Ok(())
}

/// Read a table back. Files without the index column are accepted too.
pub fn read_results(path: &Path) -> Result<Vec<ResultRow>> {
    let mut rdr = csv::Reader::from_path(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    rdr.deserialize::<Record>()
        .map(|r| {
            r.map(ResultRow::from)
                .with_context(|| format!("malformed row in {}", path.display()))
        })
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;

    fn rows() -> Vec<ResultRow> {
        vec![
            ResultRow {
                system: System::Original,
                threads: 1,
                trial_num: 0,
                num_keys: 10_000_000,
                throughput: 1234567.891,
            },
            ResultRow {
                system: System::Original,
                threads: 4,
                trial_num: 1,
                num_keys: 10_000_000,
                throughput: 0.1 + 0.2,
            },
            ResultRow {
                system: System::Fixed,
                threads: 16,
                trial_num: 9,
                num_keys: 10_000_000,
                throughput: 3.5e7,
            },
        ]
    }

    #[test]
    fn write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("recipe.csv");
        let rows = rows();
        write_results(&path, &rows).unwrap();
        assert_eq!(read_results(&path).unwrap(), rows);
    }

    #[test]
    fn layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("recipe.csv");
        write_results(&path, &rows()[..2]).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines[0], ",system,threads,trial_num,num_keys,throughput");
        assert_eq!(lines[1], "0,original,1,0,10000000,1234567.891");
        assert!(lines[2].starts_with("1,original,4,1,10000000,"));
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn empty_table_has_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/dir/recipe.csv");
        write_results(&path, &[]).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text.trim_end(), ",system,threads,trial_num,num_keys,throughput");
        assert!(read_results(&path).unwrap().is_empty());
    }

    #[test]
    fn read_without_index_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("recipe.csv");
        fs::write(
            &path,
            "system,threads,trial_num,num_keys,throughput\nfixed,2,0,100,5.5\n",
        )
        .unwrap();
        let rows = read_results(&path).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].system, System::Fixed);
        assert_eq!(rows[0].throughput, 5.5);
    }

    #[test]
    fn unknown_system_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("recipe.csv");
        fs::write(
            &path,
            ",system,threads,trial_num,num_keys,throughput\n0,patched,2,0,100,5.5\n",
        )
        .unwrap();
        assert!(read_results(&path).is_err());
    }
}
