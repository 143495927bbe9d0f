//! CSV part table input.

use std::io::Read;
use std::path::Path;

use crate::lookup::{LookupError, PartRecord};

/// Part numbers read from a table, plus how many rows had none.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartTable {
    pub parts: Vec<PartRecord>,
    pub skipped: usize,
}

/// Read the `column` of a headed CSV table.
///
/// Cells are trimmed; rows with an empty cell are skipped with a warning.
/// `source` names the input in errors.
pub fn read_parts<R: Read>(reader: R, column: &str, source: &Path) -> Result<PartTable, LookupError> {
    let csv_error = |e: csv::Error| LookupError::Csv {
        path: source.to_path_buf(),
        source: e,
    };
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers = reader.headers().map_err(csv_error)?.clone();
    let index = headers
        .iter()
        .position(|h| h.trim() == column)
        .ok_or_else(|| LookupError::MissingColumn {
            column: column.to_string(),
            path: source.to_path_buf(),
            available: headers.iter().collect::<Vec<_>>().join(", "),
        })?;

    let mut table = PartTable::default();
    for (i, record) in reader.records().enumerate() {
        let record = record.map_err(csv_error)?;
        let row = i + 1;
        match record.get(index).map(str::trim) {
            Some(mpn) if !mpn.is_empty() => table.parts.push(PartRecord {
                row,
                mpn: mpn.to_string(),
            }),
            _ => {
                tracing::warn!("Row {}: empty {} cell, skipped", row, column);
                table.skipped += 1;
            }
        }
    }
    Ok(table)
}

pub fn read_parts_file(path: &Path, column: &str) -> Result<PartTable, LookupError> {
    let file = std::fs::File::open(path)?;
    read_parts(file, column, path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_named_column() {
        let csv = "Ref,MPN,Qty\nU1,LM358DR,1\nR1, RC0603FR-0710KL ,4\n";
        let table = read_parts(csv.as_bytes(), "MPN", Path::new("bom.csv")).unwrap();
        assert_eq!(
            table.parts,
            vec![
                PartRecord { row: 1, mpn: "LM358DR".into() },
                PartRecord { row: 2, mpn: "RC0603FR-0710KL".into() },
            ]
        );
        assert_eq!(table.skipped, 0);
    }

    #[test]
    fn test_empty_cells_skipped() {
        let csv = "MPN\nA\n\"\"\n  \nB\n";
        let table = read_parts(csv.as_bytes(), "MPN", Path::new("bom.csv")).unwrap();
        let mpns: Vec<&str> = table.parts.iter().map(|p| p.mpn.as_str()).collect();
        assert_eq!(mpns, vec!["A", "B"]);
        assert_eq!(table.parts[1].row, 4);
        assert_eq!(table.skipped, 2);
    }

    #[test]
    fn test_missing_column() {
        let err = read_parts("Ref,Qty\nU1,1\n".as_bytes(), "MPN", Path::new("bom.csv")).unwrap_err();
        match err {
            LookupError::MissingColumn { available, .. } => assert_eq!(available, "Ref, Qty"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            read_parts_file(Path::new("/nonexistent/bom.csv"), "MPN"),
            Err(LookupError::Io(_))
        ));
    }
}
