//! Column ↔ record mapping shared by the sheet and CSV stores.

use prospector_shared::{CONTENT_COLUMN, Field, Stage, TargetRecord};
use tracing::warn;

/// Whether `column` is one the pipeline writes.
pub(crate) fn is_output_column(column: &str) -> bool {
    column == CONTENT_COLUMN || Stage::ALL.iter().any(|s| s.column() == column)
}

/// Which pipeline-written columns to read back into the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Outputs {
    /// Keep `content`/`response*` cells (resuming a saved batch).
    Read,
    /// Drop them; every row starts untried (the sheet is input only).
    Ignore,
}

/// Build a record from `(column, cell)` pairs.
///
/// Returns `None` (and logs) when the URL cell is missing or blank.
pub(crate) fn record_from_cells<I>(
    url_column: &str,
    row: usize,
    outputs: Outputs,
    cells: I,
) -> Option<TargetRecord>
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut record = TargetRecord::default();
    let mut url = None;

    for (column, cell) in cells {
        if column == url_column {
            url = Some(cell.trim().to_string());
        } else if outputs == Outputs::Ignore && is_output_column(&column) {
            continue;
        } else if column == CONTENT_COLUMN {
            record.raw_content = Field::from_cell(&cell);
        } else if let Some(stage) = Stage::ALL.into_iter().find(|s| s.column() == column) {
            *record.stage_field_mut(stage) = Field::from_cell(&cell);
        } else {
            record.extra.push((column, cell));
        }
    }

    match url {
        Some(url) if !url.is_empty() => {
            record.website_url = url;
            Some(record)
        }
        _ => {
            warn!(row, column = url_column, "skipping row without a website URL");
            None
        }
    }
}

/// Extra column names across `records`, in first-seen order.
pub(crate) fn extra_columns(records: &[TargetRecord]) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for record in records {
        for (column, _) in &record.extra {
            if !columns.contains(column) {
                columns.push(column.clone());
            }
        }
    }
    columns
}

#[cfg(test)]
mod tests {
    use super::*;

    use prospector_shared::RecordState;

    fn cells(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(c, v)| (c.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn maps_known_columns_and_keeps_extras_in_order() {
        let record = record_from_cells(
            "companywebsite",
            0,
            Outputs::Read,
            cells(&[
                ("id", "2"),
                ("companywebsite", " acme.com "),
                ("content", "Acme makes widgets"),
                ("response1", "N/A"),
                ("industry", "manufacturing"),
            ]),
        )
        .unwrap();

        assert_eq!(record.website_url, "acme.com");
        assert_eq!(record.raw_content, Field::Text("Acme makes widgets".into()));
        assert_eq!(record.summary, Field::Unresolved);
        assert_eq!(record.sales_opportunity, Field::Empty);
        assert_eq!(
            record.extra,
            vec![
                ("id".to_string(), "2".to_string()),
                ("industry".to_string(), "manufacturing".to_string()),
            ]
        );
    }

    #[test]
    fn rows_without_url_are_dropped() {
        assert!(record_from_cells("companywebsite", 0, Outputs::Read, cells(&[("id", "1")])).is_none());
        assert!(
            record_from_cells("companywebsite", 1, Outputs::Read, cells(&[("companywebsite", "  ")]))
                .is_none()
        );
    }

    #[test]
    fn ignored_outputs_leave_the_record_untried() {
        let record = record_from_cells(
            "companywebsite",
            0,
            Outputs::Ignore,
            cells(&[
                ("companywebsite", "acme.com"),
                ("content", "Acme makes widgets"),
                ("response1", "old summary"),
                ("industry", "manufacturing"),
            ]),
        )
        .unwrap();

        assert_eq!(record.state(), RecordState::Untried);
        assert!(!record.is_attempted());
        assert_eq!(
            record.extra,
            vec![("industry".to_string(), "manufacturing".to_string())]
        );
    }

    #[test]
    fn output_columns() {
        assert!(is_output_column("content"));
        assert!(is_output_column("response3"));
        assert!(!is_output_column("companywebsite"));
        assert!(!is_output_column("response4"));
    }

    #[test]
    fn extra_columns_union_in_first_seen_order() {
        let mut a = TargetRecord::new("a.test");
        a.extra = vec![("id".into(), "1".into()), ("name".into(), "A".into())];
        let mut b = TargetRecord::new("b.test");
        b.extra = vec![("region".into(), "EU".into()), ("id".into(), "2".into())];

        assert_eq!(extra_columns(&[a, b]), ["id", "name", "region"]);
    }
}
