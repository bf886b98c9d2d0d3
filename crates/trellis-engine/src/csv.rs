//! CSV import and export.
//!
//! Import runs inside one staged job transaction with row isolation:
//! a bad row is reported and skipped, every good row is kept, and the
//! job commits the survivors even when some rows failed. Export
//! always emits the header row, so an empty result set still yields a
//! usable template.

use std::collections::HashMap;
use std::sync::Arc;

use csv::{ReaderBuilder, WriterBuilder};
use serde::Serialize;
use serde_json::{Map, Value as Json};
use tracing::{debug, info, warn};

use trellis_common::{Record, TrellisError, TrellisResult, Value};
use trellis_schema::{SchemaRegistry, TableDescriptor};
use trellis_store::{Selection, SortOrder, Store};

use crate::coerce::coerce_for_read;
use crate::query::filter_selection;
use crate::records::{coerce_input, normalize_store_error};

/// One failed import row.
#[derive(Debug, Clone, Serialize)]
pub struct RowError {
    /// 1-based data row number as a spreadsheet user counts it
    /// (header row is row 1).
    pub row: u64,
    /// The offending field, when the failure names one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    /// Human-readable failure description.
    pub message: String,
    /// The raw row content, for operator review.
    pub data: Map<String, Json>,
}

/// Result of one CSV import run.
#[derive(Debug, Serialize)]
pub struct ImportOutcome {
    /// Data rows seen in the file.
    #[serde(rename = "totalRows")]
    pub total_rows: u64,
    /// Rows committed to the table.
    #[serde(rename = "importedRows")]
    pub imported_rows: u64,
    /// The committed records, as stored.
    pub records: Vec<Record>,
    /// Per-row failures.
    pub errors: Vec<RowError>,
}

/// CSV import/export over any registered table.
#[derive(Clone)]
pub struct CsvPipeline {
    registry: Arc<SchemaRegistry>,
    store: Arc<dyn Store>,
}

impl CsvPipeline {
    /// Creates a pipeline over the given registry and store.
    #[must_use]
    pub fn new(registry: Arc<SchemaRegistry>, store: Arc<dyn Store>) -> Self {
        Self { registry, store }
    }

    /// Imports CSV bytes into one table.
    ///
    /// Headers are matched case-insensitively after trimming; every
    /// non-generated column must be present or the whole file is
    /// rejected before any row is attempted.
    pub async fn import(&self, table: &str, bytes: &[u8]) -> TrellisResult<ImportOutcome> {
        let desc = self.registry.describe(table)?;

        let mut reader = ReaderBuilder::new().flexible(true).from_reader(bytes);
        let headers: Vec<String> = reader
            .headers()
            .map_err(|e| TrellisError::Parse {
                message: e.to_string(),
            })?
            .iter()
            .map(|h| h.trim().to_lowercase())
            .collect();

        let missing: Vec<String> = desc
            .required_columns()
            .filter(|c| !headers.iter().any(|h| h == c))
            .map(str::to_string)
            .collect();
        if !missing.is_empty() {
            return Err(TrellisError::MissingColumns { columns: missing });
        }

        let complex_names = if desc.resolve_complex_slots {
            self.load_complex_names().await?
        } else {
            HashMap::new()
        };

        let mut job = self
            .store
            .begin_job(&desc.name)
            .await
            .map_err(|e| normalize_store_error(&desc, e, None))?;

        let mut total_rows = 0u64;
        let mut records = Vec::new();
        let mut errors = Vec::new();

        for (idx, row) in reader.records().enumerate() {
            total_rows += 1;
            // Header is row 1, so the first data row is row 2.
            let row_number = idx as u64 + 2;

            let raw = match row {
                Ok(raw) => raw,
                Err(e) => {
                    errors.push(RowError {
                        row: row_number,
                        field: None,
                        message: e.to_string(),
                        data: Map::new(),
                    });
                    continue;
                }
            };

            let mut body = Map::new();
            for (header, cell) in headers.iter().zip(raw.iter()) {
                let cell = cell.trim();
                let value = if cell.is_empty() {
                    Json::Null
                } else {
                    Json::String(cell.to_string())
                };
                body.insert(header.clone(), value);
            }
            resolve_complex_slots(&desc, &complex_names, &mut body);

            let record = match coerce_input(&desc, &body, true) {
                Ok(record) => record,
                Err(e) => {
                    errors.push(RowError {
                        row: row_number,
                        field: e.field().map(str::to_string),
                        message: e.to_string(),
                        data: body,
                    });
                    continue;
                }
            };

            match job.insert(record).await {
                Ok(stored) => records.push(stored),
                Err(e) => {
                    let e = normalize_store_error(&desc, e, Some(&body_as_record(&desc, &body)));
                    warn!(table, row = row_number, %e, "import row rejected");
                    errors.push(RowError {
                        row: row_number,
                        field: e.field().map(str::to_string),
                        message: e.to_string(),
                        data: body,
                    });
                }
            }
        }

        // Survivors commit even when some rows failed.
        let imported_rows = job
            .commit()
            .await
            .map_err(|e| normalize_store_error(&desc, e, None))?;
        info!(
            table,
            total_rows,
            imported_rows,
            failed = errors.len(),
            "csv import finished"
        );

        Ok(ImportOutcome {
            total_rows,
            imported_rows,
            records,
            errors,
        })
    }

    /// Exports matching records as CSV text.
    ///
    /// The header row is always present; NULL cells export as the
    /// empty string.
    pub async fn export(&self, table: &str, filters: &Map<String, Json>) -> TrellisResult<String> {
        let desc = self.registry.describe(table)?;
        let mut selection = filter_selection(&desc, filters, None)?;
        if let Some(pk) = desc.primary_key.clone() {
            selection = selection.with_order(pk, SortOrder::Desc);
        }

        let rows = self
            .store
            .select(&selection)
            .await
            .map_err(|e| normalize_store_error(&desc, e, None))?;

        let columns: Vec<&str> = desc.export_columns().collect();
        let mut writer = WriterBuilder::new().from_writer(Vec::new());
        writer.write_record(&columns).map_err(write_error)?;
        for row in &rows {
            let cells: Vec<String> = columns
                .iter()
                .map(|col| {
                    let value = row.get(*col).unwrap_or(&Value::Null);
                    desc.field(col)
                        .map(|f| coerce_for_read(f, value))
                        .unwrap_or_default()
                })
                .collect();
            writer.write_record(&cells).map_err(write_error)?;
        }

        let bytes = writer.into_inner().map_err(|e| TrellisError::Parse {
            message: e.to_string(),
        })?;
        debug!(table, rows = rows.len(), "csv export built");
        String::from_utf8(bytes).map_err(|e| TrellisError::Parse {
            message: e.to_string(),
        })
    }

    /// Loads the complex lookup into an id-to-description map.
    async fn load_complex_names(&self) -> TrellisResult<HashMap<i64, String>> {
        let desc = self.registry.describe("complex")?;
        let rows = self
            .store
            .select(&Selection::all("complex"))
            .await
            .map_err(|e| normalize_store_error(&desc, e, None))?;
        let mut names = HashMap::new();
        for row in rows {
            if let (Some(id), Some(text)) = (
                row.get("id").and_then(Value::to_i64),
                row.get("desc").and_then(Value::to_text),
            ) {
                names.insert(id, text);
            }
        }
        Ok(names)
    }
}

/// Rewrites numeric `complex_N` cells to the referenced description.
///
/// Spreadsheets exported from the legacy system carry complex ids in
/// these slots; ids that resolve are replaced in place, anything else
/// passes through unchanged.
fn resolve_complex_slots(
    desc: &TableDescriptor,
    names: &HashMap<i64, String>,
    body: &mut Map<String, Json>,
) {
    if !desc.resolve_complex_slots || names.is_empty() {
        return;
    }
    for field in desc.fields.iter().filter(|f| f.slot) {
        if !field.name.starts_with("complex_") {
            continue;
        }
        let Some(Json::String(cell)) = body.get(&field.name) else {
            continue;
        };
        if let Some(name) = cell.trim().parse::<i64>().ok().and_then(|id| names.get(&id)) {
            body.insert(field.name.clone(), Json::String(name.clone()));
        }
    }
}

/// Rough typed view of a raw row, for error diagnostics only.
fn body_as_record(desc: &TableDescriptor, body: &Map<String, Json>) -> Record {
    body.iter()
        .filter_map(|(k, v)| {
            let field = desc.field(k)?;
            Some((k.clone(), crate::coerce::coerce_for_write(field, v)))
        })
        .collect()
}

fn write_error(e: csv::Error) -> TrellisError {
    TrellisError::Parse {
        message: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_schema::production_catalog;
    use trellis_store::MemoryStore;

    fn pipeline() -> CsvPipeline {
        let registry = Arc::new(production_catalog());
        let store = Arc::new(MemoryStore::new(Arc::clone(&registry)));
        CsvPipeline::new(registry, store)
    }

    const INK_HEADER: &str =
        "code_number,supplier,color,code,pal_number,batch_palet_number,date,is_finished";

    #[tokio::test]
    async fn test_import_commits_survivors_and_reports_failures() {
        let p = pipeline();
        let csv = format!(
            "{INK_HEADER}\n\
             INK-1,ChemCo,Cyan,C1,,,2024-01-10,false\n\
             INK-1,ChemCo,Cyan,C1,,,2024-01-10,false\n\
             INK-2,ChemCo,Magenta,C2,,,2024-01-11,yes\n"
        );
        let outcome = p.import("ink", csv.as_bytes()).await.unwrap();
        assert_eq!(outcome.total_rows, 3);
        assert_eq!(outcome.imported_rows, 2);
        assert_eq!(outcome.errors.len(), 1);
        let err = &outcome.errors[0];
        assert_eq!(err.row, 3);
        assert_eq!(err.field.as_deref(), Some("code_number"));
        assert!(err.message.contains("INK-1"));
    }

    #[tokio::test]
    async fn test_import_rejects_missing_columns_upfront() {
        let p = pipeline();
        let csv = "code_number,supplier\nINK-1,ChemCo\n";
        let err = p.import("ink", csv.as_bytes()).await.unwrap_err();
        match err {
            TrellisError::MissingColumns { columns } => {
                assert!(columns.contains(&"color".to_string()));
                assert!(columns.contains(&"date".to_string()));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_import_headers_are_case_insensitive() {
        let p = pipeline();
        let csv = format!(
            "{}\nINK-1,ChemCo,Cyan,C1,,,2024-01-10,true\n",
            INK_HEADER.to_uppercase()
        );
        let outcome = p.import("ink", csv.as_bytes()).await.unwrap();
        assert_eq!(outcome.imported_rows, 1);
        assert_eq!(
            outcome.records[0].get("is_finished"),
            Some(&Value::Bool(true))
        );
    }

    #[tokio::test]
    async fn test_import_blank_cells_take_typed_defaults() {
        let p = pipeline();
        let csv = "order_number,batch_number,machine,customer_name,operator_name,\
                   zipper_number,slider_number,date,speed,uom,quantity,waste,notes\n\
                   ORD-1,B1,M1,Acme,Ravi,,,,,,,,\n";
        let outcome = p.import("cutting", csv.as_bytes()).await.unwrap();
        assert_eq!(outcome.imported_rows, 1);
        let rec = &outcome.records[0];
        assert_eq!(rec.get("date"), Some(&Value::Null));
        assert_eq!(rec.get("quantity"), Some(&Value::Float(0.0)));
        assert_eq!(rec.get("notes"), Some(&Value::String(String::new())));
    }

    #[tokio::test]
    async fn test_export_empty_table_still_has_header() {
        let p = pipeline();
        let csv = p.export("ink", &Map::new()).await.unwrap();
        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some(INK_HEADER));
        assert_eq!(lines.next(), None);
    }

    #[tokio::test]
    async fn test_export_round_trips_imported_rows() {
        let p = pipeline();
        let csv = format!("{INK_HEADER}\nINK-1,ChemCo,Cyan,C1,,,2024-01-10,false\n");
        p.import("ink", csv.as_bytes()).await.unwrap();

        let exported = p.export("ink", &Map::new()).await.unwrap();
        let lines: Vec<&str> = exported.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].starts_with("INK-1,ChemCo,Cyan,C1,,,2024-01-10,false"));
    }
}
