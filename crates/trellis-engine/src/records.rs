//! Metadata-driven record CRUD.
//!
//! Every operation here works off a `TableDescriptor`: input bodies
//! are reduced to declared fields and coerced per field type, store
//! errors are translated into field-level diagnostics, and nothing in
//! this module knows any table by name.

use std::sync::Arc;

use serde_json::{Map, Value as Json};
use tracing::{debug, warn};

use trellis_common::{Record, TrellisError, TrellisResult, Value};
use trellis_schema::{SchemaRegistry, TableDescriptor};
use trellis_store::{Selection, Store, StoreError};

use crate::coerce::coerce_for_write;
use crate::query::{build_selection, Pagination, RecordPage, RecordQuery};

/// CRUD over any registered table.
#[derive(Clone)]
pub struct RecordService {
    registry: Arc<SchemaRegistry>,
    store: Arc<dyn Store>,
}

impl RecordService {
    /// Creates a service over the given registry and store.
    #[must_use]
    pub fn new(registry: Arc<SchemaRegistry>, store: Arc<dyn Store>) -> Self {
        Self { registry, store }
    }

    /// Lists one page of records with filters, search, and sorting.
    pub async fn list(&self, table: &str, query: &RecordQuery) -> TrellisResult<RecordPage> {
        let desc = self.registry.describe(table)?;
        let selection = build_selection(&desc, query)?;

        let records = self
            .store
            .select(&selection)
            .await
            .map_err(|e| normalize_store_error(&desc, e, None))?;
        let total = self
            .store
            .count(&selection)
            .await
            .map_err(|e| normalize_store_error(&desc, e, None))?;

        debug!(table, total, page = query.page, "listed records");
        Ok(RecordPage {
            records,
            pagination: Pagination::new(query, total),
        })
    }

    /// Fetches one record by its primary key.
    pub async fn get_one(&self, table: &str, id: &str) -> TrellisResult<Record> {
        let desc = self.registry.describe(table)?;
        let (pk, key) = primary_key_value(&desc, id)?;

        let selection = Selection::all(desc.name.clone())
            .with_filter(pk, key)
            .with_limit(1);
        let mut rows = self
            .store
            .select(&selection)
            .await
            .map_err(|e| normalize_store_error(&desc, e, None))?;
        rows.pop().ok_or_else(|| TrellisError::RecordNotFound {
            table: desc.name.clone(),
            id: id.to_string(),
        })
    }

    /// Creates a record from a JSON body.
    ///
    /// Unknown keys are ignored; generated fields cannot be supplied.
    pub async fn create(&self, table: &str, body: &Map<String, Json>) -> TrellisResult<Record> {
        let desc = self.registry.describe(table)?;
        let record = coerce_input(&desc, body, true)?;

        let stored = self
            .store
            .insert(&desc.name, record.clone())
            .await
            .map_err(|e| normalize_store_error(&desc, e, Some(&record)))?;
        debug!(table, "created record");
        Ok(stored)
    }

    /// Applies a partial update to one record.
    pub async fn update(
        &self,
        table: &str,
        id: &str,
        body: &Map<String, Json>,
    ) -> TrellisResult<Record> {
        let desc = self.registry.describe(table)?;
        let (pk, key) = primary_key_value(&desc, id)?;
        let changes = coerce_input(&desc, body, false)?;

        let updated = self
            .store
            .update(&desc.name, &pk, &key, changes.clone())
            .await
            .map_err(|e| normalize_store_error(&desc, e, Some(&changes)))?;
        updated.ok_or_else(|| TrellisError::RecordNotFound {
            table: desc.name.clone(),
            id: id.to_string(),
        })
    }

    /// Deletes one record by its primary key.
    pub async fn delete(&self, table: &str, id: &str) -> TrellisResult<()> {
        let desc = self.registry.describe(table)?;
        let (pk, key) = primary_key_value(&desc, id)?;

        let removed = self
            .store
            .delete(&desc.name, &pk, &key)
            .await
            .map_err(|e| normalize_store_error(&desc, e, None))?;
        if removed {
            debug!(table, id, "deleted record");
            Ok(())
        } else {
            Err(TrellisError::RecordNotFound {
                table: desc.name.clone(),
                id: id.to_string(),
            })
        }
    }
}

/// Resolves a table's primary key name and the typed key value for a
/// raw path segment.
///
/// An unparseable id on an integer key behaves like a missing record
/// rather than a malformed request.
pub(crate) fn primary_key_value(
    desc: &TableDescriptor,
    raw: &str,
) -> TrellisResult<(String, Value)> {
    let pk = desc.primary_key.clone().ok_or_else(|| TrellisError::Schema {
        table: desc.name.clone(),
        message: "table has no primary key".to_string(),
    })?;
    let value = match desc.field(&pk).map(|f| f.logical_type) {
        Some(t) if t.is_numeric() => raw
            .trim()
            .parse::<i64>()
            .map(Value::Integer)
            .map_err(|_| TrellisError::RecordNotFound {
                table: desc.name.clone(),
                id: raw.to_string(),
            })?,
        _ => Value::String(raw.to_string()),
    };
    Ok((pk, value))
}

/// Reduces a JSON body to the table's declared fields, coercing each
/// value per its field type.
///
/// With `require_all`, a missing non-nullable field is a validation
/// error; date fields are exempt because blank dates store as NULL at
/// every other entry point.
pub(crate) fn coerce_input(
    desc: &TableDescriptor,
    body: &Map<String, Json>,
    require_all: bool,
) -> TrellisResult<Record> {
    let mut record = Record::new();
    for field in &desc.fields {
        if field.generated {
            continue;
        }
        match body.get(&field.name) {
            Some(raw) => {
                record.insert(field.name.clone(), coerce_for_write(field, raw));
            }
            None if require_all
                && !field.nullable
                && !field.slot
                && !field.logical_type.is_date() =>
            {
                return Err(TrellisError::Validation {
                    field: field.name.clone(),
                    message: "cannot be null".to_string(),
                });
            }
            None => {}
        }
    }
    Ok(record)
}

/// Translates a store-level failure into the engine's diagnostic
/// vocabulary.
///
/// Duplicate-key failures carry only driver text, so the offending
/// value is read back out of the quoted message and the field comes
/// from the constraint hint when the driver supplies one, falling
/// back to the table's natural key.
pub(crate) fn normalize_store_error(
    desc: &TableDescriptor,
    err: StoreError,
    attempted: Option<&Record>,
) -> TrellisError {
    match err {
        StoreError::TableNotFound(table) => TrellisError::UnknownTable { table },
        StoreError::UniqueViolation { message, fields } => {
            let field = fields
                .first()
                .cloned()
                .or_else(|| desc.natural_key.clone())
                .or_else(|| desc.primary_key.clone())
                .unwrap_or_else(|| "code_number".to_string());
            let value = quoted_after(&message, "Duplicate entry '")
                .map(str::to_string)
                .or_else(|| attempted.and_then(|r| r.get(&field)).and_then(Value::to_text))
                .unwrap_or_default();
            warn!(table = %desc.name, field, value, "duplicate key");
            TrellisError::DuplicateKey { field, value }
        }
        StoreError::ForeignKeyViolation { message } => {
            let field = quoted_after(&message, "FOREIGN KEY (`")
                .map(str::to_string)
                .unwrap_or_default();
            let value = attempted
                .and_then(|r| r.get(&field))
                .and_then(Value::to_text)
                .unwrap_or_default();
            warn!(table = %desc.name, field, value, "foreign key violation");
            TrellisError::Reference { field, value }
        }
        StoreError::Connection(message) => TrellisError::Store { message },
    }
}

/// Returns the text between `prefix` and the next quote-like
/// terminator (`'` or `` ` ``).
fn quoted_after<'a>(message: &'a str, prefix: &str) -> Option<&'a str> {
    let start = message.find(prefix)? + prefix.len();
    let rest = &message[start..];
    let end = rest.find(['\'', '`'])?;
    Some(&rest[..end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use trellis_schema::production_catalog;
    use trellis_store::MemoryStore;

    fn service() -> RecordService {
        let registry = Arc::new(production_catalog());
        let store = Arc::new(MemoryStore::new(Arc::clone(&registry)));
        RecordService::new(registry, store)
    }

    fn cutting_body(order: &str) -> Map<String, Json> {
        let body = json!({
            "order_number": order,
            "batch_number": "B-1",
            "machine": "M1",
            "customer_name": "Acme",
            "operator_name": "Ravi",
            "date": "2024-03-01",
            "quantity": "120.5",
        });
        body.as_object().unwrap().clone()
    }

    #[tokio::test]
    async fn test_create_assigns_id_and_coerces() {
        let svc = service();
        let stored = svc.create("cutting", &cutting_body("ORD-1")).await.unwrap();
        assert_eq!(stored.get("id"), Some(&Value::Integer(1)));
        assert_eq!(stored.get("quantity"), Some(&Value::Float(120.5)));
    }

    #[tokio::test]
    async fn test_create_missing_required_field() {
        let svc = service();
        let mut body = cutting_body("ORD-1");
        body.remove("machine");
        let err = svc.create("cutting", &body).await.unwrap_err();
        assert!(matches!(err, TrellisError::Validation { ref field, .. } if field == "machine"));
    }

    #[tokio::test]
    async fn test_missing_date_is_allowed() {
        let svc = service();
        let mut body = cutting_body("ORD-1");
        body.remove("date");
        assert!(svc.create("cutting", &body).await.is_ok());
    }

    #[tokio::test]
    async fn test_duplicate_natural_key_diagnosed() {
        let svc = service();
        let body = json!({
            "code_number": "INK-9",
            "supplier": "ChemCo",
            "color": "Cyan",
            "code": "C-9",
            "is_finished": false,
        });
        let body = body.as_object().unwrap().clone();
        svc.create("ink", &body).await.unwrap();
        let err = svc.create("ink", &body).await.unwrap_err();
        match err {
            TrellisError::DuplicateKey { field, value } => {
                assert_eq!(field, "code_number");
                assert_eq!(value, "INK-9");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_get_one_bad_integer_id_is_not_found() {
        let svc = service();
        let err = svc.get_one("cutting", "abc").await.unwrap_err();
        assert!(matches!(err, TrellisError::RecordNotFound { .. }));
    }

    #[tokio::test]
    async fn test_partial_update_leaves_other_fields() {
        let svc = service();
        let stored = svc.create("cutting", &cutting_body("ORD-1")).await.unwrap();
        let id = stored.get("id").and_then(Value::to_text).unwrap();

        let patch = json!({"machine": "M2"}).as_object().unwrap().clone();
        let updated = svc.update("cutting", &id, &patch).await.unwrap();
        assert_eq!(updated.get("machine"), Some(&Value::String("M2".into())));
        assert_eq!(
            updated.get("order_number"),
            Some(&Value::String("ORD-1".into()))
        );
    }

    #[tokio::test]
    async fn test_delete_then_get_is_not_found() {
        let svc = service();
        let stored = svc.create("cutting", &cutting_body("ORD-1")).await.unwrap();
        let id = stored.get("id").and_then(Value::to_text).unwrap();
        svc.delete("cutting", &id).await.unwrap();
        assert!(matches!(
            svc.get_one("cutting", &id).await,
            Err(TrellisError::RecordNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_list_paginates_newest_first() {
        let svc = service();
        for i in 1..=12 {
            svc.create("cutting", &cutting_body(&format!("ORD-{i}")))
                .await
                .unwrap();
        }
        let page = svc
            .list("cutting", &RecordQuery::default().with_limit(5))
            .await
            .unwrap();
        assert_eq!(page.records.len(), 5);
        assert_eq!(page.pagination.total, 12);
        assert_eq!(page.pagination.total_pages, 3);
        assert_eq!(page.records[0].get("id"), Some(&Value::Integer(12)));
    }
}
