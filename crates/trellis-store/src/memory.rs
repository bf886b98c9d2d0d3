//! In-memory reference store.
//!
//! `MemoryStore` backs tests and development deployments. It enforces
//! the same constraints a production relational store would (generated
//! primary keys, unique keys, foreign keys) and deliberately reports
//! constraint failures with MySQL-style message text, because the
//! engine's duplicate-key diagnosis works from that text when a driver
//! gives it nothing structured.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use trellis_common::{Record, Value};
use trellis_schema::{Role, SchemaRegistry, TableDescriptor};

use crate::error::{StoreError, StoreResult};
use crate::selection::{Selection, SortOrder};
use crate::store::{JobTransaction, Store};

/// Per-table row storage.
#[derive(Debug, Default)]
struct TableData {
    rows: Vec<Record>,
    next_id: i64,
}

/// An in-memory store over a schema registry.
#[derive(Clone)]
pub struct MemoryStore {
    registry: Arc<SchemaRegistry>,
    tables: Arc<RwLock<HashMap<String, TableData>>>,
}

impl MemoryStore {
    /// Creates an empty store with one table per registry entry.
    #[must_use]
    pub fn new(registry: Arc<SchemaRegistry>) -> Self {
        let mut tables = HashMap::new();
        for listing in registry.list(Role::Admin) {
            tables.insert(
                listing.name,
                TableData {
                    rows: Vec::new(),
                    next_id: 1,
                },
            );
        }
        Self {
            registry,
            tables: Arc::new(RwLock::new(tables)),
        }
    }

    fn descriptor(&self, table: &str) -> StoreResult<Arc<TableDescriptor>> {
        self.registry
            .describe(table)
            .map_err(|_| StoreError::TableNotFound(table.to_string()))
    }

    /// Checks uniqueness and foreign keys for `record` against the
    /// committed rows plus any `staged` rows of an open job, and
    /// fills in a generated primary key.
    fn prepare_insert(
        desc: &TableDescriptor,
        tables: &mut HashMap<String, TableData>,
        staged: &[Record],
        mut record: Record,
    ) -> StoreResult<Record> {
        // Generated primary key: allocate eagerly, like a real
        // auto-increment column (a later failure burns the id).
        if let (Some(pk), true) = (desc.primary_key.as_deref(), desc.primary_key_generated()) {
            let data = tables
                .get_mut(&desc.name)
                .ok_or_else(|| StoreError::TableNotFound(desc.name.clone()))?;
            let id = data.next_id;
            data.next_id += 1;
            record.insert(pk.to_string(), Value::Integer(id));
        } else if let Some(pk) = desc.primary_key.as_deref() {
            // Natural primary key: enforce uniqueness.
            let new = record.get(pk).cloned().unwrap_or(Value::Null);
            let data = tables
                .get(&desc.name)
                .ok_or_else(|| StoreError::TableNotFound(desc.name.clone()))?;
            let clash = data
                .rows
                .iter()
                .chain(staged.iter())
                .any(|row| row.get(pk).is_some_and(|v| *v == new));
            if clash {
                return Err(StoreError::UniqueViolation {
                    message: duplicate_entry_message(&new, &desc.name, pk),
                    fields: vec![pk.to_string()],
                });
            }
        }

        // Foreign keys: every non-null referencing value must exist in
        // the referenced table.
        for field in &desc.fields {
            let Some(fk) = &field.reference else { continue };
            let Some(value) = record.get(&field.name) else {
                continue;
            };
            if value.is_null() {
                continue;
            }
            let referenced = tables
                .get(&fk.table)
                .ok_or_else(|| StoreError::TableNotFound(fk.table.clone()))?;
            let exists = referenced
                .rows
                .iter()
                .any(|row| row.get(&fk.field).is_some_and(|v| v == value));
            if !exists {
                return Err(StoreError::ForeignKeyViolation {
                    message: foreign_key_message(&desc.name, &field.name, &fk.table, &fk.field),
                });
            }
        }

        Ok(record)
    }

    fn matching_rows<'a>(selection: &Selection, rows: &'a [Record]) -> Vec<&'a Record> {
        rows.iter()
            .filter(|row| row_matches(selection, row))
            .collect()
    }
}

fn row_matches(selection: &Selection, row: &Record) -> bool {
    for filter in &selection.filters {
        let cell = row.get(&filter.field).cloned().unwrap_or(Value::Null);
        if cell != filter.value {
            return false;
        }
    }
    if let Some(search) = &selection.search {
        let needle = search.term.to_lowercase();
        let hit = search.fields.iter().any(|field| {
            row.get(field)
                .and_then(Value::to_text)
                .is_some_and(|text| text.to_lowercase().contains(&needle))
        });
        if !hit {
            return false;
        }
    }
    true
}

fn sort_rows(rows: &mut [&Record], field: &str, order: SortOrder) {
    rows.sort_by(|a, b| {
        let av = a.get(field).cloned().unwrap_or(Value::Null);
        let bv = b.get(field).cloned().unwrap_or(Value::Null);
        match order {
            SortOrder::Asc => av.cmp(&bv),
            SortOrder::Desc => bv.cmp(&av),
        }
    });
}

fn project(record: &Record, projection: Option<&Vec<String>>) -> Record {
    match projection {
        None => record.clone(),
        Some(columns) => columns
            .iter()
            .filter_map(|c| record.get(c).map(|v| (c.clone(), v.clone())))
            .collect(),
    }
}

/// MySQL duplicate-entry message text.
fn duplicate_entry_message(value: &Value, table: &str, field: &str) -> String {
    format!(
        "Duplicate entry '{}' for key '{table}.{field}'",
        value.to_text().unwrap_or_default()
    )
}

/// MySQL foreign-key failure message text.
fn foreign_key_message(table: &str, field: &str, ref_table: &str, ref_field: &str) -> String {
    format!(
        "Cannot add or update a child row: a foreign key constraint fails \
         (`{table}`, CONSTRAINT `{table}_{field}_fk` FOREIGN KEY (`{field}`) \
         REFERENCES `{ref_table}` (`{ref_field}`))"
    )
}

#[async_trait]
impl Store for MemoryStore {
    async fn select(&self, selection: &Selection) -> StoreResult<Vec<Record>> {
        let tables = self.tables.read();
        let data = tables
            .get(&selection.table)
            .ok_or_else(|| StoreError::TableNotFound(selection.table.clone()))?;

        let mut matched = Self::matching_rows(selection, &data.rows);
        if let Some((field, order)) = &selection.order_by {
            sort_rows(&mut matched, field, *order);
        }

        let offset = selection.offset.unwrap_or(0) as usize;
        let limit = selection.limit.map_or(usize::MAX, |l| l as usize);
        Ok(matched
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|row| project(row, selection.projection.as_ref()))
            .collect())
    }

    async fn count(&self, selection: &Selection) -> StoreResult<u64> {
        let tables = self.tables.read();
        let data = tables
            .get(&selection.table)
            .ok_or_else(|| StoreError::TableNotFound(selection.table.clone()))?;
        Ok(Self::matching_rows(selection, &data.rows).len() as u64)
    }

    async fn insert(&self, table: &str, record: Record) -> StoreResult<Record> {
        let desc = self.descriptor(table)?;
        let mut tables = self.tables.write();
        let record = Self::prepare_insert(&desc, &mut tables, &[], record)?;
        tables
            .get_mut(table)
            .ok_or_else(|| StoreError::TableNotFound(table.to_string()))?
            .rows
            .push(record.clone());
        Ok(record)
    }

    async fn update(
        &self,
        table: &str,
        pk_field: &str,
        id: &Value,
        changes: Record,
    ) -> StoreResult<Option<Record>> {
        let desc = self.descriptor(table)?;
        let mut tables = self.tables.write();

        let Some(position) = tables
            .get(table)
            .ok_or_else(|| StoreError::TableNotFound(table.to_string()))?
            .rows
            .iter()
            .position(|row| row.get(pk_field).is_some_and(|v| v == id))
        else {
            return Ok(None);
        };

        // A natural primary key changing value must stay unique.
        if let Some(new_pk) = changes.get(pk_field) {
            if new_pk != id {
                let clash = tables[table]
                    .rows
                    .iter()
                    .enumerate()
                    .any(|(i, row)| i != position && row.get(pk_field).is_some_and(|v| v == new_pk));
                if clash {
                    return Err(StoreError::UniqueViolation {
                        message: duplicate_entry_message(new_pk, table, pk_field),
                        fields: vec![pk_field.to_string()],
                    });
                }
            }
        }

        // Foreign keys on changed fields.
        for field in &desc.fields {
            let Some(fk) = &field.reference else { continue };
            let Some(value) = changes.get(&field.name) else {
                continue;
            };
            if value.is_null() {
                continue;
            }
            let referenced = tables
                .get(&fk.table)
                .ok_or_else(|| StoreError::TableNotFound(fk.table.clone()))?;
            let exists = referenced
                .rows
                .iter()
                .any(|row| row.get(&fk.field).is_some_and(|v| v == value));
            if !exists {
                return Err(StoreError::ForeignKeyViolation {
                    message: foreign_key_message(table, &field.name, &fk.table, &fk.field),
                });
            }
        }

        let data = tables
            .get_mut(table)
            .ok_or_else(|| StoreError::TableNotFound(table.to_string()))?;
        let row = &mut data.rows[position];
        for (key, value) in changes {
            row.insert(key, value);
        }
        Ok(Some(row.clone()))
    }

    async fn delete(&self, table: &str, pk_field: &str, id: &Value) -> StoreResult<bool> {
        let mut tables = self.tables.write();
        let data = tables
            .get_mut(table)
            .ok_or_else(|| StoreError::TableNotFound(table.to_string()))?;
        let before = data.rows.len();
        data.rows
            .retain(|row| !row.get(pk_field).is_some_and(|v| v == id));
        Ok(data.rows.len() < before)
    }

    async fn begin_job(&self, table: &str) -> StoreResult<Box<dyn JobTransaction>> {
        let desc = self.descriptor(table)?;
        Ok(Box::new(MemoryJob {
            store: self.clone(),
            desc,
            staged: Vec::new(),
        }))
    }
}

/// A staged bulk-insert job against a `MemoryStore`.
struct MemoryJob {
    store: MemoryStore,
    desc: Arc<TableDescriptor>,
    staged: Vec<Record>,
}

#[async_trait]
impl JobTransaction for MemoryJob {
    async fn insert(&mut self, record: Record) -> StoreResult<Record> {
        let mut tables = self.store.tables.write();
        let record =
            MemoryStore::prepare_insert(&self.desc, &mut tables, &self.staged, record)?;
        self.staged.push(record.clone());
        Ok(record)
    }

    async fn commit(self: Box<Self>) -> StoreResult<u64> {
        let mut tables = self.store.tables.write();
        let data = tables
            .get_mut(&self.desc.name)
            .ok_or_else(|| StoreError::TableNotFound(self.desc.name.clone()))?;
        let committed = self.staged.len() as u64;
        data.rows.extend(self.staged);
        Ok(committed)
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        Ok(())
    }
}
