//! In-memory record manager.
//!
//! [`MemoryEngine`] implements the [`RecordManager`] contract with plain
//! maps and an undo log per transaction: every mutation records its
//! inverse, and rollback replays the inverses in reverse order. Scans
//! snapshot the matching records up front, so a scan is stable regardless
//! of mutations made while it is open.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::catalog::{IndexMeta, Table, TableMeta};

use super::codec;
use super::error::StorageError;
use super::manager::{IndexHint, Record, RecordManager, RecordScanner, Rid};
use super::trx::Trx;

/// An in-memory, undo-logging record manager.
#[derive(Default)]
pub struct MemoryEngine {
    inner: Mutex<Inner>,
    next_rid: AtomicU64,
    next_trx: AtomicU64,
}

#[derive(Default)]
struct Inner {
    tables: HashMap<String, TableStore>,
    active: HashMap<u64, Vec<UndoOp>>,
}

struct TableStore {
    meta: TableMeta,
    rows: BTreeMap<u64, Vec<u8>>,
    indexes: Vec<EngineIndex>,
}

struct EngineIndex {
    name: String,
    unique: bool,
    fields: Vec<String>,
    entries: HashMap<Vec<u8>, Vec<u64>>,
}

enum UndoOp {
    Insert { table: String, rid: u64 },
    Delete { table: String, rid: u64, data: Vec<u8> },
    Update { table: String, rid: u64, old: Vec<u8> },
}

impl MemoryEngine {
    /// Creates an empty engine.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Inner {
    fn store_mut(&mut self, name: &str) -> Result<&mut TableStore, StorageError> {
        self.tables
            .get_mut(name)
            .ok_or_else(|| StorageError::TableMissing {
                name: name.to_string(),
            })
    }

    /// Ensures the transaction is active before any mutation happens, so a
    /// mutation is never applied without its undo record.
    fn check_active(&self, trx: &Trx) -> Result<(), StorageError> {
        if self.active.contains_key(&trx.id) {
            Ok(())
        } else {
            Err(StorageError::TrxNotActive { id: trx.id })
        }
    }

    fn log(&mut self, trx: &Trx, op: UndoOp) -> Result<(), StorageError> {
        self.active
            .get_mut(&trx.id)
            .ok_or(StorageError::TrxNotActive { id: trx.id })?
            .push(op);
        Ok(())
    }
}

impl TableStore {
    /// Inserts a row and its index entries, checking unique indexes first.
    fn raw_insert(&mut self, rid: u64, data: Vec<u8>) -> Result<(), StorageError> {
        for index in &self.indexes {
            let Some(key) = codec::index_key_from_record(&self.meta, &index.fields, &data) else {
                continue;
            };
            if index.unique && index.entries.get(&key).is_some_and(|rids| !rids.is_empty()) {
                return Err(StorageError::DuplicateKey {
                    index: index.name.clone(),
                });
            }
        }
        for index in &mut self.indexes {
            if let Some(key) = codec::index_key_from_record(&self.meta, &index.fields, &data) {
                index.entries.entry(key).or_default().push(rid);
            }
        }
        self.rows.insert(rid, data);
        Ok(())
    }

    /// Removes a row and its index entries, returning the row bytes.
    fn raw_remove(&mut self, rid: u64) -> Result<Vec<u8>, StorageError> {
        let data = self
            .rows
            .remove(&rid)
            .ok_or(StorageError::RecordMissing { rid: Rid(rid) })?;
        for index in &mut self.indexes {
            if let Some(key) = codec::index_key_from_record(&self.meta, &index.fields, &data) {
                if let Some(rids) = index.entries.get_mut(&key) {
                    rids.retain(|&r| r != rid);
                }
            }
        }
        Ok(data)
    }
}

/// Scanner over a snapshot taken at open time.
struct SnapshotScanner {
    records: std::vec::IntoIter<Record>,
}

impl RecordScanner for SnapshotScanner {
    fn next(&mut self) -> Result<Option<Record>, StorageError> {
        Ok(self.records.next())
    }
}

impl RecordManager for MemoryEngine {
    fn begin(&self) -> Trx {
        let id = self.next_trx.fetch_add(1, Ordering::Relaxed) + 1;
        self.inner.lock().active.insert(id, Vec::new());
        Trx { id }
    }

    fn commit(&self, trx: &Trx) -> Result<(), StorageError> {
        self.inner
            .lock()
            .active
            .remove(&trx.id)
            .map(|_| ())
            .ok_or(StorageError::TrxNotActive { id: trx.id })
    }

    fn rollback(&self, trx: &Trx) -> Result<(), StorageError> {
        let mut inner = self.inner.lock();
        let undo = inner
            .active
            .remove(&trx.id)
            .ok_or(StorageError::TrxNotActive { id: trx.id })?;
        for op in undo.into_iter().rev() {
            match op {
                UndoOp::Insert { table, rid } => {
                    // The table may already be gone if the trx also dropped it.
                    if let Ok(store) = inner.store_mut(&table) {
                        let _ = store.raw_remove(rid);
                    }
                }
                UndoOp::Delete { table, rid, data } => {
                    if let Ok(store) = inner.store_mut(&table) {
                        let _ = store.raw_insert(rid, data);
                    }
                }
                UndoOp::Update { table, rid, old } => {
                    if let Ok(store) = inner.store_mut(&table) {
                        let _ = store.raw_remove(rid);
                        let _ = store.raw_insert(rid, old);
                    }
                }
            }
        }
        Ok(())
    }

    fn create_table(&self, table: &Table) -> Result<(), StorageError> {
        let mut inner = self.inner.lock();
        if inner.tables.contains_key(table.name()) {
            return Err(StorageError::InvalidRecord(format!(
                "storage for \"{}\" already exists",
                table.name()
            )));
        }
        inner.tables.insert(
            table.name().to_string(),
            TableStore {
                meta: table.meta.clone(),
                rows: BTreeMap::new(),
                indexes: Vec::new(),
            },
        );
        Ok(())
    }

    fn drop_table(&self, name: &str) -> Result<(), StorageError> {
        self.inner
            .lock()
            .tables
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| StorageError::TableMissing {
                name: name.to_string(),
            })
    }

    fn create_index(
        &self,
        _trx: &Trx,
        table: &Table,
        index: &IndexMeta,
    ) -> Result<(), StorageError> {
        let mut inner = self.inner.lock();
        let store = inner.store_mut(table.name())?;
        let mut entries: HashMap<Vec<u8>, Vec<u64>> = HashMap::new();
        for (&rid, data) in &store.rows {
            let Some(key) = codec::index_key_from_record(&store.meta, &index.fields, data) else {
                continue;
            };
            let rids = entries.entry(key).or_default();
            if index.unique && !rids.is_empty() {
                return Err(StorageError::DuplicateKey {
                    index: index.name.clone(),
                });
            }
            rids.push(rid);
        }
        store.indexes.push(EngineIndex {
            name: index.name.clone(),
            unique: index.unique,
            fields: index.fields.clone(),
            entries,
        });
        Ok(())
    }

    fn drop_index(&self, table: &Table, index_name: &str) -> Result<(), StorageError> {
        let mut inner = self.inner.lock();
        let store = inner.store_mut(table.name())?;
        store.indexes.retain(|idx| idx.name != index_name);
        Ok(())
    }

    fn scan(
        &self,
        _trx: &Trx,
        table: &Table,
        hint: Option<&IndexHint>,
    ) -> Result<Box<dyn RecordScanner>, StorageError> {
        let inner = self.inner.lock();
        let store = inner
            .tables
            .get(table.name())
            .ok_or_else(|| StorageError::TableMissing {
                name: table.name().to_string(),
            })?;

        let records: Vec<Record> = match hint {
            Some(hint) => {
                let index = store
                    .indexes
                    .iter()
                    .find(|idx| idx.name == hint.index)
                    .ok_or_else(|| StorageError::InvalidRecord(format!(
                        "no index \"{}\" on \"{}\"",
                        hint.index,
                        table.name()
                    )))?;
                let mut rids = index.entries.get(&hint.key).cloned().unwrap_or_default();
                rids.sort_unstable();
                rids.into_iter()
                    .filter_map(|rid| {
                        store.rows.get(&rid).map(|data| Record {
                            rid: Rid(rid),
                            data: data.clone(),
                        })
                    })
                    .collect()
            }
            None => store
                .rows
                .iter()
                .map(|(&rid, data)| Record {
                    rid: Rid(rid),
                    data: data.clone(),
                })
                .collect(),
        };

        Ok(Box::new(SnapshotScanner {
            records: records.into_iter(),
        }))
    }

    fn insert_record(
        &self,
        trx: &Trx,
        table: &Table,
        data: Vec<u8>,
    ) -> Result<Rid, StorageError> {
        if data.len() != table.meta.record_size {
            return Err(StorageError::InvalidRecord(format!(
                "record is {} bytes, layout needs {}",
                data.len(),
                table.meta.record_size
            )));
        }
        let rid = self.next_rid.fetch_add(1, Ordering::Relaxed) + 1;
        let mut inner = self.inner.lock();
        inner.check_active(trx)?;
        inner.store_mut(table.name())?.raw_insert(rid, data)?;
        inner.log(
            trx,
            UndoOp::Insert {
                table: table.name().to_string(),
                rid,
            },
        )?;
        Ok(Rid(rid))
    }

    fn delete_record(&self, trx: &Trx, table: &Table, rid: Rid) -> Result<(), StorageError> {
        let mut inner = self.inner.lock();
        inner.check_active(trx)?;
        let data = inner.store_mut(table.name())?.raw_remove(rid.0)?;
        inner.log(
            trx,
            UndoOp::Delete {
                table: table.name().to_string(),
                rid: rid.0,
                data,
            },
        )?;
        Ok(())
    }

    fn update_record(
        &self,
        trx: &Trx,
        table: &Table,
        rid: Rid,
        data: Vec<u8>,
    ) -> Result<(), StorageError> {
        let mut inner = self.inner.lock();
        inner.check_active(trx)?;
        let store = inner.store_mut(table.name())?;
        let old = store.raw_remove(rid.0)?;
        if let Err(err) = store.raw_insert(rid.0, data) {
            // Restore the old row so a failed update is a no-op.
            store
                .raw_insert(rid.0, old)
                .expect("restoring removed row cannot conflict");
            return Err(err);
        }
        inner.log(
            trx,
            UndoOp::Update {
                table: table.name().to_string(),
                rid: rid.0,
                old,
            },
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{FieldDef, StorageFormat};
    use crate::types::{AttrType, Value};

    fn table() -> Table {
        let meta = TableMeta::new(
            "t",
            &[
                FieldDef {
                    name: "id".into(),
                    attr_type: AttrType::Ints,
                    len: 4,
                    nullable: false,
                },
                FieldDef {
                    name: "name".into(),
                    attr_type: AttrType::Chars,
                    len: 8,
                    nullable: true,
                },
            ],
            StorageFormat::Row,
        )
        .unwrap();
        Table::new(meta)
    }

    fn row(table: &Table, id: i32, name: Option<&str>) -> Vec<u8> {
        let values = vec![
            Value::Int(id),
            name.map(|s| Value::Chars(s.into())).unwrap_or(Value::Null),
        ];
        codec::encode(&table.meta, &values).unwrap()
    }

    fn scan_ids(engine: &MemoryEngine, trx: &Trx, table: &Table) -> Vec<i32> {
        let mut scanner = engine.scan(trx, table, None).unwrap();
        let mut ids = Vec::new();
        while let Some(record) = scanner.next().unwrap() {
            match codec::decode_cell(&table.meta, 0, &record.data).unwrap() {
                Value::Int(n) => ids.push(n),
                other => panic!("unexpected {:?}", other),
            }
        }
        ids
    }

    #[test]
    fn test_insert_scan() {
        let engine = MemoryEngine::new();
        let table = table();
        engine.create_table(&table).unwrap();

        let trx = engine.begin();
        engine
            .insert_record(&trx, &table, row(&table, 1, Some("a")))
            .unwrap();
        engine
            .insert_record(&trx, &table, row(&table, 2, None))
            .unwrap();
        engine.commit(&trx).unwrap();

        let trx = engine.begin();
        assert_eq!(scan_ids(&engine, &trx, &table), vec![1, 2]);
    }

    #[test]
    fn test_delete_update() {
        let engine = MemoryEngine::new();
        let table = table();
        engine.create_table(&table).unwrap();

        let trx = engine.begin();
        let r1 = engine
            .insert_record(&trx, &table, row(&table, 1, Some("a")))
            .unwrap();
        let r2 = engine
            .insert_record(&trx, &table, row(&table, 2, Some("b")))
            .unwrap();
        engine.delete_record(&trx, &table, r1).unwrap();
        engine
            .update_record(&trx, &table, r2, row(&table, 20, Some("b2")))
            .unwrap();
        engine.commit(&trx).unwrap();

        let trx = engine.begin();
        assert_eq!(scan_ids(&engine, &trx, &table), vec![20]);
    }

    #[test]
    fn test_rollback_restores_everything() {
        let engine = MemoryEngine::new();
        let table = table();
        engine.create_table(&table).unwrap();

        let setup = engine.begin();
        let r1 = engine
            .insert_record(&setup, &table, row(&table, 1, Some("a")))
            .unwrap();
        engine.commit(&setup).unwrap();

        let trx = engine.begin();
        engine
            .insert_record(&trx, &table, row(&table, 2, Some("b")))
            .unwrap();
        engine
            .update_record(&trx, &table, r1, row(&table, 10, Some("a2")))
            .unwrap();
        engine.rollback(&trx).unwrap();

        let trx = engine.begin();
        assert_eq!(scan_ids(&engine, &trx, &table), vec![1]);
    }

    #[test]
    fn test_unique_index_rejects_duplicates() {
        let engine = MemoryEngine::new();
        let table = table();
        engine.create_table(&table).unwrap();

        let trx = engine.begin();
        engine
            .insert_record(&trx, &table, row(&table, 1, Some("a")))
            .unwrap();
        let index = IndexMeta {
            name: "idx_id".into(),
            unique: true,
            fields: vec!["id".into()],
        };
        engine.create_index(&trx, &table, &index).unwrap();

        let err = engine
            .insert_record(&trx, &table, row(&table, 1, Some("dup")))
            .unwrap_err();
        assert!(matches!(err, StorageError::DuplicateKey { .. }));

        // Different key still inserts.
        engine
            .insert_record(&trx, &table, row(&table, 2, Some("b")))
            .unwrap();
    }

    #[test]
    fn test_create_unique_index_on_duplicate_data_fails() {
        let engine = MemoryEngine::new();
        let table = table();
        engine.create_table(&table).unwrap();

        let trx = engine.begin();
        engine
            .insert_record(&trx, &table, row(&table, 1, Some("a")))
            .unwrap();
        engine
            .insert_record(&trx, &table, row(&table, 1, Some("b")))
            .unwrap();

        let index = IndexMeta {
            name: "idx_id".into(),
            unique: true,
            fields: vec!["id".into()],
        };
        assert!(matches!(
            engine.create_index(&trx, &table, &index),
            Err(StorageError::DuplicateKey { .. })
        ));
    }

    #[test]
    fn test_index_scan_matches_table_scan() {
        let engine = MemoryEngine::new();
        let table = table();
        engine.create_table(&table).unwrap();

        let trx = engine.begin();
        for id in [1, 2, 2, 3] {
            engine
                .insert_record(&trx, &table, row(&table, id, Some("x")))
                .unwrap();
        }
        let index = IndexMeta {
            name: "idx_id".into(),
            unique: false,
            fields: vec!["id".into()],
        };
        engine.create_index(&trx, &table, &index).unwrap();

        let key =
            codec::index_key_from_values(&table.meta, &["id".to_string()], &[Value::Int(2)])
                .unwrap();
        let hint = IndexHint {
            index: "idx_id".into(),
            key,
        };
        let mut scanner = engine.scan(&trx, &table, Some(&hint)).unwrap();
        let mut count = 0;
        while let Some(record) = scanner.next().unwrap() {
            assert_eq!(
                codec::decode_cell(&table.meta, 0, &record.data).unwrap(),
                Value::Int(2)
            );
            count += 1;
        }
        assert_eq!(count, 2);
    }

    #[test]
    fn test_failed_update_is_noop() {
        let engine = MemoryEngine::new();
        let table = table();
        engine.create_table(&table).unwrap();

        let trx = engine.begin();
        engine
            .insert_record(&trx, &table, row(&table, 1, Some("a")))
            .unwrap();
        let r2 = engine
            .insert_record(&trx, &table, row(&table, 2, Some("b")))
            .unwrap();
        let index = IndexMeta {
            name: "idx_id".into(),
            unique: true,
            fields: vec!["id".into()],
        };
        engine.create_index(&trx, &table, &index).unwrap();

        // Updating row 2 to collide with row 1 must fail and keep row 2.
        let err = engine
            .update_record(&trx, &table, r2, row(&table, 1, Some("clash")))
            .unwrap_err();
        assert!(matches!(err, StorageError::DuplicateKey { .. }));
        assert_eq!(scan_ids(&engine, &trx, &table), vec![1, 2]);
    }

    #[test]
    fn test_mutation_requires_active_trx() {
        let engine = MemoryEngine::new();
        let table = table();
        engine.create_table(&table).unwrap();

        let trx = engine.begin();
        engine.commit(&trx).unwrap();
        assert!(matches!(
            engine.insert_record(&trx, &table, row(&table, 1, None)),
            Err(StorageError::TrxNotActive { .. })
        ));
        assert!(matches!(
            engine.commit(&trx),
            Err(StorageError::TrxNotActive { .. })
        ));
    }
}
