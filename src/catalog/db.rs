//! The database catalog.
//!
//! [`Db`] maps relation names to published [`Table`] handles. It is an
//! explicit handle threaded into the resolver and executor rather than
//! process-global state. Reads are shared across connections; DDL swaps
//! whole table handles under a write lock (the surrounding server
//! serializes DDL).

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use super::error::CatalogError;
use super::table::{IndexMeta, Table, TableMeta};

/// Name → table catalog.
#[derive(Default)]
pub struct Db {
    tables: RwLock<HashMap<String, Arc<Table>>>,
}

impl Db {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up a table by name.
    pub fn find_table(&self, name: &str) -> Option<Arc<Table>> {
        self.tables.read().get(name).cloned()
    }

    /// Returns all table names in sorted order.
    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Publishes a new table.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::TableExists`] if the name is taken.
    pub fn create_table(&self, meta: TableMeta) -> Result<Arc<Table>, CatalogError> {
        let mut tables = self.tables.write();
        if tables.contains_key(&meta.name) {
            return Err(CatalogError::TableExists {
                name: meta.name.clone(),
            });
        }
        let table = Arc::new(Table::new(meta));
        tables.insert(table.name().to_string(), table.clone());
        Ok(table)
    }

    /// Removes a table.
    pub fn drop_table(&self, name: &str) -> Result<Arc<Table>, CatalogError> {
        self.tables
            .write()
            .remove(name)
            .ok_or_else(|| CatalogError::TableNotFound {
                name: name.to_string(),
            })
    }

    /// Adds an index to a table, republishing the handle.
    ///
    /// Readers holding the old `Arc<Table>` keep a consistent view; the
    /// next lookup sees the new index list.
    pub fn add_index(&self, table_name: &str, index: IndexMeta) -> Result<Arc<Table>, CatalogError> {
        let mut tables = self.tables.write();
        let table = tables
            .get(table_name)
            .ok_or_else(|| CatalogError::TableNotFound {
                name: table_name.to_string(),
            })?;
        if tables.values().any(|t| t.find_index(&index.name).is_some()) {
            return Err(CatalogError::IndexExists {
                name: index.name.clone(),
            });
        }
        for field in &index.fields {
            if table.meta.field(field).is_none() {
                return Err(CatalogError::FieldNotFound {
                    table: table_name.to_string(),
                    field: field.clone(),
                });
            }
        }
        let mut updated = (**table).clone();
        updated.indexes.push(index);
        let updated = Arc::new(updated);
        tables.insert(table_name.to_string(), updated.clone());
        Ok(updated)
    }

    /// Removes an index by name, wherever it lives.
    ///
    /// Returns the owning table's updated handle.
    pub fn remove_index(&self, index_name: &str) -> Result<Arc<Table>, CatalogError> {
        let mut tables = self.tables.write();
        let owner = tables
            .iter()
            .find(|(_, t)| t.find_index(index_name).is_some())
            .map(|(name, _)| name.clone())
            .ok_or_else(|| CatalogError::IndexNotFound {
                name: index_name.to_string(),
            })?;
        let Some(existing) = tables.get(&owner) else {
            return Err(CatalogError::IndexNotFound {
                name: index_name.to_string(),
            });
        };
        let mut updated = (**existing).clone();
        updated.indexes.retain(|idx| idx.name != index_name);
        let updated = Arc::new(updated);
        tables.insert(owner, updated.clone());
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::field::FieldDef;
    use crate::catalog::table::StorageFormat;
    use crate::types::AttrType;

    fn meta(name: &str) -> TableMeta {
        TableMeta::new(
            name,
            &[FieldDef {
                name: "id".into(),
                attr_type: AttrType::Ints,
                len: 4,
                nullable: false,
            }],
            StorageFormat::Row,
        )
        .unwrap()
    }

    #[test]
    fn test_create_find_drop() {
        let db = Db::new();
        db.create_table(meta("t")).unwrap();
        assert!(db.find_table("t").is_some());
        assert!(db.find_table("u").is_none());

        assert!(matches!(
            db.create_table(meta("t")),
            Err(CatalogError::TableExists { .. })
        ));

        db.drop_table("t").unwrap();
        assert!(db.find_table("t").is_none());
        assert!(matches!(
            db.drop_table("t"),
            Err(CatalogError::TableNotFound { .. })
        ));
    }

    #[test]
    fn test_table_names_sorted() {
        let db = Db::new();
        db.create_table(meta("b")).unwrap();
        db.create_table(meta("a")).unwrap();
        assert_eq!(db.table_names(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_add_index_republishes() {
        let db = Db::new();
        db.create_table(meta("t")).unwrap();
        let before = db.find_table("t").unwrap();

        db.add_index(
            "t",
            IndexMeta {
                name: "idx".into(),
                unique: false,
                fields: vec!["id".into()],
            },
        )
        .unwrap();

        // The old handle is unchanged; the new one carries the index.
        assert!(before.indexes.is_empty());
        assert_eq!(db.find_table("t").unwrap().indexes.len(), 1);
    }

    #[test]
    fn test_add_index_validation() {
        let db = Db::new();
        db.create_table(meta("t")).unwrap();
        let idx = IndexMeta {
            name: "idx".into(),
            unique: false,
            fields: vec!["id".into()],
        };
        db.add_index("t", idx.clone()).unwrap();

        assert!(matches!(
            db.add_index("t", idx.clone()),
            Err(CatalogError::IndexExists { .. })
        ));
        assert!(matches!(
            db.add_index("missing", idx),
            Err(CatalogError::TableNotFound { .. })
        ));
        assert!(matches!(
            db.add_index(
                "t",
                IndexMeta {
                    name: "idx2".into(),
                    unique: false,
                    fields: vec!["nope".into()],
                }
            ),
            Err(CatalogError::FieldNotFound { .. })
        ));
    }

    #[test]
    fn test_remove_index() {
        let db = Db::new();
        db.create_table(meta("t")).unwrap();
        db.add_index(
            "t",
            IndexMeta {
                name: "idx".into(),
                unique: false,
                fields: vec!["id".into()],
            },
        )
        .unwrap();

        db.remove_index("idx").unwrap();
        assert!(db.find_table("t").unwrap().indexes.is_empty());
        assert!(matches!(
            db.remove_index("idx"),
            Err(CatalogError::IndexNotFound { .. })
        ));
    }
}
