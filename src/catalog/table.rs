//! Table metadata: field layout, indexes, and the table handle.

use crate::types::AttrType;

use super::error::CatalogError;
use super::field::{FieldDef, FieldMeta};

/// Storage format hint recorded at CREATE TABLE time.
///
/// The record manager owns the actual layout; the engine only threads the
/// hint through so a columnar-leaning store can act on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageFormat {
    /// Row-oriented records.
    #[default]
    Row,
    /// Column-grouped records.
    Pax,
}

impl StorageFormat {
    /// Parses the STORAGE FORMAT identifier (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "row" => Some(StorageFormat::Row),
            "pax" => Some(StorageFormat::Pax),
            _ => None,
        }
    }
}

/// Name of the hidden null-bitmap field that precedes user fields.
pub const NULL_BITMAP_FIELD: &str = "__null";

/// Ordered field layout of a relation.
///
/// Field 0 is always the system null-bitmap field (one bit per user field,
/// bit set = value present). User fields follow, so the user-visible field
/// count is `fields.len() - sys_field_num`.
#[derive(Debug, Clone, PartialEq)]
pub struct TableMeta {
    /// Relation name.
    pub name: String,
    /// All fields, system fields first.
    pub fields: Vec<FieldMeta>,
    /// Number of leading system fields.
    pub sys_field_num: usize,
    /// Total record width in bytes.
    pub record_size: usize,
    /// Storage format hint.
    pub storage_format: StorageFormat,
}

impl TableMeta {
    /// Builds the field layout for a new table.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::InvalidTableDef`] for an empty column list,
    /// duplicate column names, a zero-length CHAR, or a column type that is
    /// not storable (BOOL, NULL, UNDEFINED).
    pub fn new(
        name: &str,
        defs: &[FieldDef],
        storage_format: StorageFormat,
    ) -> Result<Self, CatalogError> {
        if defs.is_empty() {
            return Err(CatalogError::InvalidTableDef(
                "table has no columns".to_string(),
            ));
        }
        for (i, def) in defs.iter().enumerate() {
            if defs[..i].iter().any(|d| d.name == def.name) {
                return Err(CatalogError::InvalidTableDef(format!(
                    "duplicate column \"{}\"",
                    def.name
                )));
            }
            match def.attr_type {
                AttrType::Chars => {
                    if def.len == 0 {
                        return Err(CatalogError::InvalidTableDef(format!(
                            "column \"{}\" has zero length",
                            def.name
                        )));
                    }
                }
                AttrType::Ints | AttrType::Floats | AttrType::Dates => {}
                other => {
                    return Err(CatalogError::InvalidTableDef(format!(
                        "column \"{}\" has unsupported type {}",
                        def.name, other
                    )));
                }
            }
        }

        let bitmap_len = defs.len().div_ceil(8);
        let mut fields = Vec::with_capacity(defs.len() + 1);
        fields.push(FieldMeta {
            name: NULL_BITMAP_FIELD.to_string(),
            attr_type: AttrType::Chars,
            offset: 0,
            len: bitmap_len,
            nullable: false,
            field_id: 0,
            system: true,
        });

        let mut offset = bitmap_len;
        for (i, def) in defs.iter().enumerate() {
            let len = def.attr_type.fixed_len().unwrap_or(def.len);
            fields.push(FieldMeta {
                name: def.name.clone(),
                attr_type: def.attr_type,
                offset,
                len,
                nullable: def.nullable,
                field_id: i + 1,
                system: false,
            });
            offset += len;
        }

        Ok(Self {
            name: name.to_string(),
            fields,
            sys_field_num: 1,
            record_size: offset,
            storage_format,
        })
    }

    /// Number of user-visible fields.
    pub fn user_field_num(&self) -> usize {
        self.fields.len() - self.sys_field_num
    }

    /// Returns the i-th user field.
    pub fn user_field(&self, i: usize) -> &FieldMeta {
        &self.fields[i + self.sys_field_num]
    }

    /// Iterates over the user-visible fields.
    pub fn user_fields(&self) -> impl Iterator<Item = &FieldMeta> {
        self.fields.iter().skip(self.sys_field_num)
    }

    /// Finds a field (system or user) by name.
    pub fn field(&self, name: &str) -> Option<&FieldMeta> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Returns the user-field index of the named field.
    pub fn user_index(&self, name: &str) -> Option<usize> {
        self.user_fields().position(|f| f.name == name)
    }
}

/// A secondary index definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexMeta {
    /// Index name, unique per database.
    pub name: String,
    /// Whether duplicate keys are rejected.
    pub unique: bool,
    /// Indexed field names, in key order.
    pub fields: Vec<String>,
}

/// A relation: its layout plus the indexes defined on it.
///
/// The record manager keys storage by relation name, so the handle carries
/// no file reference of its own. Tables are immutable once published; DDL
/// replaces the whole handle in the [`Db`](super::Db) map.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    /// Field layout.
    pub meta: TableMeta,
    /// Secondary indexes.
    pub indexes: Vec<IndexMeta>,
}

impl Table {
    /// Creates a table handle with no indexes.
    pub fn new(meta: TableMeta) -> Self {
        Self {
            meta,
            indexes: Vec::new(),
        }
    }

    /// Relation name.
    pub fn name(&self) -> &str {
        &self.meta.name
    }

    /// Finds an index whose first key field is the given field name.
    pub fn index_on(&self, field: &str) -> Option<&IndexMeta> {
        self.indexes
            .iter()
            .find(|idx| idx.fields.first().map(String::as_str) == Some(field))
    }

    /// Finds an index by name.
    pub fn find_index(&self, name: &str) -> Option<&IndexMeta> {
        self.indexes.iter().find(|idx| idx.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defs() -> Vec<FieldDef> {
        vec![
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
            FieldDef {
                name: "born".into(),
                attr_type: AttrType::Dates,
                len: 4,
                nullable: true,
            },
        ]
    }

    #[test]
    fn test_layout_offsets() {
        let meta = TableMeta::new("t", &defs(), StorageFormat::Row).unwrap();
        assert_eq!(meta.sys_field_num, 1);
        assert_eq!(meta.user_field_num(), 3);
        // 3 user fields fit into a single bitmap byte.
        assert_eq!(meta.fields[0].len, 1);
        assert_eq!(meta.user_field(0).offset, 1);
        assert_eq!(meta.user_field(1).offset, 5);
        assert_eq!(meta.user_field(2).offset, 13);
        assert_eq!(meta.record_size, 17);
    }

    #[test]
    fn test_field_lookup() {
        let meta = TableMeta::new("t", &defs(), StorageFormat::Row).unwrap();
        assert_eq!(meta.field("name").unwrap().len, 8);
        assert!(meta.field("missing").is_none());
        assert_eq!(meta.user_index("born"), Some(2));
        assert_eq!(meta.user_index(NULL_BITMAP_FIELD), None);
    }

    #[test]
    fn test_invalid_defs() {
        assert!(TableMeta::new("t", &[], StorageFormat::Row).is_err());

        let mut dup = defs();
        dup.push(dup[0].clone());
        assert!(TableMeta::new("t", &dup, StorageFormat::Row).is_err());

        let zero = vec![FieldDef {
            name: "c".into(),
            attr_type: AttrType::Chars,
            len: 0,
            nullable: false,
        }];
        assert!(TableMeta::new("t", &zero, StorageFormat::Row).is_err());
    }

    #[test]
    fn test_bitmap_width_scales() {
        let many: Vec<FieldDef> = (0..9)
            .map(|i| FieldDef {
                name: format!("c{}", i),
                attr_type: AttrType::Ints,
                len: 4,
                nullable: true,
            })
            .collect();
        let meta = TableMeta::new("wide", &many, StorageFormat::Row).unwrap();
        assert_eq!(meta.fields[0].len, 2);
        assert_eq!(meta.user_field(0).offset, 2);
    }

    #[test]
    fn test_index_on() {
        let meta = TableMeta::new("t", &defs(), StorageFormat::Row).unwrap();
        let mut table = Table::new(meta);
        table.indexes.push(IndexMeta {
            name: "idx_id".into(),
            unique: true,
            fields: vec!["id".into()],
        });
        assert!(table.index_on("id").is_some());
        assert!(table.index_on("name").is_none());
        assert!(table.find_index("idx_id").is_some());
    }
}
