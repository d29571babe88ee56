//! Record byte codec.
//!
//! Records are fixed-width: a null bitmap system field first (bit set =
//! value present), then one fixed-width cell per user field at the offset
//! recorded in its [`FieldMeta`]. INT and DATE cells are little-endian
//! `i32`, FLOAT cells little-endian `f32`, CHAR cells are zero-padded to
//! the declared capacity.

use crate::catalog::{FieldMeta, TableMeta};
use crate::types::{AttrType, Value};

use super::error::StorageError;

/// Encodes user-field values into record bytes.
///
/// # Errors
///
/// Returns [`StorageError::InvalidRecord`] on arity mismatch, a value that
/// does not fit its cell, or a value/field type combination the layout
/// cannot hold. Callers validate types before encoding; failures here are
/// defects upstream.
pub fn encode(meta: &TableMeta, values: &[Value]) -> Result<Vec<u8>, StorageError> {
    if values.len() != meta.user_field_num() {
        return Err(StorageError::InvalidRecord(format!(
            "expected {} values, got {}",
            meta.user_field_num(),
            values.len()
        )));
    }

    let mut data = vec![0u8; meta.record_size];
    let bitmap = &meta.fields[0];
    for (i, value) in values.iter().enumerate() {
        let field = meta.user_field(i);
        if value.is_null() {
            continue;
        }
        data[bitmap.offset + i / 8] |= 1 << (i % 8);
        encode_cell(field, value, &mut data)?;
    }
    Ok(data)
}

fn encode_cell(field: &FieldMeta, value: &Value, data: &mut [u8]) -> Result<(), StorageError> {
    let cell = &mut data[field.offset..field.offset + field.len];
    match (field.attr_type, value) {
        (AttrType::Ints, Value::Int(n)) | (AttrType::Dates, Value::Date(n)) => {
            cell.copy_from_slice(&n.to_le_bytes());
        }
        (AttrType::Floats, Value::Float(f)) => {
            cell.copy_from_slice(&f.to_le_bytes());
        }
        (AttrType::Chars, Value::Chars(s)) => {
            let bytes = s.as_bytes();
            if bytes.len() > field.len {
                return Err(StorageError::InvalidRecord(format!(
                    "value for \"{}\" exceeds capacity {}",
                    field.name, field.len
                )));
            }
            cell[..bytes.len()].copy_from_slice(bytes);
        }
        _ => {
            return Err(StorageError::InvalidRecord(format!(
                "value type {} does not fit field \"{}\" of type {}",
                value.attr_type(),
                field.name,
                field.attr_type
            )));
        }
    }
    Ok(())
}

/// Decodes a single user-field cell from record bytes.
pub fn decode_cell(meta: &TableMeta, user_idx: usize, data: &[u8]) -> Result<Value, StorageError> {
    if data.len() != meta.record_size {
        return Err(StorageError::InvalidRecord(format!(
            "record is {} bytes, layout needs {}",
            data.len(),
            meta.record_size
        )));
    }
    let bitmap = &meta.fields[0];
    if data[bitmap.offset + user_idx / 8] & (1 << (user_idx % 8)) == 0 {
        return Ok(Value::Null);
    }

    let field = meta.user_field(user_idx);
    let cell = &data[field.offset..field.offset + field.len];
    let value = match field.attr_type {
        AttrType::Ints => Value::Int(i32::from_le_bytes(
            cell.try_into().expect("int cell is 4 bytes"),
        )),
        AttrType::Dates => Value::Date(i32::from_le_bytes(
            cell.try_into().expect("date cell is 4 bytes"),
        )),
        AttrType::Floats => Value::Float(f32::from_le_bytes(
            cell.try_into().expect("float cell is 4 bytes"),
        )),
        AttrType::Chars => {
            let end = cell.iter().position(|&b| b == 0).unwrap_or(cell.len());
            let s = std::str::from_utf8(&cell[..end])
                .map_err(|e| StorageError::InvalidRecord(e.to_string()))?;
            Value::Chars(s.to_string())
        }
        other => {
            return Err(StorageError::InvalidRecord(format!(
                "field \"{}\" has unstorable type {}",
                field.name, other
            )));
        }
    };
    Ok(value)
}

/// Decodes all user-field values from record bytes.
pub fn decode(meta: &TableMeta, data: &[u8]) -> Result<Vec<Value>, StorageError> {
    (0..meta.user_field_num())
        .map(|i| decode_cell(meta, i, data))
        .collect()
}

/// Builds an index key from record bytes by concatenating the key fields'
/// cells in index order.
///
/// Returns `None` if any key field is NULL: NULL keys are not indexed
/// (equality against NULL can never hold).
pub fn index_key_from_record(
    meta: &TableMeta,
    fields: &[String],
    data: &[u8],
) -> Option<Vec<u8>> {
    let bitmap = &meta.fields[0];
    let mut key = Vec::new();
    for name in fields {
        let field = meta.field(name)?;
        let user_idx = field.field_id - meta.sys_field_num;
        if data[bitmap.offset + user_idx / 8] & (1 << (user_idx % 8)) == 0 {
            return None;
        }
        key.extend_from_slice(&data[field.offset..field.offset + field.len]);
    }
    Some(key)
}

/// Builds an index key from literal values, one per key field.
///
/// Returns `None` if any value is NULL or cannot be encoded into its cell
/// (for example a string longer than the column capacity, which can never
/// equal a stored value).
pub fn index_key_from_values(
    meta: &TableMeta,
    fields: &[String],
    values: &[Value],
) -> Option<Vec<u8>> {
    if fields.len() != values.len() {
        return None;
    }
    let mut key = Vec::new();
    for (name, value) in fields.iter().zip(values) {
        let field = meta.field(name)?;
        if value.is_null() {
            return None;
        }
        let coerced = value.cast_to(field.attr_type).ok()?;
        let mut cell = vec![0u8; field.len];
        match (&coerced, field.attr_type) {
            (Value::Int(n), AttrType::Ints) | (Value::Date(n), AttrType::Dates) => {
                cell.copy_from_slice(&n.to_le_bytes());
            }
            (Value::Float(f), AttrType::Floats) => {
                cell.copy_from_slice(&f.to_le_bytes());
            }
            (Value::Chars(s), AttrType::Chars) => {
                let bytes = s.as_bytes();
                if bytes.len() > field.len {
                    return None;
                }
                cell[..bytes.len()].copy_from_slice(bytes);
            }
            _ => return None,
        }
        key.extend_from_slice(&cell);
    }
    Some(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{FieldDef, StorageFormat};

    fn meta() -> TableMeta {
        TableMeta::new(
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
                FieldDef {
                    name: "score".into(),
                    attr_type: AttrType::Floats,
                    len: 4,
                    nullable: true,
                },
                FieldDef {
                    name: "born".into(),
                    attr_type: AttrType::Dates,
                    len: 4,
                    nullable: true,
                },
            ],
            StorageFormat::Row,
        )
        .unwrap()
    }

    #[test]
    fn test_roundtrip_with_nulls() {
        let meta = meta();
        let values = vec![
            Value::Int(7),
            Value::Null,
            Value::Float(2.5),
            Value::Date(20240229),
        ];
        let data = encode(&meta, &values).unwrap();
        assert_eq!(data.len(), meta.record_size);
        assert_eq!(decode(&meta, &data).unwrap(), values);
    }

    #[test]
    fn test_chars_padding_trimmed() {
        let meta = meta();
        let values = vec![
            Value::Int(1),
            Value::Chars("ab".into()),
            Value::Null,
            Value::Null,
        ];
        let data = encode(&meta, &values).unwrap();
        assert_eq!(
            decode_cell(&meta, 1, &data).unwrap(),
            Value::Chars("ab".into())
        );
    }

    #[test]
    fn test_encode_arity_mismatch() {
        let meta = meta();
        assert!(matches!(
            encode(&meta, &[Value::Int(1)]),
            Err(StorageError::InvalidRecord(_))
        ));
    }

    #[test]
    fn test_encode_overlong_chars() {
        let meta = meta();
        let values = vec![
            Value::Int(1),
            Value::Chars("way too long".into()),
            Value::Null,
            Value::Null,
        ];
        assert!(matches!(
            encode(&meta, &values),
            Err(StorageError::InvalidRecord(_))
        ));
    }

    #[test]
    fn test_encode_type_mismatch() {
        let meta = meta();
        let values = vec![
            Value::Chars("x".into()),
            Value::Null,
            Value::Null,
            Value::Null,
        ];
        assert!(matches!(
            encode(&meta, &values),
            Err(StorageError::InvalidRecord(_))
        ));
    }

    #[test]
    fn test_index_key_paths_agree() {
        let meta = meta();
        let values = vec![
            Value::Int(42),
            Value::Chars("ab".into()),
            Value::Null,
            Value::Null,
        ];
        let data = encode(&meta, &values).unwrap();
        let fields = vec!["id".to_string(), "name".to_string()];

        let from_record = index_key_from_record(&meta, &fields, &data).unwrap();
        let from_values =
            index_key_from_values(&meta, &fields, &[Value::Int(42), Value::Chars("ab".into())])
                .unwrap();
        assert_eq!(from_record, from_values);
    }

    #[test]
    fn test_index_key_null_not_indexed() {
        let meta = meta();
        let values = vec![Value::Int(42), Value::Null, Value::Null, Value::Null];
        let data = encode(&meta, &values).unwrap();
        assert!(index_key_from_record(&meta, &["name".to_string()], &data).is_none());
        assert!(index_key_from_values(&meta, &["name".to_string()], &[Value::Null]).is_none());
    }

    #[test]
    fn test_index_key_overlong_literal() {
        let meta = meta();
        assert!(index_key_from_values(
            &meta,
            &["name".to_string()],
            &[Value::Chars("far too long to store".into())]
        )
        .is_none());
    }
}
