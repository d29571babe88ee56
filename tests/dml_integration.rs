//! End-to-end DDL, DML, transaction, index, and LOAD DATA tests.

use std::io::Write;
use std::sync::Arc;

use granite::catalog::Db;
use granite::record::MemoryEngine;
use granite::session::{Session, SqlResult};
use granite::types::Value;

fn session() -> Session {
    Session::new(Arc::new(Db::new()), Arc::new(MemoryEngine::new()))
}

fn exec(session: &mut Session, sql: &str) -> SqlResult {
    match session.execute_sql(sql) {
        Ok(result) => result,
        Err(err) => panic!("statement failed: {sql}: {err}"),
    }
}

fn count(session: &mut Session, table: &str) -> i32 {
    let result = exec(session, &format!("SELECT count(*) FROM {table}"));
    match result.rows() {
        Some([row]) => match row[0] {
            Value::Int(n) => n,
            ref other => panic!("unexpected count value {other:?}"),
        },
        _ => panic!("expected a single count row"),
    }
}

#[test]
fn test_create_show_desc_drop() {
    let mut s = session();
    exec(&mut s, "CREATE TABLE t(id INT, name CHAR(8) NULL)");
    exec(&mut s, "CREATE TABLE u(v FLOAT)");

    let SqlResult::Rows { rows, .. } = exec(&mut s, "SHOW TABLES") else {
        panic!("expected rows");
    };
    assert_eq!(
        rows,
        vec![
            vec![Value::Chars("t".into())],
            vec![Value::Chars("u".into())],
        ]
    );

    let SqlResult::Rows { columns, rows } = exec(&mut s, "DESC t") else {
        panic!("expected rows");
    };
    assert_eq!(
        columns,
        vec![
            "field".to_string(),
            "type".to_string(),
            "length".to_string(),
            "nullable".to_string()
        ]
    );
    assert_eq!(
        rows[0],
        vec![
            Value::Chars("id".into()),
            Value::Chars("ints".into()),
            Value::Int(4),
            Value::Chars("no".into()),
        ]
    );
    assert_eq!(
        rows[1],
        vec![
            Value::Chars("name".into()),
            Value::Chars("chars".into()),
            Value::Int(8),
            Value::Chars("yes".into()),
        ]
    );

    exec(&mut s, "DROP TABLE u");
    assert!(s.execute_sql("SELECT * FROM u").is_err());
    assert!(s.execute_sql("DROP TABLE u").is_err());
}

#[test]
fn test_duplicate_table_rejected() {
    let mut s = session();
    exec(&mut s, "CREATE TABLE t(id INT)");
    let err = s.execute_sql("CREATE TABLE t(id INT)").unwrap_err();
    assert!(err.to_string().contains("already exists"), "{err}");
}

#[test]
fn test_storage_format() {
    let mut s = session();
    exec(&mut s, "CREATE TABLE p(id INT) STORAGE FORMAT = pax");
    let err = s
        .execute_sql("CREATE TABLE q(id INT) STORAGE FORMAT = wat")
        .unwrap_err();
    assert!(err.to_string().contains("storage format"), "{err}");
}

#[test]
fn test_insert_validation() {
    let mut s = session();
    exec(&mut s, "CREATE TABLE t(id INT, name CHAR(8) NULL)");
    exec(&mut s, "INSERT INTO t VALUES (1,'x'),(2,NULL)");
    assert_eq!(count(&mut s, "t"), 2);

    // Arity mismatch.
    let err = s.execute_sql("INSERT INTO t VALUES (1)").unwrap_err();
    assert!(err.to_string().contains("expected 2 values"), "{err}");

    // CHARS length overflow leaves the table unchanged.
    let err = s
        .execute_sql("INSERT INTO t VALUES (3,'toolongname')")
        .unwrap_err();
    assert!(err.to_string().contains("invalid argument"), "{err}");
    assert_eq!(count(&mut s, "t"), 2);

    // NULL into a NOT NULL column.
    let err = s.execute_sql("INSERT INTO t VALUES (NULL,'x')").unwrap_err();
    assert!(err.to_string().contains("type mismatch"), "{err}");

    // Type mismatch.
    let err = s.execute_sql("INSERT INTO t VALUES ('x','x')").unwrap_err();
    assert!(err.to_string().contains("type mismatch"), "{err}");
}

#[test]
fn test_insert_int_widens_to_float() {
    let mut s = session();
    exec(&mut s, "CREATE TABLE f(v FLOAT)");
    exec(&mut s, "INSERT INTO f VALUES (2)");
    let result = exec(&mut s, "SELECT v FROM f");
    assert_eq!(result.rows(), Some(&[vec![Value::Float(2.0)]][..]));
}

#[test]
fn test_date_column() {
    let mut s = session();
    exec(&mut s, "CREATE TABLE d(a DATE)");
    exec(&mut s, "INSERT INTO d VALUES ('2024-02-29')");

    let result = exec(&mut s, "SELECT a FROM d");
    assert_eq!(result.rows(), Some(&[vec![Value::Date(20240229)]][..]));

    // An impossible calendar day is a date syntax error, flagged as such.
    let err = s
        .execute_sql("INSERT INTO d VALUES ('2023-02-29')")
        .unwrap_err();
    assert!(err.is_date_error());
    assert!(err.to_string().starts_with("date syntax error"), "{err}");
    assert_eq!(count(&mut s, "d"), 1);
}

#[test]
fn test_date_comparison() {
    let mut s = session();
    exec(&mut s, "CREATE TABLE d(a DATE)");
    exec(
        &mut s,
        "INSERT INTO d VALUES ('2024-01-01'), ('2024-06-15')",
    );

    let result = exec(&mut s, "SELECT a FROM d WHERE a > '2024-03-01'");
    assert_eq!(result.rows(), Some(&[vec![Value::Date(20240615)]][..]));
}

#[test]
fn test_update() {
    let mut s = session();
    exec(&mut s, "CREATE TABLE t(id INT, name CHAR(8) NULL)");
    exec(&mut s, "INSERT INTO t VALUES (1,'x'),(2,'y')");

    let result = exec(&mut s, "UPDATE t SET name = 'z' WHERE id = 1");
    assert_eq!(result, SqlResult::Affected(1));

    let result = exec(&mut s, "SELECT name FROM t WHERE id = 1");
    assert_eq!(result.rows(), Some(&[vec![Value::Chars("z".into())]][..]));
}

#[test]
fn test_update_reevaluates_per_row() {
    let mut s = session();
    exec(&mut s, "CREATE TABLE t(id INT)");
    exec(&mut s, "INSERT INTO t VALUES (1),(2),(3)");

    let result = exec(&mut s, "UPDATE t SET id = id + 10");
    assert_eq!(result, SqlResult::Affected(3));

    let result = exec(&mut s, "SELECT count(*) FROM t WHERE id > 10");
    assert_eq!(result.rows(), Some(&[vec![Value::Int(3)]][..]));
}

#[test]
fn test_update_validates_values() {
    let mut s = session();
    exec(&mut s, "CREATE TABLE t(id INT, name CHAR(4))");
    exec(&mut s, "INSERT INTO t VALUES (1,'a')");

    let err = s
        .execute_sql("UPDATE t SET name = 'much too long'")
        .unwrap_err();
    assert!(err.to_string().contains("invalid argument"), "{err}");

    let err = s.execute_sql("UPDATE t SET name = NULL").unwrap_err();
    assert!(err.to_string().contains("type mismatch"), "{err}");
}

#[test]
fn test_delete() {
    let mut s = session();
    exec(&mut s, "CREATE TABLE t(id INT)");
    exec(&mut s, "INSERT INTO t VALUES (1),(2),(3)");

    let result = exec(&mut s, "DELETE FROM t WHERE id = 2");
    assert_eq!(result, SqlResult::Affected(1));
    assert_eq!(count(&mut s, "t"), 2);

    let result = exec(&mut s, "DELETE FROM t");
    assert_eq!(result, SqlResult::Affected(2));
    assert_eq!(count(&mut s, "t"), 0);
}

#[test]
fn test_transaction_rollback() {
    let mut s = session();
    exec(&mut s, "CREATE TABLE t(id INT)");
    exec(&mut s, "INSERT INTO t VALUES (1)");

    exec(&mut s, "TRX BEGIN");
    exec(&mut s, "INSERT INTO t VALUES (2),(3)");
    exec(&mut s, "DELETE FROM t WHERE id = 1");
    assert_eq!(count(&mut s, "t"), 2);
    exec(&mut s, "TRX ROLLBACK");

    let result = exec(&mut s, "SELECT id FROM t");
    assert_eq!(result.rows(), Some(&[vec![Value::Int(1)]][..]));
}

#[test]
fn test_transaction_commit() {
    let mut s = session();
    exec(&mut s, "CREATE TABLE t(id INT)");

    exec(&mut s, "TRX BEGIN");
    exec(&mut s, "INSERT INTO t VALUES (1),(2)");
    exec(&mut s, "TRX COMMIT");

    assert_eq!(count(&mut s, "t"), 2);
}

#[test]
fn test_unique_index() {
    let mut s = session();
    exec(&mut s, "CREATE TABLE t(id INT, name CHAR(8) NULL)");
    exec(&mut s, "INSERT INTO t VALUES (1,'a'),(2,'b')");
    exec(&mut s, "CREATE UNIQUE INDEX idx_id ON t(id)");

    let err = s.execute_sql("INSERT INTO t VALUES (1,'dup')").unwrap_err();
    assert!(err.to_string().contains("duplicate key"), "{err}");
    assert_eq!(count(&mut s, "t"), 2);

    // A fresh key still inserts.
    exec(&mut s, "INSERT INTO t VALUES (3,'c')");
    assert_eq!(count(&mut s, "t"), 3);
}

#[test]
fn test_create_unique_index_on_duplicates_fails() {
    let mut s = session();
    exec(&mut s, "CREATE TABLE t(id INT)");
    exec(&mut s, "INSERT INTO t VALUES (1),(1)");

    let err = s
        .execute_sql("CREATE UNIQUE INDEX idx ON t(id)")
        .unwrap_err();
    assert!(err.to_string().contains("duplicate key"), "{err}");

    // The failed index must not have been published.
    let SqlResult::Explain(text) = exec(&mut s, "EXPLAIN SELECT id FROM t WHERE id = 1") else {
        panic!("expected explain");
    };
    assert!(!text.contains("IndexScan"), "plan was:\n{text}");
}

#[test]
fn test_index_scan_plan_and_results() {
    let mut s = session();
    exec(&mut s, "CREATE TABLE t(id INT, name CHAR(8) NULL)");
    exec(&mut s, "INSERT INTO t VALUES (1,'a'),(2,'b'),(2,'c')");
    exec(&mut s, "CREATE INDEX idx_id ON t(id)");

    let SqlResult::Explain(text) = exec(&mut s, "EXPLAIN SELECT name FROM t WHERE id = 2") else {
        panic!("expected explain");
    };
    assert!(text.contains("IndexScan on t using idx_id"), "plan was:\n{text}");

    let SqlResult::Rows { mut rows, .. } = exec(&mut s, "SELECT name FROM t WHERE id = 2") else {
        panic!("expected rows");
    };
    rows.sort_by_key(|row| format!("{row:?}"));
    assert_eq!(
        rows,
        vec![
            vec![Value::Chars("b".into())],
            vec![Value::Chars("c".into())],
        ]
    );

    exec(&mut s, "DROP INDEX idx_id");
    let SqlResult::Explain(text) = exec(&mut s, "EXPLAIN SELECT name FROM t WHERE id = 2") else {
        panic!("expected explain");
    };
    assert!(!text.contains("IndexScan"), "plan was:\n{text}");
}

#[test]
fn test_index_maintained_by_dml() {
    let mut s = session();
    exec(&mut s, "CREATE TABLE t(id INT)");
    exec(&mut s, "CREATE INDEX idx_id ON t(id)");
    exec(&mut s, "INSERT INTO t VALUES (1),(2)");
    exec(&mut s, "UPDATE t SET id = 20 WHERE id = 2");
    exec(&mut s, "DELETE FROM t WHERE id = 1");

    // Queries through the index see the post-DML state.
    let result = exec(&mut s, "SELECT id FROM t WHERE id = 20");
    assert_eq!(result.rows(), Some(&[vec![Value::Int(20)]][..]));
    let result = exec(&mut s, "SELECT id FROM t WHERE id = 2");
    assert_eq!(result.rows(), Some(&[][..]));
}

#[test]
fn test_load_data() {
    let mut s = session();
    exec(&mut s, "CREATE TABLE t(id INT, name CHAR(8) NULL)");

    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "1|alice\n2|\n3|bob\n").unwrap();
    let path = file.path().display();

    let result = exec(
        &mut s,
        &format!("LOAD DATA INFILE '{path}' INTO TABLE t"),
    );
    assert_eq!(result, SqlResult::Affected(3));

    let result = exec(&mut s, "SELECT name FROM t WHERE id = 2");
    assert_eq!(result.rows(), Some(&[vec![Value::Null]][..]));
}

#[test]
fn test_load_data_bad_line_aborts() {
    let mut s = session();
    exec(&mut s, "CREATE TABLE t(id INT, name CHAR(8) NULL)");

    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "1|alice\nnot-a-number|bob\n").unwrap();
    let path = file.path().display();

    let err = s
        .execute_sql(&format!("LOAD DATA INFILE '{path}' INTO TABLE t"))
        .unwrap_err();
    assert!(err.to_string().contains("line 2"), "{err}");
    assert_eq!(count(&mut s, "t"), 0);
}

#[test]
fn test_session_statements() {
    let mut s = session();

    assert_eq!(
        exec(&mut s, "SET timeout = 30"),
        SqlResult::Message("SUCCESS".to_string())
    );
    assert_eq!(s.variable("timeout"), Some(&Value::Int(30)));

    assert_eq!(
        exec(&mut s, "SYNC"),
        SqlResult::Message("SUCCESS".to_string())
    );
    assert!(matches!(exec(&mut s, "HELP"), SqlResult::Message(_)));
    assert_eq!(exec(&mut s, "EXIT"), SqlResult::Exit);
}

#[test]
fn test_syntax_error_reports_position() {
    let mut s = session();
    let err = s.execute_sql("SELEC id FROM t").unwrap_err();
    let text = err.to_string();
    assert!(text.starts_with("syntax error at line 1"), "{text}");
}
