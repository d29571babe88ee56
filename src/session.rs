//! The statement façade.
//!
//! A [`Session`] owns a catalog handle, a record-manager handle, the
//! connection's current transaction, and its variables. `execute_sql`
//! drives the full pipeline: parse, resolve, plan, execute, frame the
//! result. Statements outside an explicit transaction run in their own
//! transaction, committed on success and rolled back on failure.

pub mod error;
pub mod result;

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::catalog::{Db, TableMeta};
use crate::exec::{dml, ExecutorError, PhysicalOperator};
use crate::plan::{logical, physical, PhysicalPlan};
use crate::record::{codec, EngineRef, Trx};
use crate::sql::parser::parse_sql;
use crate::stmt::dml::check_value;
use crate::stmt::{self, LoadDataStmt, Stmt};
use crate::types::{AttrType, Value};

pub use error::DbError;
pub use result::SqlResult;

/// One client connection's execution state.
pub struct Session {
    db: Arc<Db>,
    engine: EngineRef,
    current_trx: Option<Trx>,
    variables: HashMap<String, Value>,
}

impl Session {
    /// Creates a session over a catalog and record manager.
    pub fn new(db: Arc<Db>, engine: EngineRef) -> Self {
        Self {
            db,
            engine,
            current_trx: None,
            variables: HashMap::new(),
        }
    }

    /// The session's catalog handle.
    pub fn db(&self) -> &Arc<Db> {
        &self.db
    }

    /// Reads a session variable.
    pub fn variable(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }

    /// Parses and executes one SQL statement.
    pub fn execute_sql(&mut self, sql: &str) -> Result<SqlResult, DbError> {
        let parsed = parse_sql(sql).map_err(|e| DbError::parse(sql, e))?;
        let Some(ast) = parsed else {
            return Ok(SqlResult::Message(String::new()));
        };
        debug!(sql, "executing statement");
        let stmt = stmt::resolve(&self.db, ast)?;
        self.execute_stmt(stmt).map_err(DbError::Exec)
    }

    fn execute_stmt(&mut self, stmt: Stmt) -> Result<SqlResult, ExecutorError> {
        match stmt {
            Stmt::TrxBegin => {
                if self.current_trx.is_none() {
                    self.current_trx = Some(self.engine.begin());
                }
                Ok(SqlResult::Message("SUCCESS".to_string()))
            }
            Stmt::TrxCommit => {
                if let Some(trx) = self.current_trx.take() {
                    self.engine.commit(&trx)?;
                }
                Ok(SqlResult::Message("SUCCESS".to_string()))
            }
            Stmt::TrxRollback => {
                if let Some(trx) = self.current_trx.take() {
                    self.engine.rollback(&trx)?;
                }
                Ok(SqlResult::Message("SUCCESS".to_string()))
            }

            Stmt::CreateTable(stmt) => {
                let meta = TableMeta::new(&stmt.name, &stmt.fields, stmt.storage_format)?;
                let table = self.db.create_table(meta)?;
                if let Err(err) = self.engine.create_table(&table) {
                    let _ = self.db.drop_table(table.name());
                    return Err(err.into());
                }
                Ok(SqlResult::Message("SUCCESS".to_string()))
            }
            Stmt::DropTable(stmt) => {
                self.db.drop_table(&stmt.name)?;
                self.engine.drop_table(&stmt.name)?;
                Ok(SqlResult::Message("SUCCESS".to_string()))
            }
            Stmt::CreateIndex(stmt) => {
                let table = self.db.add_index(stmt.table.name(), stmt.index.clone())?;
                let build = self.with_statement_trx(|engine, trx| {
                    engine
                        .create_index(trx, &table, &stmt.index)
                        .map_err(ExecutorError::from)
                });
                if let Err(err) = build {
                    let _ = self.db.remove_index(&stmt.index.name);
                    return Err(err);
                }
                Ok(SqlResult::Message("SUCCESS".to_string()))
            }
            Stmt::DropIndex(stmt) => {
                let table = self.db.remove_index(&stmt.name)?;
                self.engine.drop_index(&table, &stmt.name)?;
                Ok(SqlResult::Message("SUCCESS".to_string()))
            }

            Stmt::DescTable(stmt) => {
                let columns = vec![
                    "field".to_string(),
                    "type".to_string(),
                    "length".to_string(),
                    "nullable".to_string(),
                ];
                let rows = stmt
                    .table
                    .meta
                    .user_fields()
                    .map(|field| {
                        vec![
                            Value::Chars(field.name.clone()),
                            Value::Chars(field.attr_type.name().to_string()),
                            Value::Int(field.len as i32),
                            Value::Chars(if field.nullable { "yes" } else { "no" }.to_string()),
                        ]
                    })
                    .collect();
                Ok(SqlResult::Rows { columns, rows })
            }
            Stmt::ShowTables => {
                let rows = self
                    .db
                    .table_names()
                    .into_iter()
                    .map(|name| vec![Value::Chars(name)])
                    .collect();
                Ok(SqlResult::Rows {
                    columns: vec!["tables".to_string()],
                    rows,
                })
            }

            Stmt::LoadData(stmt) => self.load_data(stmt),

            Stmt::Set(stmt) => {
                self.variables.insert(stmt.name, stmt.value);
                Ok(SqlResult::Message("SUCCESS".to_string()))
            }
            Stmt::Sync => Ok(SqlResult::Message("SUCCESS".to_string())),
            Stmt::Help => Ok(SqlResult::Message(HELP_TEXT.to_string())),
            Stmt::Exit => Ok(SqlResult::Exit),

            plannable => self.execute_plan(plannable),
        }
    }

    /// Plans and runs a SELECT, DML, CALC, or EXPLAIN statement.
    fn execute_plan(&mut self, stmt: Stmt) -> Result<SqlResult, ExecutorError> {
        let logical = logical::build(stmt)?;
        let plan = physical::build(&self.engine, logical)?;
        self.with_statement_trx(|engine, trx| run_plan(engine, trx, plan))
    }

    /// Runs `body` in the session's explicit transaction, or in a
    /// per-statement transaction committed on success and rolled back on
    /// failure.
    fn with_statement_trx<T>(
        &mut self,
        body: impl FnOnce(&EngineRef, &Trx) -> Result<T, ExecutorError>,
    ) -> Result<T, ExecutorError> {
        match self.current_trx {
            Some(trx) => body(&self.engine, &trx),
            None => {
                let trx = self.engine.begin();
                match body(&self.engine, &trx) {
                    Ok(result) => {
                        self.engine.commit(&trx)?;
                        Ok(result)
                    }
                    Err(err) => {
                        let _ = self.engine.rollback(&trx);
                        Err(err)
                    }
                }
            }
        }
    }

    /// LOAD DATA INFILE: one insert row per '|'-separated line.
    fn load_data(&mut self, stmt: LoadDataStmt) -> Result<SqlResult, ExecutorError> {
        let content = std::fs::read_to_string(&stmt.file).map_err(|e| {
            ExecutorError::InvalidArgument(format!("cannot read \"{}\": {}", stmt.file, e))
        })?;

        let meta = &stmt.table.meta;
        let field_num = meta.user_field_num();
        let mut rows: Vec<Vec<Value>> = Vec::new();

        for (line_no, line) in content.lines().enumerate() {
            let line = line.trim_end_matches('\r');
            if line.is_empty() {
                continue;
            }
            let cells: Vec<&str> = line.split('|').collect();
            if cells.len() != field_num {
                return Err(ExecutorError::InvalidArgument(format!(
                    "line {}: expected {} fields, got {}",
                    line_no + 1,
                    field_num,
                    cells.len()
                )));
            }

            let mut values = Vec::with_capacity(field_num);
            for (i, cell) in cells.iter().enumerate() {
                let field = meta.user_field(i);
                let value = parse_load_cell(cell, field.attr_type).ok_or_else(|| {
                    ExecutorError::InvalidArgument(format!(
                        "line {}: \"{}\" is not a valid {}",
                        line_no + 1,
                        cell,
                        field.attr_type
                    ))
                })?;
                values.push(check_value(field, value)?);
            }
            rows.push(values);
        }

        let table = stmt.table.clone();
        let count = self.with_statement_trx(|engine, trx| {
            let mut count = 0;
            for row in &rows {
                let data = codec::encode(&table.meta, row)?;
                engine.insert_record(trx, &table, data)?;
                count += 1;
            }
            Ok(count)
        })?;
        Ok(SqlResult::Affected(count))
    }
}

/// Parses one LOAD DATA cell for the target column type. An empty cell
/// is NULL.
fn parse_load_cell(cell: &str, attr_type: AttrType) -> Option<Value> {
    if cell.is_empty() {
        return Some(Value::Null);
    }
    match attr_type {
        AttrType::Ints => cell.trim().parse().ok().map(Value::Int),
        AttrType::Floats => cell.trim().parse().ok().map(Value::Float),
        AttrType::Dates => crate::types::date::parse_date(cell.trim()).map(Value::Date),
        AttrType::Chars => Some(Value::Chars(cell.to_string())),
        _ => None,
    }
}

/// Runs one physical plan inside a transaction.
fn run_plan(engine: &EngineRef, trx: &Trx, plan: PhysicalPlan) -> Result<SqlResult, ExecutorError> {
    match plan {
        PhysicalPlan::Query(mut op) => {
            let result = run_query(&mut op, trx);
            // The tree is closed on success and on every error path.
            let _ = op.close();
            result
        }
        PhysicalPlan::Insert(stmt) => {
            let count = dml::execute_insert(engine, trx, &stmt)?;
            Ok(SqlResult::Affected(count))
        }
        PhysicalPlan::Delete { stmt, mut child } => {
            let count = dml::execute_delete(engine, trx, &stmt, &mut child)?;
            Ok(SqlResult::Affected(count))
        }
        PhysicalPlan::Update {
            mut stmt,
            mut child,
        } => {
            let count = dml::execute_update(engine, trx, &mut stmt, &mut child)?;
            Ok(SqlResult::Affected(count))
        }
        PhysicalPlan::Explain(text) => Ok(SqlResult::Explain(text)),
    }
}

fn run_query(op: &mut PhysicalOperator, trx: &Trx) -> Result<SqlResult, ExecutorError> {
    op.open(trx)?;
    let columns: Vec<String> = op.schema().iter().map(|spec| spec.alias.clone()).collect();
    let mut rows = Vec::new();
    while let Some(tuple) = op.next()? {
        rows.push(tuple.values().to_vec());
    }
    Ok(SqlResult::Rows { columns, rows })
}

const HELP_TEXT: &str = "\
statements:
  CREATE TABLE t(col type [(len)] [NOT NULL|NULL], ...) [STORAGE FORMAT = id]
  DROP TABLE t
  CREATE [UNIQUE] INDEX idx ON t(col, ...)
  DROP INDEX idx
  INSERT INTO t VALUES (...), ...
  DELETE FROM t [WHERE cond]
  UPDATE t SET col = expr, ... [WHERE cond]
  SELECT ... FROM t [INNER JOIN u ON cond] [WHERE cond] [GROUP BY ...] [HAVING cond]
  CALC expr, ...
  EXPLAIN stmt
  SHOW TABLES | DESC t
  TRX BEGIN | TRX COMMIT | TRX ROLLBACK
  LOAD DATA INFILE 'file' INTO TABLE t
  SET var = value | SYNC | HELP | EXIT";
