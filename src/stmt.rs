pub mod bind;
pub mod ddl;
pub mod dml;
pub mod misc;
pub mod select;

use crate::catalog::Db;
use crate::exec::error::ExecutorError;
use crate::sql::ast::Statement;

pub use bind::BindContext;
pub use ddl::{CreateIndexStmt, CreateTableStmt, DropIndexStmt, DropTableStmt};
pub use dml::{DeleteStmt, InsertStmt, UpdateStmt};
pub use misc::{CalcStmt, DescTableStmt, LoadDataStmt, SetStmt};
pub use select::{FromTable, SelectStmt};

/// A statement resolved against the catalog, ready for planning.
pub enum Stmt {
    Select(SelectStmt),
    Insert(InsertStmt),
    Update(UpdateStmt),
    Delete(DeleteStmt),
    CreateTable(CreateTableStmt),
    DropTable(DropTableStmt),
    CreateIndex(CreateIndexStmt),
    DropIndex(DropIndexStmt),
    Calc(CalcStmt),
    Explain(Box<Stmt>),
    DescTable(DescTableStmt),
    ShowTables,
    LoadData(LoadDataStmt),
    TrxBegin,
    TrxCommit,
    TrxRollback,
    Set(SetStmt),
    Sync,
    Help,
    Exit,
}

/// Resolves a parsed statement against the catalog.
pub fn resolve(db: &Db, stmt: Statement) -> Result<Stmt, ExecutorError> {
    match stmt {
        Statement::Select(node) => Ok(Stmt::Select(select::resolve_select(db, *node, None)?)),
        Statement::Insert(node) => Ok(Stmt::Insert(dml::resolve_insert(db, node)?)),
        Statement::Update(node) => Ok(Stmt::Update(dml::resolve_update(db, node)?)),
        Statement::Delete(node) => Ok(Stmt::Delete(dml::resolve_delete(db, node)?)),
        Statement::CreateTable(node) => Ok(Stmt::CreateTable(ddl::resolve_create_table(node)?)),
        Statement::DropTable(node) => Ok(Stmt::DropTable(ddl::resolve_drop_table(db, node)?)),
        Statement::CreateIndex(node) => Ok(Stmt::CreateIndex(ddl::resolve_create_index(db, node)?)),
        Statement::DropIndex(node) => Ok(Stmt::DropIndex(ddl::resolve_drop_index(node))),
        Statement::Calc(node) => Ok(Stmt::Calc(misc::resolve_calc(db, node)?)),
        Statement::Explain(inner) => {
            let resolved = resolve(db, *inner)?;
            Ok(Stmt::Explain(Box::new(resolved)))
        }
        Statement::DescTable(name) => Ok(Stmt::DescTable(misc::resolve_desc(db, &name)?)),
        Statement::ShowTables => Ok(Stmt::ShowTables),
        Statement::LoadData(node) => Ok(Stmt::LoadData(misc::resolve_load_data(db, node)?)),
        Statement::TrxBegin => Ok(Stmt::TrxBegin),
        Statement::TrxCommit => Ok(Stmt::TrxCommit),
        Statement::TrxRollback => Ok(Stmt::TrxRollback),
        Statement::Set(node) => Ok(Stmt::Set(misc::resolve_set(db, node)?)),
        Statement::Sync => Ok(Stmt::Sync),
        Statement::Help => Ok(Stmt::Help),
        Statement::Exit => Ok(Stmt::Exit),
    }
}
