//! Scan operators: row-at-a-time table and index scans, and the
//! chunk-wise vectorized scan.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::catalog::Table;
use crate::expr::{Chunk, Column, Expression, Tuple, TupleCellSpec};
use crate::record::{codec, EngineRef, IndexHint, RecordScanner, Trx};

use super::error::ExecutorError;

/// Rows fetched per chunk by the vectorized scan.
const CHUNK_ROWS: usize = 1024;

/// Builds the cell specs a scan of `table` produces under `label`.
pub fn scan_specs(table: &Table, label: &str) -> Arc<Vec<TupleCellSpec>> {
    Arc::new(
        table
            .meta
            .user_fields()
            .map(|field| TupleCellSpec::new(Some(label), &field.name))
            .collect(),
    )
}

/// Sequential scan delivering one row tuple per `next`.
pub struct TableScanOp {
    engine: EngineRef,
    table: Arc<Table>,
    specs: Arc<Vec<TupleCellSpec>>,
    label: String,
    scanner: Option<Box<dyn RecordScanner>>,
    parent: Option<Tuple>,
}

impl TableScanOp {
    /// Creates a table scan.
    pub fn new(engine: EngineRef, table: Arc<Table>, label: &str) -> Self {
        let specs = scan_specs(&table, label);
        Self {
            engine,
            table,
            specs,
            label: label.to_string(),
            scanner: None,
            parent: None,
        }
    }

    pub fn open(&mut self, trx: &Trx) -> Result<(), ExecutorError> {
        self.scanner = Some(self.engine.scan(trx, &self.table, None)?);
        Ok(())
    }

    pub fn next(&mut self) -> Result<Option<Tuple>, ExecutorError> {
        let scanner = self
            .scanner
            .as_mut()
            .ok_or_else(|| ExecutorError::Internal("scan used before open".to_string()))?;
        match scanner.next()? {
            None => Ok(None),
            Some(record) => {
                let values = codec::decode(&self.table.meta, &record.data)?;
                let mut tuple = Tuple::with_rid(self.specs.clone(), values, record.rid);
                tuple.set_parent(self.parent.clone());
                Ok(Some(tuple))
            }
        }
    }

    pub fn close(&mut self) -> Result<(), ExecutorError> {
        self.scanner = None;
        Ok(())
    }

    pub fn schema(&self) -> Arc<Vec<TupleCellSpec>> {
        self.specs.clone()
    }

    pub fn set_parent_tuple(&mut self, parent: Option<&Tuple>) {
        self.parent = parent.cloned();
    }

    pub fn describe(&self) -> String {
        format!("TableScan on {}", self.label)
    }
}

/// Point-equality scan through an index.
pub struct IndexScanOp {
    engine: EngineRef,
    table: Arc<Table>,
    specs: Arc<Vec<TupleCellSpec>>,
    label: String,
    hint: IndexHint,
    scanner: Option<Box<dyn RecordScanner>>,
    parent: Option<Tuple>,
}

impl IndexScanOp {
    /// Creates an index scan for the given equality hint.
    pub fn new(engine: EngineRef, table: Arc<Table>, label: &str, hint: IndexHint) -> Self {
        let specs = scan_specs(&table, label);
        Self {
            engine,
            table,
            specs,
            label: label.to_string(),
            hint,
            scanner: None,
            parent: None,
        }
    }

    pub fn open(&mut self, trx: &Trx) -> Result<(), ExecutorError> {
        self.scanner = Some(self.engine.scan(trx, &self.table, Some(&self.hint))?);
        Ok(())
    }

    pub fn next(&mut self) -> Result<Option<Tuple>, ExecutorError> {
        let scanner = self
            .scanner
            .as_mut()
            .ok_or_else(|| ExecutorError::Internal("scan used before open".to_string()))?;
        match scanner.next()? {
            None => Ok(None),
            Some(record) => {
                let values = codec::decode(&self.table.meta, &record.data)?;
                let mut tuple = Tuple::with_rid(self.specs.clone(), values, record.rid);
                tuple.set_parent(self.parent.clone());
                Ok(Some(tuple))
            }
        }
    }

    pub fn close(&mut self) -> Result<(), ExecutorError> {
        self.scanner = None;
        Ok(())
    }

    pub fn schema(&self) -> Arc<Vec<TupleCellSpec>> {
        self.specs.clone()
    }

    pub fn set_parent_tuple(&mut self, parent: Option<&Tuple>) {
        self.parent = parent.cloned();
    }

    pub fn describe(&self) -> String {
        format!("IndexScan on {} using {}", self.label, self.hint.index)
    }
}

/// Vectorized scan: fetches a chunk of rows, evaluates the predicate into
/// a selection vector through the typed kernels, and emits only the
/// selected rows.
///
/// The planner only builds this operator when the whole predicate
/// supports columnar evaluation; anything else stays on the row path.
pub struct ChunkScanOp {
    engine: EngineRef,
    table: Arc<Table>,
    specs: Arc<Vec<TupleCellSpec>>,
    label: String,
    predicate: Expression,
    scanner: Option<Box<dyn RecordScanner>>,
    buffer: VecDeque<Tuple>,
}

impl ChunkScanOp {
    /// Creates a vectorized scan with its predicate.
    pub fn new(engine: EngineRef, table: Arc<Table>, label: &str, predicate: Expression) -> Self {
        let specs = scan_specs(&table, label);
        Self {
            engine,
            table,
            specs,
            label: label.to_string(),
            predicate,
            scanner: None,
            buffer: VecDeque::new(),
        }
    }

    pub fn open(&mut self, trx: &Trx) -> Result<(), ExecutorError> {
        self.scanner = Some(self.engine.scan(trx, &self.table, None)?);
        self.buffer.clear();
        Ok(())
    }

    pub fn next(&mut self) -> Result<Option<Tuple>, ExecutorError> {
        loop {
            if let Some(tuple) = self.buffer.pop_front() {
                return Ok(Some(tuple));
            }
            if !self.fill_buffer()? {
                return Ok(None);
            }
        }
    }

    /// Fetches one chunk, filters it, and refills the output buffer.
    /// Returns false at end of scan.
    fn fill_buffer(&mut self) -> Result<bool, ExecutorError> {
        let scanner = self
            .scanner
            .as_mut()
            .ok_or_else(|| ExecutorError::Internal("scan used before open".to_string()))?;

        let mut rows: Vec<(crate::record::Rid, Vec<crate::types::Value>)> = Vec::new();
        while rows.len() < CHUNK_ROWS {
            match scanner.next()? {
                None => break,
                Some(record) => {
                    let values = codec::decode(&self.table.meta, &record.data)?;
                    rows.push((record.rid, values));
                }
            }
        }
        if rows.is_empty() {
            return Ok(false);
        }

        // Build one column per user field; fields without a vector form
        // stay empty and are never referenced by this predicate.
        let field_num = self.table.meta.user_field_num();
        let mut columns = Vec::with_capacity(field_num);
        for i in 0..field_num {
            let field = self.table.meta.user_field(i);
            let cells: Vec<crate::types::Value> =
                rows.iter().map(|(_, values)| values[i].clone()).collect();
            columns.push(Column::from_values(field.attr_type, &cells));
        }
        let chunk = Chunk::new(columns, rows.len());

        let mut select = vec![0u8; rows.len()];
        self.predicate.eval_select(&chunk, &mut select)?;

        for ((rid, values), keep) in rows.into_iter().zip(&select) {
            if *keep != 0 {
                self.buffer
                    .push_back(Tuple::with_rid(self.specs.clone(), values, rid));
            }
        }
        Ok(true)
    }

    pub fn close(&mut self) -> Result<(), ExecutorError> {
        self.scanner = None;
        self.buffer.clear();
        Ok(())
    }

    pub fn schema(&self) -> Arc<Vec<TupleCellSpec>> {
        self.specs.clone()
    }

    pub fn describe(&self) -> String {
        format!("ChunkScan on {} ({})", self.label, self.predicate)
    }
}
