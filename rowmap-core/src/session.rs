use crate::{Connection, DataObject, Result, Statement, StatementRunner, truncate_long};
use std::collections::HashMap;

/// One batch slice: consecutive `add_batch` calls that shared the same SQL
/// and therefore the same prepared statement.
pub struct SubBatch {
    pub sql: String,
    pub statement: Box<dyn Statement>,
    pub size: usize,
}

/// Pending batch work in submission order. A new sub-batch starts whenever
/// the submitted SQL differs from the current one.
#[derive(Default)]
pub struct BatchAccumulator {
    pub batches: Vec<SubBatch>,
}

impl BatchAccumulator {
    pub fn current_mut(&mut self) -> Option<&mut SubBatch> {
        self.batches.last_mut()
    }
}

/// Per-session execution state: a prepared-statement cache keyed by final SQL
/// text, plus any batch in progress. Sessions are single-threaded by design;
/// shared engine state lives elsewhere.
#[derive(Default)]
pub struct Session {
    statements: HashMap<String, Box<dyn Statement>>,
    batch: Option<BatchAccumulator>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove a cached prepared statement so the caller can execute it while
    /// the session stays borrowable for nested work. Return it with
    /// [`Session::store_statement`] afterwards.
    pub fn take_statement(&mut self, sql: &str) -> Option<Box<dyn Statement>> {
        self.statements.remove(sql)
    }

    /// Cache a prepared statement under its final SQL. A handle already
    /// cached for the same SQL is closed before being displaced; nested work
    /// can prepare the same text while the outer handle is checked out.
    pub fn store_statement(&mut self, sql: impl Into<String>, statement: Box<dyn Statement>) {
        let sql = sql.into();
        if let Some(mut displaced) = self.statements.remove(&sql) {
            if let Err(error) = displaced.close() {
                log::warn!("Failed to close statement for `{}`: {error:#}", truncate_long!(sql));
            }
        }
        self.statements.insert(sql, statement);
    }

    pub fn start_batch(&mut self) {
        self.batch = Some(BatchAccumulator::default());
    }

    pub fn batch_mut(&mut self) -> Option<&mut BatchAccumulator> {
        self.batch.as_mut()
    }

    pub fn take_batch(&mut self) -> Option<BatchAccumulator> {
        self.batch.take()
    }

    /// Close every cached statement. Close failures are logged and swallowed;
    /// teardown must not mask an earlier error.
    pub fn close(&mut self) {
        for (sql, mut statement) in self.statements.drain() {
            if let Err(error) = statement.close() {
                log::warn!("Failed to close statement for `{}`: {error:#}", truncate_long!(sql));
            }
        }
        self.batch = None;
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}

/// Everything one mapped call needs, threaded explicitly through execution
/// and row mapping instead of being stashed in thread-local state. Nested
/// statements (sub-selects, deferred loads) run through the same context.
pub struct ExecContext<'a> {
    pub session: &'a mut Session,
    pub conn: &'a mut dyn Connection,
    pub mapper: &'a crate::SqlMapper,
}

impl StatementRunner for ExecContext<'_> {
    fn run_for_object(&mut self, statement_id: &str, param: DataObject) -> Result<DataObject> {
        let statement = self.mapper.statement(statement_id)?;
        statement.execute_query_for_object(self, &param)
    }

    fn run_for_list(&mut self, statement_id: &str, param: DataObject) -> Result<Vec<DataObject>> {
        let statement = self.mapper.statement(statement_id)?;
        statement.execute_query_for_list(self, &param, None, None)
    }
}
