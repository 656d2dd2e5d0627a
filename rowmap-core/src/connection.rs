use crate::{Result, Value, ValueKind};
use std::time::Duration;

/// Label and declared kind of one result-set column.
#[derive(Debug, Clone)]
pub struct ColumnInfo {
    pub name: String,
    pub kind: Option<ValueKind>,
}

impl ColumnInfo {
    pub fn new(name: impl Into<String>, kind: Option<ValueKind>) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// A forward-only cursor over one result set. Implementations own their data
/// independently of the producing statement borrow, so a cursor may be
/// consumed while the statement is used for other work.
pub trait Rows: Send {
    fn columns(&self) -> &[ColumnInfo];
    /// Positional values of the next row, aligned with `columns`.
    fn next(&mut self) -> Result<Option<Vec<Value>>>;
}

/// One execution outcome in a possibly multi-result protocol. Some stores
/// signal trailing update counts ambiguously; consumers must tolerate
/// `Count` entries interleaved with result sets while probing.
pub enum NextResult {
    Rows(Box<dyn Rows>),
    Count(u64),
}

/// A prepared statement handle at the store boundary.
pub trait Statement: Send {
    /// Store-enforced timeout; this engine only passes it through.
    fn set_timeout(&mut self, timeout: Option<Duration>) -> Result<()>;
    fn set_fetch_size(&mut self, rows: Option<u32>) -> Result<()>;
    /// Bind positional parameters and execute, returning the first result.
    fn execute(&mut self, params: &[Value]) -> Result<NextResult>;
    /// Probe for further results after `execute`; `None` once exhausted.
    fn next_result(&mut self) -> Result<Option<NextResult>>;
    fn add_batch(&mut self, params: &[Value]) -> Result<()>;
    /// Update counts for the accumulated batch, in submission order.
    fn execute_batch(&mut self) -> Result<Vec<u64>>;
    fn close(&mut self) -> Result<()>;
}

/// A statement that can carry registered output parameters (stored
/// procedures). Parameter positions are zero-based.
pub trait Callable: Statement {
    fn register_out_parameter(&mut self, position: usize, kind: ValueKind) -> Result<()>;
    /// Value of a registered output parameter, after execution.
    fn out_parameter(&mut self, position: usize) -> Result<Value>;
}

/// The current connection, supplied per session by an external provider.
/// Transaction boundaries are owned by an external strategy; this engine
/// only executes against whatever connection it is handed.
pub trait Connection: Send {
    fn prepare(&mut self, sql: &str) -> Result<Box<dyn Statement>>;
    fn prepare_call(&mut self, sql: &str) -> Result<Box<dyn Callable>>;
}
