use crate::{MockResult, MockState};
use parking_lot::Mutex;
use rowmap_core::{
    Callable, ColumnInfo, Error, NextResult, Result, Rows, Statement, Value, ValueKind,
};
use std::{
    collections::{HashMap, HashSet, VecDeque},
    sync::Arc,
    time::Duration,
};

/// A materialized result set; rows are owned, independent of the statement.
pub struct VecRows {
    columns: Vec<ColumnInfo>,
    rows: VecDeque<Vec<Value>>,
}

impl VecRows {
    pub fn new(columns: Vec<ColumnInfo>, rows: Vec<Vec<Value>>) -> Self {
        Self {
            columns,
            rows: rows.into(),
        }
    }
}

impl Rows for VecRows {
    fn columns(&self) -> &[ColumnInfo] {
        &self.columns
    }

    fn next(&mut self) -> Result<Option<Vec<Value>>> {
        Ok(self.rows.pop_front())
    }
}

pub struct MockStatement {
    sql: String,
    state: Arc<Mutex<MockState>>,
    pending: VecDeque<MockResult>,
    batch: Vec<Vec<Value>>,
    pub timeout: Option<Duration>,
    pub fetch_size: Option<u32>,
    closed: bool,
}

impl MockStatement {
    pub(crate) fn new(sql: &str, state: Arc<Mutex<MockState>>) -> Self {
        Self {
            sql: sql.to_string(),
            state,
            pending: VecDeque::new(),
            batch: Vec::new(),
            timeout: None,
            fetch_size: None,
            closed: false,
        }
    }

    fn check_open(&self) -> Result<()> {
        if self.closed {
            return Err(Error::msg(format!("Statement for `{}` is closed", self.sql)));
        }
        Ok(())
    }
}

fn materialize(result: MockResult) -> NextResult {
    match result {
        MockResult::Rows { columns, rows } => NextResult::Rows(Box::new(VecRows::new(columns, rows))),
        MockResult::Count(count) => NextResult::Count(count),
    }
}

impl Statement for MockStatement {
    fn set_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        self.timeout = timeout;
        Ok(())
    }

    fn set_fetch_size(&mut self, rows: Option<u32>) -> Result<()> {
        self.fetch_size = rows;
        Ok(())
    }

    fn execute(&mut self, _params: &[Value]) -> Result<NextResult> {
        self.check_open()?;
        let script = {
            let mut state = self.state.lock();
            state.record_execution(&self.sql);
            state.script(&self.sql)?
        };
        if let Some(message) = script.fail {
            return Err(Error::msg(message));
        }
        let mut results: VecDeque<MockResult> = script.results.into();
        let first = results
            .pop_front()
            .ok_or_else(|| Error::msg(format!("Script for `{}` has no results", self.sql)))?;
        self.pending = results;
        Ok(materialize(first))
    }

    fn next_result(&mut self) -> Result<Option<NextResult>> {
        self.check_open()?;
        Ok(self.pending.pop_front().map(materialize))
    }

    fn add_batch(&mut self, params: &[Value]) -> Result<()> {
        self.check_open()?;
        self.batch.push(params.to_vec());
        Ok(())
    }

    fn execute_batch(&mut self) -> Result<Vec<u64>> {
        self.check_open()?;
        let size = self.batch.len();
        let script = {
            let mut state = self.state.lock();
            state.record_batch(&self.sql, size);
            state.script(&self.sql)?
        };
        self.batch.clear();
        if let Some(message) = script.fail_batch {
            return Err(Error::msg(message));
        }
        Ok(vec![script.update_count; size])
    }

    fn close(&mut self) -> Result<()> {
        if !self.closed {
            self.closed = true;
            self.state.lock().record_close(&self.sql);
        }
        Ok(())
    }
}

pub struct MockCallable {
    inner: MockStatement,
    registered: HashSet<usize>,
    outs: HashMap<usize, Value>,
}

impl MockCallable {
    pub(crate) fn new(sql: &str, state: Arc<Mutex<MockState>>) -> Self {
        let outs = state
            .lock()
            .script(sql)
            .map(|script| script.out_values)
            .unwrap_or_default();
        Self {
            inner: MockStatement::new(sql, state),
            registered: HashSet::new(),
            outs,
        }
    }
}

impl Statement for MockCallable {
    fn set_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        self.inner.set_timeout(timeout)
    }

    fn set_fetch_size(&mut self, rows: Option<u32>) -> Result<()> {
        self.inner.set_fetch_size(rows)
    }

    fn execute(&mut self, params: &[Value]) -> Result<NextResult> {
        self.inner.execute(params)
    }

    fn next_result(&mut self) -> Result<Option<NextResult>> {
        self.inner.next_result()
    }

    fn add_batch(&mut self, params: &[Value]) -> Result<()> {
        self.inner.add_batch(params)
    }

    fn execute_batch(&mut self) -> Result<Vec<u64>> {
        self.inner.execute_batch()
    }

    fn close(&mut self) -> Result<()> {
        self.inner.close()
    }
}

impl Callable for MockCallable {
    fn register_out_parameter(&mut self, position: usize, _kind: ValueKind) -> Result<()> {
        self.registered.insert(position);
        Ok(())
    }

    fn out_parameter(&mut self, position: usize) -> Result<Value> {
        if !self.registered.contains(&position) {
            return Err(Error::msg(format!(
                "Output parameter {position} was never registered"
            )));
        }
        self.outs.get(&position).cloned().ok_or_else(|| {
            Error::msg(format!("No scripted output value at position {position}"))
        })
    }
}
