use crate::{MockCallable, MockStatement};
use parking_lot::Mutex;
use rowmap_core::{Callable, ColumnInfo, Connection, Error, Result, Statement, Value};
use std::{collections::HashMap, sync::Arc};

/// One scripted outcome of an execution: a result set or an update count.
#[derive(Debug, Clone)]
pub enum MockResult {
    Rows {
        columns: Vec<ColumnInfo>,
        rows: Vec<Vec<Value>>,
    },
    Count(u64),
}

#[derive(Debug, Clone, Default)]
pub(crate) struct Script {
    pub results: Vec<MockResult>,
    pub update_count: u64,
    pub fail: Option<String>,
    pub fail_batch: Option<String>,
    pub out_values: HashMap<usize, Value>,
}

#[derive(Default)]
pub(crate) struct MockState {
    scripts: HashMap<String, Script>,
    prepare_count: HashMap<String, usize>,
    close_count: HashMap<String, usize>,
    executions: Vec<String>,
    batches: Vec<(String, usize)>,
}

/// In-memory scripted store. Tests register per-SQL responses up front, hand
/// out connections, and inspect what was prepared and executed afterwards.
#[derive(Default, Clone)]
pub struct MockStore {
    state: Arc<Mutex<MockState>>,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection(&self) -> MockConnection {
        MockConnection {
            state: self.state.clone(),
        }
    }

    fn script_mut(&self, sql: &str, edit: impl FnOnce(&mut Script)) {
        let mut state = self.state.lock();
        edit(state.scripts.entry(sql.to_string()).or_default());
    }

    pub fn on_query(&self, sql: &str, columns: Vec<ColumnInfo>, rows: Vec<Vec<Value>>) {
        self.script_mut(sql, |script| {
            script.results = vec![MockResult::Rows { columns, rows }];
        });
    }

    /// Script a multi-result execution, in protocol order.
    pub fn on_results(&self, sql: &str, results: Vec<MockResult>) {
        self.script_mut(sql, |script| script.results = results);
    }

    pub fn on_update(&self, sql: &str, count: u64) {
        self.script_mut(sql, |script| {
            script.update_count = count;
            script.results = vec![MockResult::Count(count)];
        });
    }

    /// Output-parameter values handed back after a procedure call, keyed by
    /// zero-based parameter position.
    pub fn on_out_values(&self, sql: &str, outs: Vec<(usize, Value)>) {
        self.script_mut(sql, |script| script.out_values = outs.into_iter().collect());
    }

    pub fn fail_on(&self, sql: &str, message: &str) {
        self.script_mut(sql, |script| script.fail = Some(message.to_string()));
    }

    pub fn fail_batch_on(&self, sql: &str, message: &str) {
        self.script_mut(sql, |script| script.fail_batch = Some(message.to_string()));
    }

    pub fn prepare_count(&self, sql: &str) -> usize {
        self.state.lock().prepare_count.get(sql).copied().unwrap_or(0)
    }

    /// How many statements prepared for this SQL have been closed.
    pub fn close_count(&self, sql: &str) -> usize {
        self.state.lock().close_count.get(sql).copied().unwrap_or(0)
    }

    pub fn executions(&self) -> Vec<String> {
        self.state.lock().executions.clone()
    }

    /// Executed sub-batches as (sql, statement count), in execution order.
    pub fn executed_batches(&self) -> Vec<(String, usize)> {
        self.state.lock().batches.clone()
    }
}

impl MockState {
    pub(crate) fn script(&self, sql: &str) -> Result<Script> {
        self.scripts
            .get(sql)
            .cloned()
            .ok_or_else(|| Error::msg(format!("No scripted response for `{sql}`")))
    }

    pub(crate) fn record_execution(&mut self, sql: &str) {
        self.executions.push(sql.to_string());
    }

    pub(crate) fn record_batch(&mut self, sql: &str, size: usize) {
        self.batches.push((sql.to_string(), size));
    }

    pub(crate) fn record_close(&mut self, sql: &str) {
        *self.close_count.entry(sql.to_string()).or_default() += 1;
    }
}

pub struct MockConnection {
    state: Arc<Mutex<MockState>>,
}

impl Connection for MockConnection {
    fn prepare(&mut self, sql: &str) -> Result<Box<dyn Statement>> {
        log::debug!("Mock store preparing `{sql}`");
        *self
            .state
            .lock()
            .prepare_count
            .entry(sql.to_string())
            .or_default() += 1;
        Ok(Box::new(MockStatement::new(sql, self.state.clone())))
    }

    fn prepare_call(&mut self, sql: &str) -> Result<Box<dyn Callable>> {
        log::debug!("Mock store preparing call `{sql}`");
        *self
            .state
            .lock()
            .prepare_count
            .entry(sql.to_string())
            .or_default() += 1;
        Ok(Box::new(MockCallable::new(sql, self.state.clone())))
    }
}
