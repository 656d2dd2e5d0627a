use crate::{
    Callable, ColumnInfo, Error, ExecContext, NextResult, ParameterMapping, Result, Rows,
    Statement, SubBatch, Value, truncate_long,
};
use anyhow::Context;
use std::{fmt, time::Duration};

/// Receives each result set of one execution in protocol order. The window
/// (skip/max) is already applied to the first set by the executor; sinks that
/// ignore a set simply return without reading it.
pub trait ResultSink {
    fn result_set(&mut self, ctx: &mut ExecContext, index: usize, rows: &mut dyn Rows)
    -> Result<()>;
}

/// Update counts of one executed sub-batch, in submission order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchResult {
    pub sql: String,
    pub update_counts: Vec<u64>,
}

/// Detailed batch failure: everything that completed before the failing
/// sub-batch, plus which SQL failed and why.
#[derive(Debug)]
pub struct BatchFailure {
    pub completed: Vec<BatchResult>,
    pub failing_sql: String,
    pub failing_index: usize,
    pub source: Error,
}

impl fmt::Display for BatchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Batch failed at sub-batch {} ({} completed before it) executing `{}`",
            self.failing_index,
            self.completed.len(),
            truncate_long!(self.failing_sql),
        )
    }
}

impl std::error::Error for BatchFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.source.as_ref())
    }
}

/// Caps the first result set at `max` rows; later sets pass through whole.
struct WindowedRows<'a> {
    inner: &'a mut dyn Rows,
    remaining: Option<u64>,
}

impl Rows for WindowedRows<'_> {
    fn columns(&self) -> &[ColumnInfo] {
        self.inner.columns()
    }

    fn next(&mut self) -> Result<Option<Vec<Value>>> {
        if self.remaining == Some(0) {
            return Ok(None);
        }
        let row = self.inner.next()?;
        if row.is_some()
            && let Some(remaining) = &mut self.remaining
        {
            *remaining -= 1;
        }
        Ok(row)
    }
}

/// Runs final SQL against the session's connection: updates, windowed
/// queries with multi-result draining, sub-grouped batches, and stored
/// procedure calls with output parameters.
pub struct SqlExecutor;

impl SqlExecutor {
    fn obtain(ctx: &mut ExecContext, sql: &str) -> Result<Box<dyn Statement>> {
        if let Some(statement) = ctx.session.take_statement(sql) {
            return Ok(statement);
        }
        log::debug!("Preparing statement: {}", truncate_long!(sql));
        ctx.conn
            .prepare(sql)
            .with_context(|| format!("While preparing `{}`", truncate_long!(sql)))
    }

    fn discard(mut statement: Box<dyn Statement>, sql: &str) {
        if let Err(error) = statement.close() {
            log::warn!("Failed to close statement for `{}`: {error:#}", truncate_long!(sql));
        }
    }

    pub fn execute_update(
        ctx: &mut ExecContext,
        sql: &str,
        params: &[Value],
        timeout: Option<Duration>,
    ) -> Result<u64> {
        let mut statement = Self::obtain(ctx, sql)?;
        let outcome = statement
            .set_timeout(timeout)
            .and_then(|()| statement.execute(params));
        match outcome {
            Ok(NextResult::Count(count)) => {
                ctx.session.store_statement(sql, statement);
                Ok(count)
            }
            Ok(NextResult::Rows(..)) => {
                Self::discard(statement, sql);
                Err(Error::msg(format!(
                    "Update returned a result set instead of an update count: `{}`",
                    truncate_long!(sql)
                )))
            }
            Err(error) => {
                Self::discard(statement, sql);
                Err(error).with_context(|| format!("While executing `{}`", truncate_long!(sql)))
            }
        }
    }

    pub fn execute_query(
        ctx: &mut ExecContext,
        sql: &str,
        params: &[Value],
        timeout: Option<Duration>,
        fetch_size: Option<u32>,
        skip: Option<u64>,
        max: Option<u64>,
        sink: &mut dyn ResultSink,
    ) -> Result<()> {
        let mut statement = Self::obtain(ctx, sql)?;
        let outcome = statement
            .set_timeout(timeout)
            .and_then(|()| statement.set_fetch_size(fetch_size))
            .and_then(|()| {
                Self::drain_results(ctx, statement.as_mut(), params, skip, max, sink)
            });
        match outcome {
            Ok(()) => {
                ctx.session.store_statement(sql, statement);
                Ok(())
            }
            Err(error) => {
                Self::discard(statement, sql);
                Err(error).with_context(|| format!("While executing `{}`", truncate_long!(sql)))
            }
        }
    }

    /// Walk every result of an execution. Update counts interleaved with
    /// result sets are tolerated and skipped; only result sets reach the
    /// sink, and only the first one is windowed.
    fn drain_results(
        ctx: &mut ExecContext,
        statement: &mut dyn Statement,
        params: &[Value],
        skip: Option<u64>,
        max: Option<u64>,
        sink: &mut dyn ResultSink,
    ) -> Result<()> {
        let mut index = 0;
        let mut next = Some(statement.execute(params)?);
        while let Some(result) = next {
            match result {
                NextResult::Count(count) => {
                    log::debug!("Skipping update count {count} while probing for result sets");
                }
                NextResult::Rows(mut rows) => {
                    if index == 0 {
                        if let Some(skip) = skip {
                            for _ in 0..skip {
                                if rows.next()?.is_none() {
                                    break;
                                }
                            }
                        }
                        let mut windowed = WindowedRows {
                            inner: rows.as_mut(),
                            remaining: max,
                        };
                        sink.result_set(ctx, index, &mut windowed)?;
                    } else {
                        sink.result_set(ctx, index, rows.as_mut())?;
                    }
                    index += 1;
                }
            }
            next = statement.next_result()?;
        }
        Ok(())
    }

    /// Queue one statement execution on the session batch, reusing the
    /// current prepared statement while the SQL is unchanged and opening a
    /// new sub-batch when it differs.
    pub fn add_batch(ctx: &mut ExecContext, sql: &str, params: &[Value]) -> Result<()> {
        if ctx.session.batch_mut().is_none() {
            ctx.session.start_batch();
        }
        let reusable = ctx
            .session
            .batch_mut()
            .and_then(|batch| batch.current_mut())
            .is_some_and(|sub| sub.sql == sql);
        if !reusable {
            let statement = Self::obtain(ctx, sql)?;
            let batch = ctx
                .session
                .batch_mut()
                .ok_or_else(|| Error::msg("Batch state lost during statement preparation"))?;
            batch.batches.push(SubBatch {
                sql: sql.to_string(),
                statement,
                size: 0,
            });
        }
        let sub = ctx
            .session
            .batch_mut()
            .and_then(|batch| batch.current_mut())
            .ok_or_else(|| Error::msg("Batch state lost during statement preparation"))?;
        sub.statement
            .add_batch(params)
            .with_context(|| format!("While batching `{}`", truncate_long!(sql)))?;
        sub.size += 1;
        Ok(())
    }

    /// Execute the pending batch, returning the total number of affected
    /// rows across all sub-batches.
    pub fn execute_batch(ctx: &mut ExecContext) -> Result<u64> {
        let results = Self::execute_batch_detailed(ctx)?;
        Ok(results
            .iter()
            .flat_map(|result| &result.update_counts)
            .sum())
    }

    /// Execute the pending batch sub-batch by sub-batch, in submission
    /// order. On failure the error downcasts to [`BatchFailure`], carrying
    /// the results of every sub-batch that completed first.
    pub fn execute_batch_detailed(ctx: &mut ExecContext) -> Result<Vec<BatchResult>> {
        let Some(batch) = ctx.session.take_batch() else {
            return Ok(Vec::new());
        };
        let mut completed = Vec::with_capacity(batch.batches.len());
        let mut batches = batch.batches.into_iter();
        let mut index = 0;
        while let Some(mut sub) = batches.next() {
            log::debug!(
                "Executing sub-batch {index} of {} statements: {}",
                sub.size,
                truncate_long!(sub.sql)
            );
            match sub.statement.execute_batch() {
                Ok(update_counts) => {
                    ctx.session.store_statement(sub.sql.clone(), sub.statement);
                    completed.push(BatchResult {
                        sql: sub.sql,
                        update_counts,
                    });
                }
                Err(source) => {
                    Self::discard(sub.statement, &sub.sql);
                    for remaining in batches {
                        Self::discard(remaining.statement, &remaining.sql);
                    }
                    return Err(Error::new(BatchFailure {
                        completed,
                        failing_sql: sub.sql,
                        failing_index: index,
                        source,
                    }));
                }
            }
            index += 1;
        }
        Ok(completed)
    }

    pub fn execute_update_procedure(
        ctx: &mut ExecContext,
        sql: &str,
        params: &[Value],
        mappings: &[ParameterMapping],
        timeout: Option<Duration>,
    ) -> Result<(u64, Vec<(usize, Value)>)> {
        let mut statement = ctx
            .conn
            .prepare_call(sql)
            .with_context(|| format!("While preparing call `{}`", truncate_long!(sql)))?;
        let outcome = statement
            .set_timeout(timeout)
            .and_then(|()| Self::register_outputs(statement.as_mut(), mappings))
            .and_then(|()| statement.execute(params))
            .and_then(|result| {
                let count = match result {
                    NextResult::Count(count) => count,
                    // procedures may emit rows even on the update form
                    NextResult::Rows(..) => 0,
                };
                while statement.next_result()?.is_some() {}
                Ok((count, Self::collect_outputs(statement.as_mut(), mappings)?))
            });
        Self::discard(statement, sql);
        outcome.with_context(|| format!("While calling `{}`", truncate_long!(sql)))
    }

    pub fn execute_query_procedure(
        ctx: &mut ExecContext,
        sql: &str,
        params: &[Value],
        mappings: &[ParameterMapping],
        timeout: Option<Duration>,
        fetch_size: Option<u32>,
        skip: Option<u64>,
        max: Option<u64>,
        sink: &mut dyn ResultSink,
    ) -> Result<Vec<(usize, Value)>> {
        let mut statement = ctx
            .conn
            .prepare_call(sql)
            .with_context(|| format!("While preparing call `{}`", truncate_long!(sql)))?;
        let outcome = statement
            .set_timeout(timeout)
            .and_then(|()| statement.set_fetch_size(fetch_size))
            .and_then(|()| Self::register_outputs(statement.as_mut(), mappings))
            .and_then(|()| {
                Self::drain_results(ctx, statement.as_mut(), params, skip, max, sink)
            })
            .and_then(|()| Self::collect_outputs(statement.as_mut(), mappings));
        Self::discard(statement, sql);
        outcome.with_context(|| format!("While calling `{}`", truncate_long!(sql)))
    }

    fn register_outputs(
        statement: &mut dyn Callable,
        mappings: &[ParameterMapping],
    ) -> Result<()> {
        for (position, mapping) in mappings.iter().enumerate() {
            if !mapping.mode.is_out() {
                continue;
            }
            let kind = mapping.kind.ok_or_else(|| {
                Error::msg(format!(
                    "Output parameter `{}` requires a declared type",
                    mapping.property
                ))
            })?;
            statement.register_out_parameter(position, kind)?;
        }
        Ok(())
    }

    /// Pairs of (parameter position, value) for every registered output.
    fn collect_outputs(
        statement: &mut dyn Callable,
        mappings: &[ParameterMapping],
    ) -> Result<Vec<(usize, Value)>> {
        let mut outputs = Vec::new();
        for (position, mapping) in mappings.iter().enumerate() {
            if mapping.mode.is_out() {
                outputs.push((position, statement.out_parameter(position)?));
            }
        }
        Ok(outputs)
    }
}
