use crate::{
    BatchResult, BoundSql, CacheKey, CacheModel, Connection, DataObject,
    DefaultTypeHandlerRegistry, Error, ExecContext, ListRowHandler, ParameterMap, Result,
    ResultMap, ResultMapper, ResultSink, RowHandler, Rows, Session, SqlExecutor, SqlSource,
    TypeHandlerRegistry, Value, apply_output_values, fold_values, parameter_values, truncate_long,
};
use std::{collections::HashMap, sync::Arc, time::Duration};

/// One declared statement: an id, a SQL source, and the maps governing its
/// parameter binding and row mapping.
pub struct MappedStatement {
    pub id: String,
    source: SqlSource,
    parameter_map: Option<Arc<ParameterMap>>,
    result_map: Option<Arc<ResultMap>>,
    additional_result_maps: Vec<Arc<ResultMap>>,
    timeout: Option<Duration>,
    fetch_size: Option<u32>,
    cache: Option<Arc<CacheModel>>,
    /// Cache models emptied whenever this statement executes a write.
    flushes: Vec<Arc<CacheModel>>,
}

impl MappedStatement {
    pub fn new(id: impl Into<String>, source: SqlSource) -> Self {
        Self {
            id: id.into(),
            source,
            parameter_map: None,
            result_map: None,
            additional_result_maps: Vec::new(),
            timeout: None,
            fetch_size: None,
            cache: None,
            flushes: Vec::new(),
        }
    }

    pub fn with_parameter_map(mut self, map: Arc<ParameterMap>) -> Self {
        self.parameter_map = Some(map);
        self
    }

    pub fn with_result_map(mut self, map: Arc<ResultMap>) -> Self {
        self.result_map = Some(map);
        self
    }

    /// Result map for the next additional result set, in declaration order.
    pub fn with_additional_result_map(mut self, map: Arc<ResultMap>) -> Self {
        self.additional_result_maps.push(map);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_fetch_size(mut self, rows: u32) -> Self {
        self.fetch_size = Some(rows);
        self
    }

    pub fn with_cache(mut self, cache: Arc<CacheModel>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn flushes_on_execute(mut self, cache: Arc<CacheModel>) -> Self {
        self.flushes.push(cache);
        self
    }

    /// The parameter map governing binding: the declared one, or an ad-hoc
    /// map over the inline mappings the SQL produced.
    fn effective_parameter_map(&self, bound: &BoundSql) -> Arc<ParameterMap> {
        match &self.parameter_map {
            Some(map) => map.clone(),
            None => Arc::new(ParameterMap::new(
                format!("{}-inline", self.id),
                (*bound.mappings).clone(),
            )),
        }
    }

    fn flush_dependent_caches(&self) {
        for cache in &self.flushes {
            log::debug!("Statement `{}` flushing cache model `{}`", self.id, cache.id);
            cache.flush();
        }
    }

    /// Execution fingerprint: statement id, final SQL, every non-null bound
    /// value in order, and the result window.
    pub fn cache_key(
        &self,
        registry: &dyn TypeHandlerRegistry,
        param: &DataObject,
        skip: Option<u64>,
        max: Option<u64>,
    ) -> Result<CacheKey> {
        let bound = self.source.bind(param, registry)?;
        let map = self.effective_parameter_map(&bound);
        let values = parameter_values(&map, param)?;
        let mut key = CacheKey::new();
        key.update(Value::Varchar(Some(self.id.clone())));
        key.update(Value::Varchar(Some(bound.sql)));
        fold_values(&mut key, &values);
        key.update(Value::Int64(skip.map(|v| v as i64)));
        key.update(Value::Int64(max.map(|v| v as i64)));
        Ok(key)
    }

    fn bind(&self, ctx: &ExecContext, param: &DataObject) -> Result<(BoundSql, Vec<Value>)> {
        let bound = self.source.bind(param, ctx.mapper.registry().as_ref())?;
        let map = self.effective_parameter_map(&bound);
        let values = parameter_values(&map, param)?;
        Ok((bound, values))
    }

    pub fn execute_update(&self, ctx: &mut ExecContext, param: &DataObject) -> Result<u64> {
        let (bound, values) = self.bind(ctx, param)?;
        log::debug!("Statement `{}`: {}", self.id, truncate_long!(bound.sql));
        let count = SqlExecutor::execute_update(ctx, &bound.sql, &values, self.timeout)?;
        self.flush_dependent_caches();
        Ok(count)
    }

    /// Run the query and feed every object mapped from the first result set
    /// to the handler. Result sets beyond the first are discarded here; use
    /// [`MappedStatement::execute_query_for_multiple`] for statements
    /// declaring additional result maps.
    pub fn execute_query_with_handler(
        &self,
        ctx: &mut ExecContext,
        param: &DataObject,
        skip: Option<u64>,
        max: Option<u64>,
        handler: &mut dyn RowHandler,
    ) -> Result<()> {
        let map = self.primary_result_map()?;
        let (bound, values) = self.bind(ctx, param)?;
        log::debug!("Statement `{}`: {}", self.id, truncate_long!(bound.sql));
        let mut sink = PrimarySink {
            statement_id: &self.id,
            map,
            handler,
        };
        SqlExecutor::execute_query(
            ctx,
            &bound.sql,
            &values,
            self.timeout,
            self.fetch_size,
            skip,
            max,
            &mut sink,
        )
    }

    pub fn execute_query_for_list(
        &self,
        ctx: &mut ExecContext,
        param: &DataObject,
        skip: Option<u64>,
        max: Option<u64>,
    ) -> Result<Vec<DataObject>> {
        if let Some(cache) = &self.cache {
            let key = self.cache_key(ctx.mapper.registry().as_ref(), param, skip, max)?;
            if let Some(DataObject::List(items)) = cache.get(&key) {
                return Ok(items);
            }
            let mut handler = ListRowHandler::default();
            self.execute_query_with_handler(ctx, param, skip, max, &mut handler)?;
            cache.put(key, DataObject::List(handler.list.clone()));
            return Ok(handler.list);
        }
        let mut handler = ListRowHandler::default();
        self.execute_query_with_handler(ctx, param, skip, max, &mut handler)?;
        Ok(handler.list)
    }

    /// Single-object form: NULL when no row matched, an error when more than
    /// one did.
    pub fn execute_query_for_object(
        &self,
        ctx: &mut ExecContext,
        param: &DataObject,
    ) -> Result<DataObject> {
        let mut list = self.execute_query_for_list(ctx, param, None, None)?;
        match list.len() {
            0 => Ok(DataObject::Null),
            1 => Ok(list.remove(0)),
            n => Err(Error::msg(format!(
                "Statement `{}` returned {n} results where at most one was expected",
                self.id
            ))),
        }
    }

    /// One mapped list per declared result map, in result-set order. Extra
    /// result sets beyond the declared maps are drained and discarded.
    pub fn execute_query_for_multiple(
        &self,
        ctx: &mut ExecContext,
        param: &DataObject,
    ) -> Result<Vec<Vec<DataObject>>> {
        let mut maps = Vec::with_capacity(1 + self.additional_result_maps.len());
        maps.push(self.primary_result_map()?.clone());
        maps.extend(self.additional_result_maps.iter().cloned());
        let (bound, values) = self.bind(ctx, param)?;
        log::debug!("Statement `{}`: {}", self.id, truncate_long!(bound.sql));
        let mut sink = MultiSink {
            statement_id: &self.id,
            lists: maps.iter().map(|_| ListRowHandler::default()).collect(),
            maps,
        };
        SqlExecutor::execute_query(
            ctx,
            &bound.sql,
            &values,
            self.timeout,
            self.fetch_size,
            None,
            None,
            &mut sink,
        )?;
        Ok(sink.lists.into_iter().map(|handler| handler.list).collect())
    }

    pub fn add_batch(&self, ctx: &mut ExecContext, param: &DataObject) -> Result<()> {
        let (bound, values) = self.bind(ctx, param)?;
        SqlExecutor::add_batch(ctx, &bound.sql, &values)
    }

    /// Call a procedure for its side effects. OUT-mode parameter values are
    /// written back onto the parameter object.
    pub fn execute_update_procedure(
        &self,
        ctx: &mut ExecContext,
        param: &mut DataObject,
    ) -> Result<u64> {
        let (bound, values) = self.bind(ctx, param)?;
        let map = self.effective_parameter_map(&bound);
        log::debug!("Statement `{}` (call): {}", self.id, truncate_long!(bound.sql));
        let (count, outputs) = SqlExecutor::execute_update_procedure(
            ctx,
            &bound.sql,
            &values,
            map.mappings(),
            self.timeout,
        )?;
        apply_output_values(&map, param, &outputs)?;
        self.flush_dependent_caches();
        Ok(count)
    }

    /// Call a procedure that also returns rows; rows map through the primary
    /// result map into the handler, OUT values onto the parameter object.
    pub fn execute_query_procedure(
        &self,
        ctx: &mut ExecContext,
        param: &mut DataObject,
        skip: Option<u64>,
        max: Option<u64>,
        handler: &mut dyn RowHandler,
    ) -> Result<()> {
        let result_map = self.primary_result_map()?;
        let (bound, values) = self.bind(ctx, param)?;
        let map = self.effective_parameter_map(&bound);
        log::debug!("Statement `{}` (call): {}", self.id, truncate_long!(bound.sql));
        let mut sink = PrimarySink {
            statement_id: &self.id,
            map: result_map,
            handler,
        };
        let outputs = SqlExecutor::execute_query_procedure(
            ctx,
            &bound.sql,
            &values,
            map.mappings(),
            self.timeout,
            self.fetch_size,
            skip,
            max,
            &mut sink,
        )?;
        apply_output_values(&map, param, &outputs)
    }

    fn primary_result_map(&self) -> Result<&Arc<ResultMap>> {
        self.result_map
            .as_ref()
            .ok_or_else(|| Error::msg(format!("Statement `{}` has no result map", self.id)))
    }
}

struct PrimarySink<'a> {
    statement_id: &'a str,
    map: &'a Arc<ResultMap>,
    handler: &'a mut dyn RowHandler,
}

impl ResultSink for PrimarySink<'_> {
    fn result_set(
        &mut self,
        ctx: &mut ExecContext,
        index: usize,
        rows: &mut dyn Rows,
    ) -> Result<()> {
        if index > 0 {
            log::debug!(
                "Discarding result set {index} of statement `{}`",
                self.statement_id
            );
            return Ok(());
        }
        ResultMapper::map_rows(ctx, self.map, rows, self.handler)
    }
}

struct MultiSink<'a> {
    statement_id: &'a str,
    maps: Vec<Arc<ResultMap>>,
    lists: Vec<ListRowHandler>,
}

impl ResultSink for MultiSink<'_> {
    fn result_set(
        &mut self,
        ctx: &mut ExecContext,
        index: usize,
        rows: &mut dyn Rows,
    ) -> Result<()> {
        let Some(map) = self.maps.get(index).cloned() else {
            log::debug!(
                "Discarding undeclared result set {index} of statement `{}`",
                self.statement_id
            );
            return Ok(());
        };
        ResultMapper::map_rows(ctx, &map, rows, &mut self.lists[index])
    }
}

/// Registry of mapped statements plus the type-handler registry they bind
/// through. The entry point for every mapped operation: callers pass their
/// session and connection, and the engine threads them through execution
/// explicitly.
pub struct SqlMapper {
    statements: HashMap<String, Arc<MappedStatement>>,
    registry: Arc<dyn TypeHandlerRegistry>,
}

impl Default for SqlMapper {
    fn default() -> Self {
        Self::new()
    }
}

impl SqlMapper {
    pub fn new() -> Self {
        Self::with_registry(Arc::new(DefaultTypeHandlerRegistry::default()))
    }

    pub fn with_registry(registry: Arc<dyn TypeHandlerRegistry>) -> Self {
        Self {
            statements: HashMap::new(),
            registry,
        }
    }

    pub fn register(&mut self, statement: MappedStatement) -> Result<()> {
        if self.statements.contains_key(&statement.id) {
            return Err(Error::msg(format!(
                "Duplicate statement id `{}`",
                statement.id
            )));
        }
        self.statements
            .insert(statement.id.clone(), Arc::new(statement));
        Ok(())
    }

    pub fn statement(&self, id: &str) -> Result<Arc<MappedStatement>> {
        self.statements
            .get(id)
            .cloned()
            .ok_or_else(|| Error::msg(format!("Unknown statement id `{id}`")))
    }

    pub fn registry(&self) -> &Arc<dyn TypeHandlerRegistry> {
        &self.registry
    }

    fn context<'a>(
        &'a self,
        session: &'a mut Session,
        conn: &'a mut dyn Connection,
    ) -> ExecContext<'a> {
        ExecContext {
            session,
            conn,
            mapper: self,
        }
    }

    pub fn update(
        &self,
        session: &mut Session,
        conn: &mut dyn Connection,
        id: &str,
        param: &DataObject,
    ) -> Result<u64> {
        let statement = self.statement(id)?;
        statement.execute_update(&mut self.context(session, conn), param)
    }

    pub fn query_for_list(
        &self,
        session: &mut Session,
        conn: &mut dyn Connection,
        id: &str,
        param: &DataObject,
        skip: Option<u64>,
        max: Option<u64>,
    ) -> Result<Vec<DataObject>> {
        let statement = self.statement(id)?;
        statement.execute_query_for_list(&mut self.context(session, conn), param, skip, max)
    }

    pub fn query_for_object(
        &self,
        session: &mut Session,
        conn: &mut dyn Connection,
        id: &str,
        param: &DataObject,
    ) -> Result<DataObject> {
        let statement = self.statement(id)?;
        statement.execute_query_for_object(&mut self.context(session, conn), param)
    }

    pub fn query_with_handler(
        &self,
        session: &mut Session,
        conn: &mut dyn Connection,
        id: &str,
        param: &DataObject,
        skip: Option<u64>,
        max: Option<u64>,
        handler: &mut dyn RowHandler,
    ) -> Result<()> {
        let statement = self.statement(id)?;
        statement.execute_query_with_handler(
            &mut self.context(session, conn),
            param,
            skip,
            max,
            handler,
        )
    }

    pub fn query_for_multiple(
        &self,
        session: &mut Session,
        conn: &mut dyn Connection,
        id: &str,
        param: &DataObject,
    ) -> Result<Vec<Vec<DataObject>>> {
        let statement = self.statement(id)?;
        statement.execute_query_for_multiple(&mut self.context(session, conn), param)
    }

    pub fn add_batch(
        &self,
        session: &mut Session,
        conn: &mut dyn Connection,
        id: &str,
        param: &DataObject,
    ) -> Result<()> {
        let statement = self.statement(id)?;
        statement.add_batch(&mut self.context(session, conn), param)
    }

    pub fn execute_batch(
        &self,
        session: &mut Session,
        conn: &mut dyn Connection,
    ) -> Result<u64> {
        SqlExecutor::execute_batch(&mut self.context(session, conn))
    }

    pub fn execute_batch_detailed(
        &self,
        session: &mut Session,
        conn: &mut dyn Connection,
    ) -> Result<Vec<BatchResult>> {
        SqlExecutor::execute_batch_detailed(&mut self.context(session, conn))
    }

    pub fn update_procedure(
        &self,
        session: &mut Session,
        conn: &mut dyn Connection,
        id: &str,
        param: &mut DataObject,
    ) -> Result<u64> {
        let statement = self.statement(id)?;
        statement.execute_update_procedure(&mut self.context(session, conn), param)
    }

    pub fn query_procedure(
        &self,
        session: &mut Session,
        conn: &mut dyn Connection,
        id: &str,
        param: &mut DataObject,
        handler: &mut dyn RowHandler,
    ) -> Result<()> {
        let statement = self.statement(id)?;
        statement.execute_query_procedure(
            &mut self.context(session, conn),
            param,
            None,
            None,
            handler,
        )
    }
}
