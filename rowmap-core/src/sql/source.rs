use crate::{
    DataObject, ParameterMapping, Result, TypeHandlerRegistry,
    sql::{
        inline::{parse_inline, substitute},
        nodes::{SqlNode, render},
    },
};
use std::sync::Arc;

/// A statement template ready to execute: placeholder SQL plus the parameter
/// mappings in placeholder order.
#[derive(Debug, Clone)]
pub struct BoundSql {
    pub sql: String,
    pub mappings: Arc<Vec<ParameterMapping>>,
}

/// Where a statement's SQL comes from.
///
/// `Static` templates have no conditional fragments, so their inline
/// parameters are parsed once at build time and every bind reuses the result.
/// `Dynamic` templates re-render their tag tree against each parameter
/// object. `Substitution` templates carry no bound parameters at all; the
/// whole text goes through literal substitution only.
#[derive(Debug)]
pub enum SqlSource {
    Static(BoundSql),
    Dynamic(Vec<SqlNode>),
    Substitution(String),
}

impl SqlSource {
    pub fn parse(sql: &str, registry: &dyn TypeHandlerRegistry) -> Result<Self> {
        let parsed = parse_inline(sql, registry)?;
        Ok(SqlSource::Static(BoundSql {
            sql: parsed.sql,
            mappings: Arc::new(parsed.mappings),
        }))
    }

    pub fn dynamic(nodes: Vec<SqlNode>) -> Self {
        SqlSource::Dynamic(nodes)
    }

    pub fn substitution(sql: impl Into<String>) -> Self {
        SqlSource::Substitution(sql.into())
    }

    /// Produce executable SQL for one invocation. Dynamic sources flatten
    /// their tag tree first; literal substitution always runs last, over the
    /// flattened text.
    pub fn bind(
        &self,
        param: &DataObject,
        registry: &dyn TypeHandlerRegistry,
    ) -> Result<BoundSql> {
        match self {
            SqlSource::Static(bound) => Ok(BoundSql {
                sql: substitute(&bound.sql, param)?,
                mappings: bound.mappings.clone(),
            }),
            SqlSource::Dynamic(nodes) => {
                let rendered = render(nodes, param)?;
                let parsed = parse_inline(&rendered, registry)?;
                Ok(BoundSql {
                    sql: substitute(&parsed.sql, param)?,
                    mappings: Arc::new(parsed.mappings),
                })
            }
            SqlSource::Substitution(sql) => Ok(BoundSql {
                sql: substitute(sql, param)?,
                mappings: Arc::new(Vec::new()),
            }),
        }
    }
}
