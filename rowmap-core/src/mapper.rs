use crate::{
    CacheKey, ColumnInfo, DataObject, Deferred, Error, ExecContext, NestedSelect, ResultMap,
    ResultMapping, Result, Rows, StatementRunner, Value,
};
use anyhow::Context;
use std::{collections::HashMap, sync::Arc};

/// Receives each fully mapped top-level object, in row order. Grouped maps
/// deliver each parent once, after all of its rows have been folded.
pub trait RowHandler {
    fn handle_row(&mut self, row: DataObject) -> Result<()>;
}

/// Accumulates mapped objects into a list.
#[derive(Default)]
pub struct ListRowHandler {
    pub list: Vec<DataObject>,
}

impl RowHandler for ListRowHandler {
    fn handle_row(&mut self, row: DataObject) -> Result<()> {
        self.list.push(row);
        Ok(())
    }
}

/// Maps the rows of one result set through a result map.
pub struct ResultMapper;

impl ResultMapper {
    pub fn map_rows(
        ctx: &mut ExecContext,
        map: &Arc<ResultMap>,
        rows: &mut dyn Rows,
        handler: &mut dyn RowHandler,
    ) -> Result<()> {
        let columns = rows.columns().to_vec();
        // Grouped parents fold across rows and are emitted once at the end,
        // in first-appearance order.
        let mut order: Vec<CacheKey> = Vec::new();
        let mut parents: HashMap<CacheKey, DataObject> = HashMap::new();
        while let Some(row) = rows.next()? {
            let effective = discriminate(map, &columns, &row)?;
            let mappings = effective.resolve_mappings(&columns)?;
            if !effective.is_grouped() {
                let mut target = effective.target.instantiate()?;
                apply_mappings(ctx, &effective, &mappings, &columns, &row, &mut target, true)?;
                handler.handle_row(target)?;
                continue;
            }
            let values = group_values(&effective, &mappings, &columns, &row)?;
            let key = group_key(&effective, &values);
            let is_new = !parents.contains_key(&key);
            let mut target = match parents.remove(&key) {
                Some(existing) => existing,
                None => effective.target.instantiate()?,
            };
            apply_mappings(ctx, &effective, &mappings, &columns, &row, &mut target, is_new)?;
            if is_new {
                order.push(key.clone());
            }
            parents.insert(key, target);
        }
        for key in order {
            let parent = parents.remove(&key).ok_or_else(|| {
                Error::msg(format!(
                    "Grouped parent vanished while mapping result map `{}`",
                    map.id
                ))
            })?;
            handler.handle_row(parent)?;
        }
        Ok(())
    }
}

/// Resolve the per-row shape: one level of discriminator dispatch, falling
/// back to the base map when the column value matches no case.
fn discriminate(
    map: &Arc<ResultMap>,
    columns: &[ColumnInfo],
    row: &[Value],
) -> Result<Arc<ResultMap>> {
    let Some(discriminator) = &map.discriminator else {
        return Ok(map.clone());
    };
    let value = value_by_column(&discriminator.column, None, columns, row, &map.id)?;
    let value = discriminator
        .type_handler
        .to_property(value, None)
        .with_context(|| {
            format!(
                "While converting discriminator column `{}` of result map `{}`",
                discriminator.column, map.id
            )
        })?;
    Ok(discriminator.select(&value).cloned().unwrap_or_else(|| map.clone()))
}

/// Apply one row to a target. `include_scalars` is false when folding
/// further rows into an already built grouped parent; nested shapes still
/// apply so child collections keep growing.
fn apply_mappings(
    ctx: &mut ExecContext,
    map: &ResultMap,
    mappings: &[ResultMapping],
    columns: &[ColumnInfo],
    row: &[Value],
    target: &mut DataObject,
    include_scalars: bool,
) -> Result<()> {
    for mapping in mappings {
        if let Some(child) = &mapping.nested {
            apply_nested(ctx, map, mapping, child, columns, row, target)?;
        } else if !include_scalars {
            continue;
        } else if let Some(select) = &mapping.select {
            apply_select(ctx, mapping, select, columns, row, target)?;
        } else {
            let value = mapped_value(mapping, columns, row, &map.id)?;
            target
                .set_path(&mapping.property, DataObject::from_value(value))
                .with_context(|| {
                    format!(
                        "While mapping column `{}` of result map `{}`",
                        mapping.column, map.id
                    )
                })?;
        }
    }
    Ok(())
}

/// Populate an association or collection property from a nested result map.
/// A row whose nested columns are all NULL contributes nothing.
fn apply_nested(
    ctx: &mut ExecContext,
    parent_map: &ResultMap,
    mapping: &ResultMapping,
    child_map: &Arc<ResultMap>,
    columns: &[ColumnInfo],
    row: &[Value],
    parent: &mut DataObject,
) -> Result<()> {
    let child_mappings = child_map.resolve_mappings(columns)?;
    if row_is_all_null(&child_mappings, columns, row, &child_map.id)? {
        return Ok(());
    }
    let existing = match parent.get_path(&mapping.property) {
        Ok(existing) => existing,
        Err(_) => DataObject::Null,
    };
    // A nested map under a grouped parent fills a collection; under an
    // ungrouped parent it is a single association, rebuilt per row.
    let collection = parent_map.is_grouped() || matches!(existing, DataObject::List(..));
    if !collection {
        let mut child = child_map.target.instantiate()?;
        apply_mappings(ctx, child_map, &child_mappings, columns, row, &mut child, true)?;
        return parent.set_path(&mapping.property, child);
    }
    let mut items = match existing {
        DataObject::List(items) => items,
        _ => Vec::new(),
    };
    if child_map.is_grouped() {
        let values = group_values(child_map, &child_mappings, columns, row)?;
        if let Some(index) = find_grouped_child(&items, child_map, &values)? {
            let mut child = std::mem::take(&mut items[index]);
            apply_mappings(ctx, child_map, &child_mappings, columns, row, &mut child, false)?;
            items[index] = child;
            return parent.set_path(&mapping.property, DataObject::List(items));
        }
    }
    let mut child = child_map.target.instantiate()?;
    apply_mappings(ctx, child_map, &child_mappings, columns, row, &mut child, true)?;
    items.push(child);
    parent.set_path(&mapping.property, DataObject::List(items))
}

/// Populate a property by running a secondary statement keyed by a column
/// value. Collections load eagerly; a lazy single-valued association becomes
/// a deferred cell resolved on first access.
fn apply_select(
    ctx: &mut ExecContext,
    mapping: &ResultMapping,
    select: &NestedSelect,
    columns: &[ColumnInfo],
    row: &[Value],
    target: &mut DataObject,
) -> Result<()> {
    let value = value_by_column(&select.column, mapping.column_index, columns, row, &select.statement)?;
    if value.is_null() {
        return target.set_path(&mapping.property, DataObject::Null);
    }
    let param = DataObject::from_value(value);
    let collection = matches!(target.get_path(&mapping.property), Ok(DataObject::List(..)));
    let loaded = if collection {
        DataObject::List(ctx.run_for_list(&select.statement, param)?)
    } else if select.lazy {
        DataObject::Deferred(Deferred::new(select.statement.clone(), param))
    } else {
        ctx.run_for_object(&select.statement, param)?
    };
    target.set_path(&mapping.property, loaded)
}

/// Converted value of one scalar mapping: column value through the type
/// handler, with a NULL column replaced by the mapping's sentinel literal.
fn mapped_value(
    mapping: &ResultMapping,
    columns: &[ColumnInfo],
    row: &[Value],
    map_id: &str,
) -> Result<Value> {
    let value = value_by_column(&mapping.column, mapping.column_index, columns, row, map_id)?;
    let value = mapping
        .type_handler
        .to_property(value, mapping.kind)
        .with_context(|| {
            format!("While converting column `{}` of result map `{map_id}`", mapping.column)
        })?;
    if value.is_null()
        && let Some(sentinel) = &mapping.null_value
    {
        return mapping.type_handler.value_of(sentinel, mapping.kind);
    }
    Ok(value)
}

fn value_by_column(
    column: &str,
    index: Option<usize>,
    columns: &[ColumnInfo],
    row: &[Value],
    context: &str,
) -> Result<Value> {
    let index = match index {
        Some(index) => index,
        None => columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(column))
            .ok_or_else(|| {
                Error::msg(format!("Result set has no column `{column}` (for `{context}`)"))
            })?,
    };
    row.get(index).cloned().ok_or_else(|| {
        Error::msg(format!(
            "Row has {} values but column `{column}` is at position {index} (for `{context}`)",
            row.len()
        ))
    })
}

fn row_is_all_null(
    mappings: &[ResultMapping],
    columns: &[ColumnInfo],
    row: &[Value],
    map_id: &str,
) -> Result<bool> {
    for mapping in mappings {
        if mapping.nested.is_some() {
            continue;
        }
        let value = value_by_column(&mapping.column, mapping.column_index, columns, row, map_id)?;
        if !value.is_null() {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Converted values of the map's group-by properties for one row.
fn group_values(
    map: &ResultMap,
    mappings: &[ResultMapping],
    columns: &[ColumnInfo],
    row: &[Value],
) -> Result<Vec<Value>> {
    map.group_by
        .iter()
        .map(|property| {
            let mapping = mappings
                .iter()
                .find(|m| m.property == *property)
                .ok_or_else(|| {
                    Error::msg(format!(
                        "Group-by property `{property}` has no mapping in result map `{}`",
                        map.id
                    ))
                })?;
            mapped_value(mapping, columns, row, &map.id)
        })
        .collect()
}

/// Parent identity: the result map plus the row's group values. Nested
/// children are scoped by their containing parent instead of a global key.
fn group_key(map: &ResultMap, values: &[Value]) -> CacheKey {
    let mut key = CacheKey::new();
    key.update(Value::Varchar(Some(map.id.clone())));
    for value in values {
        key.update(value.clone());
    }
    key
}

/// Locate the collection element whose group properties already match the
/// row, so deeper nested collections keep folding into it.
fn find_grouped_child(
    items: &[DataObject],
    child_map: &ResultMap,
    values: &[Value],
) -> Result<Option<usize>> {
    'items: for (index, item) in items.iter().enumerate() {
        for (property, value) in child_map.group_by.iter().zip(values) {
            let found = item.get_path(property)?.as_value()?;
            if found != *value {
                continue 'items;
            }
        }
        return Ok(Some(index));
    }
    Ok(None)
}
