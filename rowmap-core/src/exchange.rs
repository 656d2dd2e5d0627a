use crate::{AccessPlan, CacheKey, DataObject, Error, ParameterMap, Result, Value};
use anyhow::Context;

/// Parameter/result object category. Dispatch is a closed set of variants
/// selected once per object, not an inheritance chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectCategory {
    Primitive,
    Bean,
    Map,
    List,
    Document,
}

impl ObjectCategory {
    pub fn of(object: &DataObject) -> ObjectCategory {
        match object {
            DataObject::Null | DataObject::Scalar(..) | DataObject::Deferred(..) => {
                ObjectCategory::Primitive
            }
            DataObject::Bean(..) => ObjectCategory::Bean,
            DataObject::Map(..) => ObjectCategory::Map,
            DataObject::List(..) => ObjectCategory::List,
            DataObject::Document(..) => ObjectCategory::Document,
        }
    }
}

/// Extract the ordered value array matching the parameter map's mapping
/// order: one bindable [`Value`] per IN-mode slot, a typed null for
/// OUT-only slots. A property value equal to the mapping's null-value
/// sentinel is bound as NULL.
pub fn parameter_values(map: &ParameterMap, object: &DataObject) -> Result<Vec<Value>> {
    let category = ObjectCategory::of(object);
    let raw = match category {
        // The object itself is the value for every mapping.
        ObjectCategory::Primitive => vec![object.clone(); map.mappings().len()],
        _ => {
            let properties: Vec<String> = map
                .mappings()
                .iter()
                .map(|m| m.property.clone())
                .collect();
            AccessPlan::for_object(object, &properties)?.get_properties(object)?
        }
    };
    map.mappings()
        .iter()
        .zip(raw)
        .map(|(mapping, property_value)| {
            if !mapping.mode.is_in() {
                return Ok(mapping
                    .kind
                    .map(|kind| kind.empty_value())
                    .unwrap_or(Value::Null));
            }
            let mut value = property_value.as_value().with_context(|| {
                format!("While extracting parameter property `{}`", mapping.property)
            })?;
            if let Some(sentinel) = &mapping.null_value {
                let marker = mapping.type_handler.value_of(sentinel, mapping.kind)?;
                if value == marker {
                    value = mapping
                        .kind
                        .map(|kind| kind.empty_value())
                        .unwrap_or(Value::Null);
                }
            }
            mapping
                .type_handler
                .to_column(value, mapping.kind)
                .with_context(|| {
                    format!("While converting parameter property `{}`", mapping.property)
                })
        })
        .collect()
}

/// Write OUT-mode values retrieved after a procedure call back onto the
/// parameter object, by mapping position.
pub fn apply_output_values(
    map: &ParameterMap,
    object: &mut DataObject,
    outputs: &[(usize, Value)],
) -> Result<()> {
    for (position, value) in outputs {
        let mapping = map.mappings().get(*position).ok_or_else(|| {
            Error::msg(format!(
                "Output parameter position {position} is outside parameter map `{}` ({} slots)",
                map.id,
                map.mappings().len()
            ))
        })?;
        if !mapping.mode.is_out() {
            return Err(Error::msg(format!(
                "Parameter `{}` in map `{}` is not an OUT slot",
                mapping.property, map.id
            )));
        }
        let converted = mapping
            .type_handler
            .to_property(value.clone(), mapping.kind)
            .with_context(|| {
                format!("While converting output parameter `{}`", mapping.property)
            })?;
        object.set_path(&mapping.property, DataObject::from_value(converted))?;
    }
    Ok(())
}

/// Fold every non-null extracted value, in order, into the fingerprint.
pub fn fold_values(key: &mut CacheKey, values: &[Value]) {
    for value in values {
        if !value.is_null() {
            key.update(value.clone());
        }
    }
}
