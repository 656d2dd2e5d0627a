use crate::{ClassInfo, DataObject, Error, GetterFn, Result, SetterFn};
use parking_lot::RwLock;
use std::{
    any::TypeId,
    collections::HashMap,
    sync::{Arc, OnceLock},
};

/// Bulk accessor for a fixed ordered property list.
///
/// The bean variant is the compiled fast path: accessor resolution happens
/// once at plan build and repeated row mapping only walks invoker arrays.
/// The complex variant is the behaviorally identical generic fallback used
/// whenever a property is a dotted or indexed path.
pub enum AccessPlan {
    Bean(BeanAccessPlan),
    Positional(PositionalAccessPlan),
    Complex(ComplexAccessPlan),
}

pub struct BeanAccessPlan {
    getters: Vec<Option<GetterFn>>,
    setters: Vec<Option<SetterFn>>,
    properties: Vec<String>,
    class: &'static str,
}

/// Positional access against a list parameter: property order is element
/// order.
pub struct PositionalAccessPlan {
    len: usize,
}

/// Generic plan delegating to the property walker; handles maps, documents
/// and dotted/indexed paths.
pub struct ComplexAccessPlan {
    properties: Vec<String>,
}

static PLAN_CACHE: OnceLock<RwLock<HashMap<(TypeId, String), Arc<AccessPlan>>>> = OnceLock::new();

impl AccessPlan {
    /// Select and build the plan for the object's category. Bean plans are
    /// cached per (type, property list); rebuilding under a race is harmless.
    pub fn for_object(object: &DataObject, properties: &[String]) -> Result<Arc<AccessPlan>> {
        let complex = properties
            .iter()
            .any(|p| p.contains('.') || p.contains('['));
        match object {
            DataObject::Bean(bean) if !complex => {
                let type_id = bean.as_ref().as_any().type_id();
                let cache_key = (type_id, properties.join(","));
                let cache = PLAN_CACHE.get_or_init(Default::default);
                if let Some(plan) = cache.read().get(&cache_key) {
                    return Ok(plan.clone());
                }
                let plan = Arc::new(AccessPlan::Bean(BeanAccessPlan::build(
                    &*ClassInfo::for_bean(bean.as_ref())?,
                    properties,
                )?));
                cache.write().insert(cache_key, plan.clone());
                Ok(plan)
            }
            DataObject::List(..) if !complex => Ok(Arc::new(AccessPlan::Positional(
                PositionalAccessPlan {
                    len: properties.len(),
                },
            ))),
            _ => Ok(Arc::new(AccessPlan::Complex(ComplexAccessPlan {
                properties: properties.to_vec(),
            }))),
        }
    }

    /// Read all plan properties in order.
    pub fn get_properties(&self, object: &DataObject) -> Result<Vec<DataObject>> {
        match self {
            AccessPlan::Bean(plan) => plan.get(object),
            AccessPlan::Positional(plan) => plan.get(object),
            AccessPlan::Complex(plan) => plan.get(object),
        }
    }

    /// Write all plan properties in order from `values`.
    pub fn set_properties(&self, object: &mut DataObject, values: Vec<DataObject>) -> Result<()> {
        match self {
            AccessPlan::Bean(plan) => plan.set(object, values),
            AccessPlan::Positional(plan) => plan.set(object, values),
            AccessPlan::Complex(plan) => plan.set(object, values),
        }
    }
}

impl BeanAccessPlan {
    fn build(info: &ClassInfo, properties: &[String]) -> Result<BeanAccessPlan> {
        let mut getters = Vec::with_capacity(properties.len());
        let mut setters = Vec::with_capacity(properties.len());
        for property in properties {
            let accessor = info.property(property).ok_or_else(|| {
                Error::msg(format!(
                    "Class `{}` has no property `{property}`",
                    info.name
                ))
            })?;
            getters.push(accessor.get);
            setters.push(accessor.set);
        }
        Ok(BeanAccessPlan {
            getters,
            setters,
            properties: properties.to_vec(),
            class: info.name,
        })
    }

    fn get(&self, object: &DataObject) -> Result<Vec<DataObject>> {
        let DataObject::Bean(bean) = object else {
            return Err(plan_mismatch("bean", object));
        };
        self.getters
            .iter()
            .zip(&self.properties)
            .map(|(getter, property)| {
                let get = getter.ok_or_else(|| {
                    Error::msg(format!(
                        "Property `{property}` on class `{}` is not readable",
                        self.class
                    ))
                })?;
                Ok(get(bean.as_ref()))
            })
            .collect()
    }

    fn set(&self, object: &mut DataObject, values: Vec<DataObject>) -> Result<()> {
        let DataObject::Bean(bean) = object else {
            return Err(plan_mismatch("bean", object));
        };
        if values.len() != self.setters.len() {
            return Err(Error::msg(format!(
                "Access plan for class `{}` expects {} values, got {}",
                self.class,
                self.setters.len(),
                values.len()
            )));
        }
        for ((setter, property), value) in self.setters.iter().zip(&self.properties).zip(values) {
            let set = setter.ok_or_else(|| {
                Error::msg(format!(
                    "Property `{property}` on class `{}` is not writable",
                    self.class
                ))
            })?;
            set(bean.as_mut(), value)?;
        }
        Ok(())
    }
}

impl PositionalAccessPlan {
    fn get(&self, object: &DataObject) -> Result<Vec<DataObject>> {
        let DataObject::List(items) = object else {
            return Err(plan_mismatch("list", object));
        };
        (0..self.len)
            .map(|i| {
                items.get(i).cloned().ok_or_else(|| {
                    Error::msg(format!(
                        "List parameter has {} elements but position {i} is mapped",
                        items.len()
                    ))
                })
            })
            .collect()
    }

    fn set(&self, object: &mut DataObject, values: Vec<DataObject>) -> Result<()> {
        let DataObject::List(items) = object else {
            return Err(plan_mismatch("list", object));
        };
        if items.len() < values.len() {
            items.resize(values.len(), DataObject::Null);
        }
        for (i, value) in values.into_iter().enumerate() {
            items[i] = value;
        }
        Ok(())
    }
}

impl ComplexAccessPlan {
    fn get(&self, object: &DataObject) -> Result<Vec<DataObject>> {
        self.properties.iter().map(|p| object.get_path(p)).collect()
    }

    fn set(&self, object: &mut DataObject, values: Vec<DataObject>) -> Result<()> {
        if values.len() != self.properties.len() {
            return Err(Error::msg(format!(
                "Access plan expects {} values, got {}",
                self.properties.len(),
                values.len()
            )));
        }
        for (property, value) in self.properties.iter().zip(values) {
            object.set_path(property, value)?;
        }
        Ok(())
    }
}

fn plan_mismatch(expected: &str, object: &DataObject) -> Error {
    Error::msg(format!(
        "Access plan compiled for a {expected} applied to a {}",
        object.category_name()
    ))
}
