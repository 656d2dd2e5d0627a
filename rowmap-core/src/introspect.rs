use crate::{Bean, BeanBox, ClassDef, Error, GetterFn, Result, SetterFn, ValueKind};
use parking_lot::RwLock;
use std::{
    any::TypeId,
    collections::{HashMap, hash_map::Entry},
    sync::{Arc, OnceLock},
};

/// Resolved accessors for one property.
#[derive(Debug, Clone)]
pub struct PropertyAccessor {
    pub name: String,
    pub get: Option<GetterFn>,
    pub set: Option<SetterFn>,
    pub read_kind: Option<ValueKind>,
    pub write_kind: Option<ValueKind>,
}

/// Per-type property accessor record, built once and cached process-wide.
///
/// Building the same record concurrently from two threads is harmless: both
/// builds are functionally identical and the last insert wins.
#[derive(Debug)]
pub struct ClassInfo {
    pub name: &'static str,
    constructor: Option<fn() -> BeanBox>,
    properties: HashMap<String, PropertyAccessor>,
    readable: Vec<String>,
    writable: Vec<String>,
}

static CLASS_CACHE: OnceLock<RwLock<HashMap<TypeId, Arc<ClassInfo>>>> = OnceLock::new();

/// Derive the property name from an accessor method name.
///
/// `getX` (len > 3), `isX` (len > 2) and `setX` (len > 3) qualify. The first
/// character after the prefix is lower-cased unless the second one is already
/// uppercase, so `getID` resolves to `ID` rather than `iD`.
pub fn property_name(method: &str) -> Option<String> {
    let rest = if let Some(rest) = method.strip_prefix("get") {
        rest
    } else if let Some(rest) = method.strip_prefix("set") {
        rest
    } else if let Some(rest) = method.strip_prefix("is") {
        rest
    } else {
        return None;
    };
    let mut chars = rest.chars();
    let first = chars.next()?;
    if chars.clone().next().is_some_and(|second| second.is_uppercase()) {
        return Some(rest.to_string());
    }
    Some(first.to_lowercase().chain(chars).collect())
}

fn is_getter(name: &str, param: Option<ValueKind>) -> bool {
    param.is_none()
        && ((name.starts_with("get") && name.len() > 3)
            || (name.starts_with("is") && name.len() > 2))
}

fn is_setter(name: &str, param: Option<ValueKind>) -> bool {
    param.is_some() && name.starts_with("set") && name.len() > 3
}

impl ClassInfo {
    /// Introspection record for the given definition, from the process-wide
    /// cache when already built.
    pub fn of(def: &'static ClassDef) -> Result<Arc<ClassInfo>> {
        let type_id = (def.type_id)();
        let cache = CLASS_CACHE.get_or_init(Default::default);
        if let Some(info) = cache.read().get(&type_id) {
            return Ok(info.clone());
        }
        let info = Arc::new(Self::build(def)?);
        cache.write().insert(type_id, info.clone());
        Ok(info)
    }

    pub fn for_bean(bean: &dyn Bean) -> Result<Arc<ClassInfo>> {
        Self::of(bean.class_def())
    }

    fn build(def: &'static ClassDef) -> Result<ClassInfo> {
        // Walk the definition chain nearest-first, deduplicating overridden
        // methods by name + parameter signature and skipping bridges.
        let mut seen: HashMap<(&str, Option<ValueKind>), ()> = HashMap::new();
        let mut getters: HashMap<String, (GetterFn, ValueKind)> = HashMap::new();
        let mut setters: HashMap<String, Vec<(SetterFn, ValueKind)>> = HashMap::new();
        for class in def.lineage() {
            for method in class.methods {
                if method.bridge {
                    continue;
                }
                if let Entry::Vacant(slot) = seen.entry((method.name, method.param)) {
                    slot.insert(());
                } else {
                    continue;
                }
                if is_getter(method.name, method.param) {
                    let name = property_name(method.name).ok_or_else(|| {
                        Error::msg(format!(
                            "Method `{}` on class `{}` has no derivable property name",
                            method.name, class.name
                        ))
                    })?;
                    let get = method.get.ok_or_else(|| {
                        Error::msg(format!(
                            "Method `{}` on class `{}` declares a getter but provides no body",
                            method.name, class.name
                        ))
                    })?;
                    let kind = method.returns.ok_or_else(|| {
                        Error::msg(format!(
                            "Getter `{}` on class `{}` declares no return kind",
                            method.name, class.name
                        ))
                    })?;
                    getters.entry(name).or_insert((get, kind));
                } else if is_setter(method.name, method.param) {
                    let name = property_name(method.name).ok_or_else(|| {
                        Error::msg(format!(
                            "Method `{}` on class `{}` has no derivable property name",
                            method.name, class.name
                        ))
                    })?;
                    let set = method.set.ok_or_else(|| {
                        Error::msg(format!(
                            "Method `{}` on class `{}` declares a setter but provides no body",
                            method.name, class.name
                        ))
                    })?;
                    let kind = method.param.ok_or_else(|| {
                        Error::msg(format!(
                            "Setter `{}` on class `{}` declares no parameter kind",
                            method.name, class.name
                        ))
                    })?;
                    setters.entry(name).or_default().push((set, kind));
                }
            }
        }

        let mut properties: HashMap<String, PropertyAccessor> = HashMap::new();
        for (name, (get, kind)) in &getters {
            properties.insert(
                name.clone(),
                PropertyAccessor {
                    name: name.clone(),
                    get: Some(*get),
                    set: None,
                    read_kind: Some(*kind),
                    write_kind: None,
                },
            );
        }
        for (name, candidates) in setters {
            let (set, kind) = if candidates.len() == 1 {
                candidates[0]
            } else {
                // Overloaded setters resolve against the getter's return kind.
                let getter_kind = getters.get(&name).map(|(_, kind)| *kind);
                let chosen = getter_kind
                    .and_then(|kind| candidates.iter().find(|(_, param)| *param == kind));
                match chosen {
                    Some(found) => *found,
                    None => {
                        return Err(Error::msg(format!(
                            "Ambiguous overloaded setter for property `{}` on class `{}`: \
                             no overload matches the getter type",
                            name, def.name
                        )));
                    }
                }
            };
            let accessor = properties.entry(name.clone()).or_insert(PropertyAccessor {
                name,
                get: None,
                set: None,
                read_kind: None,
                write_kind: None,
            });
            accessor.set = Some(set);
            accessor.write_kind = Some(kind);
        }

        // Field fallback, own class before parents. Method accessors always
        // win, independently for the read and write side.
        for class in def.lineage() {
            for field in class.fields {
                let accessor = properties
                    .entry(field.name.to_string())
                    .or_insert(PropertyAccessor {
                        name: field.name.to_string(),
                        get: None,
                        set: None,
                        read_kind: None,
                        write_kind: None,
                    });
                if accessor.get.is_none() {
                    accessor.get = Some(field.get);
                    accessor.read_kind = Some(field.kind);
                }
                if accessor.set.is_none() {
                    accessor.set = Some(field.set);
                    accessor.write_kind = Some(field.kind);
                }
            }
        }

        let mut readable: Vec<String> = properties
            .values()
            .filter(|p| p.get.is_some())
            .map(|p| p.name.clone())
            .collect();
        let mut writable: Vec<String> = properties
            .values()
            .filter(|p| p.set.is_some())
            .map(|p| p.name.clone())
            .collect();
        readable.sort();
        writable.sort();
        Ok(ClassInfo {
            name: def.name,
            constructor: def.constructor,
            properties,
            readable,
            writable,
        })
    }

    pub fn property(&self, name: &str) -> Option<&PropertyAccessor> {
        self.properties.get(name)
    }

    /// Case-insensitive lookup of a writable property, used by automatic
    /// result mapping to match column labels.
    pub fn writable_ignore_case(&self, name: &str) -> Option<&PropertyAccessor> {
        self.properties
            .values()
            .find(|p| p.set.is_some() && p.name.eq_ignore_ascii_case(name))
    }

    pub fn readable_names(&self) -> &[String] {
        &self.readable
    }

    pub fn writable_names(&self) -> &[String] {
        &self.writable
    }

    /// Create a default instance. A class without a zero-argument constructor
    /// fails here, not at introspection time.
    pub fn instantiate(&self) -> Result<BeanBox> {
        match self.constructor {
            Some(constructor) => Ok(constructor()),
            None => Err(Error::msg(format!(
                "Class `{}` has no zero-argument constructor and cannot be instantiated",
                self.name
            ))),
        }
    }
}
