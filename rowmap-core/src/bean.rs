use crate::{DataObject, Result, ValueKind};
use std::{
    any::{Any, TypeId},
    fmt::Debug,
};

/// Reads one property off a bean. Implementations downcast to the concrete
/// type they were registered for.
pub type GetterFn = fn(&dyn Bean) -> DataObject;
/// Writes one property onto a bean, converting the incoming object as needed.
pub type SetterFn = fn(&mut dyn Bean, DataObject) -> Result<()>;
/// Zero-argument constructor producing a default instance.
pub type ConstructorFn = fn() -> BeanBox;

pub type BeanBox = Box<dyn Bean>;

/// A struct usable as a mapping target or parameter object.
///
/// Rust has no runtime reflection, so a bean carries a static [`ClassDef`]
/// describing its accessors in method form (`getX`/`isX`/`setX`). The
/// introspection layer derives property names, resolves overloads and caches
/// the result per type; see [`crate::ClassInfo`].
///
/// `Send + Sync` because mapped objects flow into shared caches.
pub trait Bean: Any + Debug + Send + Sync {
    fn class_def(&self) -> &'static ClassDef;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn clone_bean(&self) -> BeanBox;
}

impl Clone for BeanBox {
    fn clone(&self) -> Self {
        self.clone_bean()
    }
}

/// Static accessor metadata for one bean type.
///
/// `parent` chains in inherited accessors; entries of the child shadow the
/// parent's under the same signature. Field entries are fallbacks used only
/// where no method-based accessor resolves the same property name.
pub struct ClassDef {
    pub name: &'static str,
    pub type_id: fn() -> TypeId,
    pub parent: Option<&'static ClassDef>,
    pub constructor: Option<ConstructorFn>,
    pub methods: &'static [MethodDef],
    pub fields: &'static [FieldDef],
}

impl ClassDef {
    /// This definition followed by its ancestors, nearest first.
    pub fn lineage(&'static self) -> impl Iterator<Item = &'static ClassDef> {
        let mut next = Some(self);
        std::iter::from_fn(move || {
            let current = next?;
            next = current.parent;
            Some(current)
        })
    }
}

/// One accessor-style method: a getter takes no parameter and declares a
/// return kind, a setter takes exactly one parameter. `bridge` marks
/// synthetic shims emitted by wrapper tooling; introspection skips them.
pub struct MethodDef {
    pub name: &'static str,
    pub param: Option<ValueKind>,
    pub returns: Option<ValueKind>,
    pub get: Option<GetterFn>,
    pub set: Option<SetterFn>,
    pub bridge: bool,
}

impl MethodDef {
    pub const fn getter(name: &'static str, returns: ValueKind, get: GetterFn) -> Self {
        Self {
            name,
            param: None,
            returns: Some(returns),
            get: Some(get),
            set: None,
            bridge: false,
        }
    }

    pub const fn setter(name: &'static str, param: ValueKind, set: SetterFn) -> Self {
        Self {
            name,
            param: Some(param),
            returns: None,
            get: None,
            set: Some(set),
            bridge: false,
        }
    }

    pub const fn bridge(mut self) -> Self {
        self.bridge = true;
        self
    }
}

/// A directly accessible field, used when no method-based accessor exists
/// for the property of the same name.
pub struct FieldDef {
    pub name: &'static str,
    pub kind: ValueKind,
    pub get: GetterFn,
    pub set: SetterFn,
}
