use crate::{
    ClassDef, ClassInfo, ColumnInfo, DataObject, Error, Result, TypeHandler, Value, ValueKind,
};
use parking_lot::RwLock;
use std::{collections::HashMap, sync::Arc};

/// Parameter direction for stored-procedure slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParameterMode {
    #[default]
    In,
    Out,
    InOut,
}

impl ParameterMode {
    pub fn from_tag(tag: &str) -> Result<ParameterMode> {
        Ok(match tag {
            "IN" => ParameterMode::In,
            "OUT" => ParameterMode::Out,
            "INOUT" => ParameterMode::InOut,
            other => return Err(Error::msg(format!("Unknown parameter mode `{other}`"))),
        })
    }

    pub fn is_in(&self) -> bool {
        matches!(self, ParameterMode::In | ParameterMode::InOut)
    }

    pub fn is_out(&self) -> bool {
        matches!(self, ParameterMode::Out | ParameterMode::InOut)
    }
}

/// One positional parameter slot bound to a property.
#[derive(Debug, Clone)]
pub struct ParameterMapping {
    pub property: String,
    pub kind: Option<ValueKind>,
    /// External type tag of the store column, passed through to the handler.
    pub column_type: Option<String>,
    pub mode: ParameterMode,
    /// Sentinel literal standing in for NULL in the application object.
    pub null_value: Option<String>,
    pub type_handler: Arc<dyn TypeHandler>,
    pub numeric_scale: Option<u32>,
}

impl ParameterMapping {
    pub fn new(property: impl Into<String>, type_handler: Arc<dyn TypeHandler>) -> Self {
        Self {
            property: property.into(),
            kind: None,
            column_type: None,
            mode: ParameterMode::In,
            null_value: None,
            type_handler,
            numeric_scale: None,
        }
    }
}

/// Ordered list of parameter mappings; the order fixes the positional
/// binding contract and name lookups stay stable for the map's lifetime.
pub struct ParameterMap {
    pub id: String,
    mappings: Vec<ParameterMapping>,
    index: HashMap<String, usize>,
}

impl ParameterMap {
    pub fn new(id: impl Into<String>, mappings: Vec<ParameterMapping>) -> Self {
        let index = mappings
            .iter()
            .enumerate()
            .map(|(i, m)| (m.property.clone(), i))
            .collect();
        Self {
            id: id.into(),
            mappings,
            index,
        }
    }

    pub fn mappings(&self) -> &[ParameterMapping] {
        &self.mappings
    }

    pub fn index_of(&self, property: &str) -> Option<usize> {
        self.index.get(property).copied()
    }
}

/// Secondary statement reference populating an association property.
#[derive(Debug, Clone)]
pub struct NestedSelect {
    pub statement: String,
    /// Column whose row value parameterizes the secondary statement.
    pub column: String,
    pub lazy: bool,
}

/// One result slot: column to property, with optional nested shape.
#[derive(Clone)]
pub struct ResultMapping {
    pub property: String,
    pub column: String,
    /// Positional fallback when the column is addressed by index.
    pub column_index: Option<usize>,
    pub kind: Option<ValueKind>,
    pub null_value: Option<String>,
    pub type_handler: Arc<dyn TypeHandler>,
    pub select: Option<NestedSelect>,
    pub nested: Option<Arc<ResultMap>>,
}

impl ResultMapping {
    pub fn new(
        property: impl Into<String>,
        column: impl Into<String>,
        type_handler: Arc<dyn TypeHandler>,
    ) -> Self {
        Self {
            property: property.into(),
            column: column.into(),
            column_index: None,
            kind: None,
            null_value: None,
            type_handler,
            select: None,
            nested: None,
        }
    }
}

/// What a result row materializes into.
#[derive(Clone, Copy)]
pub enum ResultTarget {
    Map,
    Document,
    Bean(&'static ClassDef),
}

impl ResultTarget {
    pub fn instantiate(&self) -> Result<DataObject> {
        Ok(match self {
            ResultTarget::Map => DataObject::Map(Default::default()),
            ResultTarget::Document => {
                DataObject::Document(serde_json::Value::Object(Default::default()))
            }
            ResultTarget::Bean(def) => DataObject::Bean(ClassInfo::of(def)?.instantiate()?),
        })
    }
}

/// Column-driven per-row selection of a sub-shape, resolved before the
/// row's own mappings apply.
pub struct Discriminator {
    pub column: String,
    pub type_handler: Arc<dyn TypeHandler>,
    cases: HashMap<String, Arc<ResultMap>>,
}

impl Discriminator {
    pub fn new(column: impl Into<String>, type_handler: Arc<dyn TypeHandler>) -> Self {
        Self {
            column: column.into(),
            type_handler,
            cases: HashMap::new(),
        }
    }

    pub fn case(mut self, value: impl Into<String>, map: Arc<ResultMap>) -> Self {
        self.cases.insert(value.into(), map);
        self
    }

    pub fn select(&self, value: &Value) -> Option<&Arc<ResultMap>> {
        if value.is_null() {
            return None;
        }
        self.cases.get(&value.to_string())
    }
}

enum Shape {
    Explicit(Arc<Vec<ResultMapping>>),
    /// Inferred from the first seen row shape. When re-mapping is allowed the
    /// shape is recomputed whenever the column list changes; the lock guards
    /// recomputation against concurrent readers of the shared shape.
    Auto {
        remappable: bool,
        computed: RwLock<Option<(Vec<String>, Arc<Vec<ResultMapping>>)>>,
        type_handler: Arc<dyn TypeHandler>,
    },
}

/// Declarative row shape: ordered result mappings plus grouping and
/// discrimination behavior.
pub struct ResultMap {
    pub id: String,
    pub target: ResultTarget,
    shape: Shape,
    pub group_by: Vec<String>,
    pub discriminator: Option<Discriminator>,
}

impl ResultMap {
    pub fn new(id: impl Into<String>, target: ResultTarget, mappings: Vec<ResultMapping>) -> Self {
        Self {
            id: id.into(),
            target,
            shape: Shape::Explicit(Arc::new(mappings)),
            group_by: Vec::new(),
            discriminator: None,
        }
    }

    /// Result map whose mappings are inferred from the first seen row shape.
    pub fn auto(
        id: impl Into<String>,
        target: ResultTarget,
        remappable: bool,
        type_handler: Arc<dyn TypeHandler>,
    ) -> Self {
        Self {
            id: id.into(),
            target,
            shape: Shape::Auto {
                remappable,
                computed: RwLock::new(None),
                type_handler,
            },
            group_by: Vec::new(),
            discriminator: None,
        }
    }

    pub fn with_group_by(mut self, properties: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.group_by = properties.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_discriminator(mut self, discriminator: Discriminator) -> Self {
        self.discriminator = Some(discriminator);
        self
    }

    pub fn is_grouped(&self) -> bool {
        !self.group_by.is_empty()
    }

    /// The mappings governing a row with the given column list.
    pub fn resolve_mappings(&self, columns: &[ColumnInfo]) -> Result<Arc<Vec<ResultMapping>>> {
        match &self.shape {
            Shape::Explicit(mappings) => Ok(mappings.clone()),
            Shape::Auto {
                remappable,
                computed,
                type_handler,
            } => {
                let labels: Vec<String> = columns.iter().map(|c| c.name.clone()).collect();
                if let Some((cached_labels, mappings)) = computed.read().as_ref() {
                    if !*remappable || *cached_labels == labels {
                        return Ok(mappings.clone());
                    }
                }
                let mut guard = computed.write();
                // Another thread may have raced the recomputation.
                if let Some((cached_labels, mappings)) = guard.as_ref() {
                    if !*remappable || *cached_labels == labels {
                        return Ok(mappings.clone());
                    }
                }
                let mappings = Arc::new(self.infer_mappings(columns, type_handler)?);
                *guard = Some((labels, mappings.clone()));
                Ok(mappings)
            }
        }
    }

    /// Case-insensitive match of column labels to writable properties.
    fn infer_mappings(
        &self,
        columns: &[ColumnInfo],
        type_handler: &Arc<dyn TypeHandler>,
    ) -> Result<Vec<ResultMapping>> {
        let mut mappings = Vec::new();
        match self.target {
            ResultTarget::Bean(def) => {
                let info = ClassInfo::of(def)?;
                for (i, column) in columns.iter().enumerate() {
                    if let Some(accessor) = info.writable_ignore_case(&column.name) {
                        let mut mapping = ResultMapping::new(
                            accessor.name.clone(),
                            column.name.clone(),
                            type_handler.clone(),
                        );
                        mapping.column_index = Some(i);
                        mapping.kind = accessor.write_kind;
                        mappings.push(mapping);
                    }
                }
            }
            ResultTarget::Map | ResultTarget::Document => {
                for (i, column) in columns.iter().enumerate() {
                    let mut mapping = ResultMapping::new(
                        column.name.clone(),
                        column.name.clone(),
                        type_handler.clone(),
                    );
                    mapping.column_index = Some(i);
                    mapping.kind = column.kind;
                    mappings.push(mapping);
                }
            }
        }
        Ok(mappings)
    }
}
