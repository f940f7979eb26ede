//! Instance state and the hydrated object graph.
//!
//! Instances live in an arena; parents are referenced by index, so a child never
//! owns its parent.
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use serde_json::{Map, Value};

use crate::schema::Schema;

static NO_VALUES: Lazy<IndexMap<String, Hydrated>> = Lazy::new(IndexMap::new);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(usize);

impl InstanceId {
    pub fn index(self) -> usize { self.0 }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Schema bound, values not yet materialized.
    Uninitialized,
    /// Every declared property has a value.
    Ready,
}

/// A materialized property value.
#[derive(Debug, Clone, PartialEq)]
pub enum Hydrated {
    /// Scalars and passthrough values, exactly as decoded.
    Value(Value),
    List(Vec<Hydrated>),
    /// Collection hydrated from a map; keys in document order.
    Map(IndexMap<String, Hydrated>),
    Instance(InstanceId),
}

impl Hydrated {
    pub fn is_null(&self) -> bool { matches!(self, Self::Value(Value::Null)) }

    pub fn as_value(&self) -> Option<&Value> {
        match self { Self::Value(v) => Some(v), _ => None }
    }

    pub fn as_str(&self) -> Option<&str> { self.as_value().and_then(Value::as_str) }
    pub fn as_i64(&self) -> Option<i64> { self.as_value().and_then(Value::as_i64) }
    pub fn as_f64(&self) -> Option<f64> { self.as_value().and_then(Value::as_f64) }
    pub fn as_bool(&self) -> Option<bool> { self.as_value().and_then(Value::as_bool) }

    pub fn as_list(&self) -> Option<&[Hydrated]> {
        match self { Self::List(xs) => Some(xs), _ => None }
    }

    pub fn as_map(&self) -> Option<&IndexMap<String, Hydrated>> {
        match self { Self::Map(m) => Some(m), _ => None }
    }

    pub fn as_instance(&self) -> Option<InstanceId> {
        match self { Self::Instance(id) => Some(*id), _ => None }
    }
}

#[derive(Debug, Clone)]
pub struct InstanceState {
    type_name: String,
    schema: Schema,
    parent: Option<InstanceId>,
    values: IndexMap<String, Hydrated>,
    phase: Phase,
}

impl InstanceState {
    pub fn type_name(&self) -> &str { &self.type_name }
    pub fn schema(&self) -> &Schema { &self.schema }
    pub fn parent(&self) -> Option<InstanceId> { self.parent }
    pub fn values(&self) -> &IndexMap<String, Hydrated> { &self.values }
    pub fn value(&self, name: &str) -> Option<&Hydrated> { self.values.get(name) }
    pub fn phase(&self) -> Phase { self.phase }
}

/// Instance identity → state, for one hydrated graph.
#[derive(Debug, Clone, Default)]
pub struct StateStore {
    states: Vec<InstanceState>,
}

impl StateStore {
    pub fn new() -> Self { Self::default() }

    pub(crate) fn begin(&mut self, schema: Schema, parent: Option<InstanceId>) -> InstanceId {
        let id = InstanceId(self.states.len());
        self.states.push(InstanceState {
            type_name: schema.type_name().to_string(),
            schema,
            parent,
            values: IndexMap::new(),
            phase: Phase::Uninitialized,
        });
        id
    }

    /// Bind the materialized values and mark the instance ready.
    pub(crate) fn finish(&mut self, id: InstanceId, values: IndexMap<String, Hydrated>) {
        let state = &mut self.states[id.0];
        debug_assert_eq!(state.phase, Phase::Uninitialized);
        debug_assert!(state.schema.names().all(|name| values.contains_key(name)));
        state.values = values;
        state.phase = Phase::Ready;
    }

    pub fn get(&self, id: InstanceId) -> Option<&InstanceState> {
        self.states.get(id.0)
    }

    pub fn parent_of(&self, id: InstanceId) -> Option<InstanceId> {
        self.get(id).and_then(InstanceState::parent)
    }

    pub fn type_name_of(&self, id: InstanceId) -> Option<&str> {
        self.get(id).map(InstanceState::type_name)
    }

    pub fn has_declared_property(&self, id: InstanceId, name: &str) -> bool {
        self.get(id).is_some_and(|state| state.schema.contains(name))
    }

    /// Materialized values of an instance; empty for anything else.
    pub fn values_of(&self, value: &Hydrated) -> &IndexMap<String, Hydrated> {
        match value.as_instance().and_then(|id| self.get(id)) {
            Some(state) => &state.values,
            None => &*NO_VALUES,
        }
    }

    pub fn len(&self) -> usize { self.states.len() }
    pub fn is_empty(&self) -> bool { self.states.is_empty() }

    pub fn iter(&self) -> impl Iterator<Item = (InstanceId, &InstanceState)> {
        self.states.iter().enumerate().map(|(i, s)| (InstanceId(i), s))
    }
}

// --------------------------------- Graph ---------------------------------- //

/// A hydrated document: the state store plus its root instance.
#[derive(Debug, Clone)]
pub struct ObjectGraph {
    store: StateStore,
    root: InstanceId,
}

impl ObjectGraph {
    pub(crate) fn new(store: StateStore, root: InstanceId) -> Self {
        Self { store, root }
    }

    pub fn root(&self) -> InstanceId { self.root }
    pub fn store(&self) -> &StateStore { &self.store }

    pub fn get(&self, id: InstanceId) -> Option<&InstanceState> {
        self.store.get(id)
    }

    pub fn value(&self, id: InstanceId, name: &str) -> Option<&Hydrated> {
        self.store.get(id).and_then(|state| state.value(name))
    }

    /// Debug rendering. Instances become maps; with `type_tags` each carries
    /// its type identity under `"$type"`.
    pub fn to_json(&self, type_tags: bool) -> Value {
        self.render_instance(self.root, type_tags)
    }

    fn render_instance(&self, id: InstanceId, type_tags: bool) -> Value {
        let Some(state) = self.store.get(id) else { return Value::Null };
        let mut out = Map::new();
        if type_tags {
            out.insert("$type".into(), Value::String(state.type_name.clone()));
        }
        for (name, value) in &state.values {
            out.insert(name.clone(), self.render(value, type_tags));
        }
        Value::Object(out)
    }

    fn render(&self, value: &Hydrated, type_tags: bool) -> Value {
        match value {
            Hydrated::Value(v) => v.clone(),
            Hydrated::List(xs) => Value::Array(xs.iter().map(|x| self.render(x, type_tags)).collect()),
            Hydrated::Map(m) => Value::Object(
                m.iter().map(|(k, x)| (k.clone(), self.render(x, type_tags))).collect(),
            ),
            Hydrated::Instance(id) => self.render_instance(*id, type_tags),
        }
    }
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::TypeDecl;
    use crate::schema::extract;
    use serde_json::json;

    #[test]
    fn lifecycle_and_lookup() {
        let schema = extract(&TypeDecl::new("Thing").with_header("@property string $a"));
        let mut store = StateStore::new();
        let root = store.begin(schema.clone(), None);
        let child = store.begin(schema, Some(root));
        assert_eq!(store.get(child).unwrap().phase(), Phase::Uninitialized);

        let mut values = IndexMap::new();
        values.insert("a".to_string(), Hydrated::Value(json!("x")));
        store.finish(child, values);

        assert_eq!(store.get(child).unwrap().phase(), Phase::Ready);
        assert_eq!(store.parent_of(child), Some(root));
        assert_eq!(store.parent_of(root), None);
        assert!(store.has_declared_property(child, "a"));
        assert!(!store.has_declared_property(child, "b"));
        assert_eq!(store.values_of(&Hydrated::Instance(child)).len(), 1);
    }

    #[test]
    fn values_of_non_instance_is_empty() {
        let store = StateStore::new();
        assert!(store.values_of(&Hydrated::Value(json!("scalar"))).is_empty());
        assert!(store.values_of(&Hydrated::Instance(InstanceId(7))).is_empty());
    }
}
