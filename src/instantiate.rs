//! Recursive hydration of decoded values into typed instances.
//!
//! Construction is depth-first: a referenced-type property constructs its
//! instance (schema, defaults, properties) before the next sibling property is
//! looked at. Each instance is registered in the store with its parent.
use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::defaults::{apply_defaults, payload_from};
use crate::descriptor::{Candidate, Opaque, PropertyDescriptor};
use crate::error::{LoadError, Result};
use crate::registry::TypeRegistry;
use crate::schema::SchemaCache;
use crate::state::{Hydrated, InstanceId, StateStore};

pub(crate) struct Instantiator<'a> {
    types: &'a TypeRegistry,
    schemas: &'a mut SchemaCache,
    store: StateStore,
    max_depth: usize,
    depth: usize,
}

impl<'a> Instantiator<'a> {
    pub fn new(types: &'a TypeRegistry, schemas: &'a mut SchemaCache, max_depth: usize) -> Self {
        Self { types, schemas, store: StateStore::new(), max_depth, depth: 0 }
    }

    pub fn into_store(self) -> StateStore {
        self.store
    }

    /// Construct an instance of the registered type `type_name` from `payload`.
    pub fn construct(
        &mut self,
        type_name: &str,
        payload: Value,
        parent: Option<InstanceId>,
    ) -> Result<InstanceId> {
        let types = self.types;
        let decl = types
            .get(type_name)
            .ok_or_else(|| LoadError::UnknownType(type_name.to_string()))?;
        if self.depth >= self.max_depth {
            return Err(LoadError::DepthExceeded {
                type_name: decl.name().to_string(),
                limit: self.max_depth,
            });
        }

        let schema = self.schemas.schema_for(decl);
        let id = self.store.begin(schema.clone(), parent);

        let mut payload = payload_from(payload);
        apply_defaults(&schema, &mut payload);

        self.depth += 1;
        let mut values = IndexMap::with_capacity(schema.len());
        for (name, descriptor) in schema.iter() {
            let raw = payload.remove(name).unwrap_or(Value::Null);
            let value = self.instantiate(id, descriptor, schema.namespace(), raw)?;
            values.insert(name.to_string(), value);
        }
        self.depth -= 1;

        self.store.finish(id, values);
        Ok(id)
    }

    /// Hydrate one raw value for `descriptor`, owned by instance `owner`.
    pub fn instantiate(
        &mut self,
        owner: InstanceId,
        descriptor: &PropertyDescriptor,
        namespace: &str,
        raw: Value,
    ) -> Result<Hydrated> {
        match descriptor.resolve(&raw, self.types) {
            Candidate::Scalar(_) | Candidate::Opaque(Opaque::Any) => Ok(Hydrated::Value(raw)),
            Candidate::Opaque(Opaque::List) if raw.is_null() => Ok(Hydrated::Value(Value::Array(vec![]))),
            Candidate::Opaque(Opaque::Map) if raw.is_null() => Ok(Hydrated::Value(Value::Object(Map::new()))),
            Candidate::Opaque(_) => Ok(Hydrated::Value(raw)),
            Candidate::Collection(element) => {
                self.instantiate_collection(owner, element, namespace, descriptor.owner(), raw)
            }
            Candidate::Referenced(type_name) => {
                let payload = if raw.is_null() { Value::Object(Map::new()) } else { raw };
                let child = self.construct(type_name, payload, Some(owner))?;
                Ok(Hydrated::Instance(child))
            }
        }
    }

    fn instantiate_collection(
        &mut self,
        owner: InstanceId,
        element_type: &str,
        namespace: &str,
        owner_type: &str,
        raw: Value,
    ) -> Result<Hydrated> {
        let element = |key: String| PropertyDescriptor::element(key, element_type, namespace, owner_type);
        match raw {
            Value::Object(map) => {
                let mut out = IndexMap::with_capacity(map.len());
                for (key, value) in map {
                    let hydrated = self.instantiate(owner, &element(key.clone()), namespace, value)?;
                    out.insert(key, hydrated);
                }
                Ok(Hydrated::Map(out))
            }
            Value::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for (index, value) in items.into_iter().enumerate() {
                    out.push(self.instantiate(owner, &element(index.to_string()), namespace, value)?);
                }
                Ok(Hydrated::List(out))
            }
            Value::Null => Ok(Hydrated::List(Vec::new())),
            scalar => {
                let hydrated = self.instantiate(owner, &element("0".into()), namespace, scalar)?;
                Ok(Hydrated::List(vec![hydrated]))
            }
        }
    }
}

// ------------------------------- Tests ------------------------------------ //
