//! Entry point: decode a document and hydrate it into an [`ObjectGraph`].
//!
//! ```
//! use json_loader::{Loader, TypeDecl, TypeRegistry};
//!
//! let mut types = TypeRegistry::new();
//! types
//!     .register(TypeDecl::new("Widget").with_header("
//!         @property string   $name
//!         @property string[] $tags  {@default []}
//!         @property Person   $owner
//!     "))
//!     .register(TypeDecl::new("Person").with_header("@property string $email"));
//!
//! let mut loader = Loader::new(types);
//! let graph = loader
//!     .load_str("Widget", r#"{"name": "W1", "owner": {"email": "a@b.com"}}"#)
//!     .unwrap();
//! let owner = graph.value(graph.root(), "owner").unwrap().as_instance().unwrap();
//! assert_eq!(graph.value(owner, "email").unwrap().as_str(), Some("a@b.com"));
//! ```
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::diagnostics::{DiagnosticSink, TracingSink};
use crate::error::{DecodeFailure, LoadError, Result};
use crate::instantiate::Instantiator;
use crate::registry::TypeRegistry;
use crate::schema::{Schema, SchemaCache};
use crate::state::ObjectGraph;

pub const DEFAULT_MAX_DEPTH: usize = 128;

/// Per-loader settings. Missing fields in an options file take defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoadOptions {
    /// Deepest allowed nesting of constructed instances.
    pub max_depth: usize,
    /// Hydrate the node at this JSON pointer instead of the whole document.
    pub json_pointer: Option<String>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self { max_depth: DEFAULT_MAX_DEPTH, json_pointer: None }
    }
}

/// Owns the type registry and the schema cache. Schemas extracted by one load
/// are reused by every later load on the same loader.
pub struct Loader {
    types: TypeRegistry,
    schemas: SchemaCache,
    options: LoadOptions,
    sink: Box<dyn DiagnosticSink>,
}

impl Loader {
    pub fn new(types: TypeRegistry) -> Self {
        Self {
            types,
            schemas: SchemaCache::new(),
            options: LoadOptions::default(),
            sink: Box::new(TracingSink),
        }
    }

    pub fn with_sink(mut self, sink: impl DiagnosticSink + 'static) -> Self {
        self.sink = Box::new(sink);
        self
    }

    pub fn with_options(mut self, options: LoadOptions) -> Self {
        self.options = options;
        self
    }

    pub fn types(&self) -> &TypeRegistry { &self.types }
    pub fn schemas(&self) -> &SchemaCache { &self.schemas }
    pub fn options(&self) -> &LoadOptions { &self.options }

    /// Read, decode and hydrate the JSON file at `path`.
    pub fn load_file(&mut self, root_type: &str, path: impl AsRef<Path>) -> Result<ObjectGraph> {
        let path = path.as_ref();
        let result = self.try_load_file(root_type, path);
        self.reported(result)
    }

    /// Decode and hydrate a raw document string.
    pub fn load_str(&mut self, root_type: &str, json: &str) -> Result<ObjectGraph> {
        let result = self
            .check_root(root_type)
            .and_then(|()| decode(json, None))
            .and_then(|value| self.hydrate(root_type, value, None));
        self.reported(result)
    }

    /// Hydrate an already decoded document.
    pub fn load_value(&mut self, root_type: &str, value: Value) -> Result<ObjectGraph> {
        let result = self
            .check_root(root_type)
            .and_then(|()| require_aggregate(value, None))
            .and_then(|value| self.hydrate(root_type, value, None));
        self.reported(result)
    }

    /// Schema of a registered type, extracting it if this loader has not yet.
    pub fn schema(&mut self, type_name: &str) -> Result<Schema> {
        let decl = self
            .types
            .get(type_name)
            .ok_or_else(|| LoadError::UnknownType(type_name.to_string()))?;
        Ok(self.schemas.schema_for(decl))
    }

    fn try_load_file(&mut self, root_type: &str, path: &Path) -> Result<ObjectGraph> {
        self.check_root(root_type)?;
        if path.as_os_str().is_empty() {
            return Err(LoadError::EmptyPath);
        }
        let text = std::fs::read_to_string(path).map_err(|source| LoadError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let value = decode(&text, Some(path))?;
        self.hydrate(root_type, value, Some(path))
    }

    fn check_root(&self, root_type: &str) -> Result<()> {
        if self.types.contains(root_type) {
            Ok(())
        } else {
            Err(LoadError::UnknownType(root_type.to_string()))
        }
    }

    fn hydrate(&mut self, root_type: &str, value: Value, path: Option<&Path>) -> Result<ObjectGraph> {
        let value = match self.options.json_pointer.as_deref() {
            Some(pointer) => select(value, pointer, path)?,
            None => value,
        };
        let mut instantiator = Instantiator::new(&self.types, &mut self.schemas, self.options.max_depth);
        let root = instantiator.construct(root_type, value, None)?;
        let store = instantiator.into_store();
        debug!(root_type, instances = store.len(), "hydrated document");
        Ok(ObjectGraph::new(store, root))
    }

    /// Every failed load reports exactly one message.
    fn reported<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(error) = &result {
            self.sink.report(&error.to_string());
        }
        result
    }
}

// ---------------------------- Decoding helpers ---------------------------- //

fn decode(text: &str, path: Option<&Path>) -> Result<Value> {
    let fail = |failure| LoadError::Decode { path: path.map(Path::to_path_buf), failure };
    if text.trim().is_empty() {
        return Err(fail(DecodeFailure::Empty));
    }
    let value = serde_json::from_str::<Value>(text).map_err(|e| fail(DecodeFailure::Syntax(e)))?;
    require_aggregate(value, path)
}

/// The root payload must be a map or array with at least one entry.
fn require_aggregate(value: Value, path: Option<&Path>) -> Result<Value> {
    let failure = match &value {
        Value::Object(map) if map.is_empty() => DecodeFailure::NoEntries,
        Value::Array(items) if items.is_empty() => DecodeFailure::NoEntries,
        Value::Object(_) | Value::Array(_) => return Ok(value),
        _ => DecodeFailure::NotAggregate,
    };
    Err(LoadError::Decode { path: path.map(PathBuf::from), failure })
}

fn select(mut value: Value, pointer: &str, path: Option<&Path>) -> Result<Value> {
    match value.pointer_mut(pointer) {
        Some(node) => Ok(node.take()),
        None => Err(LoadError::Decode {
            path: path.map(PathBuf::from),
            failure: DecodeFailure::PointerMissing(pointer.to_string()),
        }),
    }
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::MemorySink;
    use crate::error::ErrorKind;
    use crate::registry::{Model, TypeDecl};
    use crate::state::{Hydrated, Phase};
    use serde_json::json;

    struct Widget;
    struct Person;

    impl Model for Widget {
        const TYPE_NAME: &'static str = "Widget";
        const DECLARATION: &'static str = "
            * @property string   $name
            * @property string[] $tags  {@default []}
            * @property Person   $owner
        ";
    }

    impl Model for Person {
        const TYPE_NAME: &'static str = "Person";
        const DECLARATION: &'static str = "* @property string $email";
    }

    fn loader() -> (Loader, MemorySink) {
        let mut types = TypeRegistry::new();
        types.register_model::<Widget>().register_model::<Person>();
        let sink = MemorySink::new();
        (Loader::new(types).with_sink(sink.clone()), sink)
    }

    #[test]
    fn widget_end_to_end() {
        let (mut loader, sink) = loader();
        let graph = loader
            .load_str("Widget", r#"{"name":"W1","owner":{"email":"a@b.com"}}"#)
            .unwrap();
        let root = graph.root();
        assert_eq!(graph.value(root, "name").unwrap().as_str(), Some("W1"));
        assert_eq!(graph.value(root, "tags"), Some(&Hydrated::List(vec![])));

        let owner = graph.value(root, "owner").unwrap().as_instance().unwrap();
        let person = graph.get(owner).unwrap();
        assert_eq!(person.type_name(), "Person");
        assert_eq!(person.parent(), Some(root));
        assert_eq!(person.value("email").unwrap().as_str(), Some("a@b.com"));

        assert_eq!(graph.get(root).unwrap().parent(), None);
        assert!(graph.store().iter().all(|(_, s)| s.phase() == Phase::Ready));
        assert!(sink.messages().is_empty());

        assert_eq!(
            graph.to_json(true),
            json!({
                "$type": "Widget",
                "name": "W1",
                "tags": [],
                "owner": {"$type": "Person", "email": "a@b.com"},
            })
        );
    }

    #[test]
    fn value_keys_match_schema_after_defaulting() {
        let (mut loader, _) = loader();
        let graph = loader.load_value("Widget", json!({"name": null, "extra": 1})).unwrap();
        let state = graph.get(graph.root()).unwrap();
        assert_eq!(state.values().keys().collect::<Vec<_>>(), vec!["name", "tags", "owner"]);
        assert!(state.value("name").unwrap().is_null());
        assert!(!graph.store().has_declared_property(graph.root(), "extra"));
    }

    #[test]
    fn schemas_are_extracted_once_per_type() {
        let (mut loader, _) = loader();
        let doc = r#"{"owner": {"email": "x"}}"#;
        loader.load_str("Widget", doc).unwrap();
        loader.load_str("Widget", doc).unwrap();
        loader.load_str("Widget", doc).unwrap();
        assert_eq!(loader.schemas().extractions(), 2);
        assert_eq!(loader.schemas().hits(), 4);
    }

    #[test]
    fn failures_report_once_and_return_no_graph() {
        let (mut loader, sink) = loader();

        let err = loader.load_str("Gadget", "{}").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Usage);

        let err = loader.load_str("Widget", "   ").unwrap_err();
        assert_eq!(err.to_string(), "the JSON value provided is empty");

        let err = loader.load_str("Widget", "{nope").unwrap_err();
        assert!(err.to_string().starts_with("the JSON value provided has invalid syntax"));

        let err = loader.load_str("Widget", "42").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decode);

        let err = loader.load_file("Widget", "").unwrap_err();
        assert!(matches!(err, LoadError::EmptyPath));

        // a document without entries is rejected like malformed input
        let err = loader.load_str("Widget", "{}").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decode);
        assert!(err.to_string().starts_with("the JSON value provided has invalid syntax"));
        let err = loader.load_value("Widget", json!([])).unwrap_err();
        assert!(matches!(err, LoadError::Decode { failure: DecodeFailure::NoEntries, .. }));

        let messages = sink.messages();
        assert_eq!(messages.len(), 7);
        assert_eq!(messages[0], "`Gadget` is not a registered type");
    }

    #[test]
    fn load_file_names_path_in_decode_errors() {
        let dir = std::env::temp_dir().join(format!("json-loader-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let good = dir.join("widget.json");
        let bad = dir.join("broken.json");
        std::fs::write(&good, r#"{"name": "from-file"}"#).unwrap();
        std::fs::write(&bad, "{").unwrap();

        let (mut loader, _) = loader();
        let graph = loader.load_file("Widget", &good).unwrap();
        assert_eq!(graph.value(graph.root(), "name").unwrap().as_str(), Some("from-file"));

        let err = loader.load_file("Widget", &bad).unwrap_err();
        assert!(err.to_string().contains("broken.json has invalid syntax"));

        let err = loader.load_file("Widget", dir.join("missing.json")).unwrap_err();
        assert!(matches!(err, LoadError::Read { .. }));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn json_pointer_selects_subdocument() {
        let (loader, _) = loader();
        let mut loader = loader.with_options(LoadOptions {
            json_pointer: Some("/data/0".into()),
            ..LoadOptions::default()
        });
        let graph = loader.load_value("Widget", json!({"data": [{"name": "inner"}]})).unwrap();
        assert_eq!(graph.value(graph.root(), "name").unwrap().as_str(), Some("inner"));

        let err = loader.load_value("Widget", json!({"data": []})).unwrap_err();
        assert!(err.to_string().contains("/data/0"));
    }

    #[test]
    fn options_deserialize_with_defaults() {
        let options: LoadOptions = serde_json::from_str(r#"{"max_depth": 4}"#).unwrap();
        assert_eq!(options.max_depth, 4);
        assert_eq!(options.json_pointer, None);
        assert!(serde_json::from_str::<LoadOptions>(r#"{"depth": 4}"#).is_err());
    }

    #[test]
    fn demo_declarations_hydrate() {
        let types = TypeRegistry::parse_declarations(include_str!("../demos/widget.decl"));
        let mut loader = Loader::new(types);
        let graph = loader
            .load_str("shop::Widget", include_str!("../demos/widget.json"))
            .unwrap();
        let rendered = graph.to_json(false);
        assert_eq!(rendered["parts"][1]["count"], json!(1));
        assert_eq!(rendered["active"], json!(true));
        assert_eq!(rendered["sku"], json!("W-001"));

        let owner = graph.value(graph.root(), "owner").unwrap().as_instance().unwrap();
        assert_eq!(graph.store().type_name_of(owner), Some("shop::Person"));
        let email = graph.get(owner).unwrap().schema().get("email").unwrap();
        assert_eq!(email.flag("format"), Some(&json!("email")));
        assert_eq!(email.flag("required"), Some(&json!(true)));
    }

    #[test]
    fn schema_of_type_without_properties_is_empty() {
        let mut types = TypeRegistry::new();
        types.register(TypeDecl::new("Empty"));
        let mut loader = Loader::new(types);
        assert!(loader.schema("Empty").unwrap().is_empty());
        let graph = loader.load_value("Empty", json!({"anything": 1})).unwrap();
        assert!(graph.get(graph.root()).unwrap().values().is_empty());
    }
}
