//! The closed set of constructible types.
//!
//! Every type a document may hydrate into is registered up front, keyed by its
//! qualified name (`shop::Item`). Referenced type names in declarations are
//! looked up here; a name that is not registered is never instantiated.
use indexmap::IndexMap;

use crate::descriptor::PropertyDescriptor;

/// A Rust type that declares its hydration schema.
///
/// ```
/// use json_loader::registry::{Model, TypeRegistry};
///
/// struct Person;
///
/// impl Model for Person {
///     const TYPE_NAME: &'static str = "Person";
///     const DECLARATION: &'static str = "
///         @property string $email Contact address
///     ";
/// }
///
/// let mut types = TypeRegistry::new();
/// types.register_model::<Person>();
/// assert!(types.contains("Person"));
/// ```
pub trait Model {
    /// Qualified name; the part before the last `::` is the namespace.
    const TYPE_NAME: &'static str;
    /// Property declaration lines, parsed by the schema extractor.
    const DECLARATION: &'static str;
}

#[derive(Debug, Clone)]
pub struct TypeDecl {
    name: String,
    namespace: String,
    header: String,
    properties: Vec<PropertyDescriptor>,
}

impl TypeDecl {
    pub fn new(name: impl Into<String>) -> Self {
        let name = normalize_name(&name.into());
        let namespace = match name.rfind("::") {
            Some(split) => name[..split].to_string(),
            None => String::new(),
        };
        Self { name, namespace, header: String::new(), properties: Vec::new() }
    }

    pub fn of<M: Model>() -> Self {
        Self::new(M::TYPE_NAME).with_header(M::DECLARATION)
    }

    /// Append declaration lines.
    pub fn with_header(mut self, text: &str) -> Self {
        if !self.header.is_empty() && !self.header.ends_with('\n') {
            self.header.push('\n');
        }
        self.header.push_str(text);
        self
    }

    /// Declare a property directly, bypassing the text grammar.
    pub fn property(mut self, descriptor: PropertyDescriptor) -> Self {
        self.properties.push(descriptor);
        self
    }

    pub fn name(&self) -> &str { &self.name }
    pub fn namespace(&self) -> &str { &self.namespace }
    pub fn header(&self) -> &str { &self.header }
    pub fn properties(&self) -> &[PropertyDescriptor] { &self.properties }
}

#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    types: IndexMap<String, TypeDecl>,
}

impl TypeRegistry {
    pub fn new() -> Self { Self::default() }

    /// Register (or replace) a type.
    pub fn register(&mut self, decl: TypeDecl) -> &mut Self {
        self.types.insert(decl.name.clone(), decl);
        self
    }

    pub fn register_model<M: Model>(&mut self) -> &mut Self {
        self.register(TypeDecl::of::<M>())
    }

    pub fn get(&self, name: &str) -> Option<&TypeDecl> {
        self.types.get(normalize_name(name).as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize { self.types.len() }
    pub fn is_empty(&self) -> bool { self.types.is_empty() }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }

    /// Resolve a type name written inside `namespace` to a registered identity.
    /// Tries `namespace::name` first, then `name` as written.
    pub fn resolve_name(&self, name: &str, namespace: &str) -> Option<&str> {
        let name = normalize_name(name);
        if !namespace.is_empty() {
            let qualified = format!("{namespace}::{name}");
            if let Some((identity, _)) = self.types.get_key_value(qualified.as_str()) {
                return Some(identity.as_str());
            }
        }
        self.types.get_key_value(name.as_str()).map(|(identity, _)| identity.as_str())
    }

    /// Parse a declarations file.
    ///
    /// `@type <Name>` starts a type; the lines after it, up to the next
    /// `@type`, are its declaration text. Lines starting with `#` and anything
    /// before the first `@type` are ignored.
    pub fn parse_declarations(text: &str) -> Self {
        let mut out = Self::new();
        let mut current: Option<TypeDecl> = None;
        for line in text.lines() {
            let trimmed = line.trim_start();
            if trimmed.starts_with('#') {
                continue;
            }
            if let Some(rest) = trimmed.strip_prefix("@type") {
                let name = rest.split_whitespace().next().unwrap_or_default();
                if name.is_empty() {
                    continue;
                }
                if let Some(done) = current.take() {
                    out.register(done);
                }
                current = Some(TypeDecl::new(name));
                continue;
            }
            if let Some(decl) = current.as_mut() {
                decl.header.push_str(line);
                decl.header.push('\n');
            }
        }
        if let Some(done) = current {
            out.register(done);
        }
        out
    }
}

/// `\shop\Item`, `::shop::Item` and `shop::Item` name the same type.
fn normalize_name(name: &str) -> String {
    name.trim()
        .replace('\\', "::")
        .trim_start_matches("::")
        .to_string()
}

// ------------------------------- Tests ------------------------------------ //
