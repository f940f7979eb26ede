//! Property descriptors and union-type resolution.
//!
//! A descriptor carries one declared property: its `|`-joined type expression,
//! default, description and flags. At hydration time the descriptor picks the
//! candidate that best fits the actual value shape:
//! - arrays prefer `T[]` collections, maps prefer registered types;
//! - scalars prefer the first scalar candidate of the same kind;
//! - anything else falls back to the first declared candidate.
//!
//! Resolution never fails. Names that are not registered types pass through.
use indexmap::IndexMap;
use once_cell::sync::OnceCell;
use serde_json::Value;

use crate::registry::TypeRegistry;

// ------------------------------- Candidates ------------------------------- //

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarKind {
    String,
    Int,
    Float,
    Bool,
}

/// Aggregate-or-anything candidates that carry no declared structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opaque {
    /// `mixed`, or a name that is not a registered type.
    Any,
    /// bare `array`
    List,
    /// bare `object`
    Map,
}

/// One member of a union type expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Candidate {
    Scalar(ScalarKind),
    /// `T[]`: homogeneous collection; holds the element type expression.
    Collection(String),
    /// A constructible type. Holds the written name until resolved against a
    /// registry, the registered identity afterwards.
    Referenced(String),
    Opaque(Opaque),
}

static PASSTHROUGH: Candidate = Candidate::Opaque(Opaque::Any);

impl ScalarKind {
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "string" => Some(Self::String),
            "int" | "integer" => Some(Self::Int),
            "float" | "double" | "number" => Some(Self::Float),
            "bool" | "boolean" => Some(Self::Bool),
            _ => None,
        }
    }

    pub fn matches(self, value: &Value) -> bool {
        match (self, value) {
            (Self::String, Value::String(_)) => true,
            (Self::Bool, Value::Bool(_)) => true,
            (Self::Int, Value::Number(n)) => n.is_i64() || n.is_u64(),
            (Self::Float, Value::Number(_)) => true,
            _ => false,
        }
    }
}

impl Candidate {
    /// Syntactic classification of a single candidate name.
    pub fn parse(name: &str) -> Self {
        if let Some(element) = name.strip_suffix("[]") {
            return Self::Collection(element.to_string());
        }
        if let Some(kind) = ScalarKind::parse(name) {
            return Self::Scalar(kind);
        }
        match name.to_ascii_lowercase().as_str() {
            "array" => Self::Opaque(Opaque::List),
            "object" | "stdclass" => Self::Opaque(Opaque::Map),
            "mixed" | "any" | "null" => Self::Opaque(Opaque::Any),
            _ => Self::Referenced(name.to_string()),
        }
    }

    pub fn is_aggregate(&self) -> bool {
        matches!(
            self,
            Self::Collection(_) | Self::Referenced(_) | Self::Opaque(Opaque::List | Opaque::Map)
        )
    }
}

/// Split a union type expression into its candidate names, in declared order.
pub fn candidate_names(type_expr: &str) -> impl Iterator<Item = &str> {
    type_expr
        .split('|')
        .map(|name| name.trim().trim_start_matches('?'))
        .filter(|name| !name.is_empty())
}

/// Syntactic classification of the first declared candidate.
pub fn primary_candidate(type_expr: &str) -> Option<Candidate> {
    candidate_names(type_expr).next().map(Candidate::parse)
}

// ------------------------------- Descriptor ------------------------------- //

#[derive(Debug, Clone)]
pub struct PropertyDescriptor {
    name: String,
    type_expr: String,
    namespace: String,
    owner: String,
    default: Option<Value>,
    description: String,
    flags: IndexMap<String, Value>,
    resolved: OnceCell<Vec<Candidate>>,
}

impl PropertyDescriptor {
    pub fn new(name: impl Into<String>, type_expr: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_expr: type_expr.into(),
            namespace: String::new(),
            owner: String::new(),
            default: None,
            description: String::new(),
            flags: IndexMap::new(),
            resolved: OnceCell::new(),
        }
    }

    /// Transient descriptor for one element of a collection.
    pub(crate) fn element(key: String, element_type: &str, namespace: &str, owner: &str) -> Self {
        Self::new(key, element_type)
            .in_namespace(namespace)
            .owned_by(owner)
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_flag(mut self, flag: impl Into<String>, value: Value) -> Self {
        self.flags.insert(flag.into(), value);
        self
    }

    pub fn in_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn owned_by(mut self, owner: impl Into<String>) -> Self {
        self.owner = owner.into();
        self
    }

    pub fn name(&self) -> &str { &self.name }
    pub fn type_expr(&self) -> &str { &self.type_expr }
    pub fn namespace(&self) -> &str { &self.namespace }
    pub fn owner(&self) -> &str { &self.owner }
    pub fn default(&self) -> Option<&Value> { self.default.as_ref() }
    pub fn description(&self) -> &str { &self.description }
    pub fn flags(&self) -> &IndexMap<String, Value> { &self.flags }
    pub fn flag(&self, name: &str) -> Option<&Value> { self.flags.get(name) }

    /// Candidates with referenced names bound to registered identities.
    /// Computed on first call; later calls return the same list whatever
    /// registry they pass, so only the loader that owns the descriptor binds it.
    pub(crate) fn candidates(&self, types: &TypeRegistry) -> &[Candidate] {
        self.resolved.get_or_init(|| {
            candidate_names(&self.type_expr)
                .map(|name| match Candidate::parse(name) {
                    Candidate::Referenced(written) => {
                        match types.resolve_name(&written, &self.namespace) {
                            Some(identity) => Candidate::Referenced(identity.to_string()),
                            None => Candidate::Opaque(Opaque::Any),
                        }
                    }
                    other => other,
                })
                .collect()
        })
    }

    /// Pick the candidate that fits `value` best.
    pub(crate) fn resolve(&self, value: &Value, types: &TypeRegistry) -> &Candidate {
        let candidates = self.candidates(types);
        let aggregate = move || candidates.iter().find(|c| c.is_aggregate());
        let preferred = match value {
            Value::Array(_) => candidates
                .iter()
                .find(|c| matches!(c, Candidate::Collection(_)))
                .or_else(aggregate),
            Value::Object(_) => candidates
                .iter()
                .find(|c| matches!(c, Candidate::Referenced(_)))
                .or_else(aggregate),
            Value::Null => None,
            scalar => candidates
                .iter()
                .find(|c| matches!(c, Candidate::Scalar(kind) if kind.matches(scalar))),
        };
        preferred.or_else(|| candidates.first()).unwrap_or(&PASSTHROUGH)
    }
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::TypeDecl;
    use serde_json::json;

    fn registry() -> TypeRegistry {
        let mut types = TypeRegistry::new();
        types.register(TypeDecl::new("Person"));
        types.register(TypeDecl::new("shop::Item"));
        types
    }

    #[test]
    fn union_tie_break_follows_value_kind() {
        let types = registry();
        let d = PropertyDescriptor::new("id", "int|string");
        assert_eq!(d.resolve(&json!(5), &types), &Candidate::Scalar(ScalarKind::Int));
        assert_eq!(d.resolve(&json!("5"), &types), &Candidate::Scalar(ScalarKind::String));
        // unmatched kind falls back to the first declared candidate
        assert_eq!(d.resolve(&json!(true), &types), &Candidate::Scalar(ScalarKind::Int));
    }

    #[test]
    fn aggregates_prefer_structured_candidates() {
        let types = registry();
        let d = PropertyDescriptor::new("owner", "string|Person[]|Person");
        assert_eq!(d.resolve(&json!([{}]), &types), &Candidate::Collection("Person".into()));
        assert_eq!(d.resolve(&json!({}), &types), &Candidate::Referenced("Person".into()));
        assert_eq!(d.resolve(&json!(null), &types), &Candidate::Scalar(ScalarKind::String));
    }

    #[test]
    fn map_falls_back_to_collection_without_reference() {
        let types = registry();
        let d = PropertyDescriptor::new("tags", "string|string[]");
        assert_eq!(d.resolve(&json!({"a": "x"}), &types), &Candidate::Collection("string".into()));
    }

    #[test]
    fn unregistered_names_pass_through() {
        let types = registry();
        let d = PropertyDescriptor::new("blob", "Unknown");
        assert_eq!(d.resolve(&json!({"x": 1}), &types), &Candidate::Opaque(Opaque::Any));
    }

    #[test]
    fn references_resolve_through_namespace() {
        let types = registry();
        let d = PropertyDescriptor::new("item", "Item").in_namespace("shop");
        assert_eq!(d.resolve(&json!({}), &types), &Candidate::Referenced("shop::Item".into()));
    }

    #[test]
    fn resolution_is_memoized() {
        let types = registry();
        let d = PropertyDescriptor::new("p", "Person");
        let first = d.candidates(&types).to_vec();
        // a different registry no longer changes the outcome
        let empty = TypeRegistry::new();
        assert_eq!(d.candidates(&empty), first.as_slice());
    }

    #[test]
    fn candidate_parsing() {
        assert_eq!(Candidate::parse("boolean"), Candidate::Scalar(ScalarKind::Bool));
        assert_eq!(Candidate::parse("array"), Candidate::Opaque(Opaque::List));
        assert_eq!(Candidate::parse("Tag[]"), Candidate::Collection("Tag".into()));
        assert_eq!(candidate_names(" int | ?string |").collect::<Vec<_>>(), vec!["int", "string"]);
    }
}
