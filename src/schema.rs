//! Schema extraction and the per-type schema cache.
//!
//! A registered type's declaration text is scanned line by line:
//!
//! ```text
//! @property string|int $id   Free text description {@default 0}
//! @property Tag[]      $tags {
//!     @default []
//!     @required
//! }
//! ```
//!
//! Lines that do not follow the grammar are skipped. Extraction runs once per
//! type; later requests clone the cached schema.
use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};
use tracing::{debug, trace};

use crate::descriptor::{primary_candidate, Candidate, PropertyDescriptor, ScalarKind};
use crate::registry::TypeDecl;

// -------------------------------- Grammar --------------------------------- //

/// type-expr, name, description, everything after the opening brace
static PROPERTY_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^\s*(?:\*|///?)?\s*@property\s+(\S+)\s+\$?([A-Za-z_][A-Za-z0-9_]*)\s*(.*?)\s*(?:\{(.*))?\s*$",
    )
    .expect("property grammar is valid")
});

/// `@` at the start of a word introduces a flag.
static FLAG_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|\s)@").expect("flag marker is valid")
});

static MARGIN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:\*|///?)?\s*").expect("margin is valid")
});

// --------------------------------- Schema --------------------------------- //

#[derive(Debug, Clone, Default)]
pub struct Schema {
    type_name: String,
    namespace: String,
    properties: IndexMap<String, Arc<PropertyDescriptor>>,
}

impl Schema {
    pub fn type_name(&self) -> &str { &self.type_name }
    pub fn namespace(&self) -> &str { &self.namespace }
    pub fn len(&self) -> usize { self.properties.len() }
    pub fn is_empty(&self) -> bool { self.properties.is_empty() }

    pub fn contains(&self, name: &str) -> bool {
        self.properties.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&PropertyDescriptor> {
        self.properties.get(name).map(Arc::as_ref)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.properties.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<PropertyDescriptor>)> {
        self.properties.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Debug view used by the `schema` command.
    pub fn to_json(&self) -> Value {
        let properties = self
            .properties
            .values()
            .map(|d| {
                let mut o = json!({ "type": d.type_expr() });
                if !d.description().is_empty() {
                    o["description"] = json!(d.description());
                }
                if let Some(default) = d.default() {
                    o["default"] = default.clone();
                }
                if !d.flags().is_empty() {
                    o["flags"] = json!(d.flags());
                }
                (d.name().to_string(), o)
            })
            .collect::<serde_json::Map<_, _>>();
        json!({
            "type": self.type_name,
            "namespace": self.namespace,
            "properties": properties,
        })
    }
}

// -------------------------------- Extract --------------------------------- //

/// Parse a type's declaration into a schema. Never fails.
pub fn extract(decl: &TypeDecl) -> Schema {
    let mut schema = Schema {
        type_name: decl.name().to_string(),
        namespace: decl.namespace().to_string(),
        properties: IndexMap::new(),
    };

    let lines = decl.header().lines().collect::<Vec<_>>();
    let mut index = 0;
    while index < lines.len() {
        let line = lines[index];
        index += 1;
        let Some(caps) = PROPERTY_LINE.captures(line) else { continue };

        let type_expr = &caps[1];
        let mut flags = IndexMap::new();
        if let Some(block) = caps.get(4) {
            let mut block = block.as_str().to_string();
            // block continues on the following lines until its brace closes
            while closing_brace(&block).is_none() && index < lines.len() {
                block.push(' ');
                block.push_str(&MARGIN.replace(lines[index], ""));
                index += 1;
            }
            if let Some(end) = closing_brace(&block) {
                block.truncate(end);
            }
            flags = parse_flags(&block, type_expr);
        }

        let mut descriptor = PropertyDescriptor::new(&caps[2], type_expr)
            .with_description(&caps[3])
            .in_namespace(decl.namespace())
            .owned_by(decl.name());
        if let Some(raw) = flags.shift_remove("default") {
            descriptor = descriptor.with_default(default_literal(raw, type_expr));
        }
        for (flag, value) in flags {
            descriptor = descriptor.with_flag(flag, value);
        }
        schema.properties.insert(descriptor.name().to_string(), Arc::new(descriptor));
    }

    for descriptor in decl.properties() {
        let descriptor = descriptor
            .clone()
            .in_namespace(decl.namespace())
            .owned_by(decl.name());
        schema.properties.insert(descriptor.name().to_string(), Arc::new(descriptor));
    }

    schema
}

/// Byte offset of the `}` that closes a block whose opening `{` was already
/// consumed. Nested braces in arguments (`@default {}`) are balanced.
fn closing_brace(block: &str) -> Option<usize> {
    let mut depth = 1usize;
    for (i, c) in block.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Collapse whitespace runs to one space, except inside `"..."` literals.
fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut quoted = false;
    let mut escaped = false;
    let mut pending_space = false;
    for c in text.trim().chars() {
        if quoted {
            out.push(c);
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => quoted = false,
                _ => {}
            }
            continue;
        }
        if c.is_whitespace() {
            pending_space = true;
            continue;
        }
        if pending_space {
            out.push(' ');
            pending_space = false;
        }
        if c == '"' {
            quoted = true;
        }
        out.push(c);
    }
    out
}

/// Split a brace block into `@flag argument` pairs.
///
/// Arguments have whitespace runs collapsed outside double-quoted spans.
/// Argument-less flags become `true`. `true`/`false` arguments become booleans
/// only when the primary candidate is boolean; otherwise the text is kept.
pub fn parse_flags(block: &str, type_expr: &str) -> IndexMap<String, Value> {
    let primary_is_bool = matches!(
        primary_candidate(type_expr),
        Some(Candidate::Scalar(ScalarKind::Bool))
    );
    let mut flags = IndexMap::new();
    for chunk in FLAG_MARKER.split(block.trim()) {
        let chunk = chunk.trim_start();
        let Some(flag) = chunk.split_whitespace().next() else { continue };
        let argument = collapse_whitespace(&chunk[flag.len()..]);
        let value = match argument.as_str() {
            "" => Value::Bool(true),
            "true" | "false" if primary_is_bool => Value::Bool(argument == "true"),
            _ => Value::String(argument),
        };
        flags.insert(flag.to_string(), value);
    }
    flags
}

/// Type a textual default against the primary candidate: `string` keeps the
/// text, anything else accepts a non-boolean JSON literal.
fn default_literal(raw: Value, type_expr: &str) -> Value {
    let Value::String(text) = raw else { return raw };
    if matches!(primary_candidate(type_expr), Some(Candidate::Scalar(ScalarKind::String))) {
        return Value::String(text);
    }
    match serde_json::from_str::<Value>(&text) {
        Ok(Value::Bool(_)) | Ok(Value::String(_)) | Err(_) => Value::String(text),
        Ok(literal) => literal,
    }
}

// --------------------------------- Cache ---------------------------------- //

/// Schemas keyed by type identity, owned by a loader.
#[derive(Debug, Default)]
pub struct SchemaCache {
    schemas: HashMap<String, Schema>,
    extractions: usize,
    hits: usize,
}

impl SchemaCache {
    pub fn new() -> Self { Self::default() }

    /// Cached schema for `decl`, extracting it on first request.
    pub fn schema_for(&mut self, decl: &TypeDecl) -> Schema {
        if let Some(schema) = self.schemas.get(decl.name()) {
            self.hits += 1;
            trace!(type_name = decl.name(), "schema cache hit");
            return schema.clone();
        }
        let schema = extract(decl);
        self.extractions += 1;
        debug!(
            type_name = decl.name(),
            properties = schema.len(),
            "extracted schema"
        );
        self.schemas.insert(decl.name().to_string(), schema.clone());
        schema
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.schemas.contains_key(type_name)
    }

    /// Number of extraction passes so far.
    pub fn extractions(&self) -> usize { self.extractions }
    pub fn hits(&self) -> usize { self.hits }
    pub fn len(&self) -> usize { self.schemas.len() }
    pub fn is_empty(&self) -> bool { self.schemas.is_empty() }
}

// ------------------------------- Tests ------------------------------------ //
