//! Schema Registry - Load data model definitions
//!
//! Definitions are read from YAML (or JSON) and indexed by name. Every
//! object reference is checked at load time; references stay names and are
//! resolved lazily by the validator, so self-referential models never get
//! expanded eagerly.

use crate::error::{Error, Result};
use regex::Regex;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};

/// Recognized string formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringFormat {
    /// `user@domain.tld`
    Email,
    /// `YYYY-MM-DD`
    Date,
    /// `HH:MM:SS`
    Time,
    /// RFC 3339 timestamp
    DateTime,
    Uri,
}

impl StringFormat {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "email" => Some(StringFormat::Email),
            "date" => Some(StringFormat::Date),
            "time" => Some(StringFormat::Time),
            "date-time" | "datetime" => Some(StringFormat::DateTime),
            "uri" | "url" => Some(StringFormat::Uri),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StringFormat::Email => "email",
            StringFormat::Date => "date",
            StringFormat::Time => "time",
            StringFormat::DateTime => "date-time",
            StringFormat::Uri => "uri",
        }
    }
}

/// Type of a field
#[derive(Debug, Clone)]
pub enum FieldType {
    String {
        format: Option<StringFormat>,
        pattern: Option<Regex>,
    },
    Integer,
    Number,
    Boolean,
    Array(Box<FieldType>),
    /// JSON object with arbitrary keys and uniformly typed values
    Map(Box<FieldType>),
    /// Reference to another schema by name
    Object(String),
    Any,
}

impl FieldType {
    pub fn describe(&self) -> String {
        match self {
            FieldType::String { format: Some(f), .. } => format!("string ({})", f.as_str()),
            FieldType::String { .. } => "string".to_string(),
            FieldType::Integer => "integer".to_string(),
            FieldType::Number => "number".to_string(),
            FieldType::Boolean => "boolean".to_string(),
            FieldType::Array(items) => format!("array of {}", items.describe()),
            FieldType::Map(values) => format!("map of {}", values.describe()),
            FieldType::Object(name) => format!("object `{}`", name),
            FieldType::Any => "any".to_string(),
        }
    }

    fn references<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            FieldType::Object(name) => out.push(name),
            FieldType::Array(inner) | FieldType::Map(inner) => inner.references(out),
            _ => {}
        }
    }
}

/// One field of a schema
#[derive(Debug, Clone)]
pub struct FieldDef {
    pub ty: FieldType,
    pub required: bool,
    /// Whether an explicit `null` is accepted for a required field
    pub nullable: bool,
}

/// A named data model
#[derive(Debug, Clone)]
pub struct SchemaDefinition {
    pub name: String,
    /// Marks the schema as allowed to take part in reference cycles
    pub recursive: bool,
    pub fields: BTreeMap<String, FieldDef>,
}

impl SchemaDefinition {
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.get(name)
    }

    pub fn required_fields(&self) -> impl Iterator<Item = &str> + '_ {
        self.fields
            .iter()
            .filter(|(_, f)| f.required)
            .map(|(name, _)| name.as_str())
    }
}

/// Schema definition as written in the schema file
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SchemaDesc {
    #[serde(default)]
    recursive: bool,
    #[serde(default)]
    fields: BTreeMap<String, FieldDesc>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FieldDesc {
    #[serde(rename = "type")]
    ty: String,
    #[serde(default)]
    required: bool,
    #[serde(default)]
    nullable: bool,
    #[serde(default)]
    format: Option<String>,
    #[serde(default)]
    pattern: Option<String>,
    #[serde(default)]
    items: Option<Box<FieldDesc>>,
    #[serde(default)]
    values: Option<Box<FieldDesc>>,
    #[serde(default, rename = "ref")]
    reference: Option<String>,
}

/// All schemas, keyed by name
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    schemas: HashMap<String, SchemaDefinition>,
}

impl SchemaRegistry {
    /// Parse and check a schema source
    pub fn load(source: &str) -> Result<Self> {
        let raw: BTreeMap<String, SchemaDesc> = if source.trim().is_empty() {
            BTreeMap::new()
        } else {
            serde_yaml::from_str(source)
                .map_err(|e| Error::schema("<source>", format!("failed to parse schemas: {}", e)))?
        };

        let mut schemas = HashMap::new();
        for (name, desc) in raw {
            let mut fields = BTreeMap::new();
            for (field_name, field) in desc.fields {
                let def = convert_field(&name, &field_name, field)?;
                fields.insert(field_name, def);
            }
            schemas.insert(
                name.clone(),
                SchemaDefinition {
                    name,
                    recursive: desc.recursive,
                    fields,
                },
            );
        }

        let registry = Self { schemas };
        registry.check_references()?;
        registry.check_cycles()?;

        tracing::debug!("Loaded {} schemas", registry.len());
        Ok(registry)
    }

    /// Look up a schema by name
    pub fn resolve(&self, name: &str) -> Result<&SchemaDefinition> {
        self.schemas.get(name).ok_or_else(|| Error::SchemaNotFound {
            name: name.to_string(),
            referenced_by: "lookup".to_string(),
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.schemas.contains_key(name)
    }

    /// Schema names in sorted order
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.schemas.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    fn refs_of(schema: &SchemaDefinition) -> Vec<(&str, &str)> {
        let mut out = Vec::new();
        for (field_name, field) in &schema.fields {
            let mut refs = Vec::new();
            field.ty.references(&mut refs);
            out.extend(refs.into_iter().map(|r| (field_name.as_str(), r)));
        }
        out
    }

    fn check_references(&self) -> Result<()> {
        for name in self.names() {
            let schema = &self.schemas[name];
            for (field, target) in Self::refs_of(schema) {
                if !self.contains(target) {
                    return Err(Error::SchemaNotFound {
                        name: target.to_string(),
                        referenced_by: format!("field `{}.{}`", name, field),
                    });
                }
            }
        }
        Ok(())
    }

    /// Reject reference cycles unless every schema on the cycle is marked
    /// `recursive`
    fn check_cycles(&self) -> Result<()> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Visiting,
            Done,
        }

        fn visit<'a>(
            registry: &'a SchemaRegistry,
            name: &'a str,
            marks: &mut HashMap<&'a str, Mark>,
            stack: &mut Vec<&'a str>,
        ) -> Result<()> {
            match marks.get(name) {
                Some(Mark::Done) => return Ok(()),
                Some(Mark::Visiting) => {
                    let start = stack.iter().position(|n| *n == name).unwrap_or(0);
                    let cycle = &stack[start..];
                    if let Some(offender) = cycle.iter().find(|n| !registry.schemas[**n].recursive) {
                        let mut chain: Vec<&str> = cycle.to_vec();
                        chain.push(name);
                        return Err(Error::schema(
                            *offender,
                            format!(
                                "reference cycle {} must be marked `recursive: true` on every schema",
                                chain.join(" -> ")
                            ),
                        ));
                    }
                    return Ok(());
                }
                None => {}
            }

            marks.insert(name, Mark::Visiting);
            stack.push(name);
            let schema = &registry.schemas[name];
            for (_, target) in SchemaRegistry::refs_of(schema) {
                visit(registry, target, marks, stack)?;
            }
            stack.pop();
            marks.insert(name, Mark::Done);
            Ok(())
        }

        let mut marks = HashMap::new();
        let mut stack = Vec::new();
        for name in self.names() {
            visit(self, name, &mut marks, &mut stack)?;
        }
        Ok(())
    }
}

fn convert_field(schema: &str, field: &str, desc: FieldDesc) -> Result<FieldDef> {
    let ty = convert_type(schema, field, &desc)?;
    Ok(FieldDef {
        ty,
        required: desc.required,
        nullable: desc.nullable,
    })
}

fn convert_type(schema: &str, field: &str, desc: &FieldDesc) -> Result<FieldType> {
    let fail = |reason: String| Error::schema(schema, format!("field `{}`: {}", field, reason));

    if desc.ty != "string" && (desc.format.is_some() || desc.pattern.is_some()) {
        return Err(fail(format!(
            "`format` and `pattern` only apply to strings, not `{}`",
            desc.ty
        )));
    }

    let ty = match desc.ty.as_str() {
        "string" => {
            let format = match &desc.format {
                Some(f) => Some(
                    StringFormat::parse(f).ok_or_else(|| fail(format!("unknown format `{}`", f)))?,
                ),
                None => None,
            };
            let pattern = match &desc.pattern {
                Some(p) => Some(
                    Regex::new(p).map_err(|e| fail(format!("invalid pattern `{}`: {}", p, e)))?,
                ),
                None => None,
            };
            FieldType::String { format, pattern }
        }
        "integer" => FieldType::Integer,
        "number" => FieldType::Number,
        "boolean" => FieldType::Boolean,
        "any" => FieldType::Any,
        "array" => {
            let items = desc
                .items
                .as_deref()
                .ok_or_else(|| fail("array requires `items`".to_string()))?;
            FieldType::Array(Box::new(convert_type(schema, field, items)?))
        }
        "map" => {
            let values = desc
                .values
                .as_deref()
                .ok_or_else(|| fail("map requires `values`".to_string()))?;
            FieldType::Map(Box::new(convert_type(schema, field, values)?))
        }
        "object" => {
            let name = desc
                .reference
                .as_ref()
                .ok_or_else(|| fail("object requires `ref`".to_string()))?;
            FieldType::Object(name.clone())
        }
        other => return Err(fail(format!("unknown type `{}`", other))),
    };
    Ok(ty)
}
