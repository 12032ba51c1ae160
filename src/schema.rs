//! Declared types, record/enum schemas and service descriptors.
//!
//! Everything the parameter builder knows about a type comes from a
//! [`Registry`] loaded from JSON schema documents:
//!
//! ```json
//! {
//!   "records":  [{ "name": "Int32Record",
//!                  "fields": [{ "id": 1, "name": "value", "type": "i32" }] }],
//!   "enums":    [{ "name": "Count", "symbols": [{ "name": "ZERO" }, { "name": "ONE" }] }],
//!   "services": [{ "name": "Echo",
//!                  "methods": [{ "name": "ping",
//!                                "params": [{ "name": "count", "type": "Count" }],
//!                                "returns": "string" }] }]
//! }
//! ```

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A declared type, as written in schema documents and true-type answers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TypeRef {
    Bool,
    Byte,
    I16,
    I32,
    I64,
    Double,
    String,
    /// Placeholder element type: any concrete type may be supplied.
    Any,
    /// A registered record or enum.
    Named(String),
    List(Box<TypeRef>),
    Set(Box<TypeRef>),
    Map(Box<TypeRef>, Box<TypeRef>),
}

impl TypeRef {
    pub fn parse(text: &str) -> std::result::Result<TypeRef, String> {
        let mut chars = text.chars().peekable();
        let ty = parse_type(&mut chars)?;
        skip_whitespace(&mut chars);
        match chars.next() {
            None => Ok(ty),
            Some(c) => Err(format!("unexpected `{c}` after `{ty}`")),
        }
    }

    /// Whether a value of type `actual` may stand in where `self` is declared.
    pub fn accepts(&self, actual: &TypeRef) -> bool {
        match (self, actual) {
            (TypeRef::Any, _) => true,
            (TypeRef::List(d), TypeRef::List(a)) | (TypeRef::Set(d), TypeRef::Set(a)) => {
                d.accepts(a)
            }
            (TypeRef::Map(dk, dv), TypeRef::Map(ak, av)) => dk.accepts(ak) && dv.accepts(av),
            _ => self == actual,
        }
    }

    fn named_refs<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            TypeRef::Named(name) => out.push(name),
            TypeRef::List(t) | TypeRef::Set(t) => t.named_refs(out),
            TypeRef::Map(k, v) => {
                k.named_refs(out);
                v.named_refs(out);
            }
            _ => {}
        }
    }
}

fn parse_type<I>(chars: &mut std::iter::Peekable<I>) -> std::result::Result<TypeRef, String>
where
    I: Iterator<Item = char>,
{
    skip_whitespace(chars);
    let mut ident = String::new();
    while let Some(&c) = chars.peek() {
        if c.is_alphanumeric() || c == '_' || c == '.' {
            ident.push(c);
            chars.next();
        } else {
            break;
        }
    }

    if ident.is_empty() {
        return match chars.next() {
            Some(c) => Err(format!("unexpected `{c}` where a type name was expected")),
            None => Err("unexpected end of type".into()),
        };
    }

    let ty = match ident.as_str() {
        "bool" => TypeRef::Bool,
        "byte" | "i8" => TypeRef::Byte,
        "i16" => TypeRef::I16,
        "i32" => TypeRef::I32,
        "i64" => TypeRef::I64,
        "double" => TypeRef::Double,
        "string" => TypeRef::String,
        "any" => TypeRef::Any,
        "list" | "set" => {
            expect(chars, '<')?;
            let elem = Box::new(parse_type(chars)?);
            expect(chars, '>')?;
            if ident == "list" {
                TypeRef::List(elem)
            } else {
                TypeRef::Set(elem)
            }
        }
        "map" => {
            expect(chars, '<')?;
            let key = Box::new(parse_type(chars)?);
            expect(chars, ',')?;
            let value = Box::new(parse_type(chars)?);
            expect(chars, '>')?;
            TypeRef::Map(key, value)
        }
        _ => TypeRef::Named(ident),
    };
    Ok(ty)
}

fn skip_whitespace<I>(chars: &mut std::iter::Peekable<I>)
where
    I: Iterator<Item = char>,
{
    while chars.next_if(|c| c.is_whitespace()).is_some() {}
}

fn expect<I>(chars: &mut std::iter::Peekable<I>, want: char) -> std::result::Result<(), String>
where
    I: Iterator<Item = char>,
{
    skip_whitespace(chars);
    match chars.next() {
        Some(c) if c == want => Ok(()),
        Some(c) => Err(format!("expected `{want}`, found `{c}`")),
        None => Err(format!("expected `{want}`, found end of type")),
    }
}

impl FromStr for TypeRef {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        TypeRef::parse(s)
    }
}

impl TryFrom<String> for TypeRef {
    type Error = String;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        TypeRef::parse(&s)
    }
}

impl From<TypeRef> for String {
    fn from(ty: TypeRef) -> Self {
        ty.to_string()
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Bool => f.write_str("bool"),
            TypeRef::Byte => f.write_str("byte"),
            TypeRef::I16 => f.write_str("i16"),
            TypeRef::I32 => f.write_str("i32"),
            TypeRef::I64 => f.write_str("i64"),
            TypeRef::Double => f.write_str("double"),
            TypeRef::String => f.write_str("string"),
            TypeRef::Any => f.write_str("any"),
            TypeRef::Named(name) => f.write_str(name),
            TypeRef::List(t) => write!(f, "list<{t}>"),
            TypeRef::Set(t) => write!(f, "set<{t}>"),
            TypeRef::Map(k, v) => write!(f, "map<{k},{v}>"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSchema {
    pub id: i16,
    pub name: String,
    #[serde(rename = "type")]
    pub ty: TypeRef,
    #[serde(default)]
    pub required: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordSchema {
    pub name: String,
    #[serde(default)]
    pub fields: Vec<FieldSchema>,
}

impl RecordSchema {
    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumSymbol {
    pub name: String,
    /// Defaults to the symbol's position in the declaration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumSchema {
    pub name: String,
    pub symbols: Vec<EnumSymbol>,
}

impl EnumSchema {
    /// Integer value of `symbol`, if it is a member. Names match exactly.
    pub fn value_of(&self, symbol: &str) -> Option<i32> {
        self.symbols
            .iter()
            .enumerate()
            .find(|(_, s)| s.name == symbol)
            .map(|(i, s)| s.value.unwrap_or(i as i32))
    }

    pub fn symbol_for(&self, value: i32) -> Option<&str> {
        self.values()
            .find(|(_, v)| *v == value)
            .map(|(name, _)| name)
    }

    /// Every symbol with its resolved value, in declaration order.
    pub fn values(&self) -> impl Iterator<Item = (&str, i32)> {
        self.symbols
            .iter()
            .enumerate()
            .map(|(i, s)| (s.name.as_str(), s.value.unwrap_or(i as i32)))
    }
}

/// One parameter of a remote method. Order in the method is call order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: TypeRef,
    /// A blank answer for a required parameter fails the invocation instead
    /// of passing an absent argument.
    #[serde(default)]
    pub required: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodSignature {
    pub name: String,
    #[serde(default, rename = "params")]
    pub parameters: Vec<ParameterSpec>,
    #[serde(default)]
    pub returns: Option<TypeRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceDescriptor {
    pub name: String,
    #[serde(default)]
    pub methods: Vec<MethodSignature>,
}

impl ServiceDescriptor {
    /// First method declared with this name. Overloads are not
    /// distinguished: later declarations with the same name are never
    /// reached.
    pub fn resolve(&self, method: &str) -> Result<&MethodSignature> {
        self.methods
            .iter()
            .find(|m| m.name == method)
            .ok_or_else(|| Error::MethodNotFound {
                service: self.name.clone(),
                method: method.to_string(),
            })
    }
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct SchemaDocument {
    #[serde(default)]
    pub records: Vec<RecordSchema>,
    #[serde(default)]
    pub enums: Vec<EnumSchema>,
    #[serde(default)]
    pub services: Vec<ServiceDescriptor>,
}

/// How a parameter of a given declared type is built.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TypeDescriptor<'a> {
    Record(&'a RecordSchema),
    List(&'a TypeRef),
    Set(&'a TypeRef),
    Enum(&'a EnumSchema),
}

fn first_duplicate<T: Ord + Copy>(items: impl IntoIterator<Item = T>) -> Option<T> {
    let mut seen = BTreeSet::new();
    items.into_iter().find(|item| !seen.insert(*item))
}

/// All registered records, enums and services.
#[derive(Debug, Default, Clone)]
pub struct Registry {
    records: HashMap<String, RecordSchema>,
    enums: HashMap<String, EnumSchema>,
    services: HashMap<String, ServiceDescriptor>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let mut registry = Self::new();
        registry.add_json(text)?;
        registry.validate()?;
        Ok(registry)
    }

    pub fn add_json(&mut self, text: &str) -> Result<()> {
        let doc: SchemaDocument =
            serde_json::from_str(text).map_err(|e| Error::Schema(e.to_string()))?;
        self.add_document(doc)
    }

    /// Merge a document. A type or service name defined twice, in the same
    /// document or across documents, is rejected, as is a record reusing a
    /// field id or name, or an enum reusing a symbol name or value.
    pub fn add_document(&mut self, doc: SchemaDocument) -> Result<()> {
        for record in doc.records {
            self.check_type_name_free(&record.name)?;
            if let Some(id) = first_duplicate(record.fields.iter().map(|f| f.id)) {
                return Err(Error::Schema(format!(
                    "record `{}` declares field id {id} twice",
                    record.name
                )));
            }
            if let Some(name) = first_duplicate(record.fields.iter().map(|f| f.name.as_str())) {
                return Err(Error::Schema(format!(
                    "record `{}` declares field `{name}` twice",
                    record.name
                )));
            }
            self.records.insert(record.name.clone(), record);
        }
        for schema in doc.enums {
            self.check_type_name_free(&schema.name)?;
            if let Some(name) = first_duplicate(schema.values().map(|(name, _)| name)) {
                return Err(Error::Schema(format!(
                    "enum `{}` declares symbol `{name}` twice",
                    schema.name
                )));
            }
            if let Some(value) = first_duplicate(schema.values().map(|(_, value)| value)) {
                return Err(Error::Schema(format!(
                    "enum `{}` gives value {value} to more than one symbol",
                    schema.name
                )));
            }
            self.enums.insert(schema.name.clone(), schema);
        }
        for service in doc.services {
            if self.services.contains_key(&service.name) {
                return Err(Error::Schema(format!(
                    "service `{}` is defined more than once",
                    service.name
                )));
            }
            self.services.insert(service.name.clone(), service);
        }
        Ok(())
    }

    fn check_type_name_free(&self, name: &str) -> Result<()> {
        if TypeRef::parse(name) != Ok(TypeRef::Named(name.to_string())) {
            return Err(Error::Schema(format!(
                "`{name}` cannot be used as a type name"
            )));
        }
        if self.records.contains_key(name) || self.enums.contains_key(name) {
            return Err(Error::Schema(format!("type `{name}` is defined more than once")));
        }
        Ok(())
    }

    /// Load a schema file, or every `*.json` file of a directory in name
    /// order.
    pub fn load_path(&mut self, path: &Path) -> Result<()> {
        if path.is_dir() {
            let mut files: Vec<_> = fs::read_dir(path)?
                .flatten()
                .map(|entry| entry.path())
                .filter(|p| p.extension().and_then(|s| s.to_str()) == Some("json"))
                .collect();
            files.sort();
            for file in files {
                self.load_file(&file)?;
            }
            Ok(())
        } else {
            self.load_file(path)
        }
    }

    fn load_file(&mut self, path: &Path) -> Result<()> {
        let content = fs::read_to_string(path)
            .map_err(|e| Error::Schema(format!("cannot read {}: {e}", path.display())))?;
        self.add_json(&content)
            .map_err(|e| Error::Schema(format!("{}: {e}", path.display())))?;
        log::debug!("Loaded schema document {}", path.display());
        Ok(())
    }

    /// Check that every named type used by a field, parameter or return
    /// type is registered.
    pub fn validate(&self) -> Result<()> {
        let check = |owner: String, ty: &TypeRef| -> Result<()> {
            let mut names = Vec::new();
            ty.named_refs(&mut names);
            for name in names {
                if !self.records.contains_key(name) && !self.enums.contains_key(name) {
                    return Err(Error::Schema(format!(
                        "{owner} refers to unknown type `{name}`"
                    )));
                }
            }
            Ok(())
        };

        for record in self.records.values() {
            for field in &record.fields {
                check(format!("field {}.{}", record.name, field.name), &field.ty)?;
            }
        }
        for service in self.services.values() {
            for method in &service.methods {
                for param in &method.parameters {
                    check(
                        format!("parameter `{}` of {}.{}", param.name, service.name, method.name),
                        &param.ty,
                    )?;
                }
                if let Some(ret) = &method.returns {
                    check(format!("return type of {}.{}", service.name, method.name), ret)?;
                }
            }
        }
        Ok(())
    }

    pub fn record(&self, name: &str) -> Option<&RecordSchema> {
        self.records.get(name)
    }

    pub fn enum_schema(&self, name: &str) -> Option<&EnumSchema> {
        self.enums.get(name)
    }

    pub fn service(&self, name: &str) -> Result<&ServiceDescriptor> {
        self.services
            .get(name)
            .ok_or_else(|| Error::ServiceNotFound(name.to_string()))
    }

    pub fn service_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.services.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Decide how a parameter named `name` of declared type `ty` is built.
    pub fn classify<'a>(&'a self, name: &str, ty: &'a TypeRef) -> Result<TypeDescriptor<'a>> {
        if let TypeRef::Named(type_name) = ty {
            if let Some(record) = self.records.get(type_name) {
                return Ok(TypeDescriptor::Record(record));
            }
        }
        match ty {
            TypeRef::List(elem) => return Ok(TypeDescriptor::List(&**elem)),
            TypeRef::Set(elem) => return Ok(TypeDescriptor::Set(&**elem)),
            _ => {}
        }
        if let TypeRef::Named(type_name) = ty {
            if let Some(schema) = self.enums.get(type_name) {
                return Ok(TypeDescriptor::Enum(schema));
            }
        }
        Err(Error::UnsupportedType {
            name: name.to_string(),
            ty: ty.to_string(),
        })
    }
}
