//! The endpoint and schema model handed from the builder to the assembler.
//!
//! Everything in here is plain data. The [`TagLibrary`] is built once by
//! [`EndpointBuilder::scan`](crate::extractor::EndpointBuilder::scan) and only
//! read afterwards.

use crate::schema_registry::SchemaRegistry;
use serde::{Deserialize, Serialize};
use std::fmt;

/// HTTP methods an endpoint can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Options,
    Trace,
}

impl HttpMethod {
    pub const ALL: [HttpMethod; 8] = [
        HttpMethod::Get,
        HttpMethod::Post,
        HttpMethod::Put,
        HttpMethod::Delete,
        HttpMethod::Patch,
        HttpMethod::Head,
        HttpMethod::Options,
        HttpMethod::Trace,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
            HttpMethod::Trace => "TRACE",
        }
    }

    /// Lowercase name, as used for path item keys and operation ordering.
    pub fn canonical_name(&self) -> &'static str {
        match self {
            HttpMethod::Get => "get",
            HttpMethod::Post => "post",
            HttpMethod::Put => "put",
            HttpMethod::Delete => "delete",
            HttpMethod::Patch => "patch",
            HttpMethod::Head => "head",
            HttpMethod::Options => "options",
            HttpMethod::Trace => "trace",
        }
    }

    /// Case-insensitive; also accepts `Method::GET` style paths.
    pub fn parse(method: &str) -> Option<Self> {
        let method = method.rsplit("::").next().unwrap_or(method);
        HttpMethod::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(method.trim()))
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParameterLocation {
    Path,
    Query,
    Header,
    Cookie,
    Body,
}

impl ParameterLocation {
    /// The `in` value of an OpenAPI parameter; `None` for bodies.
    pub fn as_str(&self) -> Option<&'static str> {
        match self {
            ParameterLocation::Path => Some("path"),
            ParameterLocation::Query => Some("query"),
            ParameterLocation::Header => Some("header"),
            ParameterLocation::Cookie => Some("cookie"),
            ParameterLocation::Body => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PrimitiveKind {
    String,
    Integer,
    Number,
    Boolean,
}

impl PrimitiveKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrimitiveKind::String => "string",
            PrimitiveKind::Integer => "integer",
            PrimitiveKind::Number => "number",
            PrimitiveKind::Boolean => "boolean",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DataFormat {
    Int32,
    Int64,
    Float,
    Double,
    Date,
    DateTime,
    Uuid,
    Binary,
}

impl DataFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataFormat::Int32 => "int32",
            DataFormat::Int64 => "int64",
            DataFormat::Float => "float",
            DataFormat::Double => "double",
            DataFormat::Date => "date",
            DataFormat::DateTime => "date-time",
            DataFormat::Uuid => "uuid",
            DataFormat::Binary => "binary",
        }
    }
}

/// Canonical id of a component schema.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SchemaId(pub String);

impl SchemaId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SchemaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Literals of an enum rendered inline.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EnumLiterals {
    /// Simple name of the declaring enum.
    pub name: String,
    pub backing: PrimitiveKind,
    /// Serialized names, or discriminants for integer-backed enums.
    pub values: Vec<String>,
}

/// The resolved form of a type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Shape {
    Primitive(PrimitiveKind, Option<DataFormat>),
    ArrayOf(Box<Shape>),
    /// String-keyed map; only the value is modeled.
    MapOf(Box<Shape>),
    EnumOf(EnumLiterals),
    Reference(SchemaId),
    /// Free-form value, or a type that could not be resolved.
    Unknown,
}

impl Shape {
    pub fn string() -> Self {
        Shape::Primitive(PrimitiveKind::String, None)
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Shape::ArrayOf(_))
    }

    pub fn is_binary(&self) -> bool {
        matches!(
            self,
            Shape::Primitive(PrimitiveKind::String, Some(DataFormat::Binary))
        )
    }

    /// Content type a payload of this shape most likely has.
    pub fn guessed_format(&self) -> &'static str {
        match self {
            Shape::Primitive(..) if self.is_binary() => "application/octet-stream",
            Shape::Primitive(..) => "text/plain",
            _ => "application/json",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    pub name: String,
    pub location: ParameterLocation,
    pub required: bool,
    pub shape: Shape,
    /// Content type; only meaningful for bodies.
    pub format: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    /// `None` when the handler returns no payload.
    pub shape: Option<Shape>,
    pub format: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// OpenAPI path template, `{var}` form.
    pub path: String,
    pub method: HttpMethod,
    /// Handler identifier, suffixed `_<method>` when one handler declares several methods.
    pub source_name: String,
    pub operation_id: Option<String>,
    /// Non-body parameters in declaration order.
    pub parameters: Vec<Parameter>,
    pub request_body: Option<Parameter>,
    pub response: Response,
    pub description: Option<String>,
    pub deprecated: bool,
}

impl Endpoint {
    /// `GET /accounts/{id}`
    pub fn route(&self) -> String {
        format!("{} {}", self.method, self.path)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    /// Explicit display name from `#[tag("...")]`.
    pub name: Option<String>,
    /// Controller type identifier or module name.
    pub default_name: String,
    pub qualified_name: String,
    pub base_path: Option<String>,
    pub description: Option<String>,
    pub endpoints: Vec<Endpoint>,
}

/// Tags in discovery order plus every schema they reference.
#[derive(Debug, Default)]
pub struct TagLibrary {
    pub tags: Vec<Tag>,
    pub schemas: SchemaRegistry,
}

impl TagLibrary {
    pub fn endpoints(&self) -> impl Iterator<Item = (&Tag, &Endpoint)> {
        self.tags
            .iter()
            .flat_map(|tag| tag.endpoints.iter().map(move |e| (tag, e)))
    }
}
