//! Specification assembler.
//!
//! Turns a [`TagLibrary`] into an [`OpenApiDocument`]. Every map in the
//! document is an [`IndexMap`] filled in a fixed order (paths sorted, then
//! methods, schemas by type name and signature), so the serialized output
//! only depends on the library's content.

use crate::model::{Endpoint, Parameter, PrimitiveKind, Shape, TagLibrary};
use crate::naming::{self, NamingConfig};
use crate::schema_registry::SchemaEntry;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub const OPENAPI_VERSION: &str = "3.0.3";

const SCHEMA_PREFIX: &str = "#/components/schemas/";

/// OpenAPI Info object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Info {
    pub title: String,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Default for Info {
    fn default() -> Self {
        Self {
            title: "Generated API".to_string(),
            version: "1.0.0".to_string(),
            description: None,
        }
    }
}

/// OpenAPI Server object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Server {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Operations of one path, keyed by lowercase method name.
pub type PathItem = IndexMap<String, Operation>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenApiDocument {
    pub openapi: String,
    pub info: Info,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub servers: Vec<Server>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<TagObject>,
    pub paths: IndexMap<String, PathItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub components: Option<Components>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagObject {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub operation_id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<ParameterObject>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_body: Option<RequestBody>,
    pub responses: IndexMap<String, ResponseObject>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub deprecated: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterObject {
    pub name: String,
    #[serde(rename = "in")]
    pub location: String,
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub schema: Schema,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestBody {
    pub required: bool,
    pub content: IndexMap<String, MediaType>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaType {
    pub schema: Schema,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseObject {
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<IndexMap<String, MediaType>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Components {
    pub schemas: IndexMap<String, Schema>,
}

/// OpenAPI Schema object, restricted to what shapes and schema entries need.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    #[serde(rename = "$ref", default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub schema_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<serde_json::Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<Schema>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_properties: Option<Box<Schema>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<IndexMap<String, Schema>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<Vec<String>>,
}

impl Schema {
    fn typed(schema_type: &str) -> Self {
        Self {
            schema_type: Some(schema_type.to_string()),
            ..Self::default()
        }
    }

    /// Inline form of a shape. Objects are always `$ref`s.
    pub fn from_shape(shape: &Shape) -> Self {
        match shape {
            Shape::Primitive(kind, format) => Self {
                format: format.map(|f| f.as_str().to_string()),
                ..Self::typed(kind.as_str())
            },
            Shape::ArrayOf(item) => Self {
                items: Some(Box::new(Self::from_shape(item))),
                ..Self::typed("array")
            },
            Shape::MapOf(value) => Self {
                additional_properties: Some(Box::new(Self::from_shape(value))),
                ..Self::typed("object")
            },
            Shape::EnumOf(literals) => {
                let values = literals
                    .values
                    .iter()
                    .map(|value| match literals.backing {
                        PrimitiveKind::Integer => value
                            .parse::<i64>()
                            .map(serde_json::Value::from)
                            .unwrap_or_else(|_| serde_json::Value::from(value.as_str())),
                        _ => serde_json::Value::from(value.as_str()),
                    })
                    .collect();
                Self {
                    enum_values: Some(values),
                    ..Self::typed(literals.backing.as_str())
                }
            }
            Shape::Reference(id) => Self {
                reference: Some(format!("{}{}", SCHEMA_PREFIX, id)),
                ..Self::default()
            },
            Shape::Unknown => Self::typed("object"),
        }
    }

    /// Component schema of a registry entry.
    pub fn from_entry(entry: &SchemaEntry) -> Self {
        let properties: IndexMap<String, Schema> = entry
            .fields
            .iter()
            .map(|field| {
                let mut schema = Self::from_shape(&field.shape);
                if schema.reference.is_none() {
                    schema.description = field.description.clone();
                }
                (field.name.clone(), schema)
            })
            .collect();
        let required: Vec<String> = entry
            .fields
            .iter()
            .filter(|f| f.required)
            .map(|f| f.name.clone())
            .collect();

        Self {
            description: entry.description.clone(),
            properties: (!properties.is_empty()).then_some(properties),
            required: (!required.is_empty()).then_some(required),
            ..Self::typed("object")
        }
    }
}

/// Naming configuration for tags and operations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamingOptions {
    pub tag: NamingConfig,
    pub operation: NamingConfig,
}

/// OpenAPI document builder
pub struct OpenApiBuilder {
    info: Info,
    servers: Vec<Server>,
    naming: NamingOptions,
}

impl OpenApiBuilder {
    pub fn new(naming: NamingOptions) -> Self {
        Self {
            info: Info::default(),
            servers: Vec::new(),
            naming,
        }
    }

    pub fn with_info(mut self, info: Info) -> Self {
        self.info = info;
        self
    }

    pub fn with_servers(mut self, servers: Vec<Server>) -> Self {
        self.servers = servers;
        self
    }

    /// Builds the document. Calling it twice on the same library yields
    /// equal documents.
    pub fn build(&self, library: &TagLibrary) -> OpenApiDocument {
        let mut tags: Vec<TagObject> = Vec::new();
        let mut operations: Vec<(String, &Endpoint)> = Vec::new();

        for tag in &library.tags {
            let name = naming::tag_name(&self.naming.tag, tag);
            if !tags.iter().any(|t| t.name == name) {
                tags.push(TagObject {
                    name: name.clone(),
                    description: tag.description.clone(),
                });
            }
            operations.extend(tag.endpoints.iter().map(|e| (name.clone(), e)));
        }

        operations.sort_by(|(_, a), (_, b)| {
            a.path
                .cmp(&b.path)
                .then_with(|| a.method.canonical_name().cmp(b.method.canonical_name()))
        });

        let mut taken = HashSet::new();
        let mut paths: IndexMap<String, PathItem> = IndexMap::new();
        for (tag, endpoint) in operations {
            let operation_id = unique_id(
                &mut taken,
                naming::operation_name(&self.naming.operation, endpoint),
            );
            paths.entry(endpoint.path.clone()).or_default().insert(
                endpoint.method.canonical_name().to_string(),
                operation(tag, operation_id, endpoint),
            );
        }

        let mut entries: Vec<&SchemaEntry> = library.schemas.entries().iter().collect();
        entries.sort_by(|a, b| {
            a.type_name
                .cmp(&b.type_name)
                .then_with(|| a.signature.cmp(&b.signature))
        });
        let components = (!entries.is_empty()).then(|| Components {
            schemas: entries
                .into_iter()
                .map(|entry| (entry.id.to_string(), Schema::from_entry(entry)))
                .collect(),
        });

        OpenApiDocument {
            openapi: OPENAPI_VERSION.to_string(),
            info: self.info.clone(),
            servers: self.servers.clone(),
            tags,
            paths,
            components,
        }
    }
}

impl Default for OpenApiBuilder {
    fn default() -> Self {
        Self::new(NamingOptions::default())
    }
}

fn operation(tag: String, operation_id: String, endpoint: &Endpoint) -> Operation {
    let (summary, description) = split_description(endpoint.description.as_deref());

    let request_body = endpoint.request_body.as_ref().map(|body| RequestBody {
        required: body.required,
        content: content(body.format.as_deref(), &body.shape),
    });

    let response = &endpoint.response;
    let mut responses = IndexMap::new();
    responses.insert(
        response.status.to_string(),
        ResponseObject {
            description: reason_phrase(response.status).to_string(),
            content: response
                .shape
                .as_ref()
                .map(|shape| content(response.format.as_deref(), shape)),
        },
    );

    Operation {
        tags: vec![tag],
        summary,
        description,
        operation_id,
        parameters: endpoint.parameters.iter().map(parameter).collect(),
        request_body,
        responses,
        deprecated: endpoint.deprecated,
    }
}

fn parameter(parameter: &Parameter) -> ParameterObject {
    ParameterObject {
        name: parameter.name.clone(),
        location: parameter.location.as_str().unwrap_or("query").to_string(),
        required: parameter.required,
        description: parameter.description.clone(),
        schema: Schema::from_shape(&parameter.shape),
    }
}

fn content(format: Option<&str>, shape: &Shape) -> IndexMap<String, MediaType> {
    let mut content = IndexMap::new();
    content.insert(
        format.unwrap_or("*/*").to_string(),
        MediaType {
            schema: Schema::from_shape(shape),
        },
    );
    content
}

/// First line as summary, the remaining lines as description.
fn split_description(text: Option<&str>) -> (Option<String>, Option<String>) {
    let Some(text) = text.map(str::trim).filter(|t| !t.is_empty()) else {
        return (None, None);
    };
    match text.split_once('\n') {
        Some((first, rest)) => {
            let rest = rest.trim();
            (
                Some(first.trim().to_string()),
                (!rest.is_empty()).then(|| rest.to_string()),
            )
        }
        None => (Some(text.to_string()), None),
    }
}

/// `id`, then `id_2`, `id_3`... for later collisions.
fn unique_id(taken: &mut HashSet<String>, base: String) -> String {
    let mut candidate = base.clone();
    let mut suffix = 2;
    while taken.contains(&candidate) {
        candidate = format!("{}_{}", base, suffix);
        suffix += 1;
    }
    taken.insert(candidate.clone());
    candidate
}

fn reason_phrase(status: u16) -> &'static str {
    match status {
        100 => "Continue",
        101 => "Switching Protocols",
        200 => "OK",
        201 => "Created",
        202 => "Accepted",
        203 => "Non-Authoritative Information",
        204 => "No Content",
        205 => "Reset Content",
        206 => "Partial Content",
        300 => "Multiple Choices",
        301 => "Moved Permanently",
        302 => "Found",
        303 => "See Other",
        304 => "Not Modified",
        307 => "Temporary Redirect",
        308 => "Permanent Redirect",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        409 => "Conflict",
        410 => "Gone",
        415 => "Unsupported Media Type",
        422 => "Unprocessable Entity",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        _ => "Response",
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::EndpointBuilder;
    use crate::introspect::{DocComments, SourceIndex};
    use crate::model::{DataFormat, EnumLiterals, SchemaId};
    use crate::naming::NamingStrategy;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn library(sources: &[(&str, &str)], locations: &[&str]) -> TagLibrary {
        let index = SourceIndex::from_sources(sources).unwrap();
        EndpointBuilder::new(&index)
            .with_docs(&DocComments)
            .scan(locations)
            .unwrap()
            .library
    }

    fn to_json<T: Serialize>(value: &T) -> serde_json::Value {
        serde_json::to_value(value).unwrap()
    }

    #[test]
    fn test_empty_library() {
        let doc = OpenApiBuilder::default().build(&TagLibrary::default());

        assert_eq!(doc.openapi, "3.0.3");
        assert_eq!(doc.info.title, "Generated API");
        assert_eq!(doc.info.version, "1.0.0");
        assert!(doc.paths.is_empty());
        assert!(doc.components.is_none());
        assert_eq!(
            to_json(&doc),
            json!({"openapi": "3.0.3", "info": {"title": "Generated API", "version": "1.0.0"}, "paths": {}})
        );
    }

    #[test]
    fn test_with_info() {
        let info = Info {
            title: "Accounts".to_string(),
            version: "2.1.0".to_string(),
            description: Some("Account service".to_string()),
        };
        let doc = OpenApiBuilder::default()
            .with_info(info.clone())
            .build(&TagLibrary::default());
        assert_eq!(doc.info, info);
    }

    #[test]
    fn test_servers_follow_info() {
        let servers = vec![
            Server {
                url: String::new(),
                description: None,
            },
            Server {
                url: "https://api.example.com/v1".to_string(),
                description: Some("Production".to_string()),
            },
        ];
        let doc = OpenApiBuilder::default()
            .with_servers(servers)
            .build(&TagLibrary::default());

        let json = serde_json::to_string(&doc).unwrap();
        assert!(json.find("\"info\"").unwrap() < json.find("\"servers\"").unwrap());
        assert_eq!(
            to_json(&doc)["servers"],
            json!([
                {"url": ""},
                {"url": "https://api.example.com/v1", "description": "Production"}
            ])
        );
    }

    #[test]
    fn test_shape_rendering() {
        let cases = [
            (
                Shape::Primitive(PrimitiveKind::Integer, Some(DataFormat::Int64)),
                json!({"type": "integer", "format": "int64"}),
            ),
            (
                Shape::ArrayOf(Box::new(Shape::Reference(SchemaId("Account".to_string())))),
                json!({"type": "array", "items": {"$ref": "#/components/schemas/Account"}}),
            ),
            (
                Shape::MapOf(Box::new(Shape::string())),
                json!({"type": "object", "additionalProperties": {"type": "string"}}),
            ),
            (
                Shape::EnumOf(EnumLiterals {
                    name: "Priority".to_string(),
                    backing: PrimitiveKind::Integer,
                    values: vec!["1".to_string(), "9".to_string()],
                }),
                json!({"type": "integer", "enum": [1, 9]}),
            ),
            (
                Shape::EnumOf(EnumLiterals {
                    name: "Status".to_string(),
                    backing: PrimitiveKind::String,
                    values: vec!["ACTIVE".to_string()],
                }),
                json!({"type": "string", "enum": ["ACTIVE"]}),
            ),
            (Shape::Unknown, json!({"type": "object"})),
        ];
        for (shape, expected) in cases {
            assert_eq!(to_json(&Schema::from_shape(&shape)), expected);
        }
    }

    #[test]
    fn test_get_account_operation() {
        let lib = library(
            &[
                (
                    "models",
                    r#"
                    /// A bank account.
                    pub struct Account {
                        pub id: u64,
                        /// Holder name.
                        pub owner: Option<String>,
                    }
                    "#,
                ),
                (
                    "accounts",
                    r#"
                    /// Fetch an account.
                    ///
                    /// Fails with 404 for unknown ids.
                    #[get("/accounts/{id}")]
                    #[deprecated]
                    pub async fn get_account(Path(id): Path<u64>) -> Json<Account> { todo!() }
                    "#,
                ),
            ],
            &["accounts"],
        );
        let doc = OpenApiBuilder::default().build(&lib);

        assert_eq!(
            to_json(&doc.paths["/accounts/{id}"]),
            json!({
                "get": {
                    "tags": ["accounts"],
                    "summary": "Fetch an account.",
                    "description": "Fails with 404 for unknown ids.",
                    "operationId": "get_account",
                    "parameters": [{
                        "name": "id",
                        "in": "path",
                        "required": true,
                        "schema": {"type": "integer", "format": "int64"}
                    }],
                    "responses": {
                        "200": {
                            "description": "OK",
                            "content": {
                                "application/json": {
                                    "schema": {"$ref": "#/components/schemas/Account"}
                                }
                            }
                        }
                    },
                    "deprecated": true
                }
            })
        );
        assert_eq!(
            to_json(&doc.components.unwrap().schemas["Account"]),
            json!({
                "type": "object",
                "description": "A bank account.",
                "properties": {
                    "id": {"type": "integer", "format": "int64"},
                    "owner": {"type": "string", "description": "Holder name."}
                },
                "required": ["id"]
            })
        );
    }

    #[test]
    fn test_paths_and_methods_are_sorted() {
        let lib = library(
            &[(
                "routes",
                r#"
                #[put("/zebras")]
                pub async fn put_zebra() {}
                #[delete("/accounts")]
                pub async fn delete_account() {}
                #[get("/accounts")]
                pub async fn list_accounts() {}
                #[post("/accounts")]
                pub async fn create_account() {}
                "#,
            )],
            &["routes"],
        );
        let doc = OpenApiBuilder::default().build(&lib);

        let paths: Vec<_> = doc.paths.keys().cloned().collect();
        assert_eq!(paths, vec!["/accounts", "/zebras"]);
        let methods: Vec<_> = doc.paths["/accounts"].keys().cloned().collect();
        assert_eq!(methods, vec!["delete", "get", "post"]);
        assert_eq!(doc.paths["/accounts"]["post"].responses.keys().next().unwrap(), "201");
        assert_eq!(doc.paths["/accounts"]["delete"].responses["204"].description, "No Content");
    }

    #[test]
    fn test_schemas_sorted_by_name() {
        let lib = library(
            &[(
                "routes",
                r#"
                pub struct Zebra { pub stripes: u32 }
                pub struct Account { pub id: u64 }
                pub struct Midway { pub zebra: Zebra, pub account: Account }

                #[get("/midway")]
                pub async fn midway() -> Json<Midway> { todo!() }
                "#,
            )],
            &["routes"],
        );
        let doc = OpenApiBuilder::default().build(&lib);

        let names: Vec<_> = doc.components.unwrap().schemas.keys().cloned().collect();
        assert_eq!(names, vec!["Account", "Midway", "Zebra"]);
    }

    #[test]
    fn test_operation_ids_are_unique() {
        let lib = library(
            &[
                (
                    "accounts",
                    r#"
                    #[get("/accounts")]
                    pub async fn list() {}
                    "#,
                ),
                (
                    "orders",
                    r#"
                    #[get("/orders")]
                    pub async fn list() {}
                    "#,
                ),
            ],
            &["accounts", "orders"],
        );
        let doc = OpenApiBuilder::default().build(&lib);

        assert_eq!(doc.paths["/accounts"]["get"].operation_id, "list");
        assert_eq!(doc.paths["/orders"]["get"].operation_id, "list_2");
        let tags: Vec<_> = doc.tags.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(tags, vec!["accounts", "orders"]);
    }

    #[test]
    fn test_naming_strategies() {
        let lib = library(
            &[(
                "controllers",
                r#"
                #[scope("/billing/invoices")]
                pub struct InvoiceController;

                impl InvoiceController {
                    #[get("/{id}")]
                    pub async fn find(&self, id: u64) {}
                }
                "#,
            )],
            &["controllers"],
        );
        let naming = NamingOptions {
            tag: NamingConfig::new(NamingStrategy::PathSegments),
            operation: NamingConfig::new(NamingStrategy::PathSegments),
        };
        let doc = OpenApiBuilder::new(naming).build(&lib);

        let get = &doc.paths["/billing/invoices/{id}"]["get"];
        assert_eq!(get.tags, vec!["billing-invoices"]);
        assert_eq!(get.operation_id, "getBillingInvoicesById");
    }

    #[test]
    fn test_build_is_repeatable() {
        let lib = library(
            &[(
                "routes",
                r#"
                pub struct Page<T> { pub items: Vec<T> }
                #[get("/names")]
                pub async fn names() -> Json<Page<String>> { todo!() }
                #[post("/names")]
                pub async fn add(Json(name): Json<String>) {}
                "#,
            )],
            &["routes"],
        );
        let builder = OpenApiBuilder::default();
        assert_eq!(builder.build(&lib), builder.build(&lib));
    }

    #[test]
    fn test_split_description() {
        assert_eq!(split_description(None), (None, None));
        assert_eq!(split_description(Some("  ")), (None, None));
        assert_eq!(
            split_description(Some("One line.")),
            (Some("One line.".to_string()), None)
        );
        assert_eq!(
            split_description(Some("Title\n\nBody text.")),
            (Some("Title".to_string()), Some("Body text.".to_string()))
        );
    }
}
