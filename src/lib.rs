//! OpenAPI documents from annotated Rust route handlers.
//!
//! Handlers are found by static analysis: functions and `impl` methods
//! carrying route attributes (`#[get("/accounts/{id}")]`,
//! `#[route("/x", method = "GET")]`), grouped into tags by controller type
//! or module. Parameter and payload types are resolved against the types
//! declared in the project and rendered as component schemas. The output is
//! deterministic: the same sources always produce the same document, byte
//! for byte.
//!
//! # Architecture
//!
//! 1. [`scanner`] and [`parser`] - sorted source walk and `syn` parsing
//! 2. [`introspect`] - the [`TypeIntrospector`](introspect::TypeIntrospector)
//!    capability and its source-backed implementation
//! 3. [`type_resolver`] and [`schema_registry`] - type references to shapes,
//!    interned object schemas
//! 4. [`extractor`] - the endpoint model ([`model::TagLibrary`])
//! 5. [`naming`] and [`openapi_builder`] - the OpenAPI document
//! 6. [`serializer`] - YAML or JSON text
//!
//! # Example Usage
//!
//! ```no_run
//! use openapi_from_source::{
//!     extractor::EndpointBuilder,
//!     introspect::{DocComments, SourceIndex},
//!     openapi_builder::{NamingOptions, OpenApiBuilder},
//!     serializer::serialize_yaml,
//! };
//! use std::path::Path;
//!
//! let index = SourceIndex::load(Path::new("./my-project")).unwrap();
//! let scan = EndpointBuilder::new(&index)
//!     .with_docs(&DocComments)
//!     .scan(&["src/routes"])
//!     .unwrap();
//! for warning in scan.diagnostics.iter() {
//!     eprintln!("{}", warning);
//! }
//!
//! let document = OpenApiBuilder::new(NamingOptions::default()).build(&scan.library);
//! println!("{}", serialize_yaml(&document).unwrap());
//! ```
//!
//! For command-line usage, see the [`cli`] module.

pub mod cli;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod extractor;
pub mod introspect;
pub mod model;
pub mod naming;
pub mod openapi_builder;
pub mod parser;
pub mod scanner;
pub mod schema_registry;
pub mod serde_attrs;
pub mod serializer;
pub mod type_resolver;
