//! Endpoint model builder.
//!
//! Walks the handler groups selected by the configured locations and turns
//! every route-annotated method into an [`Endpoint`] of the group's [`Tag`].
//! Types met on the way are resolved through the [`TypeResolver`], which
//! fills the library's schema registry.
//!
//! # Example
//!
//! ```no_run
//! use openapi_from_source::extractor::EndpointBuilder;
//! use openapi_from_source::introspect::{DocComments, SourceIndex};
//! use std::path::Path;
//!
//! let index = SourceIndex::load(Path::new("./my-project")).unwrap();
//! let scan = EndpointBuilder::new(&index)
//!     .with_docs(&DocComments)
//!     .scan(&["src/routes"])
//!     .unwrap();
//! println!("Found {} tags", scan.library.tags.len());
//! ```

pub mod params;
pub mod response;

use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::error::{Error, Result};
use crate::introspect::{
    find_annotation, has_annotation, Annotation, DocumentationProvider, HandlerGroup,
    HandlerMethod, Literal, SourceElement, TypeIntrospector,
};
use crate::model::{
    Endpoint, HttpMethod, Parameter, ParameterLocation, Response, Shape, Tag, TagLibrary,
};
use crate::schema_registry::SchemaRegistry;
use crate::type_resolver::{BindingContext, Session, TypeResolver};
use log::{debug, info};
use params::ParamClassifier;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Format used when nothing more specific is known.
pub const ANY_FORMAT: &str = "*/*";

/// Default response status per HTTP method.
///
/// Built in: `POST` answers 201, `DELETE` 204, everything else 200.
/// Configured entries override single methods.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusTable {
    overrides: BTreeMap<HttpMethod, u16>,
}

impl StatusTable {
    pub fn with(mut self, method: HttpMethod, status: u16) -> Self {
        self.overrides.insert(method, status);
        self
    }

    pub fn status_for(&self, method: HttpMethod) -> u16 {
        if let Some(status) = self.overrides.get(&method) {
            return *status;
        }
        match method {
            HttpMethod::Post => 201,
            HttpMethod::Delete => 204,
            _ => 200,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct BuilderOptions {
    /// Derive missing content types from payload shapes instead of `*/*`.
    pub guess_formats: bool,
    pub statuses: StatusTable,
}

/// Outcome of a scan: the model plus every warning raised while building it.
#[derive(Debug)]
pub struct Scan {
    pub library: TagLibrary,
    pub diagnostics: Diagnostics,
}

pub struct EndpointBuilder<'a> {
    types: &'a dyn TypeIntrospector,
    docs: Option<&'a dyn DocumentationProvider>,
    options: BuilderOptions,
}

/// One route declared on a handler method.
#[derive(Debug)]
struct RouteDecl<'m> {
    method: HttpMethod,
    path: &'m str,
    annotation: &'m Annotation,
}

impl<'a> EndpointBuilder<'a> {
    pub fn new(types: &'a dyn TypeIntrospector) -> Self {
        Self {
            types,
            docs: None,
            options: BuilderOptions::default(),
        }
    }

    pub fn with_docs(mut self, docs: &'a dyn DocumentationProvider) -> Self {
        self.docs = Some(docs);
        self
    }

    pub fn with_options(mut self, options: BuilderOptions) -> Self {
        self.options = options;
        self
    }

    /// Builds the tag library for `locations`.
    ///
    /// # Errors
    ///
    /// [`Error::NoLocations`] for an empty list; any location the
    /// introspector rejects (unknown or malformed) aborts the scan.
    pub fn scan<S: AsRef<str>>(&self, locations: &[S]) -> Result<Scan> {
        if locations.is_empty() {
            return Err(Error::NoLocations);
        }

        let mut groups: Vec<&HandlerGroup> = Vec::new();
        let mut seen = HashSet::new();
        for location in locations {
            for group in self.types.handler_groups(location.as_ref())? {
                if seen.insert(group.id) {
                    groups.push(group);
                }
            }
        }
        info!("Scanning {} handler groups", groups.len());

        let mut resolver = TypeResolver::new(self.types);
        if let Some(docs) = self.docs {
            resolver = resolver.with_docs(docs);
        }

        let mut registry = SchemaRegistry::new();
        let mut diagnostics = Diagnostics::new();
        let mut tags: Vec<Tag> = Vec::new();
        let mut tag_slots: HashMap<&str, usize> = HashMap::new();
        let mut declared: HashMap<(String, HttpMethod), String> = HashMap::new();

        for group in groups {
            let endpoints = {
                let mut session = Session::new(&mut registry, &mut diagnostics);
                self.group_endpoints(group, &resolver, &mut session)
            };

            let slot = *tag_slots.entry(group.qualified_name.as_str()).or_insert_with(|| {
                tags.push(self.tag(group, &resolver));
                tags.len() - 1
            });
            let tag = &mut tags[slot];
            if tag.name.is_none() {
                tag.name = explicit_tag_name(group);
            }
            if tag.base_path.is_none() {
                tag.base_path = scope(group).map(normalize_path);
            }
            if tag.description.is_none() {
                tag.description = resolver.describe(SourceElement::Group(group));
            }

            for endpoint in endpoints {
                let key = (endpoint.path.clone(), endpoint.method);
                if let Some(first) = declared.get(&key) {
                    diagnostics.warn(
                        DiagnosticKind::DuplicateOperation,
                        endpoint.route(),
                        format!(
                            "already declared by `{}`, `{}` is ignored",
                            first, endpoint.source_name
                        ),
                    );
                    continue;
                }
                declared.insert(key, endpoint.source_name.clone());
                tag.endpoints.push(endpoint);
            }
        }

        tags.retain(|tag| {
            if tag.endpoints.is_empty() {
                debug!("{} declares no routes", tag.qualified_name);
            }
            !tag.endpoints.is_empty()
        });
        info!(
            "Built {} tags with {} schemas ({} warnings)",
            tags.len(),
            registry.len(),
            diagnostics.len()
        );

        Ok(Scan {
            library: TagLibrary {
                tags,
                schemas: registry,
            },
            diagnostics,
        })
    }

    fn tag(&self, group: &HandlerGroup, resolver: &TypeResolver<'_>) -> Tag {
        Tag {
            name: explicit_tag_name(group),
            default_name: group.name.clone(),
            qualified_name: group.qualified_name.clone(),
            base_path: scope(group).map(normalize_path),
            description: resolver.describe(SourceElement::Group(group)),
            endpoints: Vec::new(),
        }
    }

    fn group_endpoints(
        &self,
        group: &HandlerGroup,
        resolver: &TypeResolver<'_>,
        session: &mut Session<'_>,
    ) -> Vec<Endpoint> {
        // Generic bindings of the group are resolved once, outside any scope.
        let params: Vec<String> = group.bindings.iter().map(|(p, _)| p.clone()).collect();
        let args: Vec<Shape> = group
            .bindings
            .iter()
            .map(|(param, ty)| {
                let site = format!("{}<{}>", group.qualified_name, param);
                resolver.resolve(ty, &BindingContext::new(), &site, session)
            })
            .collect();
        let group_ctx = BindingContext::bind(&params, args);

        let mut endpoints = Vec::new();
        for method in &group.methods {
            let routes = self.routes(group, method, session.diagnostics);
            if routes.is_empty() {
                continue;
            }

            let distinct: HashSet<HttpMethod> = routes.iter().map(|r| r.method).collect();
            let ctx = group_ctx.clone().with_unbound(&method.generics);
            for route in &routes {
                let source_name = if distinct.len() > 1 {
                    format!("{}_{}", method.name, route.method.canonical_name())
                } else {
                    method.name.clone()
                };
                endpoints.push(self.endpoint(group, method, route, source_name, &ctx, resolver, session));
            }
        }
        endpoints
    }

    /// Route declarations of a method; a `#[route]` without a method is
    /// reported and skipped.
    fn routes<'m>(
        &self,
        group: &HandlerGroup,
        method: &'m HandlerMethod,
        diagnostics: &mut Diagnostics,
    ) -> Vec<RouteDecl<'m>> {
        let mut routes: Vec<RouteDecl<'m>> = Vec::new();
        let mut push = |decl: RouteDecl<'m>| {
            if !routes
                .iter()
                .any(|r| r.method == decl.method && r.path == decl.path)
            {
                routes.push(decl);
            }
        };

        for annotation in &method.annotations {
            let path = annotation.first_str().unwrap_or("");
            if annotation.name == "route" {
                let methods: Vec<HttpMethod> = annotation
                    .named_all("method")
                    .filter_map(Literal::as_str)
                    .filter_map(HttpMethod::parse)
                    .collect();
                if methods.is_empty() {
                    diagnostics.warn(
                        DiagnosticKind::MissingHttpMethod,
                        format!("{}::{}", group.qualified_name, method.name),
                        format!("#[route({:?})] names no HTTP method, skipped", path),
                    );
                }
                for m in methods {
                    push(RouteDecl {
                        method: m,
                        path,
                        annotation,
                    });
                }
            } else if let Some(m) = HttpMethod::ALL
                .into_iter()
                .find(|m| m.canonical_name() == annotation.name)
            {
                push(RouteDecl {
                    method: m,
                    path,
                    annotation,
                });
            }
        }

        routes
    }

    #[allow(clippy::too_many_arguments)]
    fn endpoint(
        &self,
        group: &HandlerGroup,
        method: &HandlerMethod,
        route: &RouteDecl<'_>,
        source_name: String,
        ctx: &BindingContext,
        resolver: &TypeResolver<'_>,
        session: &mut Session<'_>,
    ) -> Endpoint {
        let path = normalize_path(&combine_paths(scope(group).unwrap_or(""), route.path));
        let route_name = format!("{} {}", route.method, path);
        let template_vars = template_vars(&path);
        debug!("{} -> {}::{}", route_name, group.qualified_name, method.name);

        let mut classifier = ParamClassifier::new(resolver, ctx, &route_name, &template_vars);
        let mut parameters: Vec<Parameter> = Vec::new();
        let mut request_body: Option<Parameter> = None;

        for param in &method.params {
            for parameter in classifier.classify(param, session) {
                if parameter.location == ParameterLocation::Body {
                    if let Some(first) = &request_body {
                        session.diagnostics.warn(
                            DiagnosticKind::MultipleBodies,
                            route_name.as_str(),
                            format!(
                                "body `{}` is ignored, `{}` is already the request body",
                                parameter.name, first.name
                            ),
                        );
                        continue;
                    }
                    request_body = Some(parameter);
                    continue;
                }
                if parameter.shape.is_array() {
                    session.diagnostics.warn(
                        DiagnosticKind::ArrayInNonBodyLocation,
                        route_name.as_str(),
                        format!(
                            "{} parameter `{}` has an array type; arrays are only allowed in the body",
                            parameter.location.as_str().unwrap_or("body"),
                            parameter.name
                        ),
                    );
                }
                parameters.push(parameter);
            }
        }

        let unclaimed: Vec<String> = classifier.unclaimed_vars().cloned().collect();
        for var in unclaimed {
            debug!("{}: template variable `{}` has no argument", route_name, var);
            parameters.push(Parameter {
                name: var,
                location: ParameterLocation::Path,
                required: true,
                shape: Shape::string(),
                format: None,
                description: None,
            });
        }

        let consumes = route.annotation.named("consumes").and_then(Literal::as_str);
        if let Some(body) = &mut request_body {
            let explicit = body.format.take();
            body.format = Some(self.format(explicit.as_deref().or(consumes), &body.shape));
        }

        let payload = response::payload(method.output.as_ref());
        let shape = payload
            .ty
            .map(|ty| resolver.resolve(ty, ctx, &format!("{} response", route_name), session));
        let produces = route
            .annotation
            .named("produces")
            .and_then(Literal::as_str)
            .or(payload.implied_format);
        let format = shape.as_ref().map(|s| self.format(produces, s));

        Endpoint {
            path,
            method: route.method,
            source_name,
            operation_id: route
                .annotation
                .named("operation_id")
                .and_then(Literal::as_str)
                .map(str::to_string),
            parameters,
            request_body,
            response: Response {
                status: status(route, method)
                    .unwrap_or_else(|| self.options.statuses.status_for(route.method)),
                shape,
                format,
            },
            description: resolver.describe(SourceElement::Method(method)),
            deprecated: has_annotation(&method.annotations, "deprecated"),
        }
    }

    /// Explicit format, else a guess from the shape when enabled, else `*/*`.
    fn format(&self, explicit: Option<&str>, shape: &Shape) -> String {
        match explicit {
            Some(format) => format.to_string(),
            None if self.options.guess_formats => shape.guessed_format().to_string(),
            None => ANY_FORMAT.to_string(),
        }
    }
}

fn explicit_tag_name(group: &HandlerGroup) -> Option<String> {
    let tag = find_annotation(&group.annotations, "tag")?;
    tag.first_str()
        .or_else(|| tag.named("name").and_then(Literal::as_str))
        .map(str::to_string)
}

fn scope(group: &HandlerGroup) -> Option<&str> {
    find_annotation(&group.annotations, "scope").and_then(Annotation::first_str)
}

/// `status = N` on the route, else `#[status(N)]` on the method.
fn status(route: &RouteDecl<'_>, method: &HandlerMethod) -> Option<u16> {
    route
        .annotation
        .named("status")
        .or_else(|| find_annotation(&method.annotations, "status")?.first_positional())
        .and_then(Literal::as_int)
        .and_then(|status| u16::try_from(status).ok())
}

/// Joins a scope and a route path with exactly one `/` between them.
pub fn combine_paths(scope: &str, path: &str) -> String {
    if scope.is_empty() {
        return path.to_string();
    }

    let scope = scope.trim_end_matches('/');
    let path = path.trim_start_matches('/');

    if path.is_empty() {
        scope.to_string()
    } else {
        format!("{}/{}", scope, path)
    }
}

/// OpenAPI form of a route path: leading `/`, no trailing `/`, `:id`, `*rest`
/// and `{id:\d+}` all written `{id}`.
pub fn normalize_path(path: &str) -> String {
    let segments: Vec<String> = path
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|segment| {
            if let Some(var) = segment
                .strip_prefix(':')
                .or_else(|| segment.strip_prefix('*'))
            {
                format!("{{{}}}", var)
            } else if segment.starts_with('{') && segment.ends_with('}') {
                let inner = &segment[1..segment.len() - 1];
                let name = inner.split(':').next().unwrap_or(inner).trim();
                format!("{{{}}}", name)
            } else {
                segment.to_string()
            }
        })
        .collect();

    format!("/{}", segments.join("/"))
}

/// Variable names of a normalized path, in order.
pub fn template_vars(path: &str) -> Vec<String> {
    path.split('/')
        .filter_map(|s| s.strip_prefix('{').and_then(|s| s.strip_suffix('}')))
        .map(str::to_string)
        .collect()
}
