//! Classification of handler arguments into request parameters.
//!
//! Explicit markers (`#[path]`, `#[query]`, `#[header]`, `#[cookie]`,
//! `#[body]`) decide first. Without one, the extractor type the argument is
//! declared with decides: `Json<T>` is a body, `Path<T>` binds template
//! variables, `Query<T>` expands a struct into its fields, and so on.

use crate::introspect::{find_annotation, Annotation, Literal, ParamDecl, TypeRef};
use crate::model::{Parameter, ParameterLocation};
use crate::schema_registry::SchemaField;
use crate::type_resolver::{BindingContext, Session, TypeResolver};
use log::debug;
use std::collections::HashSet;

/// Arguments supplied by the framework rather than by the request.
const INJECTED: &[&str] = &[
    "HttpRequest",
    "Request",
    "Data",
    "State",
    "Extension",
    "ConnectInfo",
    "HeaderMap",
    "Method",
    "Uri",
    "Payload",
];

/// Extractor wrappers dropped in front of an explicitly marked argument.
const EXTRACTORS: &[&str] = &[
    "Path",
    "Query",
    "Json",
    "Form",
    "Header",
    "TypedHeader",
    "Cookie",
];

pub const JSON: &str = "application/json";
pub const FORM: &str = "application/x-www-form-urlencoded";

const MARKERS: [(&str, ParameterLocation); 5] = [
    ("path", ParameterLocation::Path),
    ("query", ParameterLocation::Query),
    ("header", ParameterLocation::Header),
    ("cookie", ParameterLocation::Cookie),
    ("body", ParameterLocation::Body),
];

/// Classifies the arguments of one endpoint.
pub(crate) struct ParamClassifier<'r, 'a> {
    resolver: &'r TypeResolver<'a>,
    ctx: &'r BindingContext,
    /// `GET /accounts/{id}`, used to name diagnostic sites.
    route: &'r str,
    template_vars: &'r [String],
    used_vars: HashSet<String>,
}

impl<'r, 'a> ParamClassifier<'r, 'a> {
    pub fn new(
        resolver: &'r TypeResolver<'a>,
        ctx: &'r BindingContext,
        route: &'r str,
        template_vars: &'r [String],
    ) -> Self {
        Self {
            resolver,
            ctx,
            route,
            template_vars,
            used_vars: HashSet::new(),
        }
    }

    /// Template variables no argument has claimed yet, in path order.
    pub fn unclaimed_vars(&self) -> impl Iterator<Item = &String> {
        self.template_vars
            .iter()
            .filter(|v| !self.used_vars.contains(*v))
    }

    /// Parameters described by one argument; several for tuples and
    /// expanded structs, none for framework-injected arguments.
    pub fn classify(&mut self, param: &ParamDecl, session: &mut Session<'_>) -> Vec<Parameter> {
        let marker = MARKERS.iter().find_map(|(name, location)| {
            find_annotation(&param.annotations, name).map(|a| (*location, a))
        });
        if let Some((location, annotation)) = marker {
            return self.explicit(param, location, annotation, session);
        }

        let ty = &param.ty;
        let inner = ty.first_arg();
        match (ty.name(), inner) {
            (Some(name), _) if INJECTED.contains(&name) => {
                debug!("{}: `{}` is injected by the framework", self.route, ty);
                Vec::new()
            }
            (Some("Json"), Some(inner)) => vec![self.body(param, inner, Some(JSON), session)],
            (Some("Form"), Some(inner)) => vec![self.body(param, inner, Some(FORM), session)],
            (Some("Bytes" | "BytesMut"), _) => vec![self.body(param, ty, None, session)],
            (Some("Path"), Some(inner)) => self.path(param, inner, session),
            (Some("Query"), Some(inner)) => {
                match self.expand(inner, ParameterLocation::Query, session) {
                    Some(params) => params,
                    None => {
                        let name = pattern_name(param, ParameterLocation::Query);
                        vec![self.single(name, inner, ParameterLocation::Query, session)]
                    }
                }
            }
            (Some("Header" | "TypedHeader"), Some(inner)) => {
                let name = pattern_name(param, ParameterLocation::Header);
                vec![self.single(name, inner, ParameterLocation::Header, session)]
            }
            _ => {
                let location = match param.names.first() {
                    Some(name) if self.template_vars.contains(name) => ParameterLocation::Path,
                    _ => ParameterLocation::Query,
                };
                vec![self.single(pattern_name(param, location), ty, location, session)]
            }
        }
    }

    fn explicit(
        &mut self,
        param: &ParamDecl,
        location: ParameterLocation,
        annotation: &Annotation,
        session: &mut Session<'_>,
    ) -> Vec<Parameter> {
        let (ty, implied) = unwrap_extractor(&param.ty);
        let explicit_name = annotation
            .first_str()
            .or_else(|| annotation.named("name").and_then(Literal::as_str));
        let explicit_required = annotation.named("required").and_then(Literal::as_bool);

        if location == ParameterLocation::Body {
            let format = annotation
                .named("content_type")
                .and_then(Literal::as_str)
                .or(implied);
            let mut body = self.body(param, ty, format, session);
            if let Some(name) = explicit_name {
                body.name = name.to_string();
            }
            if let Some(required) = explicit_required {
                body.required = required;
            }
            return vec![body];
        }

        if explicit_name.is_none() {
            if let Some(params) = self.expand(ty, location, session) {
                return params;
            }
        }

        let name = match explicit_name {
            Some(name) => name.to_string(),
            None => pattern_name(param, location),
        };
        let mut parameter = self.single(name, ty, location, session);
        if let (Some(required), false) = (explicit_required, location == ParameterLocation::Path) {
            parameter.required = required;
        }
        vec![parameter]
    }

    fn body(
        &mut self,
        param: &ParamDecl,
        ty: &TypeRef,
        format: Option<&str>,
        session: &mut Session<'_>,
    ) -> Parameter {
        let name = param.names.first().cloned().unwrap_or_else(|| "body".to_string());
        let site = self.site(&name);
        Parameter {
            shape: self.resolver.resolve(ty, self.ctx, &site, session),
            name,
            location: ParameterLocation::Body,
            required: !ty.is_option(),
            format: format.map(str::to_string),
            description: None,
        }
    }

    /// `Path<(A, B)>`, `Path<Struct>` or `Path<T>`.
    fn path(&mut self, param: &ParamDecl, inner: &TypeRef, session: &mut Session<'_>) -> Vec<Parameter> {
        if let TypeRef::Tuple(elems) = inner {
            let names: Vec<String> = if param.names.len() == elems.len() {
                param.names.clone()
            } else {
                self.unclaimed_vars().cloned().collect()
            };
            return elems
                .iter()
                .enumerate()
                .map(|(i, elem)| {
                    let name = names.get(i).cloned().unwrap_or_else(|| format!("param{}", i));
                    self.path_param(name, elem, session)
                })
                .collect();
        }

        if let Some(params) = self.expand(inner, ParameterLocation::Path, session) {
            return params;
        }

        let name = match param.names.first() {
            Some(name) if self.template_vars.contains(name) => name.clone(),
            pattern => self
                .unclaimed_vars()
                .next()
                .or(pattern)
                .cloned()
                .unwrap_or_else(|| "id".to_string()),
        };
        vec![self.path_param(name, inner, session)]
    }

    fn path_param(&mut self, name: String, ty: &TypeRef, session: &mut Session<'_>) -> Parameter {
        let site = self.site(&name);
        self.used_vars.insert(name.clone());
        Parameter {
            shape: self.resolver.resolve(ty, self.ctx, &site, session),
            name,
            location: ParameterLocation::Path,
            required: true,
            format: None,
            description: None,
        }
    }

    fn single(
        &mut self,
        name: String,
        ty: &TypeRef,
        location: ParameterLocation,
        session: &mut Session<'_>,
    ) -> Parameter {
        if location == ParameterLocation::Path {
            return self.path_param(name, ty, session);
        }

        let site = self.site(&name);
        Parameter {
            shape: self.resolver.resolve(ty, self.ctx, &site, session),
            name,
            location,
            required: !ty.is_option(),
            format: None,
            description: None,
        }
    }

    /// One parameter per field when `ty` is a struct.
    fn expand(
        &mut self,
        ty: &TypeRef,
        location: ParameterLocation,
        session: &mut Session<'_>,
    ) -> Option<Vec<Parameter>> {
        let site = self.site(&ty.to_string());
        let fields = self.resolver.struct_fields(ty, self.ctx, &site, session)?;
        Some(
            fields
                .into_iter()
                .map(|field| self.from_field(field, location))
                .collect(),
        )
    }

    fn from_field(&mut self, field: SchemaField, location: ParameterLocation) -> Parameter {
        let required = location == ParameterLocation::Path || field.required;
        if location == ParameterLocation::Path {
            self.used_vars.insert(field.name.clone());
        }
        Parameter {
            name: field.name,
            location,
            required,
            shape: field.shape,
            format: None,
            description: field.description,
        }
    }

    fn site(&self, name: &str) -> String {
        format!("{} {}", self.route, name)
    }
}

/// Drops one known extractor wrapper, reporting the content type it implies.
pub(crate) fn unwrap_extractor(ty: &TypeRef) -> (&TypeRef, Option<&'static str>) {
    match (ty.name(), ty.first_arg()) {
        (Some("Json"), Some(inner)) => (inner, Some(JSON)),
        (Some("Form"), Some(inner)) => (inner, Some(FORM)),
        (Some(name), Some(inner)) if EXTRACTORS.contains(&name) => (inner, None),
        _ => (ty, None),
    }
}

/// Name bound by the argument pattern, or a placeholder for `_`.
fn pattern_name(param: &ParamDecl, location: ParameterLocation) -> String {
    match param.names.first() {
        Some(name) => name.clone(),
        None if location == ParameterLocation::Path => "id".to_string(),
        None => location.as_str().unwrap_or("param").to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Diagnostics;
    use crate::introspect::SourceIndex;
    use crate::model::{DataFormat, PrimitiveKind, Shape};
    use crate::schema_registry::SchemaRegistry;

    fn param(names: &[&str], ty: TypeRef) -> ParamDecl {
        ParamDecl {
            names: names.iter().map(|n| n.to_string()).collect(),
            ty,
            annotations: Vec::new(),
        }
    }

    fn classify_all(source: &str, template: &[&str], params: &[ParamDecl]) -> Vec<Parameter> {
        let index = SourceIndex::from_sources(&[("models.rs", source)]).unwrap();
        let resolver = TypeResolver::new(&index);
        let ctx = BindingContext::new();
        let vars: Vec<String> = template.iter().map(|v| v.to_string()).collect();
        let mut registry = SchemaRegistry::new();
        let mut diagnostics = Diagnostics::new();
        let mut session = Session::new(&mut registry, &mut diagnostics);

        let mut classifier = ParamClassifier::new(&resolver, &ctx, "GET /test", &vars);
        params
            .iter()
            .flat_map(|p| classifier.classify(p, &mut session))
            .collect()
    }

    fn summary(params: &[Parameter]) -> Vec<(&str, ParameterLocation, bool)> {
        params
            .iter()
            .map(|p| (p.name.as_str(), p.location, p.required))
            .collect()
    }

    #[test]
    fn test_path_tuple_uses_pattern_names() {
        let ty = TypeRef::generic(
            "Path",
            vec![TypeRef::Tuple(vec![TypeRef::named("u64"), TypeRef::named("String")])],
        );
        let params = classify_all("", &["owner", "slug"], &[param(&["owner_id", "name"], ty.clone())]);
        assert_eq!(
            summary(&params),
            vec![
                ("owner_id", ParameterLocation::Path, true),
                ("name", ParameterLocation::Path, true),
            ]
        );

        let params = classify_all("", &["owner", "slug"], &[param(&[], ty)]);
        assert_eq!(
            summary(&params),
            vec![
                ("owner", ParameterLocation::Path, true),
                ("slug", ParameterLocation::Path, true),
            ]
        );
    }

    #[test]
    fn test_single_path_value_takes_first_unclaimed_variable() {
        let ty = TypeRef::generic("Path", vec![TypeRef::named("u64")]);
        let params = classify_all("", &["account_id"], &[param(&["id"], ty)]);
        assert_eq!(summary(&params), vec![("account_id", ParameterLocation::Path, true)]);
        assert_eq!(
            params[0].shape,
            Shape::Primitive(PrimitiveKind::Integer, Some(DataFormat::Int64))
        );
    }

    #[test]
    fn test_query_struct_expands_into_fields() {
        let source = r#"
            pub struct Paging {
                pub page: u32,
                pub size: Option<u32>,
            }
        "#;
        let ty = TypeRef::generic("Query", vec![TypeRef::named("Paging")]);
        let params = classify_all(source, &[], &[param(&["paging"], ty)]);

        assert_eq!(
            summary(&params),
            vec![
                ("page", ParameterLocation::Query, true),
                ("size", ParameterLocation::Query, false),
            ]
        );
    }

    #[test]
    fn test_default_policy() {
        let params = classify_all(
            "pub struct Account { pub id: u64 }",
            &["id"],
            &[
                param(&["req"], TypeRef::named("HttpRequest")),
                param(&["state"], TypeRef::generic("State", vec![TypeRef::named("AppState")])),
                param(&["id"], TypeRef::named("u64")),
                param(&["verbose"], TypeRef::generic("Option", vec![TypeRef::named("bool")])),
                param(&["agent"], TypeRef::generic("Header", vec![TypeRef::named("String")])),
                param(&["account"], TypeRef::generic("Json", vec![TypeRef::named("Account")])),
                param(&["raw"], TypeRef::named("Bytes")),
            ],
        );

        assert_eq!(
            summary(&params),
            vec![
                ("id", ParameterLocation::Path, true),
                ("verbose", ParameterLocation::Query, false),
                ("agent", ParameterLocation::Header, true),
                ("account", ParameterLocation::Body, true),
                ("raw", ParameterLocation::Body, true),
            ]
        );
        assert_eq!(params[3].format.as_deref(), Some(JSON));
        assert!(params[4].shape.is_binary());
    }

    #[test]
    fn test_explicit_markers() {
        let mut id = param(&["id"], TypeRef::named("u64"));
        id.annotations.push(Annotation::new("path").with_positional(Literal::Str("account".into())));

        let mut token = param(&["token"], TypeRef::named("String"));
        token.annotations.push(
            Annotation::new("cookie").with_named("required", Literal::Bool(false)),
        );

        let mut upload = param(&["file"], TypeRef::generic("Json", vec![TypeRef::named("String")]));
        upload.annotations.push(
            Annotation::new("body").with_named("content_type", Literal::Str("text/csv".into())),
        );

        let params = classify_all("", &["account"], &[id, token, upload]);
        assert_eq!(
            summary(&params),
            vec![
                ("account", ParameterLocation::Path, true),
                ("token", ParameterLocation::Cookie, false),
                ("file", ParameterLocation::Body, true),
            ]
        );
        assert_eq!(params[2].format.as_deref(), Some("text/csv"));
        assert_eq!(params[2].shape, Shape::string());
    }
}
