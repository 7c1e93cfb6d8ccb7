//! Resolution of type references into [`Shape`]s.
//!
//! Object types are never inlined: a struct is interned in the
//! [`SchemaRegistry`] under its resolved generic arguments and referenced by
//! id. Generic parameters are looked up in a [`BindingContext`]; a struct's
//! fields resolve under a fresh context that binds the struct's own
//! parameters to the arguments it was instantiated with.

use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::introspect::{
    DocumentationProvider, EnumDecl, SourceElement, TypeDecl, TypeDeclKind, TypeIntrospector,
    TypeLookup, TypeRef,
};
use crate::model::{DataFormat, EnumLiterals, PrimitiveKind, Shape};
use crate::schema_registry::{SchemaBody, SchemaField, SchemaRegistry};
use crate::serde_attrs::{container_attributes, field_attributes};
use log::debug;
use std::collections::BTreeMap;

/// Nested declared-type resolutions allowed before giving up.
pub const MAX_SCHEMA_RECURSION_DEPTH: usize = 32;

/// Wrappers that serialize exactly like their content.
const TRANSPARENT: &[&str] = &["Option", "Box", "Rc", "Arc", "Cow", "RefCell", "Cell"];

const SEQUENCES: &[&str] = &["Vec", "VecDeque", "LinkedList", "HashSet", "BTreeSet", "IndexSet"];

const MAPS: &[&str] = &["HashMap", "BTreeMap", "IndexMap"];

/// Generic parameter bindings in scope at a use site.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BindingContext {
    bindings: BTreeMap<String, Option<Shape>>,
}

#[derive(Debug, PartialEq, Eq)]
pub enum Binding<'a> {
    Bound(&'a Shape),
    /// Declared type variable without an argument.
    Unbound,
    NotAVariable,
}

impl BindingContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `params` to `args` pairwise; parameters without an argument stay unbound.
    pub fn bind(params: &[String], args: Vec<Shape>) -> Self {
        let mut args = args.into_iter();
        let bindings = params
            .iter()
            .map(|param| (param.clone(), args.next()))
            .collect();
        Self { bindings }
    }

    /// Declares `names` as unbound, shadowing any outer binding of the same name.
    pub fn with_unbound(mut self, names: &[String]) -> Self {
        for name in names {
            self.bindings.insert(name.clone(), None);
        }
        self
    }

    pub fn lookup(&self, name: &str) -> Binding<'_> {
        match self.bindings.get(name) {
            Some(Some(shape)) => Binding::Bound(shape),
            Some(None) => Binding::Unbound,
            None => Binding::NotAVariable,
        }
    }
}

/// Mutable state of one resolution pass.
pub struct Session<'s> {
    pub registry: &'s mut SchemaRegistry,
    pub diagnostics: &'s mut Diagnostics,
    depth: usize,
}

impl<'s> Session<'s> {
    pub fn new(registry: &'s mut SchemaRegistry, diagnostics: &'s mut Diagnostics) -> Self {
        Self {
            registry,
            diagnostics,
            depth: 0,
        }
    }
}

pub struct TypeResolver<'a> {
    types: &'a dyn TypeIntrospector,
    docs: Option<&'a dyn DocumentationProvider>,
}

impl<'a> TypeResolver<'a> {
    pub fn new(types: &'a dyn TypeIntrospector) -> Self {
        Self { types, docs: None }
    }

    pub fn with_docs(mut self, docs: &'a dyn DocumentationProvider) -> Self {
        self.docs = Some(docs);
        self
    }

    pub fn describe(&self, element: SourceElement<'_>) -> Option<String> {
        self.docs.and_then(|docs| docs.describe(element))
    }

    /// Resolves `ty` as written at `site` (a route, parameter or field name
    /// used in diagnostics).
    pub fn resolve(
        &self,
        ty: &TypeRef,
        ctx: &BindingContext,
        site: &str,
        session: &mut Session<'_>,
    ) -> Shape {
        match ty {
            TypeRef::Tuple(_) | TypeRef::Opaque(_) => Shape::Unknown,
            TypeRef::Slice(elem) if elem.name() == Some("u8") => binary(),
            TypeRef::Slice(elem) => Shape::ArrayOf(Box::new(self.resolve(elem, ctx, site, session))),
            TypeRef::Named { name, args } => self.resolve_named(name, args, ctx, site, session),
        }
    }

    fn resolve_named(
        &self,
        name: &str,
        args: &[TypeRef],
        ctx: &BindingContext,
        site: &str,
        session: &mut Session<'_>,
    ) -> Shape {
        if args.is_empty() {
            match ctx.lookup(name) {
                Binding::Bound(shape) => return shape.clone(),
                Binding::Unbound => {
                    session.diagnostics.warn(
                        DiagnosticKind::UnresolvedGeneric,
                        site,
                        format!("generic parameter `{}` has no binding", name),
                    );
                    return Shape::Unknown;
                }
                Binding::NotAVariable => {}
            }
        }

        if let Some(shape) = primitive(name) {
            return shape;
        }

        let first = || args.first();
        if TRANSPARENT.contains(&name) {
            return match first() {
                Some(inner) => self.resolve(inner, ctx, site, session),
                None => Shape::Unknown,
            };
        }
        if name == "Vec" && first().and_then(TypeRef::name) == Some("u8") {
            return binary();
        }
        if SEQUENCES.contains(&name) {
            let item = match first() {
                Some(inner) => self.resolve(inner, ctx, site, session),
                None => Shape::Unknown,
            };
            return Shape::ArrayOf(Box::new(item));
        }
        if MAPS.contains(&name) {
            let value = match args.get(1) {
                Some(value) => self.resolve(value, ctx, site, session),
                None => Shape::Unknown,
            };
            return Shape::MapOf(Box::new(value));
        }
        if name == "Value" {
            return Shape::Unknown;
        }

        match self.types.lookup_type(name) {
            TypeLookup::Found(decl) => self.resolve_decl(decl, args, ctx, site, session),
            TypeLookup::Ambiguous(candidates) => {
                session.diagnostics.warn(
                    DiagnosticKind::AmbiguousType,
                    site,
                    format!(
                        "`{}` may be any of {}; import or qualify the one meant",
                        name,
                        candidates.join(", ")
                    ),
                );
                Shape::Unknown
            }
            TypeLookup::Missing => {
                session.diagnostics.warn(
                    DiagnosticKind::UnknownType,
                    site,
                    format!("type `{}` is neither a primitive nor declared in the sources", name),
                );
                Shape::Unknown
            }
        }
    }

    fn resolve_decl(
        &self,
        decl: &TypeDecl,
        args: &[TypeRef],
        ctx: &BindingContext,
        site: &str,
        session: &mut Session<'_>,
    ) -> Shape {
        match &decl.kind {
            TypeDeclKind::Enum(e) => return Shape::EnumOf(enum_literals(decl, e)),
            TypeDeclKind::Opaque => return Shape::Unknown,
            TypeDeclKind::Alias(_) | TypeDeclKind::Struct(_) => {}
        }
        if !self.enter(decl, site, session) {
            return Shape::Unknown;
        }

        let resolved = self.resolve_args(decl, args, ctx, site, session);
        let shape = match &decl.kind {
            TypeDeclKind::Alias(target) => {
                let inner = BindingContext::bind(&decl.generics, resolved);
                self.resolve(target, &inner, site, session)
            }
            _ => {
                let key = resolved.clone();
                let depth = session.depth;
                let diagnostics = &mut *session.diagnostics;
                let id = session.registry.intern(decl, key, |registry| {
                    let mut nested = Session {
                        registry,
                        diagnostics,
                        depth,
                    };
                    let inner = BindingContext::bind(&decl.generics, resolved);
                    SchemaBody {
                        fields: self.resolve_fields(decl, &inner, &mut nested),
                        description: self.describe(SourceElement::Type(decl)),
                    }
                });
                Shape::Reference(id)
            }
        };
        session.depth -= 1;
        shape
    }

    /// Counts one more nested declaration, or reports the limit.
    fn enter(&self, decl: &TypeDecl, site: &str, session: &mut Session<'_>) -> bool {
        if session.depth >= MAX_SCHEMA_RECURSION_DEPTH {
            session.diagnostics.warn(
                DiagnosticKind::RecursionLimit,
                site,
                format!(
                    "`{}` is nested more than {} levels deep",
                    decl.name, MAX_SCHEMA_RECURSION_DEPTH
                ),
            );
            return false;
        }
        session.depth += 1;
        true
    }

    fn resolve_args(
        &self,
        decl: &TypeDecl,
        args: &[TypeRef],
        ctx: &BindingContext,
        site: &str,
        session: &mut Session<'_>,
    ) -> Vec<Shape> {
        args.iter()
            .take(decl.generics.len())
            .map(|arg| self.resolve(arg, ctx, site, session))
            .collect()
    }

    /// Serialized fields of a struct, in declaration order.
    pub fn resolve_fields(
        &self,
        decl: &TypeDecl,
        ctx: &BindingContext,
        session: &mut Session<'_>,
    ) -> Vec<SchemaField> {
        let TypeDeclKind::Struct(fields) = &decl.kind else {
            return Vec::new();
        };
        let container = container_attributes(&decl.annotations);
        let mut resolved = Vec::with_capacity(fields.len());

        for field in fields {
            let attrs = field_attributes(&field.annotations);
            if attrs.skip {
                continue;
            }
            let site = format!("{}.{}", decl.name, field.name);

            if attrs.flatten {
                match self.struct_fields(&field.ty, ctx, &site, session) {
                    Some(inner) => {
                        let optional = field.ty.is_option();
                        resolved.extend(inner.into_iter().map(|mut f| {
                            f.required &= !optional;
                            f
                        }));
                    }
                    None => debug!("{}: only structs can be flattened, field ignored", site),
                }
                continue;
            }

            let name = attrs
                .rename
                .unwrap_or_else(|| container.rename_all.apply_to_field(&field.name));
            resolved.push(SchemaField {
                name,
                shape: self.resolve(&field.ty, ctx, &site, session),
                required: !(field.ty.is_option() || attrs.default || container.default),
                description: self.describe(SourceElement::Field(field)),
            });
        }

        resolved
    }

    /// Fields of the struct `ty` names, for types whose fields become
    /// separate parameters (`Query<Filter>`) or are inlined (`flatten`).
    /// `None` if `ty` is not a struct.
    pub fn struct_fields(
        &self,
        ty: &TypeRef,
        ctx: &BindingContext,
        site: &str,
        session: &mut Session<'_>,
    ) -> Option<Vec<SchemaField>> {
        let mut ty = ty;
        while ty.name().is_some_and(|name| TRANSPARENT.contains(&name)) {
            match ty.first_arg() {
                Some(inner) => ty = inner,
                None => break,
            }
        }
        let TypeRef::Named { name, args } = ty else {
            return None;
        };

        if args.is_empty() {
            match ctx.lookup(name) {
                Binding::Bound(Shape::Reference(id)) => {
                    return session.registry.get(id).map(|entry| entry.fields.clone());
                }
                Binding::Bound(_) | Binding::Unbound => return None,
                Binding::NotAVariable => {}
            }
        }

        let decl = self.types.type_decl(name)?;
        if !matches!(decl.kind, TypeDeclKind::Struct(_)) || !self.enter(decl, site, session) {
            return None;
        }
        let resolved = self.resolve_args(decl, args, ctx, site, session);
        let inner = BindingContext::bind(&decl.generics, resolved);
        let fields = self.resolve_fields(decl, &inner, session);
        session.depth -= 1;
        Some(fields)
    }
}

fn binary() -> Shape {
    Shape::Primitive(PrimitiveKind::String, Some(DataFormat::Binary))
}

/// Built-in scalar types.
pub fn primitive(name: &str) -> Option<Shape> {
    use DataFormat::*;
    use PrimitiveKind::*;

    let (kind, format) = match name {
        "String" | "str" | "char" => (String, None),
        "i8" | "i16" | "i32" | "u8" | "u16" | "u32" => (Integer, Some(Int32)),
        "i64" | "i128" | "isize" | "u64" | "u128" | "usize" => (Integer, Some(Int64)),
        "f32" => (Number, Some(Float)),
        "f64" => (Number, Some(Double)),
        "Decimal" => (Number, None),
        "bool" => (Boolean, None),
        "Uuid" => (String, Some(Uuid)),
        "DateTime" | "NaiveDateTime" | "OffsetDateTime" | "SystemTime" => (String, Some(DateTime)),
        "NaiveDate" => (String, Some(Date)),
        "Bytes" | "BytesMut" => (String, Some(Binary)),
        _ => return None,
    };
    Some(Shape::Primitive(kind, format))
}

fn enum_literals(decl: &TypeDecl, e: &EnumDecl) -> EnumLiterals {
    let integer = e.repr.is_some()
        && !e.variants.is_empty()
        && e.variants.iter().all(|v| v.discriminant.is_some());

    if integer {
        return EnumLiterals {
            name: decl.name.clone(),
            backing: PrimitiveKind::Integer,
            values: e
                .variants
                .iter()
                .filter_map(|v| v.discriminant)
                .map(|d| d.to_string())
                .collect(),
        };
    }

    let container = container_attributes(&decl.annotations);
    EnumLiterals {
        name: decl.name.clone(),
        backing: PrimitiveKind::String,
        values: e
            .variants
            .iter()
            .filter_map(|v| {
                let attrs = field_attributes(&v.annotations);
                if attrs.skip {
                    return None;
                }
                Some(
                    attrs
                        .rename
                        .unwrap_or_else(|| container.rename_all.apply_to_variant(&v.name)),
                )
            })
            .collect(),
    }
}
