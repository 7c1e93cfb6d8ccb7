//! `syn`-backed implementation of [`TypeIntrospector`].
//!
//! Every file is visited once, in scan order. Types go straight into the
//! index; traits, impl blocks and free functions are recorded and turned into
//! [`HandlerGroup`]s after the last file, because a trait impl may be
//! declared before (or in another file than) its trait.
//!
//! Type paths are written relative to the module they appear in. Once every
//! file is indexed, each path naming a declared type is rewritten to that
//! type's qualified name: the enclosing module first, then the module's
//! `use` imports. A simple name neither of them settles is left for
//! [`SourceIndex::lookup_type`], which only accepts it when a single module
//! declares it.

use super::{
    Annotation, AnnotationArg, EnumDecl, FieldDecl, HandlerGroup, HandlerMethod, Literal,
    ParamDecl, TypeDecl, TypeDeclKind, TypeIntrospector, TypeLookup, TypeRef, VariantDecl,
};
use crate::error::{Error, Result};
use crate::parser::{module_path, AstParser, ParsedFile};
use crate::scanner::FileScanner;
use log::debug;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};
use syn::ext::IdentExt;
use syn::punctuated::Punctuated;
use syn::visit::Visit;
use syn::{
    Attribute, Expr, Fields, FnArg, GenericArgument, Lit, Meta, Pat, PathArguments, ReturnType,
    Signature, Token, Type, TypeParamBound, UnOp, UseTree,
};

/// Declarations of a project, indexed for lookup by name and by location.
#[derive(Debug, Default)]
pub struct SourceIndex {
    root: Option<PathBuf>,
    /// Keyed by qualified name.
    types: HashMap<String, TypeDecl>,
    /// Simple name to qualified names, in discovery order.
    by_name: HashMap<String, Vec<String>>,
    groups: Vec<HandlerGroup>,
}

impl SourceIndex {
    /// Scans and indexes every Rust file below `root`.
    ///
    /// # Errors
    ///
    /// Fails when `root` is not a readable directory. Files that do not parse
    /// are skipped with a warning.
    pub fn load(root: &Path) -> Result<Self> {
        if !root.is_dir() {
            return Err(Error::Unreadable {
                path: root.to_path_buf(),
                message: "not a directory".to_string(),
            });
        }

        let scan = FileScanner::new(root.to_path_buf())
            .scan()
            .map_err(|e| Error::Unreadable {
                path: root.to_path_buf(),
                message: format!("{:#}", e),
            })?;
        let files = AstParser::parse_files(&scan.rust_files);

        Ok(Self::from_files(Some(root), &files))
    }

    /// Indexes already parsed files. Without a root, each file is its own
    /// top-level module named after its stem.
    pub fn from_files(root: Option<&Path>, files: &[ParsedFile]) -> Self {
        let mut collector = Collector::default();
        for file in files {
            collector.visit_source(file, module_path(root, &file.path));
        }
        collector.finish(root)
    }

    /// Indexes in-memory sources given as `(file name, content)` pairs.
    pub fn from_sources(sources: &[(&str, &str)]) -> Result<Self> {
        let files = sources
            .iter()
            .map(|(name, content)| {
                AstParser::parse_source(Path::new(name), content).map_err(|e| Error::ParseError {
                    file: PathBuf::from(name),
                    message: format!("{:#}", e),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self::from_files(None, &files))
    }

    /// Every handler group, in discovery order.
    pub fn groups(&self) -> &[HandlerGroup] {
        &self.groups
    }
}

impl TypeIntrospector for SourceIndex {
    fn lookup_type(&self, name: &str) -> TypeLookup<'_> {
        if let Some(decl) = self.types.get(name) {
            return TypeLookup::Found(decl);
        }
        let candidates: Vec<&TypeDecl> = self
            .by_name
            .get(name)
            .into_iter()
            .flatten()
            .filter_map(|qualified| self.types.get(qualified))
            .collect();
        match candidates.as_slice() {
            [] => TypeLookup::Missing,
            [decl] => TypeLookup::Found(decl),
            many => TypeLookup::Ambiguous(many.iter().map(|d| d.qualified_name.as_str()).collect()),
        }
    }

    fn handler_groups(&self, location: &str) -> Result<Vec<&HandlerGroup>> {
        let location = location.trim();
        if location.is_empty() {
            return Err(Error::InvalidLocation(location.to_string()));
        }

        let as_path = match &self.root {
            Some(root) => {
                let path = root.join(location);
                path.exists().then_some(path)
            }
            None => {
                let path = PathBuf::from(location);
                self.groups
                    .iter()
                    .any(|g| g.source.starts_with(&path))
                    .then_some(path)
            }
        };
        if let Some(path) = as_path {
            debug!("Location {:?} is a path", location);
            return Ok(self
                .groups
                .iter()
                .filter(|g| g.source.starts_with(&path))
                .collect());
        }

        let module = location.strip_prefix("crate::").unwrap_or(location);
        let prefix = format!("{}::", module);
        let selected: Vec<&HandlerGroup> = self
            .groups
            .iter()
            .filter(|g| g.qualified_name == module || g.qualified_name.starts_with(&prefix))
            .collect();

        if selected.is_empty() {
            return Err(Error::UnknownLocation(location.to_string()));
        }
        debug!("Location {:?} selects {} groups", location, selected.len());
        Ok(selected)
    }
}

#[derive(Debug)]
struct TraitRecord {
    module: Vec<String>,
    generics: Vec<String>,
    methods: Vec<HandlerMethod>,
}

#[derive(Debug)]
struct ImplRecord {
    self_ty: TypeRef,
    module: Vec<String>,
    generics: Vec<String>,
    source: PathBuf,
    trait_ref: Option<TypeRef>,
    annotations: Vec<Annotation>,
    methods: Vec<HandlerMethod>,
}

#[derive(Debug)]
struct ModuleRecord {
    module: Vec<String>,
    source: PathBuf,
    annotations: Vec<Annotation>,
    functions: Vec<HandlerMethod>,
}

#[derive(Debug)]
enum Pending {
    Impl(ImplRecord),
    Module(ModuleRecord),
}

/// `use` declarations of one module, as absolute candidate paths.
#[derive(Debug, Default)]
struct Imports {
    /// Imported name (or its `as` rename) to the paths it may stand for.
    names: HashMap<String, Vec<Vec<String>>>,
    globs: Vec<Vec<String>>,
}

#[derive(Default)]
struct Collector {
    file: PathBuf,
    module: Vec<String>,
    /// Annotations of each enclosing module, innermost last.
    module_annotations: Vec<Vec<Annotation>>,
    types: HashMap<String, TypeDecl>,
    by_name: HashMap<String, Vec<String>>,
    imports: HashMap<Vec<String>, Imports>,
    traits: HashMap<String, TraitRecord>,
    /// Attributes written on `mod name;` declarations, keyed by module path.
    declared_modules: HashMap<Vec<String>, Vec<Annotation>>,
    pending: Vec<Pending>,
    /// Pending module record of each (file, module) seen so far.
    module_slots: HashMap<(PathBuf, Vec<String>), usize>,
}

impl Collector {
    fn visit_source(&mut self, file: &ParsedFile, module: Vec<String>) {
        debug!("Indexing {} as module {:?}", file.path.display(), module.join("::"));
        self.file = file.path.clone();
        self.module = module;
        self.module_annotations = vec![annotations(&file.syntax_tree.attrs)];
        self.visit_file(&file.syntax_tree);
    }

    fn qualify(&self, name: &str) -> String {
        qualify(&self.module, name)
    }

    fn add_type(&mut self, decl: TypeDecl) {
        if self.types.contains_key(&decl.qualified_name) {
            debug!("Type {} declared twice, keeping the first", decl.qualified_name);
            return;
        }
        self.by_name
            .entry(decl.name.clone())
            .or_default()
            .push(decl.qualified_name.clone());
        self.types.insert(decl.qualified_name.clone(), decl);
    }

    fn add_import(&mut self, tree: &UseTree, prefix: &mut Vec<String>) {
        match tree {
            UseTree::Path(path) => {
                prefix.push(path.ident.to_string());
                self.add_import(&path.tree, prefix);
                prefix.pop();
            }
            UseTree::Name(name) if name.ident == "self" => {
                if let Some(last) = prefix.last().cloned() {
                    self.import_name(last, prefix);
                }
            }
            UseTree::Name(name) => {
                let ident = name.ident.unraw().to_string();
                prefix.push(ident.clone());
                self.import_name(ident, prefix);
                prefix.pop();
            }
            UseTree::Rename(rename) => {
                prefix.push(rename.ident.to_string());
                self.import_name(rename.rename.unraw().to_string(), prefix);
                prefix.pop();
            }
            UseTree::Glob(_) => {
                let targets = anchored(&self.module, prefix);
                self.imports
                    .entry(self.module.clone())
                    .or_default()
                    .globs
                    .extend(targets);
            }
            UseTree::Group(group) => {
                for item in &group.items {
                    self.add_import(item, prefix);
                }
            }
        }
    }

    fn import_name(&mut self, name: String, path: &[String]) {
        let targets = anchored(&self.module, path);
        self.imports
            .entry(self.module.clone())
            .or_default()
            .names
            .entry(name)
            .or_default()
            .extend(targets);
    }

    fn add_function(&mut self, function: HandlerMethod) {
        let key = (self.file.clone(), self.module.clone());
        let slot = match self.module_slots.get(&key) {
            Some(slot) => *slot,
            None => {
                self.pending.push(Pending::Module(ModuleRecord {
                    module: self.module.clone(),
                    source: self.file.clone(),
                    annotations: self.module_annotations.last().cloned().unwrap_or_default(),
                    functions: Vec::new(),
                }));
                let slot = self.pending.len() - 1;
                self.module_slots.insert(key, slot);
                slot
            }
        };
        if let Pending::Module(record) = &mut self.pending[slot] {
            record.functions.push(function);
        }
    }

    fn finish(self, root: Option<&Path>) -> SourceIndex {
        let Collector {
            mut types,
            by_name,
            imports,
            mut traits,
            declared_modules,
            mut pending,
            ..
        } = self;

        let scopes = Scopes {
            declared: types.keys().cloned().collect(),
            imports,
        };
        for decl in types.values_mut() {
            scopes.qualify_decl(decl);
        }
        for record in traits.values_mut() {
            for method in &mut record.methods {
                scopes.qualify_method(method, &record.module, &record.generics);
            }
        }
        for record in &mut pending {
            match record {
                Pending::Impl(record) => scopes.qualify_impl(record),
                Pending::Module(record) => {
                    for function in &mut record.functions {
                        scopes.qualify_method(function, &record.module, &[]);
                    }
                }
            }
        }

        let mut groups = Vec::with_capacity(pending.len());
        for record in pending {
            let id = groups.len();
            let group = match record {
                Pending::Impl(record) => impl_group(id, record, &types, &traits),
                Pending::Module(record) => module_group(id, record, &declared_modules),
            };
            groups.push(group);
        }

        debug!("Indexed {} types and {} handler groups", types.len(), groups.len());
        SourceIndex {
            root: root.map(Path::to_path_buf),
            types,
            by_name,
            groups,
        }
    }
}

/// Rewrites type paths to the qualified names of the types they denote.
struct Scopes {
    declared: HashSet<String>,
    imports: HashMap<Vec<String>, Imports>,
}

impl Scopes {
    fn qualify_decl(&self, decl: &mut TypeDecl) {
        let mut module: Vec<String> = decl.qualified_name.split("::").map(str::to_string).collect();
        module.pop();
        match &mut decl.kind {
            TypeDeclKind::Struct(fields) => {
                for field in fields {
                    self.qualify(&mut field.ty, &module, &decl.generics);
                }
            }
            TypeDeclKind::Alias(target) => self.qualify(target, &module, &decl.generics),
            TypeDeclKind::Enum(_) | TypeDeclKind::Opaque => {}
        }
    }

    fn qualify_impl(&self, record: &mut ImplRecord) {
        self.qualify(&mut record.self_ty, &record.module, &record.generics);
        if let Some(TypeRef::Named { args, .. }) = &mut record.trait_ref {
            for arg in args {
                self.qualify(arg, &record.module, &record.generics);
            }
        }
        for method in &mut record.methods {
            self.qualify_method(method, &record.module, &record.generics);
        }
    }

    fn qualify_method(&self, method: &mut HandlerMethod, module: &[String], outer: &[String]) {
        let generics = [outer, method.generics.as_slice()].concat();
        for param in &mut method.params {
            self.qualify(&mut param.ty, module, &generics);
        }
        if let Some(output) = &mut method.output {
            self.qualify(output, module, &generics);
        }
    }

    fn qualify(&self, ty: &mut TypeRef, module: &[String], generics: &[String]) {
        match ty {
            TypeRef::Named { name, args } => {
                let in_scope = name.as_str() == "Self" || generics.iter().any(|g| g == name.as_str());
                if !in_scope {
                    let path: Vec<String> = name.split("::").map(str::to_string).collect();
                    if let Some(resolved) = self.declared_path(&path, module) {
                        *name = resolved;
                    } else if let Some(last) = path.last() {
                        *name = last.clone();
                    }
                }
                for arg in args {
                    self.qualify(arg, module, generics);
                }
            }
            TypeRef::Tuple(elems) => {
                for elem in elems {
                    self.qualify(elem, module, generics);
                }
            }
            TypeRef::Slice(elem) => self.qualify(elem, module, generics),
            TypeRef::Opaque(_) => {}
        }
    }

    /// Qualified name of the declared type `path` denotes inside `module`.
    fn declared_path(&self, path: &[String], module: &[String]) -> Option<String> {
        let imports = self.imports.get(module);
        let (first, rest) = path.split_first()?;
        let imported = imports.and_then(|i| i.names.get(first));

        if rest.is_empty() {
            let local = qualify(module, first);
            if self.declared.contains(&local) {
                return Some(local);
            }
            if let Some(targets) = imported {
                return targets
                    .iter()
                    .map(|t| t.join("::"))
                    .find(|q| self.declared.contains(q));
            }
            // Two globs offering the name leave it unresolved.
            let globbed: BTreeSet<String> = imports
                .map(|i| i.globs.as_slice())
                .unwrap_or_default()
                .iter()
                .map(|glob| qualify(glob, first))
                .filter(|q| self.declared.contains(q))
                .collect();
            return match globbed.len() {
                1 => globbed.into_iter().next(),
                _ => None,
            };
        }

        let mut candidates = anchored(module, path);
        if let Some(targets) = imported {
            candidates.extend(targets.iter().map(|t| [t.as_slice(), rest].concat()));
        }
        candidates
            .into_iter()
            .map(|c| c.join("::"))
            .find(|q| self.declared.contains(q))
    }
}

impl<'ast> Visit<'ast> for Collector {
    fn visit_item_struct(&mut self, item: &'ast syn::ItemStruct) {
        let name = item.ident.unraw().to_string();
        let kind = match &item.fields {
            Fields::Named(named) => TypeDeclKind::Struct(
                named
                    .named
                    .iter()
                    .filter_map(|field| {
                        Some(FieldDecl {
                            name: field.ident.as_ref()?.unraw().to_string(),
                            ty: type_ref(&field.ty),
                            annotations: annotations(&field.attrs),
                        })
                    })
                    .collect(),
            ),
            Fields::Unnamed(unnamed) if unnamed.unnamed.len() == 1 => {
                TypeDeclKind::Alias(type_ref(&unnamed.unnamed[0].ty))
            }
            Fields::Unnamed(_) => TypeDeclKind::Opaque,
            Fields::Unit => TypeDeclKind::Struct(Vec::new()),
        };
        let decl = TypeDecl {
            qualified_name: self.qualify(&name),
            name,
            generics: type_params(&item.generics),
            annotations: annotations(&item.attrs),
            kind,
        };
        self.add_type(decl);
    }

    fn visit_item_enum(&mut self, item: &'ast syn::ItemEnum) {
        let name = item.ident.unraw().to_string();
        let attrs = annotations(&item.attrs);
        let unit_only = item
            .variants
            .iter()
            .all(|v| matches!(v.fields, Fields::Unit));

        let kind = if unit_only {
            let repr = attrs
                .iter()
                .filter(|a| a.name == "repr")
                .flat_map(|a| a.flags())
                .find(|flag| is_integer_repr(flag))
                .map(str::to_string);
            TypeDeclKind::Enum(EnumDecl {
                repr,
                variants: item
                    .variants
                    .iter()
                    .map(|v| VariantDecl {
                        name: v.ident.unraw().to_string(),
                        discriminant: v.discriminant.as_ref().and_then(|(_, e)| int_expr(e)),
                        annotations: annotations(&v.attrs),
                    })
                    .collect(),
            })
        } else {
            TypeDeclKind::Opaque
        };

        let decl = TypeDecl {
            qualified_name: self.qualify(&name),
            name,
            generics: type_params(&item.generics),
            annotations: attrs,
            kind,
        };
        self.add_type(decl);
    }

    fn visit_item_type(&mut self, item: &'ast syn::ItemType) {
        let name = item.ident.unraw().to_string();
        let decl = TypeDecl {
            qualified_name: self.qualify(&name),
            name,
            generics: type_params(&item.generics),
            annotations: annotations(&item.attrs),
            kind: TypeDeclKind::Alias(type_ref(&item.ty)),
        };
        self.add_type(decl);
    }

    fn visit_item_trait(&mut self, item: &'ast syn::ItemTrait) {
        let methods = item
            .items
            .iter()
            .filter_map(|it| match it {
                syn::TraitItem::Fn(f) => Some(handler_method(&f.attrs, &f.sig)),
                _ => None,
            })
            .collect();

        let name = item.ident.unraw().to_string();
        if self.traits.contains_key(&name) {
            debug!("Trait {} already declared, ignoring {}", name, self.qualify(&name));
            return;
        }
        self.traits.insert(
            name,
            TraitRecord {
                module: self.module.clone(),
                generics: type_params(&item.generics),
                methods,
            },
        );
    }

    fn visit_item_impl(&mut self, item: &'ast syn::ItemImpl) {
        let self_ty = type_ref(&item.self_ty);
        if self_ty.name().is_none() {
            return;
        }

        let methods = item
            .items
            .iter()
            .filter_map(|it| match it {
                syn::ImplItem::Fn(f) => Some(handler_method(&f.attrs, &f.sig)),
                _ => None,
            })
            .collect();

        let trait_ref = item.trait_.as_ref().and_then(|(_, path, _)| {
            let segment = path.segments.last()?;
            Some(TypeRef::generic(
                segment.ident.to_string(),
                angle_args(&segment.arguments),
            ))
        });

        self.pending.push(Pending::Impl(ImplRecord {
            self_ty,
            module: self.module.clone(),
            generics: type_params(&item.generics),
            source: self.file.clone(),
            trait_ref,
            annotations: annotations(&item.attrs),
            methods,
        }));
    }

    fn visit_item_fn(&mut self, item: &'ast syn::ItemFn) {
        // Bodies are not descended into.
        self.add_function(handler_method(&item.attrs, &item.sig));
    }

    fn visit_item_mod(&mut self, item: &'ast syn::ItemMod) {
        let name = item.ident.unraw().to_string();
        let mut path = self.module.clone();
        path.push(name);

        let Some((_, items)) = &item.content else {
            self.declared_modules.insert(path, annotations(&item.attrs));
            return;
        };

        let parent = std::mem::replace(&mut self.module, path);
        self.module_annotations.push(annotations(&item.attrs));
        for nested in items {
            self.visit_item(nested);
        }
        self.module_annotations.pop();
        self.module = parent;
    }

    fn visit_item_use(&mut self, item: &'ast syn::ItemUse) {
        self.add_import(&item.tree, &mut Vec::new());
    }

    fn visit_item_const(&mut self, _: &'ast syn::ItemConst) {}

    fn visit_item_static(&mut self, _: &'ast syn::ItemStatic) {}
}

fn qualify(module: &[String], name: &str) -> String {
    if module.is_empty() {
        name.to_string()
    } else {
        format!("{}::{}", module.join("::"), name)
    }
}

/// Absolute module paths a path written inside `module` may stand for.
/// `crate::`, `self::` and `super::` fix the answer; a bare path is tried
/// relative to `module` first, then from the crate root.
fn anchored(module: &[String], path: &[String]) -> Vec<Vec<String>> {
    let Some((first, rest)) = path.split_first() else {
        return vec![module.to_vec()];
    };
    match first.as_str() {
        "crate" => vec![rest.to_vec()],
        "self" => vec![[module, rest].concat()],
        "super" => {
            let mut base = module.to_vec();
            base.pop();
            let mut rest = rest;
            while let Some((next, tail)) = rest.split_first() {
                if next != "super" {
                    break;
                }
                base.pop();
                rest = tail;
            }
            vec![[base.as_slice(), rest].concat()]
        }
        _ => vec![[module, path].concat(), path.to_vec()],
    }
}

fn impl_group(
    id: usize,
    record: ImplRecord,
    types: &HashMap<String, TypeDecl>,
    traits: &HashMap<String, TraitRecord>,
) -> HandlerGroup {
    let written = record.self_ty.name().unwrap_or_default();
    let decl = types.get(written);
    let name = written.rsplit("::").next().unwrap_or(written).to_string();
    let qualified_name = decl
        .map(|d| d.qualified_name.clone())
        .unwrap_or_else(|| qualify(&record.module, &name));

    let mut group_annotations = decl.map(|d| d.annotations.clone()).unwrap_or_default();
    merge_annotations(&mut group_annotations, record.annotations);

    let mut bindings = Vec::new();
    let mut methods = record.methods;
    if let Some(trait_ref) = &record.trait_ref {
        match trait_ref.name().and_then(|n| traits.get(n)) {
            Some(declared) => {
                bindings = declared
                    .generics
                    .iter()
                    .cloned()
                    .zip(trait_ref.args().iter().cloned())
                    .collect();
                methods = inherit_methods(&declared.methods, methods);
            }
            None => debug!("Trait {} of {} is not declared in the sources", trait_ref, name),
        }
    }

    for method in &mut methods {
        replace_self(method, &record.self_ty);
    }

    HandlerGroup {
        id,
        name,
        qualified_name,
        source: record.source,
        annotations: group_annotations,
        bindings,
        methods,
    }
}

fn module_group(
    id: usize,
    record: ModuleRecord,
    declared_modules: &HashMap<Vec<String>, Vec<Annotation>>,
) -> HandlerGroup {
    let name = match record.module.last() {
        Some(name) => name.clone(),
        None => record
            .source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default(),
    };
    let qualified_name = if record.module.is_empty() {
        name.clone()
    } else {
        record.module.join("::")
    };

    let mut group_annotations = declared_modules
        .get(&record.module)
        .cloned()
        .unwrap_or_default();
    merge_annotations(&mut group_annotations, record.annotations);

    HandlerGroup {
        id,
        name,
        qualified_name,
        source: record.source,
        annotations: group_annotations,
        bindings: Vec::new(),
        methods: record.functions,
    }
}

/// Adds `overrides` to `base`; an annotation in `overrides` replaces every
/// annotation of the same name in `base`.
fn merge_annotations(base: &mut Vec<Annotation>, overrides: Vec<Annotation>) {
    if overrides.is_empty() {
        return;
    }
    base.retain(|a| !overrides.iter().any(|o| o.name == a.name));
    base.extend(overrides);
}

/// Trait methods in trait order, overridden by the impl's own definitions;
/// impl-only methods follow.
fn inherit_methods(declared: &[HandlerMethod], own: Vec<HandlerMethod>) -> Vec<HandlerMethod> {
    let mut own: Vec<Option<HandlerMethod>> = own.into_iter().map(Some).collect();
    let mut methods = Vec::with_capacity(declared.len() + own.len());

    for trait_method in declared {
        let overriding = own
            .iter_mut()
            .find(|m| m.as_ref().is_some_and(|m| m.name == trait_method.name))
            .and_then(Option::take);
        match overriding {
            Some(mut method) => {
                let mut merged = trait_method.annotations.clone();
                merge_annotations(&mut merged, method.annotations);
                method.annotations = merged;
                methods.push(method);
            }
            None => methods.push(trait_method.clone()),
        }
    }

    methods.extend(own.into_iter().flatten());
    methods
}

fn replace_self(method: &mut HandlerMethod, self_ty: &TypeRef) {
    for param in &mut method.params {
        substitute_self(&mut param.ty, self_ty);
    }
    if let Some(output) = &mut method.output {
        substitute_self(output, self_ty);
    }
}

fn substitute_self(ty: &mut TypeRef, self_ty: &TypeRef) {
    match ty {
        TypeRef::Named { name, args } if name == "Self" && args.is_empty() => {
            *ty = self_ty.clone();
        }
        TypeRef::Named { args, .. } | TypeRef::Tuple(args) => {
            for arg in args {
                substitute_self(arg, self_ty);
            }
        }
        TypeRef::Slice(elem) => substitute_self(elem, self_ty),
        TypeRef::Opaque(_) => {}
    }
}

fn handler_method(attrs: &[Attribute], sig: &Signature) -> HandlerMethod {
    let params = sig
        .inputs
        .iter()
        .filter_map(|arg| match arg {
            FnArg::Receiver(_) => None,
            FnArg::Typed(pat_type) => {
                let mut names = Vec::new();
                bound_names(&pat_type.pat, &mut names);
                Some(ParamDecl {
                    names,
                    ty: type_ref(&pat_type.ty),
                    annotations: annotations(&pat_type.attrs),
                })
            }
        })
        .collect();

    HandlerMethod {
        name: sig.ident.unraw().to_string(),
        generics: type_params(&sig.generics),
        annotations: annotations(attrs),
        params,
        output: match &sig.output {
            ReturnType::Default => None,
            ReturnType::Type(_, ty) => Some(type_ref(ty)),
        },
    }
}

fn bound_names(pat: &Pat, names: &mut Vec<String>) {
    match pat {
        Pat::Ident(ident) => names.push(ident.ident.unraw().to_string()),
        Pat::TupleStruct(tuple) => tuple.elems.iter().for_each(|p| bound_names(p, names)),
        Pat::Tuple(tuple) => tuple.elems.iter().for_each(|p| bound_names(p, names)),
        Pat::Struct(s) => s.fields.iter().for_each(|f| bound_names(&f.pat, names)),
        Pat::Reference(r) => bound_names(&r.pat, names),
        Pat::Paren(p) => bound_names(&p.pat, names),
        Pat::Type(t) => bound_names(&t.pat, names),
        _ => {}
    }
}

fn type_params(generics: &syn::Generics) -> Vec<String> {
    generics.type_params().map(|p| p.ident.to_string()).collect()
}

fn is_integer_repr(flag: &str) -> bool {
    matches!(
        flag,
        "i8" | "i16" | "i32" | "i64" | "i128" | "isize" | "u8" | "u16" | "u32" | "u64" | "u128" | "usize"
    )
}

fn type_ref(ty: &Type) -> TypeRef {
    match ty {
        Type::Path(type_path) => match type_path.path.segments.last() {
            Some(segment) => {
                TypeRef::generic(path_string(&type_path.path), angle_args(&segment.arguments))
            }
            None => TypeRef::Opaque("_".to_string()),
        },
        Type::Reference(r) => type_ref(&r.elem),
        Type::Paren(p) => type_ref(&p.elem),
        Type::Group(g) => type_ref(&g.elem),
        Type::Ptr(p) => type_ref(&p.elem),
        Type::Tuple(tuple) => TypeRef::Tuple(tuple.elems.iter().map(type_ref).collect()),
        Type::Array(array) => TypeRef::Slice(Box::new(type_ref(&array.elem))),
        Type::Slice(slice) => TypeRef::Slice(Box::new(type_ref(&slice.elem))),
        Type::ImplTrait(it) => TypeRef::Opaque(first_bound(&it.bounds)),
        Type::TraitObject(obj) => TypeRef::Opaque(first_bound(&obj.bounds)),
        _ => TypeRef::Opaque("_".to_string()),
    }
}

fn angle_args(arguments: &PathArguments) -> Vec<TypeRef> {
    match arguments {
        PathArguments::AngleBracketed(angle) => angle
            .args
            .iter()
            .filter_map(|arg| match arg {
                GenericArgument::Type(ty) => Some(type_ref(ty)),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn first_bound(bounds: &Punctuated<TypeParamBound, Token![+]>) -> String {
    bounds
        .iter()
        .find_map(|bound| match bound {
            TypeParamBound::Trait(t) => t.path.segments.last().map(|s| s.ident.to_string()),
            _ => None,
        })
        .unwrap_or_else(|| "_".to_string())
}

fn annotations(attrs: &[Attribute]) -> Vec<Annotation> {
    attrs.iter().filter_map(annotation).collect()
}

fn annotation(attr: &Attribute) -> Option<Annotation> {
    let name = attr.path().segments.last()?.ident.to_string();
    let mut annotation = Annotation::new(name);

    match &attr.meta {
        Meta::Path(_) => {}
        Meta::NameValue(nv) => {
            if let Some(lit) = literal(&nv.value) {
                annotation.args.push(AnnotationArg::Positional(lit));
            }
        }
        Meta::List(list) => {
            match list.parse_args_with(Punctuated::<Expr, Token![,]>::parse_terminated) {
                Ok(args) => annotation.args.extend(args.iter().filter_map(annotation_arg)),
                Err(e) => debug!("Ignoring arguments of #[{}]: {}", annotation.name, e),
            }
        }
    }

    Some(annotation)
}

fn annotation_arg(expr: &Expr) -> Option<AnnotationArg> {
    match expr {
        Expr::Assign(assign) => {
            let Expr::Path(key) = assign.left.as_ref() else {
                return None;
            };
            let key = key.path.segments.last()?.ident.to_string();
            let value = match assign.right.as_ref() {
                Expr::Path(path) => Literal::Str(path_string(&path.path)),
                other => literal(other)?,
            };
            Some(AnnotationArg::Named(key, value))
        }
        Expr::Path(path) => Some(AnnotationArg::Flag(path.path.segments.last()?.ident.to_string())),
        other => literal(other).map(AnnotationArg::Positional),
    }
}

fn literal(expr: &Expr) -> Option<Literal> {
    match expr {
        Expr::Lit(lit) => match &lit.lit {
            Lit::Str(s) => Some(Literal::Str(s.value())),
            Lit::Int(i) => i.base10_parse().ok().map(Literal::Int),
            Lit::Bool(b) => Some(Literal::Bool(b.value)),
            _ => None,
        },
        Expr::Unary(unary) if matches!(unary.op, UnOp::Neg(_)) => match literal(&unary.expr)? {
            Literal::Int(i) => Some(Literal::Int(-i)),
            _ => None,
        },
        Expr::Group(group) => literal(&group.expr),
        Expr::Paren(paren) => literal(&paren.expr),
        _ => None,
    }
}

fn int_expr(expr: &Expr) -> Option<i64> {
    match literal(expr)? {
        Literal::Int(i) => Some(i),
        _ => None,
    }
}

fn path_string(path: &syn::Path) -> String {
    path.segments
        .iter()
        .map(|s| s.ident.to_string())
        .collect::<Vec<_>>()
        .join("::")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::introspect::find_annotation;
    use std::fs;
    use tempfile::TempDir;

    fn index(sources: &[(&str, &str)]) -> SourceIndex {
        SourceIndex::from_sources(sources).unwrap()
    }

    #[test]
    fn test_struct_fields_and_attributes() {
        let index = index(&[(
            "models.rs",
            r#"
            /// A bank account.
            #[derive(Serialize)]
            #[serde(rename_all = "camelCase")]
            pub struct Account {
                pub id: u64,
                #[serde(rename = "holder", skip_serializing_if = "Option::is_none")]
                pub owner_name: Option<String>,
                pub r#type: AccountKind,
            }
            "#,
        )]);

        let decl = index.type_decl("Account").unwrap();
        assert_eq!(decl.qualified_name, "models::Account");
        let TypeDeclKind::Struct(fields) = &decl.kind else {
            panic!("expected a struct");
        };
        let names: Vec<_> = fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["id", "owner_name", "type"]);
        assert_eq!(fields[1].ty.to_string(), "Option<String>");

        let serde = find_annotation(&fields[1].annotations, "serde").unwrap();
        assert_eq!(serde.named("rename").and_then(Literal::as_str), Some("holder"));
        assert_eq!(
            serde.named("skip_serializing_if").and_then(Literal::as_str),
            Some("Option::is_none")
        );

        let container = find_annotation(&decl.annotations, "serde").unwrap();
        assert_eq!(
            container.named("rename_all").and_then(Literal::as_str),
            Some("camelCase")
        );
        assert!(find_annotation(&decl.annotations, "doc").is_some());
    }

    #[test]
    fn test_enum_and_alias_kinds() {
        let index = index(&[(
            "types.rs",
            r#"
            #[repr(u8)]
            pub enum Level { Low = 1, High = -2 }
            pub enum Shape { Circle(f64), Square }
            pub struct AccountId(u64);
            pub struct Pair(u64, u64);
            pub type Accounts<T> = Vec<T>;
            "#,
        )]);

        let TypeDeclKind::Enum(level) = &index.type_decl("Level").unwrap().kind else {
            panic!("expected an enum");
        };
        assert_eq!(level.repr.as_deref(), Some("u8"));
        let discriminants: Vec<_> = level.variants.iter().map(|v| v.discriminant).collect();
        assert_eq!(discriminants, vec![Some(1), Some(-2)]);

        assert!(matches!(index.type_decl("Shape").unwrap().kind, TypeDeclKind::Opaque));
        assert!(matches!(index.type_decl("Pair").unwrap().kind, TypeDeclKind::Opaque));
        assert!(matches!(
            &index.type_decl("AccountId").unwrap().kind,
            TypeDeclKind::Alias(TypeRef::Named { name, .. }) if name == "u64"
        ));

        let alias = index.type_decl("Accounts").unwrap();
        assert_eq!(alias.generics, vec!["T"]);
        assert!(matches!(&alias.kind, TypeDeclKind::Alias(t) if t.to_string() == "Vec<T>"));
    }

    #[test]
    fn test_same_name_in_two_modules_resolves_at_use_site() {
        let index = index(&[
            ("billing.rs", "pub struct Account { pub iban: String }"),
            (
                "crm.rs",
                r#"
                pub struct Account { pub email: String }
                pub struct Contact { pub account: Account }
                #[get("/accounts")]
                pub async fn list() -> Json<Account> { todo!() }
                "#,
            ),
            (
                "reports.rs",
                r#"
                use crate::billing::Account;
                use super::crm::Contact as Person;
                pub struct Statement { pub account: Account, pub owner: Person, pub other: crm::Account }
                pub struct Loose { pub account: Account2 }
                "#,
            ),
            ("z_unscoped.rs", "pub struct Audit { pub account: Account }"),
        ]);

        assert!(matches!(
            index.lookup_type("Account"),
            TypeLookup::Ambiguous(c) if c == vec!["billing::Account", "crm::Account"]
        ));
        assert_eq!(index.type_decl("crm::Account").unwrap().qualified_name, "crm::Account");
        assert!(index.type_decl("Contact").is_some());

        let list = &index.handler_groups("crm").unwrap()[0].methods[0];
        assert_eq!(list.output.as_ref().unwrap().to_string(), "Json<crm::Account>");

        let field_types = |name: &str| -> Vec<String> {
            let TypeDeclKind::Struct(fields) = &index.type_decl(name).unwrap().kind else {
                panic!("expected a struct");
            };
            fields.iter().map(|f| f.ty.to_string()).collect()
        };
        assert_eq!(field_types("Contact"), vec!["crm::Account"]);
        assert_eq!(
            field_types("Statement"),
            vec!["billing::Account", "crm::Contact", "crm::Account"]
        );
        assert_eq!(field_types("Loose"), vec!["Account2"]);
        // Nothing in scope picks one of the two.
        assert_eq!(field_types("Audit"), vec!["Account"]);
    }

    #[test]
    fn test_glob_imports_and_parent_modules() {
        let index = index(&[
            ("models.rs", "pub struct Order { pub id: u64 } pub struct Line { pub sku: String }"),
            (
                "shop.rs",
                r#"
                use crate::models::*;
                pub mod admin {
                    use super::super::models::Line;
                    pub struct Report { pub order: crate::models::Order, pub line: Line }
                }
                pub struct Cart { pub order: Order, pub lines: Vec<Line> }
                "#,
            ),
        ]);

        let TypeDeclKind::Struct(cart) = &index.type_decl("Cart").unwrap().kind else {
            panic!("expected a struct");
        };
        assert_eq!(cart[0].ty.to_string(), "models::Order");
        assert_eq!(cart[1].ty.to_string(), "Vec<models::Line>");

        let report = index.type_decl("Report").unwrap();
        assert_eq!(report.qualified_name, "shop::admin::Report");
        let TypeDeclKind::Struct(fields) = &report.kind else {
            panic!("expected a struct");
        };
        let names: Vec<_> = fields.iter().map(|f| f.ty.to_string()).collect();
        assert_eq!(names, vec!["models::Order", "models::Line"]);
    }

    #[test]
    fn test_handler_params_and_route_annotations() {
        let index = index(&[(
            "accounts.rs",
            r#"
            #[get("/accounts/{id}", produces = "application/json")]
            async fn get_account(Path((id, version)): Path<(u64, u32)>, _: HttpRequest) -> Json<Account> {
                struct Hidden;
                todo!()
            }

            #[route("/accounts", method = "GET", method = "HEAD")]
            async fn list(#[query] limit: Option<u32>) {}
            "#,
        )]);

        let groups = index.groups();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].name, "accounts");
        assert!(index.type_decl("Hidden").is_none());

        let get = &groups[0].methods[0];
        assert_eq!(get.name, "get_account");
        assert_eq!(get.params[0].names, vec!["id", "version"]);
        assert_eq!(get.params[0].ty.to_string(), "Path<(u64, u32)>");
        assert!(get.params[1].names.is_empty());
        assert_eq!(get.output.as_ref().unwrap().to_string(), "Json<Account>");
        let route = find_annotation(&get.annotations, "get").unwrap();
        assert_eq!(route.first_str(), Some("/accounts/{id}"));
        assert_eq!(route.named("produces").and_then(Literal::as_str), Some("application/json"));

        let list = &groups[0].methods[1];
        assert!(list.output.is_none());
        assert!(find_annotation(&list.params[0].annotations, "query").is_some());
    }

    #[test]
    fn test_trait_impl_inherits_methods_and_bindings() {
        let index = index(&[
            (
                "api.rs",
                r#"
                pub trait CrudApi<T> {
                    #[get("/{id}")]
                    fn get(&self, id: u64) -> Json<T>;
                    #[delete("/{id}")]
                    fn delete(&self, id: u64) {}
                }
                "#,
            ),
            (
                "accounts.rs",
                r#"
                /// Accounts.
                #[scope("/accounts")]
                pub struct AccountController;

                #[tag("Bank accounts")]
                impl CrudApi<Account> for AccountController {
                    /// Fetch one.
                    fn get(&self, id: u64) -> Json<Account> { todo!() }
                }

                impl AccountController {
                    #[post("")]
                    fn create(&self, body: Json<Self>) {}
                }
                "#,
            ),
        ]);

        let groups = index.handler_groups("accounts").unwrap();
        assert_eq!(groups.len(), 2);

        let crud = groups[0];
        assert_eq!(crud.name, "AccountController");
        assert_eq!(crud.qualified_name, "accounts::AccountController");
        assert_eq!(crud.bindings, vec![("T".to_string(), TypeRef::named("Account"))]);
        assert!(find_annotation(&crud.annotations, "scope").is_some());
        assert!(find_annotation(&crud.annotations, "tag").is_some());

        let names: Vec<_> = crud.methods.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["get", "delete"]);
        assert!(find_annotation(&crud.methods[0].annotations, "get").is_some());
        assert!(find_annotation(&crud.methods[0].annotations, "doc").is_some());

        let inherent = groups[1];
        assert!(inherent.bindings.is_empty());
        assert_eq!(
            inherent.methods[0].params[0].ty.to_string(),
            "Json<accounts::AccountController>"
        );
    }

    #[test]
    fn test_inline_modules_and_inner_attributes() {
        let index = index(&[(
            "routes.rs",
            r#"
            #[scope("/orders")]
            pub mod orders {
                //! Order endpoints.
                #[get("")]
                pub async fn list() {}
            }
            "#,
        )]);

        let group = &index.groups()[0];
        assert_eq!(group.name, "orders");
        assert_eq!(group.qualified_name, "routes::orders");
        assert!(find_annotation(&group.annotations, "scope").is_some());
        assert!(find_annotation(&group.annotations, "doc").is_some());
    }

    #[test]
    fn test_module_locations() {
        let index = index(&[
            ("accounts.rs", "#[get(\"/a\")] fn a() {}"),
            ("orders.rs", "pub struct OrderController; impl OrderController { fn o(&self) {} }"),
        ]);

        assert_eq!(index.handler_groups("crate::accounts").unwrap().len(), 1);
        assert_eq!(index.handler_groups("orders::OrderController").unwrap().len(), 1);
        assert!(matches!(
            index.handler_groups("billing"),
            Err(Error::UnknownLocation(l)) if l == "billing"
        ));
        assert!(matches!(
            index.handler_groups("  "),
            Err(Error::InvalidLocation(_))
        ));
    }

    #[test]
    fn test_load_from_disk_with_path_locations() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("src/routes")).unwrap();
        fs::write(root.join("src/lib.rs"), "pub mod routes;").unwrap();
        fs::write(
            root.join("src/routes/mod.rs"),
            "#[scope(\"/api\")] pub mod accounts;",
        )
        .unwrap();
        fs::write(
            root.join("src/routes/accounts.rs"),
            "#[get(\"/accounts\")] pub async fn list() {}",
        )
        .unwrap();
        fs::write(root.join("src/broken.rs"), "fn broken( {").unwrap();

        let index = SourceIndex::load(root).unwrap();

        let by_dir = index.handler_groups("src/routes").unwrap();
        assert_eq!(by_dir.len(), 1);
        assert_eq!(by_dir[0].qualified_name, "routes::accounts");
        assert!(find_annotation(&by_dir[0].annotations, "scope").is_some());

        let by_file = index.handler_groups("src/routes/accounts.rs").unwrap();
        assert_eq!(by_file[0].id, by_dir[0].id);
        assert_eq!(index.handler_groups("routes").unwrap().len(), 1);
    }

    #[test]
    fn test_load_missing_root() {
        let temp_dir = TempDir::new().unwrap();
        let result = SourceIndex::load(&temp_dir.path().join("nope"));
        assert!(matches!(result, Err(Error::Unreadable { .. })));
    }
}
