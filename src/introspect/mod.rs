//! Type-introspection capability.
//!
//! The model builder never looks at syntax trees directly. It asks a
//! [`TypeIntrospector`] for declared types and handler groups, described with
//! the neutral types of this module (type references, annotations, fields,
//! methods). [`source::SourceIndex`] implements the capability on top of `syn`
//! by statically analysing a project's source tree.

pub mod docs;
pub mod source;

use crate::error::Result;
use std::fmt;
use std::path::PathBuf;

pub use docs::{DocComments, DocumentationProvider, SourceElement};
pub use source::SourceIndex;

/// Query interface the model builder depends on.
pub trait TypeIntrospector {
    /// Looks up a declared type by qualified name, or by simple name when
    /// exactly one type carries it.
    fn lookup_type(&self, name: &str) -> TypeLookup<'_>;

    fn type_decl(&self, name: &str) -> Option<&TypeDecl> {
        match self.lookup_type(name) {
            TypeLookup::Found(decl) => Some(decl),
            TypeLookup::Ambiguous(_) | TypeLookup::Missing => None,
        }
    }

    /// Returns the handler groups selected by a location, in discovery order.
    ///
    /// A location is a file or directory relative to the project root, or a
    /// module path (`routes::accounts`, `crate::routes::accounts::AccountController`).
    /// A location matching nothing is an error.
    fn handler_groups(&self, location: &str) -> Result<Vec<&HandlerGroup>>;
}

/// Outcome of a type lookup.
#[derive(Debug)]
pub enum TypeLookup<'a> {
    Found(&'a TypeDecl),
    /// Several modules declare the simple name; qualified candidates in
    /// discovery order.
    Ambiguous(Vec<&'a str>),
    Missing,
}

/// A reference to a type as written at a use site.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeRef {
    /// A path type. Indexed sources name declared types by qualified name
    /// (`crm::Account`) and everything else by its last segment
    /// (`web::Json<T>` is `Json` with one argument).
    Named { name: String, args: Vec<TypeRef> },
    /// `(A, B)`; the unit type is the empty tuple.
    Tuple(Vec<TypeRef>),
    /// `[T; N]` and `[T]`.
    Slice(Box<TypeRef>),
    /// `impl Trait`, `dyn Trait` and anything else that has no structure to offer.
    Opaque(String),
}

impl TypeRef {
    pub fn named(name: impl Into<String>) -> Self {
        TypeRef::Named {
            name: name.into(),
            args: Vec::new(),
        }
    }

    pub fn generic(name: impl Into<String>, args: Vec<TypeRef>) -> Self {
        TypeRef::Named {
            name: name.into(),
            args,
        }
    }

    pub fn unit() -> Self {
        TypeRef::Tuple(Vec::new())
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            TypeRef::Named { name, .. } => Some(name),
            _ => None,
        }
    }

    pub fn args(&self) -> &[TypeRef] {
        match self {
            TypeRef::Named { args, .. } => args,
            _ => &[],
        }
    }

    pub fn first_arg(&self) -> Option<&TypeRef> {
        self.args().first()
    }

    /// `true` for `Option<T>`.
    pub fn is_option(&self) -> bool {
        self.name() == Some("Option") && self.args().len() == 1
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Named { name, args } => {
                write!(f, "{}", name)?;
                if !args.is_empty() {
                    write!(f, "<")?;
                    for (i, arg) in args.iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{}", arg)?;
                    }
                    write!(f, ">")?;
                }
                Ok(())
            }
            TypeRef::Tuple(elems) => {
                write!(f, "(")?;
                for (i, elem) in elems.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", elem)?;
                }
                write!(f, ")")
            }
            TypeRef::Slice(elem) => write!(f, "[{}]", elem),
            TypeRef::Opaque(name) => write!(f, "impl {}", name),
        }
    }
}

/// A literal value in an annotation argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Literal {
    Str(String),
    Int(i64),
    Bool(bool),
}

impl Literal {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Literal::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Literal::Int(i) => Some(*i),
            Literal::Str(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Literal::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnnotationArg {
    /// `#[get("/path")]`
    Positional(Literal),
    /// `#[route(method = "GET")]`
    Named(String, Literal),
    /// `#[serde(skip)]`, `#[repr(u8)]`
    Flag(String),
}

/// Metadata attached to a declaration: an attribute reduced to its last path
/// segment and its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    pub name: String,
    pub args: Vec<AnnotationArg>,
}

impl Annotation {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
        }
    }

    pub fn with_positional(mut self, value: Literal) -> Self {
        self.args.push(AnnotationArg::Positional(value));
        self
    }

    pub fn with_named(mut self, key: impl Into<String>, value: Literal) -> Self {
        self.args.push(AnnotationArg::Named(key.into(), value));
        self
    }

    pub fn with_flag(mut self, flag: impl Into<String>) -> Self {
        self.args.push(AnnotationArg::Flag(flag.into()));
        self
    }

    /// First positional string argument.
    pub fn first_str(&self) -> Option<&str> {
        self.args.iter().find_map(|arg| match arg {
            AnnotationArg::Positional(lit) => lit.as_str(),
            _ => None,
        })
    }

    /// First positional argument of any kind.
    pub fn first_positional(&self) -> Option<&Literal> {
        self.args.iter().find_map(|arg| match arg {
            AnnotationArg::Positional(lit) => Some(lit),
            _ => None,
        })
    }

    pub fn named(&self, key: &str) -> Option<&Literal> {
        self.args.iter().find_map(|arg| match arg {
            AnnotationArg::Named(k, lit) if k == key => Some(lit),
            _ => None,
        })
    }

    /// Every value given for `key`, in order (`method = "GET", method = "POST"`).
    pub fn named_all<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a Literal> + 'a {
        self.args.iter().filter_map(move |arg| match arg {
            AnnotationArg::Named(k, lit) if k == key => Some(lit),
            _ => None,
        })
    }

    pub fn flags(&self) -> impl Iterator<Item = &str> {
        self.args.iter().filter_map(|arg| match arg {
            AnnotationArg::Flag(f) => Some(f.as_str()),
            _ => None,
        })
    }
}

pub fn find_annotation<'a>(annotations: &'a [Annotation], name: &str) -> Option<&'a Annotation> {
    annotations.iter().find(|a| a.name == name)
}

pub fn has_annotation(annotations: &[Annotation], name: &str) -> bool {
    find_annotation(annotations, name).is_some()
}

/// A declared type.
#[derive(Debug, Clone)]
pub struct TypeDecl {
    pub name: String,
    /// `module::path::Name`; the identity of the type.
    pub qualified_name: String,
    /// Generic type parameter names in declaration order.
    pub generics: Vec<String>,
    pub annotations: Vec<Annotation>,
    pub kind: TypeDeclKind,
}

#[derive(Debug, Clone)]
pub enum TypeDeclKind {
    Struct(Vec<FieldDecl>),
    Enum(EnumDecl),
    /// `type A<T> = B<T>;` and single-field tuple structs.
    Alias(TypeRef),
    /// Tuple structs with several fields, data-carrying enums.
    Opaque,
}

#[derive(Debug, Clone)]
pub struct FieldDecl {
    pub name: String,
    pub ty: TypeRef,
    pub annotations: Vec<Annotation>,
}

#[derive(Debug, Clone)]
pub struct EnumDecl {
    /// Integer representation from `#[repr(..)]`, if any.
    pub repr: Option<String>,
    pub variants: Vec<VariantDecl>,
}

#[derive(Debug, Clone)]
pub struct VariantDecl {
    pub name: String,
    pub discriminant: Option<i64>,
    pub annotations: Vec<Annotation>,
}

/// A unit of route handlers: an `impl` block or the free functions of a module.
#[derive(Debug, Clone)]
pub struct HandlerGroup {
    /// Stable position of the group in the index.
    pub id: usize,
    /// Controller type identifier or module name.
    pub name: String,
    pub qualified_name: String,
    pub source: PathBuf,
    pub annotations: Vec<Annotation>,
    /// Generic bindings inherited from a generic trait (`T = Account`).
    pub bindings: Vec<(String, TypeRef)>,
    pub methods: Vec<HandlerMethod>,
}

#[derive(Debug, Clone)]
pub struct HandlerMethod {
    pub name: String,
    /// The method's own generic parameters.
    pub generics: Vec<String>,
    pub annotations: Vec<Annotation>,
    pub params: Vec<ParamDecl>,
    /// `None` when the signature has no `->`.
    pub output: Option<TypeRef>,
}

#[derive(Debug, Clone)]
pub struct ParamDecl {
    /// Identifiers bound by the pattern: `id` gives `[id]`,
    /// `Path((a, b))` gives `[a, b]`, `_` gives nothing.
    pub names: Vec<String>,
    pub ty: TypeRef,
    pub annotations: Vec<Annotation>,
}
