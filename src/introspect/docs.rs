//! Human-readable descriptions for source elements.

use super::{Annotation, FieldDecl, HandlerGroup, HandlerMethod, Literal, TypeDecl};

/// An element a description can be asked for.
#[derive(Debug, Clone, Copy)]
pub enum SourceElement<'a> {
    Group(&'a HandlerGroup),
    Method(&'a HandlerMethod),
    Type(&'a TypeDecl),
    Field(&'a FieldDecl),
}

impl<'a> SourceElement<'a> {
    pub fn annotations(&self) -> &'a [Annotation] {
        match self {
            SourceElement::Group(g) => &g.annotations,
            SourceElement::Method(m) => &m.annotations,
            SourceElement::Type(t) => &t.annotations,
            SourceElement::Field(f) => &f.annotations,
        }
    }
}

pub trait DocumentationProvider {
    fn describe(&self, element: SourceElement<'_>) -> Option<String>;
}

/// Reads `///` and `//!` comments, which reach the introspection model as
/// `doc` annotations.
#[derive(Debug, Default, Clone, Copy)]
pub struct DocComments;

impl DocumentationProvider for DocComments {
    fn describe(&self, element: SourceElement<'_>) -> Option<String> {
        let lines: Vec<&str> = element
            .annotations()
            .iter()
            .filter(|a| a.name == "doc")
            .filter_map(|a| a.first_positional().and_then(Literal::as_str))
            .map(|line| line.strip_prefix(' ').unwrap_or(line).trim_end())
            .collect();

        let text = lines.join("\n");
        let text = text.trim();
        if text.is_empty() {
            None
        } else {
            Some(text.to_string())
        }
    }
}
