//! Serde attributes that change the serialized shape of a type.
//!
//! Only the subset with an effect on the schema is read: renaming, skipping,
//! flattening and defaults. Attributes arrive as [`Annotation`]s, so several
//! `#[serde(...)]` lists on one item are simply combined.

use crate::introspect::{Annotation, AnnotationArg, Literal};
use log::debug;

/// Serde attributes of a struct field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SerdeAttributes {
    pub rename: Option<String>,
    /// `skip` or `skip_serializing`.
    pub skip: bool,
    pub flatten: bool,
    /// `default` or `default = "path"`.
    pub default: bool,
}

/// Serde attributes of a struct or enum.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerAttributes {
    pub rename_all: RenameRule,
    pub default: bool,
}

/// Case conversion of `#[serde(rename_all = "...")]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RenameRule {
    #[default]
    None,
    LowerCase,
    UpperCase,
    PascalCase,
    CamelCase,
    SnakeCase,
    ScreamingSnakeCase,
    KebabCase,
    ScreamingKebabCase,
}

impl RenameRule {
    pub fn parse(rule: &str) -> Option<Self> {
        Some(match rule {
            "lowercase" => RenameRule::LowerCase,
            "UPPERCASE" => RenameRule::UpperCase,
            "PascalCase" => RenameRule::PascalCase,
            "camelCase" => RenameRule::CamelCase,
            "snake_case" => RenameRule::SnakeCase,
            "SCREAMING_SNAKE_CASE" => RenameRule::ScreamingSnakeCase,
            "kebab-case" => RenameRule::KebabCase,
            "SCREAMING-KEBAB-CASE" => RenameRule::ScreamingKebabCase,
            _ => return None,
        })
    }

    /// Renames a `snake_case` field identifier.
    pub fn apply_to_field(&self, field: &str) -> String {
        match self {
            RenameRule::None | RenameRule::LowerCase | RenameRule::SnakeCase => field.to_string(),
            RenameRule::UpperCase | RenameRule::ScreamingSnakeCase => field.to_ascii_uppercase(),
            RenameRule::PascalCase => {
                let mut pascal = String::with_capacity(field.len());
                let mut capitalize = true;
                for ch in field.chars() {
                    if ch == '_' {
                        capitalize = true;
                    } else if capitalize {
                        pascal.push(ch.to_ascii_uppercase());
                        capitalize = false;
                    } else {
                        pascal.push(ch);
                    }
                }
                pascal
            }
            RenameRule::CamelCase => lower_first(&RenameRule::PascalCase.apply_to_field(field)),
            RenameRule::KebabCase => field.replace('_', "-"),
            RenameRule::ScreamingKebabCase => field.to_ascii_uppercase().replace('_', "-"),
        }
    }

    /// Renames a `PascalCase` variant identifier.
    pub fn apply_to_variant(&self, variant: &str) -> String {
        match self {
            RenameRule::None | RenameRule::PascalCase => variant.to_string(),
            RenameRule::LowerCase => variant.to_ascii_lowercase(),
            RenameRule::UpperCase => variant.to_ascii_uppercase(),
            RenameRule::CamelCase => lower_first(variant),
            RenameRule::SnakeCase => {
                let mut snake = String::with_capacity(variant.len() + 4);
                for (i, ch) in variant.char_indices() {
                    if i > 0 && ch.is_uppercase() {
                        snake.push('_');
                    }
                    snake.push(ch.to_ascii_lowercase());
                }
                snake
            }
            RenameRule::ScreamingSnakeCase => RenameRule::SnakeCase
                .apply_to_variant(variant)
                .to_ascii_uppercase(),
            RenameRule::KebabCase => RenameRule::SnakeCase
                .apply_to_variant(variant)
                .replace('_', "-"),
            RenameRule::ScreamingKebabCase => RenameRule::ScreamingSnakeCase
                .apply_to_variant(variant)
                .replace('_', "-"),
        }
    }
}

fn lower_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_ascii_lowercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

fn serde_args(annotations: &[Annotation]) -> impl Iterator<Item = &AnnotationArg> {
    annotations
        .iter()
        .filter(|a| a.name == "serde")
        .flat_map(|a| a.args.iter())
}

/// Field-level attributes. Variants use the same keys.
pub fn field_attributes(annotations: &[Annotation]) -> SerdeAttributes {
    let mut attrs = SerdeAttributes::default();

    for arg in serde_args(annotations) {
        match arg {
            AnnotationArg::Named(key, Literal::Str(value)) if key == "rename" => {
                attrs.rename = Some(value.clone());
            }
            AnnotationArg::Named(key, _) if key == "default" => attrs.default = true,
            AnnotationArg::Flag(flag) => match flag.as_str() {
                "skip" | "skip_serializing" => attrs.skip = true,
                "flatten" => attrs.flatten = true,
                "default" => attrs.default = true,
                _ => {}
            },
            _ => {}
        }
    }

    attrs
}

pub fn container_attributes(annotations: &[Annotation]) -> ContainerAttributes {
    let mut attrs = ContainerAttributes::default();

    for arg in serde_args(annotations) {
        match arg {
            AnnotationArg::Named(key, Literal::Str(value)) if key == "rename_all" => {
                match RenameRule::parse(value) {
                    Some(rule) => attrs.rename_all = rule,
                    None => debug!("Ignoring unknown rename_all rule {:?}", value),
                }
            }
            AnnotationArg::Named(key, _) if key == "default" => attrs.default = true,
            AnnotationArg::Flag(flag) if flag == "default" => attrs.default = true,
            _ => {}
        }
    }

    attrs
}
