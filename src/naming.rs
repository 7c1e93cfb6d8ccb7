//! Tag names and operation ids.
//!
//! Both follow the same precedence: a configured override, then the name
//! given explicitly in the source, then the configured strategy.

use crate::model::{Endpoint, Tag};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum NamingStrategy {
    /// The identifier used in the source: controller type, module or handler name.
    #[default]
    SourceIdentifier,
    /// Derived from the route path.
    PathSegments,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NamingConfig {
    pub strategy: NamingStrategy,
    pub overrides: BTreeMap<String, String>,
}

impl NamingConfig {
    pub fn new(strategy: NamingStrategy) -> Self {
        Self {
            strategy,
            overrides: BTreeMap::new(),
        }
    }

    pub fn with_override(mut self, source: impl Into<String>, name: impl Into<String>) -> Self {
        self.overrides.insert(source.into(), name.into());
        self
    }
}

/// Display name of a tag. Overrides are looked up by qualified name first,
/// then by default name.
pub fn tag_name(config: &NamingConfig, tag: &Tag) -> String {
    if let Some(name) = config
        .overrides
        .get(&tag.qualified_name)
        .or_else(|| config.overrides.get(&tag.default_name))
    {
        return name.clone();
    }
    if let Some(name) = &tag.name {
        return name.clone();
    }

    match config.strategy {
        NamingStrategy::SourceIdentifier => tag.default_name.clone(),
        NamingStrategy::PathSegments => {
            let segments: Vec<&str> = tag
                .base_path
                .as_deref()
                .unwrap_or("")
                .split('/')
                .filter(|s| !s.is_empty() && !is_variable(s))
                .collect();
            if segments.is_empty() {
                tag.default_name.clone()
            } else {
                segments.join("-")
            }
        }
    }
}

/// Operation id before de-duplication. Overrides are keyed by source name.
pub fn operation_name(config: &NamingConfig, endpoint: &Endpoint) -> String {
    if let Some(name) = config.overrides.get(&endpoint.source_name) {
        return name.clone();
    }
    if let Some(id) = &endpoint.operation_id {
        return id.clone();
    }

    match config.strategy {
        NamingStrategy::SourceIdentifier => endpoint.source_name.clone(),
        NamingStrategy::PathSegments => {
            let mut name = endpoint.method.canonical_name().to_string();
            for segment in endpoint.path.split('/').filter(|s| !s.is_empty()) {
                match segment.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
                    Some(var) => {
                        name.push_str("By");
                        name.push_str(&camel_word(var));
                    }
                    None => name.push_str(&camel_word(segment)),
                }
            }
            name
        }
    }
}

fn is_variable(segment: &str) -> bool {
    segment.starts_with('{') && segment.ends_with('}')
}

/// `order-items` and `order_items` both become `OrderItems`.
fn camel_word(segment: &str) -> String {
    segment
        .split(|c: char| c == '-' || c == '_' || c == '.')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{HttpMethod, Response};

    fn tag(name: Option<&str>, base_path: Option<&str>) -> Tag {
        Tag {
            name: name.map(str::to_string),
            default_name: "AccountController".to_string(),
            qualified_name: "api::AccountController".to_string(),
            base_path: base_path.map(str::to_string),
            description: None,
            endpoints: Vec::new(),
        }
    }

    fn endpoint(method: HttpMethod, path: &str, operation_id: Option<&str>) -> Endpoint {
        Endpoint {
            path: path.to_string(),
            method,
            source_name: "find_account".to_string(),
            operation_id: operation_id.map(str::to_string),
            parameters: Vec::new(),
            request_body: None,
            response: Response {
                status: 200,
                shape: None,
                format: None,
            },
            description: None,
            deprecated: false,
        }
    }

    #[test]
    fn test_tag_name_precedence() {
        let source = NamingConfig::default();
        assert_eq!(tag_name(&source, &tag(None, None)), "AccountController");
        assert_eq!(tag_name(&source, &tag(Some("Accounts"), None)), "Accounts");

        let by_default_name = NamingConfig::default().with_override("AccountController", "Comptes");
        assert_eq!(tag_name(&by_default_name, &tag(Some("Accounts"), None)), "Comptes");

        let both = by_default_name.with_override("api::AccountController", "Konten");
        assert_eq!(tag_name(&both, &tag(None, None)), "Konten");
    }

    #[test]
    fn test_tag_name_from_path_segments() {
        let config = NamingConfig::new(NamingStrategy::PathSegments);
        assert_eq!(
            tag_name(&config, &tag(None, Some("/api/{tenant}/accounts"))),
            "api-accounts"
        );
        assert_eq!(tag_name(&config, &tag(None, Some("/"))), "AccountController");
        assert_eq!(tag_name(&config, &tag(None, None)), "AccountController");
    }

    #[test]
    fn test_operation_name_precedence() {
        let source = NamingConfig::default();
        let get = endpoint(HttpMethod::Get, "/accounts/{id}", None);
        assert_eq!(operation_name(&source, &get), "find_account");

        let explicit = endpoint(HttpMethod::Get, "/accounts/{id}", Some("readAccount"));
        assert_eq!(operation_name(&source, &explicit), "readAccount");

        let overridden = NamingConfig::default().with_override("find_account", "lookup");
        assert_eq!(operation_name(&overridden, &explicit), "lookup");
    }

    #[test]
    fn test_operation_name_from_path_segments() {
        let config = NamingConfig::new(NamingStrategy::PathSegments);
        let cases = [
            (HttpMethod::Get, "/accounts/{id}", "getAccountsById"),
            (HttpMethod::Post, "/accounts", "postAccounts"),
            (HttpMethod::Delete, "/order-items/{item_id}", "deleteOrderItemsByItemId"),
            (HttpMethod::Get, "/", "get"),
        ];
        for (method, path, expected) in cases {
            assert_eq!(operation_name(&config, &endpoint(method, path, None)), expected);
        }
    }

    #[test]
    fn test_strategy_names() {
        let config: NamingConfig =
            serde_yaml::from_str("strategy: path-segments\noverrides:\n  find_account: lookup\n").unwrap();
        assert_eq!(config.strategy, NamingStrategy::PathSegments);
        assert_eq!(config.overrides["find_account"], "lookup");
    }
}
