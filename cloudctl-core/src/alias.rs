//! # Shorthand Aliases
//!
//! Users can register per-service shorthands such as `identity ls -> list User`. Expansion
//! happens before discovery and never mutates the caller's options: when an alias resolves to a
//! `list` call, a new [`FetchOptions`] with table-friendly defaults is built instead.
use crate::options::FetchOptions;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Source of `service -> token -> "verb resource"` shorthands.
pub trait AliasProvider {
    /// Returns the `(verb, resource)` pair registered for `token` on `service`.
    fn lookup_alias(&self, service: &str, token: &str) -> Option<(String, String)>;
}

/// In-memory alias table, as stored in the settings file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AliasTable(BTreeMap<String, BTreeMap<String, String>>);

impl AliasTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `token` as a shorthand for `command` (`"<verb> <resource>"`) on `service`.
    pub fn insert(&mut self, service: &str, token: &str, command: &str) {
        self.0
            .entry(service.to_string())
            .or_default()
            .insert(token.to_string(), command.to_string());
    }

    /// All shorthands registered for a service, as `(token, command)` pairs.
    pub fn aliases_for<'a>(&'a self, service: &str) -> impl Iterator<Item = (&'a str, &'a str)> {
        self.0
            .get(service)
            .into_iter()
            .flat_map(|aliases| aliases.iter().map(|(k, v)| (k.as_str(), v.as_str())))
    }
}

impl AliasProvider for AliasTable {
    fn lookup_alias(&self, service: &str, token: &str) -> Option<(String, String)> {
        let command = self.0.get(service)?.get(token)?;
        let mut parts = command.split_whitespace();

        match (parts.next(), parts.next()) {
            (Some(verb), Some(resource)) => Some((verb.to_string(), resource.to_string())),
            _ => None,
        }
    }
}

/// The verb/resource pair to dispatch, after alias expansion.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedCommand {
    pub verb: String,
    pub resource: String,
    pub options: FetchOptions,
}

/// Expands `verb` through the alias table of `service`.
pub fn expand_alias<P>(
    provider: &P,
    service: &str,
    verb: &str,
    resource: &str,
    options: &FetchOptions,
) -> ResolvedCommand
where
    P: AliasProvider + ?Sized,
{
    match provider.lookup_alias(service, verb) {
        Some((verb, resource)) => {
            tracing::debug!(service, %verb, %resource, "expanded alias");
            let options = if verb == "list" {
                let ignored = options.ignored_by_list_alias();
                if !ignored.is_empty() {
                    tracing::warn!(
                        service,
                        ignored = %ignored.join(", "),
                        "list shorthands use the table defaults, ignoring flags"
                    );
                }
                options.for_list_alias()
            } else {
                options.clone()
            };

            ResolvedCommand {
                verb,
                resource,
                options,
            }
        }
        None => ResolvedCommand {
            verb: verb.to_string(),
            resource: resource.to_string(),
            options: options.clone(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{DEFAULT_PAGE_SIZE, OutputFormat};

    fn table() -> AliasTable {
        let mut table = AliasTable::new();
        table.insert("identity", "ls", "list User");
        table.insert("identity", "mkp", "create Project");
        table.insert("identity", "broken", "list");
        table
    }

    #[test]
    fn list_alias_matches_explicit_dispatch_with_table_defaults() {
        let options = FetchOptions::default();

        let aliased = expand_alias(&table(), "identity", "ls", "", &options);
        let explicit = expand_alias(&table(), "identity", "list", "User", &options);

        assert_eq!((aliased.verb.as_str(), aliased.resource.as_str()), ("list", "User"));
        assert_eq!((explicit.verb.as_str(), explicit.resource.as_str()), ("list", "User"));

        assert_eq!(aliased.options.output_format, OutputFormat::Table);
        assert_eq!(aliased.options.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(explicit.options, options);
    }

    #[test]
    fn list_alias_drops_paging_and_selection_flags() {
        let options = FetchOptions {
            page: 3,
            sort_by: Some("name".to_string()),
            rows: 5,
            ..Default::default()
        };

        let resolved = expand_alias(&table(), "identity", "ls", "", &options);

        assert_eq!(resolved.options.page, 0);
        assert_eq!(resolved.options.sort_by, None);
        assert_eq!(resolved.options.rows, 0);
        assert_eq!(
            options.ignored_by_list_alias(),
            vec!["--page", "--page-size", "--sort-by", "--rows"]
        );
    }

    #[test]
    fn non_list_alias_keeps_options() {
        let options = FetchOptions {
            parameters: vec!["name=test".to_string()],
            ..Default::default()
        };

        let resolved = expand_alias(&table(), "identity", "mkp", "", &options);

        assert_eq!(resolved.verb, "create");
        assert_eq!(resolved.resource, "Project");
        assert_eq!(resolved.options, options);
    }

    #[test]
    fn aliases_are_scoped_per_service() {
        assert_eq!(table().lookup_alias("inventory", "ls"), None);
        assert_eq!(table().lookup_alias("identity", "broken"), None);
    }

    #[test]
    fn deserializes_from_settings_shape() {
        let table: AliasTable =
            serde_yaml_ng::from_str("identity:\n  ls: list User\n").unwrap();

        assert_eq!(
            table.lookup_alias("identity", "ls"),
            Some(("list".to_string(), "User".to_string()))
        );
        assert_eq!(table.aliases_for("identity").count(), 1);
    }
}
