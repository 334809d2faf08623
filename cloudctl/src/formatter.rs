use crate::cache::CacheError;
use crate::config::ConfigError;
use crate::render::RenderError;
use cloudctl_core::{FetchError, client::ApiResource, gateway::GatewayError};
use colored::*;
use comfy_table::{ContentArrangement, Table, presets::UTF8_FULL};
use std::fmt::Display;

/// A wrapper struct for a formatted, colored string.
///
/// Implements `Display` so it can be printed directly.
pub struct FormattedString(pub String);

pub struct ServiceList(pub Vec<String>);

pub struct ResourceList(pub Vec<ApiResource>);

pub struct GenericError<T: Display>(pub &'static str, pub T);

impl std::fmt::Display for FormattedString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f)?;
        writeln!(f, "{}", self.0)?;
        Ok(())
    }
}

fn block(title: &str, detail: impl Display) -> FormattedString {
    FormattedString(format!("{}\n\n'{}'", title.red().bold(), detail))
}

fn block_with_hint(title: &str, detail: impl Display, hint: &str) -> FormattedString {
    FormattedString(format!(
        "{}\n\n'{}'\n\n{} {}",
        title.red().bold(),
        detail,
        "Hint:".yellow().bold(),
        hint
    ))
}

impl From<FetchError> for FormattedString {
    fn from(err: FetchError) -> Self {
        match &err {
            FetchError::Authentication(_) => block_with_hint(
                "Authentication Failed:",
                &err,
                concat!(
                    "The token is invalid or expired. Log in again or update the token of the ",
                    "environment in setting.yaml."
                ),
            ),
            FetchError::MissingParameter(field) => block_with_hint(
                "Missing Parameter:",
                &err,
                &format!("Pass it with '-p {field}=<value>'."),
            ),
            FetchError::Configuration(_) => block("Configuration Error:", &err),
            FetchError::Connectivity(_) => block("Connection Error:", &err),
            FetchError::NotFound(_) => block("Not Found:", &err),
            FetchError::ParameterFormat(_) => block("Invalid Parameters:", &err),
            FetchError::Invocation(_) => block("Call Failed:", &err),
        }
    }
}

impl From<ConfigError> for FormattedString {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NotFound(_) | ConfigError::NoEnvironment => block_with_hint(
                "Configuration Error:",
                err,
                concat!(
                    "Create ~/.cloudctl/setting.yaml with an 'environment' and its ",
                    "'environments' entry."
                ),
            ),
            _ => block("Configuration Error:", err),
        }
    }
}

impl From<CacheError> for FormattedString {
    fn from(err: CacheError) -> Self {
        block("Cache Error:", err)
    }
}

impl From<GatewayError> for FormattedString {
    fn from(err: GatewayError) -> Self {
        block("Gateway Error:", err)
    }
}

impl From<RenderError> for FormattedString {
    fn from(err: RenderError) -> Self {
        block("Output Error:", err)
    }
}

impl From<anyhow::Error> for FormattedString {
    fn from(err: anyhow::Error) -> Self {
        let err = match err.downcast::<FetchError>() {
            Ok(err) => return err.into(),
            Err(err) => err,
        };
        let err = match err.downcast::<ConfigError>() {
            Ok(err) => return err.into(),
            Err(err) => err,
        };
        let err = match err.downcast::<CacheError>() {
            Ok(err) => return err.into(),
            Err(err) => err,
        };
        let err = match err.downcast::<GatewayError>() {
            Ok(err) => return err.into(),
            Err(err) => err,
        };
        match err.downcast::<RenderError>() {
            Ok(err) => err.into(),
            Err(err) => GenericError("Error", format!("{err:#}")).into(),
        }
    }
}

impl<T: Display> From<GenericError<T>> for FormattedString {
    fn from(GenericError(msg, err): GenericError<T>) -> Self {
        FormattedString(format!("{}:\n\n'{}'", msg.red().bold(), err))
    }
}

impl From<ServiceList> for FormattedString {
    fn from(ServiceList(services): ServiceList) -> Self {
        if services.is_empty() {
            return FormattedString("No services found.".yellow().to_string());
        }

        let mut out = String::new();
        out.push_str("Available Services:\n");
        for svc in services {
            out.push_str(&format!("  - {}\n", svc.green()));
        }
        FormattedString(out.trim_end().to_string())
    }
}

impl From<ResourceList> for FormattedString {
    fn from(ResourceList(resources): ResourceList) -> Self {
        if resources.is_empty() {
            return FormattedString("No resources found.".yellow().to_string());
        }

        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(["Service", "Verb", "Resource", "Shorthand"]);

        for resource in resources {
            if !resource.verbs.is_empty() {
                table.add_row([
                    resource.service.clone(),
                    resource.verbs.join(", "),
                    resource.resource.clone(),
                    String::new(),
                ]);
            }
            for (shorthand, verb) in &resource.aliases {
                table.add_row([
                    resource.service.clone(),
                    verb.clone(),
                    resource.resource.clone(),
                    shorthand.clone(),
                ]);
            }
        }

        FormattedString(table.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(formatted: impl Into<FormattedString>) -> String {
        colored::control::set_override(false);
        formatted.into().0
    }

    #[test]
    fn authentication_errors_carry_a_login_hint() {
        let output = plain(FetchError::Authentication(
            "Token is invalid or expired".to_string(),
        ));

        assert!(output.starts_with("Authentication Failed:"));
        assert!(output.contains("Token is invalid or expired"));
        assert!(output.contains("Log in again"));
    }

    #[test]
    fn missing_parameters_suggest_the_flag() {
        let output = plain(FetchError::MissingParameter("user_id".to_string()));

        assert!(output.starts_with("Missing Parameter:"));
        assert!(output.contains("-p user_id=<value>"));
    }

    #[test]
    fn other_errors_have_no_hint() {
        let output = plain(FetchError::Configuration("bad endpoint".into()));

        assert!(output.starts_with("Configuration Error:"));
        assert!(!output.contains("Hint:"));
    }

    #[test]
    fn resources_are_listed_with_their_shorthands() {
        let output = plain(ResourceList(vec![ApiResource {
            service: "spaceone.api.identity.v1.User".to_string(),
            resource: "User".to_string(),
            verbs: vec!["get".to_string(), "stat".to_string()],
            aliases: vec![("ls".to_string(), "list".to_string())],
        }]));

        assert!(output.contains("Shorthand"));
        assert!(output.contains("get, stat"));
        assert!(output.contains("ls"));
    }

    #[test]
    fn boxed_errors_keep_their_hints() {
        let output = plain(anyhow::Error::from(FetchError::MissingParameter(
            "user_id".to_string(),
        )));
        assert!(output.contains("-p user_id=<value>"));

        let output = plain(anyhow::anyhow!("Unknown service 'billing'"));
        assert!(output.starts_with("Error:"));
        assert!(output.contains("Unknown service 'billing'"));
    }

    #[test]
    fn empty_lists() {
        assert_eq!(plain(ServiceList(vec![])), "No services found.");
        assert_eq!(plain(ResourceList(vec![])), "No resources found.");
    }
}
