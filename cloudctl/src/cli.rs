//! # CLI
//!
//! This module defines the command-line interface of `cloudctl` using `clap`.
//!
//! Platform services are not known at compile time: `cloudctl <service> ...` is captured as an
//! external subcommand and parsed a second time with [`ServiceCommand`], once the service name
//! has been checked against the registry.
use clap::{ArgAction, Parser, Subcommand};
use cloudctl_core::options::{DEFAULT_PAGE_SIZE, FetchOptions, OutputFormat};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "cloudctl",
    version,
    about = "Dynamic gRPC CLI for cloud platform services",
    subcommand_value_name = "SERVICE",
    subcommand_help_heading = "Services"
)]
pub struct Cli {
    /// Directory holding setting.yaml and the cache (defaults to ~/.cloudctl)
    #[arg(long, global = true, env = "CLOUDCTL_HOME")]
    pub config_dir: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the services of the current environment
    Services,

    /// List the resources, verbs and shorthands of a service
    ///
    /// ## Examples:
    ///
    /// ```bash
    /// cloudctl api-resources identity
    /// ```
    ApiResources {
        /// Service short name (e.g. identity)
        service: String,
    },

    /// Call a service: cloudctl <service> <verb> [resource] [options]
    #[command(external_subcommand)]
    Service(Vec<String>),
}

/// Arguments of a `cloudctl <service> <verb> [resource]` invocation.
///
/// ## Examples:
///
/// ```bash
/// cloudctl identity list User -o table --sort-by name
/// cloudctl identity get User -p user_id=user-123
/// cloudctl inventory create Server -f server.yaml -p name=web-1
/// ```
#[derive(Parser, Debug, Clone, PartialEq)]
pub struct ServiceCommand {
    /// Verb (method name) or a shorthand registered in the settings
    pub verb: String,

    /// Resource name (e.g. User)
    pub resource: Option<String>,

    /// Request parameter as key=value, can be repeated
    #[arg(short = 'p', long = "parameter", value_parser = parse_parameter)]
    pub parameters: Vec<String>,

    /// Request parameters as a JSON document
    #[arg(short = 'j', long = "json-parameter", value_parser = parse_json)]
    pub json_parameter: Option<String>,

    /// Request parameters from a YAML or JSON file
    #[arg(short = 'f', long = "file-parameter")]
    pub file_parameter: Option<PathBuf>,

    /// API version of the service
    #[arg(long)]
    pub api_version: Option<String>,

    /// Output format: yaml, json, table or csv
    #[arg(short = 'o', long = "output", value_parser = parse_output_format)]
    pub output: Option<OutputFormat>,

    /// Sort list results by this field
    #[arg(short = 's', long)]
    pub sort_by: Option<String>,

    /// Keep only the first N list results
    #[arg(short = 'r', long, default_value_t = 0)]
    pub rows: usize,

    /// Comma separated fields to keep on every list result
    #[arg(short = 'c', long)]
    pub columns: Option<String>,

    /// Show only identifying and lifecycle columns
    #[arg(short = 'm', long = "minimal")]
    pub minimal: bool,

    /// Page to request from the service
    #[arg(long, default_value_t = 0)]
    pub page: usize,

    /// Items per page, used for server paging and table output
    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
    pub page_size: usize,

    /// Print every table row at once
    #[arg(long)]
    pub no_paging: bool,

    /// Repeat the call every 2 seconds and print new items
    #[arg(short = 'w', long)]
    pub watch: bool,
}

impl ServiceCommand {
    /// Parses the arguments following `cloudctl`, the first one being the service name.
    pub fn parse_service_args(args: &[String]) -> Result<(String, Self), clap::Error> {
        let service = args.first().cloned().unwrap_or_default();
        let command = Self::try_parse_from(args)?;
        Ok((service, command))
    }

    pub fn fetch_options(&self) -> FetchOptions {
        FetchOptions {
            parameters: self.parameters.clone(),
            json_parameter: self.json_parameter.clone(),
            file_parameter: self.file_parameter.clone(),
            api_version: self.api_version.clone(),
            output_format: self.output.unwrap_or_default(),
            output_format_explicit: self.output.is_some(),
            sort_by: self.sort_by.clone(),
            rows: self.rows,
            columns: self.columns.clone(),
            minimal_columns: self.minimal,
            page: self.page,
            page_size: self.page_size,
            no_paging: self.no_paging,
        }
    }
}

fn parse_parameter(value: &str) -> Result<String, String> {
    match value.split_once('=') {
        Some((key, _)) if !key.trim().is_empty() => Ok(value.to_string()),
        _ => Err("Format must be 'key=value'".to_string()),
    }
}

fn parse_json(value: &str) -> Result<String, String> {
    match serde_json::from_str::<serde_json::Value>(value) {
        Ok(serde_json::Value::Object(_)) => Ok(value.to_string()),
        Ok(_) => Err("The JSON parameter must be an object".to_string()),
        Err(e) => Err(format!("Invalid JSON: {e}")),
    }
}

fn parse_output_format(value: &str) -> Result<OutputFormat, String> {
    value.parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(args: &[&str]) -> Vec<String> {
        args.iter().map(|a| a.to_string()).collect()
    }

    #[test]
    fn parses_service_invocations() {
        let (service, command) = ServiceCommand::parse_service_args(&args(&[
            "identity", "list", "User", "-p", "state=ENABLED", "-o", "table", "--sort-by", "name",
            "--minimal",
        ]))
        .unwrap();

        assert_eq!(service, "identity");
        assert_eq!(command.verb, "list");
        assert_eq!(command.resource.as_deref(), Some("User"));

        let options = command.fetch_options();
        assert_eq!(options.parameters, vec!["state=ENABLED"]);
        assert_eq!(options.output_format, OutputFormat::Table);
        assert!(options.output_format_explicit);
        assert_eq!(options.sort_by.as_deref(), Some("name"));
        assert!(options.minimal_columns);
        assert_eq!(options.page_size, DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn defaults_to_implicit_yaml() {
        let (_, command) =
            ServiceCommand::parse_service_args(&args(&["identity", "ls"])).unwrap();

        assert_eq!(command.resource, None);
        let options = command.fetch_options();
        assert_eq!(options.output_format, OutputFormat::Yaml);
        assert!(!options.output_format_explicit);
    }

    #[test]
    fn rejects_malformed_arguments() {
        for flags in [["-p", "oops"], ["-j", "[1]"], ["-o", "xml"]] {
            let raw = args(&["identity", "get", "User", flags[0], flags[1]]);
            assert!(ServiceCommand::parse_service_args(&raw).is_err(), "{flags:?}");
        }
    }

    #[test]
    fn top_level_commands() {
        let cli = Cli::try_parse_from(["cloudctl", "-vv", "api-resources", "identity"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.command, Commands::ApiResources { service } if service == "identity"));

        let raw = ["identity", "list", "User", "-o", "json"];
        let cli = Cli::try_parse_from(["cloudctl"].into_iter().chain(raw)).unwrap();
        match cli.command {
            Commands::Service(args) => assert_eq!(args, raw),
            _ => panic!("expected a service invocation"),
        }
    }
}
