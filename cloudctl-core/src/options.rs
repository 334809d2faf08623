//! Per-invocation options: parameter sources, output shape and paging directives.
use std::fmt::{self, Display};
use std::path::PathBuf;
use std::str::FromStr;

/// Page size applied when a `list` alias forces the table defaults.
pub const DEFAULT_PAGE_SIZE: usize = 15;

/// Presentation format requested by the user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Yaml,
    Json,
    Table,
    Csv,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "yaml" => Ok(Self::Yaml),
            "json" => Ok(Self::Json),
            "table" => Ok(Self::Table),
            "csv" => Ok(Self::Csv),
            other => Err(format!(
                "Unsupported output format '{other}', expected one of: yaml, json, table, csv"
            )),
        }
    }
}

impl Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Yaml => "yaml",
            Self::Json => "json",
            Self::Table => "table",
            Self::Csv => "csv",
        };
        f.write_str(name)
    }
}

/// Read-only input of a single invocation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchOptions {
    /// Repeated `key=value` tokens.
    pub parameters: Vec<String>,
    /// Inline JSON document.
    pub json_parameter: Option<String>,
    /// YAML (or JSON) parameter file.
    pub file_parameter: Option<PathBuf>,
    pub api_version: Option<String>,
    pub output_format: OutputFormat,
    /// Whether `output_format` was chosen by the user rather than defaulted.
    pub output_format_explicit: bool,
    pub sort_by: Option<String>,
    /// Keep only the first `rows` items of a list. `0` keeps everything.
    pub rows: usize,
    /// Comma separated list of fields to keep on every list item.
    pub columns: Option<String>,
    pub minimal_columns: bool,
    pub page: usize,
    pub page_size: usize,
    pub no_paging: bool,
}

impl FetchOptions {
    /// The column names requested with `columns`, trimmed and without empty entries.
    pub fn column_list(&self) -> Vec<String> {
        self.columns
            .as_deref()
            .map(|columns| {
                columns
                    .split(',')
                    .map(str::trim)
                    .filter(|c| !c.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Options used when a shorthand alias resolves to a `list` call: table output unless the
    /// user asked for a format, every column, and the default page size.
    ///
    /// Paging, sorting, row and column selection are reset; [`Self::ignored_by_list_alias`]
    /// names the ones the user had set.
    pub fn for_list_alias(&self) -> Self {
        Self {
            output_format: if self.output_format_explicit {
                self.output_format
            } else {
                OutputFormat::Table
            },
            minimal_columns: false,
            page_size: DEFAULT_PAGE_SIZE,
            sort_by: None,
            rows: 0,
            columns: None,
            page: 0,
            no_paging: false,
            ..self.clone()
        }
    }

    /// Flags set on these options that [`Self::for_list_alias`] discards.
    pub fn ignored_by_list_alias(&self) -> Vec<&'static str> {
        let set = [
            ("--page", self.page != 0),
            ("--page-size", self.page_size != DEFAULT_PAGE_SIZE),
            ("--no-paging", self.no_paging),
            ("--sort-by", self.sort_by.is_some()),
            ("--rows", self.rows != 0),
            ("--columns", self.columns.is_some()),
            ("--minimal", self.minimal_columns),
        ];

        set.into_iter()
            .filter_map(|(flag, set)| set.then_some(flag))
            .collect()
    }
}
