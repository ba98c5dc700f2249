//! Format registry and conversion orchestration.
//!
//! Every structured format exposed in the UI (JSON, XML, YAML, TOML, CSV, TSV,
//! SQL inserts, HTML tables) is read into the shared [`Value`] model and
//! written back out from it, so any readable format converts to any writable
//! one. Capability flags on [`FormatDescriptor`] decide how writers coerce
//! values they cannot represent directly.
//!
//! # Examples
//!
//! ```rust
//! use transform_core::convert::formats::convert_formats;
//!
//! let csv = convert_formats("json", "csv", r#"[{"name":"Ada","id":1}]"#)?;
//! assert_eq!(csv, "name,id\nAda,1\n");
//! # Ok::<(), transform_core::error::ConversionError>(())
//! ```
//!
//! ```rust
//! use transform_core::convert::formats::format_content;
//!
//! let minified = format_content("json", "{ \"a\": 1 }", true)?;
//! assert_eq!(minified, "{\"a\":1}");
//! # Ok::<(), transform_core::error::ConversionError>(())
//! ```
use serde::Serialize;
use tracing::debug;

use crate::config::ConvertOptions;
use crate::convert::shape::Table;
use crate::convert::{html, json, sql, tabular, toml, xml, yaml};
use crate::error::{ConversionError, ErrorDetail, ParseError, Stage, WriteError};
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatId {
    Json,
    Xml,
    Yaml,
    Toml,
    Csv,
    Tsv,
    Sql,
    Html,
}

impl FormatId {
    pub const ALL: [FormatId; 8] = [
        Self::Json,
        Self::Xml,
        Self::Yaml,
        Self::Toml,
        Self::Csv,
        Self::Tsv,
        Self::Sql,
        Self::Html,
    ];

    /// Resolves a tool-slug identifier, ignoring case and surrounding space.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "json" => Some(Self::Json),
            "xml" => Some(Self::Xml),
            "yaml" | "yml" => Some(Self::Yaml),
            "toml" => Some(Self::Toml),
            "csv" => Some(Self::Csv),
            "tsv" => Some(Self::Tsv),
            "sql" => Some(Self::Sql),
            "html" => Some(Self::Html),
            _ => None,
        }
    }

    pub fn descriptor(self) -> &'static FormatDescriptor {
        match self {
            Self::Json => &JSON,
            Self::Xml => &XML,
            Self::Yaml => &YAML,
            Self::Toml => &TOML,
            Self::Csv => &CSV,
            Self::Tsv => &TSV,
            Self::Sql => &SQL,
            Self::Html => &HTML,
        }
    }
}

/// Static description of a format and the shapes it can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormatDescriptor {
    pub id: FormatId,
    pub label: &'static str,
    pub mime_type: &'static str,
    pub extension: &'static str,
    /// When false, nested records are flattened into separator-joined columns.
    pub supports_nested_objects: bool,
    /// Cells hold scalars only; nested values are flattened before writing.
    pub supports_arrays_of_scalars_only: bool,
    /// Every row must share one column set; rows are padded to the union.
    pub requires_uniform_record_shape: bool,
    /// Distinguishes attributes from child elements.
    pub supports_attributes: bool,
    /// False for target-only formats.
    pub readable: bool,
}

const JSON: FormatDescriptor = FormatDescriptor {
    id: FormatId::Json,
    label: "JSON",
    mime_type: "application/json",
    extension: "json",
    supports_nested_objects: true,
    supports_arrays_of_scalars_only: false,
    requires_uniform_record_shape: false,
    supports_attributes: false,
    readable: true,
};

const XML: FormatDescriptor = FormatDescriptor {
    id: FormatId::Xml,
    label: "XML",
    mime_type: "application/xml",
    extension: "xml",
    supports_attributes: true,
    ..JSON
};

const YAML: FormatDescriptor = FormatDescriptor {
    id: FormatId::Yaml,
    label: "YAML",
    mime_type: "application/yaml",
    extension: "yaml",
    ..JSON
};

const TOML: FormatDescriptor = FormatDescriptor {
    id: FormatId::Toml,
    label: "TOML",
    mime_type: "application/toml",
    extension: "toml",
    ..JSON
};

const CSV: FormatDescriptor = FormatDescriptor {
    id: FormatId::Csv,
    label: "CSV",
    mime_type: "text/csv",
    extension: "csv",
    supports_nested_objects: false,
    supports_arrays_of_scalars_only: true,
    requires_uniform_record_shape: true,
    supports_attributes: false,
    readable: true,
};

const TSV: FormatDescriptor = FormatDescriptor {
    id: FormatId::Tsv,
    label: "TSV",
    mime_type: "text/tab-separated-values",
    extension: "tsv",
    ..CSV
};

const SQL: FormatDescriptor = FormatDescriptor {
    id: FormatId::Sql,
    label: "SQL",
    mime_type: "application/sql",
    extension: "sql",
    requires_uniform_record_shape: false,
    ..CSV
};

const HTML: FormatDescriptor = FormatDescriptor {
    id: FormatId::Html,
    label: "HTML Table",
    mime_type: "text/html",
    extension: "html",
    readable: false,
    ..CSV
};

/// Parses `input` as `format` into the shared value model.
pub fn read(format: FormatId, input: &str, options: &ConvertOptions) -> Result<Value, ParseError> {
    match format {
        FormatId::Json => json::read(input, options),
        FormatId::Xml => xml::read(input, options),
        FormatId::Yaml => yaml::read(input, options),
        FormatId::Toml => toml::read(input, options),
        FormatId::Csv => tabular::read(input, b',', options),
        FormatId::Tsv => tabular::read(input, b'\t', options),
        FormatId::Sql => sql::read(input, options),
        FormatId::Html => Err(ParseError::UnsupportedFeature {
            feature: "reading HTML".into(),
            location: None,
        }),
    }
}

/// Renders `value` as `format`. The value is never modified; writers that
/// need to coerce work on copies.
pub fn write(format: FormatId, value: &Value, options: &ConvertOptions) -> Result<String, WriteError> {
    let descriptor = format.descriptor();
    match format {
        FormatId::Json => json::write(value, options),
        FormatId::Xml => xml::write(value, options),
        FormatId::Yaml => yaml::write(value),
        FormatId::Toml => toml::write(value, options),
        FormatId::Csv => tabular::write(&Table::from_value(value, descriptor, options)?, b','),
        FormatId::Tsv => tabular::write(&Table::from_value(value, descriptor, options)?, b'\t'),
        FormatId::Sql => sql::write(value, descriptor, options),
        FormatId::Html => Ok(html::write(&Table::from_value(value, descriptor, options)?)),
    }
}

/// Converts between any readable format and any writable format using the
/// default [`ConvertOptions`].
pub fn convert_formats(from: &str, to: &str, input: &str) -> Result<String, ConversionError> {
    convert_formats_with(from, to, input, &ConvertOptions::default())
}

/// Converts `input` from `from` to `to`. Errors carry the failing stage and
/// the identifiers exactly as the caller passed them.
pub fn convert_formats_with(
    from: &str,
    to: &str,
    input: &str,
    options: &ConvertOptions,
) -> Result<String, ConversionError> {
    let source = FormatId::parse(from).ok_or_else(|| ConversionError::unknown(from, to, from))?;
    let target = FormatId::parse(to).ok_or_else(|| ConversionError::unknown(from, to, to))?;
    if !source.descriptor().readable {
        return Err(ConversionError::new(
            Stage::Resolve,
            from,
            to,
            ErrorDetail::UnsupportedDirection {
                id: from.to_string(),
            },
        ));
    }
    options.validate().map_err(|message| {
        ConversionError::new(Stage::Resolve, from, to, ErrorDetail::InvalidOptions { message })
    })?;

    debug!(from = ?source, to = ?target, bytes = input.len(), "converting document");
    let value = read(source, input, options).map_err(|err| {
        debug!(kind = err.kind(), "parse failed");
        ConversionError::new(Stage::Parse, from, to, err)
    })?;
    let value = if source.descriptor().supports_attributes && !target.descriptor().supports_attributes {
        value.lower_markup()
    } else {
        value
    };
    let output = write(target, &value, options).map_err(|err| {
        debug!(kind = err.kind(), "serialize failed");
        ConversionError::new(Stage::Serialize, from, to, err)
    })?;
    debug!(bytes = output.len(), "conversion finished");
    Ok(output)
}

/// Pretty-prints or minifies a document by reading and re-writing it in the
/// same format. Only JSON output differs between the two modes.
pub fn format_content(format_name: &str, input: &str, minify: bool) -> Result<String, ConversionError> {
    let options = ConvertOptions {
        pretty: !minify,
        ..ConvertOptions::default()
    };
    convert_formats_with(format_name, format_name, input, &options)
}

/// Descriptors of every registered format, in UI order.
pub fn list_formats() -> Vec<&'static FormatDescriptor> {
    FormatId::ALL.iter().map(|id| id.descriptor()).collect()
}
