//! Error taxonomy shared by readers, writers, codecs and the orchestrator.
//!
//! Every failure is a recoverable value. Readers report where they stopped
//! through [`SourceLocation`]; the orchestrator wraps everything into a
//! [`ConversionError`] that knows which stage failed and which identifiers the
//! caller asked for. [`ConversionError::report`] flattens that into the plain
//! object the UI renders next to the input.
use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Position of a failure inside the input text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SourceLocation {
    /// Byte offset from the start of the input.
    pub offset: usize,
    /// Line number (1-indexed).
    pub line: usize,
    /// Column number (1-indexed, counted in characters).
    pub column: usize,
}

impl SourceLocation {
    /// Builds a location from a byte offset, clamping it to the input length.
    pub fn from_offset(input: &str, offset: usize) -> Self {
        let offset = offset.min(input.len());
        let mut line = 1;
        let mut column = 1;
        for (idx, ch) in input.char_indices() {
            if idx >= offset {
                break;
            }
            if ch == '\n' {
                line += 1;
                column = 1;
            } else {
                column += 1;
            }
        }
        Self {
            offset,
            line,
            column,
        }
    }

    /// Builds a location from a 1-indexed line and a 1-indexed byte column, the
    /// convention used by serde_json.
    pub fn from_line_column(input: &str, line: usize, column: usize) -> Self {
        let mut line_start = 0;
        for (idx, text) in input.split_inclusive('\n').enumerate() {
            if idx + 1 == line {
                break;
            }
            line_start += text.len();
        }
        let mut offset = (line_start + column.saturating_sub(1)).min(input.len());
        while !input.is_char_boundary(offset) {
            offset -= 1;
        }
        Self::from_offset(input, offset)
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "line {}, column {} (offset {})",
            self.line, self.column, self.offset
        )
    }
}

fn at(location: &Option<SourceLocation>) -> String {
    location
        .map(|loc| format!(" at {loc}"))
        .unwrap_or_default()
}

fn at_offset(offset: &Option<usize>) -> String {
    offset
        .map(|offset| format!(" at offset {offset}"))
        .unwrap_or_default()
}

/// Failure while turning input text into a [`crate::value::Value`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("syntax error{}: {message}", at(.location))]
    SyntaxError {
        message: String,
        location: Option<SourceLocation>,
    },
    #[error("row {row} has a different shape than the header: {message}")]
    ShapeMismatch { row: usize, message: String },
    #[error("unsupported feature `{feature}`{}", at(.location))]
    UnsupportedFeature {
        feature: String,
        location: Option<SourceLocation>,
    },
    #[error("nesting depth exceeds the limit of {limit}{}", at(.location))]
    DepthExceeded {
        limit: usize,
        location: Option<SourceLocation>,
    },
}

impl ParseError {
    pub(crate) fn syntax(message: impl Into<String>, location: Option<SourceLocation>) -> Self {
        Self::SyntaxError {
            message: message.into(),
            location,
        }
    }

    pub(crate) fn syntax_at(message: impl Into<String>, input: &str, offset: usize) -> Self {
        Self::syntax(message, Some(SourceLocation::from_offset(input, offset)))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::SyntaxError { .. } => "SyntaxError",
            Self::ShapeMismatch { .. } => "ShapeMismatch",
            Self::UnsupportedFeature { .. } => "UnsupportedFeature",
            Self::DepthExceeded { .. } => "DepthExceeded",
        }
    }

    pub fn location(&self) -> Option<SourceLocation> {
        match self {
            Self::SyntaxError { location, .. }
            | Self::UnsupportedFeature { location, .. }
            | Self::DepthExceeded { location, .. } => *location,
            Self::ShapeMismatch { .. } => None,
        }
    }
}

/// Failure while rendering a value into a target format.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WriteError {
    #[error("row {row}: {message}")]
    ShapeMismatch { row: usize, message: String },
    #[error("cannot represent value at `{path}`: {message}")]
    UnsupportedValue { path: String, message: String },
}

impl WriteError {
    pub(crate) fn unsupported(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::UnsupportedValue {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::ShapeMismatch { .. } => "ShapeMismatch",
            Self::UnsupportedValue { .. } => "UnsupportedValue",
        }
    }
}

/// Failure of an encoding transform.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    #[error("invalid {scheme} input{}: {message}", at_offset(.offset))]
    InvalidInput {
        scheme: &'static str,
        message: String,
        offset: Option<usize>,
    },
}

impl EncodeError {
    pub(crate) fn invalid(
        scheme: &'static str,
        message: impl Into<String>,
        offset: Option<usize>,
    ) -> Self {
        Self::InvalidInput {
            scheme,
            message: message.into(),
            offset,
        }
    }

    pub fn kind(&self) -> &'static str {
        "InvalidInput"
    }

    pub fn offset(&self) -> Option<usize> {
        match self {
            Self::InvalidInput { offset, .. } => *offset,
        }
    }
}

/// Which step of a request failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Identifier or option resolution, before any input is touched.
    Resolve,
    Parse,
    Serialize,
    Encode,
    Decode,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Resolve => "resolve",
            Self::Parse => "parse",
            Self::Serialize => "serialize",
            Self::Encode => "encode",
            Self::Decode => "decode",
        };
        f.write_str(label)
    }
}

/// The underlying cause carried by a [`ConversionError`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ErrorDetail {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Write(#[from] WriteError),
    #[error(transparent)]
    Encode(#[from] EncodeError),
    #[error("unknown identifier `{id}`")]
    UnknownFormat { id: String },
    #[error("`{id}` can only be used as a conversion target")]
    UnsupportedDirection { id: String },
    #[error("invalid options: {message}")]
    InvalidOptions { message: String },
}

impl ErrorDetail {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Parse(err) => err.kind(),
            Self::Write(err) => err.kind(),
            Self::Encode(err) => err.kind(),
            Self::UnknownFormat { .. } => "UnknownFormat",
            Self::UnsupportedDirection { .. } => "UnsupportedDirection",
            Self::InvalidOptions { .. } => "InvalidOptions",
        }
    }
}

/// Uniform error contract returned to the UI shell.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{stage} failed ({from} -> {to}): {detail}")]
pub struct ConversionError {
    pub stage: Stage,
    pub from: String,
    pub to: String,
    #[source]
    pub detail: ErrorDetail,
}

impl ConversionError {
    pub fn new(stage: Stage, from: &str, to: &str, detail: impl Into<ErrorDetail>) -> Self {
        Self {
            stage,
            from: from.to_string(),
            to: to.to_string(),
            detail: detail.into(),
        }
    }

    pub(crate) fn unknown(from: &str, to: &str, id: &str) -> Self {
        Self::new(
            Stage::Resolve,
            from,
            to,
            ErrorDetail::UnknownFormat { id: id.to_string() },
        )
    }

    pub fn kind(&self) -> &'static str {
        self.detail.kind()
    }

    /// Flattens the error into the object handed to JavaScript.
    pub fn report(&self) -> ErrorReport {
        let (location, offset, row) = match &self.detail {
            ErrorDetail::Parse(ParseError::ShapeMismatch { row, .. })
            | ErrorDetail::Write(WriteError::ShapeMismatch { row, .. }) => (None, None, Some(*row)),
            ErrorDetail::Parse(err) => {
                let location = err.location();
                (location, location.map(|loc| loc.offset), None)
            }
            ErrorDetail::Encode(err) => (None, err.offset(), None),
            _ => (None, None, None),
        };
        ErrorReport {
            stage: self.stage,
            kind: self.kind(),
            from: self.from.clone(),
            to: self.to.clone(),
            message: self.detail.to_string(),
            offset,
            line: location.map(|loc| loc.line),
            column: location.map(|loc| loc.column),
            row,
        }
    }
}

/// Serializable view of a [`ConversionError`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorReport {
    pub stage: Stage,
    pub kind: &'static str,
    pub from: String,
    pub to: String,
    pub message: String,
    pub offset: Option<usize>,
    pub line: Option<usize>,
    pub column: Option<usize>,
    pub row: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_counts_lines_and_columns() {
        let loc = SourceLocation::from_offset("ab\ncd\nef", 4);
        assert_eq!(loc, SourceLocation { offset: 4, line: 2, column: 2 });
    }

    #[test]
    fn location_from_line_column_matches_offset() {
        let input = "{\n  \"a\": x\n}";
        let loc = SourceLocation::from_line_column(input, 2, 8);
        assert_eq!(&input[loc.offset..loc.offset + 1], "x");
        assert_eq!(loc.line, 2);
        assert_eq!(loc.column, 8);
    }

    #[test]
    fn location_clamps_past_end() {
        let loc = SourceLocation::from_offset("abc", 99);
        assert_eq!(loc.offset, 3);
        assert_eq!(loc.column, 4);
    }

    #[test]
    fn report_carries_stage_kind_and_position() {
        let err = ConversionError::new(
            Stage::Parse,
            "json",
            "csv",
            ParseError::syntax_at("unexpected token", "[1,,]", 3),
        );
        let report = err.report();
        assert_eq!(report.stage, Stage::Parse);
        assert_eq!(report.kind, "SyntaxError");
        assert_eq!(report.offset, Some(3));
        assert_eq!(report.line, Some(1));
        assert_eq!(report.column, Some(4));
        assert!(report.message.contains("unexpected token"));
    }

    #[test]
    fn report_for_shape_mismatch_exposes_row() {
        let err = ConversionError::new(
            Stage::Parse,
            "csv",
            "json",
            ParseError::ShapeMismatch {
                row: 3,
                message: "expected 2 fields, found 3".into(),
            },
        );
        let report = err.report();
        assert_eq!(report.row, Some(3));
        assert_eq!(report.offset, None);
    }

    #[test]
    fn display_mentions_identifiers() {
        let err = ConversionError::unknown("ini", "json", "ini");
        assert_eq!(err.kind(), "UnknownFormat");
        assert_eq!(
            err.to_string(),
            "resolve failed (ini -> json): unknown identifier `ini`"
        );
    }
}
