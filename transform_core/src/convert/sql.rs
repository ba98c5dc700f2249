// SQL `INSERT INTO ... VALUES ...` dumps: a small tokenizer and recursive
// descent parser for reading, and one INSERT per row for writing.
use crate::config::{ConvertOptions, SqlDialect};
use crate::convert::formats::FormatDescriptor;
use crate::convert::shape::Table;
use crate::error::{ParseError, WriteError};
use crate::value::{Number, Record, Value};

#[derive(Debug, Clone, PartialEq)]
enum Token {
    /// Bare word; keywords are matched case-insensitively at parse time.
    Word(String),
    /// `"name"`, `` `name` `` or `[name]`.
    Quoted(String),
    Str(String),
    Number(String),
    Punct(u8),
}

#[derive(Debug, Clone)]
struct Spanned {
    token: Token,
    offset: usize,
}

struct Lexer<'a> {
    input: &'a str,
    bytes: &'a [u8],
    pos: usize,
    dialect: SqlDialect,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str, dialect: SqlDialect) -> Self {
        Self {
            input,
            bytes: input.as_bytes(),
            pos: 0,
            dialect,
        }
    }

    fn tokenize(mut self) -> Result<Vec<Spanned>, ParseError> {
        let mut tokens = Vec::new();
        loop {
            self.skip_trivia()?;
            let Some(&byte) = self.bytes.get(self.pos) else {
                return Ok(tokens);
            };
            let offset = self.pos;
            let token = match byte {
                b'\'' => Token::Str(self.string()?),
                b'"' => Token::Quoted(self.delimited(b'"', b'"')?),
                b'`' => Token::Quoted(self.delimited(b'`', b'`')?),
                b'[' => Token::Quoted(self.delimited(b'[', b']')?),
                b'0'..=b'9' => Token::Number(self.number()),
                b'-' | b'+' | b'.' if self.peek(1).is_some_and(|b| b.is_ascii_digit()) => {
                    Token::Number(self.number())
                }
                b'(' | b')' | b',' | b';' | b'.' => {
                    self.pos += 1;
                    Token::Punct(byte)
                }
                b if b.is_ascii_alphabetic() || b == b'_' => Token::Word(self.word()),
                _ => {
                    let ch = self.input[offset..].chars().next().unwrap_or('?');
                    return Err(ParseError::syntax_at(
                        format!("unexpected character `{ch}`"),
                        self.input,
                        offset,
                    ));
                }
            };
            tokens.push(Spanned { token, offset });
        }
    }

    fn peek(&self, ahead: usize) -> Option<u8> {
        self.bytes.get(self.pos + ahead).copied()
    }

    fn skip_trivia(&mut self) -> Result<(), ParseError> {
        while let Some(byte) = self.peek(0) {
            match byte {
                b if b.is_ascii_whitespace() => self.pos += 1,
                b'-' if self.peek(1) == Some(b'-') => self.skip_line(),
                b'#' if self.dialect == SqlDialect::Mysql => self.skip_line(),
                b'/' if self.peek(1) == Some(b'*') => {
                    let start = self.pos;
                    match self.input[self.pos + 2..].find("*/") {
                        Some(end) => self.pos += end + 4,
                        None => {
                            return Err(ParseError::syntax_at("unterminated comment", self.input, start))
                        }
                    }
                }
                _ => break,
            }
        }
        Ok(())
    }

    fn skip_line(&mut self) {
        while self.peek(0).is_some_and(|b| b != b'\n') {
            self.pos += 1;
        }
    }

    fn word(&mut self) -> String {
        let start = self.pos;
        while self
            .peek(0)
            .is_some_and(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'$')
        {
            self.pos += 1;
        }
        self.input[start..self.pos].to_string()
    }

    fn number(&mut self) -> String {
        let start = self.pos;
        if matches!(self.peek(0), Some(b'-' | b'+')) {
            self.pos += 1;
        }
        self.digits();
        if self.peek(0) == Some(b'.') {
            self.pos += 1;
            self.digits();
        }
        if matches!(self.peek(0), Some(b'e' | b'E')) {
            let exponent_digits = match self.peek(1) {
                Some(b'-' | b'+') => self.peek(2),
                other => other,
            };
            if exponent_digits.is_some_and(|b| b.is_ascii_digit()) {
                self.pos += if matches!(self.peek(1), Some(b'-' | b'+')) { 2 } else { 1 };
                self.digits();
            }
        }
        self.input[start..self.pos].to_string()
    }

    fn digits(&mut self) {
        while self.peek(0).is_some_and(|b| b.is_ascii_digit()) {
            self.pos += 1;
        }
    }

    /// Quoted identifier; the closing delimiter is escaped by doubling.
    fn delimited(&mut self, open: u8, close: u8) -> Result<String, ParseError> {
        let start = self.pos;
        self.pos += 1;
        let mut out = Vec::new();
        loop {
            match self.peek(0) {
                None => {
                    return Err(ParseError::syntax_at(
                        format!("unterminated identifier starting with `{}`", open as char),
                        self.input,
                        start,
                    ))
                }
                Some(b) if b == close => {
                    if self.peek(1) == Some(close) && close != b']' {
                        out.push(close);
                        self.pos += 2;
                    } else {
                        self.pos += 1;
                        break;
                    }
                }
                Some(b) => {
                    out.push(b);
                    self.pos += 1;
                }
            }
        }
        Ok(String::from_utf8_lossy(&out).into_owned())
    }

    fn string(&mut self) -> Result<String, ParseError> {
        let start = self.pos;
        self.pos += 1;
        let mut out = Vec::new();
        loop {
            match self.peek(0) {
                None => return Err(ParseError::syntax_at("unterminated string literal", self.input, start)),
                Some(b'\'') if self.peek(1) == Some(b'\'') => {
                    out.push(b'\'');
                    self.pos += 2;
                }
                Some(b'\'') => {
                    self.pos += 1;
                    break;
                }
                Some(b'\\') if self.dialect == SqlDialect::Mysql => {
                    let escaped = self.peek(1).ok_or_else(|| {
                        ParseError::syntax_at("unterminated string literal", self.input, start)
                    })?;
                    match escaped {
                        b'0' => out.push(0),
                        b'n' => out.push(b'\n'),
                        b'r' => out.push(b'\r'),
                        b't' => out.push(b'\t'),
                        b'b' => out.push(0x08),
                        b'Z' => out.push(0x1a),
                        b'%' | b'_' => out.extend_from_slice(&[b'\\', escaped]),
                        other => out.push(other),
                    }
                    self.pos += 2;
                }
                Some(b) => {
                    out.push(b);
                    self.pos += 1;
                }
            }
        }
        Ok(String::from_utf8_lossy(&out).into_owned())
    }
}

struct Parser<'a> {
    input: &'a str,
    tokens: Vec<Spanned>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Spanned> {
        self.tokens.get(self.pos)
    }

    fn offset(&self) -> usize {
        self.peek().map(|t| t.offset).unwrap_or(self.input.len())
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError::syntax_at(message, self.input, self.offset())
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|t| t.token.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn at_punct(&self, punct: u8) -> bool {
        matches!(self.peek(), Some(Spanned { token: Token::Punct(p), .. }) if *p == punct)
    }

    fn expect_punct(&mut self, punct: u8) -> Result<(), ParseError> {
        if self.at_punct(punct) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(format!("expected `{}`", punct as char)))
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<(), ParseError> {
        match self.peek() {
            Some(Spanned { token: Token::Word(word), .. }) if word.eq_ignore_ascii_case(keyword) => {
                self.pos += 1;
                Ok(())
            }
            _ => Err(self.error(format!("expected {keyword}"))),
        }
    }

    fn identifier(&mut self) -> Result<String, ParseError> {
        match self.peek().map(|t| &t.token) {
            Some(Token::Word(name) | Token::Quoted(name)) => {
                let name = name.clone();
                self.pos += 1;
                Ok(name)
            }
            _ => Err(self.error("expected an identifier")),
        }
    }

    /// `schema.table` is kept as written, joined with dots.
    fn qualified_name(&mut self) -> Result<String, ParseError> {
        let mut name = self.identifier()?;
        while self.at_punct(b'.') {
            self.pos += 1;
            name.push('.');
            name.push_str(&self.identifier()?);
        }
        Ok(name)
    }

    fn literal(&mut self) -> Result<Value, ParseError> {
        let offset = self.offset();
        let value = match self.next() {
            Some(Token::Str(text)) => Value::String(text),
            Some(Token::Number(text)) => parse_number(&text)
                .ok_or_else(|| ParseError::syntax_at(format!("invalid number `{text}`"), self.input, offset))?,
            Some(Token::Word(word)) if word.eq_ignore_ascii_case("null") => Value::Null,
            Some(Token::Word(word)) if word.eq_ignore_ascii_case("true") => Value::Boolean(true),
            Some(Token::Word(word)) if word.eq_ignore_ascii_case("false") => Value::Boolean(false),
            _ => return Err(ParseError::syntax_at("expected a literal value", self.input, offset)),
        };
        Ok(value)
    }

    fn insert(&mut self) -> Result<(String, Vec<Value>), ParseError> {
        self.expect_keyword("insert")?;
        self.expect_keyword("into")?;
        let table = self.qualified_name()?;
        if !self.at_punct(b'(') {
            return Err(self.error("INSERT without a column list is not supported"));
        }
        self.pos += 1;
        let mut columns = vec![self.identifier()?];
        while self.at_punct(b',') {
            self.pos += 1;
            columns.push(self.identifier()?);
        }
        self.expect_punct(b')')?;
        self.expect_keyword("values")?;

        let mut rows = Vec::new();
        loop {
            let tuple_offset = self.offset();
            self.expect_punct(b'(')?;
            let mut values = vec![self.literal()?];
            while self.at_punct(b',') {
                self.pos += 1;
                values.push(self.literal()?);
            }
            self.expect_punct(b')')?;
            if values.len() != columns.len() {
                return Err(ParseError::syntax_at(
                    format!("expected {} values, found {}", columns.len(), values.len()),
                    self.input,
                    tuple_offset,
                ));
            }
            let row: Record = columns.iter().cloned().zip(values).collect();
            rows.push(Value::Record(row));
            if !self.at_punct(b',') {
                break;
            }
            self.pos += 1;
        }
        Ok((table, rows))
    }
}

fn parse_number(text: &str) -> Option<Value> {
    let is_float = text.contains(['.', 'e', 'E']);
    if !is_float {
        if let Ok(int) = text.parse::<i64>() {
            return Some(Value::Number(Number::Integer(int)));
        }
    }
    let float = text.parse::<f64>().ok().filter(|f| f.is_finite())?;
    Some(Value::Number(Number::Float(float)))
}

/// Parses one or more INSERT statements.
///
/// Rows for a single table come back as a list of records; a dump touching
/// several tables becomes a record of table name to rows, in order of first
/// appearance.
pub fn read(input: &str, options: &ConvertOptions) -> Result<Value, ParseError> {
    let tokens = Lexer::new(input, options.sql_dialect).tokenize()?;
    let mut parser = Parser {
        input,
        tokens,
        pos: 0,
    };
    let mut tables: Vec<(String, Vec<Value>)> = Vec::new();
    loop {
        while parser.at_punct(b';') {
            parser.pos += 1;
        }
        if parser.peek().is_none() {
            break;
        }
        let (table, rows) = parser.insert()?;
        match tables.iter_mut().find(|(name, _)| *name == table) {
            Some((_, existing)) => existing.extend(rows),
            None => tables.push((table, rows)),
        }
        if parser.peek().is_some() {
            parser.expect_punct(b';')?;
        }
    }

    Ok(match tables.len() {
        0 => Value::Sequence(Vec::new()),
        1 => Value::Sequence(tables.pop().map(|(_, rows)| rows).unwrap_or_default()),
        _ => Value::Record(
            tables
                .into_iter()
                .map(|(name, rows)| (name, Value::Sequence(rows)))
                .collect(),
        ),
    })
}

/// Writes one INSERT statement per row. A record of non-empty row lists is
/// written as one table per key; everything else goes to `options.table_name`.
pub fn write(value: &Value, descriptor: &FormatDescriptor, options: &ConvertOptions) -> Result<String, WriteError> {
    let tables: Vec<(&str, &Value)> = match value {
        Value::Record(record) if !record.is_empty() && record.iter().all(|(_, v)| is_row_list(v)) => {
            record.iter().map(|(name, rows)| (name.as_str(), rows)).collect()
        }
        other => vec![(options.table_name.as_str(), other)],
    };

    let mut out = String::new();
    for (name, rows) in tables {
        let table = Table::from_value(rows, descriptor, options)?;
        if table.rows.is_empty() {
            continue;
        }
        let columns = table
            .columns
            .iter()
            .map(|column| quote_identifier(column, options.sql_dialect))
            .collect::<Vec<_>>()
            .join(", ");
        let target = quote_identifier(name, options.sql_dialect);
        for (idx, row) in table.rows.iter().enumerate() {
            let mut literals = Vec::with_capacity(row.len());
            for (column, cell) in table.columns.iter().zip(row) {
                literals.push(literal(cell, options.sql_dialect, &format!("$[{idx}].{column}"))?);
            }
            out.push_str(&format!(
                "INSERT INTO {target} ({columns}) VALUES ({});\n",
                literals.join(", ")
            ));
        }
    }
    Ok(out)
}

fn is_row_list(value: &Value) -> bool {
    matches!(value, Value::Sequence(items)
        if !items.is_empty() && items.iter().all(|item| item.as_record().is_some()))
}

fn quote_identifier(name: &str, dialect: SqlDialect) -> String {
    match dialect {
        SqlDialect::Ansi => format!("\"{}\"", name.replace('"', "\"\"")),
        SqlDialect::Mysql => format!("`{}`", name.replace('`', "``")),
    }
}

fn literal(value: &Value, dialect: SqlDialect, path: &str) -> Result<String, WriteError> {
    Ok(match value {
        Value::Null => "NULL".to_string(),
        Value::Boolean(true) => "TRUE".to_string(),
        Value::Boolean(false) => "FALSE".to_string(),
        Value::Number(number) if !number.is_finite() => {
            return Err(WriteError::unsupported(path, format!("{number} has no SQL literal")))
        }
        Value::Number(number) => number.to_string(),
        Value::String(text) => quote_string(text, dialect),
        Value::Sequence(_) | Value::Record(_) => {
            return Err(WriteError::unsupported(path, "nested values must be flattened first"))
        }
    })
}

fn quote_string(text: &str, dialect: SqlDialect) -> String {
    match dialect {
        SqlDialect::Ansi => format!("'{}'", text.replace('\'', "''")),
        SqlDialect::Mysql => {
            let mut out = String::with_capacity(text.len() + 2);
            out.push('\'');
            for ch in text.chars() {
                match ch {
                    '\\' => out.push_str("\\\\"),
                    '\'' => out.push_str("\\'"),
                    '\0' => out.push_str("\\0"),
                    '\n' => out.push_str("\\n"),
                    '\r' => out.push_str("\\r"),
                    '\u{1a}' => out.push_str("\\Z"),
                    other => out.push(other),
                }
            }
            out.push('\'');
            out
        }
    }
}
