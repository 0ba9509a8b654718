// SQL DDL schema parser
//
// Pattern based, covering the MySQL subset used by installation scripts. The
// header pattern finds the table name; the body and suffix are delimited by a
// quote-aware scan. A statement whose parentheses never balance is skipped.

use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;
use tracing::debug;

use crate::index::schema::{
    strip_table_prefix, Column, IndexDef, IndexKind, TableSchema, DEFAULT_TABLE_PREFIX,
};
use crate::index::Parser;

fn regex(pattern: &str) -> Regex {
    Regex::new(pattern).expect("static SQL pattern is valid")
}

static CREATE_TABLE_HEADER: Lazy<Regex> = Lazy::new(|| regex(r"(?i)\bCREATE\s+TABLE\b"));

static CREATE_TABLE: Lazy<Regex> = Lazy::new(|| {
    regex(r#"(?is)^CREATE\s+TABLE\s+(?:IF\s+NOT\s+EXISTS\s+)?[`"\[]?([^`"\]\s(]+)[`"\]]?\s*\("#)
});

static BLOCK_COMMENT: Lazy<Regex> = Lazy::new(|| regex(r"(?s)/\*.*?\*/"));
static LINE_COMMENT: Lazy<Regex> = Lazy::new(|| regex(r"(?m)^\s*--.*$"));

static PRIMARY_KEY: Lazy<Regex> = Lazy::new(|| {
    regex(r#"(?is)^(?:CONSTRAINT\s+\S+\s+)?PRIMARY\s+KEY\s*(?:USING\s+\w+\s*)?\((.+)\)"#)
});
static UNIQUE_KEY: Lazy<Regex> = Lazy::new(|| {
    regex(r#"(?is)^(?:CONSTRAINT\s+\S+\s+)?UNIQUE(?:\s+(?:KEY|INDEX))?\s*(?:[`"]?(\w+)[`"]?\s*)?\((.+)\)"#)
});
static FULLTEXT_KEY: Lazy<Regex> = Lazy::new(|| {
    regex(r#"(?is)^FULLTEXT(?:\s+(?:KEY|INDEX))?\s*(?:[`"]?(\w+)[`"]?\s*)?\((.+)\)"#)
});
static PLAIN_KEY: Lazy<Regex> =
    Lazy::new(|| regex(r#"(?is)^(?:KEY|INDEX)\s+(?:[`"]?(\w+)[`"]?\s*)?\((.+)\)"#));

static COLUMN: Lazy<Regex> = Lazy::new(|| {
    regex(r#"(?is)^[`"]?(\w+)[`"]?\s+(\w+(?:\s*\([^)]*\))?(?:\s+(?:unsigned|signed|zerofill))*)"#)
});
static NOT_NULL: Lazy<Regex> = Lazy::new(|| regex(r"(?i)\bNOT\s+NULL\b"));
static DEFAULT_VALUE: Lazy<Regex> = Lazy::new(|| {
    regex(r#"(?is)\bDEFAULT\s+('(?:[^'\\]|\\.|'')*'|"(?:[^"\\]|\\.)*"|\([^)]*\)|[^\s,]+)"#)
});
static AUTO_INCREMENT: Lazy<Regex> = Lazy::new(|| regex(r"(?i)\bAUTO_INCREMENT\b"));
static COLUMN_COMMENT: Lazy<Regex> =
    Lazy::new(|| regex(r"(?is)\bCOMMENT\s+'((?:[^'\\]|\\.|'')*)'"));
static SIZE_SUFFIX: Lazy<Regex> = Lazy::new(|| regex(r"\s*\(\s*\d+\s*\)$"));
static SORT_SUFFIX: Lazy<Regex> = Lazy::new(|| regex(r"(?i)\s+(?:ASC|DESC)$"));

static ENGINE: Lazy<Regex> = Lazy::new(|| regex(r"(?i)\bENGINE\s*=\s*(\w+)"));
static CHARSET: Lazy<Regex> =
    Lazy::new(|| regex(r"(?i)\b(?:CHARSET|CHARACTER\s+SET)\s*=?\s*(\w+)"));
static TABLE_COMMENT: Lazy<Regex> =
    Lazy::new(|| regex(r"(?is)\bCOMMENT\s*=?\s*'((?:[^'\\]|\\.|'')*)'"));

/// Leading words that mark a body part as a constraint, never a column
const RESERVED_LEADERS: &[&str] = &[
    "PRIMARY",
    "KEY",
    "INDEX",
    "UNIQUE",
    "FULLTEXT",
    "CONSTRAINT",
    "FOREIGN",
    "CHECK",
];

/// Parses `CREATE TABLE` statements out of SQL scripts
#[derive(Debug, Clone)]
pub struct SqlSchemaParser {
    table_prefix: String,
    extensions: Vec<String>,
}

impl Default for SqlSchemaParser {
    fn default() -> Self {
        Self::new(DEFAULT_TABLE_PREFIX, &["sql".to_string()])
    }
}

impl SqlSchemaParser {
    pub fn new(table_prefix: &str, extensions: &[String]) -> Self {
        Self {
            table_prefix: table_prefix.to_string(),
            extensions: extensions.to_vec(),
        }
    }

    /// Every well-formed `CREATE TABLE` in `sql`, in source order
    pub fn parse_tables(&self, sql: &str) -> Vec<TableSchema> {
        let sql = BLOCK_COMMENT.replace_all(sql, "");
        let sql = LINE_COMMENT.replace_all(&sql, "");

        // Cut at each header so a statement that fails to match cannot run on
        // into the next one.
        let starts: Vec<usize> = CREATE_TABLE_HEADER.find_iter(&sql).map(|m| m.start()).collect();
        let mut tables = Vec::new();

        for (i, &start) in starts.iter().enumerate() {
            let end = starts.get(i + 1).copied().unwrap_or(sql.len());
            let segment = &sql[start..end];

            match self.parse_statement(segment) {
                Some(table) => tables.push(table),
                None => debug!(
                    "Skipping unparsable statement: {}",
                    segment.lines().next().unwrap_or_default().trim()
                ),
            }
        }

        tables
    }

    fn parse_statement(&self, statement: &str) -> Option<TableSchema> {
        let caps = CREATE_TABLE.captures(statement)?;
        let qualified_name = caps.get(1)?.as_str().to_string();
        let body_start = caps.get(0)?.end();

        let rest = &statement[body_start..];
        let body_len = closing_paren(rest)?;
        let body = &rest[..body_len];
        let tail = &rest[body_len + 1..];
        let suffix = &tail[..statement_end(tail)];

        let mut columns = Vec::new();
        let mut indexes = Vec::new();
        for part in split_top_level(body) {
            if let Some(index) = parse_index(&part) {
                indexes.push(index);
            } else if let Some(column) = parse_column(&part) {
                columns.push(column);
            }
        }

        Some(TableSchema {
            short_name: strip_table_prefix(&qualified_name, &self.table_prefix).to_string(),
            qualified_name,
            columns,
            indexes,
            engine: capture(&ENGINE, suffix),
            charset: capture(&CHARSET, suffix),
            comment: capture(&TABLE_COMMENT, suffix),
        })
    }
}

impl Parser for SqlSchemaParser {
    type Output = TableSchema;

    fn can_parse(&self, file_path: &str) -> bool {
        Path::new(file_path)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| self.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
            .unwrap_or(false)
    }

    fn parse(&self, content: &str, _file_path: &str) -> anyhow::Result<Vec<TableSchema>> {
        Ok(self.parse_tables(content))
    }
}

fn capture(re: &Regex, text: &str) -> Option<String> {
    re.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Tracks whether a scan position sits inside a quoted string or identifier
#[derive(Debug, Default)]
struct QuoteState {
    quote: Option<char>,
    escaped: bool,
}

impl QuoteState {
    /// Feed one character; true when it is structural (outside any quote)
    fn structural(&mut self, ch: char) -> bool {
        if let Some(q) = self.quote {
            if self.escaped {
                self.escaped = false;
            } else if ch == '\\' {
                self.escaped = true;
            } else if ch == q {
                self.quote = None;
            }
            return false;
        }
        if matches!(ch, '\'' | '"' | '`') {
            self.quote = Some(ch);
            return false;
        }
        true
    }
}

/// Byte offset of the `)` closing a body whose `(` was already consumed
fn closing_paren(text: &str) -> Option<usize> {
    let mut state = QuoteState::default();
    let mut depth: usize = 0;
    for (offset, ch) in text.char_indices() {
        if !state.structural(ch) {
            continue;
        }
        match ch {
            '(' => depth += 1,
            ')' if depth == 0 => return Some(offset),
            ')' => depth -= 1,
            _ => {}
        }
    }
    None
}

/// Byte offset of the first `;` outside quotes, or the text length
fn statement_end(text: &str) -> usize {
    let mut state = QuoteState::default();
    text.char_indices()
        .find(|&(_, ch)| state.structural(ch) && ch == ';')
        .map(|(offset, _)| offset)
        .unwrap_or(text.len())
}

/// Split at commas that sit at parenthesis depth zero and outside quotes
pub fn split_top_level(body: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth: usize = 0;
    let mut state = QuoteState::default();

    for ch in body.chars() {
        if !state.structural(ch) {
            current.push(ch);
            continue;
        }

        match ch {
            '(' => {
                depth += 1;
                current.push(ch);
            }
            ')' => {
                depth = depth.saturating_sub(1);
                current.push(ch);
            }
            ',' if depth == 0 => {
                parts.push(std::mem::take(&mut current));
            }
            _ => current.push(ch),
        }
    }
    parts.push(current);

    parts
        .into_iter()
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect()
}

/// Interpret a body part as a key definition
pub fn parse_index(part: &str) -> Option<IndexDef> {
    if let Some(caps) = PRIMARY_KEY.captures(part) {
        return Some(IndexDef {
            name: "PRIMARY".to_string(),
            kind: IndexKind::Primary,
            columns: index_columns(caps.get(1)?.as_str()),
        });
    }

    let keyed = [
        (&*UNIQUE_KEY, IndexKind::Unique),
        (&*FULLTEXT_KEY, IndexKind::Fulltext),
        (&*PLAIN_KEY, IndexKind::Index),
    ];
    for (re, kind) in keyed {
        if let Some(caps) = re.captures(part) {
            let columns = index_columns(caps.get(2)?.as_str());
            let name = caps
                .get(1)
                .map(|m| m.as_str().to_string())
                .or_else(|| columns.first().cloned())
                .unwrap_or_default();
            return Some(IndexDef { name, kind, columns });
        }
    }

    None
}

fn index_columns(list: &str) -> Vec<String> {
    split_top_level(list)
        .into_iter()
        .map(|col| {
            let col = SORT_SUFFIX.replace(&col, "");
            let col = SIZE_SUFFIX.replace(&col, "");
            col.trim().trim_matches(|c| c == '`' || c == '"' || c == '\'').to_string()
        })
        .filter(|col| !col.is_empty())
        .collect()
}

/// Interpret a body part as a column definition
pub fn parse_column(part: &str) -> Option<Column> {
    // A quoted leader is always an identifier, so `key` can still name a column
    let leader = part.split_whitespace().next()?;
    let quoted = leader.starts_with('`') || leader.starts_with('"');
    if !quoted && RESERVED_LEADERS.iter().any(|r| r.eq_ignore_ascii_case(leader)) {
        return None;
    }

    let caps = COLUMN.captures(part)?;
    let name = caps.get(1)?.as_str().to_string();
    let type_match = caps.get(2)?;
    let type_ = type_match.as_str().split_whitespace().collect::<Vec<_>>().join(" ");

    let rest = &part[type_match.end()..];
    let comment = COLUMN_COMMENT.captures(rest).and_then(|c| c.get(1));
    let attributes = match comment {
        Some(_) => COLUMN_COMMENT.replace(rest, "").into_owned(),
        None => rest.to_string(),
    };

    Some(Column {
        name,
        type_,
        nullable: !NOT_NULL.is_match(&attributes),
        default_value: capture(&DEFAULT_VALUE, &attributes),
        auto_increment: AUTO_INCREMENT.is_match(&attributes),
        comment: comment.map(|m| m.as_str().to_string()),
    })
}
