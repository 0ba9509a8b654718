// Plain-text rendering of query outcomes

use std::fmt::Write as _;
use std::path::Path;

use crate::index::schema::TableSchema;
use crate::index::{Declaration, EventInfo, Index, IndexStats, Method};
use crate::query::{EventListing, LookupOutcome, MemberLookup, SchemaOutcome, SearchResults};

/// Make a source path safe to show: relative to the source root, or just the
/// file name when it lies elsewhere. Absolute server paths never leave here.
pub fn sanitize_path(path: &str, source_root: &Path) -> String {
    let path = Path::new(path);
    if let Ok(relative) = path.strip_prefix(source_root) {
        return relative.to_string_lossy().replace('\\', "/");
    }

    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "<unknown>".to_string())
}

/// Cut `text` to at most `max_chars` characters at a line boundary and
/// append a notice. Text within budget is returned unchanged.
pub fn truncate(text: &str, max_chars: usize) -> String {
    let total = text.chars().count();
    if total <= max_chars {
        return text.to_string();
    }

    let byte_limit = text
        .char_indices()
        .nth(max_chars)
        .map(|(i, _)| i)
        .unwrap_or(text.len());
    let head = &text[..byte_limit];
    let cut = head.rfind('\n').unwrap_or(byte_limit);
    let kept = &text[..cut];

    format!(
        "{}\n\n[Output truncated: showing {} of {} characters. Narrow the query to see more.]",
        kept.trim_end(),
        kept.chars().count(),
        total
    )
}

/// Strip comment delimiters and leading asterisks from a doc block
pub fn clean_doc(raw: &str) -> String {
    let body = raw
        .trim()
        .trim_start_matches("/**")
        .trim_end_matches("*/");

    let lines: Vec<&str> = body
        .lines()
        .map(|line| {
            let line = line.trim();
            line.strip_prefix('*').map(str::trim_start).unwrap_or(line)
        })
        .collect();

    lines.join("\n").trim().to_string()
}

fn summary_line(doc: &Option<String>) -> Option<String> {
    doc.as_deref()
        .map(clean_doc)
        .and_then(|d| d.lines().find(|l| !l.is_empty() && !l.starts_with('@')).map(str::to_string))
}

pub fn render_declaration(declaration: &Declaration, source_root: &Path) -> String {
    let mut out = String::new();
    let kind = if declaration.is_abstract {
        format!("abstract {}", declaration.kind.as_str())
    } else {
        declaration.kind.as_str().to_string()
    };

    let _ = writeln!(out, "## {} {}", kind, declaration.fully_qualified_name);
    let _ = writeln!(out, "File: {}", sanitize_path(&declaration.source_path, source_root));
    if let Some(parent) = &declaration.extends_name {
        let _ = writeln!(out, "Extends: {}", parent);
    }
    if !declaration.implements_names.is_empty() {
        let _ = writeln!(out, "Implements: {}", declaration.implements_names.join(", "));
    }
    if !declaration.traits_used.is_empty() {
        let _ = writeln!(out, "Uses: {}", declaration.traits_used.join(", "));
    }
    if let Some(doc) = &declaration.doc_comment {
        let _ = writeln!(out, "\n{}", clean_doc(doc));
    }

    if !declaration.constants.is_empty() {
        let _ = writeln!(out, "\n### Constants");
        for constant in &declaration.constants {
            match &constant.value {
                Some(value) => {
                    let _ = writeln!(out, "- {} const {} = {}", constant.visibility.as_str(), constant.name, value);
                }
                None => {
                    let _ = writeln!(out, "- {} const {}", constant.visibility.as_str(), constant.name);
                }
            }
        }
    }

    if !declaration.properties.is_empty() {
        let _ = writeln!(out, "\n### Properties");
        for property in &declaration.properties {
            let mut line = format!("- {}", property.visibility.as_str());
            if property.is_static {
                line.push_str(" static");
            }
            if let Some(type_) = &property.type_ {
                let _ = write!(line, " {}", type_);
            }
            let _ = write!(line, " ${}", property.name);
            if let Some(default) = &property.default_value {
                let _ = write!(line, " = {}", default);
            }
            let _ = writeln!(out, "{}", line);
        }
    }

    if !declaration.methods.is_empty() {
        let _ = writeln!(out, "\n### Methods");
        for method in &declaration.methods {
            match summary_line(&method.doc_comment) {
                Some(summary) => {
                    let _ = writeln!(out, "- {}\n  {}", method.signature(), summary);
                }
                None => {
                    let _ = writeln!(out, "- {}", method.signature());
                }
            }
        }
    }

    out.trim_end().to_string()
}

fn render_method(declaration: &Declaration, method: &Method, source_root: &Path) -> String {
    let mut out = format!(
        "## {}::{}\nFile: {}\n\n{}",
        declaration.fully_qualified_name,
        method.name,
        sanitize_path(&declaration.source_path, source_root),
        method.signature()
    );
    if let Some(doc) = &method.doc_comment {
        let _ = write!(out, "\n\n{}", clean_doc(doc));
    }
    out
}

pub fn render_lookup(outcome: &LookupOutcome, query: &str, source_root: &Path) -> String {
    match outcome {
        LookupOutcome::Found {
            declaration,
            member: None,
        } => render_declaration(declaration, source_root),
        LookupOutcome::Found {
            declaration,
            member: Some(MemberLookup::Found(method)),
        } => render_method(declaration, method, source_root),
        LookupOutcome::Found {
            declaration,
            member: Some(MemberLookup::Missing { member, candidates }),
        } => {
            let mut out = format!(
                "{} {} was found, but it has no method '{}'.",
                declaration.kind.as_str(),
                declaration.fully_qualified_name,
                member
            );
            if candidates.is_empty() {
                let names: Vec<&str> = declaration.methods.iter().map(|m| m.name.as_str()).collect();
                if !names.is_empty() {
                    let _ = write!(out, "\nAvailable methods: {}", names.join(", "));
                }
            } else {
                let _ = write!(out, "\nSimilar methods: {}", candidates.join(", "));
            }
            out
        }
        LookupOutcome::Ambiguous { candidates, total } => {
            let mut out = format!("'{}' matches {} declarations:\n", query, total);
            for fqn in candidates {
                let _ = writeln!(out, "- {}", fqn);
            }
            if *total > candidates.len() {
                let _ = writeln!(out, "... and {} more", total - candidates.len());
            }
            out.push_str("Use a fully-qualified name to pick one.");
            out
        }
        LookupOutcome::NotFound { suggestions } => {
            let mut out = format!("No class, interface or trait matches '{}'.", query);
            if suggestions.is_empty() {
                out.push_str("\nTry the search command, or rebuild the index if the source changed.");
            } else {
                out.push_str("\nDid you mean:");
                for fqn in suggestions {
                    let _ = write!(out, "\n- {}", fqn);
                }
            }
            out
        }
    }
}

pub fn render_search(results: &SearchResults, query: &str, source_root: &Path) -> String {
    if results.total == 0 {
        let mut out = format!("No results for '{}'.", query);
        if !results.suggestions.is_empty() {
            out.push_str("\nSuggestions:");
            for suggestion in &results.suggestions {
                let _ = write!(out, "\n- {}", suggestion);
            }
        }
        return out;
    }

    let mut out = format!(
        "Found {} results for '{}' (showing {}):\n",
        results.total,
        query,
        results.hits.len()
    );
    for hit in &results.hits {
        let owner = &hit.declaration.fully_qualified_name;
        let location = sanitize_path(&hit.declaration.source_path, source_root);
        let label = match hit.kind {
            crate::query::HitKind::Class => owner.clone(),
            _ => format!("{}::{}", owner, hit.name),
        };
        match &hit.detail {
            Some(detail) => {
                let _ = writeln!(out, "- [{}] {} ({}) {}", hit.kind.as_str(), label, detail, location);
            }
            None => {
                let _ = writeln!(out, "- [{}] {} {}", hit.kind.as_str(), label, location);
            }
        }
    }
    out.trim_end().to_string()
}

pub fn render_event(event: &EventInfo) -> String {
    let mut out = format!("- {}", event.fully_qualified_name);
    if !event.parameters.is_empty() {
        let _ = write!(out, "\n  Parameters: {}", event.parameters.join(", "));
    }
    if let Some(summary) = summary_line(&event.description) {
        let _ = write!(out, "\n  {}", summary);
    }
    out
}

pub fn render_events(listing: &EventListing) -> String {
    if listing.total == 0 {
        return "No events indexed.".to_string();
    }

    let mut out = format!("Events: {} of {}\n", listing.matched, listing.total);
    for event in &listing.events {
        let _ = writeln!(out, "{}", render_event(event));
    }
    out.trim_end().to_string()
}

pub fn render_table(table: &TableSchema) -> String {
    let mut out = format!("## Table {} ({})\n", table.qualified_name, table.short_name);

    let mut meta = Vec::new();
    if let Some(engine) = &table.engine {
        meta.push(format!("Engine: {}", engine));
    }
    if let Some(charset) = &table.charset {
        meta.push(format!("Charset: {}", charset));
    }
    if !meta.is_empty() {
        let _ = writeln!(out, "{}", meta.join(", "));
    }
    if let Some(comment) = &table.comment {
        let _ = writeln!(out, "{}", comment);
    }

    out.push_str("\n| Column | Type | Null | Default | Extra |\n|---|---|---|---|---|\n");
    for column in &table.columns {
        let mut extra = Vec::new();
        if column.auto_increment {
            extra.push("auto_increment".to_string());
        }
        if let Some(comment) = &column.comment {
            extra.push(comment.clone());
        }
        let _ = writeln!(
            out,
            "| {} | {} | {} | {} | {} |",
            column.name,
            column.type_,
            if column.nullable { "YES" } else { "NO" },
            column.default_value.as_deref().unwrap_or(""),
            extra.join("; ")
        );
    }

    if !table.indexes.is_empty() {
        out.push_str("\nIndexes:\n");
        for index in &table.indexes {
            let _ = writeln!(out, "- {} ({}): {}", index.name, index.kind.as_str(), index.columns.join(", "));
        }
    }

    out.trim_end().to_string()
}

pub fn render_schema(outcome: &SchemaOutcome, list_all: bool) -> String {
    match outcome {
        SchemaOutcome::Table(table) => render_table(table),
        SchemaOutcome::Tables(tables) if list_all => {
            let mut out = format!("{} tables:\n", tables.len());
            for table in tables {
                let _ = writeln!(out, "- {} ({} columns)", table.short_name, table.columns.len());
            }
            out.trim_end().to_string()
        }
        SchemaOutcome::Tables(tables) => tables
            .iter()
            .map(|t| render_table(t))
            .collect::<Vec<_>>()
            .join("\n\n"),
        SchemaOutcome::Ambiguous(tables) => {
            let mut out = format!("{} tables match:\n", tables.len());
            for table in tables {
                let _ = writeln!(out, "- {}", table.short_name);
            }
            out.push_str("Ask for one by its exact name.");
            out
        }
        SchemaOutcome::NotFound { query, suggestions } => {
            let mut out = format!("No table matches '{}'.", query);
            if !suggestions.is_empty() {
                let _ = write!(out, "\nDid you mean: {}", suggestions.join(", "));
            }
            out
        }
    }
}

pub fn render_stats(stats: &IndexStats, index: &Index) -> String {
    let mut out = String::from("Index Statistics:\n");
    let _ = writeln!(out, "- Built: {}", index.built_at.format("%Y-%m-%d %H:%M:%S UTC"));
    if let Some(commit) = &index.source_commit {
        let _ = writeln!(out, "- Commit: {}", commit);
    }
    if let Some(branch) = &index.source_branch {
        let _ = writeln!(out, "- Branch: {}", branch);
    }
    let _ = writeln!(
        out,
        "- Declarations: {} ({} classes, {} interfaces, {} traits)",
        stats.declarations(),
        stats.classes,
        stats.interfaces,
        stats.traits
    );
    let _ = writeln!(out, "- Methods: {}", stats.methods);
    let _ = writeln!(out, "- Properties: {}", stats.properties);
    let _ = writeln!(out, "- Constants: {}", stats.constants);
    let _ = writeln!(out, "- Namespaces: {}", stats.namespaces);
    let _ = writeln!(out, "- Events: {}", stats.events);
    let _ = write!(out, "- Tables: {}", stats.tables);
    out
}
