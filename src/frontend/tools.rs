// Query tool registry and handlers

use anyhow::Result;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

use crate::config::Config;
use crate::error::QueryError;
use crate::frontend::text;
use crate::index::store::Snapshot;
use crate::query::{QueryEngine, SchemaQuery, TypeFilter};

const EMPTY_INDEX: &str = "The index is empty. Run `phpindex build` first.";
const EMPTY_SCHEMA: &str = "No schema has been indexed. Check `project.schema_root` and run `phpindex build`.";

/// Everything a handler may read: one snapshot plus the settings that shape output
pub struct QueryContext {
    pub snapshot: Arc<Snapshot>,
    pub config: Config,
    /// Root that source paths are shown relative to
    pub source_root: PathBuf,
}

impl QueryContext {
    pub fn new(snapshot: Arc<Snapshot>, config: Config, source_root: PathBuf) -> Self {
        Self {
            snapshot,
            config,
            source_root,
        }
    }

    pub fn engine(&self) -> QueryEngine<'_> {
        QueryEngine::with_config(&self.snapshot, &self.config)
    }
}

pub type ToolArgs = HashMap<String, Value>;
pub type ToolHandler = fn(&QueryContext, &ToolArgs) -> Result<String>;

/// Tool definition as listed to a frontend
#[derive(Debug, Clone, Serialize)]
pub struct Tool {
    pub name: &'static str,
    pub description: &'static str,
    pub input_schema: Value,
}

/// Handlers keyed by tool name, built once and shared by reference
pub struct ToolRegistry {
    tools: Vec<(Tool, ToolHandler)>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        let mut registry = Self { tools: Vec::new() };

        registry.register(
            Tool {
                name: "lookup_class",
                description: "Look up a class, interface or trait by name, optionally down to one method",
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "name": { "type": "string", "description": "Simple or fully-qualified name" },
                        "member": { "type": "string", "description": "Method name" }
                    },
                    "required": ["name"]
                }),
            },
            lookup_class,
        );
        registry.register(
            Tool {
                name: "search",
                description: "Search declarations and members by substring",
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "query": { "type": "string", "description": "Search text" },
                        "type": {
                            "type": "string",
                            "enum": ["all", "class", "method", "constant", "property"],
                            "default": "all"
                        },
                        "limit": { "type": "integer", "default": 10, "description": "Maximum rows shown" }
                    },
                    "required": ["query"]
                }),
            },
            search,
        );
        registry.register(
            Tool {
                name: "list_events",
                description: "List event classes and their constructor parameters",
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "filter": { "type": "string", "description": "Match name, class or description" },
                        "namespace": { "type": "string", "description": "Match the event class namespace" }
                    }
                }),
            },
            list_events,
        );
        registry.register(
            Tool {
                name: "lookup_schema",
                description: "Show database table definitions",
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "table": { "type": "string", "description": "Table name, with or without prefix" },
                        "component": { "type": "string", "description": "Component whose tables to show" },
                        "list_all": { "type": "boolean", "description": "List every table" }
                    }
                }),
            },
            lookup_schema,
        );
        registry.register(
            Tool {
                name: "index_stats",
                description: "Summary counts for the current index",
                input_schema: json!({ "type": "object", "properties": {} }),
            },
            index_stats,
        );

        registry
    }

    pub fn register(&mut self, tool: Tool, handler: ToolHandler) {
        self.tools.retain(|(existing, _)| existing.name != tool.name);
        self.tools.push((tool, handler));
    }

    pub fn list(&self) -> Vec<&Tool> {
        self.tools.iter().map(|(tool, _)| tool).collect()
    }

    /// Run a tool and truncate its text to the configured budget
    pub fn call(&self, name: &str, ctx: &QueryContext, args: &ToolArgs) -> Result<String> {
        let handler = self
            .tools
            .iter()
            .find(|(tool, _)| tool.name == name)
            .map(|(_, handler)| *handler)
            .ok_or_else(|| QueryError::UnknownTool(name.to_string()))?;

        debug!("Calling tool {} with {} arguments", name, args.len());
        let output = handler(ctx, args)?;
        Ok(text::truncate(&output, ctx.config.output.max_chars))
    }
}

fn optional_str<'a>(args: &'a ToolArgs, name: &'static str) -> Option<&'a str> {
    args.get(name)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn required_str<'a>(args: &'a ToolArgs, name: &'static str) -> Result<&'a str, QueryError> {
    optional_str(args, name).ok_or(QueryError::MissingArgument(name))
}

fn optional_usize(args: &ToolArgs, name: &'static str) -> Result<Option<usize>, QueryError> {
    match args.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_u64()
            .filter(|n| *n > 0)
            .map(|n| Some(n as usize))
            .ok_or_else(|| QueryError::InvalidArgument {
                name,
                reason: format!("expected a positive integer, got {}", value),
            }),
    }
}

fn lookup_class(ctx: &QueryContext, args: &ToolArgs) -> Result<String> {
    let name = required_str(args, "name")?;
    if ctx.snapshot.index.declarations.is_empty() {
        return Ok(EMPTY_INDEX.to_string());
    }

    let outcome = ctx.engine().lookup_by_name(name, optional_str(args, "member"));
    Ok(text::render_lookup(&outcome, name, &ctx.source_root))
}

fn search(ctx: &QueryContext, args: &ToolArgs) -> Result<String> {
    let query = required_str(args, "query")?;
    let filter: TypeFilter = optional_str(args, "type").unwrap_or("all").parse()?;
    let engine = ctx.engine();
    let limit = optional_usize(args, "limit")?.unwrap_or(engine.default_limit());

    if ctx.snapshot.index.declarations.is_empty() {
        return Ok(EMPTY_INDEX.to_string());
    }

    let results = engine.search(query, filter, limit);
    Ok(text::render_search(&results, query, &ctx.source_root))
}

fn list_events(ctx: &QueryContext, args: &ToolArgs) -> Result<String> {
    if ctx.snapshot.index.declarations.is_empty() {
        return Ok(EMPTY_INDEX.to_string());
    }

    let listing = ctx
        .engine()
        .list_events(optional_str(args, "filter"), optional_str(args, "namespace"));
    Ok(text::render_events(&listing))
}

fn lookup_schema(ctx: &QueryContext, args: &ToolArgs) -> Result<String> {
    let list_all = args.get("list_all").and_then(|v| v.as_bool()).unwrap_or(false);
    let query = if let Some(table) = optional_str(args, "table") {
        SchemaQuery::Table(table)
    } else if let Some(component) = optional_str(args, "component") {
        SchemaQuery::Component(component)
    } else if list_all {
        SchemaQuery::All
    } else {
        return Err(QueryError::MissingArgument("table, component or list_all").into());
    };

    if ctx.snapshot.schema.is_empty() {
        return Ok(EMPTY_SCHEMA.to_string());
    }

    let outcome = ctx.engine().lookup_schema(query);
    Ok(text::render_schema(&outcome, matches!(query, SchemaQuery::All)))
}

fn index_stats(ctx: &QueryContext, _args: &ToolArgs) -> Result<String> {
    Ok(text::render_stats(&ctx.snapshot.stats(), &ctx.snapshot.index))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::schema::SchemaIndex;
    use crate::index::{Declaration, DeclarationKind, Index, Method};
    use crate::indexer::sql::SqlSchemaParser;

    fn context() -> QueryContext {
        let mut widget = Declaration::new(
            "Widget",
            "App\\Ui",
            DeclarationKind::Class,
            "/srv/project/src/Ui/Widget.php",
        );
        widget.methods.push(Method {
            name: "render".to_string(),
            ..Method::default()
        });

        let mut index = Index::empty();
        index.declarations = vec![
            widget,
            Declaration::new("WidgetFactory", "App\\Ui", DeclarationKind::Class, "/srv/project/src/Ui/WidgetFactory.php"),
        ];

        let tables = SqlSchemaParser::default().parse_tables(
            "CREATE TABLE `#__content` (`id` int NOT NULL, PRIMARY KEY (`id`)) ENGINE=InnoDB;",
        );
        let snapshot = Snapshot::new(index, SchemaIndex::from_tables(tables));
        QueryContext::new(Arc::new(snapshot), Config::default(), PathBuf::from("/srv/project/src"))
    }

    fn args(pairs: &[(&str, Value)]) -> ToolArgs {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn test_registry_lists_all_tools() {
        let registry = ToolRegistry::new();
        let names: Vec<&str> = registry.list().iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["lookup_class", "search", "list_events", "lookup_schema", "index_stats"]);
    }

    #[test]
    fn test_lookup_class_sanitizes_paths() {
        let registry = ToolRegistry::new();
        let out = registry
            .call("lookup_class", &context(), &args(&[("name", json!("Widget"))]))
            .unwrap();

        assert!(out.contains("App\\Ui\\Widget"));
        assert!(out.contains("File: Ui/Widget.php"));
        assert!(!out.contains("/srv/project"));
    }

    #[test]
    fn test_lookup_member_missing() {
        let registry = ToolRegistry::new();
        let out = registry
            .call(
                "lookup_class",
                &context(),
                &args(&[("name", json!("Widget")), ("member", json!("save"))]),
            )
            .unwrap();
        assert!(out.contains("has no method 'save'"));
        assert!(out.contains("Available methods: render"));
    }

    #[test]
    fn test_programmer_errors() {
        let registry = ToolRegistry::new();
        let ctx = context();

        let err = registry.call("lookup_class", &ctx, &ToolArgs::new()).unwrap_err();
        assert_eq!(err.downcast_ref::<QueryError>(), Some(&QueryError::MissingArgument("name")));

        let err = registry
            .call("search", &ctx, &args(&[("query", json!("w")), ("type", json!("function"))]))
            .unwrap_err();
        assert!(matches!(err.downcast_ref::<QueryError>(), Some(QueryError::InvalidTypeFilter(_))));

        let err = registry
            .call("search", &ctx, &args(&[("query", json!("w")), ("limit", json!(-1))]))
            .unwrap_err();
        assert!(matches!(err.downcast_ref::<QueryError>(), Some(QueryError::InvalidArgument { .. })));

        let err = registry.call("drop_tables", &ctx, &ToolArgs::new()).unwrap_err();
        assert!(matches!(err.downcast_ref::<QueryError>(), Some(QueryError::UnknownTool(_))));
    }

    #[test]
    fn test_search_reports_total() {
        let registry = ToolRegistry::new();
        let out = registry
            .call("search", &context(), &args(&[("query", json!("widget")), ("limit", json!(1))]))
            .unwrap();
        assert!(out.starts_with("Found 2 results for 'widget' (showing 1):"));
    }

    #[test]
    fn test_schema_and_stats() {
        let registry = ToolRegistry::new();
        let ctx = context();

        let out = registry
            .call("lookup_schema", &ctx, &args(&[("table", json!("#__content"))]))
            .unwrap();
        assert!(out.contains("## Table #__content (content)"));

        let out = registry
            .call("lookup_schema", &ctx, &args(&[("list_all", json!(true))]))
            .unwrap();
        assert!(out.starts_with("1 tables:"));

        let out = registry.call("index_stats", &ctx, &ToolArgs::new()).unwrap();
        assert!(out.contains("- Declarations: 2 (2 classes, 0 interfaces, 0 traits)"));
        assert!(out.contains("- Tables: 1"));
    }

    #[test]
    fn test_empty_index_points_at_build() {
        let registry = ToolRegistry::new();
        let ctx = QueryContext::new(Arc::new(Snapshot::empty()), Config::default(), PathBuf::from("."));

        let out = registry
            .call("lookup_class", &ctx, &args(&[("name", json!("Widget"))]))
            .unwrap();
        assert_eq!(out, EMPTY_INDEX);
    }

    #[test]
    fn test_output_is_truncated() {
        let registry = ToolRegistry::new();
        let mut ctx = context();
        ctx.config.output.max_chars = 40;

        let out = registry.call("index_stats", &ctx, &ToolArgs::new()).unwrap();
        assert!(out.contains("[Output truncated"));
    }
}
