use anyhow::Result;
use serde_json::{json, Value};

use crate::config::Config;
use crate::frontend::{ToolArgs, ToolRegistry};

/// Run one registry tool against the project's snapshot and print its answer
async fn run_tool(project: &str, config: Config, tool: &str, args: ToolArgs) -> Result<()> {
    let Some(ctx) = super::open_context(project, config).await? else {
        return Ok(());
    };

    let registry = ToolRegistry::new();
    let output = registry.call(tool, &ctx, &args)?;
    println!("{}", output);
    Ok(())
}

fn tool_args<const N: usize>(pairs: [(&str, Option<Value>); N]) -> ToolArgs {
    pairs
        .into_iter()
        .filter_map(|(key, value)| value.map(|v| (key.to_string(), v)))
        .collect()
}

pub async fn lookup(project: &str, config: Config, name: String, member: Option<String>) -> Result<()> {
    let args = tool_args([("name", Some(json!(name))), ("member", member.map(Value::from))]);
    run_tool(project, config, "lookup_class", args).await
}

pub async fn search(
    project: &str,
    config: Config,
    query: String,
    kind: String,
    limit: Option<usize>,
) -> Result<()> {
    let args = tool_args([
        ("query", Some(json!(query))),
        ("type", Some(json!(kind))),
        ("limit", limit.map(Value::from)),
    ]);
    run_tool(project, config, "search", args).await
}

pub async fn events(
    project: &str,
    config: Config,
    filter: Option<String>,
    namespace: Option<String>,
) -> Result<()> {
    let args = tool_args([
        ("filter", filter.map(Value::from)),
        ("namespace", namespace.map(Value::from)),
    ]);
    run_tool(project, config, "list_events", args).await
}

pub async fn schema(
    project: &str,
    config: Config,
    table: Option<String>,
    component: Option<String>,
    all: bool,
) -> Result<()> {
    let args = tool_args([
        ("table", table.map(Value::from)),
        ("component", component.map(Value::from)),
        ("list_all", all.then(|| Value::from(true))),
    ]);
    run_tool(project, config, "lookup_schema", args).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_arguments_are_dropped() {
        let built = tool_args([("filter", None), ("namespace", Some(json!("App\\Event")))]);
        assert_eq!(built.len(), 1);
        assert_eq!(built["namespace"], json!("App\\Event"));
    }
}
