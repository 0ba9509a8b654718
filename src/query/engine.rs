// Query execution engine

use std::str::FromStr;

use strsim::levenshtein;

use crate::config::{Config, QueryConfig, SchemaConfig};
use crate::error::QueryError;
use crate::index::schema::{strip_table_prefix, SchemaIndex, TableSchema};
use crate::index::store::Snapshot;
use crate::index::{Declaration, EventInfo, Index, Method};
use crate::query::suggest::keyword_suggestions;

/// Result of resolving a requested member on a selected declaration
#[derive(Debug, Clone, PartialEq)]
pub enum MemberLookup<'a> {
    Found(&'a Method),
    /// The class resolved but has no method with that name; `candidates`
    /// holds every method whose name contains the request
    Missing { member: String, candidates: Vec<String> },
}

#[derive(Debug, Clone, PartialEq)]
pub enum LookupOutcome<'a> {
    Found {
        declaration: &'a Declaration,
        member: Option<MemberLookup<'a>>,
    },
    /// Several declarations matched; `candidates` is capped, `total` is not
    Ambiguous { candidates: Vec<String>, total: usize },
    /// Nothing matched; `suggestions` may be empty
    NotFound { suggestions: Vec<String> },
}

/// Restricts which member kinds a search looks at
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TypeFilter {
    #[default]
    All,
    Class,
    Method,
    Constant,
    Property,
}

impl TypeFilter {
    fn allows(&self, kind: HitKind) -> bool {
        match self {
            TypeFilter::All => true,
            TypeFilter::Class => kind == HitKind::Class,
            TypeFilter::Method => kind == HitKind::Method,
            TypeFilter::Constant => kind == HitKind::Constant,
            TypeFilter::Property => kind == HitKind::Property,
        }
    }
}

impl FromStr for TypeFilter {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "" | "all" => Ok(TypeFilter::All),
            "class" => Ok(TypeFilter::Class),
            "method" => Ok(TypeFilter::Method),
            "constant" => Ok(TypeFilter::Constant),
            "property" => Ok(TypeFilter::Property),
            _ => Err(QueryError::InvalidTypeFilter(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitKind {
    Class,
    Method,
    Constant,
    Property,
}

impl HitKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            HitKind::Class => "class",
            HitKind::Method => "method",
            HitKind::Constant => "constant",
            HitKind::Property => "property",
        }
    }
}

/// One search row: the matched element and the declaration it belongs to
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit<'a> {
    pub kind: HitKind,
    pub name: String,
    pub declaration: &'a Declaration,
    /// Method signature or constant value, when there is one
    pub detail: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchResults<'a> {
    pub hits: Vec<SearchHit<'a>>,
    pub total: usize,
    pub suggestions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EventListing<'a> {
    pub events: Vec<&'a EventInfo>,
    /// Size of the event map before filtering
    pub total: usize,
    pub matched: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaQuery<'q> {
    Table(&'q str),
    Component(&'q str),
    All,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SchemaOutcome<'a> {
    Table(&'a TableSchema),
    /// Component and list-all results
    Tables(Vec<&'a TableSchema>),
    Ambiguous(Vec<&'a TableSchema>),
    NotFound { query: String, suggestions: Vec<String> },
}

/// Query engine over one immutable snapshot
pub struct QueryEngine<'a> {
    index: &'a Index,
    schema: &'a SchemaIndex,
    limits: QueryConfig,
    schema_config: SchemaConfig,
}

impl<'a> QueryEngine<'a> {
    pub fn new(snapshot: &'a Snapshot) -> Self {
        Self::with_config(snapshot, &Config::default())
    }

    pub fn with_config(snapshot: &'a Snapshot, config: &Config) -> Self {
        Self {
            index: &snapshot.index,
            schema: &snapshot.schema,
            limits: config.query.clone(),
            schema_config: config.schema.clone(),
        }
    }

    pub fn default_limit(&self) -> usize {
        self.limits.default_limit
    }

    /// Resolve a class, interface or trait by name, optionally down to a method
    pub fn lookup_by_name(&self, query: &str, member: Option<&str>) -> LookupOutcome<'a> {
        let query = query.trim().trim_start_matches('\\');
        let needle = query.to_lowercase();
        let declarations = &self.index.declarations;

        let exact_fqn: Vec<&'a Declaration> = declarations
            .iter()
            .filter(|d| d.fully_qualified_name.eq_ignore_ascii_case(query))
            .collect();
        let exact_name: Vec<&'a Declaration> = declarations
            .iter()
            .filter(|d| d.name.eq_ignore_ascii_case(query))
            .collect();

        let selected = if exact_fqn.len() == 1 {
            exact_fqn[0]
        } else if exact_name.len() == 1 {
            exact_name[0]
        } else {
            let partial: Vec<&'a Declaration> = declarations
                .iter()
                .filter(|d| {
                    d.name.to_lowercase().contains(&needle)
                        || d.fully_qualified_name.to_lowercase().contains(&needle)
                })
                .collect();

            match partial.len() {
                0 => {
                    return LookupOutcome::NotFound {
                        suggestions: self.similar_names(&needle),
                    }
                }
                1 => partial[0],
                total => {
                    return LookupOutcome::Ambiguous {
                        candidates: partial
                            .iter()
                            .take(self.limits.max_ambiguous)
                            .map(|d| d.fully_qualified_name.clone())
                            .collect(),
                        total,
                    }
                }
            }
        };

        let member = member
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(|m| resolve_member(selected, m));

        LookupOutcome::Found {
            declaration: selected,
            member,
        }
    }

    /// Closest simple names by edit distance, nearest first
    fn similar_names(&self, needle: &str) -> Vec<String> {
        let mut scored: Vec<(usize, &str)> = self
            .index
            .declarations
            .iter()
            .map(|d| (levenshtein(needle, &d.name.to_lowercase()), d.fully_qualified_name.as_str()))
            .filter(|(distance, _)| *distance <= self.limits.max_edit_distance)
            .collect();
        scored.sort();
        scored.dedup_by(|a, b| a.1 == b.1);

        scored
            .into_iter()
            .take(self.limits.max_suggestions)
            .map(|(_, fqn)| fqn.to_string())
            .collect()
    }

    /// Case-insensitive substring search across declarations and their members
    pub fn search(&self, query: &str, filter: TypeFilter, limit: usize) -> SearchResults<'a> {
        let needle = query.trim().to_lowercase();
        let matches = |text: &str| text.to_lowercase().contains(&needle);
        let doc_matches = |doc: &Option<String>| doc.as_deref().map(matches).unwrap_or(false);

        let mut hits = Vec::new();
        for declaration in &self.index.declarations {
            if filter.allows(HitKind::Class)
                && (matches(&declaration.name)
                    || matches(&declaration.fully_qualified_name)
                    || doc_matches(&declaration.doc_comment))
            {
                hits.push(SearchHit {
                    kind: HitKind::Class,
                    name: declaration.name.clone(),
                    declaration,
                    detail: Some(declaration.kind.as_str().to_string()),
                });
            }

            if filter.allows(HitKind::Method) {
                for method in &declaration.methods {
                    if matches(&method.name) || doc_matches(&method.doc_comment) {
                        hits.push(SearchHit {
                            kind: HitKind::Method,
                            name: method.name.clone(),
                            declaration,
                            detail: Some(method.signature()),
                        });
                    }
                }
            }

            if filter.allows(HitKind::Constant) {
                for constant in declaration.constants.iter().filter(|c| matches(&c.name)) {
                    hits.push(SearchHit {
                        kind: HitKind::Constant,
                        name: constant.name.clone(),
                        declaration,
                        detail: constant.value.clone(),
                    });
                }
            }

            if filter.allows(HitKind::Property) {
                for property in declaration.properties.iter().filter(|p| matches(&p.name)) {
                    hits.push(SearchHit {
                        kind: HitKind::Property,
                        name: property.name.clone(),
                        declaration,
                        detail: property.type_.clone(),
                    });
                }
            }
        }

        // Exact name, then prefix, then shorter names; sort_by_key is stable
        hits.sort_by_key(|hit| {
            let name = hit.name.to_lowercase();
            let rank = if name == needle {
                0
            } else if name.starts_with(&needle) {
                1
            } else {
                2
            };
            (rank, hit.name.len())
        });

        let total = hits.len();
        hits.truncate(limit);

        SearchResults {
            hits,
            total,
            suggestions: if total == 0 {
                keyword_suggestions(query)
            } else {
                Vec::new()
            },
        }
    }

    pub fn list_events(&self, filter: Option<&str>, namespace: Option<&str>) -> EventListing<'a> {
        let filter = filter.map(str::to_lowercase).filter(|f| !f.is_empty());
        let namespace = namespace
            .map(|n| n.trim_start_matches('\\').to_lowercase())
            .filter(|n| !n.is_empty());

        let events: Vec<&'a EventInfo> = self
            .index
            .event_map
            .values()
            .filter(|event| {
                let fqn = event.fully_qualified_name.to_lowercase();
                let text_ok = filter.as_ref().map_or(true, |f| {
                    event.name.to_lowercase().contains(f)
                        || fqn.contains(f)
                        || event
                            .description
                            .as_deref()
                            .map(|d| d.to_lowercase().contains(f))
                            .unwrap_or(false)
                });
                let namespace_ok = namespace.as_ref().map_or(true, |n| fqn.contains(n));
                text_ok && namespace_ok
            })
            .collect();

        EventListing {
            total: self.index.event_map.len(),
            matched: events.len(),
            events,
        }
    }

    pub fn lookup_schema(&self, query: SchemaQuery) -> SchemaOutcome<'a> {
        match query {
            SchemaQuery::Table(name) => self.lookup_table(name),
            SchemaQuery::Component(component) => self.lookup_component(component),
            SchemaQuery::All => SchemaOutcome::Tables(self.schema.tables.iter().collect()),
        }
    }

    fn lookup_table(&self, name: &str) -> SchemaOutcome<'a> {
        let short = strip_table_prefix(name.trim(), &self.schema_config.table_prefix);
        if let Some(table) = self.schema.table_map.get(short) {
            return SchemaOutcome::Table(table);
        }

        let needle = short.to_lowercase();
        let mut partial: Vec<&'a TableSchema> = self
            .schema
            .table_map
            .values()
            .filter(|t| {
                t.short_name.to_lowercase().contains(&needle)
                    || t.qualified_name.to_lowercase().contains(&needle)
            })
            .collect();

        match partial.len() {
            0 => SchemaOutcome::NotFound {
                query: name.to_string(),
                suggestions: self.similar_tables(&needle),
            },
            1 => SchemaOutcome::Table(partial.remove(0)),
            _ => SchemaOutcome::Ambiguous(partial),
        }
    }

    fn lookup_component(&self, component: &str) -> SchemaOutcome<'a> {
        let lowered = component.trim().to_lowercase();
        let prefix = lowered
            .strip_prefix(&self.schema_config.component_prefix.to_lowercase())
            .unwrap_or(&lowered)
            .to_string();
        let nested = format!("{}_", prefix);

        let tables: Vec<&'a TableSchema> = self
            .schema
            .table_map
            .values()
            .filter(|t| {
                let short = t.short_name.to_lowercase();
                short == prefix || short.starts_with(&nested)
            })
            .collect();

        if tables.is_empty() {
            SchemaOutcome::NotFound {
                query: component.to_string(),
                suggestions: Vec::new(),
            }
        } else {
            SchemaOutcome::Tables(tables)
        }
    }

    fn similar_tables(&self, needle: &str) -> Vec<String> {
        let mut scored: Vec<(usize, &str)> = self
            .schema
            .table_map
            .keys()
            .map(|short| (levenshtein(needle, &short.to_lowercase()), short.as_str()))
            .filter(|(distance, _)| *distance <= self.limits.max_edit_distance)
            .collect();
        scored.sort();

        scored
            .into_iter()
            .take(self.limits.max_suggestions)
            .map(|(_, short)| short.to_string())
            .collect()
    }
}

fn resolve_member<'a>(declaration: &'a Declaration, member: &str) -> MemberLookup<'a> {
    if let Some(method) = declaration.find_method(member) {
        return MemberLookup::Found(method);
    }

    let needle = member.to_lowercase();
    MemberLookup::Missing {
        member: member.to_string(),
        candidates: declaration
            .methods
            .iter()
            .filter(|m| m.name.to_lowercase().contains(&needle))
            .map(|m| m.name.clone())
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::schema::TableSchema;
    use crate::index::{Constant, DeclarationKind, Property};
    use crate::indexer::events::build_event_map;
    use proptest::prelude::*;

    fn decl(namespace: &str, name: &str) -> Declaration {
        Declaration::new(name, namespace, DeclarationKind::Class, format!("/srv/src/{}.php", name))
    }

    fn method(name: &str) -> Method {
        Method {
            name: name.to_string(),
            ..Method::default()
        }
    }

    fn snapshot(declarations: Vec<Declaration>) -> Snapshot {
        let mut index = Index::empty();
        index.event_map = build_event_map(&declarations);
        index.declarations = declarations;
        Snapshot::new(index, SchemaIndex::default())
    }

    fn table(short: &str) -> TableSchema {
        TableSchema {
            qualified_name: format!("#__{}", short),
            short_name: short.to_string(),
            columns: Vec::new(),
            indexes: Vec::new(),
            engine: None,
            charset: None,
            comment: None,
        }
    }

    fn schema_snapshot(shorts: &[&str]) -> Snapshot {
        let schema = SchemaIndex::from_tables(shorts.iter().map(|s| table(s)).collect());
        Snapshot::new(Index::empty(), schema)
    }

    fn found_fqn(outcome: &LookupOutcome) -> Option<String> {
        match outcome {
            LookupOutcome::Found { declaration, .. } => Some(declaration.fully_qualified_name.clone()),
            _ => None,
        }
    }

    #[test]
    fn test_exact_simple_name_beats_substring() {
        let snap = snapshot(vec![decl("App\\Ui", "Widget"), decl("App\\Ui", "WidgetFactory")]);
        let engine = QueryEngine::new(&snap);

        let outcome = engine.lookup_by_name("widget", None);
        assert_eq!(found_fqn(&outcome).as_deref(), Some("App\\Ui\\Widget"));
    }

    #[test]
    fn test_exact_fqn_precedence() {
        let snap = snapshot(vec![
            decl("App", "Widget"),
            decl("Lib", "Widget"),
            decl("App\\Widget", "Part"),
        ]);
        let engine = QueryEngine::new(&snap);

        let outcome = engine.lookup_by_name("\\app\\WIDGET", None);
        assert_eq!(found_fqn(&outcome).as_deref(), Some("App\\Widget"));
    }

    #[test]
    fn test_duplicate_simple_names_are_ambiguous() {
        let snap = snapshot(vec![decl("App", "Widget"), decl("Lib", "Widget")]);
        let engine = QueryEngine::new(&snap);

        match engine.lookup_by_name("Widget", None) {
            LookupOutcome::Ambiguous { candidates, total } => {
                assert_eq!(total, 2);
                assert_eq!(candidates, vec!["App\\Widget", "Lib\\Widget"]);
            }
            other => panic!("expected ambiguous, got {:?}", other),
        }
    }

    #[test]
    fn test_single_substring_match_selects() {
        let snap = snapshot(vec![decl("App", "ArticleModel"), decl("App", "Router")]);
        let engine = QueryEngine::new(&snap);

        let outcome = engine.lookup_by_name("article", None);
        assert_eq!(found_fqn(&outcome).as_deref(), Some("App\\ArticleModel"));
    }

    #[test]
    fn test_not_found_suggests_close_names() {
        let snap = snapshot(vec![decl("App", "Widget"), decl("App", "Gadget"), decl("App", "Unrelated")]);
        let engine = QueryEngine::new(&snap);

        match engine.lookup_by_name("Wodget", None) {
            LookupOutcome::NotFound { suggestions } => {
                assert_eq!(suggestions[0], "App\\Widget");
                assert!(suggestions.contains(&"App\\Gadget".to_string()));
                assert!(!suggestions.contains(&"App\\Unrelated".to_string()));
            }
            other => panic!("expected not found, got {:?}", other),
        }

        match engine.lookup_by_name("CompletelyDifferent", None) {
            LookupOutcome::NotFound { suggestions } => assert!(suggestions.is_empty()),
            other => panic!("expected not found, got {:?}", other),
        }
    }

    #[test]
    fn test_member_lookup() {
        let mut widget = decl("App", "Widget");
        widget.methods = vec![method("render"), method("renderChildren"), method("save")];
        let snap = snapshot(vec![widget]);
        let engine = QueryEngine::new(&snap);

        match engine.lookup_by_name("Widget", Some("RENDER")) {
            LookupOutcome::Found {
                member: Some(MemberLookup::Found(m)),
                ..
            } => assert_eq!(m.name, "render"),
            other => panic!("expected member, got {:?}", other),
        }

        match engine.lookup_by_name("Widget", Some("rend")) {
            LookupOutcome::Found {
                member: Some(MemberLookup::Missing { candidates, .. }),
                ..
            } => assert_eq!(candidates, vec!["render", "renderChildren"]),
            other => panic!("expected missing member, got {:?}", other),
        }
    }

    proptest! {
        #[test]
        fn prop_ambiguity_is_capped(n in 2usize..30) {
            let decls = (0..n).map(|i| decl("App", &format!("Item{}Handler", i))).collect();
            let snap = snapshot(decls);
            let engine = QueryEngine::new(&snap);

            match engine.lookup_by_name("Handler", None) {
                LookupOutcome::Ambiguous { candidates, total } => {
                    prop_assert_eq!(candidates.len(), n.min(10));
                    prop_assert_eq!(total, n);
                }
                other => prop_assert!(false, "expected ambiguous, got {:?}", other),
            }
        }

        #[test]
        fn prop_search_total_vs_shown(n in 1usize..40, limit in 1usize..20) {
            let decls = (0..n).map(|i| decl("App", &format!("Report{}", i))).collect();
            let snap = snapshot(decls);
            let engine = QueryEngine::new(&snap);

            let results = engine.search("report", TypeFilter::Class, limit);
            prop_assert_eq!(results.total, n);
            prop_assert_eq!(results.hits.len(), n.min(limit));
        }
    }

    #[test]
    fn test_search_ranking() {
        let mut widget = decl("App", "Widget");
        widget.methods = vec![method("getWidgetName"), method("widget")];
        widget.constants = vec![Constant {
            name: "WIDGET_TYPE".to_string(),
            value: Some("'box'".to_string()),
            ..Constant::default()
        }];
        widget.properties = vec![Property {
            name: "widgets".to_string(),
            ..Property::default()
        }];
        let snap = snapshot(vec![decl("App", "SuperWidgetFactory"), widget]);
        let engine = QueryEngine::new(&snap);

        let results = engine.search("widget", TypeFilter::All, 10);
        let names: Vec<&str> = results.hits.iter().map(|h| h.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["Widget", "widget", "widgets", "WIDGET_TYPE", "getWidgetName", "SuperWidgetFactory"]
        );
        assert_eq!(results.total, 6);
        assert!(results.suggestions.is_empty());
    }

    #[test]
    fn test_search_filters_and_docs() {
        let mut widget = decl("App", "Widget");
        let mut render = method("render");
        render.doc_comment = Some("/** Draws the widget to html */".to_string());
        widget.methods = vec![render];
        let snap = snapshot(vec![widget]);
        let engine = QueryEngine::new(&snap);

        let methods = engine.search("html", TypeFilter::Method, 10);
        assert_eq!(methods.total, 1);
        assert_eq!(methods.hits[0].kind, HitKind::Method);

        assert_eq!(engine.search("html", TypeFilter::Class, 10).total, 0);
        assert_eq!(engine.search("html", TypeFilter::Constant, 10).total, 0);
    }

    #[test]
    fn test_search_no_match() {
        let snap = snapshot(vec![decl("App", "Widget")]);
        let engine = QueryEngine::new(&snap);

        let results = engine.search("zzzznomatch", TypeFilter::All, 10);
        assert!(results.hits.is_empty());
        assert_eq!(results.total, 0);
        assert!(!results.suggestions.is_empty());
    }

    #[test]
    fn test_type_filter_parsing() {
        assert_eq!("Method".parse::<TypeFilter>().unwrap(), TypeFilter::Method);
        assert_eq!("".parse::<TypeFilter>().unwrap(), TypeFilter::All);
        assert_eq!(
            "function".parse::<TypeFilter>(),
            Err(QueryError::InvalidTypeFilter("function".to_string()))
        );
    }

    #[test]
    fn test_list_events_filters() {
        let mut login = decl("App\\Event\\User", "LoginEvent");
        login.doc_comment = Some("/** Fired after authentication */".to_string());
        let snap = snapshot(vec![
            login,
            decl("App\\Event\\Content", "SaveEvent"),
            decl("App\\Event", "EventDispatcher"),
            decl("App\\Model", "Widget"),
        ]);
        let engine = QueryEngine::new(&snap);

        let all = engine.list_events(None, None);
        assert_eq!(all.total, 2);
        assert_eq!(all.matched, 2);

        let by_doc = engine.list_events(Some("AUTHENTICATION"), None);
        assert_eq!(by_doc.matched, 1);
        assert_eq!(by_doc.total, 2);

        let by_namespace = engine.list_events(None, Some("\\app\\event\\content"));
        assert_eq!(by_namespace.matched, 1);
        assert_eq!(by_namespace.events[0].name, "SaveEvent");
    }

    #[test]
    fn test_lookup_table_exact_and_prefixed() {
        let snap = schema_snapshot(&["content", "content_frontpage", "users"]);
        let engine = QueryEngine::new(&snap);

        for query in ["content", "#__content"] {
            match engine.lookup_schema(SchemaQuery::Table(query)) {
                SchemaOutcome::Table(t) => assert_eq!(t.short_name, "content"),
                other => panic!("expected table, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_lookup_table_fallbacks() {
        let snap = schema_snapshot(&["content", "content_frontpage", "users"]);
        let engine = QueryEngine::new(&snap);

        match engine.lookup_schema(SchemaQuery::Table("front")) {
            SchemaOutcome::Table(t) => assert_eq!(t.short_name, "content_frontpage"),
            other => panic!("expected table, got {:?}", other),
        }
        match engine.lookup_schema(SchemaQuery::Table("CONT")) {
            SchemaOutcome::Ambiguous(tables) => assert_eq!(tables.len(), 2),
            other => panic!("expected ambiguous, got {:?}", other),
        }
        match engine.lookup_schema(SchemaQuery::Table("user")) {
            SchemaOutcome::Table(t) => assert_eq!(t.short_name, "users"),
            other => panic!("expected table, got {:?}", other),
        }
        match engine.lookup_schema(SchemaQuery::Table("usr")) {
            SchemaOutcome::NotFound { suggestions, .. } => assert_eq!(suggestions, vec!["users"]),
            other => panic!("expected not found, got {:?}", other),
        }
    }

    #[test]
    fn test_lookup_component() {
        let snap = schema_snapshot(&["content", "content_frontpage", "contentitem_tag_map", "users"]);
        let engine = QueryEngine::new(&snap);

        match engine.lookup_schema(SchemaQuery::Component("com_content")) {
            SchemaOutcome::Tables(tables) => {
                let names: Vec<&str> = tables.iter().map(|t| t.short_name.as_str()).collect();
                assert_eq!(names, vec!["content", "content_frontpage"]);
            }
            other => panic!("expected tables, got {:?}", other),
        }
        assert!(matches!(
            engine.lookup_schema(SchemaQuery::Component("com_banners")),
            SchemaOutcome::NotFound { .. }
        ));
        match engine.lookup_schema(SchemaQuery::All) {
            SchemaOutcome::Tables(tables) => assert_eq!(tables.len(), 4),
            other => panic!("expected tables, got {:?}", other),
        }
    }
}
