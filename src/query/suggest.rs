// Hints shown when a search comes back empty

/// Topic keyword and the searches worth trying instead
const KEYWORD_HINTS: &[(&str, &[&str])] = &[
    ("database", &["DatabaseDriver", "DatabaseQuery", "DatabaseInterface"]),
    ("db", &["DatabaseDriver", "DatabaseQuery"]),
    ("query", &["DatabaseQuery", "QueryInterface"]),
    ("sql", &["DatabaseQuery", "lookup_schema"]),
    ("table", &["Table", "lookup_schema"]),
    ("event", &["Event", "list_events"]),
    ("listener", &["Event", "Subscriber"]),
    ("plugin", &["CMSPlugin", "PluginInterface"]),
    ("module", &["ModuleHelper", "ModuleDispatcher"]),
    ("component", &["ComponentHelper", "MVCFactory"]),
    ("controller", &["BaseController", "FormController"]),
    ("model", &["BaseModel", "ListModel", "AdminModel"]),
    ("view", &["HtmlView", "AbstractView"]),
    ("form", &["Form", "FormField", "FormRule"]),
    ("field", &["FormField", "ListField"]),
    ("user", &["User", "UserHelper", "Authentication"]),
    ("auth", &["Authentication", "AuthenticationResponse"]),
    ("login", &["Authentication", "UserHelper"]),
    ("session", &["Session", "SessionInterface"]),
    ("cache", &["Cache", "CacheController"]),
    ("config", &["Registry", "ComponentHelper"]),
    ("router", &["Router", "SiteRouter"]),
    ("route", &["Route", "Router"]),
    ("language", &["Language", "Text"]),
    ("translate", &["Text", "Language"]),
    ("mail", &["Mail", "MailerFactory"]),
    ("file", &["File", "Folder", "Path"]),
    ("upload", &["File", "MediaHelper"]),
    ("image", &["Image", "MediaHelper"]),
    ("http", &["Http", "HttpFactory", "Uri"]),
    ("log", &["Log", "LogEntry"]),
    ("date", &["Date", "DateTime"]),
    ("access", &["Access", "Rules"]),
    ("permission", &["Access", "Rules"]),
];

const FALLBACK_HINTS: &[&str] = &[
    "Try a shorter or partial name",
    "Search methods with --kind method",
    "List event classes with the events command",
];

/// Suggestions for a query that matched nothing; never empty
pub fn keyword_suggestions(query: &str) -> Vec<String> {
    let query = query.to_lowercase();
    let mut suggestions: Vec<String> = Vec::new();

    for (keyword, hints) in KEYWORD_HINTS {
        if query.contains(keyword) {
            for hint in *hints {
                if !suggestions.iter().any(|s| s == hint) {
                    suggestions.push(hint.to_string());
                }
            }
        }
    }

    if suggestions.is_empty() {
        suggestions = FALLBACK_HINTS.iter().map(|s| s.to_string()).collect();
    }
    suggestions
}
