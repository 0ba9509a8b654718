// Index data model and persistence

pub mod schema;
pub mod store;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Version tag written into every persisted index
pub const FORMAT_VERSION: &str = "1";

/// Declaration kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeclarationKind {
    Class,
    Interface,
    Trait,
}

impl DeclarationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeclarationKind::Class => "class",
            DeclarationKind::Interface => "interface",
            DeclarationKind::Trait => "trait",
        }
    }
}

/// Member visibility levels
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Public,
    Protected,
    Private,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Protected => "protected",
            Visibility::Private => "private",
        }
    }

    pub fn from_keyword(keyword: &str) -> Self {
        match keyword.to_ascii_lowercase().as_str() {
            "protected" => Visibility::Protected,
            "private" => Visibility::Private,
            _ => Visibility::Public,
        }
    }
}

/// A method parameter
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "type")]
    pub type_: Option<String>,
    pub default_value: Option<String>,
    pub is_variadic: bool,
    pub is_by_reference: bool,
}

impl Parameter {
    /// Render as `<type> $<name>[ = <default>]`
    pub fn signature(&self) -> String {
        let mut out = String::new();
        if let Some(type_) = &self.type_ {
            out.push_str(type_);
            out.push(' ');
        }
        if self.is_by_reference {
            out.push('&');
        }
        if self.is_variadic {
            out.push_str("...");
        }
        out.push('$');
        out.push_str(&self.name);
        if let Some(default) = &self.default_value {
            out.push_str(" = ");
            out.push_str(default);
        }
        out
    }
}

/// A method declared inside a class, interface or trait body
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Method {
    pub name: String,
    pub visibility: Visibility,
    pub is_static: bool,
    pub is_abstract: bool,
    pub parameters: Vec<Parameter>,
    pub return_type: Option<String>,
    pub doc_comment: Option<String>,
}

impl Method {
    pub fn is_constructor(&self) -> bool {
        self.name.eq_ignore_ascii_case("__construct")
    }

    pub fn signature(&self) -> String {
        let params: Vec<String> = self.parameters.iter().map(Parameter::signature).collect();
        let mut sig = String::from(self.visibility.as_str());
        if self.is_abstract {
            sig.push_str(" abstract");
        }
        if self.is_static {
            sig.push_str(" static");
        }
        sig.push_str(&format!(" function {}({})", self.name, params.join(", ")));
        if let Some(ret) = &self.return_type {
            sig.push_str(": ");
            sig.push_str(ret);
        }
        sig
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Property {
    pub name: String,
    pub visibility: Visibility,
    pub is_static: bool,
    #[serde(rename = "type")]
    pub type_: Option<String>,
    pub default_value: Option<String>,
    pub doc_comment: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Constant {
    pub name: String,
    pub value: Option<String>,
    pub visibility: Visibility,
    pub doc_comment: Option<String>,
}

/// A class, interface or trait found in a source file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Declaration {
    pub name: String,
    pub namespace: String,
    pub fully_qualified_name: String,
    pub kind: DeclarationKind,
    pub is_abstract: bool,
    pub extends_name: Option<String>,
    pub implements_names: Vec<String>,
    pub traits_used: Vec<String>,
    pub doc_comment: Option<String>,
    pub methods: Vec<Method>,
    pub properties: Vec<Property>,
    pub constants: Vec<Constant>,
    pub source_path: String,
}

impl Declaration {
    /// Create an empty declaration; the FQN is derived from namespace and name
    pub fn new(
        name: impl Into<String>,
        namespace: impl Into<String>,
        kind: DeclarationKind,
        source_path: impl Into<String>,
    ) -> Self {
        let name = name.into();
        let namespace = namespace.into();
        let fully_qualified_name = qualify(&namespace, &name);

        Self {
            name,
            namespace,
            fully_qualified_name,
            kind,
            is_abstract: false,
            extends_name: None,
            implements_names: Vec::new(),
            traits_used: Vec::new(),
            doc_comment: None,
            methods: Vec::new(),
            properties: Vec::new(),
            constants: Vec::new(),
            source_path: source_path.into(),
        }
    }

    pub fn constructor(&self) -> Option<&Method> {
        self.methods.iter().find(|m| m.is_constructor())
    }

    pub fn find_method(&self, name: &str) -> Option<&Method> {
        self.methods.iter().find(|m| m.name.eq_ignore_ascii_case(name))
    }
}

/// Join a namespace and a simple name with the PHP separator
pub fn qualify(namespace: &str, name: &str) -> String {
    let namespace = namespace.trim_matches('\\');
    if namespace.is_empty() {
        name.to_string()
    } else {
        format!("{}\\{}", namespace, name)
    }
}

/// A dispatchable event class and its constructor signature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventInfo {
    pub name: String,
    pub fully_qualified_name: String,
    pub parameters: Vec<String>,
    pub description: Option<String>,
}

/// Immutable snapshot of every declaration found under a source root
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Index {
    pub format_version: String,
    pub built_at: DateTime<Utc>,
    pub source_commit: Option<String>,
    #[serde(default)]
    pub source_branch: Option<String>,
    pub declarations: Vec<Declaration>,
    pub namespace_map: BTreeMap<String, Vec<String>>,
    pub event_map: BTreeMap<String, EventInfo>,
}

impl Index {
    /// An index with no declarations, used before the first build
    pub fn empty() -> Self {
        Self {
            format_version: FORMAT_VERSION.to_string(),
            built_at: Utc::now(),
            source_commit: None,
            source_branch: None,
            declarations: Vec::new(),
            namespace_map: BTreeMap::new(),
            event_map: BTreeMap::new(),
        }
    }

    pub fn stats(&self) -> IndexStats {
        let mut stats = IndexStats {
            namespaces: self.namespace_map.len(),
            events: self.event_map.len(),
            ..IndexStats::default()
        };

        for decl in &self.declarations {
            match decl.kind {
                DeclarationKind::Class => stats.classes += 1,
                DeclarationKind::Interface => stats.interfaces += 1,
                DeclarationKind::Trait => stats.traits += 1,
            }
            stats.methods += decl.methods.len();
            stats.properties += decl.properties.len();
            stats.constants += decl.constants.len();
        }

        stats
    }
}

/// Summary counts over an index
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    pub classes: usize,
    pub interfaces: usize,
    pub traits: usize,
    pub methods: usize,
    pub properties: usize,
    pub constants: usize,
    pub namespaces: usize,
    pub events: usize,
    pub tables: usize,
}

impl IndexStats {
    pub fn declarations(&self) -> usize {
        self.classes + self.interfaces + self.traits
    }
}

/// Parser trait for the different source kinds fed through the tree walker
pub trait Parser {
    type Output;

    fn can_parse(&self, file_path: &str) -> bool;
    fn parse(&self, content: &str, file_path: &str) -> anyhow::Result<Vec<Self::Output>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qualify() {
        assert_eq!(qualify("", "Widget"), "Widget");
        assert_eq!(qualify("App\\Model", "Widget"), "App\\Model\\Widget");
        assert_eq!(qualify("\\App\\", "Widget"), "App\\Widget");
    }

    #[test]
    fn test_parameter_signature() {
        let param = Parameter {
            name: "host".to_string(),
            type_: Some("string".to_string()),
            default_value: Some("'localhost'".to_string()),
            ..Parameter::default()
        };
        assert_eq!(param.signature(), "string $host = 'localhost'");

        let variadic = Parameter {
            name: "args".to_string(),
            is_variadic: true,
            is_by_reference: true,
            ..Parameter::default()
        };
        assert_eq!(variadic.signature(), "&...$args");
    }

    #[test]
    fn test_serialized_field_names() {
        let decl = Declaration::new("Widget", "App", DeclarationKind::Class, "/src/Widget.php");
        let value = serde_json::to_value(&decl).unwrap();

        assert_eq!(value["fullyQualifiedName"], "App\\Widget");
        assert_eq!(value["kind"], "class");
        assert_eq!(value["sourcePath"], "/src/Widget.php");
        assert!(value.get("implementsNames").is_some());
    }

    #[test]
    fn test_stats_counts_kinds() {
        let mut index = Index::empty();
        let mut class = Declaration::new("A", "App", DeclarationKind::Class, "a.php");
        class.methods.push(Method {
            name: "run".to_string(),
            ..Method::default()
        });
        index.declarations.push(class);
        index
            .declarations
            .push(Declaration::new("B", "App", DeclarationKind::Interface, "b.php"));

        let stats = index.stats();
        assert_eq!(stats.classes, 1);
        assert_eq!(stats.interfaces, 1);
        assert_eq!(stats.methods, 1);
        assert_eq!(stats.declarations(), 2);
    }
}
