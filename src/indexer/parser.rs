// PHP declaration parser

use std::path::Path;
use tracing::debug;
use tree_sitter::{Node, Parser as TreeParser, Tree};

use crate::index::{
    Constant, Declaration, DeclarationKind, Method, Parameter, Parser, Property, Visibility,
};

/// Rendered in place of default values that are not scalar literals
pub const NON_SCALAR_PLACEHOLDER: &str = "...";

const MODIFIER_KINDS: &[&str] = &[
    "visibility_modifier",
    "static_modifier",
    "abstract_modifier",
    "final_modifier",
    "readonly_modifier",
    "var_modifier",
];

const TYPE_KINDS: &[&str] = &[
    "primitive_type",
    "named_type",
    "optional_type",
    "union_type",
    "intersection_type",
    "disjunctive_normal_form_type",
];

/// PHP parser using tree-sitter
#[derive(Clone)]
pub struct PhpParser {
    language: tree_sitter::Language,
    extensions: Vec<String>,
}

/// Mutable state carried through one file's walk
struct ExtractCtx<'a> {
    content: &'a str,
    file_path: &'a str,
    namespace: String,
    declarations: Vec<Declaration>,
}

impl<'a> ExtractCtx<'a> {
    fn text(&self, node: Node) -> &'a str {
        &self.content[node.byte_range()]
    }
}

impl Default for PhpParser {
    fn default() -> Self {
        Self::new()
    }
}

impl PhpParser {
    pub fn new() -> Self {
        Self::with_extensions(&["php".to_string()])
    }

    pub fn with_extensions(extensions: &[String]) -> Self {
        Self {
            language: tree_sitter_php::LANGUAGE_PHP.into(),
            extensions: extensions.to_vec(),
        }
    }

    fn parse_tree(&self, content: &str) -> anyhow::Result<Tree> {
        let mut parser = TreeParser::new();
        parser.set_language(&self.language)?;

        let tree = parser
            .parse(content, None)
            .ok_or_else(|| anyhow::anyhow!("Failed to parse PHP code"))?;

        Ok(tree)
    }

    fn extract_declarations(&self, tree: &Tree, content: &str, file_path: &str) -> Vec<Declaration> {
        let mut ctx = ExtractCtx {
            content,
            file_path,
            namespace: String::new(),
            declarations: Vec::new(),
        };

        self.walk_scope(tree.root_node(), &mut ctx);

        ctx.declarations
    }

    /// Visit the children of `node`, tracking the namespace in effect.
    ///
    /// `namespace Foo;` applies to the remaining siblings; `namespace Foo { }` only
    /// to its own block.
    fn walk_scope(&self, node: Node, ctx: &mut ExtractCtx) {
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            match child.kind() {
                "namespace_definition" => {
                    let name = child
                        .child_by_field_name("name")
                        .map(|n| ctx.text(n).trim_matches('\\').to_string())
                        .unwrap_or_default();

                    match child.child_by_field_name("body") {
                        Some(body) => {
                            let outer = std::mem::replace(&mut ctx.namespace, name);
                            self.walk_scope(body, ctx);
                            ctx.namespace = outer;
                        }
                        None => ctx.namespace = name,
                    }
                }
                "class_declaration" | "interface_declaration" | "trait_declaration" => {
                    if let Some(declaration) = self.extract_declaration(child, ctx) {
                        ctx.declarations.push(declaration);
                    }
                }
                _ => self.walk_scope(child, ctx),
            }
        }
    }

    fn extract_declaration(&self, node: Node, ctx: &ExtractCtx) -> Option<Declaration> {
        let name = ctx.text(node.child_by_field_name("name")?).to_string();
        let kind = match node.kind() {
            "interface_declaration" => DeclarationKind::Interface,
            "trait_declaration" => DeclarationKind::Trait,
            _ => DeclarationKind::Class,
        };

        let mut declaration = Declaration::new(name, ctx.namespace.clone(), kind, ctx.file_path);
        declaration.is_abstract = has_modifier(node, ctx, "abstract");
        declaration.doc_comment = doc_comment(node, ctx);

        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            match child.kind() {
                // Interfaces may extend several parents; only the first is kept
                "base_clause" => declaration.extends_name = type_names(child, ctx).into_iter().next(),
                "class_interface_clause" => declaration.implements_names = type_names(child, ctx),
                _ => {}
            }
        }

        if let Some(body) = node.child_by_field_name("body") {
            self.extract_members(body, ctx, &mut declaration);
        }

        Some(declaration)
    }

    fn extract_members(&self, body: Node, ctx: &ExtractCtx, declaration: &mut Declaration) {
        let mut cursor = body.walk();
        for child in body.children(&mut cursor) {
            match child.kind() {
                "method_declaration" => {
                    if let Some(method) = self.extract_method(child, ctx) {
                        if method.is_constructor() {
                            declaration.properties.extend(self.promoted_properties(child, ctx));
                        }
                        declaration.methods.push(method);
                    }
                }
                "property_declaration" => {
                    declaration.properties.extend(self.extract_properties(child, ctx));
                }
                "const_declaration" => {
                    declaration.constants.extend(self.extract_constants(child, ctx));
                }
                "use_declaration" => {
                    declaration.traits_used.extend(type_names(child, ctx));
                }
                _ => {}
            }
        }
    }

    fn extract_method(&self, node: Node, ctx: &ExtractCtx) -> Option<Method> {
        let name = ctx.text(node.child_by_field_name("name")?).to_string();

        let parameters = node
            .child_by_field_name("parameters")
            .map(|list| self.extract_parameters(list, ctx))
            .unwrap_or_default();

        let return_type = node
            .child_by_field_name("return_type")
            .map(|t| ctx.text(t).trim_start_matches(':').trim().to_string());

        Some(Method {
            name,
            visibility: visibility(node, ctx),
            is_static: has_modifier(node, ctx, "static"),
            is_abstract: has_modifier(node, ctx, "abstract"),
            parameters,
            return_type,
            doc_comment: doc_comment(node, ctx),
        })
    }

    fn extract_parameters(&self, list: Node, ctx: &ExtractCtx) -> Vec<Parameter> {
        let mut parameters = Vec::new();
        let mut cursor = list.walk();

        for child in list.named_children(&mut cursor) {
            let kind = child.kind();
            if !matches!(
                kind,
                "simple_parameter" | "variadic_parameter" | "property_promotion_parameter"
            ) {
                continue;
            }

            let raw_name = child
                .child_by_field_name("name")
                .map(|n| ctx.text(n))
                .unwrap_or_default();

            let is_by_reference = raw_name.starts_with('&')
                || child.child_by_field_name("reference_modifier").is_some()
                || first_child_of_kind(child, "reference_modifier").is_some();

            parameters.push(Parameter {
                name: variable_name(raw_name),
                type_: type_text(child, ctx),
                default_value: child
                    .child_by_field_name("default_value")
                    .map(|d| render_literal(d, ctx)),
                is_variadic: kind == "variadic_parameter",
                is_by_reference,
            });
        }

        parameters
    }

    /// Constructor parameters with a visibility modifier declare properties too
    fn promoted_properties(&self, method: Node, ctx: &ExtractCtx) -> Vec<Property> {
        let Some(list) = method.child_by_field_name("parameters") else {
            return Vec::new();
        };

        let mut properties = Vec::new();
        let mut cursor = list.walk();
        for child in list.named_children(&mut cursor) {
            if child.kind() != "property_promotion_parameter" {
                continue;
            }
            let Some(name_node) = child.child_by_field_name("name") else {
                continue;
            };

            properties.push(Property {
                name: variable_name(ctx.text(name_node)),
                visibility: visibility(child, ctx),
                is_static: false,
                type_: type_text(child, ctx),
                default_value: child
                    .child_by_field_name("default_value")
                    .map(|d| render_literal(d, ctx)),
                doc_comment: None,
            });
        }

        properties
    }

    fn extract_properties(&self, node: Node, ctx: &ExtractCtx) -> Vec<Property> {
        let visibility = visibility(node, ctx);
        let is_static = has_modifier(node, ctx, "static");
        let type_ = type_text(node, ctx);
        let doc = doc_comment(node, ctx);

        let mut properties = Vec::new();
        let mut cursor = node.walk();
        for element in node.named_children(&mut cursor) {
            if element.kind() != "property_element" {
                continue;
            }

            let Some(name_node) = element
                .child_by_field_name("name")
                .or_else(|| first_child_of_kind(element, "variable_name"))
            else {
                continue;
            };

            let default_node = element.child_by_field_name("default_value").or_else(|| {
                first_child_of_kind(element, "property_initializer").and_then(first_named_child)
            });

            properties.push(Property {
                name: variable_name(ctx.text(name_node)),
                visibility,
                is_static,
                type_: type_.clone(),
                default_value: default_node.map(|d| render_literal(d, ctx)),
                doc_comment: doc.clone(),
            });
        }

        properties
    }

    fn extract_constants(&self, node: Node, ctx: &ExtractCtx) -> Vec<Constant> {
        let visibility = visibility(node, ctx);
        let doc = doc_comment(node, ctx);

        let mut constants = Vec::new();
        let mut cursor = node.walk();
        for element in node.named_children(&mut cursor) {
            if element.kind() != "const_element" {
                continue;
            }

            let Some(name_node) = first_child_of_kind(element, "name") else {
                continue;
            };

            let value_node = element.child_by_field_name("value").or_else(|| {
                let mut inner = element.walk();
                let last = element.named_children(&mut inner).last();
                last.filter(|n| n.id() != name_node.id())
            });

            constants.push(Constant {
                name: ctx.text(name_node).to_string(),
                value: value_node.map(|v| render_literal(v, ctx)),
                visibility,
                doc_comment: doc.clone(),
            });
        }

        constants
    }
}

impl Parser for PhpParser {
    type Output = Declaration;

    fn can_parse(&self, file_path: &str) -> bool {
        Path::new(file_path)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| self.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
            .unwrap_or(false)
    }

    fn parse(&self, content: &str, file_path: &str) -> anyhow::Result<Vec<Declaration>> {
        let tree = self.parse_tree(content)?;
        if tree.root_node().has_error() {
            debug!("{} has syntax errors, keeping recognised declarations", file_path);
        }

        Ok(self.extract_declarations(&tree, content, file_path))
    }
}

fn first_child_of_kind<'t>(node: Node<'t>, kind: &str) -> Option<Node<'t>> {
    let mut cursor = node.walk();
    let found = node.children(&mut cursor).find(|c| c.kind() == kind);
    found
}

fn first_named_child(node: Node) -> Option<Node> {
    let mut cursor = node.walk();
    let found = node.named_children(&mut cursor).next();
    found
}

/// `$name`, `&$name` or `...$name` to `name`
fn variable_name(raw: &str) -> String {
    raw.trim_start_matches('&')
        .trim_start_matches("...")
        .trim_start_matches('$')
        .to_string()
}

/// Names listed in an extends, implements or trait-use clause
fn type_names(clause: Node, ctx: &ExtractCtx) -> Vec<String> {
    let mut cursor = clause.walk();
    clause
        .named_children(&mut cursor)
        .filter(|c| matches!(c.kind(), "name" | "qualified_name"))
        .map(|c| ctx.text(c).trim_start_matches('\\').to_string())
        .collect()
}

/// Type annotation rendered verbatim, so `?A`, `A|B` and `A&B` keep their syntax
fn type_text(node: Node, ctx: &ExtractCtx) -> Option<String> {
    if let Some(type_node) = node.child_by_field_name("type") {
        return Some(ctx.text(type_node).to_string());
    }

    let mut cursor = node.walk();
    let found = node
        .named_children(&mut cursor)
        .take_while(|c| c.kind() != "property_element" && c.kind() != "variable_name")
        .find(|c| TYPE_KINDS.contains(&c.kind()));
    found.map(|t| ctx.text(t).to_string())
}

fn visibility(node: Node, ctx: &ExtractCtx) -> Visibility {
    first_child_of_kind(node, "visibility_modifier")
        .map(|m| Visibility::from_keyword(ctx.text(m)))
        .unwrap_or_default()
}

fn has_modifier(node: Node, ctx: &ExtractCtx, modifier: &str) -> bool {
    let mut cursor = node.walk();
    let found = node.children(&mut cursor).any(|child| {
        let is_modifier = MODIFIER_KINDS.contains(&child.kind()) || !child.is_named();
        is_modifier && ctx.text(child).eq_ignore_ascii_case(modifier)
    });
    found
}

/// The `/** */` block directly above a node; plain comments in between are skipped
fn doc_comment(node: Node, ctx: &ExtractCtx) -> Option<String> {
    let mut prev = node.prev_sibling();
    while let Some(sibling) = prev {
        if sibling.kind() != "comment" {
            return None;
        }
        let text = ctx.text(sibling);
        if text.starts_with("/**") {
            return Some(text.to_string());
        }
        prev = sibling.prev_sibling();
    }
    None
}

/// Scalar literals keep their source text, anything else becomes a placeholder
fn render_literal(node: Node, ctx: &ExtractCtx) -> String {
    match node.kind() {
        "integer" | "float" | "string" | "encapsed_string" | "heredoc" | "nowdoc" | "boolean"
        | "null" => {
            ctx.text(node).to_string()
        }
        "unary_op_expression" => {
            let text = ctx.text(node);
            let numeric = first_named_child(node)
                .map(|operand| matches!(operand.kind(), "integer" | "float"))
                .unwrap_or(false);
            if numeric && (text.starts_with('-') || text.starts_with('+')) {
                text.to_string()
            } else {
                NON_SCALAR_PLACEHOLDER.to_string()
            }
        }
        _ => NON_SCALAR_PLACEHOLDER.to_string(),
    }
}
