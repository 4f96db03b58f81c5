//! Lowering of the tree-sitter syntax tree into a small expression AST.
//!
//! Only the expression forms a machine configuration can statically consist
//! of are modelled. Everything else becomes [`Expr::Unsupported`], which no
//! extractor accepts.

use std::path::Path;

use tree_sitter::{Language, Node, Parser, Tree};

use crate::error::ExtractError;

/// Which tree-sitter grammar a file is parsed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dialect {
    #[default]
    TypeScript,
    /// TypeScript with JSX. Required for `.tsx` and `.jsx` files.
    Tsx,
}

impl Dialect {
    /// Picks the grammar from a file extension.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("tsx" | "jsx") => Self::Tsx,
            _ => Self::TypeScript,
        }
    }

    pub fn language(self) -> Language {
        match self {
            Self::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            Self::Tsx => tree_sitter_typescript::LANGUAGE_TSX.into(),
        }
    }
}

pub(crate) fn parse(source: &str, dialect: Dialect) -> Result<Tree, ExtractError> {
    let mut parser = Parser::new();
    parser.set_language(&dialect.language())?;
    parser.parse(source, None).ok_or(ExtractError::Parse)
}

/// A statically inspectable expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Object(Vec<Property>),
    Array(Vec<Expr>),
    String(String),
    /// Numeric literal, as written.
    Number(String),
    Bool(bool),
    Undefined,
    Null,
    /// Any function-like expression. Its body is never looked at.
    Function,
    Ident(String),
    Member { object: Box<Expr>, property: String },
    Call { callee: Box<Expr>, args: Vec<Expr> },
    Unsupported { kind: String },
}

impl Expr {
    /// A short human-readable description, used in diagnostics.
    pub fn describe(&self) -> String {
        match self {
            Self::Object(_) => "object".to_owned(),
            Self::Array(_) => "array".to_owned(),
            Self::String(value) => format!("'{value}'"),
            Self::Number(value) => value.clone(),
            Self::Bool(value) => value.to_string(),
            Self::Undefined => "undefined".to_owned(),
            Self::Null => "null".to_owned(),
            Self::Function => "function".to_owned(),
            Self::Ident(name) => name.clone(),
            Self::Member { object, property } => format!("{}.{property}", object.describe()),
            Self::Call { callee, .. } => format!("{}(...)", callee.describe()),
            Self::Unsupported { kind } => kind.replace('_', " "),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub key: PropertyKey,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyKey {
    Static(String),
    /// `[expr]: value`
    Computed,
    /// `...expr`
    Spread,
}

/// Named children of `node`, comments excluded.
pub(crate) fn named_children<'t>(node: Node<'t>) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor)
        .filter(|child| child.kind() != "comment")
        .collect()
}

pub(crate) fn text<'s>(node: Node<'_>, source: &'s str) -> &'s str {
    node.utf8_text(source.as_bytes()).unwrap_or("")
}

/// Lowers an expression node.
pub(crate) fn lower(node: Node<'_>, source: &str) -> Expr {
    match node.kind() {
        "object" => Expr::Object(
            named_children(node)
                .into_iter()
                .map(|child| lower_property(child, source))
                .collect(),
        ),
        "array" => Expr::Array(
            named_children(node)
                .into_iter()
                .map(|child| lower(child, source))
                .collect(),
        ),
        "string" => Expr::String(string_value(node, source)),
        "template_string" => match template_value(node, source) {
            Some(value) => Expr::String(value),
            None => unsupported(node),
        },
        "number" => Expr::Number(text(node, source).to_owned()),
        "true" => Expr::Bool(true),
        "false" => Expr::Bool(false),
        "null" => Expr::Null,
        "undefined" => Expr::Undefined,
        "identifier" => identifier(text(node, source)),
        "arrow_function" | "function_expression" | "function" | "generator_function" => {
            Expr::Function
        }
        "member_expression" => {
            let object = node.child_by_field_name("object");
            let property = node.child_by_field_name("property");
            match (object, property) {
                (Some(object), Some(property)) => Expr::Member {
                    object: Box::new(lower(object, source)),
                    property: text(property, source).to_owned(),
                },
                _ => unsupported(node),
            }
        }
        "call_expression" => {
            let callee = node.child_by_field_name("function");
            let args = node.child_by_field_name("arguments");
            match (callee, args) {
                (Some(callee), Some(args)) => Expr::Call {
                    callee: Box::new(lower(callee, source)),
                    args: named_children(args)
                        .into_iter()
                        .map(|arg| lower(arg, source))
                        .collect(),
                },
                _ => unsupported(node),
            }
        }
        // `x as 'literal'` asserts the literal; any other assertion is
        // transparent.
        "as_expression" => {
            let children = named_children(node);
            match (children.first(), children.last()) {
                (_, Some(last)) if children.len() > 1 && last.kind() == "literal_type" => {
                    match named_children(*last).first() {
                        Some(literal) => lower(*literal, source),
                        None => unsupported(*last),
                    }
                }
                (Some(inner), _) => lower(*inner, source),
                _ => unsupported(node),
            }
        }
        "satisfies_expression" | "parenthesized_expression" | "non_null_expression" => {
            match named_children(node).first() {
                Some(inner) => lower(*inner, source),
                None => unsupported(node),
            }
        }
        "type_assertion" => match named_children(node).last() {
            Some(inner) => lower(*inner, source),
            None => unsupported(node),
        },
        "unary_expression" => lower_unary(node, source),
        _ => unsupported(node),
    }
}

fn lower_unary(node: Node<'_>, source: &str) -> Expr {
    let operator = node.child_by_field_name("operator").map(|op| text(op, source));
    let argument = node.child_by_field_name("argument");
    match (operator, argument) {
        (Some("void"), Some(_)) => Expr::Undefined,
        (Some(sign @ ("-" | "+")), Some(argument)) => match lower(argument, source) {
            Expr::Number(value) if sign == "-" => Expr::Number(format!("-{value}")),
            number @ Expr::Number(_) => number,
            _ => unsupported(node),
        },
        (Some("!"), Some(argument)) => match lower(argument, source) {
            Expr::Bool(value) => Expr::Bool(!value),
            Expr::Number(value) => Expr::Bool(value.parse::<f64>().is_ok_and(|n| n == 0.0)),
            _ => unsupported(node),
        },
        _ => unsupported(node),
    }
}

fn lower_property(node: Node<'_>, source: &str) -> Property {
    match node.kind() {
        "pair" => {
            let key = node
                .child_by_field_name("key")
                .map(|key| property_key(key, source))
                .unwrap_or(PropertyKey::Computed);
            let value = node
                .child_by_field_name("value")
                .map(|value| lower(value, source))
                .unwrap_or_else(|| unsupported(node));
            Property { key, value }
        }
        "shorthand_property_identifier" => {
            let name = text(node, source);
            Property {
                key: PropertyKey::Static(name.to_owned()),
                value: identifier(name),
            }
        }
        "method_definition" => Property {
            key: node
                .child_by_field_name("name")
                .map(|name| property_key(name, source))
                .unwrap_or(PropertyKey::Computed),
            value: Expr::Function,
        },
        "spread_element" => Property {
            key: PropertyKey::Spread,
            value: named_children(node)
                .first()
                .map(|inner| lower(*inner, source))
                .unwrap_or_else(|| unsupported(node)),
        },
        _ => Property {
            key: PropertyKey::Computed,
            value: unsupported(node),
        },
    }
}

fn property_key(node: Node<'_>, source: &str) -> PropertyKey {
    match node.kind() {
        "property_identifier" | "identifier" | "private_property_identifier" | "number" => {
            PropertyKey::Static(text(node, source).to_owned())
        }
        "string" => PropertyKey::Static(string_value(node, source)),
        _ => PropertyKey::Computed,
    }
}

fn identifier(name: &str) -> Expr {
    match name {
        "undefined" => Expr::Undefined,
        _ => Expr::Ident(name.to_owned()),
    }
}

fn unsupported(node: Node<'_>) -> Expr {
    Expr::Unsupported {
        kind: node.kind().to_owned(),
    }
}

/// The value of a quoted string literal.
pub(crate) fn string_value(node: Node<'_>, source: &str) -> String {
    let mut value = String::new();
    for part in named_children(node) {
        match part.kind() {
            "escape_sequence" => unescape(text(part, source), &mut value),
            _ => value.push_str(text(part, source)),
        }
    }
    value
}

/// The value of a template literal without substitutions.
fn template_value(node: Node<'_>, source: &str) -> Option<String> {
    let parts = named_children(node);
    if parts.iter().any(|part| part.kind() == "template_substitution") {
        return None;
    }
    // Everything between the backticks that is not an escape is verbatim.
    let mut value = String::new();
    let mut cursor = node.start_byte() + 1;
    for escape in parts.iter().filter(|part| part.kind() == "escape_sequence") {
        value.push_str(source.get(cursor..escape.start_byte())?);
        unescape(text(*escape, source), &mut value);
        cursor = escape.end_byte();
    }
    value.push_str(source.get(cursor..node.end_byte().checked_sub(1)?)?);
    Some(value)
}

fn unescape(sequence: &str, out: &mut String) {
    let body = sequence.strip_prefix('\\').unwrap_or(sequence);
    match body {
        "n" => out.push('\n'),
        "t" => out.push('\t'),
        "r" => out.push('\r'),
        "0" => out.push('\0'),
        "b" => out.push('\u{8}'),
        "f" => out.push('\u{c}'),
        "v" => out.push('\u{b}'),
        _ => {
            let code = body
                .strip_prefix("u{")
                .and_then(|hex| hex.strip_suffix('}'))
                .or_else(|| body.strip_prefix('u'))
                .or_else(|| body.strip_prefix('x'))
                .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                .and_then(char::from_u32);
            match code {
                Some(c) => out.push(c),
                // Line continuations and escaped quotes keep the escaped text.
                None => out.push_str(body.trim_start_matches(['\n', '\r'])),
            }
        }
    }
}
