//! Module-level view of a source file: its bindings and its machine calls.

use std::collections::{HashMap, HashSet};

use tree_sitter::{Node, Tree};

use crate::error::ExtractError;
use crate::settings::ExtractorSettings;
use crate::syntax::{self, Dialect, Expr, named_children, text};

/// How many identifier hops [`Scope::resolve`] follows.
const MAX_RESOLVE_DEPTH: usize = 16;

static FUNCTION: Expr = Expr::Function;

/// What an imported binding refers to in its module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportedName {
    Named(String),
    Default,
    Namespace,
}

/// A module-level binding.
#[derive(Debug, Clone, PartialEq)]
pub enum Binding {
    /// `const name = <expr>` and friends.
    Value(Expr),
    /// `function name() {}`
    Function,
    Import { source: String, imported: ImportedName },
}

/// The module-level bindings of one file.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    bindings: HashMap<String, Binding>,
}

impl Scope {
    pub fn binding(&self, name: &str) -> Option<&Binding> {
        self.bindings.get(name)
    }

    /// Follows identifiers through value bindings. Imports, unknown names
    /// and cycles leave the identifier as it is.
    pub fn resolve<'e>(&'e self, expr: &'e Expr) -> &'e Expr {
        let mut current = expr;
        for _ in 0..MAX_RESOLVE_DEPTH {
            let Expr::Ident(name) = current else {
                return current;
            };
            match self.bindings.get(name) {
                Some(Binding::Value(value)) => current = value,
                Some(Binding::Function) => return &FUNCTION,
                Some(Binding::Import { .. }) | None => return current,
            }
        }
        current
    }

    /// The module and export an imported local name refers to.
    pub fn import(&self, local: &str) -> Option<(&str, &ImportedName)> {
        match self.bindings.get(local)? {
            Binding::Import { source, imported } => Some((source, imported)),
            _ => None,
        }
    }

    fn declare(&mut self, name: &str, binding: Binding) {
        self.bindings.insert(name.to_owned(), binding);
    }
}

/// A call to a machine factory.
#[derive(Debug, Clone, PartialEq)]
pub struct MachineCall {
    /// Local name of the factory at the call site.
    pub callee: String,
    pub machine_id: String,
    pub config: Expr,
    pub options: Option<Expr>,
    /// 1-based line of the call.
    pub line: usize,
}

/// A parsed source file.
pub struct SourceFile<'s> {
    source: &'s str,
    tree: Tree,
    scope: Scope,
}

impl<'s> SourceFile<'s> {
    pub fn parse(source: &'s str, dialect: Dialect) -> Result<Self, ExtractError> {
        let tree = syntax::parse(source, dialect)?;
        let mut scope = Scope::default();
        for statement in named_children(tree.root_node()) {
            collect_statement(statement, source, &mut scope);
        }
        Ok(Self {
            source,
            tree,
            scope,
        })
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// Every call to a machine factory imported from the configured module,
    /// in source order.
    pub fn machine_calls(&self, settings: &ExtractorSettings) -> Result<Vec<MachineCall>, ExtractError> {
        let mut factories = HashSet::new();
        for (local, binding) in &self.scope.bindings {
            let Binding::Import { source, imported } = binding else {
                continue;
            };
            if *source != settings.import_source {
                continue;
            }
            match imported {
                ImportedName::Named(name) if settings.is_factory(name) => {
                    factories.insert(local.as_str());
                }
                ImportedName::Namespace => {
                    return Err(ExtractError::NamespaceImport {
                        alias: local.clone(),
                        module: source.clone(),
                    });
                }
                _ => {}
            }
        }
        if factories.is_empty() {
            return Ok(Vec::new());
        }

        let mut calls = Vec::new();
        let mut stack = vec![self.tree.root_node()];
        while let Some(node) = stack.pop() {
            let mut children = match node.kind() {
                "import_statement" => continue,
                "call_expression" => {
                    let callee = node
                        .child_by_field_name("function")
                        .filter(|callee| callee.kind() == "identifier")
                        .filter(|callee| factories.contains(text(*callee, self.source)));
                    match callee {
                        Some(callee) => {
                            calls.push(self.machine_call(node, text(callee, self.source))?);
                            named_children(node)
                                .into_iter()
                                .filter(|child| child.id() != callee.id())
                                .collect()
                        }
                        None => named_children(node),
                    }
                }
                // Any other use of a factory hides its machine from extraction.
                "identifier" | "shorthand_property_identifier"
                    if factories.contains(text(node, self.source)) =>
                {
                    return Err(ExtractError::FactoryNotCalled {
                        name: text(node, self.source).to_owned(),
                        line: node.start_position().row + 1,
                    });
                }
                _ => named_children(node),
            };
            children.reverse();
            stack.extend(children);
        }
        Ok(calls)
    }

    fn machine_call(&self, node: Node<'_>, callee: &str) -> Result<MachineCall, ExtractError> {
        let line = node.start_position().row + 1;
        let machine_id = node
            .child_by_field_name("type_arguments")
            .and_then(|types| named_children(types).get(2).copied())
            .filter(|id| id.kind() == "literal_type")
            .and_then(|id| named_children(id).first().copied())
            .filter(|literal| literal.kind() == "string")
            .map(|literal| syntax::string_value(literal, self.source))
            .ok_or_else(|| ExtractError::MissingMachineId {
                callee: callee.to_owned(),
                line,
            })?;

        let mut args = node
            .child_by_field_name("arguments")
            .map(named_children)
            .unwrap_or_default()
            .into_iter()
            .map(|arg| syntax::lower(arg, self.source));
        let config = args.next().ok_or_else(|| ExtractError::MissingConfig {
            machine_id: machine_id.clone(),
            line,
        })?;

        Ok(MachineCall {
            callee: callee.to_owned(),
            machine_id,
            config,
            options: args.next(),
            line,
        })
    }
}

fn collect_statement(node: Node<'_>, source: &str, scope: &mut Scope) {
    match node.kind() {
        "import_statement" => collect_import(node, source, scope),
        "lexical_declaration" | "variable_declaration" => {
            for declarator in named_children(node) {
                if declarator.kind() != "variable_declarator" {
                    continue;
                }
                let name = declarator.child_by_field_name("name");
                let value = declarator.child_by_field_name("value");
                if let (Some(name), Some(value)) = (name, value) {
                    if name.kind() == "identifier" {
                        scope.declare(text(name, source), Binding::Value(syntax::lower(value, source)));
                    }
                }
            }
        }
        "function_declaration" | "generator_function_declaration" => {
            if let Some(name) = node.child_by_field_name("name") {
                scope.declare(text(name, source), Binding::Function);
            }
        }
        "export_statement" => {
            if let Some(declaration) = node.child_by_field_name("declaration") {
                collect_statement(declaration, source, scope);
            }
        }
        _ => {}
    }
}

fn collect_import(node: Node<'_>, source: &str, scope: &mut Scope) {
    let Some(module) = node
        .child_by_field_name("source")
        .map(|module| syntax::string_value(module, source))
    else {
        return;
    };
    let Some(clause) = named_children(node)
        .into_iter()
        .find(|child| child.kind() == "import_clause")
    else {
        return;
    };

    let import = |imported| Binding::Import {
        source: module.clone(),
        imported,
    };
    for part in named_children(clause) {
        match part.kind() {
            "identifier" => scope.declare(text(part, source), import(ImportedName::Default)),
            "namespace_import" => {
                if let Some(alias) = named_children(part).first() {
                    scope.declare(text(*alias, source), import(ImportedName::Namespace));
                }
            }
            "named_imports" => {
                for specifier in named_children(part) {
                    let Some(name) = specifier.child_by_field_name("name") else {
                        continue;
                    };
                    let local = specifier.child_by_field_name("alias").unwrap_or(name);
                    let imported = match name.kind() {
                        "string" => syntax::string_value(name, source),
                        _ => text(name, source).to_owned(),
                    };
                    scope.declare(text(local, source), import(ImportedName::Named(imported)));
                }
            }
            _ => {}
        }
    }
}
