//! Extraction combinators.
//!
//! An [`Extractor`] matches an [`Expr`] against an expected shape and yields
//! an [`Extracted`] result. Extractors never panic and never error: anything
//! they cannot positively match is [`Extracted::Failed`], which lets
//! [`Extractor::Match`] move on to the next alternative.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize, Serializer};

use crate::settings::ExtractorSettings;
use crate::source::{ImportedName, Scope};
use crate::syntax::{Expr, PropertyKey};

/// Objects and arrays nested deeper than this are not extracted. A binding
/// that contains itself would otherwise never bottom out.
pub const MAX_NESTING: usize = 64;

/// How unknown object keys are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Unknown keys are ignored.
    #[default]
    Permissive,
    /// Unknown keys fail the object.
    Strict,
}

/// A statically extracted value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Undefined,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<Value>),
    Object(IndexMap<String, Value>),
    /// Some implementation. What it does is never known.
    Function,
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Undefined => serializer.serialize_unit(),
            Self::Bool(value) => serializer.serialize_bool(*value),
            Self::Number(value) => serializer.serialize_f64(*value),
            Self::String(value) => serializer.serialize_str(value),
            Self::Array(items) => items.serialize(serializer),
            Self::Object(map) => map.serialize(serializer),
            Self::Function => serializer.serialize_str("[function]"),
        }
    }
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Self::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_object()?.get(key)
    }
}

/// Outcome of an extraction.
#[derive(Debug, Clone, PartialEq)]
pub enum Extracted {
    /// The input does not have the expected shape.
    Failed,
    /// Nothing to extract, e.g. an optional property that is not set.
    Absent,
    Present(Value),
}

impl Extracted {
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed)
    }

    pub fn value(&self) -> Option<&Value> {
        match self {
            Self::Present(value) => Some(value),
            _ => None,
        }
    }

    pub fn into_value(self) -> Option<Value> {
        match self {
            Self::Present(value) => Some(value),
            _ => None,
        }
    }
}

/// Everything an extractor may consult besides the expression itself.
#[derive(Debug, Clone, Copy)]
pub struct Context<'a> {
    pub scope: &'a Scope,
    pub settings: &'a ExtractorSettings,
    /// Objects and arrays entered so far.
    pub depth: usize,
}

/// Built-in action creators exported by the action modules.
pub const ACTION_CREATORS: &[&str] = &[
    "assign",
    "send",
    "sendParent",
    "sendUpdate",
    "sendTo",
    "raise",
    "respond",
    "forwardTo",
    "escalate",
    "log",
    "pure",
    "choose",
    "cancel",
    "start",
    "stop",
];

impl<'a> Context<'a> {
    pub fn new(scope: &'a Scope, settings: &'a ExtractorSettings) -> Self {
        Self {
            scope,
            settings,
            depth: 0,
        }
    }

    /// The context for the members of an object or array.
    pub fn nested(&self) -> Self {
        Self {
            depth: self.depth + 1,
            ..*self
        }
    }

    /// The name of the built-in action creator `callee` refers to, if any.
    ///
    /// Recognises `assign` imported by name, `ns.assign` through a namespace
    /// import and `actions.assign` through the exported `actions` object.
    pub fn action_creator(&self, callee: &Expr) -> Option<&'static str> {
        let name = match callee {
            Expr::Ident(local) => match self.scope.import(local)? {
                (module, ImportedName::Named(name)) if self.settings.is_action_module(module) => name.as_str(),
                _ => return None,
            },
            Expr::Member { object, property } if self.is_action_namespace(object) => property.as_str(),
            _ => return None,
        };
        ACTION_CREATORS.iter().copied().find(|creator| *creator == name)
    }

    /// Whether `expr` is a namespace import of an action module or its
    /// `actions` export.
    fn is_action_namespace(&self, expr: &Expr) -> bool {
        match expr {
            Expr::Ident(local) => match self.scope.import(local) {
                Some((module, ImportedName::Namespace)) => self.settings.is_action_module(module),
                Some((module, ImportedName::Named(name))) => {
                    name == "actions" && self.settings.is_action_module(module)
                }
                _ => false,
            },
            Expr::Member { object, property } => {
                property == "actions" && self.is_action_namespace(object)
            }
            _ => false,
        }
    }
}

/// A user-defined extractor.
pub type CustomFn = for<'a> fn(Option<&'a Expr>, &Context<'a>) -> Extracted;

/// Fields of an object extractor.
#[derive(Debug)]
pub struct ObjectShape {
    fields: Vec<(&'static str, Extractor)>,
    /// Extracts every key not listed in `fields`.
    indexer: Option<Box<Extractor>>,
}

/// A matcher over expressions.
#[derive(Debug)]
pub enum Extractor {
    Object(ObjectShape),
    /// Absent properties yield [`Extracted::Absent`].
    Optional(Box<Extractor>),
    /// Literal arrays only; any failing element fails the array.
    Array(Box<Extractor>),
    /// The first alternative that does not fail wins.
    Match(Vec<Extractor>),
    /// A string literal, optionally restricted to a set of values.
    String(Option<&'static [&'static str]>),
    /// A boolean literal, optionally a specific one.
    Bool(Option<bool>),
    Undefined,
    Number,
    Function,
    /// Tolerates a key without extracting it.
    Ignored,
    /// Defers to a static extractor, for recursive grammars.
    Lazy(fn() -> &'static Extractor),
    Custom(CustomFn),
}

impl Extractor {
    /// Extracts `expr`; `None` means the property is not set.
    pub fn extract(&self, expr: Option<&Expr>, cx: &Context<'_>) -> Extracted {
        if cx.depth > MAX_NESTING {
            return Extracted::Failed;
        }
        match self {
            Self::Optional(inner) => match expr {
                None => Extracted::Absent,
                Some(expr) => inner.extract(Some(expr), cx),
            },
            Self::Ignored => Extracted::Absent,
            Self::Lazy(extractor) => extractor().extract(expr, cx),
            Self::Custom(custom) => custom(expr, cx),
            Self::Match(alternatives) => alternatives
                .iter()
                .map(|alternative| alternative.extract(expr, cx))
                .find(|extracted| !extracted.is_failed())
                .unwrap_or(Extracted::Failed),
            _ => match expr {
                Some(expr) => self.extract_present(cx.scope.resolve(expr), cx),
                None => Extracted::Failed,
            },
        }
    }

    fn extract_present(&self, expr: &Expr, cx: &Context<'_>) -> Extracted {
        let value = match (self, expr) {
            (Self::Object(shape), Expr::Object(_)) => return shape.extract(expr, &cx.nested()),
            (Self::Array(element), Expr::Array(items)) => {
                let cx = cx.nested();
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    match element.extract(Some(item), &cx) {
                        Extracted::Failed => return Extracted::Failed,
                        Extracted::Absent => {}
                        Extracted::Present(value) => values.push(value),
                    }
                }
                Value::Array(values)
            }
            (Self::String(allowed), Expr::String(value)) => match allowed {
                Some(allowed) if !allowed.contains(&value.as_str()) => return Extracted::Failed,
                _ => Value::String(value.clone()),
            },
            (Self::Bool(expected), Expr::Bool(value)) => match expected {
                Some(expected) if expected != value => return Extracted::Failed,
                _ => Value::Bool(*value),
            },
            (Self::Undefined, Expr::Undefined) => Value::Undefined,
            (Self::Number, Expr::Number(text)) => match parse_number(text) {
                Some(number) => Value::Number(number),
                None => return Extracted::Failed,
            },
            (Self::Function, Expr::Function) => Value::Function,
            _ => return Extracted::Failed,
        };
        Extracted::Present(value)
    }
}

impl ObjectShape {
    pub fn new(fields: Vec<(&'static str, Extractor)>, indexer: Option<Extractor>) -> Self {
        Self {
            fields,
            indexer: indexer.map(Box::new),
        }
    }

    fn extract(&self, expr: &Expr, cx: &Context<'_>) -> Extracted {
        let Expr::Object(properties) = expr else {
            return Extracted::Failed;
        };

        // Later keys shadow earlier ones, as at runtime.
        let mut entries: IndexMap<&str, &Expr> = IndexMap::new();
        for property in properties {
            match &property.key {
                PropertyKey::Static(key) => {
                    entries.insert(key, &property.value);
                }
                PropertyKey::Computed | PropertyKey::Spread => return Extracted::Failed,
            }
        }

        let mut object = IndexMap::new();
        for (name, field) in &self.fields {
            match field.extract(entries.get(name).copied(), cx) {
                Extracted::Failed => return Extracted::Failed,
                Extracted::Absent => {}
                Extracted::Present(value) => {
                    object.insert((*name).to_owned(), value);
                }
            }
        }

        for (key, value) in entries {
            if self.fields.iter().any(|(name, _)| *name == key) {
                continue;
            }
            match &self.indexer {
                Some(indexer) => match indexer.extract(Some(value), cx) {
                    Extracted::Failed => return Extracted::Failed,
                    Extracted::Absent => {}
                    Extracted::Present(value) => {
                        object.insert(key.to_owned(), value);
                    }
                },
                None if cx.settings.mode == Mode::Strict => return Extracted::Failed,
                None => {}
            }
        }

        Extracted::Present(Value::Object(object))
    }
}

fn parse_number(text: &str) -> Option<f64> {
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let digits = digits.replace('_', "");
    let radix = match digits.get(..2) {
        Some("0x" | "0X") => Some(16),
        Some("0o" | "0O") => Some(8),
        Some("0b" | "0B") => Some(2),
        _ => None,
    };
    let magnitude = match radix {
        Some(radix) => u64::from_str_radix(&digits[2..], radix).ok()? as f64,
        None => digits.parse::<f64>().ok()?,
    };
    Some(if negative { -magnitude } else { magnitude })
}

/// A point in an expression that keeps it from being extracted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blocker {
    /// Property path from the extracted root, e.g. `states.idle.on`.
    pub path: String,
    pub construct: String,
}

impl std::fmt::Display for Blocker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.path.is_empty() {
            f.write_str(&self.construct)
        } else {
            write!(f, "{} at `{}`", self.construct, self.path)
        }
    }
}

/// Finds the first construct in `expr` that can never be extracted.
///
/// Unresolved references are reported only when `references_allowed` is
/// false, since option maps may legitimately point at imports.
pub fn find_blocker(expr: &Expr, cx: &Context<'_>, references_allowed: bool) -> Option<Blocker> {
    let mut path = Vec::new();
    blocker_in(expr, cx, references_allowed, &mut path, 0)
}

fn blocker_in(
    expr: &Expr,
    cx: &Context<'_>,
    references_allowed: bool,
    path: &mut Vec<String>,
    depth: usize,
) -> Option<Blocker> {
    let blocked = |construct: String, path: &[String]| {
        Some(Blocker {
            path: path.join("."),
            construct,
        })
    };
    // Bindings may refer to each other; the resolver bounds the chain but a
    // self-containing object can still recurse.
    if depth > MAX_NESTING {
        return blocked(format!("nesting deeper than {MAX_NESTING} levels"), path);
    }

    match cx.scope.resolve(expr) {
        Expr::Object(properties) => {
            for property in properties {
                match &property.key {
                    PropertyKey::Computed => return blocked("computed property key".into(), path),
                    PropertyKey::Spread => {
                        return blocked(format!("spread of `{}`", property.value.describe()), path);
                    }
                    PropertyKey::Static(key) => {
                        path.push(key.clone());
                        let found = blocker_in(&property.value, cx, references_allowed, path, depth + 1);
                        path.pop();
                        if found.is_some() {
                            return found;
                        }
                    }
                }
            }
            None
        }
        Expr::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                path.push(index.to_string());
                let found = blocker_in(item, cx, references_allowed, path, depth + 1);
                path.pop();
                if found.is_some() {
                    return found;
                }
            }
            None
        }
        reference @ (Expr::Ident(_) | Expr::Member { .. }) if !references_allowed => blocked(
            format!("reference to `{}`, which cannot be resolved statically", reference.describe()),
            path,
        ),
        Expr::Call { callee, args } => match cx.action_creator(callee) {
            Some(_) => args
                .iter()
                .find_map(|arg| blocker_in(arg, cx, references_allowed, path, depth + 1)),
            None => blocked(format!("call to `{}`", callee.describe()), path),
        },
        Expr::Unsupported { kind } => blocked(format!("unsupported {}", kind.replace('_', " ")), path),
        _ => None,
    }
}

// Builders, in the order the grammar reads best.

pub fn object<const N: usize>(fields: [(&'static str, Extractor); N]) -> Extractor {
    Extractor::Object(ObjectShape::new(fields.into(), None))
}

/// An object with `fields` whose remaining keys all go through `indexer`.
pub fn object_with_indexer<const N: usize>(
    fields: [(&'static str, Extractor); N],
    indexer: Extractor,
) -> Extractor {
    Extractor::Object(ObjectShape::new(fields.into(), Some(indexer)))
}

/// An object whose every key goes through `values`.
pub fn record(values: Extractor) -> Extractor {
    object_with_indexer([], values)
}

pub fn optional(inner: Extractor) -> Extractor {
    Extractor::Optional(Box::new(inner))
}

pub fn array(element: Extractor) -> Extractor {
    Extractor::Array(Box::new(element))
}

pub fn one_of<const N: usize>(alternatives: [Extractor; N]) -> Extractor {
    Extractor::Match(alternatives.into())
}

pub fn string() -> Extractor {
    Extractor::String(None)
}

pub fn string_of(allowed: &'static [&'static str]) -> Extractor {
    Extractor::String(Some(allowed))
}

pub fn bool() -> Extractor {
    Extractor::Bool(None)
}

pub fn undef() -> Extractor {
    Extractor::Undefined
}

pub fn number() -> Extractor {
    Extractor::Number
}

pub fn func() -> Extractor {
    Extractor::Function
}

pub fn ignored() -> Extractor {
    Extractor::Ignored
}

/// `x | x[]`. `element` is built twice, once for each position.
pub fn single_or_array(element: fn() -> Extractor) -> Extractor {
    one_of([element(), array(element())])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SourceFile;
    use crate::syntax::Dialect;

    /// Extracts the initializer of `const value = ...` in `source`.
    fn run(extractor: &Extractor, source: &str, mode: Mode) -> Extracted {
        let file = SourceFile::parse(source, Dialect::TypeScript).unwrap();
        let settings = ExtractorSettings::default().with_mode(mode);
        let cx = Context::new(file.scope(), &settings);
        extractor.extract(Some(&Expr::Ident("value".into())), &cx)
    }

    fn point() -> Extractor {
        object([("x", number()), ("label", optional(string()))])
    }

    #[test]
    fn objects_extract_known_fields() {
        let extracted = run(&point(), "const value = { x: 1, label: 'a', extra: true };", Mode::Permissive);
        let value = extracted.value().unwrap();
        assert_eq!(value.get("x"), Some(&Value::Number(1.0)));
        assert_eq!(value.get("label").and_then(Value::as_str), Some("a"));
        assert_eq!(value.get("extra"), None);
    }

    #[test]
    fn strict_mode_rejects_unknown_keys() {
        let source = "const value = { x: 1, extra: true };";
        assert!(run(&point(), source, Mode::Strict).is_failed());
        assert!(!run(&point(), "const value = { x: 1 };", Mode::Strict).is_failed());
    }

    #[test]
    fn required_fields_must_be_present() {
        assert!(run(&point(), "const value = { label: 'a' };", Mode::Permissive).is_failed());
    }

    #[test]
    fn computed_keys_and_spreads_fail() {
        assert!(run(&point(), "const value = { x: 1, [key]: 2 };", Mode::Permissive).is_failed());
        assert!(run(&point(), "const value = { x: 1, ...other };", Mode::Permissive).is_failed());
        assert!(run(&record(number()), "const value = { [key]: 2 };", Mode::Permissive).is_failed());
    }

    #[test]
    fn later_keys_win() {
        let extracted = run(&point(), "const value = { x: 1, x: 2 };", Mode::Permissive);
        assert_eq!(extracted.value().unwrap().get("x"), Some(&Value::Number(2.0)));
    }

    #[test]
    fn arrays_must_be_literal() {
        let numbers = array(number());
        let extracted = run(&numbers, "const value = [1, 0x10, -2];", Mode::Permissive);
        assert_eq!(
            extracted.into_value(),
            Some(Value::Array(vec![Value::Number(1.0), Value::Number(16.0), Value::Number(-2.0)]))
        );
        assert!(run(&numbers, "const value = [1, 'two'];", Mode::Permissive).is_failed());
        assert!(run(&numbers, "const value = items.map(x => x);", Mode::Permissive).is_failed());
    }

    #[test]
    fn match_takes_the_first_success_in_order() {
        let tagged = one_of([
            object([("type", string_of(&["final"]))]),
            object([("type", optional(string()))]),
        ]);
        let extracted = run(&tagged, "const value = { type: 'atomic' };", Mode::Permissive);
        assert_eq!(extracted.value().unwrap().get("type").and_then(Value::as_str), Some("atomic"));
        assert!(run(&one_of([number(), bool()]), "const value = 'x';", Mode::Permissive).is_failed());
    }

    #[test]
    fn identifiers_resolve_through_bindings() {
        let extracted = run(
            &single_or_array(string),
            "const a = 'one';\nconst value = [a, 'two'];",
            Mode::Permissive,
        );
        assert_eq!(
            extracted.into_value(),
            Some(Value::Array(vec![Value::String("one".into()), Value::String("two".into())]))
        );
    }

    #[test]
    fn leaves_check_their_literal() {
        assert!(run(&Extractor::Bool(Some(true)), "const value = false;", Mode::Permissive).is_failed());
        assert!(!run(&Extractor::Bool(Some(true)), "const value = true;", Mode::Permissive).is_failed());
        assert!(!run(&undef(), "const value = undefined;", Mode::Permissive).is_failed());
        assert!(!run(&func(), "const value = () => {};", Mode::Permissive).is_failed());
        assert_eq!(
            run(&optional(number()), "const other = 1;", Mode::Permissive),
            Extracted::Failed
        );
    }

    fn nested_list() -> &'static Extractor {
        static LIST: once_cell::sync::Lazy<Extractor> =
            once_cell::sync::Lazy::new(|| array(Extractor::Lazy(nested_list)));
        &LIST
    }

    #[test]
    fn self_containing_bindings_fail() {
        assert!(run(nested_list(), "var value = [value];", Mode::Permissive).is_failed());
        assert!(run(nested_list(), "var value = [[[]], []];", Mode::Permissive).value().is_some());

        let file = SourceFile::parse("var value = { next: value };", Dialect::TypeScript).unwrap();
        let settings = ExtractorSettings::default();
        let cx = Context::new(file.scope(), &settings);
        let blocker = find_blocker(&Expr::Ident("value".into()), &cx, false).unwrap();
        assert_eq!(blocker.construct, "nesting deeper than 64 levels");
        assert!(blocker.path.starts_with("next.next.next"));
    }

    #[test]
    fn blockers_name_the_construct_and_its_path() {
        let file = SourceFile::parse(
            "import { assign } from 'xstate';\nconst value = { states: { a: { entry: assign({}), on: { [key]: 'b' } } } };",
            Dialect::TypeScript,
        )
        .unwrap();
        let settings = ExtractorSettings::default();
        let cx = Context::new(file.scope(), &settings);
        let blocker = find_blocker(&Expr::Ident("value".into()), &cx, false).unwrap();
        assert_eq!(blocker.path, "states.a.on");
        assert_eq!(blocker.construct, "computed property key");
    }

    #[test]
    fn action_creators_are_recognised_by_import() {
        let file = SourceFile::parse(
            "import { assign, actions } from 'xstate';\nimport * as x from 'xstate';\nimport { send } from './local';",
            Dialect::TypeScript,
        )
        .unwrap();
        let settings = ExtractorSettings::default();
        let cx = Context::new(file.scope(), &settings);
        let member = |object: Expr, property: &str| Expr::Member {
            object: Box::new(object),
            property: property.into(),
        };
        assert_eq!(cx.action_creator(&Expr::Ident("assign".into())), Some("assign"));
        assert_eq!(cx.action_creator(&member(Expr::Ident("actions".into()), "choose")), Some("choose"));
        assert_eq!(cx.action_creator(&member(Expr::Ident("x".into()), "raise")), Some("raise"));
        assert_eq!(
            cx.action_creator(&member(member(Expr::Ident("x".into()), "actions"), "log")),
            Some("log")
        );
        assert_eq!(cx.action_creator(&Expr::Ident("send".into())), None);
        assert_eq!(cx.action_creator(&member(Expr::Ident("x".into()), "interpret")), None);
    }
}
