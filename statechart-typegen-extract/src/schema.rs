//! The grammar of machine configurations and default options.
//!
//! State precedence is fixed: final, parallel, history, compound, atomic.
//! The narrower alternatives carry a required `type` and must be tried
//! before the compound and atomic states, which match untyped objects.

use indexmap::IndexMap;
use once_cell::sync::Lazy;

use crate::extractor::{
    Context, Extracted, Extractor, ObjectShape, Value, array, bool, func, ignored, number, object,
    object_with_indexer, one_of, optional, record, single_or_array, string, string_of, undef,
};
use crate::syntax::Expr;

/// Keys a state may carry that have no bearing on its structure.
const METADATA: [&str; 10] = [
    "context",
    "meta",
    "data",
    "description",
    "tags",
    "key",
    "strict",
    "schema",
    "preserveActionOrder",
    "predictableActionArguments",
];

/// Prefix of the `type` given to built-in actions.
pub const BUILTIN_ACTION_PREFIX: &str = "xstate.";

static STATE: Lazy<Extractor> = Lazy::new(|| {
    one_of([
        state_node(Some(&["final"]), []),
        state_node(Some(&["parallel"]), [("states", optional(states()))]),
        state_node(
            Some(&["history"]),
            [
                ("history", optional(one_of([string_of(&["shallow", "deep"]), bool()]))),
                ("target", optional(string())),
            ],
        ),
        state_node(
            None,
            [
                ("type", optional(string_of(&["compound"]))),
                ("initial", optional(string())),
                ("states", states()),
            ],
        ),
        state_node(None, [("type", optional(string_of(&["atomic"])))]),
    ])
});

static ACTION: Lazy<Extractor> = Lazy::new(|| {
    one_of([
        string(),
        func(),
        typed_object(),
        Extractor::Custom(action_creator),
    ])
});

static CHOOSE_BRANCHES: Lazy<Extractor> = Lazy::new(|| {
    array(object([
        ("cond", optional(guard())),
        ("actions", optional(actions())),
    ]))
});

static OPTIONS: Lazy<Extractor> = Lazy::new(|| {
    let implementations = || optional(record(Extractor::Custom(implementation)));
    object_with_indexer(
        [
            ("actions", implementations()),
            ("guards", implementations()),
            ("services", implementations()),
            ("activities", implementations()),
            (
                "delays",
                optional(record(one_of([number(), Extractor::Custom(implementation)]))),
            ),
        ],
        ignored(),
    )
});

/// Extracts a machine configuration.
pub fn extract_config(expr: &Expr, cx: &Context<'_>) -> Extracted {
    STATE.extract(Some(expr), cx)
}

/// Extracts the default options passed next to a configuration.
pub fn extract_options(expr: Option<&Expr>, cx: &Context<'_>) -> Extracted {
    optional(Extractor::Lazy(|| &*OPTIONS)).extract(expr, cx)
}

/// One state alternative: the fields every state accepts plus `extra`.
///
/// A required `type` is added when `tag` is given. Alternatives without a
/// `states` field reject one, so a failing child never demotes its parent
/// to an atomic state.
fn state_node<const N: usize>(
    tag: Option<&'static [&'static str]>,
    extra: [(&'static str, Extractor); N],
) -> Extractor {
    let mut fields: Vec<(&'static str, Extractor)> = vec![
        ("id", optional(string())),
        ("entry", optional(actions())),
        ("exit", optional(actions())),
        ("on", optional(transitions_map())),
        ("always", optional(transitions())),
        ("after", optional(transitions_map())),
        ("onDone", optional(transitions())),
        ("invoke", optional(single_or_array(invoke))),
        ("activities", optional(single_or_array(activity))),
    ];
    if let Some(tag) = tag {
        fields.push(("type", string_of(tag)));
    }
    fields.extend(extra);
    if !fields.iter().any(|(name, _)| *name == "states") {
        fields.push(("states", optional(undef())));
    }
    for key in METADATA {
        if !fields.iter().any(|(name, _)| *name == key) {
            fields.push((key, ignored()));
        }
    }
    Extractor::Object(ObjectShape::new(fields, None))
}

fn states() -> Extractor {
    record(Extractor::Lazy(|| &*STATE))
}

fn actions() -> Extractor {
    single_or_array(|| Extractor::Lazy(|| &*ACTION))
}

/// `{ type: '...' }` with any further parameters.
fn typed_object() -> Extractor {
    object_with_indexer([("type", string())], ignored())
}

fn guard() -> Extractor {
    one_of([string(), func(), typed_object()])
}

fn activity() -> Extractor {
    one_of([string(), func(), typed_object()])
}

fn target() -> Extractor {
    one_of([undef(), single_or_array(string)])
}

fn transition() -> Extractor {
    one_of([
        target(),
        object([
            ("target", optional(target())),
            ("cond", optional(guard())),
            ("actions", optional(actions())),
            ("internal", optional(bool())),
            ("in", ignored()),
            ("description", ignored()),
            ("meta", ignored()),
        ]),
    ])
}

fn transitions() -> Extractor {
    single_or_array(transition)
}

fn transitions_map() -> Extractor {
    record(transitions())
}

fn invoke() -> Extractor {
    object([
        ("src", one_of([string(), func(), typed_object()])),
        ("id", optional(string())),
        ("onDone", optional(transitions())),
        ("onError", optional(transitions())),
        ("autoForward", optional(bool())),
        ("data", ignored()),
    ])
}

/// A call to a built-in action creator, e.g. `assign({...})`.
///
/// Yields `{ type: 'xstate.<name>' }`; `choose` also keeps its branches
/// under `conds` so their guards and actions can be reported.
fn action_creator<'a>(expr: Option<&'a Expr>, cx: &Context<'a>) -> Extracted {
    let Some(Expr::Call { callee, args }) = expr.map(|expr| cx.scope.resolve(expr)) else {
        return Extracted::Failed;
    };
    let Some(name) = cx.action_creator(callee) else {
        return Extracted::Failed;
    };

    let mut action = IndexMap::new();
    action.insert(
        "type".to_owned(),
        Value::String(format!("{BUILTIN_ACTION_PREFIX}{name}")),
    );
    if name == "choose" {
        match CHOOSE_BRANCHES.extract(args.first(), &cx.nested()) {
            Extracted::Present(branches) => {
                action.insert("conds".to_owned(), branches);
            }
            _ => return Extracted::Failed,
        }
    }
    Extracted::Present(Value::Object(action))
}

/// A default implementation in the options map.
///
/// Besides functions and action creators this accepts references the scope
/// cannot see into, such as imports: the implementation exists, only its
/// body is unknown.
fn implementation<'a>(expr: Option<&'a Expr>, cx: &Context<'a>) -> Extracted {
    let Some(expr) = expr else {
        return Extracted::Failed;
    };
    match cx.scope.resolve(expr) {
        Expr::Function | Expr::Ident(_) | Expr::Member { .. } => Extracted::Present(Value::Function),
        call @ Expr::Call { .. } => action_creator(Some(call), cx),
        _ => Extracted::Failed,
    }
}
