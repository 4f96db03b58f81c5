//! Turns extracted values into core configuration types.

use indexmap::IndexMap;
use statechart_typegen_core::{
    Action, ChooseBranch, HandlerKind, HistoryKind, InvokeConfig, MachineOptions, Reference,
    StateConfig, StateKind, TransitionConfig,
};

use crate::extractor::Value;
use crate::schema::BUILTIN_ACTION_PREFIX;

/// A value that does not have the shape its position requires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShapeError {
    pub path: String,
    pub expected: &'static str,
}

type Result<T> = std::result::Result<T, ShapeError>;

/// Lowers an extracted machine configuration.
pub fn lower_config(value: &Value) -> Result<StateConfig> {
    Lowerer::default().state(value)
}

/// Lowers extracted default options. Only the names matter.
pub fn lower_options(value: &Value) -> Result<MachineOptions> {
    let mut lowerer = Lowerer::default();
    let object = lowerer.object(value)?;
    let mut options = MachineOptions::new();
    for (key, kind) in [
        ("actions", HandlerKind::Action),
        ("guards", HandlerKind::Guard),
        ("services", HandlerKind::Service),
        ("activities", HandlerKind::Activity),
        ("delays", HandlerKind::Delay),
    ] {
        let Some(implementations) = object.get(key) else {
            continue;
        };
        lowerer.path.push(key.to_owned());
        for name in lowerer.object(implementations)?.keys() {
            options.insert(kind, name.clone());
        }
        lowerer.path.pop();
    }
    Ok(options)
}

#[derive(Default)]
struct Lowerer {
    path: Vec<String>,
}

impl Lowerer {
    fn error<T>(&self, expected: &'static str) -> Result<T> {
        Err(ShapeError {
            path: self.path.join("."),
            expected,
        })
    }

    fn nested<T>(&mut self, key: &str, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.path.push(key.to_owned());
        let result = f(self);
        self.path.pop();
        result
    }

    fn object<'v>(&self, value: &'v Value) -> Result<&'v IndexMap<String, Value>> {
        match value.as_object() {
            Some(object) => Ok(object),
            None => self.error("an object"),
        }
    }

    fn string(&self, value: &Value) -> Result<String> {
        match value.as_str() {
            Some(value) => Ok(value.to_owned()),
            None => self.error("a string"),
        }
    }

    fn state(&mut self, value: &Value) -> Result<StateConfig> {
        let object = self.object(value)?;
        let mut state = StateConfig::new();

        for (key, value) in object {
            self.nested(key, |this| {
                match key.as_str() {
                    "id" => state.id = Some(this.string(value)?),
                    "type" => {
                        let kind = this.string(value)?;
                        state.kind = Some(match StateKind::parse(&kind) {
                            Some(kind) => kind,
                            None => return this.error("a state type"),
                        });
                    }
                    "initial" => state.initial = Some(this.string(value)?),
                    "states" => {
                        for (child_key, child) in this.object(value)? {
                            let child = this.nested(child_key, |this| this.state(child))?;
                            state.states.insert(child_key.clone(), child);
                        }
                    }
                    "on" | "after" => {
                        let mut map = IndexMap::new();
                        for (event, transitions) in this.object(value)? {
                            let transitions = this.nested(event, |this| this.transitions(transitions))?;
                            map.insert(event.clone(), transitions);
                        }
                        if key == "on" {
                            state.on = map;
                        } else {
                            state.after = map;
                        }
                    }
                    "always" => state.always = this.transitions(value)?,
                    "onDone" => state.on_done = this.transitions(value)?,
                    "invoke" => {
                        state.invoke = this.each(value, |this, item| this.invoke(item))?;
                    }
                    "entry" => state.entry = this.actions(value)?,
                    "exit" => state.exit = this.actions(value)?,
                    "activities" => {
                        state.activities = this.each(value, |this, item| this.reference(item))?;
                    }
                    "history" => {
                        state.history = Some(match value {
                            Value::String(depth) if depth == "deep" => HistoryKind::Deep,
                            Value::Bool(true) => HistoryKind::Deep,
                            _ => HistoryKind::Shallow,
                        });
                    }
                    "target" => state.target = Some(this.string(value)?),
                    _ => {}
                }
                Ok(())
            })?;
        }

        // History states without a depth are shallow.
        if state.kind == Some(StateKind::History) && state.history.is_none() {
            state.history = Some(HistoryKind::Shallow);
        }
        Ok(state)
    }

    /// Applies `f` to a single value or to every element of an array.
    fn each<T>(&mut self, value: &Value, mut f: impl FnMut(&mut Self, &Value) -> Result<T>) -> Result<Vec<T>> {
        match value {
            Value::Array(items) => items
                .iter()
                .enumerate()
                .map(|(index, item)| self.nested(&index.to_string(), |this| f(this, item)))
                .collect(),
            single => Ok(vec![f(self, single)?]),
        }
    }

    fn transitions(&mut self, value: &Value) -> Result<Vec<TransitionConfig>> {
        match value {
            Value::Undefined => Ok(Vec::new()),
            Value::Array(items) if items.is_empty() => Ok(Vec::new()),
            // A list of plain targets is one transition into several regions.
            Value::Array(items) if items.iter().all(|item| item.as_str().is_some()) => {
                Ok(vec![TransitionConfig {
                    targets: self.targets(value)?,
                    ..TransitionConfig::default()
                }])
            }
            _ => self.each(value, |this, item| this.transition(item)),
        }
    }

    fn transition(&mut self, value: &Value) -> Result<TransitionConfig> {
        let Value::Object(object) = value else {
            return Ok(TransitionConfig {
                targets: self.targets(value)?,
                ..TransitionConfig::default()
            });
        };

        let mut transition = TransitionConfig::default();
        for (key, value) in object {
            self.nested(key, |this| {
                match key.as_str() {
                    "target" => transition.targets = this.targets(value)?,
                    "cond" => transition.cond = Some(this.reference(value)?),
                    "actions" => transition.actions = this.actions(value)?,
                    "internal" => transition.internal = Some(matches!(value, Value::Bool(true))),
                    _ => {}
                }
                Ok(())
            })?;
        }
        Ok(transition)
    }

    fn targets(&mut self, value: &Value) -> Result<Vec<String>> {
        match value {
            Value::Undefined => Ok(Vec::new()),
            _ => self.each(value, |this, item| this.string(item)),
        }
    }

    fn invoke(&mut self, value: &Value) -> Result<InvokeConfig> {
        let object = self.object(value)?;
        let src = match object.get("src") {
            Some(src) => self.nested("src", |this| this.reference(src))?,
            None => return self.error("an invoke source"),
        };
        let mut invoke = match src {
            Reference::Named(name) => InvokeConfig::service(name),
            Reference::Inline => InvokeConfig::inline(),
        };
        for (key, value) in object {
            self.nested(key, |this| {
                match key.as_str() {
                    "id" => invoke.id = Some(this.string(value)?),
                    "onDone" => invoke.on_done = this.transitions(value)?,
                    "onError" => invoke.on_error = this.transitions(value)?,
                    "autoForward" => invoke.auto_forward = matches!(value, Value::Bool(true)),
                    _ => {}
                }
                Ok(())
            })?;
        }
        Ok(invoke)
    }

    /// A guard, service or activity reference.
    fn reference(&mut self, value: &Value) -> Result<Reference> {
        match value {
            Value::String(name) => Ok(Reference::Named(name.clone())),
            Value::Function => Ok(Reference::Inline),
            Value::Object(object) => match object.get("type") {
                Some(Value::String(name)) => Ok(Reference::Named(name.clone())),
                _ => self.error("an object with a `type`"),
            },
            _ => self.error("a name or an implementation"),
        }
    }

    fn actions(&mut self, value: &Value) -> Result<Vec<Action>> {
        self.each(value, |this, item| this.action(item))
    }

    fn action(&mut self, value: &Value) -> Result<Action> {
        let Value::Object(object) = value else {
            return Ok(match self.reference(value)? {
                Reference::Named(name) => Action::Named(name),
                Reference::Inline => Action::Inline,
            });
        };
        let kind = match object.get("type") {
            Some(Value::String(kind)) => kind,
            _ => return self.error("an action with a `type`"),
        };
        if kind == "xstate.choose" {
            let branches = match object.get("conds") {
                Some(conds) => self.nested("conds", |this| this.each(conds, |this, branch| this.choose_branch(branch)))?,
                None => Vec::new(),
            };
            return Ok(Action::Choose(branches));
        }
        if kind.starts_with(BUILTIN_ACTION_PREFIX) {
            return Ok(Action::Builtin(kind.clone()));
        }
        Ok(Action::Named(kind.clone()))
    }

    fn choose_branch(&mut self, value: &Value) -> Result<ChooseBranch> {
        let object = self.object(value)?;
        let mut branch = ChooseBranch::new();
        if let Some(cond) = object.get("cond") {
            branch.cond = Some(self.nested("cond", |this| this.reference(cond))?);
        }
        if let Some(actions) = object.get("actions") {
            branch.actions = self.nested("actions", |this| this.actions(actions))?;
        }
        Ok(branch)
    }
}
