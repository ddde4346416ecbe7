//! Generic condition/state/machine kernel.
//!
//! A [`Machine`] is built from transitions between [`State`]s, where each
//! state is an id plus a [`Require`] predicate over a document. Documents
//! expose their fields through the [`Doc`] trait, a reflection-free walker:
//! conditions address fields by dotted paths (`"sender.status.status"`) and
//! the kernel resolves one segment at a time.
//!
//! The kernel itself knows nothing about payments; see
//! [`payment_states`](crate::payment_states) for the concrete catalog.

use std::fmt;

/// A single field value surfaced by a [`Doc`].
pub enum FieldRef<'a> {
    Str(&'a str),
    U64(u64),
    /// A nested document the path walker can descend into.
    Node(&'a dyn Doc),
}

/// Field access for documents the machine can match against.
///
/// Returning `None` means the field is absent, which includes optional
/// fields that are unset. A path that tries to descend through an absent or
/// scalar field resolves to absent as a whole.
pub trait Doc {
    fn field(&self, name: &str) -> Option<FieldRef<'_>>;
}

/// Resolves a dotted path against a document.
fn resolve<'a>(doc: &'a dyn Doc, path: &str) -> Option<FieldRef<'a>> {
    let mut current = doc;
    let mut segments = path.split('.').peekable();
    while let Some(segment) = segments.next() {
        let value = current.field(segment)?;
        if segments.peek().is_none() {
            return Some(value);
        }
        match value {
            FieldRef::Node(node) => current = node,
            // Scalar mid-path: the remainder of the path is unreachable.
            _ => return None,
        }
    }
    None
}

/// A scalar a [`Condition::Value`] compares against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scalar {
    Str(String),
    U64(u64),
}

impl Scalar {
    fn matches(&self, field: &FieldRef<'_>) -> bool {
        match (self, field) {
            (Scalar::Str(expected), FieldRef::Str(actual)) => expected == actual,
            (Scalar::U64(expected), FieldRef::U64(actual)) => expected == actual,
            _ => false,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Str(s) => write!(f, "{s}"),
            Scalar::U64(n) => write!(f, "{n}"),
        }
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::Str(value.to_string())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Scalar::Str(value)
    }
}

impl From<u64> for Scalar {
    fn from(value: u64) -> Self {
        Scalar::U64(value)
    }
}

/// A predicate over a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    /// Matches iff the path resolves to a value whose absence equals `not_set`.
    Field { path: String, not_set: bool },
    /// Matches iff the path resolves to a value equal to `value`.
    Value { path: String, value: Scalar },
    /// Matches iff every child condition matches.
    Require(Require),
}

impl Condition {
    pub fn matches(&self, doc: &dyn Doc) -> bool {
        match self {
            Condition::Field { path, not_set } => resolve(doc, path).is_some() != *not_set,
            Condition::Value { path, value } => match resolve(doc, path) {
                Some(field) => value.matches(&field),
                None => false,
            },
            Condition::Require(require) => require.matches(doc),
        }
    }

    /// Human-readable per-condition result, for diagnostics only.
    pub fn explain(&self, doc: &dyn Doc) -> String {
        match self {
            Condition::Require(require) => require.explain(doc),
            _ => {
                let verdict = if self.matches(doc) { "match" } else { "not match" };
                format!("{self}: {verdict}")
            }
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Field { path, not_set: false } => write!(f, "field({path})"),
            Condition::Field { path, not_set: true } => write!(f, "field({path}) not set"),
            Condition::Value { path, value } => write!(f, "value({path}) == {value}"),
            Condition::Require(_) => write!(f, "require(..)"),
        }
    }
}

/// Conjunction of conditions. Composes into itself via [`Condition::Require`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Require {
    conds: Vec<Condition>,
}

impl Require {
    pub fn matches(&self, doc: &dyn Doc) -> bool {
        self.conds.iter().all(|cond| cond.matches(doc))
    }

    pub fn explain(&self, doc: &dyn Doc) -> String {
        let lines: Vec<String> = self.conds.iter().map(|cond| cond.explain(doc)).collect();
        format!("require:\n{}", lines.join("\n"))
    }
}

pub fn field(path: impl Into<String>) -> Condition {
    Condition::Field {
        path: path.into(),
        not_set: false,
    }
}

pub fn field_not_set(path: impl Into<String>) -> Condition {
    Condition::Field {
        path: path.into(),
        not_set: true,
    }
}

pub fn value(path: impl Into<String>, value: impl Into<Scalar>) -> Condition {
    Condition::Value {
        path: path.into(),
        value: value.into(),
    }
}

pub fn require<I: IntoIterator<Item = Condition>>(conds: I) -> Require {
    Require {
        conds: conds.into_iter().collect(),
    }
}

/// A state: an id plus an optional predicate.
///
/// States are value-equal by id; two states with the same id are the same
/// state regardless of their predicates.
#[derive(Debug, Clone)]
pub struct State {
    id: &'static str,
    require: Option<Require>,
}

impl State {
    pub fn new(id: &'static str) -> Self {
        State { id, require: None }
    }

    pub fn with_require(id: &'static str, require: Require) -> Self {
        State {
            id,
            require: Some(require),
        }
    }

    pub fn id(&self) -> &'static str {
        self.id
    }

    pub fn matches(&self, doc: &dyn Doc) -> bool {
        match &self.require {
            Some(require) => require.matches(doc),
            None => true,
        }
    }

    pub fn explain(&self, doc: &dyn Doc) -> String {
        let require_explain = match &self.require {
            Some(require) => require.explain(doc),
            None => "match".to_string(),
        };
        format!("---- state({}) ----\n{require_explain}", self.id)
    }
}

impl PartialEq for State {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for State {}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id)
    }
}

/// A legal field-level evolution between two states.
#[derive(Debug, Clone)]
pub struct Transition {
    pub from: State,
    pub to: State,
    /// Extra guard beyond the destination state's own predicate.
    pub guard: Option<Require>,
}

pub fn new_transition(from: State, to: State) -> Transition {
    Transition {
        from,
        to,
        guard: None,
    }
}

pub fn guarded_transition(from: State, to: State, guard: Require) -> Transition {
    Transition {
        from,
        to,
        guard: Some(guard),
    }
}

/// Exactness failures of [`Machine::match_state`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MachineError {
    #[error("could not find state matching the given document")]
    NoStateMatched,
    #[error("found multiple states matching the given document: {0:?}")]
    TooManyStatesMatched(Vec<&'static str>),
}

/// The set of states and transitions, with derived initial states.
#[derive(Debug, Clone)]
pub struct Machine {
    initials: Vec<State>,
    states: Vec<State>,
    transitions: Vec<Transition>,
}

impl Machine {
    pub fn states(&self) -> &[State] {
        &self.states
    }

    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    pub fn initials(&self) -> &[State] {
        &self.initials
    }

    pub fn is_initial(&self, state: &State) -> bool {
        self.initials.contains(state)
    }

    /// Whether an edge `(from, to)` exists whose guard (if any) matches `doc`.
    pub fn is_valid_transition(&self, from: &State, to: &State, doc: &dyn Doc) -> bool {
        for transition in &self.transitions {
            if transition.from == *from && transition.to == *to {
                return match &transition.guard {
                    Some(guard) => guard.matches(doc),
                    None => true,
                };
            }
        }
        false
    }

    /// All states whose predicates match `doc`.
    pub fn match_states(&self, doc: &dyn Doc) -> Vec<&State> {
        self.states.iter().filter(|state| state.matches(doc)).collect()
    }

    /// The unique state matching `doc`. Callers rely on exactness.
    pub fn match_state(&self, doc: &dyn Doc) -> Result<&State, MachineError> {
        let matched = self.match_states(doc);
        match matched.as_slice() {
            [] => Err(MachineError::NoStateMatched),
            [single] => Ok(*single),
            many => Err(MachineError::TooManyStatesMatched(
                many.iter().map(|state| state.id()).collect(),
            )),
        }
    }

    /// Per-state explanation of which conditions matched, for diagnostics.
    pub fn explain(&self, doc: &dyn Doc) -> String {
        self.states
            .iter()
            .filter(|state| state.require.is_some())
            .map(|state| state.explain(doc))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Builds a machine from transitions.
///
/// States are collected from both transition endpoints; initial states are
/// those that appear as `from` but never as `to`.
pub fn build_machine(transitions: Vec<Transition>) -> Machine {
    let mut states: Vec<State> = Vec::new();
    let mut to_ids: Vec<&'static str> = Vec::new();
    for transition in &transitions {
        if !states.contains(&transition.from) {
            states.push(transition.from.clone());
        }
        if !states.contains(&transition.to) {
            states.push(transition.to.clone());
        }
        if !to_ids.contains(&transition.to.id()) {
            to_ids.push(transition.to.id());
        }
    }
    let initials = states
        .iter()
        .filter(|state| !to_ids.contains(&state.id()))
        .cloned()
        .collect();
    Machine {
        initials,
        states,
        transitions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Obj {
        a: Option<String>,
        b: Option<Box<Obj>>,
        c: Option<Box<Obj>>,
    }

    impl Obj {
        fn with_a(a: &str) -> Self {
            Obj {
                a: Some(a.to_string()),
                ..Default::default()
            }
        }
    }

    impl Doc for Obj {
        fn field(&self, name: &str) -> Option<FieldRef<'_>> {
            match name {
                "a" => self.a.as_deref().map(FieldRef::Str),
                "b" => self.b.as_deref().map(|o| FieldRef::Node(o as &dyn Doc)),
                "c" => self.c.as_deref().map(|o| FieldRef::Node(o as &dyn Doc)),
                _ => None,
            }
        }
    }

    #[test]
    fn state_matching() {
        let a = State::new("a");
        let b = State::with_require("b", require([field("b")]));
        let c = State::with_require("c", require([value("b.a", "world")]));
        let d = State::with_require("d", require([field("b"), field("c")]));

        let o = Obj {
            a: Some("hello".to_string()),
            b: Some(Box::new(Obj {
                a: Some("world".to_string()),
                c: Some(Box::new(Obj::with_a("!"))),
                ..Default::default()
            })),
            c: None,
        };
        assert!(a.matches(&o));
        assert!(b.matches(&o));
        assert!(c.matches(&o));
        assert!(!d.matches(&o));

        let o = Obj {
            a: Some("hello".to_string()),
            b: Some(Box::new(Obj::with_a("world"))),
            c: Some(Box::new(Obj::with_a("!"))),
        };
        assert!(d.matches(&o));
    }

    #[test]
    fn build_machine_derives_states_and_initials() {
        let a = State::with_require("a", require([field("a")]));
        let b = State::with_require("b", require([field("b")]));
        let c = State::with_require("c", require([field("c")]));
        let d = State::with_require("d", require([value("c.b.a", "world")]));

        let machine = build_machine(vec![
            new_transition(a.clone(), b.clone()),
            guarded_transition(b.clone(), c.clone(), require([field("b.c")])),
            guarded_transition(c.clone(), d.clone(), require([value("b.c.a", "hello")])),
            guarded_transition(c.clone(), c.clone(), require([field("c.b.a")])),
        ]);

        assert_eq!(machine.initials(), &[a.clone()]);
        assert_eq!(machine.states().len(), 4);
        assert!(machine.states().contains(&a));
        assert!(machine.states().contains(&b));
        assert!(machine.states().contains(&c));
        assert!(machine.states().contains(&d));
        assert_eq!(machine.transitions().len(), 4);
    }

    #[test]
    fn match_states_by_field_presence() {
        let a = State::with_require("a", require([field("a")]));
        let b = State::with_require("b", require([field("b")]));
        let c = State::with_require("c", require([field_not_set("c")]));

        let machine = build_machine(vec![
            new_transition(a.clone(), b.clone()),
            new_transition(a.clone(), c.clone()),
        ]);

        let ids = |doc: &Obj| {
            machine
                .match_states(doc)
                .iter()
                .map(|s| s.id())
                .collect::<Vec<_>>()
        };

        assert_eq!(ids(&Obj::with_a("hello")), vec!["a", "c"]);
        assert_eq!(
            ids(&Obj {
                a: Some("hello".to_string()),
                c: Some(Box::new(Obj::default())),
                ..Default::default()
            }),
            vec!["a"]
        );
        assert_eq!(
            ids(&Obj {
                b: Some(Box::new(Obj::default())),
                ..Default::default()
            }),
            vec!["b", "c"]
        );
        assert_eq!(
            ids(&Obj {
                a: Some("hello".to_string()),
                b: Some(Box::new(Obj::default())),
                ..Default::default()
            }),
            vec!["a", "b", "c"]
        );
        assert_eq!(
            ids(&Obj {
                c: Some(Box::new(Obj::default())),
                ..Default::default()
            }),
            Vec::<&str>::new()
        );
    }

    #[test]
    fn match_states_by_value() {
        let a = State::with_require("a", require([value("a", "hello")]));
        let b = State::with_require("b", require([value("b.a", "hello")]));

        let machine = build_machine(vec![new_transition(a.clone(), b.clone())]);

        let matched = machine.match_states(&Obj::with_a("hello"));
        assert_eq!(matched, vec![&a]);

        let matched = machine.match_states(&Obj {
            a: Some("world".to_string()),
            b: Some(Box::new(Obj::with_a("hello"))),
            ..Default::default()
        });
        assert_eq!(matched, vec![&b]);
    }

    #[test]
    fn match_state_requires_exactly_one() {
        let a = State::with_require("a", require([value("a", "hello")]));
        let b = State::with_require("b", require([field("b")]));

        let machine = build_machine(vec![new_transition(a.clone(), b.clone())]);

        assert_eq!(machine.match_state(&Obj::with_a("hello")).unwrap(), &a);

        let both = Obj {
            a: Some("hello".to_string()),
            b: Some(Box::new(Obj::default())),
            ..Default::default()
        };
        assert_eq!(
            machine.match_state(&both),
            Err(MachineError::TooManyStatesMatched(vec!["a", "b"]))
        );
        assert_eq!(
            machine.match_state(&Obj::with_a("world")),
            Err(MachineError::NoStateMatched)
        );
    }

    #[test]
    fn is_initial() {
        let a = State::with_require("a", require([field("a")]));
        let b = State::with_require("b", require([field("b")]));

        let machine = build_machine(vec![new_transition(a, b)]);

        let initial = machine.match_state(&Obj::with_a("hello")).unwrap();
        assert!(machine.is_initial(initial));
        let other = machine
            .match_state(&Obj {
                b: Some(Box::new(Obj::default())),
                ..Default::default()
            })
            .unwrap();
        assert!(!machine.is_initial(other));
    }

    #[test]
    fn transition_guards() {
        let a = State::with_require("a", require([field("a")]));
        let b = State::with_require("b", require([field("b")]));
        let c = State::with_require("c", require([field("c")]));

        let machine = build_machine(vec![
            new_transition(a.clone(), b.clone()),
            guarded_transition(b.clone(), c.clone(), require([field("b.a")])),
        ]);

        assert!(machine.is_valid_transition(&a, &b, &Obj::default()));
        assert!(machine.is_valid_transition(&a, &b, &Obj::with_a("any")));
        assert!(!machine.is_valid_transition(&b, &c, &Obj::default()));
        assert!(machine.is_valid_transition(
            &b,
            &c,
            &Obj {
                b: Some(Box::new(Obj::with_a("hello"))),
                ..Default::default()
            }
        ));
        // No edge at all.
        assert!(!machine.is_valid_transition(&a, &c, &Obj::default()));
    }

    #[test]
    fn broken_path_counts_as_absent() {
        let cond = field("b.c.a");
        assert!(!cond.matches(&Obj::with_a("x")));

        let not_set = field_not_set("b.c.a");
        assert!(not_set.matches(&Obj::with_a("x")));

        // Scalar in the middle of the path.
        let through_scalar = field("a.b");
        assert!(!through_scalar.matches(&Obj::with_a("x")));
    }

    #[test]
    fn explain_mentions_every_predicate_state() {
        let a = State::with_require("a", require([field("a")]));
        let b = State::with_require("b", require([value("a", "hello")]));
        let machine = build_machine(vec![new_transition(a, b)]);

        let explained = machine.explain(&Obj::with_a("hello"));
        assert!(explained.contains("state(a)"));
        assert!(explained.contains("state(b)"));
        assert!(explained.contains("match"));
    }
}
