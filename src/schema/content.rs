/// Content model: literal templates plus lazily evaluated host arguments.
use serde::{Deserialize, Serialize};
use std::fmt;
use std::rc::Rc;

/// A value produced by a literal or a host callback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Int(i) => write!(f, "{}", i),
            Self::Float(x) => write!(f, "{}", x),
            Self::Bool(b) => write!(f, "{}", b),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Self::Int(i as i64)
    }
}

impl From<u32> for Value {
    fn from(i: u32) -> Self {
        Self::Int(i as i64)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Self::Float(x)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

/// Horizontal alignment used when a width is requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Align {
    Left,
    #[default]
    Right,
}

/// Width and precision attached to a single argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FormatSpec {
    /// Minimum rendered width; 0 disables padding.
    pub width: usize,
    pub align: Align,
    /// Digits after the decimal point, only applied to floats.
    pub precision: Option<usize>,
}

impl FormatSpec {
    /// Render a value according to this spec.
    pub fn apply(&self, value: &Value) -> String {
        let body = match (value, self.precision) {
            (Value::Float(x), Some(p)) => format!("{:.*}", p, x),
            _ => value.to_string(),
        };
        match self.align {
            Align::Left => format!("{:<width$}", body, width = self.width),
            Align::Right => format!("{:>width$}", body, width = self.width),
        }
    }
}

pub type ValueFn = Rc<dyn Fn() -> Value>;
pub type ActionFn = Rc<dyn Fn()>;
pub type PredicateFn = Rc<dyn Fn() -> bool>;

/// What an argument slot holds.
#[derive(Clone)]
pub enum ArgumentKind {
    /// Substituted as-is.
    Literal(Value),
    /// Invoked at render time, its result substituted.
    Value(ValueFn),
    /// Invoked at render time for its side effect; renders as nothing.
    Action(ActionFn),
    /// Gates visibility of the owning line or choice; never rendered.
    Predicate(PredicateFn),
}

/// A single argument bound to a placeholder slot of a script.
///
/// Host state is read through callbacks rather than captured values so a
/// script built once keeps reflecting the state at the moment a line is
/// read.
#[derive(Clone)]
pub struct Argument {
    pub kind: ArgumentKind,
    pub format: FormatSpec,
}

impl Argument {
    pub fn literal(value: impl Into<Value>) -> Self {
        Self::from_kind(ArgumentKind::Literal(value.into()))
    }

    pub fn value<F, V>(produce: F) -> Self
    where
        F: Fn() -> V + 'static,
        V: Into<Value>,
    {
        Self::from_kind(ArgumentKind::Value(Rc::new(move || produce().into())))
    }

    pub fn action<F>(run: F) -> Self
    where
        F: Fn() + 'static,
    {
        Self::from_kind(ArgumentKind::Action(Rc::new(run)))
    }

    pub fn predicate<F>(test: F) -> Self
    where
        F: Fn() -> bool + 'static,
    {
        Self::from_kind(ArgumentKind::Predicate(Rc::new(test)))
    }

    fn from_kind(kind: ArgumentKind) -> Self {
        Self {
            kind,
            format: FormatSpec::default(),
        }
    }

    /// Right-align the rendered value in a field of `width` characters.
    pub fn width(mut self, width: usize) -> Self {
        self.format.width = width;
        self.format.align = Align::Right;
        self
    }

    /// Left-align the rendered value in a field of `width` characters.
    pub fn left(mut self, width: usize) -> Self {
        self.format.width = width;
        self.format.align = Align::Left;
        self
    }

    pub fn precision(mut self, digits: usize) -> Self {
        self.format.precision = Some(digits);
        self
    }

    pub fn is_predicate(&self) -> bool {
        matches!(self.kind, ArgumentKind::Predicate(_))
    }

    /// Render this argument at its slot. Actions run here and render empty.
    pub fn render(&self) -> String {
        match &self.kind {
            ArgumentKind::Literal(value) => self.format.apply(value),
            ArgumentKind::Value(produce) => self.format.apply(&produce()),
            ArgumentKind::Action(run) => {
                run();
                String::new()
            }
            // Predicates are split off at compile time; a stray one renders empty.
            ArgumentKind::Predicate(_) => String::new(),
        }
    }
}

impl fmt::Debug for Argument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match &self.kind {
            ArgumentKind::Literal(value) => format!("Literal({:?})", value),
            ArgumentKind::Value(_) => "Value(..)".to_string(),
            ArgumentKind::Action(_) => "Action(..)".to_string(),
            ArgumentKind::Predicate(_) => "Predicate(..)".to_string(),
        };
        f.debug_struct("Argument")
            .field("kind", &kind)
            .field("format", &self.format)
            .finish()
    }
}

/// A piece of a content template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Piece {
    /// Literal text, emitted as-is.
    Text(String),
    /// Index into the owning content's argument list.
    Slot(usize),
}

/// A literal template plus the arguments its slots refer to.
#[derive(Debug, Clone, Default)]
pub struct Content {
    pieces: Vec<Piece>,
    args: Vec<Argument>,
}

impl Content {
    /// Build content from pieces; every slot must index into `args`.
    pub fn new(pieces: Vec<Piece>, args: Vec<Argument>) -> Self {
        debug_assert!(pieces
            .iter()
            .all(|p| !matches!(p, Piece::Slot(i) if *i >= args.len())));
        Self { pieces, args }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self {
            pieces: vec![Piece::Text(text.into())],
            args: Vec::new(),
        }
    }

    pub fn pieces(&self) -> &[Piece] {
        &self.pieces
    }

    pub fn args(&self) -> &[Argument] {
        &self.args
    }

    /// The template with each slot written as `{N}` and literal braces doubled.
    pub fn format(&self) -> String {
        let mut out = String::new();
        for piece in &self.pieces {
            match piece {
                Piece::Text(text) => push_escaped(&mut out, text),
                Piece::Slot(index) => {
                    out.push('{');
                    out.push_str(&index.to_string());
                    out.push('}');
                }
            }
        }
        out
    }

    /// Render the content, invoking value and action callbacks in slot order.
    pub fn evaluate(&self) -> String {
        let mut out = String::new();
        for piece in &self.pieces {
            match piece {
                Piece::Text(text) => out.push_str(text),
                Piece::Slot(index) => {
                    if let Some(arg) = self.args.get(*index) {
                        out.push_str(&arg.render());
                    }
                }
            }
        }
        out
    }
}

/// Append `text` with `{` and `}` doubled.
pub(crate) fn push_escaped(out: &mut String, text: &str) {
    for c in text.chars() {
        if c == '{' || c == '}' {
            out.push(c);
        }
        out.push(c);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn value_display() {
        assert_eq!(Value::from("hi").to_string(), "hi");
        assert_eq!(Value::from(42).to_string(), "42");
        assert_eq!(Value::from(true).to_string(), "true");
        assert_eq!(Value::from(1.5).to_string(), "1.5");
    }

    #[test]
    fn format_spec_width_and_precision() {
        let right = FormatSpec {
            width: 6,
            align: Align::Right,
            precision: Some(2),
        };
        assert_eq!(right.apply(&Value::Float(1.23456)), "  1.23");

        let left = FormatSpec {
            width: 5,
            align: Align::Left,
            precision: None,
        };
        assert_eq!(left.apply(&Value::from("ab")), "ab   ");
    }

    #[test]
    fn precision_ignored_for_non_floats() {
        let spec = FormatSpec {
            precision: Some(3),
            ..FormatSpec::default()
        };
        assert_eq!(spec.apply(&Value::Int(7)), "7");
    }

    #[test]
    fn value_callback_runs_on_every_evaluation() {
        let counter = Rc::new(Cell::new(0));
        let c = Rc::clone(&counter);
        let content = Content::new(
            vec![Piece::Text("n=".to_string()), Piece::Slot(0)],
            vec![Argument::value(move || {
                c.set(c.get() + 1);
                c.get()
            })],
        );
        assert_eq!(content.evaluate(), "n=1");
        assert_eq!(content.evaluate(), "n=2");
        assert_eq!(counter.get(), 2);
    }

    #[test]
    fn action_renders_empty_and_runs_once_per_evaluation() {
        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        let content = Content::new(
            vec![
                Piece::Text("a".to_string()),
                Piece::Slot(0),
                Piece::Text("b".to_string()),
            ],
            vec![Argument::action(move || h.set(h.get() + 1))],
        );
        assert_eq!(content.evaluate(), "ab");
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn callbacks_run_in_slot_order() {
        let log = Rc::new(std::cell::RefCell::new(Vec::new()));
        let (a, b) = (Rc::clone(&log), Rc::clone(&log));
        let content = Content::new(
            vec![Piece::Slot(1), Piece::Slot(0)],
            vec![
                Argument::action(move || a.borrow_mut().push("zero")),
                Argument::action(move || b.borrow_mut().push("one")),
            ],
        );
        content.evaluate();
        assert_eq!(*log.borrow(), vec!["one", "zero"]);
    }

    #[test]
    fn format_escapes_braces() {
        let content = Content::new(
            vec![Piece::Text("{x} ".to_string()), Piece::Slot(0)],
            vec![Argument::literal(1)],
        );
        assert_eq!(content.format(), "{{x}} {0}");
        assert_eq!(content.evaluate(), "{x} 1");
    }

    #[test]
    fn argument_builder_sets_format() {
        let arg = Argument::literal(2.0).left(4).precision(1);
        assert_eq!(arg.format.align, Align::Left);
        assert_eq!(arg.render(), "2.0 ");
        assert!(Argument::predicate(|| true).is_predicate());
    }
}
