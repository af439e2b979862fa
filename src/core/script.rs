/// Script source model: literal text interleaved with argument slots,
/// plus the `{N}` localization format.
use thiserror::Error;

use crate::schema::content::{push_escaped, Argument, Value};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScriptError {
    #[error("unclosed placeholder starting at byte {0}")]
    UnclosedPlaceholder(usize),
    #[error("invalid placeholder '{{{text}}}' at byte {position}: expected an argument index")]
    InvalidPlaceholder { position: usize, text: String },
    #[error("unmatched closing brace at byte {0}")]
    UnmatchedBrace(usize),
    #[error("placeholder {{{index}}} refers past the {count} available arguments")]
    ArgumentOutOfRange { index: usize, count: usize },
}

/// One element of a script's source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Text(String),
    /// Index into the script's argument list.
    Slot(usize),
}

/// Output of the tokenizer: literal runs, argument slots and line breaks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Literal(String),
    Slot(usize),
    LineBreak,
}

/// Raw script source: literal text with host arguments bound to slots.
///
/// Built either incrementally, the way an interpolated string would be:
///
/// ```
/// use narrative_script::core::script::Script;
///
/// let gold = std::rc::Rc::new(std::cell::Cell::new(3));
/// let g = gold.clone();
/// let script = Script::new()
///     .text("== Shop ==\nYou have ")
///     .value(move || g.get())
///     .text(" gold.");
/// assert_eq!(script.to_localizable_format(), "== Shop ==\nYou have {0} gold.");
/// ```
///
/// or from a `{N}` template with [`Script::parse`].
#[derive(Debug, Clone, Default)]
pub struct Script {
    segments: Vec<Segment>,
    arguments: Vec<Argument>,
}

impl Script {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append literal text.
    pub fn text(mut self, text: &str) -> Self {
        if text.is_empty() {
            return self;
        }
        if let Some(Segment::Text(last)) = self.segments.last_mut() {
            last.push_str(text);
        } else {
            self.segments.push(Segment::Text(text.to_string()));
        }
        self
    }

    /// Append an argument slot.
    pub fn arg(mut self, argument: Argument) -> Self {
        self.segments.push(Segment::Slot(self.arguments.len()));
        self.arguments.push(argument);
        self
    }

    pub fn literal(self, value: impl Into<Value>) -> Self {
        self.arg(Argument::literal(value))
    }

    pub fn value<F, V>(self, produce: F) -> Self
    where
        F: Fn() -> V + 'static,
        V: Into<Value>,
    {
        self.arg(Argument::value(produce))
    }

    pub fn action<F>(self, run: F) -> Self
    where
        F: Fn() + 'static,
    {
        self.arg(Argument::action(run))
    }

    pub fn predicate<F>(self, test: F) -> Self
    where
        F: Fn() -> bool + 'static,
    {
        self.arg(Argument::predicate(test))
    }

    /// Build a script from a template whose `{N}` placeholders index into
    /// `arguments`. `{{` and `}}` produce literal braces.
    pub fn parse(template: &str, arguments: Vec<Argument>) -> Result<Script, ScriptError> {
        let mut segments = Vec::new();
        let mut literal_buf = String::new();
        let mut chars = template.char_indices().peekable();

        while let Some((pos, c)) = chars.next() {
            match c {
                '{' => {
                    if matches!(chars.peek(), Some((_, '{'))) {
                        chars.next();
                        literal_buf.push('{');
                        continue;
                    }

                    let mut body = String::new();
                    let mut closed = false;
                    for (_, inner) in chars.by_ref() {
                        if inner == '}' {
                            closed = true;
                            break;
                        }
                        body.push(inner);
                    }
                    if !closed {
                        return Err(ScriptError::UnclosedPlaceholder(pos));
                    }

                    let index = parse_index(&body).ok_or_else(|| ScriptError::InvalidPlaceholder {
                        position: pos,
                        text: body.clone(),
                    })?;
                    if index >= arguments.len() {
                        return Err(ScriptError::ArgumentOutOfRange {
                            index,
                            count: arguments.len(),
                        });
                    }

                    if !literal_buf.is_empty() {
                        segments.push(Segment::Text(std::mem::take(&mut literal_buf)));
                    }
                    segments.push(Segment::Slot(index));
                }
                '}' => {
                    if matches!(chars.peek(), Some((_, '}'))) {
                        chars.next();
                        literal_buf.push('}');
                        continue;
                    }
                    return Err(ScriptError::UnmatchedBrace(pos));
                }
                _ => literal_buf.push(c),
            }
        }

        if !literal_buf.is_empty() {
            segments.push(Segment::Text(literal_buf));
        }

        Ok(Script {
            segments,
            arguments,
        })
    }

    /// Swap the literal text for a translation while keeping this script's
    /// arguments, matched by placeholder index.
    pub fn localize(&self, localized_text: &str) -> Result<Script, ScriptError> {
        Self::parse(localized_text, self.arguments.clone())
    }

    /// The translation-ready form: literal text with every slot written as
    /// `{N}` and literal braces doubled.
    pub fn to_localizable_format(&self) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => push_escaped(&mut out, text),
                Segment::Slot(index) => {
                    out.push('{');
                    out.push_str(&index.to_string());
                    out.push('}');
                }
            }
        }
        out
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn arguments(&self) -> &[Argument] {
        &self.arguments
    }

    /// Split the source into literal runs, slots and line breaks.
    /// Carriage returns are dropped; empty literal runs are never emitted.
    pub fn tokenize(&self) -> Vec<Token> {
        let mut tokens = Vec::new();
        for segment in &self.segments {
            match segment {
                Segment::Slot(index) => tokens.push(Token::Slot(*index)),
                Segment::Text(text) => {
                    let text = text.replace('\r', "");
                    let mut parts = text.split('\n');
                    if let Some(first) = parts.next() {
                        if !first.is_empty() {
                            tokens.push(Token::Literal(first.to_string()));
                        }
                    }
                    for part in parts {
                        tokens.push(Token::LineBreak);
                        if !part.is_empty() {
                            tokens.push(Token::Literal(part.to_string()));
                        }
                    }
                }
            }
        }
        tokens
    }
}

fn parse_index(body: &str) -> Option<usize> {
    if body.is_empty() || !body.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    body.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_merges_adjacent_text() {
        let script = Script::new().text("a").text("b").literal(1).text("c");
        assert_eq!(
            script.segments(),
            &[
                Segment::Text("ab".to_string()),
                Segment::Slot(0),
                Segment::Text("c".to_string())
            ]
        );
        assert_eq!(script.arguments().len(), 1);
    }

    #[test]
    fn parse_placeholders() {
        let script = Script::parse(
            "Hi {1}, meet {0}.",
            vec![Argument::literal("Ann"), Argument::literal("Bo")],
        )
        .unwrap();
        assert_eq!(
            script.segments(),
            &[
                Segment::Text("Hi ".to_string()),
                Segment::Slot(1),
                Segment::Text(", meet ".to_string()),
                Segment::Slot(0),
                Segment::Text(".".to_string()),
            ]
        );
    }

    #[test]
    fn parse_escaped_braces() {
        let script = Script::parse("Use {{braces}} here.", Vec::new()).unwrap();
        assert_eq!(
            script.segments(),
            &[Segment::Text("Use {braces} here.".to_string())]
        );
        assert_eq!(script.to_localizable_format(), "Use {{braces}} here.");
    }

    #[test]
    fn parse_errors() {
        assert_eq!(
            Script::parse("Bad {} here", Vec::new()).unwrap_err(),
            ScriptError::InvalidPlaceholder {
                position: 4,
                text: String::new()
            }
        );
        assert!(matches!(
            Script::parse("Bad {name}", Vec::new()),
            Err(ScriptError::InvalidPlaceholder { .. })
        ));
        assert_eq!(
            Script::parse("Bad {0", Vec::new()).unwrap_err(),
            ScriptError::UnclosedPlaceholder(4)
        );
        assert_eq!(
            Script::parse("Bad } here", Vec::new()).unwrap_err(),
            ScriptError::UnmatchedBrace(4)
        );
        assert_eq!(
            Script::parse("{2}", vec![Argument::literal(1)]).unwrap_err(),
            ScriptError::ArgumentOutOfRange { index: 2, count: 1 }
        );
    }

    #[test]
    fn localizable_format_numbers_slots() {
        let script = Script::new()
            .text("== Start ==\nHello ")
            .value(|| "you")
            .text("\n> Go ")
            .predicate(|| true);
        assert_eq!(
            script.to_localizable_format(),
            "== Start ==\nHello {0}\n> Go {1}"
        );
    }

    #[test]
    fn localize_reuses_arguments_by_index() {
        let script = Script::new().text("Hello ").literal("Ann").text(" and ").literal("Bo");
        let french = script.localize("{1} et {0}, bonjour").unwrap();
        assert_eq!(french.arguments().len(), 2);
        assert_eq!(french.segments()[0], Segment::Slot(1));
        assert_eq!(french.to_localizable_format(), "{1} et {0}, bonjour");
    }

    #[test]
    fn tokenize_splits_lines_and_drops_carriage_returns() {
        let script = Script::new().text("a\r\nb ").literal(1).text("\n\nc");
        assert_eq!(
            script.tokenize(),
            vec![
                Token::Literal("a".to_string()),
                Token::LineBreak,
                Token::Literal("b ".to_string()),
                Token::Slot(0),
                Token::LineBreak,
                Token::LineBreak,
                Token::Literal("c".to_string()),
            ]
        );
    }
}
