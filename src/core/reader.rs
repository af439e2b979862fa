/// Reader: a pull-based cursor over a compiled document.
///
/// The cursor is an explicit stack of `(container, next child)` frames.
/// Each `move_next` walks forward until something renderable turns up: a
/// visible line, a set of visible choices, or a comment when asked for.
/// Content is evaluated when it becomes current, so host callbacks run
/// once per visit and looping back re-reads fresh values.
use log::{trace, warn};
use rustc_hash::FxHashSet;
use std::rc::Rc;
use thiserror::Error;

use crate::schema::content::PredicateFn;
use crate::schema::node::{Document, Node, NodeId};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReaderError {
    #[error("a choice is pending; call choose before moving on")]
    ChoicePending,
    #[error("no choice is pending")]
    NoChoicePending,
    #[error("choice {index} is out of range, {count} options are available")]
    ChoiceOutOfRange { index: usize, count: usize },
    #[error("reached a jump to unknown passage '{0}'")]
    UnresolvedGoTo(String),
    #[error("jump to passage '{0}' loops without showing anything")]
    SilentLoop(String),
    #[error("no passage named '{0}'")]
    UnknownPassage(String),
}

/// What the reader is currently showing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Line(String),
    Comment(String),
    /// Rendered options of a decision point, in source order.
    Choices(Vec<String>),
}

impl Step {
    pub fn is_choice(&self) -> bool {
        matches!(self, Self::Choices(_))
    }

    /// Text of a line or comment.
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Line(text) | Self::Comment(text) => Some(text),
            Self::Choices(_) => None,
        }
    }

    pub fn choices(&self) -> Option<&[String]> {
        match self {
            Self::Choices(options) => Some(options),
            _ => None,
        }
    }
}

/// One level of the cursor: a container and the index of the next child
/// to visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    pub container: NodeId,
    pub next: usize,
}

impl Frame {
    fn start(container: NodeId) -> Self {
        Self { container, next: 0 }
    }
}

/// Walks a shared document one line or decision at a time.
#[derive(Debug, Clone)]
pub struct Reader {
    document: Rc<Document>,
    start: NodeId,
    frames: Vec<Frame>,
    pending: Option<Vec<NodeId>>,
    current: Option<Step>,
    read_comments: bool,
}

impl Reader {
    /// Start at the document's entry passage.
    pub fn new(document: Rc<Document>) -> Self {
        let start = document.entry();
        Self::starting_at(document, start)
    }

    /// Start at the named passage.
    pub fn from_passage(document: Rc<Document>, name: &str) -> Result<Self, ReaderError> {
        let start = document
            .passage(name)
            .ok_or_else(|| ReaderError::UnknownPassage(name.to_string()))?;
        Ok(Self::starting_at(document, start))
    }

    fn starting_at(document: Rc<Document>, start: NodeId) -> Self {
        Self {
            document,
            start,
            frames: vec![Frame::start(start)],
            pending: None,
            current: None,
            read_comments: false,
        }
    }

    /// Surface comments kept by the compiler instead of skipping them.
    pub fn read_comments(mut self, read: bool) -> Self {
        self.read_comments = read;
        self
    }

    pub fn set_read_comments(&mut self, read: bool) {
        self.read_comments = read;
    }

    pub fn document(&self) -> &Rc<Document> {
        &self.document
    }

    /// The step exposed by the last successful `move_next`.
    pub fn current(&self) -> Option<&Step> {
        self.current.as_ref()
    }

    /// The cursor stack, outermost frame first.
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// Number of options awaiting `choose`, if a decision is pending.
    pub fn pending_choices(&self) -> Option<usize> {
        self.pending.as_ref().map(Vec::len)
    }

    /// Advance to the next renderable step. Returns `Ok(false)` once the
    /// passage being read is exhausted or returned from.
    ///
    /// Fails with `ChoicePending` while a decision waits for `choose`, and
    /// with `UnresolvedGoTo` when a jump to an unknown passage is reached.
    /// Taking the same jump twice without showing anything fails with
    /// `SilentLoop`. In both cases the cursor has already moved past the
    /// jump, so calling again resumes after it.
    pub fn move_next(&mut self) -> Result<bool, ReaderError> {
        if self.pending.is_some() {
            return Err(ReaderError::ChoicePending);
        }
        self.current = None;
        let document = Rc::clone(&self.document);
        // Jumps taken since the last step was shown.
        let mut jumps: FxHashSet<NodeId> = FxHashSet::default();

        loop {
            let Some(frame) = self.frames.last_mut() else {
                return Ok(false);
            };
            let siblings = document.children(frame.container);
            if frame.next >= siblings.len() {
                if document.node(frame.container).is_passage() {
                    return Ok(false);
                }
                self.frames.pop();
                continue;
            }

            let id = siblings[frame.next];
            frame.next += 1;

            match document.node(id) {
                Node::Line(line) => {
                    if !is_visible(&line.visibility) {
                        continue;
                    }
                    let text = line.content.evaluate();
                    if text.trim().is_empty() {
                        continue;
                    }
                    if !line.children.is_empty() {
                        self.frames.push(Frame::start(id));
                    }
                    self.current = Some(Step::Line(text));
                    return Ok(true);
                }
                Node::Choice(_) => {
                    // The whole contiguous run of choices is one decision;
                    // skip past it now so the cursor resumes after it
                    // whichever option is taken.
                    let first = frame.next - 1;
                    let run = siblings[first..]
                        .iter()
                        .take_while(|sibling| matches!(document.node(**sibling), Node::Choice(_)))
                        .count();
                    frame.next = first + run;

                    let visible: Vec<NodeId> = siblings[first..first + run]
                        .iter()
                        .copied()
                        .filter(|choice| match document.node(*choice) {
                            Node::Choice(c) => is_visible(&c.visibility),
                            _ => false,
                        })
                        .collect();
                    if visible.is_empty() {
                        continue;
                    }

                    let options = visible
                        .iter()
                        .filter_map(|choice| match document.node(*choice) {
                            Node::Choice(c) => Some(c.content.evaluate()),
                            _ => None,
                        })
                        .collect();
                    self.pending = Some(visible);
                    self.current = Some(Step::Choices(options));
                    return Ok(true);
                }
                Node::GoTo(goto) => match goto.destination {
                    Some(_) if !jumps.insert(id) => {
                        warn!("jump to passage '{}' loops without output", goto.target);
                        return Err(ReaderError::SilentLoop(goto.target.clone()));
                    }
                    Some(destination) => {
                        trace!("jumping to passage '{}'", goto.target);
                        self.frames.push(Frame::start(destination));
                    }
                    None => {
                        warn!("reached jump to unknown passage '{}'", goto.target);
                        return Err(ReaderError::UnresolvedGoTo(goto.target.clone()));
                    }
                },
                Node::Return => {
                    trace!("returning from passage");
                    loop {
                        match self.frames.pop() {
                            None => return Ok(false),
                            Some(popped) if document.node(popped.container).is_passage() => break,
                            Some(_) => {}
                        }
                    }
                }
                Node::Comment(comment) => {
                    if self.read_comments {
                        self.current = Some(Step::Comment(comment.content.evaluate()));
                        return Ok(true);
                    }
                }
                Node::CloseChoice => {}
                // Passages are never children of other nodes.
                Node::Passage(_) => return Ok(false),
            }
        }
    }

    /// Take option `index` of the pending decision; its content is read next.
    pub fn choose(&mut self, index: usize) -> Result<(), ReaderError> {
        let pending = self.pending.as_ref().ok_or(ReaderError::NoChoicePending)?;
        let choice = *pending.get(index).ok_or(ReaderError::ChoiceOutOfRange {
            index,
            count: pending.len(),
        })?;
        trace!("choosing option {} of {}", index, pending.len());
        self.frames.push(Frame::start(choice));
        self.pending = None;
        Ok(())
    }

    /// Continue reading from the named passage. Any pending decision is
    /// dropped.
    pub fn goto_passage(&mut self, name: &str) -> Result<(), ReaderError> {
        let passage = self
            .document
            .passage(name)
            .ok_or_else(|| ReaderError::UnknownPassage(name.to_string()))?;
        trace!("forced jump to passage '{}'", name);
        self.pending = None;
        self.frames.push(Frame::start(passage));
        Ok(())
    }

    /// Rewind to the start of the starting passage. The document is untouched.
    pub fn reset(&mut self) {
        self.frames.clear();
        self.frames.push(Frame::start(self.start));
        self.pending = None;
        self.current = None;
    }
}

/// Inline predicates are alternatives: any one passing shows the node.
fn is_visible(visibility: &[PredicateFn]) -> bool {
    visibility.is_empty() || visibility.iter().any(|test| test())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::compiler::Compiler;
    use crate::core::options::CompileOptions;
    use crate::core::script::Script;
    use std::cell::Cell;

    fn reader(source: &str) -> Reader {
        let doc = Compiler::new().compile(&Script::new().text(source), |_| {});
        Reader::new(Rc::new(doc))
    }

    fn next_text(reader: &mut Reader) -> Option<String> {
        match reader.move_next() {
            Ok(true) => reader.current().and_then(Step::text).map(str::to_string),
            _ => None,
        }
    }

    #[test]
    fn reads_lines_in_order() {
        let mut r = reader("== A ==\nOne\nTwo");
        assert_eq!(next_text(&mut r).as_deref(), Some("One"));
        assert_eq!(next_text(&mut r).as_deref(), Some("Two"));
        assert_eq!(r.move_next(), Ok(false));
        assert_eq!(r.move_next(), Ok(false));
    }

    #[test]
    fn choice_then_choose() {
        let mut r = reader("== A ==\n> Left\n\tWent left\n> Right\n\tWent right\nDone");
        assert_eq!(r.move_next(), Ok(true));
        assert_eq!(
            r.current().and_then(Step::choices),
            Some(&["Left".to_string(), "Right".to_string()][..])
        );
        assert_eq!(r.pending_choices(), Some(2));
        r.choose(1).unwrap();
        assert_eq!(next_text(&mut r).as_deref(), Some("Went right"));
        assert_eq!(next_text(&mut r).as_deref(), Some("Done"));
        assert_eq!(r.move_next(), Ok(false));
    }

    #[test]
    fn move_next_with_pending_choice_fails() {
        let mut r = reader("> a\n> b");
        assert_eq!(r.move_next(), Ok(true));
        assert_eq!(r.move_next(), Err(ReaderError::ChoicePending));
        // Still pending after the failed call.
        assert!(r.choose(0).is_ok());
    }

    #[test]
    fn choose_errors() {
        let mut r = reader("Line\n> a");
        assert_eq!(r.choose(0), Err(ReaderError::NoChoicePending));
        assert_eq!(r.move_next(), Ok(true));
        assert_eq!(r.choose(0), Err(ReaderError::NoChoicePending));
        assert_eq!(r.move_next(), Ok(true));
        assert_eq!(
            r.choose(4),
            Err(ReaderError::ChoiceOutOfRange { index: 4, count: 1 })
        );
    }

    #[test]
    fn close_choice_splits_decisions() {
        let mut r = reader("> a\n<\n> b");
        assert_eq!(r.move_next(), Ok(true));
        assert_eq!(r.pending_choices(), Some(1));
        r.choose(0).unwrap();
        assert_eq!(r.move_next(), Ok(true));
        assert_eq!(r.current().and_then(Step::choices).map(<[String]>::len), Some(1));
    }

    #[test]
    fn goto_does_not_return_implicitly() {
        let mut r = reader("== A ==\n-> B\nNever\n== B ==\nIn B");
        assert_eq!(next_text(&mut r).as_deref(), Some("In B"));
        assert_eq!(r.move_next(), Ok(false));
    }

    #[test]
    fn return_resumes_at_call_site() {
        let mut r = reader("== A ==\n-> B\nBack in A\n== B ==\nIn B\n<-\nNever");
        assert_eq!(next_text(&mut r).as_deref(), Some("In B"));
        assert_eq!(next_text(&mut r).as_deref(), Some("Back in A"));
        assert_eq!(r.move_next(), Ok(false));
    }

    #[test]
    fn unresolved_goto_is_a_controlled_failure() {
        let mut r = reader("== A ==\n-> Missing\nAfter");
        assert_eq!(
            r.move_next(),
            Err(ReaderError::UnresolvedGoTo("Missing".to_string()))
        );
        assert_eq!(next_text(&mut r).as_deref(), Some("After"));
    }

    #[test]
    fn comments_only_when_requested() {
        let doc = Rc::new(Compiler::with_options(CompileOptions::default().strip_comments(false)).compile(
            &Script::new().text("// note\nText"),
            |_| {},
        ));
        let mut silent = Reader::new(Rc::clone(&doc));
        assert_eq!(next_text(&mut silent).as_deref(), Some("Text"));

        let mut chatty = Reader::new(doc).read_comments(true);
        assert_eq!(chatty.move_next(), Ok(true));
        assert_eq!(chatty.current(), Some(&Step::Comment("note".to_string())));
    }

    #[test]
    fn reset_rewinds() {
        let mut r = reader("== A ==\nOne\nTwo");
        next_text(&mut r);
        next_text(&mut r);
        r.reset();
        assert_eq!(r.frames(), &[Frame { container: r.document().entry(), next: 0 }]);
        assert_eq!(next_text(&mut r).as_deref(), Some("One"));
    }

    #[test]
    fn reset_after_return_emptied_stack() {
        let mut r = reader("== A ==\nOne\n<-");
        next_text(&mut r);
        assert_eq!(r.move_next(), Ok(false));
        assert!(r.frames().is_empty());
        r.reset();
        assert_eq!(next_text(&mut r).as_deref(), Some("One"));
    }

    #[test]
    fn goto_passage_redirects() {
        let mut r = reader("== A ==\nIn A\n== B ==\nIn B");
        r.goto_passage("B").unwrap();
        assert_eq!(next_text(&mut r).as_deref(), Some("In B"));
        assert_eq!(
            r.goto_passage("C"),
            Err(ReaderError::UnknownPassage("C".to_string()))
        );
    }

    #[test]
    fn goto_passage_drops_pending_choice() {
        let mut r = reader("== A ==\n> stay\n> go\n== B ==\nIn B");
        assert_eq!(r.move_next(), Ok(true));
        assert!(r.current().is_some_and(Step::is_choice));
        assert_eq!(r.pending_choices(), Some(2));

        r.goto_passage("B").unwrap();
        assert_eq!(r.pending_choices(), None);
        assert_eq!(r.choose(0), Err(ReaderError::NoChoicePending));
        assert_eq!(next_text(&mut r).as_deref(), Some("In B"));
        assert!(!r.current().is_some_and(Step::is_choice));
    }

    #[test]
    fn silent_goto_cycle_is_reported() {
        let script = Script::new()
            .text("== Loop ==\nSecret ")
            .predicate(|| false)
            .text("\n-> Loop");
        let doc = Compiler::new().compile(&script, |_| {});
        let mut r = Reader::new(Rc::new(doc));
        assert_eq!(
            r.move_next(),
            Err(ReaderError::SilentLoop("Loop".to_string()))
        );
        // Bounded: one lap was taken before the repeat was caught.
        assert_eq!(r.frames().len(), 2);
    }

    #[test]
    fn silent_cycle_across_passages_is_reported() {
        let mut r = reader("== A ==\n-> B\n== B ==\n-> A");
        assert_eq!(r.move_next(), Err(ReaderError::SilentLoop("B".to_string())));
    }

    #[test]
    fn repeated_call_and_return_is_not_a_loop() {
        let mut r = reader("== A ==\n-> B\n-> B\nEnd\n== B ==\n<-");
        assert_eq!(next_text(&mut r).as_deref(), Some("End"));
    }

    #[test]
    fn looping_passage_with_output_keeps_going() {
        let mut r = reader("== A ==\nTick\n-> A");
        for _ in 0..10 {
            assert_eq!(next_text(&mut r).as_deref(), Some("Tick"));
        }
    }

    #[test]
    fn comments_toggle_between_reads() {
        let doc = Rc::new(
            Compiler::with_options(CompileOptions::default().strip_comments(false))
                .compile(&Script::new().text("== A ==\n// note\nText\n-> A"), |_| {}),
        );
        let mut r = Reader::new(doc);
        assert_eq!(next_text(&mut r).as_deref(), Some("Text"));
        r.set_read_comments(true);
        assert_eq!(r.move_next(), Ok(true));
        assert_eq!(r.current(), Some(&Step::Comment("note".to_string())));
    }

    #[test]
    fn from_passage_starts_there() {
        let doc = Rc::new(Compiler::new().compile(&Script::new().text("== A ==\na\n== B ==\nb"), |_| {}));
        let mut r = Reader::from_passage(Rc::clone(&doc), "B").unwrap();
        assert_eq!(next_text(&mut r).as_deref(), Some("b"));
        assert!(matches!(
            Reader::from_passage(doc, "Z"),
            Err(ReaderError::UnknownPassage(_))
        ));
    }

    #[test]
    fn predicates_combine_with_or() {
        let script = Script::new()
            .text("Shown ")
            .predicate(|| false)
            .predicate(|| true)
            .text("\nHidden ")
            .predicate(|| false)
            .predicate(|| false)
            .text("\nEnd");
        let doc = Compiler::new().compile(&script, |_| {});
        let mut r = Reader::new(Rc::new(doc));
        assert_eq!(next_text(&mut r).as_deref(), Some("Shown"));
        assert_eq!(next_text(&mut r).as_deref(), Some("End"));
    }

    #[test]
    fn action_only_line_runs_silently() {
        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        let script = Script::new()
            .action(move || h.set(h.get() + 1))
            .text("\nVisible");
        let doc = Compiler::new().compile(&script, |_| {});
        let mut r = Reader::new(Rc::new(doc));
        assert_eq!(next_text(&mut r).as_deref(), Some("Visible"));
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn hidden_choices_are_skipped_entirely() {
        let script = Script::new()
            .text("> a ")
            .predicate(|| false)
            .text("\n> b ")
            .predicate(|| false)
            .text("\nAfter");
        let doc = Compiler::new().compile(&script, |_| {});
        let mut r = Reader::new(Rc::new(doc));
        assert_eq!(next_text(&mut r).as_deref(), Some("After"));
        assert_eq!(r.pending_choices(), None);
    }
}
