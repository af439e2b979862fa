/// Compiler: turns a script into an immutable node tree.
///
/// Works line by line: measure indentation against the document's ruler,
/// settle the nesting stack, then classify the line by its leading token.
/// Content problems never abort compilation; they are reported as issues
/// and the compiler recovers as best it can.
use log::debug;
use rustc_hash::FxHashMap;

use crate::core::indent::{describe_indent, leading_indent, Ruler};
use crate::core::options::CompileOptions;
use crate::core::script::{Script, ScriptError, Token};
use crate::schema::content::{Argument, ArgumentKind, Content, Piece, PredicateFn};
use crate::schema::issue::{Issue, IssueKind};
use crate::schema::node::{Choice, Comment, Document, GoTo, Line, Node, NodeId, Passage};

/// Name given to the passage holding content written before any header.
pub const ROOT_PASSAGE: &str = "Root";

#[derive(Debug, Clone, Default)]
pub struct Compiler {
    options: CompileOptions,
}

impl Compiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: CompileOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    /// Compile a script. Always produces a document; every problem found
    /// along the way is handed to `issues`.
    pub fn compile<F>(&self, script: &Script, issues: F) -> Document
    where
        F: FnMut(Issue),
    {
        let mut compilation = Compilation::new(&self.options, issues);
        for (number, line) in split_lines(script).into_iter().enumerate() {
            compilation.process_line(number, line);
        }
        compilation.resolve_gotos();
        compilation.finish()
    }

    /// Compile `script` with its literal text replaced by a translation in
    /// localizable `{N}` format. Fails only when the translation itself is
    /// malformed or names arguments the script does not have.
    pub fn compile_localized<F>(
        &self,
        script: &Script,
        localized_text: &str,
        issues: F,
    ) -> Result<Document, ScriptError>
    where
        F: FnMut(Issue),
    {
        let localized = script.localize(localized_text)?;
        Ok(self.compile(&localized, issues))
    }
}

/// One physical source line with its arguments split from its predicates.
#[derive(Default)]
struct SourceLine {
    fragment: Fragment,
    args: Vec<Argument>,
    predicates: Vec<PredicateFn>,
}

impl SourceLine {
    fn push_text(&mut self, text: &str) {
        if let Some(Piece::Text(last)) = self.fragment.pieces.last_mut() {
            last.push_str(text);
        } else {
            self.fragment.pieces.push(Piece::Text(text.to_string()));
        }
    }

    fn push_argument(&mut self, argument: &Argument) {
        match &argument.kind {
            // Predicates gate the line; their slot disappears from the text.
            ArgumentKind::Predicate(test) => self.predicates.push(test.clone()),
            _ => {
                self.fragment.pieces.push(Piece::Slot(self.args.len()));
                self.args.push(argument.clone());
            }
        }
    }

    /// The line as it reads in localizable form, used in issues.
    fn display_text(&self) -> String {
        Content::new(self.fragment.pieces.clone(), self.args.clone()).format()
    }
}

fn split_lines(script: &Script) -> Vec<SourceLine> {
    let arguments = script.arguments();
    let mut lines = Vec::new();
    let mut current = SourceLine::default();
    for token in script.tokenize() {
        match token {
            Token::Literal(text) => current.push_text(&text),
            Token::Slot(index) => {
                if let Some(argument) = arguments.get(index) {
                    current.push_argument(argument);
                }
            }
            Token::LineBreak => lines.push(std::mem::take(&mut current)),
        }
    }
    lines.push(current);
    lines
}

/// Pieces of a line being whittled down to its payload.
#[derive(Debug, Default)]
struct Fragment {
    pieces: Vec<Piece>,
}

impl Fragment {
    fn leading_text(&self) -> &str {
        match self.pieces.first() {
            Some(Piece::Text(text)) => text,
            _ => "",
        }
    }

    fn is_blank(&self) -> bool {
        self.pieces.iter().all(|piece| match piece {
            Piece::Text(text) => text.trim().is_empty(),
            Piece::Slot(_) => false,
        })
    }

    fn trim_start(&mut self) {
        while let Some(Piece::Text(text)) = self.pieces.first_mut() {
            let trimmed = text.trim_start();
            if trimmed.is_empty() {
                self.pieces.remove(0);
            } else {
                *text = trimmed.to_string();
                break;
            }
        }
    }

    fn trim_end(&mut self) {
        while let Some(Piece::Text(text)) = self.pieces.last_mut() {
            let trimmed = text.trim_end();
            if trimmed.is_empty() {
                self.pieces.pop();
            } else {
                *text = trimmed.to_string();
                break;
            }
        }
    }

    fn trim(&mut self) {
        self.trim_start();
        self.trim_end();
    }

    /// Remove `prefix` from the start of the line, then any whitespace after it.
    fn strip_token(&mut self, prefix: &str) {
        if let Some(Piece::Text(text)) = self.pieces.first_mut() {
            if let Some(rest) = text.strip_prefix(prefix) {
                *text = rest.to_string();
            }
        }
        self.trim_start();
    }

    /// Literal rendering with slots written as `{N}`, used for names.
    fn plain(&self) -> String {
        let mut out = String::new();
        for piece in &self.pieces {
            match piece {
                Piece::Text(text) => out.push_str(text),
                Piece::Slot(index) => out.push_str(&format!("{{{}}}", index)),
            }
        }
        out
    }
}

struct Compilation<'o, F> {
    options: &'o CompileOptions,
    issues: F,
    issue_count: usize,
    nodes: Vec<Node>,
    root: NodeId,
    /// Open containers, the current passage at the bottom.
    stack: Vec<NodeId>,
    declared: Vec<NodeId>,
    passages: FxHashMap<String, NodeId>,
    /// GoTos awaiting resolution, with the line they came from.
    gotos: Vec<(usize, NodeId)>,
    line_texts: Vec<String>,
    ruler: Option<Ruler>,
}

impl<'o, F> Compilation<'o, F>
where
    F: FnMut(Issue),
{
    fn new(options: &'o CompileOptions, issues: F) -> Self {
        let root = NodeId(0);
        Self {
            options,
            issues,
            issue_count: 0,
            nodes: vec![Node::Passage(Passage {
                name: ROOT_PASSAGE.to_string(),
                children: Vec::new(),
            })],
            root,
            stack: vec![root],
            declared: Vec::new(),
            passages: FxHashMap::default(),
            gotos: Vec::new(),
            line_texts: Vec::new(),
            ruler: None,
        }
    }

    fn report(&mut self, kind: IssueKind, line: usize, message: String) {
        let line_text = if self.options.include_line_in_issue {
            self.line_texts.get(line).cloned()
        } else {
            None
        };
        let issue = Issue::new(kind, line, line_text, message);
        debug!("{}", issue);
        self.issue_count += 1;
        (self.issues)(issue);
    }

    fn process_line(&mut self, number: usize, line: SourceLine) {
        self.line_texts.push(line.display_text());

        let SourceLine {
            mut fragment,
            args,
            predicates,
        } = line;

        if fragment.is_blank() && predicates.is_empty() {
            return;
        }

        let depth = self.measure_depth(number, leading_indent(fragment.leading_text()).to_string());
        self.settle_stack(number, depth);

        fragment.trim_start();
        let lead = fragment.leading_text();

        if lead.starts_with('=') {
            self.passage_header(number, &fragment);
        } else if lead.starts_with("->") {
            fragment.strip_token("->");
            let target = fragment.plain().trim().to_string();
            if target.is_empty() {
                self.report(IssueKind::TokenEmpty, number, "GoTo must have a destination".to_string());
            } else {
                let id = self.add_child(Node::GoTo(GoTo {
                    target,
                    destination: None,
                }));
                self.gotos.push((number, id));
            }
        } else if lead.starts_with("<-") {
            fragment.strip_token("<-");
            if !fragment.is_blank() {
                self.report(
                    IssueKind::TokenNonEmpty,
                    number,
                    "Return must not have any content on the same line".to_string(),
                );
            }
            self.add_child(Node::Return);
        } else if lead.starts_with('>') {
            fragment.strip_token(">");
            fragment.trim_end();
            self.add_child(Node::Choice(Choice {
                visibility: predicates,
                content: Content::new(fragment.pieces, args),
                children: Vec::new(),
            }));
        } else if lead.starts_with('<') {
            fragment.strip_token("<");
            if !fragment.is_blank() {
                self.report(
                    IssueKind::TokenNonEmpty,
                    number,
                    "Close choice must not have any content on the same line".to_string(),
                );
            }
            self.add_child(Node::CloseChoice);
        } else if lead.starts_with("//") {
            if self.options.strip_comments {
                return;
            }
            fragment.strip_token("//");
            fragment.trim_end();
            self.add_child(Node::Comment(Comment {
                content: Content::new(fragment.pieces, args),
            }));
        } else {
            fragment.trim();
            if fragment.is_blank() {
                return;
            }
            self.add_child(Node::Line(Line {
                visibility: predicates,
                content: Content::new(fragment.pieces, args),
                children: Vec::new(),
            }));
        }
    }

    /// Depth of a line from its raw indentation, reporting mixed or
    /// excessive indentation.
    fn measure_depth(&mut self, number: usize, indent: String) -> usize {
        if indent.is_empty() {
            return 0;
        }
        let ruler = match self.ruler {
            Some(ruler) => ruler,
            None => match Ruler::from_indent(&indent) {
                Some(ruler) => *self.ruler.insert(ruler),
                None => return 0,
            },
        };

        let measure = ruler.measure(&indent);
        if measure.is_mixed(&indent) {
            self.report(
                IssueKind::MixedIndentation,
                number,
                format!(
                    "Expected {} {} but line starts with {}",
                    measure.canonical.chars().count(),
                    ruler.unit_name(),
                    describe_indent(&indent)
                ),
            );
        }

        let max_depth = self.stack.len();
        if measure.depth > max_depth {
            self.report(
                IssueKind::UnexpectedIndentation,
                number,
                format!(
                    "Expected a depth of {} at most, this one sits at {}",
                    max_depth, measure.depth
                ),
            );
            return max_depth;
        }
        if measure.remainder {
            let unit = ruler.unit_len();
            self.report(
                IssueKind::UnexpectedIndentation,
                number,
                format!(
                    "Expected {} or {} {} but line contains {}",
                    measure.depth * unit,
                    (measure.depth + 1) * unit,
                    ruler.unit_name(),
                    measure.canonical.chars().count()
                ),
            );
        }
        measure.depth
    }

    /// Unwind to `depth`, or open the previous sibling when the line sits
    /// one level deeper than the current container.
    fn settle_stack(&mut self, number: usize, depth: usize) {
        while depth + 1 < self.stack.len() {
            self.stack.pop();
        }
        if depth != self.stack.len() {
            return;
        }

        let Some(&parent) = self.stack.last() else {
            return;
        };
        match self.node(parent).children().last().copied() {
            Some(previous) if self.can_hold_children(previous) => self.stack.push(previous),
            Some(previous) if matches!(self.node(previous), Node::Line(_)) => self.report(
                IssueKind::UnexpectedIndentation,
                number,
                "Expected a predicate on the line above this one because of increased indentation"
                    .to_string(),
            ),
            _ => self.report(
                IssueKind::UnexpectedIndentation,
                number,
                "Indentation too deep or invalid parent line".to_string(),
            ),
        }
    }

    fn can_hold_children(&self, id: NodeId) -> bool {
        match self.node(id) {
            Node::Passage(_) | Node::Choice(_) => true,
            Node::Line(line) => !line.visibility.is_empty(),
            Node::GoTo(_) | Node::Return | Node::CloseChoice | Node::Comment(_) => false,
        }
    }

    fn passage_header(&mut self, number: usize, fragment: &Fragment) {
        let plain = fragment.plain();
        let name = plain
            .trim_start_matches('=')
            .trim_start()
            .split('=')
            .next()
            .unwrap_or("")
            .trim()
            .to_string();
        if name.is_empty() {
            self.report(IssueKind::TokenEmpty, number, "Passage must be named".to_string());
            return;
        }

        let id = self.push_node(Node::Passage(Passage {
            name: name.clone(),
            children: Vec::new(),
        }));
        self.declared.push(id);
        if self.passages.contains_key(&name) {
            self.report(
                IssueKind::DuplicatePassage,
                number,
                format!(
                    "Passage '{}' is already declared, jumps keep targeting the first one",
                    name
                ),
            );
        } else {
            self.passages.insert(name, id);
        }

        self.stack.clear();
        self.stack.push(id);
    }

    fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    fn push_node(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    fn add_child(&mut self, node: Node) -> NodeId {
        let parent = self.stack.last().copied().unwrap_or(self.root);
        let id = self.push_node(node);
        if let Some(children) = self.nodes[parent.index()].children_mut() {
            children.push(id);
        }
        id
    }

    fn resolve_gotos(&mut self) {
        let gotos = std::mem::take(&mut self.gotos);
        for (number, id) in gotos {
            let target = match &self.nodes[id.index()] {
                Node::GoTo(goto) => goto.target.clone(),
                _ => continue,
            };
            match self.passages.get(&target).copied() {
                Some(destination) => {
                    if let Node::GoTo(goto) = &mut self.nodes[id.index()] {
                        goto.destination = Some(destination);
                    }
                }
                None => self.report(
                    IssueKind::UnknownPassage,
                    number,
                    format!("Could not find passage '{}' in script", target),
                ),
            }
        }
    }

    fn finish(mut self) -> Document {
        for node in &mut self.nodes {
            if let Some(children) = node.children_mut() {
                children.shrink_to_fit();
            }
        }
        self.nodes.shrink_to_fit();
        debug!(
            "compiled {} passages into {} nodes with {} issues",
            self.declared.len(),
            self.nodes.len(),
            self.issue_count
        );
        Document {
            nodes: self.nodes,
            root: self.root,
            declared: self.declared,
            passages: self.passages,
        }
    }
}
