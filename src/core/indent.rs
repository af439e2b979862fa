/// Indentation ruler: the whitespace unit worth one nesting level.
///
/// The first indented line of a document fixes the ruler. Later lines are
/// converted towards it, four spaces standing in for one tab.

const SPACES_PER_TAB: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ruler {
    Tab,
    Spaces(usize),
}

/// What a line's leading whitespace amounts to under a ruler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Measure {
    pub depth: usize,
    /// Indentation rewritten with the ruler's character only.
    pub canonical: String,
    /// Canonical length is not a whole number of ruler units.
    pub remainder: bool,
}

impl Measure {
    pub fn is_mixed(&self, raw: &str) -> bool {
        self.canonical != raw
    }
}

impl Ruler {
    /// Derive the ruler from the first indented line.
    pub fn from_indent(indent: &str) -> Option<Ruler> {
        match indent.chars().next()? {
            '\t' => Some(Ruler::Tab),
            _ => {
                let spaces = indent.chars().take_while(|c| *c == ' ').count();
                Some(Ruler::Spaces(spaces.max(1)))
            }
        }
    }

    pub fn unit_len(&self) -> usize {
        match self {
            Ruler::Tab => 1,
            Ruler::Spaces(n) => *n,
        }
    }

    pub fn unit_name(&self) -> &'static str {
        match self {
            Ruler::Tab => "tabs",
            Ruler::Spaces(_) => "spaces",
        }
    }

    pub fn measure(&self, indent: &str) -> Measure {
        let canonical = match self {
            Ruler::Tab => indent.replace(&" ".repeat(SPACES_PER_TAB), "\t").replace(' ', ""),
            Ruler::Spaces(n) => indent.replace('\t', &" ".repeat(*n)),
        };
        let len = canonical.chars().count();
        Measure {
            depth: len / self.unit_len(),
            remainder: len % self.unit_len() != 0,
            canonical,
        }
    }
}

/// Leading run of spaces and tabs.
pub fn leading_indent(text: &str) -> &str {
    let end = text
        .find(|c: char| c != ' ' && c != '\t')
        .unwrap_or(text.len());
    &text[..end]
}

/// Human description of raw indentation, e.g. "2 tabs and 3 spaces".
pub fn describe_indent(indent: &str) -> String {
    let tabs = indent.chars().filter(|c| *c == '\t').count();
    let spaces = indent.chars().filter(|c| *c == ' ').count();
    match (tabs, spaces) {
        (t, s) if t > 0 && s > 0 => format!("{} tabs and {} spaces", t, s),
        (t, _) if t > 0 => format!("{} tabs", t),
        (_, s) => format!("{} spaces", s),
    }
}
