use serde::{Deserialize, Serialize};
use std::fmt;

/// How serious a compile issue is. Neither severity stops compilation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Severity {
    Warning,
    Error,
}

/// The compile issue taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IssueKind {
    /// Line sits deeper than its parent allows, or under a parent that
    /// cannot hold children.
    UnexpectedIndentation,
    /// Passage header without a name, or GoTo without a target.
    TokenEmpty,
    /// GoTo target does not name any passage.
    UnknownPassage,
    /// A passage name was declared twice.
    DuplicatePassage,
    /// Indentation mixes tabs and spaces against the ruler; auto-corrected.
    MixedIndentation,
    /// Token-only line carries trailing content; the content is dropped.
    TokenNonEmpty,
}

impl IssueKind {
    pub fn severity(&self) -> Severity {
        match self {
            Self::UnexpectedIndentation
            | Self::TokenEmpty
            | Self::UnknownPassage
            | Self::DuplicatePassage => Severity::Error,
            Self::MixedIndentation | Self::TokenNonEmpty => Severity::Warning,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::UnexpectedIndentation => "UnexpectedIndentation",
            Self::TokenEmpty => "TokenEmpty",
            Self::UnknownPassage => "UnknownPassage",
            Self::DuplicatePassage => "DuplicatePassage",
            Self::MixedIndentation => "MixedIndentation",
            Self::TokenNonEmpty => "TokenNonEmpty",
        }
    }
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A diagnostic recorded while compiling a script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub kind: IssueKind,
    /// Zero-based source line number.
    pub line: usize,
    /// The offending line, when the compiler was asked to keep it.
    pub line_text: Option<String>,
    pub message: String,
}

impl Issue {
    pub fn new(
        kind: IssueKind,
        line: usize,
        line_text: Option<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            line,
            line_text,
            message: message.into(),
        }
    }

    pub fn severity(&self) -> Severity {
        self.kind.severity()
    }

    pub fn is_error(&self) -> bool {
        self.severity() == Severity::Error
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}: {}' @ {}", self.kind, self.message, self.line)?;
        if let Some(ref text) = self.line_text {
            write!(f, " => '{}'", text)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severities() {
        assert_eq!(IssueKind::UnknownPassage.severity(), Severity::Error);
        assert_eq!(IssueKind::TokenEmpty.severity(), Severity::Error);
        assert_eq!(IssueKind::MixedIndentation.severity(), Severity::Warning);
        assert_eq!(IssueKind::TokenNonEmpty.severity(), Severity::Warning);
    }

    #[test]
    fn display_with_and_without_line_text() {
        let with = Issue::new(
            IssueKind::UnknownPassage,
            3,
            Some("-> Nowhere".to_string()),
            "Could not find passage 'Nowhere' in script",
        );
        assert_eq!(
            with.to_string(),
            "'UnknownPassage: Could not find passage 'Nowhere' in script' @ 3 => '-> Nowhere'"
        );

        let without = Issue::new(IssueKind::TokenEmpty, 0, None, "Passage must be named");
        assert_eq!(without.to_string(), "'TokenEmpty: Passage must be named' @ 0");
        assert!(without.is_error());
    }

    #[test]
    fn issue_ron_round_trip() {
        let issue = Issue::new(IssueKind::MixedIndentation, 7, None, "Expected 1 tabs");
        let serialized = ron::to_string(&issue).unwrap();
        let back: Issue = ron::from_str(&serialized).unwrap();
        assert_eq!(back, issue);
    }
}
