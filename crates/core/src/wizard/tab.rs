//! Wizard tabs and their linear order.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A wizard tab. The first seven form the editable path; `Summary` and
/// `Bibliography` replace it once the analysis is no longer editable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tab {
    Overview,
    Predictors,
    Transformations,
    Hrf,
    Contrasts,
    Review,
    Submit,
    Summary,
    Bibliography,
}

impl Tab {
    pub const EDITING: [Tab; 7] = [
        Tab::Overview,
        Tab::Predictors,
        Tab::Transformations,
        Tab::Hrf,
        Tab::Contrasts,
        Tab::Review,
        Tab::Submit,
    ];

    pub const READ_ONLY: [Tab; 2] = [Tab::Summary, Tab::Bibliography];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tab::Overview => "overview",
            Tab::Predictors => "predictors",
            Tab::Transformations => "transformations",
            Tab::Hrf => "hrf",
            Tab::Contrasts => "contrasts",
            Tab::Review => "review",
            Tab::Submit => "submit",
            Tab::Summary => "summary",
            Tab::Bibliography => "bibliography",
        }
    }

    pub fn parse(s: &str) -> Option<Tab> {
        Tab::EDITING
            .into_iter()
            .chain(Tab::READ_ONLY)
            .find(|t| t.as_str() == s)
    }

    pub fn is_editing(&self) -> bool {
        Tab::EDITING.contains(self)
    }

    fn path(&self) -> &'static [Tab] {
        if self.is_editing() {
            &Tab::EDITING
        } else {
            &Tab::READ_ONLY
        }
    }

    /// Position on the tab's own path.
    pub fn position(&self) -> usize {
        self.path().iter().position(|t| t == self).unwrap_or(0)
    }

    pub fn next(&self) -> Option<Tab> {
        self.path().get(self.position() + 1).copied()
    }

    pub fn prev(&self) -> Option<Tab> {
        self.position()
            .checked_sub(1)
            .and_then(|i| self.path().get(i).copied())
    }

    /// Whether `self` comes after `other` on the editable path.
    pub fn is_past(&self, other: Tab) -> bool {
        self.is_editing() && other.is_editing() && self.position() > other.position()
    }
}

impl fmt::Display for Tab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn editing_path_is_linear() {
        let mut tab = Tab::Overview;
        let mut seen = vec![tab];
        while let Some(next) = tab.next() {
            seen.push(next);
            tab = next;
        }
        assert_eq!(seen, Tab::EDITING.to_vec());
        assert_eq!(Tab::Overview.prev(), None);
        assert_eq!(Tab::Submit.next(), None);
    }

    #[test]
    fn read_only_path_is_separate() {
        assert_eq!(Tab::Summary.next(), Some(Tab::Bibliography));
        assert_eq!(Tab::Bibliography.next(), None);
        assert!(!Tab::Summary.is_past(Tab::Contrasts));
    }

    #[test]
    fn names_parse_back() {
        for tab in Tab::EDITING.into_iter().chain(Tab::READ_ONLY) {
            assert_eq!(Tab::parse(tab.as_str()), Some(tab));
        }
        assert_eq!(Tab::parse("nope"), None);
    }
}
