//! Action kinds and enable/disable resolution.

use crate::error::ConfigError;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

/// Letters enabled when only `disable` is given.
pub const DEFAULT_LETTERS: &str = "CRUDL";

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum ActionKind {
    List,
    Read,
    Create,
    Update,
    Delete,
    Ensure,
    Session,
}

impl ActionKind {
    /// Parse a configuration letter. Session is never enabled by letter.
    pub fn from_letter(c: char) -> Option<Self> {
        match c {
            'L' => Some(ActionKind::List),
            'R' => Some(ActionKind::Read),
            'C' => Some(ActionKind::Create),
            'U' => Some(ActionKind::Update),
            'D' => Some(ActionKind::Delete),
            'E' => Some(ActionKind::Ensure),
            _ => None,
        }
    }

    pub fn letter(self) -> char {
        match self {
            ActionKind::List => 'L',
            ActionKind::Read => 'R',
            ActionKind::Create => 'C',
            ActionKind::Update => 'U',
            ActionKind::Delete => 'D',
            ActionKind::Ensure => 'E',
            ActionKind::Session => 'S',
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Set of enabled actions for one resource.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ActionSet(BTreeSet<ActionKind>);

impl ActionSet {
    pub fn all() -> Self {
        ActionSet(
            [
                ActionKind::List,
                ActionKind::Read,
                ActionKind::Create,
                ActionKind::Update,
                ActionKind::Delete,
            ]
            .into_iter()
            .collect(),
        )
    }

    /// Parse a string of action letters. Duplicates collapse; unknown letters are rejected.
    pub fn from_letters(class_name: &str, letters: &str) -> Result<Self, ConfigError> {
        let mut set = BTreeSet::new();
        for c in letters.chars().filter(|c| !c.is_whitespace()) {
            let kind = ActionKind::from_letter(c.to_ascii_uppercase()).ok_or_else(|| {
                ConfigError::UnknownAction {
                    class_name: class_name.to_string(),
                    letter: c,
                }
            })?;
            set.insert(kind);
        }
        Ok(ActionSet(set))
    }

    /// Effective actions from optional enable/disable letters, falling back to `inherited`.
    pub fn resolve(
        class_name: &str,
        enable: Option<&str>,
        disable: Option<&str>,
        inherited: &ActionSet,
    ) -> Result<Self, ConfigError> {
        match (enable, disable) {
            (enable, Some(disable)) => {
                let enabled = Self::from_letters(class_name, enable.unwrap_or(DEFAULT_LETTERS))?;
                let disabled = Self::from_letters(class_name, disable)?;
                Ok(ActionSet(enabled.0.difference(&disabled.0).copied().collect()))
            }
            (Some(enable), None) => Self::from_letters(class_name, enable),
            (None, None) => Ok(inherited.clone()),
        }
    }

    pub fn contains(&self, kind: ActionKind) -> bool {
        self.0.contains(&kind)
    }

    pub fn iter(&self) -> impl Iterator<Item = ActionKind> + '_ {
        self.0.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ActionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for kind in &self.0 {
            write!(f, "{}", kind.letter())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ActionKind::*;

    fn kinds(set: &ActionSet) -> Vec<ActionKind> {
        set.iter().collect()
    }

    #[test]
    fn nothing_configured_inherits_default() {
        let resolved = ActionSet::resolve("Song", None, None, &ActionSet::all()).unwrap();
        assert_eq!(resolved, ActionSet::all());
        assert_eq!(kinds(&resolved), vec![List, Read, Create, Update, Delete]);
    }

    #[test]
    fn enable_only_is_taken_literally() {
        let resolved = ActionSet::resolve("Song", Some("CR"), None, &ActionSet::all()).unwrap();
        assert_eq!(kinds(&resolved), vec![Read, Create]);
    }

    #[test]
    fn disable_subtracts_from_default_letters() {
        let resolved = ActionSet::resolve("Song", None, Some("D"), &ActionSet::default()).unwrap();
        assert_eq!(kinds(&resolved), vec![List, Read, Create, Update]);
    }

    #[test]
    fn disable_subtracts_from_enable_when_both_given() {
        let resolved = ActionSet::resolve("Song", Some("CRUDLE"), Some("UD"), &ActionSet::all()).unwrap();
        assert_eq!(kinds(&resolved), vec![List, Read, Create, Ensure]);
    }

    #[test]
    fn duplicate_letters_collapse() {
        let resolved = ActionSet::resolve("Song", Some("CCRR"), None, &ActionSet::all()).unwrap();
        assert_eq!(resolved.len(), 2);
    }

    #[test]
    fn unknown_letters_are_rejected() {
        let err = ActionSet::resolve("Song", Some("CRX"), None, &ActionSet::all()).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownAction { letter: 'X', .. }));
        assert!(ActionSet::resolve("Song", None, Some("S"), &ActionSet::all()).is_err());
    }
}
