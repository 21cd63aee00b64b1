//! Action-path keys: `x`/`c`/`f`/`r<amount>` tokens concatenated to name a
//! node in a solution tree.

use std::fmt;
use std::str::FromStr;

use crate::error::WireError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Action {
    Check,
    Call,
    Fold,
    Raise(u32),
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Check => write!(f, "x"),
            Action::Call => write!(f, "c"),
            Action::Fold => write!(f, "f"),
            Action::Raise(amount) => write!(f, "r{amount}"),
        }
    }
}

impl FromStr for Action {
    type Err = WireError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "x" => Ok(Action::Check),
            "c" => Ok(Action::Call),
            "f" => Ok(Action::Fold),
            _ => {
                let amount = s
                    .strip_prefix('r')
                    .and_then(|rest| rest.parse::<u32>().ok())
                    .ok_or_else(|| WireError::InvalidAction(s.to_string()))?;
                Ok(Action::Raise(amount))
            }
        }
    }
}

/// An ordered path of actions from the root of a solution tree, e.g. `xcr150`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActionSequence(Vec<Action>);

impl ActionSequence {
    pub fn empty() -> Self {
        ActionSequence(Vec::new())
    }

    pub fn from_actions(actions: Vec<Action>) -> Self {
        ActionSequence(actions)
    }

    pub fn actions(&self) -> &[Action] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn parent(&self) -> Option<ActionSequence> {
        if self.0.is_empty() {
            None
        } else {
            Some(ActionSequence(self.0[..self.0.len() - 1].to_vec()))
        }
    }

    pub fn child(&self, action: Action) -> ActionSequence {
        let mut actions = self.0.clone();
        actions.push(action);
        ActionSequence(actions)
    }

    /// Every prefix of this sequence, shortest first, including the empty
    /// prefix and the full sequence itself.
    pub fn prefixes(&self) -> Vec<ActionSequence> {
        (0..=self.0.len())
            .map(|n| ActionSequence(self.0[..n].to_vec()))
            .collect()
    }
}

impl fmt::Display for ActionSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for action in &self.0 {
            write!(f, "{action}")?;
        }
        Ok(())
    }
}

fn tokenize(s: &str) -> Result<Vec<&str>, WireError> {
    let bytes = s.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'x' | b'c' | b'f' => {
                tokens.push(&s[i..i + 1]);
                i += 1;
            }
            b'r' => {
                let start = i;
                i += 1;
                let digits_start = i;
                while i < bytes.len() && bytes[i].is_ascii_digit() {
                    i += 1;
                }
                if i == digits_start {
                    return Err(WireError::InvalidAction(s.to_string()));
                }
                tokens.push(&s[start..i]);
            }
            _ => return Err(WireError::InvalidAction(s.to_string())),
        }
    }
    Ok(tokens)
}

impl FromStr for ActionSequence {
    type Err = WireError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tokens = tokenize(s)?;
        let actions = tokens
            .into_iter()
            .map(Action::from_str)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ActionSequence(actions))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_display_and_parse() {
        let seq: ActionSequence = "xcr150f".parse().unwrap();
        assert_eq!(seq.to_string(), "xcr150f");
        assert_eq!(seq.len(), 4);
    }

    #[test]
    fn empty_string_is_empty_sequence() {
        let seq: ActionSequence = "".parse().unwrap();
        assert!(seq.is_empty());
    }

    #[test]
    fn rejects_trailing_garbage() {
        assert!("xcz".parse::<ActionSequence>().is_err());
        assert!("r".parse::<ActionSequence>().is_err());
    }

    #[test]
    fn prefixes_include_empty_and_full() {
        let seq: ActionSequence = "xc".parse().unwrap();
        let prefixes = seq.prefixes();
        assert_eq!(prefixes.len(), 3);
        assert!(prefixes[0].is_empty());
        assert_eq!(prefixes[2], seq);
    }

    #[test]
    fn parent_of_empty_is_none() {
        assert!(ActionSequence::empty().parent().is_none());
    }
}
