use crate::states::{Item, StateID};
use std::fmt;

/// An item within a particular state.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StateItem {
    pub state: StateID,
    pub item: Item,
}

impl fmt::Debug for StateItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:?},{:?})", self.state, self.item)
    }
}

/// A step of a derivation path through the automaton.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Path {
    /// The first step, at the start item of the start state.
    Start { to: StateItem },
    /// Move the dot over the next symbol, entering the next state.
    Transition { from: StateItem, to: StateItem },
    /// Expand the nonterminal after the dot within the same state.
    Production { from: StateItem, to: StateItem },
}

impl Path {
    pub fn from(&self) -> Option<StateItem> {
        match *self {
            Self::Start { .. } => None,
            Self::Transition { from, .. } | Self::Production { from, .. } => Some(from),
        }
    }

    pub fn to(&self) -> StateItem {
        match *self {
            Self::Start { to } | Self::Transition { to, .. } | Self::Production { to, .. } => to,
        }
    }

    pub fn is_transition(&self) -> bool {
        matches!(self, Self::Transition { .. })
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production { .. })
    }
}

/// Turn a forward sequence of state items into path steps.
pub(super) fn build_paths(state_items: &[StateItem]) -> Vec<Path> {
    let mut paths = Vec::with_capacity(state_items.len());
    let mut prev: Option<StateItem> = None;
    for &to in state_items {
        let path = match prev {
            None => Path::Start { to },
            Some(from) if to.item.is_beginning() => Path::Production { from, to },
            Some(from) => Path::Transition { from, to },
        };
        paths.push(path);
        prev = Some(to);
    }
    paths
}
