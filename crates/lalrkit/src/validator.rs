//! Checks of the finished automaton against the grammar declarations.

use crate::{grammar::Grammar, states::States};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum ValidationError {
    #[error("shift/reduce conflicts: {found} found, {expected} expected")]
    ShiftReduceConflicts { found: usize, expected: usize },

    #[error("reduce/reduce conflicts: {found} found, {expected} expected")]
    ReduceReduceConflicts { found: usize, expected: usize },
}

/// Compares the conflict counts with the `%expect` declarations.
#[derive(Debug)]
pub struct GrammarValidator<'a> {
    grammar: &'a Grammar,
    states: &'a States,
}

impl<'a> GrammarValidator<'a> {
    pub fn new(grammar: &'a Grammar, states: &'a States) -> Self {
        Self { grammar, states }
    }

    /// Without `%expect`, any number of conflicts is accepted.
    ///
    /// Every mismatch is logged, and the first one is returned.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let Some(expected_sr) = self.grammar.expect() else {
            return Ok(());
        };
        let expected_rr = self.grammar.expect_rr().unwrap_or(0);

        let mut errors = vec![];
        let found = self.states.sr_conflicts_count();
        if found != expected_sr {
            errors.push(ValidationError::ShiftReduceConflicts {
                found,
                expected: expected_sr,
            });
        }
        let found = self.states.rr_conflicts_count();
        if found != expected_rr {
            errors.push(ValidationError::ReduceReduceConflicts {
                found,
                expected: expected_rr,
            });
        }

        for error in &errors {
            tracing::error!("{}", error);
        }
        match errors.into_iter().next() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

/// Log the number of conflicts left in the automaton.
pub fn diagnose_conflicts(states: &States) {
    let sr = states.sr_conflicts_count();
    if sr != 0 {
        tracing::warn!("shift/reduce conflicts: {} found", sr);
    }
    let rr = states.rr_conflicts_count();
    if rr != 0 {
        tracing::warn!("reduce/reduce conflicts: {} found", rr);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ambiguous_sum(expect: Option<usize>) -> Grammar {
        Grammar::define(|g| {
            if let Some(n) = expect {
                g.expect(n);
            }
            g.rule("E", &["E", "'+'", "E"]);
            g.rule("E", &["'n'"]);
            Ok(())
        })
        .unwrap()
    }

    #[test]
    fn without_expect_everything_passes() {
        let g = ambiguous_sum(None);
        let states = States::generate(&g);
        assert_eq!(states.sr_conflicts_count(), 1);
        assert_eq!(GrammarValidator::new(&g, &states).validate(), Ok(()));
    }

    #[test]
    fn matching_expect_passes() {
        let g = ambiguous_sum(Some(1));
        let states = States::generate(&g);
        assert_eq!(GrammarValidator::new(&g, &states).validate(), Ok(()));
    }

    #[test]
    fn expect_mismatch_is_an_error() {
        let g = ambiguous_sum(Some(0));
        let states = States::generate(&g);
        let err = GrammarValidator::new(&g, &states).validate().unwrap_err();
        assert_eq!(
            err,
            ValidationError::ShiftReduceConflicts {
                found: 1,
                expected: 0
            }
        );
        assert_eq!(
            err.to_string(),
            "shift/reduce conflicts: 1 found, 0 expected"
        );
    }

    #[test]
    fn expect_rr_defaults_to_zero() {
        let g = Grammar::define(|g| {
            g.expect(0);
            g.rule("S", &["A"]);
            g.rule("S", &["B"]);
            g.rule("A", &["'x'"]);
            g.rule("B", &["'x'"]);
            Ok(())
        })
        .unwrap();
        let states = States::generate(&g);
        assert_eq!(
            GrammarValidator::new(&g, &states).validate(),
            Err(ValidationError::ReduceReduceConflicts {
                found: 1,
                expected: 0
            })
        );
    }
}
