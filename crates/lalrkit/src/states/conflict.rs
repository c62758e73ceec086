//! Conflict detection, precedence-based resolution and default reductions.

use super::{item::Item, States};
use crate::grammar::{Assoc, Grammar, RuleID, SymbolID};
use std::{cmp::Ordering, fmt};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Conflict {
    ShiftReduce {
        symbols: Vec<SymbolID>,
        shift: SymbolID,
        reduce: Item,
    },
    ReduceReduce {
        symbols: Vec<SymbolID>,
        reduce1: Item,
        reduce2: Item,
    },
}

impl Conflict {
    /// The lookahead symbols on which the actions collide.
    pub fn symbols(&self) -> &[SymbolID] {
        match self {
            Self::ShiftReduce { symbols, .. } | Self::ReduceReduce { symbols, .. } => symbols,
        }
    }

    pub fn display<'g>(&'g self, g: &'g Grammar) -> impl fmt::Display + 'g {
        crate::util::display_fn(move |f| match self {
            Self::ShiftReduce { shift, reduce, .. } => write!(
                f,
                "shift/reduce conflict on {}: shift / reduce {}",
                g.symbol(*shift),
                g.rule(reduce.rule).display(g),
            ),
            Self::ReduceReduce {
                symbols,
                reduce1,
                reduce2,
            } => write!(
                f,
                "reduce/reduce conflict on {}: reduce {} / reduce {}",
                g.display_symbols(symbols),
                g.rule(reduce1.rule).display(g),
                g.rule(reduce2.rule).display(g),
            ),
        })
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Resolution {
    Shift,
    Reduce,
    /// `%nonassoc` at equal precedence: both actions are removed.
    Error,
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shift => f.write_str("shift"),
            Self::Reduce => f.write_str("reduce"),
            Self::Error => f.write_str("error"),
        }
    }
}

/// A shift/reduce conflict settled by precedence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConflict {
    pub symbol: SymbolID,
    pub reduce: RuleID,
    pub which: Resolution,
    /// The levels were equal and associativity decided.
    pub same_prec: bool,
}

impl ResolvedConflict {
    pub fn report_message(&self, g: &Grammar) -> String {
        let s = g.symbol(self.symbol).display_name();
        let r = g
            .rule(self.reduce)
            .precedence_sym()
            .map_or("", |sym| g.symbol(sym).display_name());
        let msg = match (self.which, self.same_prec) {
            (Resolution::Shift, true) => format!("resolved as shift (%right {})", s),
            (Resolution::Shift, false) => format!("resolved as shift ({} < {})", r, s),
            (Resolution::Reduce, true) => format!("resolved as reduce (%left {})", s),
            (Resolution::Reduce, false) => format!("resolved as reduce ({} < {})", s, r),
            (Resolution::Error, _) => format!("resolved as an error (%nonassoc {})", s),
        };
        format!(
            "Conflict between rule {} and token {} {}.",
            self.reduce, s, msg
        )
    }
}

impl States {
    pub(super) fn compute_conflicts(&mut self, g: &Grammar) {
        self.compute_shift_reduce_conflicts(g);
        self.compute_reduce_reduce_conflicts();
    }

    fn compute_shift_reduce_conflicts(&mut self, g: &Grammar) {
        for state in &mut self.states {
            for shift in &mut state.shifts {
                let sym = shift.symbol;
                for reduce in &mut state.reduces {
                    if !reduce.lookahead.as_ref().map_or(false, |la| la.contains(sym)) {
                        continue;
                    }

                    let shift_prec = g.symbol(sym).precedence();
                    let reduce_prec = g.rule(reduce.rule()).precedence(g);
                    let (Some(shift_prec), Some(reduce_prec)) = (shift_prec, reduce_prec) else {
                        // Resolvable only when both sides have a precedence.
                        state.conflicts.push(Conflict::ShiftReduce {
                            symbols: vec![sym],
                            shift: sym,
                            reduce: reduce.item,
                        });
                        continue;
                    };

                    let resolution = match shift_prec.priority.cmp(&reduce_prec.priority) {
                        Ordering::Less => {
                            shift.not_selected = true;
                            Some((Resolution::Reduce, false))
                        }
                        Ordering::Greater => {
                            reduce.not_selected.insert(sym);
                            Some((Resolution::Shift, false))
                        }
                        Ordering::Equal => match shift_prec.assoc {
                            Assoc::Precedence => {
                                // No associativity to decide with.
                                state.conflicts.push(Conflict::ShiftReduce {
                                    symbols: vec![sym],
                                    shift: sym,
                                    reduce: reduce.item,
                                });
                                None
                            }
                            Assoc::Right => {
                                reduce.not_selected.insert(sym);
                                Some((Resolution::Shift, true))
                            }
                            Assoc::Left => {
                                shift.not_selected = true;
                                Some((Resolution::Reduce, true))
                            }
                            Assoc::Nonassoc => {
                                shift.not_selected = true;
                                reduce.not_selected.insert(sym);
                                Some((Resolution::Error, false))
                            }
                        },
                    };
                    if let Some((which, same_prec)) = resolution {
                        state.resolved_conflicts.push(ResolvedConflict {
                            symbol: sym,
                            reduce: reduce.rule(),
                            which,
                            same_prec,
                        });
                    }
                }
            }
        }
    }

    fn compute_reduce_reduce_conflicts(&mut self) {
        for state in &mut self.states {
            for (i, reduce1) in state.reduces.iter().enumerate() {
                let Some(la1) = &reduce1.lookahead else { continue };
                for reduce2 in &state.reduces[i + 1..] {
                    let Some(la2) = &reduce2.lookahead else { continue };
                    let mut intersection = la1.clone();
                    intersection.intersect_with(la2);
                    if !intersection.is_empty() {
                        state.conflicts.push(Conflict::ReduceReduce {
                            symbols: intersection.to_vec(),
                            reduce1: reduce1.item,
                            reduce2: reduce2.item,
                        });
                    }
                }
            }
        }
    }

    /// Pick the reduction with the most lookaheads, preferring the lower rule number.
    pub(super) fn compute_default_reduction(&mut self) {
        for state in &mut self.states {
            if state.reduces.is_empty() || state.has_conflicts() || state.has_error_shift() {
                continue;
            }
            let chosen = state.reduces.iter().min_by_key(|r| {
                let count = r.lookahead.as_ref().map_or(0, |la| la.len());
                (std::cmp::Reverse(count), r.rule())
            });
            let Some(rule) = chosen.map(|r| r.rule()) else { continue };
            state.default_reduction_rule = Some(rule);
            for reduce in &mut state.reduces {
                if reduce.rule() == rule {
                    reduce.default_reduction = true;
                }
            }
        }
    }
}
