//! LALR(1) lookahead sets.
//!
//! ```text
//! DR(p,A)     = { t | p --(A)--> r --(t)--> }
//! (p,A) reads (r,C)     <==> p --(A)--> r --(C)--> && C =>* ε
//! (p,A) includes (p',B) <==> B -> βAγ, γ =>* ε, p' --(β)--> p
//! (q,A->ω) lookback (p,A) <==> p --(ω)--> q
//! Read(p,A)   = DR(p,A) ∪ ⋃{ Read(r,C) | (p,A) reads (r,C) }
//! Follow(p,A) = Read(p,A) ∪ ⋃{ Follow(p',B) | (p,A) includes (p',B) }
//! LA(q,A->ω)  = ⋃{ Follow(p,A) | (q,A->ω) lookback (p,A) }
//! ```

use super::{Goto, StateRule, States};
use crate::{digraph::digraph, grammar::Grammar, types::Map};

impl States {
    pub(super) fn compute_direct_read_sets(&mut self, g: &Grammar) {
        self.direct_read_sets.clear();
        for state in &self.states {
            for (symbol, next) in state.nterm_transitions(g) {
                let direct_reads = self.states[next.index()]
                    .term_transitions(g)
                    .map(|(t, _)| t)
                    .collect();
                let goto = Goto {
                    from: state.id,
                    symbol,
                };
                self.direct_read_sets.insert(goto, direct_reads);
            }
        }
    }

    pub(super) fn compute_reads_relation(&mut self, g: &Grammar) {
        self.reads_relation.clear();
        for state in &self.states {
            for (symbol, next) in state.nterm_transitions(g) {
                let reads: Vec<_> = self.states[next.index()]
                    .nterm_transitions(g)
                    .filter(|(c, _)| g.symbol(*c).nullable())
                    .map(|(c, _)| Goto {
                        from: next,
                        symbol: c,
                    })
                    .collect();
                if !reads.is_empty() {
                    let goto = Goto {
                        from: state.id,
                        symbol,
                    };
                    self.reads_relation.insert(goto, reads);
                }
            }
        }
    }

    pub(super) fn compute_read_sets(&mut self, _g: &Grammar) {
        self.read_sets = digraph(
            self.direct_read_sets.keys().copied(),
            &self.reads_relation,
            &self.direct_read_sets,
        );
    }

    pub(super) fn compute_includes_relation(&mut self, g: &Grammar) {
        let mut includes = Map::<Goto, Vec<Goto>>::default();
        for state in &self.states {
            for (nterm, _) in state.nterm_transitions(g) {
                let to = Goto {
                    from: state.id,
                    symbol: nterm,
                };
                for &rule in g.rules_by_symbol(nterm) {
                    let rhs = g.rule(rule).rhs();
                    // Walk the right-hand side backward while the suffix stays nullable.
                    for (i, &sym) in rhs.iter().enumerate().rev() {
                        if g.is_terminal(sym) {
                            break;
                        }
                        let from = self.transition(state.id, &rhs[..i]);
                        let edges = includes.entry(Goto { from, symbol: sym }).or_default();
                        if !edges.contains(&to) {
                            edges.push(to);
                        }
                        if !g.symbol(sym).nullable() {
                            break;
                        }
                    }
                }
            }
        }
        self.includes_relation = includes;
    }

    pub(super) fn compute_lookback_relation(&mut self, g: &Grammar) {
        let mut lookback = Map::<StateRule, Vec<Goto>>::default();
        for state in &self.states {
            for (nterm, _) in state.nterm_transitions(g) {
                for &rule in g.rules_by_symbol(nterm) {
                    let end = self.transition(state.id, g.rule(rule).rhs());
                    let goto = Goto {
                        from: state.id,
                        symbol: nterm,
                    };
                    let edges = lookback.entry(StateRule { state: end, rule }).or_default();
                    if !edges.contains(&goto) {
                        edges.push(goto);
                    }
                }
            }
        }
        self.lookback_relation = lookback;
    }

    pub(super) fn compute_follow_sets(&mut self, _g: &Grammar) {
        self.follow_sets = digraph(
            self.direct_read_sets.keys().copied(),
            &self.includes_relation,
            &self.read_sets,
        );
    }

    pub(super) fn compute_look_ahead_sets(&mut self, g: &Grammar) {
        self.la.clear();
        for state in &mut self.states {
            // Without terminal transitions a single reduction never conflicts,
            // so it is left without a lookahead set.
            let needs_lookahead =
                state.reduces.len() != 1 || state.term_transitions(g).next().is_some();

            for reduce in &mut state.reduces {
                let key = StateRule {
                    state: state.id,
                    rule: reduce.rule(),
                };
                let Some(gotos) = self.lookback_relation.get(&key) else {
                    continue;
                };
                let mut lookahead = crate::grammar::SymbolSet::default();
                for goto in gotos {
                    if let Some(follows) = self.follow_sets.get(goto) {
                        lookahead.union_with(follows);
                    }
                }
                if needs_lookahead {
                    reduce.lookahead = Some(lookahead.clone());
                }
                self.la.insert(key, lookahead);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        grammar::{RuleID, SymbolID},
        states::StateID,
    };

    fn sym(g: &Grammar, name: &str) -> SymbolID {
        g.find_symbol_by_name(name).unwrap().id()
    }

    #[test]
    fn nullable_tail_reads_and_includes() {
        // S -> A B 'c' ; A -> 'a' ; B -> 'b' | ε
        let g = Grammar::define(|g| {
            g.rule("S", &["A", "B", "'c'"]);
            g.rule("S", &["A"]);
            g.rule("A", &["'a'"]);
            g.rule("B", &["'b'"]);
            g.rule("B", &[]);
            Ok(())
        })
        .unwrap();
        let states = States::generate(&g);
        let (a_sym, b_sym, s_sym) = (sym(&g, "A"), sym(&g, "B"), sym(&g, "S"));
        let (b, c) = (sym(&g, "'b'"), sym(&g, "'c'"));

        let goto_a = Goto {
            from: StateID::START,
            symbol: a_sym,
        };
        let after_a = states.transition(StateID::START, &[a_sym]);
        let goto_b = Goto {
            from: after_a,
            symbol: b_sym,
        };

        assert_eq!(states.direct_read_sets()[&goto_a], [b]);
        assert_eq!(states.reads_relation()[&goto_a], [goto_b]);
        // Sets are ordered by symbol number, and `'c'` is numbered before `'b'`.
        assert_eq!(states.read_sets()[&goto_a], [c, b]);

        // S -> A is the last symbol, so Follow(0,A) includes Follow(0,S).
        let goto_s = Goto {
            from: StateID::START,
            symbol: s_sym,
        };
        assert!(states.includes_relation()[&goto_a].contains(&goto_s));
        assert_eq!(states.follow_sets()[&goto_s], [SymbolID::EOF]);
        assert_eq!(states.follow_sets()[&goto_a], [SymbolID::EOF, c, b]);

        let reduce_a = StateRule {
            state: states.transition(StateID::START, &[sym(&g, "'a'")]),
            rule: RuleID::from_raw(3),
        };
        assert_eq!(states.lookback_relation()[&reduce_a], [goto_a]);
        assert_eq!(states.la()[&reduce_a], [SymbolID::EOF, c, b]);
    }

    #[test]
    fn single_reduce_without_shifts_has_no_lookahead() {
        let g = Grammar::define(|g| {
            g.rule("S", &["'a'"]);
            Ok(())
        })
        .unwrap();
        let states = States::generate(&g);
        let after_a = states.transition(StateID::START, &[sym(&g, "'a'")]);
        let state = states.state(after_a);
        assert_eq!(state.reduces().len(), 1);
        assert!(state.reduces()[0].lookahead().is_none());

        let key = StateRule {
            state: after_a,
            rule: RuleID::from_raw(1),
        };
        assert_eq!(states.la()[&key], [SymbolID::EOF]);
    }
}
