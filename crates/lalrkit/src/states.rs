//! LALR(1) automaton construction.
//!
//! The LR(0) states are built first, then the lookahead sets of the reductions
//! are computed with the relations of DeRemer and Pennello \[1\]. Conflicts are
//! resolved with the precedence declarations, and the states may finally be
//! split with the IELR(1) method of Denny and Malloy \[2\].
//!
//! \[1\]: DeRemer and Pennello, Efficient Computation of LALR(1) Look-Ahead Sets
//!       <https://dl.acm.org/doi/10.1145/69622.357187>
//!
//! \[2\]: Denny and Malloy, The IELR(1) algorithm for generating minimal LR(1) parser
//!       tables for non-LR(1) grammars with conflict resolution
//!       <https://www.sciencedirect.com/science/article/pii/S0167642309001191>

mod conflict;
mod ielr;
mod item;
mod lookahead;
mod state;

pub use self::{
    conflict::{Conflict, Resolution, ResolvedConflict},
    item::Item,
    state::{Reduce, Shift, State, StateID},
};

use crate::{
    grammar::{Grammar, RuleID, SymbolID, SymbolSet},
    types::{Map, Set},
    util::{display_fn, report_duration},
};
use std::fmt;

/// A nonterminal transition `(p, A)`, the key of the lookahead relations.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Goto {
    pub from: StateID,
    pub symbol: SymbolID,
}

impl fmt::Debug for Goto {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:?},{:?})", self.from, self.symbol)
    }
}

/// A reduction `(q, A -> ω)` in a state.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StateRule {
    pub state: StateID,
    pub rule: RuleID,
}

impl fmt::Debug for StateRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:?},{:?})", self.state, self.rule)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
#[non_exhaustive]
pub enum Mode {
    /// DeRemer and Pennello's LALR(1).
    #[default]
    Lalr,

    /// LALR(1) followed by the IELR(1) state splitting.
    Ielr,
}

#[derive(Debug, Clone)]
pub struct Config {
    mode: Mode,
    trace_state: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub const fn new() -> Self {
        Self {
            mode: Mode::Lalr,
            trace_state: false,
        }
    }

    /// The configuration requested by the `%define` values of the grammar.
    pub fn for_grammar(g: &Grammar) -> Self {
        let mut config = Self::new();
        if g.ielr_defined() {
            config.use_ielr();
        }
        config
    }

    pub fn use_lalr(&mut self) -> &mut Self {
        self.mode = Mode::Lalr;
        self
    }

    /// Split the LALR(1) states where a merge causes a new conflict.
    pub fn use_ielr(&mut self) -> &mut Self {
        self.mode = Mode::Ielr;
        self
    }

    /// Log every constructed state at debug level.
    pub fn trace_state(&mut self, enabled: bool) -> &mut Self {
        self.trace_state = enabled;
        self
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }
}

#[derive(Debug)]
pub struct States {
    pub(crate) states: Vec<State>,
    direct_read_sets: Map<Goto, SymbolSet>,
    reads_relation: Map<Goto, Vec<Goto>>,
    read_sets: Map<Goto, SymbolSet>,
    includes_relation: Map<Goto, Vec<Goto>>,
    lookback_relation: Map<StateRule, Vec<Goto>>,
    follow_sets: Map<Goto, SymbolSet>,
    la: Map<StateRule, SymbolSet>,
    trace_state: bool,
}

impl States {
    /// Build the automaton with the configuration requested by the grammar.
    pub fn generate(g: &Grammar) -> Self {
        Self::generate_with_config(g, &Config::for_grammar(g))
    }

    pub fn generate_with_config(g: &Grammar, config: &Config) -> Self {
        let mut states = Self::new(config);
        states.compute(g);
        if config.mode == Mode::Ielr {
            states.compute_ielr(g);
        }
        states
    }

    /// An automaton with no states yet.
    pub fn new(config: &Config) -> Self {
        Self {
            states: vec![],
            direct_read_sets: Map::default(),
            reads_relation: Map::default(),
            read_sets: Map::default(),
            includes_relation: Map::default(),
            lookback_relation: Map::default(),
            follow_sets: Map::default(),
            la: Map::default(),
            trace_state: config.trace_state,
        }
    }

    /// Build the LR(0) states and compute their LALR(1) lookaheads, conflicts
    /// and default reductions.
    #[tracing::instrument(skip_all)]
    pub fn compute(&mut self, g: &Grammar) {
        self.states.clear();
        report_duration("compute_lr0_states", || self.compute_lr0_states(g));
        self.compute_lookaheads(g);
        report_duration("compute_conflicts", || self.compute_conflicts(g));
        report_duration("compute_default_reduction", || {
            self.compute_default_reduction()
        });
        tracing::debug!(
            "{} states, {} shift/reduce conflicts, {} reduce/reduce conflicts",
            self.states_count(),
            self.sr_conflicts_count(),
            self.rr_conflicts_count()
        );
    }

    pub(crate) fn compute_lookaheads(&mut self, g: &Grammar) {
        report_duration("compute_direct_read_sets", || {
            self.compute_direct_read_sets(g)
        });
        report_duration("compute_reads_relation", || self.compute_reads_relation(g));
        report_duration("compute_read_sets", || self.compute_read_sets(g));
        report_duration("compute_includes_relation", || {
            self.compute_includes_relation(g)
        });
        report_duration("compute_lookback_relation", || {
            self.compute_lookback_relation(g)
        });
        report_duration("compute_follow_sets", || self.compute_follow_sets(g));
        report_duration("compute_look_ahead_sets", || {
            self.compute_look_ahead_sets(g)
        });
    }

    fn compute_lr0_states(&mut self, g: &Grammar) {
        let start = vec![Item::start()];
        let mut kernel_index = Map::<Vec<Item>, StateID>::default();
        kernel_index.insert(start.clone(), StateID::START);
        self.states
            .push(State::new(StateID::START, None, start));

        // The states are appended in creation order, so walking the vector
        // visits them breadth first.
        let mut cursor = 0;
        while cursor < self.states.len() {
            let id = StateID::from_index(cursor);
            let closure = compute_closure(g, &self.states[cursor].kernels);

            let mut successors = Map::<SymbolID, Vec<Item>>::default();
            let mut reduces = vec![];
            for item in self.states[cursor].kernels.iter().chain(&closure) {
                match item.next_symbol(g) {
                    Some(sym) => successors.entry(sym).or_default().push(item.advance()),
                    None => reduces.push(Reduce::new(*item)),
                }
            }
            successors.sort_keys();

            let mut shifts = Vec::with_capacity(successors.len());
            let mut transitions = Map::default();
            for (sym, mut next_items) in successors {
                next_items.sort();
                next_items.dedup();
                let next = match kernel_index.get(&next_items) {
                    Some(next) => *next,
                    None => {
                        let next = StateID::from_index(self.states.len());
                        kernel_index.insert(next_items.clone(), next);
                        self.states
                            .push(State::new(next, Some(sym), next_items.clone()));
                        next
                    }
                };
                self.states[next.index()].append_predecessor(id);
                transitions.insert(sym, next);
                shifts.push(Shift {
                    symbol: sym,
                    next_items,
                    not_selected: false,
                });
            }

            let state = &mut self.states[cursor];
            state.closure = closure;
            state.shifts = shifts;
            state.transitions = transitions;
            state.reduces = reduces;
            if self.trace_state {
                tracing::debug!("{}", self.states[cursor].display(g));
            }
            cursor += 1;
        }
    }

    pub fn states(&self) -> &[State] {
        &self.states
    }

    pub fn state(&self, id: StateID) -> &State {
        &self.states[id.index()]
    }

    pub fn states_count(&self) -> usize {
        self.states.len()
    }

    /// The state reached from `from` by reading `symbols`.
    ///
    /// # Panics
    /// Panics if one of the transitions does not exist.
    pub fn transition(&self, from: StateID, symbols: &[SymbolID]) -> StateID {
        symbols.iter().fold(from, |current, sym| {
            match self.states[current.index()].transition(*sym) {
                Some(next) => next,
                None => panic!("[BUG] no transition from {:?} by {:?}", current, sym),
            }
        })
    }

    pub fn direct_read_sets(&self) -> Map<Goto, Vec<SymbolID>> {
        to_symbol_vecs(&self.direct_read_sets)
    }

    pub fn read_sets(&self) -> Map<Goto, Vec<SymbolID>> {
        to_symbol_vecs(&self.read_sets)
    }

    pub fn follow_sets(&self) -> Map<Goto, Vec<SymbolID>> {
        to_symbol_vecs(&self.follow_sets)
    }

    pub fn la(&self) -> Map<StateRule, Vec<SymbolID>> {
        to_symbol_vecs(&self.la)
    }

    pub fn reads_relation(&self) -> &Map<Goto, Vec<Goto>> {
        &self.reads_relation
    }

    pub fn includes_relation(&self) -> &Map<Goto, Vec<Goto>> {
        &self.includes_relation
    }

    pub fn lookback_relation(&self) -> &Map<StateRule, Vec<Goto>> {
        &self.lookback_relation
    }

    pub fn sr_conflicts_count(&self) -> usize {
        self.states.iter().map(|s| s.sr_conflicts().count()).sum()
    }

    pub fn rr_conflicts_count(&self) -> usize {
        self.states.iter().map(|s| s.rr_conflicts().count()).sum()
    }

    /// Terminals that are never shifted and never looked ahead.
    ///
    /// The reserved terminals are not reported.
    pub fn unused_terminals(&self, g: &Grammar) -> Vec<SymbolID> {
        let mut used = SymbolSet::default();
        for state in &self.states {
            for shift in &state.shifts {
                used.insert(shift.symbol);
            }
            for reduce in &state.reduces {
                if let Some(lookahead) = &reduce.lookahead {
                    used.union_with(lookahead);
                }
            }
        }
        g.terminals()
            .iter()
            .map(|t| t.id())
            .filter(|t| {
                !matches!(*t, SymbolID::EOF | SymbolID::ERROR | SymbolID::UNDEF)
                    && !used.contains(*t)
            })
            .collect()
    }

    pub fn display<'g>(&'g self, g: &'g Grammar) -> impl fmt::Display + 'g {
        display_fn(move |f| {
            for (i, state) in self.states.iter().enumerate() {
                if i > 0 {
                    writeln!(f)?;
                }
                write!(f, "{}", state.display(g))?;
            }
            Ok(())
        })
    }
}

fn to_symbol_vecs<K>(sets: &Map<K, SymbolSet>) -> Map<K, Vec<SymbolID>>
where
    K: Copy + Eq + std::hash::Hash,
{
    sets.iter().map(|(k, set)| (*k, set.to_vec())).collect()
}

/// The non-kernel items of the state with the given kernels, ordered by rule.
fn compute_closure(g: &Grammar, kernels: &[Item]) -> Vec<Item> {
    let mut expanded = Set::<SymbolID>::default();
    let mut pending: Vec<SymbolID> = kernels
        .iter()
        .filter_map(|item| item.next_symbol(g))
        .filter(|sym| !g.is_terminal(*sym))
        .collect();

    let mut closure = vec![];
    while let Some(sym) = pending.pop() {
        if !expanded.insert(sym) {
            continue;
        }
        for &rule in g.rules_by_symbol(sym) {
            closure.push(Item::new(rule, 0));
            if let Some(&first) = g.rule(rule).rhs().first() {
                if !g.is_terminal(first) && !expanded.contains(&first) {
                    pending.push(first);
                }
            }
        }
    }
    closure.sort();
    closure
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sym(g: &Grammar, name: &str) -> SymbolID {
        g.find_symbol_by_name(name).unwrap().id()
    }

    fn arithmetic() -> Grammar {
        Grammar::define(|g| {
            g.terminal("NUM")?;
            g.rule("E", &["E", "'+'", "T"]);
            g.rule("E", &["T"]);
            g.rule("T", &["T", "'*'", "F"]);
            g.rule("T", &["F"]);
            g.rule("F", &["'('", "E", "')'"]);
            g.rule("F", &["NUM"]);
            Ok(())
        })
        .unwrap()
    }

    #[test]
    fn lr0_states_of_arithmetic() {
        let g = arithmetic();
        let states = States::generate(&g);
        eprintln!("{}", states.display(&g));

        // The classic expression grammar has 12 LR(0) states plus the one
        // reached by `$end` after the start symbol.
        assert_eq!(states.states_count(), 13);
        assert_eq!(states.sr_conflicts_count(), 0);
        assert_eq!(states.rr_conflicts_count(), 0);

        let start = states.state(StateID::START);
        assert_eq!(start.kernels(), [Item::start()]);
        assert_eq!(start.accessing_symbol(), None);
        let closure_rules: Vec<_> = start.closure().iter().map(|i| i.rule.into_raw()).collect();
        assert_eq!(closure_rules, [1, 2, 3, 4, 5, 6]);

        let shift_symbols: Vec<_> = start.shifts().iter().map(|s| s.symbol()).collect();
        let mut sorted = shift_symbols.clone();
        sorted.sort();
        assert_eq!(shift_symbols, sorted);

        for state in states.states() {
            for (sym, next) in state.transitions() {
                let next = states.state(*next);
                assert_eq!(next.accessing_symbol(), Some(*sym));
                assert!(next.predecessors().contains(&state.id()));
            }
            let mut kernels = state.kernels().to_vec();
            kernels.sort();
            assert_eq!(kernels, state.kernels());
        }
    }

    #[test]
    fn transition_follows_symbols() {
        let g = arithmetic();
        let states = States::generate(&g);
        let e = sym(&g, "E");
        let plus = sym(&g, "'+'");
        let t = sym(&g, "T");
        let target = states.transition(StateID::START, &[e, plus, t]);
        let state = states.state(target);
        assert!(state
            .kernels()
            .iter()
            .any(|k| k.rule == RuleID::from_raw(1) && k.is_end_of_rule(&g)));
    }

    #[test]
    #[should_panic(expected = "[BUG]")]
    fn missing_transition_panics() {
        let g = arithmetic();
        let states = States::generate(&g);
        states.transition(StateID::START, &[sym(&g, "')'")]);
    }

    #[test]
    fn default_reductions_without_conflicts() {
        let g = arithmetic();
        let states = States::generate(&g);
        for state in states.states() {
            if state.reduces().is_empty() {
                assert_eq!(state.default_reduction_rule(), None);
                continue;
            }
            let rule = state.default_reduction_rule().unwrap();
            let defaults: Vec<_> = state
                .reduces()
                .iter()
                .filter(|r| r.is_default_reduction())
                .map(|r| r.rule())
                .collect();
            assert_eq!(defaults, [rule]);
        }
    }

    #[test]
    fn config_follows_grammar_variables() {
        let g = Grammar::define(|g| {
            g.define("lr.type", "ielr");
            g.rule("S", &["'a'"]);
            Ok(())
        })
        .unwrap();
        assert_eq!(Config::for_grammar(&g).mode(), Mode::Ielr);
        assert_eq!(Config::for_grammar(&arithmetic()).mode(), Mode::Lalr);
        assert_eq!(Config::new().use_ielr().use_lalr().mode(), Mode::Lalr);
    }

    #[test]
    fn unused_terminals() {
        let g = Grammar::define(|g| {
            g.terminal("UNUSED")?;
            g.rule("S", &["'a'"]);
            Ok(())
        })
        .unwrap();
        let states = States::generate(&g);
        assert_eq!(states.unused_terminals(&g), [sym(&g, "UNUSED")]);
    }
}
