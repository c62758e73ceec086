//! Counterexamples for the conflicts left in the automaton.
//!
//! The searches follow Isradisaikul and Myers, "Finding Counterexamples from
//! Parsing Conflicts", section 4 (nonunifying counterexamples).
//! <https://www.cs.cornell.edu/andru/papers/cupex/cupex.pdf>

mod derivation;
mod path;

pub use self::{
    derivation::Derivation,
    path::{Path, StateItem},
};

use self::path::build_paths;
use crate::{
    grammar::{Grammar, SymbolID, SymbolSet},
    states::{Conflict, Item, StateID, States},
    types::{Map, Set},
};
use std::collections::VecDeque;

/// An example of how the parser reaches a conflict.
#[derive(Debug, Clone)]
pub struct Example {
    conflict: Conflict,
    conflict_symbol: SymbolID,
    path1: Option<Vec<Path>>,
    path2: Option<Vec<Path>>,
    derivation1: Option<Derivation>,
    derivation2: Option<Derivation>,
}

impl Example {
    pub fn conflict(&self) -> &Conflict {
        &self.conflict
    }

    pub fn conflict_symbol(&self) -> SymbolID {
        self.conflict_symbol
    }

    /// The path to the shift item of a shift/reduce conflict, or to the first
    /// reduce item of a reduce/reduce conflict.
    pub fn path1(&self) -> Option<&[Path]> {
        self.path1.as_deref()
    }

    /// The path to the (second) reduce item.
    pub fn path2(&self) -> Option<&[Path]> {
        self.path2.as_deref()
    }

    pub fn path1_item(&self) -> Option<Item> {
        Some(self.path1.as_ref()?.last()?.to().item)
    }

    pub fn path2_item(&self) -> Option<Item> {
        Some(self.path2.as_ref()?.last()?.to().item)
    }

    pub fn derivation1(&self) -> Option<&Derivation> {
        self.derivation1.as_ref()
    }

    pub fn derivation2(&self) -> Option<&Derivation> {
        self.derivation2.as_ref()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct Triple {
    state: StateID,
    item: Item,
    lookahead: SymbolSet,
}

impl Triple {
    fn state_item(&self) -> StateItem {
        StateItem {
            state: self.state,
            item: self.item,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Step {
    Start,
    Transition,
    Production,
}

#[derive(Debug)]
pub struct Counterexamples<'a> {
    g: &'a Grammar,
    states: &'a States,
    transitions: Map<(StateItem, SymbolID), StateItem>,
    reverse_transitions: Map<(StateItem, SymbolID), Vec<StateItem>>,
    productions: Map<StateItem, Vec<Item>>,
    reverse_productions: Map<(StateID, SymbolID), Vec<Item>>,
}

impl<'a> Counterexamples<'a> {
    pub fn new(g: &'a Grammar, states: &'a States) -> Self {
        let mut transitions = Map::default();
        let mut reverse_transitions = Map::<_, Vec<StateItem>>::default();
        let mut productions = Map::default();
        let mut reverse_productions = Map::<_, Vec<Item>>::default();

        for state in states.states() {
            let mut closure_by_lhs = Map::<SymbolID, Vec<Item>>::default();
            for item in state.closure() {
                closure_by_lhs.entry(item.lhs(g)).or_default().push(*item);
            }

            for item in state.items() {
                let Some(sym) = item.next_symbol(g) else { continue };
                let src = StateItem {
                    state: state.id(),
                    item: *item,
                };

                if let Some(next) = state.transition(sym) {
                    let dest = item.advance();
                    if states.state(next).kernels().contains(&dest) {
                        let dest = StateItem {
                            state: next,
                            item: dest,
                        };
                        transitions.insert((src, sym), dest);
                        reverse_transitions.entry((dest, sym)).or_default().push(src);
                    }
                }

                if !g.is_terminal(sym) {
                    let expanded = closure_by_lhs.get(&sym).cloned().unwrap_or_default();
                    productions.insert(src, expanded);
                    reverse_productions
                        .entry((state.id(), sym))
                        .or_default()
                        .push(*item);
                }
            }
        }

        Self {
            g,
            states,
            transitions,
            reverse_transitions,
            productions,
            reverse_productions,
        }
    }

    /// One example per conflict of the state.
    #[tracing::instrument(skip(self))]
    pub fn compute(&self, conflict_state: StateID) -> Vec<Example> {
        self.states
            .state(conflict_state)
            .conflicts()
            .iter()
            .filter_map(|conflict| match conflict {
                Conflict::ShiftReduce { .. } => self.shift_reduce_example(conflict_state, conflict),
                Conflict::ReduceReduce { .. } => self.reduce_reduce_example(conflict_state, conflict),
            })
            .collect()
    }

    fn shift_reduce_example(&self, conflict_state: StateID, conflict: &Conflict) -> Option<Example> {
        let Conflict::ShiftReduce { reduce, .. } = conflict else {
            return None;
        };
        let conflict_symbol = *conflict.symbols().first()?;
        let shift_item = self
            .states
            .state(conflict_state)
            .items()
            .find(|item| item.next_symbol(self.g) == Some(conflict_symbol))
            .copied();

        let path2 = self.shortest_path(conflict_state, *reduce, conflict_symbol);
        let path1 = match (&path2, shift_item) {
            (Some(reduce_path), Some(shift_item)) => {
                self.shift_path(reduce_path, conflict_state, shift_item)
            }
            _ => None,
        };
        Some(self.example(conflict.clone(), conflict_symbol, path1, path2))
    }

    fn reduce_reduce_example(&self, conflict_state: StateID, conflict: &Conflict) -> Option<Example> {
        let Conflict::ReduceReduce {
            reduce1, reduce2, ..
        } = conflict
        else {
            return None;
        };
        let conflict_symbol = *conflict.symbols().first()?;
        let path1 = self.shortest_path(conflict_state, *reduce1, conflict_symbol);
        let path2 = self.shortest_path(conflict_state, *reduce2, conflict_symbol);
        Some(self.example(conflict.clone(), conflict_symbol, path1, path2))
    }

    fn example(
        &self,
        conflict: Conflict,
        conflict_symbol: SymbolID,
        path1: Option<Vec<Path>>,
        path2: Option<Vec<Path>>,
    ) -> Example {
        if path1.is_none() || path2.is_none() {
            tracing::debug!("no counterexample path for {:?}", conflict);
        }
        let derivation1 = path1.as_deref().and_then(|p| self.derivation(p, conflict_symbol));
        let derivation2 = path2.as_deref().and_then(|p| self.derivation(p, conflict_symbol));
        Example {
            conflict,
            conflict_symbol,
            path1,
            path2,
            derivation1,
            derivation2,
        }
    }

    /// The shortest path from the start item to `reduce_item` in
    /// `conflict_state` whose precise lookahead contains `conflict_symbol`.
    fn shortest_path(
        &self,
        conflict_state: StateID,
        reduce_item: Item,
        conflict_symbol: SymbolID,
    ) -> Option<Vec<Path>> {
        let g = self.g;
        let start = Triple {
            state: StateID::START,
            item: Item::start(),
            lookahead: Some(SymbolID::EOF).into_iter().collect(),
        };
        let mut nodes: Vec<(Triple, Path, Option<usize>)> = vec![(
            start.clone(),
            Path::Start {
                to: start.state_item(),
            },
            None,
        )];
        let mut visited = Set::default();
        visited.insert(start);
        let mut queue = VecDeque::from([0]);

        while let Some(i) = queue.pop_front() {
            let triple = nodes[i].0.clone();
            if triple.state == conflict_state
                && triple.item == reduce_item
                && triple.lookahead.contains(conflict_symbol)
            {
                let mut paths = vec![];
                let mut cursor = Some(i);
                while let Some(c) = cursor {
                    paths.push(nodes[c].1);
                    cursor = nodes[c].2;
                }
                paths.reverse();
                return Some(paths);
            }

            let Some(next_sym) = triple.item.next_symbol(g) else {
                continue;
            };
            let from = triple.state_item();
            let mut successors = vec![];

            if let Some(to) = self.transitions.get(&(from, next_sym)) {
                let next = Triple {
                    state: to.state,
                    item: to.item,
                    lookahead: triple.lookahead.clone(),
                };
                successors.push((next, Path::Transition { from, to: *to }));
            }

            if let Some(items) = self.productions.get(&from) {
                let lookahead = self.follow_l(triple.item, &triple.lookahead);
                for item in items {
                    let next = Triple {
                        state: triple.state,
                        item: *item,
                        lookahead: lookahead.clone(),
                    };
                    let to = next.state_item();
                    successors.push((next, Path::Production { from, to }));
                }
            }

            for (next, path) in successors {
                if visited.insert(next.clone()) {
                    nodes.push((next, path, Some(i)));
                    queue.push_back(nodes.len() - 1);
                }
            }
        }

        None
    }

    /// The precise lookahead of the items produced by the symbol after the dot.
    fn follow_l(&self, item: Item, current: &SymbolSet) -> SymbolSet {
        let mut follow = SymbolSet::default();
        for &sym in item.symbols_after_transition(self.g) {
            let symbol = self.g.symbol(sym);
            follow.union_with(symbol.first_set());
            if !symbol.nullable() {
                return follow;
            }
        }
        follow.union_with(current);
        follow
    }

    /// Search backward from the shift item to the start item, visiting the
    /// same states as the reduce path.
    fn shift_path(
        &self,
        reduce_path: &[Path],
        conflict_state: StateID,
        shift_item: Item,
    ) -> Option<Vec<Path>> {
        let g = self.g;
        let mut state_sequence = vec![StateID::START];
        state_sequence.extend(
            reduce_path
                .iter()
                .filter(|p| p.is_transition())
                .map(|p| p.to().state),
        );
        if state_sequence.last() != Some(&conflict_state) {
            return None;
        }

        let target = StateItem {
            state: conflict_state,
            item: shift_item,
        };
        let last = state_sequence.len() - 1;
        let mut nodes: Vec<(StateItem, usize, Option<usize>)> = vec![(target, last, None)];
        let mut visited = Set::default();
        visited.insert((target, last));
        let mut queue = VecDeque::from([0]);

        while let Some(i) = queue.pop_front() {
            let (si, k, _) = nodes[i];
            if k == 0 && si.item.is_start_item() {
                // Following the parents from here walks forward to the shift item.
                let mut state_items = vec![];
                let mut cursor = Some(i);
                while let Some(c) = cursor {
                    state_items.push(nodes[c].0);
                    cursor = nodes[c].2;
                }
                return Some(build_paths(&state_items));
            }

            let mut successors = vec![];
            if si.item.is_beginning() {
                let key = (si.state, si.item.lhs(g));
                for item in self.reverse_productions.get(&key).into_iter().flatten() {
                    let prev = StateItem {
                        state: si.state,
                        item: *item,
                    };
                    successors.push((prev, k));
                }
            } else if k > 0 {
                let Some(prev_sym) = si.item.previous_symbol(g) else {
                    continue;
                };
                for prev in self.reverse_transitions.get(&(si, prev_sym)).into_iter().flatten() {
                    if prev.state == state_sequence[k - 1] {
                        successors.push((*prev, k - 1));
                    }
                }
            }

            for next in successors {
                if visited.insert(next) {
                    nodes.push((next.0, next.1, Some(i)));
                    queue.push_back(nodes.len() - 1);
                }
            }
        }

        None
    }

    /// Build the derivation tree of a path, innermost rule first.
    fn derivation(&self, paths: &[Path], conflict_symbol: SymbolID) -> Option<Derivation> {
        let g = self.g;
        let last = paths.last()?;
        let mut lookahead = last.to().item.is_end_of_rule(g).then_some(conflict_symbol);
        let mut derivation: Option<Derivation> = None;
        let mut step = Step::Production;

        for path in paths.iter().rev() {
            let item = path.to().item;
            let kind = match path {
                Path::Start { .. } => Step::Start,
                Path::Transition { .. } => Step::Transition,
                Path::Production { .. } => Step::Production,
            };
            match step {
                Step::Production => {
                    let mut current = Derivation::new(item, derivation.take());
                    if let Some(sym) = lookahead {
                        let produces_symbol = item
                            .next_next_symbol(g)
                            .map_or(false, |nn| g.symbol(nn).first_set().contains(sym));
                        if produces_symbol {
                            let advanced = item
                                .next_symbol(g)
                                .and_then(|next| self.transitions.get(&(path.to(), next)));
                            current.set_right(
                                advanced.and_then(|si| self.derivation_for_symbol(*si, sym)),
                            );
                            lookahead = None;
                        }
                    }
                    derivation = Some(current);
                    step = kind;
                }
                Step::Transition => match kind {
                    Step::Start => {
                        derivation = Some(Derivation::new(item, derivation.take()));
                        step = Step::Start;
                    }
                    // Earlier positions of the same rule.
                    Step::Transition => {}
                    Step::Production => step = Step::Production,
                },
                Step::Start => unreachable!("[BUG] path continues before the start step"),
            }
            if step == Step::Start {
                break;
            }
        }

        derivation
    }

    /// The shortest chain of productions from `state_item` that puts `sym`
    /// right after the dot.
    fn derivation_for_symbol(&self, state_item: StateItem, sym: SymbolID) -> Option<Derivation> {
        let g = self.g;
        let mut queue = VecDeque::from([vec![state_item]]);
        while let Some(chain) = queue.pop_front() {
            let Some(si) = chain.last().copied() else { continue };
            let Some(next_sym) = si.item.next_symbol(g) else {
                continue;
            };

            if next_sym == sym {
                return chain
                    .iter()
                    .rev()
                    .fold(None, |derivation, si| Some(Derivation::new(si.item, derivation)));
            }

            let symbol = g.symbol(next_sym);
            if g.is_terminal(next_sym) || !symbol.first_set().contains(sym) {
                continue;
            }
            for item in self.productions.get(&si).into_iter().flatten() {
                if g.rule(item.rule).is_empty() {
                    continue;
                }
                let next = StateItem {
                    state: si.state,
                    item: *item,
                };
                if !chain.contains(&next) {
                    let mut extended = chain.clone();
                    extended.push(next);
                    queue.push_back(extended);
                }
            }
            if symbol.nullable() {
                if let Some(next) = self.transitions.get(&(si, next_sym)) {
                    let mut extended = chain.clone();
                    extended.push(*next);
                    queue.push_back(extended);
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::states::Config;

    fn sym(g: &Grammar, name: &str) -> SymbolID {
        g.find_symbol_by_name(name).unwrap().id()
    }

    fn ambiguous_sum() -> Grammar {
        Grammar::define(|g| {
            g.rule("E", &["E", "'+'", "E"]);
            g.rule("E", &["'n'"]);
            Ok(())
        })
        .unwrap()
    }

    #[test]
    fn shift_reduce_paths_end_at_conflicting_items() {
        let g = ambiguous_sum();
        let states = States::generate(&g);
        let conflict_state = states
            .states()
            .iter()
            .find(|s| s.has_conflicts())
            .map(|s| s.id())
            .unwrap();

        let cex = Counterexamples::new(&g, &states);
        let examples = cex.compute(conflict_state);
        assert_eq!(examples.len(), 1);

        let example = &examples[0];
        let plus = sym(&g, "'+'");
        assert_eq!(example.conflict_symbol(), plus);
        assert_eq!(example.path1_item(), Some(Item::new(crate::grammar::RuleID::from_raw(1), 1)));
        assert_eq!(example.path2_item(), Some(Item::new(crate::grammar::RuleID::from_raw(1), 3)));

        for path in [example.path1().unwrap(), example.path2().unwrap()] {
            assert!(matches!(path[0], Path::Start { to } if to.item.is_start_item()));
            assert_eq!(path.last().unwrap().to().state, conflict_state);
            for pair in path.windows(2) {
                assert_eq!(pair[1].from(), Some(pair[0].to()));
            }
        }

        let lines = example.derivation2().unwrap().render(&g);
        assert!(lines[0].starts_with("0: "));
        assert!(lines.iter().any(|line| line.contains('•')));
        assert!(example.derivation1().is_some());
    }

    #[test]
    fn reduce_reduce_paths_reach_both_reductions() {
        let g = Grammar::define(|g| {
            g.rule("S", &["'a'", "E", "'c'"]);
            g.rule("S", &["'a'", "F", "'d'"]);
            g.rule("S", &["'b'", "F", "'c'"]);
            g.rule("S", &["'b'", "E", "'d'"]);
            g.rule("E", &["'e'"]);
            g.rule("F", &["'e'"]);
            Ok(())
        })
        .unwrap();
        let states = States::generate_with_config(&g, Config::new().use_lalr());
        let conflict_state = states
            .states()
            .iter()
            .find(|s| s.rr_conflicts().next().is_some())
            .map(|s| s.id())
            .unwrap();

        let examples = Counterexamples::new(&g, &states).compute(conflict_state);
        assert_eq!(examples.len(), 1);
        let example = &examples[0];
        assert_eq!(example.conflict_symbol(), sym(&g, "'c'"));

        let e = g.rule(g.rules_by_symbol(sym(&g, "E"))[0]).id();
        let f = g.rule(g.rules_by_symbol(sym(&g, "F"))[0]).id();
        assert_eq!(example.path1_item(), Some(Item::new(e, 1)));
        assert_eq!(example.path2_item(), Some(Item::new(f, 1)));
    }

    #[test]
    fn follow_l_skips_nullable_symbols() {
        // S -> A B 'c' ; A -> 'a' ; B -> 'b' | ε
        let g = Grammar::define(|g| {
            g.rule("S", &["A", "B", "'c'"]);
            g.rule("A", &["'a'"]);
            g.rule("B", &["'b'"]);
            g.rule("B", &[]);
            Ok(())
        })
        .unwrap();
        let states = States::generate(&g);
        let cex = Counterexamples::new(&g, &states);

        let item = Item::new(crate::grammar::RuleID::from_raw(1), 0);
        let current: SymbolSet = Some(SymbolID::EOF).into_iter().collect();
        let follow = cex.follow_l(item, &current);
        assert_eq!(follow.to_vec(), {
            let mut expected = vec![sym(&g, "'b'"), sym(&g, "'c'")];
            expected.sort();
            expected
        });

        let last = Item::new(crate::grammar::RuleID::from_raw(1), 2);
        assert_eq!(cex.follow_l(last, &current), current);
    }
}
