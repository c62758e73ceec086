//! IELR(1) state splitting.
//!
//! The LALR(1) automaton is annotated with the kernel items that contribute to
//! each inadequacy, and then its states are recomputed from the start state
//! while propagating the lookaheads that matter for those annotations. A state
//! is duplicated when the propagated lookaheads would select a different
//! action than the ones already merged into it.

use super::{Goto, State, StateID, States};
use crate::{
    digraph::digraph,
    grammar::{Grammar, RuleID, SymbolID, SymbolSet},
    types::{Map, Worklist},
    util::report_duration,
};
use bit_set::BitSet;
use std::mem;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
enum Action {
    Shift,
    Reduce(RuleID),
}

/// An inadequacy: several actions of `state` on the same `token`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct AnnotationDesc {
    state: StateID,
    token: SymbolID,
    actions: Vec<Action>,
}

/// The kernel items that contribute to each action of an inadequacy.
///
/// An undefined row contributes whatever the lookaheads are.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Annotation {
    rows: Vec<Option<BitSet>>,
}

impl Annotation {
    fn new(num_actions: usize) -> Self {
        Self {
            rows: vec![None; num_actions],
        }
    }

    fn define(&mut self, i: usize, kernels: BitSet) {
        self.rows[i] = Some(kernels);
    }

    fn is_useless(&self) -> bool {
        self.rows.iter().flatten().all(|kernels| kernels.is_empty())
    }

    /// Whether the kernel item `j` contributes to some action.
    fn is_contributed_by(&self, j: usize) -> bool {
        self.rows.iter().flatten().any(|kernels| kernels.contains(j))
    }

    fn merge(&mut self, other: &Annotation) -> bool {
        let mut changed = false;
        for (slot, added) in self.rows.iter_mut().zip(&other.rows) {
            let Some(added) = added else { continue };
            match slot {
                Some(kernels) => {
                    if !added.is_subset(kernels) {
                        kernels.union_with(added);
                        changed = true;
                    }
                }
                None => {
                    *slot = Some(added.clone());
                    changed = true;
                }
            }
        }
        changed
    }
}

pub(super) struct IelrCache {
    always_follows: Map<Goto, SymbolSet>,
    follow_kernel_items: Map<Goto, BitSet>,
    item_lookaheads: Vec<Vec<SymbolSet>>,
    annotation_lists: Vec<Map<AnnotationDesc, Annotation>>,
    lookahead_set_filters: Vec<Vec<SymbolSet>>,
}

impl IelrCache {
    pub(super) fn new(g: &Grammar, states: &States) -> Self {
        // (p,A) always_includes (p,B) <==> B -> A γ, γ =>* ε
        let mut always_includes = Map::<Goto, Vec<Goto>>::default();
        for state in &states.states {
            for (nterm, _) in state.nterm_transitions(g) {
                for &rule in g.rules_by_symbol(nterm) {
                    let Some((&first, rest)) = g.rule(rule).rhs().split_first() else {
                        continue;
                    };
                    if g.is_terminal(first) || !rest.iter().all(|s| g.symbol(*s).nullable()) {
                        continue;
                    }
                    let edges = always_includes
                        .entry(Goto {
                            from: state.id,
                            symbol: first,
                        })
                        .or_default();
                    let to = Goto {
                        from: state.id,
                        symbol: nterm,
                    };
                    if !edges.contains(&to) {
                        edges.push(to);
                    }
                }
            }
        }

        // AlwaysFollow(p,A) = DR(p,A) ∪ ⋃{ AlwaysFollow(r,C) | (p,A) reads (r,C) ∨ (p,A) always_includes (r,C) }
        let mut relation = states.reads_relation.clone();
        for (from, edges) in &always_includes {
            relation.entry(*from).or_default().extend(edges);
        }
        let always_follows = digraph(
            states.direct_read_sets.keys().copied(),
            &relation,
            &states.direct_read_sets,
        );

        let mut follow_kernel_items = Map::<Goto, BitSet>::default();
        for goto in states.direct_read_sets.keys() {
            let state = &states.states[goto.from.index()];
            let kernels = state
                .kernels
                .iter()
                .enumerate()
                .filter(|(_, kernel)| {
                    kernel.next_symbol(g) == Some(goto.symbol)
                        && kernel
                            .symbols_after_transition(g)
                            .iter()
                            .all(|s| g.symbol(*s).nullable())
                })
                .map(|(k, _)| k)
                .collect();
            follow_kernel_items.insert(*goto, kernels);
        }
        let follow_kernel_items = digraph(
            states.direct_read_sets.keys().copied(),
            &always_includes,
            &follow_kernel_items,
        );

        let mut cache = Self {
            always_follows,
            follow_kernel_items,
            item_lookaheads: item_lookaheads(g, states),
            annotation_lists: vec![],
            lookahead_set_filters: vec![],
        };
        cache.annotation_lists = report_duration("annotation_lists", || {
            cache.compute_annotation_lists(g, states)
        });
        cache.lookahead_set_filters = states
            .states
            .iter()
            .map(|state| {
                let list = &cache.annotation_lists[state.id.index()];
                (0..state.kernels.len())
                    .map(|j| {
                        list.iter()
                            .filter(|(_, annotation)| annotation.is_contributed_by(j))
                            .map(|(desc, _)| desc.token)
                            .collect()
                    })
                    .collect()
            })
            .collect();
        cache
    }

    fn has_annotations(&self) -> bool {
        self.annotation_lists.iter().any(|list| !list.is_empty())
    }

    /// The kernel items of `state` whose lookaheads can reach `token` after
    /// reducing to `lhs`, or `None` if `token` always follows the goto.
    fn lhs_contributions(&self, state: StateID, lhs: SymbolID, token: SymbolID) -> Option<BitSet> {
        let goto = Goto {
            from: state,
            symbol: lhs,
        };
        if self
            .always_follows
            .get(&goto)
            .map_or(false, |follows| follows.contains(token))
        {
            return None;
        }
        let item_lookaheads = &self.item_lookaheads[state.index()];
        let kernels = self.follow_kernel_items.get(&goto).map_or_else(BitSet::new, |items| {
            items
                .iter()
                .filter(|j| item_lookaheads[*j].contains(token))
                .collect()
        });
        Some(kernels)
    }

    fn compute_annotation_lists(
        &self,
        g: &Grammar,
        states: &States,
    ) -> Vec<Map<AnnotationDesc, Annotation>> {
        let mut annotation_lists = vec![Map::<AnnotationDesc, Annotation>::default(); states.states.len()];
        let mut pending = Worklist::<(StateID, StateID)>::with_capacity(states.states.len());

        let mut contributions = Map::<SymbolID, Vec<Action>>::default();
        for state in &states.states {
            contributions.clear();
            for shift in &state.shifts {
                if g.is_terminal(shift.symbol) {
                    contributions.entry(shift.symbol).or_default().push(Action::Shift);
                }
            }
            for reduce in &state.reduces {
                for token in reduce.lookahead.iter().flat_map(|la| la.iter()) {
                    contributions
                        .entry(token)
                        .or_default()
                        .push(Action::Reduce(reduce.rule()));
                }
            }

            for (token, mut actions) in contributions.drain(..) {
                if actions.len() < 2 {
                    continue;
                }
                actions.sort();
                let desc = AnnotationDesc {
                    state: state.id,
                    token,
                    actions,
                };
                let annotation = self.annotate_manifestation(g, state, &desc);
                annotation_lists[state.id.index()].insert(desc, annotation);
            }

            if !annotation_lists[state.id.index()].is_empty() {
                for &pred in &state.predecessors {
                    pending.push((pred, state.id));
                }
            }
        }

        while let Some((pred, next)) = pending.pop() {
            let pred_state = &states.states[pred.index()];
            let next_state = &states.states[next.index()];

            let mut changed = false;
            let annotations: Vec<_> = annotation_lists[next.index()]
                .iter()
                .map(|(desc, annotation)| {
                    let added = self.annotate_predecessor(g, pred_state, next_state, desc, annotation);
                    (desc.clone(), added)
                })
                .collect();
            for (desc, added) in annotations {
                if added.is_useless() {
                    continue;
                }
                let list = &mut annotation_lists[pred.index()];
                match list.get_mut(&desc) {
                    Some(annotation) => changed |= annotation.merge(&added),
                    None => {
                        list.insert(desc, added);
                        changed = true;
                    }
                }
            }

            if changed {
                for &prev in &pred_state.predecessors {
                    pending.push((prev, pred));
                }
            }
        }

        annotation_lists
    }

    fn annotate_manifestation(&self, g: &Grammar, state: &State, desc: &AnnotationDesc) -> Annotation {
        let mut annotation = Annotation::new(desc.actions.len());
        for (i, action) in desc.actions.iter().enumerate() {
            let Action::Reduce(rule) = action else {
                // A shift is there regardless of the lookaheads.
                continue;
            };
            let rule = g.rule(*rule);
            if rule.is_empty() {
                if let Some(kernels) = self.lhs_contributions(state.id, rule.lhs(), desc.token) {
                    annotation.define(i, kernels);
                }
            } else {
                let kernels = state
                    .kernels
                    .iter()
                    .enumerate()
                    .filter(|(_, kernel)| kernel.rule == rule.id() && kernel.is_end_of_rule(g))
                    .map(|(j, _)| j)
                    .collect();
                annotation.define(i, kernels);
            }
        }
        annotation
    }

    fn annotate_predecessor(
        &self,
        g: &Grammar,
        pred: &State,
        next: &State,
        desc: &AnnotationDesc,
        annotation: &Annotation,
    ) -> Annotation {
        let token = desc.token;
        let mut added = Annotation::new(annotation.rows.len());
        for (i, row) in annotation.rows.iter().enumerate() {
            let Some(row) = row else { continue };

            let lhs_contributions: Map<usize, Option<BitSet>> = row
                .iter()
                .filter(|k| next.kernels[*k].position == 1)
                .map(|k| {
                    let lhs = next.kernels[k].lhs(g);
                    (k, self.lhs_contributions(pred.id, lhs, token))
                })
                .collect();
            if lhs_contributions.values().any(Option::is_none) {
                // The token always follows, so the row is no longer split-dependent.
                continue;
            }

            let pred_lookaheads = &self.item_lookaheads[pred.id.index()];
            let kernels = pred
                .kernels
                .iter()
                .enumerate()
                .filter(|(j, pred_kernel)| {
                    row.iter().any(|k| {
                        let kernel = &next.kernels[k];
                        if pred_kernel.is_predecessor_of(kernel) && pred_lookaheads[*j].contains(token) {
                            return true;
                        }
                        matches!(lhs_contributions.get(&k), Some(Some(bits)) if bits.contains(*j))
                    })
                })
                .map(|(j, _)| j)
                .collect();
            added.define(i, kernels);
        }
        added
    }

    /// The actions of the inadequacy that survive with the given item lookaheads,
    /// or `None` when no action contributes at all.
    fn dominant_contribution(
        &self,
        states: &[State],
        desc: &AnnotationDesc,
        annotation: &Annotation,
        lookaheads: &[SymbolSet],
    ) -> Option<Vec<Action>> {
        let contributing: Vec<&Action> = desc
            .actions
            .iter()
            .zip(&annotation.rows)
            .filter(|(_, row)| match row {
                None => true,
                Some(kernels) => kernels.iter().any(|j| lookaheads[j].contains(desc.token)),
            })
            .map(|(action, _)| action)
            .collect();
        if contributing.is_empty() {
            return None;
        }

        // Drop the actions that lost the precedence resolution in the LALR(1) state.
        let state = &states[desc.state.index()];
        let selected = contributing
            .into_iter()
            .filter(|action| match action {
                Action::Shift => state
                    .shifts
                    .iter()
                    .any(|s| s.symbol == desc.token && !s.not_selected),
                Action::Reduce(rule) => state
                    .reduce(*rule)
                    .map_or(false, |r| !r.not_selected.contains(desc.token)),
            })
            .cloned()
            .collect();
        Some(selected)
    }

    fn is_compatible(
        &self,
        states: &[State],
        core: StateID,
        current: &[SymbolSet],
        propagated: &[SymbolSet],
    ) -> bool {
        self.annotation_lists[core.index()]
            .iter()
            .all(|(desc, annotation)| {
                let a = self.dominant_contribution(states, desc, annotation, current);
                let b = self.dominant_contribution(states, desc, annotation, propagated);
                match (a, b) {
                    (Some(a), Some(b)) => a == b,
                    _ => true,
                }
            })
    }

    /// The item lookaheads of the kernels of `next`, reached from `from` whose
    /// kernels have the lookaheads `source`.
    fn propagate_lookaheads(
        &self,
        g: &Grammar,
        from: &State,
        source: &[SymbolSet],
        next: &State,
    ) -> Vec<SymbolSet> {
        let filters = &self.lookahead_set_filters[next.id.index()];
        next.kernels
            .iter()
            .zip(filters)
            .map(|(kernel, filter)| {
                let mut lookaheads = SymbolSet::default();
                if kernel.rule == RuleID::ACCEPT {
                    // `$end` is the only lookahead there and it never splits.
                } else if kernel.position == 1 {
                    let goto = Goto {
                        from: from.id,
                        symbol: kernel.lhs(g),
                    };
                    if let Some(follows) = self.always_follows.get(&goto) {
                        lookaheads.union_with(follows);
                    }
                    if let Some(items) = self.follow_kernel_items.get(&goto) {
                        for j in items.iter() {
                            lookaheads.union_with(&source[j]);
                        }
                    }
                } else if let Some(j) = from.kernels.iter().position(|k| k.is_predecessor_of(kernel)) {
                    lookaheads.union_with(&source[j]);
                }
                lookaheads.intersect_with(filter);
                lookaheads
            })
            .collect()
    }
}

/// The LALR(1) lookaheads of every kernel item, filled in by increasing dot position.
fn item_lookaheads(g: &Grammar, states: &States) -> Vec<Vec<SymbolSet>> {
    let mut item_lookaheads: Vec<Vec<SymbolSet>> = states
        .states
        .iter()
        .map(|s| vec![SymbolSet::default(); s.kernels.len()])
        .collect();
    let max_position = states
        .states
        .iter()
        .flat_map(|s| s.kernels.iter().map(|k| k.position))
        .max()
        .unwrap_or(0);

    for position in 1..=max_position {
        for state in &states.states {
            for (k, kernel) in state.kernels.iter().enumerate() {
                if kernel.position != position || kernel.rule == RuleID::ACCEPT {
                    continue;
                }
                let mut lookaheads = SymbolSet::default();
                for &pred in &state.predecessors {
                    if position == 1 {
                        let goto = Goto {
                            from: pred,
                            symbol: kernel.lhs(g),
                        };
                        if let Some(follows) = states.follow_sets.get(&goto) {
                            lookaheads.union_with(follows);
                        }
                    } else if let Some(j) = states.states[pred.index()]
                        .kernels
                        .iter()
                        .position(|i| i.is_predecessor_of(kernel))
                    {
                        lookaheads.union_with(&item_lookaheads[pred.index()][j]);
                    }
                }
                item_lookaheads[state.id.index()][k] = lookaheads;
            }
        }
    }

    item_lookaheads
}

impl States {
    /// Split the LALR(1) states whose merged lookaheads cause conflicts that
    /// a canonical LR(1) automaton would not have.
    ///
    /// The automaton must have been computed with [`States::compute`] first.
    #[tracing::instrument(skip_all)]
    pub fn compute_ielr(&mut self, g: &Grammar) {
        let cache = report_duration("compute_ielr_cache", || IelrCache::new(g, self));
        if !cache.has_annotations() {
            tracing::debug!("no inadequate states, skip splitting");
            return;
        }

        let lalr_count = self.states.len();
        report_duration("split_states", || self.split_states(g, &cache));
        self.remove_unreachable_states();
        self.clear_look_ahead_sets();
        self.compute_lookaheads(g);
        report_duration("compute_conflicts", || self.compute_conflicts(g));
        report_duration("compute_default_reduction", || {
            self.compute_default_reduction()
        });
        tracing::debug!(
            "split {} LALR(1) states into {} IELR(1) states",
            lalr_count,
            self.states.len()
        );
    }

    fn split_states(&mut self, g: &Grammar, cache: &IelrCache) {
        let num_cores = self.states.len();
        let mut isocores: Vec<Vec<StateID>> = (0..num_cores)
            .map(|i| vec![StateID::from_index(i)])
            .collect();

        // `None` until the lookaheads of the state are recomputed.
        let mut lookaheads: Vec<Option<Vec<SymbolSet>>> = vec![None; num_cores];
        lookaheads[0] = Some(vec![SymbolSet::default(); self.states[0].kernels.len()]);

        let mut queue = Worklist::<StateID>::new();
        queue.push(StateID::START);
        while let Some(id) = queue.pop() {
            let Some(source) = lookaheads[id.index()].clone() else {
                continue;
            };
            let core = self.states[id.index()].lalr_isocore;
            let transitions: Vec<(SymbolID, StateID)> = self.states[id.index()]
                .transitions
                .iter()
                .map(|(sym, next)| (*sym, *next))
                .collect();

            for (sym, next) in transitions {
                let next_core = self.states[next.index()].lalr_isocore;
                let propagated = cache.propagate_lookaheads(
                    g,
                    &self.states[core.index()],
                    &source,
                    &self.states[next_core.index()],
                );

                let compatible = isocores[next_core.index()].iter().copied().find(|s| {
                    match &lookaheads[s.index()] {
                        None => true,
                        Some(current) => {
                            cache.is_compatible(&self.states, next_core, current, &propagated)
                        }
                    }
                });

                let target = match compatible {
                    Some(s) => {
                        if let Some(current) = &mut lookaheads[s.index()] {
                            let mut grew = false;
                            for (slot, added) in current.iter_mut().zip(&propagated) {
                                if !added.is_subset(slot) {
                                    slot.union_with(added);
                                    grew = true;
                                }
                            }
                            if grew {
                                queue.push(s);
                            }
                        } else {
                            lookaheads[s.index()] = Some(propagated);
                            queue.push(s);
                        }
                        s
                    }
                    None => {
                        let new_id = StateID::from_index(self.states.len());
                        let mut new_state = self.states[next_core.index()].clone();
                        new_state.id = new_id;
                        new_state.lalr_isocore = next_core;
                        new_state.predecessors.clear();
                        tracing::trace!("split {:?} from {:?}", new_id, next_core);
                        self.states.push(new_state);
                        isocores[next_core.index()].push(new_id);
                        lookaheads.push(Some(propagated));
                        queue.push(new_id);
                        new_id
                    }
                };
                self.states[id.index()].transitions.insert(sym, target);
            }
        }
    }

    /// Drop the states no longer reachable from the start state, renumber the
    /// rest and rebuild their predecessors.
    fn remove_unreachable_states(&mut self) {
        let mut reachable = vec![false; self.states.len()];
        let mut stack = vec![StateID::START];
        reachable[0] = true;
        while let Some(id) = stack.pop() {
            for next in self.states[id.index()].transitions.values() {
                if !mem::replace(&mut reachable[next.index()], true) {
                    stack.push(*next);
                }
            }
        }

        let mut remap: Vec<Option<StateID>> = vec![None; self.states.len()];
        let mut num_reachable = 0;
        for (slot, _) in remap.iter_mut().zip(&reachable).filter(|(_, r)| **r) {
            *slot = Some(StateID::from_index(num_reachable));
            num_reachable += 1;
        }

        // A split group whose original state got dropped is represented by
        // its first surviving member.
        let mut representatives = Map::<StateID, StateID>::default();
        for (state, new_id) in self.states.iter().zip(&remap) {
            if let Some(new_id) = new_id {
                representatives.entry(state.lalr_isocore).or_insert(*new_id);
            }
        }

        let renumber = |id: StateID| match remap[id.index()] {
            Some(id) => id,
            None => panic!("[BUG] transition to the unreachable state {:?}", id),
        };
        let old_states = mem::take(&mut self.states);
        for (i, mut state) in old_states.into_iter().enumerate() {
            let Some(new_id) = remap[i] else { continue };
            state.id = new_id;
            state.lalr_isocore = remap[state.lalr_isocore.index()]
                .unwrap_or_else(|| representatives[&state.lalr_isocore]);
            for next in state.transitions.values_mut() {
                *next = renumber(*next);
            }
            state.predecessors.clear();
            self.states.push(state);
        }

        for i in 0..self.states.len() {
            let id = StateID::from_index(i);
            let targets: Vec<StateID> = self.states[i].transitions.values().copied().collect();
            for next in targets {
                self.states[next.index()].append_predecessor(id);
            }
        }
    }

    fn clear_look_ahead_sets(&mut self) {
        for state in &mut self.states {
            for shift in &mut state.shifts {
                shift.not_selected = false;
            }
            for reduce in &mut state.reduces {
                reduce.lookahead = None;
                reduce.not_selected.clear();
                reduce.default_reduction = false;
            }
            state.conflicts.clear();
            state.resolved_conflicts.clear();
            state.default_reduction_rule = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::states::Config;

    /// LR(1) but not LALR(1): the two `e` states merge in LALR(1).
    fn lr1_not_lalr1() -> Grammar {
        Grammar::define(|g| {
            g.rule("S", &["'a'", "E", "'c'"]);
            g.rule("S", &["'a'", "F", "'d'"]);
            g.rule("S", &["'b'", "F", "'c'"]);
            g.rule("S", &["'b'", "E", "'d'"]);
            g.rule("E", &["'e'"]);
            g.rule("F", &["'e'"]);
            Ok(())
        })
        .unwrap()
    }

    #[test]
    fn ielr_removes_mysterious_conflict() {
        let _ = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_max_level(tracing::Level::TRACE)
            .with_test_writer()
            .try_init();

        let g = lr1_not_lalr1();
        let lalr = States::generate_with_config(&g, Config::new().use_lalr());
        assert_eq!(lalr.sr_conflicts_count(), 0);
        assert_eq!(lalr.rr_conflicts_count(), 1);

        let ielr = States::generate_with_config(&g, Config::new().use_ielr());
        eprintln!("{}", ielr.display(&g));
        assert_eq!(ielr.sr_conflicts_count(), 0);
        assert_eq!(ielr.rr_conflicts_count(), 0);
        assert_eq!(ielr.states_count(), lalr.states_count() + 1);

        let split: Vec<_> = ielr
            .states()
            .iter()
            .filter(|s| s.lalr_isocore() != s.id())
            .collect();
        assert_eq!(split.len(), 1);
        let core = ielr.state(split[0].lalr_isocore());
        assert_eq!(core.kernels(), split[0].kernels());
        for state in [core, split[0]] {
            assert_eq!(state.predecessors().len(), 1);
            let lookaheads: Vec<_> = state
                .reduces()
                .iter()
                .map(|r| r.lookahead().unwrap().len())
                .collect();
            assert_eq!(lookaheads, [1, 1]);
        }
    }

    #[test]
    fn ielr_keeps_lalr_automaton_without_inadequacies() {
        let g = Grammar::define(|g| {
            g.rule("S", &["'a'", "S", "'b'"]);
            g.rule("S", &[]);
            Ok(())
        })
        .unwrap();
        let lalr = States::generate_with_config(&g, Config::new().use_lalr());
        let ielr = States::generate_with_config(&g, Config::new().use_ielr());
        assert_eq!(lalr.states_count(), ielr.states_count());
        assert!(ielr.states().iter().all(|s| s.lalr_isocore() == s.id()));
    }

    #[test]
    fn annotation_merge_is_monotone() {
        let mut a = Annotation::new(2);
        a.define(0, [1].into_iter().collect());
        let mut b = Annotation::new(2);
        b.define(0, [2].into_iter().collect());
        b.define(1, BitSet::new());

        assert!(a.merge(&b));
        assert_eq!(a.rows[0], Some([1, 2].into_iter().collect()));
        assert_eq!(a.rows[1], Some(BitSet::new()));
        assert!(!a.merge(&b));
        assert!(!a.is_useless());
        assert!(Annotation::new(3).is_useless());
    }
}
