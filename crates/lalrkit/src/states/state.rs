use super::{
    conflict::{Conflict, ResolvedConflict},
    item::Item,
};
use crate::{
    grammar::{Grammar, RuleID, SymbolID, SymbolSet},
    types::Map,
    util::display_fn,
};
use std::fmt;

#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct StateID {
    raw: u32,
}

impl fmt::Debug for StateID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S#{:03}", self.raw)
    }
}

impl fmt::Display for StateID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.raw, f)
    }
}

impl StateID {
    pub const START: Self = Self::from_raw(0);

    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Self { raw }
    }

    #[inline]
    pub const fn into_raw(self) -> u32 {
        self.raw
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.raw as usize
    }

    pub(crate) fn from_index(index: usize) -> Self {
        Self::from_raw(index as u32)
    }
}

/// The transition on a symbol, together with the kernel it leads to.
#[derive(Debug, Clone)]
pub struct Shift {
    pub(crate) symbol: SymbolID,
    pub(crate) next_items: Vec<Item>,
    pub(crate) not_selected: bool,
}

impl Shift {
    pub fn symbol(&self) -> SymbolID {
        self.symbol
    }

    pub fn next_items(&self) -> &[Item] {
        &self.next_items
    }

    /// Whether this shift lost a conflict resolution.
    pub fn is_not_selected(&self) -> bool {
        self.not_selected
    }
}

#[derive(Debug, Clone)]
pub struct Reduce {
    pub(crate) item: Item,
    pub(crate) lookahead: Option<SymbolSet>,
    pub(crate) not_selected: SymbolSet,
    pub(crate) default_reduction: bool,
}

impl Reduce {
    pub(crate) fn new(item: Item) -> Self {
        Self {
            item,
            lookahead: None,
            not_selected: SymbolSet::default(),
            default_reduction: false,
        }
    }

    pub fn item(&self) -> Item {
        self.item
    }

    pub fn rule(&self) -> RuleID {
        self.item.rule
    }

    /// The lookahead set, or `None` if the state never needs one.
    pub fn lookahead(&self) -> Option<&SymbolSet> {
        self.lookahead.as_ref()
    }

    /// The lookahead symbols removed by conflict resolution.
    pub fn not_selected(&self) -> &SymbolSet {
        &self.not_selected
    }

    /// The lookahead set minus the symbols removed by conflict resolution.
    pub fn selected_lookahead(&self) -> SymbolSet {
        let mut selected = self.lookahead.clone().unwrap_or_default();
        selected.difference_with(&self.not_selected);
        selected
    }

    pub fn is_default_reduction(&self) -> bool {
        self.default_reduction
    }
}

#[derive(Debug, Clone)]
pub struct State {
    pub(crate) id: StateID,
    pub(crate) accessing_symbol: Option<SymbolID>,
    pub(crate) kernels: Vec<Item>,
    pub(crate) closure: Vec<Item>,
    pub(crate) shifts: Vec<Shift>,
    pub(crate) transitions: Map<SymbolID, StateID>,
    pub(crate) reduces: Vec<Reduce>,
    pub(crate) conflicts: Vec<Conflict>,
    pub(crate) resolved_conflicts: Vec<ResolvedConflict>,
    pub(crate) default_reduction_rule: Option<RuleID>,
    pub(crate) predecessors: Vec<StateID>,
    pub(crate) lalr_isocore: StateID,
}

impl State {
    pub(crate) fn new(id: StateID, accessing_symbol: Option<SymbolID>, kernels: Vec<Item>) -> Self {
        Self {
            id,
            accessing_symbol,
            kernels,
            closure: vec![],
            shifts: vec![],
            transitions: Map::default(),
            reduces: vec![],
            conflicts: vec![],
            resolved_conflicts: vec![],
            default_reduction_rule: None,
            predecessors: vec![],
            lalr_isocore: id,
        }
    }

    pub fn id(&self) -> StateID {
        self.id
    }

    /// The symbol on every transition into this state. `None` for the start state.
    pub fn accessing_symbol(&self) -> Option<SymbolID> {
        self.accessing_symbol
    }

    pub fn kernels(&self) -> &[Item] {
        &self.kernels
    }

    /// The non-kernel items, ordered by rule.
    pub fn closure(&self) -> &[Item] {
        &self.closure
    }

    pub fn items(&self) -> impl Iterator<Item = &Item> + '_ {
        self.kernels.iter().chain(&self.closure)
    }

    /// The shifts and gotos, ordered by symbol number.
    pub fn shifts(&self) -> &[Shift] {
        &self.shifts
    }

    pub fn transitions(&self) -> &Map<SymbolID, StateID> {
        &self.transitions
    }

    pub fn transition(&self, symbol: SymbolID) -> Option<StateID> {
        self.transitions.get(&symbol).copied()
    }

    pub fn term_transitions<'g>(
        &'g self,
        g: &'g Grammar,
    ) -> impl Iterator<Item = (SymbolID, StateID)> + 'g {
        self.transitions
            .iter()
            .filter(|(sym, _)| g.is_terminal(**sym))
            .map(|(sym, next)| (*sym, *next))
    }

    pub fn nterm_transitions<'g>(
        &'g self,
        g: &'g Grammar,
    ) -> impl Iterator<Item = (SymbolID, StateID)> + 'g {
        self.transitions
            .iter()
            .filter(|(sym, _)| !g.is_terminal(**sym))
            .map(|(sym, next)| (*sym, *next))
    }

    pub fn reduces(&self) -> &[Reduce] {
        &self.reduces
    }

    pub fn reduce(&self, rule: RuleID) -> Option<&Reduce> {
        self.reduces.iter().find(|r| r.rule() == rule)
    }

    pub fn conflicts(&self) -> &[Conflict] {
        &self.conflicts
    }

    pub fn has_conflicts(&self) -> bool {
        !self.conflicts.is_empty()
    }

    pub fn sr_conflicts(&self) -> impl Iterator<Item = &Conflict> + '_ {
        self.conflicts
            .iter()
            .filter(|c| matches!(c, Conflict::ShiftReduce { .. }))
    }

    pub fn rr_conflicts(&self) -> impl Iterator<Item = &Conflict> + '_ {
        self.conflicts
            .iter()
            .filter(|c| matches!(c, Conflict::ReduceReduce { .. }))
    }

    pub fn resolved_conflicts(&self) -> &[ResolvedConflict] {
        &self.resolved_conflicts
    }

    pub fn default_reduction_rule(&self) -> Option<RuleID> {
        self.default_reduction_rule
    }

    pub fn predecessors(&self) -> &[StateID] {
        &self.predecessors
    }

    /// The LALR state this one was split from, or itself.
    pub fn lalr_isocore(&self) -> StateID {
        self.lalr_isocore
    }

    pub fn has_error_shift(&self) -> bool {
        self.shifts.iter().any(|s| s.symbol == SymbolID::ERROR)
    }

    pub(crate) fn append_predecessor(&mut self, id: StateID) {
        if !self.predecessors.contains(&id) {
            self.predecessors.push(id);
        }
    }

    pub fn display<'g>(&'g self, g: &'g Grammar) -> impl fmt::Display + 'g {
        display_fn(move |f| {
            writeln!(f, "## State {}", self.id)?;
            writeln!(f, "### kernels:")?;
            for item in &self.kernels {
                writeln!(f, "- {}", item.display(g))?;
            }
            if !self.closure.is_empty() {
                writeln!(f, "### closure:")?;
                for item in &self.closure {
                    writeln!(f, "- {}", item.display(g))?;
                }
            }
            if !self.transitions.is_empty() {
                writeln!(f, "### transitions:")?;
                for shift in &self.shifts {
                    if let Some(next) = self.transition(shift.symbol) {
                        let mark = if shift.not_selected { " (not selected)" } else { "" };
                        writeln!(f, "- {} => {:?}{}", g.symbol(shift.symbol), next, mark)?;
                    }
                }
            }
            if !self.reduces.is_empty() {
                writeln!(f, "### reduces:")?;
                for reduce in &self.reduces {
                    write!(f, "- {}", g.rule(reduce.rule()).display(g))?;
                    if let Some(lookahead) = &reduce.lookahead {
                        f.write_str("  [")?;
                        for (i, sym) in lookahead.iter().enumerate() {
                            if i > 0 {
                                f.write_str(", ")?;
                            }
                            write!(f, "{}", g.symbol(sym))?;
                        }
                        f.write_str("]")?;
                    }
                    if reduce.default_reduction {
                        f.write_str(" (default)")?;
                    }
                    writeln!(f)?;
                }
            }
            if !self.conflicts.is_empty() {
                writeln!(f, "### conflicts:")?;
                for conflict in &self.conflicts {
                    writeln!(f, "- {}", conflict.display(g))?;
                }
            }
            if !self.resolved_conflicts.is_empty() {
                writeln!(f, "### resolved conflicts:")?;
                for resolved in &self.resolved_conflicts {
                    writeln!(f, "- {}", resolved.report_message(g))?;
                }
            }
            if !self.predecessors.is_empty() {
                writeln!(f, "### predecessors: {:?}", self.predecessors)?;
            }
            if self.lalr_isocore != self.id {
                writeln!(f, "### split from: {:?}", self.lalr_isocore)?;
            }
            Ok(())
        })
    }
}
