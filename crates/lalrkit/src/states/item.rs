use crate::grammar::{Grammar, RuleID, SymbolID};
use std::fmt;

/// The LR(0) item, a rule with a dot position in its right-hand side.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Item {
    pub rule: RuleID,
    pub position: u16,
}

impl fmt::Debug for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:?},{})", self.rule, self.position)
    }
}

impl Item {
    pub const fn new(rule: RuleID, position: u16) -> Self {
        Self { rule, position }
    }

    /// `$accept -> • start $end`
    pub const fn start() -> Self {
        Self::new(RuleID::ACCEPT, 0)
    }

    fn dot(&self) -> usize {
        usize::from(self.position)
    }

    pub fn lhs(&self, g: &Grammar) -> SymbolID {
        g.rule(self.rule).lhs()
    }

    pub fn next_symbol(&self, g: &Grammar) -> Option<SymbolID> {
        g.rule(self.rule).rhs().get(self.dot()).copied()
    }

    pub fn next_next_symbol(&self, g: &Grammar) -> Option<SymbolID> {
        g.rule(self.rule).rhs().get(self.dot() + 1).copied()
    }

    pub fn previous_symbol(&self, g: &Grammar) -> Option<SymbolID> {
        let dot = self.dot().checked_sub(1)?;
        g.rule(self.rule).rhs().get(dot).copied()
    }

    pub fn is_end_of_rule(&self, g: &Grammar) -> bool {
        self.dot() == g.rule(self.rule).rhs().len()
    }

    pub fn is_beginning(&self) -> bool {
        self.position == 0
    }

    pub fn is_start_item(&self) -> bool {
        *self == Self::start()
    }

    pub fn advance(&self) -> Self {
        Self::new(self.rule, self.position + 1)
    }

    pub fn retreat(&self) -> Option<Self> {
        Some(Self::new(self.rule, self.position.checked_sub(1)?))
    }

    pub fn symbols_before_dot<'g>(&self, g: &'g Grammar) -> &'g [SymbolID] {
        let rhs = g.rule(self.rule).rhs();
        &rhs[..self.dot().min(rhs.len())]
    }

    pub fn symbols_after_dot<'g>(&self, g: &'g Grammar) -> &'g [SymbolID] {
        let rhs = g.rule(self.rule).rhs();
        &rhs[self.dot().min(rhs.len())..]
    }

    /// The symbols after the next symbol.
    pub fn symbols_after_transition<'g>(&self, g: &'g Grammar) -> &'g [SymbolID] {
        let rhs = g.rule(self.rule).rhs();
        &rhs[(self.dot() + 1).min(rhs.len())..]
    }

    /// Whether `other` is this item with the dot moved one symbol forward.
    pub fn is_predecessor_of(&self, other: &Item) -> bool {
        self.rule == other.rule && self.position + 1 == other.position
    }

    pub fn display<'g>(&'g self, g: &'g Grammar) -> impl fmt::Display + 'g {
        crate::util::display_fn(|f| {
            let rule = g.rule(self.rule);
            write!(f, "{} ->", g.symbol(rule.lhs()))?;
            for (i, s) in rule.rhs().iter().enumerate() {
                if i == self.dot() {
                    f.write_str(" •")?;
                }
                write!(f, " {}", g.symbol(*s))?;
            }
            if self.dot() >= rule.rhs().len() {
                f.write_str(" •")?;
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_navigation() {
        let g = Grammar::define(|g| {
            g.rule("E", &["E", "'+'", "'n'"]);
            g.rule("E", &["'n'"]);
            Ok(())
        })
        .unwrap();
        let e = g.find_symbol_by_name("E").unwrap().id();
        let plus = g.find_symbol_by_name("'+'").unwrap().id();

        let item = Item::new(RuleID::from_raw(1), 1);
        assert_eq!(item.lhs(&g), e);
        assert_eq!(item.next_symbol(&g), Some(plus));
        assert_eq!(item.previous_symbol(&g), Some(e));
        assert_eq!(item.symbols_before_dot(&g), [e]);
        assert_eq!(item.symbols_after_dot(&g).len(), 2);
        assert_eq!(item.symbols_after_transition(&g).len(), 1);
        assert!(!item.is_end_of_rule(&g));
        assert!(item.advance().advance().is_end_of_rule(&g));
        assert!(item.is_predecessor_of(&item.advance()));
        assert_eq!(item.retreat(), Some(Item::new(RuleID::from_raw(1), 0)));
        assert_eq!(item.display(&g).to_string(), "E -> E • '+' 'n'");

        let end = Item::new(RuleID::from_raw(2), 1);
        assert_eq!(end.display(&g).to_string(), "E -> 'n' •");
        assert_eq!(end.next_symbol(&g), None);
        assert!(Item::start().is_start_item());
        assert!(Item::start().retreat().is_none());
    }
}
