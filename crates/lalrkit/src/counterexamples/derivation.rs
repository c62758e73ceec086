use crate::{
    grammar::{Grammar, SymbolID},
    states::Item,
};

/// A derivation tree along a counterexample path.
///
/// `left` is the derivation of the symbol after the dot, and `right` carries
/// the derivation that produces the conflict symbol after it, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Derivation {
    item: Item,
    left: Option<Box<Derivation>>,
    right: Option<Box<Derivation>>,
}

impl Derivation {
    pub(crate) fn new(item: Item, left: Option<Derivation>) -> Self {
        Self {
            item,
            left: left.map(Box::new),
            right: None,
        }
    }

    pub(crate) fn set_right(&mut self, right: Option<Derivation>) {
        self.right = right.map(Box::new);
    }

    pub fn item(&self) -> Item {
        self.item
    }

    pub fn left(&self) -> Option<&Derivation> {
        self.left.as_deref()
    }

    pub fn right(&self) -> Option<&Derivation> {
        self.right.as_deref()
    }

    /// Render the tree as lines, one nesting level per line.
    ///
    /// ```text
    /// 0:  E                                      $end
    ///     1: E • '+' E
    /// ```
    pub fn render(&self, g: &Grammar) -> Vec<String> {
        let mut lines = vec![];
        self.render_into(g, 0, &mut lines, 0);
        lines
            .into_iter()
            .map(|line| line.trim_end().to_owned())
            .collect()
    }

    fn render_into(&self, g: &Grammar, offset: usize, lines: &mut Vec<String>, depth: usize) -> usize {
        if lines.len() <= depth {
            lines.push(String::new());
        }
        let item = self.item;
        pad(&mut lines[depth], offset);
        lines[depth].push_str(&format!(
            "{}: {} ",
            item.rule,
            join_names(g, item.symbols_before_dot(g))
        ));

        let Some(left) = &self.left else {
            let line = &mut lines[depth];
            line.push_str(" • ");
            line.push_str(&join_names(g, item.symbols_after_dot(g)));
            line.push(' ');
            return width(line);
        };
        let column = width(&lines[depth]);
        if let Some(next) = item.next_symbol(g) {
            lines[depth].push_str(g.symbol(next).display_name());
        }
        let end = left.render_into(g, column, lines, depth + 1);
        pad(&mut lines[depth], end);

        let rest = item.symbols_after_dot(g).get(1..).unwrap_or(&[]);
        if let Some(right) = self.right.as_ref().and_then(|r| r.left.as_deref()) {
            let column = width(&lines[depth]);
            let end = right.render_into(g, column, lines, depth + 1);
            lines[depth].push_str(&join_names(g, rest));
            lines[depth].push(' ');
            pad(&mut lines[depth], end);
        } else if item.next_next_symbol(g).is_some() {
            lines[depth].push_str(&join_names(g, rest));
            lines[depth].push(' ');
        }
        width(&lines[depth])
    }
}

fn width(s: &str) -> usize {
    s.chars().count()
}

fn pad(line: &mut String, column: usize) {
    let w = width(line);
    if w < column {
        line.extend(std::iter::repeat(' ').take(column - w));
    }
}

fn join_names(g: &Grammar, symbols: &[SymbolID]) -> String {
    symbols
        .iter()
        .map(|s| g.symbol(*s).display_name())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::RuleID;

    #[test]
    fn render_nests_children_under_their_symbol() {
        // S -> 'a' A ; A -> 'b'
        let g = Grammar::define(|g| {
            g.rule("S", &["'a'", "A"]);
            g.rule("A", &["'b'"]);
            Ok(())
        })
        .unwrap();
        let leaf = Derivation::new(Item::new(RuleID::from_raw(2), 1), None);
        let mid = Derivation::new(Item::new(RuleID::from_raw(1), 1), Some(leaf));
        let root = Derivation::new(Item::start(), Some(mid));

        let lines = root.render(&g);
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("0:  S"));
        assert!(lines[0].ends_with("$end") || lines[0].ends_with("YYEOF"));
        let column = lines[0].find('S').unwrap();
        assert_eq!(lines[1].find("1:"), Some(column));
        assert!(lines[1].contains("'a' A"));
        assert!(lines[2].trim_start().starts_with("2: 'b'  •"));
    }
}
