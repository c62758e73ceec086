use crate::digraph;
use bit_set::BitSet;
use std::fmt;

/// The dense number assigned to a grammar symbol.
///
/// Terminal symbols are numbered first and nonterminal symbols follow them,
/// so that the set of symbols can be handled as a bitset.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct SymbolID {
    raw: u16,
}

impl SymbolID {
    /// Reserved terminal symbol that means the end of input.
    pub const EOF: Self = Self::from_raw(0);

    /// Reserved terminal symbol used as an error token.
    pub const ERROR: Self = Self::from_raw(1);

    /// Reserved terminal symbol that stands for an unknown token.
    pub const UNDEF: Self = Self::from_raw(2);

    #[inline]
    pub const fn from_raw(raw: u16) -> Self {
        Self { raw }
    }

    #[inline]
    pub const fn into_raw(self) -> u16 {
        self.raw
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.raw as usize
    }
}

impl fmt::Debug for SymbolID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::EOF => write!(f, "Y#EOF"),
            Self::ERROR => write!(f, "Y#Error"),
            Self::UNDEF => write!(f, "Y#Undef"),
            _ => write!(f, "Y#{:03}", self.raw),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Symbol {
    pub(crate) id: SymbolID,
    pub(crate) name: String,
    pub(crate) alias: Option<String>,
    pub(crate) is_terminal: bool,
    pub(crate) token_id: u32,
    pub(crate) nullable: bool,
    pub(crate) precedence: Option<Precedence>,
    pub(crate) first_set: SymbolSet,
}

impl Symbol {
    pub fn id(&self) -> SymbolID {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    /// The alias if exists, otherwise the name.
    pub fn display_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    pub fn is_terminal(&self) -> bool {
        self.is_terminal
    }

    pub fn is_nonterminal(&self) -> bool {
        !self.is_terminal
    }

    /// Whether this symbol is written as a character literal such as `'+'`.
    pub fn is_char_literal(&self) -> bool {
        is_char_literal(&self.name)
    }

    /// The token number exported to the generated parser.
    ///
    /// For nonterminal symbols this is a private sequential number.
    pub fn token_id(&self) -> u32 {
        self.token_id
    }

    pub fn nullable(&self) -> bool {
        self.nullable
    }

    pub fn precedence(&self) -> Option<Precedence> {
        self.precedence
    }

    pub fn first_set(&self) -> &SymbolSet {
        &self.first_set
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

pub(crate) fn is_char_literal(name: &str) -> bool {
    name.len() >= 3 && name.starts_with('\'') && name.ends_with('\'')
}

/// Calculate the token number of a character literal like `'a'` or `'\n'`.
pub(crate) fn char_literal_token_id(literal: &str) -> Option<u32> {
    let body = literal.get(1..literal.len().checked_sub(1)?)?;
    let id = match body {
        "\\b" => 8,
        "\\f" => 12,
        "\\n" => 10,
        "\\r" => 13,
        "\\t" => 9,
        "\\v" => 11,
        "\"" => 34,
        "'" | "\\'" => 39,
        "\\\\" => 92,
        _ => match body.strip_prefix('\\') {
            Some(digits) if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) => {
                u32::from_str_radix(digits, 8).ok()?
            }
            Some(..) => return None,
            None => {
                let mut chars = body.chars();
                let ch = chars.next()?;
                if chars.next().is_some() {
                    return None;
                }
                let mut buf = [0u8; 4];
                u32::from(ch.encode_utf8(&mut buf).as_bytes()[0])
            }
        },
    };
    Some(id)
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Precedence {
    pub priority: u16,
    pub assoc: Assoc,
}

impl Precedence {
    pub const fn new(priority: u16, assoc: Assoc) -> Self {
        Self { priority, assoc }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Assoc {
    Left,
    Right,
    Nonassoc,
    /// Declared by `%precedence`; carries a priority but no associativity.
    Precedence,
}

impl fmt::Display for Assoc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Left => f.write_str("%left"),
            Self::Right => f.write_str("%right"),
            Self::Nonassoc => f.write_str("%nonassoc"),
            Self::Precedence => f.write_str("%precedence"),
        }
    }
}

/// A set of grammar symbols backed by a bitset over symbol numbers.
#[derive(Default, Clone, PartialEq, Eq, Hash)]
pub struct SymbolSet {
    inner: BitSet,
}

impl SymbolSet {
    pub fn contains(&self, id: SymbolID) -> bool {
        self.inner.contains(id.index())
    }
    pub fn insert(&mut self, id: SymbolID) -> bool {
        self.inner.insert(id.index())
    }
    pub fn remove(&mut self, id: SymbolID) -> bool {
        self.inner.remove(id.index())
    }
    pub fn union_with(&mut self, other: &Self) {
        self.inner.union_with(&other.inner)
    }
    pub fn intersect_with(&mut self, other: &Self) {
        self.inner.intersect_with(&other.inner)
    }
    pub fn difference_with(&mut self, other: &Self) {
        self.inner.difference_with(&other.inner)
    }
    pub fn is_subset(&self, other: &Self) -> bool {
        self.inner.is_subset(&other.inner)
    }
    pub fn is_disjoint(&self, other: &Self) -> bool {
        self.inner.is_disjoint(&other.inner)
    }
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
    pub fn len(&self) -> usize {
        self.inner.len()
    }
    pub fn clear(&mut self) {
        self.inner.clear()
    }
    pub fn iter(&self) -> impl Iterator<Item = SymbolID> + '_ {
        self.inner.iter().map(|raw| SymbolID::from_raw(raw as u16))
    }
    /// The members in ascending order of symbol number.
    pub fn to_vec(&self) -> Vec<SymbolID> {
        self.iter().collect()
    }
}

impl fmt::Debug for SymbolSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl FromIterator<SymbolID> for SymbolSet {
    fn from_iter<I>(iter: I) -> Self
    where
        I: IntoIterator<Item = SymbolID>,
    {
        Self {
            inner: iter.into_iter().map(SymbolID::index).collect(),
        }
    }
}

impl digraph::Set for SymbolSet {
    fn union_with(&mut self, other: &Self) {
        self.union_with(other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn char_literal_token_ids() {
        assert_eq!(char_literal_token_id("'+'"), Some(43));
        assert_eq!(char_literal_token_id("'\\n'"), Some(10));
        assert_eq!(char_literal_token_id("'\\t'"), Some(9));
        assert_eq!(char_literal_token_id("'''"), Some(39));
        assert_eq!(char_literal_token_id("'\"'"), Some(34));
        assert_eq!(char_literal_token_id("'\\\\'"), Some(92));
        assert_eq!(char_literal_token_id("'\\101'"), Some(65));
        assert_eq!(char_literal_token_id("'\\9'"), None);
        assert_eq!(char_literal_token_id("'ab'"), None);
    }

    #[test]
    fn symbol_set_ordering() {
        let set: SymbolSet = [5, 1, 3].into_iter().map(SymbolID::from_raw).collect();
        assert_eq!(
            set.to_vec(),
            vec![
                SymbolID::from_raw(1),
                SymbolID::from_raw(3),
                SymbolID::from_raw(5)
            ]
        );
        assert!(set.contains(SymbolID::ERROR));
        assert!(!set.contains(SymbolID::EOF));
    }
}
