use super::{Grammar, Precedence, SymbolID};
use std::fmt;

#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct RuleID {
    raw: u16,
}

impl RuleID {
    /// The synthetic rule `$accept -> start $end`.
    pub const ACCEPT: Self = Self::from_raw(0);

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

impl fmt::Debug for RuleID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::ACCEPT => write!(f, "R#Accept"),
            _ => write!(f, "R#{:03}", self.raw),
        }
    }
}

impl fmt::Display for RuleID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.raw, f)
    }
}

#[derive(Debug, Clone)]
pub struct Rule {
    pub(crate) id: RuleID,
    pub(crate) lhs: SymbolID,
    pub(crate) rhs: Vec<SymbolID>,
    pub(crate) nullable: bool,
    pub(crate) precedence_sym: Option<SymbolID>,
    pub(crate) lineno: u32,
}

impl Rule {
    pub fn id(&self) -> RuleID {
        self.id
    }

    pub fn lhs(&self) -> SymbolID {
        self.lhs
    }

    pub fn rhs(&self) -> &[SymbolID] {
        &self.rhs
    }

    /// Whether the right-hand side has no symbols.
    pub fn is_empty(&self) -> bool {
        self.rhs.is_empty()
    }

    pub fn nullable(&self) -> bool {
        self.nullable
    }

    pub fn is_accept(&self) -> bool {
        self.id == RuleID::ACCEPT
    }

    /// The symbol whose precedence this rule takes: the `%prec` symbol if
    /// given, otherwise the last terminal symbol of the right-hand side.
    pub fn precedence_sym(&self) -> Option<SymbolID> {
        self.precedence_sym
    }

    pub fn precedence(&self, g: &Grammar) -> Option<Precedence> {
        self.precedence_sym.and_then(|sym| g.symbol(sym).precedence())
    }

    pub fn lineno(&self) -> u32 {
        self.lineno
    }

    pub fn display<'g>(&'g self, g: &'g Grammar) -> impl fmt::Display + 'g {
        crate::util::display_fn(|f| {
            write!(f, "{} -> ", g.symbol(self.lhs))?;
            if self.rhs.is_empty() {
                f.write_str("ε")?;
            } else {
                for (i, s) in self.rhs.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{}", g.symbol(*s))?;
                }
            }
            Ok(())
        })
    }
}
