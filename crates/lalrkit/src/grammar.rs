//! Grammar types.

mod rule;
mod symbol;

pub use self::{
    rule::{Rule, RuleID},
    symbol::{Assoc, Precedence, Symbol, SymbolID, SymbolSet},
};

use self::symbol::{char_literal_token_id, is_char_literal};
use crate::{
    types::{Map, Set},
    util::display_fn,
};
use std::fmt;

const EOF_NAME: &str = "YYEOF";
const ERROR_NAME: &str = "YYerror";
const UNDEF_NAME: &str = "YYUNDEF";
const ACCEPT_NAME: &str = "$accept";

/// The first token number given to terminals that are not character literals.
const FIRST_TOKEN_ID: u32 = 256;

/// A prepared context-free grammar.
///
/// Symbols are numbered, and the nullability and FIRST sets are computed,
/// before a `Grammar` is handed out.
#[derive(Debug)]
pub struct Grammar {
    symbols: Vec<Symbol>,
    rules: Vec<Rule>,
    num_terminals: usize,
    start_symbol: SymbolID,
    sym_to_rules: Map<SymbolID, Vec<RuleID>>,
    expect: Option<usize>,
    expect_rr: Option<usize>,
    variables: Map<String, String>,
}

impl Grammar {
    /// Define a grammar using the specified function.
    pub fn define<F>(f: F) -> Result<Self, GrammarError>
    where
        F: FnOnce(&mut GrammarDef) -> Result<(), GrammarError>,
    {
        let mut def = GrammarDef::default();
        f(&mut def)?;
        def.end()
    }

    /// All symbols, indexed by their number.
    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    pub fn symbol(&self, id: SymbolID) -> &Symbol {
        &self.symbols[id.index()]
    }

    pub fn terminals(&self) -> &[Symbol] {
        &self.symbols[..self.num_terminals]
    }

    pub fn nonterminals(&self) -> &[Symbol] {
        &self.symbols[self.num_terminals..]
    }

    pub fn is_terminal(&self, id: SymbolID) -> bool {
        self.symbol(id).is_terminal()
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn rule(&self, id: RuleID) -> &Rule {
        &self.rules[id.index()]
    }

    /// The rules whose left-hand side is `symbol`, in definition order.
    pub fn rules_by_symbol(&self, symbol: SymbolID) -> &[RuleID] {
        self.sym_to_rules.get(&symbol).map_or(&[], |rules| &rules[..])
    }

    pub fn accept_symbol(&self) -> SymbolID {
        self.rule(RuleID::ACCEPT).lhs()
    }

    pub fn start_symbol(&self) -> SymbolID {
        self.start_symbol
    }

    /// Look up a symbol by its name or its alias.
    pub fn find_symbol_by_name(&self, name: &str) -> Option<&Symbol> {
        self.symbols
            .iter()
            .find(|s| s.name == name)
            .or_else(|| self.symbols.iter().find(|s| s.alias() == Some(name)))
    }

    /// The number of shift/reduce conflicts declared by `%expect`.
    pub fn expect(&self) -> Option<usize> {
        self.expect
    }

    /// The number of reduce/reduce conflicts declared by `%expect-rr`.
    pub fn expect_rr(&self) -> Option<usize> {
        self.expect_rr
    }

    pub fn variable(&self, key: &str) -> Option<&str> {
        self.variables.get(key).map(String::as_str)
    }

    /// Whether `%define lr.type ielr` is specified.
    pub fn ielr_defined(&self) -> bool {
        self.variable("lr.type") == Some("ielr")
    }

    /// Nonterminal symbols that never appear on a right-hand side.
    pub fn unused_nonterminals(&self) -> Vec<SymbolID> {
        let used: Set<SymbolID> = self
            .rules
            .iter()
            .flat_map(|rule| rule.rhs.iter().copied())
            .collect();
        self.nonterminals()
            .iter()
            .filter(|s| s.token_id != 0 && !used.contains(&s.id))
            .map(|s| s.id)
            .collect()
    }

    /// Check the structural invariants of the grammar.
    pub fn validate(&self) -> Result<(), GrammarError> {
        self.validate_symbol_number_uniqueness()?;
        self.validate_symbol_alias_name_uniqueness()?;
        self.validate_rule_lhs_is_nonterminal()?;
        Ok(())
    }

    fn validate_symbol_number_uniqueness(&self) -> Result<(), GrammarError> {
        let mut numbers = Map::<SymbolID, Vec<&str>>::default();
        for symbol in &self.symbols {
            numbers.entry(symbol.id).or_default().push(&symbol.name);
        }
        match numbers.into_iter().find(|(_, names)| names.len() > 1) {
            Some((id, names)) => Err(GrammarError::DuplicatedNumber {
                number: id.into_raw(),
                names: names.into_iter().map(ToOwned::to_owned).collect(),
            }),
            None => Ok(()),
        }
    }

    fn validate_symbol_alias_name_uniqueness(&self) -> Result<(), GrammarError> {
        let mut aliases = Map::<&str, Vec<&str>>::default();
        for symbol in &self.symbols {
            if let Some(alias) = symbol.alias() {
                aliases.entry(alias).or_default().push(&symbol.name);
            }
        }
        match aliases.into_iter().find(|(_, names)| names.len() > 1) {
            Some((alias, names)) => Err(GrammarError::DuplicatedAlias {
                alias: alias.to_owned(),
                names: names.into_iter().map(ToOwned::to_owned).collect(),
            }),
            None => Ok(()),
        }
    }

    fn validate_rule_lhs_is_nonterminal(&self) -> Result<(), GrammarError> {
        for rule in &self.rules {
            let lhs = self.symbol(rule.lhs);
            if lhs.is_terminal() {
                return Err(GrammarError::TerminalLhs {
                    rule: rule.id,
                    name: lhs.name.clone(),
                    lineno: rule.lineno,
                });
            }
        }
        Ok(())
    }

    /// A rule is nullable if all of its right-hand side symbols are nullable,
    /// and a nonterminal is nullable if one of its rules is.
    ///
    /// Each status only moves from unknown to known, so the loop stops once a
    /// pass settles nothing new. Whatever is still unknown is not nullable.
    fn compute_nullable(&mut self) {
        let mut rule_status: Vec<Option<bool>> = vec![None; self.rules.len()];
        let mut symbol_status: Vec<Option<bool>> = self
            .symbols
            .iter()
            .map(|s| if s.is_terminal { Some(false) } else { None })
            .collect();

        let count_unknown = |rules: &[Option<bool>], symbols: &[Option<bool>]| {
            rules.iter().chain(symbols).filter(|s| s.is_none()).count()
        };

        loop {
            let before = count_unknown(&rule_status, &symbol_status);

            for (status, rule) in rule_status.iter_mut().zip(&self.rules) {
                if status.is_some() {
                    continue;
                }
                if rule.rhs.is_empty() {
                    *status = Some(true);
                } else if rule.rhs.iter().any(|s| self.symbols[s.index()].is_terminal) {
                    *status = Some(false);
                } else if rule
                    .rhs
                    .iter()
                    .all(|s| symbol_status[s.index()] == Some(true))
                {
                    *status = Some(true);
                } else if rule
                    .rhs
                    .iter()
                    .any(|s| symbol_status[s.index()] == Some(false))
                {
                    *status = Some(false);
                }
            }

            for symbol in &self.symbols[self.num_terminals..] {
                let slot = symbol.id.index();
                if symbol_status[slot].is_some() {
                    continue;
                }
                let rules = self.sym_to_rules.get(&symbol.id).map_or(&[][..], |r| &r[..]);
                if rules.iter().any(|r| rule_status[r.index()] == Some(true)) {
                    symbol_status[slot] = Some(true);
                } else if rules.iter().all(|r| rule_status[r.index()] == Some(false)) {
                    symbol_status[slot] = Some(false);
                }
            }

            if count_unknown(&rule_status, &symbol_status) == before {
                break;
            }
        }

        for (rule, status) in self.rules.iter_mut().zip(rule_status) {
            rule.nullable = status.unwrap_or(false);
        }
        for (symbol, status) in self.symbols.iter_mut().zip(symbol_status) {
            symbol.nullable = status.unwrap_or(false);
        }
    }

    fn compute_first_set(&mut self) {
        let mut first_sets: Vec<SymbolSet> = self
            .symbols
            .iter()
            .map(|s| {
                if s.is_terminal {
                    Some(s.id).into_iter().collect()
                } else {
                    SymbolSet::default()
                }
            })
            .collect();

        loop {
            let mut changed = false;
            for rule in &self.rules {
                for &sym in &rule.rhs {
                    let lhs = rule.lhs.index();
                    if sym.index() != lhs && !first_sets[sym.index()].is_subset(&first_sets[lhs]) {
                        let added = first_sets[sym.index()].clone();
                        first_sets[lhs].union_with(&added);
                        changed = true;
                    }
                    if !self.symbols[sym.index()].nullable {
                        break;
                    }
                }
            }
            if !changed {
                break;
            }
        }

        for (symbol, first_set) in self.symbols.iter_mut().zip(first_sets) {
            symbol.first_set = first_set;
        }
    }
}

impl fmt::Display for Grammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#### terminals: ")?;
        for (i, t) in self.terminals().iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", t)?;
        }
        writeln!(f)?;

        write!(f, "#### nonterminals: ")?;
        for (i, n) in self.nonterminals().iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", n)?;
        }
        writeln!(f)?;

        writeln!(f, "#### rules:")?;
        for rule in &self.rules {
            writeln!(f, "- [{}] {}", rule.id, rule.display(self))?;
        }
        Ok(())
    }
}

impl Grammar {
    pub fn display_symbols<'g>(&'g self, symbols: &'g [SymbolID]) -> impl fmt::Display + 'g {
        display_fn(move |f| {
            for (i, s) in symbols.iter().enumerate() {
                if i > 0 {
                    f.write_str(" ")?;
                }
                write!(f, "{}", self.symbol(*s))?;
            }
            Ok(())
        })
    }
}

/// The contextual values for building a `Grammar`.
#[derive(Debug, Default)]
pub struct GrammarDef {
    terminals: Map<String, TerminalDecl>,
    nonterminals: Set<String>,
    next_priority: u16,
    rules: Vec<RuleDef>,
    start: Option<String>,
    expect: Option<usize>,
    expect_rr: Option<usize>,
    variables: Map<String, String>,
}

#[derive(Debug, Default)]
struct TerminalDecl {
    alias: Option<String>,
    token_id: Option<u32>,
    precedence: Option<Precedence>,
}

/// A rule under construction, returned by [`GrammarDef::rule`].
#[derive(Debug)]
pub struct RuleDef {
    lhs: String,
    rhs: Vec<String>,
    prec: Option<String>,
    lineno: u32,
}

impl RuleDef {
    /// Take the precedence of `symbol` instead of the last terminal (`%prec`).
    pub fn prec(&mut self, symbol: &str) -> &mut Self {
        self.prec = Some(symbol.to_owned());
        self
    }

    pub fn lineno(&mut self, lineno: u32) -> &mut Self {
        self.lineno = lineno;
        self
    }
}

impl GrammarDef {
    /// Declare a terminal symbol used in this grammar.
    ///
    /// Declaring the same name again is allowed and has no effect.
    pub fn terminal(&mut self, name: &str) -> Result<(), GrammarError> {
        self.terminal_with(name, None, None)
    }

    /// Declare a terminal symbol with an alias and/or an explicit token number.
    pub fn terminal_with(
        &mut self,
        name: &str,
        alias: Option<&str>,
        token_id: Option<u32>,
    ) -> Result<(), GrammarError> {
        verify_symbol_name(name)?;
        let decl = self.terminals.entry(name.to_owned()).or_default();
        if let Some(alias) = alias {
            decl.alias = Some(alias.to_owned());
        }
        if token_id.is_some() {
            decl.token_id = token_id;
        }
        Ok(())
    }

    /// Declare a nonterminal symbol used in this grammar.
    ///
    /// Left-hand sides of rules are declared implicitly; this is only needed
    /// to fix the numbering order.
    pub fn nonterminal(&mut self, name: &str) -> Result<(), GrammarError> {
        if is_char_literal(name) || !verify_ident(name) {
            return Err(GrammarError::InvalidName { name: name.into() });
        }
        self.nonterminals.insert(name.to_owned());
        Ok(())
    }

    /// `%left`
    pub fn left(&mut self, symbols: &[&str]) -> Result<(), GrammarError> {
        self.declare_precedence(Assoc::Left, symbols)
    }

    /// `%right`
    pub fn right(&mut self, symbols: &[&str]) -> Result<(), GrammarError> {
        self.declare_precedence(Assoc::Right, symbols)
    }

    /// `%nonassoc`
    pub fn nonassoc(&mut self, symbols: &[&str]) -> Result<(), GrammarError> {
        self.declare_precedence(Assoc::Nonassoc, symbols)
    }

    /// `%precedence`
    pub fn precedence(&mut self, symbols: &[&str]) -> Result<(), GrammarError> {
        self.declare_precedence(Assoc::Precedence, symbols)
    }

    fn declare_precedence(&mut self, assoc: Assoc, symbols: &[&str]) -> Result<(), GrammarError> {
        let precedence = Precedence::new(self.next_priority, assoc);
        self.next_priority += 1;
        for name in symbols {
            verify_symbol_name(name)?;
            self.terminals
                .entry((*name).to_owned())
                .or_default()
                .precedence = Some(precedence);
        }
        Ok(())
    }

    /// Specify a production rule into this grammar.
    pub fn rule(&mut self, lhs: &str, rhs: &[&str]) -> &mut RuleDef {
        let index = self.rules.len();
        self.rules.push(RuleDef {
            lhs: lhs.to_owned(),
            rhs: rhs.iter().map(|s| (*s).to_owned()).collect(),
            prec: None,
            lineno: 0,
        });
        &mut self.rules[index]
    }

    /// Specify the start symbol for this grammar.
    ///
    /// The left-hand side of the first rule is used if not specified.
    pub fn start_symbol(&mut self, name: &str) -> Result<(), GrammarError> {
        self.start.replace(name.to_owned());
        Ok(())
    }

    /// `%expect N`
    pub fn expect(&mut self, count: usize) {
        self.expect = Some(count);
    }

    /// `%expect-rr N`
    pub fn expect_rr(&mut self, count: usize) {
        self.expect_rr = Some(count);
    }

    /// `%define key value`
    pub fn define(&mut self, key: &str, value: &str) {
        self.variables.insert(key.to_owned(), value.to_owned());
    }

    #[tracing::instrument(skip_all)]
    fn end(self) -> Result<Grammar, GrammarError> {
        if self.rules.is_empty() {
            return Err(GrammarError::EmptyGrammar);
        }

        let mut table = SymbolTable::default();

        // Terminals come first: the reserved ones, the declared ones, and then
        // the character literals that appear only in rules.
        table.add_terminal(EOF_NAME, Some("$end"), Some(0), None)?;
        table.add_terminal(ERROR_NAME, Some("error"), None, None)?;
        table.add_terminal(UNDEF_NAME, Some("$undefined"), None, None)?;
        for (name, decl) in &self.terminals {
            table.add_terminal(name, decl.alias.as_deref(), decl.token_id, decl.precedence)?;
        }
        for rule in &self.rules {
            for name in rule.rhs.iter().chain(&rule.prec) {
                if is_char_literal(name) && table.find(name).is_none() {
                    table.add_terminal(name, None, None, None)?;
                }
            }
        }
        table.num_terminals = table.symbols.len();

        table.add_nonterminal(ACCEPT_NAME)?;
        for name in &self.nonterminals {
            table.add_nonterminal(name)?;
        }
        for rule in &self.rules {
            if table.find(&rule.lhs).is_none() {
                if !verify_ident(&rule.lhs) {
                    return Err(GrammarError::InvalidName {
                        name: rule.lhs.clone(),
                    });
                }
                table.add_nonterminal(&rule.lhs)?;
            }
        }

        let start_name = self.start.as_deref().unwrap_or(&self.rules[0].lhs);
        let start_symbol = match table.find(start_name) {
            Some(id) if !table.symbols[id.index()].is_terminal => id,
            Some(..) => {
                return Err(GrammarError::InvalidStartSymbol {
                    name: start_name.to_owned(),
                })
            }
            None => {
                return Err(GrammarError::UndefinedSymbol {
                    name: start_name.to_owned(),
                })
            }
        };

        let mut rules = Vec::with_capacity(self.rules.len() + 1);
        let accept = table.resolve(ACCEPT_NAME)?;
        rules.push(table.new_rule(RuleID::ACCEPT, accept, vec![start_symbol, SymbolID::EOF], None, 0));
        for (i, def) in self.rules.iter().enumerate() {
            let id = u16::try_from(i + 1)
                .map(RuleID::from_raw)
                .map_err(|_| GrammarError::TooManyRules)?;
            let lhs = table.resolve(&def.lhs)?;
            let rhs = def
                .rhs
                .iter()
                .map(|name| table.resolve(name))
                .collect::<Result<Vec<_>, _>>()?;
            let prec = match &def.prec {
                Some(name) => Some(table.resolve(name)?),
                None => None,
            };
            rules.push(table.new_rule(id, lhs, rhs, prec, def.lineno));
        }

        let mut sym_to_rules = Map::<SymbolID, Vec<RuleID>>::default();
        for rule in &rules {
            sym_to_rules.entry(rule.lhs).or_default().push(rule.id);
        }

        let mut g = Grammar {
            num_terminals: table.num_terminals,
            symbols: table.symbols,
            rules,
            start_symbol,
            sym_to_rules,
            expect: self.expect,
            expect_rr: self.expect_rr,
            variables: self.variables,
        };
        g.compute_nullable();
        g.compute_first_set();
        g.validate()?;

        tracing::debug!(
            "prepared grammar: {} terminals, {} nonterminals, {} rules",
            g.terminals().len(),
            g.nonterminals().len(),
            g.rules.len()
        );

        Ok(g)
    }
}

#[derive(Default)]
struct SymbolTable {
    symbols: Vec<Symbol>,
    by_name: Map<String, SymbolID>,
    num_terminals: usize,
    next_token_id: u32,
    next_nonterminal_token_id: u32,
}

impl SymbolTable {
    fn find(&self, name: &str) -> Option<SymbolID> {
        self.by_name.get(name).copied().or_else(|| {
            self.symbols
                .iter()
                .find(|s| s.alias() == Some(name))
                .map(|s| s.id)
        })
    }

    fn resolve(&self, name: &str) -> Result<SymbolID, GrammarError> {
        self.find(name).ok_or_else(|| GrammarError::UndefinedSymbol {
            name: name.to_owned(),
        })
    }

    fn next_id(&self) -> Result<SymbolID, GrammarError> {
        u16::try_from(self.symbols.len())
            .map(SymbolID::from_raw)
            .map_err(|_| GrammarError::TooManySymbols)
    }

    fn push(&mut self, symbol: Symbol) {
        self.by_name.insert(symbol.name.clone(), symbol.id);
        self.symbols.push(symbol);
    }

    fn add_terminal(
        &mut self,
        name: &str,
        alias: Option<&str>,
        token_id: Option<u32>,
        precedence: Option<Precedence>,
    ) -> Result<(), GrammarError> {
        if self.by_name.contains_key(name) {
            return Ok(());
        }
        let id = self.next_id()?;
        let token_id = match token_id {
            Some(token_id) => token_id,
            None if is_char_literal(name) => char_literal_token_id(name).ok_or_else(|| {
                GrammarError::InvalidCharLiteral {
                    literal: name.to_owned(),
                }
            })?,
            None => {
                let token_id = FIRST_TOKEN_ID + self.next_token_id;
                self.next_token_id += 1;
                token_id
            }
        };
        self.push(Symbol {
            id,
            name: name.to_owned(),
            alias: alias.map(ToOwned::to_owned),
            is_terminal: true,
            token_id,
            nullable: false,
            precedence,
            first_set: SymbolSet::default(),
        });
        Ok(())
    }

    fn add_nonterminal(&mut self, name: &str) -> Result<(), GrammarError> {
        if self.by_name.contains_key(name) {
            return Ok(());
        }
        let id = self.next_id()?;
        let token_id = self.next_nonterminal_token_id;
        self.next_nonterminal_token_id += 1;
        self.push(Symbol {
            id,
            name: name.to_owned(),
            alias: None,
            is_terminal: false,
            token_id,
            nullable: false,
            precedence: None,
            first_set: SymbolSet::default(),
        });
        Ok(())
    }

    fn new_rule(
        &self,
        id: RuleID,
        lhs: SymbolID,
        rhs: Vec<SymbolID>,
        prec: Option<SymbolID>,
        lineno: u32,
    ) -> Rule {
        let precedence_sym = prec.or_else(|| {
            rhs.iter()
                .rev()
                .find(|s| self.symbols[s.index()].is_terminal)
                .copied()
        });
        Rule {
            id,
            lhs,
            rhs,
            nullable: false,
            precedence_sym,
            lineno,
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum GrammarError {
    #[error("symbol not found: `{name}'")]
    UndefinedSymbol { name: String },

    #[error("the left-hand side of rule {rule} (line: {lineno}) is a terminal `{name}'; it should be a nonterminal")]
    TerminalLhs {
        rule: RuleID,
        name: String,
        lineno: u32,
    },

    #[error("symbol number {number} is duplicated: {}", .names.join(", "))]
    DuplicatedNumber { number: u16, names: Vec<String> },

    #[error("symbol alias name {alias} is duplicated: {}", .names.join(", "))]
    DuplicatedAlias { alias: String, names: Vec<String> },

    #[error("incorrect symbol name: `{name}'")]
    InvalidName { name: String },

    #[error("unknown character literal: {literal}")]
    InvalidCharLiteral { literal: String },

    #[error("the start symbol `{name}' is not a nonterminal")]
    InvalidStartSymbol { name: String },

    #[error("the grammar has no rules")]
    EmptyGrammar,

    #[error("too many symbols")]
    TooManySymbols,

    #[error("too many rules")]
    TooManyRules,
}

fn verify_symbol_name(name: &str) -> Result<(), GrammarError> {
    if is_char_literal(name) {
        return match char_literal_token_id(name) {
            Some(..) => Ok(()),
            None => Err(GrammarError::InvalidCharLiteral {
                literal: name.to_owned(),
            }),
        };
    }
    if !verify_ident(name) {
        return Err(GrammarError::InvalidName { name: name.into() });
    }
    Ok(())
}

fn verify_ident(s: &str) -> bool {
    let mut chars = s.chars();
    let Some(first) = chars.next() else {
        // The identifier must not be empty.
        return false;
    };
    if !is_ident_start(first) {
        return false;
    }
    chars.all(is_ident_continue)
}

fn is_ident_start(ch: char) -> bool {
    ch == '_' || ch == '.' || unicode_ident::is_xid_start(ch)
}

fn is_ident_continue(ch: char) -> bool {
    ch == '.' || ch == '-' || unicode_ident::is_xid_continue(ch)
}
