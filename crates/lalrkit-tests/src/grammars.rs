//! Grammar definitions for integration tests.

use lalrkit::grammar::{GrammarDef, GrammarError};

pub type Fixture = fn(&mut GrammarDef) -> Result<(), GrammarError>;

/// Every fixture with its name, for the tests that run over all of them.
pub const ALL: &[(&str, Fixture)] = &[
    ("g_simple1", g_simple1),
    ("g_simple2", g_simple2),
    ("g1", g1),
    ("g2", g2),
    ("g4", g4),
    ("ambiguous_sum", ambiguous_sum),
    ("arithmetic_prec", arithmetic_prec),
    ("comparison_nonassoc", comparison_nonassoc),
    ("dangling_else", dangling_else),
    ("lr1_not_lalr1", lr1_not_lalr1),
    ("nullable_lists", nullable_lists),
    ("min_caml", min_caml),
];

pub fn g_simple1(g: &mut GrammarDef) -> Result<(), GrammarError> {
    for token in ["EQUAL", "PLUS", "ID", "NUM"] {
        g.terminal(token)?;
    }
    g.start_symbol("A")?;

    g.rule("A", &["E", "EQUAL", "E"]);
    g.rule("A", &["ID"]);
    g.rule("E", &["E", "PLUS", "T"]);
    g.rule("E", &["T"]);
    g.rule("T", &["NUM"]);
    g.rule("T", &["ID"]);
    Ok(())
}

pub fn g_simple2(g: &mut GrammarDef) -> Result<(), GrammarError> {
    // declare terminal symbols.
    for token in ["LPAREN", "RPAREN", "PLUS", "MINUS", "STAR", "SLASH", "NUM"] {
        g.terminal(token)?;
    }
    g.start_symbol("EXPR")?;

    g.rule("EXPR", &["EXPR", "PLUS", "FACTOR"]);
    g.rule("EXPR", &["EXPR", "MINUS", "FACTOR"]);
    g.rule("EXPR", &["FACTOR"]);
    g.rule("FACTOR", &["FACTOR", "STAR", "TERM"]);
    g.rule("FACTOR", &["FACTOR", "SLASH", "TERM"]);
    g.rule("FACTOR", &["TERM"]);
    g.rule("TERM", &["NUM"]);
    g.rule("TERM", &["LPAREN", "EXPR", "RPAREN"]);
    Ok(())
}

pub fn g1(g: &mut GrammarDef) -> Result<(), GrammarError> {
    for token in ["PLUS", "STAR", "A"] {
        g.terminal(token)?;
    }
    g.rule("E", &["E", "PLUS", "T"]);
    g.rule("E", &["T"]);
    g.rule("T", &["T", "STAR", "A"]);
    g.rule("T", &["A"]);
    Ok(())
}

/// Not LALR(1): merging the two `ID` states makes `TYPE` and `NAME` collide on `COMMA`.
pub fn g2(g: &mut GrammarDef) -> Result<(), GrammarError> {
    for token in ["COMMA", "COLON", "ID"] {
        g.terminal(token)?;
    }
    g.rule("DEF", &["PARAM_SPEC", "RETURN_SPEC", "COMMA"]);
    g.rule("PARAM_SPEC", &["TYPE"]);
    g.rule("PARAM_SPEC", &["NAME_LIST", "COLON", "TYPE"]);
    g.rule("RETURN_SPEC", &["TYPE"]);
    g.rule("RETURN_SPEC", &["NAME", "COLON", "TYPE"]);
    g.rule("TYPE", &["ID"]);
    g.rule("NAME", &["ID"]);
    g.rule("NAME_LIST", &["NAME"]);
    g.rule("NAME_LIST", &["NAME", "COMMA", "NAME_LIST"]);
    Ok(())
}

pub fn g4(g: &mut GrammarDef) -> Result<(), GrammarError> {
    for token in ["PLUS", "LPAREN", "RPAREN", "NUM"] {
        g.terminal(token)?;
    }
    // E → E + T | T
    // T → ( E ) | n
    g.rule("E", &["E", "PLUS", "T"]);
    g.rule("E", &["T"]);
    g.rule("T", &["LPAREN", "E", "RPAREN"]);
    g.rule("T", &["NUM"]);
    Ok(())
}

/// `E → E '+' E | NUM` without precedence: one shift/reduce conflict.
pub fn ambiguous_sum(g: &mut GrammarDef) -> Result<(), GrammarError> {
    g.terminal("NUM")?;
    g.rule("E", &["E", "'+'", "E"]);
    g.rule("E", &["NUM"]);
    Ok(())
}

pub fn arithmetic_prec(g: &mut GrammarDef) -> Result<(), GrammarError> {
    g.terminal("NUM")?;
    g.left(&["'+'", "'-'"])?;
    g.left(&["'*'", "'/'"])?;
    g.right(&["'^'"])?;
    g.precedence(&["UMINUS"])?;

    g.rule("expr", &["expr", "'+'", "expr"]);
    g.rule("expr", &["expr", "'-'", "expr"]);
    g.rule("expr", &["expr", "'*'", "expr"]);
    g.rule("expr", &["expr", "'/'", "expr"]);
    g.rule("expr", &["expr", "'^'", "expr"]);
    g.rule("expr", &["'-'", "expr"]).prec("UMINUS");
    g.rule("expr", &["'('", "expr", "')'"]);
    g.rule("expr", &["NUM"]);
    Ok(())
}

pub fn comparison_nonassoc(g: &mut GrammarDef) -> Result<(), GrammarError> {
    g.terminal("NUM")?;
    g.nonassoc(&["'<'"])?;
    g.rule("cmp", &["cmp", "'<'", "cmp"]);
    g.rule("cmp", &["NUM"]);
    Ok(())
}

pub fn dangling_else(g: &mut GrammarDef) -> Result<(), GrammarError> {
    for token in ["IF", "THEN", "ELSE", "COND", "OTHER"] {
        g.terminal(token)?;
    }
    g.rule("stmt", &["IF", "COND", "THEN", "stmt"]);
    g.rule("stmt", &["IF", "COND", "THEN", "stmt", "ELSE", "stmt"]);
    g.rule("stmt", &["OTHER"]);
    Ok(())
}

/// LR(1) but not LALR(1). The reduce/reduce conflict vanishes with IELR(1).
pub fn lr1_not_lalr1(g: &mut GrammarDef) -> Result<(), GrammarError> {
    g.rule("S", &["'a'", "E", "'c'"]);
    g.rule("S", &["'a'", "F", "'d'"]);
    g.rule("S", &["'b'", "F", "'c'"]);
    g.rule("S", &["'b'", "E", "'d'"]);
    g.rule("E", &["'e'"]);
    g.rule("F", &["'e'"]);
    Ok(())
}

/// Nullable nonterminals in every position, exercising `reads` and `includes`.
pub fn nullable_lists(g: &mut GrammarDef) -> Result<(), GrammarError> {
    g.terminal("ID")?;
    g.terminal("VAR")?;
    g.rule("program", &["decls", "stmts", "opt_semi"]);
    g.rule("decls", &[]);
    g.rule("decls", &["decls", "decl"]);
    g.rule("decl", &["VAR", "ID", "opt_semi"]);
    g.rule("stmts", &[]);
    g.rule("stmts", &["stmts", "stmt"]);
    g.rule("stmt", &["ID", "'='", "ID", "opt_semi"]);
    g.rule("opt_semi", &[]);
    g.rule("opt_semi", &["';'"]);
    Ok(())
}

pub fn min_caml(g: &mut GrammarDef) -> Result<(), GrammarError> {
    for token in [
        "LPAREN",
        "RPAREN",
        "TRUE",
        "FALSE",
        "INTEGER",
        "FLOAT",
        "IDENT",
        "NOT",
        "PLUS",
        "PLUS_DOT",
        "MINUS",
        "MINUS_DOT",
        "STAR_DOT",
        "SLASH_DOT",
        "EQUAL",
        "LESS_GREATER",
        "LESS",
        "GREATER",
        "LESS_EQUAL",
        "GREATER_EQUAL",
        "LESS_MINUS",
        "COMMA",
        "SEMICOLON",
        "IF",
        "THEN",
        "ELSE",
        "LET",
        "REC",
        "IN",
        "ARRAY_MAKE",
        "DOT",
    ] {
        g.terminal(token)?;
    }
    g.start_symbol("EXPR")?;

    g.rule("SIMPLE_EXP", &["LPAREN", "EXPR", "RPAREN"]);
    g.rule("SIMPLE_EXP", &["LPAREN", "RPAREN"]);
    g.rule("SIMPLE_EXP", &["TRUE"]);
    g.rule("SIMPLE_EXP", &["FALSE"]);
    g.rule("SIMPLE_EXP", &["INTEGER"]);
    g.rule("SIMPLE_EXP", &["FLOAT"]);
    g.rule("SIMPLE_EXP", &["IDENT"]);
    g.rule("SIMPLE_EXP", &["SIMPLE_EXP", "DOT", "LPAREN", "EXPR", "RPAREN"]);

    g.rule("APP_EXP", &["SIMPLE_EXP"]);
    g.rule("APP_EXP", &["SIMPLE_EXP", "ACTUAL_ARGS"]);
    g.rule("APP_EXP", &["ARRAY_MAKE", "SIMPLE_EXP", "SIMPLE_EXP"]);
    g.rule("APP_EXP", &["NOT", "APP_EXP"]);

    g.rule("NEG_EXP", &["APP_EXP"]);
    g.rule("NEG_EXP", &["MINUS", "NEG_EXP"]);
    g.rule("NEG_EXP", &["MINUS_DOT", "NEG_EXP"]);

    g.rule("MULT_EXP", &["NEG_EXP"]);
    g.rule("MULT_EXP", &["MULT_EXP", "STAR_DOT", "NEG_EXP"]);
    g.rule("MULT_EXP", &["MULT_EXP", "SLASH_DOT", "NEG_EXP"]);

    g.rule("ADD_EXP", &["MULT_EXP"]);
    for op in ["PLUS", "MINUS", "PLUS_DOT", "MINUS_DOT"] {
        g.rule("ADD_EXP", &["ADD_EXP", op, "MULT_EXP"]);
    }

    g.rule("REL_EXP", &["ADD_EXP"]);
    for op in [
        "EQUAL",
        "LESS_GREATER",
        "LESS",
        "GREATER",
        "LESS_EQUAL",
        "GREATER_EQUAL",
    ] {
        g.rule("REL_EXP", &["REL_EXP", op, "ADD_EXP"]);
    }

    g.rule("TUPLE_EXP", &["REL_EXP"]);
    g.rule("TUPLE_EXP", &["REL_EXP", "COMMA", "TUPLE_EXP_REST"]);
    g.rule("TUPLE_EXP_REST", &["REL_EXP"]);
    g.rule("TUPLE_EXP_REST", &["REL_EXP", "COMMA", "TUPLE_EXP_REST"]);

    g.rule("PUT_EXP", &["TUPLE_EXP"]);
    g.rule(
        "PUT_EXP",
        &["SIMPLE_EXP", "DOT", "LPAREN", "EXPR", "RPAREN", "LESS_MINUS", "EXPR"],
    );

    g.rule("IF_EXP", &["PUT_EXP"]);
    g.rule("IF_EXP", &["IF", "EXPR", "THEN", "EXPR", "ELSE", "EXPR"]);

    g.rule("LET_EXP", &["LET", "IDENT", "EQUAL", "EXPR", "IN", "EXPR"]);
    g.rule("LET_EXP", &["LET", "REC", "FUNDEF", "IN", "EXPR"]);
    g.rule(
        "LET_EXP",
        &["LET", "LPAREN", "PAT", "RPAREN", "EQUAL", "EXPR", "IN", "EXPR"],
    );

    g.rule("FUNDEF", &["IDENT", "FORMAL_ARGS", "EQUAL", "EXPR"]);
    g.rule("FORMAL_ARGS", &["IDENT", "FORMAL_ARGS"]);
    g.rule("FORMAL_ARGS", &["IDENT"]);
    g.rule("ACTUAL_ARGS", &["ACTUAL_ARGS", "SIMPLE_EXP"]);
    g.rule("ACTUAL_ARGS", &["SIMPLE_EXP"]);
    g.rule("PAT", &["PAT", "COMMA", "IDENT"]);
    g.rule("PAT", &["IDENT", "COMMA", "IDENT"]);

    g.rule("EXPR", &["IF_EXP"]);
    g.rule("EXPR", &["IF_EXP", "SEMICOLON", "EXPR"]);
    g.rule("EXPR", &["LET_EXP"]);
    Ok(())
}
