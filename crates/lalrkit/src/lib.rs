//! LALR(1) and IELR(1) automaton construction for context-free grammars.

pub mod counterexamples;
pub mod digraph;
pub mod grammar;
pub mod states;
pub mod types;
pub mod validator;

mod util;
