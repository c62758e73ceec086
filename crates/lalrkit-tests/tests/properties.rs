use lalrkit::{
    counterexamples::{Counterexamples, Path},
    grammar::{Grammar, RuleID, SymbolID, SymbolSet},
    states::{Config, Item, Resolution, States},
    validator::{GrammarValidator, ValidationError},
};
use lalrkit_tests::grammars;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn sym(g: &Grammar, name: &str) -> SymbolID {
    match g.find_symbol_by_name(name) {
        Some(symbol) => symbol.id(),
        None => panic!("no symbol named {}", name),
    }
}

/// FOLLOW sets by the textbook fixed point, indexed by symbol number.
fn naive_follow_sets(g: &Grammar) -> Vec<SymbolSet> {
    let mut follow = vec![SymbolSet::default(); g.symbols().len()];
    loop {
        let mut changed = false;
        for rule in g.rules() {
            let rhs = rule.rhs();
            for (i, &sym) in rhs.iter().enumerate() {
                if g.is_terminal(sym) {
                    continue;
                }
                let mut added = SymbolSet::default();
                let mut rest_nullable = true;
                for &next in &rhs[i + 1..] {
                    added.union_with(g.symbol(next).first_set());
                    if !g.symbol(next).nullable() {
                        rest_nullable = false;
                        break;
                    }
                }
                if rest_nullable {
                    added.union_with(&follow[rule.lhs().index()]);
                }
                if !added.is_subset(&follow[sym.index()]) {
                    follow[sym.index()].union_with(&added);
                    changed = true;
                }
            }
        }
        if !changed {
            return follow;
        }
    }
}

#[test]
fn lookaheads_are_within_follow_sets() -> anyhow::Result<()> {
    init_tracing();
    for (name, fixture) in grammars::ALL {
        let g = Grammar::define(*fixture)?;
        let follow = naive_follow_sets(&g);
        for config in [Config::new().use_lalr().clone(), Config::new().use_ielr().clone()] {
            let states = States::generate_with_config(&g, &config);
            for (key, la) in states.la() {
                let lhs = g.rule(key.rule).lhs();
                for t in la {
                    assert!(
                        follow[lhs.index()].contains(t),
                        "{}: LA{:?} has {:?} outside FOLLOW({})",
                        name,
                        key,
                        t,
                        g.symbol(lhs)
                    );
                }
            }
        }
    }
    Ok(())
}

#[test]
fn generation_is_idempotent() -> anyhow::Result<()> {
    for (name, fixture) in grammars::ALL {
        let g = Grammar::define(*fixture)?;
        let first = States::generate(&g).display(&g).to_string();
        let second = States::generate(&g).display(&g).to_string();
        assert_eq!(first, second, "{}", name);

        let mut states = States::generate(&g);
        states.compute(&g);
        assert_eq!(states.display(&g).to_string(), first, "{}", name);
    }
    Ok(())
}

#[test]
fn conflict_free_grammars_get_default_reductions() -> anyhow::Result<()> {
    for fixture in [grammars::g_simple1, grammars::g_simple2, grammars::g1, grammars::g4] {
        let g = Grammar::define(fixture)?;
        let states = States::generate(&g);
        assert_eq!(states.sr_conflicts_count(), 0);
        assert_eq!(states.rr_conflicts_count(), 0);
        for state in states.states() {
            if !state.reduces().is_empty() && !state.has_error_shift() {
                assert!(state.default_reduction_rule().is_some(), "{:?}", state.id());
            }
        }

        let ielr = States::generate_with_config(&g, Config::new().use_ielr());
        assert_eq!(ielr.states_count(), states.states_count());
    }
    Ok(())
}

#[test]
fn ambiguous_sum_has_one_shift_reduce_conflict() -> anyhow::Result<()> {
    let g = Grammar::define(grammars::ambiguous_sum)?;
    let states = States::generate(&g);
    assert_eq!(states.sr_conflicts_count(), 1);
    assert_eq!(states.rr_conflicts_count(), 0);

    let g = Grammar::define(|g| {
        grammars::ambiguous_sum(g)?;
        g.left(&["'+'"])
    })?;
    let states = States::generate(&g);
    assert_eq!(states.sr_conflicts_count(), 0);

    let plus = sym(&g, "'+'");
    let resolved: Vec<_> = states
        .states()
        .iter()
        .flat_map(|s| s.resolved_conflicts())
        .collect();
    assert_eq!(resolved.len(), 1);
    assert_eq!(resolved[0].symbol, plus);
    assert_eq!(resolved[0].which, Resolution::Reduce);
    assert!(resolved[0].same_prec);
    assert_eq!(
        resolved[0].report_message(&g),
        "Conflict between rule 1 and token '+' resolved as reduce (%left '+')."
    );
    Ok(())
}

#[test]
fn precedence_and_associativity() -> anyhow::Result<()> {
    let g = Grammar::define(grammars::arithmetic_prec)?;
    let states = States::generate(&g);
    assert_eq!(states.sr_conflicts_count(), 0);
    assert_eq!(states.rr_conflicts_count(), 0);

    let resolved: Vec<_> = states
        .states()
        .iter()
        .flat_map(|s| s.resolved_conflicts())
        .collect();
    let find = |rule: u16, token: &str| {
        let token = sym(&g, token);
        resolved
            .iter()
            .find(|r| r.reduce == RuleID::from_raw(rule) && r.symbol == token)
            .copied()
    };

    // `%right '^'` shifts on itself.
    let pow = find(5, "'^'").unwrap();
    assert_eq!(pow.which, Resolution::Shift);
    assert!(pow.same_prec);

    // `'*'` binds tighter than `'+'`.
    let sum_times = find(1, "'*'").unwrap();
    assert_eq!(sum_times.which, Resolution::Shift);
    assert!(!sum_times.same_prec);
    let times_sum = find(3, "'+'").unwrap();
    assert_eq!(times_sum.which, Resolution::Reduce);

    // Unary minus takes the precedence of `UMINUS` through `%prec`.
    let neg_pow = find(6, "'^'").unwrap();
    assert_eq!(neg_pow.which, Resolution::Reduce);
    assert!(!neg_pow.same_prec);

    // The losing actions are kept but marked.
    let state = states
        .states()
        .iter()
        .find(|s| s.resolved_conflicts().contains(pow))
        .unwrap();
    let reduce = state.reduce(RuleID::from_raw(5)).unwrap();
    assert!(reduce.not_selected().contains(sym(&g, "'^'")));
    assert!(!reduce.selected_lookahead().contains(sym(&g, "'^'")));
    Ok(())
}

#[test]
fn nonassoc_resolves_as_error() -> anyhow::Result<()> {
    let g = Grammar::define(grammars::comparison_nonassoc)?;
    let states = States::generate(&g);
    assert_eq!(states.sr_conflicts_count(), 0);

    let lt = sym(&g, "'<'");
    let state = states
        .states()
        .iter()
        .find(|s| !s.resolved_conflicts().is_empty())
        .unwrap();
    let resolved = &state.resolved_conflicts()[0];
    assert_eq!(resolved.which, Resolution::Error);
    assert_eq!(resolved.symbol, lt);

    let shift = state.shifts().iter().find(|s| s.symbol() == lt).unwrap();
    assert!(shift.is_not_selected());
    let reduce = state.reduce(RuleID::from_raw(1)).unwrap();
    assert!(reduce.not_selected().contains(lt));
    assert!(!reduce.selected_lookahead().contains(lt));
    Ok(())
}

#[test]
fn expect_mismatch_fails_validation() -> anyhow::Result<()> {
    init_tracing();
    let g = Grammar::define(|g| {
        g.expect(0);
        grammars::ambiguous_sum(g)
    })?;
    let states = States::generate(&g);
    let result = GrammarValidator::new(&g, &states).validate();
    assert_eq!(
        result,
        Err(ValidationError::ShiftReduceConflicts {
            found: 1,
            expected: 0
        })
    );

    let g = Grammar::define(|g| {
        g.expect(1);
        grammars::ambiguous_sum(g)
    })?;
    let states = States::generate(&g);
    GrammarValidator::new(&g, &states).validate()?;
    Ok(())
}

#[test]
fn ielr_splits_states_of_non_lalr_grammars() -> anyhow::Result<()> {
    init_tracing();
    for fixture in [grammars::lr1_not_lalr1, grammars::g2] {
        let g = Grammar::define(fixture)?;
        let lalr = States::generate_with_config(&g, Config::new().use_lalr());
        assert_eq!(lalr.rr_conflicts_count(), 1);

        let ielr = States::generate_with_config(&g, Config::new().use_ielr());
        assert_eq!(ielr.sr_conflicts_count(), 0);
        assert_eq!(ielr.rr_conflicts_count(), 0);
        assert_eq!(ielr.states_count(), lalr.states_count() + 1);

        for state in ielr.states() {
            let core = ielr.state(state.lalr_isocore());
            assert_eq!(state.kernels(), core.kernels());
            for (sym, next) in state.transitions() {
                assert_eq!(ielr.state(*next).accessing_symbol(), Some(*sym));
                assert!(ielr.state(*next).predecessors().contains(&state.id()));
            }
        }
    }
    Ok(())
}

#[test]
fn ielr_is_requested_by_define() -> anyhow::Result<()> {
    let g = Grammar::define(|g| {
        g.define("lr.type", "ielr");
        grammars::lr1_not_lalr1(g)
    })?;
    let states = States::generate(&g);
    assert_eq!(states.rr_conflicts_count(), 0);
    Ok(())
}

#[test]
fn dangling_else_counterexample() -> anyhow::Result<()> {
    init_tracing();
    let g = Grammar::define(grammars::dangling_else)?;
    let states = States::generate(&g);
    assert_eq!(states.sr_conflicts_count(), 1);

    let conflict_state = states
        .states()
        .iter()
        .find(|s| s.has_conflicts())
        .map(|s| s.id())
        .unwrap();
    let examples = Counterexamples::new(&g, &states).compute(conflict_state);
    assert_eq!(examples.len(), 1);

    let example = &examples[0];
    assert_eq!(example.conflict_symbol(), sym(&g, "ELSE"));
    // stmt -> IF COND THEN stmt • ELSE stmt
    assert_eq!(example.path1_item(), Some(Item::new(RuleID::from_raw(2), 4)));
    // stmt -> IF COND THEN stmt •
    assert_eq!(example.path2_item(), Some(Item::new(RuleID::from_raw(1), 4)));

    let reduce_path = example.path2().unwrap();
    assert!(matches!(reduce_path[0], Path::Start { .. }));
    // The reduction needs ELSE in its lookahead, so the path goes through
    // an enclosing if-statement.
    let nested_ifs = reduce_path
        .iter()
        .filter(|p| p.is_production() && p.to().item.rule == RuleID::from_raw(2))
        .count();
    assert_eq!(nested_ifs, 1);

    for derivation in [example.derivation1().unwrap(), example.derivation2().unwrap()] {
        let lines = derivation.render(&g);
        eprintln!("{}", lines.join("\n"));
        assert!(lines.iter().any(|line| line.contains("ELSE")));
    }
    Ok(())
}
