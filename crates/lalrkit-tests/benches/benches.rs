use criterion::{criterion_group, criterion_main, Criterion};
use lalrkit::{
    grammar::Grammar,
    states::{Config, States},
};
use lalrkit_tests::grammars::{self, Fixture};
use std::hint::black_box;

criterion_main!(benches);
criterion_group!(benches, bench_simple, bench_non_lalr, bench_min_caml);

fn bench_simple(c: &mut Criterion) {
    bench_states_gen(c, "g_simple1", grammars::g_simple1);
    bench_states_gen(c, "g_simple2", grammars::g_simple2);
    bench_states_gen(c, "g1", grammars::g1);
    bench_states_gen(c, "g4", grammars::g4);
}

fn bench_non_lalr(c: &mut Criterion) {
    bench_states_gen(c, "g2", grammars::g2);
    bench_states_gen(c, "lr1_not_lalr1", grammars::lr1_not_lalr1);
}

fn bench_min_caml(c: &mut Criterion) {
    bench_states_gen(c, "min_caml", grammars::min_caml);
}

fn bench_states_gen(c: &mut Criterion, name: &str, f: Fixture) {
    let grammar = match Grammar::define(f) {
        Ok(grammar) => grammar,
        Err(err) => panic!("invalid fixture {}: {}", name, err),
    };
    c.bench_function(&format!("{}/lalr", name), |b| {
        b.iter(|| {
            let _states = black_box(States::generate_with_config(&grammar, Config::new().use_lalr()));
        });
    });
    c.bench_function(&format!("{}/ielr", name), |b| {
        b.iter(|| {
            let _states = black_box(States::generate_with_config(&grammar, Config::new().use_ielr()));
        });
    });
}
