use criterion::{Criterion, black_box, criterion_group, criterion_main};

use pcfg_sampler::earley::Earley;
use pcfg_sampler::grammar::Wcfg;
use pcfg_sampler::nederhof::Nederhof;
use pcfg_sampler::reader::parse_bar_str;
use pcfg_sampler::rules::Symbol;
use pcfg_sampler::wfsa::{Wfsa, make_linear_fsa};
use pcfg_sampler::Intersect;

const GRAMMAR_SRC: &str = r"[S] ||| [S] [S] ||| 0.3
[S] ||| [A] ||| 0.45
[S] ||| x ||| 0.25
[A] ||| x x ||| 0.8
[A] ||| x ||| 0.2";

fn intersect_earley(wcfg: &Wcfg, fsa: &Wfsa) -> usize {
  Earley::new(wcfg, fsa)
    .intersect(&Symbol::nonterminal("S"), &Symbol::nonterminal("GOAL"))
    .unwrap()
    .len()
}

fn intersect_nederhof(wcfg: &Wcfg, fsa: &Wfsa) -> usize {
  Nederhof::new(wcfg, fsa)
    .intersect(&Symbol::nonterminal("S"), &Symbol::nonterminal("GOAL"))
    .unwrap()
    .len()
}

fn criterion_benchmark(c: &mut Criterion) {
  let wcfg = parse_bar_str(GRAMMAR_SRC, f64::ln).unwrap();
  let tokens: Vec<String> = "x x x x x x x x"
    .split(' ')
    .map(|t| t.to_string())
    .collect();
  let fsa = make_linear_fsa(&tokens);

  c.bench_function("intersect earley", |b| {
    b.iter(|| intersect_earley(black_box(&wcfg), black_box(&fsa)))
  });

  c.bench_function("intersect nederhof", |b| {
    b.iter(|| intersect_nederhof(black_box(&wcfg), black_box(&fsa)))
  });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
