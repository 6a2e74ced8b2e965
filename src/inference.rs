use std::collections::HashMap;

use crate::grammar::Wcfg;
use crate::rules::{Rule, Symbol};

/// The log-semiring sum: `ln(exp(a) + exp(b))` without leaving the log
/// domain. The semiring zero `-inf` is absorbed exactly.
pub fn logaddexp(a: f64, b: f64) -> f64 {
  if a == f64::NEG_INFINITY {
    return b;
  }
  if b == f64::NEG_INFINITY {
    return a;
  }
  let (hi, lo) = if a > b { (a, b) } else { (b, a) };
  hi + (lo - hi).exp().ln_1p()
}

/// Inside weights over a topologically sorted forest: for each node, the
/// log-sum-exp over its rules of the edge weight times the inside weights of
/// the RHS nonterminals. Terminals contribute the semiring one. The edge
/// weight function defaults to the rule's own log-prob in exact sampling;
/// the sliced pipeline substitutes the slice store's uniform view.
pub fn inside(
  forest: &Wcfg,
  sorted: &[Symbol],
  mut omega: impl FnMut(&Rule) -> f64,
) -> HashMap<Symbol, f64> {
  let mut table: HashMap<Symbol, f64> = HashMap::new();
  for node in sorted {
    let mut total = f64::NEG_INFINITY;
    for rule in forest.rules_for(node) {
      let mut weight = omega(rule);
      for sym in rule.rhs.iter() {
        if sym.is_nonterminal() {
          weight += table
            .get(sym)
            .copied()
            .expect("sorted order puts children before parents");
        }
      }
      total = logaddexp(total, weight);
    }
    table.insert(node.clone(), total);
  }
  table
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::rules::Rule;
  use crate::topsort::top_sort;

  #[test]
  fn test_logaddexp_handles_the_semiring_zero() {
    assert_eq!(logaddexp(f64::NEG_INFINITY, -1.5), -1.5);
    assert_eq!(logaddexp(-1.5, f64::NEG_INFINITY), -1.5);
    assert_eq!(
      logaddexp(f64::NEG_INFINITY, f64::NEG_INFINITY),
      f64::NEG_INFINITY
    );
  }

  #[test]
  fn test_logaddexp_agrees_with_linear_domain() {
    let got = logaddexp(0.6_f64.ln(), 0.4_f64.ln());
    assert!((got - 1.0_f64.ln()).abs() < 1e-12);
    // stable far from the linear domain
    let got = logaddexp(-1000.0, -1000.0);
    assert!((got - (-1000.0 + 2.0_f64.ln())).abs() < 1e-12);
  }

  fn nt(name: &str, start: usize, end: usize) -> Symbol {
    Symbol::nonterminal(name).annotate(start, end)
  }

  #[test]
  fn test_inside_sums_over_derivations() {
    // two derivations of the goal, with probabilities 0.6 * 0.5 and 0.4
    let mut forest = Wcfg::new();
    let goal = Symbol::nonterminal("GOAL");
    forest.add(Rule::new(goal.clone(), vec![nt("S", 0, 1)], 0.0));
    forest.add(Rule::new(nt("S", 0, 1), vec![nt("X", 0, 1)], 0.6_f64.ln()));
    forest.add(Rule::new(nt("S", 0, 1), vec![Symbol::terminal("a")], 0.4_f64.ln()));
    forest.add(Rule::new(nt("X", 0, 1), vec![Symbol::terminal("a")], 0.5_f64.ln()));

    let sorted = top_sort(&forest).unwrap();
    let table = inside(&forest, &sorted, |r| r.log_prob);

    assert!((table[&nt("X", 0, 1)] - 0.5_f64.ln()).abs() < 1e-12);
    assert!((table[&nt("S", 0, 1)] - 0.7_f64.ln()).abs() < 1e-12);
    assert!((table[&goal] - 0.7_f64.ln()).abs() < 1e-12);
  }

  #[test]
  fn test_inside_accepts_a_different_edge_view() {
    let mut forest = Wcfg::new();
    let goal = Symbol::nonterminal("GOAL");
    forest.add(Rule::new(goal.clone(), vec![nt("S", 0, 1)], 0.0));
    forest.add(Rule::new(nt("S", 0, 1), vec![Symbol::terminal("a")], 0.6_f64.ln()));
    forest.add(Rule::new(nt("S", 0, 1), vec![Symbol::terminal("a")], 0.4_f64.ln()));

    let sorted = top_sort(&forest).unwrap();
    // a uniform view: every edge weighs one
    let table = inside(&forest, &sorted, |_| 0.0);
    assert!((table[&nt("S", 0, 1)] - 2.0_f64.ln()).abs() < 1e-12);
  }
}
