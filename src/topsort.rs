use std::collections::{HashMap, VecDeque};

use crate::Error;
use crate::grammar::Wcfg;
use crate::rules::Symbol;

/// Topologically sorts the forest's nonterminal nodes under "A depends on B
/// iff some A-rule has B on its RHS", children before parents, so inside
/// weights can be accumulated in one pass. Intersected forests are DAGs
/// because the states annotated on a node strictly delimit its sub-spans; a
/// cycle (only possible through unary chains over one span) is an error.
pub fn top_sort(forest: &Wcfg) -> Result<Vec<Symbol>, Error> {
  let mut in_degree: HashMap<&Symbol, usize> = HashMap::new();
  let mut dependents: HashMap<&Symbol, Vec<&Symbol>> = HashMap::new();

  for (lhs, rules) in forest.iter() {
    in_degree.entry(lhs).or_insert(0);
    for rule in rules {
      for sym in rule.rhs.iter() {
        if sym.is_nonterminal() {
          *in_degree.entry(lhs).or_insert(0) += 1;
          dependents.entry(sym).or_default().push(lhs);
        }
      }
    }
  }

  let mut queue: VecDeque<&Symbol> = forest
    .lhs_symbols()
    .filter(|lhs| in_degree[lhs] == 0)
    .collect();
  let mut sorted: Vec<Symbol> = Vec::new();

  while let Some(node) = queue.pop_front() {
    sorted.push(node.clone());
    for &parent in dependents.get(node).map(Vec::as_slice).unwrap_or(&[]) {
      let degree = in_degree.get_mut(parent).expect("parent is a forest key");
      *degree -= 1;
      if *degree == 0 {
        queue.push_back(parent);
      }
    }
  }

  if sorted.len() != forest.lhs_symbols().count() {
    return Err(Error::CyclicForest);
  }
  Ok(sorted)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::rules::Rule;

  fn nt(name: &str, start: usize, end: usize) -> Symbol {
    Symbol::nonterminal(name).annotate(start, end)
  }

  #[test]
  fn test_children_come_before_parents() {
    let mut forest = Wcfg::new();
    forest.add(Rule::new(
      Symbol::nonterminal("GOAL"),
      vec![nt("S", 0, 2)],
      0.0,
    ));
    forest.add(Rule::new(nt("S", 0, 2), vec![nt("X", 0, 1), nt("X", 1, 2)], -0.1));
    forest.add(Rule::new(nt("X", 0, 1), vec![Symbol::terminal("x")], -0.2));
    forest.add(Rule::new(nt("X", 1, 2), vec![Symbol::terminal("x")], -0.2));

    let sorted = top_sort(&forest).unwrap();
    let position = |sym: &Symbol| sorted.iter().position(|s| s == sym).unwrap();
    assert!(position(&nt("X", 0, 1)) < position(&nt("S", 0, 2)));
    assert!(position(&nt("X", 1, 2)) < position(&nt("S", 0, 2)));
    assert!(position(&nt("S", 0, 2)) < position(&Symbol::nonterminal("GOAL")));
    assert_eq!(sorted.len(), 4);
  }

  #[test]
  fn test_unary_cycle_is_detected() {
    let mut forest = Wcfg::new();
    forest.add(Rule::new(nt("A", 0, 1), vec![nt("B", 0, 1)], 0.0));
    forest.add(Rule::new(nt("B", 0, 1), vec![nt("A", 0, 1)], 0.0));
    assert!(matches!(top_sort(&forest), Err(Error::CyclicForest)));
  }
}
