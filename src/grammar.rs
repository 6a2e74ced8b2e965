use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::rules::{Rule, Symbol};

/// A weighted context-free grammar: an insertion-ordered rule store keyed by
/// LHS symbol, plus the terminal vocabulary. Both the input grammar and the
/// intersected forest have this shape; the forest's keys are annotated
/// nonterminals. Duplicate rules are kept, each standing for a distinct
/// derivation edge.
#[derive(Debug, Clone, Default)]
pub struct Wcfg {
  rules: HashMap<Symbol, Vec<Rule>>,
  // LHS symbols in first-insertion order; HashMap iteration alone would not
  // be reproducible
  order: Vec<Symbol>,
  terminals: HashSet<String>,
  n_rules: usize,
}

impl Wcfg {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn add(&mut self, rule: Rule) {
    if !self.rules.contains_key(&rule.lhs) {
      self.order.push(rule.lhs.clone());
    }
    for sym in rule.rhs.iter() {
      if let Symbol::Terminal(word) = sym {
        self.terminals.insert(word.clone());
      }
    }
    self.n_rules += 1;
    self.rules.entry(rule.lhs.clone()).or_default().push(rule);
  }

  /// Appends every rule, preserving encounter order.
  pub fn update(&mut self, rules: impl IntoIterator<Item = Rule>) {
    for rule in rules {
      self.add(rule);
    }
  }

  /// Rules headed by `lhs`, in insertion order; empty if `lhs` is unknown.
  pub fn rules_for(&self, lhs: &Symbol) -> &[Rule] {
    self.rules.get(lhs).map(Vec::as_slice).unwrap_or(&[])
  }

  pub fn has_rules(&self, lhs: &Symbol) -> bool {
    !self.rules_for(lhs).is_empty()
  }

  /// Total number of rules.
  pub fn len(&self) -> usize {
    self.n_rules
  }

  pub fn is_empty(&self) -> bool {
    self.n_rules == 0
  }

  pub fn terminals(&self) -> &HashSet<String> {
    &self.terminals
  }

  /// LHS symbols in first-insertion order.
  pub fn lhs_symbols(&self) -> impl Iterator<Item = &Symbol> {
    self.order.iter()
  }

  pub fn iter(&self) -> impl Iterator<Item = (&Symbol, &[Rule])> {
    self.order.iter().map(|lhs| (lhs, self.rules_for(lhs)))
  }

  /// All rules, grouped by LHS in insertion order.
  pub fn iter_rules(&self) -> impl Iterator<Item = &Rule> {
    self.iter().flat_map(|(_, rules)| rules.iter())
  }
}

impl fmt::Display for Wcfg {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for rule in self.iter_rules() {
      writeln!(f, "{}", rule)?;
    }
    Ok(())
  }
}

#[cfg(test)]
fn r(lhs: &str, rhs: &[&str], log_prob: f64) -> Rule {
  let rhs = rhs
    .iter()
    .map(|s| {
      if s.starts_with('[') {
        Symbol::nonterminal(s.trim_matches(['[', ']']))
      } else {
        Symbol::terminal(s)
      }
    })
    .collect();
  Rule::new(Symbol::nonterminal(lhs), rhs, log_prob)
}

#[test]
fn test_rules_keep_insertion_order() {
  let mut g = Wcfg::new();
  g.add(r("S", &["[NP]", "[VP]"], 0.0));
  g.add(r("NP", &["the", "dog"], 0.0));
  g.add(r("S", &["[S]", "[S]"], -1.0));

  let lhs: Vec<_> = g.lhs_symbols().cloned().collect();
  assert_eq!(lhs, vec![Symbol::nonterminal("S"), Symbol::nonterminal("NP")]);
  assert_eq!(g.rules_for(&Symbol::nonterminal("S")).len(), 2);
  assert_eq!(g.rules_for(&Symbol::nonterminal("S"))[1].log_prob, -1.0);
  assert_eq!(g.len(), 3);
}

#[test]
fn test_duplicate_rules_are_kept() {
  let mut g = Wcfg::new();
  g.add(r("S", &["a"], -0.51));
  g.add(r("S", &["a"], -0.51));
  assert_eq!(g.rules_for(&Symbol::nonterminal("S")).len(), 2);
}

#[test]
fn test_terminal_vocabulary() {
  let mut g = Wcfg::new();
  g.add(r("NP", &["the", "dog"], 0.0));
  assert!(g.terminals().contains("the"));
  assert!(g.terminals().contains("dog"));
  assert!(!g.terminals().contains("NP"));
}

#[test]
fn test_unknown_lhs_has_no_rules() {
  let g = Wcfg::new();
  assert!(g.rules_for(&Symbol::nonterminal("X")).is_empty());
  assert!(!g.has_rules(&Symbol::nonterminal("X")));
}
