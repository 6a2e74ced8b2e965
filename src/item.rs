use std::fmt;
use std::rc::Rc;

use crate::rules::{Rule, Symbol};
use crate::wfsa::StateId;

/// A dotted rule spanning wFSA states. `start` is the state the LHS span
/// opens at and `dot` the state reached so far; `inner` records the junction
/// state in front of each consumed RHS symbol, so that after consuming `k`
/// symbols `inner.len() == k` and `inner + [dot]` delimits their spans.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Item {
  pub rule: Rc<Rule>,
  pub start: StateId,
  pub dot: StateId,
  pub inner: Vec<StateId>,
}

impl Item {
  /// A fresh item with nothing consumed, dotted at `start`.
  pub fn new(rule: Rc<Rule>, start: StateId) -> Self {
    Self {
      rule,
      start,
      dot: start,
      inner: Vec::new(),
    }
  }

  /// An item with a consumed prefix; the start state is `inner`'s first
  /// entry (or `dot` when nothing was consumed).
  pub fn advanced(rule: Rc<Rule>, dot: StateId, inner: Vec<StateId>) -> Self {
    let start = inner.first().copied().unwrap_or(dot);
    Self {
      rule,
      start,
      dot,
      inner,
    }
  }

  /// Consumes the next RHS symbol, moving the dot to `to`.
  pub fn advance(&self, to: StateId) -> Self {
    let mut inner = self.inner.clone();
    inner.push(self.dot);
    Self {
      rule: self.rule.clone(),
      start: self.start,
      dot: to,
      inner,
    }
  }

  pub fn is_complete(&self) -> bool {
    self.inner.len() == self.rule.rhs.len()
  }

  /// The symbol after the dot; `None` when the item is complete.
  pub fn next_symbol(&self) -> Option<&Symbol> {
    self.rule.rhs.get(self.inner.len())
  }

  /// The unconsumed RHS suffix, starting at the dot.
  pub fn next_symbols(&self) -> &[Symbol] {
    &self.rule.rhs[self.inner.len()..]
  }

  /// The intersected rule this complete item stands for: LHS and RHS
  /// nonterminals annotated with the spans the item recognised them over.
  pub fn intersected(&self) -> Rule {
    debug_assert!(self.is_complete());
    let mut positions = self.inner.clone();
    positions.push(self.dot);
    let lhs = self.rule.lhs.annotate(self.start, self.dot);
    let rhs = self
      .rule
      .rhs
      .iter()
      .enumerate()
      .map(|(k, sym)| sym.annotate(positions[k], positions[k + 1]))
      .collect();
    Rule::new(lhs, rhs, self.rule.log_prob)
  }
}

impl fmt::Display for Item {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "[{}-{}] {} ->", self.start, self.dot, self.rule.lhs)?;
    for (k, sym) in self.rule.rhs.iter().enumerate() {
      if k == self.inner.len() {
        write!(f, " *")?;
      }
      write!(f, " {}", sym)?;
    }
    if self.is_complete() {
      write!(f, " *")?;
    }
    Ok(())
  }
}

#[cfg(test)]
fn np_rule() -> Rc<Rule> {
  Rc::new(Rule::new(
    Symbol::nonterminal("NP"),
    vec![Symbol::terminal("the"), Symbol::terminal("dog")],
    -0.25,
  ))
}

#[test]
fn test_item_progress() {
  let item = Item::new(np_rule(), 0);
  assert!(!item.is_complete());
  assert_eq!(item.next_symbol(), Some(&Symbol::terminal("the")));

  let item = item.advance(1);
  assert_eq!(item.inner, vec![0]);
  assert_eq!(item.next_symbol(), Some(&Symbol::terminal("dog")));

  let item = item.advance(2);
  assert!(item.is_complete());
  assert_eq!(item.next_symbol(), None);
  assert_eq!(item.start, 0);
  assert_eq!(item.dot, 2);
}

#[test]
fn test_empty_rhs_is_complete_on_creation() {
  let rule = Rc::new(Rule::new(Symbol::nonterminal("E"), vec![], 0.0));
  assert!(Item::new(rule, 3).is_complete());
}

#[test]
fn test_intersected_rule_spans() {
  let rule = Rc::new(Rule::new(
    Symbol::nonterminal("S"),
    vec![Symbol::nonterminal("NP"), Symbol::nonterminal("VP")],
    -1.0,
  ));
  let item = Item::new(rule, 0).advance(2).advance(3);
  let intersected = item.intersected();
  assert_eq!(intersected.lhs, Symbol::nonterminal("S").annotate(0, 3));
  assert_eq!(
    intersected.rhs,
    vec![
      Symbol::nonterminal("NP").annotate(0, 2),
      Symbol::nonterminal("VP").annotate(2, 3),
    ]
  );
  assert_eq!(intersected.log_prob, -1.0);
}

#[test]
fn test_advanced_recovers_start() {
  let item = Item::advanced(np_rule(), 2, vec![0, 1]);
  assert_eq!(item.start, 0);
  assert!(item.is_complete());
  let fresh = Item::advanced(np_rule(), 4, vec![]);
  assert_eq!(fresh.start, 4);
}
