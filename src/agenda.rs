use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use crate::item::Item;
use crate::rules::Symbol;
use crate::wfsa::StateId;

/// The engines' work list. Items start out active and are popped LIFO; a
/// popped complete item is either accepted into the complete index or
/// discarded, never both, and an accepted item is never re-activated. Every
/// extension deduplicates by item equality against everything ever added.
///
/// Two indices drive completion: complete items by `(lhs, start)` and
/// incomplete items by `(next symbol, dot)`. Incomplete items are indexed
/// the moment they are added, not when they are popped; a completion can
/// therefore never miss a consumer that merely happened to be popped later,
/// which is what makes the pop order observationally invisible.
#[derive(Debug, Default)]
pub struct Agenda {
  active: Vec<Rc<Item>>,
  seen: HashSet<Rc<Item>>,
  complete: HashMap<(Symbol, StateId), Vec<Rc<Item>>>,
  waiting: HashMap<(Symbol, StateId), Vec<Rc<Item>>>,
  // complete items in acceptance order, for reproducible forest extraction
  complete_order: Vec<Rc<Item>>,
}

impl Agenda {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn is_empty(&self) -> bool {
    self.active.is_empty()
  }

  /// Makes every previously unseen item active; returns how many were added.
  pub fn extend(&mut self, items: impl IntoIterator<Item = Item>) -> usize {
    let mut added = 0;
    for item in items {
      if self.seen.contains(&item) {
        continue;
      }
      let item = Rc::new(item);
      self.seen.insert(item.clone());
      if let Some(next) = item.next_symbol() {
        self
          .waiting
          .entry((next.clone(), item.dot))
          .or_default()
          .push(item.clone());
      }
      self.active.push(item);
      added += 1;
    }
    added
  }

  /// Pops the most recently added active item.
  pub fn pop(&mut self) -> Option<Rc<Item>> {
    self.active.pop()
  }

  /// Accepts a complete item, indexed by its recognised LHS span.
  pub fn make_complete(&mut self, item: &Rc<Item>) {
    debug_assert!(item.is_complete());
    self
      .complete
      .entry((item.rule.lhs.clone(), item.start))
      .or_default()
      .push(item.clone());
    self.complete_order.push(item.clone());
  }

  /// Incomplete items waiting for `sym` at state `dot`.
  pub fn waiting_for(&self, sym: &Symbol, dot: StateId) -> &[Rc<Item>] {
    self
      .waiting
      .get(&(sym.clone(), dot))
      .map(Vec::as_slice)
      .unwrap_or(&[])
  }

  /// Accepted complete items whose LHS is `sym` and whose span opens at
  /// `start`, in acceptance order.
  pub fn completions(&self, sym: &Symbol, start: StateId) -> &[Rc<Item>] {
    self
      .complete
      .get(&(sym.clone(), start))
      .map(Vec::as_slice)
      .unwrap_or(&[])
  }

  /// All accepted complete items in acceptance order.
  pub fn iter_complete(&self) -> impl Iterator<Item = &Rc<Item>> {
    self.complete_order.iter()
  }

  /// Advances every incomplete item that waits for this complete item's LHS
  /// at its start state. Returns `None` when nothing was waiting, otherwise
  /// how many advanced items were new.
  pub fn complete_others(&mut self, item: &Item) -> Option<usize> {
    debug_assert!(item.is_complete());
    let new_items: Vec<Item> = self
      .waiting_for(&item.rule.lhs, item.start)
      .iter()
      .map(|waiting| waiting.advance(item.dot))
      .collect();
    if new_items.is_empty() {
      None
    } else {
      Some(self.extend(new_items))
    }
  }

  /// Advances an incomplete item over every accepted complete item matching
  /// its next symbol at its dot. Returns how many advanced items were new.
  pub fn complete_itself(&mut self, item: &Item) -> usize {
    let Some(next) = item.next_symbol() else {
      return 0;
    };
    let mut destinations: Vec<StateId> = Vec::new();
    for complete in self.completions(next, item.dot) {
      if !destinations.contains(&complete.dot) {
        destinations.push(complete.dot);
      }
    }
    let new_items: Vec<Item> = destinations.into_iter().map(|to| item.advance(to)).collect();
    self.extend(new_items)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::rules::Rule;

  fn rule(lhs: &str, rhs: Vec<Symbol>) -> Rc<Rule> {
    Rc::new(Rule::new(Symbol::nonterminal(lhs), rhs, 0.0))
  }

  #[test]
  fn test_extend_deduplicates() {
    let mut agenda = Agenda::new();
    let r = rule("S", vec![Symbol::terminal("a")]);
    assert_eq!(agenda.extend(vec![Item::new(r.clone(), 0)]), 1);
    assert_eq!(agenda.extend(vec![Item::new(r.clone(), 0)]), 0);
    assert_eq!(agenda.extend(vec![Item::new(r, 1)]), 1);
  }

  #[test]
  fn test_pop_is_lifo() {
    let mut agenda = Agenda::new();
    let r = rule("S", vec![Symbol::terminal("a")]);
    agenda.extend(vec![Item::new(r.clone(), 0), Item::new(r, 1)]);
    assert_eq!(agenda.pop().unwrap().start, 1);
    assert_eq!(agenda.pop().unwrap().start, 0);
    assert!(agenda.pop().is_none());
  }

  #[test]
  fn test_complete_others_reaches_items_still_active() {
    let mut agenda = Agenda::new();
    let s = rule("S", vec![Symbol::nonterminal("NP"), Symbol::nonterminal("VP")]);
    let np = rule("NP", vec![Symbol::terminal("dog")]);

    // indexed on addition, before it is ever popped
    agenda.extend(vec![Item::new(s, 0)]);

    let complete = Rc::new(Item::new(np, 0).advance(1));
    assert_eq!(agenda.complete_others(&complete), Some(1));
    let advanced = agenda.pop().unwrap();
    assert_eq!(advanced.dot, 1);
    assert_eq!(advanced.inner, vec![0]);

    // nothing waits for a VP completion at state 0
    let vp = rule("VP", vec![Symbol::terminal("barks")]);
    let unmatched = Rc::new(Item::new(vp, 0).advance(1));
    assert_eq!(agenda.complete_others(&unmatched), None);
  }

  #[test]
  fn test_complete_itself_advances_over_known_completions() {
    let mut agenda = Agenda::new();
    let s = rule("S", vec![Symbol::nonterminal("NP"), Symbol::nonterminal("VP")]);
    let np = rule("NP", vec![Symbol::terminal("dog")]);

    let complete = Rc::new(Item::new(np, 0).advance(2));
    agenda.make_complete(&complete);

    let item = Item::new(s, 0);
    assert_eq!(agenda.complete_itself(&item), 1);
    let advanced = agenda.pop().unwrap();
    assert_eq!(advanced.dot, 2);
    assert_eq!(advanced.next_symbol(), Some(&Symbol::nonterminal("VP")));
  }

  #[test]
  fn test_duplicate_advances_collapse() {
    let mut agenda = Agenda::new();
    let s = rule("S", vec![Symbol::nonterminal("NP")]);
    let np = rule("NP", vec![Symbol::terminal("dog")]);

    agenda.extend(vec![Item::new(s.clone(), 0)]);
    let complete = Rc::new(Item::new(np, 0).advance(1));
    agenda.make_complete(&complete);
    assert_eq!(agenda.complete_others(&complete), Some(1));
    // the same advance through the other operation is a duplicate
    assert_eq!(agenda.complete_itself(&Item::new(s, 0)), 0);
  }
}
