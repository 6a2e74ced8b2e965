use std::collections::HashMap;
use std::rc::Rc;

use tracing::debug;

use crate::agenda::Agenda;
use crate::forest::extract_forest;
use crate::grammar::Wcfg;
use crate::item::Item;
use crate::rules::{Rule, Symbol};
use crate::slice_variable::SliceVariables;
use crate::wfsa::{StateId, Wfsa};
use crate::{Error, Intersect};

/// Top-down intersection. Axioms seed the root's rules at every initial
/// state; the main loop scans maximal terminal runs through the automaton,
/// predicts rules for the nonterminal after the dot, and completes waiting
/// items. A prediction-status cache makes each `(state, symbol)` pair
/// predict at most once, which also grounds left recursion.
///
/// Constructed with a slice-variable store, the engine additionally drops
/// complete items whose rule weight does not clear the LHS node's threshold.
pub struct Earley<'a> {
  grammar: &'a Wcfg,
  wfsa: &'a Wfsa,
  agenda: Agenda,
  // (state, symbol) -> whether the symbol had rules to predict there
  predictions: HashMap<(StateId, Symbol), bool>,
  slice: Option<&'a mut SliceVariables>,
  keep_spine: bool,
}

impl<'a> Earley<'a> {
  pub fn new(grammar: &'a Wcfg, wfsa: &'a Wfsa) -> Self {
    Self {
      grammar,
      wfsa,
      agenda: Agenda::new(),
      predictions: HashMap::new(),
      slice: None,
      keep_spine: true,
    }
  }

  /// A sliced engine restricted to rules above the store's thresholds.
  pub fn sliced(grammar: &'a Wcfg, wfsa: &'a Wfsa, slice: &'a mut SliceVariables) -> Self {
    Self {
      slice: Some(slice),
      ..Self::new(grammar, wfsa)
    }
  }

  /// Whether a root-spanning item survives even below its threshold,
  /// preserving a parse spine. Defaults to true.
  pub fn keep_spine(mut self, keep: bool) -> Self {
    self.keep_spine = keep;
    self
  }

  fn axioms(&mut self, root: &Symbol) {
    let rules = self.grammar.rules_for(root);
    let initial: Vec<StateId> = self.wfsa.initial_states().collect();
    for start in initial {
      let items: Vec<Item> = rules
        .iter()
        .map(|rule| Item::new(Rc::new(rule.clone()), start))
        .collect();
      self.agenda.extend(items);
      self.predictions.insert((start, root.clone()), !rules.is_empty());
    }
  }

  /// Creates an item for every rule of the nonterminal after the dot.
  /// `None` means the symbol has no rules and the item is a dead end;
  /// `Some(0)` that this prediction already happened.
  fn predict(&mut self, item: &Item) -> Option<usize> {
    let dot = item.dot;
    let symbol = item.next_symbol().expect("predict on a complete item");
    match self.predictions.get(&(dot, symbol.clone())) {
      Some(true) => Some(0),
      Some(false) => None,
      None => {
        let rules = self.grammar.rules_for(symbol);
        let status = !rules.is_empty();
        let items: Vec<Item> = rules
          .iter()
          .map(|rule| Item::new(Rc::new(rule.clone()), dot))
          .collect();
        self.predictions.insert((dot, symbol.clone()), status);
        if status { Some(self.agenda.extend(items)) } else { None }
      }
    }
  }

  /// Walks the longest run of terminals after the dot through the
  /// automaton, folding arc weights into the rule weight. An item whose run
  /// hits a terminal with no matching arc is simply dropped.
  fn scan(&mut self, item: &Item) -> Result<(), Error> {
    let mut states = vec![item.dot];
    let mut weight = 0.0;
    for symbol in item.next_symbols() {
      if !symbol.is_terminal() {
        break;
      }
      let from = *states.last().expect("states never empty");
      match self.wfsa.destination_and_weight(from, symbol)? {
        Some((to, w)) => {
          states.push(to);
          weight += w;
        }
        None => return Ok(()),
      }
    }
    let rule = Rule::new(
      item.rule.lhs.clone(),
      item.rule.rhs.clone(),
      item.rule.log_prob + weight,
    );
    let dot = *states.last().expect("states never empty");
    states.pop();
    let mut inner = item.inner.clone();
    inner.append(&mut states);
    let scanned = Item::advanced(Rc::new(rule), dot, inner);
    self.agenda.extend(vec![scanned]);
    Ok(())
  }

  fn is_root_span(&self, item: &Item, root: &Symbol) -> bool {
    item.rule.lhs == *root && self.wfsa.is_initial(item.start) && self.wfsa.is_final(item.dot)
  }

  /// The slice filter; unsliced engines admit everything.
  fn admits(&mut self, item: &Item, root_span: bool) -> bool {
    let Some(slice) = self.slice.as_deref_mut() else {
      return true;
    };
    let name = item.rule.lhs.name().to_string();
    slice.admits(&name, item.start, item.dot, item.rule.log_prob)
      || (root_span && self.keep_spine)
  }
}

impl Intersect for Earley<'_> {
  fn intersect(&mut self, root: &Symbol, goal: &Symbol) -> Result<Wcfg, Error> {
    self.axioms(root);

    while let Some(item) = self.agenda.pop() {
      if item.is_complete() {
        let advanced = self.agenda.complete_others(&item);
        let root_span = self.is_root_span(&item, root);
        if !self.admits(&item, root_span) {
          continue;
        }
        // a root-spanning item is kept even when it completed nothing,
        // since nothing above it is waiting
        if root_span || advanced.is_some() {
          self.agenda.make_complete(&item);
        }
      } else if item.next_symbol().expect("incomplete item").is_terminal() {
        self.scan(&item)?;
      } else if self.predict(&item) == Some(0) {
        // already predicted here, so completions may exist to advance over
        self.agenda.complete_itself(&item);
      }
    }

    let forest = extract_forest(&self.agenda, self.wfsa, root, goal)?;
    debug!(rules = forest.len(), "intersection done");
    Ok(forest)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::reader::parse_bar_str;
  use crate::wfsa::make_linear_fsa;

  fn toy_grammar() -> Wcfg {
    parse_bar_str(
      r"[S] ||| [NP] [VP] ||| 1.0
        [NP] ||| the dog ||| 1.0
        [VP] ||| barks ||| 1.0",
      f64::ln,
    )
    .unwrap()
  }

  fn tokens(s: &str) -> Vec<String> {
    s.split_whitespace().map(|t| t.to_string()).collect()
  }

  #[test]
  fn test_single_parse() {
    let grammar = parse_bar_str(
      r"[S] ||| [NP] [VP] ||| 1.0
        [NP] ||| the dog ||| 1.0
        [VP] ||| barks ||| 1.0",
      f64::ln,
    )
    .unwrap();
    let fsa = make_linear_fsa(&tokens("the dog barks"));
    let goal = Symbol::nonterminal("GOAL");
    let forest = Earley::new(&grammar, &fsa)
      .intersect(&Symbol::nonterminal("S"), &goal)
      .unwrap();

    assert_eq!(forest.len(), 4); // three intersected rules plus GOAL
    let goal_rules = forest.rules_for(&goal);
    assert_eq!(goal_rules.len(), 1);
    assert_eq!(goal_rules[0].rhs, vec![Symbol::nonterminal("S").annotate(0, 3)]);
    assert_eq!(goal_rules[0].log_prob, 0.0);

    let s_rules = forest.rules_for(&Symbol::nonterminal("S").annotate(0, 3));
    assert_eq!(s_rules.len(), 1);
    assert_eq!(
      s_rules[0].rhs,
      vec![
        Symbol::nonterminal("NP").annotate(0, 2),
        Symbol::nonterminal("VP").annotate(2, 3),
      ]
    );
  }

  #[test]
  fn test_no_parse_yields_empty_forest() {
    let grammar = toy_grammar();
    let fsa = make_linear_fsa(&tokens("the cat barks"));
    let forest = Earley::new(&grammar, &fsa)
      .intersect(&Symbol::nonterminal("S"), &Symbol::nonterminal("GOAL"))
      .unwrap();
    assert!(forest.is_empty());
  }

  #[test]
  fn test_ambiguity_yields_both_rules() {
    let grammar = parse_bar_str(
      r"[S] ||| a ||| 0.6
        [S] ||| a ||| 0.4",
      f64::ln,
    )
    .unwrap();
    let fsa = make_linear_fsa(&tokens("a"));
    let forest = Earley::new(&grammar, &fsa)
      .intersect(&Symbol::nonterminal("S"), &Symbol::nonterminal("GOAL"))
      .unwrap();
    let s_rules = forest.rules_for(&Symbol::nonterminal("S").annotate(0, 1));
    assert_eq!(s_rules.len(), 2);
  }

  #[test]
  fn test_left_recursion_terminates() {
    let grammar = parse_bar_str(
      r"[S] ||| [S] a ||| 0.5
        [S] ||| a ||| 0.5",
      f64::ln,
    )
    .unwrap();
    let fsa = make_linear_fsa(&tokens("a a a"));
    let forest = Earley::new(&grammar, &fsa)
      .intersect(&Symbol::nonterminal("S"), &Symbol::nonterminal("GOAL"))
      .unwrap();
    assert!(!forest.is_empty());
    // S over (0,3) must rewrite as S(0,2) a
    let top = forest.rules_for(&Symbol::nonterminal("S").annotate(0, 3));
    assert_eq!(top.len(), 1);
    assert_eq!(
      top[0].rhs,
      vec![Symbol::nonterminal("S").annotate(0, 2), Symbol::terminal("a")]
    );
  }
}
