use std::collections::{HashMap, HashSet};
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

/// Bottom-up intersection. Control is inverted with respect to the top-down
/// engine: the axioms instantiate scan items for every terminal-initial rule
/// wherever the automaton can read its first terminal, and a rule whose RHS
/// opens with a nonterminal is instantiated only once a complete item for
/// that nonterminal licenses it. Scanning, completion, forest extraction and
/// the slice filter are shared with the top-down engine, so both produce the
/// same forest up to rule ordering.
pub struct Nederhof<'a> {
  grammar: &'a Wcfg,
  wfsa: &'a Wfsa,
  agenda: Agenda,
  // rules indexed by their first RHS symbol, in grammar order
  by_first: HashMap<Symbol, Vec<Rule>>,
  // (state, symbol) pairs whose rules were already instantiated
  instantiated: HashSet<(StateId, Symbol)>,
  slice: Option<&'a mut SliceVariables>,
  keep_spine: bool,
}

impl<'a> Nederhof<'a> {
  pub fn new(grammar: &'a Wcfg, wfsa: &'a Wfsa) -> Self {
    let mut by_first: HashMap<Symbol, Vec<Rule>> = HashMap::new();
    for rule in grammar.iter_rules() {
      if let Some(first) = rule.rhs.first() {
        if first.is_nonterminal() {
          by_first.entry(first.clone()).or_default().push(rule.clone());
        }
      }
    }
    Self {
      grammar,
      wfsa,
      agenda: Agenda::new(),
      by_first,
      instantiated: HashSet::new(),
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

  /// Eagerly instantiates every rule the automaton's terminals can open:
  /// terminal-initial rules wherever their first terminal can be read, and
  /// empty-RHS rules at every state (they are complete on creation).
  fn axioms(&mut self) -> Result<(), Error> {
    for state in 0..self.wfsa.n_states() {
      let mut items = Vec::new();
      for rule in self.grammar.iter_rules() {
        match rule.rhs.first() {
          None => items.push(Item::new(Rc::new(rule.clone()), state)),
          Some(first) if first.is_terminal() => {
            if self.wfsa.destination_and_weight(state, first)?.is_some() {
              items.push(Item::new(Rc::new(rule.clone()), state));
            }
          }
          Some(_) => {}
        }
      }
      self.agenda.extend(items);
    }
    Ok(())
  }

  /// The bottom-up prediction: a complete item for `lhs` spanning from
  /// `start` licenses every rule whose RHS opens with `lhs` there.
  fn predict(&mut self, item: &Item) {
    let lhs = item.rule.lhs.clone();
    if !self.instantiated.insert((item.start, lhs.clone())) {
      return;
    }
    let items: Vec<Item> = self
      .by_first
      .get(&lhs)
      .map(Vec::as_slice)
      .unwrap_or(&[])
      .iter()
      .map(|rule| Item::new(Rc::new(rule.clone()), item.start))
      .collect();
    self.agenda.extend(items);
  }

  /// Same maximal terminal run as the top-down engine's scan.
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

  fn admits(&mut self, item: &Item, root_span: bool) -> bool {
    let Some(slice) = self.slice.as_deref_mut() else {
      return true;
    };
    let name = item.rule.lhs.name().to_string();
    slice.admits(&name, item.start, item.dot, item.rule.log_prob)
      || (root_span && self.keep_spine)
  }
}

impl Intersect for Nederhof<'_> {
  fn intersect(&mut self, root: &Symbol, goal: &Symbol) -> Result<Wcfg, Error> {
    self.axioms()?;

    while let Some(item) = self.agenda.pop() {
      if item.is_complete() {
        self.agenda.complete_others(&item);
        let root_span = self.is_root_span(&item, root);
        if !self.admits(&item, root_span) {
          continue;
        }
        self.agenda.make_complete(&item);
        self.predict(&item);
      } else if item.next_symbol().expect("incomplete item").is_terminal() {
        self.scan(&item)?;
      } else {
        // advance over completions already accepted; later ones reach this
        // item through complete-others, it was indexed on addition
        self.agenda.complete_itself(&item);
      }
    }

    let forest = extract_forest(&self.agenda, self.wfsa, root, goal)?;
    debug!(rules = forest.len(), "intersection done");
    Ok(forest)
  }
}
