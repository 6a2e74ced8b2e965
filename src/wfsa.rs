use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::Error;
use crate::rules::Symbol;

pub type StateId = usize;

/// A deterministic weighted finite-state automaton over terminal symbols.
/// States are dense ids `[0, n_states)`; at most one destination exists per
/// `(origin, symbol)` pair. Final states carry a weight, `0.0` (the log
/// semiring one) unless set otherwise.
#[derive(Debug, Clone, Default)]
pub struct Wfsa {
  // indexed by origin state; BTreeMap so arc iteration is deterministic
  arcs: Vec<BTreeMap<Symbol, (StateId, f64)>>,
  initial: BTreeSet<StateId>,
  final_weights: BTreeMap<StateId, f64>,
}

impl Wfsa {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn n_states(&self) -> usize {
    self.arcs.len()
  }

  fn create_state(&mut self, state: StateId) {
    while self.arcs.len() <= state {
      self.arcs.push(BTreeMap::new());
    }
  }

  /// Adds an arc, creating the endpoint states as needed. A second arc for
  /// the same `(from, symbol)` pair replaces the first, keeping the
  /// automaton deterministic.
  pub fn add_arc(&mut self, from: StateId, to: StateId, symbol: Symbol, weight: f64) {
    self.create_state(from);
    self.create_state(to);
    self.arcs[from].insert(symbol, (to, weight));
  }

  pub fn make_initial(&mut self, state: StateId) {
    self.create_state(state);
    self.initial.insert(state);
  }

  pub fn make_final(&mut self, state: StateId, weight: f64) {
    self.create_state(state);
    self.final_weights.insert(state, weight);
  }

  pub fn is_initial(&self, state: StateId) -> bool {
    self.initial.contains(&state)
  }

  pub fn is_final(&self, state: StateId) -> bool {
    self.final_weights.contains_key(&state)
  }

  /// The unique `(destination, weight)` reachable from `from` over `symbol`,
  /// or `None` when no such arc exists.
  pub fn destination_and_weight(
    &self,
    from: StateId,
    symbol: &Symbol,
  ) -> Result<Option<(StateId, f64)>, Error> {
    let arcs = self.arcs.get(from).ok_or(Error::InvalidState(from))?;
    Ok(arcs.get(symbol).copied())
  }

  pub fn initial_states(&self) -> impl Iterator<Item = StateId> + '_ {
    self.initial.iter().copied()
  }

  pub fn final_states(&self) -> impl Iterator<Item = StateId> + '_ {
    self.final_weights.keys().copied()
  }

  pub fn final_weight(&self, state: StateId) -> Result<f64, Error> {
    self
      .final_weights
      .get(&state)
      .copied()
      .ok_or(Error::InvalidState(state))
  }

  /// All arcs leaving `state`, in symbol order.
  pub fn arcs_from(
    &self,
    state: StateId,
  ) -> Result<impl Iterator<Item = (&Symbol, StateId, f64)>, Error> {
    let arcs = self.arcs.get(state).ok_or(Error::InvalidState(state))?;
    Ok(arcs.iter().map(|(sym, &(to, w))| (sym, to, w)))
  }
}

impl fmt::Display for Wfsa {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for (origin, arcs) in self.arcs.iter().enumerate() {
      for (symbol, (to, weight)) in arcs.iter() {
        writeln!(f, "({}, {}, {}, {})", origin, to, symbol, weight)?;
      }
    }
    Ok(())
  }
}

/// A chain automaton accepting exactly `tokens`: states `0..=n`, state 0
/// initial, state n final with weight `0.0`, one zero-weight arc per token.
pub fn make_linear_fsa(tokens: &[String]) -> Wfsa {
  let mut fsa = Wfsa::new();
  for (i, token) in tokens.iter().enumerate() {
    fsa.add_arc(i, i + 1, Symbol::terminal(token), 0.0);
  }
  fsa.make_initial(0);
  fsa.make_final(tokens.len(), 0.0);
  fsa
}

#[cfg(test)]
fn tokens(s: &str) -> Vec<String> {
  s.split_whitespace().map(|t| t.to_string()).collect()
}

#[test]
fn test_linear_fsa() {
  let fsa = make_linear_fsa(&tokens("the dog barks"));
  assert_eq!(fsa.n_states(), 4);
  assert!(fsa.is_initial(0));
  assert!(fsa.is_final(3));
  assert_eq!(fsa.final_weight(3).unwrap(), 0.0);

  assert_eq!(
    fsa
      .destination_and_weight(0, &Symbol::terminal("the"))
      .unwrap(),
    Some((1, 0.0))
  );
  assert_eq!(
    fsa
      .destination_and_weight(0, &Symbol::terminal("dog"))
      .unwrap(),
    None
  );
}

#[test]
fn test_final_weight_can_be_changed() {
  let mut fsa = make_linear_fsa(&tokens("a"));
  fsa.make_final(1, -0.5);
  assert_eq!(fsa.final_weight(1).unwrap(), -0.5);
}

#[test]
fn test_missing_state_is_an_error() {
  let fsa = make_linear_fsa(&tokens("a"));
  assert!(matches!(
    fsa.destination_and_weight(7, &Symbol::terminal("a")),
    Err(Error::InvalidState(7))
  ));
  assert!(matches!(fsa.final_weight(0), Err(Error::InvalidState(0))));
}

#[test]
fn test_determinism_replaces_arcs() {
  let mut fsa = Wfsa::new();
  fsa.add_arc(0, 1, Symbol::terminal("a"), 0.0);
  fsa.add_arc(0, 2, Symbol::terminal("a"), -1.0);
  assert_eq!(
    fsa
      .destination_and_weight(0, &Symbol::terminal("a"))
      .unwrap(),
    Some((2, -1.0))
  );
}
