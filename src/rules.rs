use std::fmt;
use std::hash::{Hash, Hasher};

use crate::wfsa::StateId;

/// Grammar symbols. Nonterminals may additionally be annotated with the pair
/// of wFSA states delimiting the span they were recognised over; annotated
/// nonterminals are the node type of intersected forests.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Symbol {
  Terminal(String),
  Nonterminal(String),
  Annotated(String, StateId, StateId),
}

impl Symbol {
  pub fn terminal(name: &str) -> Self {
    Self::Terminal(name.to_string())
  }

  pub fn nonterminal(name: &str) -> Self {
    Self::Nonterminal(name.to_string())
  }

  pub fn is_terminal(&self) -> bool {
    matches!(self, Self::Terminal(_))
  }

  pub fn is_nonterminal(&self) -> bool {
    !self.is_terminal()
  }

  pub fn name(&self) -> &str {
    match self {
      Self::Terminal(name) | Self::Nonterminal(name) | Self::Annotated(name, _, _) => name,
    }
  }

  /// Annotates a nonterminal with the span `(start, end)`. Terminals pass
  /// through unchanged, so a rule's RHS can be annotated wholesale.
  pub fn annotate(&self, start: StateId, end: StateId) -> Self {
    match self {
      Self::Nonterminal(name) | Self::Annotated(name, _, _) => {
        Self::Annotated(name.clone(), start, end)
      }
      Self::Terminal(_) => self.clone(),
    }
  }

  /// Recovers `(name, start, end)` from an annotated nonterminal.
  pub fn parse_annotated(&self) -> Option<(&str, StateId, StateId)> {
    match self {
      Self::Annotated(name, start, end) => Some((name, *start, *end)),
      _ => None,
    }
  }
}

impl fmt::Display for Symbol {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Terminal(name) => write!(f, "{}", name),
      Self::Nonterminal(name) => write!(f, "[{}]", name),
      Self::Annotated(name, start, end) => write!(f, "[{},{}-{}]", name, start, end),
    }
  }
}

/// A weighted production. `log_prob` lives in the log semiring: `+` is the
/// product, `logaddexp` the sum, `0.0` the one and `-inf` the zero.
#[derive(Debug, Clone)]
pub struct Rule {
  pub lhs: Symbol,
  pub rhs: Vec<Symbol>,
  pub log_prob: f64,
}

impl Rule {
  pub fn new(lhs: Symbol, rhs: Vec<Symbol>, log_prob: f64) -> Self {
    Self { lhs, rhs, log_prob }
  }
}

// Items are deduplicated by equality over their rule, so the weight takes
// part in equality and hashing; comparing the bit pattern keeps Eq lawful.
impl PartialEq for Rule {
  fn eq(&self, other: &Self) -> bool {
    self.lhs == other.lhs
      && self.rhs == other.rhs
      && self.log_prob.to_bits() == other.log_prob.to_bits()
  }
}

impl Eq for Rule {}

impl Hash for Rule {
  fn hash<H: Hasher>(&self, state: &mut H) {
    self.lhs.hash(state);
    self.rhs.hash(state);
    self.log_prob.to_bits().hash(state);
  }
}

impl fmt::Display for Rule {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} |||", self.lhs)?;
    for sym in self.rhs.iter() {
      write!(f, " {}", sym)?;
    }
    write!(f, " ||| {}", self.log_prob)
  }
}

#[test]
fn test_annotation_round_trip() {
  let s = Symbol::nonterminal("S");
  let annotated = s.annotate(0, 3);
  assert_eq!(annotated.parse_annotated(), Some(("S", 0, 3)));
  assert_eq!(annotated.annotate(1, 2).parse_annotated(), Some(("S", 1, 2)));
  assert_eq!(s.parse_annotated(), None);
}

#[test]
fn test_terminals_ignore_annotation() {
  let t = Symbol::terminal("dog");
  assert_eq!(t.annotate(0, 1), t);
  assert_eq!(t.parse_annotated(), None);
}

#[test]
fn test_symbol_display() {
  assert_eq!(Symbol::terminal("dog").to_string(), "dog");
  assert_eq!(Symbol::nonterminal("NP").to_string(), "[NP]");
  assert_eq!(Symbol::nonterminal("NP").annotate(1, 2).to_string(), "[NP,1-2]");
}

#[test]
fn test_rule_display() {
  let r = Rule::new(
    Symbol::nonterminal("S"),
    vec![Symbol::nonterminal("NP"), Symbol::nonterminal("VP")],
    -0.5,
  );
  assert_eq!(r.to_string(), "[S] ||| [NP] [VP] ||| -0.5");
}

#[test]
fn test_rules_with_same_shape_but_different_weights_differ() {
  let a = Rule::new(Symbol::nonterminal("S"), vec![Symbol::terminal("a")], -0.51);
  let b = Rule::new(Symbol::nonterminal("S"), vec![Symbol::terminal("a")], -0.92);
  assert_ne!(a, b);
  assert_eq!(a, a.clone());
}
