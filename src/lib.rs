#[macro_use]
extern crate lazy_static;

pub mod agenda;
pub mod earley;
pub mod forest;
pub mod grammar;
pub mod inference;
pub mod item;
pub mod mcmc;
pub mod nederhof;
pub mod reader;
pub mod rules;
pub mod sampler;
pub mod sentence;
pub mod slice_variable;
pub mod topsort;
pub mod wfsa;

use std::fmt;
use std::io;
use std::str::FromStr;

use crate::grammar::Wcfg;
use crate::rules::{Rule, Symbol};
use crate::wfsa::StateId;

/// Boxed static error type
pub type Err = Box<dyn std::error::Error + 'static>;

/// A derivation is the sequence of intersected rules visited by the sampler,
/// in top-down traversal order.
pub type Derivation = Vec<Rule>;

#[derive(Debug)]
pub enum Error {
  /// The intersection forest is empty; recoverable per sentence.
  NoParse,
  /// A wFSA state that was never created was looked up.
  InvalidState(StateId),
  /// Unrecognised intersection algorithm name.
  UnknownAlgorithm(String),
  /// The sampler was asked to sample from a node with no rules.
  EmptyForest(Symbol),
  /// The forest's dependency relation is not a DAG.
  CyclicForest,
  Io(io::Error),
}

impl fmt::Display for Error {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::NoParse => write!(f, "no parse found"),
      Self::InvalidState(s) => write!(f, "state {} does not exist", s),
      Self::UnknownAlgorithm(name) => write!(f, "I do not know this algorithm: {}", name),
      Self::EmptyForest(sym) => write!(f, "no rules for {} in the forest", sym),
      Self::CyclicForest => write!(f, "forest is not a DAG"),
      Self::Io(e) => write!(f, "{}", e),
    }
  }
}

impl std::error::Error for Error {
  fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
    match self {
      Self::Io(e) => Some(e),
      _ => None,
    }
  }
}

impl From<io::Error> for Error {
  fn from(e: io::Error) -> Self {
    Self::Io(e)
  }
}

/// Which intersection engine to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
  /// Top-down (scan / predict / complete).
  Earley,
  /// Bottom-up.
  Nederhof,
}

impl FromStr for Algorithm {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Error> {
    match s {
      "earley" => Ok(Self::Earley),
      "nederhof" => Ok(Self::Nederhof),
      _ => Err(Error::UnknownAlgorithm(s.to_string())),
    }
  }
}

/// Both engines compute the same intersected grammar: a wCFG whose
/// derivations are the grammar derivations of the wFSA-accepted strings.
/// An empty result means the sentence has no parse.
pub trait Intersect {
  fn intersect(&mut self, root: &Symbol, goal: &Symbol) -> Result<Wcfg, Error>;
}

#[test]
fn test_algorithm_from_str() {
  assert_eq!("earley".parse::<Algorithm>().unwrap(), Algorithm::Earley);
  assert_eq!("nederhof".parse::<Algorithm>().unwrap(), Algorithm::Nederhof);
  assert!(matches!(
    "cky".parse::<Algorithm>(),
    Err(Error::UnknownAlgorithm(_))
  ));
}
