use std::collections::HashMap;

use rand::Rng;
use tracing::{debug, info};

use crate::earley::Earley;
use crate::grammar::Wcfg;
use crate::inference::{inside, logaddexp};
use crate::nederhof::Nederhof;
use crate::rules::{Rule, Symbol};
use crate::topsort::top_sort;
use crate::wfsa::Wfsa;
use crate::{Algorithm, Derivation, Error, Intersect};

/// Ancestral sampling over a forest: starting from the goal, picks a rule
/// with probability proportional to its edge weight times the inside weights
/// of its children, then recurses on the children. Returns the rules visited
/// in top-down, left-to-right order.
pub struct GeneralisedSampler<'a> {
  forest: &'a Wcfg,
  inside: &'a HashMap<Symbol, f64>,
}

impl<'a> GeneralisedSampler<'a> {
  pub fn new(forest: &'a Wcfg, inside: &'a HashMap<Symbol, f64>) -> Self {
    Self { forest, inside }
  }

  pub fn sample(
    &self,
    goal: &Symbol,
    omega: &mut impl FnMut(&Rule) -> f64,
    rng: &mut impl Rng,
  ) -> Result<Derivation, Error> {
    let mut derivation: Derivation = Vec::new();
    let mut stack = vec![goal.clone()];

    while let Some(node) = stack.pop() {
      let rules = self.forest.rules_for(&node);
      let weights: Vec<f64> = rules
        .iter()
        .map(|rule| {
          rule
            .rhs
            .iter()
            .filter(|sym| sym.is_nonterminal())
            .map(|sym| self.inside[sym])
            .sum::<f64>()
            + omega(rule)
        })
        .collect();
      let total = weights.iter().copied().fold(f64::NEG_INFINITY, logaddexp);
      if total == f64::NEG_INFINITY {
        // no rules, or none with any mass under this edge view
        return Err(Error::EmptyForest(node));
      }

      let u: f64 = rng.gen_range(0.0..1.0);
      let mut acc = 0.0;
      let mut choice = weights.len() - 1;
      for (k, weight) in weights.iter().enumerate() {
        acc += (weight - total).exp();
        if u < acc {
          choice = k;
          break;
        }
      }

      let rule = &rules[choice];
      derivation.push(rule.clone());
      // reversed, so the leftmost child is expanded next
      for sym in rule.rhs.iter().rev() {
        if sym.is_nonterminal() {
          stack.push(sym.clone());
        }
      }
    }
    Ok(derivation)
  }
}

/// Samples drawn independently from the exact posterior, together with the
/// goal's inside weight (the partition function the caller needs to report
/// posterior probabilities).
pub struct ExactResult {
  pub samples: Vec<Derivation>,
  pub inside_goal: f64,
}

/// Exact (independent) sampling: intersect, sort, compute true inside
/// weights once, then draw `n_samples` derivations.
pub fn exact_sample(
  grammar: &Wcfg,
  wfsa: &Wfsa,
  root: &Symbol,
  goal: &Symbol,
  n_samples: usize,
  algorithm: Algorithm,
  rng: &mut impl Rng,
) -> Result<ExactResult, Error> {
  debug!("parsing");
  let forest = match algorithm {
    Algorithm::Earley => Earley::new(grammar, wfsa).intersect(root, goal)?,
    Algorithm::Nederhof => Nederhof::new(grammar, wfsa).intersect(root, goal)?,
  };
  if forest.is_empty() {
    return Err(Error::NoParse);
  }
  info!(rules = forest.len(), "forest");

  debug!("topsorting");
  let sorted = top_sort(&forest)?;
  debug!("inside");
  let table = inside(&forest, &sorted, |rule| rule.log_prob);
  let inside_goal = table[goal];

  debug!("sampling");
  let sampler = GeneralisedSampler::new(&forest, &table);
  let mut samples = Vec::with_capacity(n_samples);
  for _ in 0..n_samples {
    match sampler.sample(goal, &mut |rule| rule.log_prob, rng) {
      Ok(d) => samples.push(d),
      // a goal with nothing to sample is the same failure as no parse
      Err(Error::EmptyForest(_)) => return Err(Error::NoParse),
      Err(e) => return Err(e),
    }
  }
  Ok(ExactResult {
    samples,
    inside_goal,
  })
}
