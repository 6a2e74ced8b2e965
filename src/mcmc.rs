use std::collections::HashMap;

use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{debug, info};

use crate::earley::Earley;
use crate::grammar::Wcfg;
use crate::inference::inside;
use crate::nederhof::Nederhof;
use crate::rules::{Rule, Symbol};
use crate::sampler::GeneralisedSampler;
use crate::slice_variable::{SliceKey, SliceVariables};
use crate::topsort::top_sort;
use crate::wfsa::Wfsa;
use crate::{Algorithm, Derivation, Error, Intersect};

pub struct McmcSettings {
  pub n_samples: usize,
  pub n_burn: usize,
  pub max_iterations: usize,
  /// First Beta parameter, before and after the first accepted derivation.
  pub a: (f64, f64),
  /// Second Beta parameter, before and after the first accepted derivation.
  pub b: (f64, f64),
  pub algorithm: Algorithm,
  pub seed: u64,
}

impl Default for McmcSettings {
  fn default() -> Self {
    Self {
      n_samples: 100,
      n_burn: 0,
      max_iterations: 1000,
      a: (0.1, 0.3),
      b: (1.0, 1.0),
      algorithm: Algorithm::Nederhof,
      seed: 0,
    }
  }
}

/// The conditions induced by a derivation: each annotated node is capped by
/// the log-prob of the rule it was rewritten with, so the next round of
/// slice draws keeps this derivation reachable. The goal rule has no
/// annotated LHS and induces no condition.
fn conditions_of(derivation: &Derivation) -> HashMap<SliceKey, f64> {
  derivation
    .iter()
    .filter_map(|rule| {
      rule
        .lhs
        .parse_annotated()
        .map(|(name, start, end)| ((name.to_string(), start, end), rule.log_prob))
    })
    .collect()
}

/// The uniform view of a forest edge: goal rules weigh one (there is no
/// slice variable for the goal), every other edge is scored by the store.
pub fn edge_uniform_weight(rule: &Rule, goal: &Symbol, slice_vars: &mut SliceVariables) -> f64 {
  if rule.lhs == *goal {
    0.0
  } else {
    let (name, start, end) = rule
      .lhs
      .parse_annotated()
      .expect("forest nodes are annotated");
    slice_vars.weight(name, start, end, rule.log_prob)
  }
}

/// One iteration of the sliced pipeline: parse under the current thresholds,
/// then sample a derivation from the truncated forest under the uniform edge
/// view. `None` when the slice left nothing to sample.
pub fn sliced_sample(
  grammar: &Wcfg,
  wfsa: &Wfsa,
  root: &Symbol,
  goal: &Symbol,
  algorithm: Algorithm,
  slice_vars: &mut SliceVariables,
  rng: &mut impl Rng,
) -> Result<Option<Derivation>, Error> {
  debug!("parsing");
  let forest = match algorithm {
    Algorithm::Earley => Earley::sliced(grammar, wfsa, slice_vars).intersect(root, goal)?,
    Algorithm::Nederhof => Nederhof::sliced(grammar, wfsa, slice_vars).intersect(root, goal)?,
  };
  if forest.is_empty() {
    debug!("no parse in this slice");
    return Ok(None);
  }
  debug!(rules = forest.len(), "forest");

  let sorted = top_sort(&forest)?;
  let table = inside(&forest, &sorted, |rule| {
    edge_uniform_weight(rule, goal, slice_vars)
  });
  if table[goal] == f64::NEG_INFINITY {
    // only the preserved spine survived, and it is below its threshold
    return Ok(None);
  }

  let sampler = GeneralisedSampler::new(&forest, &table);
  match sampler.sample(goal, &mut |rule| edge_uniform_weight(rule, goal, slice_vars), rng) {
    Ok(d) => Ok(Some(d)),
    Err(Error::EmptyForest(_)) => Ok(None),
    Err(e) => Err(e),
  }
}

/// Slice sampling: dependent samples from the posterior over derivations.
/// Each accepted derivation conditions the next round of threshold draws;
/// iterations whose truncated forest is empty reset the thresholds but keep
/// the conditions, so the chain never loses its footing.
pub fn sliced_sampling(
  grammar: &Wcfg,
  wfsa: &Wfsa,
  root: &Symbol,
  goal: &Symbol,
  settings: &McmcSettings,
) -> Result<Vec<Derivation>, Error> {
  let mut slice_vars = SliceVariables::new(settings.a.0, settings.b.0, settings.seed);
  let mut rng = StdRng::seed_from_u64(settings.seed ^ 0x9e37_79b9_7f4a_7c15);

  let mut samples: Vec<Derivation> = Vec::new();
  let mut n_burn = settings.n_burn;
  let mut iterations = 0;
  while samples.len() < settings.n_samples && iterations < settings.max_iterations {
    iterations += 1;
    if iterations % 10 == 0 {
      info!(iterations, samples = samples.len(), "mcmc");
    }
    match sliced_sample(
      grammar,
      wfsa,
      root,
      goal,
      settings.algorithm,
      &mut slice_vars,
      &mut rng,
    )? {
      Some(d) => {
        let conditions = conditions_of(&d);
        if n_burn > 0 {
          n_burn -= 1;
        } else {
          samples.push(d);
        }
        slice_vars.reset(Some(conditions), Some(settings.a.1), Some(settings.b.1));
      }
      // keep conditions and Beta parameters; only the assignments go
      None => slice_vars.reset(None, None, None),
    }
  }
  Ok(samples)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::reader::parse_bar_str;
  use crate::wfsa::make_linear_fsa;

  fn tokens(s: &str) -> Vec<String> {
    s.split_whitespace().map(|t| t.to_string()).collect()
  }

  #[test]
  fn test_conditions_skip_the_goal_rule() {
    let d = vec![
      Rule::new(
        Symbol::nonterminal("GOAL"),
        vec![Symbol::nonterminal("S").annotate(0, 1)],
        0.0,
      ),
      Rule::new(
        Symbol::nonterminal("S").annotate(0, 1),
        vec![Symbol::terminal("a")],
        -0.5,
      ),
    ];
    let conditions = conditions_of(&d);
    assert_eq!(conditions.len(), 1);
    assert_eq!(conditions[&("S".to_string(), 0, 1)], -0.5);
  }

  #[test]
  fn test_chain_samples_every_iteration_once_conditioned() {
    let grammar = parse_bar_str(
      r"[S] ||| a ||| 0.6
        [S] ||| a ||| 0.4",
      f64::ln,
    )
    .unwrap();
    let fsa = make_linear_fsa(&tokens("a"));
    let settings = McmcSettings {
      n_samples: 50,
      n_burn: 10,
      max_iterations: 10_000,
      seed: 11,
      ..McmcSettings::default()
    };
    let samples = sliced_sampling(
      &grammar,
      &fsa,
      &Symbol::nonterminal("S"),
      &Symbol::nonterminal("GOAL"),
      &settings,
    )
    .unwrap();
    assert_eq!(samples.len(), 50);
    for d in samples {
      assert_eq!(d.len(), 2); // goal rule plus one S rule
      assert_eq!(d[0].lhs, Symbol::nonterminal("GOAL"));
    }
  }

  #[test]
  fn test_chain_frequencies_track_the_posterior() {
    let grammar = parse_bar_str(
      r"[S] ||| a ||| 0.6
        [S] ||| a ||| 0.4",
      f64::ln,
    )
    .unwrap();
    let fsa = make_linear_fsa(&tokens("a"));
    let n = 10_000;
    let settings = McmcSettings {
      n_samples: n,
      n_burn: 100,
      max_iterations: 50_000,
      a: (0.1, 0.3),
      b: (1.0, 1.0),
      seed: 23,
      ..McmcSettings::default()
    };
    let samples = sliced_sampling(
      &grammar,
      &fsa,
      &Symbol::nonterminal("S"),
      &Symbol::nonterminal("GOAL"),
      &settings,
    )
    .unwrap();
    assert_eq!(samples.len(), n);

    let heavier = 0.6_f64.ln();
    let hits = samples
      .iter()
      .filter(|d| d.iter().any(|r| r.log_prob == heavier))
      .count();
    let estimate = hits as f64 / n as f64;
    assert!((estimate - 0.6).abs() < 0.025, "estimate {}", estimate);
  }
}
