use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use statrs::distribution::{Beta, Continuous, ContinuousCDF};

use crate::wfsa::StateId;

/// A slice variable is keyed by the annotated nonterminal it thresholds.
pub type SliceKey = (String, StateId, StateId);

/// Per-node slice variables `u` for the sliced engines and the MCMC driver.
/// Each `u` is drawn lazily on first access: from Beta(a, b) for a free
/// node, and from `(0, exp(condition)]` for a node whose condition (the
/// log-prob it carried in the last accepted derivation) is set, so that
/// derivation stays reachable. The driver owns conditions and Beta
/// parameters; the engines only query thresholds and edge weights.
#[derive(Debug)]
pub struct SliceVariables {
  u: HashMap<SliceKey, f64>,
  conditions: HashMap<SliceKey, f64>,
  a: f64,
  b: f64,
  rng: StdRng,
}

impl SliceVariables {
  /// Beta parameters must be positive.
  pub fn new(a: f64, b: f64, seed: u64) -> Self {
    Self {
      u: HashMap::new(),
      conditions: HashMap::new(),
      a,
      b,
      rng: StdRng::seed_from_u64(seed),
    }
  }

  fn beta(&self) -> Beta {
    Beta::new(self.a, self.b).expect("Beta parameters must be positive")
  }

  /// A uniform draw from (0, 1], so thresholds never collapse to zero.
  fn uniform(&mut self) -> f64 {
    1.0 - self.rng.gen_range(0.0..1.0)
  }

  /// The threshold for a node, drawing it on first access. A conditioned
  /// node draws uniformly below its cap (the auxiliary-variable conditional
  /// that makes the edge weights below a valid Gibbs pair); a free node
  /// draws from Beta(a, b).
  pub fn get(&mut self, name: &str, start: StateId, end: StateId) -> f64 {
    let key = (name.to_string(), start, end);
    if let Some(&u) = self.u.get(&key) {
      return u;
    }
    let q = self.uniform();
    let u = match self.conditions.get(&key) {
      Some(&log_cap) => q * log_cap.exp().min(1.0),
      None => self.beta().inverse_cdf(q),
    };
    self.u.insert(key, u);
    u
  }

  /// Whether an edge with weight `log_prob` passes the node's threshold.
  pub fn admits(&mut self, name: &str, start: StateId, end: StateId, log_prob: f64) -> bool {
    log_prob > self.get(name, start, end).ln()
  }

  /// The uniform view of an admitted edge: a constant density over edges
  /// above the threshold, divided by the density of the Beta draw. Edges at
  /// or below the threshold get the semiring zero.
  pub fn weight(&mut self, name: &str, start: StateId, end: StateId, log_prob: f64) -> f64 {
    let u = self.get(name, start, end);
    if log_prob > u.ln() {
      -self.beta().ln_pdf(u)
    } else {
      f64::NEG_INFINITY
    }
  }

  /// Discards all assignments; optionally installs new conditions and new
  /// Beta parameters for the next round of draws.
  pub fn reset(
    &mut self,
    conditions: Option<HashMap<SliceKey, f64>>,
    a: Option<f64>,
    b: Option<f64>,
  ) {
    self.u.clear();
    if let Some(conditions) = conditions {
      self.conditions = conditions;
    }
    if let Some(a) = a {
      self.a = a;
    }
    if let Some(b) = b {
      self.b = b;
    }
  }
}
