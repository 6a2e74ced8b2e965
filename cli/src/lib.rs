use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufRead, BufReader};

use pcfg_sampler::reader::GrammarFmt;
use pcfg_sampler::sentence::UnkModel;
use pcfg_sampler::{Algorithm, Derivation, Err};
use tracing_subscriber::EnvFilter;

/// Options shared by both entry points.
pub struct Opts {
  pub grammar: Option<String>,
  pub input: Option<String>,
  pub intersection: Algorithm,
  pub log: bool,
  pub start: String,
  pub goal: String,
  pub grammarfmt: GrammarFmt,
  pub unkmodel: Option<UnkModel>,
  pub default_symbol: String,
  pub samples: usize,
  pub seed: u64,
  pub verbose: bool,
}

impl Default for Opts {
  fn default() -> Self {
    Self {
      grammar: None,
      input: None,
      intersection: Algorithm::Nederhof,
      log: false,
      start: "S".to_string(),
      goal: "GOAL".to_string(),
      grammarfmt: GrammarFmt::Bar,
      unkmodel: None,
      default_symbol: "X".to_string(),
      samples: 100,
      seed: 42,
      verbose: false,
    }
  }
}

/// The flag's value, or an error naming the flag.
pub fn value(args: &mut impl Iterator<Item = String>, flag: &str) -> Result<String, Err> {
  args.next().ok_or_else(|| format!("{} needs a value", flag).into())
}

impl Opts {
  /// Handles one common flag or positional; returns false when the argument
  /// belongs to the caller.
  pub fn apply(&mut self, arg: &str, args: &mut impl Iterator<Item = String>) -> Result<bool, Err> {
    match arg {
      "--intersection" => self.intersection = value(args, arg)?.parse()?,
      "--log" => self.log = true,
      "--start" => self.start = value(args, arg)?,
      "--goal" => self.goal = value(args, arg)?,
      "--grammarfmt" => self.grammarfmt = value(args, arg)?.parse()?,
      "--unkmodel" => self.unkmodel = Some(value(args, arg)?.parse()?),
      "--default-symbol" => self.default_symbol = value(args, arg)?,
      "--samples" => self.samples = value(args, arg)?.parse()?,
      "--seed" => self.seed = value(args, arg)?.parse()?,
      "--verbose" | "-v" => self.verbose = true,
      _ if !arg.starts_with('-') => {
        if self.grammar.is_none() {
          self.grammar = Some(arg.to_string());
        } else if self.input.is_none() {
          self.input = Some(arg.to_string());
        } else {
          return Err(format!("unexpected argument: {}", arg).into());
        }
      }
      _ => return Ok(false),
    }
    Ok(true)
  }

  pub fn grammar(&self) -> Result<&str, Err> {
    self
      .grammar
      .as_deref()
      .ok_or_else(|| "missing grammar path".into())
  }

  /// Identity by default; natural log with --log, for grammars storing
  /// probabilities rather than log-probs.
  pub fn transform(&self) -> fn(f64) -> f64 {
    if self.log { f64::ln } else { |w| w }
  }
}

pub fn init_tracing(verbose: bool) {
  let level = if verbose { "debug" } else { "info" };
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
    .with_writer(io::stderr)
    .init();
}

/// One sentence per line, from a file or stdin.
pub fn input_lines(input: &Option<String>) -> Result<Box<dyn BufRead>, Err> {
  Ok(match input {
    Some(path) => Box::new(BufReader::new(File::open(path)?)),
    None => Box::new(BufReader::new(io::stdin())),
  })
}

/// Prints one block per distinct derivation, most frequent first (first
/// sampled wins ties): a header with the multiplicity, the empirical
/// estimate, the posterior probability when the partition function is known,
/// and the log score, then the derivation's rules.
pub fn print_samples(samples: &[Derivation], inside_goal: Option<f64>) {
  let mut counts: Vec<(&Derivation, usize)> = Vec::new();
  let mut index: HashMap<&Derivation, usize> = HashMap::new();
  for d in samples {
    match index.get(d) {
      Some(&k) => counts[k].1 += 1,
      None => {
        index.insert(d, counts.len());
        counts.push((d, 1));
      }
    }
  }
  counts.sort_by(|x, y| y.1.cmp(&x.1));

  for (d, n) in counts {
    let score: f64 = d.iter().map(|r| r.log_prob).sum();
    let estimate = n as f64 / samples.len() as f64;
    match inside_goal {
      Some(z) => println!(
        "# n={} estimate={} prob={} score={}",
        n,
        estimate,
        (score - z).exp(),
        score
      ),
      None => println!("# n={} estimate={} score={}", n, estimate, score),
    }
    for rule in d {
      println!("{}", rule);
    }
    println!();
  }
}
