use std::fs::File;
use std::io::{BufRead, BufReader};
use std::str::FromStr;

use regex::Regex;

use crate::Err;
use crate::grammar::Wcfg;
use crate::rules::{Rule, Symbol};

/// Supported grammar file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrammarFmt {
  /// One rule per line: `LHS ||| RHS1 RHS2 ... ||| weight`, nonterminals
  /// bracketed as `[X]`. The native format.
  Bar,
  /// A discodop export: `<prefix>.rules` and `<prefix>.lex`, tab-separated,
  /// with fraction or float weights.
  Discodop,
}

impl FromStr for GrammarFmt {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, String> {
    match s {
      "bar" => Ok(Self::Bar),
      "discodop" => Ok(Self::Discodop),
      _ => Err(format!("unknown grammar format: {}", s)),
    }
  }
}

/// Loads a grammar, applying `transform` to every raw weight (identity when
/// the file already stores log-probs, `ln` when it stores probabilities).
pub fn load_grammar(
  path: &str,
  fmt: GrammarFmt,
  transform: impl Fn(f64) -> f64 + Copy,
) -> Result<Wcfg, Err> {
  match fmt {
    GrammarFmt::Bar => parse_bar_str(&std::fs::read_to_string(path)?, transform),
    GrammarFmt::Discodop => load_discodop(path, transform),
  }
}

fn parse_symbol(token: &str) -> Symbol {
  if token.len() > 2 && token.starts_with('[') && token.ends_with(']') {
    Symbol::nonterminal(&token[1..token.len() - 1])
  } else {
    Symbol::terminal(token)
  }
}

/// Parses `bar`-format rules from a string.
pub fn parse_bar_str(src: &str, transform: impl Fn(f64) -> f64) -> Result<Wcfg, Err> {
  lazy_static! {
    static ref BAR_RULE: Regex =
      Regex::new(r"^(\S+)\s*\|\|\|\s*(.*?)\s*\|\|\|\s*(\S+)$").unwrap();
  }

  let mut grammar = Wcfg::new();
  for (n, line) in src.lines().enumerate() {
    let line = line.trim();
    if line.is_empty() {
      continue;
    }
    let caps = BAR_RULE
      .captures(line)
      .ok_or_else(|| format!("line {}: couldn't parse rule: {}", n + 1, line))?;

    let lhs = parse_symbol(&caps[1]);
    if lhs.is_terminal() {
      return Err(format!("line {}: LHS must be a bracketed nonterminal: {}", n + 1, &caps[1]).into());
    }
    let rhs = caps[2].split_whitespace().map(parse_symbol).collect();
    let weight: f64 = caps[3]
      .parse()
      .map_err(|e| format!("line {}: bad weight {}: {}", n + 1, &caps[3], e))?;
    grammar.add(Rule::new(lhs, rhs, transform(weight)));
  }
  Ok(grammar)
}

/// A discodop weight: a `num/denom` fraction or a plain float.
fn parse_weight(token: &str) -> Result<f64, Err> {
  if let Some((num, denom)) = token.split_once('/') {
    let num: f64 = num.parse()?;
    let denom: f64 = denom.parse()?;
    Ok(num / denom)
  } else {
    Ok(token.parse()?)
  }
}

/// Reads `<prefix>.rules` (`LHS <tab> RHS... <tab> yield-function <tab>
/// weight`; the yield function is ignored, intersection is over token
/// strings) and `<prefix>.lex` (`word <tab> TAG weight ...`).
fn load_discodop(prefix: &str, transform: impl Fn(f64) -> f64) -> Result<Wcfg, Err> {
  let mut grammar = Wcfg::new();

  let rules = BufReader::new(File::open(format!("{}.rules", prefix))?);
  for line in rules.lines() {
    let line = line?;
    let fields: Vec<&str> = line.split('\t').filter(|f| !f.is_empty()).collect();
    if fields.is_empty() {
      continue;
    }
    if fields.len() < 4 {
      return Err(format!("malformed discodop rule: {}", line).into());
    }
    let lhs = Symbol::nonterminal(fields[0]);
    let rhs = fields[1..fields.len() - 2]
      .iter()
      .map(|name| Symbol::nonterminal(name))
      .collect();
    let weight = parse_weight(fields[fields.len() - 1])?;
    grammar.add(Rule::new(lhs, rhs, transform(weight)));
  }

  let lex = BufReader::new(File::open(format!("{}.lex", prefix))?);
  for line in lex.lines() {
    let line = line?;
    let fields: Vec<&str> = line.split('\t').filter(|f| !f.is_empty()).collect();
    if fields.is_empty() {
      continue;
    }
    let word = Symbol::terminal(fields[0]);
    for entry in &fields[1..] {
      let Some((tag, weight)) = entry.split_once(' ') else {
        return Err(format!("malformed discodop lexical entry: {}", line).into());
      };
      grammar.add(Rule::new(
        Symbol::nonterminal(tag),
        vec![word.clone()],
        transform(parse_weight(weight)?),
      ));
    }
  }
  Ok(grammar)
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::io::Write;

  #[test]
  fn test_parse_bar_str() {
    let g = parse_bar_str(
      r"[S] ||| [NP] [VP] ||| 1.0
        [NP] ||| the dog ||| 0.5",
      |w| w,
    )
    .unwrap();
    assert_eq!(g.len(), 2);
    let s_rules = g.rules_for(&Symbol::nonterminal("S"));
    assert_eq!(
      s_rules[0].rhs,
      vec![Symbol::nonterminal("NP"), Symbol::nonterminal("VP")]
    );
    let np_rules = g.rules_for(&Symbol::nonterminal("NP"));
    assert_eq!(
      np_rules[0].rhs,
      vec![Symbol::terminal("the"), Symbol::terminal("dog")]
    );
    assert_eq!(np_rules[0].log_prob, 0.5);
  }

  #[test]
  fn test_transform_applies_to_weights() {
    let g = parse_bar_str("[S] ||| a ||| 0.25", f64::ln).unwrap();
    assert_eq!(
      g.rules_for(&Symbol::nonterminal("S"))[0].log_prob,
      0.25_f64.ln()
    );
  }

  #[test]
  fn test_malformed_lines_are_errors() {
    assert!(parse_bar_str("[S] [NP] [VP] 1.0", |w| w).is_err());
    assert!(parse_bar_str("S ||| a ||| 1.0", |w| w).is_err());
    assert!(parse_bar_str("[S] ||| a ||| one", |w| w).is_err());
  }

  #[test]
  fn test_fraction_weights() {
    assert_eq!(parse_weight("1/2").unwrap(), 0.5);
    assert_eq!(parse_weight("0.125").unwrap(), 0.125);
    assert!(parse_weight("x/y").is_err());
  }

  #[test]
  fn test_load_discodop() {
    let dir = std::env::temp_dir().join("pcfg-sampler-discodop-test");
    std::fs::create_dir_all(&dir).unwrap();
    let prefix = dir.join("toy");
    let prefix = prefix.to_str().unwrap();

    let mut rules = std::fs::File::create(format!("{}.rules", prefix)).unwrap();
    writeln!(rules, "S\tNP\tVP\t01\t1/1").unwrap();
    writeln!(rules, "NP\tDT\tNN\t01\t1/2").unwrap();
    let mut lex = std::fs::File::create(format!("{}.lex", prefix)).unwrap();
    writeln!(lex, "dog\tNN 1/4\tVB 1/8").unwrap();

    let g = load_grammar(prefix, GrammarFmt::Discodop, |w| w).unwrap();
    assert_eq!(g.len(), 4);
    assert_eq!(g.rules_for(&Symbol::nonterminal("NP"))[0].log_prob, 0.5);
    assert_eq!(g.rules_for(&Symbol::nonterminal("VB"))[0].log_prob, 0.125);
    assert_eq!(
      g.rules_for(&Symbol::nonterminal("NN"))[0].rhs,
      vec![Symbol::terminal("dog")]
    );
    assert!(g.terminals().contains("dog"));
  }
}
