use std::collections::HashSet;
use std::str::FromStr;

use tracing::debug;

use crate::rules::{Rule, Symbol};
use crate::wfsa::{Wfsa, make_linear_fsa};

/// How tokens outside the grammar's vocabulary are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnkModel {
  /// Keep the token and add a `default_nt -> token` rule with unit weight.
  Passthrough,
  /// Replace the token with the bare `UNK` signature.
  StfdBase,
  /// Replace the token with a Stanford-style signature carrying case,
  /// digit, dash and one-letter-suffix features.
  Stfd4,
  /// Like `Stfd4`, plus known-lowercase and a longer suffix.
  Stfd6,
}

impl FromStr for UnkModel {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, String> {
    match s {
      "passthrough" => Ok(Self::Passthrough),
      "stfdbase" => Ok(Self::StfdBase),
      "stfd4" => Ok(Self::Stfd4),
      "stfd6" => Ok(Self::Stfd6),
      _ => Err(format!("unknown word model: {}", s)),
    }
  }
}

impl UnkModel {
  /// The signature class standing in for an unknown word. Signatures only
  /// help when the grammar was trained with matching classes; otherwise the
  /// sentence simply fails to parse.
  fn signature(&self, word: &str, position: usize, vocabulary: &HashSet<String>) -> String {
    if *self == Self::StfdBase {
      return "UNK".to_string();
    }
    let mut sig = String::from("UNK");

    let first_upper = word.chars().next().is_some_and(|c| c.is_uppercase());
    if first_upper {
      sig.push_str(if position == 0 { "-INITC" } else { "-CAPS" });
      if *self == Self::Stfd6 && vocabulary.contains(&word.to_lowercase()) {
        sig.push_str("-KNOWNLC");
      }
    } else if word.chars().any(|c| c.is_lowercase()) {
      sig.push_str("-LC");
    }
    if word.chars().any(|c| c.is_ascii_digit()) {
      sig.push_str("-NUM");
    }
    if word.contains('-') {
      sig.push_str("-DASH");
    }

    let suffix_len = if *self == Self::Stfd6 { 2 } else { 1 };
    let tail: String = word
      .chars()
      .rev()
      .take(suffix_len)
      .collect::<Vec<_>>()
      .into_iter()
      .rev()
      .collect();
    if word.chars().count() > 3 && tail.chars().all(|c| c.is_lowercase()) {
      sig.push('-');
      sig.push_str(&tail);
    }
    sig
  }
}

/// A tokenised input sentence and the chain automaton accepting it.
#[derive(Debug)]
pub struct Sentence {
  pub words: Vec<String>,
  pub fsa: Wfsa,
}

/// Tokenises one input line against the grammar's vocabulary. Unknown words
/// are kept, passed through, or replaced by a signature according to the
/// model; the returned rules (pass-through only) are to be merged into the
/// grammar before parsing.
pub fn make_sentence(
  line: &str,
  terminals: &HashSet<String>,
  unk_model: Option<UnkModel>,
  default_nt: &str,
) -> (Sentence, Vec<Rule>) {
  let mut words = Vec::new();
  let mut extra_rules = Vec::new();

  for (position, token) in line.split_whitespace().enumerate() {
    if terminals.contains(token) {
      words.push(token.to_string());
      continue;
    }
    debug!(token, "unknown word");
    match unk_model {
      None => words.push(token.to_string()),
      Some(UnkModel::Passthrough) => {
        // unit weight in the log semiring
        extra_rules.push(Rule::new(
          Symbol::nonterminal(default_nt),
          vec![Symbol::terminal(token)],
          0.0,
        ));
        words.push(token.to_string());
      }
      Some(model) => words.push(model.signature(token, position, terminals)),
    }
  }

  let fsa = make_linear_fsa(&words);
  (Sentence { words, fsa }, extra_rules)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn vocabulary(words: &[&str]) -> HashSet<String> {
    words.iter().map(|w| w.to_string()).collect()
  }

  #[test]
  fn test_known_words_pass_untouched() {
    let (sentence, extra) = make_sentence(
      "the dog barks",
      &vocabulary(&["the", "dog", "barks"]),
      None,
      "X",
    );
    assert_eq!(sentence.words, vec!["the", "dog", "barks"]);
    assert!(extra.is_empty());
    assert_eq!(sentence.fsa.n_states(), 4);
  }

  #[test]
  fn test_passthrough_adds_a_unit_rule() {
    let (sentence, extra) = make_sentence(
      "the wug barks",
      &vocabulary(&["the", "barks"]),
      Some(UnkModel::Passthrough),
      "X",
    );
    assert_eq!(sentence.words, vec!["the", "wug", "barks"]);
    assert_eq!(extra.len(), 1);
    assert_eq!(extra[0].lhs, Symbol::nonterminal("X"));
    assert_eq!(extra[0].rhs, vec![Symbol::terminal("wug")]);
    assert_eq!(extra[0].log_prob, 0.0);
  }

  #[test]
  fn test_signatures_replace_unknown_words() {
    let vocab = vocabulary(&["the"]);
    let (sentence, extra) =
      make_sentence("the Wug-34", &vocab, Some(UnkModel::Stfd4), "X");
    assert!(extra.is_empty());
    assert_eq!(sentence.words[0], "the");
    assert_eq!(sentence.words[1], "UNK-CAPS-NUM-DASH");
  }

  #[test]
  fn test_base_signature_is_bare() {
    let (sentence, _) =
      make_sentence("wug", &vocabulary(&[]), Some(UnkModel::StfdBase), "X");
    assert_eq!(sentence.words, vec!["UNK"]);
  }

  #[test]
  fn test_known_lowercase_feature() {
    let vocab = vocabulary(&["dog"]);
    let (sentence, _) = make_sentence("Dog", &vocab, Some(UnkModel::Stfd6), "X");
    assert_eq!(sentence.words, vec!["UNK-INITC-KNOWNLC"]);
  }

  #[test]
  fn test_suffix_features() {
    let (s4, _) = make_sentence("quickly", &vocabulary(&[]), Some(UnkModel::Stfd4), "X");
    assert_eq!(s4.words, vec!["UNK-LC-y"]);
    let (s6, _) = make_sentence("quickly", &vocabulary(&[]), Some(UnkModel::Stfd6), "X");
    assert_eq!(s6.words, vec!["UNK-LC-ly"]);
  }
}
