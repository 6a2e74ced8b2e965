use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use tracing::debug;

use crate::Error;
use crate::agenda::Agenda;
use crate::grammar::Wcfg;
use crate::item::Item;
use crate::rules::{Rule, Symbol};
use crate::wfsa::{StateId, Wfsa};

type SpanKey = (Symbol, StateId, StateId);

/// Extracts the intersected grammar from the passive set: starting at each
/// root-spanning complete item, walks the annotated RHS nonterminals
/// downward, emitting one intersected rule per complete item visited. A walk
/// that reaches a span with no complete items (possible when the slice
/// filter truncated it) is broken: only that root-derivation's pending rules
/// are dropped, and other root items may still succeed. When anything was
/// emitted, a `goal -> root` rule carrying the final state's weight caps the
/// forest. An empty result means the sentence has no parse.
pub fn extract_forest(
  agenda: &Agenda,
  wfsa: &Wfsa,
  root: &Symbol,
  goal: &Symbol,
) -> Result<Wcfg, Error> {
  let mut forest = Wcfg::new();

  let mut complete: HashMap<SpanKey, Vec<Rc<Item>>> = HashMap::new();
  for item in agenda.iter_complete() {
    complete
      .entry((item.rule.lhs.clone(), item.start, item.dot))
      .or_default()
      .push(item.clone());
  }

  // the sentence's boundary pair: the first root item joining an initial
  // state to a final one
  let Some(root_item) = agenda
    .iter_complete()
    .find(|item| item.rule.lhs == *root && wfsa.is_initial(item.start) && wfsa.is_final(item.dot))
  else {
    return Ok(forest);
  };
  let (initial, fin) = (root_item.start, root_item.dot);

  // spans whose rules already went into the forest; a broken walk leaves no
  // trace here, so a later root item expands its spans afresh
  let mut emitted: HashSet<SpanKey> = HashSet::new();

  let root_items = complete
    .get(&(root.clone(), initial, fin))
    .cloned()
    .unwrap_or_default();
  for item in root_items {
    let mut pending = vec![item.intersected()];
    let mut queued: HashSet<SpanKey> = HashSet::new();
    let mut stack: Vec<SpanKey> = Vec::new();
    enqueue_children(&item, &emitted, &mut queued, &mut stack);

    let mut broken = false;
    while let Some(key) = stack.pop() {
      let Some(items) = complete.get(&key) else {
        broken = true;
        break;
      };
      for item in items {
        pending.push(item.intersected());
        enqueue_children(item, &emitted, &mut queued, &mut stack);
      }
    }

    if broken {
      debug!(lhs = %item.rule.lhs, "broken root derivation, dropping its rules");
      continue;
    }
    forest.update(pending);
    emitted.extend(queued);
  }

  if !forest.is_empty() {
    let weight = wfsa.final_weight(fin)?;
    forest.add(Rule::new(goal.clone(), vec![root.annotate(initial, fin)], weight));
  }
  Ok(forest)
}

/// Queues the spans of an item's RHS nonterminals for expansion, skipping
/// spans already emitted or already queued by this walk.
fn enqueue_children(
  item: &Item,
  emitted: &HashSet<SpanKey>,
  queued: &mut HashSet<SpanKey>,
  stack: &mut Vec<SpanKey>,
) {
  let mut positions = item.inner.clone();
  positions.push(item.dot);
  for (k, sym) in item.rule.rhs.iter().enumerate() {
    if sym.is_terminal() {
      continue;
    }
    let key = (sym.clone(), positions[k], positions[k + 1]);
    if !emitted.contains(&key) && queued.insert(key.clone()) {
      stack.push(key);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::Intersect;
  use crate::earley::Earley;
  use crate::reader::parse_bar_str;
  use crate::wfsa::make_linear_fsa;

  fn tokens(s: &str) -> Vec<String> {
    s.split_whitespace().map(|t| t.to_string()).collect()
  }

  #[test]
  fn test_goal_rule_carries_final_weight() {
    let grammar = parse_bar_str(r"[S] ||| a ||| 1.0", f64::ln).unwrap();
    let mut fsa = make_linear_fsa(&tokens("a"));
    fsa.make_final(1, -0.5);

    let goal = Symbol::nonterminal("GOAL");
    let forest = Earley::new(&grammar, &fsa)
      .intersect(&Symbol::nonterminal("S"), &goal)
      .unwrap();
    assert_eq!(forest.rules_for(&goal)[0].log_prob, -0.5);
  }

  #[test]
  fn test_shared_subforests_are_emitted_once() {
    // both S rules over (0,2) share the same X children
    let grammar = parse_bar_str(
      r"[S] ||| [X] [X] ||| 0.6
        [S] ||| [X] [X] ||| 0.4
        [X] ||| x ||| 1.0",
      f64::ln,
    )
    .unwrap();
    let fsa = make_linear_fsa(&tokens("x x"));
    let forest = Earley::new(&grammar, &fsa)
      .intersect(&Symbol::nonterminal("S"), &Symbol::nonterminal("GOAL"))
      .unwrap();

    let x0 = Symbol::nonterminal("X").annotate(0, 1);
    let x1 = Symbol::nonterminal("X").annotate(1, 2);
    assert_eq!(forest.rules_for(&x0).len(), 1);
    assert_eq!(forest.rules_for(&x1).len(), 1);
    assert_eq!(forest.rules_for(&Symbol::nonterminal("S").annotate(0, 2)).len(), 2);
    // 2 S rules + 2 X rules + GOAL
    assert_eq!(forest.len(), 5);
  }
}
