use std::env;
use std::io::BufRead;
use std::process;

use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::info;

use cli::{Opts, init_tracing, input_lines, print_samples};
use pcfg_sampler::rules::Symbol;
use pcfg_sampler::sampler::exact_sample;
use pcfg_sampler::{Err, Error, reader, sentence};

fn usage(prog_name: &str) -> String {
  format!(
    r"Sample derivations of each input sentence from the exact posterior.

Usage: {} GRAMMAR [INPUT] [options]

Arguments:
  GRAMMAR                path to CFG rules (or prefix for the discodop format)
  INPUT                  input corpus, one sentence per line (defaults to stdin)

Options:
  -h, --help             Print this message
  --intersection NAME    nederhof (bottom-up) or earley (top-down) [default: nederhof]
  --log                  Apply the natural log to the rule weights
  --start S              Start symbol of the grammar [default: S]
  --goal GOAL            Goal symbol for the intersection [default: GOAL]
  --grammarfmt FMT       bar or discodop [default: bar]
  --unkmodel MODEL       passthrough, stfdbase, stfd4 or stfd6
  --default-symbol X     Nonterminal for pass-through rules [default: X]
  --samples N            Number of samples per sentence [default: 100]
  --seed N               PRNG seed [default: 42]
  -v, --verbose          Increase the verbosity level",
    prog_name
  )
}

fn run(opts: &Opts) -> Result<(), Err> {
  info!("loading grammar");
  let mut wcfg = reader::load_grammar(opts.grammar()?, opts.grammarfmt, opts.transform())?;
  info!(rules = wcfg.len(), "loaded");

  let root = Symbol::nonterminal(&opts.start);
  let goal = Symbol::nonterminal(&opts.goal);
  let mut rng = StdRng::seed_from_u64(opts.seed);

  for line in input_lines(&opts.input)?.lines() {
    let line = line?;
    if line.trim().is_empty() {
      continue;
    }
    let terminals = wcfg.terminals().clone();
    let (sentence, extra_rules) =
      sentence::make_sentence(&line, &terminals, opts.unkmodel, &opts.default_symbol);
    wcfg.update(extra_rules);

    match exact_sample(
      &wcfg,
      &sentence.fsa,
      &root,
      &goal,
      opts.samples,
      opts.intersection,
      &mut rng,
    ) {
      Ok(result) => print_samples(&result.samples, Some(result.inside_goal)),
      Err(Error::NoParse) => println!("NO PARSE FOUND"),
      Err(e) => return Err(e.into()),
    }
  }
  Ok(())
}

fn main() {
  let mut args = env::args();
  let prog_name = args.next().unwrap_or_else(|| "parse".to_string());

  let mut opts = Opts::default();
  let result = (|| -> Result<(), Err> {
    while let Some(arg) = args.next() {
      if arg == "-h" || arg == "--help" {
        println!("{}", usage(&prog_name));
        process::exit(0);
      }
      if !opts.apply(&arg, &mut args)? {
        return Err(format!("unknown option: {}", arg).into());
      }
    }
    opts.grammar()?;
    Ok(())
  })();
  if let Err(e) = result {
    eprintln!("{}\n{}", e, usage(&prog_name));
    process::exit(1);
  }

  init_tracing(opts.verbose);
  if let Err(e) = run(&opts) {
    eprintln!("{}", e);
    process::exit(1);
  }
}
