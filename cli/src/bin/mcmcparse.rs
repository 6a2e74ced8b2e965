use std::env;
use std::io::BufRead;
use std::process;

use tracing::info;

use cli::{Opts, init_tracing, input_lines, print_samples, value};
use pcfg_sampler::mcmc::{McmcSettings, sliced_sampling};
use pcfg_sampler::rules::Symbol;
use pcfg_sampler::{Err, reader, sentence};

fn usage(prog_name: &str) -> String {
  format!(
    r"Sample derivations of each input sentence by slice sampling (MCMC).

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
  --burn K               Number of initial samples to discard [default: 0]
  --max M                Maximum number of iterations [default: 1000]
  -a BEFORE AFTER        First Beta parameter, before and after the first
                         derivation [default: 0.1 0.3]
  -b BEFORE AFTER        Second Beta parameter, before and after the first
                         derivation [default: 1.0 1.0]
  --seed N               PRNG seed [default: 42]
  -v, --verbose          Increase the verbosity level",
    prog_name
  )
}

fn pair(args: &mut impl Iterator<Item = String>, flag: &str) -> Result<(f64, f64), Err> {
  let before: f64 = value(args, flag)?.parse()?;
  let after: f64 = value(args, flag)?.parse()?;
  Ok((before, after))
}

fn run(opts: &Opts, settings: &McmcSettings) -> Result<(), Err> {
  info!("loading grammar");
  let mut wcfg = reader::load_grammar(opts.grammar()?, opts.grammarfmt, opts.transform())?;
  info!(rules = wcfg.len(), "loaded");

  let root = Symbol::nonterminal(&opts.start);
  let goal = Symbol::nonterminal(&opts.goal);

  for line in input_lines(&opts.input)?.lines() {
    let line = line?;
    if line.trim().is_empty() {
      continue;
    }
    let terminals = wcfg.terminals().clone();
    let (sentence, extra_rules) =
      sentence::make_sentence(&line, &terminals, opts.unkmodel, &opts.default_symbol);
    wcfg.update(extra_rules);

    let samples = sliced_sampling(&wcfg, &sentence.fsa, &root, &goal, settings)?;
    if samples.is_empty() {
      println!("NO PARSE FOUND");
    } else {
      print_samples(&samples, None);
    }
  }
  Ok(())
}

fn main() {
  let mut args = env::args();
  let prog_name = args.next().unwrap_or_else(|| "mcmcparse".to_string());

  let mut opts = Opts::default();
  let mut settings = McmcSettings::default();
  let result = (|| -> Result<(), Err> {
    while let Some(arg) = args.next() {
      match arg.as_str() {
        "-h" | "--help" => {
          println!("{}", usage(&prog_name));
          process::exit(0);
        }
        "--burn" => settings.n_burn = value(&mut args, &arg)?.parse()?,
        "--max" => settings.max_iterations = value(&mut args, &arg)?.parse()?,
        "-a" => settings.a = pair(&mut args, &arg)?,
        "-b" => settings.b = pair(&mut args, &arg)?,
        _ => {
          if !opts.apply(&arg, &mut args)? {
            return Err(format!("unknown option: {}", arg).into());
          }
        }
      }
    }
    opts.grammar()?;
    Ok(())
  })();
  if let Err(e) = result {
    eprintln!("{}\n{}", e, usage(&prog_name));
    process::exit(1);
  }

  settings.n_samples = opts.samples;
  settings.algorithm = opts.intersection;
  settings.seed = opts.seed;

  init_tracing(opts.verbose);
  if let Err(e) = run(&opts, &settings) {
    eprintln!("{}", e);
    process::exit(1);
  }
}
