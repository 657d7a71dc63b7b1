//! Head-to-head CLI.
//!
//! Evaluates strategy B against strategy A over full ranges, optionally
//! resolving either side's endgame on the fly. Positional arguments follow
//! the layout of the strategy training pipeline: a game params file, then
//! per-side card / betting / CFR params, iteration numbers, the board
//! sample count, and the resolve configuration. Results go to stderr in
//! small blinds and milli-big-blinds per game.

use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::Parser;

use poker_eval_core::betting::{BettingConfig, BettingTree};
use poker_eval_core::board::BoardTree;
use poker_eval_core::buckets::{Buckets, CardAbstractionConfig};
use poker_eval_core::sampler;
use poker_eval_core::strategy::{strategy_dir, CfrConfig, StrategyId, StrategyStore};
use poker_eval_core::walker::{Matchup, MatchupConfig, MatchupReport, SubgameSpec};
use poker_eval_core::{EvalResult, Game, GameParams};

#[derive(Parser)]
#[command(name = "head_to_head")]
#[command(about = "Head-to-head EV of strategy B versus strategy A")]
struct Cli {
    game_params: PathBuf,
    a_card_params: PathBuf,
    b_card_params: PathBuf,
    a_betting_params: PathBuf,
    b_betting_params: PathBuf,
    a_cfr_params: PathBuf,
    b_cfr_params: PathBuf,
    a_it: u32,
    b_it: u32,
    /// 0 processes every final-street board.
    num_sampled_max_street_boards: usize,
    /// -1 when neither side resolves.
    #[arg(allow_negative_numbers = true)]
    resolve_st: i32,
    /// "true" or "false".
    resolve_a: String,
    /// "true" or "false".
    resolve_b: String,
    /// Three files per resolving side (card, betting, CFR params), A first.
    subgame_params: Vec<PathBuf>,
    /// Base directory holding strategy directories.
    #[arg(long, default_value = "cfr")]
    cfr_base: PathBuf,
    /// RNG seed for board sampling; defaults to wall time.
    #[arg(long)]
    seed: Option<u64>,
}

fn usage() -> ! {
    eprintln!(
        "USAGE: head_to_head <game params> <A card params> <B card params> \
         <A betting params> <B betting params> <A CFR params> <B CFR params> \
         <A it> <B it> <num sampled max street boards> <resolve st> <resolve A> \
         <resolve B> (<A resolve card params> <A resolve betting params> \
         <A resolve CFR params>) (<B resolve card params> <B resolve betting \
         params> <B resolve CFR params>) [--cfr-base DIR] [--seed N]"
    );
    eprintln!();
    eprintln!("Specify 0 for <num sampled max street boards> to not sample");
    eprintln!("<resolve A> and <resolve B> must be \"true\" or \"false\"");
    process::exit(255);
}

fn parse_bool(text: &str) -> bool {
    match text {
        "true" => true,
        "false" => false,
        _ => usage(),
    }
}

/// Subgame inputs for one side, loaded from a (card, betting, cfr) triple.
fn load_subgame(
    game: &Game,
    board_tree: &BoardTree,
    files: &[PathBuf],
) -> EvalResult<SubgameSpec> {
    let card = CardAbstractionConfig::load(&files[0])?;
    let betting = BettingConfig::load(&files[1])?;
    // The CFR params only pin the resolve identity; nothing is read from
    // them beyond validity.
    CfrConfig::load(&files[2])?;
    let buckets = Arc::new(Buckets::load(game, board_tree, &card)?);
    Ok(SubgameSpec { betting, buckets })
}

/// Street coverage each side needs from its base strategy files. A
/// resolving side replaces only its final-street lookups with the
/// resolver's output; on every earlier street — including streets at or
/// past the resolve street — the walker still reads the base store. So a
/// non-shared resolving side can skip loading the final street and nothing
/// else; a shared store loads everything.
fn street_masks(
    max_street: u8,
    resolve_a: bool,
    resolve_b: bool,
    shared: bool,
) -> (Vec<bool>, Vec<bool>) {
    let streets = usize::from(max_street) + 1;
    let mask = |resolving: bool| -> Vec<bool> {
        (0..streets)
            .map(|st| !resolving || shared || st < usize::from(max_street))
            .collect()
    };
    (mask(resolve_a), mask(resolve_b))
}

fn print_report(report: &MatchupReport) {
    eprintln!(
        "Avg B outcome: {:.6} ({:.1} mbb/g)",
        report.avg_b_outcome, report.b_mbb_per_g
    );
    eprintln!(
        "Avg P1 outcome: {:.6} ({:.1} mbb/g)",
        report.avg_p1_outcome, report.p1_mbb_per_g
    );
    eprintln!("{:.1} secs spent resolving", report.resolving_secs);
    if report.num_resolves > 0 {
        eprintln!(
            "Avg {:.2} secs per resolve ({} resolves)",
            report.resolving_secs / f64::from(report.num_resolves),
            report.num_resolves
        );
    }
}

fn run(cli: &Cli) -> EvalResult<()> {
    let resolve_a = parse_bool(&cli.resolve_a);
    let resolve_b = parse_bool(&cli.resolve_b);
    let expected_subgame_files =
        3 * (usize::from(resolve_a) + usize::from(resolve_b));
    if cli.subgame_params.len() != expected_subgame_files {
        usage();
    }
    if !resolve_a && !resolve_b && cli.resolve_st != -1 {
        eprintln!("resolve_st should be -1 if not resolving either A or B");
        process::exit(255);
    }

    let game = Arc::new(Game::new(GameParams::load(&cli.game_params)?)?);
    let board_tree = Arc::new(BoardTree::build(&game));

    let a_card = CardAbstractionConfig::load(&cli.a_card_params)?;
    let b_card = CardAbstractionConfig::load(&cli.b_card_params)?;
    let a_betting = BettingConfig::load(&cli.a_betting_params)?;
    let b_betting = BettingConfig::load(&cli.b_betting_params)?;
    let a_cfr = CfrConfig::load(&cli.a_cfr_params)?;
    let b_cfr = CfrConfig::load(&cli.b_cfr_params)?;

    let a_buckets = Arc::new(Buckets::load(&game, &board_tree, &a_card)?);
    let b_buckets = if a_card.name == b_card.name {
        eprintln!("Sharing buckets");
        Arc::clone(&a_buckets)
    } else {
        eprintln!("Not sharing buckets");
        Arc::new(Buckets::load(&game, &board_tree, &b_card)?)
    };

    let a_tree = Arc::new(BettingTree::build(&game, &a_betting));
    let b_tree = Arc::new(BettingTree::build(&game, &b_betting));

    let a_id = StrategyId {
        card_abstraction: a_card.name.clone(),
        betting_abstraction: a_betting.name.clone(),
        cfr_config: a_cfr.name.clone(),
        iteration: cli.a_it,
    };
    let b_id = StrategyId {
        card_abstraction: b_card.name.clone(),
        betting_abstraction: b_betting.name.clone(),
        cfr_config: b_cfr.name.clone(),
        iteration: cli.b_it,
    };
    let shared = a_id == b_id;
    let (a_streets, b_streets) = street_masks(game.max_street(), resolve_a, resolve_b, shared);

    let a_dir = strategy_dir(&cli.cfr_base, &game, &a_card.name, &a_betting.name, &a_cfr.name);
    let a_probs = Arc::new(StrategyStore::read(&a_dir, cli.a_it, &a_streets)?);
    let b_probs = if shared {
        eprintln!("Sharing probs between A and B");
        Arc::clone(&a_probs)
    } else {
        eprintln!("A and B do not share probs");
        let b_dir =
            strategy_dir(&cli.cfr_base, &game, &b_card.name, &b_betting.name, &b_cfr.name);
        Arc::new(StrategyStore::read(&b_dir, cli.b_it, &b_streets)?)
    };

    let a_subgame = if resolve_a {
        Some(load_subgame(&game, &board_tree, &cli.subgame_params[..3])?)
    } else {
        None
    };
    let b_subgame = if resolve_b {
        let start = if resolve_a { 3 } else { 0 };
        Some(load_subgame(
            &game,
            &board_tree,
            &cli.subgame_params[start..start + 3],
        )?)
    } else {
        None
    };

    let matchup = Matchup::new(
        game,
        board_tree,
        a_tree,
        b_tree,
        a_buckets,
        b_buckets,
        a_probs,
        b_probs,
        a_subgame,
        b_subgame,
        MatchupConfig {
            resolve_st: cli.resolve_st,
            resolve_a,
            resolve_b,
            ..MatchupConfig::default()
        },
    )?;

    let seed = cli.seed.unwrap_or_else(sampler::wall_clock_seed);
    let report = matchup.run(cli.num_sampled_max_street_boards, seed)?;
    print_report(&report);
    Ok(())
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(_) => usage(),
    };
    if let Err(e) = run(&cli) {
        eprintln!("{e}");
        process::exit(255);
    }
}
