use std::fs::{self, File};
use std::io::{self, BufWriter};
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use ndarray::{Array1, Axis};

use crate::config::ResolveConfig;
use crate::datagen::{generate_leduc_river, write_json_lines};
use crate::display::{print_error, print_section, print_success, strategy_table};
use crate::equity::{leduc, EquitySpec, MatrixEquity, TerminalEquity};
use crate::error::{LookaheadError, LookaheadResult};
use crate::player::Player;
use crate::ranges::{normalize, parse_range};
use crate::resolving::Resolving;
use crate::tree::PublicTree;
use crate::value::{ShowdownValue, ValueFunction};

#[derive(Parser)]
#[command(name = "gto-resolve", version = "1.0.0", about = "Depth-limited CFR+ re-solving for heads-up poker subgames.")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Re-solve a public tree and print the root strategy
    Solve(SolveArgs),
    /// Generate value-function training samples on Leduc river spots
    Generate {
        /// Number of batched lookaheads to solve
        #[arg(long, default_value = "10")]
        batches: usize,
        /// Spots solved together in one lookahead
        #[arg(long, default_value = "8")]
        batch_size: usize,
        /// Base seed; batch i uses seed + i
        #[arg(long, default_value = "0")]
        seed: u64,
        /// Pot sizes to sample from (comma separated)
        #[arg(long, default_value = "2,4,8")]
        pots: String,
        /// Solver configuration file (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// CFR iterations per solve
        #[arg(short = 'n', long)]
        iters: Option<usize>,
        /// Warm-up iterations left out of the averages
        #[arg(long)]
        skip: Option<usize>,
        /// Output file (JSON lines); stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Args)]
struct SolveArgs {
    /// Public tree file (JSON); requires --equity
    #[arg(long)]
    tree: Option<PathBuf>,
    /// Hand strengths and blockers file (JSON); requires --tree
    #[arg(long)]
    equity: Option<PathBuf>,
    /// Solver configuration file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Leduc board card (0-5) for the built-in river spot; preflop when omitted
    #[arg(short, long)]
    board: Option<usize>,
    /// Pot of the built-in spot
    #[arg(long, default_value = "2")]
    pot: f32,
    /// Re-solving player's range (comma separated weights); uniform when omitted
    #[arg(long)]
    player: Option<String>,
    /// Opponent's range (comma separated weights); uniform when omitted
    #[arg(long, conflicts_with = "opponent_cfvs")]
    opponent: Option<String>,
    /// Opponent's achieved values; re-solves with a reconstructed opponent range
    #[arg(long)]
    opponent_cfvs: Option<String>,
    /// CFR iterations
    #[arg(short = 'n', long)]
    iters: Option<usize>,
    /// Warm-up iterations left out of the averages
    #[arg(long)]
    skip: Option<usize>,
    /// Print the full results as JSON
    #[arg(long)]
    json: bool,
}

pub fn run() {
    env_logger::init();
    let cli = Cli::parse();
    dispatch(cli);
}

fn dispatch(cli: Cli) {
    let outcome = match cli.command {
        Commands::Solve(args) => cmd_solve(args),
        Commands::Generate {
            batches,
            batch_size,
            seed,
            pots,
            config,
            iters,
            skip,
            output,
        } => cmd_generate(batches, batch_size, seed, pots, config, iters, skip, output),
    };
    if let Err(e) = outcome {
        print_error(&e.to_string());
        std::process::exit(1);
    }
}

fn load_config(path: Option<&PathBuf>, iters: Option<usize>, skip: Option<usize>) -> LookaheadResult<ResolveConfig> {
    let mut config = match path {
        Some(path) => ResolveConfig::from_json_file(path)?,
        None => ResolveConfig::default(),
    };
    if let Some(iters) = iters {
        config.cfr_iters = iters;
    }
    if let Some(skip) = skip {
        config.cfr_skip_iters = skip;
    } else if iters.is_some() {
        config.cfr_skip_iters = config.cfr_skip_iters.min(config.cfr_iters / 2);
    }
    Ok(config)
}

struct SolveSpot {
    tree: PublicTree,
    terminal_equity: Arc<MatrixEquity>,
    value_function: Arc<dyn ValueFunction>,
    possible_hands: Vec<bool>,
    hand_names: Vec<String>,
}

fn load_spot(args: &SolveArgs) -> LookaheadResult<SolveSpot> {
    match (&args.tree, &args.equity) {
        (Some(tree_path), Some(equity_path)) => {
            let tree = PublicTree::from_json_file(tree_path)?;
            let spec: EquitySpec = serde_json::from_str(&fs::read_to_string(equity_path)?)?;
            let terminal_equity = Arc::new(spec.into_equity());
            let hands = terminal_equity.hand_count();
            Ok(SolveSpot {
                tree,
                value_function: Arc::new(ShowdownValue::new(Arc::clone(&terminal_equity))),
                terminal_equity,
                possible_hands: vec![true; hands],
                hand_names: (0..hands).map(|h| format!("#{}", h)).collect(),
            })
        }
        (None, None) => {
            if !(args.pot > 0.0) {
                return Err(LookaheadError::InvalidConfig("pot must be positive".to_string()));
            }
            let hand_names = (0..leduc::HAND_COUNT).map(|h| leduc::hand_name(h).to_string()).collect();
            let value_function: Arc<dyn ValueFunction> = Arc::new(ShowdownValue::leduc());
            match args.board {
                Some(card) if card >= leduc::HAND_COUNT => Err(LookaheadError::InvalidConfig(format!(
                    "board card must be below {}, got {}",
                    leduc::HAND_COUNT,
                    card
                ))),
                Some(card) => Ok(SolveSpot {
                    tree: PublicTree::bet_or_check(Player::P1, 2, args.pot, args.pot).with_board(vec![card as u8]),
                    terminal_equity: Arc::new(leduc::river(card)),
                    value_function,
                    possible_hands: leduc::possible_hands(Some(card)),
                    hand_names,
                }),
                None => Ok(SolveSpot {
                    tree: PublicTree::bet_or_check(Player::P1, 1, args.pot, args.pot).depth_limited(1),
                    terminal_equity: Arc::new(leduc::preflop()),
                    value_function,
                    possible_hands: leduc::possible_hands(None),
                    hand_names,
                }),
            }
        }
        _ => Err(LookaheadError::InvalidConfig(
            "--tree and --equity must be given together".to_string(),
        )),
    }
}

fn range_arg(text: Option<&String>, possible_hands: &[bool]) -> LookaheadResult<Array1<f32>> {
    let weights = match text {
        Some(text) => parse_range(text, possible_hands.len())?,
        None => Array1::ones(possible_hands.len()),
    };
    normalize(weights.view(), possible_hands)
}

fn cmd_solve(args: SolveArgs) -> LookaheadResult<()> {
    let spot = load_spot(&args)?;
    let mut config = load_config(args.config.as_ref(), args.iters, args.skip)?;
    config.hand_count = spot.hand_names.len();
    config.validate()?;

    let player_range = range_arg(args.player.as_ref(), &spot.possible_hands)?.insert_axis(Axis(0));
    let mut resolving = Resolving::new(config.clone(), spot.terminal_equity.clone())
        .with_value_function(Arc::clone(&spot.value_function))
        .with_possible_hands(spot.possible_hands.clone());

    let results = match &args.opponent_cfvs {
        Some(text) => {
            let cfvs = parse_range(text, config.hand_count)?.insert_axis(Axis(0));
            resolving.resolve(&spot.tree, player_range.view(), cfvs.view())?
        }
        None => {
            let opponent_range = range_arg(args.opponent.as_ref(), &spot.possible_hands)?.insert_axis(Axis(0));
            resolving.resolve_first_node(&spot.tree, player_range.view(), opponent_range.view())?
        }
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(results)?);
        return Ok(());
    }

    print_section(
        "Re-solved lookahead",
        &format!(
            "street {}, pot {}, depth {}, {} iterations ({} averaged)",
            spot.tree.street,
            spot.tree.root.pot,
            spot.tree.depth(),
            config.cfr_iters,
            config.averaged_iters()
        ),
    );
    println!();
    println!("{}", strategy_table(results, &spot.tree.actions(), &spot.hand_names, 0));
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn cmd_generate(
    batches: usize,
    batch_size: usize,
    seed: u64,
    pots: String,
    config: Option<PathBuf>,
    iters: Option<usize>,
    skip: Option<usize>,
    output: Option<PathBuf>,
) -> LookaheadResult<()> {
    let config = load_config(config.as_ref(), iters, skip)?;
    config.validate()?;
    let pots = pots
        .split(',')
        .map(str::trim)
        .map(|p| {
            p.parse::<f32>()
                .ok()
                .filter(|&pot| pot > 0.0)
                .ok_or_else(|| LookaheadError::InvalidConfig(format!("invalid pot size '{}'", p)))
        })
        .collect::<LookaheadResult<Vec<f32>>>()?;

    let samples = generate_leduc_river(&config, &pots, batches, batch_size, seed)?;
    match output {
        Some(path) => {
            write_json_lines(&samples, BufWriter::new(File::create(&path)?))?;
            print_success(&format!("Wrote {} samples to {}", samples.len(), path.display()));
        }
        None => write_json_lines(&samples, io::stdout().lock())?,
    }
    Ok(())
}
