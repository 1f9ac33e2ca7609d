use std::thread;
use std::time::{Duration, Instant};

use ai_2048_advisor::advisor::{Advisor, AdvisorConfig};
use ai_2048_advisor::engine::Board;
use ai_2048_advisor::expectimax::ExpectimaxConfig;
use clap::Parser;
use rand::{rngs::StdRng, SeedableRng};

/// Self-play driven through the background advisor, the way an interactive game loop uses it.
#[derive(Debug, Parser)]
#[command(name = "ai-2048-advisor", about = "Play 2048 by following the background move advisor")]
struct Args {
    /// Seed for tile spawns (random when omitted)
    #[arg(long)]
    seed: Option<u64>,

    /// Stop after this many moves
    #[arg(long)]
    steps: Option<u64>,

    /// Cap the adaptive search depth
    #[arg(long)]
    depth_cap: Option<u32>,

    /// Only print the final summary
    #[arg(long)]
    quiet: bool,
}

const TICK: Duration = Duration::from_millis(1);

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let cfg = AdvisorConfig {
        search: ExpectimaxConfig { depth_cap: args.depth_cap, ..Default::default() },
        ..Default::default()
    };
    let mut advisor = Advisor::new(cfg);
    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let start = Instant::now();
    let mut board = Board::EMPTY.with_random_tile(&mut rng).with_random_tile(&mut rng);
    if !args.quiet {
        println!("{}", board);
    }
    advisor.trigger(&board.to_grid())?;

    let mut move_count = 0u64;
    loop {
        let Some(advice) = advisor.poll() else {
            if !advisor.is_evaluating() {
                // Either no legal move was left or the worker failed.
                break;
            }
            thread::sleep(TICK);
            continue;
        };
        let Some(direction) = advice.best else { break };

        advisor.cancel();
        board = board.make_move(direction, &mut rng);
        move_count += 1;
        if !args.quiet {
            println!("{} {:?}\n{}", direction, advice.percentages(), board);
        }
        if args.steps.is_some_and(|limit| move_count >= limit) {
            break;
        }
        advisor.trigger(&board.to_grid())?;
    }

    println!(
        "Moves made: {}, score: {}, highest tile: {}, elapsed: {:.1}s",
        move_count,
        board.score(),
        board.highest_tile(),
        start.elapsed().as_secs_f64()
    );
    Ok(())
}
