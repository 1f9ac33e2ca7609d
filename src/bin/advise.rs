use std::time::Instant;

use ai_2048_advisor::engine::{Board, Grid, Move};
use ai_2048_advisor::expectimax::{Expectimax, ExpectimaxConfig, PROB_CUTOFF};
use anyhow::ensure;
use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "advise", about = "Score the four moves of a 2048 board")]
struct Args {
    /// Sixteen tile values in row-major order, 0 for empty cells
    #[arg(num_args = 16, value_name = "TILE", required = true)]
    tiles: Vec<u32>,

    /// Cap the adaptive search depth
    #[arg(long)]
    depth_cap: Option<u32>,

    /// Disable the transposition cache
    #[arg(long)]
    no_cache: bool,

    /// Prune chance branches whose probability falls below this value
    #[arg(long, default_value_t = PROB_CUTOFF)]
    prob_cutoff: f32,
}

fn parse_grid(tiles: &[u32]) -> anyhow::Result<Grid> {
    ensure!(tiles.len() == 16, "expected 16 tiles, got {}", tiles.len());
    let mut grid = [[0u32; 4]; 4];
    for (idx, &value) in tiles.iter().enumerate() {
        ensure!(value == 0 || value.is_power_of_two(), "tile {} is not a power of two: {}", idx, value);
        grid[idx / 4][idx % 4] = value;
    }
    Ok(grid)
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let grid = parse_grid(&args.tiles)?;
    let cfg = ExpectimaxConfig {
        prob_cutoff: args.prob_cutoff,
        depth_cap: args.depth_cap,
        cache_enabled: !args.no_cache,
        ..Default::default()
    };
    let mut expectimax = Expectimax::with_config(cfg);

    let start = Instant::now();
    let advice = expectimax.best_move(&grid);
    let elapsed = start.elapsed();

    println!("{}", Board::from_grid(&grid));
    let percentages = advice.percentages();
    for dir in Move::ALL {
        let marker = if advice.best == Some(dir) { "*" } else { " " };
        println!("{} {:<5} {:>16.3} ({:>3}%)", marker, dir, advice.scores[dir.index()], percentages[dir.index()]);
    }
    match advice.best {
        Some(dir) => println!("best move: {} ({})", dir, dir.index()),
        None => println!("best move: none (-1)"),
    }
    let stats = expectimax.last_stats();
    println!(
        "depth limit: {}, nodes: {}, cache hits: {}, elapsed: {:.3}s",
        stats.depth_limit,
        stats.nodes,
        stats.cache_hits,
        elapsed.as_secs_f64()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_parse_grid() {
        let tiles: Vec<u32> = (0..16).map(|i| if i % 5 == 0 { 2 } else { 0 }).collect();
        let grid = parse_grid(&tiles).unwrap();
        assert_eq!(grid[0], [2, 0, 0, 0]);
        assert_eq!(grid[3], [0, 0, 0, 2]);
        assert!(parse_grid(&tiles[..15]).is_err());
        let mut bad = tiles.clone();
        bad[3] = 6;
        assert!(parse_grid(&bad).is_err());
    }
}
