use ai_2048_advisor::engine::{self as GameEngine, Board, Move};
use ai_2048_advisor::expectimax::{Expectimax, ExpectimaxConfig};
use criterion::{criterion_group, criterion_main, Criterion};
use rand::{rngs::StdRng, SeedableRng};
use std::hint::black_box;

fn warm() { GameEngine::new(); }

fn corpus() -> Vec<Board> {
    let mut rng = StdRng::seed_from_u64(4242);
    let mut boards = Vec::new();
    let mut b = Board::EMPTY.with_random_tile(&mut rng).with_random_tile(&mut rng);
    boards.push(b);
    let seq = [Move::Left, Move::Up, Move::Right, Move::Down];
    for i in 0..64 {
        let dir = seq[i % seq.len()];
        let nb = b.shift(dir);
        if nb != b { b = nb.with_random_tile(&mut rng); }
        boards.push(b);
    }
    boards
}

fn bench_branch_evals(c: &mut Criterion) {
    warm();
    let boards = corpus();
    let cfg = ExpectimaxConfig { depth_cap: Some(3), ..Default::default() };

    let mut ex = Expectimax::with_config(cfg.clone());
    c.bench_function("expectimax/branch_evals", |bch| {
        bch.iter(|| {
            let mut acc = 0.0;
            for &bd in &boards {
                let branches = ex.branch_evals(bd);
                for be in branches { if be.legal { acc += be.ev; } }
            }
            black_box(acc)
        })
    });

    let mut uncached = Expectimax::with_config(ExpectimaxConfig { cache_enabled: false, ..cfg });
    c.bench_function("expectimax/branch_evals_no_cache", |bch| {
        bch.iter(|| {
            let mut acc = 0.0;
            for &bd in &boards {
                let branches = uncached.branch_evals(bd);
                for be in branches { if be.legal { acc += be.ev; } }
            }
            black_box(acc)
        })
    });
}

fn bench_e2e(c: &mut Criterion) {
    warm();
    let mut ex = Expectimax::new();
    c.bench_function("e2e/32_moves", |bch| {
        bch.iter(|| {
            let mut rng = StdRng::seed_from_u64(7);
            let mut b = Board::EMPTY.with_random_tile(&mut rng).with_random_tile(&mut rng);
            let mut steps = 0;
            while steps < 32 {
                match ex.advise_board(b).best {
                    Some(dir) => b = b.make_move(dir, &mut rng),
                    None => break,
                }
                steps += 1;
            }
            black_box((b.raw(), steps))
        })
    });
}

criterion_group!(expectimax, bench_branch_evals, bench_e2e);
criterion_main!(expectimax);
