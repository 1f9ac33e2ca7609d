use ai_2048_advisor::engine::{self as GameEngine, Board, Move};
use ai_2048_advisor::heuristic;
use criterion::{criterion_group, criterion_main, Criterion};
use rand::{rngs::StdRng, SeedableRng};
use std::hint::black_box;

fn warm() { GameEngine::new(); }

fn corpus() -> Vec<Board> {
    let mut rng = StdRng::seed_from_u64(42);
    let mut boards = Vec::new();
    // Empty and two-tile starts
    boards.push(Board::EMPTY);
    let mut b = Board::EMPTY.with_random_tile(&mut rng).with_random_tile(&mut rng);
    boards.push(b);
    // Derive a variety of densities deterministically
    let seq = [Move::Left, Move::Up, Move::Right, Move::Down];
    for i in 0..20 {
        let dir = seq[i % seq.len()];
        let nb = b.shift(dir);
        if nb != b { b = nb.with_random_tile(&mut rng); }
        boards.push(b);
    }
    boards
}

fn bench_shift(c: &mut Criterion) {
    warm();
    let boards = corpus();
    for dir in Move::ALL {
        c.bench_function(&format!("shift/{}", dir), |bch| {
            bch.iter(|| {
                let mut acc = 0u64;
                for &bd in &boards { acc ^= bd.shift(dir).raw(); }
                black_box(acc)
            })
        });
    }
}

fn bench_board_queries(c: &mut Criterion) {
    warm();
    let boards = corpus();
    c.bench_function("board/count_empty", |bch| {
        bch.iter(|| boards.iter().map(|bd| bd.count_empty()).sum::<u32>())
    });
    c.bench_function("board/count_distinct", |bch| {
        bch.iter(|| boards.iter().map(|bd| bd.count_distinct()).sum::<u32>())
    });
    c.bench_function("board/from_grid", |bch| {
        let grids: Vec<_> = boards.iter().map(|bd| bd.to_grid()).collect();
        bch.iter(|| {
            let mut acc = 0u64;
            for g in &grids { acc ^= Board::from_grid(black_box(g)).raw(); }
            black_box(acc)
        })
    });
    c.bench_function("heuristic/value", |bch| {
        bch.iter(|| {
            let mut acc = 0f64;
            for &bd in &boards {
                let v = heuristic::board_heuristic(bd);
                acc = acc.mul_add(1.000_000_1, v);
            }
            black_box(acc)
        })
    });
}

criterion_group!(engine_ops, bench_shift, bench_board_queries);
criterion_main!(engine_ops);
