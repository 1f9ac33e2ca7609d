use rand::Rng;
use std::fmt;
use std::sync::OnceLock;

use crate::heuristic;

/// A direction to move/merge tiles.
///
/// The discriminants are the stable direction indices shared with callers:
/// `0 = Up`, `1 = Down`, `2 = Left`, `3 = Right`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Move {
    Up = 0,
    Down = 1,
    Left = 2,
    Right = 3,
}

impl Move {
    /// All directions in index order.
    pub const ALL: [Move; 4] = [Move::Up, Move::Down, Move::Left, Move::Right];

    /// Stable index of this direction (`0..4`).
    #[inline]
    pub fn index(self) -> usize { self as usize }

    /// Inverse of [`Move::index`]; `None` for anything outside `0..4`.
    #[inline]
    pub fn from_index(idx: i32) -> Option<Move> {
        match idx {
            0 => Some(Move::Up),
            1 => Some(Move::Down),
            2 => Some(Move::Left),
            3 => Some(Move::Right),
            _ => None,
        }
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Move::Up => "up",
            Move::Down => "down",
            Move::Left => "left",
            Move::Right => "right",
        };
        f.pad(name)
    }
}

/// A 4x4 grid of tile values as the surrounding game keeps it (`0` = empty).
pub type Grid = [[u32; 4]; 4];

const LINE_TABLE_SIZE: usize = 0x1_0000; // 65,536 possible 16-bit lines
const MAX_RANK: u64 = 0xf;

struct Stores {
    row_left: Box<[u16]>,
    row_right: Box<[u16]>,
    col_up: Box<[u64]>,
    col_down: Box<[u64]>,
    heuristic: Box<[f64]>,
    score: Box<[Score]>,
}

type BoardRaw = u64;
type Line = u16;
type Rank = u64;
type Score = u64;

/// Packed 4x4 2048 board as 16 4-bit nibbles in a `u64`.
///
/// Cell `(row, col)` lives at bit offset `(4 * row + col) * 4`, so row 0 is the low
/// 16 bits and the leftmost cell of each row is its low nibble. A nibble `v > 0`
/// stands for the tile `2^v`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Board(BoardRaw);

impl Board {
    /// A constant empty board (all zeros).
    pub const EMPTY: Board = Board(0);

    /// Construct a `Board` from its raw packed representation.
    #[inline]
    pub fn from_raw(raw: BoardRaw) -> Self { Board(raw) }

    /// Consume this `Board`, returning the raw packed `u64`.
    #[inline]
    pub fn into_raw(self) -> BoardRaw { self.0 }

    /// Borrow the raw packed `u64` for this `Board`.
    #[inline]
    pub fn raw(&self) -> BoardRaw { self.0 }

    /// Pack a grid of tile values.
    ///
    /// Each value is reduced to its base-2 exponent and clamped to 15, so tiles above
    /// 32768 saturate instead of being rejected.
    ///
    /// ```
    /// use ai_2048_advisor::engine::Board;
    /// let b = Board::from_grid(&[[2, 0, 0, 0], [0, 0, 0, 0], [0, 0, 0, 0], [0, 0, 0, 4]]);
    /// assert_eq!(b.raw(), 0x2000_0000_0000_0001);
    /// ```
    pub fn from_grid(grid: &Grid) -> Self {
        let mut raw = 0;
        for (r, row) in grid.iter().enumerate() {
            for (c, &value) in row.iter().enumerate() {
                raw |= rank_of(value) << cell_shift(r, c);
            }
        }
        Board(raw)
    }

    /// Unpack into tile values (`0` for empty cells).
    pub fn to_grid(self) -> Grid {
        let mut grid = [[0u32; 4]; 4];
        for (r, row) in grid.iter_mut().enumerate() {
            for (c, cell) in row.iter_mut().enumerate() {
                let rank = (self.0 >> cell_shift(r, c)) & MAX_RANK;
                *cell = if rank == 0 { 0 } else { 1 << rank };
            }
        }
        grid
    }

    /// Return the board resulting from sliding/merging tiles in `dir` (no random insert).
    ///
    /// An illegal move returns the board unchanged.
    ///
    /// ```
    /// use ai_2048_advisor::engine::{Board, Move};
    /// let b = Board::from_grid(&[[2, 2, 0, 0], [0; 4], [0; 4], [0; 4]]);
    /// assert_eq!(b.shift(Move::Left).to_grid()[0], [4, 0, 0, 0]);
    /// ```
    #[inline]
    pub fn shift(self, dir: Move) -> Self { execute_move(dir, self) }

    /// Insert a random 2 (90%) or 4 (10%) tile into a random empty slot, using the provided RNG.
    ///
    /// A full board is returned unchanged.
    #[inline]
    pub fn with_random_tile<R: Rng + ?Sized>(self, rng: &mut R) -> Self {
        let empty = count_empty(self);
        if empty == 0 {
            return self;
        }
        let mut index = rng.gen_range(0..empty);
        let mut tmp = self.0;
        let mut tile = generate_random_tile(rng);
        loop {
            while (tmp & 0xf) != 0 {
                tmp >>= 4;
                tile <<= 4;
            }
            if index == 0 { break; }
            index -= 1;
            tmp >>= 4;
            tile <<= 4;
        }
        Board(self.0 | tile)
    }

    /// Perform a move then insert a random tile if the move changed the board.
    #[inline]
    pub fn make_move<R: Rng + ?Sized>(self, direction: Move, rng: &mut R) -> Self {
        let moved = self.shift(direction);
        if moved != self { moved.with_random_tile(rng) } else { self }
    }

    /// Game score implied by the tiles on the board (sum of all merges that built them).
    #[inline]
    pub fn score(self) -> Score { get_score(self) }

    /// Return true if no legal moves remain.
    #[inline]
    pub fn is_game_over(self) -> bool { is_game_over(self) }

    /// Return true if at least one direction changes the board.
    #[inline]
    pub fn has_legal_move(self) -> bool { !is_game_over(self) }

    /// Return the highest tile value (e.g., 2048) present on the board, 0 when empty.
    #[inline]
    pub fn highest_tile(self) -> u32 {
        let max_rank = (0..16).map(|idx| (self.0 >> (4 * idx)) & MAX_RANK).max().unwrap_or(0);
        if max_rank == 0 { 0 } else { 1 << max_rank }
    }

    /// Count the number of empty cells on the board.
    #[inline]
    pub fn count_empty(self) -> u32 { count_empty(self) }

    /// Count the distinct non-empty tile values on the board.
    #[inline]
    pub fn count_distinct(self) -> u32 { count_distinct(self) }

    /// Get the actual value at index (0 if empty). Index runs 0..16 row-major;
    /// only its low four bits are used.
    #[inline]
    pub fn tile_value(self, idx: usize) -> u32 {
        let rank = (self.0 >> (4 * (idx & 15))) & MAX_RANK;
        if rank == 0 { 0 } else { 1 << rank }
    }
}

impl fmt::Debug for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Board({:#018x})", self.0)
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let grid = self.to_grid();
        for (r, row) in grid.iter().enumerate() {
            if r > 0 {
                writeln!(f, "-------------------------------")?;
            }
            let cells: Vec<String> = row.iter().map(|&v| format_val(v)).collect();
            writeln!(f, "{}", cells.join("|"))?;
        }
        Ok(())
    }
}

impl From<BoardRaw> for Board { fn from(v: BoardRaw) -> Self { Board::from_raw(v) } }
impl From<Board> for BoardRaw { fn from(b: Board) -> Self { b.into_raw() } }
impl From<&Grid> for Board { fn from(g: &Grid) -> Self { Board::from_grid(g) } }

/// Build the move, heuristic and score tables. Safe to call multiple times and from
/// any thread; only the first call does work and every caller observes the finished tables.
pub fn new() {
    let _ = stores();
}

/// Compute the total score for a board.
pub fn get_score(board: Board) -> Score {
    let score_table: &[Score] = &stores().score;
    (0..4).fold(0, |acc, idx| acc + get_table_entry(score_table, extract_row(board, idx)))
}

/// Slide/merge tiles in the given direction. No randomness.
///
/// Returns the input unchanged when the move is illegal.
pub fn execute_move(direction: Move, board: Board) -> Board {
    let s = stores();
    let b = board.0;
    match direction {
        Move::Up | Move::Down => {
            let table: &[u64] = if direction == Move::Up { &s.col_up } else { &s.col_down };
            let t = transpose(b);
            let res = (0..4).fold(b, |acc, col_idx| {
                let col = ((t >> (16 * col_idx)) & 0xffff) as Line;
                acc ^ (get_table_entry(table, col) << (4 * col_idx))
            });
            Board(res)
        }
        Move::Left | Move::Right => {
            let table: &[u16] = if direction == Move::Left { &s.row_left } else { &s.row_right };
            let res = (0..4).fold(b, |acc, row_idx| {
                let row = ((b >> (16 * row_idx)) & 0xffff) as Line;
                acc ^ (u64::from(get_table_entry(table, row)) << (16 * row_idx))
            });
            Board(res)
        }
    }
}

// Credit to Nneonneo
pub fn transpose(x: BoardRaw) -> BoardRaw {
    let a1 = x & 0xF0F00F0FF0F00F0F;
    let a2 = x & 0x0000F0F00000F0F0;
    let a3 = x & 0x0F0F00000F0F0000;
    let a = a1 | (a2 << 12) | (a3 >> 12);
    let b1 = a & 0xFF00FF0000FF00FF;
    let b2 = a & 0x00FF00FF00000000;
    let b3 = a & 0x00000000FF00FF00;
    b1 | (b2 >> 24) | (b3 << 24)
}

/// Row `row_idx` (0 = top) as a 16-bit line, leftmost cell in the low nibble.
/// Only the low two bits of `row_idx` are used.
#[inline]
pub fn extract_row(board: Board, row_idx: u32) -> Line {
    ((board.0 >> (16 * (row_idx & 3))) & 0xffff) as Line
}

/// Column `col_idx` (0 = leftmost) as a 16-bit line, top cell in the low nibble.
/// Only the low two bits of `col_idx` are used.
#[inline]
pub fn extract_col(board: Board, col_idx: u32) -> Line {
    ((transpose(board.0) >> (16 * (col_idx & 3))) & 0xffff) as Line
}

/// Split a line into its four ranks in reading order.
#[inline]
pub fn unpack_line(line: Line) -> [Rank; 4] {
    let l = u64::from(line);
    [l & 0xf, (l >> 4) & 0xf, (l >> 8) & 0xf, (l >> 12) & 0xf]
}

/// Inverse of [`unpack_line`].
#[inline]
pub fn pack_line(ranks: [Rank; 4]) -> Line {
    (ranks[0] | ranks[1] << 4 | ranks[2] << 8 | ranks[3] << 12) as Line
}

/// True if no move in any direction changes the board.
pub fn is_game_over(board: Board) -> bool {
    Move::ALL.iter().all(|&direction| execute_move(direction, board) == board)
}

/// Count the number of zero tiles.
pub fn count_empty(board: Board) -> u32 {
    let mut x = board.0;
    x |= (x >> 2) & 0x3333333333333333;
    x |= x >> 1;
    (!x & 0x1111111111111111).count_ones()
}

// Credit to Nneonneo
/// Count distinct non-zero ranks via a 16-bit presence bitmap.
pub fn count_distinct(board: Board) -> u32 {
    let mut bitset = 0u16;
    let mut board_copy = board.0;
    while board_copy != 0 {
        bitset |= 1 << (board_copy & 0xf);
        board_copy >>= 4;
    }
    bitset >>= 1; // don't count empty tiles
    bitset.count_ones()
}

/// Whole-board heuristic table lookup, rows only. Used by [`heuristic::board_heuristic`].
#[inline]
pub(crate) fn heuristic_rows(raw: BoardRaw) -> f64 {
    let table: &[f64] = &stores().heuristic;
    (0..4).fold(0., |acc, idx| acc + get_table_entry(table, ((raw >> (16 * idx)) & 0xffff) as Line))
}

static STORES: OnceLock<Stores> = OnceLock::new();

#[inline(always)]
fn stores() -> &'static Stores {
    STORES.get_or_init(create_stores)
}

fn create_stores() -> Stores {
    // Allocate on the heap to avoid large stack frames
    let mut row_left = vec![0u16; LINE_TABLE_SIZE];
    let mut row_right = vec![0u16; LINE_TABLE_SIZE];
    let mut col_up = vec![0u64; LINE_TABLE_SIZE];
    let mut col_down = vec![0u64; LINE_TABLE_SIZE];
    let mut heuristic = vec![0f64; LINE_TABLE_SIZE];
    let mut score = vec![0u64; LINE_TABLE_SIZE];

    for val in 0..LINE_TABLE_SIZE {
        let row = val as Line;
        let ranks = unpack_line(row);
        score[val] = calc_score(&ranks);
        heuristic[val] = heuristic::line_heuristic(&ranks);

        let result = pack_line(slide_left(ranks));
        let rev_row = reverse_line(row);
        let rev_result = reverse_line(result);

        row_left[val] = row ^ result;
        row_right[rev_row as usize] = rev_row ^ rev_result;
        col_up[val] = unpack_col(row) ^ unpack_col(result);
        col_down[rev_row as usize] = unpack_col(rev_row) ^ unpack_col(rev_result);
    }
    log::trace!("built move, heuristic and score tables ({} entries each)", LINE_TABLE_SIZE);

    Stores {
        row_left: row_left.into_boxed_slice(),
        row_right: row_right.into_boxed_slice(),
        col_up: col_up.into_boxed_slice(),
        col_down: col_down.into_boxed_slice(),
        heuristic: heuristic.into_boxed_slice(),
        score: score.into_boxed_slice(),
    }
}

#[inline(always)]
fn get_table_entry<T: Copy>(table: &[T], idx: Line) -> T {
    debug_assert_eq!(table.len(), LINE_TABLE_SIZE);
    // Every table holds exactly LINE_TABLE_SIZE entries, so any u16 index is in bounds.
    unsafe { *table.get_unchecked(idx as usize) }
}

fn generate_random_tile<R: Rng + ?Sized>(rng: &mut R) -> BoardRaw { if rng.gen_range(0..10) < 9 { 1 } else { 2 } }

/// Slide towards index 0 and merge equal neighbours once, left to right.
fn slide_left(mut line: [Rank; 4]) -> [Rank; 4] {
    let mut i = 0;
    while i < 3 {
        let Some(j) = (i + 1..4).find(|&j| line[j] != 0) else { break };
        if line[i] == 0 {
            line[i] = line[j];
            line[j] = 0;
            // re-examine the slot we just filled against the next tile
            continue;
        }
        if line[i] == line[j] {
            if line[i] != MAX_RANK {
                line[i] += 1;
            }
            line[j] = 0;
        }
        i += 1;
    }
    line
}

fn reverse_line(line: Line) -> Line {
    (line >> 12) | ((line >> 4) & 0x00F0) | ((line << 4) & 0x0F00) | (line << 12)
}

/// Spread a line over one board column: cell k goes to row k, column 0.
fn unpack_col(line: Line) -> BoardRaw {
    let tmp = u64::from(line);
    (tmp | (tmp << 12) | (tmp << 24) | (tmp << 36)) & 0x000F000F000F000F
}

// Credit to Nneonneo
fn calc_score(ranks: &[Rank; 4]) -> Score {
    ranks
        .iter()
        .filter(|&&rank| rank >= 2)
        // the score is the total sum of the tile and all intermediate merged tiles
        .map(|&rank| (rank - 1) * (1 << rank))
        .sum()
}

#[inline]
fn cell_shift(row: usize, col: usize) -> u32 {
    ((4 * row + col) * 4) as u32
}

fn rank_of(value: u32) -> BoardRaw {
    if value == 0 {
        return 0;
    }
    u64::from(31 - value.leading_zeros()).min(MAX_RANK)
}

fn format_val(val: u32) -> String {
    match val {
        0 => " ".repeat(7),
        x => format!("{:^7}", x),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    fn row(tiles: [u32; 4]) -> Grid {
        [tiles, [0; 4], [0; 4], [0; 4]]
    }

    #[test]
    fn it_slide_left() {
        assert_eq!(slide_left([0, 0, 0, 0]), [0, 0, 0, 0]);
        assert_eq!(slide_left([1, 2, 1, 2]), [1, 2, 1, 2]);
        assert_eq!(slide_left([1, 1, 2, 2]), [2, 3, 0, 0]);
        assert_eq!(slide_left([1, 0, 0, 1]), [2, 0, 0, 0]);
        assert_eq!(slide_left([0, 1, 1, 1]), [2, 1, 0, 0]);
        assert_eq!(slide_left([2, 1, 1, 0]), [2, 2, 0, 0]);
        assert_eq!(slide_left([15, 15, 0, 0]), [15, 0, 0, 0]);
    }

    #[test]
    fn it_reverse_line() {
        assert_eq!(reverse_line(0x1234), 0x4321);
        assert_eq!(reverse_line(0x00f0), 0x0f00);
    }

    #[test]
    fn test_encode_and_decode_grid() {
        let grid = [[2, 4, 8, 16], [0, 0, 0, 0], [1024, 2048, 0, 32768], [0, 0, 0, 4]];
        let board = Board::from_grid(&grid);
        assert_eq!(board.to_grid(), grid);
        assert_eq!(extract_row(board, 0), 0x4321);
        assert_eq!(extract_row(board, 2), 0xf0ba);
        assert_eq!(board.tile_value(8), 1024);
        assert_eq!(board.tile_value(11), 32768);
        assert_eq!(board.tile_value(15), 4);
    }

    #[test]
    fn test_encode_clamps_oversized_tiles() {
        let board = Board::from_grid(&row([131072, 1 << 20, 0, 0]));
        assert_eq!(extract_row(board, 0), 0x00ff);
        assert_eq!(board.to_grid()[0], [32768, 32768, 0, 0]);
    }

    #[test]
    fn test_shift_right_single_tile() {
        new();
        let board = Board::from_grid(&row([2, 0, 0, 0]));
        assert_eq!(board.shift(Move::Right).to_grid(), row([0, 0, 0, 2]));
    }

    #[test]
    fn test_shift_left_merges_once() {
        new();
        assert_eq!(Board::from_grid(&row([2, 2, 0, 0])).shift(Move::Left).to_grid(), row([4, 0, 0, 0]));
        assert_eq!(Board::from_grid(&row([2, 2, 4, 4])).shift(Move::Left).to_grid(), row([4, 8, 0, 0]));
        assert_eq!(Board::from_grid(&row([4, 4, 4, 4])).shift(Move::Right).to_grid(), row([0, 0, 8, 8]));
        assert_eq!(Board::from_grid(&row([2, 2, 2, 0])).shift(Move::Right).to_grid(), row([0, 0, 2, 4]));
    }

    #[test]
    fn test_move_all_directions() {
        new();
        let grid = [[2, 0, 2, 4], [2, 8, 0, 4], [0, 8, 2, 0], [4, 0, 2, 0]];
        let board = Board::from_grid(&grid);
        assert_eq!(
            board.shift(Move::Up).to_grid(),
            [[4, 16, 4, 8], [4, 0, 2, 0], [0, 0, 0, 0], [0, 0, 0, 0]]
        );
        assert_eq!(
            board.shift(Move::Down).to_grid(),
            [[0, 0, 0, 0], [0, 0, 0, 0], [4, 0, 2, 0], [4, 16, 4, 8]]
        );
        assert_eq!(
            board.shift(Move::Left).to_grid(),
            [[4, 4, 0, 0], [2, 8, 4, 0], [8, 2, 0, 0], [4, 2, 0, 0]]
        );
        assert_eq!(
            board.shift(Move::Right).to_grid(),
            [[0, 0, 4, 4], [0, 2, 8, 4], [0, 0, 8, 2], [0, 0, 4, 2]]
        );
    }

    #[test]
    fn test_illegal_move_returns_same_board() {
        new();
        let board = Board::from_grid(&row([2, 4, 8, 16]));
        assert_eq!(board.shift(Move::Left), board);
        assert_eq!(board.shift(Move::Right), board);
        assert_eq!(board.shift(Move::Up), board);
        assert_ne!(board.shift(Move::Down), board);
    }

    #[test]
    fn it_count_empty() {
        assert_eq!(count_empty(Board::EMPTY), 16);
        assert_eq!(count_empty(Board::from_raw(0x1111000011110000)), 8);
        assert_eq!(count_empty(Board::from_raw(0x0000000000000011)), 14);
        assert_eq!(count_empty(Board::from_raw(0x8421_8421_8421_8421)), 0);
        assert_eq!(count_empty(Board::from_raw(0x0123456789abcdef)), 1);
    }

    #[test]
    fn it_count_distinct() {
        assert_eq!(count_distinct(Board::EMPTY), 0);
        assert_eq!(count_distinct(Board::from_raw(0x0123456789abcdef)), 15);
        assert_eq!(count_distinct(Board::from_raw(0x1111222200003000)), 3);
    }

    #[test]
    fn test_extract_col_matches_grid() {
        let board = Board::from_grid(&[[2, 0, 0, 0], [4, 0, 0, 0], [8, 0, 0, 0], [16, 0, 0, 2]]);
        assert_eq!(extract_col(board, 0), 0x4321);
        assert_eq!(extract_col(board, 3), 0x1000);
        assert_eq!(transpose(transpose(board.raw())), board.raw());
    }

    #[test]
    fn test_out_of_range_indexes_wrap() {
        let board = Board::from_grid(&[[2, 0, 0, 0], [4, 0, 0, 0], [8, 0, 0, 0], [16, 0, 0, 2]]);
        assert_eq!(extract_row(board, 4), extract_row(board, 0));
        assert_eq!(extract_row(board, 7), extract_row(board, 3));
        assert_eq!(extract_col(board, 4), extract_col(board, 0));
        assert_eq!(extract_col(board, 19), extract_col(board, 3));
        assert_eq!(board.tile_value(16), board.tile_value(0));
        assert_eq!(board.tile_value(31), 2);
    }

    #[test]
    fn test_score_counts_merges() {
        new();
        let board = Board::from_grid(&row([4, 8, 0, 2]));
        // 4 = one merge of 2s, 8 = 4 + two 4s
        assert_eq!(board.score(), 4 + 16);
        assert_eq!(Board::EMPTY.score(), 0);
    }

    #[test]
    fn test_game_over() {
        new();
        let full = Board::from_grid(&[[2, 4, 2, 4], [4, 2, 4, 2], [2, 4, 2, 4], [4, 2, 4, 2]]);
        assert!(full.is_game_over());
        assert_eq!(full.count_empty(), 0);
        let mergeable = Board::from_grid(&[[2, 2, 2, 4], [4, 2, 4, 2], [2, 4, 2, 4], [4, 2, 4, 2]]);
        assert!(mergeable.has_legal_move());
    }

    #[test]
    fn test_random_tile_fills_board() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut board = Board::EMPTY;
        for _ in 0..16 {
            board = board.with_random_tile(&mut rng);
        }
        assert_eq!(count_empty(board), 0);
        assert_eq!(board.with_random_tile(&mut rng), board);
        assert!((0..16).all(|idx| matches!(board.tile_value(idx), 2 | 4)));
    }

    #[test]
    fn test_move_index_round_trip() {
        for dir in Move::ALL {
            assert_eq!(Move::from_index(dir.index() as i32), Some(dir));
        }
        assert_eq!(Move::from_index(-1), None);
        assert_eq!(Move::from_index(4), None);
    }

    #[test]
    fn test_highest_tile() {
        assert_eq!(Board::EMPTY.highest_tile(), 0);
        assert_eq!(Board::from_grid(&row([2, 0, 2048, 4])).highest_tile(), 2048);
    }
}
