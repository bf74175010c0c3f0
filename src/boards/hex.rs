use crate::game::{GameState, SearchError};
use crate::union_find::UnionFind;
use rand::Rng;
use rand::seq::IndexedRandom;
use rustc_hash::FxHashSet;

/// The conventional Hex board size.
pub const DEFAULT_BOARD_SIZE: usize = 11;

/// Offsets of the six neighbors of a hex cell, in (row, column) terms.
const HEX_NEIGHBORS: [(isize, isize); 6] = [(-1, 0), (-1, 1), (0, -1), (0, 1), (1, -1), (1, 0)];

/// The two sides of a Hex game.
///
/// `X` moves first and wins by connecting the top edge (row 0) to the bottom
/// edge (row N−1); `O` wins by connecting the left edge (column 0) to the
/// right edge (column N−1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Player {
    X,
    O,
}

impl Player {
    /// Returns the other side.
    pub fn opponent(self) -> Player {
        match self {
            Player::X => Player::O,
            Player::O => Player::X,
        }
    }
}

/// An implementation of the `GameState` trait for the game of Hex.
///
/// Boards are immutable snapshots: `make_move` returns a new board with the
/// winner and terminal flag recomputed from scratch. Equality and hashing are
/// structural over the full content (cells, side to move, winner, terminal
/// flag), so two boards holding the same position compare equal regardless of
/// how they were reached.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HexBoard {
    size: usize,
    cells: Vec<Option<Player>>,
    turn: Player,
    winner: Option<Player>,
    terminal: bool,
}

impl HexBoard {
    /// Creates an empty `size`×`size` board with `X` to move.
    pub fn new(size: usize) -> Self {
        assert!(size >= 1, "a Hex board needs at least one cell");
        Self {
            size,
            cells: vec![None; size * size],
            turn: Player::X,
            winner: None,
            terminal: false,
        }
    }

    /// Returns the side length of the board.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Returns the side whose move is next.
    pub fn turn(&self) -> Player {
        self.turn
    }

    /// Returns the winning side, if the game has been decided.
    pub fn winner(&self) -> Option<Player> {
        self.winner
    }

    /// Returns the occupant of the cell at `(row, col)`.
    pub fn cell(&self, row: usize, col: usize) -> Option<Player> {
        self.cells[self.index(row, col)]
    }

    /// Plays the side to move at `(row, col)` and returns the resulting board,
    /// with the side to move flipped and winner/terminal recomputed.
    ///
    /// The target cell must be empty.
    pub fn make_move(&self, row: usize, col: usize) -> HexBoard {
        let target = self.index(row, col);
        debug_assert!(self.cells[target].is_none(), "cell is already occupied");
        let mut cells = self.cells.clone();
        cells[target] = Some(self.turn);
        let winner = find_winner(&cells, self.size, self.turn);
        let terminal = winner.is_some() || cells.iter().all(|cell| cell.is_some());
        HexBoard {
            size: self.size,
            cells,
            turn: self.turn.opponent(),
            winner,
            terminal,
        }
    }

    fn index(&self, row: usize, col: usize) -> usize {
        row * self.size + col
    }

    fn empty_cells(&self) -> Vec<(usize, usize)> {
        (0..self.cells.len())
            .filter(|&i| self.cells[i].is_none())
            .map(|i| (i / self.size, i % self.size))
            .collect()
    }
}

impl Default for HexBoard {
    /// Creates an empty board of the conventional size with `X` to move.
    fn default() -> Self {
        HexBoard::new(DEFAULT_BOARD_SIZE)
    }
}

impl GameState for HexBoard {
    fn is_terminal(&self) -> bool {
        self.terminal
    }

    fn find_children(&self) -> FxHashSet<Self> {
        if self.terminal {
            return FxHashSet::default();
        }
        self.empty_cells()
            .into_iter()
            .map(|(row, col)| self.make_move(row, col))
            .collect()
    }

    fn find_random_child<R: Rng>(&self, rng: &mut R) -> Option<Self> {
        if self.terminal {
            return None;
        }
        self.empty_cells()
            .choose(rng)
            .map(|&(row, col)| self.make_move(row, col))
    }

    fn reward(&self) -> Result<f64, SearchError> {
        if !self.terminal {
            return Err(SearchError::NonTerminalState);
        }
        match self.winner {
            Some(winner) if winner == self.turn => Ok(1.0),
            Some(_) => Ok(0.0),
            None => Ok(0.5),
        }
    }
}

/// Checks whether `player` connects their two edges on `cells`.
///
/// The disjoint-set is rebuilt from scratch on every call: each cell owned by
/// the player is unioned with its same-owner hex neighbors, and with one of
/// two virtual endpoints when it lies on that player's starting or ending
/// edge. The player has won iff the endpoints end up in the same set.
fn find_winner(cells: &[Option<Player>], size: usize, player: Player) -> Option<Player> {
    let mut sets = UnionFind::new(size * size + 2);
    let start_edge = size * size;
    let end_edge = size * size + 1;

    for row in 0..size {
        for col in 0..size {
            if cells[row * size + col] != Some(player) {
                continue;
            }
            let here = row * size + col;
            match player {
                Player::X => {
                    if row == 0 {
                        sets.union(here, start_edge);
                    }
                    if row == size - 1 {
                        sets.union(here, end_edge);
                    }
                }
                Player::O => {
                    if col == 0 {
                        sets.union(here, start_edge);
                    }
                    if col == size - 1 {
                        sets.union(here, end_edge);
                    }
                }
            }
            for (row_offset, col_offset) in HEX_NEIGHBORS {
                let neighbor_row = row as isize + row_offset;
                let neighbor_col = col as isize + col_offset;
                if neighbor_row < 0
                    || neighbor_col < 0
                    || neighbor_row >= size as isize
                    || neighbor_col >= size as isize
                {
                    continue;
                }
                let neighbor = neighbor_row as usize * size + neighbor_col as usize;
                if cells[neighbor] == Some(player) {
                    sets.union(here, neighbor);
                }
            }
        }
    }

    sets.connected(start_edge, end_edge).then_some(player)
}

#[cfg(test)]
mod tests {
    use crate::boards::hex::{HexBoard, Player};
    use crate::game::{GameState, SearchError};
    use crate::mcts::MonteCarloTreeSearchBuilder;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn single_cell_board_first_move_wins() {
        let board = HexBoard::new(1);
        assert!(!board.is_terminal());

        let played = board.make_move(0, 0);
        assert!(played.is_terminal());
        assert_eq!(played.winner(), Some(Player::X));
        assert_eq!(played.turn(), Player::O);
    }

    #[test]
    fn empty_3x3_board_has_nine_children() {
        let board = HexBoard::new(3);
        let children = board.find_children();
        assert_eq!(children.len(), 9);

        for child in &children {
            let changed = (0..3)
                .flat_map(|row| (0..3).map(move |col| (row, col)))
                .filter(|&(row, col)| board.cell(row, col) != child.cell(row, col))
                .count();
            assert_eq!(changed, 1);
            assert_eq!(child.turn(), Player::O);
        }
    }

    #[test]
    fn boards_with_equal_content_are_equal() {
        let one = HexBoard::new(3).make_move(1, 1).make_move(0, 2);
        let other = HexBoard::new(3).make_move(1, 1).make_move(0, 2);
        assert_eq!(one, other);

        let mut dedup = rustc_hash::FxHashSet::default();
        dedup.insert(one);
        dedup.insert(other);
        assert_eq!(dedup.len(), 1);
    }

    #[test]
    fn x_connects_top_to_bottom_through_diagonal_neighbors() {
        // X: (0,1) (1,1) (2,0) is a connected chain via the (1,-1) offset.
        let board = HexBoard::new(3)
            .make_move(0, 1)
            .make_move(0, 0)
            .make_move(1, 1)
            .make_move(1, 0);
        assert!(!board.is_terminal());

        let finished = board.make_move(2, 0);
        assert!(finished.is_terminal());
        assert_eq!(finished.winner(), Some(Player::X));
    }

    #[test]
    fn o_connects_left_to_right() {
        let board = HexBoard::new(3)
            .make_move(0, 0)
            .make_move(1, 0)
            .make_move(0, 1)
            .make_move(1, 1)
            .make_move(0, 2);
        // X filled the top row, which touches only one of X's edges.
        assert!(!board.is_terminal());

        let finished = board.make_move(1, 2);
        assert!(finished.is_terminal());
        assert_eq!(finished.winner(), Some(Player::O));
    }

    #[test]
    fn full_board_always_has_a_winner() {
        // Fill a 2x2 board completely; the last stone decides the game.
        let board = HexBoard::new(2)
            .make_move(0, 0)
            .make_move(1, 0)
            .make_move(1, 1)
            .make_move(0, 1);
        assert!(board.is_terminal());
        assert_eq!(board.winner(), Some(Player::O));
    }

    #[test]
    fn reward_contract() {
        let won = HexBoard::new(1).make_move(0, 0);
        // The winner is X and O is the side to move in the terminal state.
        assert_eq!(won.reward(), Ok(0.0));

        let from_winner_perspective = HexBoard {
            size: 1,
            cells: vec![Some(Player::X)],
            turn: Player::X,
            winner: Some(Player::X),
            terminal: true,
        };
        assert_eq!(from_winner_perspective.reward(), Ok(1.0));

        let undecided = HexBoard {
            size: 1,
            cells: vec![None],
            turn: Player::X,
            winner: None,
            terminal: true,
        };
        assert_eq!(undecided.reward(), Ok(0.5));

        let running = HexBoard::new(3);
        assert_eq!(running.reward(), Err(SearchError::NonTerminalState));
    }

    #[test]
    fn random_child_respects_terminality() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let board = HexBoard::new(2);
        let child = board.find_random_child(&mut rng).unwrap();
        assert_ne!(child, board);
        assert_eq!(child.turn(), Player::O);

        let finished = HexBoard::new(1).make_move(0, 0);
        assert!(finished.find_random_child(&mut rng).is_none());
        assert!(finished.find_children().is_empty());
    }

    #[test]
    fn tree_search_finds_the_connecting_move() {
        // X holds (0,0) and (1,0); O holds (2,1) and (2,2). Playing (2,0)
        // completes X's top-to-bottom chain and is the only non-losing move.
        let board = HexBoard::new(3)
            .make_move(0, 0)
            .make_move(2, 1)
            .make_move(1, 0)
            .make_move(2, 2);
        assert_eq!(board.turn(), Player::X);

        // Rank children purely by their observed means: every playout through
        // the connecting move is a win, so its mean stays pinned at 1.0 while
        // the alternatives decay as the race for (2,0) is lost.
        let mut mcts = MonteCarloTreeSearchBuilder::new()
            .with_seed(42)
            .with_rave_factor(0.0)
            .build();
        for _ in 0..200 {
            mcts.do_rollout(&board).unwrap();
        }

        let best = mcts.choose(&board).unwrap();
        assert_eq!(best, board.make_move(2, 0));
        assert!(best.is_terminal());
        assert_eq!(best.winner(), Some(Player::X));
    }
}
