extern crate hexplore;

use hexplore::boards::hex::{HexBoard, Player};
use hexplore::game::GameState;
use hexplore::mcts::MonteCarloTreeSearchBuilder;
use hexplore::nrpa::{NestedRolloutPolicyAdaptation, Policy};

const BOARD_SIZE: usize = 5;
const ROLLOUTS_PER_MOVE: u32 = 50;
const NRPA_LEVEL: u32 = 2;
const NRPA_ITERATIONS: u32 = 10;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // X runs the tree search, O runs the nested rollout search. Both keep
    // their accumulated knowledge for the whole game.
    let mut board = HexBoard::new(BOARD_SIZE);
    let mut mcts = MonteCarloTreeSearchBuilder::new().with_seed(42).build();
    let mut nrpa = NestedRolloutPolicyAdaptation::builder(NRPA_LEVEL, NRPA_ITERATIONS)
        .with_seed(1337)
        .build();
    let mut policy = Policy::new();

    while !board.is_terminal() {
        mcts.rollout_n_times(&board, ROLLOUTS_PER_MOVE)
            .expect("the board is not terminal");
        board = mcts.choose(&board).expect("X has moves available");
        println!("Player X move:");
        println!("{}\n", render(&board));
        if board.is_terminal() {
            break;
        }

        let (_, sequence) = nrpa
            .search(&mut policy, &board)
            .expect("the board is not terminal");
        if let Some(reply) = sequence.into_iter().next() {
            board = reply;
        }
        println!("Player O move:");
        println!("{}\n", render(&board));
    }

    match board.winner() {
        Some(Player::X) => println!("Game over. Winner: X"),
        Some(Player::O) => println!("Game over. Winner: O"),
        None => println!("Game over. No winner."),
    }
}

/// Renders the board as a staircase of rows, one space of indentation per
/// row, so the hex adjacency is readable in plain text.
fn render(board: &HexBoard) -> String {
    let mut rows = Vec::with_capacity(board.size());
    for row in 0..board.size() {
        let cells: Vec<&str> = (0..board.size())
            .map(|col| match board.cell(row, col) {
                Some(Player::X) => "X",
                Some(Player::O) => "O",
                None => ".",
            })
            .collect();
        rows.push(format!("{}{}", " ".repeat(row), cells.join(" ")));
    }
    rows.join("\n")
}
