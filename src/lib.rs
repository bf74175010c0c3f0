//! Monte Carlo search engines for two-player perfect-information games.
//!
//! This library provides two general-purpose sequential-decision search
//! engines sharing one pluggable game abstraction: a Monte Carlo tree search
//! augmented with rapid action value estimation (RAVE), and a nested rollout
//! policy adaptation (NRPA) search. Both engines work against any game that
//! implements the [`game::GameState`] trait; an implementation for the
//! connection game Hex ships with the crate.
//!
//! # Example
//!
//! ```rust
//! use hexplore::boards::hex::HexBoard;
//! use hexplore::game::GameState;
//! use hexplore::mcts::MonteCarloTreeSearchBuilder;
//!
//! // Create an empty 3x3 Hex board.
//! let board = HexBoard::new(3);
//!
//! // Create and configure a new search instance using the builder.
//! let mut mcts = MonteCarloTreeSearchBuilder::new()
//!     .with_exploration_weight(1.0)
//!     .with_rave_factor(500.0)
//!     .with_seed(42)
//!     .build();
//!
//! // Grow the tree, then pick the most promising move.
//! for _ in 0..50 {
//!     mcts.do_rollout(&board).unwrap();
//! }
//! let best_move = mcts.choose(&board).unwrap();
//!
//! assert!(board.find_children().contains(&best_move));
//! ```

/// Contains pre-made implementations of the `GameState` trait.
pub mod boards;
/// Contains the `GameState` trait and the error type shared by both engines.
pub mod game;
/// The Monte Carlo tree search engine with rapid action value estimation.
pub mod mcts;
/// The nested rollout policy adaptation engine.
pub mod nrpa;
/// Contains the disjoint-set structure backing connectivity checks.
pub mod union_find;
