use rand::Rng;
use rustc_hash::FxHashSet;
use std::hash::Hash;
use thiserror::Error;

/// The central trait of the library, defining the interface for a game state.
///
/// To use either search engine with a custom game, this trait must be implemented.
/// States are immutable snapshots: applying a move produces a fresh state, and a
/// move is identified with the state it produces rather than with a separate
/// move object. Equality and hashing must be structural over the full state
/// content, because the engines key their bookkeeping maps by state value:
/// two states holding the same position must compare equal and hash identically
/// even when constructed independently.
pub trait GameState: Clone + Eq + Hash {
    /// Returns whether the game is over in this state.
    fn is_terminal(&self) -> bool;

    /// Returns all successor states reachable in one move.
    ///
    /// Terminal states have no successors and return an empty set.
    fn find_children(&self) -> FxHashSet<Self>;

    /// Returns one successor state chosen uniformly at random, or `None` if
    /// this state is terminal.
    ///
    /// Randomness comes from the caller-supplied generator so that searches
    /// are reproducible under a fixed seed.
    fn find_random_child<R: Rng>(&self, rng: &mut R) -> Option<Self>;

    /// Returns the reward in `[0, 1]` from the perspective of the side to move.
    ///
    /// Only valid on terminal states; calling it on a state whose game is
    /// still running is a contract violation and returns
    /// [`SearchError::NonTerminalState`].
    fn reward(&self) -> Result<f64, SearchError>;
}

/// Errors raised when an engine or a state is used outside its contract.
///
/// These are caller mistakes, not transient faults: they are surfaced
/// immediately and never retried or swallowed.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SearchError {
    /// A move was requested from a state that has no successors.
    #[error("choose called on a terminal state")]
    TerminalState,

    /// A reward was requested from a state whose game is still running.
    #[error("reward called on a non-terminal state")]
    NonTerminalState,

    /// A state reported itself non-terminal but produced no successor.
    #[error("no legal moves available")]
    NoLegalMoves,
}
