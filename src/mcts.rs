use crate::game::{GameState, SearchError};
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rustc_hash::{FxHashMap, FxHashSet};
use std::cmp::Ordering;
use tracing::{debug, trace};

/// Default weight of the exploration term in the UCT formula.
pub const DEFAULT_EXPLORATION_WEIGHT: f64 = 1.0;

/// Default equivalence parameter controlling how quickly RAVE estimates fade
/// as real visits accumulate.
pub const DEFAULT_RAVE_FACTOR: f64 = 500.0;

/// Per-ply geometric discount applied to simulation rewards.
const SIMULATION_DISCOUNT: f64 = 0.9;

/// The main struct for running Monte Carlo tree search with rapid action
/// value estimation.
///
/// The engine owns five maps keyed by state value: cumulative reward and
/// visit count per node, their RAVE counterparts, and the cached child set of
/// every expanded node. The maps grow monotonically for the lifetime of the
/// engine and are only dropped with it; unseen keys read as zero. RAVE
/// statistics are credited by state value alone, not per subtree, so a state
/// reachable from several branches shares one RAVE entry across the whole
/// tree.
#[derive(Debug)]
pub struct MonteCarloTreeSearch<S: GameState, R: Rng = ChaCha8Rng> {
    q: FxHashMap<S, f64>,
    n: FxHashMap<S, u32>,
    rave_q: FxHashMap<S, f64>,
    rave_n: FxHashMap<S, u32>,
    children: FxHashMap<S, FxHashSet<S>>,
    exploration_weight: f64,
    rave_factor: f64,
    rng: R,
}

/// A builder for creating instances of `MonteCarloTreeSearch`.
///
/// This provides a convenient way to configure the search with different
/// parameters. The configuration is fixed once the engine is built.
pub struct MonteCarloTreeSearchBuilder<R: Rng = ChaCha8Rng> {
    exploration_weight: f64,
    rave_factor: f64,
    rng: R,
}

impl MonteCarloTreeSearchBuilder<ChaCha8Rng> {
    /// Creates a new builder with default parameters and a randomly seeded
    /// generator.
    pub fn new() -> Self {
        Self {
            exploration_weight: DEFAULT_EXPLORATION_WEIGHT,
            rave_factor: DEFAULT_RAVE_FACTOR,
            rng: ChaCha8Rng::seed_from_u64(rand::random()),
        }
    }

    /// Seeds the default generator, making every rollout reproducible.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = ChaCha8Rng::seed_from_u64(seed);
        self
    }
}

impl Default for MonteCarloTreeSearchBuilder<ChaCha8Rng> {
    fn default() -> Self {
        MonteCarloTreeSearchBuilder::new()
    }
}

impl<R: Rng> MonteCarloTreeSearchBuilder<R> {
    /// Sets the weight of the exploration term in the UCT formula.
    pub fn with_exploration_weight(mut self, weight: f64) -> Self {
        self.exploration_weight = weight;
        self
    }

    /// Sets the RAVE equivalence parameter.
    pub fn with_rave_factor(mut self, factor: f64) -> Self {
        self.rave_factor = factor;
        self
    }

    /// Replaces the random generator used for simulations.
    pub fn with_rng<R2: Rng>(self, rng: R2) -> MonteCarloTreeSearchBuilder<R2> {
        MonteCarloTreeSearchBuilder {
            exploration_weight: self.exploration_weight,
            rave_factor: self.rave_factor,
            rng,
        }
    }

    /// Builds the `MonteCarloTreeSearch` instance with the configured
    /// parameters.
    pub fn build<S: GameState>(self) -> MonteCarloTreeSearch<S, R> {
        MonteCarloTreeSearch {
            q: FxHashMap::default(),
            n: FxHashMap::default(),
            rave_q: FxHashMap::default(),
            rave_n: FxHashMap::default(),
            children: FxHashMap::default(),
            exploration_weight: self.exploration_weight,
            rave_factor: self.rave_factor,
            rng: self.rng,
        }
    }
}

impl<S: GameState, R: Rng> MonteCarloTreeSearch<S, R> {
    /// Makes the tree one rollout better: select a leaf, expand it, simulate
    /// a random playout from it, and propagate the result back to the root.
    pub fn do_rollout(&mut self, node: &S) -> Result<(), SearchError> {
        let path = self.select(node);
        let leaf = path.last().expect("selection path is never empty").clone();
        self.expand(&leaf);
        let (reward, actions) = self.simulate(leaf)?;
        self.backpropagate(&path, reward, &actions);
        trace!(
            path_len = path.len(),
            simulated = actions.len(),
            reward,
            "rollout complete"
        );
        Ok(())
    }

    /// Runs `count` rollouts from `node`.
    pub fn rollout_n_times(&mut self, node: &S, count: u32) -> Result<(), SearchError> {
        for _ in 0..count {
            self.do_rollout(node)?;
        }
        Ok(())
    }

    /// Chooses the best successor of `node`, the move to play in the game.
    ///
    /// Unvisited children are never preferred over visited ones; otherwise
    /// children are ranked by a blend of their mean reward and their RAVE
    /// average, weighted so that the RAVE share fades as real visits
    /// accumulate. Calling this on a terminal node is a contract violation.
    pub fn choose(&mut self, node: &S) -> Result<S, SearchError> {
        if node.is_terminal() {
            return Err(SearchError::TerminalState);
        }
        if !self.children.contains_key(node) {
            return node
                .find_random_child(&mut self.rng)
                .ok_or(SearchError::NoLegalMoves);
        }

        let score = |candidate: &S| -> f64 {
            let visits = self.visits(candidate);
            if visits == 0 {
                return f64::NEG_INFINITY;
            }
            let rave_visits = self.rave_visits(candidate);
            let beta =
                self.rave_factor / (f64::from(visits) + f64::from(rave_visits) + self.rave_factor);
            let mean = self.total_reward(candidate) / f64::from(visits);
            let rave_mean = if rave_visits > 0 {
                self.rave_reward(candidate) / f64::from(rave_visits)
            } else {
                0.0
            };
            (1.0 - beta) * mean + beta * rave_mean
        };

        let best = self.children[node]
            .iter()
            .max_by(|a, b| score(a).partial_cmp(&score(b)).unwrap_or(Ordering::Equal))
            .cloned()
            .ok_or(SearchError::NoLegalMoves)?;
        debug!(
            visits = self.visits(&best),
            rave_visits = self.rave_visits(&best),
            "move chosen"
        );
        Ok(best)
    }

    /// Returns how many times `state` has been visited on a selection path.
    pub fn visits(&self, state: &S) -> u32 {
        self.n.get(state).copied().unwrap_or(0)
    }

    /// Returns the cumulative reward propagated through `state`.
    pub fn total_reward(&self, state: &S) -> f64 {
        self.q.get(state).copied().unwrap_or(0.0)
    }

    /// Returns how many times `state` appeared in any simulated playout.
    pub fn rave_visits(&self, state: &S) -> u32 {
        self.rave_n.get(state).copied().unwrap_or(0)
    }

    /// Returns the cumulative reward credited to `state` across all playouts
    /// it appeared in.
    pub fn rave_reward(&self, state: &S) -> f64 {
        self.rave_q.get(state).copied().unwrap_or(0.0)
    }

    /// Finds an unexplored descendant of `node`, descending by UCT score.
    ///
    /// The walk stops at a node that has never been expanded or whose cached
    /// child set is empty; when the stopping point has successors not yet in
    /// the children map, the path is extended by one of them at random.
    fn select(&mut self, node: &S) -> Vec<S> {
        let mut path = Vec::new();
        let mut node = node.clone();
        loop {
            path.push(node.clone());
            match self.children.get(&node) {
                None => return path,
                Some(successors) if successors.is_empty() => return path,
                Some(successors) => {
                    let unexplored: Vec<&S> = successors
                        .iter()
                        .filter(|successor| !self.children.contains_key(*successor))
                        .collect();
                    if let Some(picked) = unexplored.choose(&mut self.rng) {
                        path.push((**picked).clone());
                        return path;
                    }
                }
            }
            node = self.uct_select(&node);
        }
    }

    /// Caches the child set of `node`; a no-op if it is already cached.
    fn expand(&mut self, node: &S) {
        if self.children.contains_key(node) {
            return;
        }
        self.children.insert(node.clone(), node.find_children());
    }

    /// Plays uniformly random moves from `node` until the game ends.
    ///
    /// Returns the discounted terminal reward, oriented to alternate
    /// perspective per simulated ply starting from `node`, together with the
    /// set of distinct states visited along the way (used for RAVE credit).
    fn simulate(&mut self, mut node: S) -> Result<(f64, FxHashSet<S>), SearchError> {
        let mut invert_reward = true;
        let mut actions = FxHashSet::default();
        let mut move_count = 0u32;
        loop {
            if node.is_terminal() {
                let reward = node.reward()? * SIMULATION_DISCOUNT.powi(move_count as i32);
                let oriented = if invert_reward { 1.0 - reward } else { reward };
                return Ok((oriented, actions));
            }
            let action = node
                .find_random_child(&mut self.rng)
                .ok_or(SearchError::NoLegalMoves)?;
            actions.insert(action.clone());
            node = action;
            invert_reward = !invert_reward;
            move_count += 1;
        }
    }

    /// Sends the reward back up to the ancestors of the leaf.
    ///
    /// Each path node also credits the whole set of simulated states with the
    /// reward seen at that node, keyed purely by state value. The reward is
    /// flipped between path nodes: a win for one side is a loss for the other.
    fn backpropagate(&mut self, path: &[S], mut reward: f64, actions: &FxHashSet<S>) {
        for node in path.iter().rev() {
            *self.n.entry(node.clone()).or_insert(0) += 1;
            *self.q.entry(node.clone()).or_insert(0.0) += reward;
            for action in actions {
                *self.rave_n.entry(action.clone()).or_insert(0) += 1;
                *self.rave_q.entry(action.clone()).or_insert(0.0) += reward;
            }
            reward = 1.0 - reward;
        }
    }

    /// Selects a child of `node`, balancing exploration and exploitation.
    ///
    /// The caller's traversal order guarantees the node was visited before any
    /// selection among its children, so the logarithm is well defined.
    fn uct_select(&self, node: &S) -> S {
        let successors = &self.children[node];
        debug_assert!(
            successors
                .iter()
                .all(|successor| self.children.contains_key(successor)),
            "every successor should already be expanded"
        );

        let log_parent_visits = f64::from(self.visits(node)).ln();
        let uct = |candidate: &S| -> f64 {
            let visits = f64::from(self.visits(candidate));
            self.total_reward(candidate) / visits
                + self.exploration_weight * (log_parent_visits / visits).sqrt()
        };

        successors
            .iter()
            .max_by(|a, b| uct(a).partial_cmp(&uct(b)).unwrap_or(Ordering::Equal))
            .cloned()
            .expect("uct_select requires a node with successors")
    }
}

#[cfg(test)]
mod tests {
    use crate::boards::hex::HexBoard;
    use crate::game::{GameState, SearchError};
    use crate::mcts::MonteCarloTreeSearchBuilder;

    #[test]
    fn rollout_updates_root_statistics() {
        let board = HexBoard::new(2);
        let mut mcts = MonteCarloTreeSearchBuilder::new().with_seed(3).build();

        mcts.do_rollout(&board).unwrap();
        assert_eq!(mcts.visits(&board), 1);

        mcts.rollout_n_times(&board, 9).unwrap();
        assert_eq!(mcts.visits(&board), 10);
    }

    #[test]
    fn rollout_credits_simulated_states_globally() {
        let board = HexBoard::new(2);
        let mut mcts = MonteCarloTreeSearchBuilder::new().with_seed(3).build();
        mcts.rollout_n_times(&board, 5).unwrap();

        // Playouts from a live root always pass through at least one state,
        // and every such state gets a tree-wide RAVE entry.
        assert!(!mcts.rave_n.is_empty());
        assert!(mcts.rave_n.values().all(|&count| count > 0));
    }

    #[test]
    fn choose_rejects_terminal_nodes() {
        let finished = HexBoard::new(1).make_move(0, 0);
        let mut mcts = MonteCarloTreeSearchBuilder::new().with_seed(3).build();
        assert_eq!(mcts.choose(&finished), Err(SearchError::TerminalState));
    }

    #[test]
    fn choose_falls_back_to_a_random_child_before_expansion() {
        let board = HexBoard::new(2);
        let mut mcts = MonteCarloTreeSearchBuilder::new().with_seed(3).build();

        let picked = mcts.choose(&board).unwrap();
        assert!(board.find_children().contains(&picked));
    }

    #[test]
    fn choose_never_prefers_an_unvisited_child() {
        let board = HexBoard::new(2);
        let mut mcts = MonteCarloTreeSearchBuilder::new().with_seed(3).build();

        // Expand the root by hand and visit exactly one child, with a zero
        // reward so its score cannot win on merit alone.
        mcts.children.insert(board.clone(), board.find_children());
        let visited = mcts.children[&board].iter().next().cloned().unwrap();
        mcts.n.insert(visited.clone(), 1);
        mcts.q.insert(visited.clone(), 0.0);

        let best = mcts.choose(&board).unwrap();
        assert_eq!(best, visited);
    }

    #[test]
    fn rave_share_fades_as_real_visits_accumulate() {
        let board = HexBoard::new(2);
        let heavily_visited = board.make_move(0, 0);
        let rave_informed = board.make_move(0, 1);

        let mut mcts = MonteCarloTreeSearchBuilder::new().with_seed(3).build();
        let mut successors = rustc_hash::FxHashSet::default();
        successors.insert(heavily_visited.clone());
        successors.insert(rave_informed.clone());
        mcts.children.insert(board.clone(), successors);

        // A mediocre mean backed by a million real visits: the RAVE share is
        // all but gone and the score collapses to the mean of 0.5.
        mcts.n.insert(heavily_visited.clone(), 1_000_000);
        mcts.q.insert(heavily_visited.clone(), 500_000.0);
        mcts.rave_n.insert(heavily_visited.clone(), 10);
        mcts.rave_q.insert(heavily_visited.clone(), 0.0);

        // A single real visit with a worse mean of 0.4, but a perfect and
        // well-fed RAVE record: the blend leans on the RAVE average instead.
        mcts.n.insert(rave_informed.clone(), 1);
        mcts.q.insert(rave_informed.clone(), 0.4);
        mcts.rave_n.insert(rave_informed.clone(), 1_000);
        mcts.rave_q.insert(rave_informed.clone(), 1_000.0);

        let best = mcts.choose(&board).unwrap();
        assert_eq!(best, rave_informed);
    }

    #[test]
    fn rollouts_are_deterministic_under_a_fixed_seed() {
        let board = HexBoard::new(3);

        let mut first = MonteCarloTreeSearchBuilder::new().with_seed(7).build();
        let mut second = MonteCarloTreeSearchBuilder::new().with_seed(7).build();
        first.rollout_n_times(&board, 20).unwrap();
        second.rollout_n_times(&board, 20).unwrap();

        assert_eq!(first.n, second.n);
        assert_eq!(first.q, second.q);
        assert_eq!(first.rave_n, second.rave_n);
        assert_eq!(first.rave_q, second.rave_q);

        let choice_a = first.choose(&board).unwrap();
        let choice_b = second.choose(&board).unwrap();
        assert_eq!(choice_a, choice_b);
    }
}
