use crate::game::{GameState, SearchError};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rustc_hash::FxHashMap;
use tracing::debug;

/// Preference weight assumed for moves the policy has never seen.
const DEFAULT_WEIGHT: f64 = 1.0;

/// Additive bonus applied to the first move of the best sequence during
/// adaptation.
const ADAPT_LEARNING_RATE: f64 = 1.0;

/// Ratio by which the adaptation bonus decays for each later move.
const ADAPT_DECAY: f64 = 0.9;

/// A move-preference table mapping candidate states to positive weights.
///
/// Moves never adapted read as weight 1.0, so a fresh policy samples
/// uniformly. The nested search clones the policy before every recursive
/// descent; only the explicit adaptation step mutates a retained copy.
#[derive(Debug, Clone)]
pub struct Policy<S: GameState> {
    weights: FxHashMap<S, f64>,
}

impl<S: GameState> Policy<S> {
    /// Creates an empty policy where every move weighs 1.0.
    pub fn new() -> Self {
        Self {
            weights: FxHashMap::default(),
        }
    }

    /// Returns the preference weight for `state`.
    pub fn weight(&self, state: &S) -> f64 {
        self.weights.get(state).copied().unwrap_or(DEFAULT_WEIGHT)
    }

    fn add_weight(&mut self, state: &S, bonus: f64) {
        *self.weights.entry(state.clone()).or_insert(DEFAULT_WEIGHT) += bonus;
    }
}

impl<S: GameState> Default for Policy<S> {
    fn default() -> Self {
        Policy::new()
    }
}

/// The nested rollout policy adaptation search engine.
///
/// The engine recursively improves a move-preference policy: at every level
/// it runs `iterations` searches one level deeper, each on a private copy of
/// the policy, and adapts the retained policy toward the best move sequence
/// found so far. Level 0 is a single policy-weighted rollout. Both parameters
/// are fixed at construction.
#[derive(Debug)]
pub struct NestedRolloutPolicyAdaptation<R: Rng = ChaCha8Rng> {
    level: u32,
    iterations: u32,
    rng: R,
}

/// A builder for creating instances of `NestedRolloutPolicyAdaptation`.
pub struct NestedRolloutPolicyAdaptationBuilder<R: Rng = ChaCha8Rng> {
    level: u32,
    iterations: u32,
    rng: R,
}

impl NestedRolloutPolicyAdaptationBuilder<ChaCha8Rng> {
    /// Creates a new builder with a randomly seeded generator.
    ///
    /// `level` is the recursion depth; `iterations` is the branching factor
    /// per level and must be positive for the search to do any work.
    pub fn new(level: u32, iterations: u32) -> Self {
        Self {
            level,
            iterations,
            rng: ChaCha8Rng::seed_from_u64(rand::random()),
        }
    }

    /// Seeds the default generator, making every search reproducible.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = ChaCha8Rng::seed_from_u64(seed);
        self
    }
}

impl<R: Rng> NestedRolloutPolicyAdaptationBuilder<R> {
    /// Replaces the random generator used for rollouts.
    pub fn with_rng<R2: Rng>(self, rng: R2) -> NestedRolloutPolicyAdaptationBuilder<R2> {
        NestedRolloutPolicyAdaptationBuilder {
            level: self.level,
            iterations: self.iterations,
            rng,
        }
    }

    /// Builds the `NestedRolloutPolicyAdaptation` instance.
    pub fn build(self) -> NestedRolloutPolicyAdaptation<R> {
        NestedRolloutPolicyAdaptation {
            level: self.level,
            iterations: self.iterations,
            rng: self.rng,
        }
    }
}

impl NestedRolloutPolicyAdaptation<ChaCha8Rng> {
    /// Returns a new builder for `NestedRolloutPolicyAdaptation`.
    pub fn builder(level: u32, iterations: u32) -> NestedRolloutPolicyAdaptationBuilder {
        NestedRolloutPolicyAdaptationBuilder::new(level, iterations)
    }
}

impl<R: Rng> NestedRolloutPolicyAdaptation<R> {
    /// Searches from `root` at the configured level, returning the best score
    /// found and the move sequence that produced it.
    ///
    /// The caller's policy is adapted in place toward the best sequence and
    /// can be carried across searches to keep what was learned.
    pub fn search<S: GameState>(
        &mut self,
        policy: &mut Policy<S>,
        root: &S,
    ) -> Result<(f64, Vec<S>), SearchError> {
        self.nrpa(self.level, policy, root)
    }

    fn nrpa<S: GameState>(
        &mut self,
        level: u32,
        policy: &mut Policy<S>,
        node: &S,
    ) -> Result<(f64, Vec<S>), SearchError> {
        if level == 0 {
            return self.rollout(policy, node);
        }

        let mut best_score = f64::NEG_INFINITY;
        let mut best_sequence = Vec::new();

        for _ in 0..self.iterations {
            // The recursion runs on a private copy; improvements feed back
            // only through the adaptation of the retained policy below.
            let mut snapshot = policy.clone();
            let (score, sequence) = self.nrpa(level - 1, &mut snapshot, node)?;
            if score > best_score {
                best_score = score;
                best_sequence = sequence;
                adapt(policy, &best_sequence);
                debug!(level, best_score, "sequence improved");
            }
        }

        Ok((best_score, best_sequence))
    }

    /// Plays one policy-weighted game from `node`.
    ///
    /// Children are sampled proportionally to their policy weights. The walk
    /// stops at a terminal state, or early if a non-terminal state has no
    /// children, in which case the final reward call surfaces the
    /// invalid-state error.
    fn rollout<S: GameState>(
        &mut self,
        policy: &Policy<S>,
        root: &S,
    ) -> Result<(f64, Vec<S>), SearchError> {
        let mut sequence = Vec::new();
        let mut node = root.clone();
        while !node.is_terminal() {
            let mut moves: Vec<S> = node.find_children().into_iter().collect();
            if moves.is_empty() {
                break;
            }
            let weights: Vec<f64> = moves
                .iter()
                .map(|candidate| policy.weight(candidate))
                .collect();
            let picked = sample_weighted(&weights, &mut self.rng);
            let action = moves.swap_remove(picked);
            sequence.push(action.clone());
            node = action;
        }
        Ok((node.reward()?, sequence))
    }
}

/// Reinforces the moves of `sequence` in order, with a geometrically decaying
/// additive bonus: +1.0, +0.9, +0.81, and so on.
fn adapt<S: GameState>(policy: &mut Policy<S>, sequence: &[S]) {
    let mut bonus = ADAPT_LEARNING_RATE;
    for state in sequence {
        policy.add_weight(state, bonus);
        bonus *= ADAPT_DECAY;
    }
}

/// Samples an index with probability proportional to its weight.
fn sample_weighted<R: Rng>(weights: &[f64], rng: &mut R) -> usize {
    let total: f64 = weights.iter().sum();
    let mut remaining = rng.random_range(0.0..total);
    for (index, weight) in weights.iter().enumerate() {
        if remaining < *weight {
            return index;
        }
        remaining -= weight;
    }
    weights.len() - 1
}
