use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rustc_hash::FxHashSet;
use tracing::{debug, info, info_span, trace, warn, Level};

use crate::data::{Count, Item, Itemset, ItemsetTree, Itemvec, TransactionDatabase};
use crate::model::{GreedyInference, Inference, ItemsetModel};
use crate::Loggable;

pub mod backend;
pub mod em;
pub mod schedule;

pub use backend::Backend;
pub use em::{CoverSource, Evaluator, StepResult};
pub use schedule::{Schedule, SearchPhase, Step, StructuralMove};

/// Itemsets larger than this are subsampled before their power set is searched
const MAX_POWER_SET_ITEMS: usize = 30;

pub trait Miner {
    /// Improves the model until the search terminates
    fn mine( &mut self, tree: &ItemsetTree, database: &mut TransactionDatabase, model: ItemsetModel ) -> MiningOutcome;
}

/// Budgets and switches of a mining run
#[derive( Debug, Clone, PartialEq )]
pub struct MinerConfig {
    pub max_iterations: u64,
    /// candidates considered per structural move
    pub max_structure_steps: u64,
    pub max_runtime: Duration,
    pub optimize_tolerance: f64,
    pub max_optimize_steps: u64,
    pub schedule: Schedule,
    /// fixes the random choices of the search
    pub seed: Option<u64>,
    pub source: CoverSource,
}

#[derive( Debug, Clone, Copy, PartialEq, Eq )]
pub enum Termination {
    TreeSearchExhausted,
    IterationLimit,
    RuntimeLimit,
}

#[derive( Debug, Clone )]
pub struct MiningOutcome {
    pub model: ItemsetModel,
    pub average_cost: f64,
    pub iterations: u64,
    pub termination: Termination,
    pub elapsed: Duration,
}

/// Structural expectation-maximization: alternates changes of the model's itemsets with refits of their probabilities
pub struct StructuralEm<I: Inference> {
    config: MinerConfig,
    inference: I,
}

/// Everything a run changes
struct SearchState<'t> {
    tree: &'t ItemsetTree,
    database: &'t mut TransactionDatabase,
    model: ItemsetModel,
    rejected: FxHashSet<Itemset>,
    rng: StdRng,
    average_cost: f64,
}

impl Default for MinerConfig {
    fn default() -> Self {
	MinerConfig{
	    max_iterations: 1_000,
	    max_structure_steps: 10_000,
	    max_runtime: Duration::from_secs( 12 * 60 * 60 ),
	    optimize_tolerance: 1e-5,
	    max_optimize_steps: 100,
	    schedule: Schedule::default(),
	    seed: None,
	    source: CoverSource::Cache,
	}
    }
}

impl MinerConfig {
    pub fn with_max_iterations( mut self, max_iterations: u64 ) -> Self { self.max_iterations = max_iterations; self }
    pub fn with_max_structure_steps( mut self, steps: u64 ) -> Self { self.max_structure_steps = steps; self }
    pub fn with_max_runtime( mut self, runtime: Duration ) -> Self { self.max_runtime = runtime; self }
    pub fn with_optimize_tolerance( mut self, tolerance: f64 ) -> Self { self.optimize_tolerance = tolerance; self }
    pub fn with_max_optimize_steps( mut self, steps: u64 ) -> Self { self.max_optimize_steps = steps; self }
    pub fn with_schedule( mut self, schedule: Schedule ) -> Self { self.schedule = schedule; self }
    pub fn with_seed( mut self, seed: u64 ) -> Self { self.seed = Some( seed ); self }
    pub fn with_source( mut self, source: CoverSource ) -> Self { self.source = source; self }

    fn rng( &self ) -> StdRng {
	match self.seed {
	    Some( seed ) => StdRng::seed_from_u64( seed ),
	    None => StdRng::from_entropy(),
	}
    }
}

impl<I: Inference> Miner for StructuralEm<I> {

    fn mine( &mut self, tree: &ItemsetTree, database: &mut TransactionDatabase, model: ItemsetModel ) -> MiningOutcome {
	let start = Instant::now();
	let evaluator = Evaluator::new( &self.inference, self.config.source );
	let mut state = SearchState{
	    tree,
	    database,
	    model,
	    rejected: FxHashSet::default(),
	    rng: self.config.rng(),
	    average_cost: 0.0,
	};
	self.initialize( &evaluator, &mut state );

	let schedule = self.config.schedule;
	let mut phase = schedule.start();
	let mut iterations = 0;
	let termination = loop {
	    match phase.step {
		Step::Structure( movement ) => {
		    if phase.iteration > self.config.max_iterations {
			warn!( "Reached the limit of {} iterations", self.config.max_iterations );
			break Termination::IterationLimit;
		    }
		    if start.elapsed() >= self.config.max_runtime {
			warn!( "Reached the runtime limit of {}s", self.config.max_runtime.as_secs() );
			break Termination::RuntimeLimit;
		    }
		    iterations = phase.iteration;
		    let _iteration_span = info_span!( "iteration", number = phase.iteration ).entered();
		    let accepted = self.search( movement, &evaluator, &mut state );
		    if !accepted && movement == StructuralMove::TreeSearch {
			info!( "Tree search found no improving itemset" );
			break Termination::TreeSearchExhausted;
		    }
		},
		Step::ParameterOptimize => {
		    let _optimize_span = info_span!( "optimization", iteration = phase.iteration ).entered();
		    self.optimize( &evaluator, &mut state );
		},
	    }
	    phase = schedule.transition( phase );
	};

	self.optimize( &evaluator, &mut state );
	state.model.log( "final model", Level::DEBUG );
	info!( "Finished after {iterations} iterations ({termination:?}) with average cost {:.4}", state.average_cost );

	MiningOutcome{
	    model: state.model,
	    average_cost: state.average_cost,
	    iterations,
	    termination,
	    elapsed: start.elapsed(),
	}
    }
}

impl<I: Inference> StructuralEm<I> {

    pub fn new( config: MinerConfig, inference: I ) -> StructuralEm<I> {
	StructuralEm{ config, inference }
    }

    pub fn config( &self ) -> &MinerConfig { &self.config }

    fn uses_cache( evaluator: &Evaluator<I> ) -> bool {
	evaluator.source() == CoverSource::Cache
    }

    fn initialize( &self, evaluator: &Evaluator<I>, state: &mut SearchState ) {
	let _init_span = info_span!( "initialization" ).entered();
	if Self::uses_cache( evaluator ) {
	    state.database.initialize_cache( &state.model );
	}
	state.average_cost = evaluator.refresh_costs( state.database, &state.model, None );

	state.model.log( "initial model", Level::DEBUG );
	info!( "Initial average cost {:.4} over {} transactions", state.average_cost, state.database.len() );
    }

    /// Applies a structural move. Returns whether the model changed.
    fn search( &self, movement: StructuralMove, evaluator: &Evaluator<I>, state: &mut SearchState ) -> bool {
	debug!( "Searching by {movement}" );
	let accepted = match movement {
	    StructuralMove::TreeSearch => self.tree_search( evaluator, state ),
	    StructuralMove::Simplify => self.simplify( evaluator, state ),
	    StructuralMove::Combine => self.combine( evaluator, state ),
	};
	if !accepted {
	    debug!( "No improvement by {movement} within {} candidates", self.config.max_structure_steps );
	}
	accepted
    }

    fn tree_search( &self, evaluator: &Evaluator<I>, state: &mut SearchState ) -> bool {
	for _ in 0 .. self.config.max_structure_steps {
	    let candidate = state.tree.random_walk( &mut state.rng );
	    if self.try_candidate( evaluator, state, candidate ) {
		return true;
	    }
	}
	false
    }

    /// Tries subsets of the model itemsets, the largest itemsets first
    fn simplify( &self, evaluator: &Evaluator<I>, state: &mut SearchState ) -> bool {
	let mut itemsets: Vec<Itemset> = state.model.itemsets()
	    .filter( |itemset| itemset.len() > 1 )
	    .cloned()
	    .collect();
	itemsets.sort_unstable_by( |left, right| right.len().cmp( &left.len() ).then_with( || left.cmp( right )));

	let mut budget = self.config.max_structure_steps;
	for itemset in itemsets {
	    let items: Itemvec = if itemset.len() > MAX_POWER_SET_ITEMS {
		itemset.items().choose_multiple( &mut state.rng, MAX_POWER_SET_ITEMS ).copied().collect()
	    } else {
		itemset.items().to_vec()
	    };
	    for subset in power_set( items ) {
		if budget == 0 {
		    return false;
		}
		budget -= 1;
		if self.try_candidate( evaluator, state, subset ) {
		    return true;
		}
	    }
	}
	false
    }

    /// Tries unions of two model itemsets, the most frequent itemsets first
    fn combine( &self, evaluator: &Evaluator<I>, state: &mut SearchState ) -> bool {
	let mut itemsets: Vec<(Itemset, Count)> = state.model.itemsets()
	    .map( |itemset| (itemset.clone(), state.tree.support( itemset )))
	    .collect();
	itemsets.sort_unstable_by( |left, right| right.1.cmp( &left.1 ).then_with( || left.0.cmp( &right.0 )));

	let mut budget = self.config.max_structure_steps;
	for (i, (left, _)) in itemsets.iter().enumerate() {
	    for (right, _) in &itemsets[ i + 1 .. ] {
		if budget == 0 {
		    return false;
		}
		budget -= 1;
		if self.try_candidate( evaluator, state, left.union( right )) {
		    return true;
		}
	    }
	}
	false
    }

    /// Adds the candidate if it lowers the average cost, otherwise remembers it as rejected
    fn try_candidate( &self, evaluator: &Evaluator<I>, state: &mut SearchState, candidate: Itemset ) -> bool {
	if candidate.is_empty() || state.model.contains( &candidate ) || state.rejected.contains( &candidate ) {
	    return false;
	}
	let probability = state.tree.relative_support( &candidate );
	if probability <= 0.0 {
	    state.rejected.insert( candidate );
	    return false;
	}

	let subsets = state.model.direct_subsets( &candidate );
	let cost = evaluator.evaluate_candidate( state.database, &state.model, &candidate, probability, &subsets );
	trace!( "Candidate {candidate} ({probability:.4}) yields {cost:.6} over {:.6}", state.average_cost );
	if cost >= state.average_cost {
	    state.rejected.insert( candidate );
	    return false;
	}

	if Self::uses_cache( evaluator ) {
	    state.database.add_itemset_cache( &candidate, probability, &subsets );
	}
	state.model.add_accepted_candidate( &candidate, probability, &subsets );
	let previous = state.average_cost;
	// without the cache, lowering the subsets changes transactions that lack the candidate too
	let scope = if Self::uses_cache( evaluator ) { Some( &candidate ) } else { None };
	state.average_cost = evaluator.refresh_costs( state.database, &state.model, scope );
	info!( "Accepted {candidate} with probability {probability:.4}, average cost {previous:.4} -> {:.4}", state.average_cost );
	true
    }

    /// Refits the probabilities until they settle
    fn optimize( &self, evaluator: &Evaluator<I>, state: &mut SearchState ) {
	let mut converged = false;
	for round in 1 ..= self.config.max_optimize_steps {
	    let result = evaluator.step( state.database, &state.model );
	    let change = state.model.delta_norm( &result.probabilities );
	    state.model.replace_probabilities( result.probabilities );
	    if Self::uses_cache( evaluator ) {
		state.database.update_cache_probabilities( &state.model );
	    }
	    trace!( "Optimization round {round}: average cost {:.6}, change {change:?}", result.average_cost );

	    if change.map_or( false, |norm| norm < self.config.optimize_tolerance ) {
		converged = true;
		break;
	    }
	}
	if !converged {
	    warn!( "Parameters did not settle within {} steps", self.config.max_optimize_steps );
	}
	state.average_cost = evaluator.refresh_costs( state.database, &state.model, None );
	debug!( "Optimized {} itemsets to average cost {:.4}", state.model.len(), state.average_cost );
    }
}

impl StructuralEm<GreedyInference> {
    pub fn greedy( config: MinerConfig ) -> StructuralEm<GreedyInference> {
	StructuralEm::new( config, GreedyInference )
    }
}

/// Non-empty subsets of the items, smallest masks first
fn power_set( items: Vec<Item> ) -> impl Iterator<Item = Itemset> {
    let subset_count: u64 = 1 << items.len();
    (1 .. subset_count).map( move |mask| {
	items.iter().enumerate()
	    .filter( |(position, _)| mask >> position & 1 == 1 )
	    .map( |(_, item)| *item )
	    .collect()
    })
}

/// Builds the itemset tree, the transaction database and the independence model of the data
pub fn prepare( data: &[Itemvec], backend: Backend ) -> (ItemsetTree, TransactionDatabase, ItemsetModel) {
    let tree = ItemsetTree::from_transactions( data );
    let database = TransactionDatabase::new( data, backend );
    let model = ItemsetModel::from_singletons( tree.order(), tree.transaction_count() );
    (tree, database, model)
}
