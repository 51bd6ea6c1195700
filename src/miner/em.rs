use rustc_hash::FxHashMap;
use tracing::trace;

use crate::data::{Count, Itemset, Transaction, TransactionDatabase};
use crate::model::{cover_cost, Inference, ItemsetModel, Probabilities, EPSILON};

/// Where the evaluator looks up the itemsets that may cover a transaction
#[derive( Debug, Clone, Copy, Default, PartialEq, Eq )]
pub enum CoverSource {
    /// per-transaction cache of contained itemsets
    #[default]
    Cache,
    /// scan the whole model for every transaction
    Model,
}

/// Outcome of one expectation-maximization step
#[derive( Debug, Clone, PartialEq )]
pub struct StepResult {
    pub average_cost: f64,
    pub probabilities: Probabilities,
}

/// Covers all transactions and derives costs and itemset probabilities from the covers
pub struct Evaluator<'i, I: Inference> {
    inference: &'i I,
    source: CoverSource,
}

type Usage = FxHashMap<Itemset, Count>;

impl<'i, I: Inference> Evaluator<'i, I> {

    pub fn new( inference: &'i I, source: CoverSource ) -> Evaluator<'i, I> {
	Evaluator{ inference, source }
    }

    pub fn source( &self ) -> CoverSource { self.source }

    /// Covers every transaction under the model and refits the probabilities to the itemset usage.
    /// Unused itemsets leave the model, except for singletons which keep the minimal probability.
    pub fn step( &self, database: &TransactionDatabase, model: &ItemsetModel ) -> StepResult {
	let (total_cost, usage) = database.backend().map_reduce(
	    database.transactions(),
	    || (0.0, Usage::default()),
	    |transaction| {
		let candidates = self.candidates_of( transaction, model );
		let chosen = self.inference.infer( transaction.items(), &candidates );
		let mut usage = Usage::default();
		for index in &chosen {
		    *usage.entry( candidates[ *index ].0.clone() ).or_insert( 0 ) += 1;
		}
		(cover_cost( &chosen, &candidates ), usage)
	    },
	    |(left_cost, left_usage), (right_cost, right_usage)| (left_cost + right_cost, merge_usage( left_usage, right_usage )),
	);

	let n = database.len();
	let mut probabilities = Probabilities::default();
	for itemset in model.itemsets() {
	    match usage.get( itemset ) {
		Some( count ) => { probabilities.insert( itemset.clone(), *count as f64 / n as f64 ); },
		None if itemset.len() == 1 => { probabilities.insert( itemset.clone(), EPSILON ); },
		None => trace!( "Dropping unused itemset {itemset}" ),
	    }
	}
	let average_cost = if n == 0 { 0.0 } else { total_cost / n as f64 };
	StepResult{ average_cost, probabilities }
    }

    /// Average cost if the candidate joined the model with the probability taken from its direct subsets.
    /// Neither the database nor the model change.
    pub fn evaluate_candidate( &self, database: &TransactionDatabase, model: &ItemsetModel,
			       candidate: &Itemset, probability: f64, subsets: &[Itemset] ) -> f64
    {
	if database.is_empty() {
	    return 0.0;
	}
	let total = match self.source {
	    CoverSource::Cache => database.backend().map_reduce(
		database.transactions(),
		|| 0.0,
		|transaction| {
		    if !transaction.contains( candidate ) {
			return transaction.cached_cost();
		    }
		    let mut candidates: Vec<(&Itemset, f64)> = transaction.raw_cache()
			.map( |(itemset, raw)| {
			    let adjusted = if subsets.contains( itemset ) { raw - probability } else { raw };
			    (itemset, adjusted.max( EPSILON ))
			})
			.collect();
		    candidates.push( (candidate, probability) );
		    candidates.sort_unstable_by( |left, right| left.0.cmp( right.0 ));
		    self.cost_of_cover( transaction, &candidates )
		},
		|a, b| a + b,
	    ),
	    CoverSource::Model => {
		let mut adjusted = model.clone();
		adjusted.add_accepted_candidate( candidate, probability, subsets );
		database.backend().map_reduce(
		    database.transactions(),
		    || 0.0,
		    |transaction| self.cost_of( transaction, &adjusted ),
		    |a, b| a + b,
		)
	    },
	};
	total / database.len() as f64
    }

    /// Recomputes the cover cost of the transactions containing scope (all if None) and returns the new average.
    pub fn refresh_costs( &self, database: &mut TransactionDatabase, model: &ItemsetModel, scope: Option<&Itemset> ) -> f64 {
	let backend = database.backend();
	backend.for_each_mut( database.transactions_mut(), |transaction| {
	    if scope.map_or( true, |itemset| transaction.contains( itemset )) {
		let cost = self.cost_of( transaction, model );
		transaction.set_cached_cost( cost );
	    }
	});
	database.average_cost()
    }

    fn cost_of( &self, transaction: &Transaction, model: &ItemsetModel ) -> f64 {
	let candidates = self.candidates_of( transaction, model );
	self.cost_of_cover( transaction, &candidates )
    }

    fn cost_of_cover( &self, transaction: &Transaction, candidates: &[(&Itemset, f64)] ) -> f64 {
	let chosen = self.inference.infer( transaction.items(), candidates );
	cover_cost( &chosen, candidates )
    }

    /// Model itemsets contained in the transaction, ordered by itemset
    fn candidates_of <'a> ( &self, transaction: &'a Transaction, model: &'a ItemsetModel ) -> Vec<(&'a Itemset, f64)> {
	match self.source {
	    CoverSource::Cache => transaction.cached_candidates(),
	    CoverSource::Model => {
		let mut candidates: Vec<(&Itemset, f64)> = model.iter()
		    .filter( |(itemset, _)| transaction.contains( itemset ))
		    .map( |(itemset, probability)| (itemset, probability.max( EPSILON )))
		    .collect();
		candidates.sort_unstable_by( |left, right| left.0.cmp( right.0 ));
		candidates
	    },
	}
    }
}

fn merge_usage( mut left: Usage, right: Usage ) -> Usage {
    for (itemset, count) in right {
	*left.entry( itemset ).or_insert( 0 ) += count;
    }
    left
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::data::{ItemOrder, Itemvec};
    use crate::miner::backend::Backend;
    use crate::model::GreedyInference;

    macro_rules! assert_approx {
	($real:expr, $expected:expr, $delta:expr) => {
	    if $real < $expected - $delta || $real > $expected + $delta {
		panic!( "Violate {:.4} == {:.4} (+-{:.4})", $real, $expected, $delta );
	    }
	}
    }

    fn set( items: &[usize] ) -> Itemset {
	Itemset::from_items( items.iter().copied() )
    }

    fn scenario() -> Vec<Itemvec> {
	vec!( vec!( 1, 2, 3 ), vec!( 1, 2 ), vec!( 1, 2 ), vec!( 3 ))
    }

    fn prepare( data: &[Itemvec], backend: Backend, model: &ItemsetModel, evaluator: &Evaluator<GreedyInference> ) -> TransactionDatabase {
	let mut database = TransactionDatabase::new( data, backend );
	database.initialize_cache( model );
	evaluator.refresh_costs( &mut database, model, None );
	database
    }

    fn singletons( data: &[Itemvec] ) -> ItemsetModel {
	ItemsetModel::from_singletons( &ItemOrder::new( data ), data.len() as Count )
    }

    #[test]
    fn step_reproduces_independence_model() {
	let data = scenario();
	let model = singletons( &data );
	for source in [CoverSource::Cache, CoverSource::Model] {
	    for backend in [Backend::Serial, Backend::Parallel] {
		let evaluator = Evaluator::new( &GreedyInference, source );
		let database = prepare( &data, backend, &model, &evaluator );
		let result = evaluator.step( &database, &model );
		assert_eq!( model.delta_norm( &result.probabilities ), Some( 0.0 ));
		let expected = (-6.0 * 0.75f64.ln() - 2.0 * 0.5f64.ln()) / 4.0;
		assert_approx!( result.average_cost, expected, 1e-9 );
		assert_approx!( database.average_cost(), expected, 1e-9 );
	    }
	}
    }

    #[test]
    fn step_drops_unused_itemsets() {
	let data = vec!( vec!( 1, 2 ), vec!( 1, 2 ), vec!( 3 ));
	let mut model = singletons( &data );
	model.insert( set( &[1, 2] ), 0.9 );
	model.insert( set( &[2, 3] ), 0.1 );
	let evaluator = Evaluator::new( &GreedyInference, CoverSource::Model );
	let database = TransactionDatabase::new( &data, Backend::Serial );
	let result = evaluator.step( &database, &model );
	assert_approx!( result.probabilities[ &set( &[1, 2] ) ], 2.0 / 3.0, 1e-12 );
	assert_eq!( result.probabilities[ &set( &[1] ) ], EPSILON );
	assert_approx!( result.probabilities[ &set( &[3] ) ], 1.0 / 3.0, 1e-12 );
	assert!( !result.probabilities.contains_key( &set( &[2, 3] )));
    }

    #[test]
    fn candidate_lowers_cost() {
	let data = scenario();
	let model = singletons( &data );
	let candidate = set( &[1, 2] );
	let subsets = model.direct_subsets( &candidate );
	let mut costs = Vec::new();
	for source in [CoverSource::Cache, CoverSource::Model] {
	    let evaluator = Evaluator::new( &GreedyInference, source );
	    let database = prepare( &data, Backend::Parallel, &model, &evaluator );
	    let before = database.average_cost();
	    let cost = evaluator.evaluate_candidate( &database, &model, &candidate, 0.75, &subsets );
	    assert!( cost < before, "{cost} >= {before}" );
	    // evaluation leaves everything untouched
	    assert_approx!( database.average_cost(), before, 1e-12 );
	    assert!( !model.contains( &candidate ));
	    costs.push( cost );
	}
	assert_approx!( costs[ 0 ], costs[ 1 ], 1e-9 );
	let expected = (-3.0 * 0.75f64.ln() - 2.0 * 0.5f64.ln() - 6.0 * (1.0 - EPSILON).ln()) / 4.0;
	assert_approx!( costs[ 0 ], expected, 1e-9 );
    }

    #[test]
    fn scoped_refresh() {
	let data = scenario();
	let mut model = singletons( &data );
	let evaluator = Evaluator::new( &GreedyInference, CoverSource::Cache );
	let mut database = prepare( &data, Backend::Serial, &model, &evaluator );
	let candidate = set( &[1, 2] );
	let subsets = model.direct_subsets( &candidate );
	let expected = evaluator.evaluate_candidate( &database, &model, &candidate, 0.75, &subsets );

	database.add_itemset_cache( &candidate, 0.75, &subsets );
	model.add_accepted_candidate( &candidate, 0.75, &subsets );
	let refreshed = evaluator.refresh_costs( &mut database, &model, Some( &candidate ));
	assert_approx!( refreshed, expected, 1e-9 );
	// the transaction without the candidate kept its cost
	assert_approx!( database.transactions()[ 3 ].cached_cost(), -(0.5f64.ln()), 1e-12 );
    }

    #[test]
    fn empty_database() {
	let evaluator = Evaluator::new( &GreedyInference, CoverSource::Cache );
	let database = TransactionDatabase::new( &[], Backend::Serial );
	let model = ItemsetModel::default();
	let result = evaluator.step( &database, &model );
	assert_eq!( result.average_cost, 0.0 );
	assert!( result.probabilities.is_empty() );
	assert_eq!( evaluator.evaluate_candidate( &database, &model, &set( &[1] ), 0.5, &[] ), 0.0 );
    }
}
