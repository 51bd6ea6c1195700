use bit_set::BitSet;
use rustc_hash::FxHashMap;
use tracing::debug;

use super::{Itemset, Itemvec};
use crate::miner::backend::Backend;
use crate::model::{ItemsetModel, EPSILON};

/// Transaction with a cache of the model itemsets it contains.
/// Cached probabilities are stored as computed and clamped when read.
#[derive( Debug, Clone )]
pub struct Transaction {
    items: Itemset,
    members: BitSet,
    cache: FxHashMap<Itemset, f64>,
    cached_cost: f64,
}

/// All transactions of the database together with the backend that processes them
#[derive( Debug, Clone, Default )]
pub struct TransactionDatabase {
    transactions: Vec<Transaction>,
    backend: Backend,
}

impl Transaction {

    pub fn new( items: Itemset ) -> Transaction {
	let members = items.to_bitset();
	Transaction{ items, members, cache: FxHashMap::default(), cached_cost: 0.0 }
    }

    pub fn items( &self ) -> &Itemset { &self.items }

    pub fn contains( &self, itemset: &Itemset ) -> bool {
	itemset.is_contained_in( &self.members )
    }

    pub fn cached_itemsets( &self ) -> impl Iterator<Item = &Itemset> + '_ {
	self.cache.keys()
    }

    /// Cached model itemsets with their probabilities, ordered by itemset
    pub fn cached_candidates( &self ) -> Vec<(&Itemset, f64)> {
	let mut candidates: Vec<(&Itemset, f64)> = self.cache.iter()
	    .map( |(itemset, probability)| (itemset, probability.max( EPSILON )))
	    .collect();
	candidates.sort_unstable_by( |left, right| left.0.cmp( right.0 ));
	candidates
    }

    /// Cache entries as stored, without clamping
    pub fn raw_cache( &self ) -> impl Iterator<Item = (&Itemset, f64)> + '_ {
	self.cache.iter().map( |(itemset, probability)| (itemset, *probability) )
    }

    pub fn cached_probability( &self, itemset: &Itemset ) -> Option<f64> {
	self.cache.get( itemset ).map( |probability| probability.max( EPSILON ))
    }

    pub fn cached_cost( &self ) -> f64 { self.cached_cost }

    pub fn set_cached_cost( &mut self, cost: f64 ) {
	self.cached_cost = cost;
    }

    /// Caches every model itemset the transaction contains
    pub fn initialize_cache( &mut self, model: &ItemsetModel ) {
	self.cache.clear();
	for (itemset, probability) in model.iter() {
	    if self.contains( itemset ) {
		self.cache.insert( itemset.clone(), probability );
	    }
	}
    }

    /// Moves probability mass from the cached subsets to the new candidate.
    pub fn add_itemset_cache( &mut self, candidate: &Itemset, probability: f64, subsets: &[Itemset] ) {
	if !self.contains( candidate ) {
	    return;
	}
	for subset in subsets {
	    if let Some( cached ) = self.cache.get_mut( subset ) {
		*cached -= probability;
	    }
	}
	self.cache.insert( candidate.clone(), probability );
    }

    /// Reverts add_itemset_cache with the same arguments
    pub fn remove_itemset_cache( &mut self, candidate: &Itemset, probability: f64, subsets: &[Itemset] ) {
	if self.cache.remove( candidate ).is_none() {
	    return;
	}
	for subset in subsets {
	    if let Some( cached ) = self.cache.get_mut( subset ) {
		*cached += probability;
	    }
	}
    }

    /// Takes the probabilities of the model. Itemsets that left the model leave the cache.
    pub fn update_cache_probabilities( &mut self, model: &ItemsetModel ) {
	self.cache.retain( |itemset, cached| match model.get( itemset ) {
	    Some( probability ) => {
		*cached = probability;
		true
	    },
	    None => false,
	});
    }
}

impl TransactionDatabase {

    pub fn new( data: &[Itemvec], backend: Backend ) -> TransactionDatabase {
	let transactions = data.iter()
	    .map( |items| Transaction::new( Itemset::from_items( items.iter().copied() )))
	    .collect();
	TransactionDatabase{ transactions, backend }
    }

    pub fn len( &self ) -> usize { self.transactions.len() }
    pub fn is_empty( &self ) -> bool { self.transactions.is_empty() }
    pub fn backend( &self ) -> Backend { self.backend }

    pub fn transactions( &self ) -> &[Transaction] {
	&self.transactions
    }

    pub fn transactions_mut( &mut self ) -> &mut [Transaction] {
	&mut self.transactions
    }

    /// Mean of the cached costs. Zero for an empty database.
    pub fn average_cost( &self ) -> f64 {
	if self.transactions.is_empty() {
	    return 0.0;
	}
	let total = self.backend.map_reduce( &self.transactions, || 0.0, |t| t.cached_cost, |a, b| a + b );
	total / self.transactions.len() as f64
    }

    pub fn initialize_cache( &mut self, model: &ItemsetModel ) {
	self.backend.for_each_mut( &mut self.transactions, |t| t.initialize_cache( model ));
	debug!( "Initialized cache of {} transactions with {} itemsets", self.len(), model.len() );
    }

    pub fn add_itemset_cache( &mut self, candidate: &Itemset, probability: f64, subsets: &[Itemset] ) {
	self.backend.for_each_mut( &mut self.transactions, |t| t.add_itemset_cache( candidate, probability, subsets ));
    }

    pub fn remove_itemset_cache( &mut self, candidate: &Itemset, probability: f64, subsets: &[Itemset] ) {
	self.backend.for_each_mut( &mut self.transactions, |t| t.remove_itemset_cache( candidate, probability, subsets ));
    }

    pub fn update_cache_probabilities( &mut self, model: &ItemsetModel ) {
	self.backend.for_each_mut( &mut self.transactions, |t| t.update_cache_probabilities( model ));
    }
}
