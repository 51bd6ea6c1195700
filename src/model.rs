use std::cmp::Ordering;

use rustc_hash::FxHashMap;
use tracing::{debug, error, info, trace, warn, Level};

use crate::data::{Count, ItemOrder, Itemset, ItemsetTree};
use crate::Loggable;

pub mod inference;
pub mod serialize;

pub use inference::{cover_cost, GreedyInference, Inference};
pub use serialize::ModelFormatter;

/// Smallest probability an itemset can take. Keeps log costs finite.
pub const EPSILON: f64 = 1e-10;

/// Probabilities of the itemsets in the model
pub type Probabilities = FxHashMap<Itemset, f64>;

/// Generative model of transactions: every itemset occurs independently with its probability.
/// Singletons of all observed items are always part of the model.
#[derive( Debug, Clone, Default, PartialEq )]
pub struct ItemsetModel {
    probabilities: Probabilities,
}

/// Itemset of a mined model prepared for reporting
#[derive( Debug, Clone, PartialEq )]
pub struct ModelEntry {
    pub items: Itemset,
    pub probability: f64,
    pub interestingness: Option<f64>,
}

impl ItemsetModel {

    /// Independence model where each item occurs with its relative frequency
    pub fn from_singletons( order: &ItemOrder, transaction_count: Count ) -> ItemsetModel {
	let mut model = ItemsetModel::default();
	for (item, frequency) in order.items() {
	    let probability = if transaction_count == 0 { EPSILON } else { frequency as f64 / transaction_count as f64 };
	    model.insert( Itemset::singleton( item ), probability.max( EPSILON ));
	}
	model
    }

    pub fn len( &self ) -> usize { self.probabilities.len() }
    pub fn is_empty( &self ) -> bool { self.probabilities.is_empty() }

    pub fn get( &self, itemset: &Itemset ) -> Option<f64> {
	self.probabilities.get( itemset ).copied()
    }

    pub fn contains( &self, itemset: &Itemset ) -> bool {
	self.probabilities.contains_key( itemset )
    }

    pub fn insert( &mut self, itemset: Itemset, probability: f64 ) {
	self.probabilities.insert( itemset, probability );
    }

    pub fn iter( &self ) -> impl Iterator<Item = (&Itemset, f64)> + '_ {
	self.probabilities.iter().map( |(itemset, probability)| (itemset, *probability) )
    }

    pub fn itemsets( &self ) -> impl Iterator<Item = &Itemset> + '_ {
	self.probabilities.keys()
    }

    /// Model itemsets that are proper subsets of the candidate and not contained in another such subset.
    /// The result is sorted.
    pub fn direct_subsets( &self, candidate: &Itemset ) -> Vec<Itemset> {
	let proper_subsets: Vec<&Itemset> = self.itemsets()
	    .filter( |itemset| itemset.len() < candidate.len() && itemset.is_subset_of( candidate ))
	    .collect();
	let mut direct: Vec<Itemset> = proper_subsets.iter()
	    .filter( |subset| !proper_subsets.iter().any( |other| other.len() > subset.len() && subset.is_subset_of( other )))
	    .map( |subset| (*subset).clone() )
	    .collect();
	direct.sort_unstable();
	direct
    }

    /// Adds the candidate and moves its probability away from its direct subsets
    pub fn add_accepted_candidate( &mut self, candidate: &Itemset, probability: f64, subsets: &[Itemset] ) {
	for subset in subsets {
	    if let Some( current ) = self.probabilities.get_mut( subset ) {
		*current = (*current - probability).max( EPSILON );
	    }
	}
	self.probabilities.insert( candidate.clone(), probability );
    }

    pub fn replace_probabilities( &mut self, probabilities: Probabilities ) {
	self.probabilities = probabilities;
    }

    /// Euclidean distance to other probabilities. None if the itemsets differ.
    pub fn delta_norm( &self, other: &Probabilities ) -> Option<f64> {
	if self.probabilities.len() != other.len() {
	    return None;
	}
	let mut squares = 0.0;
	for (itemset, probability) in &self.probabilities {
	    let delta = probability - other.get( itemset )?;
	    squares += delta * delta;
	}
	Some( squares.sqrt() )
    }

    /// How much more often the itemset is generated than it occurs in the data
    pub fn interestingness( &self, itemset: &Itemset, tree: &ItemsetTree ) -> f64 {
	let support = tree.support( itemset );
	match self.get( itemset ) {
	    Some( probability ) if support > 0 => probability * tree.transaction_count() as f64 / support as f64,
	    _ => 0.0,
	}
    }

    /// Entries ordered by descending probability, then by descending interestingness, then by itemset
    pub fn sorted_entries( &self, tree: Option<&ItemsetTree> ) -> Vec<ModelEntry> {
	let mut entries: Vec<ModelEntry> = self.iter()
	    .map( |(itemset, probability)| ModelEntry{
		items: itemset.clone(),
		probability,
		interestingness: tree.map( |tree| self.interestingness( itemset, tree )),
	    }).collect();
	entries.sort_unstable_by( |left, right| {
	    right.probability.total_cmp( &left.probability )
		.then_with( || match (left.interestingness, right.interestingness) {
		    (Some( l ), Some( r )) => r.total_cmp( &l ),
		    _ => Ordering::Equal,
		})
		.then_with( || left.items.cmp( &right.items ))
	});
	entries
    }
}

impl Loggable for ItemsetModel {
    fn log( &self, message: &str, level: Level ) {
	let entries = self.sorted_entries( None );
	let lines: Vec<String> = entries.iter()
	    .map( |entry| format!( "{:.4} {}", entry.probability, entry.items ))
	    .collect();
	let text = format!( "{message} ({} itemsets): {}", entries.len(), lines.join( ", " ));
	if level == Level::ERROR {
	    error!( "{text}" );
	} else if level == Level::WARN {
	    warn!( "{text}" );
	} else if level == Level::INFO {
	    info!( "{text}" );
	} else if level == Level::DEBUG {
	    debug!( "{text}" );
	} else {
	    trace!( "{text}" );
	}
    }
}
