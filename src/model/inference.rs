use bit_set::BitSet;

use crate::data::Itemset;
use super::EPSILON;

/// Chooses the itemsets that explain a transaction.
pub trait Inference: Sync {
    /// Returns the positions of the chosen candidates.
    /// The candidates are the model itemsets contained in the transaction, with their probabilities.
    fn infer( &self, transaction: &Itemset, candidates: &[(&Itemset, f64)] ) -> Vec<usize>;
}

/// Set cover heuristic: take the itemset with the lowest cost per newly covered item until the transaction is covered
#[derive( Debug, Clone, Copy, Default )]
pub struct GreedyInference;

impl Inference for GreedyInference {

    fn infer( &self, transaction: &Itemset, candidates: &[(&Itemset, f64)] ) -> Vec<usize> {
	let mut covered = BitSet::new();
	let mut uncovered = transaction.len();
	let mut available: Vec<bool> = candidates.iter()
	    .map( |(itemset, _)| itemset.is_subset_of( transaction ))
	    .collect();
	let mut chosen = Vec::new();

	while uncovered > 0 {
	    let mut best: Option<(usize, f64)> = None;
	    for (index, (itemset, probability)) in candidates.iter().enumerate() {
		if !available[ index ] {
		    continue;
		}
		let fresh = itemset.iter().filter( |item| !covered.contains( *item )).count();
		if fresh == 0 {
		    continue;
		}
		let score = -clamp( *probability ).ln() / fresh as f64;
		let is_better = match best {
		    None => true,
		    Some( (best_index, best_score) ) => score < best_score
			|| (score == best_score && *itemset < candidates[ best_index ].0),
		};
		if is_better {
		    best = Some( (index, score) );
		}
	    }

	    // nothing covers a new item
	    let Some( (index, _) ) = best else { break };
	    available[ index ] = false;
	    chosen.push( index );
	    for item in candidates[ index ].0.iter() {
		if covered.insert( item ) {
		    uncovered -= 1;
		}
	    }
	}
	chosen
    }
}

/// Cost of a cover: -ln p for every chosen candidate and -ln(1 - p) for every other one
pub fn cover_cost( chosen: &[usize], candidates: &[(&Itemset, f64)] ) -> f64 {
    let mut is_chosen = vec!( false; candidates.len() );
    for index in chosen {
	is_chosen[ *index ] = true;
    }
    candidates.iter().zip( is_chosen )
	.map( |((_, probability), used)| {
	    let probability = clamp( *probability );
	    if used { -probability.ln() } else { -(1.0 - probability).ln() }
	}).sum()
}

fn clamp( probability: f64 ) -> f64 {
    probability.clamp( EPSILON, 1.0 - EPSILON )
}
