use std::fmt;
use std::str::FromStr;

use rand::Rng;
use tracing::debug;

use crate::data::{Itemset, Itemvec};
use crate::model::ItemsetModel;

/// Small generating models that are hard for support-based miners
#[derive( Debug, Clone, Copy, PartialEq, Eq )]
pub enum Problem {
    /// {1, 2} is rare but never occurs by chance
    Caviar,
    /// {1, 2} always occurs together, {3} rides along
    Freerider,
    /// independent items, one of them very frequent
    Unlifted,
}

impl Problem {
    pub fn model( &self ) -> ItemsetModel {
	let entries: Vec<(Itemvec, f64)> = match self {
	    Problem::Caviar => vec!( (vec!( 1, 2 ), 0.1), (vec!( 3 ), 0.8), (vec!( 4 ), 0.5) ),
	    Problem::Freerider => vec!( (vec!( 1, 2 ), 0.5), (vec!( 3 ), 0.5) ),
	    Problem::Unlifted => vec!( (vec!( 1 ), 0.2), (vec!( 2 ), 0.8) ),
	};
	let mut model = ItemsetModel::default();
	for (items, probability) in entries {
	    model.insert( Itemset::from_items( items ), probability );
	}
	model
    }
}

impl FromStr for Problem {
    type Err = String;

    fn from_str( name: &str ) -> Result<Self, Self::Err> {
	match name {
	    "caviar" => Ok( Problem::Caviar ),
	    "freerider" => Ok( Problem::Freerider ),
	    "unlifted" => Ok( Problem::Unlifted ),
	    _ => Err( format!( "unknown problem '{name}'" )),
	}
    }
}

impl fmt::Display for Problem {
    fn fmt( &self, f: &mut fmt::Formatter<'_> ) -> fmt::Result {
	let name = match self {
	    Problem::Caviar => "caviar",
	    Problem::Freerider => "freerider",
	    Problem::Unlifted => "unlifted",
	};
	write!( f, "{name}" )
    }
}

/// Union of the model itemsets, each drawn independently with its probability
pub fn sample_transaction <R: Rng + ?Sized> ( model: &ItemsetModel, rng: &mut R ) -> Itemset {
    let mut items = Itemvec::new();
    // a fixed order keeps seeded samples reproducible
    for entry in model.sorted_entries( None ) {
	if rng.gen::<f64>() < entry.probability {
	    items.extend( entry.items.iter() );
	}
    }
    Itemset::from_items( items )
}

/// Samples the given number of transactions and drops the empty ones
pub fn generate_database <R: Rng + ?Sized> ( model: &ItemsetModel, samples: usize, rng: &mut R ) -> Vec<Itemvec> {
    let database: Vec<Itemvec> = (0 .. samples)
	.map( |_| sample_transaction( model, rng ))
	.filter( |transaction| !transaction.is_empty() )
	.map( |transaction| transaction.items().to_vec() )
	.collect();
    debug!( "Generated {} transactions from {samples} samples", database.len() );
    database
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::miner::{prepare, Backend, Miner, MinerConfig, StructuralEm};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn problems_by_name() {
	for problem in [Problem::Caviar, Problem::Freerider, Problem::Unlifted] {
	    assert_eq!( problem.to_string().parse::<Problem>(), Ok( problem ));
	}
	assert!( "champagne".parse::<Problem>().is_err() );
	assert_eq!( Problem::Caviar.model().len(), 3 );
    }

    #[test]
    fn samples_are_unions_of_itemsets() {
	let model = Problem::Freerider.model();
	let mut rng = StdRng::seed_from_u64( 17 );
	let data = generate_database( &model, 1000, &mut rng );
	assert!( !data.is_empty() && data.len() < 1000 );
	for transaction in &data {
	    let itemset = Itemset::from_items( transaction.iter().copied() );
	    assert!( [vec!( 1, 2 ), vec!( 3 ), vec!( 1, 2, 3 )].contains( &itemset.items().to_vec() ), "{itemset}" );
	}
	// about three quarters of the samples contain something
	assert!( data.len() > 650 && data.len() < 850 );
    }

    #[test]
    fn mining_recovers_freerider_pair() {
	let mut rng = StdRng::seed_from_u64( 23 );
	let data = generate_database( &Problem::Freerider.model(), 400, &mut rng );
	let (tree, mut database, model) = prepare( &data, Backend::Parallel );
	let config = MinerConfig::default().with_seed( 23 ).with_max_structure_steps( 500 ).with_max_iterations( 20 );
	let outcome = StructuralEm::greedy( config ).mine( &tree, &mut database, model );
	assert!( outcome.model.contains( &Itemset::from_items( vec!( 1, 2 ))));
    }
}
