use std::fmt;

/// Ways to change the set of itemsets in the model
#[derive( Debug, Clone, Copy, PartialEq, Eq, Hash )]
pub enum StructuralMove {
    /// union of two model itemsets
    Combine,
    /// subsets of a model itemset
    Simplify,
    /// itemsets sampled from the itemset tree
    TreeSearch,
}

#[derive( Debug, Clone, Copy, PartialEq, Eq )]
pub enum Step {
    Structure( StructuralMove ),
    ParameterOptimize,
}

/// Position of the search: the iteration and the step to take next
#[derive( Debug, Clone, Copy, PartialEq, Eq )]
pub struct SearchPhase {
    pub iteration: u64,
    pub step: Step,
}

/// Periods of the search steps. A period of zero disables the step.
#[derive( Debug, Clone, Copy, PartialEq, Eq )]
pub struct Schedule {
    pub combine_every: u64,
    pub simplify_every: u64,
    pub optimize_every: u64,
}

impl Default for Schedule {
    fn default() -> Self {
	Schedule{ combine_every: 3, simplify_every: 2, optimize_every: 1 }
    }
}

impl Schedule {

    /// Structural move of an iteration. Iterations count from 1; combining takes precedence over simplifying.
    pub fn move_for( &self, iteration: u64 ) -> StructuralMove {
	if divides( self.combine_every, iteration ) {
	    StructuralMove::Combine
	} else if divides( self.simplify_every, iteration ) {
	    StructuralMove::Simplify
	} else {
	    StructuralMove::TreeSearch
	}
    }

    pub fn optimize_after( &self, iteration: u64 ) -> bool {
	divides( self.optimize_every, iteration )
    }

    pub fn start( &self ) -> SearchPhase {
	SearchPhase{ iteration: 1, step: Step::Structure( self.move_for( 1 )) }
    }

    /// Phase that follows the given one
    pub fn transition( &self, phase: SearchPhase ) -> SearchPhase {
	let next_iteration = |iteration: u64| {
	    let iteration = iteration + 1;
	    SearchPhase{ iteration, step: Step::Structure( self.move_for( iteration )) }
	};
	match phase.step {
	    Step::Structure( _ ) if self.optimize_after( phase.iteration ) => SearchPhase{ step: Step::ParameterOptimize, ..phase },
	    Step::Structure( _ ) | Step::ParameterOptimize => next_iteration( phase.iteration ),
	}
    }
}

fn divides( period: u64, iteration: u64 ) -> bool {
    period != 0 && iteration % period == 0
}

impl fmt::Display for StructuralMove {
    fn fmt( &self, f: &mut fmt::Formatter<'_> ) -> fmt::Result {
	let name = match self {
	    StructuralMove::Combine => "combine",
	    StructuralMove::Simplify => "simplify",
	    StructuralMove::TreeSearch => "tree search",
	};
	write!( f, "{name}" )
    }
}
