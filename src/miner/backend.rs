use rayon::prelude::*;

/// Strategy to process all transactions of a database.
/// Both variants yield the same results up to the order of floating point additions.
#[derive( Debug, Clone, Copy, Default, PartialEq, Eq )]
pub enum Backend {
    Serial,
    #[default]
    Parallel,
}

impl Backend {

    /// Maps every item and folds the results with reduce, starting from identity
    pub fn map_reduce <T, A, Id, M, R> ( &self, items: &[T], identity: Id, map: M, reduce: R ) -> A where
	T: Sync,
	A: Send,
	Id: Fn() -> A + Sync + Send,
	M: Fn( &T ) -> A + Sync + Send,
	R: Fn( A, A ) -> A + Sync + Send,
    {
	match self {
	    Backend::Serial => items.iter().map( map ).fold( identity(), reduce ),
	    Backend::Parallel => items.par_iter().map( map ).reduce( identity, reduce ),
	}
    }

    pub fn for_each_mut <T, F> ( &self, items: &mut [T], action: F ) where
	T: Send,
	F: Fn( &mut T ) + Sync + Send,
    {
	match self {
	    Backend::Serial => items.iter_mut().for_each( action ),
	    Backend::Parallel => items.par_iter_mut().for_each( action ),
	}
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn backends_agree() {
	let numbers: Vec<u64> = (1 ..= 1000).collect();
	let sum = |backend: Backend| backend.map_reduce( &numbers, || 0, |x| x * x, |a, b| a + b );
	assert_eq!( sum( Backend::Serial ), sum( Backend::Parallel ));
	assert_eq!( sum( Backend::Serial ), 333_833_500 );
    }

    #[test]
    fn for_each_touches_everything() {
	for backend in [Backend::Serial, Backend::Parallel] {
	    let mut numbers = vec!( 1, 2, 3 );
	    backend.for_each_mut( &mut numbers, |x| *x *= 2 );
	    assert_eq!( numbers, vec!( 2, 4, 6 ));
	}
    }
}
