use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::iter::FromIterator;

use bit_set::BitSet;
use rustc_hash::FxHashMap;
use serde::Serialize;

pub mod itemset_tree;
pub mod transactions;

pub use itemset_tree::{ItemsetTree, TreeStatistics};
pub use transactions::{Transaction, TransactionDatabase};

pub type Count = u64;
pub type Item = usize;
/// Unsorted items as read from a data source
pub type Itemvec = Vec<Item>;
/// Position of an item in the frequency order. Rank 0 is the most frequent item.
pub type Rank = usize;

/// Set of items, stored sorted by item identifier without duplicates.
#[derive( Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord )]
pub struct Itemset {
    items: Vec<Item>,
}

/// Total order over items by descending frequency. Ties are broken by the item identifier.
#[derive( Debug, Clone, Default )]
pub struct ItemOrder {
    /// maps original items to their rank
    rank: FxHashMap<Item, Rank>,
    /// items by rank
    items: Vec<Item>,
    /// frequencies by rank
    frequencies: Vec<Count>,
}

impl Itemset {

    pub fn new() -> Itemset {
	Itemset{ items: Vec::new() }
    }

    pub fn singleton( item: Item ) -> Itemset {
	Itemset{ items: vec!( item ) }
    }

    /// Creates the itemset from arbitrary items. Duplicates are removed.
    pub fn from_items <I> ( items: I ) -> Itemset where I: IntoIterator<Item = Item> {
	let mut items: Vec<Item> = items.into_iter().collect();
	items.sort_unstable();
	items.dedup();
	Itemset{ items }
    }

    pub fn len( &self ) -> usize { self.items.len() }
    pub fn is_empty( &self ) -> bool { self.items.is_empty() }
    pub fn items( &self ) -> &[Item] { &self.items }

    pub fn iter( &self ) -> impl Iterator<Item = Item> + '_ {
	self.items.iter().copied()
    }

    pub fn contains( &self, item: Item ) -> bool {
	self.items.binary_search( &item ).is_ok()
    }

    /// Checks whether every item of self occurs in other
    pub fn is_subset_of( &self, other: &Itemset ) -> bool {
	if self.len() > other.len() {
	    return false;
	}
	let mut other_items = other.items.iter();
	'outer: for item in &self.items {
	    for candidate in other_items.by_ref() {
		match candidate.cmp( item ) {
		    Ordering::Less => continue,
		    Ordering::Equal => continue 'outer,
		    Ordering::Greater => return false,
		}
	    }
	    return false;
	}
	true
    }

    /// Checks whether all items are members of the bit set
    pub fn is_contained_in( &self, members: &BitSet ) -> bool {
	self.items.iter().all( |item| members.contains( *item ))
    }

    pub fn union( &self, other: &Itemset ) -> Itemset {
	let mut items = Vec::with_capacity( self.len() + other.len() );
	let (mut left, mut right) = (self.items.iter().peekable(), other.items.iter().peekable());
	loop {
	    let next = match (left.peek(), right.peek()) {
		(Some( l ), Some( r )) => match l.cmp( r ) {
		    Ordering::Less => left.next(),
		    Ordering::Greater => right.next(),
		    Ordering::Equal => { right.next(); left.next() },
		},
		(Some( _ ), None) => left.next(),
		(None, Some( _ )) => right.next(),
		(None, None) => break,
	    };
	    items.extend( next.copied() );
	}
	Itemset{ items }
    }

    pub fn to_bitset( &self ) -> BitSet {
	let capacity = self.items.last().map_or( 0, |item| item + 1 );
	let mut set = BitSet::with_capacity( capacity );
	for item in &self.items {
	    set.insert( *item );
	}
	set
    }
}

impl FromIterator<Item> for Itemset {
    fn from_iter<I: IntoIterator<Item = Item>>( iter: I ) -> Self {
	Itemset::from_items( iter )
    }
}

impl From<Vec<Item>> for Itemset {
    fn from( items: Vec<Item> ) -> Self {
	Itemset::from_items( items )
    }
}

impl fmt::Display for Itemset {
    fn fmt( &self, f: &mut fmt::Formatter<'_> ) -> fmt::Result {
	write!( f, "{{" )?;
	for (position, item) in self.items.iter().enumerate() {
	    if position > 0 {
		write!( f, " " )?;
	    }
	    write!( f, "{item}" )?;
	}
	write!( f, "}}" )
    }
}

impl Serialize for Itemset {
    fn serialize<S>( &self, serializer: S ) -> Result<S::Ok, S::Error> where S: serde::Serializer {
	self.items.serialize( serializer )
    }
}

impl ItemOrder {

    /// Derives the order from the item frequencies of a sample of transactions.
    pub fn new <'a, D, T> ( sample: D ) -> ItemOrder where
	D: IntoIterator<Item = T>,
	T: IntoIterator<Item = &'a Item>
    {
	ItemOrder::from_frequencies( &calc_item_frequencies( sample ))
    }

    pub fn from_frequencies( item_to_count: &HashMap<Item, Count> ) -> ItemOrder {
	let mut items: Vec<Item> = item_to_count.keys().copied().collect();
	let count_of = |item: &Item| *item_to_count.get( item ).expect( "every item has a count" );
	items.sort_unstable_by( |left, right| count_of( right ).cmp( &count_of( left )).then( left.cmp( right )));

	let rank = items.iter().enumerate().map( |(rank, item)| (*item, rank) ).collect();
	let frequencies = items.iter().map( count_of ).collect();
	ItemOrder{ rank, items, frequencies }
    }

    pub fn len( &self ) -> usize { self.items.len() }
    pub fn is_empty( &self ) -> bool { self.items.is_empty() }

    pub fn rank( &self, item: Item ) -> Option<Rank> {
	self.rank.get( &item ).copied()
    }

    /// Pre: rank is smaller than the number of items
    pub fn item( &self, rank: Rank ) -> Item {
	self.items[ rank ]
    }

    pub fn frequency( &self, item: Item ) -> Count {
	self.rank( item ).map_or( 0, |rank| self.frequencies[ rank ] )
    }

    /// Iterates over items from the most to the least frequent
    pub fn items( &self ) -> impl Iterator<Item = (Item, Count)> + '_ {
	self.items.iter().copied().zip( self.frequencies.iter().copied() )
    }

    pub fn compare( &self, left: Item, right: Item ) -> Ordering {
	match (self.rank( left ), self.rank( right )) {
	    (Some( l ), Some( r )) => l.cmp( &r ),
	    // unknown items go last
	    (Some( _ ), None) => Ordering::Less,
	    (None, Some( _ )) => Ordering::Greater,
	    (None, None) => left.cmp( &right ),
	}
    }

    /// Translates the items into sorted ranks. None if an item is not part of the order.
    pub fn ranks_of <I> ( &self, items: I ) -> Option<Vec<Rank>> where I: IntoIterator<Item = Item> {
	let mut ranks = items.into_iter()
	    .map( |item| self.rank( item ))
	    .collect::<Option<Vec<Rank>>>()?;
	ranks.sort_unstable();
	ranks.dedup();
	Some( ranks )
    }
}

/// Counts the transactions every item occurs in. Repeated items count once per transaction.
pub fn calc_item_frequencies <'a, D, T> ( sample: D ) -> HashMap<Item, Count> where
    D: IntoIterator<Item = T>,
    T: IntoIterator<Item = &'a Item>
{
    let mut counts: HashMap<Item, Count> = HashMap::new();
    for transaction in sample {
	for item in Itemset::from_items( transaction.into_iter().copied() ).iter() {
	    *counts.entry( item ).or_insert( 0 ) += 1;
	}
    }
    counts
}
