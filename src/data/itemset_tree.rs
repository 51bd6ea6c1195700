use std::fmt;
use std::time::{Duration, Instant};

use bit_vec::BitVec;
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use statrs::distribution::{ChiSquared, ContinuousCDF};
use tracing::{debug, info};

use super::{Count, Item, ItemOrder, Itemset, Itemvec, Rank};

type NodeId = usize;
const ROOT: NodeId = 0;

/// Compact itemset tree over transactions sorted by descending item frequency.
/// Nodes live in an arena and refer to each other by index.
pub struct ItemsetTree {
    nodes: Vec<Node>,
    order: ItemOrder,
    build_time: Duration,
}

/// A node stores only the items it adds to the path of its parent.
#[derive( Debug )]
struct Node {
    fragment: Vec<Rank>,
    /// number of transactions whose sorted items start with the path of this node
    support: Count,
    parent: Option<NodeId>,
    /// invariant: ordered by the first rank of their fragments, which are distinct
    children: Vec<NodeId>,
}

/// Shape of the tree, for logging
#[derive( Debug, Clone, Default, PartialEq )]
pub struct TreeStatistics {
    pub node_count: usize,
    pub item_count: usize,
    pub branch_count: usize,
    pub total_branch_length: usize,
    pub build_time: Duration,
}

impl ItemsetTree {

    pub fn new( order: ItemOrder ) -> ItemsetTree {
	ItemsetTree{
	    nodes: vec!( Node::new( Vec::new(), 0, None )),
	    order,
	    build_time: Duration::ZERO,
	}
    }

    /// Inserts every transaction into a new tree using the given item order.
    pub fn build <'a, D> ( transactions: D, order: ItemOrder ) -> ItemsetTree where
	D: IntoIterator<Item = &'a Itemvec>
    {
	let start = Instant::now();
	let mut tree = ItemsetTree::new( order );
	for transaction in transactions {
	    tree.insert( transaction.iter().copied() );
	}
	tree.build_time = start.elapsed();

	let statistics = tree.statistics();
	info!( "Built itemset tree for {} transactions in {}ms", tree.transaction_count(), statistics.build_time.as_millis() );
	debug!( "{statistics}" );
	tree
    }

    /// Builds the tree with the item order derived from the transactions themselves
    pub fn from_transactions( transactions: &[Itemvec] ) -> ItemsetTree {
	let order = ItemOrder::new( transactions );
	ItemsetTree::build( transactions, order )
    }

    pub fn order( &self ) -> &ItemOrder { &self.order }

    pub fn transaction_count( &self ) -> Count {
	self.nodes[ ROOT ].support
    }

    /// Adds a transaction to the tree.
    /// Pre: every item is part of the tree's order
    pub fn insert <I> ( &mut self, items: I ) where I: IntoIterator<Item = Item> {
	let ranks = self.order.ranks_of( items ).expect( "order covers every item of the database" );
	self.insert_ranks( &ranks );
    }

    fn insert_ranks( &mut self, sequence: &[Rank] ) {
	let mut node = ROOT;
	let mut remainder = sequence;
	loop {
	    self.nodes[ node ].support += 1;
	    // the sequence ends here, so it names this node exactly
	    if remainder.is_empty() {
		return;
	    }

	    let position = match self.find_child( node, remainder[ 0 ] ) {
		Ok( position ) => position,
		Err( position ) => {
		    // no child shares a prefix: attach a new leaf
		    let leaf = self.create_node( remainder.to_vec(), 1, node );
		    self.nodes[ node ].children.insert( position, leaf );
		    return;
		}
	    };

	    let child = self.nodes[ node ].children[ position ];
	    let common = common_prefix_length( &self.nodes[ child ].fragment, remainder );
	    if common == self.nodes[ child ].fragment.len() {
		// the child's path is a prefix of the sequence
		node = child;
		remainder = &remainder[ common .. ];
		continue;
	    }

	    // Paths diverge inside the child's fragment. Split it and hang the child below the common prefix.
	    debug_assert_eq!( self.nodes[ child ].parent, Some( node ));
	    let tail = self.nodes[ child ].fragment.split_off( common );
	    let head = std::mem::replace( &mut self.nodes[ child ].fragment, tail );
	    let support = self.nodes[ child ].support + 1;
	    let intermediate = self.create_node( head, support, node );
	    self.nodes[ node ].children[ position ] = intermediate;
	    self.nodes[ child ].parent = Some( intermediate );
	    self.nodes[ intermediate ].children.push( child );

	    if common < remainder.len() {
		// branch off the rest of the sequence
		let leaf = self.create_node( remainder[ common .. ].to_vec(), 1, intermediate );
		let slot = if remainder[ common ] < self.nodes[ child ].fragment[ 0 ] { 0 } else { 1 };
		self.nodes[ intermediate ].children.insert( slot, leaf );
	    }
	    // otherwise the sequence ends at the intermediate node
	    return;
	}
    }

    fn create_node( &mut self, fragment: Vec<Rank>, support: Count, parent: NodeId ) -> NodeId {
	let id = self.nodes.len();
	self.nodes.push( Node::new( fragment, support, Some( parent )));
	id
    }

    /// Locates the child whose fragment starts with the rank, or the position where it would go.
    fn find_child( &self, node: NodeId, first: Rank ) -> Result<usize, usize> {
	self.nodes[ node ].children.binary_search_by( |child| self.nodes[ *child ].fragment[ 0 ].cmp( &first ))
    }

    /// Number of transactions containing every item of the itemset
    pub fn support( &self, itemset: &Itemset ) -> Count {
	match self.order.ranks_of( itemset.iter() ) {
	    Some( ranks ) => self.support_of_ranks( &ranks ),
	    None => 0, // item never seen
	}
    }

    pub fn relative_support( &self, itemset: &Itemset ) -> f64 {
	let n = self.transaction_count();
	if n == 0 {
	    return 0.0;
	}
	self.support( itemset ) as f64 / n as f64
    }

    fn support_of_ranks( &self, query: &[Rank] ) -> Count {
	if query.is_empty() {
	    return self.transaction_count();
	}
	self.count( ROOT, query )
    }

    /// Sums the supports of the highest nodes below node whose paths include the sorted query.
    fn count( &self, node: NodeId, query: &[Rank] ) -> Count {
	let mut sum = 0;
	for child_id in &self.nodes[ node ].children {
	    let child = &self.nodes[ *child_id ];
	    // fragments of later siblings start even later, so query[0] can't occur below them
	    if child.fragment[ 0 ] > query[ 0 ] {
		break;
	    }
	    let (next_position, is_super) = is_partial_superset( query, &child.fragment );
	    if next_position == query.len() {
		sum += child.support;
	    } else if is_super {
		sum += self.count( *child_id, &query[ next_position .. ] );
	    }
	}
	sum
    }

    /// Number of transactions that contain all items in included and none in excluded
    pub fn count_empirical( &self, included: &Itemset, excluded: &Itemset ) -> Count {
	let included = match self.order.ranks_of( included.iter() ) {
	    Some( ranks ) => ranks,
	    None => return 0,
	};
	// unknown items never occur, so they can't exclude anything
	let excluded: Vec<Rank> = {
	    let mut ranks: Vec<Rank> = excluded.iter().filter_map( |item| self.order.rank( item )).collect();
	    ranks.sort_unstable();
	    ranks
	};
	self.count_empirical_ranks( &included, &excluded )
    }

    fn count_empirical_ranks( &self, included: &[Rank], excluded: &[Rank] ) -> Count {
	if intersects( included, excluded ) {
	    return 0;
	}
	if included.is_empty() {
	    return self.transaction_count() - self.count_any( ROOT, excluded );
	}
	self.count_excluding( ROOT, included, excluded )
    }

    /// Like count, but skips subtrees with excluded items.
    /// Pre: included is not empty
    fn count_excluding( &self, node: NodeId, included: &[Rank], excluded: &[Rank] ) -> Count {
	let mut sum = 0;
	for child_id in &self.nodes[ node ].children {
	    let child = &self.nodes[ *child_id ];
	    if child.fragment[ 0 ] > included[ 0 ] {
		break;
	    }
	    if intersects( &child.fragment, excluded ) {
		continue;
	    }
	    let (next_position, is_super) = is_partial_superset( included, &child.fragment );
	    if next_position == included.len() {
		sum += child.support - self.count_any( *child_id, excluded );
	    } else if is_super {
		sum += self.count_excluding( *child_id, &included[ next_position .. ], excluded );
	    }
	}
	sum
    }

    /// Number of transactions below node that contain any of the excluded items.
    /// Pre: the path up to node contains none of them
    fn count_any( &self, node: NodeId, excluded: &[Rank] ) -> Count {
	let last = match excluded.last() {
	    Some( last ) => *last,
	    None => return 0,
	};
	let mut sum = 0;
	for child_id in &self.nodes[ node ].children {
	    let child = &self.nodes[ *child_id ];
	    if child.fragment[ 0 ] > last {
		break;
	    }
	    if intersects( &child.fragment, excluded ) {
		sum += child.support;
	    } else {
		sum += self.count_any( *child_id, excluded );
	    }
	}
	sum
    }

    /// Pearson's chi-squared statistic (one degree of freedom) for the co-occurrence of two itemsets.
    pub fn chi_squared( &self, first: &Itemset, second: &Itemset ) -> f64 {
	let n = self.transaction_count() as f64;
	if n == 0.0 {
	    return 0.0;
	}
	let both = self.support( &first.union( second )) as f64;
	let first_support = self.support( first ) as f64;
	let second_support = self.support( second ) as f64;

	let observed = [
	    both,
	    first_support - both,
	    second_support - both,
	    n - first_support - second_support + both,
	];
	let expected = [
	    first_support * second_support / n,
	    first_support * (n - second_support) / n,
	    (n - first_support) * second_support / n,
	    (n - first_support) * (n - second_support) / n,
	];
	observed.iter().zip( expected.iter() )
	    .map( |(o, e)| pearson_term( *o, *e ))
	    .sum()
    }

    /// Chi-squared statistic of the itemset against the independence model over its items.
    pub fn chi_squared_of_itemset( &self, itemset: &Itemset ) -> f64 {
	if self.transaction_count() == 0 {
	    return 0.0;
	}
	let ranks = match self.order.ranks_of( itemset.iter() ) {
	    Some( ranks ) => ranks,
	    None => return 0.0,
	};
	let mut cell = BitVec::from_elem( ranks.len(), false );
	self.recursive_chi_squared( 0, &mut cell, &ranks )
    }

    fn recursive_chi_squared( &self, position: usize, cell: &mut BitVec, ranks: &[Rank] ) -> f64 {
	if position < ranks.len() {
	    cell.set( position, true );
	    let inside = self.recursive_chi_squared( position + 1, cell, ranks );
	    cell.set( position, false );
	    let outside = self.recursive_chi_squared( position + 1, cell, ranks );
	    return inside + outside;
	}

	let n = self.transaction_count() as f64;
	let mut expected = n;
	let (mut included, mut excluded) = (Vec::new(), Vec::new());
	for (index, rank) in ranks.iter().enumerate() {
	    let marginal = self.support_of_ranks( &[*rank] ) as f64 / n;
	    if cell[ index ] {
		included.push( *rank );
		expected *= marginal;
	    } else {
		excluded.push( *rank );
		expected *= 1.0 - marginal;
	    }
	}
	let observed = self.count_empirical_ranks( &included, &excluded ) as f64;
	pearson_term( observed, expected )
    }

    /// Samples an itemset by a support-weighted walk from the root.
    pub fn random_walk <R: Rng + ?Sized> ( &self, rng: &mut R ) -> Itemset {
	let mut sample = Itemvec::new();
	let mut node = ROOT;
	loop {
	    let current = &self.nodes[ node ];
	    for rank in &current.fragment {
		if rng.gen_bool( 0.5 ) {
		    sample.push( self.order.item( *rank ));
		}
	    }

	    if current.children.is_empty() || current.support == 0 {
		break;
	    }
	    let child_support: Count = current.children.iter().map( |child| self.nodes[ *child ].support ).sum();
	    let stop_probability = (current.support - child_support) as f64 / current.support as f64;
	    if rng.gen::<f64>() < stop_probability {
		break;
	    }

	    let weights = current.children.iter().map( |child| self.nodes[ *child ].support );
	    let choice = WeightedIndex::new( weights ).expect( "children have positive support" );
	    node = current.children[ choice.sample( rng ) ];
	}
	Itemset::from_items( sample )
    }

    pub fn statistics( &self ) -> TreeStatistics {
	let mut statistics = TreeStatistics{ build_time: self.build_time, ..Default::default() };
	self.collect_statistics( ROOT, 0, &mut statistics );
	statistics
    }

    fn collect_statistics( &self, node: NodeId, depth: usize, statistics: &mut TreeStatistics ) {
	let current = &self.nodes[ node ];
	if node != ROOT {
	    statistics.node_count += 1;
	    statistics.item_count += current.fragment.len();
	}
	if current.children.is_empty() {
	    statistics.branch_count += 1;
	    statistics.total_branch_length += depth;
	}
	for child in &current.children {
	    self.collect_statistics( *child, depth + 1, statistics );
	}
    }

    fn format_node( &self, f: &mut fmt::Formatter<'_>, node: NodeId, depth: usize ) -> fmt::Result {
	let current = &self.nodes[ node ];
	let items = Itemset::from_items( current.fragment.iter().map( |rank| self.order.item( *rank )));
	writeln!( f, "{:indent$}{items} : {}", "", current.support, indent = 2 * depth )?;
	for child in &current.children {
	    self.format_node( f, *child, depth + 1 )?;
	}
	Ok( () )
    }
}

/// Upper tail probability of a chi-squared statistic with one degree of freedom
pub fn chi_squared_p_value( statistic: f64 ) -> f64 {
    let distribution = ChiSquared::new( 1.0 ).expect( "one degree of freedom is valid" );
    1.0 - distribution.cdf( statistic.max( 0.0 ))
}

impl Node {
    fn new( fragment: Vec<Rank>, support: Count, parent: Option<NodeId> ) -> Node {
	Node{ fragment, support, parent, children: Vec::new() }
    }
}

impl fmt::Display for ItemsetTree {
    fn fmt( &self, f: &mut fmt::Formatter<'_> ) -> fmt::Result {
	self.format_node( f, ROOT, 0 )
    }
}

impl fmt::Debug for ItemsetTree {
    fn fmt( &self, f: &mut fmt::Formatter<'_> ) -> fmt::Result {
	write!( f, "ItemsetTree({} transactions, {} nodes)", self.transaction_count(), self.nodes.len() )
    }
}

impl TreeStatistics {
    pub fn average_items_per_node( &self ) -> f64 {
	if self.node_count == 0 { 0.0 } else { self.item_count as f64 / self.node_count as f64 }
    }

    pub fn average_branch_length( &self ) -> f64 {
	if self.branch_count == 0 { 0.0 } else { self.total_branch_length as f64 / self.branch_count as f64 }
    }
}

impl fmt::Display for TreeStatistics {
    fn fmt( &self, f: &mut fmt::Formatter<'_> ) -> fmt::Result {
	write!( f, "nodes: {} / items: {} ({:.2} per node) / branches: {} (avg. length {:.2})",
		self.node_count, self.item_count, self.average_items_per_node(),
		self.branch_count, self.average_branch_length() )
    }
}

/// Contribution of one contingency cell. Cells without expectation fit exactly.
fn pearson_term( observed: f64, expected: f64 ) -> f64 {
    if expected > 0.0 {
	(observed - expected) * (observed - expected) / expected
    } else {
	0.0
    }
}

fn common_prefix_length( left: &[Rank], right: &[Rank] ) -> usize {
    left.iter().zip( right.iter() ).take_while( |(l, r)| l == r ).count()
}

/// Checks whether two sorted sequences share an element
fn intersects( left: &[Rank], right: &[Rank] ) -> bool {
    let (mut i, mut j) = (0, 0);
    while i < left.len() && j < right.len() {
	if left[ i ] == right[ j ] {
	    return true;
	} else if left[ i ] < right[ j ] {
	    i += 1;
	} else {
	    j += 1;
	}
    }
    false
}

/// Returns next position in items after last match and indicates if the path may be a superset of items
fn is_partial_superset( items: &[Rank], path: &[Rank] ) -> (usize, bool) {
    let mut path_iter = path.iter();
    let mut next_position = 0;

    // check whether query items are on the path
    for query_item in items.iter() {
	let mut path_item = path_iter.next();
	while path_item.map_or( false, |item| item < query_item ) {
	    path_item = path_iter.next();
	}

	let path_item = match path_item {
	    // all items on path are less than the current item
	    None => return (next_position, true),
	    Some( item ) => item,
	};
	// next item on path is larger, so query item is not on path
	if query_item < path_item {
	    return (next_position, false);
	}
	next_position += 1;
    }
    (next_position, true)
}

#[cfg(test)]
mod test {
    use super::*;
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    macro_rules! assert_approx {
	($real:expr, $expected:expr, $delta:expr) => {
	    if $real < $expected - $delta || $real > $expected + $delta {
		panic!( "Violate {:.4} == {:.4} (+-{:.4})", $real, $expected, $delta );
	    }
	}
    }

    fn set( items: &[Item] ) -> Itemset {
	Itemset::from_items( items.iter().copied() )
    }

    fn scenario() -> Vec<Itemvec> {
	vec!(
	    vec!( 1, 2, 3 ),
	    vec!( 1, 2 ),
	    vec!( 1, 2 ),
	    vec!( 3 ),
	)
    }

    /// Checks the structural invariants of every node
    fn check_invariants( tree: &ItemsetTree ) {
	for (id, node) in tree.nodes.iter().enumerate() {
	    if id != ROOT {
		assert!( !node.fragment.is_empty() );
		assert!( node.fragment.windows( 2 ).all( |w| w[0] < w[1] ));
		let parent = node.parent.expect( "non-root nodes have a parent" );
		assert!( tree.nodes[ parent ].children.contains( &id ));
		assert!( node.support <= tree.nodes[ parent ].support );
	    }
	    let firsts: Vec<Rank> = node.children.iter().map( |c| tree.nodes[ *c ].fragment[ 0 ] ).collect();
	    assert!( firsts.windows( 2 ).all( |w| w[0] < w[1] ), "siblings differ in their first item" );
	    let child_support: Count = node.children.iter().map( |c| tree.nodes[ *c ].support ).sum();
	    assert!( child_support <= node.support );
	}
    }

    #[test]
    fn scenario_supports() {
	let tree = ItemsetTree::from_transactions( &scenario() );
	check_invariants( &tree );
	assert_eq!( tree.transaction_count(), 4 );
	assert_eq!( tree.support( &set( &[] )), 4 );
	assert_eq!( tree.support( &set( &[1, 2] )), 3 );
	assert_eq!( tree.support( &set( &[1, 2, 3] )), 1 );
	assert_eq!( tree.support( &set( &[3] )), 2 );
	assert_eq!( tree.support( &set( &[4] )), 0 );
	assert_approx!( tree.relative_support( &set( &[1] )), 0.75, 1e-12 );
    }

    #[test]
    fn insertion_cases() {
	// order: 0 and 1 (5x), 2 (4x), 3 (3x), 4 (1x), so ranks equal items
	let data = vec!(
	    vec!( 0, 1, 2, 3, 4 ), // new leaf
	    vec!( 0, 1 ),          // prefix of an existing path: splice
	    vec!( 0, 1, 2, 3 ),    // prefix again, below the spliced node
	    vec!( 0, 2 ),          // common prefix {0}: branch
	    vec!( 0, 1 ),          // names an existing node
	    vec!( 1, 2, 3 ),       // new leaf under root
	);
	let tree = ItemsetTree::from_transactions( &data );
	check_invariants( &tree );
	assert_eq!( tree.transaction_count(), 6 );
	let expectations = vec!(
	    (vec!( 0 ), 5),
	    (vec!( 0, 1 ), 4),
	    (vec!( 1 ), 5),
	    (vec!( 2, 3 ), 3),
	    (vec!( 0, 2 ), 3),
	    (vec!( 0, 1, 2, 3 ), 2),
	    (vec!( 4 ), 1),
	    (vec!( 0, 4 ), 1),
	    (vec!( 0, 3, 4 ), 1),
	    (vec!( 1, 4, 5 ), 0), // ask for something that's not even there
	);
	for (items, expected) in expectations {
	    assert_eq!( tree.support( &set( &items )), expected, "{items:?}" );
	}
	// {0} -> {1} -> {2, 3} -> {4} and {0} -> {2}, {1, 2, 3}
	assert_eq!( tree.statistics().node_count, 6 );
    }

    #[test]
    fn empty_database() {
	let tree = ItemsetTree::from_transactions( &[] );
	assert_eq!( tree.transaction_count(), 0 );
	assert_eq!( tree.support( &set( &[] )), 0 );
	assert_eq!( tree.support( &set( &[1] )), 0 );
	assert_eq!( tree.relative_support( &set( &[] )), 0.0 );
	assert_eq!( tree.chi_squared( &set( &[1] ), &set( &[2] )), 0.0 );
	let mut rng = StdRng::seed_from_u64( 1 );
	assert!( tree.random_walk( &mut rng ).is_empty() );
    }

    #[test]
    fn empirical_counts_with_exclusions() {
	let tree = ItemsetTree::from_transactions( &scenario() );
	assert_eq!( tree.count_empirical( &set( &[1] ), &set( &[3] )), 2 );
	assert_eq!( tree.count_empirical( &set( &[3] ), &set( &[1] )), 1 );
	assert_eq!( tree.count_empirical( &set( &[] ), &set( &[1] )), 1 );
	assert_eq!( tree.count_empirical( &set( &[] ), &set( &[1, 3] )), 0 );
	assert_eq!( tree.count_empirical( &set( &[1, 2] ), &set( &[] )), 3 );
	assert_eq!( tree.count_empirical( &set( &[1] ), &set( &[1] )), 0 );
    }

    #[test]
    fn chi_squared_of_independent_items() {
	// item 1 and item 2 each occur in half the transactions and together in a quarter
	let data = vec!(
	    vec!( 1, 2 ),
	    vec!( 1, 3 ),
	    vec!( 2, 3 ),
	    vec!( 3 ),
	);
	let tree = ItemsetTree::from_transactions( &data );
	assert_approx!( tree.chi_squared( &set( &[1] ), &set( &[2] )), 0.0, 1e-12 );
	assert_approx!( tree.chi_squared_of_itemset( &set( &[1, 2] )), 0.0, 1e-12 );
	assert_approx!( chi_squared_p_value( 0.0 ), 1.0, 1e-9 );
    }

    #[test]
    fn chi_squared_of_dependent_items() {
	let data = vec!(
	    vec!( 1, 2 ),
	    vec!( 1, 2 ),
	    vec!( 3 ),
	    vec!( 3 ),
	);
	let tree = ItemsetTree::from_transactions( &data );
	// every cell deviates by one from its expectation of one
	assert_approx!( tree.chi_squared( &set( &[1] ), &set( &[2] )), 4.0, 1e-12 );
	assert_approx!( tree.chi_squared_of_itemset( &set( &[1, 2] )), 4.0, 1e-12 );
	// the empty itemset occurs everywhere, so cells without expectation contribute nothing
	let statistic = tree.chi_squared( &set( &[1, 2] ), &set( &[] ));
	assert_approx!( statistic, 0.0, 1e-12 );
	assert!( chi_squared_p_value( 4.0 ) < 0.05 );
    }

    #[test]
    fn chi_squared_of_three_items() {
	// item 1 is everywhere, so every cell without it expects nothing
	let data = vec!(
	    vec!( 1, 2, 3 ),
	    vec!( 1, 2, 3 ),
	    vec!( 1 ),
	    vec!( 1 ),
	);
	let tree = ItemsetTree::from_transactions( &data );
	assert_eq!( tree.count_empirical( &set( &[1] ), &set( &[2, 3] )), 2 );
	assert_eq!( tree.count_empirical( &set( &[1, 2] ), &set( &[3] )), 0 );
	assert_eq!( tree.count_empirical( &set( &[2, 3] ), &set( &[1] )), 0 );
	// cells {1 2 3}, {1 2}, {1 3} and {1} expect one each and observe 2, 0, 0 and 2
	assert_approx!( tree.chi_squared_of_itemset( &set( &[1, 2, 3] )), 4.0, 1e-12 );

	// the same marginals, but every combination of 2 and 3 occurs once
	let data = vec!(
	    vec!( 1, 2, 3 ),
	    vec!( 1, 2 ),
	    vec!( 1, 3 ),
	    vec!( 1 ),
	);
	let tree = ItemsetTree::from_transactions( &data );
	assert_eq!( tree.count_empirical( &set( &[1, 2] ), &set( &[3] )), 1 );
	assert_approx!( tree.chi_squared_of_itemset( &set( &[1, 2, 3] )), 0.0, 1e-12 );
    }

    #[test]
    fn random_walk_samples_paths() {
	let tree = ItemsetTree::from_transactions( &scenario() );
	let mut rng = StdRng::seed_from_u64( 42 );
	let mut seen_pair = false;
	for _ in 0 .. 200 {
	    let sample = tree.random_walk( &mut rng );
	    // every sample lies on a stored path
	    assert!( sample.is_empty() || tree.support( &sample ) > 0, "{sample}" );
	    seen_pair |= sample == set( &[1, 2] );
	}
	assert!( seen_pair );
    }

    #[test]
    fn random_walk_is_reproducible() {
	let tree = ItemsetTree::from_transactions( &scenario() );
	let draw = |seed| {
	    let mut rng = StdRng::seed_from_u64( seed );
	    (0 .. 20).map( |_| tree.random_walk( &mut rng )).collect::<Vec<Itemset>>()
	};
	assert_eq!( draw( 7 ), draw( 7 ));
    }

    #[test]
    fn display_lists_nodes() {
	let tree = ItemsetTree::from_transactions( &scenario() );
	let dump = format!( "{tree}" );
	assert!( dump.starts_with( "{} : 4" ));
	assert!( dump.contains( "{1 2} : 3" ));
    }

    fn database_strategy() -> impl Strategy<Value = Vec<Itemvec>> {
	prop::collection::vec( prop::collection::vec( 0usize .. 8, 0 .. 6 ), 0 .. 30 )
    }

    fn naive_support( data: &[Itemvec], query: &Itemset ) -> Count {
	data.iter().filter( |t| query.iter().all( |item| t.contains( &item ))).count() as Count
    }

    proptest! {
	#[test]
	fn prop_support_matches_scan( data in database_strategy(), query in prop::collection::vec( 0usize .. 8, 0 .. 4 )) {
	    let tree = ItemsetTree::from_transactions( &data );
	    let query = Itemset::from_items( query );
	    prop_assert_eq!( tree.support( &query ), naive_support( &data, &query ));
	}

	#[test]
	fn prop_empty_query_counts_transactions( data in database_strategy() ) {
	    let tree = ItemsetTree::from_transactions( &data );
	    prop_assert_eq!( tree.support( &Itemset::new() ), data.len() as Count );
	}

	#[test]
	fn prop_support_is_antimonotone( data in database_strategy(), small in prop::collection::vec( 0usize .. 8, 0 .. 3 ), extra in prop::collection::vec( 0usize .. 8, 0 .. 3 )) {
	    let tree = ItemsetTree::from_transactions( &data );
	    let small = Itemset::from_items( small );
	    let large = small.union( &Itemset::from_items( extra ));
	    prop_assert!( tree.support( &small ) >= tree.support( &large ));
	}

	#[test]
	fn prop_transactions_are_supported( data in database_strategy() ) {
	    let tree = ItemsetTree::from_transactions( &data );
	    for transaction in &data {
		prop_assert!( tree.support( &Itemset::from_items( transaction.iter().copied() )) >= 1 );
	    }
	}

	#[test]
	fn prop_exclusion_counts_match_scan( data in database_strategy(), included in prop::collection::vec( 0usize .. 8, 0 .. 3 ), excluded in prop::collection::vec( 0usize .. 8, 0 .. 3 )) {
	    let tree = ItemsetTree::from_transactions( &data );
	    let (included, excluded) = (Itemset::from_items( included ), Itemset::from_items( excluded ));
	    let expected = data.iter()
		.filter( |t| included.iter().all( |item| t.contains( &item )))
		.filter( |t| !excluded.iter().any( |item| t.contains( &item )))
		.count() as Count;
	    prop_assert_eq!( tree.count_empirical( &included, &excluded ), expected );
	}
    }
}
