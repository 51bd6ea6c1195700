use tracing::{info, debug};
use tracing_subscriber;

use rand::prelude::*;
use statrs::distribution::DiscreteUniform;

use std::time::*;

use itemsetmine::*;
use itemsetmine::data::ItemOrder;

fn main() -> Result<(), String> {
    prepare_logging();

    let path = std::env::args().nth( 1 ).unwrap_or_else( || "./data/census/census.fimi".to_string() );
    let data = io::read_transactions( &path )?;

    let n = 100000;

    let tree = ItemsetTree::build( &data, ItemOrder::new( &data ));
    info!( "{}", tree.statistics() );
    benchmark_support_queries( &tree, n );
    benchmark_random_walks( &tree, n );

    Result::Ok( () )
}

fn benchmark_support_queries( tree: &ItemsetTree, num_queries: u64 ) {
    info!( "Start benchmark: uniform support queries" );
    let time = benchmark_uniform_queries( tree, num_queries );
    info!( "Result: {num_queries} uniform queries took {}ms", time.as_millis() );
}

fn benchmark_random_walks( tree: &ItemsetTree, num_walks: u64 ) {
    info!( "Start benchmark: random walks" );
    let mut gen = thread_rng();
    let start = Instant::now();
    let total_length: usize = (0 .. num_walks).map( |_| tree.random_walk( &mut gen ).len() ).sum();
    let time = start.elapsed();
    info!( "Result: {num_walks} random walks took {}ms (avg. {:.2} items)", time.as_millis(), total_length as f64 / num_walks as f64 );
}

fn benchmark_uniform_queries( tree: &ItemsetTree, number_queries: u64 ) -> Duration {
    let mut universe: Itemvec = tree.order().items().map( |(item, _)| item ).collect();
    let m = universe.len();
    if m == 0 {
	return Duration::ZERO;
    }
    // Use uniform to give shorter sequences a shot too
    let length_distribution = DiscreteUniform::new( 1, m as i64 ).expect( "universe is not empty" );

    let mut query_time = Duration::new( 0, 0 );
    let number_buckets = 10;
    let mut query_time_buckets = vec!( Duration::new( 0, 0 ); number_buckets );
    let mut gen = thread_rng();

    for _ in 0 .. number_queries {
	let query_length = length_distribution.sample( &mut gen ) as usize;
	let query = generate_random_query( &mut universe, query_length, &mut gen );

	let start = Instant::now();
	let support = tree.support( &query );
	let time_spent = start.elapsed();
	query_time += time_spent;
	let bucket_index = number_buckets * (query_length - 1) / m;
	debug!( "query of length {query_length} has support {support} (bucket {bucket_index})" );

	query_time_buckets[ bucket_index ] += time_spent;
    }

    let length_query_times: Vec<u64> = query_time_buckets.iter().map( |d| d.as_millis() as u64 ).collect();
    info!( "time by length {length_query_times:?} [ms]" );
    query_time
}

fn generate_random_query <R: Rng> ( universe: &mut Itemvec, length: usize, gen: &mut R ) -> Itemset {
    let m = universe.len() as i64;

    let mut query = Itemvec::new();
    for sample_count in 0 .. length {
	let item_dist = DiscreteUniform::new( sample_count as i64, m - 1 ).expect( "query is not longer than the universe" );
	let i = item_dist.sample( gen ) as usize;
	query.push( universe[i] );
	// move i into sample count place to avoid drawing it again
	universe.swap( sample_count, i );
    }
    Itemset::from_items( query )
}

fn prepare_logging() {
    let tracer = tracing_subscriber::fmt::fmt()
        .with_max_level( tracing_subscriber::filter::LevelFilter::INFO )
        .finish();
    if let Err( e ) = tracing::subscriber::set_global_default( tracer ) {
	eprintln!( "cannot install logger: {e}" );
    }
}
