use std::time::Duration;

use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::info;
use tracing_subscriber::filter::LevelFilter;

use itemsetmine::io::{self, PrettyFormatter};
use itemsetmine::miner::{prepare, Backend, CoverSource};
use itemsetmine::model::ModelFormatter;
use itemsetmine::synth::{self, Problem};
use itemsetmine::*;

/// Mines interesting itemsets with structural expectation-maximization
#[derive( Parser, Debug )]
#[command( version, about )]
struct Args {
    /// transaction file in FIMI format
    #[arg( required_unless_present = "problem" )]
    input: Option<String>,

    /// sample the transactions from a built-in problem (caviar, freerider, unlifted) instead
    #[arg( long, conflicts_with = "input" )]
    problem: Option<Problem>,

    /// number of samples drawn for a built-in problem
    #[arg( long, default_value_t = 1000 )]
    samples: usize,

    #[arg( long, default_value_t = 1000 )]
    iterations: u64,

    /// candidates per structural move
    #[arg( long, default_value_t = 10_000 )]
    structure_steps: u64,

    #[arg( long, default_value_t = 720 )]
    runtime_minutes: u64,

    /// convergence threshold of the parameter optimization
    #[arg( long, default_value_t = 1e-5 )]
    tolerance: f64,

    #[arg( long )]
    seed: Option<u64>,

    /// process transactions on a single thread
    #[arg( long )]
    serial: bool,

    /// scan the model instead of caching itemsets per transaction
    #[arg( long )]
    no_cache: bool,

    /// write the mined itemsets as json
    #[arg( long, short )]
    output: Option<String>,

    #[arg( long, default_value = "info" )]
    log_level: LevelFilter,
}

fn main() -> Result<(), String> {
    let args = Args::parse();
    prepare_logging( args.log_level )?;

    let data = match (&args.input, args.problem) {
	(Some( path ), _) => io::read_transactions( path )?,
	(None, Some( problem )) => {
	    let mut rng = match args.seed {
		Some( seed ) => StdRng::seed_from_u64( seed ),
		None => StdRng::from_entropy(),
	    };
	    synth::generate_database( &problem.model(), args.samples, &mut rng )
	},
	(None, None) => return Err( "no transactions given".to_string() ),
    };

    let backend = if args.serial { Backend::Serial } else { Backend::Parallel };
    let (tree, mut database, model) = prepare( &data, backend );

    let mut config = MinerConfig::default()
	.with_max_iterations( args.iterations )
	.with_max_structure_steps( args.structure_steps )
	.with_max_runtime( Duration::from_secs( 60 * args.runtime_minutes ))
	.with_optimize_tolerance( args.tolerance )
	.with_source( if args.no_cache { CoverSource::Model } else { CoverSource::Cache } );
    if let Some( seed ) = args.seed {
	config = config.with_seed( seed );
    }

    let mut miner = StructuralEm::greedy( config );
    let outcome = miner.mine( &tree, &mut database, model );

    let formatter = ModelFormatter::new().with_tree( &tree );
    info!( "Mined {} itemsets in {}ms:{}", outcome.model.len(), outcome.elapsed.as_millis(), formatter.format_pretty( &outcome.model ));

    if let Some( path ) = &args.output {
	io::write_model( &outcome.model.sorted_entries( Some( &tree )), path )?;
	info!( "Wrote model to {path}" );
    }
    Ok( () )
}

fn prepare_logging( level: LevelFilter ) -> Result<(), String> {
    let tracer = tracing_subscriber::fmt::fmt()
	.with_max_level( level )
	.finish();
    tracing::subscriber::set_global_default( tracer ).map_err( |e| e.to_string() )
}
