use std::path::Path;
use std::fs::File;
use std::io::{BufReader, BufRead, Write};

use serde_json as json;
use tracing::debug;

use crate::data::{Item, Itemvec};

/// Converts a structure into a string
pub trait PrettyFormatter<T> {
    fn format_pretty( &self, object: &T ) -> String;
}

/// Reads transactions in FIMI format: one transaction per line, items separated by whitespace
pub fn read_transactions( path: &str ) -> Result<Vec<Itemvec>, String> {
    let file = File::open( Path::new( path )).map_err( |e| format!( "{path}: {e}" ))?;
    let transactions = parse_transactions( BufReader::new( file ))?;
    debug!( "Read {} transactions from {path}", transactions.len() );
    Ok( transactions )
}

/// Parses all transactions of the reader. Blank lines and comments starting with #, % or @ are skipped.
pub fn parse_transactions <R: BufRead> ( reader: R ) -> Result<Vec<Itemvec>, String> {
    let mut transactions = Vec::new();
    for (index, line) in reader.lines().enumerate() {
	let line = line.map_err( |e| e.to_string() )?;
	if is_metadata( &line ) {
	    continue;
	}
	let transaction = parse_fimi_to_vec( &line ).map_err( |e| format!( "line {}: {e}", index + 1 ))?;
	transactions.push( transaction );
    }
    Ok( transactions )
}

fn is_metadata( line: &str ) -> bool {
    let line = line.trim_start();
    line.is_empty() || line.starts_with( ['#', '%', '@'] )
}

/// Parses whitespace separated numbers into a vector
pub fn parse_fimi_to_vec( line: &str ) -> Result<Itemvec, String> {
    let mut items = Itemvec::new();
    for chunk in line.split_whitespace() {
	match chunk.parse::<Item>() {
	    Ok( item ) => items.push( item ),
	    Err( _ ) => return Err( format!( "cannot parse item '{chunk}'" )),
	}
    }
    Ok( items )
}

/// Creates a fimi string from an iterator over items
pub fn produce_fimi<I: Iterator<Item = Item>>( items: I, left_delimiter: &str, separator: &str, right_delimiter: &str ) -> String {
    let mut fimi = String::new();
    fimi.push_str( left_delimiter );
    for (position, item) in items.enumerate() {
	if position > 0 {
	    fimi.push_str( separator );
	}
	fimi.push_str( item.to_string().as_str() );
    }
    fimi.push_str( right_delimiter );
    fimi
}

/// Writes transactions in FIMI format
pub fn write_transactions( transactions: &[Itemvec], path: &str ) -> Result<(), String> {
    let mut file = File::create( Path::new( path )).map_err( |err| err.to_string() )?;
    for transaction in transactions {
	writeln!( file, "{}", produce_fimi( transaction.iter().copied(), "", " ", "" )).map_err( |err| err.to_string() )?;
    }
    Ok( () )
}

/// Writes a serializeable model to a file
pub fn write_model<M: serde::Serialize>( model: &M, path: &str ) -> Result<(), String> {
    match serde_json::to_string( model ) {
	json::Result::Ok( model_string ) => {
	    let path = Path::new( path );
	    let mut file = File::create( path ).map_err( |err| err.to_string() )?;
	    write!( file, "{}", model_string ).map_err( |err| err.to_string() )
	},
	json::Result::Err( err ) => Result::Err( err.to_string() ),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn skips_comments_and_blank_lines() {
	let input = "# header\n1 2 3\n\n% note\n@attribute\n  4\t5 \n   \n6\n";
	let transactions = parse_transactions( input.as_bytes() ).unwrap();
	assert_eq!( transactions, vec!( vec!( 1, 2, 3 ), vec!( 4, 5 ), vec!( 6 )));
    }

    #[test]
    fn reports_malformed_line() {
	let input = "1 2\n3 x 4\n";
	let error = parse_transactions( input.as_bytes() ).unwrap_err();
	assert_eq!( error, "line 2: cannot parse item 'x'" );
	assert!( parse_fimi_to_vec( "-1" ).is_err() );
    }

    #[test]
    fn fimi_output() {
	assert_eq!( produce_fimi( vec!( 1, 2, 3 ).into_iter(), "{", " ", "}" ), "{1 2 3}" );
	assert_eq!( produce_fimi( Vec::new().into_iter(), "[", ",", "]" ), "[]" );
    }

    #[test]
    fn missing_file() {
	let error = read_transactions( "/nonexistent/transactions.dat" ).unwrap_err();
	assert!( error.starts_with( "/nonexistent/transactions.dat" ));
    }

    #[test]
    fn file_round_trip() {
	let path = std::env::temp_dir().join( format!( "itemset_mine_io_{}.dat", std::process::id() ));
	let path = path.to_str().unwrap();
	let data = vec!( vec!( 3, 1 ), vec!( 7 ));
	write_transactions( &data, path ).unwrap();
	assert_eq!( read_transactions( path ).unwrap(), data );
	std::fs::remove_file( path ).unwrap();
    }
}
