use serde::ser::SerializeStruct;
use serde::Serialize;

use crate::data::ItemsetTree;
use crate::io::{produce_fimi, PrettyFormatter};

use super::{ItemsetModel, ModelEntry};

/// Lists the itemsets of a model, the most probable first
pub struct ModelFormatter<'t> {
    tree: Option<&'t ItemsetTree>,
    show_singletons: bool,
}

impl PrettyFormatter<ItemsetModel> for ModelFormatter<'_> {

    fn format_pretty( &self, model: &ItemsetModel ) -> String {
	let mut output = String::new();
	output.push( '\n' ); // so output begins on a new line

	output = model.sorted_entries( self.tree ).iter()
	    .filter( |entry| self.show_singletons || entry.items.len() > 1 )
	    .map( format_entry )
	    .fold( output, join_lines );
	output
    }
}

impl Serialize for ModelEntry {
    fn serialize<S>( &self, serializer: S ) -> Result<S::Ok, S::Error> where S: serde::Serializer {
	let field_count = if self.interestingness.is_some() { 3 } else { 2 };
	let mut state = serializer.serialize_struct( "ModelEntry", field_count )?;
	state.serialize_field( "items", &self.items )?;
	state.serialize_field( "probability", &self.probability )?;
	if let Some( interestingness ) = self.interestingness {
	    state.serialize_field( "interestingness", &interestingness )?;
	}
	state.end()
    }
}

impl Serialize for ItemsetModel {
    fn serialize<S>( &self, serializer: S ) -> Result<S::Ok, S::Error> where S: serde::Serializer {
	self.sorted_entries( None ).serialize( serializer )
    }
}

fn format_entry( entry: &ModelEntry ) -> String {
    let items = produce_fimi( entry.items.iter(), "{", " ", "}" );
    match entry.interestingness {
	Some( interestingness ) => format!( "{:.6}  {interestingness:.3}  {items}", entry.probability ),
	None => format!( "{:.6}  {items}", entry.probability ),
    }
}

fn join_lines( mut accumulator: String, addition: String ) -> String {
    accumulator.push_str( addition.as_str() );
    accumulator.push( '\n' );
    accumulator
}

impl<'t> ModelFormatter<'t> {
    pub fn new() -> ModelFormatter<'t> {
	ModelFormatter{
	    tree: None,
	    show_singletons: false,
	}
    }

    /// Reports the interestingness of each itemset against the data in the tree
    pub fn with_tree( mut self, tree: &'t ItemsetTree ) -> ModelFormatter<'t> {
	self.tree = Some( tree );
	self
    }

    pub fn show_singletons( &mut self ) { self.show_singletons = true; }
}

impl Default for ModelFormatter<'_> {
    fn default() -> Self {
	ModelFormatter::new()
    }
}
