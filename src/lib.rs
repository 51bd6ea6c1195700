pub mod data;
pub mod io;
pub mod miner;
pub mod model;
pub mod synth;

pub use data::{Item, Itemset, Itemvec, Count, ItemsetTree, TransactionDatabase};
pub use model::{ItemsetModel, Inference, GreedyInference};
pub use miner::{Miner, MinerConfig, MiningOutcome, StructuralEm};

/// Objects that can be recorded in the log
pub trait Loggable {
    fn log(&self, message: &str, level: tracing::Level );
}
