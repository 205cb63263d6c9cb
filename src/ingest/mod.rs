pub mod driver;
pub mod normalizer;

pub use driver::Indexer;
