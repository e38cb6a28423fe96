pub mod audit;
pub mod embedder;
pub mod enrich;
pub mod linker;
pub mod notes;
pub mod worker;
