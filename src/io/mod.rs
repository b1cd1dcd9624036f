pub mod export;

pub use export::StatementExporter;
