pub mod gas_tracker;
pub mod ingestion;
