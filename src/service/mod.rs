pub mod aggregation;
pub mod audit;
pub mod export;
pub mod import;
