pub mod audit;
pub mod college;
pub mod dashboard;
pub mod export;
pub mod student;
pub mod upload;
