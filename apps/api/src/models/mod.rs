pub mod audit;
pub mod headers;
pub mod snapshot;
