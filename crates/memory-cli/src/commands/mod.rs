pub mod consolidate;
pub mod freshness;
pub mod maintenance;
pub mod relate;
pub mod review;
pub mod search;
