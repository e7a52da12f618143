pub mod accumulator;
pub mod results;
pub mod cache;
