pub mod contract;
mod lenient;
pub mod signal;
pub mod technical;
