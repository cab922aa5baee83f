pub mod block;
pub mod premium;
pub mod start;
pub mod usage;
