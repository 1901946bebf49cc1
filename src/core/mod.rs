pub mod retry;
pub mod token;
pub mod tx;
