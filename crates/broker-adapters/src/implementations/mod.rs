//! Concrete provider adapters.

pub mod merit;
pub mod openx402;
pub mod xcache;
