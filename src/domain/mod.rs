pub mod errors;
pub mod order;
pub mod policy;
pub mod ports;
