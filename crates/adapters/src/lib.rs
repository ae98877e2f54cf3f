#![forbid(unsafe_code)]

pub mod nat;
pub mod time;
pub mod transport;
