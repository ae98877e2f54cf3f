#![forbid(unsafe_code)]

pub mod arp;
pub mod common;
pub mod condition;
pub mod nat;
pub mod packet;
pub mod pipeline;
pub mod route;
pub mod rule;
