pub mod engine;
pub mod entity;
