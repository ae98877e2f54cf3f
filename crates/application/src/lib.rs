#![forbid(unsafe_code)]

pub mod router_service_impl;
