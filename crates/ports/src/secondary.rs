pub mod metrics_port;
pub mod packet_transport_port;
pub mod reactor_port;
