pub mod packet_processor_port;
