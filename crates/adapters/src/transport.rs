pub mod channel_transport;
pub mod recording_transport;
