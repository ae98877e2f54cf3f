pub mod mock_reactor;
pub mod tokio_reactor;
