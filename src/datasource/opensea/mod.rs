pub mod events_client;

pub use events_client::OpenSeaClient;
