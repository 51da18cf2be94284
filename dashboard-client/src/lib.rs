mod config;
mod credentials;
mod http;

pub use config::{ClientConfig, MissingClientProperty};
pub use credentials::{Credentials, NoCredentials, SharedToken, StaticToken};
pub use http::{HttpTransport, TransportError};
