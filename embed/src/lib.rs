pub mod config;
pub mod encoder;
pub mod error;
pub mod http;
pub mod memory;

pub use config::EncoderConfig;
pub use encoder::{Encoder, Source, l2_normalize};
pub use error::EncodeError;
pub use http::HttpEncoder;
pub use memory::MemoryEncoder;
