pub mod framer;

pub use framer::{encode_wav, AudioFramer};
