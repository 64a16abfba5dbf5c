//! Streaming gateway: hands a ready job's file to exactly one consumer.

mod gateway;

pub use gateway::{content_type_for, AudioStream, StreamingGateway};
