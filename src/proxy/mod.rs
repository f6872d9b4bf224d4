//! Request path: parse, map, forward, translate back.

pub mod handler;
pub mod stream;
pub mod stream_bridge;
pub mod transform;
pub mod upstream;
