//! Protocol module - framing for transports without native multiplexing.
//!
//! This module implements the framed byte stream:
//! - version byte and `{instance, name}` header
//! - `{path, data}` frames addressed by [`Index`](crate::Index)
//! - frame buffer for accumulating partial reads

mod frame;
mod frame_buffer;
mod wire_format;

pub use frame::{build_frame, build_frame_parts, Frame, FrameRef};
pub use frame_buffer::FrameBuffer;
pub use wire_format::{
    encode_preamble, validate_version, Header, DEFAULT_MAX_FRAME_SIZE, PROTOCOL_VERSION,
};
