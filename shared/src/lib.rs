//! Shared types for the Crab PKI signing protocol
//!
//! The wire format is shared by the signing server and its clients:
//! every message is a little-endian `u16` length followed by that many bytes.

pub mod frame;

pub use frame::{
    LENGTH_PREFIX_SIZE, MAX_FRAME_LEN, ProtocolError, read_frame, read_frame_timeout, write_frame,
};
