//! Frame codec for the sendme file transfer protocol.
//!
//! A transfer stream carries `Metadata`, then `Chunk*`, then `Done` or
//! `Error`, each as one length-prefixed frame. See [`frame`] for the wire
//! format and [`envelope`] for the payload encoding.

pub mod constants;
pub mod envelope;
pub mod error;
pub mod frame;
pub mod messages;

pub use constants::{CHUNK_SIZE, MAX_FRAME_SIZE, PROTOCOL_ID, READ_TIMEOUT, WRITE_TIMEOUT};
pub use envelope::Envelope;
pub use error::ProtocolError;
pub use frame::{
    read_frame, receive_chunk, receive_metadata, send_chunk, send_done, send_error,
    send_metadata, write_frame,
};
pub use messages::{FileMetadata, Message, MessageKind};
