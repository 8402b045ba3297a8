use std::time::Duration;

/// Protocol identifier used to tag transfer streams on the peer substrate.
pub const PROTOCOL_ID: &str = "/sendme/file-transfer/1.0.0";

/// Size of outbound chunks (1 MiB).
///
/// Receivers accept any chunk up to [`MAX_FRAME_SIZE`].
pub const CHUNK_SIZE: usize = 1024 * 1024;

/// Largest payload length a frame may declare (100 MiB).
///
/// Anything above this is rejected before the body is read, which bounds the
/// memory a misbehaving peer can make us allocate.
pub const MAX_FRAME_SIZE: u32 = 100 * 1024 * 1024;

/// Time allowed to read one complete frame.
pub const READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Time allowed to write and flush one complete frame.
pub const WRITE_TIMEOUT: Duration = Duration::from_secs(30);
