use super::Message;

use atlas_core::{archive, ArchiveError, ArchivedBuf};
use lz4_flex::frame::{FrameDecoder, FrameEncoder};
use std::fmt;
use std::io::{self, Read, Write};

/// Scratch space for serializing messages. Snapshots that outgrow it spill to the heap.
const SCRATCH_BYTES: usize = 4096;

/// Archives `message` and compresses the archive into a single lz4 frame.
pub fn encode_message(message: &Message) -> Result<Box<[u8]>, CodecError> {
    let archived = archive::<_, SCRATCH_BYTES>(message)?;
    let mut encoder = FrameEncoder::new(Vec::with_capacity(archived.len() / 2));
    encoder.write_all(archived.as_slice())?;
    let compressed = encoder.finish().map_err(CodecError::Frame)?;
    Ok(compressed.into_boxed_slice())
}

/// Inverse of [`encode_message`]. The archive is validated before anything is deserialized.
pub fn decode_message(bytes: &[u8]) -> Result<Message, CodecError> {
    let mut decoder = FrameDecoder::new(bytes);
    let mut archived = Vec::new();
    decoder.read_to_end(&mut archived)?;
    let buf = ArchivedBuf::<Message>::from_bytes(&archived)?;
    Ok(buf.deserialize())
}

#[derive(Debug)]
pub enum CodecError {
    Io(io::Error),
    Frame(lz4_flex::frame::Error),
    Archive(ArchiveError),
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecError::Io(e) => write!(f, "compression stream failed: {}", e),
            CodecError::Frame(e) => write!(f, "bad lz4 frame: {}", e),
            CodecError::Archive(e) => write!(f, "bad message archive: {}", e),
        }
    }
}

impl std::error::Error for CodecError {}

impl From<io::Error> for CodecError {
    fn from(e: io::Error) -> Self {
        CodecError::Io(e)
    }
}

impl From<ArchiveError> for CodecError {
    fn from(e: ArchiveError) -> Self {
        CodecError::Archive(e)
    }
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝
