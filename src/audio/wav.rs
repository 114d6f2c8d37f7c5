//! # WAV Container Parsing
//!
//! Demuxes a RIFF/WAVE byte stream into format metadata plus raw linear-PCM bytes.
//!
//! ## Layout (all multi-byte fields little-endian):
//! ```text
//! "RIFF" <u32 riff size> "WAVE"
//! "fmt " <u32 size> <u16 format> <u16 channels> <u32 rate> <u32 byte rate> <u16 block align> <u16 bits> [extension]
//! <id> <u32 size> <body>        ... zero or more chunks we do not care about (LIST, fact, ...)
//! "data" <u32 size> <PCM bytes>
//! ```
//!
//! ## Chunk Walk:
//! `Chunks` is an iterator over chunk headers. Whatever part of a chunk body the caller
//! does not read is skipped before the next header, so finding the payload is just
//! `find` with the predicate `id == "data"`. Odd-sized bodies are followed by one pad
//! byte (RIFF word alignment), which is skipped too.

use super::ConversionError;
use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{self, Read};
use tracing::debug;

pub const RIFF_ID: [u8; 4] = *b"RIFF";
pub const WAVE_ID: [u8; 4] = *b"WAVE";
pub const FMT_ID: [u8; 4] = *b"fmt ";
pub const DATA_ID: [u8; 4] = *b"data";

/// Format tag for uncompressed linear PCM
pub const FORMAT_PCM: u16 = 1;

/// Size of the fixed part of the format chunk body
const FMT_BODY_LEN: u32 = 16;

/// Cap on up-front allocation for the PCM payload; the declared size is not trusted
/// until the bytes have actually been read.
const MAX_PREALLOC: usize = 1 << 20;

/// Parsed audio stream: format fields plus the raw PCM payload.
///
/// ## Ownership:
/// Built once by `parse` from a completed walk and handed to the caller, who owns it
/// exclusively. No stage mutates it; later stages produce new buffers instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioStreamDescriptor {
    /// Samples per second (Hz)
    pub sample_rate: u32,

    /// Number of interleaved channels
    pub channel_count: u16,

    /// Bits per sample per channel
    pub bits_per_sample: u16,

    /// Raw little-endian PCM bytes exactly as stored in the data chunk
    pub pcm_data: Vec<u8>,
}

impl AudioStreamDescriptor {
    /// Size of one frame (one sample for every channel) in bytes.
    pub fn frame_size(&self) -> usize {
        let bytes_per_sample = (self.bits_per_sample as usize).div_ceil(8);
        bytes_per_sample * self.channel_count as usize
    }

    /// Number of whole frames in the payload.
    pub fn frame_count(&self) -> usize {
        match self.frame_size() {
            0 => 0,
            size => self.pcm_data.len() / size,
        }
    }
}

/// Fixed 16-byte body of the `fmt ` chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatChunk {
    pub audio_format: u16,
    pub channel_count: u16,
    pub sample_rate: u32,
    /// Informational, not validated
    pub byte_rate: u32,
    /// Informational, not validated
    pub block_align: u16,
    pub bits_per_sample: u16,
}

/// Header of a single RIFF chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkHeader {
    pub id: [u8; 4],
    pub size: u32,
}

impl ChunkHeader {
    /// Chunk id as text, for logging.
    pub fn id_str(&self) -> String {
        String::from_utf8_lossy(&self.id).into_owned()
    }
}

/// Iterator over the chunk headers following the RIFF header.
///
/// Yields `None` once the stream ends where a header should start (including a
/// partial header). I/O failures other than end-of-stream are yielded as errors.
pub struct Chunks<R> {
    reader: R,
    /// Bytes of the current chunk body not yet consumed
    unread: u64,
    /// Whether the current chunk is followed by a pad byte
    pad: bool,
}

impl<R: Read> Chunks<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            unread: 0,
            pad: false,
        }
    }

    /// Reader over the unread part of the chunk most recently yielded.
    pub fn body(&mut self) -> ChunkBody<'_, R> {
        ChunkBody { chunks: self }
    }

    fn skip_rest(&mut self) -> io::Result<()> {
        let remaining = self.unread + u64::from(self.pad);
        if remaining > 0 {
            // A short skip is not an error here: the next header read reports end of stream.
            io::copy(&mut self.reader.by_ref().take(remaining), &mut io::sink())?;
        }
        self.unread = 0;
        self.pad = false;
        Ok(())
    }

    fn read_header(&mut self) -> io::Result<ChunkHeader> {
        let mut id = [0u8; 4];
        self.reader.read_exact(&mut id)?;
        let size = self.reader.read_u32::<LittleEndian>()?;
        Ok(ChunkHeader { id, size })
    }
}

impl<R: Read> Iterator for Chunks<R> {
    type Item = Result<ChunkHeader, ConversionError>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Err(e) = self.skip_rest() {
            return Some(Err(e.into()));
        }

        match self.read_header() {
            Ok(header) => {
                self.unread = u64::from(header.size);
                self.pad = header.size % 2 == 1;
                Some(Ok(header))
            }
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => None,
            Err(e) => Some(Err(e.into())),
        }
    }
}

/// Bounded reader over one chunk body; see `Chunks::body`.
pub struct ChunkBody<'a, R> {
    chunks: &'a mut Chunks<R>,
}

impl<R: Read> Read for ChunkBody<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let limit = usize::try_from(self.chunks.unread)
            .unwrap_or(usize::MAX)
            .min(buf.len());
        if limit == 0 {
            return Ok(0);
        }

        let n = self.chunks.reader.read(&mut buf[..limit])?;
        self.chunks.unread -= n as u64;
        Ok(n)
    }
}

/// Parse a complete WAV stream into an `AudioStreamDescriptor`.
///
/// ## Steps:
/// 1. RIFF header: `"RIFF"` and `"WAVE"` ids, riff size ignored
/// 2. First chunk must be `"fmt "`; format tag must be 1 (linear PCM); any extension
///    bytes beyond the fixed 16 are skipped unparsed
/// 3. Chunks are skipped until `"data"`; running out of stream first is `MissingDataChunk`
/// 4. Exactly the declared number of payload bytes are read; fewer is `Truncated`
///
/// Chunk sizes are trusted as declared. Nothing is returned on failure.
pub fn parse<R: Read>(mut reader: R) -> Result<AudioStreamDescriptor, ConversionError> {
    read_riff_header(&mut reader)?;

    let mut chunks = Chunks::new(reader);
    let format = read_format_chunk(&mut chunks)?;

    let data = chunks
        .by_ref()
        .find_map(|chunk| match chunk {
            Ok(header) if header.id == DATA_ID => Some(Ok(header)),
            Ok(header) => {
                debug!(chunk = %header.id_str(), size = header.size, "Skipping chunk");
                None
            }
            Err(e) => Some(Err(e)),
        })
        .ok_or(ConversionError::MissingDataChunk)??;

    let expected = u64::from(data.size);
    let mut pcm_data = Vec::with_capacity((data.size as usize).min(MAX_PREALLOC));
    chunks.body().read_to_end(&mut pcm_data)?;

    let actual = pcm_data.len() as u64;
    if actual < expected {
        return Err(ConversionError::Truncated { expected, actual });
    }

    Ok(AudioStreamDescriptor {
        sample_rate: format.sample_rate,
        channel_count: format.channel_count,
        bits_per_sample: format.bits_per_sample,
        pcm_data,
    })
}

fn read_riff_header<R: Read>(reader: &mut R) -> Result<(), ConversionError> {
    let mut header = [0u8; 12];
    match reader.read_exact(&mut header) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
            return Err(ConversionError::NotWavContainer)
        }
        Err(e) => return Err(e.into()),
    }

    if header[0..4] != RIFF_ID[..] || header[8..12] != WAVE_ID[..] {
        return Err(ConversionError::NotWavContainer);
    }
    Ok(())
}

fn read_format_chunk<R: Read>(chunks: &mut Chunks<R>) -> Result<FormatChunk, ConversionError> {
    let header = chunks.next().ok_or(ConversionError::ExpectedFormatChunk)??;
    if header.id != FMT_ID {
        return Err(ConversionError::ExpectedFormatChunk);
    }
    if header.size < FMT_BODY_LEN {
        return Err(ConversionError::FormatChunkTooShort(header.size));
    }

    let mut body = chunks.body();
    let format = FormatChunk {
        audio_format: body.read_u16::<LittleEndian>()?,
        channel_count: body.read_u16::<LittleEndian>()?,
        sample_rate: body.read_u32::<LittleEndian>()?,
        byte_rate: body.read_u32::<LittleEndian>()?,
        block_align: body.read_u16::<LittleEndian>()?,
        bits_per_sample: body.read_u16::<LittleEndian>()?,
    };

    if format.audio_format != FORMAT_PCM {
        return Err(ConversionError::UnsupportedEncoding(format.audio_format));
    }

    debug!(
        channels = format.channel_count,
        sample_rate = format.sample_rate,
        bits_per_sample = format.bits_per_sample,
        extension_bytes = header.size - FMT_BODY_LEN,
        "Parsed format chunk"
    );
    Ok(format)
}
