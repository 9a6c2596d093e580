//! Chunked authenticated encryption
//!
//! Stored layout:
//!
//! ```text
//! version (1) | chunk_size (u32 BE) | segment_0 | ... | segment_n
//! ```
//!
//! Each segment is one ChaCha20-Poly1305 STREAM (BE32) chunk: at most
//! `chunk_size` plaintext bytes plus a 16 byte tag. Every segment but the last
//! is full. The STREAM construction flags the last segment, so dropping
//! trailing segments fails authentication. The 5 byte header is the associated
//! data of every segment.
//!
//! Keys are unique per object, which is why the stream nonce is fixed.

use chacha20poly1305::aead::generic_array::GenericArray;
use chacha20poly1305::aead::stream::{DecryptorBE32, EncryptorBE32};
use chacha20poly1305::aead::{KeyInit, Payload};
use chacha20poly1305::ChaCha20Poly1305;
use meme_core::secrets::KEY_LEN;
use meme_core::{MemeError, Result};

/// Current stored format
pub const FORMAT_VERSION: u8 = 1;

/// Header length in bytes
pub const HEADER_LEN: usize = 5;

/// Plaintext bytes per segment
pub const DEFAULT_CHUNK_SIZE: u32 = 64 * 1024;

/// Largest chunk size accepted from a header
pub const MAX_CHUNK_SIZE: u32 = 16 * 1024 * 1024;

/// Poly1305 tag length
pub const TAG_LEN: usize = 16;

const STREAM_NONCE: [u8; 7] = [0u8; 7];

fn integrity_failure() -> MemeError {
    MemeError::Integrity
}

/// Stream header, bound as associated data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamHeader {
    chunk_size: u32,
}

impl StreamHeader {
    /// Header for a stream of `chunk_size` byte chunks
    pub fn new(chunk_size: u32) -> Result<Self> {
        if chunk_size == 0 || chunk_size > MAX_CHUNK_SIZE {
            return Err(MemeError::invalid(format!(
                "chunk size must be in 1..={MAX_CHUNK_SIZE}, got {chunk_size}"
            )));
        }
        Ok(Self { chunk_size })
    }

    /// Plaintext bytes per full segment
    pub fn chunk_size(&self) -> u32 {
        self.chunk_size
    }

    fn segment_len(&self) -> usize {
        self.chunk_size as usize + TAG_LEN
    }

    /// Wire bytes
    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        out[0] = FORMAT_VERSION;
        out[1..].copy_from_slice(&self.chunk_size.to_be_bytes());
        out
    }

    /// Parse a stored header. Any malformation is an integrity failure.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let header: [u8; HEADER_LEN] = bytes
            .get(..HEADER_LEN)
            .and_then(|h| h.try_into().ok())
            .ok_or_else(integrity_failure)?;
        if header[0] != FORMAT_VERSION {
            return Err(integrity_failure());
        }
        let chunk_size = u32::from_be_bytes([header[1], header[2], header[3], header[4]]);
        Self::new(chunk_size).map_err(|_| integrity_failure())
    }

    /// Stored size for `plaintext_len` bytes. Lengths whose stored size does
    /// not fit in a `u64` are rejected.
    pub fn ciphertext_len(&self, plaintext_len: u64) -> Result<u64> {
        let chunk = u64::from(self.chunk_size);
        let segments = plaintext_len.div_ceil(chunk).max(1);
        segments
            .checked_mul(TAG_LEN as u64)
            .and_then(|tags| tags.checked_add(plaintext_len))
            .and_then(|len| len.checked_add(HEADER_LEN as u64))
            .ok_or_else(|| {
                MemeError::invalid(format!("object length {plaintext_len} is too large"))
            })
    }
}

/// Encrypts one object, chunk by chunk
pub struct ChunkEncryptor {
    inner: EncryptorBE32<ChaCha20Poly1305>,
    header: [u8; HEADER_LEN],
}

impl ChunkEncryptor {
    /// Start a stream under `key`
    pub fn new(key: &[u8; KEY_LEN], header: StreamHeader) -> Self {
        let aead = ChaCha20Poly1305::new(GenericArray::from_slice(key));
        Self {
            inner: EncryptorBE32::from_aead(aead, GenericArray::from_slice(&STREAM_NONCE)),
            header: header.encode(),
        }
    }

    /// Header to write before the first segment
    pub fn header(&self) -> [u8; HEADER_LEN] {
        self.header
    }

    /// Seal a full, non-final chunk
    pub fn encrypt_chunk(&mut self, chunk: &[u8]) -> Result<Vec<u8>> {
        self.inner
            .encrypt_next(Payload {
                msg: chunk,
                aad: &self.header,
            })
            .map_err(|_| MemeError::internal("chunk encryption failed"))
    }

    /// Seal the final chunk, which may be short or empty
    pub fn finish(self, chunk: &[u8]) -> Result<Vec<u8>> {
        let header = self.header;
        self.inner
            .encrypt_last(Payload {
                msg: chunk,
                aad: &header,
            })
            .map_err(|_| MemeError::internal("final chunk encryption failed"))
    }
}

/// Decrypts a stored object segment by segment
pub struct SegmentDecryptor {
    inner: Option<DecryptorBE32<ChaCha20Poly1305>>,
    header: [u8; HEADER_LEN],
    segment_len: usize,
    data: Vec<u8>,
    offset: usize,
}

impl SegmentDecryptor {
    /// Parse the header of `data` and prepare to decrypt under `key`
    pub fn new(key: &[u8; KEY_LEN], data: Vec<u8>) -> Result<Self> {
        let header = StreamHeader::decode(&data)?;
        let aead = ChaCha20Poly1305::new(GenericArray::from_slice(key));
        Ok(Self {
            inner: Some(DecryptorBE32::from_aead(
                aead,
                GenericArray::from_slice(&STREAM_NONCE),
            )),
            header: header.encode(),
            segment_len: header.segment_len(),
            data,
            offset: HEADER_LEN,
        })
    }

    /// Whether the final segment has been consumed or decryption failed
    pub fn is_done(&self) -> bool {
        self.inner.is_none()
    }

    /// Decrypt the next segment. A failure ends the stream.
    pub fn next_segment(&mut self) -> Option<Result<Vec<u8>>> {
        let remaining = self.data.len() - self.offset;
        let is_last = remaining <= self.segment_len;

        let result = if is_last {
            let decryptor = self.inner.take()?;
            let segment = &self.data[self.offset..];
            self.offset = self.data.len();
            decryptor.decrypt_last(Payload {
                msg: segment,
                aad: &self.header,
            })
        } else {
            let decryptor = self.inner.as_mut()?;
            let end = self.offset + self.segment_len;
            let segment = &self.data[self.offset..end];
            self.offset = end;
            decryptor.decrypt_next(Payload {
                msg: segment,
                aad: &self.header,
            })
        };

        Some(result.map_err(|_| {
            self.inner = None;
            integrity_failure()
        }))
    }
}

impl Iterator for SegmentDecryptor {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_segment()
    }
}

/// Encrypt a whole buffer
pub fn seal(key: &[u8; KEY_LEN], header: StreamHeader, plaintext: &[u8]) -> Result<Vec<u8>> {
    let mut encryptor = ChunkEncryptor::new(key, header);
    let stored_len = header.ciphertext_len(plaintext.len() as u64)?;
    let mut out = Vec::with_capacity(usize::try_from(stored_len).unwrap_or(plaintext.len()));
    out.extend_from_slice(&encryptor.header());

    let chunk = header.chunk_size() as usize;
    let mut rest = plaintext;
    while rest.len() > chunk {
        let (head, tail) = rest.split_at(chunk);
        out.extend(encryptor.encrypt_chunk(head)?);
        rest = tail;
    }
    out.extend(encryptor.finish(rest)?);
    Ok(out)
}

/// Decrypt a whole buffer
pub fn open(key: &[u8; KEY_LEN], stored: Vec<u8>) -> Result<Vec<u8>> {
    let mut plaintext = Vec::with_capacity(stored.len());
    for segment in SegmentDecryptor::new(key, stored)? {
        plaintext.extend(segment?);
    }
    Ok(plaintext)
}
