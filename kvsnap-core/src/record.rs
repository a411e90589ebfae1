/*!
Backup record encoding and decoding.

A record is a fixed header followed by one frame per key and one per value:

```text
record     := MAGIC("KVSN") VERSION(0x01) frame-pair*
frame-pair := frame(key) frame(value)
frame      := LEN(u64 big-endian) BYTES(LEN)
```

Every field carries its own length, so keys and values may hold any byte
(NUL, space, newline, `;`) without escaping. The empty snapshot encodes to
the bare 5-byte header; a zero-length file is a truncated header.
*/

use bytes::{Buf, BufMut, BytesMut};

use crate::error::DecodeError;
use crate::pair::{KvPair, Snapshot};

/// Magic bytes opening every record
pub const MAGIC: &[u8; 4] = b"KVSN";

/// Current record format version
pub const FORMAT_VERSION: u8 = 1;

/// Header length: magic plus version byte
pub const HEADER_LEN: usize = MAGIC.len() + 1;

const LEN_PREFIX: usize = std::mem::size_of::<u64>();

/// Serialize a snapshot into a backup record.
///
/// Never fails. Pairs are written in the order the snapshot holds them.
///
/// # Example
/// ```rust
/// use kvsnap_core::{record, KvPair, Snapshot};
///
/// let snapshot = Snapshot::from_pairs(vec![KvPair::new("a", "1")]);
/// let bytes = record::encode(&snapshot);
/// assert_eq!(record::decode(&bytes).unwrap(), snapshot);
/// ```
pub fn encode(snapshot: &Snapshot) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(encoded_len(snapshot));
    buf.put_slice(MAGIC);
    buf.put_u8(FORMAT_VERSION);

    for pair in snapshot {
        put_frame(&mut buf, &pair.key);
        put_frame(&mut buf, &pair.value);
    }

    buf.to_vec()
}

/// Exact size in bytes of `encode(snapshot)`
pub fn encoded_len(snapshot: &Snapshot) -> usize {
    HEADER_LEN
        + snapshot
            .iter()
            .map(|p| 2 * LEN_PREFIX + p.key.len() + p.value.len())
            .sum::<usize>()
}

/// Parse a backup record back into a snapshot.
///
/// # Errors
/// * `DecodeError::Truncated` - A header, length prefix or payload runs past the end of input
/// * `DecodeError::BadMagic` - The input is not a kvsnap record
/// * `DecodeError::UnsupportedVersion` - The record uses an unknown format version
pub fn decode(bytes: &[u8]) -> Result<Snapshot, DecodeError> {
    let mut reader = FrameReader::new(bytes);
    reader.read_header()?;

    let mut snapshot = Snapshot::new();
    while reader.has_remaining() {
        let key = reader.read_frame()?;
        let value = reader.read_frame()?;
        snapshot.push(KvPair { key, value });
    }

    Ok(snapshot)
}

fn put_frame(buf: &mut BytesMut, field: &[u8]) {
    buf.put_u64(field.len() as u64);
    buf.put_slice(field);
}

/// Cursor over a record that tracks its absolute offset for error reports.
struct FrameReader<'a> {
    buf: &'a [u8],
    offset: usize,
}

impl<'a> FrameReader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, offset: 0 }
    }

    fn has_remaining(&self) -> bool {
        self.buf.has_remaining()
    }

    fn ensure(&self, needed: u64) -> Result<(), DecodeError> {
        if needed > self.buf.remaining() as u64 {
            return Err(DecodeError::Truncated {
                offset: self.offset,
                needed,
                available: self.buf.remaining(),
            });
        }
        Ok(())
    }

    fn read_header(&mut self) -> Result<(), DecodeError> {
        // A short input that still agrees with the magic is a cut-off record,
        // anything else is a foreign file.
        let seen = self.buf.len().min(MAGIC.len());
        if self.buf[..seen] != MAGIC[..seen] {
            return Err(DecodeError::BadMagic);
        }
        self.ensure(HEADER_LEN as u64)?;

        self.buf.advance(MAGIC.len());
        let version = self.buf.get_u8();
        self.offset += HEADER_LEN;

        if version != FORMAT_VERSION {
            return Err(DecodeError::UnsupportedVersion(version));
        }
        Ok(())
    }

    fn read_frame(&mut self) -> Result<Vec<u8>, DecodeError> {
        self.ensure(LEN_PREFIX as u64)?;
        let len = self.buf.get_u64();
        self.offset += LEN_PREFIX;

        // Checked before allocating so a corrupt prefix cannot request gigabytes.
        self.ensure(len)?;
        let len = len as usize;
        let field = self.buf[..len].to_vec();
        self.buf.advance(len);
        self.offset += len;

        Ok(field)
    }
}
