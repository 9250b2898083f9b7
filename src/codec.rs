//! Binary record blob layout.
//!
//! One blob holds one activity: a 28-byte little-endian header (start i64,
//! type u32, seconds f32, meters f32, samples u64) followed by the five
//! sample arrays in fixed order - time, dist, alt (f32), lat, lon (i32).
//! No framing, no padding, no length prefixes beyond the header's sample
//! count. A blob is exactly `28 + 20 * samples` bytes; trailing bytes are
//! tolerated on decode, a shortfall is a hard error.

use crate::error::{AtlasError, Result};
use crate::{Header, Record};

/// Encoded size of the header.
pub const HEADER_BYTES: usize = 28;

/// Encoded size of one sample across all five arrays.
const SAMPLE_BYTES: u64 = 20;

/// Encode a record into its blob layout.
pub fn encode(rec: &Record) -> Vec<u8> {
    let n = rec.time.len();
    let mut out = Vec::with_capacity(HEADER_BYTES + SAMPLE_BYTES as usize * n);
    out.extend_from_slice(&rec.header.start.to_le_bytes());
    out.extend_from_slice(&rec.header.sport.to_le_bytes());
    out.extend_from_slice(&rec.header.seconds.to_le_bytes());
    out.extend_from_slice(&rec.header.meters.to_le_bytes());
    out.extend_from_slice(&rec.header.samples.to_le_bytes());
    for v in &rec.time {
        out.extend_from_slice(&v.to_le_bytes());
    }
    for v in &rec.dist {
        out.extend_from_slice(&v.to_le_bytes());
    }
    for v in &rec.alt {
        out.extend_from_slice(&v.to_le_bytes());
    }
    for v in &rec.lat {
        out.extend_from_slice(&v.to_le_bytes());
    }
    for v in &rec.lon {
        out.extend_from_slice(&v.to_le_bytes());
    }
    out
}

/// Decode a blob. Fails with a truncated-input error when fewer bytes are
/// available than the header promises.
pub fn decode(buf: &[u8]) -> Result<Record> {
    let mut r = Reader { buf, pos: 0 };
    let header = Header {
        start: r.i64()?,
        sport: r.u32()?,
        seconds: r.f32()?,
        meters: r.f32()?,
        samples: r.u64()?,
    };

    let need = header
        .samples
        .checked_mul(SAMPLE_BYTES)
        .and_then(|b| b.checked_add(HEADER_BYTES as u64))
        .ok_or_else(|| AtlasError::decode(format!("absurd sample count {}", header.samples)))?;
    if (buf.len() as u64) < need {
        return Err(AtlasError::decode(format!(
            "truncated record: need {} bytes, have {}",
            need,
            buf.len()
        )));
    }
    let n = header.samples as usize;

    Ok(Record {
        header,
        time: r.f32s(n)?,
        dist: r.f32s(n)?,
        alt: r.f32s(n)?,
        lat: r.i32s(n)?,
        lon: r.i32s(n)?,
    })
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.buf.len() - self.pos < n {
            return Err(AtlasError::decode(format!(
                "truncated record: need {} bytes at offset {}, have {}",
                n,
                self.pos,
                self.buf.len() - self.pos
            )));
        }
        let b = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(b)
    }

    fn i64(&mut self) -> Result<i64> {
        let mut a = [0u8; 8];
        a.copy_from_slice(self.take(8)?);
        Ok(i64::from_le_bytes(a))
    }

    fn u64(&mut self) -> Result<u64> {
        let mut a = [0u8; 8];
        a.copy_from_slice(self.take(8)?);
        Ok(u64::from_le_bytes(a))
    }

    fn u32(&mut self) -> Result<u32> {
        let mut a = [0u8; 4];
        a.copy_from_slice(self.take(4)?);
        Ok(u32::from_le_bytes(a))
    }

    fn f32(&mut self) -> Result<f32> {
        let mut a = [0u8; 4];
        a.copy_from_slice(self.take(4)?);
        Ok(f32::from_le_bytes(a))
    }

    fn f32s(&mut self, n: usize) -> Result<Vec<f32>> {
        let b = self.take(n * 4)?;
        Ok(b.chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect())
    }

    fn i32s(&mut self, n: usize) -> Result<Vec<i32>> {
        let b = self.take(n * 4)?;
        Ok(b.chunks_exact(4)
            .map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect())
    }
}
