//! Binary dump of grouped observations.
//!
//! All size fields are 8-byte little-endian unsigned integers. Raw values
//! are little-endian with the width given in the header.
//!
//! ```text
//! header: D | value size | S (number of groups)
//! S times:
//!   N (observations) | L (identifier bytes) | identifier | N * D values
//! ```
//!
//! Values are stored row-major, one observation after the other.
use crate::consts::DUMP_SIZE_WIDTH;
use crate::data::{Group, Observation};
use crate::error::{DumpError, Error, Result};
use std::io::{self, Read, Seek, SeekFrom, Write};
use tracing::{debug, info};

/// A raw value that can be written to and read from a dump
pub trait DumpValue: Sized {
    /// Number of bytes per value
    const SIZE: usize;

    /// Append the little-endian bytes of `self` to `buf`
    fn extend_le(&self, buf: &mut Vec<u8>);

    /// Decode a value from exactly `SIZE` little-endian bytes
    fn from_le_slice(bytes: &[u8]) -> Self;
}

macro_rules! impl_dump_value {
    ($kind:ty) => {
        impl DumpValue for $kind {
            const SIZE: usize = std::mem::size_of::<$kind>();

            fn extend_le(&self, buf: &mut Vec<u8>) {
                buf.extend_from_slice(&self.to_le_bytes());
            }

            fn from_le_slice(bytes: &[u8]) -> Self {
                let mut raw = [0_u8; std::mem::size_of::<$kind>()];
                raw.copy_from_slice(bytes);
                <$kind>::from_le_bytes(raw)
            }
        }
    };
}

impl_dump_value!(u8);
impl_dump_value!(u16);
impl_dump_value!(u32);
impl_dump_value!(u64);
impl_dump_value!(i8);
impl_dump_value!(i16);
impl_dump_value!(i32);
impl_dump_value!(i64);
impl_dump_value!(f32);
impl_dump_value!(f64);

/// The fixed-size header at the start of every dump
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DumpHeader {
    /// Dimension of every observation
    pub dim: usize,
    /// Bytes per raw value
    pub value_size: usize,
    /// Number of groups that follow
    pub n_groups: usize,
}

impl DumpHeader {
    /// Check the header against the dimension and value type a model
    /// expects
    pub fn validate(&self, dim: usize, value_size: usize) -> Result<()> {
        if self.dim != dim {
            Err(DumpError::DimensionMismatch {
                expected: dim,
                found: self.dim,
            }
            .into())
        } else if self.value_size != value_size {
            Err(DumpError::ValueSizeMismatch {
                expected: value_size,
                found: self.value_size,
            }
            .into())
        } else {
            Ok(())
        }
    }
}

fn write_size<W: Write>(writer: &mut W, n: usize) -> io::Result<()> {
    writer.write_all(&(n as u64).to_le_bytes())
}

fn read_size<R: Read>(reader: &mut R) -> Result<usize> {
    let mut raw = [0_u8; DUMP_SIZE_WIDTH];
    reader.read_exact(&mut raw)?;
    let n = u64::from_le_bytes(raw);
    usize::try_from(n).map_err(|_| DumpError::LengthOverflow(n).into())
}

/// Read a size field, `None` if the reader is exhausted before its first
/// byte
fn try_read_size<R: Read>(reader: &mut R) -> Result<Option<usize>> {
    let buf = read_at_most(reader, DUMP_SIZE_WIDTH)?;
    if buf.is_empty() {
        return Ok(None);
    }
    if buf.len() != DUMP_SIZE_WIDTH {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("expected {} bytes, got {}", DUMP_SIZE_WIDTH, buf.len()),
        )
        .into());
    }
    let mut raw = [0_u8; DUMP_SIZE_WIDTH];
    raw.copy_from_slice(&buf);
    let n = u64::from_le_bytes(raw);
    usize::try_from(n)
        .map(Some)
        .map_err(|_| DumpError::LengthOverflow(n).into())
}

fn read_at_most<R: Read>(reader: &mut R, len: usize) -> io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    reader.by_ref().take(len as u64).read_to_end(&mut buf)?;
    Ok(buf)
}

/// Read exactly `len` bytes without trusting `len` for the allocation
fn read_bytes<R: Read>(reader: &mut R, len: usize) -> Result<Vec<u8>> {
    let buf = read_at_most(reader, len)?;
    if buf.len() == len {
        Ok(buf)
    } else {
        Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("expected {} bytes, got {}", len, buf.len()),
        )
        .into())
    }
}

fn payload_len(n_obs: usize, dim: usize, value_size: usize) -> Result<usize> {
    n_obs
        .checked_mul(dim)
        .and_then(|n| n.checked_mul(value_size))
        .ok_or_else(|| DumpError::LengthOverflow(n_obs as u64).into())
}

/// Write the header followed by every group, in the order given.
///
/// Fails without writing the offending group if an observation does not
/// have `dim` dimensions.
pub fn write_dump<W, X>(
    writer: &mut W,
    dim: usize,
    groups: &[Group<X>],
) -> Result<()>
where
    W: Write,
    X: DumpValue,
{
    write_size(writer, dim)?;
    write_size(writer, X::SIZE)?;
    write_size(writer, groups.len())?;

    let mut buf: Vec<u8> = Vec::new();
    for group in groups {
        buf.clear();
        for obs in group.observations() {
            if obs.dim() != dim {
                return Err(Error::InvalidModel(format!(
                    "observation of group `{}` has {} dimensions, expected {}",
                    group.id(),
                    obs.dim(),
                    dim
                )));
            }
            obs.x().iter().for_each(|x| x.extend_le(&mut buf));
        }
        write_size(writer, group.len())?;
        write_size(writer, group.id().len())?;
        writer.write_all(group.id().as_bytes())?;
        writer.write_all(&buf)?;
    }
    writer.flush()?;
    debug!(n_groups = groups.len(), "wrote dump");
    Ok(())
}

/// Read the dump header
pub fn read_header<R: Read>(reader: &mut R) -> Result<DumpHeader> {
    let dim = read_size(reader)?;
    let value_size = read_size(reader)?;
    let n_groups = read_size(reader)?;
    Ok(DumpHeader {
        dim,
        value_size,
        n_groups,
    })
}

/// Read every group holding at least `min_group_size` observations.
///
/// The header must declare `dim` dimensions and values of `X::SIZE` bytes.
/// Groups below the threshold are skipped by seeking past their payload.
/// Returned groups have uniform latent parameters over `k` components.
pub fn read_dump<R, X>(
    reader: &mut R,
    dim: usize,
    k: usize,
    min_group_size: usize,
) -> Result<Vec<Group<X>>>
where
    R: Read + Seek,
    X: DumpValue,
{
    reader.rewind()?;
    let header = read_header(reader)?;
    header.validate(dim, X::SIZE)?;

    let mut groups: Vec<Group<X>> = Vec::new();
    for n_seen in 0..header.n_groups {
        let n_obs = match try_read_size(reader)? {
            Some(n_obs) => n_obs,
            None => {
                return Err(DumpError::GroupCountMismatch {
                    expected: header.n_groups,
                    found: n_seen,
                }
                .into())
            }
        };
        let id_len = read_size(reader)?;
        let len = payload_len(n_obs, dim, X::SIZE)?;

        if n_obs >= min_group_size {
            let id = String::from_utf8(read_bytes(reader, id_len)?)
                .map_err(|_| DumpError::InvalidIdentifier)?;
            let payload = read_bytes(reader, len)?;

            let mut group = Group::new(id, k);
            if dim > 0 {
                payload.chunks_exact(dim * X::SIZE).for_each(|row| {
                    let x: Vec<X> = row
                        .chunks_exact(X::SIZE)
                        .map(X::from_le_slice)
                        .collect();
                    group.add_observation(Observation::new(x, k));
                });
            }
            groups.push(group);
        } else {
            let skip = id_len
                .checked_add(len)
                .and_then(|n| i64::try_from(n).ok())
                .ok_or(DumpError::LengthOverflow(id_len as u64))?;
            reader.seek(SeekFrom::Current(skip))?;
            debug!(n_obs, "skipped group below threshold");
        }
    }

    info!(
        n_groups = groups.len(),
        n_skipped = header.n_groups - groups.len(),
        "loaded dump"
    );
    Ok(groups)
}
