//! Decoding of per-node point chunks.
//!
//! A chunk is a flat sequence of 27 byte little-endian records:
//! `f64 x, f64 y, f64 z, u8 r, u8 g, u8 b`.

use crate::point::PointData;
use binrw::{binrw, BinReaderExt};
use glam::{DVec3, Vec3};
use std::io::Cursor;
use thiserror::Error;

pub const BYTES_PER_RECORD: usize = 27;

#[binrw]
#[derive(Debug, Clone, Copy, PartialEq)]
#[brw(little)]
pub struct ChunkRecord {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl From<ChunkRecord> for PointData {
    fn from(record: ChunkRecord) -> Self {
        PointData {
            position: DVec3::new(record.x, record.y, record.z),
            color: Vec3::new(record.r as f32, record.g as f32, record.b as f32) / 255.0,
        }
    }
}

#[derive(Error, Debug)]
pub enum ChunkFormatError {
    #[error("chunk of {len} bytes is not a multiple of 27 ({remainder} trailing bytes)")]
    TrailingBytes { len: usize, remainder: usize },

    #[error("Invalid binary data: {0}")]
    InvalidBinaryData(#[from] binrw::Error),
}

/// Renderable payload of a loaded node.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PointChunk {
    pub points: Vec<PointData>,
}

impl PointChunk {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Positions narrowed to `f32`, in the layout GPU buffers expect.
    pub fn positions(&self) -> Vec<[f32; 3]> {
        self.points
            .iter()
            .map(|point| point.position.as_vec3().to_array())
            .collect()
    }

    pub fn colors(&self) -> Vec<[f32; 3]> {
        self.points.iter().map(|point| point.color.to_array()).collect()
    }
}

pub fn parse_chunk(buf: &[u8]) -> Result<PointChunk, ChunkFormatError> {
    let remainder = buf.len() % BYTES_PER_RECORD;
    if remainder != 0 {
        return Err(ChunkFormatError::TrailingBytes {
            len: buf.len(),
            remainder,
        });
    }

    let num_points = buf.len() / BYTES_PER_RECORD;
    let mut cursor = Cursor::new(buf);
    let mut points = Vec::with_capacity(num_points);

    for _ in 0..num_points {
        let record: ChunkRecord = cursor.read_le()?;
        points.push(record.into());
    }

    Ok(PointChunk { points })
}

#[cfg(test)]
pub(crate) fn encode_records(records: &[ChunkRecord]) -> Vec<u8> {
    use binrw::BinWriterExt;

    let mut cursor = Cursor::new(Vec::with_capacity(records.len() * BYTES_PER_RECORD));
    for record in records {
        cursor.write_le(record).expect("writing to a Vec cannot fail");
    }
    cursor.into_inner()
}
