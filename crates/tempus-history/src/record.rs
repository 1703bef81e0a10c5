//! Record payload format
//!
//! A tick record is a sequence of blocks, one per producer, in registration
//! order:
//! - Bytes 0-1: Producer tag (LE)
//! - Bytes 2-5: Block length (LE)
//! - Bytes 6..: Block body
//!
//! Bodies are opaque to the store. Producers read back exactly what they
//! wrote, in the order they wrote it.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tempus_core::{EntityId, TempusError, TempusResult, Tick};

/// Block header size in bytes
pub const BLOCK_HEADER_SIZE: usize = 6;

/// Writer for one producer's block
#[derive(Debug)]
pub struct BlockWriter {
    tag: u16,
    buf: BytesMut,
}

impl BlockWriter {
    pub fn new(tag: u16) -> Self {
        BlockWriter {
            tag,
            buf: BytesMut::new(),
        }
    }

    #[inline]
    pub fn tag(&self) -> u16 {
        self.tag
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn put_u8(&mut self, v: u8) {
        self.buf.put_u8(v);
    }

    pub fn put_bool(&mut self, v: bool) {
        self.buf.put_u8(v as u8);
    }

    pub fn put_u16(&mut self, v: u16) {
        self.buf.put_u16_le(v);
    }

    pub fn put_u32(&mut self, v: u32) {
        self.buf.put_u32_le(v);
    }

    pub fn put_u64(&mut self, v: u64) {
        self.buf.put_u64_le(v);
    }

    pub fn put_i64(&mut self, v: i64) {
        self.buf.put_i64_le(v);
    }

    /// Bit-exact
    pub fn put_f32(&mut self, v: f32) {
        self.buf.put_u32_le(v.to_bits());
    }

    /// Bit-exact
    pub fn put_f64(&mut self, v: f64) {
        self.buf.put_u64_le(v.to_bits());
    }

    pub fn put_tick(&mut self, tick: Tick) {
        self.put_u64(tick.get());
    }

    pub fn put_entity(&mut self, id: EntityId) {
        self.put_u64(id.0);
    }

    /// Length-prefixed (u32) byte string
    pub fn put_bytes(&mut self, data: &[u8]) {
        self.buf.put_u32_le(data.len() as u32);
        self.buf.put_slice(data);
    }

    fn encode_into(&self, out: &mut BytesMut) {
        out.put_u16_le(self.tag);
        out.put_u32_le(self.buf.len() as u32);
        out.put_slice(&self.buf);
    }
}

/// In-progress tick record
///
/// Nothing written here is visible in the store until
/// [`HistoryStore::end_record`](crate::HistoryStore::end_record) commits it.
/// Each producer owns one region; regions are independent, so they may be
/// filled from different threads via [`regions_mut`](RecordBuilder::regions_mut).
#[derive(Debug)]
pub struct RecordBuilder {
    tick: Tick,
    regions: Vec<BlockWriter>,
}

impl RecordBuilder {
    pub fn new(tick: Tick) -> Self {
        RecordBuilder {
            tick,
            regions: Vec::new(),
        }
    }

    /// Builder with one preallocated region per tag, in order
    pub fn with_regions(tick: Tick, tags: &[u16]) -> Self {
        RecordBuilder {
            tick,
            regions: tags.iter().map(|&tag| BlockWriter::new(tag)).collect(),
        }
    }

    #[inline]
    pub fn tick(&self) -> Tick {
        self.tick
    }

    /// Append a region for the next producer
    pub fn region(&mut self, tag: u16) -> &mut BlockWriter {
        self.regions.push(BlockWriter::new(tag));
        let last = self.regions.len() - 1;
        &mut self.regions[last]
    }

    /// Disjoint mutable access to every region
    pub fn regions_mut(&mut self) -> std::slice::IterMut<'_, BlockWriter> {
        self.regions.iter_mut()
    }

    pub fn region_count(&self) -> usize {
        self.regions.len()
    }

    /// Serialize every region in order into the final payload
    pub fn finish(self) -> Bytes {
        let size: usize = self
            .regions
            .iter()
            .map(|r| BLOCK_HEADER_SIZE + r.len())
            .sum();
        let mut out = BytesMut::with_capacity(size);
        for region in &self.regions {
            region.encode_into(&mut out);
        }
        out.freeze()
    }
}

/// Reader over one producer's block
#[derive(Clone, Debug)]
pub struct BlockReader {
    tag: u16,
    data: Bytes,
}

impl BlockReader {
    pub fn new(tag: u16, data: Bytes) -> Self {
        BlockReader { tag, data }
    }

    #[inline]
    pub fn tag(&self) -> u16 {
        self.tag
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.data.remaining()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    fn ensure(&self, needed: usize) -> TempusResult<()> {
        if self.data.remaining() < needed {
            return Err(TempusError::BufferTooShort {
                expected: needed,
                actual: self.data.remaining(),
            });
        }
        Ok(())
    }

    pub fn get_u8(&mut self) -> TempusResult<u8> {
        self.ensure(1)?;
        Ok(self.data.get_u8())
    }

    pub fn get_bool(&mut self) -> TempusResult<bool> {
        Ok(self.get_u8()? != 0)
    }

    pub fn get_u16(&mut self) -> TempusResult<u16> {
        self.ensure(2)?;
        Ok(self.data.get_u16_le())
    }

    pub fn get_u32(&mut self) -> TempusResult<u32> {
        self.ensure(4)?;
        Ok(self.data.get_u32_le())
    }

    pub fn get_u64(&mut self) -> TempusResult<u64> {
        self.ensure(8)?;
        Ok(self.data.get_u64_le())
    }

    pub fn get_i64(&mut self) -> TempusResult<i64> {
        self.ensure(8)?;
        Ok(self.data.get_i64_le())
    }

    pub fn get_f32(&mut self) -> TempusResult<f32> {
        Ok(f32::from_bits(self.get_u32()?))
    }

    pub fn get_f64(&mut self) -> TempusResult<f64> {
        Ok(f64::from_bits(self.get_u64()?))
    }

    pub fn get_tick(&mut self) -> TempusResult<Tick> {
        Ok(Tick(self.get_u64()?))
    }

    pub fn get_entity(&mut self) -> TempusResult<EntityId> {
        Ok(EntityId(self.get_u64()?))
    }

    pub fn get_bytes(&mut self) -> TempusResult<Bytes> {
        let len = self.get_u32()? as usize;
        self.ensure(len)?;
        Ok(self.data.split_to(len))
    }
}

/// Parsed view of a committed record payload
///
/// Parsing stops at the first malformed block; blocks before it remain
/// readable, so one damaged producer does not take down the others.
#[derive(Clone, Debug)]
pub struct SnapshotReader {
    blocks: Vec<BlockReader>,
    error: Option<TempusError>,
}

impl SnapshotReader {
    pub fn parse(mut payload: Bytes) -> Self {
        let mut blocks = Vec::new();
        let mut error = None;

        while payload.has_remaining() {
            if payload.remaining() < BLOCK_HEADER_SIZE {
                error = Some(TempusError::BufferTooShort {
                    expected: BLOCK_HEADER_SIZE,
                    actual: payload.remaining(),
                });
                break;
            }
            let tag = payload.get_u16_le();
            let len = payload.get_u32_le() as usize;
            if payload.remaining() < len {
                error = Some(TempusError::BufferTooShort {
                    expected: len,
                    actual: payload.remaining(),
                });
                break;
            }
            blocks.push(BlockReader::new(tag, payload.split_to(len)));
        }

        SnapshotReader { blocks, error }
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Error that stopped parsing, if any
    pub fn error(&self) -> Option<&TempusError> {
        self.error.as_ref()
    }

    pub fn tags(&self) -> impl Iterator<Item = u16> + '_ {
        self.blocks.iter().map(|b| b.tag())
    }

    /// Block written by the producer at `index`, checked against its tag
    pub fn block_at(&self, index: usize, expected_tag: u16) -> TempusResult<BlockReader> {
        match self.blocks.get(index) {
            Some(block) if block.tag() == expected_tag => Ok(block.clone()),
            Some(block) => Err(TempusError::TagMismatch {
                expected: expected_tag,
                found: block.tag(),
            }),
            None => Err(self
                .error
                .clone()
                .unwrap_or(TempusError::MissingBlock(expected_tag))),
        }
    }

    /// First block carrying `tag`
    pub fn find(&self, tag: u16) -> Option<BlockReader> {
        self.blocks.iter().find(|b| b.tag() == tag).cloned()
    }
}
