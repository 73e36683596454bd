//! Per-call metadata header construction and parsing.
//!
//! Before any payload chunk flows, each side announces what the other should
//! expect through the gRPC metadata map: `full-vectors`/`full-matrices`
//! carries the number of logical arrays in the call, and
//! `vecN-messages`/`matN-messages` (1-based `N`) carries the chunk count of
//! each array. The receiver parses the map completely before reading the
//! first chunk, so payload arriving ahead of metadata is never buffered.
//!
//! A [`CallMetadata`] is owned by exactly one call and discarded with it.

use crate::common::chunk::ChunkPlan;
use crate::common::error::{Error, Result};
use crate::common::types::ArrayKind;
use tonic::metadata::{Ascii, MetadataKey, MetadataMap, MetadataValue};

/// The declared array and chunk counts of one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallMetadata {
    kind: ArrayKind,
    chunks_per_array: Vec<usize>,
}

impl CallMetadata {
    /// Builds metadata from explicit per-array chunk counts, in call order.
    pub fn new(kind: ArrayKind, chunks_per_array: Vec<usize>) -> Self {
        Self {
            kind,
            chunks_per_array,
        }
    }

    /// Records the chunk counts of the given plans, in call order.
    pub fn for_plans(kind: ArrayKind, plans: &[ChunkPlan]) -> Self {
        Self {
            kind,
            chunks_per_array: plans.iter().map(ChunkPlan::chunk_count).collect(),
        }
    }

    /// Parses the declared counts for `kind` out of a header map.
    ///
    /// The declared values are untrusted. Nothing is allocated up front from
    /// the declared array count, and the chunk counts are summed with
    /// overflow checks, so a hostile header map fails cleanly instead of
    /// panicking or wrapping past downstream limits.
    ///
    /// # Errors
    ///
    /// [`Error::Protocol`] when the array count header is missing, any
    /// declared count is malformed, non-decimal, or zero, or the chunk
    /// counts overflow when summed.
    pub fn from_headers(kind: ArrayKind, headers: &MetadataMap) -> Result<Self> {
        let array_count = header_count(headers, kind.full_key())?;

        let mut chunks_per_array = Vec::new();
        let mut total_chunks: usize = 0;
        for index in 0..array_count {
            let chunks = header_count(headers, &kind.messages_key(index))?;
            if chunks == 0 {
                return Err(Error::Protocol {
                    detail: format!("array {index} declares zero chunk messages"),
                });
            }
            total_chunks = total_chunks
                .checked_add(chunks)
                .ok_or_else(|| Error::Protocol {
                    detail: format!("declared chunk counts overflow at array {index}"),
                })?;
            chunks_per_array.push(chunks);
        }

        Ok(Self {
            kind,
            chunks_per_array,
        })
    }

    /// Renders the declared counts into a header map.
    pub fn insert_into(&self, headers: &mut MetadataMap) -> Result<()> {
        insert_count(headers, self.kind.full_key(), self.array_count())?;
        for (index, chunks) in self.chunks_per_array.iter().enumerate() {
            insert_count(headers, &self.kind.messages_key(index), *chunks)?;
        }
        Ok(())
    }

    pub const fn kind(&self) -> ArrayKind {
        self.kind
    }

    /// Number of logical arrays the call carries.
    pub fn array_count(&self) -> usize {
        self.chunks_per_array.len()
    }

    /// Declared chunk count of the `index`-th (0-based) array.
    pub fn chunks_for(&self, index: usize) -> usize {
        self.chunks_per_array[index]
    }

    /// Declared chunk count summed over all arrays.
    ///
    /// Saturates instead of wrapping, so a pathological declaration can
    /// never total less than any of its parts and slip under a chunk limit.
    pub fn total_chunks(&self) -> usize {
        self.chunks_per_array
            .iter()
            .fold(0usize, |total, chunks| total.saturating_add(*chunks))
    }
}

fn header_count(headers: &MetadataMap, key: &str) -> Result<usize> {
    let value = headers.get(key).ok_or_else(|| Error::Protocol {
        detail: format!("missing header `{key}`"),
    })?;
    let text = value.to_str().map_err(|_| Error::Protocol {
        detail: format!("header `{key}` holds a non-ascii value"),
    })?;
    text.parse().map_err(|_| Error::Protocol {
        detail: format!("header `{key}` holds a non-decimal count: `{text}`"),
    })
}

fn insert_count(headers: &mut MetadataMap, key: &str, count: usize) -> Result<()> {
    let key = MetadataKey::from_bytes(key.as_bytes()).map_err(|_| Error::Protocol {
        detail: format!("invalid header key `{key}`"),
    })?;
    let value: MetadataValue<Ascii> =
        count.to_string().parse().map_err(|_| Error::Protocol {
            detail: format!("unrepresentable header count {count}"),
        })?;
    headers.insert(key, value);
    Ok(())
}
