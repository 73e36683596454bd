//! Chunk planning for one logical array.
//!
//! Given an array's element count, its element width, and the maximum
//! payload budget of one message, [`ChunkPlan`] computes the minimal list of
//! ascending cutoff offsets (in elements) at which the flattened buffer is
//! split. Plans are computed independently per array; arrays never share a
//! chunk message.

use crate::common::error::{Error, Result};
use core::ops::Range;

/// The cutoff offsets partitioning one array's element buffer.
///
/// Offsets are strictly increasing, every chunk holds at least one element,
/// and the final offset equals the array's total element count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkPlan {
    cutoffs: Vec<usize>,
}

impl ChunkPlan {
    /// Plans the chunking of an array of `total_elements` elements of
    /// `element_width` bytes under a `chunk_bytes` payload budget.
    ///
    /// # Errors
    ///
    /// - [`Error::Configuration`] when the budget cannot hold one element.
    /// - [`Error::Protocol`] for an empty array; empty arrays are never
    ///   transmitted.
    pub fn for_array(
        total_elements: usize,
        element_width: usize,
        chunk_bytes: usize,
    ) -> Result<Self> {
        let elements_per_chunk = chunk_bytes / element_width;
        if elements_per_chunk == 0 {
            return Err(Error::Configuration {
                chunk_bytes,
                element_width,
            });
        }
        if total_elements == 0 {
            return Err(Error::Protocol {
                detail: "cannot transmit an empty array".to_string(),
            });
        }

        let full_chunks = total_elements / elements_per_chunk;
        let remainder = total_elements % elements_per_chunk;

        let mut cutoffs = Vec::with_capacity(full_chunks + usize::from(remainder != 0));
        for i in 1..=full_chunks {
            cutoffs.push(i * elements_per_chunk);
        }
        if remainder != 0 {
            cutoffs.push(total_elements);
        }

        Ok(Self { cutoffs })
    }

    /// Number of chunk messages this plan produces.
    pub fn chunk_count(&self) -> usize {
        self.cutoffs.len()
    }

    /// The ascending cutoff offsets, in elements. The last offset equals the
    /// array's element count.
    pub fn cutoffs(&self) -> &[usize] {
        &self.cutoffs
    }

    /// Iterates the element ranges of each chunk, in order.
    pub fn ranges(&self) -> impl Iterator<Item = Range<usize>> + '_ {
        let starts = core::iter::once(0).chain(self.cutoffs.iter().copied());
        starts
            .zip(self.cutoffs.iter().copied())
            .map(|(start, end)| start..end)
    }
}
