/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! The single-slot decompression cache.
//!
//! A compressed matrix keeps a weak handle to the last fully decompressed
//! block so repeated consumers skip the decompression pass while someone
//! still holds the result. Correctness never depends on the slot: every
//! reader must tolerate a dead handle.

use std::sync::{Arc, RwLock, Weak};

use cola_block::MatrixBlock;

/// A weakly-held handle to a previously decompressed block.
#[derive(Debug, Default)]
pub struct DecompressCache {
    slot: RwLock<Weak<MatrixBlock>>,
}

impl DecompressCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached block, if some consumer still keeps it alive.
    pub fn get(&self) -> Option<Arc<MatrixBlock>> {
        self.slot.read().ok().and_then(|weak| weak.upgrade())
    }

    /// Store `block` as the cached decompressed form.
    pub fn store(&self, block: &Arc<MatrixBlock>) {
        if let Ok(mut slot) = self.slot.write() {
            *slot = Arc::downgrade(block);
        }
    }

    /// Drop the handle.
    pub fn clear(&self) {
        if let Ok(mut slot) = self.slot.write() {
            *slot = Weak::new();
        }
    }
}
