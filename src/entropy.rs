//! Chain entropy: a monotonic height counter and SHA-256 as the public hash

use crate::common::traits::EntropySource;
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicU64, Ordering};

/// Height counter driven by the host chain (or by tests and simulations)
#[derive(Debug, Default)]
pub struct ChainEntropy {
    height: AtomicU64,
}

impl ChainEntropy {
    pub fn new(initial_height: u64) -> Self {
        Self {
            height: AtomicU64::new(initial_height),
        }
    }

    /// Advance the chain by `blocks` and return the new height
    pub fn advance(&self, blocks: u64) -> u64 {
        self.height.fetch_add(blocks, Ordering::SeqCst) + blocks
    }

    /// Move the height forward to `height`.
    ///
    /// Returns false and leaves the counter untouched if `height` would move
    /// it backwards.
    pub fn set_height(&self, height: u64) -> bool {
        self.height.fetch_max(height, Ordering::SeqCst) <= height
    }
}

impl EntropySource for ChainEntropy {
    fn current_height(&self) -> u64 {
        self.height.load(Ordering::SeqCst)
    }

    fn hash(&self, bytes: &[u8]) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        hasher.finalize().into()
    }
}
