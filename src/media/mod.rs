// SPDX-License-Identifier: MPL-2.0
//! Image algorithms and file handling.
//!
//! This module provides the classical tiers (enhancement and segmentation),
//! the compositing helpers shared by all tiers, image decoding and the local
//! model file store.

pub mod composite;
pub mod decode;
pub mod enhance;
pub mod model_store;
pub mod segment;

// Re-export commonly used types
pub use composite::{apply_mask, color_transfer, resize_mask};
pub use decode::{decode_image, encode_png, save_image};
pub use enhance::ClassicalEnhancer;
pub use model_store::{ModelStore, ModelStoreError};
pub use segment::ClassicalSegmenter;

/// Cancellation token type for background tasks.
pub type CancellationToken = std::sync::Arc<std::sync::atomic::AtomicBool>;

/// Checks if the cancellation token has been triggered.
#[inline]
#[must_use]
pub fn is_cancelled(token: &CancellationToken) -> bool {
    token.load(std::sync::atomic::Ordering::SeqCst)
}

/// Creates a fresh, untriggered cancellation token.
#[must_use]
pub fn new_cancellation_token() -> CancellationToken {
    std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;

    #[test]
    fn token_starts_untriggered() {
        let token = new_cancellation_token();
        assert!(!is_cancelled(&token));
        token.store(true, Ordering::SeqCst);
        assert!(is_cancelled(&token));
    }
}
