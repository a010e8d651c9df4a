//! Dataset handling for the trashnet waste-photo corpus.
//!
//! The corpus is expected on disk as a prepared folder tree:
//!
//! ```text
//! <root>/
//! ├── train/
//! │   ├── cardboard/*.jpg
//! │   ├── glass/*.jpg
//! │   └── ...
//! └── test/
//!     ├── cardboard/*.jpg
//!     └── ...
//! ```
//!
//! How that tree is produced from the upstream dataset is an external
//! concern; this module only discovers, decodes, splits, and batches it.

pub mod augmentation;
pub mod batcher;
pub mod loader;
pub mod split;

pub use augmentation::{Augmenter, TtaView, TTA_VIEWS};
pub use batcher::{WasteBatch, WasteBatcher, WasteItem, WasteTensorDataset};
pub use loader::{DatasetStats, ImageSample, WasteFolderDataset};
pub use split::stratified_holdout;

/// Number of waste categories in trashnet
pub const NUM_CLASSES: usize = 6;

/// Default edge length images are resized to
pub const IMAGE_SIZE: usize = 224;

/// Waste categories, in sorted directory order
pub const CLASS_NAMES: [&str; NUM_CLASSES] = [
    "cardboard",
    "glass",
    "metal",
    "paper",
    "plastic",
    "trash",
];

/// Get the class name for a label index
pub fn class_name(label: usize) -> Option<&'static str> {
    CLASS_NAMES.get(label).copied()
}

/// Get the label index for a class name
pub fn class_index(name: &str) -> Option<usize> {
    CLASS_NAMES.iter().position(|&n| n == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_name() {
        assert_eq!(class_name(0), Some("cardboard"));
        assert_eq!(class_name(5), Some("trash"));
        assert_eq!(class_name(6), None);
    }

    #[test]
    fn test_class_index_roundtrip() {
        for (idx, name) in CLASS_NAMES.iter().enumerate() {
            assert_eq!(class_index(name), Some(idx));
        }
        assert_eq!(class_index("styrofoam"), None);
    }
}
