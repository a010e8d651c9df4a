//! Lightweight augmentation on decoded CHW buffers.
//!
//! Training uses a seeded random horizontal flip; evaluation-time
//! augmentation uses the four deterministic dihedral views so repeated runs
//! aggregate the exact same predictions.

use rand::Rng;
use rand_chacha::ChaCha8Rng;

use crate::dataset::batcher::WasteItem;

/// Flip a CHW buffer left-right in place semantics (returns a new buffer).
fn flip_horizontal(image: &[f32], size: usize) -> Vec<f32> {
    let mut out = vec![0.0f32; image.len()];
    for c in 0..3 {
        for y in 0..size {
            for x in 0..size {
                out[c * size * size + y * size + x] =
                    image[c * size * size + y * size + (size - 1 - x)];
            }
        }
    }
    out
}

/// Flip a CHW buffer top-bottom.
fn flip_vertical(image: &[f32], size: usize) -> Vec<f32> {
    let mut out = vec![0.0f32; image.len()];
    for c in 0..3 {
        for y in 0..size {
            let src = c * size * size + (size - 1 - y) * size;
            let dst = c * size * size + y * size;
            out[dst..dst + size].copy_from_slice(&image[src..src + size]);
        }
    }
    out
}

/// Train-time augmenter: random horizontal flip
pub struct Augmenter {
    image_size: usize,
    flip_prob: f64,
    rng: ChaCha8Rng,
}

impl Augmenter {
    pub fn new(image_size: usize, seed: u64) -> Self {
        use rand::SeedableRng;
        Self {
            image_size,
            flip_prob: 0.5,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Possibly flip one item
    pub fn apply(&mut self, item: WasteItem) -> WasteItem {
        if self.rng.random_bool(self.flip_prob) {
            WasteItem {
                image: flip_horizontal(&item.image, self.image_size),
                ..item
            }
        } else {
            item
        }
    }
}

/// One deterministic evaluation-time view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TtaView {
    Identity,
    FlipH,
    FlipV,
    FlipBoth,
}

/// The views averaged by the test-time-augmented evaluation pass
pub const TTA_VIEWS: [TtaView; 4] = [
    TtaView::Identity,
    TtaView::FlipH,
    TtaView::FlipV,
    TtaView::FlipBoth,
];

impl TtaView {
    /// Apply this view to an item
    pub fn apply(&self, item: &WasteItem, size: usize) -> WasteItem {
        let image = match self {
            TtaView::Identity => item.image.clone(),
            TtaView::FlipH => flip_horizontal(&item.image, size),
            TtaView::FlipV => flip_vertical(&item.image, size),
            TtaView::FlipBoth => flip_vertical(&flip_horizontal(&item.image, size), size),
        };
        WasteItem {
            image,
            label: item.label,
            path: item.path.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp_item(size: usize) -> WasteItem {
        // Pixel value encodes its (c, y, x) coordinates.
        let image: Vec<f32> = (0..3 * size * size).map(|i| i as f32).collect();
        WasteItem::from_data(image, 0, "ramp.jpg".to_string())
    }

    #[test]
    fn test_hflip_reverses_rows() {
        let size = 4;
        let item = ramp_item(size);
        let flipped = TtaView::FlipH.apply(&item, size);

        // First row of channel 0: [0,1,2,3] -> [3,2,1,0]
        assert_eq!(&flipped.image[0..4], &[3.0, 2.0, 1.0, 0.0]);
    }

    #[test]
    fn test_vflip_reverses_columns() {
        let size = 4;
        let item = ramp_item(size);
        let flipped = TtaView::FlipV.apply(&item, size);

        // First row of channel 0 becomes the old last row.
        assert_eq!(&flipped.image[0..4], &[12.0, 13.0, 14.0, 15.0]);
    }

    #[test]
    fn test_double_flip_is_identity() {
        let size = 8;
        let item = ramp_item(size);
        let twice = TtaView::FlipH.apply(&TtaView::FlipH.apply(&item, size), size);
        assert_eq!(twice.image, item.image);
    }

    #[test]
    fn test_views_preserve_label_and_path() {
        let item = ramp_item(4);
        for view in TTA_VIEWS {
            let out = view.apply(&item, 4);
            assert_eq!(out.label, item.label);
            assert_eq!(out.path, item.path);
        }
    }

    #[test]
    fn test_augmenter_is_seeded() {
        let size = 4;
        let item = ramp_item(size);

        let run = |seed: u64| {
            let mut aug = Augmenter::new(size, seed);
            (0..16)
                .map(|_| aug.apply(item.clone()).image[0])
                .collect::<Vec<_>>()
        };

        assert_eq!(run(3), run(3));
    }
}
