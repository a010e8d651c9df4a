//! Folder-tree dataset loader.
//!
//! Discovers labeled image files under a split directory whose immediate
//! subdirectories name the categories. Label indices follow sorted directory
//! order, so they are stable across runs and machines.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use walkdir::WalkDir;

use crate::utils::error::{Result, WasteNetError};

const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "bmp"];

/// A single image file with its label and metadata
#[derive(Debug, Clone)]
pub struct ImageSample {
    /// Path to the image file
    pub path: PathBuf,
    /// Label index
    pub label: usize,
    /// Category name (directory name)
    pub class_name: String,
}

/// A discovered (not yet decoded) labeled image folder
#[derive(Debug)]
pub struct WasteFolderDataset {
    /// Split directory the samples were discovered under
    pub root_dir: PathBuf,
    /// All discovered samples
    pub samples: Vec<ImageSample>,
    /// Category name to label index
    pub class_to_idx: HashMap<String, usize>,
    /// Label index to category name
    pub idx_to_class: Vec<String>,
}

impl WasteFolderDataset {
    /// Scan a split directory (e.g. `data/train`) for labeled images.
    pub fn new<P: AsRef<Path>>(root_dir: P) -> Result<Self> {
        let root_dir = root_dir.as_ref().to_path_buf();
        info!("scanning dataset directory {:?}", root_dir);

        if !root_dir.exists() {
            return Err(WasteNetError::Dataset(format!(
                "dataset directory does not exist: {:?}",
                root_dir
            )));
        }

        let mut class_dirs: Vec<String> = Vec::new();
        for entry in std::fs::read_dir(&root_dir)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    class_dirs.push(name.to_string());
                }
            }
        }
        class_dirs.sort();

        if class_dirs.is_empty() {
            return Err(WasteNetError::Dataset(format!(
                "no class directories found under {:?}",
                root_dir
            )));
        }

        let class_to_idx: HashMap<String, usize> = class_dirs
            .iter()
            .enumerate()
            .map(|(idx, name)| (name.clone(), idx))
            .collect();

        let mut samples = Vec::new();
        for class_name in &class_dirs {
            let class_dir = root_dir.join(class_name);
            let label = class_to_idx[class_name];
            let before = samples.len();

            for entry in WalkDir::new(&class_dir)
                .min_depth(1)
                .max_depth(1)
                .into_iter()
                .filter_map(|e| e.ok())
            {
                let path = entry.path().to_path_buf();
                if let Some(ext) = path.extension() {
                    let ext = ext.to_string_lossy().to_lowercase();
                    if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
                        samples.push(ImageSample {
                            path,
                            label,
                            class_name: class_name.clone(),
                        });
                    }
                }
            }

            debug!(
                "class '{}' (label {}): {} images",
                class_name,
                label,
                samples.len() - before
            );
        }

        info!(
            "found {} images across {} classes",
            samples.len(),
            class_dirs.len()
        );

        Ok(Self {
            root_dir,
            samples,
            class_to_idx,
            idx_to_class: class_dirs,
        })
    }

    /// Number of discovered samples
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether no samples were found
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Number of categories
    pub fn num_classes(&self) -> usize {
        self.idx_to_class.len()
    }

    /// Per-class sample counts and names
    pub fn stats(&self) -> DatasetStats {
        let mut class_counts = vec![0usize; self.num_classes()];
        for sample in &self.samples {
            class_counts[sample.label] += 1;
        }

        DatasetStats {
            total_samples: self.samples.len(),
            num_classes: self.num_classes(),
            class_counts,
            class_names: self.idx_to_class.clone(),
        }
    }
}

/// Summary statistics for a discovered dataset
#[derive(Debug, Clone)]
pub struct DatasetStats {
    pub total_samples: usize,
    pub num_classes: usize,
    pub class_counts: Vec<usize>,
    pub class_names: Vec<String>,
}

impl DatasetStats {
    /// Print a per-class breakdown to the console
    pub fn print(&self) {
        println!("\nDataset statistics:");
        println!("  total samples: {}", self.total_samples);
        println!("  classes:       {}", self.num_classes);
        println!("\n  samples per class:");

        for (idx, name) in self.class_names.iter().enumerate() {
            let count = self.class_counts[idx];
            let bar_len = if self.total_samples > 0 {
                (count as f32 / self.total_samples as f32 * 40.0) as usize
            } else {
                0
            };
            println!("    {:3}. {:12} {:5} {}", idx, name, count, "█".repeat(bar_len));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_tree(classes: &[(&str, usize)]) -> PathBuf {
        let root = std::env::temp_dir().join(format!(
            "wastenet_loader_test_{}_{:?}",
            std::process::id(),
            std::thread::current().id()
        ));
        let _ = std::fs::remove_dir_all(&root);
        for (name, count) in classes {
            let dir = root.join(name);
            std::fs::create_dir_all(&dir).unwrap();
            for i in 0..*count {
                // Content is never decoded by the loader, only discovered.
                std::fs::write(dir.join(format!("{}_{}.jpg", name, i)), b"stub").unwrap();
            }
        }
        root
    }

    #[test]
    fn test_scan_sorted_labels() {
        let root = make_tree(&[("glass", 2), ("cardboard", 3), ("trash", 1)]);
        let dataset = WasteFolderDataset::new(&root).unwrap();

        // Sorted directory order: cardboard < glass < trash
        assert_eq!(dataset.num_classes(), 3);
        assert_eq!(dataset.idx_to_class, vec!["cardboard", "glass", "trash"]);
        assert_eq!(dataset.len(), 6);

        let stats = dataset.stats();
        assert_eq!(stats.class_counts, vec![3, 2, 1]);

        std::fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn test_missing_directory_is_error() {
        let result = WasteFolderDataset::new("/nonexistent/wastenet/data");
        assert!(matches!(result, Err(WasteNetError::Dataset(_))));
    }

    #[test]
    fn test_non_image_files_skipped() {
        let root = make_tree(&[("metal", 2)]);
        std::fs::write(root.join("metal").join("notes.txt"), b"x").unwrap();

        let dataset = WasteFolderDataset::new(&root).unwrap();
        assert_eq!(dataset.len(), 2);

        std::fs::remove_dir_all(&root).unwrap();
    }
}
