use std::io::Write;
use std::path::{Path, PathBuf};

use log::info;
use tempfile::NamedTempFile;
use uuid::Uuid;

use crate::{Error, ImageStore, Result};

/// Default upper bound for a single image: 1 MiB.
pub const DEFAULT_MAX_IMAGE_BYTES: usize = 1 << 20;

/// Stores laptop images as files in a directory.
///
/// Each image is written to `<dir>/<image_id><image_type>` using an atomic
/// "write-then-rename" strategy: bytes go to a temporary file in the same
/// directory, which is renamed into place only once fully written. A failed
/// save leaves no file behind under the final name.
pub struct DiskImageStore {
    image_dir: PathBuf,
    max_image_bytes: usize,
}

impl DiskImageStore {
    /// Creates a store writing into `dir`, which must already exist.
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self> {
        Self::with_max_size(dir, DEFAULT_MAX_IMAGE_BYTES)
    }

    pub fn with_max_size<P: AsRef<Path>>(dir: P, max_image_bytes: usize) -> Result<Self> {
        let image_dir = dir.as_ref().to_path_buf();
        if !image_dir.is_dir() {
            return Err(Error::Internal(format!("image directory {:?} does not exist", image_dir)));
        }
        Ok(Self {
            image_dir,
            max_image_bytes,
        })
    }

    /// Path an image with the given ID and type is stored at.
    pub fn image_path(&self, image_id: &str, image_type: &str) -> PathBuf {
        self.image_dir.join(format!("{}{}", image_id, image_type))
    }
}

impl ImageStore for DiskImageStore {
    fn save(&self, laptop_id: &str, image_type: &str, chunks: &mut dyn Iterator<Item = Vec<u8>>) -> Result<String> {
        let mut data = Vec::new();
        for chunk in chunks {
            let size = data.len() + chunk.len();
            if size > self.max_image_bytes {
                return Err(Error::ImageTooLarge {
                    size,
                    max: self.max_image_bytes,
                });
            }
            data.extend_from_slice(&chunk);
        }

        let image_id = Uuid::new_v4().to_string();
        let file_path = self.image_path(&image_id, image_type);

        let mut temp = NamedTempFile::new_in(&self.image_dir)?;
        temp.write_all(&data)?;
        temp.as_file().sync_all()?;
        temp.persist(&file_path).map_err(|e| Error::Io(e.error))?;

        info!("saved image {} ({} bytes) for laptop {}", image_id, data.len(), laptop_id);
        Ok(image_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn file_count(dir: &Path) -> usize {
        fs::read_dir(dir).unwrap().count()
    }

    #[test]
    fn test_save_concatenates_chunks() {
        let dir = tempdir().unwrap();
        let store = DiskImageStore::new(dir.path()).unwrap();

        let chunks = vec![b"hello ".to_vec(), b"laptop ".to_vec(), b"image".to_vec()];
        let image_id = store.save("laptop-1", ".jpg", &mut chunks.into_iter()).unwrap();

        assert!(Uuid::parse_str(&image_id).is_ok());
        assert_ne!(image_id, "laptop-1");
        let path = dir.path().join(format!("{}.jpg", image_id));
        assert_eq!(fs::read(&path).unwrap(), b"hello laptop image");
        assert_eq!(file_count(dir.path()), 1);
    }

    #[test]
    fn test_each_save_gets_a_fresh_id() {
        let dir = tempdir().unwrap();
        let store = DiskImageStore::new(dir.path()).unwrap();

        let a = store.save("l", ".png", &mut vec![vec![1u8]].into_iter()).unwrap();
        let b = store.save("l", ".png", &mut vec![vec![1u8]].into_iter()).unwrap();
        assert_ne!(a, b);
        assert_eq!(file_count(dir.path()), 2);
    }

    #[test]
    fn test_oversized_image_leaves_no_file() {
        let dir = tempdir().unwrap();
        let store = DiskImageStore::with_max_size(dir.path(), 10).unwrap();

        let chunks = vec![vec![0u8; 6], vec![0u8; 6]];
        let res = store.save("l", ".jpg", &mut chunks.into_iter());

        assert!(matches!(res, Err(Error::ImageTooLarge { size: 12, max: 10 })));
        assert_eq!(file_count(dir.path()), 0);
    }

    #[test]
    fn test_image_at_exact_limit_is_accepted() {
        let dir = tempdir().unwrap();
        let store = DiskImageStore::with_max_size(dir.path(), 10).unwrap();

        let id = store.save("l", ".bin", &mut vec![vec![7u8; 10]].into_iter()).unwrap();
        assert_eq!(fs::metadata(store.image_path(&id, ".bin")).unwrap().len(), 10);
    }

    #[test]
    fn test_missing_directory_is_not_created() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("nested").join("img");

        assert!(DiskImageStore::new(&missing).is_err());
        assert!(!missing.exists());
    }
}
