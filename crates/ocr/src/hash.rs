use sha2::{Digest, Sha256};
use std::io;
use std::path::{Path, PathBuf};

/// Compute SHA-256 of an in-memory byte slice.
pub fn sha256_bytes(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Encode a raw 32-byte hash as a lowercase hex string (64 chars).
pub fn to_hex(hash: &[u8; 32]) -> String {
    hash.iter().map(|b| format!("{b:02x}")).collect()
}

/// Derive the content-addressed storage path for a given hash.
/// Layout: `<base>/<first_2_hex_chars>/<full_hex>.<ext>`
pub fn image_path(images_dir: &Path, hash_hex: &str, ext: &str) -> PathBuf {
    images_dir
        .join(&hash_hex[..2])
        .join(format!("{hash_hex}.{}", normalize_ext(ext)))
}

fn normalize_ext(ext: &str) -> String {
    let ext = ext.trim_start_matches('.').to_ascii_lowercase();
    if ext.is_empty() || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        "bin".to_string()
    } else {
        ext
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredImage {
    pub hash_hex: String,
    pub path: PathBuf,
}

/// Card photos stored once per distinct content.
#[derive(Debug, Clone)]
pub struct ImageStore {
    images_dir: PathBuf,
}

impl ImageStore {
    pub fn new(images_dir: PathBuf) -> Self {
        Self { images_dir }
    }

    /// Write `data` under its content hash. Storing the same bytes twice is a no-op.
    pub async fn store(&self, data: &[u8], ext: &str) -> io::Result<StoredImage> {
        let hash_hex = to_hex(&sha256_bytes(data));
        let path = image_path(&self.images_dir, &hash_hex, ext);

        if tokio::fs::try_exists(&path).await? {
            tracing::debug!("Image already stored: {}", path.display());
        } else {
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(&path, data).await?;
        }

        Ok(StoredImage { hash_hex, path })
    }
}
