//! Object storage for uploaded blobs.
//!
//! Asset files and profile pictures are stored under string keys in an
//! S3-compatible bucket. Clients never download through the API; they get a
//! presigned link instead.

mod s3;

pub use s3::S3ObjectStore;

use async_trait::async_trait;

use crate::{HangarError, Result};

const MIB: u64 = 1024 * 1024;

/// Upload cap of the free tier.
pub const FREE_TIER_LIMIT: u64 = 50 * MIB;
/// Upload cap of the paid tier.
pub const PAID_TIER_LIMIT: u64 = 150 * MIB;
/// Upload cap of administrators.
pub const ADMIN_LIMIT: u64 = 150 * MIB;
/// Upload cap of profile pictures.
pub const PICTURE_LIMIT: u64 = 5 * MIB;

/// Tier name used for profile pictures.
pub const PICTURE_TIER: &str = "picture";

/// Blob store used by the repositories.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Upload `data` under `key` and wait until the object is visible.
    async fn put(&self, key: &str, data: Vec<u8>, content_type: Option<&str>) -> Result<()>;

    /// Produce a time-limited download link.
    ///
    /// Fails with `ObjectNotFound` when nothing is stored under `key`.
    async fn get_link(&self, key: &str) -> Result<String>;

    /// Remove the object and wait until it is gone.
    async fn delete(&self, key: &str) -> Result<()>;
}

/// An uploaded file, as read from a multipart body.
#[derive(Debug, Clone)]
pub struct Upload {
    /// File contents.
    pub data: Vec<u8>,
    /// Content type sent by the client or guessed from the file name.
    pub content_type: Option<String>,
}

impl Upload {
    /// Create an upload from raw bytes.
    pub fn new(data: Vec<u8>, content_type: Option<String>) -> Self {
        Self { data, content_type }
    }

    /// Size in bytes.
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

/// Byte cap for `tier`. Unknown tiers get the free-tier cap.
pub fn tier_limit(tier: &str) -> u64 {
    match tier {
        "paidtier" => PAID_TIER_LIMIT,
        "admin" => ADMIN_LIMIT,
        PICTURE_TIER => PICTURE_LIMIT,
        _ => FREE_TIER_LIMIT,
    }
}

/// Reject uploads larger than the cap of `tier`.
pub fn check_file_size(size: u64, tier: &str) -> Result<()> {
    let limit = tier_limit(tier);
    if size > limit {
        return Err(HangarError::ObjectTooLarge { size, limit });
    }
    Ok(())
}

/// Object key of an asset file.
pub fn asset_key(asset_id: i64) -> String {
    format!("asset-{asset_id}")
}

/// Object key of a profile picture.
pub fn picture_key(user_id: impl std::fmt::Display) -> String {
    format!("user-picture-{user_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_free_tier_boundary() {
        assert!(check_file_size(50 * MIB, "freetier").is_ok());
        let err = check_file_size(51 * MIB, "freetier").unwrap_err();
        assert!(matches!(
            err,
            HangarError::ObjectTooLarge { limit, .. } if limit == FREE_TIER_LIMIT
        ));
    }

    #[test]
    fn test_paid_and_admin_tiers() {
        assert!(check_file_size(150 * MIB, "paidtier").is_ok());
        assert!(check_file_size(150 * MIB + 1, "paidtier").is_err());
        assert!(check_file_size(150 * MIB, "admin").is_ok());
    }

    #[test]
    fn test_picture_tier() {
        assert!(check_file_size(5 * MIB, PICTURE_TIER).is_ok());
        assert!(check_file_size(6 * MIB, PICTURE_TIER).is_err());
    }

    #[test]
    fn test_unknown_tier_is_free() {
        assert_eq!(tier_limit("gold"), FREE_TIER_LIMIT);
    }

    #[test]
    fn test_keys() {
        assert_eq!(asset_key(12), "asset-12");
        assert_eq!(picture_key("abc"), "user-picture-abc");
    }
}
