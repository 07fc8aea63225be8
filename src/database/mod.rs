mod sqlite;

use std::path::Path;

use crate::{result::Result, types::VideoDescriptor};

pub use sqlite::Sqlite;

/// Identifier of a stored document.
///
/// This identifier **must** be unique for each document of a collection.
pub type DocumentId = i64;

/// An image stored in the `images` collection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredImage {
    pub id: DocumentId,
    pub video_id: String,
    pub name: String,
    pub image: Vec<u8>,
}

/// A store of documents that outlives the runs.
///
/// It holds two collections: `images`, the raw sampled frames keyed by video id,
/// and `metadata`, the descriptors produced by the runs.
/// It is what the browsing and curation surfaces consume.
pub trait DocumentStore
where
    Self: Sync,
{
    /// Open the store at the given path or create it if it does not exist.
    ///
    /// If the file does exist but does not correspond to a valid store,
    /// an error **should** be returned.
    fn open(p: &Path) -> Result<Self>
    where
        Self: Sized;

    /// Insert an image of the video and return its identifier.
    /// An image of the video with the same name is replaced.
    fn insert_image(&self, video_id: &str, name: &str, image: &[u8]) -> Result<DocumentId>;

    /// Replace every image of the video by the given `(name, image)` pairs, atomically.
    /// Return the identifiers of the new images, in order.
    fn replace_images(
        &self,
        video_id: &str,
        images: &[(String, Vec<u8>)],
    ) -> Result<Vec<DocumentId>>;

    /// Get all the images of the video, in insertion order
    fn find_images(&self, video_id: &str) -> Result<Vec<StoredImage>>;

    /// Count the images of the video
    fn count_images(&self, video_id: &str) -> Result<usize>;

    /// Delete an image.
    /// Return whether an image with this identifier existed.
    fn delete_image(&self, id: DocumentId) -> Result<bool>;

    /// Insert the descriptor produced by a run and return its identifier.
    /// The descriptor of the same video from a previous run of the same name is replaced.
    fn insert_metadata(&self, run: &str, descriptor: &VideoDescriptor) -> Result<DocumentId>;

    /// Get the stored descriptors of the video, one per run, oldest first
    fn find_metadata(&self, video_id: &str) -> Result<Vec<VideoDescriptor>>;
}
