use std::{path::Path, sync::Mutex};

use indoc::indoc;
use rusqlite::{params, Connection};
use tracing::debug;

use super::{DocumentId, DocumentStore, StoredImage};
use crate::{
    result::{Error, Result},
    types::VideoDescriptor,
    utils::MutexUtils,
};

/// Insert an image, replacing the one of the same video with the same name
const UPSERT_IMAGE: &str = "INSERT INTO images (video_id, name, image)
    VALUES (?, ?, ?)
    ON CONFLICT (video_id, name) DO UPDATE SET image = excluded.image
    RETURNING id";

#[derive(Debug)]
pub struct Sqlite {
    conn: Mutex<Connection>,
}

impl DocumentStore for Sqlite {
    fn open(p: &Path) -> Result<Self> {
        let store = Self {
            conn: Mutex::new(Connection::open(p)?),
        };

        store.create_tables()?;

        Ok(store)
    }

    fn insert_image(&self, video_id: &str, name: &str, image: &[u8]) -> Result<DocumentId> {
        debug!("Storing image '{name}' of video {video_id}");
        self.conn.with_lock(|conn| {
            Ok(conn.query_row(UPSERT_IMAGE, params![video_id, name, image], |row| row.get(0))?)
        })
    }

    fn replace_images(
        &self,
        video_id: &str,
        images: &[(String, Vec<u8>)],
    ) -> Result<Vec<DocumentId>> {
        debug!("Replacing the images of video {video_id} by {} new ones", images.len());
        self.conn.with_lock(|mut conn| {
            let tx = conn.transaction()?;
            tx.execute("DELETE FROM images WHERE video_id = ?", [video_id])?;

            let mut ids = Vec::with_capacity(images.len());
            {
                let mut stmt = tx.prepare(UPSERT_IMAGE)?;
                for (name, image) in images {
                    ids.push(stmt.query_row(params![video_id, name, image], |row| row.get(0))?);
                }
            }

            tx.commit()?;
            Ok(ids)
        })
    }

    fn find_images(&self, video_id: &str) -> Result<Vec<StoredImage>> {
        self.conn.with_lock(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, video_id, name, image FROM images
                WHERE video_id = ?
                ORDER BY id",
            )?;

            let images = stmt
                .query_map([video_id], |row| {
                    Ok(StoredImage {
                        id: row.get(0)?,
                        video_id: row.get(1)?,
                        name: row.get(2)?,
                        image: row.get(3)?,
                    })
                })?
                .collect::<rusqlite::Result<_>>()?;
            Ok(images)
        })
    }

    fn count_images(&self, video_id: &str) -> Result<usize> {
        self.conn.with_lock(|conn| {
            Ok(conn.query_row(
                "SELECT COUNT(id) FROM images WHERE video_id = ?",
                [video_id],
                |row| row.get(0),
            )?)
        })
    }

    fn delete_image(&self, id: DocumentId) -> Result<bool> {
        debug!("Deleting image {id}");
        self.conn
            .with_lock(|conn| Ok(conn.execute("DELETE FROM images WHERE id = ?", [id])? > 0))
    }

    fn insert_metadata(&self, run: &str, descriptor: &VideoDescriptor) -> Result<DocumentId> {
        let record = serde_json::to_string(descriptor)?;
        self.conn.with_lock(|conn| {
            Ok(conn.query_row(
                "INSERT INTO metadata (run, video_id, record)
                VALUES (?, ?, ?)
                ON CONFLICT (run, video_id) DO UPDATE SET record = excluded.record
                RETURNING id",
                params![run, descriptor.id, record],
                |row| row.get(0),
            )?)
        })
    }

    fn find_metadata(&self, video_id: &str) -> Result<Vec<VideoDescriptor>> {
        let records: Vec<String> = self.conn.with_lock(|conn| {
            let mut stmt =
                conn.prepare("SELECT record FROM metadata WHERE video_id = ? ORDER BY id")?;
            let records = stmt
                .query_map([video_id], |row| row.get(0))?
                .collect::<rusqlite::Result<_>>()?;
            Ok::<_, Error>(records)
        })?;

        records
            .iter()
            .map(|record| serde_json::from_str(record).map_err(Error::from))
            .collect()
    }
}

impl Sqlite {
    /// Create the tables if they do not already exist
    fn create_tables(&self) -> Result<()> {
        self.conn.with_lock(|conn| {
            conn.execute_batch(indoc! {"
                BEGIN;
                CREATE TABLE IF NOT EXISTS images (
                    id          INTEGER PRIMARY KEY,
                    video_id    TEXT NOT NULL,
                    name        TEXT NOT NULL,
                    image       BLOB NOT NULL
                );
                CREATE UNIQUE INDEX IF NOT EXISTS images_video_name ON images (video_id, name);
                CREATE TABLE IF NOT EXISTS metadata (
                    id          INTEGER PRIMARY KEY,
                    run         TEXT NOT NULL,
                    video_id    TEXT NOT NULL,
                    record      TEXT NOT NULL
                );
                CREATE UNIQUE INDEX IF NOT EXISTS metadata_run_video ON metadata (run, video_id);
                CREATE INDEX IF NOT EXISTS metadata_video_id ON metadata (video_id);
                COMMIT;
            "})?;
            Ok(())
        })
    }
}
