use std::{
    io::Write,
    path::{Path, PathBuf},
};

use tracing::info;

use crate::{
    database::DocumentStore,
    result::{Error, Result},
    types::RunMetadata,
};

/// A durable destination for the metadata of a run
pub trait MetadataSink: Sync {
    fn persist(&self, run_name: &str, metadata: &RunMetadata) -> Result<()>;
}

/// Writes the metadata of a run as a pretty-printed JSON array in `<dir>/<name>.json`
#[derive(Debug)]
pub struct JsonFileSink {
    dir: PathBuf,
}

impl JsonFileSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_of(&self, run_name: &str) -> PathBuf {
        self.dir.join(format!("{run_name}.json"))
    }

    /// Read back the metadata of a run
    pub fn load(path: &Path) -> Result<RunMetadata> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

impl MetadataSink for JsonFileSink {
    fn persist(&self, run_name: &str, metadata: &RunMetadata) -> Result<()> {
        let path = self.path_of(run_name);
        let write = || -> Result<()> {
            std::fs::create_dir_all(&self.dir)?;

            // The previous file is only replaced once the new one is complete
            let mut tmp = tempfile::Builder::new()
                .prefix(".metadata-")
                .tempfile_in(&self.dir)?;
            serde_json::to_writer_pretty(&mut tmp, metadata)?;
            tmp.write_all(b"\n")?;
            tmp.flush()?;
            tmp.persist(&path).map_err(|err| Error::Io(err.error))?;
            Ok(())
        };

        write().map_err(|err| {
            Error::Persistence(format!("could not write '{}': {err}", path.display()))
        })?;

        info!("Metadata of {} videos written to '{}'", metadata.len(), path.display());
        Ok(())
    }
}

/// Inserts the metadata of a run into the `metadata` collection of a document store
pub struct StoreSink<'a> {
    store: &'a dyn DocumentStore,
}

impl<'a> StoreSink<'a> {
    pub fn new(store: &'a dyn DocumentStore) -> Self {
        Self { store }
    }
}

impl MetadataSink for StoreSink<'_> {
    fn persist(&self, run_name: &str, metadata: &RunMetadata) -> Result<()> {
        for descriptor in metadata {
            self.store
                .insert_metadata(run_name, descriptor)
                .map_err(|err| {
                    Error::Persistence(format!(
                        "could not store the metadata of video {}: {err}",
                        descriptor.id
                    ))
                })?;
        }

        info!("Metadata of {} videos stored", metadata.len());
        Ok(())
    }
}
