use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::Result;

const STORE_MAGIC: &str = "kira-ceiling-store";
const STORE_VERSION: u32 = 1;

#[derive(Debug, Clone)]
pub struct ResultStore {
    root: PathBuf,
}

#[derive(Serialize, Deserialize)]
struct Envelope<T> {
    format: String,
    version: u32,
    function: String,
    identifier: String,
    payload: T,
}

impl ResultStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, function: &str, identifier: &str) -> PathBuf {
        let mut hasher = Fnv64::new();
        hasher.update(function.as_bytes());
        hasher.update(&[0]);
        hasher.update(identifier.as_bytes());
        self.root
            .join(function)
            .join(format!("{:016x}.json", hasher.finish()))
    }

    pub fn load<T: DeserializeOwned>(&self, function: &str, identifier: &str) -> Result<Option<T>> {
        let path = self.path_for(function, identifier);
        if !path.exists() {
            return Ok(None);
        }
        let reader = BufReader::new(File::open(&path)?);
        let envelope: Envelope<T> = match serde_json::from_reader(reader) {
            Ok(envelope) => envelope,
            Err(e) => {
                debug!("store: ignoring unreadable {}: {e}", path.display());
                return Ok(None);
            }
        };
        if envelope.format != STORE_MAGIC
            || envelope.version != STORE_VERSION
            || envelope.function != function
            || envelope.identifier != identifier
        {
            return Ok(None);
        }
        Ok(Some(envelope.payload))
    }

    pub fn save<T: Serialize>(&self, function: &str, identifier: &str, payload: &T) -> Result<()> {
        let path = self.path_for(function, identifier);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let envelope = Envelope {
            format: STORE_MAGIC.to_string(),
            version: STORE_VERSION,
            function: function.to_string(),
            identifier: identifier.to_string(),
            payload,
        };
        let tmp = path.with_extension("json.tmp");
        let mut w = BufWriter::new(File::create(&tmp)?);
        serde_json::to_writer(&mut w, &envelope)?;
        w.flush()?;
        drop(w);
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    pub fn get_or_compute<T, F>(&self, function: &str, identifier: &str, compute: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Result<T>,
    {
        if let Some(hit) = self.load(function, identifier)? {
            info!("store: reusing `{function}` for `{identifier}`");
            return Ok(hit);
        }
        let value = compute()?;
        self.save(function, identifier, &value)?;
        Ok(value)
    }
}

struct Fnv64 {
    hash: u64,
}

impl Fnv64 {
    fn new() -> Self {
        Self {
            hash: 0xcbf29ce484222325,
        }
    }

    fn update(&mut self, data: &[u8]) {
        let mut h = self.hash;
        for &b in data {
            h ^= b as u64;
            h = h.wrapping_mul(0x100000001b3);
        }
        self.hash = h;
    }

    fn finish(&self) -> u64 {
        self.hash
    }
}

#[cfg(test)]
#[path = "../tests/src_inline/store.rs"]
mod tests;
