//! Persisted Configuration Storage
//!
//! Journals the config-token registry to disk across three rotating files
//! with a trailing CRC32, grounded on `sd_persistence.cpp`'s NVM layer: each
//! write copies the current generation's bytes into the next file index,
//! applies the new values, writes the file, then deletes the generation two
//! indices back. At least one fully-written generation always survives a
//! crash mid-write.

use anyhow::{Context, Result};
use crc32fast::Hasher;
use mc_proto::commands::ConfigValue;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

const FILE_COUNT: usize = 3;
const CRC_LEN: usize = 4;
const VALUE_LEN: usize = 4;

fn filename(dir: &Path, index: usize) -> PathBuf {
    dir.join(format!("persist{index}.bin"))
}

/// A fixed-length token table journaled to `dir/persist{0,1,2}.bin`.
pub struct PersistenceStore {
    dir: PathBuf,
    current_index: usize,
}

impl PersistenceStore {
    /// Opens (creating if absent) the persistence directory and locates the
    /// most recently written, CRC-valid generation.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).with_context(|| format!("creating persistence dir {:?}", dir))?;

        let mut best: Option<(usize, std::time::SystemTime)> = None;
        for index in 0..FILE_COUNT {
            let path = filename(&dir, index);
            let Ok(meta) = fs::metadata(&path) else { continue };
            if read_file(&path).is_err() {
                continue;
            }
            let modified = meta.modified().unwrap_or(std::time::UNIX_EPOCH);
            if best.map(|(_, t)| modified > t).unwrap_or(true) {
                best = Some((index, modified));
            }
        }

        Ok(Self { dir, current_index: best.map(|(i, _)| i).unwrap_or(0) })
    }

    /// Loads the tokens from the current generation, or `None` if no valid
    /// generation exists yet (first boot).
    pub fn load(&self) -> Result<Option<BTreeMap<String, ConfigValue>>> {
        let path = filename(&self.dir, self.current_index);
        match read_file(&path) {
            Ok(bytes) => Ok(Some(decode_tokens(&bytes)?)),
            Err(_) => Ok(None),
        }
    }

    /// Writes `tokens` to the next rotating file, then deletes the
    /// generation that falls out of the three-file window.
    pub fn save(&mut self, tokens: &BTreeMap<String, ConfigValue>) -> Result<()> {
        let next_index = (self.current_index + 1) % FILE_COUNT;
        let stale_index = (next_index + 1) % FILE_COUNT;

        let bytes = encode_tokens(tokens);
        let path = filename(&self.dir, next_index);
        fs::write(&path, &bytes).with_context(|| format!("writing {:?}", path))?;

        let stale_path = filename(&self.dir, stale_index);
        let _ = fs::remove_file(&stale_path);

        self.current_index = next_index;
        Ok(())
    }
}

fn read_file(path: &Path) -> Result<Vec<u8>> {
    let bytes = fs::read(path)?;
    if bytes.len() < CRC_LEN {
        anyhow::bail!("persistence file too short: {:?}", path);
    }
    let (body, trailer) = bytes.split_at(bytes.len() - CRC_LEN);
    let stored_crc = u32::from_be_bytes(trailer.try_into().expect("CRC_LEN is 4"));
    let mut hasher = Hasher::new();
    hasher.update(body);
    if hasher.finalize() != stored_crc {
        anyhow::bail!("persistence CRC mismatch: {:?}", path);
    }
    Ok(bytes)
}

fn encode_tokens(tokens: &BTreeMap<String, ConfigValue>) -> Vec<u8> {
    let mut body = Vec::with_capacity(tokens.len() * (4 + 1 + VALUE_LEN) + CRC_LEN);
    for (token, value) in tokens {
        let mut name = [0u8; 4];
        for (slot, b) in name.iter_mut().zip(token.as_bytes().iter().take(4)) {
            *slot = *b;
        }
        body.extend_from_slice(&name);
        let (tag, bytes) = value.to_wire();
        body.push(tag);
        body.extend_from_slice(&bytes);
    }
    let mut hasher = Hasher::new();
    hasher.update(&body);
    body.extend_from_slice(&hasher.finalize().to_be_bytes());
    body
}

fn decode_tokens(bytes: &[u8]) -> Result<BTreeMap<String, ConfigValue>> {
    let body = &bytes[..bytes.len() - CRC_LEN];
    const SLOT_LEN: usize = 4 + 1 + VALUE_LEN;
    let mut tokens = BTreeMap::new();
    for slot in body.chunks_exact(SLOT_LEN) {
        let name_end = slot[..4].iter().position(|&b| b == 0).unwrap_or(4);
        let token = String::from_utf8_lossy(&slot[..name_end]).into_owned();
        let tag = slot[4];
        let mut value_bytes = [0u8; VALUE_LEN];
        value_bytes.copy_from_slice(&slot[5..5 + VALUE_LEN]);
        if let Some(value) = ConfigValue::from_wire(tag, value_bytes) {
            tokens.insert(token, value);
        }
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_a_fresh_directory() {
        let dir = std::env::temp_dir().join(format!("mc-host-persist-test-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        let mut store = PersistenceStore::open(&dir).unwrap();
        assert!(store.load().unwrap().is_none());

        let mut tokens = BTreeMap::new();
        tokens.insert("xvm".to_string(), ConfigValue::Float(1500.0));
        tokens.insert("1mi".to_string(), ConfigValue::Int(32));
        store.save(&tokens).unwrap();

        let reopened = PersistenceStore::open(&dir).unwrap();
        let loaded = reopened.load().unwrap().unwrap();
        assert_eq!(loaded.get("xvm"), Some(&ConfigValue::Float(1500.0)));
        assert_eq!(loaded.get("1mi"), Some(&ConfigValue::Int(32)));

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn a_corrupted_generation_still_leaves_an_older_one_readable() {
        let dir = std::env::temp_dir().join(format!("mc-host-persist-test-corrupt-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        let mut store = PersistenceStore::open(&dir).unwrap();

        let mut tokens = BTreeMap::new();
        tokens.insert("xvm".to_string(), ConfigValue::Float(900.0));
        store.save(&tokens).unwrap();
        tokens.insert("xvm".to_string(), ConfigValue::Float(950.0));
        store.save(&tokens).unwrap();

        // Corrupt the just-written (current) generation's trailing CRC.
        let path = filename(&dir, store.current_index);
        let mut bytes = fs::read(&path).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        fs::write(&path, bytes).unwrap();

        let reopened = PersistenceStore::open(&dir).unwrap();
        let loaded = reopened.load().unwrap().unwrap();
        assert_eq!(loaded.get("xvm"), Some(&ConfigValue::Float(900.0)));

        fs::remove_dir_all(&dir).ok();
    }
}
