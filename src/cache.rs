use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha512};

use crate::dwarf::die::{CompilationUnit, Die};
use crate::header::FileHeader;
use crate::section::{Note, Section};
use crate::segment::ProgramSegment;
use crate::symbol::Symbol;
use crate::Error;

/// The schema version of the store. Bumped whenever a row layout changes; an on-disk cache with
/// a different marker is discarded and rebuilt.
pub const SCHEMA_VERSION: u32 = 3;

/// The extension of the cache file placed next to the input file.
pub const CACHE_EXTENSION: &str = "prgdb";

/// This structure is the meta row of the store: the schema marker and the SHA-512 of the input
/// bytes. Both gate reuse; either mismatching triggers a rebuild.
#[derive(Clone, Eq, PartialEq, Debug, Serialize, Deserialize)]
pub struct CacheMeta {
    pub schema_version: u32,
    pub file_hash: String,
}

/// This structure is the serialised model of one parsed ELF file: the header row, one row per
/// section (images included), segment, symbol and note, the `.comment` text and, once the DWARF
/// pipeline has run, the compilation units and one row per DIE with its flat attribute list.
/// Integers are stored in a fixed host-independent layout by the codec; the cache still is not
/// meant to travel between machines.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct CachedModel {
    pub meta: CacheMeta,
    pub header: FileHeader,
    pub sections: Vec<Section>,
    pub segments: Vec<ProgramSegment>,
    pub symbols: Vec<Symbol>,
    pub notes: Vec<Note>,
    pub comment: String,
    pub units: Vec<CompilationUnit>,
    pub dies: Vec<Die>,
}

/// This function computes the cache key: the SHA-512 over the exact file bytes, rendered as a
/// hex string. Hashing the bytes (not the mapping) keeps sparse-file edge cases out of the key.
pub fn file_hash(data: &[u8]) -> String {
    let mut hasher = Sha512::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// This function returns the conventional cache path next to the input file.
pub fn sibling_path(elf_path: &Path) -> PathBuf {
    elf_path.with_extension(CACHE_EXTENSION)
}

/// This function opens an existing cache file and validates it against the expected input hash.
///
/// Here is a list with all errors, which can occur while this operation:
/// - [Error::Io] - The cache file is absent or unreadable
/// - [Error::CacheSchemaMismatch] - The rows do not decode or the schema marker differs
/// - [Error::CacheHashMismatch] - The cache was built from different input bytes
pub fn load(path: &Path, expected_hash: &str) -> Result<CachedModel, Error> {
    let bytes = fs::read(path)?;
    let (model, _): (CachedModel, usize) =
        bincode::serde::decode_from_slice(&bytes, bincode::config::standard())
            .map_err(|_| Error::CacheSchemaMismatch)?;
    if model.meta.schema_version != SCHEMA_VERSION {
        return Err(Error::CacheSchemaMismatch);
    }
    if model.meta.file_hash != expected_hash {
        return Err(Error::CacheHashMismatch);
    }
    Ok(model)
}

/// This function writes the model in one batch: everything is serialised into a temporary
/// sibling file which then atomically replaces the cache. A crashed writer leaves either the
/// old cache or none, never a torn one.
pub fn store(path: &Path, model: &CachedModel) -> Result<(), Error> {
    let bytes = bincode::serde::encode_to_vec(model, bincode::config::standard())
        .map_err(|error| Error::Io(std::io::Error::new(ErrorKind::Other, error)))?;
    let temp_path = path.with_extension("prgdb.tmp");
    fs::write(&temp_path, &bytes)?;
    fs::rename(&temp_path, path)?;
    Ok(())
}

/// This function removes a stale cache file. A file that is already gone is fine.
pub fn remove_stale(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => tracing::debug!(path = %path.display(), "removed stale cache"),
        Err(error) if error.kind() == ErrorKind::NotFound => {}
        Err(error) => tracing::warn!(path = %path.display(), %error, "could not remove stale cache"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_hash_is_the_hex_sha512_of_the_input() {
        // SHA-512 of the empty string, a fixed vector.
        assert_eq!(
            file_hash(b""),
            "cf83e1357eefb8bdf1542850d66d8007d620e4050b5715dc83f4a921d36ce9ce\
             47d0d13c5d85f2b0ff8318d2877eec2f63b931bd47417a81a538327af927da3e"
        );
        assert_ne!(file_hash(b"a"), file_hash(b"b"));
    }

    #[test]
    fn sibling_path_swaps_the_extension() {
        assert_eq!(
            sibling_path(Path::new("/tmp/firmware.elf")),
            PathBuf::from("/tmp/firmware.prgdb")
        );
    }
}
