//! Save archive reader.
//!
//! A Stellaris `.sav` file is a zip archive with a `meta` entry and a `gamestate`
//! entry. Only `gamestate` is read.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use tracing::debug;
use zip::ZipArchive;

use crate::error::Error;

/// Name of the archive entry holding the save document.
pub const GAMESTATE_ENTRY: &str = "gamestate";

/// Read the raw bytes of the `gamestate` entry of a save archive.
///
/// Every entry is scanned since the entry order is not fixed. The archive
/// handle is dropped on every return path.
pub fn read_gamestate(path: &Path) -> Result<Vec<u8>, Error> {
    let file = File::open(path)?;
    let mut archive = ZipArchive::new(BufReader::new(file))?;

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        if entry.name() != GAMESTATE_ENTRY {
            continue;
        }

        let mut buffer = Vec::new();
        entry.read_to_end(&mut buffer)?;
        debug!(path = %path.display(), bytes = buffer.len(), "Read gamestate entry");
        return Ok(buffer);
    }

    Err(Error::GamestateEntryNotFound(path.to_path_buf()))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;
    use zip::CompressionMethod;

    /// Write a zip archive with the given entries.
    pub(crate) fn write_archive(path: &Path, entries: &[(&str, &[u8])]) {
        let file = File::create(path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        for (name, data) in entries {
            writer.start_file(*name, options).unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap();
    }

    #[test]
    fn test_reads_gamestate_when_not_first() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ironman.sav");
        write_archive(
            &path,
            &[("meta", b"version=\"v3.12\""), ("gamestate", b"date=\"2200.01.01\"")],
        );

        let bytes = read_gamestate(&path).unwrap();
        assert_eq!(bytes, b"date=\"2200.01.01\"");
    }

    #[test]
    fn test_declared_size_not_trusted() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ironman.sav");
        write_archive(&path, &[("gamestate", b"date=\"2200.01.01\"")]);

        // Inflate the uncompressed size recorded in the central directory.
        let mut bytes = std::fs::read(&path).unwrap();
        let header = bytes
            .windows(4)
            .position(|window| window == b"PK\x01\x02")
            .unwrap();
        bytes[header + 24..header + 28].copy_from_slice(&0xFFFF_FFF0u32.to_le_bytes());
        std::fs::write(&path, &bytes).unwrap();

        let bytes = read_gamestate(&path).unwrap();
        assert_eq!(bytes, b"date=\"2200.01.01\"");
    }

    #[test]
    fn test_missing_entry() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.sav");
        write_archive(&path, &[("meta", b"x=1"), ("gamestate.bak", b"x=2")]);

        let result = read_gamestate(&path);
        assert!(matches!(result, Err(Error::GamestateEntryNotFound(p)) if p == path));
    }

    #[test]
    fn test_not_a_zip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("plain.sav");
        std::fs::write(&path, b"date=\"2200.01.01\"").unwrap();

        assert!(matches!(read_gamestate(&path), Err(Error::Archive(_))));
    }

    #[test]
    fn test_missing_file() {
        let dir = TempDir::new().unwrap();
        let result = read_gamestate(&dir.path().join("nope.sav"));
        assert!(matches!(result, Err(Error::Io(_))));
    }
}
