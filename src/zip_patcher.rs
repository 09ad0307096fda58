//! Patch a ZIP archive with replacement entries.
//!
//! Unmodified entries are copied via `raw_copy_file` (zero recompression cost).
//! Only replaced entries are compressed again. Both the host package and the
//! embedded workbooks are saved through here.

use std::collections::{BTreeMap, HashSet};
use std::io::{Cursor, Write};
use zip::write::FileOptions;
use zip::{ZipArchive, ZipWriter};

use crate::error::Result;

/// Rewrite `original_data`, replacing the entries named in `replacements`.
///
/// Entry order is preserved. Replacements naming an entry the archive does
/// not have are appended at the end.
pub(crate) fn patch_zip(
    original_data: &[u8],
    replacements: &BTreeMap<String, Vec<u8>>,
) -> Result<Vec<u8>> {
    let mut archive = ZipArchive::new(Cursor::new(original_data))?;

    let buf: Vec<u8> = Vec::with_capacity(original_data.len());
    let mut writer = ZipWriter::new(Cursor::new(buf));
    let options = FileOptions::default().compression_method(zip::CompressionMethod::Deflated);
    let mut written: HashSet<String> = HashSet::new();

    for i in 0..archive.len() {
        let entry = archive.by_index_raw(i)?;
        let name = entry.name().to_string();

        if let Some(bytes) = replacements.get(&name) {
            writer.start_file(name.as_str(), options)?;
            writer.write_all(bytes)?;
            written.insert(name);
            continue;
        }

        // Pass through unmodified entry (raw copy, no re-compression)
        writer.raw_copy_file(entry)?;
    }

    for (name, bytes) in replacements {
        if !written.contains(name) {
            writer.start_file(name.as_str(), options)?;
            writer.write_all(bytes)?;
        }
    }

    let cursor = writer.finish()?;
    Ok(cursor.into_inner())
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic
)]
mod tests {
    use super::*;
    use std::io::Read;

    fn build(files: &[(&str, &str)]) -> Vec<u8> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, content) in files {
            zip.start_file(*name, FileOptions::default()).unwrap();
            zip.write_all(content.as_bytes()).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }

    fn read(data: &[u8], name: &str) -> String {
        let mut archive = ZipArchive::new(Cursor::new(data)).unwrap();
        let mut out = String::new();
        archive.by_name(name).unwrap().read_to_string(&mut out).unwrap();
        out
    }

    #[test]
    fn test_replaces_and_keeps_order() {
        let original = build(&[("a.xml", "<a/>"), ("b.xml", "<b/>"), ("c.xml", "<c/>")]);
        let replacements = BTreeMap::from([("b.xml".to_string(), b"<b>new</b>".to_vec())]);
        let patched = patch_zip(&original, &replacements).unwrap();

        assert_eq!(read(&patched, "a.xml"), "<a/>");
        assert_eq!(read(&patched, "b.xml"), "<b>new</b>");
        let archive = ZipArchive::new(Cursor::new(patched.as_slice())).unwrap();
        let names: Vec<_> = archive.file_names().collect();
        assert_eq!(names.len(), 3);
    }

    #[test]
    fn test_appends_new_entries() {
        let original = build(&[("a.xml", "<a/>")]);
        let replacements = BTreeMap::from([("new/part.bin".to_string(), b"xyz".to_vec())]);
        let patched = patch_zip(&original, &replacements).unwrap();
        assert_eq!(read(&patched, "new/part.bin"), "xyz");
        assert_eq!(read(&patched, "a.xml"), "<a/>");
    }
}
