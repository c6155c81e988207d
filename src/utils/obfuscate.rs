//! Single-byte XOR obfuscation of a file, in place.
//!
//! XOR with a constant key is its own inverse: applying the pass twice
//! restores the original bytes, and the length never changes.

use crate::config::types::{ProcError, Result};
use std::fs::OpenOptions;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

/// Fixed key of the cipher
pub const XOR_KEY: u8 = 0x5A;

/// XOR every byte with [`XOR_KEY`]
pub fn xor_in_place(bytes: &mut [u8]) {
    for b in bytes.iter_mut() {
        *b ^= XOR_KEY;
    }
}

/// Cipher `file_path` in place and return the number of bytes processed.
///
/// The whole file is read, transformed in memory and written back from
/// offset 0 over the same handle, so the length is preserved without a
/// truncate.
pub fn xor_cipher_file(file_path: &Path) -> Result<u64> {
    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(file_path)
        .map_err(|e| {
            ProcError::Filesystem(format!(
                "cannot open {} for ciphering: {}",
                file_path.display(),
                e
            ))
        })?;

    let mut data = Vec::new();
    file.read_to_end(&mut data)?;
    xor_in_place(&mut data);

    file.seek(SeekFrom::Start(0))?;
    file.write_all(&data)?;
    file.flush()?;

    Ok(data.len() as u64)
}
