use super::models::{EraseError, FillPattern, Node};
use super::provider::ContentProviderOperations;
use rand::RngCore;
use std::io::{Seek, SeekFrom, Write};

/*
 * Performs the destructive work on a single leaf: the ordered overwrite
 * passes followed by the delete. This is the only module that touches raw
 * bytes. It never reads caller data back to "verify" content; a pass is
 * considered verified when it completed without an I/O error.
 */

/*
 * Size of the reusable overwrite buffer. A tunable, not a contract; the
 * buffer is filled once per pass and written repeatedly until the leaf's
 * measured length is covered.
 */
pub const OVERWRITE_BUFFER_LEN: usize = 4096;

fn fill_buffer(buffer: &mut [u8], pattern: FillPattern) {
    match pattern {
        FillPattern::AllZero => buffer.fill(0x00),
        FillPattern::AllOne => buffer.fill(0xFF),
        FillPattern::CryptographicRandom => {
            // ThreadRng is a CSPRNG; refilled here so every random pass
            // carries fresh bytes.
            rand::rng().fill_bytes(buffer);
        }
    }
}

/*
 * Writes one full pass of `length` bytes from the given pattern, starting at
 * offset zero, with the final chunk truncated to the remaining byte count.
 * The handle is flushed before the function returns so the next pass never
 * starts on top of buffered data.
 */
fn write_pass(
    handle: &mut dyn super::provider::WritableByteTarget,
    buffer: &mut [u8],
    pattern: FillPattern,
    length: u64,
) -> Result<(), EraseError> {
    handle
        .seek(SeekFrom::Start(0))
        .map_err(|e| EraseError::WriteFailed(format!("seek to start failed: {e}")))?;
    fill_buffer(buffer, pattern);

    let mut remaining = length;
    while remaining > 0 {
        let chunk = remaining.min(buffer.len() as u64) as usize;
        handle
            .write_all(&buffer[..chunk])
            .map_err(|e| EraseError::WriteFailed(format!("write failed mid-pass: {e}")))?;
        remaining -= chunk as u64;
    }
    handle
        .flush()
        .map_err(|e| EraseError::WriteFailed(format!("flush failed after pass: {e}")))?;
    Ok(())
}

/*
 * Erases one leaf: runs every pattern in `patterns` as a full overwrite pass
 * over the leaf's measured length, then issues the delete through the
 * provider. Returns the number of bytes freed (the length measured at
 * discovery time) on success.
 *
 * A zero-length leaf has nothing to overwrite, so all passes are skipped and
 * the delete is issued directly; the same applies to an empty pattern
 * sequence (the single-pass-delete profile). A delete failure after
 * successful passes is still a failure: overwritten-but-not-deleted is not
 * success. No pass is ever retried automatically.
 */
pub fn erase_leaf(
    provider: &dyn ContentProviderOperations,
    leaf: &Node,
    patterns: &[FillPattern],
) -> Result<u64, EraseError> {
    if !patterns.is_empty() && leaf.length > 0 {
        let mut handle = provider.open_for_write(&leaf.path).map_err(|e| {
            EraseError::HandleUnavailable(format!("cannot open {:?}: {e}", leaf.path))
        })?;

        let mut buffer = [0u8; OVERWRITE_BUFFER_LEN];
        for (index, pattern) in patterns.iter().enumerate() {
            log::trace!(
                "LeafEraser: Pass {}/{} ({:?}) over {:?} ({} bytes)",
                index + 1,
                patterns.len(),
                pattern,
                leaf.path,
                leaf.length
            );
            write_pass(handle.as_mut(), &mut buffer, *pattern, leaf.length)?;
        }
        // The handle must be closed before the delete is issued; some
        // providers refuse to remove an entry with an open writer.
        drop(handle);
    }

    provider
        .delete(&leaf.path)
        .map_err(|e| EraseError::DeleteFailed(format!("cannot delete {:?}: {e}", leaf.path)))?;
    log::debug!(
        "LeafEraser: Erased {:?}, {} bytes freed.",
        leaf.path,
        leaf.length
    );
    Ok(leaf.length)
}
