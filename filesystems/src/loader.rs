// Chunked file loading, the way a second-stage loader pulls a kernel off the boot volume

use std::io::Write;
use bootfs_core::{BlockDevice, BootFsError};
use log::{error, info};
use crate::fat12::{FileHandle, Volume};

/// Size of the load buffer each chunk passes through.
pub const DEFAULT_CHUNK_SIZE: usize = 0x10000;

/// Open `path`, stream it through a `chunk_size` buffer into `sink`, and close it.
/// Returns the number of bytes written.
pub fn load_file<D: BlockDevice, W: Write>(
    volume: &mut Volume<D>,
    path: &str,
    chunk_size: usize,
    sink: &mut W,
) -> Result<u64, BootFsError> {
    if chunk_size == 0 {
        return Err(BootFsError::BufferTooSmall { needed: 1, got: 0 });
    }

    let handle = volume
        .open(path)
        .inspect_err(|e| error!("Loader: could not open {}: {}", path, e))?;

    let result = copy_stream(volume, handle, chunk_size, sink);
    volume.close(handle)?;

    let total = result?;
    info!("Loader: loaded {} ({} bytes)", path, total);
    Ok(total)
}

/// Load a whole file into memory.
pub fn load_to_vec<D: BlockDevice>(volume: &mut Volume<D>, path: &str) -> Result<Vec<u8>, BootFsError> {
    let mut data = Vec::new();
    load_file(volume, path, DEFAULT_CHUNK_SIZE, &mut data)?;
    Ok(data)
}

fn copy_stream<D: BlockDevice, W: Write>(
    volume: &mut Volume<D>,
    handle: FileHandle,
    chunk_size: usize,
    sink: &mut W,
) -> Result<u64, BootFsError> {
    let mut chunk = vec![0u8; chunk_size];
    let mut total = 0u64;

    loop {
        let n = volume.read(handle, &mut chunk);
        if n == 0 {
            break;
        }
        sink.write_all(&chunk[..n])?;
        total += n as u64;
    }

    // The stream pins its size at end of chain, so anything left over is a failed sector read
    if let Some(file) = volume.file(handle) {
        if file.position < file.size {
            error!("Loader: stopped at byte {} of {}", file.position, file.size);
            return Err(BootFsError::ShortRead {
                read: total,
                expected: file.size as u64,
            });
        }
    }

    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{pattern, CountingDevice, TestImage};

    #[test]
    fn test_load_in_small_chunks() {
        let mut image = TestImage::floppy();
        let data = pattern(5000, 21);
        image.add_file(None, b"KERNEL  BIN", &data);
        let mut volume = Volume::mount(image.into_disk()).unwrap();

        let mut out = Vec::new();
        let total = load_file(&mut volume, "/KERNEL.BIN", 700, &mut out).unwrap();

        assert_eq!(total, 5000);
        assert_eq!(out, data);
        assert_eq!(volume.open_handles(), 0);
    }

    #[test]
    fn test_missing_file() {
        let mut volume = Volume::mount(TestImage::floppy().into_disk()).unwrap();
        let err = load_to_vec(&mut volume, "/KERNEL.BIN").unwrap_err();
        assert!(matches!(err, BootFsError::NotFound(_)));
    }

    #[test]
    fn test_zero_chunk_rejected() {
        let mut volume = Volume::mount(TestImage::floppy().into_disk()).unwrap();
        let result = load_file(&mut volume, "/KERNEL.BIN", 0, &mut Vec::new());
        assert!(matches!(result, Err(BootFsError::BufferTooSmall { .. })));
    }

    #[test]
    fn test_device_failure_is_a_short_read() {
        let mut image = TestImage::floppy();
        let first = image.add_file(None, b"KERNEL  BIN", &pattern(2048, 3));
        let bad_lba = (image.data_lba() as u32) + (first - 2) + 2;
        let mut device = CountingDevice::new(image.into_disk());
        device.failing_lbas.push(bad_lba);
        let mut volume = Volume::mount(device).unwrap();

        let result = load_to_vec(&mut volume, "/KERNEL.BIN");
        assert!(matches!(
            result,
            Err(BootFsError::ShortRead { read: 1024, expected: 2048 })
        ));
        assert_eq!(volume.open_handles(), 0);
    }
}
