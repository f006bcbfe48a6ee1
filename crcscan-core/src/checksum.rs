//! CRC32C (Castagnoli) backed by the `crc` crate, and the streaming file
//! checksum engine.

use std::{fmt, fs::File, io::Read};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use crc::{Algorithm, Crc, Digest, Table, CRC_32_ISCSI};

use crate::{
    constants::checksum::BASE64_SIZE,
    error_handling::{ScanError, ScanResult},
    scheduler::Job,
};

/// Slice-by-16 lookup tables for a 32-bit CRC, Castagnoli unless a test
/// injects another algorithm.
///
/// Built once per pipeline and shared read-only by every worker.
pub struct ChecksumTable {
    crc: Crc<u32, Table<16>>,
}

impl ChecksumTable {
    pub fn castagnoli() -> Self {
        Self::with_algorithm(&CRC_32_ISCSI)
    }

    pub fn with_algorithm(algorithm: &'static Algorithm<u32>) -> Self {
        Self {
            crc: Crc::<u32, Table<16>>::new(algorithm),
        }
    }

    pub fn checksum(&self, data: &[u8]) -> Checksum {
        Checksum(self.crc.checksum(data))
    }
}

/// Running CRC32C state over a byte stream.
pub struct Crc32c<'a> {
    digest: Digest<'a, u32, Table<16>>,
}

impl<'a> Crc32c<'a> {
    pub fn new(table: &'a ChecksumTable) -> Self {
        Self {
            digest: table.crc.digest(),
        }
    }

    #[inline]
    pub fn update(&mut self, data: &[u8]) {
        self.digest.update(data);
    }

    pub fn finalize(self) -> Checksum {
        Checksum(self.digest.finalize())
    }
}

/// A finished CRC32C value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Checksum(pub u32);

impl Checksum {
    /// Base64 of the big-endian bytes, the form object stores expect.
    pub fn to_base64(self) -> String {
        let s = STANDARD.encode(self.0.to_be_bytes());
        debug_assert_eq!(s.len(), BASE64_SIZE);
        s
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base64())
    }
}

/// Why a stream could not be checksummed.
#[derive(Debug)]
pub enum StreamError {
    Io(std::io::Error),
    SizeMismatch { expected: u64, actual: u64 },
}

/// Streams `reader` through `buf` and checks that exactly `expected_size`
/// bytes were read before end of stream.
pub fn checksum_reader<R: Read>(
    table: &ChecksumTable,
    mut reader: R,
    expected_size: u64,
    buf: &mut [u8],
) -> Result<Checksum, StreamError> {
    let mut crc = Crc32c::new(table);
    let mut total: u64 = 0;
    loop {
        match reader.read(buf) {
            Ok(0) => break,
            Ok(n) => {
                crc.update(&buf[..n]);
                total += n as u64;
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(StreamError::Io(e)),
        }
    }
    if total != expected_size {
        return Err(StreamError::SizeMismatch {
            expected: expected_size,
            actual: total,
        });
    }
    Ok(crc.finalize())
}

/// Opens the job's file and checksums it with the worker's reusable buffer.
pub fn checksum_file(table: &ChecksumTable, job: &Job, buf: &mut [u8]) -> ScanResult<Checksum> {
    let file = File::open(&job.path).map_err(|source| ScanError::Open {
        path: job.path.clone(),
        source,
    })?;
    checksum_reader(table, file, job.size, buf).map_err(|e| match e {
        StreamError::Io(source) => ScanError::Io {
            path: job.path.clone(),
            source,
        },
        StreamError::SizeMismatch { expected, actual } => ScanError::SizeMismatch {
            path: job.path.clone(),
            expected,
            actual,
        },
    })
}
