use crate::{
    checksum::ChecksumTable,
    constants::self_test::{EXPECTED, INPUT},
    error_handling::{ScanError, ScanResult},
};

/// Checksums the built-in vector and compares it with the known answer.
///
/// A table that fails here would silently produce a wrong inventory for
/// every file, so callers must treat the error as fatal.
pub fn verify_table(table: &ChecksumTable) -> ScanResult<()> {
    let calculated = table.checksum(INPUT.as_bytes()).to_base64();
    if calculated != EXPECTED {
        return Err(ScanError::SelfTest {
            expected: EXPECTED,
            calculated,
        });
    }
    log::debug!("checksum self-test passed ({EXPECTED})");
    Ok(())
}
