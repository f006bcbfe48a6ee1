/// Checksum encoding constants
pub mod checksum {
    /// Width of the raw checksum in bytes
    pub const SIZE: usize = 4;

    /// Width of the base64 text form of the checksum
    pub const BASE64_SIZE: usize = (SIZE + 2) / 3 * 4;
}

/// Startup self-test vector
pub mod self_test {
    /// sha512("Hello World!") as lowercase hex
    pub const INPUT: &str = "861844d6704e8573fec34d967e20bcfef3d424cf48be04e6dc08f2bd58c729743371015ead891cc3cf1c9d34b49264b510751b1ff9e537937bc46b5d6ff4ecc8";

    /// Expected base64 checksum of `INPUT`
    pub const EXPECTED: &str = "C7DdPQ==";
}

/// Pipeline sizing defaults
pub mod pipeline {
    /// Result lines buffered per worker before a flush
    pub const BATCH_LINES: usize = 256;

    /// Default read buffer per worker
    pub const DEFAULT_BUFFER_KB: usize = 1024;

    /// Largest read buffer a worker may allocate (1 GiB)
    pub const MAX_BUFFER_KB: usize = 1024 * 1024;

    /// Default number of workers per available CPU
    pub const WORKERS_PER_CPU: usize = 4;

    /// Rough size of one result line, used to presize batch buffers
    pub const LINE_SIZE_HINT: usize = 128;
}
