//! Error types for spdk-nvme-queues

use std::ffi::NulError;

use crate::status::CompletionRecord;

/// Result type for spdk-nvme-queues operations
pub type Result<T> = std::result::Result<T, Error>;

/// Return code reported by the driver when it refuses a request.
///
/// SPDK returns negative errno values; the code stored here is always the
/// positive errno.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("driver error {0}")]
pub struct DriverError(pub i32);

impl DriverError {
    /// Create from SPDK return code (negative errno)
    pub fn from_rc(rc: i32) -> Self {
        DriverError(rc.saturating_abs())
    }

    /// The positive errno value.
    pub fn code(&self) -> i32 {
        self.0
    }
}

/// Error type for spdk-nvme-queues operations.
///
/// Every variant is terminal for a benchmark run: a single anomaly
/// invalidates the bandwidth measurement.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No controller matched the transport ID, or the namespace is missing
    /// or inactive.
    #[error("Device unavailable: {0}")]
    DeviceUnavailable(String),

    /// The controller refused to allocate an I/O queue pair.
    #[error("{queue}: I/O queue pair allocation failed")]
    QueueAllocationFailed { queue: usize },

    /// DMA-capable memory could not be allocated.
    #[error("DMA buffer allocation failed ({0} bytes)")]
    BufferAllocationFailed(usize),

    /// The driver rejected a write before it reached the device.
    #[error("{queue}: write submission at LBA {lba} failed: {source}")]
    Submission {
        queue: usize,
        lba: u64,
        #[source]
        source: DriverError,
    },

    /// The device completed a write with an error status.
    #[error("{queue}: write at LBA {lba} failed: {}", .record.status)]
    Completion {
        queue: usize,
        lba: u64,
        record: CompletionRecord,
    },

    /// Processing completions on a queue pair failed (e.g. the qpair was
    /// disconnected).
    #[error("{queue}: completion polling failed: {source}")]
    Poll {
        queue: usize,
        #[source]
        source: DriverError,
    },

    /// A write was issued to a queue pair that still has one outstanding.
    #[error("{queue}: queue pair busy with write at LBA {lba}")]
    QueueBusy { queue: usize, lba: u64 },

    /// The completion for an in-flight write was dropped without being
    /// delivered.
    #[error("{queue}: completion for LBA {lba} was dropped")]
    Cancelled { queue: usize, lba: u64 },

    /// The monotonic clock could not be read or produced an unusable interval.
    #[error("Timing error: {0}")]
    Timing(String),

    /// The write plan is inconsistent or does not fit the namespace.
    #[error("Invalid write plan: {0}")]
    InvalidPlan(String),

    /// Invalid argument provided
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// SPDK environment initialization failed
    #[error("SPDK environment initialization failed: {0}")]
    EnvInit(String),

    /// SPDK environment already initialized
    #[error("SPDK environment already initialized")]
    AlreadyInitialized,

    /// String contains null byte
    #[error("String contains null byte")]
    NulError(#[from] NulError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_driver_error_from_negative_rc() {
        assert_eq!(DriverError::from_rc(-12).code(), 12);
        assert_eq!(DriverError::from_rc(5).code(), 5);
    }

    #[test]
    fn test_submission_error_names_queue_and_code() {
        let err = Error::Submission {
            queue: 3,
            lba: 128,
            source: DriverError::from_rc(-12),
        };
        assert_eq!(
            err.to_string(),
            "3: write submission at LBA 128 failed: driver error 12"
        );
    }
}
