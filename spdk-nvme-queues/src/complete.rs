//! Callback-to-slot plumbing for write completions.
//!
//! SPDK reports completions through C callbacks fired from inside
//! `spdk_nvme_qpair_process_completions()`. Each write gets a oneshot pair:
//!
//! 1. Create a completion pair with [`completion()`]
//! 2. Convert sender to raw pointer via [`CompletionSender::into_raw()`]
//! 3. Pass raw pointer as callback context to SPDK
//! 4. In callback, reconstruct sender via [`CompletionSender::from_raw()`]
//! 5. Send the completion record
//! 6. The reaper picks it up with [`CompletionReceiver::try_take()`] right
//!    after the poll call returns, on the same thread

use std::ffi::c_void;

use futures_channel::oneshot;

use crate::status::CompletionRecord;

/// Sender half of a completion pair.
///
/// Convert to raw pointer with [`into_raw()`](Self::into_raw) to pass through
/// C callbacks, then reconstruct with [`from_raw()`](Self::from_raw).
pub struct CompletionSender<T> {
    tx: oneshot::Sender<T>,
}

impl<T> CompletionSender<T> {
    /// Convert sender to raw pointer for passing to C callbacks.
    ///
    /// The returned pointer must be passed to [`from_raw()`](Self::from_raw)
    /// exactly once to avoid memory leaks.
    pub fn into_raw(self) -> *mut c_void {
        Box::into_raw(Box::new(self.tx)) as *mut c_void
    }

    /// Reconstruct sender from raw pointer.
    ///
    /// # Safety
    ///
    /// The pointer must have been created by [`into_raw()`](Self::into_raw)
    /// and must not have been used already.
    pub unsafe fn from_raw(ptr: *mut c_void) -> Self {
        let tx = unsafe { *Box::from_raw(ptr as *mut oneshot::Sender<T>) };
        Self { tx }
    }

    /// Deliver the value.
    pub fn complete(self, value: T) {
        // Receiver may be gone if the run already failed on another queue
        let _ = self.tx.send(value);
    }
}

/// Receiver half of a completion pair.
pub struct CompletionReceiver<T> {
    rx: oneshot::Receiver<T>,
}

/// What a non-blocking check of a [`CompletionReceiver`] found.
#[derive(Debug, PartialEq, Eq)]
pub enum Delivery<T> {
    /// Still in flight.
    Pending,
    /// The completion arrived.
    Ready(T),
    /// The sender was dropped without completing.
    Dropped,
}

impl<T> CompletionReceiver<T> {
    /// Take the value if it has arrived. Never blocks.
    pub fn try_take(&mut self) -> Delivery<T> {
        match self.rx.try_recv() {
            Ok(Some(value)) => Delivery::Ready(value),
            Ok(None) => Delivery::Pending,
            Err(oneshot::Canceled) => Delivery::Dropped,
        }
    }
}

/// Create a completion sender/receiver pair.
pub fn completion<T>() -> (CompletionSender<T>, CompletionReceiver<T>) {
    let (tx, rx) = oneshot::channel();
    (CompletionSender { tx }, CompletionReceiver { rx })
}

/// Completion pair for a single NVMe write.
pub fn write_completion() -> (
    CompletionSender<CompletionRecord>,
    CompletionReceiver<CompletionRecord>,
) {
    completion()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::CompletionStatus;

    #[test]
    fn test_completion_pending_then_ready() {
        let (tx, mut rx) = completion::<i32>();
        assert_eq!(rx.try_take(), Delivery::Pending);

        tx.complete(42);
        assert_eq!(rx.try_take(), Delivery::Ready(42));
    }

    #[test]
    fn test_completion_dropped() {
        let (tx, mut rx) = completion::<()>();
        drop(tx);
        assert_eq!(rx.try_take(), Delivery::Dropped);
    }

    #[test]
    fn test_into_raw_from_raw() {
        let (tx, mut rx) = write_completion();
        let ptr = tx.into_raw();
        assert!(!ptr.is_null());

        let tx2 = unsafe { CompletionSender::<CompletionRecord>::from_raw(ptr) };
        let record = CompletionRecord::with_status(CompletionStatus::new(0, 0x06));
        tx2.complete(record);

        match rx.try_take() {
            Delivery::Ready(got) => assert_eq!(got, record),
            other => panic!("unexpected: {:?}", other),
        }
    }
}
