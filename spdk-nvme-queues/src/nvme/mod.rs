//! SPDK user-space NVMe backend.
//!
//! ```text
//! ┌─────────────────┐
//! │  NvmeController │  ← spdk_nvme_probe() on a TransportId
//! └────────┬────────┘
//!          │
//!     ┌────┴──────────┐
//!     ▼               ▼
//! ┌───────────┐ ┌───────────┐
//! │ Namespace │ │ NvmeQpair │ × queue count
//! └───────────┘ └───────────┘
//! ```
//!
//! [`NvmeDevice`] ties these together behind the [`Device`](crate::Device)
//! trait.

mod controller;
mod device;
mod namespace;
mod qpair;
mod transport;

pub use controller::NvmeController;
pub use device::NvmeDevice;
pub use namespace::NvmeNamespace;
pub use qpair::NvmeQpair;
pub use transport::TransportId;
