//! NVMe transport identifier.
//!
//! Identifies which controller(s) a probe should attach to.

use std::ffi::CString;
use std::fmt;
use std::mem::MaybeUninit;

use spdk_io_sys::*;

use crate::error::{Error, Result};

/// Subsystem NQN used when probing local PCIe devices.
const DISCOVERY_NQN: &str = "nqn.2014-08.org.nvmexpress.discovery";

/// NVMe transport identifier.
///
/// # Example
///
/// ```no_run
/// use spdk_nvme_queues::nvme::TransportId;
///
/// // Every local PCIe controller
/// let all = TransportId::pcie_discovery()?;
///
/// // One specific device
/// let one = TransportId::parse("trtype:PCIe traddr:0000:00:04.0")?;
/// # Ok::<(), spdk_nvme_queues::Error>(())
/// ```
#[derive(Clone)]
pub struct TransportId {
    inner: spdk_nvme_transport_id,
}

impl TransportId {
    /// PCIe transport with an empty address: a probe attaches to every
    /// local controller SPDK can claim.
    pub fn pcie_discovery() -> Result<Self> {
        let mut trid: spdk_nvme_transport_id = unsafe { MaybeUninit::zeroed().assume_init() };

        unsafe {
            spdk_nvme_trid_populate_transport(
                &mut trid,
                spdk_nvme_transport_type_SPDK_NVME_TRANSPORT_PCIE,
            );
        }
        copy_to_field(&mut trid.subnqn, DISCOVERY_NQN, "subnqn")?;

        Ok(Self { inner: trid })
    }

    /// PCIe transport for one device, by BDF address (e.g. "0000:00:04.0").
    pub fn pcie(addr: &str) -> Result<Self> {
        let mut trid = Self::pcie_discovery()?;
        copy_to_field(&mut trid.inner.traddr, addr, "PCI address")?;
        Ok(trid)
    }

    /// Parse from string (SPDK format).
    ///
    /// Format: `trtype:PCIe traddr:0000:00:04.0`
    pub fn parse(s: &str) -> Result<Self> {
        let mut trid: spdk_nvme_transport_id = unsafe { MaybeUninit::zeroed().assume_init() };

        let c_str = CString::new(s)?;

        let rc = unsafe { spdk_nvme_transport_id_parse(&mut trid, c_str.as_ptr()) };

        if rc != 0 {
            return Err(Error::InvalidArgument(format!(
                "Failed to parse transport ID: {}",
                s
            )));
        }

        Ok(Self { inner: trid })
    }

    pub fn is_pcie(&self) -> bool {
        self.inner.trtype == spdk_nvme_transport_type_SPDK_NVME_TRANSPORT_PCIE
    }

    /// Get the address. Empty for discovery.
    pub fn address(&self) -> &str {
        field_to_str(&self.inner.traddr)
    }

    pub fn subnqn(&self) -> &str {
        field_to_str(&self.inner.subnqn)
    }

    /// Get a pointer to the inner transport ID.
    pub(crate) fn as_ptr(&self) -> *const spdk_nvme_transport_id {
        &self.inner
    }
}

/// Address of a transport ID handed to a probe callback.
pub(crate) fn raw_address(trid: &spdk_nvme_transport_id) -> &str {
    field_to_str(&trid.traddr)
}

/// Copy a string into a fixed-size, nul-terminated char array field.
fn copy_to_field(field: &mut [i8], value: &str, name: &str) -> Result<()> {
    let bytes = value.as_bytes();
    let max_len = field.len() - 1;

    if bytes.len() > max_len {
        return Err(Error::InvalidArgument(format!(
            "{} too long: {} (max {})",
            name,
            bytes.len(),
            max_len
        )));
    }

    for (i, &byte) in bytes.iter().enumerate() {
        field[i] = byte as i8;
    }
    field[bytes.len()] = 0;

    Ok(())
}

fn field_to_str(field: &[i8]) -> &str {
    let len = field.iter().position(|&c| c == 0).unwrap_or(field.len());
    // Safety: SPDK fields are ASCII
    unsafe {
        std::str::from_utf8_unchecked(std::slice::from_raw_parts(
            field.as_ptr() as *const u8,
            len,
        ))
    }
}

impl fmt::Display for TransportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let trtype = if self.is_pcie() { "PCIe" } else { "other" };
        if self.address().is_empty() {
            write!(f, "trtype:{} (discovery)", trtype)
        } else {
            write!(f, "trtype:{} traddr:{}", trtype, self.address())
        }
    }
}

impl fmt::Debug for TransportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportId")
            .field("trtype", &self.inner.trtype)
            .field("traddr", &self.address())
            .field("subnqn", &self.subnqn())
            .finish()
    }
}
