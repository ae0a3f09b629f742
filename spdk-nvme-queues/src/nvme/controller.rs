//! NVMe controller discovery and attachment.

use std::ffi::c_void;
use std::marker::PhantomData;
use std::ptr::NonNull;

use spdk_io_sys::*;
use tracing::{info, warn};

use crate::error::{DriverError, Error, Result};

use super::namespace::NvmeNamespace;
use super::qpair::NvmeQpair;
use super::transport::{TransportId, raw_address};

/// Attached NVMe controller.
///
/// Obtained via [`probe()`](Self::probe). Detached on drop; every
/// [`NvmeQpair`] allocated from it must be dropped first.
///
/// # Thread Safety
///
/// `!Send + !Sync` - controller operations must remain on the thread that
/// attached.
///
/// # Example
///
/// ```no_run
/// use spdk_nvme_queues::nvme::{NvmeController, TransportId};
///
/// # fn example() -> spdk_nvme_queues::Result<()> {
/// let trid = TransportId::pcie_discovery()?;
/// let ctrlr = NvmeController::probe(&trid)?;
///
/// if let Some(ns) = ctrlr.namespace(1) {
///     println!("NS1: {} sectors, {} bytes/sector",
///              ns.num_sectors(), ns.sector_size());
/// }
/// # Ok(())
/// # }
/// ```
pub struct NvmeController {
    ptr: NonNull<spdk_nvme_ctrlr>,
    _marker: PhantomData<*mut ()>, // !Send + !Sync
}

/// Controllers attached during one probe, in attach order.
#[derive(Default)]
struct ProbeContext {
    attached: Vec<NonNull<spdk_nvme_ctrlr>>,
}

unsafe extern "C" fn probe_cb(
    _cb_ctx: *mut c_void,
    trid: *const spdk_nvme_transport_id,
    _opts: *mut spdk_nvme_ctrlr_opts,
) -> bool {
    let addr = unsafe { raw_address(&*trid) };
    info!("nvme attaching to {}", addr);
    true
}

unsafe extern "C" fn attach_cb(
    cb_ctx: *mut c_void,
    trid: *const spdk_nvme_transport_id,
    ctrlr: *mut spdk_nvme_ctrlr,
    _opts: *const spdk_nvme_ctrlr_opts,
) {
    let ctx = unsafe { &mut *(cb_ctx as *mut ProbeContext) };
    let addr = unsafe { raw_address(&*trid) };
    info!("nvme attached to {}", addr);
    if let Some(ctrlr) = NonNull::new(ctrlr) {
        ctx.attached.push(ctrlr);
    }
}

impl NvmeController {
    /// Probe `trid` and attach to the first controller found.
    ///
    /// Any further controllers the probe attached are detached again.
    ///
    /// # Errors
    ///
    /// [`Error::DeviceUnavailable`] if the probe fails or attaches nothing.
    pub fn probe(trid: &TransportId) -> Result<Self> {
        let mut ctx = ProbeContext::default();

        let rc = unsafe {
            spdk_nvme_probe(
                trid.as_ptr(),
                &mut ctx as *mut ProbeContext as *mut c_void,
                Some(probe_cb),
                Some(attach_cb),
                None,
            )
        };
        if rc != 0 {
            for extra in ctx.attached {
                unsafe { spdk_nvme_detach(extra.as_ptr()) };
            }
            return Err(Error::DeviceUnavailable(format!(
                "spdk_nvme_probe({}) failed: {}",
                trid,
                DriverError::from_rc(rc)
            )));
        }

        let mut attached = ctx.attached.into_iter();
        let ptr = attached
            .next()
            .ok_or_else(|| Error::DeviceUnavailable(format!("no NVMe controller at {}", trid)))?;
        for extra in attached {
            warn!("detaching additional controller");
            unsafe { spdk_nvme_detach(extra.as_ptr()) };
        }

        Ok(Self {
            ptr,
            _marker: PhantomData,
        })
    }

    /// Get the number of namespaces.
    ///
    /// Note: Some namespace IDs may be inactive.
    pub fn num_namespaces(&self) -> u32 {
        unsafe { spdk_nvme_ctrlr_get_num_ns(self.ptr.as_ptr()) }
    }

    /// Get a namespace by ID (1-indexed).
    ///
    /// Returns `None` if the namespace ID is invalid or inactive.
    pub fn namespace(&self, ns_id: u32) -> Option<NvmeNamespace<'_>> {
        if ns_id == 0 || ns_id > self.num_namespaces() {
            return None;
        }

        let ns_ptr = unsafe { spdk_nvme_ctrlr_get_ns(self.ptr.as_ptr(), ns_id) };

        NonNull::new(ns_ptr).map(|ptr| {
            let ns = NvmeNamespace::from_ptr(ptr);
            if ns.is_active() { Some(ns) } else { None }
        })?
    }

    /// Allocate an I/O queue pair with the controller's default options.
    pub fn alloc_io_qpair(&self) -> Option<NvmeQpair> {
        let qpair =
            unsafe { spdk_nvme_ctrlr_alloc_io_qpair(self.ptr.as_ptr(), std::ptr::null(), 0) };

        NonNull::new(qpair).map(NvmeQpair::from_ptr)
    }
}

impl Drop for NvmeController {
    fn drop(&mut self) {
        unsafe {
            spdk_nvme_detach(self.ptr.as_ptr());
        }
    }
}
