//! SPDK environment initialization.
//!
//! The NVMe driver needs the DPDK-backed environment (hugepages, PCI access,
//! DMA-able memory) set up once per process before any controller is
//! probed. [`SpdkEnv`] does that and tears it down on drop.
//!
//! # Example
//!
//! ```no_run
//! use spdk_nvme_queues::env::SpdkEnv;
//!
//! let _env = SpdkEnv::builder()
//!     .name("spdk-nvme-queues")
//!     .build()
//!     .expect("Failed to init SPDK");
//! ```

use std::ffi::CString;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};

use spdk_io_sys::*;
use tracing::debug;

use crate::error::{Error, Result};

static ENV_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// SPDK log levels (`enum spdk_log_level`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum LogLevel {
    Disabled = -1,
    Error = 0,
    Warn = 1,
    Notice = 2,
    Info = 3,
    Debug = 4,
}

/// Process-wide SPDK environment guard.
///
/// `!Send + !Sync`: finalize on the thread that initialized.
pub struct SpdkEnv {
    _marker: PhantomData<*mut ()>,
}

impl SpdkEnv {
    pub fn builder() -> SpdkEnvBuilder {
        SpdkEnvBuilder::new()
    }
}

impl Drop for SpdkEnv {
    fn drop(&mut self) {
        unsafe { spdk_env_fini() };
        ENV_INITIALIZED.store(false, Ordering::SeqCst);
    }
}

/// Builder for [`SpdkEnv`].
#[derive(Debug, Clone)]
pub struct SpdkEnvBuilder {
    name: String,
    shm_id: Option<i32>,
    mem_size_mb: Option<i32>,
    main_core: Option<i32>,
    no_pci: bool,
    no_huge: bool,
    log_level: Option<LogLevel>,
}

impl SpdkEnvBuilder {
    pub fn new() -> Self {
        Self {
            name: "spdk-nvme-queues".to_string(),
            shm_id: None,
            mem_size_mb: None,
            main_core: None,
            no_pci: false,
            no_huge: false,
            log_level: None,
        }
    }

    /// Process name, used for hugepage file names.
    pub fn name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// Shared memory ID for multi-process mode; -1 disables it.
    pub fn shm_id(mut self, id: i32) -> Self {
        self.shm_id = Some(id);
        self
    }

    /// Hugepage memory to reserve in MB.
    pub fn mem_size_mb(mut self, mb: i32) -> Self {
        self.mem_size_mb = Some(mb);
        self
    }

    pub fn main_core(mut self, core: i32) -> Self {
        self.main_core = Some(core);
        self
    }

    /// Disable PCI device scanning (fabrics transports only).
    pub fn no_pci(mut self, no_pci: bool) -> Self {
        self.no_pci = no_pci;
        self
    }

    /// Use regular memory instead of hugepages.
    pub fn no_huge(mut self, no_huge: bool) -> Self {
        self.no_huge = no_huge;
        self
    }

    /// Print level of SPDK's own log messages.
    pub fn log_level(mut self, level: LogLevel) -> Self {
        self.log_level = Some(level);
        self
    }

    pub fn build(self) -> Result<SpdkEnv> {
        if ENV_INITIALIZED.swap(true, Ordering::SeqCst) {
            return Err(Error::AlreadyInitialized);
        }

        let name = CString::new(self.name.as_str())?;

        let rc = unsafe {
            let mut opts: spdk_env_opts = std::mem::zeroed();
            opts.opts_size = std::mem::size_of::<spdk_env_opts>();
            spdk_env_opts_init(&mut opts);

            opts.name = name.as_ptr();
            if let Some(shm_id) = self.shm_id {
                opts.shm_id = shm_id;
            }
            if let Some(mem_size) = self.mem_size_mb {
                opts.mem_size = mem_size;
            }
            if let Some(main_core) = self.main_core {
                opts.main_core = main_core;
            }
            opts.no_pci = self.no_pci;
            opts.no_huge = self.no_huge;

            spdk_env_init(&opts)
        };

        if rc < 0 {
            ENV_INITIALIZED.store(false, Ordering::SeqCst);
            return Err(Error::EnvInit(format!(
                "spdk_env_init failed with error code {}",
                rc
            )));
        }

        if let Some(level) = self.log_level {
            unsafe { spdk_log_set_print_level(level as spdk_log_level) };
        }

        debug!(name = %self.name, "SPDK environment initialized");
        Ok(SpdkEnv {
            _marker: PhantomData,
        })
    }
}

impl Default for SpdkEnvBuilder {
    fn default() -> Self {
        Self::new()
    }
}
