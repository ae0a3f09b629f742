//! Build script for spdk-io-sys
//!
//! Finds SPDK through pkg-config, links the NVMe driver and the DPDK-backed
//! environment statically, and generates bindings for the subset of the API
//! the benchmark drives (env init, DMA memory, NVMe probe/qpair/IO, logging).
//!
//! Environment variables:
//! - `PKG_CONFIG_PATH`: Must include SPDK's pkg-config directory (e.g., /opt/spdk/lib/pkgconfig)

use std::collections::HashSet;
use std::env;
use std::path::PathBuf;

/// System libraries that should be linked dynamically (not with --whole-archive)
const SYSTEM_LIBS: &[&str] = &[
    "crypto", "ssl", "numa", "uuid", "aio", "dl", "m", "rt", "pthread", "uring", "isal",
    "isal_crypto", "keyutils",
];

/// SPDK/DPDK packages the NVMe write path depends on.
const SPDK_PACKAGES: &[&str] = &[
    "spdk_env_dpdk",
    "spdk_nvme",
    "spdk_log",
    "spdk_util",
    "libdpdk", // Libs.private carries numa, dl, m, pthread
];

/// Opaque driver handles; we only ever hold pointers to them.
const OPAQUE_TYPES: &[&str] = &[
    "spdk_nvme_ctrlr",
    "spdk_nvme_ns",
    "spdk_nvme_qpair",
    "spdk_nvme_probe_ctx",
    // packed structs with aligned members trip E0588
    "spdk_nvme_ctrlr_data",
    "spdk_nvme_ns_data",
];

fn is_system_lib(name: &str) -> bool {
    SYSTEM_LIBS.contains(&name)
}

/// Colon-prefixed archive names like `:librte_foo.a` duplicate the plain names.
fn is_archive_name(name: &str) -> bool {
    name.starts_with(':') || name.ends_with(".a")
}

fn main() {
    println!("cargo:rerun-if-changed=wrapper.h");
    println!("cargo:rerun-if-env-changed=PKG_CONFIG_PATH");

    let mut include_paths: Vec<PathBuf> = Vec::new();
    let mut link_paths = HashSet::new();
    let mut spdk_dpdk_libs = HashSet::new();
    let mut system_libs = HashSet::new();

    for package in SPDK_PACKAGES {
        let library = pkg_config::Config::new()
            .statik(true)
            .env_metadata(true)
            .cargo_metadata(false)
            .probe(package)
            .unwrap_or_else(|e| {
                panic!(
                    "Failed to find {package}: {e}. Set PKG_CONFIG_PATH to include SPDK's pkg-config directory."
                )
            });

        for path in library.include_paths {
            if !include_paths.contains(&path) {
                include_paths.push(path);
            }
        }
        link_paths.extend(library.link_paths);
        for lib_name in library.libs {
            if is_archive_name(&lib_name) {
                continue;
            }
            if is_system_lib(&lib_name) {
                system_libs.insert(lib_name);
            } else {
                spdk_dpdk_libs.insert(lib_name);
            }
        }
    }

    // libaio and libuuid have no pkg-config file on most distros
    system_libs.insert("aio".to_string());
    system_libs.insert("uuid".to_string());

    for path in &link_paths {
        println!("cargo:rustc-link-search=native={}", path.display());
    }

    // Driver registration tables are static constructors; keep every object.
    println!("cargo:rustc-link-arg=-Wl,--whole-archive");
    for lib in &spdk_dpdk_libs {
        println!("cargo:rustc-link-lib=static={lib}");
    }
    println!("cargo:rustc-link-arg=-Wl,--no-whole-archive");

    for lib in &system_libs {
        println!("cargo:rustc-link-lib={lib}");
    }

    let clang_args: Vec<String> = include_paths
        .iter()
        .map(|p| format!("-I{}", p.display()))
        .collect();

    let mut builder = bindgen::Builder::default()
        .header("wrapper.h")
        .clang_args(&clang_args)
        .allowlist_function("spdk_env_.*")
        .allowlist_function("spdk_(zmalloc|free)")
        .allowlist_function("spdk_log_.*")
        .allowlist_function("spdk_nvme_.*")
        .allowlist_type("spdk_nvme_.*")
        .allowlist_type("spdk_env_opts")
        .allowlist_type("spdk_log_level")
        .allowlist_var("SPDK_(ENV|MALLOC|NVME|NVMF)_.*")
        .derive_default(true)
        .derive_debug(true)
        .derive_copy(true)
        .wrap_unsafe_ops(true)
        .layout_tests(false);

    for ty in OPAQUE_TYPES {
        builder = builder.opaque_type(ty);
    }

    let bindings = builder
        .generate()
        .expect("Failed to generate SPDK bindings");

    let out_path = PathBuf::from(env::var("OUT_DIR").expect("OUT_DIR is set by cargo"));
    bindings
        .write_to_file(out_path.join("bindings.rs"))
        .expect("Failed to write bindings");
}
