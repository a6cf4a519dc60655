use std::{env, process};

use sysinfo::System;

/// Information about the process metrics are being collected in.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnvironmentInfo {
    /// Host name of the machine.
    pub host_name: String,
    /// Identifier of the process.
    pub process_id: u32,
    /// Name of the running executable.
    pub process_name: String,
    /// Operating system.
    pub os: &'static str,
    /// CPU architecture.
    pub arch: &'static str,
    /// Number of logical CPUs.
    pub cpu_count: usize,
    /// Version of this library.
    pub library_version: &'static str,
}

impl EnvironmentInfo {
    /// Captures information about the current process.
    pub fn capture() -> Self {
        Self {
            host_name: host_name(),
            process_id: process::id(),
            process_name: process_name(),
            os: env::consts::OS,
            arch: env::consts::ARCH,
            cpu_count: num_cpus::get(),
            library_version: env!("CARGO_PKG_VERSION"),
        }
    }
}

fn host_name() -> String {
    System::host_name().filter(|name| !name.is_empty()).unwrap_or_else(|| "unknown".to_owned())
}

fn process_name() -> String {
    env::current_exe()
        .ok()
        .and_then(|path| path.file_stem().map(|s| s.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "unknown".to_owned())
}
