//! Process diagnostics for test logs
//!
//! On Linux the numbers come from `/proc/self/status`. Elsewhere they
//! are reported as unavailable.

use std::path::Path;

use crate::common::{Error, Result};

/// Memory figures of the current process, in kilobytes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryStats {
    /// Resident set size
    pub resident_kb: Option<u64>,
    /// Peak resident set size
    pub peak_resident_kb: Option<u64>,
    /// Virtual memory size
    pub virtual_kb: Option<u64>,
}

/// Read memory figures for the current process
pub fn memory_stats() -> Result<MemoryStats> {
    let status = read_status()?;
    Ok(MemoryStats {
        resident_kb: field_kb(&status, "VmRSS"),
        peak_resident_kb: field_kb(&status, "VmHWM"),
        virtual_kb: field_kb(&status, "VmSize"),
    })
}

/// Number of threads in the current process
///
/// Falls back to the available parallelism when the process status
/// cannot be read.
pub fn thread_count() -> usize {
    read_status()
        .ok()
        .and_then(|status| threads(&status))
        .unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
}

fn read_status() -> Result<String> {
    let path = Path::new("/proc/self/status");
    std::fs::read_to_string(path).map_err(|e| Error::file_read(path, &e))
}

fn field<'a>(status: &'a str, name: &str) -> Option<&'a str> {
    status.lines().find_map(|line| {
        let (key, value) = line.split_once(':')?;
        (key.trim() == name).then(|| value.trim())
    })
}

fn threads(status: &str) -> Option<usize> {
    field(status, "Threads")?.parse().ok()
}

fn field_kb(status: &str, name: &str) -> Option<u64> {
    field(status, name)?
        .trim_end_matches("kB")
        .trim()
        .parse()
        .ok()
}
