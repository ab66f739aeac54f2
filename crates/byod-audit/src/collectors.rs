//! Device and operating system information
//!
//! Everything here is best effort: a value that cannot be read is reported as
//! `"Unknown"` rather than failing the run.

use byod_core::Platform;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::process::Command;
use tracing::debug;

const UNKNOWN: &str = "Unknown";

/// Hardware identity of the device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub brand: String,
    pub model: String,
    pub serial: String,
    pub ram: String,
    pub storage: String,
}

impl Default for DeviceInfo {
    fn default() -> Self {
        Self {
            brand: UNKNOWN.into(),
            model: UNKNOWN.into(),
            serial: UNKNOWN.into(),
            ram: UNKNOWN.into(),
            storage: UNKNOWN.into(),
        }
    }
}

/// Operating system the checks ran on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemInfo {
    /// `Mac`, `Windows` or `Linux`
    pub platform: String,
    /// OS release
    pub version: String,
    /// CPU architecture
    pub machine: String,
    pub hostname: String,
}

/// System information collector
pub struct SystemCollector;

impl SystemCollector {
    pub fn system_info() -> SystemInfo {
        let platform = Platform::current();
        SystemInfo {
            platform: platform.display_name().to_string(),
            version: Self::os_release(platform),
            machine: std::env::consts::ARCH.to_string(),
            hostname: hostname::get()
                .map(|h| h.to_string_lossy().to_string())
                .unwrap_or_else(|_| UNKNOWN.into()),
        }
    }

    fn os_release(platform: Platform) -> String {
        let release = match platform {
            Platform::Windows => run("cmd", &["/C", "ver"]).and_then(|out| {
                capture(r"Version\s+([0-9.]+)", &out)
            }),
            _ => run("uname", &["-r"]),
        };
        release.unwrap_or_else(|| UNKNOWN.into())
    }

    /// Collect device information for the current platform
    pub fn device_info() -> DeviceInfo {
        match Platform::current() {
            Platform::MacOS => Self::macos_device_info(),
            Platform::Windows => Self::windows_device_info(),
            Platform::Linux => Self::linux_device_info(),
            Platform::Unknown => DeviceInfo::default(),
        }
    }

    fn macos_device_info() -> DeviceInfo {
        let mut info = DeviceInfo {
            brand: "Apple".into(),
            ..Default::default()
        };

        if let Some(output) = run("system_profiler", &["SPHardwareDataType"]) {
            if let Some(model) = capture(r"Model Name:\s*(.+)", &output) {
                info.model = model;
            }
            if let Some(serial) = capture(r"Serial Number \(system\):\s*(.+)", &output) {
                info.serial = serial;
            }
            if let Some(ram) = capture(r"Memory:\s*(.+)", &output) {
                info.ram = ram;
            }
        }

        if let Some(storage) = root_volume_size() {
            info.storage = storage;
        }

        info
    }

    fn windows_device_info() -> DeviceInfo {
        let mut info = DeviceInfo::default();

        if let Some(output) = run("wmic", &["computersystem", "get", "manufacturer,model", "/format:list"]) {
            if let Some(brand) = capture(r"(?m)^Manufacturer=(.+)$", &output) {
                info.brand = brand;
            }
            if let Some(model) = capture(r"(?m)^Model=(.+)$", &output) {
                info.model = model;
            }
        }

        if let Some(output) = run("wmic", &["bios", "get", "serialnumber", "/format:list"]) {
            if let Some(serial) = capture(r"(?m)^SerialNumber=(.+)$", &output) {
                info.serial = serial;
            }
        }

        if let Some(output) = run("wmic", &["computersystem", "get", "TotalPhysicalMemory", "/format:list"]) {
            if let Some(bytes) = capture(r"(?m)^TotalPhysicalMemory=(\d+)", &output)
                .and_then(|b| b.parse::<u64>().ok())
            {
                info.ram = format_gb(bytes);
            }
        }

        if let Some(output) = run(
            "wmic",
            &["logicaldisk", "where", "DeviceID='C:'", "get", "Size", "/format:list"],
        ) {
            if let Some(bytes) =
                capture(r"(?m)^Size=(\d+)", &output).and_then(|b| b.parse::<u64>().ok())
            {
                info.storage = format_gb(bytes);
            }
        }

        info
    }

    fn linux_device_info() -> DeviceInfo {
        let dmi = |name: &str| {
            std::fs::read_to_string(format!("/sys/devices/virtual/dmi/id/{}", name))
                .ok()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        };

        let mut info = DeviceInfo::default();
        if let Some(brand) = dmi("sys_vendor") {
            info.brand = brand;
        }
        if let Some(model) = dmi("product_name") {
            info.model = model;
        }
        // Usually root-only
        if let Some(serial) = dmi("product_serial") {
            info.serial = serial;
        }

        if let Some(kb) = std::fs::read_to_string("/proc/meminfo")
            .ok()
            .and_then(|m| parse_meminfo_total_kb(&m))
        {
            info.ram = format_gb(kb * 1024);
        }

        if let Some(storage) = root_volume_size() {
            info.storage = storage;
        }

        info
    }
}

fn run(command: &str, args: &[&str]) -> Option<String> {
    match Command::new(command).args(args).output() {
        Ok(output) if output.status.success() => {
            Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
        }
        Ok(_) => None,
        Err(e) => {
            debug!(command, "Failed to run command: {}", e);
            None
        }
    }
}

fn capture(pattern: &str, text: &str) -> Option<String> {
    Regex::new(pattern)
        .ok()?
        .captures(text)?
        .get(1)
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Size column of `df -h /`
fn root_volume_size() -> Option<String> {
    let output = run("df", &["-h", "/"])?;
    parse_df_size(&output)
}

fn parse_df_size(output: &str) -> Option<String> {
    output
        .lines()
        .nth(1)?
        .split_whitespace()
        .nth(1)
        .map(String::from)
}

fn parse_meminfo_total_kb(meminfo: &str) -> Option<u64> {
    meminfo
        .lines()
        .find_map(|line| line.strip_prefix("MemTotal:"))
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|kb| kb.parse().ok())
}

fn format_gb(bytes: u64) -> String {
    format!("{:.1} GB", bytes as f64 / (1024u64.pow(3)) as f64)
}
