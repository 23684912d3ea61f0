//! Drive-UUID detection.
//!
//! The catalog records which physical drive each session came from so plans
//! survive remounts under different paths. The oracle resolves a mount point
//! to its block device (`findmnt`) and the device to its filesystem UUID
//! (`lsblk`). Any failure is fatal to a scan before it writes anything.

use anyhow::{anyhow, Context, Result};
use std::path::Path;
use std::process::Command;

/// Resolve the UUID of the drive containing `mount_point`.
pub fn drive_uuid(mount_point: &Path) -> Result<String> {
    let device = device_for_mount(mount_point)?;
    uuid_for_device(&device)
}

fn device_for_mount(path: &Path) -> Result<String> {
    let output = Command::new("findmnt")
        .args(["-n", "-o", "SOURCE", "-T"])
        .arg(path)
        .output()
        .context("Failed to run findmnt; is util-linux installed?")?;

    if !output.status.success() {
        return Err(anyhow!(
            "Could not find mount point for path: {}",
            path.display()
        ));
    }

    let device = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if device.is_empty() {
        return Err(anyhow!("No device found for path: {}", path.display()));
    }
    Ok(device)
}

fn uuid_for_device(device: &str) -> Result<String> {
    let output = Command::new("lsblk")
        .args(["-n", "-o", "UUID", device])
        .output()
        .context("Failed to run lsblk; is util-linux installed?")?;

    if !output.status.success() {
        return Err(anyhow!("Could not get UUID for device: {device}"));
    }

    let uuid = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if uuid.is_empty() {
        return Err(anyhow!(
            "No UUID found for device: {device}. \
             This may be a network share or virtual filesystem."
        ));
    }
    Ok(uuid)
}
