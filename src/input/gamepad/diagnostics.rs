//! Controller diagnostics for `--list-devices`

use colored::*;
use std::time::Duration;
use tracing::info;

use crate::input::{DeviceError, DeviceInfo};

/// Print every detected controller with its id and controls
pub fn print_device_diagnostics(settle: Duration) -> Result<(), DeviceError> {
    info!("Scanning for controllers ({:?})...", settle);
    println!("\n{}", "=== Controllers ===".bold().cyan());
    println!("Platform: {}", std::env::consts::OS);

    let devices = super::list_devices(settle)?;
    if devices.is_empty() {
        println!("\n  {}", "No controllers detected".dimmed());
        println!("  Check that the device is connected and that you may read it");
        println!("  (on Linux: membership in the `input` group or a udev rule).");
        return Ok(());
    }

    for device in &devices {
        print_device(device);
    }
    println!();
    Ok(())
}

fn print_device(device: &DeviceInfo) {
    println!("\n{} {}", "●".green(), device.name.bold());
    println!("  Id: {}", device.id.bright_white());

    let (buttons, axes): (Vec<_>, Vec<_>) =
        device.controls.iter().partition(|control| control.is_button);

    println!("  {} ({}):", "Buttons".bold(), buttons.len());
    for control in buttons {
        println!("    {:<14} {}", control.name, control.address.to_string().dimmed());
    }

    println!("  {} ({}):", "Axes".bold(), axes.len());
    for control in axes {
        println!(
            "    {:<14} {} [{}..{}]",
            control.name,
            control.address.to_string().dimmed(),
            control.logical_min,
            control.logical_max
        );
    }
}
