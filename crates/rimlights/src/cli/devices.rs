//! `devices` subcommand: list serial ports and wheel candidates.

use std::path::Path;

use super::{DevicesOutput, Result, SERIAL_BY_ID_DIR, print_json, transport};

/// Entries of `/dev/serial/by-id`, sorted. Missing directory yields none.
fn by_id_entries(dir: &Path) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path().display().to_string())
        .collect();
    names.sort();
    names
}

pub(super) fn cmd_devices(json: bool) -> Result<()> {
    let ports = transport::list_ports();
    let by_id = by_id_entries(Path::new(SERIAL_BY_ID_DIR));

    if json {
        return print_json(&DevicesOutput {
            count: ports.len(),
            by_id,
            ports,
        });
    }

    if ports.is_empty() && by_id.is_empty() {
        println!("No serial devices found.");
        return Ok(());
    }

    if !ports.is_empty() {
        println!(
            "Found {} serial port{}:",
            ports.len(),
            if ports.len() == 1 { "" } else { "s" }
        );
        println!();
        for (i, port) in ports.iter().enumerate() {
            println!("  [{}] {} ({})", i + 1, port.name, port.kind);
            if let Some(ref product) = port.product {
                println!("      Product: {product}");
            }
        }
    }

    if !by_id.is_empty() {
        println!();
        println!("{SERIAL_BY_ID_DIR}:");
        for name in &by_id {
            println!("  {name}");
        }
    }

    Ok(())
}
