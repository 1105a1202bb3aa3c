//! List commands implementation

use super::PushFailure;
use serialport::{SerialPortInfo, SerialPortType};
use serialpush_proto::SerialPushError;

/// List serial ports known to the OS
pub fn list_ports() -> Result<(), PushFailure> {
    let ports = serialport::available_ports().map_err(SerialPushError::from)?;

    if ports.is_empty() {
        println!("No serial ports found.");
        return Ok(());
    }

    println!("Available serial ports:");
    println!();
    for port in &ports {
        println!("  {}", describe_port(port));
    }
    Ok(())
}

fn describe_port(port: &SerialPortInfo) -> String {
    match &port.port_type {
        SerialPortType::UsbPort(usb) => {
            let mut line = format!(
                "{:<24} USB {:04x}:{:04x}",
                port.port_name, usb.vid, usb.pid
            );
            if let Some(product) = &usb.product {
                line.push(' ');
                line.push_str(product);
            }
            if let Some(serial) = &usb.serial_number {
                line.push_str(&format!(" (serial {})", serial));
            }
            line
        }
        SerialPortType::BluetoothPort => format!("{:<24} Bluetooth", port.port_name),
        SerialPortType::PciPort => format!("{:<24} PCI", port.port_name),
        SerialPortType::Unknown => port.port_name.clone(),
    }
}
