//! Header inspection and port listing.

use super::Context;
use anyhow::Result;
use console::style;
use mapflash::{FILE_HEADER_LEN, FileHeader, HeaderError, MemoryAccess};

pub(crate) fn cmd_header(ctx: &Context, section_name: &str) -> Result<()> {
    let section = ctx.config.section(section_name)?;
    let mut channel = ctx.open_channel()?;

    let mut access = MemoryAccess::new(&mut channel);
    let head = access.read(
        section.address,
        FILE_HEADER_LEN,
        section.transfer_flags(false),
        &ctx.cancel,
        &mut |_, _| {},
    )?;
    let mut bytes = [0u8; FILE_HEADER_LEN];
    bytes.copy_from_slice(&head);

    println!(
        "Section \"{}\" at {:#010X} ({} byte order)",
        section.name,
        section.address,
        if section.big_endian_header {
            "big-endian"
        } else {
            "little-endian"
        }
    );

    match FileHeader::decode(&bytes, section.big_endian_header) {
        Ok(header) => {
            print_header(&header);
            if !header.fits_in(section.size) {
                println!(
                    "{} file of {} bytes exceeds the section's {} bytes",
                    style("!").yellow(),
                    header.total_len(),
                    section.size
                );
            }
        },
        Err(HeaderError::Absent) => {
            println!("{} no file present (section erased)", style("!").yellow());
        },
        Err(HeaderError::CrcMismatch { header, computed }) => {
            println!(
                "{} header CRC mismatch: stored {:#010X}, computed {computed:#010X}",
                style("!").red(),
                header.header_crc
            );
            print_header(&header);
        },
    }

    Ok(())
}

fn print_header(header: &FileHeader) {
    println!("  file size:  {} bytes", header.file_size);
    println!("  version:    {:#010X}", header.version);
    println!("  file CRC:   {:#010X}", header.file_crc);
    println!("  header CRC: {:#010X}", header.header_crc);
}

pub(crate) fn cmd_ports(_ctx: &Context) -> Result<()> {
    let ports = serialport::available_ports()?;
    if ports.is_empty() {
        println!("No serial ports found.");
        return Ok(());
    }

    for port in ports {
        match port.port_type {
            serialport::SerialPortType::UsbPort(info) => {
                let product = info.product.as_deref().unwrap_or("USB serial");
                println!(
                    "{}  {product} [{:04x}:{:04x}]",
                    port.port_name, info.vid, info.pid
                );
            },
            _ => println!("{}", port.port_name),
        }
    }
    Ok(())
}
