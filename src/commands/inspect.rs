//! Inspect command implementation

use goflash_core::config::DeviceConfig;
use goflash_core::container::{Container, IoSource, HEADER_LEN};
use std::fs::File;
use std::path::Path;

/// Print a container's description, records and checksum status
///
/// Records are placed starting at `base`, as they would be after a factory
/// partition ending there. Nothing is written anywhere.
pub fn run_inspect(
    path: &Path,
    base: u32,
    config: &DeviceConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let file = File::open(path).map_err(|e| format!("Failed to open {}: {}", path.display(), e))?;
    let mut container = Container::open(IoSource(file))?;

    println!("Container:   {}", path.display());
    println!("Size:        {} bytes", container.file_size());
    println!("Description: {}", container.read_description()?);
    let tile = container.read_preview()?;
    println!(
        "Preview:     {} pixels, {} set",
        tile.pixels().len(),
        tile.pixels().iter().filter(|&&p| p != 0).count()
    );
    println!();

    println!(
        "{:<3} {:<16} {:>4} {:>7} {:>10} {:>10} {:>10}",
        "#", "Label", "Type", "SubType", "Address", "Length", "Data"
    );
    let mut parser = container.records(base, config);
    let mut count = 0usize;
    let mut payload = 0u64;
    let walk = loop {
        match parser.next_record(container.source_mut()) {
            Ok(Some(record)) => {
                println!(
                    "{:<3} {:<16} 0x{:02X} {:>7} 0x{:08X} 0x{:08X} {:>10}",
                    count,
                    record.slot.label.to_string(),
                    record.slot.partition_type,
                    format!("0x{:02X}", record.slot.subtype),
                    record.address,
                    record.slot.length,
                    record.data_length
                );
                count += 1;
                payload += record.data_length as u64;
            }
            Ok(None) => break Ok(()),
            Err(e) => break Err(e),
        }
    };
    println!();
    let invalid_record = match walk {
        Ok(()) => {
            println!(
                "{} record(s), {} payload bytes, {} bytes framing",
                count,
                payload,
                container.file_size() - payload - HEADER_LEN as u64
            );
            None
        }
        Err(e) => {
            println!("Record {} is invalid: {} ({})", count, e, e.code());
            Some(e)
        }
    };

    let mut scratch = vec![0u8; config.erase_block_size as usize];
    let checksum = container.verify_checksum(&mut scratch);
    match checksum {
        Ok(crc) => println!("Checksum:    0x{:08X} OK", crc),
        Err(e) => println!("Checksum:    {} ({})", e, e.code()),
    }

    if let Some(e) = invalid_record {
        return Err(format!("Container is not flashable: record {}: {}", count, e).into());
    }
    checksum.map_err(|e| format!("Container is not flashable: {}", e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use goflash_core::container::{ContainerBuilder, SlotHeader};
    use std::path::PathBuf;

    fn write_temp(name: &str, image: &[u8]) -> PathBuf {
        let path = std::env::temp_dir().join(format!("goflash-inspect-{}-{}", std::process::id(), name));
        std::fs::write(&path, image).unwrap();
        path
    }

    #[test]
    fn test_inspect_exit_status() {
        let config = DeviceConfig::default();
        let good = ContainerBuilder::new("good")
            .record(SlotHeader::new(0, 16, "app", 0x10000), &[0x5A; 64])
            .build();

        let path = write_temp("good", &good);
        assert!(run_inspect(&path, 0x100000, &config).is_ok());
        std::fs::remove_file(&path).unwrap();

        let mut corrupt = good.clone();
        let last = corrupt.len() - 1;
        corrupt[last] ^= 0xFF;
        let path = write_temp("crc", &corrupt);
        assert!(run_inspect(&path, 0x100000, &config).is_err());
        std::fs::remove_file(&path).unwrap();

        let oversized = ContainerBuilder::new("bad")
            .record(SlotHeader::new(0, 16, "app", 0x80), &[0u8; 0x100])
            .build();
        let path = write_temp("record", &oversized);
        let err = run_inspect(&path, 0x100000, &config).unwrap_err();
        assert!(err.to_string().contains("record 0"));
        std::fs::remove_file(&path).unwrap();
    }
}
