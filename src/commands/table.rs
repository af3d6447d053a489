//! Partition table commands on raw flash images

use goflash_core::config::DeviceConfig;
use goflash_core::partition::{PartitionEntry, PartitionTable};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

/// Read the partition table region of an image file
fn read_table(path: &Path, config: &DeviceConfig) -> Result<PartitionTable, Box<dyn std::error::Error>> {
    let mut file =
        File::open(path).map_err(|e| format!("Failed to open {}: {}", path.display(), e))?;
    let mut region = vec![0u8; config.table_max_len as usize];
    file.seek(SeekFrom::Start(config.table_offset as u64))?;
    file.read_exact(&mut region).map_err(|e| {
        format!(
            "{} has no partition table at 0x{:X}: {}",
            path.display(),
            config.table_offset,
            e
        )
    })?;
    Ok(PartitionTable::from_bytes(config.table_offset, &region))
}

/// Print a table in the same columns `show` uses
pub fn print_table(entries: &[PartitionEntry]) {
    println!(
        "{:<3} {:<16} {:<8} {:>4} {:>7} {:>10} {:>10} {:>9}",
        "#", "Label", "Kind", "Type", "SubType", "Offset", "Size", "Flags"
    );
    for (i, entry) in entries.iter().enumerate() {
        println!(
            "{:<3} {:<16} {:<8} 0x{:02X} {:>7} 0x{:08X} 0x{:08X} {:>9}",
            i,
            entry.label.to_string(),
            entry.type_name(),
            entry.partition_type,
            format!("0x{:02X}", entry.subtype),
            entry.offset,
            entry.size,
            format!("0x{:X}", entry.flags.bits())
        );
    }
}

/// Show the partition table of an image
pub fn cmd_show(path: &Path, config: &DeviceConfig) -> Result<(), Box<dyn std::error::Error>> {
    let table = read_table(path, config)?;
    let entries = table.entries();

    println!(
        "Partition table at 0x{:X} ({} of {} slots used)",
        table.offset(),
        table.used_slots(),
        table.max_entries()
    );
    println!();
    print_table(&entries);
    if let Some(anchor) = entries.iter().find(|e| e.is_factory()) {
        println!();
        println!(
            "Factory partition '{}' ends at 0x{:08X}",
            anchor.label,
            anchor.end()
        );
    }
    Ok(())
}

/// Copy the image prefix that holds every partition
pub fn cmd_extract(
    input: &Path,
    output: &Path,
    config: &DeviceConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let table = read_table(input, config)?;
    let end = table.data_end();
    if end == 0 {
        return Err(format!("No partitions in {}", input.display()).into());
    }

    let image = std::fs::read(input)?;
    if end > image.len() as u64 {
        return Err(format!(
            "Partitions end at 0x{:X} but {} is only 0x{:X} bytes",
            end,
            input.display(),
            image.len()
        )
        .into());
    }

    std::fs::write(output, &image[..end as usize])?;
    println!(
        "Wrote {} bytes (0x{:X}) to {}",
        end,
        end,
        output.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use goflash_dummy::DummyFlash;

    #[test]
    fn test_extract_stops_at_last_partition() {
        let flash = DummyFlash::reference();
        let dir = std::env::temp_dir();
        let input = dir.join(format!("goflash-table-in-{}.bin", std::process::id()));
        let output = dir.join(format!("goflash-table-out-{}.bin", std::process::id()));
        std::fs::write(&input, flash.data()).unwrap();

        let config = DeviceConfig::default();
        let table = read_table(&input, &config).unwrap();
        assert_eq!(table.entries().len(), 4);

        cmd_extract(&input, &output, &config).unwrap();
        let extracted = std::fs::read(&output).unwrap();
        assert_eq!(extracted.len(), 0x100000);
        assert_eq!(&extracted[..], &flash.data()[..0x100000]);

        std::fs::remove_file(&input).unwrap();
        std::fs::remove_file(&output).unwrap();
    }
}
