//! List commands implementation

use goflash_core::config::FirmwareConfig;
use goflash_core::container::{Container, IoSource};
use std::fs::File;
use std::path::{Path, PathBuf};

/// Shown for files whose header cannot be read
const UNREADABLE: &str = "(unreadable header)";

/// List all available flash devices
pub fn list_backends() {
    print!("{}", crate::devices::device_help());
}

/// Containers in `dir` with extension `extension`, sorted by name
///
/// Both the extension match and the ordering ignore case.
pub fn firmware_files(dir: &Path, extension: &str) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let matches = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(extension));
        if matches && path.is_file() {
            files.push(path);
        }
    }
    files.sort_by_cached_key(|p| {
        p.file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default()
    });
    Ok(files)
}

/// Description stored in a container's header
pub fn describe(path: &Path) -> Option<String> {
    let file = File::open(path).ok()?;
    let mut container = Container::open(IoSource(file)).ok()?;
    container.read_description().ok()
}

/// List the firmware directory
pub fn list_firmware(
    config: &FirmwareConfig,
    directory: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let dir = directory.unwrap_or(&config.directory);
    let files = firmware_files(dir, &config.extension)
        .map_err(|e| format!("Failed to read {}: {}", dir.display(), e))?;

    println!("Firmware in {}:", dir.display());
    println!();
    if files.is_empty() {
        println!("  (no .{} files)", config.extension);
    }
    for path in &files {
        let name = path.file_name().unwrap_or_default().to_string_lossy();
        let description = describe(path);
        if description.is_none() {
            log::debug!("No valid header in {}", path.display());
        }
        println!(
            "  {:<32} {}",
            name,
            description.as_deref().unwrap_or(UNREADABLE)
        );
    }

    let utility = match directory {
        Some(dir) => dir.join(&config.auxiliary_file),
        None => config.auxiliary_path(),
    };
    if utility.is_file() {
        println!();
        println!("Auxiliary payload: {}", utility.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use goflash_core::container::ContainerBuilder;

    #[test]
    fn test_firmware_files_sorted_case_insensitive() {
        let dir = std::env::temp_dir().join(format!("goflash-list-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();

        let image = ContainerBuilder::new("Snake v2").build();
        std::fs::write(dir.join("snake.fw"), &image).unwrap();
        std::fs::write(dir.join("Apple.FW"), b"not a container").unwrap();
        std::fs::write(dir.join("banana.fw"), &image).unwrap();
        std::fs::write(dir.join("notes.txt"), b"ignored").unwrap();

        let files = firmware_files(&dir, "fw").unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["Apple.FW", "banana.fw", "snake.fw"]);

        assert_eq!(describe(&files[0]), None);
        assert_eq!(describe(&files[2]).as_deref(), Some("Snake v2"));

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
