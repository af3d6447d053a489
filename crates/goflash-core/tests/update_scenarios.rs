//! End-to-end update runs against the in-memory flash emulator

use std::collections::VecDeque;

use goflash_core::boot::{OtaDataBoot, OtaSelectEntry};
use goflash_core::config::DeviceConfig;
use goflash_core::container::{
    Container, ContainerBuilder, PreviewTile, SliceSource, SlotHeader, HEADER_LEN, TILE_LEN,
};
use goflash_core::error::Error;
use goflash_core::input::{Buttons, GamepadState, InputReader};
use goflash_core::partition::{subtypes, types, Label, PartitionEntry, PartitionFlags, ENTRY_LEN};
use goflash_core::status::StatusSink;
use goflash_core::updater::{Outcome, State, Updater};
use goflash_dummy::{reference_partitions, DummyConfig, DummyFlash, FlashOp};

/// Replays a fixed sequence of debounced snapshots
struct ScriptedInput {
    steps: VecDeque<Buttons>,
    polls: usize,
}

impl ScriptedInput {
    fn new(steps: &[Buttons]) -> Self {
        Self {
            steps: steps.iter().copied().collect(),
            polls: 0,
        }
    }

    fn confirm() -> Self {
        Self::new(&[Buttons::empty(), Buttons::START])
    }

    fn cancel() -> Self {
        Self::new(&[Buttons::empty(), Buttons::empty(), Buttons::B])
    }
}

impl InputReader for ScriptedInput {
    fn read_state(&mut self) -> GamepadState {
        self.polls += 1;
        let pressed = self.steps.pop_front().expect("input script exhausted");
        GamepadState::new(pressed)
    }

    fn delay_ms(&mut self, ms: u32) {
        assert_eq!(ms, 100);
    }
}

#[derive(Default)]
struct RecordingStatus {
    headers: Vec<String>,
    messages: Vec<String>,
    progress: Vec<u8>,
    errors: Vec<String>,
}

impl StatusSink for RecordingStatus {
    fn show_header(&mut self, text: &str) {
        self.headers.push(text.to_string());
    }

    fn show_progress(&mut self, percent: u8) {
        self.progress.push(percent);
    }

    fn show_message(&mut self, text: &str) {
        self.messages.push(text.to_string());
    }

    fn show_error(&mut self, code: &str) {
        self.errors.push(code.to_string());
    }
}

fn zero_tile() -> PreviewTile {
    PreviewTile::from_le_bytes(&[0u8; TILE_LEN])
}

fn test_container() -> Vec<u8> {
    ContainerBuilder::new("test")
        .preview(zero_tile())
        .record(SlotHeader::new(0, 16, "app", 0x100000), &[0xA5; 0x100])
        .build()
}

fn run(
    flash: &mut DummyFlash,
    image: &[u8],
    aux: Option<&[u8]>,
    input: ScriptedInput,
) -> (
    Result<Outcome, goflash_core::updater::UpdateError>,
    RecordingStatus,
) {
    let mut status = RecordingStatus::default();
    let result = {
        let mut updater = Updater::new(
            flash,
            &mut status,
            input,
            OtaDataBoot::new(),
            DeviceConfig::default(),
        )
        .unwrap();
        updater.run(SliceSource::new(image), aux.map(SliceSource::new))
    };
    (result, status)
}

#[test]
fn happy_path_flashes_record_after_factory() {
    let mut flash = DummyFlash::reference();
    let image = test_container();
    let prefix = flash.data()[0x8000..0x8000 + 4 * ENTRY_LEN].to_vec();

    let (result, status) = run(&mut flash, &image, None, ScriptedInput::confirm());
    let summary = match result.unwrap() {
        Outcome::Restarted(summary) => summary,
        Outcome::Cancelled => panic!("update was cancelled"),
    };

    assert_eq!(summary.description, "test");
    assert_eq!(summary.bytes_written, 0x100);
    assert_eq!(status.headers, ["test"]);
    assert!(status.errors.is_empty());
    assert!(status.messages.iter().any(|m| m == "Erasing ... (0)"));
    assert!(status.messages.iter().any(|m| m == "Writing app (100%)"));

    // Payload at the end of the factory partition
    assert!(flash.data()[0x100000..0x100100].iter().all(|&b| b == 0xA5));
    assert!(flash.data()[0x100100..0x101000].iter().all(|&b| b == 0xFF));
    assert!(flash.ops().contains(&FlashOp::Erase {
        addr: 0x100000,
        len: 0x1000
    }));

    // Table keeps the prefix and gains the new entry
    assert_eq!(&flash.data()[0x8000..0x8000 + 4 * ENTRY_LEN], &prefix[..]);
    let entries = flash.partition_table().entries();
    assert_eq!(entries.len(), 5);
    assert_eq!(
        entries[4],
        PartitionEntry {
            partition_type: types::APP,
            subtype: subtypes::OTA_0,
            offset: 0x100000,
            size: 0x100000,
            label: Label::new("app"),
            flags: PartitionFlags::empty(),
        }
    );

    // otadata selects ota_0
    let select = OtaSelectEntry::parse(&flash.data()[0xD000..]).unwrap();
    assert!(select.is_valid());
    assert_eq!(select.ota_seq(), 1);
    assert_eq!(summary.boot.offset, 0x100000);
}

#[test]
fn flipped_checksum_halts_before_any_flash_operation() {
    let mut flash = DummyFlash::reference();
    let mut image = test_container();
    let last = image.len() - 1;
    image[last] ^= 0xFF;

    let (result, status) = run(&mut flash, &image, None, ScriptedInput::confirm());
    let err = result.unwrap_err();
    assert_eq!(err.state, State::VerifyingChecksum);
    assert!(matches!(err.error, Error::ChecksumMismatch { .. }));
    assert_eq!(status.errors, ["CHECKSUM MISMATCH ERROR"]);
    assert!(flash.is_untouched());
}

#[test]
fn corrupted_body_byte_fails_verification() {
    let image = test_container();
    for offset in [0usize, 30, HEADER_LEN + 3, image.len() - 5] {
        let mut corrupted = image.clone();
        corrupted[offset] ^= 0x01;
        let mut flash = DummyFlash::reference();
        let (result, _) = run(&mut flash, &corrupted, None, ScriptedInput::confirm());
        assert!(result.is_err(), "corruption at {} not detected", offset);
        assert!(flash.is_untouched());
    }
}

#[test]
fn oversized_data_length_rejected_before_flashing() {
    let mut flash = DummyFlash::reference();
    let image = ContainerBuilder::new("bad")
        .record(SlotHeader::new(0, 16, "app", 0x80), &[0u8; 0x100])
        .build();

    let (result, status) = run(&mut flash, &image, None, ScriptedInput::confirm());
    let err = result.unwrap_err();
    assert_eq!(err.state, State::FlashingRecords);
    assert_eq!(
        err.error,
        Error::DataLength {
            data_length: 0x100,
            slot_length: 0x80
        }
    );
    assert_eq!(status.errors, ["DATA LENGTH ERROR"]);
    assert!(flash.is_untouched());
}

#[test]
fn cancel_leaves_flash_untouched() {
    let mut flash = DummyFlash::reference();
    let before = flash.data().to_vec();
    let image = test_container();

    let (result, status) = run(&mut flash, &image, None, ScriptedInput::cancel());
    assert_eq!(result.unwrap(), Outcome::Cancelled);
    assert!(status.errors.is_empty());
    assert!(flash.ops().is_empty());
    assert!(flash.data() == &before[..]);
}

#[test]
fn held_start_is_not_a_confirmation() {
    let mut flash = DummyFlash::reference();
    let image = test_container();
    let input = ScriptedInput::new(&[Buttons::START, Buttons::START, Buttons::START | Buttons::B]);

    let (result, _) = run(&mut flash, &image, None, input);
    assert_eq!(result.unwrap(), Outcome::Cancelled);
}

#[test]
fn records_are_placed_back_to_back() {
    let mut flash = DummyFlash::reference();
    let image = ContainerBuilder::new("multi")
        .record(SlotHeader::new(0, 16, "app", 0x200000), &[1u8; 5000])
        .record(SlotHeader::new(1, 0x81, "empty", 0x10000), &[])
        .record(SlotHeader::new(1, 0x82, "data", 0x30000), &[2u8; 10])
        .build();

    let (result, _) = run(&mut flash, &image, None, ScriptedInput::confirm());
    let summary = match result.unwrap() {
        Outcome::Restarted(summary) => summary,
        Outcome::Cancelled => panic!("update was cancelled"),
    };

    let addresses: Vec<u32> = summary.partitions.iter().map(|p| p.address).collect();
    assert_eq!(addresses, [0x100000, 0x300000, 0x310000]);

    // Empty records get a table entry but no flash operations
    assert!(!flash
        .ops()
        .iter()
        .any(|op| matches!(op, FlashOp::Erase { addr: 0x300000, .. })));
    let entries = flash.partition_table().entries();
    assert_eq!(entries.len(), 7);
    for pair in entries[4..].windows(2) {
        assert_eq!(pair[1].offset, pair[0].offset + pair[0].size);
    }
    assert!(flash.data()[0x310000..0x31000A].iter().all(|&b| b == 2));
}

#[test]
fn auxiliary_payload_becomes_utility_partition() {
    let mut flash = DummyFlash::reference();
    let image = test_container();
    let aux = vec![0x3Cu8; 0x10000];

    let (result, status) = run(&mut flash, &image, Some(&aux), ScriptedInput::confirm());
    assert!(result.is_ok());
    assert!(status.messages.iter().any(|m| m == "Writing Utility"));

    let entries = flash.partition_table().entries();
    let utility = entries.last().unwrap();
    assert_eq!(utility.label, Label::new("utility"));
    assert_eq!(utility.partition_type, types::APP);
    assert_eq!(utility.subtype, subtypes::TEST);
    assert_eq!(utility.offset, 0x200000);
    // Already aligned sizes are kept as they are
    assert_eq!(utility.size, 0x10000);
    assert!(flash.data()[0x200000..0x210000].iter().all(|&b| b == 0x3C));
}

#[test]
fn missing_factory_partition_is_fatal() {
    let mut flash = DummyFlash::new_default();
    let image = test_container();

    let (result, status) = run(&mut flash, &image, None, ScriptedInput::confirm());
    let err = result.unwrap_err();
    assert_eq!(err.error, Error::NoFactoryPartition);
    assert_eq!(status.errors, ["NO FACTORY PARTITION ERROR"]);
    assert!(flash.is_untouched());
}

#[test]
fn wrapping_factory_partition_never_reaches_bootloader() {
    let mut partitions = reference_partitions();
    let factory = partitions
        .iter_mut()
        .find(|p| p.subtype == subtypes::FACTORY)
        .unwrap();
    factory.size = 0xFFFF_0000;
    let mut flash = DummyFlash::with_partitions(DummyConfig::default(), &partitions);
    flash.data_mut()[..4].copy_from_slice(&[0xE9, 0x03, 0x02, 0x20]);
    let image = ContainerBuilder::new("wrap")
        .record(SlotHeader::new(0, 16, "app", 0x10000), &[0xAB; 16])
        .build();

    let (result, status) = run(&mut flash, &image, None, ScriptedInput::confirm());
    let err = result.unwrap_err();
    assert_eq!(err.state, State::FlashingRecords);
    assert_eq!(err.error, Error::NoFactoryPartition);
    assert_eq!(status.errors, ["NO FACTORY PARTITION ERROR"]);
    assert_eq!(&flash.data()[..4], &[0xE9, 0x03, 0x02, 0x20]);
    assert!(flash.is_untouched());
}

#[test]
fn erase_failure_stops_without_table_update() {
    let mut flash = DummyFlash::reference();
    flash.fail_erase_at(0x100000);
    let table_before = flash.partition_table();
    let image = test_container();

    let (result, status) = run(&mut flash, &image, None, ScriptedInput::confirm());
    let err = result.unwrap_err();
    assert_eq!(err.state, State::FlashingRecords);
    assert_eq!(err.error, Error::EraseError { addr: 0x100000 });
    assert_eq!(status.errors, ["ERASE ERROR"]);
    assert_eq!(flash.partition_table(), table_before);
}

#[test]
fn container_size_identity() {
    let image = ContainerBuilder::new("sizes")
        .record(SlotHeader::new(0, 16, "a", 0x10000), &[0u8; 123])
        .record(SlotHeader::new(0, 17, "b", 0x10000), &[0u8; 4567])
        .build();
    let mut container = Container::open(SliceSource::new(&image)).unwrap();
    let parser = container.records(0x100000, &DeviceConfig::default());
    let records = parser.collect_records(container.source_mut()).unwrap();

    let payload: u64 = records.iter().map(|r| r.data_length as u64).sum();
    let framing = records.len() as u64 * 32;
    assert_eq!(
        HEADER_LEN as u64 + framing + payload + 4,
        container.file_size()
    );
}
