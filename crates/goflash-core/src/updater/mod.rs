//! The update sequence
//!
//! [`Updater::run`] takes a container from header validation to restart:
//!
//! ```text
//! ValidatingHeader -> ShowingPreview -> AwaitingConfirmation
//!     -> VerifyingChecksum -> FlashingRecords -> FlashingAuxiliary
//!     -> RebuildingTable -> SwitchingBoot -> Rebooting
//! ```
//!
//! Any error stops the sequence where it is, shows the error code through
//! the status sink and is returned as an [`UpdateError`]. Cancelling at the
//! confirmation prompt returns [`Outcome::Cancelled`] before flash is
//! touched.

mod state;

pub use state::{Outcome, State, UpdateError, UpdateSummary};

use alloc::format;
use alloc::vec::Vec;

use crate::boot::BootControl;
use crate::config::DeviceConfig;
use crate::container::{Container, ImageSource, Record, SlotHeader};
use crate::error::{Error, Result};
use crate::flash::{align_up, FlashDevice, FlashWriter};
use crate::input::{Buttons, InputReader};
use crate::partition::PartitionTable;
use crate::plan::{FlashPlan, PlanEntry};
use crate::status::{percent, StatusSink};

/// Button that starts the update
pub const CONFIRM_BUTTON: Buttons = Buttons::START;
/// Button that cancels the update
pub const CANCEL_BUTTON: Buttons = Buttons::B;

/// Runs one firmware update against one flash device
pub struct Updater<'a, D, S, I, B>
where
    D: FlashDevice + ?Sized,
    S: StatusSink,
    I: InputReader,
    B: BootControl,
{
    flash: FlashWriter<'a, D>,
    status: S,
    input: I,
    boot: B,
    config: DeviceConfig,
}

impl<'a, D, S, I, B> Updater<'a, D, S, I, B>
where
    D: FlashDevice + ?Sized,
    S: StatusSink,
    I: InputReader,
    B: BootControl,
{
    /// Set up an updater; fails if `config` does not match the device
    pub fn new(device: &'a mut D, status: S, input: I, boot: B, config: DeviceConfig) -> Result<Self> {
        config.validate()?;
        if device.size() < config.flash_size {
            log::error!(
                "device is 0x{:X} bytes, config expects 0x{:X}",
                device.size(),
                config.flash_size
            );
            return Err(Error::AddressOutOfBounds);
        }
        if device.erase_granularity() != config.erase_block_size {
            log::error!(
                "device erase block 0x{:X} differs from config 0x{:X}",
                device.erase_granularity(),
                config.erase_block_size
            );
            return Err(Error::InvalidAlignment);
        }
        Ok(Self {
            flash: FlashWriter::new(device),
            status,
            input,
            boot,
            config,
        })
    }

    /// Device configuration in use
    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    /// The status sink
    pub fn status(&mut self) -> &mut S {
        &mut self.status
    }

    /// Give back the collaborators
    pub fn into_parts(self) -> (S, I, B) {
        (self.status, self.input, self.boot)
    }

    /// Run the full update
    ///
    /// `auxiliary` is the optional payload flashed after the container's
    /// records as the `utility` partition.
    pub fn run<F, A>(&mut self, firmware: F, auxiliary: Option<A>) -> core::result::Result<Outcome, UpdateError>
    where
        F: ImageSource,
        A: ImageSource,
    {
        let mut state = State::ValidatingHeader;
        match self.sequence(&mut state, firmware, auxiliary) {
            Ok(outcome) => Ok(outcome),
            Err(error) => {
                log::error!("update aborted while {}: {}", state, error);
                self.status.show_error(error.code());
                Err(UpdateError { state, error })
            }
        }
    }

    fn sequence<F, A>(&mut self, state: &mut State, firmware: F, auxiliary: Option<A>) -> Result<Outcome>
    where
        F: ImageSource,
        A: ImageSource,
    {
        *state = State::ValidatingHeader;
        let mut container = Container::open(firmware)?;
        let description = container.read_description()?;
        log::info!("firmware: '{}'", description);

        *state = State::ShowingPreview;
        let tile = container.read_preview()?;
        self.status.show_header(&description);
        self.status.show_preview(&tile);

        *state = State::AwaitingConfirmation;
        self.status.show_message("[START]");
        self.status.show_footer("[B] Cancel");
        if !self.await_confirmation() {
            log::info!("update cancelled by operator");
            return Ok(Outcome::Cancelled);
        }
        self.status.show_footer("");

        *state = State::VerifyingChecksum;
        let mut scratch = allocate_scratch(self.config.erase_block_size as usize)?;
        self.status.show_progress(0);
        self.status.show_message("Verifying ...");
        let checksum = container.verify_checksum(&mut scratch)?;
        self.status.show_progress(100);

        *state = State::FlashingRecords;
        let mut table = PartitionTable::load(&mut self.flash, &self.config)?;
        let anchor = table.locate_anchor(self.config.flash_size)?;
        log::info!(
            "factory partition '{}' ends at 0x{:08X}",
            anchor.entry.label,
            anchor.base_address()
        );

        let mut plan = FlashPlan::new();
        let mut bytes_written = 0u64;
        let mut parser = container.records(anchor.base_address(), &self.config);
        while let Some(record) = parser.next_record(container.source_mut())? {
            let index = plan.len();
            plan.push(PlanEntry::from(&record))?;
            if record.data_length > 0 {
                self.flash_record(container.source_mut(), &record, index, &mut scratch)?;
                bytes_written += record.data_length as u64;
            }
        }
        // Release the container before touching the auxiliary payload
        drop(container);

        if let Some(aux) = auxiliary {
            *state = State::FlashingAuxiliary;
            bytes_written += self.flash_auxiliary(aux, parser.cursor(), &mut plan, &mut scratch)? as u64;
        }

        *state = State::RebuildingTable;
        self.status.show_progress(0);
        self.status.show_message("Writing partition table ...");
        table.rebuild(&plan)?;
        table.commit(&mut self.flash)?;
        self.status.show_progress(100);

        *state = State::SwitchingBoot;
        let boot = self.boot.set_next_boot_slot(&mut self.flash, &table)?;

        *state = State::Rebooting;
        self.status.show_message("Restarting ...");
        self.boot.restart()?;

        Ok(Outcome::Restarted(UpdateSummary {
            description,
            checksum,
            partitions: plan.iter().copied().collect::<Vec<_>>(),
            bytes_written,
            boot,
        }))
    }

    /// Poll until a rising edge on START (true) or B (false)
    fn await_confirmation(&mut self) -> bool {
        let mut previous = self.input.read_state();
        loop {
            self.input.delay_ms(self.config.poll_interval_ms);
            let current = self.input.read_state();
            let edges = current.newly_pressed(&previous);
            previous = current;

            if edges.contains(CONFIRM_BUTTON) {
                return true;
            }
            if edges.contains(CANCEL_BUTTON) {
                return false;
            }
        }
    }

    fn flash_record<S2: ImageSource + ?Sized>(
        &mut self,
        source: &mut S2,
        record: &Record,
        index: usize,
        scratch: &mut [u8],
    ) -> Result<()> {
        self.status.show_progress(0);
        self.status.show_message(&format!("Erasing ... ({})", index));
        self.flash.erase(record.address, record.data_length)?;

        let label = record.slot.label;
        let total = record.data_length;
        let status = &mut self.status;
        let mut last = u8::MAX;
        self.flash.copy_from(
            source,
            record.data_offset,
            record.address,
            total,
            scratch,
            |written| {
                let p = percent(written, total);
                if p != last {
                    last = p;
                    status.show_progress(p);
                    status.show_message(&format!("Writing {} ({}%)", label, p));
                }
            },
        )?;
        log::info!(
            "OK: [{}] '{}' 0x{:X} bytes at 0x{:08X}",
            index,
            label,
            total,
            record.address
        );
        Ok(())
    }

    fn flash_auxiliary<A: ImageSource>(
        &mut self,
        mut aux: A,
        cursor: u32,
        plan: &mut FlashPlan,
        scratch: &mut [u8],
    ) -> Result<u32> {
        let alignment = self.config.partition_alignment;
        let length = aux.source_len()?;
        if length == 0 {
            log::warn!("auxiliary payload is empty, skipping");
            return Ok(0);
        }

        let address = align_up(cursor, alignment).ok_or(Error::Misaligned { address: cursor })?;
        let too_big = Error::CapacityExceeded { address, length: u32::MAX };
        let length = u32::try_from(length).map_err(|_| too_big)?;
        let reserved = align_up(length, alignment).ok_or(too_big)?;
        if address as u64 + reserved as u64 > self.config.flash_size as u64 {
            log::error!(
                "auxiliary payload 0x{:X} at 0x{:08X} exceeds flash",
                reserved,
                address
            );
            return Err(Error::CapacityExceeded {
                address,
                length: reserved,
            });
        }
        plan.push(PlanEntry::new(SlotHeader::utility(reserved), address))?;

        self.status.show_progress(0);
        self.status.show_message("Erasing Utility ...");
        self.flash.erase(address, length)?;

        self.status.show_message("Writing Utility");
        let status = &mut self.status;
        let written = self.flash.copy_from(&mut aux, 0, address, length, scratch, |written| {
            status.show_progress(percent(written, length));
        })?;
        log::info!(
            "OK: utility 0x{:X} bytes at 0x{:08X}, reserved 0x{:X}",
            written,
            address,
            reserved
        );
        Ok(written)
    }
}

fn allocate_scratch(len: usize) -> Result<Vec<u8>> {
    let mut scratch = Vec::new();
    scratch.try_reserve_exact(len).map_err(|_| Error::OutOfMemory)?;
    scratch.resize(len, 0);
    Ok(scratch)
}
