//! Video related code for Core0
//!
//! Core 1 owns the HDMI engine. We own the framebuffer, and talk to Core 1
//! over the SIO FIFO.

// -----------------------------------------------------------------------------
// Licence Statement
// -----------------------------------------------------------------------------
// Copyright (c) The pico-hdmi-rs developers, 2026
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later
// version.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE.  See the GNU General Public License for more
// details.
//
// You should have received a copy of the GNU General Public License along with
// this program.  If not, see <https://www.gnu.org/licenses/>.
// -----------------------------------------------------------------------------

use core::cell::UnsafeCell;

use rp2040_hal::sio::SioFifo;
use scanout::{Command, GraphicsMode, InitError, RGBColour, Report, Response};

pub static FRAME_BUFFER: FrameBuffer = FrameBuffer::new();

/// Holds a 320x240 picture, with one palette index per pixel
#[repr(align(4))]
pub struct FrameBuffer {
    contents: UnsafeCell<[u8; Self::LENGTH]>,
}

impl FrameBuffer {
    pub const WIDTH: u16 = 320;
    pub const HEIGHT: u16 = 240;
    const LENGTH: usize = Self::WIDTH as usize * Self::HEIGHT as usize;

    pub const fn new() -> Self {
        FrameBuffer {
            contents: UnsafeCell::new([0u8; Self::LENGTH]),
        }
    }

    pub fn get_ptr(&self) -> *const u8 {
        self.contents.get() as *const u8
    }

    pub fn store_at(&self, index: u8, x: u16, y: u16) {
        if x >= Self::WIDTH || y >= Self::HEIGHT {
            return;
        }
        let ptr = self.contents.get() as *mut u8;
        let offset = (usize::from(y) * usize::from(Self::WIDTH)) + usize::from(x);
        unsafe {
            ptr.add(offset).write_volatile(index);
        }
    }

    pub fn read_at(&self, x: u16, y: u16) -> u8 {
        if x >= Self::WIDTH || y >= Self::HEIGHT {
            return 0;
        }
        let ptr = self.contents.get() as *const u8;
        let offset = (usize::from(y) * usize::from(Self::WIDTH)) + usize::from(x);
        unsafe { ptr.add(offset).read_volatile() }
    }

    /// Fill a rectangle, clipped to the buffer
    pub fn fill(&self, index: u8, x: u16, y: u16, width: u16, height: u16) {
        let x_end = x.saturating_add(width).min(Self::WIDTH);
        let y_end = y.saturating_add(height).min(Self::HEIGHT);
        for row in y..y_end {
            for col in x..x_end {
                self.store_at(index, col, row);
            }
        }
    }
}

// Core 1 only ever reads it
unsafe impl Sync for FrameBuffer {}

/// Something Core 1 told us that we did not want to hear.
#[derive(Debug, Copy, Clone, PartialEq, Eq, defmt::Format)]
pub enum Error {
    /// Core 1 could not start the video pipeline
    Init(InitError),
    /// Core 1 said something we did not understand
    Unexpected(u32),
    /// The framebuffer is not somewhere Core 1 can use
    BadFramebuffer,
}

/// Talks to the HDMI engine on Core 1.
pub struct Display {
    fifo: SioFifo,
}

impl Display {
    /// Wrap the FIFO that Core 1 was started on.
    pub fn new(fifo: SioFifo) -> Display {
        Display { fifo }
    }

    /// Wait for Core 1 to say the pipeline is running.
    ///
    /// Returns whether the PIO clock divider has a fractional part.
    pub fn wait_for_start(&mut self) -> Result<bool, Error> {
        let word = self.fifo.read_blocking();
        match Report::decode(word) {
            Some(report) => self.started(report),
            None => Err(Error::Unexpected(word)),
        }
    }

    /// Send a command, and wait for the reply if it has one.
    pub fn send(&mut self, command: Command) -> Option<u32> {
        let (word, data) = command.encode();
        self.fifo.write_blocking(word);
        if let Some(data) = data {
            self.fifo.write_blocking(data);
        }
        if command.has_reply() {
            Some(self.read_reply(&command))
        } else {
            None
        }
    }

    pub fn video_mode(&mut self) -> u32 {
        self.send(Command::GetVideoMode).unwrap_or_default()
    }

    /// Show a framebuffer.
    ///
    /// Set the resolution first, as Core 1 checks the whole buffer fits.
    pub fn set_framebuffer(&mut self, buffer: &'static FrameBuffer) -> Result<(), Error> {
        let command =
            Command::set_framebuffer(buffer.get_ptr() as usize).ok_or(Error::BadFramebuffer)?;
        match self.send(command) {
            Some(1) => Ok(()),
            _ => Err(Error::BadFramebuffer),
        }
    }

    pub fn framebuffer(&mut self) -> *const u8 {
        self.send(Command::GetFramebuffer).unwrap_or_default() as *const u8
    }

    pub fn set_resolution(&mut self, width: u16, height: u16) {
        self.send(Command::SetResolution { width, height });
    }

    pub fn resolution(&mut self) -> (u16, u16) {
        let value = self.send(Command::GetResolution).unwrap_or_default();
        ((value >> 16) as u16, value as u16)
    }

    pub fn set_shift(&mut self, x: i16, y: i16) {
        self.send(Command::SetShift { x, y });
    }

    pub fn scan_line(&mut self) -> u32 {
        self.send(Command::GetScanLine).unwrap_or_default()
    }

    pub fn set_palette(&mut self, index: u8, colour: RGBColour) {
        self.send(Command::SetPalette { index, colour });
    }

    pub fn palette(&mut self, index: u8) -> RGBColour {
        RGBColour(self.send(Command::GetPalette { index }).unwrap_or_default())
    }

    pub fn effective_colour(&mut self, index: u8) -> RGBColour {
        RGBColour(
            self.send(Command::GetEffectiveColour { index })
                .unwrap_or_default(),
        )
    }

    pub fn set_background(&mut self, colour: RGBColour) {
        self.send(Command::SetBackground { colour });
    }

    pub fn set_fade(&mut self, level: u8, rows: u16) {
        self.send(Command::SetFade { level, rows });
    }

    pub fn fade_level(&mut self) -> u32 {
        self.send(Command::GetFadeLevel).unwrap_or_default()
    }

    pub fn restore_sync_colours(&mut self) {
        self.send(Command::RestoreSyncColours);
    }

    pub fn set_graphics_mode(&mut self, mode: GraphicsMode) {
        self.send(Command::SetGraphicsMode { mode });
    }

    pub fn set_loading_mode(&mut self, enabled: bool) {
        self.send(Command::SetLoadingMode { enabled });
    }

    pub fn loading_mode(&mut self) -> bool {
        self.send(Command::GetLoadingMode).unwrap_or_default() != 0
    }

    pub fn swap_count(&mut self) -> u32 {
        self.send(Command::GetSwapCount).unwrap_or_default()
    }

    pub fn irq_count(&mut self) -> u32 {
        self.send(Command::GetIrqCount).unwrap_or_default()
    }

    pub fn underrun_count(&mut self) -> u32 {
        self.send(Command::GetUnderrunCount).unwrap_or_default()
    }

    /// Tear the pipeline down and build it again.
    ///
    /// Returns whether the PIO clock divider has a fractional part.
    pub fn restart(&mut self) -> Result<bool, Error> {
        let word = self.send(Command::Restart).unwrap_or_default();
        match Report::decode(word) {
            Some(report) => self.started(report),
            None => Err(Error::Unexpected(word)),
        }
    }

    /// Did that report say the pipeline is running?
    fn started(&mut self, report: Report) -> Result<bool, Error> {
        match report {
            Report::Started { fractional_divider } => Ok(fractional_divider),
            Report::InitFailed(e) => Err(Error::Init(e)),
            crash => self.core1_crashed(crash),
        }
    }

    /// Wait for the reply to `command`.
    ///
    /// Reports that arrive first are dealt with, and anything else is
    /// dropped.
    fn read_reply(&mut self, command: &Command) -> u32 {
        loop {
            match Response::read(command, || self.fifo.read_blocking()) {
                Response::Reply(word) => return word,
                Response::Report(report @ (Report::Started { .. } | Report::InitFailed(_))) => {
                    defmt::warn!("Core 1 sent {} while we waited for {}", report, command);
                }
                Response::Report(report) => self.core1_crashed(report),
                Response::Stray(word) => {
                    defmt::warn!("Dropping {=u32:08x} while we wait for {}", word, command);
                }
            }
        }
    }

    /// Core 1 has died. Collect what it has to say about it, and die too.
    fn core1_crashed(&mut self, report: Report) -> ! {
        match report {
            Report::Panic => {
                let line = self.fifo.read_blocking();
                defmt::panic!("Core 1 panicked at line {=u32}", line);
            }
            Report::PanicNoLocation => {
                defmt::panic!("Core 1 panicked");
            }
            Report::HardFault => {
                let mut frame = [0u32; 8];
                for word in frame.iter_mut() {
                    *word = self.fifo.read_blocking();
                }
                defmt::panic!(
                    "Core 1 hard fault: r0={=u32:08x} r1={=u32:08x} r2={=u32:08x} r3={=u32:08x} r12={=u32:08x} lr={=u32:08x} pc={=u32:08x} xpsr={=u32:08x}",
                    frame[0],
                    frame[1],
                    frame[2],
                    frame[3],
                    frame[4],
                    frame[5],
                    frame[6],
                    frame[7]
                );
            }
            other => defmt::panic!("Core 1 stopped: {}", other),
        }
    }
}

// -----------------------------------------------------------------------------
// End of file
// -----------------------------------------------------------------------------
