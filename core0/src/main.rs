//! # pico-hdmi-rs
//!
//! Rust Firmware for HDMI (DVI) video output on the RP2040.
//!
//! This is the firmware for Core 0. It sets up the clocks and pins, starts
//! the HDMI engine on Core 1, and then runs a demo that drives the engine
//! through its paces.

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

#![no_std]
#![no_main]

mod hw;
mod video;

use defmt_rtt as _;
use embedded_hal::{delay::DelayNs, digital::StatefulOutputPin};
use fugit::ExtU64;
use panic_probe as _;
use rp2040_hal as hal;

use hal::pac;
use scanout::{fade::FADE_MAX_LEVEL, GraphicsMode, RGBColour};
use video::{Display, FrameBuffer, FRAME_BUFFER};

#[link_section = ".boot2"]
#[no_mangle]
#[used]
pub static BOOT2_FIRMWARE: [u8; 256] = rp2040_boot2::BOOT_LOADER_W25Q080;

/// The sixteen colours everyone knows, in indices 0 to 15
const BASIC_COLOURS: [RGBColour; 16] = [
    RGBColour::from_24bit(0x00, 0x00, 0x00),
    RGBColour::from_24bit(0x00, 0x00, 0xAA),
    RGBColour::from_24bit(0x00, 0xAA, 0x00),
    RGBColour::from_24bit(0x00, 0xAA, 0xAA),
    RGBColour::from_24bit(0xAA, 0x00, 0x00),
    RGBColour::from_24bit(0xAA, 0x00, 0xAA),
    RGBColour::from_24bit(0xAA, 0x55, 0x00),
    RGBColour::from_24bit(0xAA, 0xAA, 0xAA),
    RGBColour::from_24bit(0x55, 0x55, 0x55),
    RGBColour::from_24bit(0x55, 0x55, 0xFF),
    RGBColour::from_24bit(0x55, 0xFF, 0x55),
    RGBColour::from_24bit(0x55, 0xFF, 0xFF),
    RGBColour::from_24bit(0xFF, 0x55, 0x55),
    RGBColour::from_24bit(0xFF, 0x55, 0xFF),
    RGBColour::from_24bit(0xFF, 0xFF, 0x55),
    RGBColour::from_24bit(0xFF, 0xFF, 0xFF),
];

/// Where the grey ramp starts
const GREY_BASE: u8 = 16;

/// How many greys there are
const GREY_COUNT: u8 = 64;

/// Where the 6x6x6 colour cube starts
const CUBE_BASE: u8 = GREY_BASE + GREY_COUNT;

/// Scan-lines in the one video mode we have
const LINES_PER_FRAME: u32 = 525;

/// The steps of a demo, each of which runs for a few seconds.
#[derive(Debug, Copy, Clone, PartialEq, Eq, defmt::Format)]
enum DemoStep {
    /// Just the test card
    TestCard,
    /// Fade everything to black and back
    FadeAll,
    /// Fade the colour cube only
    FadeCube,
    /// Slide the picture about
    Shift,
    /// Skip the window and show rows as-is
    Direct,
    /// Blank the picture while we redraw it
    Loading,
    /// Rebuild the whole video pipeline
    Restart,
}

impl DemoStep {
    const ALL: [DemoStep; 7] = [
        DemoStep::TestCard,
        DemoStep::FadeAll,
        DemoStep::FadeCube,
        DemoStep::Shift,
        DemoStep::Direct,
        DemoStep::Loading,
        DemoStep::Restart,
    ];

    /// How long each step lasts, in frames
    const FRAMES: u32 = 180;
}

#[hal::entry]
fn main() -> ! {
    defmt::info!(
        "Firmware {} {} starting up",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    );

    let Some(periph) = pac::Peripherals::take() else {
        defmt::panic!("Peripherals already taken?!");
    };
    let mut hw = match hw::Hardware::init(periph) {
        Ok(hw) => hw,
        Err(e) => defmt::panic!("Hardware init failed: {}", e),
    };

    let mut display = Display::new(hw.fifo);
    match display.wait_for_start() {
        Ok(true) => {
            defmt::warn!("Core 1 is using a fractional PIO divider. Monitors may not lock.")
        }
        Ok(false) => defmt::info!("Core 1 is running video mode {}", display.video_mode()),
        Err(e) => defmt::panic!("Core 1 failed to start: {}", e),
    }

    // Keep the screen blank whilst we draw the first picture
    display.set_loading_mode(true);
    load_palette(&mut display);
    draw_test_card(&FRAME_BUFFER);
    display.set_resolution(FrameBuffer::WIDTH, FrameBuffer::HEIGHT);
    if let Err(e) = display.set_framebuffer(&FRAME_BUFFER) {
        defmt::panic!("Core 1 rejected our framebuffer: {}", e);
    }
    display.set_shift(0, 0);
    display.set_graphics_mode(GraphicsMode::Windowed);
    display.set_background(RGBColour::from_24bit(0x10, 0x10, 0x30));
    display.set_loading_mode(false);

    let (width, height) = display.resolution();
    defmt::info!(
        "Framebuffer at {=usize:08x}, {=u16}x{=u16}",
        display.framebuffer() as usize,
        width,
        height
    );
    defmt::info!(
        "Palette entry 15 is {=u32:06x}, showing as {=u32:06x}",
        display.palette(15).0,
        display.effective_colour(15).0
    );

    let mut step_index = 0;
    let mut step_start = display.irq_count();
    let mut next_report = hw.timer.get_counter();
    defmt::info!("Demo step {}", DemoStep::ALL[step_index]);

    loop {
        let step = DemoStep::ALL[step_index];
        let irq_count = display.irq_count();
        // One interrupt per scan-line
        let frame = irq_count.wrapping_sub(step_start) / LINES_PER_FRAME;

        match step {
            DemoStep::TestCard => {}
            DemoStep::FadeAll => {
                display.set_fade(triangle(irq_count / 800, FADE_MAX_LEVEL), 0);
            }
            DemoStep::FadeCube => {
                // The colour cube starts at row 5
                display.set_fade(triangle(irq_count / 800, FADE_MAX_LEVEL), 0xFFE0);
            }
            DemoStep::Shift => {
                let x = i16::from(triangle(irq_count / 1000, 80)) - 40;
                let y = i16::from(triangle(irq_count / 1500, 60)) - 30;
                display.set_shift(x, y);
            }
            DemoStep::Direct => {}
            DemoStep::Loading => {}
            DemoStep::Restart => {}
        }

        if frame >= DemoStep::FRAMES {
            // Tidy up after the step that just finished
            match step {
                DemoStep::FadeAll | DemoStep::FadeCube => {
                    display.set_fade(0, 0);
                    display.restore_sync_colours();
                }
                DemoStep::Shift => display.set_shift(0, 0),
                DemoStep::Direct => display.set_graphics_mode(GraphicsMode::Windowed),
                DemoStep::Loading | DemoStep::TestCard | DemoStep::Restart => {}
            }
            step_index = (step_index + 1) % DemoStep::ALL.len();
            let step = DemoStep::ALL[step_index];
            defmt::info!("Demo step {}", step);
            // Start the step that is next
            match step {
                DemoStep::Direct => display.set_graphics_mode(GraphicsMode::Direct),
                DemoStep::Loading => {
                    display.set_loading_mode(true);
                    draw_test_card(&FRAME_BUFFER);
                    defmt::info!("Loading mode is {=bool}", display.loading_mode());
                    display.set_loading_mode(false);
                }
                DemoStep::Restart => match display.restart() {
                    Ok(fractional) => {
                        defmt::info!("Core 1 restarted (fractional divider: {=bool})", fractional)
                    }
                    Err(e) => defmt::panic!("Core 1 failed to restart: {}", e),
                },
                _ => {}
            }
            step_start = display.irq_count();
        }

        let now = hw.timer.get_counter();
        if now >= next_report {
            next_report = now + 1.secs();
            defmt::info!(
                "swaps={=u32} irqs={=u32} underruns={=u32} line={=u32} fade={=u32}",
                display.swap_count(),
                display.irq_count(),
                display.underrun_count(),
                display.scan_line(),
                display.fade_level()
            );
            _ = hw.led.toggle();
        }

        hw.timer.delay_ms(10);
    }
}

/// Fill the palette: basic colours, a grey ramp, then a colour cube.
///
/// Indices 240 to 243 are the sync symbols and 255 is the background, so
/// we leave those alone.
fn load_palette(display: &mut Display) {
    for (index, colour) in BASIC_COLOURS.iter().enumerate() {
        display.set_palette(index as u8, *colour);
    }
    for n in 0..GREY_COUNT {
        let level = (u32::from(n) * 255 / u32::from(GREY_COUNT - 1)) as u8;
        display.set_palette(GREY_BASE + n, RGBColour::from_24bit(level, level, level));
    }
    let mut index = CUBE_BASE;
    for red in 0..6 {
        for green in 0..6 {
            for blue in 0..6 {
                if scanout::scanline::is_reserved(index) {
                    return;
                }
                display.set_palette(
                    index,
                    RGBColour::from_24bit(red * 51, green * 51, blue * 51),
                );
                index += 1;
            }
        }
    }
}

/// Draw colour bars over a grey ramp, with a white border.
fn draw_test_card(fb: &FrameBuffer) {
    let (width, height) = (FrameBuffer::WIDTH, FrameBuffer::HEIGHT);
    let bar_width = width / 16;
    for (n, x) in (0..width).step_by(usize::from(bar_width)).enumerate() {
        fb.fill(n as u8, x, 0, bar_width, height / 2);
    }
    let grey_width = width / u16::from(GREY_COUNT);
    for n in 0..u16::from(GREY_COUNT) {
        fb.fill(GREY_BASE + n as u8, n * grey_width, height / 2, grey_width, height / 4);
    }
    let cube_count = u16::from(scanout::scanline::CONTROL_BASE - CUBE_BASE);
    for n in 0..cube_count {
        let x = (n % 40) * 8;
        let y = height * 3 / 4 + (n / 40) * 8;
        fb.fill(CUBE_BASE + n as u8, x, y, 8, 8);
    }
    fb.fill(15, 0, 0, width, 1);
    fb.fill(15, 0, height - 1, width, 1);
    fb.fill(15, 0, 0, 1, height);
    fb.fill(15, width - 1, 0, 1, height);
}

/// Count up from zero to `max` and back down again.
fn triangle(t: u32, max: u8) -> u8 {
    let period = u32::from(max) * 2;
    let t = t % period;
    if t <= u32::from(max) {
        t as u8
    } else {
        (period - t) as u8
    }
}

// -----------------------------------------------------------------------------
// End of file
// -----------------------------------------------------------------------------
