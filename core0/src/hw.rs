//! HW related code for Core 0

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

use fugit::RateExtU32;
use rp2040_hal::{
    clocks,
    gpio::{
        bank0, FunctionNull, FunctionPio0, FunctionSioOutput, OutputDriveStrength, OutputSlewRate,
        Pin, PinId, Pins, PullDown, PullNone, ValidFunction,
    },
    multicore, pac, pll,
    sio::SioFifo,
    xosc, Clock as _, Sio, Timer, Watchdog,
};

/// On-board crystal frequency, in Hz.
const XOSC_CRYSTAL_FREQ: u32 = 12_000_000;

extern "C" {
    /// This is the start of Core1's vector table
    static CORE1_VECTOR_TABLE: MiniVectorTable;
}

#[repr(C)]
struct MiniVectorTable {
    pub stack_pointer: usize,
    pub reset_function: extern "C" fn() -> !,
}

/// One differential pair, positive and negative.
type PinPair<P, N> = (
    Pin<P, FunctionPio0, PullNone>,
    Pin<N, FunctionPio0, PullNone>,
);

pub struct HdmiPins {
    /// TMDS clock
    _clock: PinPair<bank0::Gpio6, bank0::Gpio7>,
    /// TMDS channel 0 (blue, unless the link says otherwise)
    _data0: PinPair<bank0::Gpio8, bank0::Gpio9>,
    /// TMDS channel 1 (green)
    _data1: PinPair<bank0::Gpio10, bank0::Gpio11>,
    /// TMDS channel 2 (red)
    _data2: PinPair<bank0::Gpio12, bank0::Gpio13>,
}

/// Everything that went wrong with the hardware set-up.
#[derive(Debug, Copy, Clone, PartialEq, Eq, defmt::Format)]
pub enum Error {
    /// The crystal did not start
    Crystal,
    /// A PLL would not lock
    Pll,
    /// The clock tree would not accept our PLLs
    Clocks,
    /// Core 1's vector table does not look like one
    BadCore1Image,
    /// Core 1 did not start
    Core1Spawn,
}

pub struct Hardware {
    /// Our pins for HDMI video output
    ///
    /// These pins are all controlled by PIO0, which is driven from the Core 1
    /// firmware. We just set them up on this side whilst we set up all the
    /// other pins.
    pub _hdmi_pins: HdmiPins,
    /// Our blinky LED
    pub led: Pin<bank0::Gpio25, FunctionSioOutput, PullNone>,
    /// Our FIFO
    pub fifo: SioFifo,
    /// A microsecond timer, for delays and telemetry
    pub timer: Timer,
}

impl Hardware {
    /// Call this once on start-up to initialise the hardware
    pub fn init(mut periph: pac::Peripherals) -> Result<Hardware, Error> {
        // Check if stuff is running that shouldn't be. If so, do a full watchdog reboot.
        if stuff_running(&mut periph) {
            watchdog_reboot();
        }

        let mut watchdog = Watchdog::new(periph.WATCHDOG);
        let sio = Sio::new(periph.SIO);

        defmt::info!("Configuring clocks...");

        // Run at 252 MHz SYS_PLL, 48 MHz, USB_PLL. This is important, as we
        // clock the TMDS serialiser at one bit per clock, and a pixel is ten
        // bits, which gives 25.2 MHz (which is close enough to the 25.175 MHz
        // standard VGA pixel clock).

        // Step 1. Turn on the crystal.
        let xosc = xosc::setup_xosc_blocking(periph.XOSC, XOSC_CRYSTAL_FREQ.Hz())
            .map_err(|_x| Error::Crystal)?;
        // Step 2. Configure watchdog tick generation to tick over every microsecond.
        watchdog.enable_tick_generation((XOSC_CRYSTAL_FREQ / 1_000_000) as u8);
        // Step 3. Create a clocks manager.
        let mut clocks = clocks::ClocksManager::new(periph.CLOCKS);
        // Step 4. Set up the system PLL.
        //
        // We take the Crystal Oscillator (=12 MHz) with no divider, and ×126 to
        // give a FOUTVCO of 1512 MHz. This must be in the range 750 MHz - 1600 MHz.
        //
        // Next we ÷6 on the first post divider to give 252 MHz, and leave the
        // second post divider at ÷1.
        //
        // 252 MHz is over the RP2040's rated 133 MHz, but it is what every
        // software DVI on this chip runs at.
        let pll_sys = pll::setup_pll_blocking(
            periph.PLL_SYS,
            xosc.operating_frequency(),
            pll::PLLConfig {
                vco_freq: 1512.MHz(),
                refdiv: 1,
                post_div1: 6,
                post_div2: 1,
            },
            &mut clocks,
            &mut periph.RESETS,
        )
        .map_err(|_x| Error::Pll)?;
        // Step 5. Set up a 48 MHz PLL for the USB system.
        let pll_usb = pll::setup_pll_blocking(
            periph.PLL_USB,
            xosc.operating_frequency(),
            pll::common_configs::PLL_USB_48MHZ,
            &mut clocks,
            &mut periph.RESETS,
        )
        .map_err(|_x| Error::Pll)?;
        // Step 6. Set the system to run from the PLLs we just configured.
        clocks
            .init_default(&xosc, &pll_sys, &pll_usb)
            .map_err(|_x| Error::Clocks)?;

        let sys_hz = clocks.system_clock.freq().to_Hz();
        defmt::info!("Clocks OK! System clock is {=u32} Hz", sys_hz);
        if sys_hz != scanout::SYS_CLOCK_HZ {
            defmt::warn!(
                "Wanted {=u32} Hz, video timing will be off",
                scanout::SYS_CLOCK_HZ
            );
        }

        let timer = Timer::new(periph.TIMER, &mut periph.RESETS, &clocks);

        defmt::info!("Configuring pins...");

        let hal_pins = Pins::new(
            periph.IO_BANK0,
            periph.PADS_BANK0,
            sio.gpio_bank0,
            &mut periph.RESETS,
        );

        let mut hw = Hardware {
            _hdmi_pins: HdmiPins {
                _clock: (hdmi_pin(hal_pins.gpio6), hdmi_pin(hal_pins.gpio7)),
                _data0: (hdmi_pin(hal_pins.gpio8), hdmi_pin(hal_pins.gpio9)),
                _data1: (hdmi_pin(hal_pins.gpio10), hdmi_pin(hal_pins.gpio11)),
                _data2: (hdmi_pin(hal_pins.gpio12), hdmi_pin(hal_pins.gpio13)),
            },
            led: hal_pins.gpio25.reconfigure(),
            fifo: sio.fifo,
            timer,
        };

        defmt::info!("Setting up Core 1...");
        start_core1(
            periph.DMA,
            periph.PIO0,
            periph.RESETS,
            periph.BUSCTRL,
            &mut periph.PSM,
            &mut periph.PPB,
            &mut hw.fifo,
            sys_hz,
        )?;
        defmt::info!("HW init complete");

        Ok(hw)
    }
}

/// Hand a pin to PIO0, with the fastest edges we can get.
///
/// TMDS is 252 Mbit/s per pair, so it needs all the help it can get.
fn hdmi_pin<I>(pin: Pin<I, FunctionNull, PullDown>) -> Pin<I, FunctionPio0, PullNone>
where
    I: PinId,
    I: ValidFunction<FunctionPio0>,
{
    let mut pin = pin.reconfigure();
    pin.set_drive_strength(OutputDriveStrength::TwelveMilliAmps);
    pin.set_slew_rate(OutputSlewRate::Fast);
    pin
}

/// What we leave in watchdog scratch register 7 while we are running.
///
/// Only a watchdog reboot or a power cycle clears it, so if we find it at
/// start-up, Core 0 was reset on its own and Core 1 is probably still
/// clocking out video.
const RUNNING_MARKER: u32 = 0xDEAD_C0DE;

/// Has Core 0 been restarted without the rest of the chip?
///
/// Leaves the marker set either way.
fn stuff_running(p: &mut pac::Peripherals) -> bool {
    let scratch = p.WATCHDOG.scratch7().read().bits();
    defmt::info!("WD Scratch is 0x{=u32:08x}", scratch);
    p.WATCHDOG
        .scratch7()
        .write(|w| unsafe { w.bits(RUNNING_MARKER) });
    scratch == RUNNING_MARKER
}

/// Reset the whole chip, so Core 1 and its DMA ring start from scratch.
fn watchdog_reboot() -> ! {
    defmt::warn!("Core 0 restarted on its own. Rebooting everything.");
    // Safety: we never return, so nothing else is using these
    let p = unsafe { pac::Peripherals::steal() };
    p.WATCHDOG.scratch7().write(|w| unsafe { w.bits(0) });
    let mut watchdog = Watchdog::new(p.WATCHDOG);
    watchdog.start(fugit::MicrosDurationU32::millis(10));
    loop {
        cortex_m::asm::wfi();
    }
}

/// Find Core 1's reset handler, and check its stack pointer looks sane.
///
/// Core 1 is flashed separately, so it might not be there at all.
fn core1_reset_function() -> Result<extern "C" fn() -> !, Error> {
    // Safety: the linker puts this at Core 1's flash origin
    let table = unsafe { &CORE1_VECTOR_TABLE };
    defmt::info!(
        "Core 1 sp=0x{=usize:08x}, reset=0x{=usize:08x}",
        table.stack_pointer,
        table.reset_function as usize
    );
    // Erased flash reads 0xFFFF_FFFF, which is not in SRAM
    let sram = scanout::command::SRAM_RANGE;
    if table.stack_pointer < sram.start || table.stack_pointer > sram.end {
        defmt::error!("Core 1 stack pointer is not in SRAM. Is Core 1 flashed?");
        return Err(Error::BadCore1Image);
    }
    Ok(table.reset_function)
}

/// Start the HDMI engine on Core 1, and tell it the system clock.
///
/// Core 1 drives RESETS, DMA, PIO0 and BUSCTRL, so we take those here and
/// drop them, which stops Core 0 code from touching them.
fn start_core1(
    _dma: pac::DMA,
    _pio: pac::PIO0,
    _resets: pac::RESETS,
    _busctrl: pac::BUSCTRL,
    psm: &mut pac::PSM,
    ppb: &mut pac::PPB,
    fifo: &mut SioFifo,
    sys_hz: u32,
) -> Result<(), Error> {
    static CORE1_STACK: multicore::Stack<4096> = multicore::Stack::new();

    let reset_function = core1_reset_function()?;
    let stack = CORE1_STACK.take().ok_or(Error::Core1Spawn)?;
    let mut multicore = multicore::Multicore::new(psm, ppb, fifo);
    defmt::info!("Spawning Core 1...");
    // We give it our own stack rather than the one in its vector table
    multicore.cores()[1]
        .spawn(stack, move || reset_function())
        .map_err(|_e| Error::Core1Spawn)?;
    // Core 1 sets its PIO clock divider from this
    fifo.write_blocking(sys_hz);
    Ok(())
}

// -----------------------------------------------------------------------------
// End of file
// -----------------------------------------------------------------------------
