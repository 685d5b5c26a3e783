//! Controller setup and the operational CAN bus

use crate::config::{BitTiming, BitTimingError, CanConfig, SUPPORTED_CHANNEL_INDEX};
use crate::message::Frame;
use crate::reg::{AcceptanceFilterMode, GlobalStatus, Mode, Register, RegisterAccess, Status};
use boot_can_core::{CanId, Dependencies};
use core::fmt::{self, Debug};
use core::marker::PhantomData;
use embedded_can::ErrorKind;
use embedded_hal::watchdog::Watchdog;

/// Printable error counters taken from GSR
pub struct ErrorCounters(pub GlobalStatus);

impl From<GlobalStatus> for ErrorCounters {
    fn from(value: GlobalStatus) -> Self {
        Self(value)
    }
}

impl Debug for ErrorCounters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let gsr = &self.0;

        f.debug_struct("ErrorCounters")
            .field("rxerr", &gsr.rxerr())
            .field("txerr", &gsr.txerr())
            .field("bs", &gsr.bs())
            .finish()
    }
}

/// Errors that may occur during configuration
#[derive(Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigurationError {
    /// The controller is not the one this driver supports
    UnsupportedChannel {
        /// Channel index of the controller
        index: u8,
    },
    /// Problems with the bit timing configuration
    BitTiming(BitTimingError),
}

impl From<BitTimingError> for ConfigurationError {
    fn from(value: BitTimingError) -> Self {
        Self::BitTiming(value)
    }
}

impl fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedChannel { index } => {
                write!(f, "CAN channel index {} is not supported", index)
            }
            Self::BitTiming(e) => write!(f, "{}", e),
        }
    }
}

/// Errors of the [`embedded_can::blocking::Can`] implementation
#[derive(Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Frame identifier differs from the configured transmit identifier
    UnexpectedIdentifier,
}

impl embedded_can::Error for Error {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

/// Common CAN bus functionality
pub trait CanBus {
    /// Read the controller status
    fn status(&self) -> Status;
    /// Read error counters
    fn error_counters(&self) -> ErrorCounters;
}

/// A CAN controller that has left reset mode and takes part in bus traffic.
///
/// Interrupts of the controller stay disabled; transmission and reception
/// work by polling only.
pub struct Can<Id, D, R, W> {
    pub(crate) registers: R,
    pub(crate) watchdog: W,
    pub(crate) config: CanConfig,
    dependencies: D,
    _id: PhantomData<Id>,
}

/// A CAN controller in reset mode. Before frames can be sent and received,
/// it needs to be [`Self::finalize`]d.
pub struct CanConfigurable<Id, D, R, W>(
    /// The controller is held in reset mode while this is wrapped.
    Can<Id, D, R, W>,
);

impl<Id, D, R, W> CanConfigurable<Id, D, R, W>
where
    Id: CanId,
    D: Dependencies<Id>,
    R: RegisterAccess,
    W: Watchdog,
{
    /// Take ownership of the controller and put it into reset mode.
    ///
    /// The acceptance filter is set to bypass so that every frame reaches the
    /// receive buffer; identifiers are filtered by the driver instead. All
    /// controller interrupts are disabled.
    ///
    /// Fails if `Id` is not the controller with channel index
    /// [`SUPPORTED_CHANNEL_INDEX`]; nothing is written in that case.
    pub fn new(
        config: CanConfig,
        dependencies: D,
        registers: R,
        watchdog: W,
    ) -> Result<Self, ConfigurationError> {
        if Id::CHANNEL_INDEX != SUPPORTED_CHANNEL_INDEX {
            return Err(ConfigurationError::UnsupportedChannel {
                index: Id::CHANNEL_INDEX,
            });
        }

        let mut can = Can {
            registers,
            watchdog,
            config,
            dependencies,
            _id: PhantomData,
        };
        let mut afmr = AcceptanceFilterMode(0);
        afmr.set_acc_bp(true);
        can.registers.write(Register::Afmr, afmr.0);
        #[cfg(feature = "defmt")]
        defmt::debug!("CAN channel {=u8} in reset mode: {}", Id::CHANNEL_INDEX, can.config);

        Ok(can.enter_reset_mode())
    }

    /// Resolves the bit timing, applies it and leaves reset mode, which
    /// starts synchronization to the bus.
    ///
    /// On error the controller stays in reset mode.
    pub fn finalize(self) -> Result<Can<Id, D, R, W>, ConfigurationError> {
        let mut can = self.0;
        let timing = BitTiming::from_rates(can.config.bitrate, can.dependencies.can_clock())?;
        #[cfg(feature = "defmt")]
        defmt::debug!("CAN bit timing resolved: {}", timing);

        can.registers.write(Register::Btr, timing.register_value());
        can.registers.write(Register::Mod, Mode(0).0);
        #[cfg(feature = "defmt")]
        defmt::debug!("CAN synchronizing to the bus");
        Ok(can)
    }
}

impl<Id, D, R, W> Can<Id, D, R, W>
where
    Id: CanId,
    D: Dependencies<Id>,
    R: RegisterAccess,
    W: Watchdog,
{
    /// Brings the controller onto the bus in one step.
    ///
    /// This runs once at boot and there is no fallback configuration, so any
    /// [`ConfigurationError`] panics.
    ///
    /// ```no_run
    /// # use boot_can::core::{CanId, Dependencies};
    /// # use fugit::{HertzU32, RateExtU32 as _};
    /// # pub enum Can1 {}
    /// # unsafe impl CanId for Can1 {
    /// #     const ADDRESS: *const () = 0xE004_4000 as *const _;
    /// #     const ACCEPTANCE_FILTER_ADDRESS: *const () = 0xE003_C000 as *const _;
    /// #     const CHANNEL_INDEX: u8 = 0;
    /// # }
    /// # pub struct Clocks;
    /// # unsafe impl Dependencies<Can1> for Clocks {
    /// #     fn can_clock(&self) -> HertzU32 { 60.MHz() }
    /// # }
    /// # fn cop_service() {}
    /// use boot_can::bus::Can;
    /// use boot_can::config::CanConfig;
    /// use boot_can::embedded_can::StandardId;
    /// use boot_can::reg::Mmio;
    /// use boot_can::watchdog::ServiceFn;
    ///
    /// let config = CanConfig::new(
    ///     500.kHz(),
    ///     StandardId::new(0x7e1).unwrap(),
    ///     StandardId::new(0x667).unwrap(),
    /// );
    /// // Safety: the bootloader is the only user of CAN1
    /// let registers = unsafe { Mmio::<Can1>::new() };
    /// let mut can = Can::init(config, Clocks, registers, ServiceFn(cop_service));
    ///
    /// let mut packet = [0; 8];
    /// if can.try_receive(&mut packet) {
    ///     can.transmit(&packet, 8);
    /// }
    /// ```
    pub fn init(config: CanConfig, dependencies: D, registers: R, watchdog: W) -> Self {
        match CanConfigurable::new(config, dependencies, registers, watchdog)
            .and_then(CanConfigurable::finalize)
        {
            Ok(can) => can,
            Err(e) => panic!("CAN initialization failed: {}", e),
        }
    }

    /// Raw access to the registers.
    ///
    /// # Safety
    /// The abstraction assumes that it has exclusive ownership of the
    /// registers. Direct access can break such assumptions.
    pub unsafe fn registers(&self) -> &R {
        &self.registers
    }

    /// The configuration in effect
    pub fn config(&self) -> &CanConfig {
        &self.config
    }

    /// Reset mode with all interrupt sources disabled and status cleared
    fn enter_reset_mode(mut self) -> CanConfigurable<Id, D, R, W> {
        let mut mode = Mode(0);
        mode.set_rm(true);
        self.registers.write(Register::Mod, mode.0);
        self.registers.write(Register::Ier, 0);
        self.registers.write(Register::Gsr, 0);
        CanConfigurable(self)
    }

    /// Takes the controller off the bus and hands back its dependencies.
    pub fn release(mut self) -> (D, R, W) {
        let mut mode = Mode(0);
        mode.set_rm(true);
        self.registers.write(Register::Mod, mode.0);
        (self.dependencies, self.registers, self.watchdog)
    }
}

impl<Id, D, R: RegisterAccess, W> CanBus for Can<Id, D, R, W> {
    fn status(&self) -> Status {
        Status(self.registers.read(Register::Sr))
    }

    fn error_counters(&self) -> ErrorCounters {
        GlobalStatus(self.registers.read(Register::Gsr)).into()
    }
}

impl<Id, D, R, W> embedded_can::blocking::Can for Can<Id, D, R, W>
where
    Id: CanId,
    D: Dependencies<Id>,
    R: RegisterAccess,
    W: Watchdog,
{
    type Frame = Frame;
    type Error = Error;

    fn transmit(&mut self, frame: &Frame) -> Result<(), Error> {
        if frame.standard_id() != self.config.tx_id {
            return Err(Error::UnexpectedIdentifier);
        }
        self.transmit_frame(frame);
        Ok(())
    }

    /// Polls until a frame with the receive identifier arrives, feeding the
    /// watchdog between polls.
    fn receive(&mut self) -> Result<Frame, Error> {
        loop {
            match self.receive() {
                Ok(frame) => return Ok(frame),
                Err(nb::Error::WouldBlock) => self.watchdog.feed(),
                Err(nb::Error::Other(e)) => match e {},
            }
        }
    }
}
