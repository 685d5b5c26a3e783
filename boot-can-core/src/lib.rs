#![no_std]
#![warn(missing_docs)]

//! `boot-can-core` provides the thin integration layer between the platform
//! independent [`boot-can`] driver and target specific HAL crates (in
//! documentation also referred to as _target HALs_).
//!
//! Traits from this crate are not supposed to be implemented by the
//! application developer; implementations should be provided by target HALs
//! or by the board support code of the bootloader.
//!
//! Integrators are responsible for soundness of trait implementations and
//! conforming to their respective safety prerequisites.
//!
//! [`boot-can`]: <https://docs.rs/crate/boot-can/>

pub use fugit;

/// Trait representing CAN controller identity
///
/// Types implementing this trait are expected to be used as marker types
/// identifying a specific CAN controller of the microcontroller. It conveys
/// *where* the controller registers are located and which channel index the
/// controller has, not that they can be accessed. The latter is expressed by
/// the [`Dependencies`] trait.
///
/// The acceptance filter is shared between all controllers of the device and
/// lives in its own register block, hence the separate address.
///
/// # Safety
/// - `CanId::ADDRESS` points to the start of a valid CAN controller register
///   block
/// - `CanId::ACCEPTANCE_FILTER_ADDRESS` points to the start of a valid
///   acceptance filter register block
/// - `CanId::CHANNEL_INDEX` is the zero-based index of the controller
///   referenced by `ADDRESS`
///
/// # Examples
/// ```no_run
/// use boot_can_core::CanId;
///
/// pub enum Can1 {}
///
/// unsafe impl CanId for Can1 {
///     const ADDRESS: *const () = 0xE004_4000 as *const _;
///     const ACCEPTANCE_FILTER_ADDRESS: *const () = 0xE003_C000 as *const _;
///     const CHANNEL_INDEX: u8 = 0;
/// }
/// ```
pub unsafe trait CanId {
    /// Static address of the controller register block
    const ADDRESS: *const ();
    /// Static address of the acceptance filter register block
    const ACCEPTANCE_FILTER_ADDRESS: *const ();
    /// Zero-based channel index of the controller
    const CHANNEL_INDEX: u8;
}

/// Trait representing CAN controller dependencies
///
/// Structs implementing [`Dependencies`] should
/// - enclose all object representable dependencies of [`CanId`] and release
///   them upon destruction
/// - be constructible only when it is safe and sound to interact with the CAN
///   controller (clocks, power and pins have been already configured)
/// - be a singleton (only a single instance of [`Dependencies`] for a specific
///   [`CanId`] must exist at the same time)
///
/// in order to prevent aliasing and guarantee that the driver is the sole
/// owner of the controller.
///
/// # Safety
/// While [`Dependencies`] type instance exists
/// - the clock feeding the CAN controller must not change
/// - CAN related pin modes must not change
/// - controller registers must not be accessible by other parts of the
///   firmware
pub unsafe trait Dependencies<Id: CanId> {
    /// Frequency of the clock feeding the CAN controller.
    ///
    /// The bit timing prescaler divides this clock, so it has to be a whole
    /// number of kHz.
    fn can_clock(&self) -> fugit::HertzU32;
}
