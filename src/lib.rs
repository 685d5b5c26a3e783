#![no_std]
#![warn(missing_docs)]
//! # boot-can
//!
//! ## Overview
//! Communication driver for firmware-update bootloaders that talk to a host
//! programming tool over CAN. The host and the bootloader exchange single
//! classic CAN frames with one fixed standard identifier per direction; any
//! higher level protocol lives above this crate.
//!
//! The driver targets the SJA1000-style CAN controller with three transmit
//! buffers and one receive buffer found in NXP LPC2000 devices. It only uses
//! transmit buffer 1 and never enables controller interrupts:
//!
//! - [`Can::transmit`] blocks until the frame is on the bus, feeding the
//!   watchdog on every poll
//! - [`Can::try_receive`] polls once and never blocks; the bootloader main
//!   loop calls it repeatedly
//!
//! ## Bit timing
//! The bus timing is derived from the controller clock and the requested
//! bitrate by trying the segment splits of
//! [`BIT_TIMING_CANDIDATES`] in order and taking the first one that divides
//! the clock evenly. A bitrate/clock pair without such a split is a
//! configuration defect of the bootloader build.
//!
//! ## Usage
//! A target HAL or the board support code provides
//! - a [`CanId`] marker type for the controller
//! - a [`Dependencies`] implementation supplying the controller clock
//! - a [`Watchdog`] implementation, e.g. [`ServiceFn`] around the service
//!   routine of the bootloader
//!
//! and passes them to [`Can::init`] together with [`Mmio`] register access.
//!
//! [`Can::transmit`]: crate::bus::Can::transmit
//! [`Can::try_receive`]: crate::bus::Can::try_receive
//! [`Can::init`]: crate::bus::Can::init
//! [`BIT_TIMING_CANDIDATES`]: crate::config::BIT_TIMING_CANDIDATES
//! [`CanId`]: boot_can_core::CanId
//! [`Dependencies`]: boot_can_core::Dependencies
//! [`Watchdog`]: embedded_hal::watchdog::Watchdog
//! [`ServiceFn`]: crate::watchdog::ServiceFn
//! [`Mmio`]: crate::reg::Mmio

pub mod bus;
pub mod config;
pub mod message;
pub mod reg;
pub mod watchdog;

mod rx_buffer;
mod tx_buffer;

pub use boot_can_core as core;
pub use embedded_can;
pub use embedded_hal;
