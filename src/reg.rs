//! Register access for the CAN controller
//!
//! The driver never touches memory directly. Every access goes through
//! [`RegisterAccess`], which is implemented by [`Mmio`] for real hardware and
//! by a fake register file in tests.

#[cfg(test)]
pub(crate) mod fake;

use bitfield::bitfield;
use boot_can_core::CanId;
use core::marker::PhantomData;
use vcell::VolatileCell;

/// Registers the driver reads or writes
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Register {
    /// Acceptance Filter Mode
    Afmr,
    /// Mode
    Mod,
    /// Command
    Cmr,
    /// Global Status
    Gsr,
    /// Interrupt Enable
    Ier,
    /// Bus Timing
    Btr,
    /// Status
    Sr,
    /// Receive Frame Status
    Rfs,
    /// Received Identifier
    Rid,
    /// Received Data bytes 1-4
    Rda,
    /// Received Data bytes 5-8
    Rdb,
    /// Transmit Frame Information, buffer 1
    Tfi1,
    /// Transmit Identifier, buffer 1
    Tid1,
    /// Transmit Data bytes 1-4, buffer 1
    Tda1,
    /// Transmit Data bytes 5-8, buffer 1
    Tdb1,
}

/// Word-wide access to the controller registers
pub trait RegisterAccess {
    /// Reads the current value of `register`
    fn read(&self, register: Register) -> u32;
    /// Overwrites `register` with `value`
    fn write(&mut self, register: Register, value: u32);
}

/// Controller register block
#[repr(C)]
pub struct RegisterBlock {
    /// 0x00
    pub mod_: VolatileCell<u32>,
    /// 0x04
    pub cmr: VolatileCell<u32>,
    /// 0x08
    pub gsr: VolatileCell<u32>,
    /// 0x0c
    pub icr: VolatileCell<u32>,
    /// 0x10
    pub ier: VolatileCell<u32>,
    /// 0x14
    pub btr: VolatileCell<u32>,
    /// 0x18
    pub ewl: VolatileCell<u32>,
    /// 0x1c
    pub sr: VolatileCell<u32>,
    /// 0x20
    pub rfs: VolatileCell<u32>,
    /// 0x24
    pub rid: VolatileCell<u32>,
    /// 0x28
    pub rda: VolatileCell<u32>,
    /// 0x2c
    pub rdb: VolatileCell<u32>,
    /// 0x30
    pub tfi1: VolatileCell<u32>,
    /// 0x34
    pub tid1: VolatileCell<u32>,
    /// 0x38
    pub tda1: VolatileCell<u32>,
    /// 0x3c
    pub tdb1: VolatileCell<u32>,
}

/// Acceptance filter register block
#[repr(C)]
pub struct AcceptanceFilterBlock {
    /// 0x00
    pub afmr: VolatileCell<u32>,
}

/// Resolves the register blocks of a [`CanId`]
pub trait AccessRegisterBlock {
    /// Pointer to the controller register block
    fn register_block() -> *const RegisterBlock;
    /// Pointer to the acceptance filter register block
    fn acceptance_filter_block() -> *const AcceptanceFilterBlock;
}

impl<Id: CanId> AccessRegisterBlock for Id {
    fn register_block() -> *const RegisterBlock {
        Id::ADDRESS as *const _
    }

    fn acceptance_filter_block() -> *const AcceptanceFilterBlock {
        Id::ACCEPTANCE_FILTER_ADDRESS as *const _
    }
}

/// Memory-mapped registers of the controller identified by `Id`
pub struct Mmio<Id> {
    _id: PhantomData<Id>,
}

impl<Id: CanId> Mmio<Id> {
    /// # Safety
    /// The caller must be the owner of the controller referenced by `Id` and
    /// of the acceptance filter. Do not keep multiple instances for the same
    /// controller.
    pub unsafe fn new() -> Self {
        Self { _id: PhantomData }
    }

    fn cell(&self, register: Register) -> &VolatileCell<u32> {
        // Safety: `Id: CanId` guarantees valid addresses and `Self` owns the
        // register blocks.
        let (can, af) = unsafe { (&*Id::register_block(), &*Id::acceptance_filter_block()) };
        match register {
            Register::Afmr => &af.afmr,
            Register::Mod => &can.mod_,
            Register::Cmr => &can.cmr,
            Register::Gsr => &can.gsr,
            Register::Ier => &can.ier,
            Register::Btr => &can.btr,
            Register::Sr => &can.sr,
            Register::Rfs => &can.rfs,
            Register::Rid => &can.rid,
            Register::Rda => &can.rda,
            Register::Rdb => &can.rdb,
            Register::Tfi1 => &can.tfi1,
            Register::Tid1 => &can.tid1,
            Register::Tda1 => &can.tda1,
            Register::Tdb1 => &can.tdb1,
        }
    }
}

impl<Id: CanId> RegisterAccess for Mmio<Id> {
    fn read(&self, register: Register) -> u32 {
        self.cell(register).get()
    }

    fn write(&mut self, register: Register, value: u32) {
        self.cell(register).set(value)
    }
}

bitfield! {
    /// AFMR, acceptance filter mode
    #[derive(Copy, Clone, Default)]
    pub struct AcceptanceFilterMode(u32);
    impl Debug;

    /// Acceptance filter off, no messages are received
    pub acc_off, set_acc_off: 0;
    /// Acceptance filter bypass, all messages are received
    pub acc_bp, set_acc_bp: 1;
    /// FullCAN mode
    pub efcan, set_efcan: 2;
}

bitfield! {
    /// MOD, controller mode
    #[derive(Copy, Clone, Default)]
    pub struct Mode(u32);
    impl Debug;

    /// Reset mode; bus traffic is suspended and configuration is unlocked
    pub rm, set_rm: 0;
    /// Listen only
    pub lom, set_lom: 1;
    /// Self test
    pub stm, set_stm: 2;
}

bitfield! {
    /// CMR, command register (write only)
    #[derive(Copy, Clone, Default)]
    pub struct Command(u32);
    impl Debug;

    /// Transmission request
    pub tr, set_tr: 0;
    /// Abort transmission
    pub at, set_at: 1;
    /// Release receive buffer
    pub rrb, set_rrb: 2;
    /// Clear data overrun
    pub cdo, set_cdo: 3;
    /// Self reception request
    pub srr, set_srr: 4;
    /// Select transmit buffer 1
    pub stb1, set_stb1: 5;
    /// Select transmit buffer 2
    pub stb2, set_stb2: 6;
    /// Select transmit buffer 3
    pub stb3, set_stb3: 7;
}

bitfield! {
    /// SR, controller status
    #[derive(Copy, Clone, Default)]
    pub struct Status(u32);
    impl Debug;

    /// Receive buffer status, a received frame is available
    pub rbs, _: 0;
    /// Data overrun
    pub dos, _: 1;
    /// Transmit buffer 1 is released and may be written
    pub tbs1, _: 2;
    /// Last transmission from buffer 1 completed
    pub tcs1, _: 3;
    /// Receiving a message
    pub rs, _: 4;
    /// Transmitting from buffer 1
    pub ts1, _: 5;
    /// Error counters reached the warning limit
    pub es, _: 6;
    /// Bus off
    pub bs, _: 7;
}

bitfield! {
    /// GSR, global status with error counters
    #[derive(Copy, Clone, Default)]
    pub struct GlobalStatus(u32);
    impl Debug;

    /// Receive buffer status
    pub rbs, _: 0;
    /// Data overrun
    pub dos, _: 1;
    /// Transmit buffers status
    pub tbs, _: 2;
    /// Transmit complete status
    pub tcs, _: 3;
    /// Bus off
    pub bs, _: 7;
    /// Receive error counter
    pub u8, rxerr, _: 23, 16;
    /// Transmit error counter
    pub u8, txerr, _: 31, 24;
}

bitfield! {
    /// TFI1 and RFS, frame information
    #[derive(Copy, Clone, Default)]
    pub struct FrameInfo(u32);
    impl Debug;

    /// Data length code
    pub u8, dlc, set_dlc: 19, 16;
    /// Remote transmission request
    pub rtr, set_rtr: 30;
    /// Frame format, set for 29-bit identifiers
    pub ff, set_ff: 31;
}

bitfield! {
    /// BTR, bus timing
    ///
    /// All fields hold the *register* values, i.e. one less than the value
    /// they represent.
    #[derive(Copy, Clone, Default, PartialEq, Eq)]
    pub struct BusTiming(u32);
    impl Debug;

    /// Baud rate prescaler minus one
    pub u16, brp, set_brp: 9, 0;
    /// Synchronization jump width minus one
    pub u8, sjw, set_sjw: 15, 14;
    /// Time segment 1 minus one
    pub u8, tseg1, set_tseg1: 19, 16;
    /// Time segment 2 minus one
    pub u8, tseg2, set_tseg2: 22, 20;
    /// Triple sampling
    pub sam, set_sam: 23;
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn command_for_buffer_1_transmission() {
        let mut cmd = Command(0);
        cmd.set_tr(true);
        cmd.set_stb1(true);
        assert_eq!(cmd.0, 0x21);
    }

    #[test]
    fn bus_timing_fields_land_at_register_offsets() {
        let mut btr = BusTiming(0);
        btr.set_brp(1023);
        btr.set_tseg1(15);
        btr.set_tseg2(7);
        assert_eq!(btr.0, 0x3ff | (0xf << 16) | (0x7 << 20));
        assert_eq!(btr.sjw(), 0);
        assert!(!btr.sam());
    }

    #[test]
    fn frame_info_dlc() {
        let mut info = FrameInfo(0);
        info.set_dlc(8);
        assert_eq!(info.0, 8 << 16);
        assert!(!info.ff());
        assert_eq!(FrameInfo(0x0005_0000).dlc(), 5);
    }

    #[test]
    fn global_status_error_counters() {
        let gsr = GlobalStatus(0x8012_000c);
        assert_eq!(gsr.txerr(), 0x80);
        assert_eq!(gsr.rxerr(), 0x12);
        assert!(gsr.tbs());
        assert!(gsr.tcs());
        assert!(!gsr.bs());
    }
}
