//! Polled reception through the receive buffer

use crate::bus::{Can, CanBus as _};
use crate::message::{self, Frame, MAX_DATA_LEN};
use crate::reg::{Command, FrameInfo, Register, RegisterAccess};
use boot_can_core::{CanId, Dependencies};
use core::convert::Infallible;
use embedded_hal::watchdog::Watchdog;

impl<Id, D, R, W> Can<Id, D, R, W>
where
    Id: CanId,
    D: Dependencies<Id>,
    R: RegisterAccess,
    W: Watchdog,
{
    /// Copies the payload of a pending frame carrying the receive identifier
    /// into `data` and releases the receive buffer.
    ///
    /// Returns `false` without touching `data` if no frame is pending or the
    /// pending frame has another identifier. All 8 payload bytes are copied
    /// regardless of the frame length.
    pub fn try_receive(&mut self, data: &mut [u8; MAX_DATA_LEN]) -> bool {
        match self.receive() {
            Ok(frame) => {
                *data = *frame.buffer();
                true
            }
            Err(_) => false,
        }
    }

    /// Returns the pending frame if it carries the receive identifier. Never
    /// blocks; [`nb::Error::WouldBlock`] means there is nothing for us yet.
    ///
    /// A pending frame with a different identifier is left in the receive
    /// buffer. Whether the controller overwrites it with the next frame or
    /// keeps it until the buffer is released has to be verified on the
    /// target.
    pub fn receive(&mut self) -> nb::Result<Frame, Infallible> {
        if !self.status().rbs() {
            return Err(nb::Error::WouldBlock);
        }
        let rid = self.registers.read(Register::Rid);
        if rid != u32::from(self.config.rx_id.as_raw()) {
            #[cfg(feature = "defmt")]
            defmt::trace!("CAN frame {=u32:#x} ignored", rid);
            return Err(nb::Error::WouldBlock);
        }

        let info = FrameInfo(self.registers.read(Register::Rfs));
        let data = message::unpack([
            self.registers.read(Register::Rda),
            self.registers.read(Register::Rdb),
        ]);
        let frame = Frame::received(self.config.rx_id, data, info.dlc());

        let mut command = Command(0);
        command.set_rrb(true);
        self.registers.write(Register::Cmr, command.0);
        Ok(frame)
    }
}
