//! Blocking transmission through transmit buffer 1

use crate::bus::{Can, CanBus as _};
use crate::message::{self, Frame, MAX_DATA_LEN};
use crate::reg::{Command, FrameInfo, Register, RegisterAccess};
use boot_can_core::{CanId, Dependencies};
use embedded_hal::watchdog::Watchdog;

impl<Id, D, R, W> Can<Id, D, R, W>
where
    Id: CanId,
    D: Dependencies<Id>,
    R: RegisterAccess,
    W: Watchdog,
{
    /// Sends the first `len` bytes of `data` with the transmit identifier and
    /// blocks until the controller reports the transmission complete. The
    /// watchdog is fed on every poll of the status register while waiting;
    /// there is no timeout.
    ///
    /// # Panics
    /// If transmit buffer 1 is still occupied by an earlier frame, or if `len`
    /// exceeds 8. Both indicate a sequencing bug in the caller.
    pub fn transmit(&mut self, data: &[u8; MAX_DATA_LEN], len: u8) {
        assert!(
            usize::from(len) <= MAX_DATA_LEN,
            "CAN frame length {} exceeds 8",
            len
        );
        assert!(self.status().tbs1(), "CAN transmit buffer 1 is busy");

        let mut info = FrameInfo(0);
        info.set_dlc(len);
        let [tda, tdb] = message::pack(data);
        self.registers.write(Register::Tfi1, info.0);
        self.registers
            .write(Register::Tid1, self.config.tx_id.as_raw().into());
        self.registers.write(Register::Tda1, tda);
        self.registers.write(Register::Tdb1, tdb);

        let mut command = Command(0);
        command.set_tr(true);
        command.set_stb1(true);
        self.registers.write(Register::Cmr, command.0);
        #[cfg(feature = "defmt")]
        defmt::trace!("CAN transmit requested, {=u8} bytes", len);

        while !self.status().tcs1() {
            self.watchdog.feed();
        }
    }

    /// Sends the payload of `frame` as [`Self::transmit`] does. The frame
    /// identifier is not used; frames always carry the transmit identifier.
    pub fn transmit_frame(&mut self, frame: &Frame) {
        self.transmit(frame.buffer(), frame.len())
    }
}
