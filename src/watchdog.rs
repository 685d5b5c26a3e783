//! Watchdog servicing during blocking waits

use embedded_hal::watchdog::Watchdog;

/// Adapts a plain service routine to [`Watchdog`]
///
/// ```no_run
/// use boot_can::watchdog::ServiceFn;
///
/// fn cop_service() {
///     // kick the watchdog
/// }
///
/// let watchdog = ServiceFn(cop_service);
/// ```
pub struct ServiceFn<F>(pub F);

impl<F: FnMut()> Watchdog for ServiceFn<F> {
    fn feed(&mut self) {
        (self.0)()
    }
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;

    /// Counts how often it was fed
    #[derive(Default)]
    pub(crate) struct CountingWatchdog {
        pub(crate) feeds: u32,
    }

    impl Watchdog for CountingWatchdog {
        fn feed(&mut self) {
            self.feeds += 1;
        }
    }

    #[test]
    fn service_fn_calls_routine_on_every_feed() {
        let mut calls = 0;
        let mut watchdog = ServiceFn(|| calls += 1);
        watchdog.feed();
        watchdog.feed();
        drop(watchdog);
        assert_eq!(calls, 2);
    }
}
