//! CAN bus configuration and bit timing resolution

use crate::reg::BusTiming;
use core::fmt;
use core::ops::RangeInclusive;
use embedded_can::StandardId;
use fugit::HertzU32;

/// Channel index of the only controller this driver supports
pub const SUPPORTED_CHANNEL_INDEX: u8 = 0;

/// Bitrates the resolver accepts, in kbps
pub const BITRATE_KBPS_RANGE: RangeInclusive<u32> = 10..=1000;

/// Prescaler values the bus timing register can hold
pub const PRESCALER_RANGE: RangeInclusive<u32> = 1..=1024;

/// Configuration of the bootloader CAN link
#[derive(Copy, Clone, Debug)]
pub struct CanConfig {
    /// Bitrate of the bus. Has to be a whole number of kbps within
    /// [`BITRATE_KBPS_RANGE`].
    pub bitrate: HertzU32,
    /// Identifier of frames sent to the host
    pub tx_id: StandardId,
    /// Identifier of frames accepted from the host
    pub rx_id: StandardId,
}

impl CanConfig {
    /// Create an instance
    pub fn new(bitrate: HertzU32, tx_id: StandardId, rx_id: StandardId) -> Self {
        Self {
            bitrate,
            tx_id,
            rx_id,
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for CanConfig {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(
            f,
            "CanConfig {{ bitrate: {=u32} Hz, tx_id: {=u16:#x}, rx_id: {=u16:#x} }}",
            self.bitrate.to_Hz(),
            self.tx_id.as_raw(),
            self.rx_id.as_raw()
        )
    }
}

/// Split of a bit time into segments, counted in time quanta
///
/// The synchronization segment (one quantum) is implied.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BitTimingCandidate {
    /// Propagation time and phase time before sample point
    pub phase_seg_1: u8,
    /// Time after sample point
    pub phase_seg_2: u8,
}

impl BitTimingCandidate {
    const fn new(phase_seg_1: u8, phase_seg_2: u8) -> Self {
        Self {
            phase_seg_1,
            phase_seg_2,
        }
    }

    /// Returns the number of time quanta that make up one bit time
    pub const fn time_quanta_per_bit(&self) -> u32 {
        1 + self.phase_seg_1 as u32 + self.phase_seg_2 as u32
    }

    /// Sample point in percent of the bit time, rounded down
    pub const fn sample_point_percent(&self) -> u32 {
        100 * (1 + self.phase_seg_1 as u32) / self.time_quanta_per_bit()
    }
}

/// Segment splits tried by [`BitTiming::resolve`], in order.
///
/// Covers 8 to 25 time quanta per bit with sample points between 68% and 78%.
/// The first entry that yields a valid prescaler wins, so the order matters.
pub const BIT_TIMING_CANDIDATES: [BitTimingCandidate; 18] = [
    BitTimingCandidate::new(5, 2),  //  8 tq, 75%
    BitTimingCandidate::new(6, 2),  //  9 tq, 78%
    BitTimingCandidate::new(6, 3),  // 10 tq, 70%
    BitTimingCandidate::new(7, 3),  // 11 tq, 73%
    BitTimingCandidate::new(8, 3),  // 12 tq, 75%
    BitTimingCandidate::new(9, 3),  // 13 tq, 77%
    BitTimingCandidate::new(9, 4),  // 14 tq, 71%
    BitTimingCandidate::new(10, 4), // 15 tq, 73%
    BitTimingCandidate::new(11, 4), // 16 tq, 75%
    BitTimingCandidate::new(12, 4), // 17 tq, 76%
    BitTimingCandidate::new(12, 5), // 18 tq, 72%
    BitTimingCandidate::new(13, 5), // 19 tq, 74%
    BitTimingCandidate::new(14, 5), // 20 tq, 75%
    BitTimingCandidate::new(15, 5), // 21 tq, 76%
    BitTimingCandidate::new(15, 6), // 22 tq, 73%
    BitTimingCandidate::new(16, 6), // 23 tq, 74%
    BitTimingCandidate::new(16, 7), // 24 tq, 71%
    BitTimingCandidate::new(16, 8), // 25 tq, 68%
];

/// Misconfigurations found while resolving [`BitTiming`].
#[derive(Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BitTimingError {
    /// Bitrate in kbps is outside [`BITRATE_KBPS_RANGE`]
    BitrateOutOfRange {
        /// Requested bitrate
        baud_kbps: u32,
    },
    /// Bitrate is not a whole number of kbps
    BitrateNotWholeKbps,
    /// Controller clock is not a whole number of kHz
    ClockNotWholeKhz,
    /// No candidate in [`BIT_TIMING_CANDIDATES`] divides the clock evenly
    /// with a prescaler in [`PRESCALER_RANGE`]
    NoValidPrescaler {
        /// Provided controller clock
        clock_khz: u32,
        /// Requested bitrate
        baud_kbps: u32,
    },
}

impl fmt::Display for BitTimingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BitrateOutOfRange { baud_kbps } => {
                write!(f, "bitrate of {} kbps is out of range", baud_kbps)
            }
            Self::BitrateNotWholeKbps => write!(f, "bitrate is not a whole number of kbps"),
            Self::ClockNotWholeKhz => write!(f, "clock is not a whole number of kHz"),
            Self::NoValidPrescaler {
                clock_khz,
                baud_kbps,
            } => write!(
                f,
                "no bit timing for {} kbps from a {} kHz clock",
                baud_kbps, clock_khz
            ),
        }
    }
}

/// Resolved bit timing parameters
///
/// Holds *real* values; the subtractions the bus timing register expects are
/// applied by [`Self::register_value`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BitTiming {
    /// Divider from the controller clock to the time quantum clock
    pub prescaler: u16,
    /// Propagation time and phase time before sample point
    pub phase_seg_1: u8,
    /// Time after sample point
    pub phase_seg_2: u8,
}

impl BitTiming {
    /// Finds the first entry of [`BIT_TIMING_CANDIDATES`] for which
    /// `clock_khz` is divisible by `baud_kbps * time_quanta_per_bit` and the
    /// resulting prescaler is within [`PRESCALER_RANGE`].
    pub fn resolve(baud_kbps: u32, clock_khz: u32) -> Result<Self, BitTimingError> {
        if !BITRATE_KBPS_RANGE.contains(&baud_kbps) {
            return Err(BitTimingError::BitrateOutOfRange { baud_kbps });
        }
        BIT_TIMING_CANDIDATES
            .iter()
            .find_map(|candidate| {
                let f_q = baud_kbps * candidate.time_quanta_per_bit();
                if clock_khz % f_q != 0 {
                    return None;
                }
                let prescaler = clock_khz / f_q;
                PRESCALER_RANGE.contains(&prescaler).then(|| Self {
                    prescaler: prescaler as u16,
                    phase_seg_1: candidate.phase_seg_1,
                    phase_seg_2: candidate.phase_seg_2,
                })
            })
            .ok_or(BitTimingError::NoValidPrescaler {
                clock_khz,
                baud_kbps,
            })
    }

    /// Same as [`Self::resolve`] for rates given in Hz.
    pub fn from_rates(bitrate: HertzU32, can_clock: HertzU32) -> Result<Self, BitTimingError> {
        if bitrate.to_Hz() % 1000 != 0 {
            return Err(BitTimingError::BitrateNotWholeKbps);
        }
        if can_clock.to_Hz() % 1000 != 0 {
            return Err(BitTimingError::ClockNotWholeKhz);
        }
        Self::resolve(bitrate.to_kHz(), can_clock.to_kHz())
    }

    /// Returns the number of time quanta that make up one bit time
    pub fn time_quanta_per_bit(&self) -> u32 {
        1 + u32::from(self.phase_seg_1) + u32::from(self.phase_seg_2)
    }

    /// Packs the parameters into the bus timing register layout
    pub fn register_value(&self) -> u32 {
        let mut btr = BusTiming(0);
        btr.set_brp(self.prescaler.saturating_sub(1));
        btr.set_tseg1(self.phase_seg_1.saturating_sub(1));
        btr.set_tseg2(self.phase_seg_2.saturating_sub(1));
        btr.0
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use fugit::RateExtU32 as _;

    fn decode(value: u32) -> BitTiming {
        let btr = BusTiming(value);
        BitTiming {
            prescaler: btr.brp() + 1,
            phase_seg_1: btr.tseg1() + 1,
            phase_seg_2: btr.tseg2() + 1,
        }
    }

    fn fits(candidate: &BitTimingCandidate, baud_kbps: u32, clock_khz: u32) -> bool {
        let f_q = baud_kbps * candidate.time_quanta_per_bit();
        clock_khz % f_q == 0 && PRESCALER_RANGE.contains(&(clock_khz / f_q))
    }

    #[test]
    fn candidates_are_valid_can_bit_times() {
        for candidate in BIT_TIMING_CANDIDATES.iter() {
            let tq = candidate.time_quanta_per_bit();
            let before_sample = 100 * (1 + u32::from(candidate.phase_seg_1));
            assert!((8..=25).contains(&tq), "{:?}", candidate);
            assert!(before_sample >= 68 * tq, "{:?}", candidate);
            assert!(before_sample <= 78 * tq, "{:?}", candidate);
        }
    }

    #[test]
    fn candidates_are_ordered_by_time_quanta() {
        for (i, candidate) in BIT_TIMING_CANDIDATES.iter().enumerate() {
            assert_eq!(candidate.time_quanta_per_bit(), 8 + i as u32);
        }
        assert_eq!(BIT_TIMING_CANDIDATES[1].sample_point_percent(), 77);
        assert_eq!(BIT_TIMING_CANDIDATES[17].sample_point_percent(), 68);
    }

    #[test]
    fn resolves_500_kbps_from_48_mhz() {
        let timing = BitTiming::resolve(500, 48_000).unwrap();
        assert_eq!(
            timing,
            BitTiming {
                prescaler: 12,
                phase_seg_1: 5,
                phase_seg_2: 2
            }
        );
        assert_eq!(timing.register_value(), 11 | 0x10_0000 | 0x4_0000);
    }

    #[test]
    fn fails_without_exact_divisor() {
        assert_eq!(
            BitTiming::resolve(333, 48_000),
            Err(BitTimingError::NoValidPrescaler {
                clock_khz: 48_000,
                baud_kbps: 333
            })
        );
    }

    #[test]
    fn first_fitting_candidate_wins_over_better_sample_point() {
        // 9 tq (78%) comes before 12 tq (75%) although both divide evenly
        let timing = BitTiming::resolve(1000, 36_000).unwrap();
        assert_eq!(timing.time_quanta_per_bit(), 9);
        assert_eq!(timing.prescaler, 4);
        assert!(fits(&BIT_TIMING_CANDIDATES[4], 1000, 36_000));
    }

    #[test]
    fn skips_candidates_with_prescaler_out_of_range() {
        // 8 tq would need a prescaler of 1200
        let timing = BitTiming::resolve(10, 96_000).unwrap();
        assert_eq!(timing.time_quanta_per_bit(), 10);
        assert_eq!(timing.prescaler, 960);
    }

    #[test]
    fn prescaler_bounds_are_inclusive() {
        assert_eq!(BitTiming::resolve(1000, 8_000).unwrap().prescaler, 1);
        assert_eq!(BitTiming::resolve(10, 81_920).unwrap().prescaler, 1024);
        assert!(BitTiming::resolve(1000, 4_000).is_err());
        // Every candidate divides a zero clock, but the prescaler would be 0
        assert_eq!(
            BitTiming::resolve(500, 0),
            Err(BitTimingError::NoValidPrescaler {
                clock_khz: 0,
                baud_kbps: 500
            })
        );
        // Prescaler 1025 for the slowest candidate only
        assert!(BitTiming::resolve(10, 10 * 25 * 1025).is_err());
    }

    #[test]
    fn resolved_timing_reproduces_the_clock() {
        let bitrates = [10, 20, 50, 100, 125, 250, 500, 800, 1000];
        for clock_khz in (1_000..=120_000).step_by(1_000) {
            for &baud_kbps in bitrates.iter() {
                let first = BIT_TIMING_CANDIDATES
                    .iter()
                    .position(|c| fits(c, baud_kbps, clock_khz));
                match (first, BitTiming::resolve(baud_kbps, clock_khz)) {
                    (Some(i), Ok(timing)) => {
                        let decoded = decode(timing.register_value());
                        assert_eq!(decoded, timing);
                        assert_eq!(decoded.phase_seg_1, BIT_TIMING_CANDIDATES[i].phase_seg_1);
                        assert_eq!(decoded.phase_seg_2, BIT_TIMING_CANDIDATES[i].phase_seg_2);
                        assert_eq!(
                            clock_khz,
                            baud_kbps
                                * decoded.time_quanta_per_bit()
                                * u32::from(decoded.prescaler)
                        );
                    }
                    (None, Err(e)) => assert_eq!(
                        e,
                        BitTimingError::NoValidPrescaler {
                            clock_khz,
                            baud_kbps
                        }
                    ),
                    (expected, got) => panic!(
                        "{} kbps from {} kHz: expected {:?}, got {:?}",
                        baud_kbps, clock_khz, expected, got
                    ),
                }
            }
        }
    }

    #[test]
    fn rejects_bitrate_out_of_range() {
        assert_eq!(
            BitTiming::resolve(0, 48_000),
            Err(BitTimingError::BitrateOutOfRange { baud_kbps: 0 })
        );
        assert_eq!(
            BitTiming::resolve(1001, 48_000),
            Err(BitTimingError::BitrateOutOfRange { baud_kbps: 1001 })
        );
    }

    #[test]
    fn from_rates_requires_whole_units() {
        assert_eq!(
            BitTiming::from_rates(500.kHz(), 48.MHz()),
            BitTiming::resolve(500, 48_000)
        );
        assert_eq!(
            BitTiming::from_rates(500_500.Hz(), 48.MHz()),
            Err(BitTimingError::BitrateNotWholeKbps)
        );
        assert_eq!(
            BitTiming::from_rates(500.kHz(), 48_000_500.Hz()),
            Err(BitTimingError::ClockNotWholeKhz)
        );
    }
}
