//! Residence time computation
//!
//! Between the two relay endpoints the correction field of a Sync or
//! Delay_Req message does not hold a correction at all: the ingress side
//! stores its raw receive time (unix nanoseconds) in the 64 bits of the field
//! and the egress side replaces it with the measured residence time. Any
//! correction accumulated by an upstream transparent clock is lost this way,
//! so the relay cannot be chained with other transparent clocks.

use crate::{clock::RelayClock, ptp::Correction};

/// Store a unix nanosecond timestamp in a correction field.
///
/// This is not a unit conversion: the timestamp bits are placed in the field
/// as-is, which only works because both are 64 bits wide.
pub fn stamp_from_nanos(nanos: i64) -> Correction {
    Correction::from_bits(nanos)
}

/// Recover the timestamp stored by [`stamp_from_nanos`].
pub fn stamp_to_nanos(stamp: Correction) -> i64 {
    stamp.to_bits()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Residence {
    Measured(Correction),
    /// The stamp was not before the current time. Carries the raw difference.
    Clamped { nanos: i64 },
}

impl Residence {
    pub fn correction(self) -> Correction {
        match self {
            Residence::Measured(correction) => correction,
            Residence::Clamped { .. } => Correction::ZERO,
        }
    }
}

/// Ingress time surrogate for a message entering the relay
pub fn stamp_ingress(clock: &dyn RelayClock) -> std::io::Result<Correction> {
    Ok(stamp_from_nanos(clock.now()?))
}

/// Time spent in the relay by a message carrying an ingress stamp
pub fn residence(clock: &dyn RelayClock, stamped: Correction) -> std::io::Result<Residence> {
    Ok(residence_at(clock.now()?, stamped))
}

fn residence_at(now: i64, stamped: Correction) -> Residence {
    let nanos = now.wrapping_sub(stamp_to_nanos(stamped));

    if nanos <= 0 {
        Residence::Clamped { nanos }
    } else {
        Residence::Measured(Correction::from_nanos(nanos))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::test::ManualClock;

    #[test]
    fn stamp_is_bit_for_bit() {
        let t0 = 1_700_000_000_123_456_789;
        let stamp = stamp_from_nanos(t0);

        assert_eq!(stamp.to_bits(), t0);
        assert_eq!(stamp_to_nanos(stamp), t0);
        // the stamp is not a correction in nanoseconds
        assert_ne!(stamp.nanos(), t0);
    }

    #[test]
    fn ingress_stamp_uses_clock() {
        let clock = ManualClock::new(1_000_000_000);
        let stamp = stamp_ingress(&clock).unwrap();
        assert_eq!(stamp_to_nanos(stamp), 1_000_000_000);
    }

    #[test]
    fn residence_is_elapsed_time() {
        let t0 = 1_700_000_000_000_000_000;
        let clock = ManualClock::new(t0);
        let stamp = stamp_ingress(&clock).unwrap();

        clock.set(t0 + 500_000);
        let residence = residence(&clock, stamp).unwrap();

        assert_eq!(
            residence,
            Residence::Measured(Correction::from_nanos(500_000))
        );
        assert_eq!(residence.correction().nanos(), 500_000);
    }

    #[test]
    fn non_positive_residence_is_clamped() {
        let t0 = 1_700_000_000_000_000_000;
        let stamp = stamp_from_nanos(t0);

        let same = residence_at(t0, stamp);
        assert_eq!(same, Residence::Clamped { nanos: 0 });
        assert_eq!(same.correction(), Correction::ZERO);

        let earlier = residence_at(t0 - 250, stamp);
        assert_eq!(earlier, Residence::Clamped { nanos: -250 });
        assert_eq!(earlier.correction(), Correction::ZERO);
    }
}
