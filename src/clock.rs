//! Wall clock used to timestamp datagrams passing through the relay

use clock_steering::unix::UnixClock;

/// Source of the current time in nanoseconds since the unix epoch
///
/// Both relay endpoints compare timestamps taken on different hosts, so the
/// clock must be one that is kept in sync between them, not a monotonic one.
pub trait RelayClock: Send + Sync {
    fn now(&self) -> std::io::Result<i64>;
}

#[derive(Debug, Clone)]
pub struct LinuxClock {
    clock: UnixClock,
}

impl LinuxClock {
    pub const CLOCK_REALTIME: Self = Self {
        clock: UnixClock::CLOCK_REALTIME,
    };
}

impl RelayClock for LinuxClock {
    fn now(&self) -> std::io::Result<i64> {
        use clock_steering::Clock;

        let now = self.clock.now()?;
        let seconds: i64 = now.seconds.into();
        Ok(seconds * 1_000_000_000 + now.nanos as i64)
    }
}
