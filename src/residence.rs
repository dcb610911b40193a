//! Residence times waiting for their two-step follow up message
//!
//! Only the latest value per path is kept, without any sequence id
//! correlation. A Follow_Up (Delay_Resp) therefore receives the residence
//! time of whichever Sync (Delay_Req) passed the relay last, which is only
//! correct while at most one Sync/Follow_Up and one Delay_Req/Delay_Resp
//! exchange is in flight through the relay at a time.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Mutex, PoisonError,
};

use crate::ptp::Correction;

#[derive(Debug, Default)]
pub struct ResidenceState {
    last_sync: Mutex<Correction>,
    last_delay_req: Mutex<Correction>,
    clamped: AtomicU64,
}

impl ResidenceState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_sync_residence(&self) -> Correction {
        *self.last_sync.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_last_sync_residence(&self, residence: Correction) {
        *self.last_sync.lock().unwrap_or_else(PoisonError::into_inner) = residence;
    }

    pub fn last_delay_req_residence(&self) -> Correction {
        *self
            .last_delay_req
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_last_delay_req_residence(&self, residence: Correction) {
        *self
            .last_delay_req
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = residence;
    }

    /// Record a residence time that had to be clamped to zero, returning the
    /// number of clamped residence times seen so far.
    pub fn record_clamped(&self) -> u64 {
        self.clamped.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn clamped_residences(&self) -> u64 {
        self.clamped.load(Ordering::Relaxed)
    }
}
