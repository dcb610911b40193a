//! Transparent clock handling of every datagram crossing the relay

use std::sync::Arc;

use crate::{
    clock::RelayClock,
    correction::{residence, stamp_ingress, Residence},
    ptp::{Correction, MessageType, PtpMessage},
    residence::ResidenceState,
    RelayConfig,
};

/// Which way a datagram crosses the relay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// From the local network towards the tunnel
    Ingress,
    /// From the tunnel towards the local network
    Egress,
}

/// Result of classifying a datagram
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketType {
    Ptp(MessageType),
    /// Not a PTP message this relay can decode
    Unrecognized,
}

pub struct Classifier {
    config: RelayConfig,
    state: Arc<ResidenceState>,
    clock: Box<dyn RelayClock>,
}

impl Classifier {
    pub fn new(
        config: RelayConfig,
        state: Arc<ResidenceState>,
        clock: Box<dyn RelayClock>,
    ) -> Self {
        Self {
            config,
            state,
            clock,
        }
    }

    pub fn state(&self) -> &ResidenceState {
        &self.state
    }

    /// Apply the transparent clock corrections to a datagram.
    ///
    /// Returns the packet type for routing and the bytes to forward. Anything
    /// that fails along the way leaves the datagram as it was received, except
    /// that an ingress stamp is never forwarded onto the local network.
    pub fn classify_and_correct(
        &self,
        direction: Direction,
        data: &[u8],
    ) -> (PacketType, Vec<u8>) {
        let mut message = match PtpMessage::decode(data) {
            Ok(message) => message,
            Err(error) => {
                log::debug!("Could not decode {:?} datagram: {}", direction, error);
                return (PacketType::Unrecognized, data.to_vec());
            }
        };

        let message_type = message.message_type();

        let rewritten = match self.correct(direction, &mut message) {
            Ok(rewritten) => rewritten,
            Err(error) => {
                log::error!("Could not read clock for {}: {}", message_type, error);
                if direction == Direction::Egress {
                    message.set_correction(Correction::ZERO);
                    true
                } else {
                    false
                }
            }
        };

        if !rewritten {
            return (PacketType::Ptp(message_type), data.to_vec());
        }

        match message.encode() {
            Ok(encoded) => (PacketType::Ptp(message_type), encoded),
            Err(error) => {
                log::error!("Could not encode {}: {}", message_type, error);
                (PacketType::Ptp(message_type), data.to_vec())
            }
        }
    }

    /// Update the correction field of the message, returning whether it changed
    fn correct(&self, direction: Direction, message: &mut PtpMessage) -> std::io::Result<bool> {
        match (message.message_type(), direction) {
            (MessageType::Sync | MessageType::DelayReq, Direction::Ingress) => {
                message.set_correction(stamp_ingress(self.clock.as_ref())?);
            }
            (MessageType::Sync | MessageType::DelayReq, Direction::Egress) => {
                let residence = residence(self.clock.as_ref(), message.correction())?;
                if let Residence::Clamped { nanos } = residence {
                    let count = self.state.record_clamped();
                    log::warn!(
                        "Clamped nonsense residence time of {}ns to zero ({} so far), \
                         are the relay clocks synchronized?",
                        nanos,
                        count
                    );
                }
                let correction = residence.correction();

                log::trace!(
                    "{} domain {} seq {} residence {}ns",
                    message.message_type(),
                    message.domain_number(),
                    message.sequence_id(),
                    correction.nanos()
                );

                if self.config.two_step {
                    message.set_correction(Correction::ZERO);
                    if message.message_type() == MessageType::Sync {
                        self.state.set_last_sync_residence(correction);
                    } else {
                        self.state.set_last_delay_req_residence(correction);
                    }
                } else {
                    message.set_correction(correction);
                }
            }
            (MessageType::FollowUp, Direction::Egress) => {
                message.set_correction(self.state.last_sync_residence());
            }
            (MessageType::DelayResp, Direction::Ingress) => {
                message.set_correction(self.state.last_delay_req_residence());
            }
            _ => return Ok(false),
        }

        Ok(true)
    }
}
