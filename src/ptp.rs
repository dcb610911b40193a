//! Header-level PTPv2 codec
//!
//! The relay never needs the message bodies, only the header type and the
//! correction field, so a decoded message keeps the original datagram and
//! rewrites the correction field in place on encode.

use fixed::types::I48F16;
use statime::port::is_message_buffer_compatible;

pub const HEADER_LEN: usize = 34;

const CORRECTION_RANGE: core::ops::Range<usize> = 8..16;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireFormatError {
    #[error("buffer too short: need {needed} bytes, have {have}")]
    BufferTooShort { needed: usize, have: usize },
    #[error("not a PTPv2 message")]
    IncompatibleVersion,
    #[error("unknown message type {0:#x}")]
    UnknownMessageType(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    Sync = 0x0,
    DelayReq = 0x1,
    PDelayReq = 0x2,
    PDelayResp = 0x3,
    FollowUp = 0x8,
    DelayResp = 0x9,
    PDelayRespFollowUp = 0xA,
    Announce = 0xB,
    Signaling = 0xC,
    Management = 0xD,
}

impl MessageType {
    /// Parse from the lower nibble of the first header byte.
    pub fn from_nibble(value: u8) -> Result<Self, WireFormatError> {
        Ok(match value & 0x0f {
            0x0 => Self::Sync,
            0x1 => Self::DelayReq,
            0x2 => Self::PDelayReq,
            0x3 => Self::PDelayResp,
            0x8 => Self::FollowUp,
            0x9 => Self::DelayResp,
            0xA => Self::PDelayRespFollowUp,
            0xB => Self::Announce,
            0xC => Self::Signaling,
            0xD => Self::Management,
            other => return Err(WireFormatError::UnknownMessageType(other)),
        })
    }

    /// Event messages travel on port 319, everything else on port 320.
    pub fn is_event(self) -> bool {
        matches!(
            self,
            Self::Sync | Self::DelayReq | Self::PDelayReq | Self::PDelayResp
        )
    }

    /// Messages of the peer delay mechanism, which stay within the link-local
    /// peer multicast group.
    pub fn is_peer_delay(self) -> bool {
        matches!(
            self,
            Self::PDelayReq | Self::PDelayResp | Self::PDelayRespFollowUp
        )
    }
}

impl core::fmt::Display for MessageType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            Self::Sync => "Sync",
            Self::DelayReq => "Delay_Req",
            Self::PDelayReq => "Pdelay_Req",
            Self::PDelayResp => "Pdelay_Resp",
            Self::FollowUp => "Follow_Up",
            Self::DelayResp => "Delay_Resp",
            Self::PDelayRespFollowUp => "Pdelay_Resp_Follow_Up",
            Self::Announce => "Announce",
            Self::Signaling => "Signaling",
            Self::Management => "Management",
        };
        f.write_str(name)
    }
}

/// The header correction field: signed nanoseconds scaled by 2^16.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Correction(I48F16);

impl Correction {
    pub const ZERO: Self = Self(I48F16::ZERO);

    pub fn from_nanos(nanos: i64) -> Self {
        Self(I48F16::saturating_from_num(nanos))
    }

    /// Whole nanoseconds, fractional part truncated towards negative infinity.
    pub fn nanos(self) -> i64 {
        self.0.to_num()
    }

    /// Raw 64-bit content of the field, without any scaling.
    pub fn to_bits(self) -> i64 {
        self.0.to_bits()
    }

    pub fn from_bits(bits: i64) -> Self {
        Self(I48F16::from_bits(bits))
    }

    fn from_wire(bytes: &[u8]) -> Self {
        let mut raw = [0; 8];
        raw.copy_from_slice(&bytes[CORRECTION_RANGE]);
        Self::from_bits(i64::from_be_bytes(raw))
    }
}

/// A decoded PTP datagram
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PtpMessage {
    message_type: MessageType,
    correction: Correction,
    data: Vec<u8>,
}

impl PtpMessage {
    pub fn decode(buffer: &[u8]) -> Result<Self, WireFormatError> {
        if buffer.len() < HEADER_LEN {
            return Err(WireFormatError::BufferTooShort {
                needed: HEADER_LEN,
                have: buffer.len(),
            });
        }

        if !is_message_buffer_compatible(buffer) {
            return Err(WireFormatError::IncompatibleVersion);
        }

        let message_type = MessageType::from_nibble(buffer[0])?;

        let message_length = u16::from_be_bytes([buffer[2], buffer[3]]) as usize;
        if message_length > buffer.len() {
            return Err(WireFormatError::BufferTooShort {
                needed: message_length,
                have: buffer.len(),
            });
        }

        Ok(Self {
            message_type,
            correction: Correction::from_wire(buffer),
            data: buffer.to_vec(),
        })
    }

    /// Serialize the message, carrying every byte other than the correction
    /// field over from the decoded datagram.
    pub fn encode(&self) -> Result<Vec<u8>, WireFormatError> {
        if self.data.len() < HEADER_LEN {
            return Err(WireFormatError::BufferTooShort {
                needed: HEADER_LEN,
                have: self.data.len(),
            });
        }

        let mut buffer = self.data.clone();
        buffer[CORRECTION_RANGE].copy_from_slice(&self.correction.to_bits().to_be_bytes());
        Ok(buffer)
    }

    pub fn message_type(&self) -> MessageType {
        self.message_type
    }

    pub fn correction(&self) -> Correction {
        self.correction
    }

    pub fn set_correction(&mut self, correction: Correction) {
        self.correction = correction;
    }

    pub fn domain_number(&self) -> u8 {
        self.data[4]
    }

    pub fn sequence_id(&self) -> u16 {
        u16::from_be_bytes([self.data[30], self.data[31]])
    }
}

/// Build a bare PTPv2 message of the given type for tests
#[cfg(test)]
pub(crate) fn test_message(message_type: MessageType, correction: Correction) -> Vec<u8> {
    let body_len = match message_type {
        MessageType::Announce => 30,
        MessageType::DelayResp | MessageType::PDelayResp | MessageType::PDelayRespFollowUp => 20,
        _ => 10,
    };
    let total = HEADER_LEN + body_len;

    let mut buffer = vec![0; total];
    buffer[0] = message_type as u8;
    buffer[1] = 0x02;
    buffer[2..4].copy_from_slice(&(total as u16).to_be_bytes());
    buffer[8..16].copy_from_slice(&correction.to_bits().to_be_bytes());
    buffer[20..28].copy_from_slice(&[0, 1, 2, 3, 4, 5, 6, 7]);
    buffer[28..30].copy_from_slice(&1u16.to_be_bytes());
    buffer[30..32].copy_from_slice(&0xbeefu16.to_be_bytes());
    buffer
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn correction_wireformat() {
        let representations = [
            ([0x00, 0x00, 0x00, 0x00, 0x00, 0x02, 0x80, 0x00u8], 2.5f64),
            ([0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x00, 0x00u8], -1.0f64),
        ];

        for (bytes, nanos) in representations {
            let mut buffer = test_message(MessageType::Sync, Correction::ZERO);
            buffer[8..16].copy_from_slice(&bytes);

            let message = PtpMessage::decode(&buffer).unwrap();
            assert_eq!(message.correction(), Correction(I48F16::from_num(nanos)));

            let encoded = message.encode().unwrap();
            assert_eq!(encoded[8..16], bytes);
        }
    }

    #[test]
    fn correction_nanos_are_scaled() {
        let correction = Correction::from_nanos(500_000);
        assert_eq!(correction.to_bits(), 500_000 << 16);
        assert_eq!(correction.nanos(), 500_000);
        assert_eq!(Correction::from_bits(correction.to_bits()), correction);
    }

    #[test]
    fn decode_header_fields() {
        let buffer = test_message(MessageType::FollowUp, Correction::from_nanos(42));
        let message = PtpMessage::decode(&buffer).unwrap();

        assert_eq!(message.message_type(), MessageType::FollowUp);
        assert_eq!(message.correction().nanos(), 42);
        assert_eq!(message.sequence_id(), 0xbeef);
        assert_eq!(message.domain_number(), 0);
    }

    #[test]
    fn encode_only_touches_correction() {
        let mut buffer = test_message(MessageType::Sync, Correction::ZERO);
        // trailing padding after messageLength must survive
        buffer.extend_from_slice(&[0xaa; 6]);

        let mut message = PtpMessage::decode(&buffer).unwrap();
        message.set_correction(Correction::from_nanos(1000));
        let encoded = message.encode().unwrap();

        assert_eq!(encoded.len(), buffer.len());
        assert_eq!(encoded[..8], buffer[..8]);
        assert_eq!(encoded[16..], buffer[16..]);
        assert_eq!(
            i64::from_be_bytes(encoded[8..16].try_into().unwrap()),
            1000 << 16
        );
    }

    #[test]
    fn decode_rejects_malformed() {
        assert!(matches!(
            PtpMessage::decode(&[0; 10]),
            Err(WireFormatError::BufferTooShort { needed: 34, have: 10 })
        ));

        let mut unknown = test_message(MessageType::Sync, Correction::ZERO);
        unknown[0] = 0x05;
        assert_eq!(
            PtpMessage::decode(&unknown),
            Err(WireFormatError::UnknownMessageType(0x05))
        );

        let mut truncated = test_message(MessageType::Announce, Correction::ZERO);
        truncated.truncate(HEADER_LEN + 2);
        assert!(matches!(
            PtpMessage::decode(&truncated),
            Err(WireFormatError::BufferTooShort { .. })
        ));

        let mut version1 = test_message(MessageType::Sync, Correction::ZERO);
        version1[1] = 0x01;
        assert!(PtpMessage::decode(&version1).is_err());
    }

    #[test]
    fn message_type_port_groups() {
        use MessageType::*;

        for event in [Sync, DelayReq, PDelayReq, PDelayResp] {
            assert!(event.is_event(), "{event}");
        }
        for general in [
            FollowUp,
            DelayResp,
            PDelayRespFollowUp,
            Announce,
            Signaling,
            Management,
        ] {
            assert!(!general.is_event(), "{general}");
        }

        assert!(PDelayRespFollowUp.is_peer_delay());
        assert!(!Sync.is_peer_delay());
    }
}
