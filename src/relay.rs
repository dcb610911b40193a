//! The forwarding tasks
//!
//! One ingress task runs per local network socket, forwarding everything it
//! receives into the tunnel. A single egress task reads from the tunnel and
//! picks the local socket by message type.

use std::{
    net::{SocketAddr, SocketAddrV4},
    sync::Arc,
};

use tokio::net::UdpSocket;

use crate::{
    classifier::{Classifier, Direction, PacketType},
    ptp::MessageType,
    socket::PtpTargetAddress,
};

/// Large enough for any PTP message we expect to relay
pub const MAX_DATAGRAM_LEN: usize = 2048;

/// PTP port a message has to be sent from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortKind {
    /// Port 319
    Event,
    /// Port 320
    General,
}

/// IEEE 1588 multicast group a message has to be sent to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MulticastGroup {
    /// 224.0.1.129, everything but the peer delay mechanism
    Primary,
    /// 224.0.0.107, peer delay mechanism only
    PeerDelay,
}

pub fn unicast_target(message_type: MessageType) -> PortKind {
    if message_type.is_event() {
        PortKind::Event
    } else {
        PortKind::General
    }
}

pub fn multicast_target(message_type: MessageType) -> (MulticastGroup, PortKind) {
    let group = if message_type.is_peer_delay() {
        MulticastGroup::PeerDelay
    } else {
        MulticastGroup::Primary
    };
    (group, unicast_target(message_type))
}

/// A socket together with the address traffic on it is sent to
#[derive(Debug, Clone)]
pub struct Destination {
    pub socket: Arc<UdpSocket>,
    pub addr: SocketAddr,
}

impl Destination {
    pub fn new(socket: Arc<UdpSocket>, addr: SocketAddr) -> Self {
        Self { socket, addr }
    }
}

#[derive(Debug, Clone)]
pub struct UnicastRoutes {
    pub event: Destination,
    pub general: Destination,
}

impl UnicastRoutes {
    pub fn route(&self, message_type: MessageType) -> &Destination {
        match unicast_target(message_type) {
            PortKind::Event => &self.event,
            PortKind::General => &self.general,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MulticastRoutes {
    pub primary_event: Arc<UdpSocket>,
    pub primary_general: Arc<UdpSocket>,
    pub pdelay_event: Arc<UdpSocket>,
    pub pdelay_general: Arc<UdpSocket>,
}

impl MulticastRoutes {
    pub fn route(&self, message_type: MessageType) -> Destination {
        let (socket, addr) = match multicast_target(message_type) {
            (MulticastGroup::Primary, PortKind::Event) => {
                (&self.primary_event, SocketAddrV4::PRIMARY_EVENT)
            }
            (MulticastGroup::Primary, PortKind::General) => {
                (&self.primary_general, SocketAddrV4::PRIMARY_GENERAL)
            }
            (MulticastGroup::PeerDelay, PortKind::Event) => {
                (&self.pdelay_event, SocketAddrV4::PDELAY_EVENT)
            }
            (MulticastGroup::PeerDelay, PortKind::General) => {
                (&self.pdelay_general, SocketAddrV4::PDELAY_GENERAL)
            }
        };
        Destination::new(socket.clone(), addr.into())
    }
}

#[derive(Debug, Clone)]
pub enum EgressRoutes {
    Unicast(UnicastRoutes),
    Multicast(MulticastRoutes),
}

impl EgressRoutes {
    fn route(&self, message_type: MessageType) -> Destination {
        match self {
            EgressRoutes::Unicast(routes) => routes.route(message_type).clone(),
            EgressRoutes::Multicast(routes) => routes.route(message_type),
        }
    }
}

/// Forward datagrams from a local network socket into the tunnel, forever
pub async fn run_ingress(
    listen: Arc<UdpSocket>,
    tunnel: Destination,
    classifier: Arc<Classifier>,
) {
    let mut buffer = [0; MAX_DATAGRAM_LEN];

    loop {
        let (len, source) = match listen.recv_from(&mut buffer).await {
            Ok(received) => received,
            Err(error) => {
                log::error!("Error receiving from local network: {}", error);
                continue;
            }
        };

        let (packet_type, data) =
            classifier.classify_and_correct(Direction::Ingress, &buffer[..len]);
        log::trace!("Ingress {:?} from {}", packet_type, source);

        if let Err(error) = tunnel.socket.send_to(&data, tunnel.addr).await {
            log::error!("Error sending to tunnel {}: {}", tunnel.addr, error);
        }
    }
}

/// Forward datagrams from the tunnel to the local network, forever
pub async fn run_egress(
    tunnel: Arc<UdpSocket>,
    routes: EgressRoutes,
    classifier: Arc<Classifier>,
) {
    let mut buffer = [0; MAX_DATAGRAM_LEN];

    loop {
        let len = match tunnel.recv_from(&mut buffer).await {
            Ok((len, _)) => len,
            Err(error) => {
                log::error!("Error receiving from tunnel: {}", error);
                continue;
            }
        };

        let (packet_type, data) =
            classifier.classify_and_correct(Direction::Egress, &buffer[..len]);

        let message_type = match packet_type {
            PacketType::Ptp(message_type) => message_type,
            PacketType::Unrecognized => {
                log::warn!("Dropping unknown type or non-PTP packet from tunnel");
                continue;
            }
        };

        let destination = routes.route(message_type);
        log::trace!("Egress {} to {}", message_type, destination.addr);

        if let Err(error) = destination.socket.send_to(&data, destination.addr).await {
            log::error!("Error sending {} to {}: {}", message_type, destination.addr, error);
        }
    }
}
