//! Event, general and tunnel sockets for linux systems

#![forbid(unsafe_code)]

use std::{
    io::ErrorKind,
    net::{Ipv4Addr, SocketAddr, SocketAddrV4},
    sync::Arc,
};

use socket2::{Domain, InterfaceIndexOrAddress, Protocol, Socket, Type};
use timestamped_socket::interface::InterfaceName;
use tokio::net::UdpSocket;

use crate::relay::{Destination, MulticastRoutes, UnicastRoutes};

const IPV4_PRIMARY_MULTICAST: Ipv4Addr = Ipv4Addr::new(224, 0, 1, 129);
const IPV4_PDELAY_MULTICAST: Ipv4Addr = Ipv4Addr::new(224, 0, 0, 107);

pub const EVENT_PORT: u16 = 319;
pub const GENERAL_PORT: u16 = 320;

/// Port used on both tunnel endpoints, as 319 and 320 are taken by the local
/// network sockets.
pub const TUNNEL_PORT: u16 = 38495;

pub trait PtpTargetAddress {
    const PRIMARY_EVENT: Self;
    const PRIMARY_GENERAL: Self;
    const PDELAY_EVENT: Self;
    const PDELAY_GENERAL: Self;
}

impl PtpTargetAddress for SocketAddrV4 {
    const PRIMARY_EVENT: Self = SocketAddrV4::new(IPV4_PRIMARY_MULTICAST, EVENT_PORT);
    const PRIMARY_GENERAL: Self = SocketAddrV4::new(IPV4_PRIMARY_MULTICAST, GENERAL_PORT);
    const PDELAY_EVENT: Self = SocketAddrV4::new(IPV4_PDELAY_MULTICAST, EVENT_PORT);
    const PDELAY_GENERAL: Self = SocketAddrV4::new(IPV4_PDELAY_MULTICAST, GENERAL_PORT);
}

fn into_tokio(socket: Socket) -> std::io::Result<Arc<UdpSocket>> {
    socket.set_nonblocking(true)?;
    Ok(Arc::new(UdpSocket::from_std(socket.into())?))
}

async fn bind_any(port: u16) -> std::io::Result<Arc<UdpSocket>> {
    let socket = UdpSocket::bind(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port)).await?;
    Ok(Arc::new(socket))
}

/// Socket towards the other end of the tunnel
pub async fn open_tunnel_socket(peer: Ipv4Addr) -> std::io::Result<Destination> {
    let socket = bind_any(TUNNEL_PORT).await?;
    Ok(Destination::new(
        socket,
        SocketAddrV4::new(peer, TUNNEL_PORT).into(),
    ))
}

/// Event and general sockets exchanging unicast PTP with a single peer
pub async fn open_unicast_sockets(peer: Ipv4Addr) -> std::io::Result<UnicastRoutes> {
    let event = bind_any(EVENT_PORT).await?;
    let general = bind_any(GENERAL_PORT).await?;

    Ok(UnicastRoutes {
        event: Destination::new(event, SocketAddr::from((peer, EVENT_PORT))),
        general: Destination::new(general, SocketAddr::from((peer, GENERAL_PORT))),
    })
}

fn interface_index(interface: InterfaceName) -> std::io::Result<u32> {
    interface.get_index().ok_or_else(|| {
        std::io::Error::new(ErrorKind::NotFound, format!("no such interface {interface}"))
    })
}

/// Socket receiving and sending only the given multicast group on the
/// given interface
fn open_ipv4_multicast_socket(
    interface: InterfaceName,
    group: SocketAddrV4,
) -> std::io::Result<Arc<UdpSocket>> {
    let index = interface_index(interface)?;

    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    socket.bind_device(Some(interface.as_str().as_bytes()))?;

    // binding to the group address filters out the other group on this port
    socket.bind(&group.into())?;

    socket.join_multicast_v4_n(group.ip(), &InterfaceIndexOrAddress::Index(index))?;
    socket.set_multicast_loop_v4(false)?;
    socket.set_multicast_ttl_v4(1)?;

    into_tokio(socket)
}

/// The four IEEE 1588 multicast sockets on the given interface
pub fn open_multicast_sockets(interface: InterfaceName) -> std::io::Result<MulticastRoutes> {
    Ok(MulticastRoutes {
        primary_event: open_ipv4_multicast_socket(interface, SocketAddrV4::PRIMARY_EVENT)?,
        primary_general: open_ipv4_multicast_socket(interface, SocketAddrV4::PRIMARY_GENERAL)?,
        pdelay_event: open_ipv4_multicast_socket(interface, SocketAddrV4::PDELAY_EVENT)?,
        pdelay_general: open_ipv4_multicast_socket(interface, SocketAddrV4::PDELAY_GENERAL)?,
    })
}
