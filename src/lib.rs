//! Transparent clock relay between a PTP network and a mobile core tunnel
//!
//! Every Sync and Delay_Req crossing the relay gets the time it spent inside
//! the relay added as a correction, either directly (one step) or through the
//! matching Follow_Up and Delay_Resp (two step). Peer to peer delay messages
//! are forwarded without correction.

pub mod classifier;
pub mod clock;
pub mod config;
pub mod correction;
pub mod ptp;
pub mod relay;
pub mod residence;
pub mod socket;

use std::sync::Arc;

use classifier::Classifier;
use clock::RelayClock;
use relay::{run_egress, run_ingress, Destination, EgressRoutes};
use residence::ResidenceState;
use tokio::task::JoinSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RelayConfig {
    /// Defer residence times to Follow_Up and Delay_Resp instead of writing
    /// them into Sync and Delay_Req
    pub two_step: bool,
}

/// Already opened sockets of both sides of the relay
#[derive(Debug, Clone)]
pub struct RelaySockets {
    pub tunnel: Destination,
    pub local: EgressRoutes,
}

impl RelaySockets {
    fn listeners(&self) -> Vec<Arc<tokio::net::UdpSocket>> {
        match &self.local {
            EgressRoutes::Unicast(routes) => {
                vec![routes.event.socket.clone(), routes.general.socket.clone()]
            }
            EgressRoutes::Multicast(routes) => vec![
                routes.primary_event.clone(),
                routes.primary_general.clone(),
                routes.pdelay_event.clone(),
                routes.pdelay_general.clone(),
            ],
        }
    }
}

/// Spawn the ingress task of every local socket and the egress task.
///
/// The returned set of tasks never completes under normal operation.
pub fn spawn_relay(
    config: RelayConfig,
    sockets: RelaySockets,
    clock: Box<dyn RelayClock>,
) -> (JoinSet<()>, Arc<ResidenceState>) {
    let state = Arc::new(ResidenceState::new());
    let classifier = Arc::new(Classifier::new(config, state.clone(), clock));

    let mut tasks = JoinSet::new();

    for listen in sockets.listeners() {
        tasks.spawn(run_ingress(
            listen,
            sockets.tunnel.clone(),
            classifier.clone(),
        ));
    }

    tasks.spawn(run_egress(
        sockets.tunnel.socket.clone(),
        sockets.local,
        classifier,
    ));

    (tasks, state)
}
