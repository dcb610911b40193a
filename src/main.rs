use std::time::Duration;

use clap::Parser;
use fern::colors::Color;
use ptp_tt::{
    clock::LinuxClock,
    config::{Args, Config, NetworkMode},
    relay::EgressRoutes,
    socket::{open_multicast_sockets, open_tunnel_socket, open_unicast_sockets},
    spawn_relay, RelaySockets,
};

const CLAMP_REPORT_INTERVAL: Duration = Duration::from_secs(60);

fn setup_logger(level: log::LevelFilter) -> Result<(), fern::InitError> {
    let colors = fern::colors::ColoredLevelConfig::new()
        .error(Color::Red)
        .warn(Color::Yellow)
        .info(Color::BrightGreen)
        .debug(Color::BrightBlue)
        .trace(Color::BrightBlack);

    fern::Dispatch::new()
        .format(move |out, message, record| {
            use std::time::{SystemTime, UNIX_EPOCH};

            let delta = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default();

            let h = delta.as_secs() % (24 * 60 * 60) / (60 * 60);
            let m = delta.as_secs() % (60 * 60) / 60;
            let s = delta.as_secs() % 60;
            let f = delta.as_secs_f64().fract() * 1e7;

            out.finish(format_args!(
                "{}[{}][{}] {}",
                format_args!("[{h:02}:{m:02}:{s:02}.{f:07}]"),
                record.target(),
                colors.color(record.level()),
                message
            ))
        })
        .level(level)
        .chain(std::io::stdout())
        .apply()?;
    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(error) = actual_main().await {
        log::error!("{error}");
        eprintln!("ptp-tt: {error}");
        std::process::exit(1);
    }
}

async fn actual_main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::try_from(Args::parse())?;
    setup_logger(config.loglevel)?;

    let tunnel = open_tunnel_socket(config.tunnel_peer).await?;

    let local = match config.network_mode {
        NetworkMode::Unicast { peer } => {
            log::info!("Relaying unicast PTP with {}", peer);
            EgressRoutes::Unicast(open_unicast_sockets(peer).await?)
        }
        NetworkMode::Multicast { interface } => {
            log::info!("Relaying multicast PTP on {}", interface);
            EgressRoutes::Multicast(open_multicast_sockets(interface)?)
        }
    };

    log::info!(
        "Tunnel peer {}, {} mode",
        tunnel.addr,
        if config.relay.two_step {
            "two step"
        } else {
            "one step"
        }
    );

    let (mut tasks, state) = spawn_relay(
        config.relay,
        RelaySockets { tunnel, local },
        Box::new(LinuxClock::CLOCK_REALTIME),
    );

    log::info!("Initialization complete");

    let mut report = tokio::time::interval(CLAMP_REPORT_INTERVAL);
    let mut reported = 0;

    loop {
        tokio::select! {
            result = tasks.join_next() => match result {
                Some(Err(error)) => log::error!("Relay task stopped: {}", error),
                Some(Ok(())) => {}
                None => break,
            },
            _ = report.tick() => {
                let clamped = state.clamped_residences();
                if clamped != reported {
                    log::warn!(
                        "{} residence times clamped in the last {}s, {} in total",
                        clamped - reported,
                        CLAMP_REPORT_INTERVAL.as_secs(),
                        clamped
                    );
                    reported = clamped;
                }
            }
        }
    }

    log::info!(
        "All relay tasks stopped, {} residence times were clamped",
        state.clamped_residences()
    );

    Ok(())
}
