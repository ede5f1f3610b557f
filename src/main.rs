use std::sync::Arc;
use tokio::time::{interval, sleep, Duration};
use gunsync::domain::effects::{EffectSink, LogEffects};
use gunsync::domain::weapon::{Muzzle, WeaponState};
use gunsync::domain::world::{Arena, CombatWorld, TargetHandle};
use gunsync::server::{self, weapon_of};
use gunsync::state::commands::PeerInput;
use gunsync::state::peer::WeaponSlot;
use gunsync::state::session::SessionState;
use gunsync::types::Vec3;
use gunsync::utils::config::Config;
use gunsync::utils::weapondb::WeaponDb;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Arc::new(Config::from_env()?);
    setup_logging(&config)?;

    // Load immutable globals (zero contention)
    let weapons = Arc::new(WeaponDb::load());
    let lanes = config.peer_count;

    let session = server::start_session(
        config.clone(),
        weapons,
        |_| Box::new(Arena::shooting_range(lanes)) as Box<dyn CombatWorld>,
        |id| Box::new(LogEffects::new(id)) as Box<dyn EffectSink>,
    )
    .await?;

    let bots = tokio::spawn(drive_bots(session.clone()));

    tokio::select! {
        _ = sleep(Duration::from_secs(config.run_secs)) => {
            log::info!("Run time of {}s elapsed", config.run_secs);
        }
        _ = tokio::signal::ctrl_c() => {
            log::info!("Interrupted");
        }
    }

    bots.abort();
    log_summary(&session, lanes).await;
    session.shutdown().await;
    Ok(())
}

/// Every peer aims down its own lane and holds the trigger, reloading when dry.
/// The last peer aims high and misses. Now and then the host hands out ammo.
async fn drive_bots(session: Arc<SessionState>) {
    let ids = session.peer_ids();
    let highest = ids.last().copied();
    for &id in &ids {
        let lift = if Some(id) == highest && ids.len() > 1 { 0.2 } else { 0.0 };
        let muzzle = Muzzle {
            origin: Vec3::new((id.0 - 1) as f32 * 2.0, 1.0, 0.0),
            direction: Vec3::new(0.0, lift, 1.0).normalize(),
        };
        if let Err(e) = session.send_input(id, PeerInput::Aim { weapon: weapon_of(id), muzzle }) {
            log::warn!("Could not aim for {}: {}", id, e);
        }
        for &observer in ids.iter().filter(|&&observer| observer != id) {
            let track = PeerInput::TrackMirror { weapon: weapon_of(id), muzzle };
            if let Err(e) = session.send_input(observer, track) {
                log::warn!("Could not place {} on {}: {}", weapon_of(id), observer, e);
            }
        }
    }

    let host = session.roles().host();
    let mut ticker = interval(Duration::from_millis(150));
    let mut round: u64 = 0;
    loop {
        ticker.tick().await;
        round += 1;

        for &id in &ids {
            let weapon = weapon_of(id);
            let Some(peer) = session.peer(id) else {
                return;
            };
            let state = peer.read().await.owned(weapon).map(|w| w.state());
            let input = match state {
                Some(WeaponState::Empty) => PeerInput::Reload { weapon },
                Some(_) => PeerInput::Fire { weapon },
                None => continue,
            };
            if session.send_input(id, input).is_err() {
                return;
            }
        }

        if round % 40 == 0 {
            let lucky = ids[(round / 40) as usize % ids.len()];
            let pack = PeerInput::UseAmmoPack { weapon: weapon_of(lucky), amount: 30 };
            if session.send_input(host, pack).is_err() {
                return;
            }
        }
    }
}

async fn log_summary(session: &SessionState, lanes: u32) {
    for id in session.peer_ids() {
        let Some(peer) = session.peer(id) else {
            continue;
        };
        let peer = peer.read().await;
        for slot in peer.slots() {
            match slot {
                WeaponSlot::Owned(owned) => {
                    let weapon = &owned.weapon;
                    log::info!(
                        "{}: owns {} {:?} {}/{} + {}",
                        id,
                        weapon.id(),
                        weapon.state(),
                        weapon.ammo().magazine(),
                        weapon.ammo().capacity(),
                        weapon.ammo().reserve()
                    );
                }
                WeaponSlot::Mirrored(mirror) => {
                    log::info!(
                        "{}: sees {} of {} as {:?} after {} updates",
                        id,
                        mirror.id(),
                        mirror.owner(),
                        mirror.snapshot(),
                        mirror.updates()
                    );
                }
            }
        }
        if peer.is_host() {
            for lane in 1..=lanes {
                if let Some(health) = peer.world().target_health(TargetHandle(lane)) {
                    log::info!("{}: dummy {} at {:.0} health", id, lane, health);
                }
            }
        }
    }
}

fn setup_logging(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{}[{}][{}] {}",
                chrono::Utc::now().format("[%Y-%m-%d][%H:%M:%S]"),
                record.target(),
                record.level(),
                message
            ))
        })
        .level(config.log_level_filter())
        .chain(std::io::stdout())
        .chain(fern::log_file(&config.log_file)?)
        .apply()?;
    Ok(())
}
