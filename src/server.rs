use log::info;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tokio::time::{Duration, Instant};
use crate::domain::effects::EffectSink;
use crate::domain::world::CombatWorld;
use crate::state::commands::PeerInput;
use crate::state::peer::Peer;
use crate::state::session::{PeerHandle, SessionState};
use crate::tick::peer_tick::peer_tick_loop;
use crate::types::{PeerId, WeaponId};
use crate::utils::config::Config;
use crate::utils::weapondb::WeaponDb;

/// Weapon ids mirror peer ids: every peer carries exactly one weapon
pub fn weapon_of(peer: PeerId) -> WeaponId {
    WeaponId(peer.0)
}

/// Create a session of `config.peer_count` peers and spawn their tick loops.
/// The first peer is the authoritative host. Each peer owns one weapon of the
/// default kind and mirrors everyone else's.
pub async fn start_session<W, E>(
    config: Arc<Config>,
    weapons: Arc<WeaponDb>,
    make_world: W,
    make_effects: E,
) -> Result<Arc<SessionState>, Box<dyn std::error::Error>>
where
    W: Fn(PeerId) -> Box<dyn CombatWorld>,
    E: Fn(PeerId) -> Box<dyn EffectSink>,
{
    if config.peer_count == 0 {
        return Err("Session needs at least one peer".into());
    }

    let state = Arc::new(SessionState::new());
    let kind = WeaponDb::default_weapon_id();
    let trail_duration = Duration::from_millis(config.trail_duration_ms);
    let now = Instant::now();

    let ids: Vec<PeerId> = (0..config.peer_count).map(|_| state.next_peer_id()).collect();

    for &id in &ids {
        let mut peer = Peer::new(
            id,
            state.roles(),
            weapons.clone(),
            make_world(id),
            make_effects(id),
            trail_duration,
            now,
        );
        peer.equip(weapon_of(id), kind)?;
        for &other in ids.iter().filter(|&&other| other != id) {
            peer.observe(weapon_of(other), other, kind)?;
        }

        let peer = Arc::new(RwLock::new(peer));

        // Create channels
        let (inbox_tx, inbox_rx) = mpsc::channel(config.inbox_capacity);
        let (input_tx, input_rx) = mpsc::channel::<PeerInput>(config.inbox_capacity);
        state.bus().register(id, inbox_tx);

        // Spawn tick loop
        let tick_peer = peer.clone();
        let tick_bus = state.bus();
        let tick_config = config.clone();
        let task_handle = tokio::spawn(async move {
            peer_tick_loop(tick_peer, inbox_rx, input_rx, tick_bus, tick_config).await;
        });

        state.insert_peer(id, PeerHandle {
            peer,
            input_tx,
            task_handle,
        });
    }

    info!(
        "Session {} started: {} peers, host {}, {}Hz tick, {}Hz replication",
        state.id(),
        ids.len(),
        state.roles().host(),
        config.tick_rate_hz,
        config.replication_rate_hz
    );
    Ok(state)
}
