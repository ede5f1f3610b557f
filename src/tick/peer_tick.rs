use std::sync::Arc;
use bytes::Bytes;
use tokio::sync::{RwLock, mpsc};
use tokio::time::{interval, Duration, Instant, MissedTickBehavior};
use crate::handlers::bus::SessionBus;
use crate::handlers::protocol::{Frame, RemoteCall, Target};
use crate::state::commands::{drain_and_coalesce, drain_inputs, PeerInput};
use crate::state::peer::Peer;
use crate::types::PeerId;
use crate::utils::buffers::PacketBuffer;
use crate::utils::config::Config;

/// Per-peer tick loop - applies remote calls, local inputs and due timers,
/// then flushes whatever the peer queued onto the bus.
/// Runs at a fixed tick rate (50Hz by default) until every input sender is gone.
pub async fn peer_tick_loop(
    peer: Arc<RwLock<Peer>>,
    mut inbox_rx: mpsc::Receiver<Bytes>,
    mut input_rx: mpsc::Receiver<PeerInput>,
    bus: Arc<SessionBus>,
    config: Arc<Config>,
) {
    let tick_interval = Duration::from_millis(config.tick_interval_ms());
    let mut tick_timer = interval(tick_interval);
    tick_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let replicate_every = config.ticks_per_replication();
    let mut send_buffer = PacketBuffer::default();
    let mut tick: u64 = 0;

    loop {
        tick_timer.tick().await;
        tick += 1;
        let now = Instant::now();

        // 1. Drain the inbox (superseded snapshots collapse into the latest)
        let frames = drain_and_coalesce(&mut inbox_rx);
        let (inputs, open) = drain_inputs(&mut input_rx);

        // 2. Acquire lock ONCE per tick
        let mut guard = peer.write().await;

        // 3. Remote calls, then local operations, then continuations
        for frame in frames {
            guard.handle_frame(now, frame);
        }
        for input in inputs {
            guard.handle_input(now, input);
        }
        guard.run_timers(now);

        // 4. Full-state replication on its own, slower cadence
        if tick % replicate_every == 0 {
            guard.replicate();
        }

        let from = guard.id();
        let outgoing = guard.take_outbox();
        drop(guard);

        // 5. Flush (reuse buffer)
        flush(&bus, from, outgoing, &mut send_buffer);

        if !open {
            log::debug!("Input closed for {}, stopping tick loop after {} ticks", from, tick);
            break;
        }
    }
}

/// Encode and route queued calls. Returns how many deliveries succeeded.
pub fn flush(
    bus: &SessionBus,
    from: PeerId,
    outgoing: Vec<(Target, RemoteCall)>,
    buffer: &mut PacketBuffer,
) -> usize {
    let mut delivered = 0;
    for (target, call) in outgoing {
        let frame = Frame::new(from, target, call);
        match frame.encode(buffer) {
            Ok(bytes) => delivered += bus.route(&frame, bytes),
            Err(e) => log::warn!("Failed to encode {} from {}: {}", frame.call.name(), from, e),
        }
    }
    delivered
}
