pub mod peer_tick;
pub mod replication;
pub mod timers;
