//! Owner-authoritative weapon synchronisation for small peer-to-peer sessions.
//!
//! Each weapon is written only by the peer that owns it; hits are decided
//! only by the session host; everybody else sees periodic full snapshots.

pub mod domain;
pub mod error;
pub mod handlers;
pub mod server;
pub mod state;
pub mod tick;
pub mod types;
pub mod utils;

pub use error::{SyncError, SyncResult};
pub use types::{PeerId, Vec3, WeaponId};
