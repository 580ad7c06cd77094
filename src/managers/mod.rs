// Managers Module
//
// Focused manager types owned by the session handle.
// - BroadcastChannelManager: Tokio broadcast channels toward the output sink

pub mod broadcast_manager;

pub use broadcast_manager::BroadcastChannelManager;
