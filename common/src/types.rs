//! Defines common types that many crates can depend on

use tokio::sync::watch::{self, Receiver as WatchReceiver, Sender as WatchSender};

/// A type alias for an empty channel used to signal cancellation to workers
pub type CancelChannel = WatchReceiver<()>;
/// The sending half of a cancel channel, held by whoever owns the worker
pub type CancelSender = WatchSender<()>;

/// Create a new cancel channel
pub fn new_cancel_channel() -> (CancelSender, CancelChannel) {
    watch::channel(())
}
