use async_trait::async_trait;
use socketioxide::extract::SocketRef;
use socketioxide::SocketIo;

/// Event name clients listen on; receivers re-fetch on every event.
pub const DONATION_UPDATE_EVENT: &str = "donationUpdate";

/// Tells connected clients that the donation list changed.
#[async_trait]
pub trait ChangeNotifier: Send + Sync {
    async fn notify_changed(&self);
}

pub struct SocketIoNotifier {
    io: SocketIo,
}

impl SocketIoNotifier {
    pub fn new(io: SocketIo) -> Self {
        io.ns("/", on_connect);
        Self { io }
    }
}

async fn on_connect(socket: SocketRef) {
    tracing::debug!(sid = %socket.id, "Realtime client connected");
}

#[async_trait]
impl ChangeNotifier for SocketIoNotifier {
    async fn notify_changed(&self) {
        if let Err(e) = self.io.emit(DONATION_UPDATE_EVENT, &()).await {
            tracing::warn!("Broadcasting {} failed: {}", DONATION_UPDATE_EVENT, e);
        }
    }
}
