use crate::core::config::AppConfig;
use crate::core::shared::utils::DbPool;
use crate::tickets::events::TicketEvent;
use tokio::sync::broadcast;

/// Shared application state handed to every handler.
///
/// The broadcast channel is the notification seam: subscribers (websocket
/// pushers, mailers, webhooks) receive every committed domain event. Delivery
/// is their concern, not ours.
pub struct AppState {
    pub conn: DbPool,
    pub config: AppConfig,
    pub events: broadcast::Sender<TicketEvent>,
}

impl AppState {
    pub fn new(conn: DbPool, config: AppConfig) -> Self {
        let (events, _) = broadcast::channel(1024);
        Self {
            conn,
            config,
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TicketEvent> {
        self.events.subscribe()
    }
}
