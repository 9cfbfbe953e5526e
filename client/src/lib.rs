pub mod api;
pub mod channel;
pub mod config;
pub mod session;
pub mod transport;
pub mod view;

pub use api::{load_history, load_inbox, ApiClient, ApiError, HistorySource};
pub use channel::{
    ChannelEvent, ChannelHandle, ChannelManager, ConnectionState, MessageOrigin, SendOutcome,
};
pub use config::ClientConfig;
pub use session::{Credential, Session};
pub use transport::{Connector, WsConnector};
pub use view::{Composer, ConversationView};

use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

pub fn init_tracing() {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
