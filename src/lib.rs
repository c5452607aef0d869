pub mod config;
pub mod model;

#[cfg(feature = "server")]
pub mod server;

pub mod prelude {
    pub use crate::model::ClientEvent;
    pub use crate::model::ConnectionId;
    pub use crate::model::DeviceRole;
    pub use crate::model::RelayError;
    pub use crate::model::ServerEvent;
    pub use crate::model::Session;
    #[cfg(feature = "server")]
    pub use crate::server::{EventHandler, RelayEngine, SessionRegistry};
}
