mod error;
mod event;
mod role;
mod session;

pub use error::RelayError;
pub use event::{
    ClientDisconnected, ClientEvent, ResultPayload, ServerEvent, SessionJoined, SessionStatus,
};
pub use role::DeviceRole;
pub use session::{
    ConnectionId, LastResultInfo, RoleCounts, Session, SessionDetail, SessionSummary, StoredResult,
};
