mod connection;
mod event_handler;
mod registry;
mod relay;
pub mod route;
pub mod websocket_listener;

pub use connection::Connection;
pub use event_handler::EventHandler;
pub use registry::SessionRegistry;
pub use relay::RelayEngine;
pub use route::create_relay_route;
