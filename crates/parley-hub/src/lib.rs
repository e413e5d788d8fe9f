pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod hub;
pub mod registry;
pub mod resolver;

pub use connection::{ChannelOutbound, Connection, Frame, Outbound};
pub use dispatcher::Dispatcher;
pub use error::{DeliveryError, ResolveError};
pub use hub::Hub;
pub use registry::ConnectionRegistry;
pub use resolver::{IdentityResolver, PassThroughResolver, StaticResolver};
