//! Development server: in-memory compile output, hot reload events, proxying,
//! history API fallback and static files.

pub mod browser;
pub mod fallback;
pub mod hot;
pub mod proxy;
pub mod server;

pub use hot::{HotEvent, HotHub, HOT_PATH};
pub use proxy::{ContextFilter, ProxyEntry, ProxyOptions, ProxyRule, ProxyTable};
pub use server::{DevServer, DevServerOptions, ServerState};
