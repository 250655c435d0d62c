pub mod cache;
pub mod explorer;
pub mod export;
pub mod http;
pub mod logging;
pub mod node;
pub mod reconcile;
