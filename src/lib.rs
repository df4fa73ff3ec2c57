//! Client-side reconciliation core for the emergency dispatch map.
//!
//! Three streams are polled independently and kept consistent here: the
//! vehicle snapshot ([`poller`]), per-vehicle routes ([`routes`]) and the
//! operator's markers ([`markers`]). [`session::Session`] owns the timers,
//! [`dispatch`] turns a pending marker into a tracked vehicle, and
//! [`server`] exposes the reconciled view to the map renderer.

pub mod api_types;
pub mod backend;
pub mod catalog;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod filters;
pub mod gc;
pub mod history;
pub mod markers;
pub mod poller;
pub mod routes;
pub mod server;
pub mod session;
pub mod state;
