//! watch-gate-service: a chat bot that hands out content links only to users
//! who have verified a subscription to the sponsored channel.

pub mod config;
pub mod dispatcher;
pub mod handlers;
pub mod models;
pub mod services;
pub mod startup;
pub mod transport;
