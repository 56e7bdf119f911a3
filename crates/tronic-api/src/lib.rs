pub mod activity;
pub mod ai;
pub mod analytics;
pub mod auth;
pub mod chat;
pub mod commands;
pub mod error;
pub mod middleware;
pub mod monitoring;
pub mod relay;
pub mod state;
pub mod tasks;

#[cfg(test)]
pub(crate) mod test_util;
