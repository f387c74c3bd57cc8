pub mod config;
pub mod error;
pub mod health;
pub mod http;
pub mod models;
pub mod notify;
pub mod poller;
pub mod scrapers;
pub mod seen;

#[cfg(test)]
mod testing;
