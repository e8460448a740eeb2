//! Upbit module - REST client and port implementations for the Upbit exchange

pub mod auth;
pub mod client;
pub mod messages;
pub mod rest;

pub use client::UpbitClient;
pub use rest::UpbitRestClient;
