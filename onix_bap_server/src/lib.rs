//! # ONIX BAP Gateway server
//! This crate hosts the HTTP surface of the gateway. It is responsible for:
//! Accepting synchronous protocol actions (`select`, `init`, `confirm`, `status`) from callers.
//! Receiving the asynchronous `on_*` callbacks the ONIX BAP posts back out-of-band.
//! Wiring the two together through the bridge engine so one caller request yields one response.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more
//! information.
//!
//! ## Routes
//! * `POST /select | /init | /confirm | /status`: the synchronous action endpoints.
//! * `POST /on_select | /on_init | /on_confirm | /on_status` (+ lifecycle events): the callback
//!   endpoints; always acknowledged with a fixed ACK body.
//! * `GET /health`: pending-transaction count and upstream target.

pub mod auth;
pub mod callback_routes;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod helpers;
pub mod integrations;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
