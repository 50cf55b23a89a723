//! Formgate - in-process admission control for public form endpoints
//!
//! This crate implements a fixed-window rate limiter that counts requests per
//! identifier (usually a client address) and keeps its memory bounded with a
//! least-recently-used bucket map. Limiter instances are built once per
//! policy and shared by reference with the request handlers that need them.

pub mod config;
pub mod error;
pub mod headers;
pub mod ratelimit;
