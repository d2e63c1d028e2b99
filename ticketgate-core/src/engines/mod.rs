// ticketgate-core/src/engines/mod.rs
//! This module contains the scan engine implementations.
//!
//! Each engine is a separate file within this directory and implements the
//! `ScanEngine` trait.

pub mod regex_engine;
