//! stylusd: userspace graphics tablet driver core.
//!
//! Detection ([`driver`], [`matcher`]), raw report decoding ([`codec`]), the
//! per-device read loop ([`reader`]) and pointer output ([`output`]).

pub mod binding;
pub mod codec;
pub mod config;
pub mod daemon;
pub mod descriptor;
pub mod driver;
pub mod filter;
pub mod geometry;
pub mod hid;
pub mod hotplug;
pub mod logger;
pub mod matcher;
pub mod output;
pub mod pointer;
pub mod reader;
pub mod report;
pub mod tablet;
