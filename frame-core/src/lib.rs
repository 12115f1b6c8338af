//! Hardware-independent logic for the Spectra 6 picture frame
//!
//! One wake cycle of the frame is a straight pipeline: classify the wake
//! cause, join WiFi, optionally poke the content server, download the packed
//! image, remap its palette and hand it to the panel. The firmware crate
//! supplies the radio, panel and sleep hardware through the traits in
//! [`cycle`].

#![no_std]

extern crate alloc;

pub mod config;
pub mod cycle;
pub mod download;
pub mod framebuffer;
pub mod http;
pub mod palette;
pub mod state;
pub mod wake;
