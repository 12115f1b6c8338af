#![no_std]

extern crate alloc;

pub mod display;
pub mod epd;
pub mod net;
pub mod power;
pub mod sleep;
