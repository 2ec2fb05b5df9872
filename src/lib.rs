#![no_std]
#![warn(clippy::all)]

#[cfg(test)]
extern crate std;

pub mod byte_slice_cursor;
pub mod config;
pub mod constants;
pub mod frequency;
pub mod gate;
pub mod orchestrator;
pub mod publisher;
pub mod pulse_counter;
pub mod re_exports;

#[cfg(feature = "rp2040")]
pub mod alarm_timebase;
#[cfg(feature = "rp2040")]
pub mod clock_utils;
#[cfg(feature = "rp2040")]
pub mod pwm_counter;
#[cfg(feature = "rp2040")]
pub mod rp2040_flash;
