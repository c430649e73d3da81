#![cfg_attr(not(test), no_std)]

pub mod max7219;
pub mod shared;
