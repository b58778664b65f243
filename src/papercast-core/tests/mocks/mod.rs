#![allow(dead_code)]

pub mod completion;
pub mod feed;
pub mod synthesizer;
