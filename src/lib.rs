pub mod builder;
pub mod cli;
pub mod config;
pub mod datagen;
pub mod display;
pub mod equity;
pub mod error;
pub mod gadget;
pub mod layer;
pub mod lookahead;
pub mod player;
pub mod ranges;
pub mod resolving;
pub mod tree;
pub mod value;
