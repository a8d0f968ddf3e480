// Author: Dustin Pilgrim
// License: MIT

pub mod bar;
pub mod cli;
pub mod config;
pub mod logging;
pub mod logrotate;
pub mod path;
pub mod wayland;
