//! Library side of the `tabmap` command: logging setup, configuration and
//! the CSV sheet source.

pub mod config;
pub mod logging;
pub mod source;
