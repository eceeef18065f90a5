//! One module per subcommand, each exposing `execute`.

pub mod add;
pub mod clear;
pub mod compact;
pub mod completions;
pub mod init;
pub mod list;
pub mod search;
pub mod stats;
pub mod status;
