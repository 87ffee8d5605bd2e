//! Keystroke injection into a running terminal program.
//!
//! Provides:
//! - `TmuxInjector` - Drive a tmux session with `send-keys`
//! - `TtyTypist` - Type directly into a process's terminal device
//! - `ProcTtyLocator` - Find that terminal through the process table

pub mod resolve;
pub mod tmux;
pub mod tty;

pub use resolve::resolve_executable_path;
pub use tmux::TmuxInjector;
pub use tty::{ProcTtyLocator, TtyTypist};
