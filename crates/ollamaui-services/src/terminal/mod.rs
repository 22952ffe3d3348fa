//! Terminal emulation: key handling over a small emulated screen

mod screen;
mod session;

pub use screen::{ScreenBuffer, ScreenLine, Tone};
pub use session::{TerminalSession, PROMPT, WELCOME};
