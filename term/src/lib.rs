//! docchat term - Line-oriented terminal surface for docchat
//!
//! A thin client over `docchat-core`: it renders the session updates it is
//! given and forwards what the user types. All protocol and conversation
//! logic lives in the core.
//!
//! - **Display**: Turns transcript snapshots into printable lines
//! - **Input**: Parses a line of user input into a message or a local command
//!
//! ## Event Flow
//!
//! ```text
//! stdin line -> Input -> SessionHandle -> SessionUpdate -> Display -> stdout
//! ```

pub mod display;
pub mod input;

pub use display::{DisplayLine, LineKind, TranscriptView};
pub use input::Input;
