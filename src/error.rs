//! Error kinds shared by the sources, the stack and the link.

use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Requested controller index or name is not connected.
    #[error("controller not found: {0}")]
    DeviceNotFound(String),

    #[error("controller disconnected: {0}")]
    DeviceDisconnected(String),

    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// A macro capture session is already open.
    #[error("macro capture already active ({})", .0.display())]
    CaptureActive(PathBuf),

    /// The receiver side of the link hung up (read returned 0 bytes).
    #[error("serial link closed by receiver")]
    LinkClosed,

    #[error("config: {0}")]
    Config(String),

    #[error("gamepad backend: {0}")]
    Gamepad(String),

    #[error(transparent)]
    Serial(#[from] serialport::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
