//! Projector Tuning Library
//!
//! Calibration core for multi-projector dome and surface projection: the
//! per-projector projection model, warp grid and blend mask, the session that
//! holds them, pointer interaction and the binary tuning stream.

pub mod config;
pub mod display;
pub mod error;
pub mod interaction;
pub mod proj;
pub mod session;
pub mod stream;

// Re-export commonly used types
pub use config::CalibratorConfig;
pub use display::{ScreenInfo, ScreenRect, ScreenSetup, StaticScreenSetup};
pub use error::{StreamError, TuningError};
pub use interaction::{PointerButton, PointerEvent, TuningController, ViewRect};
pub use proj::{BlendMask, Brush, Color, Projector, ProjectorSetup, Tuning, WarpGrid};
pub use session::{Mode, Session, SessionEvent};
pub use stream::StreamFormat;
