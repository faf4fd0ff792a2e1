//! Pipeline stages for SIM detection.
//!
//! Each submodule implements exactly one step. Only [`ocr`] performs I/O;
//! the other stages are pure functions of their input.
//!
//! ## Data Flow
//!
//! ```text
//! intake ──▶ ocr ──▶ normalize ──▶ classify
//! (bytes)   (text)   (canonical)   (verdict)
//! ```
//!
//! 1. [`intake`]: decode base64, take the first uploaded file, or read a path.
//!    Empty input stops here.
//! 2. [`ocr`]: run the engine once, inside a scoped worker.
//! 3. [`normalize`]: lower-case and trim the transcription.
//! 4. [`classify`]: gather evidence and apply the configured policy.

pub mod classify;
pub mod intake;
pub mod normalize;
pub mod ocr;
