//! Shared test doubles.

#![allow(dead_code)]

use async_trait::async_trait;
use sim_ocr::{DocumentImage, Language, OcrEngine, RecognitionResult, SimOcrError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// The transcription used by the end-to-end detection tests.
pub const SIM_TRANSCRIPTION: &str =
    "REPUBLIK INDONESIA SURAT IZIN MENGEMUDI No: 1234567890123456";

enum Script {
    Text(String),
    Fail(String),
}

/// An `OcrEngine` that returns a fixed outcome and counts its calls.
pub struct ScriptedEngine {
    script: Script,
    calls: AtomicUsize,
    last_image: Mutex<Option<Vec<u8>>>,
}

impl ScriptedEngine {
    /// Always transcribes to `text`.
    pub fn text(text: &str) -> Arc<Self> {
        Arc::new(Self::new(Script::Text(text.to_string())))
    }

    /// Always fails with `RecognitionFailed { detail }`.
    pub fn failing(detail: &str) -> Arc<Self> {
        Arc::new(Self::new(Script::Fail(detail.to_string())))
    }

    fn new(script: Script) -> Self {
        Self {
            script,
            calls: AtomicUsize::new(0),
            last_image: Mutex::new(None),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Bytes of the most recent image handed to the engine.
    pub fn last_image(&self) -> Option<Vec<u8>> {
        self.last_image.lock().unwrap().clone()
    }
}

#[async_trait]
impl OcrEngine for ScriptedEngine {
    async fn recognize(
        &self,
        image: &DocumentImage,
        _language: &Language,
    ) -> Result<RecognitionResult, SimOcrError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_image.lock().unwrap() = Some(image.bytes().to_vec());
        match &self.script {
            Script::Text(t) => Ok(RecognitionResult { text: t.clone() }),
            Script::Fail(d) => Err(SimOcrError::RecognitionFailed { detail: d.clone() }),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
