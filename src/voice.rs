use parking_lot::Mutex;

/// Reads assistant replies aloud.
pub trait Narrator: Send + Sync {
    fn speak(&self, text: &str, language: &str);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SilentNarrator;

impl Narrator for SilentNarrator {
    fn speak(&self, _text: &str, _language: &str) {}
}

/// Keeps every utterance; handy for tests and the terminal harness.
#[derive(Debug, Default)]
pub struct RecordingNarrator {
    spoken: Mutex<Vec<(String, String)>>,
}

impl RecordingNarrator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spoken(&self) -> Vec<(String, String)> {
        self.spoken.lock().clone()
    }
}

impl Narrator for RecordingNarrator {
    fn speak(&self, text: &str, language: &str) {
        self.spoken.lock().push((text.to_string(), language.to_string()));
    }
}

/// Strips the lightweight markdown the widget renders so it is not read out.
pub fn speakable(text: &str) -> String {
    text.replace("**", "").split_whitespace().collect::<Vec<_>>().join(" ")
}
