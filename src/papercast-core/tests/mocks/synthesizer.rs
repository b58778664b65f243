use std::path::Path;
use std::sync::{Arc, Mutex};

use papercast_core::{PodcastError, SpeechSynthesizer};

/// Writes a two-sample 16-bit WAV per line. The sample value is the line
/// number found in the text, so merged order can be checked.
#[derive(Clone, Default)]
pub struct MockSynthesizer {
    pub calls: Arc<Mutex<Vec<(String, String)>>>,
    pub fail_on_line: Option<i16>,
}

impl MockSynthesizer {
    pub fn failing_on(line: i16) -> Self {
        Self {
            fail_on_line: Some(line),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

pub fn line_number(text: &str) -> i16 {
    text.chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect::<String>()
        .parse()
        .unwrap_or(0)
}

impl SpeechSynthesizer for MockSynthesizer {
    async fn synthesize_to_file(
        &self,
        text: &str,
        voice: &str,
        path: &Path,
    ) -> Result<(), PodcastError> {
        self.calls
            .lock()
            .unwrap()
            .push((text.to_string(), voice.to_string()));

        let number = line_number(text);
        if self.fail_on_line == Some(number) {
            return Err(PodcastError::TtsError("mock voice unavailable".to_string()));
        }

        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer =
            hound::WavWriter::create(path, spec).map_err(|e| PodcastError::TtsError(e.to_string()))?;
        for _ in 0..2 {
            writer
                .write_sample(number)
                .map_err(|e| PodcastError::TtsError(e.to_string()))?;
        }
        writer
            .finalize()
            .map_err(|e| PodcastError::TtsError(e.to_string()))
    }
}
