use std::sync::{Arc, Mutex};

use papercast_core::{CompletionBackend, PodcastError};

/// Replies with the same text to every prompt and records the prompts.
#[derive(Clone)]
pub struct MockCompletion {
    pub reply: String,
    pub prompts: Arc<Mutex<Vec<String>>>,
}

impl MockCompletion {
    pub fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// A six-line alternating dialogue wrapped in chatty prose.
    pub fn six_lines() -> Self {
        Self::new(
            r#"Absolutely! Here is today's episode:

{
  "conversation": [
    {"speaker": "Brian", "text": "Line 1: welcome to Daily Papers."},
    {"speaker": "Jenny", "text": "Line 2: we have two papers today."},
    {"speaker": "Brian", "text": "Line 3: first up, *sparse* attention."},
    {"speaker": "Jenny", "text": "Line 4: uhm, it scales really well."},
    {"speaker": "Brian", "text": "Line 5: then tiny recursive models."},
    {"speaker": "Jenny", "text": "Line 6: that's all for today!"}
  ]
}

Let me know if you want any changes."#,
        )
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

impl CompletionBackend for MockCompletion {
    async fn complete(&self, prompt: &str) -> Result<String, PodcastError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok(self.reply.clone())
    }
}
