use std::sync::{Arc, Mutex};

use papercast_core::{FeedSource, PaperItem, PodcastError};

#[derive(Clone)]
pub struct MockFeed {
    pub items: Vec<PaperItem>,
    pub calls: Arc<Mutex<usize>>,
    pub fail_with: Option<String>,
}

impl MockFeed {
    pub fn new(items: Vec<PaperItem>) -> Self {
        Self {
            items,
            calls: Arc::new(Mutex::new(0)),
            fail_with: None,
        }
    }

    pub fn two_papers() -> Self {
        Self::new(vec![
            PaperItem::new(
                "Sparse Attention at Scale",
                "https://arxiv.org/abs/2501.00001",
                "A study of sparse attention in large models.",
            ),
            PaperItem::new(
                "Tiny Recursive Models",
                "https://arxiv.org/abs/2501.00002",
                "Small networks that reason by recursion.",
            ),
        ])
    }

    pub fn failing(msg: &str) -> Self {
        Self {
            items: Vec::new(),
            calls: Arc::new(Mutex::new(0)),
            fail_with: Some(msg.to_string()),
        }
    }
}

impl FeedSource for MockFeed {
    async fn fetch(&self) -> Result<Vec<PaperItem>, PodcastError> {
        *self.calls.lock().unwrap() += 1;
        if let Some(ref msg) = self.fail_with {
            return Err(PodcastError::FetchError {
                url: "mock://feed".to_string(),
                reason: msg.clone(),
            });
        }
        Ok(self.items.clone())
    }
}
