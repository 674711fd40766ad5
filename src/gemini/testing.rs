use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use super::{GeminiError, GenerateParams, TextGenerator};

/// Queued replies; an empty queue answers with `RateLimited`.
#[derive(Clone, Default)]
pub(crate) struct MockGenerator {
    replies: Arc<Mutex<VecDeque<Result<String, GeminiError>>>>,
    prompts: Arc<Mutex<Vec<String>>>,
    params: Arc<Mutex<Vec<GenerateParams>>>,
}

impl MockGenerator {
    pub(crate) fn with_replies(
        replies: impl IntoIterator<Item = Result<String, GeminiError>>,
    ) -> Self {
        let mock = Self::default();
        mock.replies.lock().unwrap().extend(replies);
        mock
    }

    pub(crate) fn replying(texts: &[&str]) -> Self {
        Self::with_replies(texts.iter().map(|t| Ok(t.to_string())))
    }

    pub(crate) fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub(crate) fn params(&self) -> Vec<GenerateParams> {
        self.params.lock().unwrap().clone()
    }
}

impl TextGenerator for MockGenerator {
    async fn generate(
        &self,
        prompt: &str,
        params: &GenerateParams,
    ) -> Result<String, GeminiError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.params.lock().unwrap().push(params.clone());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(GeminiError::RateLimited))
    }
}
