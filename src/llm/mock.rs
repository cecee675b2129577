use std::collections::VecDeque;
use std::sync::Mutex;

use super::{CompletionClient, GenerationParams, ModelError};

type Responder = dyn Fn(&str, &str, &GenerationParams) -> Result<String, ModelError> + Send + Sync;

/// One call observed by [`MockCompletionClient`].
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub model: String,
    pub prompt: String,
    pub params: GenerationParams,
}

/// Mock completion client for testing (scripted or computed responses).
pub struct MockCompletionClient {
    responder: Box<Responder>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockCompletionClient {
    /// Always answer with the same text.
    pub fn new(response: &str) -> Self {
        let response = response.to_string();
        Self::with_responder(move |_, _, _| Ok(response.clone()))
    }

    /// Answer calls in order; once the script runs out every call fails.
    pub fn scripted(script: Vec<Result<String, ModelError>>) -> Self {
        let script = Mutex::new(VecDeque::from(script));
        Self::with_responder(move |_, _, _| {
            script
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .pop_front()
                .unwrap_or(Err(ModelError::EmptyResponse))
        })
    }

    /// Compute each answer from the model name, prompt, and parameters.
    pub fn with_responder<F>(responder: F) -> Self
    where
        F: Fn(&str, &str, &GenerationParams) -> Result<String, ModelError> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl CompletionClient for MockCompletionClient {
    fn complete(
        &self,
        model: &str,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<String, ModelError> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(RecordedCall {
                model: model.to_string(),
                prompt: prompt.to_string(),
                params: params.clone(),
            });
        (self.responder)(model, prompt, params)
    }
}
