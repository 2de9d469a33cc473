use std::sync::Mutex;

use super::{CompletionRequest, LanguageModelClient, LlmError};

/// A call observed by [`ScriptedLlmClient`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub system: String,
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

enum Script {
    Reply(String),
    Fail(String),
}

/// Mock LLM client for testing. Answers by system prompt.
///
/// Each analysis stage uses its own system prompt, so scripting one response
/// per system prompt scripts one response per stage. Unscripted prompts fail.
#[derive(Default)]
pub struct ScriptedLlmClient {
    routes: Vec<(String, Script)>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer calls using `system` with `response`.
    pub fn reply(mut self, system: &str, response: &str) -> Self {
        self.routes.push((system.to_string(), Script::Reply(response.to_string())));
        self
    }

    /// Fail calls using `system` with a connection error.
    pub fn fail(mut self, system: &str, endpoint: &str) -> Self {
        self.routes.push((system.to_string(), Script::Fail(endpoint.to_string())));
        self
    }

    /// Calls made so far, in order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or(0)
    }
}

impl LanguageModelClient for ScriptedLlmClient {
    fn complete(&self, request: &CompletionRequest<'_>) -> Result<String, LlmError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(RecordedCall {
                system: request.system.to_string(),
                prompt: request.prompt.to_string(),
                max_tokens: request.max_tokens,
                temperature: request.temperature,
            });
        }

        match self.routes.iter().find(|(system, _)| system == request.system) {
            Some((_, Script::Reply(text))) => Ok(text.clone()),
            Some((_, Script::Fail(endpoint))) => Err(LlmError::Connection(endpoint.clone())),
            None => Err(LlmError::Client("no scripted response for system prompt".into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request<'a>(system: &'a str) -> CompletionRequest<'a> {
        CompletionRequest {
            model: "m",
            system,
            prompt: "p",
            max_tokens: 10,
            temperature: 0.0,
        }
    }

    #[test]
    fn routes_by_system_prompt() {
        let client = ScriptedLlmClient::new().reply("a", "alpha").reply("b", "beta");
        assert_eq!(client.complete(&request("b")).unwrap(), "beta");
        assert_eq!(client.complete(&request("a")).unwrap(), "alpha");
        assert_eq!(client.call_count(), 2);
        assert_eq!(client.calls()[0].system, "b");
    }

    #[test]
    fn scripted_failure() {
        let client = ScriptedLlmClient::new().fail("a", "http://down");
        assert!(matches!(client.complete(&request("a")), Err(LlmError::Connection(_))));
    }

    #[test]
    fn unscripted_prompt_fails() {
        let client = ScriptedLlmClient::new();
        assert!(matches!(client.complete(&request("x")), Err(LlmError::Client(_))));
        assert_eq!(client.call_count(), 1);
    }
}
