//! Scripted language model for tests.
//!
//! Rules are matched in insertion order against the concatenated system and
//! user text; the first rule whose needle occurs wins. A rule can carry a
//! queue of replies, consumed one per call, the last one repeating.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use super::{parse_json_reply, LanguageModel, Prompt};
use crate::error::LlmError;

enum Reply {
    Text(String),
    Fail,
}

struct Rule {
    needle: String,
    replies: Mutex<Vec<Reply>>,
    hits: AtomicUsize,
}

#[derive(Default)]
pub struct ScriptedLlm {
    rules: Vec<Rule>,
    prompts: Mutex<Vec<Prompt>>,
}

impl ScriptedLlm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, needle: &str, text: &str) -> Self {
        self.replies(needle, &[text])
    }

    /// Successive calls matching `needle` get successive replies.
    pub fn replies(mut self, needle: &str, texts: &[&str]) -> Self {
        let replies = texts.iter().map(|t| Reply::Text(t.to_string())).collect();
        self.rules.push(Rule {
            needle: needle.to_string(),
            replies: Mutex::new(replies),
            hits: AtomicUsize::new(0),
        });
        self
    }

    pub fn fail(mut self, needle: &str) -> Self {
        self.rules.push(Rule {
            needle: needle.to_string(),
            replies: Mutex::new(vec![Reply::Fail]),
            hits: AtomicUsize::new(0),
        });
        self
    }

    /// Calls routed to the rule registered with `needle`.
    pub fn hits(&self, needle: &str) -> usize {
        self.rules
            .iter()
            .filter(|r| r.needle == needle)
            .map(|r| r.hits.load(Ordering::SeqCst))
            .sum()
    }

    pub fn prompts(&self) -> Vec<Prompt> {
        self.prompts.lock().unwrap().clone()
    }

    fn answer(&self, prompt: &Prompt) -> Result<String, LlmError> {
        self.prompts.lock().unwrap().push(prompt.clone());
        let haystack = format!("{}\n{}", prompt.system, prompt.user);
        let rule = self
            .rules
            .iter()
            .find(|r| haystack.contains(&r.needle))
            .ok_or_else(|| LlmError::InvalidRequest(format!("no scripted reply for: {}", prompt.user)))?;
        rule.hits.fetch_add(1, Ordering::SeqCst);

        let mut replies = rule.replies.lock().unwrap();
        let reply = if replies.len() > 1 {
            replies.remove(0)
        } else {
            match replies.first() {
                Some(Reply::Text(t)) => Reply::Text(t.clone()),
                _ => Reply::Fail,
            }
        };
        match reply {
            Reply::Text(t) => Ok(t),
            Reply::Fail => Err(LlmError::ServerError {
                status: 500,
                message: format!("scripted failure for {}", rule.needle),
            }),
        }
    }
}

#[async_trait]
impl LanguageModel for ScriptedLlm {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, prompt: &Prompt) -> Result<String, LlmError> {
        self.answer(prompt)
    }

    async fn generate_json(&self, prompt: &Prompt, _schema: &Value) -> Result<Value, LlmError> {
        parse_json_reply(&self.answer(prompt)?)
    }
}
