use crate::utils::models::{ChatRequest, ChatResponse, ChatRole, ChatTurn};

/// Turns sent back with each request, oldest dropped first.
pub const HISTORY_WINDOW: usize = 10;

#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
  pub role: ChatRole,
  pub text: String,
  /// Code carried by an assistant reply, ready for injection.
  pub code: Option<String>
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatTranscript {
  messages: Vec<ChatMessage>
}

impl ChatTranscript {
  pub fn messages(&self) -> &[ChatMessage] {
    &self.messages
  }

  pub fn is_empty(&self) -> bool {
    self.messages.is_empty()
  }

  pub fn clear(&mut self) {
    self.messages.clear();
  }

  /// Records the user's message and builds the request for it. History
  /// excludes the message itself, which travels as `message`.
  pub fn ask(&mut self, text: &str, strategy_id: Option<String>, current_code: Option<String>) -> ChatRequest {
    let history = self.history_for_request();
    self.messages.push(ChatMessage { role: ChatRole::User, text: text.to_string(), code: None });
    ChatRequest { message: text.to_string(), strategy_id, current_code, history }
  }

  /// Records the reply and returns the code to inject, if any. An explicit
  /// `code` field wins over a fenced block in the text.
  pub fn receive(&mut self, response: ChatResponse) -> Option<String> {
    let code = response.code
      .filter(|c| !c.trim().is_empty())
      .or_else(|| extract_code(&response.message));
    self.messages.push(ChatMessage { role: ChatRole::Assistant, text: response.message, code: code.clone() });
    code
  }

  pub fn history_for_request(&self) -> Vec<ChatTurn> {
    let skip = self.messages.len().saturating_sub(HISTORY_WINDOW);
    self.messages.iter()
      .skip(skip)
      .map(|m| ChatTurn { role: m.role, content: m.text.clone() })
      .collect()
  }
}

/// Body of the first fenced block (```python or bare ```), if any.
pub fn extract_code(text: &str) -> Option<String> {
  let start = text.find("```")?;
  let after_fence = &text[start + 3..];
  // skip the info string
  let body_start = after_fence.find('\n')? + 1;
  let body = &after_fence[body_start..];
  let end = body.find("```")?;
  let code = body[..end].trim_end_matches(['\n', '\r']);
  (!code.trim().is_empty()).then(|| code.to_string())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn fenced_block_is_extracted() {
    let reply = "Here you go:\n```python\ndef on_tick(ctx):\n    ctx.buy()\n```\nGood luck.";
    assert_eq!(extract_code(reply).as_deref(), Some("def on_tick(ctx):\n    ctx.buy()"));
    assert_eq!(extract_code("no code here"), None);
    assert_eq!(extract_code("```\n\n```"), None);
  }

  #[test]
  fn explicit_code_field_wins() {
    let mut chat = ChatTranscript::default();
    let code = chat.receive(ChatResponse { message: "```\nfenced\n```".to_string(), code: Some("explicit".to_string()) });
    assert_eq!(code.as_deref(), Some("explicit"));
  }

  #[test]
  fn history_excludes_current_message_and_is_windowed() {
    let mut chat = ChatTranscript::default();
    for i in 0..8 {
      chat.ask(&format!("q{}", i), None, None);
      chat.receive(ChatResponse { message: format!("a{}", i), code: None });
    }
    let req = chat.ask("latest", Some("s1".to_string()), None);
    assert_eq!(req.history.len(), HISTORY_WINDOW);
    assert!(req.history.iter().all(|t| t.content != "latest"));
    assert_eq!(req.history.last().map(|t| t.content.as_str()), Some("a7"));
  }
}
