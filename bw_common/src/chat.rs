//! Minimal chat-component JSON, grounded on `bb_common::util::chat::Chat`
//! but trimmed to the single flat `{"text":..., "color":...}` object this
//! protocol's disconnect/status payloads need (§6), rather than the full
//! section-list book/scoreboard format.

use serde::Serialize;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Chat {
  pub text: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub color: Option<String>,
  #[serde(skip_serializing_if = "std::ops::Not::not")]
  pub bold: bool,
}

impl Chat {
  pub fn new(text: impl Into<String>) -> Self { Chat { text: text.into(), color: None, bold: false } }

  pub fn color(mut self, color: impl Into<String>) -> Self {
    self.color = Some(color.into());
    self
  }

  pub fn bold(mut self) -> Self {
    self.bold = true;
    self
  }

  /// Finishes the builder, producing the wire JSON.
  pub fn to_json(&self) -> String { serde_json::to_string(self).unwrap() }
}

impl From<&str> for Chat {
  fn from(s: &str) -> Self { Chat::new(s) }
}

impl From<String> for Chat {
  fn from(s: String) -> Self { Chat::new(s) }
}

#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;

  #[test]
  fn plain_text_has_no_extra_fields() {
    assert_eq!(Chat::new("hi").to_json(), r#"{"text":"hi"}"#);
  }

  #[test]
  fn disconnect_reason_carries_color() {
    assert_eq!(Chat::new("kicked").color("red").to_json(), r#"{"text":"kicked","color":"red"}"#);
  }
}
