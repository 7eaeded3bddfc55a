//! Relevance classification of archived messages for a returning user.
//!
//! Everything not written by the user (or by an ignored author) is relevant.
//! A message additionally mentions the user when their nickname appears as a
//! whole word: `nick1` is mentioned by `"nick1: ping"` but not by
//! `"nick10 said hi"`.

use regex::{Regex, RegexBuilder};

use crate::{
  Result,
  message::{Message, RelevantMessage},
  presence::User,
};

/// Characters that may appear inside a nickname. Anything else is a word
/// boundary.
const NICK_CHARS: &str = r"A-Za-z0-9_`|\-\[\]\\^{}";

pub struct MentionFilter {
  user:    User,
  ignored: Vec<User>,
  pattern: Regex,
}

impl MentionFilter {
  /// Build a filter for `user`.
  pub fn new(user: &User) -> Result<Self> {
    let pattern = format!(
      "(?:^|[^{NICK_CHARS}]){}(?:$|[^{NICK_CHARS}])",
      regex::escape(user.as_str()),
    );
    let pattern = RegexBuilder::new(&pattern).case_insensitive(true).build()?;
    Ok(Self { user: user.clone(), ignored: Vec::new(), pattern })
  }

  /// Treat messages from these authors as noise.
  pub fn with_ignored(mut self, ignored: impl IntoIterator<Item = User>) -> Self {
    self.ignored.extend(ignored);
    self
  }

  pub fn user(&self) -> &User { &self.user }

  /// Whether `text` names the user as a whole word.
  pub fn mentions(&self, text: &str) -> bool { self.pattern.is_match(text) }

  /// Whether `message` counts towards the user's summary at all.
  pub fn is_relevant(&self, message: &Message) -> bool {
    message.author != self.user && !self.ignored.contains(&message.author)
  }

  /// Lazily reduce `messages` to the ones relevant to the user, flagging
  /// mentions. Input order is preserved.
  pub fn filter<I>(&self, messages: I) -> impl Iterator<Item = RelevantMessage>
  where
    I: IntoIterator<Item = Message>,
  {
    messages
      .into_iter()
      .filter(|m| self.is_relevant(m))
      .map(|message| RelevantMessage {
        mentions_user: self.mentions(&message.text),
        message,
      })
  }
}
