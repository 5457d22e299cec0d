//! Notification channel.
//!
//! One attempt per message over an HTTP-like transport; no retry and no
//! delivery guarantee beyond that attempt. Delivery failure is reported to
//! the caller, which logs it and moves on.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use url::Url;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// A channel capable of delivering one alert message.
pub trait Notifier {
    /// Deliver one message. Exactly one attempt; the caller never retries.
    fn send(&self, message: &str) -> Result<()>;
}

/// Telegram bot notifier: posts a `sendMessage` form to the bot API.
pub struct TelegramNotifier {
    endpoint: Url,
    chat_id: String,
    agent: ureq::Agent,
}

impl TelegramNotifier {
    /// Build the notifier from the API base URL, bot token and chat id.
    /// URL assembly failures are configuration problems surfaced before the
    /// loop starts.
    pub fn new(api_base: &str, bot_token: &str, chat_id: &str) -> Result<Self> {
        let base = Url::parse(api_base)
            .with_context(|| format!("invalid notifier endpoint '{}'", api_base))?;
        let endpoint = base
            .join(&format!("bot{}/sendMessage", bot_token))
            .context("assemble sendMessage endpoint")?;
        let agent = ureq::AgentBuilder::new()
            .timeout(REQUEST_TIMEOUT)
            .build();
        Ok(Self {
            endpoint,
            chat_id: chat_id.to_string(),
            agent,
        })
    }
}

impl Notifier for TelegramNotifier {
    fn send(&self, message: &str) -> Result<()> {
        let response = self.agent.post(self.endpoint.as_str()).send_form(&[
            ("chat_id", self.chat_id.as_str()),
            ("text", message),
        ]);

        match response {
            Ok(_) => Ok(()),
            Err(ureq::Error::Status(code, response)) => Err(anyhow!(
                "notification rejected: HTTP {} {}",
                code,
                response.status_text()
            )),
            Err(e) => Err(anyhow!("notification transport error: {}", e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_embeds_bot_token_and_method() {
        let notifier =
            TelegramNotifier::new("https://api.telegram.org", "123:abc", "42").expect("notifier");
        assert_eq!(
            notifier.endpoint.as_str(),
            "https://api.telegram.org/bot123:abc/sendMessage"
        );
        assert_eq!(notifier.chat_id, "42");
    }

    #[test]
    fn malformed_endpoint_is_rejected() {
        assert!(TelegramNotifier::new("not a url", "123:abc", "42").is_err());
    }
}
