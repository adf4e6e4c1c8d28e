//! Digest rendering.
//!
//! Turns a ranked entity list into the Markdown text delivered to conversations
//! and the broadcast channel. Rendering is pure: the only clock input is the
//! `NaiveTime` passed in for the footer.
use chrono::NaiveTime;

use crate::entity::Entity;

/// Text delivered when no ranking data could be fetched.
pub const UNAVAILABLE_MESSAGE: &str =
    "❌ Unable to fetch cryptocurrency data. Please try again later.";

const HEADER: &str = "🚀 **Top 5 Cryptocurrencies** 🚀\n\n";

/// Renders digests, optionally advertising a promoted channel in the footer.
#[derive(Debug, Clone, Default)]
pub struct DigestFormatter {
    promoted_channel: Option<String>,
}

impl DigestFormatter {
    /// Create a formatter; `promoted_channel` adds the two promotion lines.
    pub fn new(promoted_channel: Option<String>) -> Self {
        Self { promoted_channel }
    }

    /// Render `entities` with an `Updated at` footer taken from `at`.
    pub fn format(&self, entities: &[Entity], at: NaiveTime) -> String {
        if entities.is_empty() {
            return String::from(UNAVAILABLE_MESSAGE);
        }

        let mut message = String::from(HEADER);
        for (index, entity) in entities.iter().enumerate() {
            message.push_str(&format!(
                "{}. **{}** ({})\n",
                index + 1,
                entity.name,
                entity.symbol
            ));
            message.push_str(&format!("   💰 {}\n", format_price(entity.price)));
            message.push_str(&format!("   📊 {}\n\n", format_change(entity.change_24h)));
        }

        message.push_str(&format!("🔄 Updated at {}", at.format("%H:%M:%S")));
        if let Some(channel) = &self.promoted_channel {
            message.push_str(&format!(
                "\n\n💎 Join {} for exclusive airdrops and crypto signals!",
                channel
            ));
            message.push_str("\n🚀 Follow us for daily crypto updates and opportunities!");
        }
        message
    }
}

/// `$1,234.56` for prices of at least one, `$0.123456` below.
pub fn format_price(price: f64) -> String {
    if price >= 1.0 {
        let fixed = format!("{:.2}", price);
        let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));
        format!("${}.{}", group_thousands(int_part), frac_part)
    } else {
        format!("${:.6}", price)
    }
}

/// Signed percent change with a trend indicator.
pub fn format_change(change: f64) -> String {
    if change > 0.0 {
        format!("📈 +{:.2}%", change)
    } else if change < 0.0 {
        format!("📉 {:.2}%", change)
    } else {
        // -0.0 would otherwise render as "-0.00"
        format!("➡️ {:.2}%", 0.0_f64)
    }
}

fn group_thousands(digits: &str) -> String {
    let len = digits.len();
    let mut grouped = String::with_capacity(len + len / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}
