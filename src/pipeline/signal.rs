//! Best-effort structured reading of an accepted payload.
//!
//! The classifier forwards model output verbatim. This module reads the
//! `Pair:` / `Action:` / `Entry:` / `SL:` / `TPs:` / `Risk:` lines back out
//! for log fields and the webhook body. It never gates delivery.

use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

static FIELD_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^[ \t\-*•]*(pair|action|entry|sl|stop loss|tps?|take profits?|risk)[ \t]*:[ \t]*(.*?)[ \t]*$")
        .expect("field line regex")
});

static NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+(?:\.\d+)?").expect("number regex"));

static TP_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\btp\d*\s*[:=]?").expect("tp label regex"));

/// Trade direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Buy,
    Sell,
}

impl Direction {
    fn parse(value: &str) -> Option<Self> {
        let upper = value.to_ascii_uppercase();
        if upper.contains("BUY") || upper.contains("LONG") {
            Some(Self::Buy)
        } else if upper.contains("SELL") || upper.contains("SHORT") {
            Some(Self::Sell)
        } else {
            None
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buy => f.write_str("BUY"),
            Self::Sell => f.write_str("SELL"),
        }
    }
}

/// Fields recovered from a formatted signal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalSummary {
    pub pair: Option<String>,
    pub direction: Option<Direction>,
    pub entry: Option<Decimal>,
    pub stop_loss: Option<Decimal>,
    pub take_profits: Vec<Decimal>,
    pub risk: Option<String>,
}

impl SignalSummary {
    /// Read whatever fields are present. Unknown lines are ignored.
    pub fn parse(payload: &str) -> Self {
        let mut summary = Self::default();

        for caps in FIELD_LINE.captures_iter(payload) {
            let key = caps[1].to_ascii_lowercase();
            let value = caps[2].trim();
            if value.is_empty() {
                continue;
            }
            match key.as_str() {
                "pair" => summary.pair = Some(value.to_string()),
                "action" => summary.direction = Direction::parse(value),
                "entry" => summary.entry = first_number(value),
                "sl" | "stop loss" => summary.stop_loss = first_number(value),
                "tp" | "tps" | "take profit" | "take profits" => {
                    let stripped = TP_LABEL.replace_all(value, " ");
                    summary
                        .take_profits
                        .extend(NUMBER.find_iter(&stripped).filter_map(|m| to_decimal(m.as_str())));
                }
                "risk" if !is_placeholder_value(value) => summary.risk = Some(value.to_string()),
                _ => {}
            }
        }

        summary
    }

    /// All five required fields were recovered.
    pub fn is_complete(&self) -> bool {
        self.pair.is_some()
            && self.direction.is_some()
            && self.entry.is_some()
            && self.stop_loss.is_some()
            && !self.take_profits.is_empty()
    }

    /// Names of required fields that could not be read.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.pair.is_none() {
            missing.push("pair");
        }
        if self.direction.is_none() {
            missing.push("action");
        }
        if self.entry.is_none() {
            missing.push("entry");
        }
        if self.stop_loss.is_none() {
            missing.push("sl");
        }
        if self.take_profits.is_empty() {
            missing.push("tps");
        }
        missing
    }
}

fn first_number(value: &str) -> Option<Decimal> {
    NUMBER.find(value).and_then(|m| to_decimal(m.as_str()))
}

fn to_decimal(raw: &str) -> Option<Decimal> {
    Decimal::from_str(raw).ok()
}

fn is_placeholder_value(value: &str) -> bool {
    let lower = value.to_ascii_lowercase();
    lower.starts_with("not ") || lower == "n/a" || lower == "none" || lower == "-"
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    const GOLD: &str = "🚨 SIGNAL DETECTED 🚨\n\n\
                        Pair: XAU/USD\n\
                        Action: BUY\n\
                        Entry: 2330\n\
                        SL: 2325\n\
                        TPs: TP1 2340, TP2 2350\n\
                        Risk: Not mentioned";

    #[test]
    fn parses_full_signal() {
        let s = SignalSummary::parse(GOLD);
        assert_eq!(s.pair.as_deref(), Some("XAU/USD"));
        assert_eq!(s.direction, Some(Direction::Buy));
        assert_eq!(s.entry, Some(dec!(2330)));
        assert_eq!(s.stop_loss, Some(dec!(2325)));
        assert_eq!(s.take_profits, vec![dec!(2340), dec!(2350)]);
        assert_eq!(s.risk, None);
        assert!(s.is_complete());
    }

    #[test]
    fn parses_colon_tp_labels_and_decimals() {
        let s = SignalSummary::parse(
            "Pair: EUR/USD\nAction: SELL\nEntry: 1.0850\nSL: 1.0880\nTPs: TP1: 1.0820, TP2: 1.0790, TP3: 1.0750\nRisk: 1%",
        );
        assert_eq!(s.direction, Some(Direction::Sell));
        assert_eq!(s.entry, Some(dec!(1.0850)));
        assert_eq!(s.take_profits, vec![dec!(1.0820), dec!(1.0790), dec!(1.0750)]);
        assert_eq!(s.risk.as_deref(), Some("1%"));
    }

    #[test]
    fn entry_range_takes_first_bound() {
        let s = SignalSummary::parse("Entry: 2330-2332");
        assert_eq!(s.entry, Some(dec!(2330)));
    }

    #[test]
    fn incomplete_payload_reports_missing_fields() {
        let s = SignalSummary::parse("Pair: BTC/USD\nAction: LONG");
        assert_eq!(s.direction, Some(Direction::Buy));
        assert!(!s.is_complete());
        assert_eq!(s.missing_fields(), vec!["entry", "sl", "tps"]);
    }

    #[test]
    fn free_text_yields_empty_summary() {
        let s = SignalSummary::parse("Great signals! Join the VIP room.");
        assert_eq!(s, SignalSummary::default());
    }

    #[test]
    fn direction_display_matches_prompt_format() {
        assert_eq!(Direction::Buy.to_string(), "BUY");
        assert_eq!(Direction::Sell.to_string(), "SELL");
    }

    #[test]
    fn summary_serializes_prices_as_strings() {
        let json = serde_json::to_value(SignalSummary::parse(GOLD)).unwrap();
        assert_eq!(json["entry"], "2330");
        assert_eq!(json["direction"], "BUY");
        assert_eq!(json["take_profits"][1], "2350");
    }
}
