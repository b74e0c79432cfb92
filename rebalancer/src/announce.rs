//! Public announcement text for a completed rebalance.
//!
//! Only the text is built here; posting it is left to whoever consumes the
//! cycle outcome.

use whackrock::format_bps;

use crate::signal::SignalDocument;

/// Maximum announcement length, in characters.
pub const MAX_CHARS: usize = 280;

const ELLIPSIS: &str = "...";

/// Build the rebalance announcement.
///
/// With a signal, the post quotes its title, tone, risk mode and summary;
/// without one it reports the deviation that triggered the rebalance. Text
/// longer than [`MAX_CHARS`] is cut to fit and ends in `...`.
pub fn compose_announcement(
    symbols: &[String],
    old_bps: &[u32],
    new_bps: &[u32],
    signal: Option<&SignalDocument>,
    max_deviation_bps: u32,
    hashtags: &[String],
) -> String {
    let mut text = String::from("WhackRock Fund Rebalanced!\n\n");

    match signal {
        Some(doc) => {
            text.push_str(&format!(
                "Based on: \"{}\"\n\nMarket view: {} | Risk: {}\n\n",
                doc.title, doc.macro_tone, doc.risk_on_off
            ));
        }
        None => {
            text.push_str(&format!(
                "Portfolio adjusted (deviation: {})\n\n",
                format_bps(max_deviation_bps)
            ));
        }
    }

    text.push_str("Old -> New weights:\n");
    for (i, symbol) in symbols.iter().enumerate() {
        let old = old_bps.get(i).copied().map_or_else(|| "-".into(), format_bps);
        let new = new_bps.get(i).copied().map_or_else(|| "-".into(), format_bps);
        text.push_str(&format!("- ${symbol}: {old} -> {new}\n"));
    }

    if let Some(summary) = signal.and_then(|d| d.analysis_summary.as_deref()) {
        text.push_str(&format!("\n{summary}\n"));
    }

    if !hashtags.is_empty() {
        text.push('\n');
        text.push_str(&hashtags.join(" "));
    }

    truncate(text)
}

fn truncate(text: String) -> String {
    if text.chars().count() <= MAX_CHARS {
        return text;
    }
    let mut cut: String = text.chars().take(MAX_CHARS - ELLIPSIS.len()).collect();
    cut.push_str(ELLIPSIS);
    cut
}

#[cfg(test)]
mod tests {
    use super::*;

    fn symbols() -> Vec<String> {
        vec!["VIRTUAL".into(), "cbBTC".into(), "USDC".into()]
    }

    fn tags() -> Vec<String> {
        vec!["#DeFi".into(), "#WhackRock".into()]
    }

    fn signal(summary: &str) -> SignalDocument {
        let json = format!(
            r#"{{"signalId":"v1","title":"Altcoin season?","publishedAt":"2026-05-01T00:00:00Z",
               "macroTone":"bearish","riskOnOff":"off","weightSignal":[0.1,0.3,0.6],
               "analysisSummary":"{summary}"}}"#
        );
        SignalDocument::from_json(&json).unwrap()
    }

    #[test]
    fn fallback_mentions_deviation() {
        let text = compose_announcement(
            &symbols(),
            &[5000, 3000, 2000],
            &[3400, 3300, 3300],
            None,
            1600,
            &tags(),
        );
        assert!(text.contains("deviation: 16.00%"));
        assert!(text.contains("- $VIRTUAL: 50.00% -> 34.00%"));
        assert!(text.ends_with("#DeFi #WhackRock"));
    }

    #[test]
    fn signal_context() {
        let text = compose_announcement(
            &symbols(),
            &[5000, 3000, 2000],
            &[1000, 3000, 6000],
            Some(&signal("Risk off, hold stables.")),
            4000,
            &tags(),
        );
        assert!(text.contains("\"Altcoin season?\""));
        assert!(text.contains("Market view: BEARISH | Risk: OFF"));
        assert!(text.contains("Risk off, hold stables."));
        assert!(!text.contains("deviation"));
    }

    #[test]
    fn long_text_is_truncated() {
        let summary = "x".repeat(400);
        let text = compose_announcement(
            &symbols(),
            &[5000, 3000, 2000],
            &[1000, 3000, 6000],
            Some(&signal(&summary)),
            4000,
            &tags(),
        );
        assert_eq!(text.chars().count(), MAX_CHARS);
        assert!(text.ends_with("..."));
    }

    #[test]
    fn short_text_untouched() {
        assert_eq!(truncate("hello".into()), "hello");
    }
}
