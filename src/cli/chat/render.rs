//! Plain-text rendering of the transcript and the cost panel.

use crate::message::{Message, Role};

/// Shown in place of the System message, whose content is never displayed.
pub const SYSTEM_PLACEHOLDER: &str =
    "失敗は成功のもと！一緒に反省して次へ進みましょう！";

pub fn format_cost(cost: f64) -> String {
    format!("${:.5}", cost)
}

/// One transcript block for `message`.
pub fn format_message(message: &Message) -> String {
    match message.role {
        Role::System => SYSTEM_PLACEHOLDER.to_string(),
        Role::User => format!("[user]\n{}", message.content),
        Role::Assistant => format!("[assistant]\n{}", message.content),
    }
}

pub fn format_transcript(messages: &[Message]) -> String {
    messages
        .iter()
        .map(format_message)
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Cost panel: the running `total` followed by each call's cost.
pub fn format_cost_panel(total: f64, costs: &[f64]) -> String {
    let mut panel = format!("## Costs\nTotal cost: {}", format_cost(total));
    for cost in costs {
        panel.push_str("\n- ");
        panel.push_str(&format_cost(*cost));
    }
    panel
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_message_renders_as_placeholder() {
        let rendered =
            format_message(&Message::system("You are a helpful assistant."));
        assert_eq!(rendered, SYSTEM_PLACEHOLDER);
    }

    #[test]
    fn transcript_is_role_tagged_in_order() {
        let transcript = format_transcript(&[
            Message::system("secret instructions"),
            Message::user("なぜ遅刻したのか"),
            Message::assistant("原因を聞かせてください"),
        ]);
        assert_eq!(
            transcript,
            format!(
                "{}\n\n[user]\nなぜ遅刻したのか\n\n[assistant]\n原因を聞かせてください",
                SYSTEM_PLACEHOLDER
            )
        );
        assert!(!transcript.contains("secret instructions"));
    }

    #[test]
    fn empty_ledger_totals_zero() {
        assert_eq!(format_cost_panel(0.0, &[]), "## Costs\nTotal cost: $0.00000");
    }

    #[test]
    fn costs_are_shown_to_five_places() {
        assert_eq!(
            format_cost_panel(0.00162, &[0.00012, 0.0015]),
            "## Costs\nTotal cost: $0.00162\n- $0.00012\n- $0.00150"
        );
    }
}
