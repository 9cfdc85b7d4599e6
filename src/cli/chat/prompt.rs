use rustyline::{Config, Editor, Result};

const INPUT_PROMPT: &str = "何がありましたか？: ";

/// Instructions for the five-whys root-cause analysis. Sent to the model
/// verbatim as part of the System message.
pub const FIVE_WHYS_PROMPT: &str = include_str!("five_whys.txt");

pub fn generate_prompt(custom_prompt: Option<&str>) -> String {
    custom_prompt.unwrap_or(INPUT_PROMPT).to_string()
}

/// System message content: the base prompt, optionally followed by the
/// five-whys instructions.
pub fn system_prompt(base: &str, five_whys: bool) -> String {
    if five_whys {
        format!("{}\n{}", base, FIVE_WHYS_PROMPT)
    } else {
        base.to_string()
    }
}

pub fn rl() -> Result<Editor<()>> {
    let config = Config::builder()
        .history_ignore_space(true)
        .history_ignore_dups(true)
        .auto_add_history(false)
        .completion_type(rustyline::CompletionType::List)
        .build();
    Editor::with_config(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_prompt_asks_what_happened() {
        assert_eq!(generate_prompt(None), "何がありましたか？: ");
        assert_eq!(generate_prompt(Some("> ")), "> ");
    }

    #[test]
    fn five_whys_template_is_appended_verbatim() {
        let prompt = system_prompt("You are a helpful assistant.", true);
        assert!(prompt.starts_with("You are a helpful assistant.\n"));
        assert!(prompt.ends_with(FIVE_WHYS_PROMPT));
        assert!(FIVE_WHYS_PROMPT.contains("[分析]"));
        assert!(FIVE_WHYS_PROMPT.contains("{count}"));
    }

    #[test]
    fn plain_system_prompt_is_untouched() {
        assert_eq!(
            system_prompt("You are a helpful assistant.", false),
            "You are a helpful assistant."
        );
    }
}
