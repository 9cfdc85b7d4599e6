pub mod conversation_state;
pub mod prompt;
pub mod render;

use std::fs;
use std::io::Write;
use std::process::ExitCode;

use color_print::cformat;
use conversation_state::{ConversationState, SessionError};
use crossterm::cursor::MoveToColumn;
use crossterm::style::Print;
use crossterm::terminal::{Clear, ClearType};
use crossterm::QueueableCommand;
use eyre::{bail, eyre, Result};
use prompt::generate_prompt;
use tracing::{debug, info};

use crate::answer_service::AnswerService;
use crate::config::ChatConfig;
use crate::model::{ModelConfig, ModelTier, MAX_TEMPERATURE, MIN_TEMPERATURE};
use crate::openai_client::OpenAiClient;

const HEADER: &str = "なぁぜなぁぜGPT 🤗";

const PENDING_TEXT: &str = "ChatGPT is typing ...";

const WELCOME_TEXT: &str = "
Tell me what happened and we will dig for the root cause together.

/help         Show the help dialogue
/quit         Quit the application
";

const HELP_TEXT: &str = "
なぁぜなぁぜGPT

/clear              Clear the conversation history
/history            Show the conversation so far
/costs              Show the cost of each answer and the total
/model <name>       Choose the model for later answers (gpt-3.5, gpt-4)
/temperature <t>    Choose the temperature for later answers (0.0 to 2.0)
/retry              Ask again for an answer to the last message
//text              Send text that starts with a slash
/help               Show this help dialogue
/quit               Quit the application
";

pub struct ChatContext {
    output: Box<dyn Write>,
    input: Option<String>,
    interactive: bool,
    config: ChatConfig,
    conversation_state: ConversationState,
    model_config: ModelConfig,
    answer_service: Option<Box<dyn AnswerService>>,
}

impl ChatContext {
    pub fn new(
        output: Box<dyn Write>,
        input: Option<String>,
        interactive: bool,
        config: ChatConfig,
        model_config: ModelConfig,
    ) -> Self {
        Self {
            output,
            input,
            interactive,
            conversation_state: ConversationState::new(config.system_prompt.clone()),
            config,
            model_config,
            answer_service: None,
        }
    }

    /// Use `service` instead of building an OpenAI client from the config.
    pub fn with_answer_service(mut self, service: Box<dyn AnswerService>) -> Self {
        self.answer_service = Some(service);
        self
    }

    pub async fn run(&mut self) -> Result<ExitCode> {
        if self.answer_service.is_none() {
            self.answer_service = match OpenAiClient::new(&self.config) {
                Ok(client) => Some(Box::new(client)),
                Err(e) => {
                    writeln!(self.output, "Failed to initialize OpenAI client: {}", e)?;
                    return Ok(ExitCode::FAILURE);
                }
            };
        }

        if self.interactive {
            self.print_welcome()?;
        }

        // Non-interactive mode (single query)
        if let Some(input) = self.input.take() {
            let answered = self.run_single(&input).await?;
            return Ok(if answered {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            });
        }

        if self.interactive {
            self.run_interactive().await?;
        }

        Ok(ExitCode::SUCCESS)
    }

    fn print_welcome(&mut self) -> Result<()> {
        writeln!(self.output, "{}", cformat!("<bold>{}</>", HEADER))?;
        writeln!(self.output, "{}", WELCOME_TEXT)?;
        self.print_model()?;
        writeln!(self.output)?;
        self.print_transcript()?;
        Ok(())
    }

    async fn run_single(&mut self, input: &str) -> Result<bool> {
        let answered = match self.handle_input(input).await {
            Ok(()) => true,
            Err(e) => {
                writeln!(self.output, "Error: {}", e)?;
                false
            }
        };
        writeln!(self.output)?;
        self.print_costs()?;
        Ok(answered)
    }

    async fn run_interactive(&mut self) -> Result<()> {
        let mut rl = prompt::rl()?;

        if let Some(path) = &self.config.history_file {
            if let Err(e) = rl.load_history(path) {
                debug!("No input history loaded from {}: {}", path.display(), e);
            }
        }

        loop {
            let prompt_text = generate_prompt(None);
            let readline = rl.readline(&prompt_text);

            match readline {
                Ok(line) => {
                    if line.trim().is_empty() {
                        continue;
                    }

                    rl.add_history_entry(line.as_str());

                    if line.trim() == "/quit" {
                        break;
                    }

                    if let Err(e) = self.handle_input(&line).await {
                        writeln!(self.output, "{}", cformat!("<red>Error: {}</>", e))?;
                    }
                }
                Err(e) => {
                    debug!("Input closed: {}", e);
                    break;
                }
            }
        }

        if let Some(path) = &self.config.history_file {
            let saved = match path.parent() {
                Some(parent) => fs::create_dir_all(parent).map_err(|e| eyre!(e)),
                None => Ok(()),
            }
            .and_then(|()| rl.save_history(path).map_err(|e| eyre!(e)));
            if let Err(e) = saved {
                debug!("Failed to save input history to {}: {}", path.display(), e);
            }
        }

        Ok(())
    }

    async fn handle_input(&mut self, input: &str) -> Result<()> {
        let trimmed = input.trim();

        // A doubled slash sends the rest, with one slash, as chat text.
        if trimmed.starts_with("//") {
            return self.process_chat_input(&trimmed[1..]).await;
        }

        let (command, argument) = match trimmed.split_once(char::is_whitespace) {
            Some((command, argument)) => (command, argument.trim()),
            None => (trimmed, ""),
        };

        match command {
            "/help" => {
                writeln!(self.output, "{}", HELP_TEXT)?;
            }
            "/clear" => {
                self.conversation_state.reset();
                writeln!(self.output, "Conversation cleared.")?;
                self.print_transcript()?;
            }
            "/history" => {
                self.print_transcript()?;
            }
            "/costs" => {
                self.print_costs()?;
            }
            "/model" => {
                self.select_model(argument)?;
            }
            "/temperature" => {
                self.select_temperature(argument)?;
            }
            "/retry" => {
                if self.conversation_state.pending_user_turn().is_none() {
                    writeln!(self.output, "Nothing to retry.")?;
                } else {
                    self.answer_pending_turn().await?;
                }
            }
            _ if command.starts_with('/') => {
                writeln!(
                    self.output,
                    "Unknown command: {}. Type /help, or start with // to send it as text.",
                    command
                )?;
            }
            _ => {
                self.process_chat_input(input).await?;
            }
        }

        Ok(())
    }

    async fn process_chat_input(&mut self, input: &str) -> Result<()> {
        self.conversation_state.append_user_turn(input)?;
        self.answer_pending_turn().await
    }

    /// Request an answer for the transcript as it stands and record it.
    async fn answer_pending_turn(&mut self) -> Result<()> {
        let service = match self.answer_service.as_deref() {
            Some(service) => service,
            None => bail!("OpenAI client not initialized"),
        };

        if self.interactive {
            show_pending(self.output.as_mut())?;
        }
        let result = self
            .conversation_state
            .request_answer(service, &self.model_config)
            .await;
        if self.interactive {
            clear_pending(self.output.as_mut())?;
        }

        let answer = match result {
            Ok(answer) => answer,
            Err(SessionError::AnswerService(e)) if e.is_transient() => {
                return Err(eyre!(
                    "the assistant is unavailable right now ({}). Type /retry to try again.",
                    e
                ));
            }
            Err(e) => return Err(e.into()),
        };

        self.conversation_state
            .commit_answer(answer.text.clone(), answer.cost)?;
        info!(
            cost = answer.cost,
            total = self.conversation_state.total_cost(),
            "Answer recorded"
        );

        writeln!(self.output, "{}", cformat!("<green,bold>[assistant]</>"))?;
        writeln!(self.output, "{}", answer.text)?;
        writeln!(
            self.output,
            "{}",
            cformat!(
                "<dim>cost {} / total {}</>",
                render::format_cost(answer.cost),
                render::format_cost(self.conversation_state.total_cost())
            )
        )?;

        Ok(())
    }

    fn select_model(&mut self, argument: &str) -> Result<()> {
        if !argument.is_empty() {
            match ModelTier::parse(argument) {
                Some(tier) => self.model_config = self.model_config.with_tier(tier),
                None => writeln!(
                    self.output,
                    "Unknown model: {}. Choose gpt-3.5 or gpt-4.",
                    argument
                )?,
            }
        }
        self.print_model()
    }

    fn select_temperature(&mut self, argument: &str) -> Result<()> {
        if !argument.is_empty() {
            match argument.parse::<f32>() {
                Ok(temperature) => {
                    self.model_config = self.model_config.with_temperature(temperature);
                }
                Err(_) => writeln!(
                    self.output,
                    "Temperature must be a number between {:.1} and {:.1}.",
                    MIN_TEMPERATURE, MAX_TEMPERATURE
                )?,
            }
        }
        self.print_model()
    }

    fn print_model(&mut self) -> Result<()> {
        writeln!(
            self.output,
            "Model: {} (temperature {:.2})",
            self.model_config.tier(),
            self.model_config.temperature()
        )?;
        Ok(())
    }

    fn print_transcript(&mut self) -> Result<()> {
        writeln!(
            self.output,
            "{}",
            render::format_transcript(self.conversation_state.messages())
        )?;
        Ok(())
    }

    fn print_costs(&mut self) -> Result<()> {
        writeln!(
            self.output,
            "{}",
            render::format_cost_panel(
                self.conversation_state.total_cost(),
                self.conversation_state.costs()
            )
        )?;
        Ok(())
    }
}

fn show_pending(output: &mut dyn Write) -> Result<()> {
    output.queue(Print(PENDING_TEXT))?;
    output.flush()?;
    Ok(())
}

fn clear_pending(output: &mut dyn Write) -> Result<()> {
    output
        .queue(MoveToColumn(0))?
        .queue(Clear(ClearType::CurrentLine))?;
    output.flush()?;
    Ok(())
}
