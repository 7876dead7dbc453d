use std::{path::PathBuf, process::ExitCode};

use anyhow::Context;
use clap::{Parser, Subcommand};
use inquire::{InquireError, Password, PasswordDisplayMode, Select, Text};
use travel_core::{Config, CoordinatorAgent, GeocoderId, ProviderId, load_env_file};

const EXAMPLES: &[&str] = &[
    "What's the weather like in London?",
    "How far is Barcelona from Madrid?",
    "What's the weather in Tokyo and how far is it from New York?",
];

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "travel", version, about = "Weather & distance assistant")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Answer this question and exit; without it an interactive session starts.
    #[arg(trailing_var_arg = true)]
    pub query: Vec<String>,

    /// Load environment variables from this key=value file instead of ./.env.
    #[arg(long, global = true)]
    pub env_file: Option<PathBuf>,

    /// Geocode with the built-in city table instead of an online service.
    #[arg(long, global = true)]
    pub offline: bool,

    /// Log filter used when RUST_LOG is not set, e.g. "info" or "travel_core=debug".
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Answer a single question and exit.
    Ask {
        /// The question, e.g. "How far is Barcelona from Madrid?".
        #[arg(required = true, num_args = 1.., trailing_var_arg = true)]
        query: Vec<String>,
    },

    /// Ask questions interactively (the default when no command is given).
    Chat,

    /// Store an API key for a weather provider.
    Configure {
        /// Provider short name, e.g. "openweather" or "weatherapi".
        provider: Option<String>,
    },
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<ExitCode> {
        match self.command {
            Some(Command::Configure { ref provider }) => {
                configure(provider.as_deref())?;
                Ok(ExitCode::SUCCESS)
            }
            Some(Command::Ask { ref query }) => self.ask(query).await,
            None if !self.query.is_empty() => self.ask(&self.query).await,
            Some(Command::Chat) | None => {
                let agent = self.coordinator()?;
                chat(&agent).await?;
                Ok(ExitCode::SUCCESS)
            }
        }
    }

    async fn ask(&self, query: &[String]) -> anyhow::Result<ExitCode> {
        let agent = self.coordinator()?;
        let response = agent.handle(&query.join(" ")).await;
        println!("{}", response.text);

        Ok(if response.is_success() {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        })
    }

    fn coordinator(&self) -> anyhow::Result<CoordinatorAgent> {
        load_env_file(self.env_file.as_deref())?;

        let mut config = Config::load()?;
        if self.offline {
            config.geocoder = Some(GeocoderId::Builtin.as_str().to_string());
        }

        CoordinatorAgent::from_config(&config)
    }
}

async fn chat(agent: &CoordinatorAgent) -> anyhow::Result<()> {
    println!("Welcome to the weather & distance assistant!");
    println!("Ask about the current weather in a city or the distance between two cities.");
    println!("Type 'exit' to quit.\n");
    println!("Example queries:");
    for example in EXAMPLES {
        println!("- {example}");
    }
    println!();

    loop {
        let input = match Text::new("What would you like to know?").prompt() {
            Ok(input) => input,
            Err(InquireError::OperationCanceled | InquireError::OperationInterrupted) => break,
            Err(err) => return Err(err).context("Failed to read query"),
        };

        let query = input.trim();
        if query.is_empty() {
            continue;
        }
        if matches!(query.to_lowercase().as_str(), "exit" | "quit") {
            break;
        }

        let response = agent.handle(query).await;
        println!("\n{}\n", response.text);
    }

    println!("Goodbye!");
    Ok(())
}

fn configure(provider: Option<&str>) -> anyhow::Result<()> {
    let id = match provider {
        Some(name) => ProviderId::try_from(name)?,
        None => Select::new("Weather provider:", ProviderId::all().to_vec())
            .prompt()
            .context("No provider selected")?,
    };

    let api_key = Password::new(&format!("API key for {id}:"))
        .with_display_mode(PasswordDisplayMode::Masked)
        .without_confirmation()
        .prompt()
        .context("No API key entered")?;

    let path = Config::config_file_path()?;
    let mut config = Config::load_file(&path)?;
    config.upsert_provider_api_key(id, api_key.trim().to_string());
    config.set_default_provider(id);
    config.save_to(&path)?;

    println!("Saved {id} credentials to {}", path.display());
    Ok(())
}
