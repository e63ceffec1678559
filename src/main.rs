use std::io::{self, IsTerminal, Read};
use std::path::Path;

use anyhow::{anyhow, Result};
use clap::{Parser, ValueEnum};

use game_item_analyzer::{ImageData, OutputFormat};

#[derive(Parser, Debug)]
#[command(
    name = "game-item-analyzer",
    version,
    about = "Analyze a game item screenshot with a vision model"
)]
struct Cli {
    /// Report language (en, ko, ja, zh). Defaults to the last one used.
    #[arg(short = 'l', long = "lang")]
    lang: Option<String>,

    /// Gemini model name
    #[arg(short = 'm', long = "model")]
    model: Option<String>,

    /// API key (overrides environment variables)
    #[arg(short = 'k', long = "key")]
    key: Option<String>,

    /// Image file to analyze; stdin is read when omitted
    #[arg(short = 'd', long = "data")]
    data: Option<String>,

    /// Output format
    #[arg(short = 'o', long = "output", value_enum, default_value_t = Format::Text)]
    output: Format,

    /// Read extra settings from a local TOML file
    #[arg(short = 'r', long = "read-settings")]
    read_settings: Option<String>,

    /// Show supported report languages and exit
    #[arg(long = "show-enabled-languages")]
    show_enabled_languages: bool,

    /// Serve the HTTP API instead of analyzing one image
    #[arg(long = "server", value_name = "ADDR", num_args = 0..=1, default_missing_value = "")]
    server: Option<String>,

    /// Enable verbose logging
    #[arg(long = "verbose")]
    verbose: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Format {
    Text,
    Json,
}

impl From<Format> for OutputFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Text => OutputFormat::Text,
            Format::Json => OutputFormat::Json,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    game_item_analyzer::logging::init(cli.verbose)?;

    if let Some(addr) = cli.server {
        let settings =
            game_item_analyzer::settings::load_settings(cli.read_settings.as_deref().map(Path::new))?;
        let addr = Some(addr).filter(|addr| !addr.trim().is_empty());
        return game_item_analyzer::server::run_server(settings, cli.key, addr).await;
    }

    let image = if cli.show_enabled_languages {
        None
    } else {
        Some(read_image(cli.data.as_deref())?)
    };

    let output = game_item_analyzer::run(
        game_item_analyzer::Config {
            lang: cli.lang,
            model: cli.model,
            key: cli.key,
            settings_path: cli.read_settings,
            format: cli.output.into(),
            show_enabled_languages: cli.show_enabled_languages,
            announce: io::stderr().is_terminal(),
        },
        image,
    )
    .await?;

    println!("{}", output);
    Ok(())
}

fn read_image(data: Option<&str>) -> Result<ImageData> {
    if let Some(path) = data {
        return ImageData::from_path(Path::new(path));
    }
    if io::stdin().is_terminal() {
        return Err(anyhow!("no image given; pass --data <file> or pipe an image on stdin"));
    }
    let mut buffer = Vec::new();
    io::stdin().read_to_end(&mut buffer)?;
    if buffer.is_empty() {
        return Err(anyhow!("stdin is empty"));
    }
    ImageData::from_bytes(buffer)
}
