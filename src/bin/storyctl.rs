use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use storybook_forge::model::{AspectRatio, Character, ImageOutcome, StoryConfig};
use storybook_forge::utils::archive::DownloadSelection;
use storybook_forge::utils::poller::CancelHandle;
use storybook_forge::{AppError, Config, GeminiClient, Session, StoryEngine};

#[derive(Parser, Debug)]
#[command(name = "storyctl", about = "CLI for Storybook Forge", version)]
struct Cli {
    /// Override GOOGLE_API_KEY
    #[arg(global = true, long)]
    api_key: Option<String>,

    /// Override GEMINI_BASE_URL
    #[arg(global = true, long)]
    base_url: Option<String>,

    /// Override OUTPUT_DIR (characters/ and images/ are created under it)
    #[arg(global = true, long, value_name = "PATH")]
    output_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Clone)]
struct StoryArgs {
    /// Story title
    #[arg(long, default_value = "")]
    title: String,
    /// Genre
    #[arg(long, default_value = "Children")]
    genre: String,
    /// Tone
    #[arg(long, default_value = "Heartwarming")]
    tone: String,
    /// Art style
    #[arg(long, default_value = "Watercolor illustration, soft colors")]
    art_style: String,
    /// Target age / reading level
    #[arg(long, default_value = "")]
    age: String,
    /// Number of pages (1-100)
    #[arg(long, default_value_t = 10, value_parser = clap::value_parser!(u32).range(1..=100))]
    pages: u32,
    /// Aspect ratio: 1:1, 16:9, 9:16, 4:3 or 3:4
    #[arg(long, default_value = "1:1")]
    ratio: String,
}

impl StoryArgs {
    fn to_config(&self) -> Result<StoryConfig, AppError> {
        Ok(StoryConfig {
            title: self.title.clone(),
            genre: self.genre.clone(),
            tone: self.tone.clone(),
            art_style: self.art_style.clone(),
            age: self.age.clone(),
            pages: self.pages,
            ratio: self.ratio.parse::<AspectRatio>()?,
        })
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate story text and character suggestions, printed as JSON
    Story {
        #[command(flatten)]
        story: StoryArgs,
    },
    /// Run the whole pipeline and write a ZIP of the results
    Book {
        #[command(flatten)]
        story: StoryArgs,
        /// Use this story text instead of generating one
        #[arg(long, value_name = "PATH")]
        story_file: Option<PathBuf>,
        /// Character as NAME|TRAITS[|IMAGE] (repeatable, max 5). Without
        /// --character the suggested characters are used and drawn.
        #[arg(long = "character", value_name = "NAME|TRAITS[|IMAGE]")]
        characters: Vec<String>,
        /// Where to write the archive
        #[arg(long, value_name = "PATH", default_value = "storybook_assets.zip")]
        zip: PathBuf,
    },
    /// Generate one character image
    Character {
        #[command(flatten)]
        story: StoryArgs,
        /// Character name
        #[arg(long, default_value = "")]
        name: String,
        /// Character traits
        #[arg(long, default_value = "")]
        traits: String,
        /// Redesign from this existing picture instead of drawing from scratch
        #[arg(long, value_name = "PATH")]
        source: Option<PathBuf>,
    },
    /// Regenerate one page image from a prompt
    Regen {
        /// Image prompt
        #[arg(long)]
        prompt: String,
        /// Edit this existing picture instead of drawing from scratch
        #[arg(long, value_name = "PATH")]
        source: Option<PathBuf>,
        /// Character as NAME|TRAITS[|IMAGE] (repeatable)
        #[arg(long = "character", value_name = "NAME|TRAITS[|IMAGE]")]
        characters: Vec<String>,
        /// Aspect ratio
        #[arg(long, default_value = "1:1")]
        ratio: String,
    },
}

fn parse_character(raw: &str) -> Result<Character, AppError> {
    let mut fields = raw.splitn(3, '|');
    let name = fields.next().unwrap_or_default().trim();
    let traits = fields.next().unwrap_or_default().trim();
    let image = fields.next().map(str::trim).filter(|s| !s.is_empty()).map(PathBuf::from);
    if name.is_empty() && traits.is_empty() {
        return Err(AppError::Config(format!("Invalid --character '{}', expected NAME|TRAITS[|IMAGE]", raw)));
    }
    Ok(Character { name: name.to_string(), traits: traits.to_string(), image })
}

fn print_outcome(label: &str, outcome: &ImageOutcome) {
    if outcome.is_ok() {
        println!("{}: {}", label, outcome.path);
    } else {
        eprintln!("{}: failed ({})", label, outcome.error);
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    // Load env and parse CLI
    Config::dotenv_load();
    let cli = Cli::parse();

    let mut conf = Config::new()?;
    if let Some(key) = cli.api_key {
        conf.api_key = Some(key);
    }
    if let Some(url) = cli.base_url {
        conf.base_url = url;
    }
    if let Some(dir) = cli.output_dir {
        conf.output_dir = dir;
    }
    let key = conf.api_key.clone().ok_or(AppError::MissingApiKey)?;
    let client = GeminiClient::new(conf.base_url.clone(), key);
    let engine = StoryEngine::from_config(Arc::new(client), &conf);

    match cli.command {
        Commands::Story { story } => {
            let config = story.to_config()?;
            let draft = engine.generate_story(&config).await;
            println!("{}", serde_json::to_string_pretty(&draft)?);
            Ok(())
        }
        Commands::Book { story, story_file, characters, zip } => {
            let mut session = Session::with_config(story.to_config()?);
            match story_file {
                Some(path) => session.set_story(tokio::fs::read_to_string(&path).await?),
                None => {
                    session.generate_story(&engine).await;
                    eprintln!("Generated story with {} suggested characters", session.characters.len());
                }
            }
            if !characters.is_empty() {
                session.clear_characters();
                for raw in &characters {
                    let parsed = parse_character(raw)?;
                    let index = session.add_character(&parsed.name, &parsed.traits)?;
                    session.characters[index].image = parsed.image;
                }
            }
            for i in 0..session.characters.len() {
                if session.characters[i].image.is_none() {
                    let outcome = session.generate_character_image(&engine, i).await?;
                    print_outcome(&format!("character {}", i + 1), &outcome);
                }
            }

            // Ctrl-C stops the batch poll; pages then come back as failed.
            let (handle, token) = CancelHandle::pair();
            let watcher = tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    handle.cancel();
                }
            });
            let outcomes = session.illustrate(&engine, &token).await;
            watcher.abort();
            let outcomes = outcomes?;
            for (i, outcome) in outcomes.iter().enumerate() {
                print_outcome(&format!("page {}", i + 1), outcome);
            }

            let bytes = session.archive(DownloadSelection::All).await?;
            tokio::fs::write(&zip, &bytes).await?;
            println!("Saved {} ({} bytes)", zip.display(), bytes.len());
            Ok(())
        }
        Commands::Character { story, name, traits, source } => {
            let config = story.to_config()?;
            let character = Character::new(name, traits);
            let outcome = match source {
                Some(path) => engine.edit_character_image(&character, &path, &config).await?,
                None => engine.generate_character_image(&character, &config).await?,
            };
            print_outcome("character", &outcome);
            Ok(())
        }
        Commands::Regen { prompt, source, characters, ratio } => {
            let ratio = ratio.parse::<AspectRatio>()?;
            let characters = characters.iter().map(|c| parse_character(c)).collect::<Result<Vec<_>, _>>()?;
            let outcome = match source {
                Some(path) => engine.edit_page_image(&prompt, &path, &characters, ratio).await?,
                None => engine.regenerate_page_image(&prompt, &characters, ratio).await,
            };
            print_outcome("page", &outcome);
            Ok(())
        }
    }
}
