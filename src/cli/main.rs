use anyhow::Context;
use clap::{Parser, Subcommand};
use spam_detector::{
    api::handlers::PredictResponse,
    config::Config,
    ml::{DatasetConfig, SpamDetector, TrainingPipeline},
    nlp::{Lexicon, TextNormalizer},
    telemetry::{init_tracing, LogTarget},
};
use std::path::PathBuf;

/// Messages scored after training as a quick sanity check
const EXAMPLE_MESSAGES: [&str; 5] = [
    "Congratulations! You've won a FREE iPhone! Click here now!",
    "Hey, can we meet for coffee tomorrow at 3pm?",
    "URGENT: Your account will be suspended. Call now!",
    "Thanks for the meeting. I'll send the report by Friday.",
    "Win $1000 cash! Text WIN to 12345! Limited offer!",
];

#[derive(Parser)]
#[command(name = "spam-cli")]
#[command(about = "Train and run the spam detector", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to CONFIG_PATH, then bundled defaults)
    #[arg(short, long, global = true, env = "CONFIG_PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train on labelled corpora and write both artifacts
    Train {
        /// Corpus as PATH:FORMAT (format: email or sms); repeatable
        #[arg(short, long = "data", value_name = "PATH:FORMAT")]
        data: Vec<DatasetConfig>,

        /// Directory for the vectorizer and model files
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Vocabulary cap
        #[arg(long)]
        max_features: Option<usize>,

        /// Split seed
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Classify a message with the trained model
    Predict {
        #[arg(value_name = "TEXT")]
        text: String,
    },

    /// Print the normalized form of a message
    Clean {
        #[arg(value_name = "TEXT")]
        text: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load_from(cli.config.as_deref()).context("loading configuration")?;
    init_tracing(&config.observability, LogTarget::Stderr);

    let lexicon = Lexicon::from_config(&config.lexicon).context("loading lexicon")?;
    let normalizer = TextNormalizer::new(lexicon);

    match cli.command {
        Commands::Train {
            data,
            output_dir,
            max_features,
            seed,
        } => {
            if !data.is_empty() {
                config.training.datasets = data;
            }
            if let Some(max_features) = max_features {
                config.training.max_features = max_features;
            }
            if let Some(seed) = seed {
                config.training.seed = seed;
            }
            let artifacts = match output_dir {
                Some(dir) => config.artifacts.in_dir(&dir),
                None => config.artifacts.clone(),
            };

            let pipeline = TrainingPipeline::new(normalizer.clone(), config.training.clone());
            let model = pipeline.run_from_config().context("training failed")?;
            let report = &model.report;

            println!("{}", "=".repeat(70));
            println!("MODEL EVALUATION");
            println!("{}", "=".repeat(70));
            println!(
                "Messages: {} (spam: {}, ham: {})",
                report.n_messages, report.n_spam, report.n_ham
            );
            println!(
                "Training: {} samples, test: {} samples",
                report.n_train, report.n_test
            );
            println!(
                "Vocabulary size: {}, solver iterations: {} (converged: {})",
                report.vocabulary_size, report.iterations, report.converged
            );
            println!();
            print!("{}", report.metrics.report());

            model
                .save(&artifacts.vectorizer_path, &artifacts.model_path)
                .context("saving artifacts")?;
            println!();
            println!("Vectorizer saved to: {}", artifacts.vectorizer_path.display());
            println!("Model saved to: {}", artifacts.model_path.display());

            let detector = SpamDetector::new(normalizer, model.vectorizer, model.classifier)?;
            println!();
            println!("{}", "=".repeat(70));
            println!("EXAMPLE PREDICTIONS");
            println!("{}", "=".repeat(70));
            for (i, message) in EXAMPLE_MESSAGES.iter().enumerate() {
                let result = detector.classify(message)?;
                let label = if result.prediction.is_spam() { "SPAM" } else { "HAM" };
                let preview: String = message.chars().take(55).collect();
                println!();
                println!("{}. {}...", i + 1, preview);
                println!(
                    "   -> {} (confidence: {:.2}%)",
                    label,
                    result.prediction.confidence() * 100.0
                );
            }
        }

        Commands::Predict { text } => {
            let detector = SpamDetector::load(
                normalizer,
                &config.artifacts.vectorizer_path,
                &config.artifacts.model_path,
            )
            .context("loading model artifacts (run `spam-cli train` first)")?;

            let result = detector.classify(&text)?;
            println!(
                "{}",
                serde_json::to_string_pretty(&PredictResponse::from(result))?
            );
        }

        Commands::Clean { text } => {
            println!("{}", normalizer.normalize(&text));
        }
    }

    Ok(())
}
