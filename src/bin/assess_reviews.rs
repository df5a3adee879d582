use anyhow::{bail, Context, Result};
use review_guard_lib::services::{AppConfig, ConfigStore};
use review_guard_lib::{assess_reviews, init_logging, validate_batch, LlmPatternClassifier, PatternClassifier, Review};
use serde::Deserialize;

#[derive(Deserialize)]
#[serde(untagged)]
enum ReviewInput {
    Bare(Vec<Review>),
    Wrapped { reviews: Vec<Review> },
}

impl ReviewInput {
    fn into_reviews(self) -> Vec<Review> {
        match self {
            Self::Bare(reviews) | Self::Wrapped { reviews } => reviews,
        }
    }
}

fn parse_arg_value(args: &[String], key: &str) -> Option<String> {
    args.iter()
        .position(|a| a == key)
        .and_then(|i| args.get(i + 1))
        .cloned()
}

fn has_flag(args: &[String], key: &str) -> bool {
    args.iter().any(|a| a == key)
}

fn load_config() -> AppConfig {
    ConfigStore::open_default()
        .and_then(|store| match store.load() {
            Ok(config) => Some(config),
            Err(e) => {
                tracing::warn!("Ignoring unreadable config: {}", e);
                None
            }
        })
        .unwrap_or_default()
}

/// `--set-key <provider> <key>` / `--delete-key <provider>` edit the stored api_keys.
fn manage_keys(args: &[String]) -> Result<bool> {
    let set = args.iter().position(|a| a == "--set-key");
    let delete = parse_arg_value(args, "--delete-key");
    if set.is_none() && delete.is_none() {
        return Ok(false);
    }

    let store = ConfigStore::open_default().context("no config directory on this platform")?;
    if let Some(i) = set {
        let (Some(provider), Some(key)) = (args.get(i + 1), args.get(i + 2)) else {
            bail!("--set-key needs <provider> <key>");
        };
        store.set_api_key(provider, key)?;
        println!("Stored API key for {}", provider);
    }
    if let Some(provider) = delete {
        store.delete_api_key(&provider)?;
        println!("Removed API key for {}", provider);
    }
    Ok(true)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    if manage_keys(&args)? {
        return Ok(());
    }
    if args.len() < 2 {
        eprintln!(
            "Usage:\n  assess_reviews <reviews.json> [--llm] [--provider <name[:model]>] [--out <json_path>]\n  assess_reviews --set-key <provider> <key>\n  assess_reviews --delete-key <provider>\n\nNotes:\n  - Input is a JSON array of reviews or {{\"reviews\": [...]}}.\n  - Without --llm only the local detectors run.\n  - API keys come from OPENAI_API_KEY / DEEPSEEK_API_KEY / ANTHROPIC_API_KEY or the config file."
        );
        return Ok(());
    }

    init_logging();

    let path = args[1].clone();
    let enable_llm = has_flag(&args, "--llm");
    let provider = parse_arg_value(&args, "--provider");
    let out_path = parse_arg_value(&args, "--out");

    let raw = std::fs::read_to_string(&path).with_context(|| format!("read {} failed", path))?;
    let reviews = serde_json::from_str::<ReviewInput>(&raw)
        .with_context(|| format!("{} is not a review batch", path))?
        .into_reviews();

    if let Err(e) = validate_batch(&reviews) {
        bail!("invalid review batch: {}", e);
    }

    let mut config = load_config();
    if let Some(p) = provider {
        config.classifier.provider = p;
    }

    let classifier = if enable_llm {
        LlmPatternClassifier::from_config(&config)
    } else {
        None
    };
    let classifier_ref = classifier.as_ref().map(|c| c as &dyn PatternClassifier);

    let assessment = assess_reviews(&reviews, classifier_ref).await;

    println!("File: {}", path);
    println!("Reviews: {}", assessment.review_count);
    println!(
        "Classifier: {}",
        classifier_ref.map(|c| c.name()).unwrap_or_else(|| "(off)".to_string())
    );
    println!("Trust score: {}", assessment.trust_score);
    println!();
    println!("Red flags: {}", assessment.red_flags.len());
    for flag in &assessment.red_flags {
        println!(
            "  - {} confidence={:.2} reviews={}",
            flag.kind.type_name(),
            flag.confidence,
            flag.kind.review_ids().len()
        );
    }
    println!("Green flags: {}", assessment.green_flags.len());
    for flag in &assessment.green_flags {
        println!("  + {} confidence={:.2}", flag.kind.type_name(), flag.confidence);
    }

    if let Some(out_path) = out_path {
        let json = serde_json::to_string_pretty(&assessment)?;
        std::fs::write(&out_path, json).with_context(|| format!("write {} failed", out_path))?;
        println!();
        println!("Wrote JSON: {}", out_path);
    }

    Ok(())
}
