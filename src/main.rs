use std::path::Path;
use std::process;

use clap::{Arg, Command};
use log::LevelFilter;

use phishscan::features::FeatureExtractor;
use phishscan::model::ModelTrainer;
use phishscan::storage::{PersistenceSink, SqliteSink};
use phishscan::{Config, Predictor};

fn main() {
    let matches = Command::new("phishscan")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Phishing detection for URLs and emails backed by a random forest classifier")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value("phishscan.yaml"),
        )
        .arg(
            Arg::new("generate-config")
                .long("generate-config")
                .value_name("FILE")
                .help("Generate a default configuration file")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("train")
                .long("train")
                .help("Train the model from the configured dataset")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("tune")
                .long("tune")
                .help("Run a hyperparameter grid search during training")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("check-url")
                .long("check-url")
                .value_name("URL")
                .help("Score a single URL")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("fetch-content")
                .long("fetch-content")
                .help("Fetch page content for deeper URL analysis")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("check-email")
                .long("check-email")
                .help("Score an email given --subject, --sender and --body/--body-file")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("subject")
                .long("subject")
                .value_name("TEXT")
                .help("Email subject line")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("sender")
                .long("sender")
                .value_name("ADDRESS")
                .help("Email From header value")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("body")
                .long("body")
                .value_name("TEXT")
                .help("Email body text")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("body-file")
                .long("body-file")
                .value_name("FILE")
                .help("Read the email body from a file")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("history")
                .long("history")
                .value_name("KIND")
                .help("Show recent checks (url or email)")
                .value_parser(["url", "email"])
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("stats")
                .long("stats")
                .value_name("KIND")
                .help("Show aggregate check statistics (url or email)")
                .value_parser(["url", "email"])
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging")
                .action(clap::ArgAction::SetTrue),
        )
        .get_matches();

    let log_level = if matches.get_flag("verbose") {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    if let Some(generate_path) = matches.get_one::<String>("generate-config") {
        generate_default_config(generate_path);
        return;
    }

    let config_path = matches.get_one::<String>("config").unwrap();
    let config = match load_config(config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            process::exit(1);
        }
    };

    let result = if matches.get_flag("train") {
        train(&config, matches.get_flag("tune"))
    } else if let Some(url) = matches.get_one::<String>("check-url") {
        check_url(&config, url, matches.get_flag("fetch-content"))
    } else if matches.get_flag("check-email") {
        check_email(&config, &matches)
    } else if let Some(kind) = matches.get_one::<String>("history") {
        show_history(&config, kind)
    } else if let Some(kind) = matches.get_one::<String>("stats") {
        show_stats(&config, kind)
    } else {
        eprintln!("No command given. Try --train, --check-url, --check-email, --history or --stats.");
        process::exit(2);
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn load_config(path: &str) -> anyhow::Result<Config> {
    if Path::new(path).exists() {
        Config::from_file(path)
    } else {
        log::warn!("Configuration file '{path}' not found, using default configuration");
        Ok(Config::default())
    }
}

fn generate_default_config(path: &str) {
    let config = Config::default();
    match config.to_file(path) {
        Ok(()) => {
            println!("Default configuration written to: {path}");
            println!("Please edit the configuration file to suit your needs.");
        }
        Err(e) => {
            eprintln!("Error writing configuration file: {e}");
            process::exit(1);
        }
    }
}

fn train(config: &Config, tune: bool) -> anyhow::Result<()> {
    let mut trainer = ModelTrainer::new();
    let dataset = trainer.load_dataset(Path::new(&config.dataset_path))?;
    log::info!("loaded {} labeled urls", dataset.len());

    let table = trainer.extract_features_from_dataset(
        &dataset,
        Some(Path::new(&config.feature_cache_path)),
    )?;
    let report = trainer.train(&table, tune)?;
    trainer.save_model(Path::new(&config.model_path))?;

    println!("Model trained and saved to {}", config.model_path);
    println!("Test accuracy: {:.4}", report.accuracy);
    println!("{}", report.report);
    Ok(())
}

fn extractor_for(config: &Config, fetch_content: bool) -> anyhow::Result<FeatureExtractor> {
    if fetch_content {
        Ok(FeatureExtractor::over_http(
            config.fetch_timeout_secs,
            &config.user_agent,
        )?)
    } else {
        Ok(FeatureExtractor::offline())
    }
}

fn check_url(config: &Config, url: &str, fetch_content: bool) -> anyhow::Result<()> {
    let predictor = Predictor::from_artifact_path(
        Path::new(&config.model_path),
        extractor_for(config, fetch_content)?,
    )?;
    let verdict = predictor.predict_url(url, fetch_content);

    let sink = SqliteSink::open(Path::new(&config.database_path))?;
    sink.save_url_check(
        &verdict.url,
        verdict.is_phishing,
        verdict.confidence,
        &verdict.features,
    )?;

    println!("{}", serde_json::to_string_pretty(&verdict)?);
    Ok(())
}

fn check_email(config: &Config, matches: &clap::ArgMatches) -> anyhow::Result<()> {
    let subject = matches
        .get_one::<String>("subject")
        .map(String::as_str)
        .unwrap_or("");
    let sender = matches
        .get_one::<String>("sender")
        .map(String::as_str)
        .unwrap_or("");
    let body = match matches.get_one::<String>("body-file") {
        Some(path) => std::fs::read_to_string(path)?,
        None => matches
            .get_one::<String>("body")
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("--check-email requires --body or --body-file"))?,
    };

    let predictor = Predictor::from_artifact_path(
        Path::new(&config.model_path),
        FeatureExtractor::offline(),
    )?;
    let verdict = predictor.predict_email(subject, sender, &body);

    let sink = SqliteSink::open(Path::new(&config.database_path))?;
    sink.save_email_check(
        subject,
        sender,
        &body,
        verdict.is_phishing,
        verdict.confidence,
        &verdict.features,
    )?;

    println!("{}", serde_json::to_string_pretty(&verdict)?);
    Ok(())
}

fn show_history(config: &Config, kind: &str) -> anyhow::Result<()> {
    let sink = SqliteSink::open(Path::new(&config.database_path))?;
    match kind {
        "url" => {
            let records = sink.url_history(config.history_limit)?;
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
        _ => {
            let records = sink.email_history(config.history_limit)?;
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
    }
    Ok(())
}

fn show_stats(config: &Config, kind: &str) -> anyhow::Result<()> {
    let sink = SqliteSink::open(Path::new(&config.database_path))?;
    let stats = match kind {
        "url" => sink.url_stats()?,
        _ => sink.email_stats()?,
    };
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}
