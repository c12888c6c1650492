use cascade_translate::mt::{
    EngineConfig, HttpJsonSource, ItemSource, JsonFileSink, JsonFileSource, ResultSink,
    load_previous_results,
};
use clap::{Arg, ArgAction, Command};
use std::path::Path;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let matches = Command::new("cascade-translate")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Translate a JSON list of {title, content} items through a chain of MT backends")
        .arg(
            Arg::new("source")
                .help("Items to translate: a JSON file path or an http(s) URL")
                .required(true)
                .index(1),
        )
        .arg(
            Arg::new("output")
                .help("Where to write the JSON results")
                .required(true)
                .index(2),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .help("TOML engine configuration"),
        )
        .arg(
            Arg::new("source-lang")
                .long("source-lang")
                .short('s')
                .help("Source language code (overrides the config)"),
        )
        .arg(
            Arg::new("target-lang")
                .long("target-lang")
                .short('t')
                .help("Target language code (overrides the config)"),
        )
        .arg(
            Arg::new("mock")
                .long("mock")
                .short('m')
                .help("Use offline mock backends instead of the configured ones")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("sequential")
                .long("sequential")
                .help("Translate contents one after another")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("resume")
                .long("resume")
                .short('r')
                .help("Keep translated results already present in OUTPUT")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .help("Log every call, retry and fallback")
                .action(ArgAction::SetTrue),
        )
        .get_matches();

    let default_level = if matches.get_flag("verbose") {
        "debug"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut config = match matches.get_one::<String>("config") {
        Some(path) => EngineConfig::load_from_file(path)?,
        None => EngineConfig::default(),
    };
    if let Some(lang) = matches.get_one::<String>("source-lang") {
        config.source_lang = lang.clone();
    }
    if let Some(lang) = matches.get_one::<String>("target-lang") {
        config.target_lang = lang.clone();
    }
    if matches.get_flag("sequential") {
        config.concurrent = false;
    }
    if matches.get_flag("mock") {
        config = config.with_mock_backends();
    }
    let engine = config.build_orchestrator()?;

    let source_arg = matches
        .get_one::<String>("source")
        .ok_or("SOURCE is required")?;
    let source: Box<dyn ItemSource> =
        if source_arg.starts_with("http://") || source_arg.starts_with("https://") {
            Box::new(HttpJsonSource::new(source_arg.as_str())?)
        } else {
            Box::new(JsonFileSource::new(source_arg))
        };
    let output = matches
        .get_one::<String>("output")
        .ok_or("OUTPUT is required")?;

    let items = source.fetch_items().await?;
    info!(source = %source.describe(), items = items.len(), "items fetched");

    let outcome = if matches.get_flag("resume") {
        let previous = load_previous_results(Path::new(output)).await?;
        engine.run_resuming(&items, &previous).await
    } else {
        engine.run(&items).await
    };

    JsonFileSink::new(output).persist(&outcome.results).await?;

    println!(
        "translated {}/{}, failed {}",
        outcome.success_count,
        outcome.results.len(),
        outcome.fail_count
    );
    Ok(())
}
