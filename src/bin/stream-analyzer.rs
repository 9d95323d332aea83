use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use stream_analyzer::{
    analytics::{BaselineStatistic, ExportFormat, ExportManager, StreamAnalyzer},
    chat_management::{
        find_messages, find_user_messages, most_used_phrase, total_message_amount, EventRefiner,
        UserQuery,
    },
    config::{AnalyzerConfig, ConfigManager},
    io::read_raw_records,
    models::{ChatItem, StreamId},
    utils,
};

#[derive(Parser)]
#[command(
    name = "stream-analyzer",
    version,
    about = "Find highlight moments in recorded live-stream chat"
)]
struct Cli {
    /// Configuration file [default: platform config dir]
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level (overridden by RUST_LOG)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Detect highlights in a recorded chat
    Analyze(AnalyzeArgs),
    /// Find messages containing a phrase
    Search(SearchArgs),
    /// List messages sent by one viewer
    User(UserArgs),
    /// Show the most frequently used word
    TopPhrase(TopPhraseArgs),
    /// Write the default configuration file
    InitConfig,
}

#[derive(Args)]
struct InputArgs {
    /// NDJSON file with one raw chat record per line
    input: PathBuf,

    /// Maximum number of chat records to read
    #[arg(long)]
    limit: Option<usize>,
}

#[derive(Args)]
struct AnalyzeArgs {
    #[command(flatten)]
    input: InputArgs,

    /// Stream id or URL
    #[arg(long)]
    stream: String,

    /// Context rule file (JSON)
    #[arg(long)]
    contexts: Option<PathBuf>,

    /// Window width in seconds
    #[arg(long)]
    window: Option<u64>,

    /// Threshold ratio above the baseline
    #[arg(long)]
    threshold: Option<f64>,

    #[arg(long, value_enum)]
    baseline: Option<BaselineArg>,

    /// Drop highlights shorter than this many seconds
    #[arg(long)]
    min_duration: Option<u64>,

    /// Write results under this directory
    #[arg(long)]
    export_dir: Option<PathBuf>,

    /// Export folder name [default: current unix timestamp]
    #[arg(long, requires = "export_dir")]
    folder_name: Option<String>,

    #[arg(long = "format", value_enum, default_values_t = [FormatArg::Text, FormatArg::Json])]
    formats: Vec<FormatArg>,

    /// Print stream URLs next to each highlight
    #[arg(long)]
    urls: bool,
}

#[derive(Args)]
struct SearchArgs {
    #[command(flatten)]
    input: InputArgs,

    phrase: String,

    /// Match the whole message only
    #[arg(long)]
    exact: bool,

    #[arg(long)]
    case_sensitive: bool,
}

#[derive(Args)]
struct UserArgs {
    #[command(flatten)]
    input: InputArgs,

    /// Channel id
    #[arg(long, required_unless_present = "name", conflicts_with = "name")]
    id: Option<String>,

    /// Display name
    #[arg(long)]
    name: Option<String>,
}

#[derive(Args)]
struct TopPhraseArgs {
    #[command(flatten)]
    input: InputArgs,

    /// Words to skip
    #[arg(long, value_delimiter = ',')]
    exclude: Vec<String>,

    /// Count words as written, without normalization
    #[arg(long)]
    raw: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum BaselineArg {
    Mean,
    Median,
}

impl From<BaselineArg> for BaselineStatistic {
    fn from(value: BaselineArg) -> Self {
        match value {
            BaselineArg::Mean => BaselineStatistic::Mean,
            BaselineArg::Median => BaselineStatistic::Median,
        }
    }
}

#[derive(Clone, Copy, PartialEq, ValueEnum)]
enum FormatArg {
    Text,
    Json,
}

impl From<FormatArg> for ExportFormat {
    fn from(value: FormatArg) -> Self {
        match value {
            FormatArg::Text => ExportFormat::Text,
            FormatArg::Json => ExportFormat::Json,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_manager = match &cli.config {
        Some(path) => ConfigManager::with_path(path),
        None => ConfigManager::new()?,
    };
    let mut config = config_manager
        .load_config()
        .with_context(|| format!("failed to load {}", config_manager.config_path().display()))?;
    if let Some(level) = &cli.log_level {
        config.log.log_level = level.clone();
    }

    // ファイル出力のガードはmain終了まで保持する
    let _guard = utils::init_logging(&config.log)?;

    match cli.command {
        Command::Analyze(args) => analyze(config, args),
        Command::Search(args) => search(&config, args),
        Command::User(args) => user(&config, args),
        Command::TopPhrase(args) => top_phrase(&config, args),
        Command::InitConfig => {
            config_manager.save_config(&AnalyzerConfig::default())?;
            println!("{}", config_manager.config_path().display());
            Ok(())
        }
    }
}

fn analyze(mut config: AnalyzerConfig, args: AnalyzeArgs) -> anyhow::Result<()> {
    let stream_id = StreamId::parse(&args.stream)?;

    // コマンドライン指定を設定ファイルより優先
    let analysis = &mut config.analysis;
    if let Some(window) = args.window {
        analysis.window_secs = window;
    }
    if let Some(threshold) = args.threshold {
        analysis.threshold_ratio = threshold;
    }
    if let Some(baseline) = args.baseline {
        analysis.baseline = baseline.into();
    }
    if let Some(min_duration) = args.min_duration {
        analysis.min_duration_secs = min_duration;
    }
    if args.input.limit.is_some() {
        analysis.message_limit = args.input.limit;
    }
    if args.contexts.is_some() {
        analysis.context_path = args.contexts.clone();
    }

    let analyzer = StreamAnalyzer::with_configured_rules(stream_id, config)
        .context("invalid analysis configuration")?;
    let records = read_raw_records(&args.input.input)
        .with_context(|| format!("failed to read {}", args.input.input.display()))?;
    let report = analyzer.run(records)?;

    tracing::info!(
        "📊 {} messages from {} viewers ({} malformed, {} duplicates)",
        report.total_message_amount(),
        report.authors.len(),
        report.stats.malformed,
        report.stats.duplicates
    );

    if report.highlights.is_empty() {
        println!("No highlights found");
    }
    for highlight in &report.highlights {
        if args.urls {
            println!("{} {}", highlight, highlight.url());
        } else {
            println!("{}", highlight);
        }
    }

    if let Some(export_dir) = &args.export_dir {
        let mut formats: Vec<ExportFormat> = Vec::new();
        for format in args.formats.iter().copied().map(ExportFormat::from) {
            if !formats.contains(&format) {
                formats.push(format);
            }
        }
        let written = ExportManager::new()
            .export_to_dir(&report, export_dir, args.folder_name.as_deref(), &formats)
            .context("failed to export highlights")?;
        for path in written {
            println!("{}", path.display());
        }
    }

    Ok(())
}

/// `--limit` を設定ファイルの `message_limit` より優先する
fn effective_limit(input: &InputArgs, config: &AnalyzerConfig) -> Option<usize> {
    input.limit.or(config.analysis.message_limit)
}

fn load_items(input: &InputArgs, config: &AnalyzerConfig) -> anyhow::Result<Vec<ChatItem>> {
    let records = read_raw_records(&input.input)
        .with_context(|| format!("failed to read {}", input.input.display()))?;
    let refined = EventRefiner::new(effective_limit(input, config)).refine(records);
    tracing::info!("📥 Loaded {} messages", total_message_amount(&refined.items));
    Ok(refined.items)
}

fn search(config: &AnalyzerConfig, args: SearchArgs) -> anyhow::Result<()> {
    let items = load_items(&args.input, config)?;
    let found = find_messages(&items, &args.phrase, args.exact, !args.case_sensitive);
    for item in &found {
        println!("{}", item);
    }
    tracing::info!("🔍 {} matching messages", found.len());
    Ok(())
}

fn user(config: &AnalyzerConfig, args: UserArgs) -> anyhow::Result<()> {
    let query = match (args.id, args.name) {
        (Some(id), _) => UserQuery::Id(id),
        (None, Some(name)) => UserQuery::Name(name),
        (None, None) => anyhow::bail!("either --id or --name is required"),
    };
    let items = load_items(&args.input, config)?;
    for item in find_user_messages(&items, &query) {
        println!("{}", item);
    }
    Ok(())
}

fn top_phrase(config: &AnalyzerConfig, args: TopPhraseArgs) -> anyhow::Result<()> {
    let items = load_items(&args.input, config)?;
    let exclude: Vec<&str> = args.exclude.iter().map(String::as_str).collect();
    match most_used_phrase(&items, &exclude, !args.raw) {
        Some((phrase, count)) => println!("{} ({})", phrase, count),
        None => println!("No messages"),
    }
    Ok(())
}
