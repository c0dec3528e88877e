use anyhow::{anyhow, Context};
use clap::{ArgAction, Parser};
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use sawlog::{
    ConditionParser, Document, ExecutionOutcome, ExecutionWatchdog, GrokCompiler,
    InMemoryMetricsTracker, InputFormat, MetricsTracker, PipelineDefinition, PipelineExecutor,
    PipelineFactory, ProcessorRegistry, WatchdogConfig,
};

#[derive(Parser)]
#[command(name = "sawlog")]
#[command(about = "Run log lines through a pipeline of conditional processors")]
#[command(version)]
struct Args {
    /// Pipeline definition (.json, otherwise YAML)
    #[arg(short = 'p', long = "pipeline")]
    pipeline: PathBuf,

    /// Input file (default: stdin)
    #[arg(short = 'i', long = "input")]
    input_file: Option<PathBuf>,

    /// Output file (default: stdout)
    #[arg(short = 'o', long = "output")]
    output_file: Option<PathBuf>,

    /// How each input line becomes a document
    #[arg(short = 'f', long = "format", value_enum, default_value = "jsonl")]
    format: InputFormat,

    /// Worker threads executing the pipeline
    #[arg(short = 't', long = "threads", default_value = "1")]
    threads: usize,

    /// Watchdog time slice
    #[arg(long = "watchdog-slice", default_value = "100ms")]
    watchdog_slice: humantime::Duration,

    /// Number of watchdog slices before an execution counts as overtime
    #[arg(long = "watchdog-buckets", default_value = "10")]
    watchdog_buckets: usize,

    /// Extra grok pattern files ("NAME regex" per line)
    #[arg(long = "patterns", action = ArgAction::Append)]
    patterns: Vec<PathBuf>,

    /// Print metrics as JSON to stderr when done
    #[arg(long)]
    stats: bool,
}

fn main() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sawlog=info")))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let args = Args::parse();

    if let Err(e) = run(args) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn build_executor(
    args: &Args,
    metrics: Arc<InMemoryMetricsTracker>,
) -> anyhow::Result<(Arc<ExecutionWatchdog>, PipelineExecutor)> {
    let config = WatchdogConfig::new(args.watchdog_slice.into(), args.watchdog_buckets)?;
    let watchdog = Arc::new(ExecutionWatchdog::new(config, metrics.clone(), |_| {})?);
    watchdog.start().context("Failed to start watchdog thread")?;
    let executor = PipelineExecutor::new(metrics).with_watchdog(Arc::clone(&watchdog));
    Ok((watchdog, executor))
}

fn run(args: Args) -> anyhow::Result<()> {
    if args.threads == 0 {
        return Err(anyhow!("--threads must be at least 1"));
    }

    // Everything configurable is validated before any input is read
    let mut grok = GrokCompiler::with_default_patterns();
    for path in &args.patterns {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read pattern file '{}'", path.display()))?;
        let added = grok
            .add_patterns_from_str(&text)
            .with_context(|| format!("Invalid pattern file '{}'", path.display()))?;
        tracing::debug!("Loaded {} patterns from {}", added, path.display());
    }

    let registry = Arc::new(ProcessorRegistry::with_builtins(grok));
    let factory = PipelineFactory::new(registry, ConditionParser::default());
    let definition = PipelineDefinition::from_path(&args.pipeline)
        .with_context(|| format!("Failed to load pipeline '{}'", args.pipeline.display()))?;
    let pipeline = factory
        .build(&definition)
        .with_context(|| format!("Invalid pipeline '{}'", args.pipeline.display()))?;

    let metrics = Arc::new(InMemoryMetricsTracker::new());
    let (watchdog, executor) = build_executor(&args, Arc::clone(&metrics))?;

    let input: Box<dyn BufRead + Send> = match &args.input_file {
        Some(path) => Box::new(BufReader::new(
            File::open(path).with_context(|| format!("Failed to open input file '{}'", path.display()))?,
        )),
        None => Box::new(BufReader::new(io::stdin())),
    };
    let output: Box<dyn Write + Send> = match &args.output_file {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("Failed to create output file '{}'", path.display()))?,
        )),
        None => Box::new(BufWriter::new(io::stdout())),
    };

    let parser = args.format.parser();
    let (line_tx, line_rx) = crossbeam_channel::bounded::<(usize, String)>(args.threads * 64);
    let (out_tx, out_rx) = crossbeam_channel::unbounded::<String>();

    thread::scope(|scope| -> anyhow::Result<()> {
        let writer = scope.spawn(move || -> io::Result<()> {
            let mut output = output;
            for line in out_rx {
                output.write_all(line.as_bytes())?;
                output.write_all(b"\n")?;
            }
            output.flush()
        });

        let workers: Vec<_> = (0..args.threads)
            .map(|_| {
                let line_rx = line_rx.clone();
                let out_tx = out_tx.clone();
                let (parser, executor, pipeline) = (&parser, &executor, &pipeline);
                scope.spawn(move || {
                    for (line_number, line) in line_rx {
                        let mut doc: Document = match parser.parse_line(&line) {
                            Ok(doc) => doc,
                            Err(e) => {
                                tracing::warn!("Skipping line {}: {}", line_number, e);
                                continue;
                            }
                        };
                        match executor.execute(pipeline, &mut doc) {
                            Ok(ExecutionOutcome::Succeeded) => {
                                if out_tx.send(doc.to_string()).is_err() {
                                    break;
                                }
                            }
                            Ok(ExecutionOutcome::Dropped) => {}
                            Err(e) => tracing::debug!("Line {}: {}", line_number, e),
                        }
                    }
                })
            })
            .collect();
        drop(line_rx);
        drop(out_tx);

        let mut read_result = Ok(());
        for (index, line) in input.lines().enumerate() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    read_result = Err(anyhow::Error::new(e).context("Failed to read input"));
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            if line_tx.send((index + 1, line)).is_err() {
                break;
            }
        }
        drop(line_tx);

        for worker in workers {
            worker
                .join()
                .map_err(|_| anyhow!("Worker thread panicked"))?;
        }
        writer
            .join()
            .map_err(|_| anyhow!("Writer thread panicked"))?
            .context("Failed to write output")?;
        read_result
    })?;

    watchdog.shutdown();

    if args.stats {
        let snapshot = metrics.snapshot();
        eprintln!("{}", serde_json::to_string_pretty(&snapshot)?);
    }

    tracing::info!(
        "Processed {} documents: {} succeeded, {} failed, {} dropped, {} overtime",
        metrics.total_processed(),
        metrics.total_succeeded(),
        metrics.total_failed(),
        metrics.total_dropped(),
        metrics.total_overtime()
    );

    Ok(())
}
