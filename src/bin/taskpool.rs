use clap::{crate_authors, crate_version, Clap};
use slog::*;
use std::{process::exit, sync::Arc};
use taskpool::{Pool, RandomDelay, ResultSink, SharedQueue};

#[derive(Clap)]
#[clap(version = crate_version!(), author = crate_authors!())]
struct Options {
    /// Number of concurrent workers, at least 1
    #[clap(long, short, default_value = "5")]
    workers: usize,

    /// Number of tasks queued before the workers start
    #[clap(long, short, default_value = "20")]
    tasks: u64,

    /// Upper bound (exclusive) of the simulated work per task
    #[clap(long, default_value = "1000")]
    max_delay_ms: u64,

    /// Print result records as JSON lines
    #[clap(long)]
    json: bool,

    /// Log worker activity to stderr
    #[clap(long, short)]
    verbose: bool,
}

fn main() {
    let options = Options::parse();
    let logger = logger(options.verbose);

    if let Err(e) = run(&options, &logger) {
        error!(&logger, "{}", e);
        // flush the async drain before leaving
        drop(logger);
        exit(1);
    }
}

fn logger(verbose: bool) -> slog::Logger {
    let level = if verbose { Level::Debug } else { Level::Warning };
    let decorator = slog_term::TermDecorator::new().stderr().build();
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    let drain = slog_async::Async::new(drain).build().fuse();
    let drain = LevelFilter::new(drain, level).fuse();

    slog::Logger::root(drain, o!())
}

fn run(options: &Options, logger: &Logger) -> taskpool::Result<()> {
    info!(logger, "taskpool initializing";
        "version" => crate_version!(),
        "workers" => options.workers,
        "tasks" => options.tasks
    );

    let mut builder = Pool::builder()
        .workers(options.workers)
        .work(RandomDelay::from_millis(options.max_delay_ms))
        .logger(logger.clone());
    if !options.json {
        builder = builder.on_dispatch(|worker, task| {
            println!("Worker {} processing task {}", worker, task.id);
        });
    }
    let pool = builder.build()?;

    let queue = Arc::new(SharedQueue::with_tasks(options.tasks));
    let sink = Arc::new(ResultSink::new());
    pool.run(&queue, &sink)?;

    let records = sink.drain();
    if options.json {
        for record in &records {
            println!("{}", serde_json::to_string(record)?);
        }
    } else {
        println!("\nAll tasks completed. Results:");
        for record in &records {
            println!("{}", record);
        }
    }
    Ok(())
}
