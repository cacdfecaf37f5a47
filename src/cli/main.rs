/**
 * TaskSync command line entry point
 *
 * Queues the tasks of a JSON file for delivery and optionally streams
 * realtime updates for a set of task ids until interrupted.
 *
 *   tasksync <tasks.json> [--watch id1,id2,...]
 *
 * Configuration comes from the TOML file named by TASKSYNC_CONFIG, or from
 * the TASKSYNC_* environment variables.
 */

use serde::Deserialize;
use std::path::PathBuf;
use tasksync::client::realtime::TaskUpdateFeed;
use tasksync::client::TaskClient;
use std::time::Duration;
use tasksync::shared::{AppConfig, Task};

/// Accepts either a bare array or the `{"tasks": [...]}` request shape
#[derive(Deserialize)]
#[serde(untagged)]
enum TaskFile {
    List(Vec<Task>),
    Wrapped { tasks: Vec<Task> },
}

struct Args {
    tasks_file: PathBuf,
    watch: Vec<String>,
}

fn parse_args() -> Result<Args, String> {
    let mut args = std::env::args().skip(1);
    let mut tasks_file = None;
    let mut watch = Vec::new();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--watch" => {
                let ids = args.next().ok_or("--watch needs a comma separated list of task ids")?;
                watch.extend(
                    ids.split(',')
                        .map(str::trim)
                        .filter(|id| !id.is_empty())
                        .map(str::to_owned),
                );
            }
            "-h" | "--help" => return Err(String::new()),
            other if tasks_file.is_none() => tasks_file = Some(PathBuf::from(other)),
            other => return Err(format!("unexpected argument: {}", other)),
        }
    }

    Ok(Args {
        tasks_file: tasks_file.ok_or("missing tasks file")?,
        watch,
    })
}

fn load_config() -> Result<AppConfig, Box<dyn std::error::Error>> {
    match std::env::var("TASKSYNC_CONFIG") {
        Ok(path) => Ok(AppConfig::load(path)?),
        Err(_) => Ok(AppConfig::from_env()?),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(&env_filter))
        .init();

    let args = match parse_args() {
        Ok(args) => args,
        Err(message) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            eprintln!("usage: tasksync <tasks.json> [--watch id1,id2,...]");
            std::process::exit(2);
        }
    };

    let raw = tokio::fs::read_to_string(&args.tasks_file).await?;
    let tasks = match serde_json::from_str::<TaskFile>(&raw)? {
        TaskFile::List(tasks) | TaskFile::Wrapped { tasks } => tasks,
    };

    let client = TaskClient::from_config(load_config()?)?;
    client.start();

    tracing::info!(count = tasks.len(), file = %args.tasks_file.display(), "Queueing tasks");
    client.shared_tasks().update_tasks(tasks.clone());
    client.queue().queue_tasks(tasks).await;

    let status = client.queue().status().await;
    println!("{}", serde_json::to_string_pretty(&status)?);

    if !args.watch.is_empty() {
        let feed = TaskUpdateFeed::watch(client.realtime(), args.watch.iter().cloned());
        tracing::info!(task_ids = ?args.watch, "Watching for task updates, ctrl-c to stop");

        let mut received = 0usize;
        let mut ticker = tokio::time::interval(Duration::from_millis(250));
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    for update in feed.take_updates() {
                        println!("{}", serde_json::to_string(&update)?);
                        received += 1;
                    }
                }
                signal = tokio::signal::ctrl_c() => {
                    signal?;
                    break;
                }
            }
        }

        for update in feed.take_updates() {
            println!("{}", serde_json::to_string(&update)?);
            received += 1;
        }
        tracing::info!(received, "Stopped watching");
        feed.detach();
    }

    client.shutdown().await;
    Ok(())
}
