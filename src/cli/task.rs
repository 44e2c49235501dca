//! slate task command implementations.

use std::path::PathBuf;

use crate::config::Config;
use crate::error::Result;
use crate::output::{emit_success, HumanOutput, OutputOptions};
use crate::storage::Storage;
use crate::task::{TaskRecord, TaskStore};

pub struct AddOptions {
    pub title: String,
    pub status: Option<String>,
    pub repo: Option<PathBuf>,
    pub json: bool,
    pub quiet: bool,
}

pub struct ListOptions {
    pub status: Option<String>,
    pub repo: Option<PathBuf>,
    pub json: bool,
    pub quiet: bool,
}

pub struct CountOptions {
    pub status: Option<String>,
    pub repo: Option<PathBuf>,
    pub json: bool,
    pub quiet: bool,
}

pub struct ShowOptions {
    pub slug: String,
    pub repo: Option<PathBuf>,
    pub json: bool,
    pub quiet: bool,
}

pub struct RetitleOptions {
    pub slug: String,
    pub title: String,
    pub repo: Option<PathBuf>,
    pub json: bool,
    pub quiet: bool,
}

pub struct StatusOptions {
    pub slug: String,
    pub status: String,
    pub repo: Option<PathBuf>,
    pub json: bool,
    pub quiet: bool,
}

pub struct DoneOptions {
    pub slug: String,
    pub repo: Option<PathBuf>,
    pub json: bool,
    pub quiet: bool,
}

pub struct RmOptions {
    pub slug: String,
    pub repo: Option<PathBuf>,
    pub json: bool,
    pub quiet: bool,
}

fn open_store(repo: Option<PathBuf>) -> Result<TaskStore> {
    let root = match repo {
        Some(path) => path,
        None => std::env::current_dir()?,
    };
    let config = Config::load_from_root(&root);
    Ok(TaskStore::new(Storage::new(root), config.tasks))
}

fn task_summary(human: &mut HumanOutput, task: &TaskRecord) {
    human.push_summary("slug", task.slug.clone());
    human.push_summary("title", task.title.clone());
    human.push_summary("status", task.status.clone());
}

pub fn run_add(opts: AddOptions) -> Result<()> {
    let store = open_store(opts.repo)?;
    let task = store.create(&opts.title, opts.status.as_deref())?;

    let mut human = HumanOutput::new(format!("slate add: created {}", task.slug));
    task_summary(&mut human, &task);
    human.push_next_step(format!("slate show {}", task.slug));

    emit_success(
        OutputOptions { json: opts.json, quiet: opts.quiet },
        "add",
        &task,
        Some(&human),
    )
}

pub fn run_list(opts: ListOptions) -> Result<()> {
    let store = open_store(opts.repo)?;
    let tasks = store.list(opts.status.as_deref())?;

    if opts.json {
        return emit_success(
            OutputOptions { json: true, quiet: opts.quiet },
            "list",
            &tasks,
            None,
        );
    }

    if opts.quiet {
        return Ok(());
    }

    if tasks.is_empty() {
        println!("no tasks");
        return Ok(());
    }

    for task in &tasks {
        println!("{:<24} [{}] {}", task.slug, task.status, task.title);
    }
    Ok(())
}

pub fn run_count(opts: CountOptions) -> Result<()> {
    let store = open_store(opts.repo)?;
    let total = store.count(opts.status.as_deref())?;

    if opts.json {
        #[derive(serde::Serialize)]
        struct CountReport {
            total: usize,
        }
        return emit_success(
            OutputOptions { json: true, quiet: opts.quiet },
            "count",
            &CountReport { total },
            None,
        );
    }

    if !opts.quiet {
        println!("{total}");
    }
    Ok(())
}

pub fn run_show(opts: ShowOptions) -> Result<()> {
    let store = open_store(opts.repo)?;
    let task = store.get(&opts.slug)?;

    let mut human = HumanOutput::new(format!("slate show: {}", task.slug));
    task_summary(&mut human, &task);
    human.push_summary("created", task.created_at.to_rfc3339());
    human.push_summary("updated", task.updated_at.to_rfc3339());

    emit_success(
        OutputOptions { json: opts.json, quiet: opts.quiet },
        "show",
        &task,
        Some(&human),
    )
}

pub fn run_retitle(opts: RetitleOptions) -> Result<()> {
    let store = open_store(opts.repo)?;
    let task = store.retitle(&opts.slug, &opts.title)?;

    let header = if task.slug == opts.slug {
        format!("slate retitle: {} kept its slug", task.slug)
    } else {
        format!("slate retitle: {} is now {}", opts.slug, task.slug)
    };
    let mut human = HumanOutput::new(header);
    task_summary(&mut human, &task);

    emit_success(
        OutputOptions { json: opts.json, quiet: opts.quiet },
        "retitle",
        &task,
        Some(&human),
    )
}

pub fn run_status(opts: StatusOptions) -> Result<()> {
    let store = open_store(opts.repo)?;
    let task = store.set_status(&opts.slug, &opts.status)?;

    let mut human = HumanOutput::new(format!(
        "slate status: {} is now {}",
        task.slug, task.status
    ));
    task_summary(&mut human, &task);

    emit_success(
        OutputOptions { json: opts.json, quiet: opts.quiet },
        "status",
        &task,
        Some(&human),
    )
}

pub fn run_done(opts: DoneOptions) -> Result<()> {
    let store = open_store(opts.repo)?;
    let task = store.done(&opts.slug)?;

    let mut human = HumanOutput::new(format!("slate done: closed {}", task.slug));
    task_summary(&mut human, &task);

    emit_success(
        OutputOptions { json: opts.json, quiet: opts.quiet },
        "done",
        &task,
        Some(&human),
    )
}

pub fn run_rm(opts: RmOptions) -> Result<()> {
    let store = open_store(opts.repo)?;
    let task = store.delete(&opts.slug)?;

    let mut human = HumanOutput::new(format!("slate rm: deleted {}", task.slug));
    task_summary(&mut human, &task);

    emit_success(
        OutputOptions { json: opts.json, quiet: opts.quiet },
        "rm",
        &task,
        Some(&human),
    )
}
