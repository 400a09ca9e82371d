use crate::{
    compress::gzip_sibling,
    config::ConversionOptions,
    error::Result,
    invoker::Invoker,
    report::{Level, OutcomeKind, Reporter, TaskOutcome},
    task::{planned_output, ConversionTask},
};
use rayon::prelude::*;
use std::{
    collections::{hash_map::Entry, HashMap},
    path::{Path, PathBuf},
};
use tracing::{debug, trace, warn};

/// How tasks are dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Mode {
    /// One task at a time on the calling thread, in input order
    Sequential,
    /// A pool with the given number of worker threads
    Parallel(usize),
}

/// An input whose output path was already claimed by an earlier input.
#[derive(Debug)]
struct Collision {
    output: PathBuf,
    first: PathBuf,
}

/// Dispatches one conversion task per input file.
///
/// Every task ends in exactly one recorded [`TaskOutcome`]; nothing a task
/// does can abort its siblings.
pub(crate) struct Scheduler {
    source_root: PathBuf,
    dest_root: PathBuf,
    options: ConversionOptions,
    invoker: Invoker,
}

impl Scheduler {
    pub(crate) fn new(
        source_root: &Path,
        dest_root: &Path,
        options: ConversionOptions,
        invoker: Invoker,
    ) -> Self {
        Self {
            source_root: source_root.to_path_buf(),
            dest_root: dest_root.to_path_buf(),
            options,
            invoker,
        }
    }

    /// Runs every input to completion and returns the recorded outcomes.
    ///
    /// In parallel mode the outcomes come back in completion order.
    ///
    /// When several inputs map to the same output path, the first in input
    /// order is converted and the rest are recorded as errored.
    ///
    /// # Errors
    ///
    /// Returns an error only if the worker pool cannot be started.
    pub(crate) fn run(
        &self,
        inputs: &[PathBuf],
        mode: Mode,
        reporter: &Reporter,
    ) -> Result<Vec<TaskOutcome>> {
        let collisions = self.find_collisions(inputs);
        if !collisions.is_empty() {
            warn!("{} input(s) share an output path with an earlier input", collisions.len());
        }

        match mode {
            Mode::Sequential => {
                debug!("Processing {} files sequentially", inputs.len());
                for input in inputs {
                    self.execute(input, &collisions, reporter);
                }
            }
            Mode::Parallel(workers) => {
                debug!("Processing {} files with {} workers", inputs.len(), workers);
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(workers)
                    .thread_name(|i| format!("vecbatch-worker-{i}"))
                    .build()?;

                // install blocks until every task has finished
                pool.install(|| {
                    inputs
                        .par_iter()
                        .for_each(|input| self.execute(input, &collisions, reporter));
                });
            }
        }

        Ok(reporter.take_outcomes())
    }

    fn find_collisions(&self, inputs: &[PathBuf]) -> HashMap<PathBuf, Collision> {
        let format = self.options.format();
        let mut claimed: HashMap<PathBuf, &Path> = HashMap::with_capacity(inputs.len());
        let mut collisions = HashMap::new();

        for input in inputs {
            // inputs that cannot be planned are reported by their own task
            let Ok(output) = planned_output(&self.source_root, &self.dest_root, input, format) else {
                continue;
            };
            match claimed.entry(output) {
                Entry::Vacant(slot) => {
                    slot.insert(input);
                }
                Entry::Occupied(slot) => {
                    collisions.insert(
                        input.clone(),
                        Collision {
                            output: slot.key().clone(),
                            first: slot.get().to_path_buf(),
                        },
                    );
                }
            }
        }

        collisions
    }

    /// Converts one file, records its outcome, then compresses on success.
    fn execute(&self, input: &Path, collisions: &HashMap<PathBuf, Collision>, reporter: &Reporter) {
        let outcome = match collisions.get(input) {
            Some(collision) => TaskOutcome::errored(
                input,
                Some(collision.output.as_path()),
                format!("output collides with {}", collision.first.display()),
            ),
            None => self.convert(input),
        };
        let compress_target =
            if outcome.kind == OutcomeKind::Success && self.options.should_compress() {
                outcome.output.clone()
            } else {
                None
            };

        reporter.record(outcome);

        if let Some(output) = compress_target {
            match gzip_sibling(&output) {
                Ok(target) => reporter.event(Level::Gzip, target.display()),
                Err(e) => reporter.event(Level::Warn, format!("gzip failed for {}: {e}", output.display())),
            }
        }
    }

    fn convert(&self, input: &Path) -> TaskOutcome {
        let task = match ConversionTask::plan(&self.source_root, &self.dest_root, input, self.options) {
            Ok(task) => task,
            Err(e) => return TaskOutcome::errored(input, None, e),
        };

        if !task.should_run {
            return TaskOutcome::skipped(&task.input, &task.output);
        }

        let argv = task.command_line();
        trace!("{} {:?}", self.invoker.program().display(), argv);

        match self.invoker.invoke(&argv) {
            Ok(run) if run.status.success() => TaskOutcome::success(&task.input, &task.output),
            Ok(run) => {
                let mut detail = match run.status.code() {
                    Some(code) => format!("converter exited with code {code}"),
                    None => "converter terminated by signal".to_string(),
                };
                if let Some(tail) = run.stderr_tail {
                    detail.push_str(" (");
                    detail.push_str(&tail);
                    detail.push(')');
                }
                TaskOutcome::failed(&task.input, &task.output, detail)
            }
            Err(e) => TaskOutcome::errored(
                &task.input,
                Some(&task.output),
                format!("failed to run {}: {e}", self.invoker.program().display()),
            ),
        }
    }
}
