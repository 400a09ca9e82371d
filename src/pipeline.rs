use crate::{
    config::Config,
    error::{Error, Result},
    invoker::Invoker,
    report::{Level, Reporter, RunSummary, TaskOutcome},
    scanner::Scanner,
    scheduler::{Mode, Scheduler},
};
use chrono::{DateTime, Local};
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::{info, instrument, warn};

/// Batch conversion orchestrator.
///
/// Construction performs every setup check, so once a `Pipeline` exists the
/// run itself can only fail before the first task is dispatched.
pub struct Pipeline {
    config: Config,
    source_root: PathBuf,
    dest_root: PathBuf,
    scanner: Scanner,
    scheduler: Scheduler,
}

impl Pipeline {
    /// Creates a new pipeline with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration validation fails
    /// - The source directory cannot be resolved
    /// - The destination directory cannot be created
    /// - The converter cannot be found
    /// - An input pattern is invalid
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let source_root = fs::canonicalize(&config.source_dir)
            .map_err(|e| Error::io(&config.source_dir, e))?;

        fs::create_dir_all(&config.dest_dir).map_err(|e| Error::io(&config.dest_dir, e))?;
        let dest_root =
            fs::canonicalize(&config.dest_dir).map_err(|e| Error::io(&config.dest_dir, e))?;

        let invoker = Invoker::locate(&config.converter, config.tool_dir.as_deref())?;

        let nested_dest = (dest_root != source_root && dest_root.starts_with(&source_root))
            .then_some(dest_root.as_path());
        let scanner = Scanner::new(&source_root, &config.patterns, nested_dest)?;
        let scheduler = Scheduler::new(&source_root, &dest_root, config.options, invoker);

        Ok(Self {
            config,
            source_root,
            dest_root,
            scanner,
            scheduler,
        })
    }

    /// Converts every input file and returns the run summary.
    ///
    /// # Process
    ///
    /// 1. **Log**: Opens the timestamped run log in the destination root
    /// 2. **Scan**: Enumerates input files once
    /// 3. **Convert**: Dispatches one task per file, sequentially or pooled
    /// 4. **Report**: Counts outcomes and appends the summary line
    ///
    /// Per-file problems never surface here; they are counted in the summary.
    ///
    /// # Errors
    ///
    /// Returns an error if the run log cannot be created or the worker pool
    /// cannot be started.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use vecbatch::{Config, Pipeline};
    ///
    /// # fn main() -> anyhow::Result<()> {
    /// let config = Config::builder()
    ///     .source_dir("./shapes")
    ///     .dest_dir("./geojson")
    ///     .build()?;
    ///
    /// let summary = Pipeline::new(config)?.run()?;
    /// println!("{}", summary.summary_line());
    /// # Ok(())
    /// # }
    /// ```
    #[instrument(skip(self), fields(source = %self.source_root.display()))]
    pub fn run(self) -> Result<RunSummary> {
        let started_at = Local::now();
        let reporter = Reporter::create(&self.dest_root, started_at)?;

        reporter.event(
            Level::Info,
            format!(
                "Run started: source={} dest={} options={:?}",
                self.source_root.display(),
                self.dest_root.display(),
                self.config.options
            ),
        );

        let inputs = self.scanner.scan();
        if inputs.is_empty() {
            warn!("No input files found in {}", self.source_root.display());
            reporter.event(Level::Warn, "No input files found, nothing to do");
            return Ok(self.finish(&reporter, &[], started_at));
        }

        let mode = if self.config.parallel {
            Mode::Parallel(self.config.effective_workers())
        } else {
            Mode::Sequential
        };
        info!("Found {} input files ({:?})", inputs.len(), mode);

        let outcomes = self.scheduler.run(&inputs, mode, &reporter)?;
        let summary = self.finish(&reporter, &outcomes, started_at);
        reporter.write_summary(&summary);

        info!(
            "✓ {} in {:.2}s",
            summary.summary_line(),
            summary.duration().as_secs_f64()
        );

        Ok(summary)
    }

    fn finish(
        &self,
        reporter: &Reporter,
        outcomes: &[TaskOutcome],
        started_at: DateTime<Local>,
    ) -> RunSummary {
        let summary = RunSummary::from_outcomes(
            outcomes,
            started_at,
            Local::now(),
            reporter.log_path().to_path_buf(),
        );

        if let Some(path) = &self.config.summary_json {
            if let Err(e) = write_summary_json(path, &summary) {
                warn!("Could not write summary JSON: {}", e);
            }
        }

        summary
    }
}

fn write_summary_json(path: &Path, summary: &RunSummary) -> Result<()> {
    let file = fs::File::create(path).map_err(|e| Error::io(path, e))?;
    serde_json::to_writer_pretty(file, summary)?;
    Ok(())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::test_support::{fake_tools, COPY_TOOL, PICKY_TOOL};
    use assert_fs::prelude::*;

    fn config(src: &Path, dest: &Path) -> crate::ConfigBuilder {
        Config::builder()
            .source_dir(src)
            .dest_dir(dest)
            .tool_dir(fake_tools())
            .converter(COPY_TOOL)
    }

    fn summary_line_in_log(summary: &RunSummary) -> String {
        let log = fs::read_to_string(&summary.log_file).unwrap();
        log.lines().last().unwrap().to_string()
    }

    #[test]
    fn test_mirrors_tree_with_default_options() {
        let src = assert_fs::TempDir::new().unwrap();
        let dest = assert_fs::TempDir::new().unwrap();
        src.child("a/b/x.shp").write_str("x").unwrap();
        src.child("y.shp").write_str("y").unwrap();

        let summary = Pipeline::new(config(src.path(), dest.path()).build().unwrap())
            .unwrap()
            .run()
            .unwrap();

        dest.child("a/b/x.geojson").assert("x");
        dest.child("y.geojson").assert("y");
        assert_eq!(summary.total, 2);
        assert!(summary_line_in_log(&summary).ends_with("Success: 2 | Skipped: 0 | Failed: 0"));
        assert!(summary.log_file.starts_with(dest.path().canonicalize().unwrap()));
    }

    #[test]
    fn test_second_run_skips_everything() {
        let src = assert_fs::TempDir::new().unwrap();
        let dest = assert_fs::TempDir::new().unwrap();
        src.child("a/b/x.shp").write_str("x").unwrap();
        src.child("y.shp").write_str("y").unwrap();

        Pipeline::new(config(src.path(), dest.path()).build().unwrap())
            .unwrap()
            .run()
            .unwrap();
        let second = Pipeline::new(config(src.path(), dest.path()).build().unwrap())
            .unwrap()
            .run()
            .unwrap();

        assert_eq!(second.skipped, 2);
        assert_eq!(second.success, 0);
        dest.child("a/b/x.geojson").assert("x");
        assert!(summary_line_in_log(&second).ends_with("Success: 0 | Skipped: 2 | Failed: 0"));
    }

    #[test]
    fn test_existing_output_is_counted_as_skipped() {
        let src = assert_fs::TempDir::new().unwrap();
        let dest = assert_fs::TempDir::new().unwrap();
        src.child("a/b/x.shp").write_str("x").unwrap();
        src.child("y.shp").write_str("y").unwrap();
        dest.child("y.geojson").write_str("earlier").unwrap();

        let summary = Pipeline::new(config(src.path(), dest.path()).build().unwrap())
            .unwrap()
            .run()
            .unwrap();

        assert_eq!(summary.summary_line(), "Success: 1 | Skipped: 1 | Failed: 0");
        dest.child("y.geojson").assert("earlier");
    }

    #[test]
    fn test_each_run_writes_its_own_log() {
        let src = assert_fs::TempDir::new().unwrap();
        let dest = assert_fs::TempDir::new().unwrap();
        src.child("y.shp").write_str("y").unwrap();

        let first = Pipeline::new(config(src.path(), dest.path()).build().unwrap())
            .unwrap()
            .run()
            .unwrap();
        let second = Pipeline::new(config(src.path(), dest.path()).build().unwrap())
            .unwrap()
            .run()
            .unwrap();

        assert_ne!(first.log_file, second.log_file);
        let first_log = fs::read_to_string(&first.log_file).unwrap();
        assert_eq!(first_log.matches("Success:").count(), 1);
        assert!(summary_line_in_log(&first).ends_with("Success: 1 | Skipped: 0 | Failed: 0"));
        assert!(summary_line_in_log(&second).ends_with("Success: 0 | Skipped: 1 | Failed: 0"));
    }

    #[test]
    fn test_inputs_sharing_an_output_are_reported() {
        let src = assert_fs::TempDir::new().unwrap();
        let dest = assert_fs::TempDir::new().unwrap();
        src.child("roads.shp").write_str("from shp").unwrap();
        src.child("roads.gpkg").write_str("from gpkg").unwrap();

        let summary = Pipeline::new(
            config(src.path(), dest.path())
                .pattern("*.shp")
                .pattern("*.gpkg")
                .build()
                .unwrap(),
        )
        .unwrap()
        .run()
        .unwrap();

        assert_eq!(summary.total, 2);
        assert_eq!(summary.errored, 1);
        assert_eq!(summary.summary_line(), "Success: 1 | Skipped: 0 | Failed: 1");
        dest.child("roads.geojson").assert("from gpkg");
        let log = fs::read_to_string(&summary.log_file).unwrap();
        assert!(log.contains("collides with"));
    }

    #[test]
    fn test_every_input_gets_one_outcome_in_parallel() {
        let src = assert_fs::TempDir::new().unwrap();
        let dest = assert_fs::TempDir::new().unwrap();
        for i in 0..12 {
            let name = if i % 4 == 0 { format!("d{i}/bad{i}.shp") } else { format!("d{i}/ok{i}.shp") };
            src.child(name).write_str("data").unwrap();
        }

        let summary = Pipeline::new(
            config(src.path(), dest.path())
                .converter(PICKY_TOOL)
                .parallel(true)
                .max_workers(3)
                .build()
                .unwrap(),
        )
        .unwrap()
        .run()
        .unwrap();

        assert_eq!(summary.total, 12);
        assert_eq!(summary.failed, 3);
        assert_eq!(summary.success, 9);
        assert_eq!(summary.success + summary.skipped + summary.failures(), summary.total);
    }

    #[test]
    fn test_no_inputs_returns_empty_summary() {
        let src = assert_fs::TempDir::new().unwrap();
        let dest = assert_fs::TempDir::new().unwrap();
        src.child("readme.txt").touch().unwrap();

        let summary = Pipeline::new(config(src.path(), dest.path()).build().unwrap())
            .unwrap()
            .run()
            .unwrap();

        assert_eq!(summary.total, 0);
        let log = fs::read_to_string(&summary.log_file).unwrap();
        assert!(log.contains("No input files found"));
    }

    #[test]
    fn test_destination_is_created() {
        let src = assert_fs::TempDir::new().unwrap();
        let root = assert_fs::TempDir::new().unwrap();
        let dest = root.child("fresh/out");
        src.child("y.shp").write_str("y").unwrap();

        Pipeline::new(config(src.path(), dest.path()).build().unwrap())
            .unwrap()
            .run()
            .unwrap();

        dest.child("y.geojson").assert("y");
    }

    #[test]
    fn test_nested_destination_is_not_rescanned() {
        let src = assert_fs::TempDir::new().unwrap();
        src.child("y.shp").write_str("y").unwrap();
        let dest = src.child("converted");

        let summary = Pipeline::new(
            config(src.path(), dest.path())
                .pattern("*.shp")
                .pattern("*.geojson")
                .build()
                .unwrap(),
        )
        .unwrap()
        .run()
        .unwrap();
        assert_eq!(summary.total, 1);

        let again = Pipeline::new(
            config(src.path(), dest.path())
                .pattern("*.shp")
                .pattern("*.geojson")
                .build()
                .unwrap(),
        )
        .unwrap()
        .run()
        .unwrap();
        assert_eq!(again.total, 1);
        assert_eq!(again.skipped, 1);
    }

    #[test]
    fn test_summary_json_written() {
        let src = assert_fs::TempDir::new().unwrap();
        let dest = assert_fs::TempDir::new().unwrap();
        src.child("y.shp").write_str("y").unwrap();
        let json_path = dest.path().join("summary.json");

        Pipeline::new(
            config(src.path(), dest.path())
                .summary_json(&json_path)
                .build()
                .unwrap(),
        )
        .unwrap()
        .run()
        .unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&json_path).unwrap()).unwrap();
        assert_eq!(value["success"], 1);
        assert_eq!(value["total"], 1);
    }

    #[test]
    fn test_missing_converter_is_fatal() {
        let src = assert_fs::TempDir::new().unwrap();
        let dest = assert_fs::TempDir::new().unwrap();
        src.child("y.shp").write_str("y").unwrap();

        let result = Pipeline::new(
            config(src.path(), dest.path())
                .converter("no-such-ogr2ogr")
                .build()
                .unwrap(),
        );

        assert!(matches!(result, Err(Error::ConverterNotFound { .. })));
        assert!(!dest.child("y.geojson").exists());
    }
}
