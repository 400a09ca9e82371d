use crate::config::{ConversionOptions, OutputFormat};
use crate::error::{Error, Result};
use crate::mirror::{mirrored_dir, resolve_output_dir};
use std::{
    ffi::OsString,
    path::{Path, PathBuf},
};

/// Layer creation option controlling decimal places in GeoJSON output.
const PRECISION_OPTION: &str = "COORDINATE_PRECISION";

/// One token group on the converter's command line.
///
/// Tokens are emitted in the order they are pushed; [`ConversionTask::plan`]
/// is the only place that decides that order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConverterArg {
    /// `-f <driver>`
    Format(OutputFormat),
    /// `-lco KEY=VALUE`
    LayerOption {
        /// Option name
        key: &'static str,
        /// Option value
        value: String,
    },
    /// `-overwrite`
    Overwrite,
    /// `-nlt PROMOTE_TO_MULTI`
    PromoteToMulti,
    /// `-skipfailures`
    SkipFailures,
    /// `-t_srs EPSG:<code>`
    TargetSrs(u32),
    /// Destination dataset (positional)
    Output(PathBuf),
    /// Source dataset (positional)
    Input(PathBuf),
}

impl ConverterArg {
    /// Appends this token group's raw arguments to `out`.
    fn push_to(&self, out: &mut Vec<OsString>) {
        match self {
            Self::Format(format) => {
                out.push("-f".into());
                out.push(format.driver().into());
            }
            Self::LayerOption { key, value } => {
                out.push("-lco".into());
                out.push(format!("{key}={value}").into());
            }
            Self::Overwrite => out.push("-overwrite".into()),
            Self::PromoteToMulti => {
                out.push("-nlt".into());
                out.push("PROMOTE_TO_MULTI".into());
            }
            Self::SkipFailures => out.push("-skipfailures".into()),
            Self::TargetSrs(code) => {
                out.push("-t_srs".into());
                out.push(format!("EPSG:{code}").into());
            }
            Self::Output(path) | Self::Input(path) => out.push(path.as_os_str().to_owned()),
        }
    }
}

/// A planned conversion of one input file.
#[derive(Debug, Clone)]
pub struct ConversionTask {
    /// Source dataset
    pub input: PathBuf,

    /// Where the converted dataset will be written
    pub output: PathBuf,

    /// Ordered converter arguments
    pub args: Vec<ConverterArg>,

    /// False when the output already exists and overwriting is disabled
    pub should_run: bool,
}

impl ConversionTask {
    /// Plans the conversion of `input`, creating its mirrored output directory.
    ///
    /// The existence check behind [`should_run`](Self::should_run) is not
    /// atomic with the later write; outputs are assumed to have a single
    /// writer per run.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is not under `source_root`, has no file
    /// name, or the output directory cannot be created.
    pub(crate) fn plan(
        source_root: &Path,
        dest_root: &Path,
        input: &Path,
        options: ConversionOptions,
    ) -> Result<Self> {
        let output_dir = resolve_output_dir(source_root, dest_root, input)?;
        let output = output_path(&output_dir, input, options.format())?;
        let should_run = options.overwrite || !output.exists();
        let args = build_args(input, &output, options);

        Ok(Self {
            input: input.to_path_buf(),
            output,
            args,
            should_run,
        })
    }

    /// Flattens the typed arguments into the converter's argv (program excluded).
    #[must_use]
    pub fn command_line(&self) -> Vec<OsString> {
        let mut out = Vec::with_capacity(self.args.len() * 2);
        for arg in &self.args {
            arg.push_to(&mut out);
        }
        out
    }
}

/// Computes where `input` will be written without creating anything.
///
/// # Errors
///
/// Returns an error if the input is not under `source_root` or has no file name.
pub(crate) fn planned_output(
    source_root: &Path,
    dest_root: &Path,
    input: &Path,
    format: OutputFormat,
) -> Result<PathBuf> {
    let output_dir = mirrored_dir(source_root, dest_root, input)?;
    output_path(&output_dir, input, format)
}

/// Computes `<output_dir>/<input stem>.<format extension>`.
fn output_path(output_dir: &Path, input: &Path, format: OutputFormat) -> Result<PathBuf> {
    let stem = input.file_stem().ok_or_else(|| {
        Error::config(format!("Input has no file name: {}", input.display()))
    })?;

    let mut name = stem.to_os_string();
    name.push(".");
    name.push(format.extension());

    Ok(output_dir.join(name))
}

/// Builds the ordered argument list for one conversion.
pub(crate) fn build_args(input: &Path, output: &Path, options: ConversionOptions) -> Vec<ConverterArg> {
    let format = options.format();
    let mut args = vec![ConverterArg::Format(format)];

    if format == OutputFormat::GeoJson {
        args.push(ConverterArg::LayerOption {
            key: PRECISION_OPTION,
            value: options.precision.to_string(),
        });
    }

    if options.overwrite {
        args.push(ConverterArg::Overwrite);
    }

    args.push(ConverterArg::PromoteToMulti);
    args.push(ConverterArg::SkipFailures);

    if options.target_crs != 0 {
        args.push(ConverterArg::TargetSrs(options.target_crs));
    }

    args.push(ConverterArg::Output(output.to_path_buf()));
    args.push(ConverterArg::Input(input.to_path_buf()));
    args
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;

    fn strings(args: &[ConverterArg]) -> Vec<String> {
        let mut out = Vec::new();
        for arg in args {
            arg.push_to(&mut out);
        }
        out.into_iter()
            .map(|s| s.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_default_argument_order() {
        let args = build_args(
            Path::new("/src/y.shp"),
            Path::new("/dst/y.geojson"),
            ConversionOptions::default(),
        );

        assert_eq!(
            strings(&args),
            vec![
                "-f",
                "GeoJSON",
                "-lco",
                "COORDINATE_PRECISION=6",
                "-nlt",
                "PROMOTE_TO_MULTI",
                "-skipfailures",
                "-t_srs",
                "EPSG:4326",
                "/dst/y.geojson",
                "/src/y.shp",
            ]
        );
    }

    #[test]
    fn test_overwrite_follows_format() {
        let options = ConversionOptions {
            overwrite: true,
            ..ConversionOptions::default()
        };
        let args = build_args(Path::new("in.shp"), Path::new("out.geojson"), options);

        assert_eq!(args[2], ConverterArg::Overwrite);
        assert_eq!(args[3], ConverterArg::PromoteToMulti);
    }

    #[test]
    fn test_precision_present_only_for_single_document() {
        for precision in [0u8, 6, 15] {
            let options = ConversionOptions {
                precision,
                ..ConversionOptions::default()
            };
            let args = strings(&build_args(Path::new("a.shp"), Path::new("a.geojson"), options));
            let expected = format!("COORDINATE_PRECISION={precision}");
            assert_eq!(args.iter().filter(|a| **a == expected).count(), 1);

            let seq = ConversionOptions {
                sequence: true,
                ..options
            };
            let args = strings(&build_args(Path::new("a.shp"), Path::new("a.geojsonl"), seq));
            assert!(!args.iter().any(|a| a.starts_with("COORDINATE_PRECISION")));
            assert!(!args.iter().any(|a| a == "-lco"));
            assert_eq!(args[0], "-f");
            assert_eq!(args[1], "GeoJSONSeq");
        }
    }

    #[test]
    fn test_reprojection_target() {
        let none = ConversionOptions {
            target_crs: 0,
            ..ConversionOptions::default()
        };
        let args = strings(&build_args(Path::new("a.shp"), Path::new("a.geojson"), none));
        assert!(!args.iter().any(|a| a == "-t_srs"));

        let custom = ConversionOptions {
            target_crs: 3857,
            ..ConversionOptions::default()
        };
        let args = strings(&build_args(Path::new("a.shp"), Path::new("a.geojson"), custom));
        assert_eq!(args.iter().filter(|a| *a == "-t_srs").count(), 1);
        assert!(args.iter().any(|a| a == "EPSG:3857"));
    }

    #[test]
    fn test_positional_paths_come_last() {
        let args = build_args(
            Path::new("in.shp"),
            Path::new("out.geojson"),
            ConversionOptions::default(),
        );
        let n = args.len();

        assert_eq!(args[n - 2], ConverterArg::Output(PathBuf::from("out.geojson")));
        assert_eq!(args[n - 1], ConverterArg::Input(PathBuf::from("in.shp")));
    }

    #[test]
    fn test_plan_mirrors_and_names_output() {
        let src = assert_fs::TempDir::new().unwrap();
        let dest = assert_fs::TempDir::new().unwrap();
        let input = src.child("a/b/x.shp");
        input.touch().unwrap();

        let task =
            ConversionTask::plan(src.path(), dest.path(), input.path(), ConversionOptions::default())
                .unwrap();

        assert_eq!(task.output, dest.path().join("a/b/x.geojson"));
        assert!(task.should_run);
        assert_eq!(task.command_line().last().unwrap(), input.path().as_os_str());
    }

    #[test]
    fn test_plan_sequence_extension() {
        let src = assert_fs::TempDir::new().unwrap();
        let dest = assert_fs::TempDir::new().unwrap();
        let input = src.child("y.shp");
        input.touch().unwrap();
        let options = ConversionOptions {
            sequence: true,
            ..ConversionOptions::default()
        };

        let task = ConversionTask::plan(src.path(), dest.path(), input.path(), options).unwrap();

        assert_eq!(task.output, dest.path().join("y.geojsonl"));
    }

    #[test]
    fn test_planned_output_ignores_input_extension() {
        let src = assert_fs::TempDir::new().unwrap();
        let dest = assert_fs::TempDir::new().unwrap();

        let shp = planned_output(src.path(), dest.path(), &src.path().join("d/roads.shp"), OutputFormat::GeoJson)
            .unwrap();
        let gpkg = planned_output(src.path(), dest.path(), &src.path().join("d/roads.gpkg"), OutputFormat::GeoJson)
            .unwrap();

        assert_eq!(shp, dest.path().join("d/roads.geojson"));
        assert_eq!(shp, gpkg);
        assert!(!dest.child("d").exists());
    }

    #[test]
    fn test_existing_output_is_skipped_without_overwrite() {
        let src = assert_fs::TempDir::new().unwrap();
        let dest = assert_fs::TempDir::new().unwrap();
        let input = src.child("y.shp");
        input.touch().unwrap();
        dest.child("y.geojson").write_str("{}").unwrap();

        let task =
            ConversionTask::plan(src.path(), dest.path(), input.path(), ConversionOptions::default())
                .unwrap();
        assert!(!task.should_run);

        let options = ConversionOptions {
            overwrite: true,
            ..ConversionOptions::default()
        };
        let task = ConversionTask::plan(src.path(), dest.path(), input.path(), options).unwrap();
        assert!(task.should_run);
    }
}
