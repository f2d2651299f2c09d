//! Command-line interface for the canopy pipeline.

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::{FootprintMethod, PipelineConfig, SegmentationConfig};

#[derive(Parser)]
#[command(name = "canopy-pipeline")]
#[command(about = "Forest plot point cloud processing pipeline", version)]
pub struct Cli {
    /// Path to YAML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Segment a point file into tree crowns (writes <stem>_crown_labels.csv)
    Segment {
        /// Input CSV, PLY or LAS/LAZ point file
        input: PathBuf,
        /// Output directory (defaults to the input's directory)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
        /// Planar neighborhood radius
        #[arg(long)]
        eps: Option<f64>,
        /// Minimum neighbors (self included) for a core point
        #[arg(long)]
        min_samples: Option<usize>,
        /// Maximum points to segment
        #[arg(long)]
        max_points: Option<usize>,
        /// Also write a PLY colored by crown
        #[arg(long)]
        ply: bool,
    },

    /// Rasterize a point file into a canopy height model CSV
    Chm {
        /// Input CSV, PLY or LAS/LAZ point file
        input: PathBuf,
        /// Output CSV (defaults to <stem>_chm.csv next to the input)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Raster cell size
        #[arg(long)]
        cell_size: Option<f64>,
        /// Also render the CHM as a PNG heatmap
        #[arg(long)]
        png: bool,
    },

    /// Run the full pipeline and write all per-tree artifacts
    Features {
        /// Input CSV, PLY or LAS/LAZ point file
        input: PathBuf,
        /// Output directory (defaults to output.artifacts_dir)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
        /// Planar neighborhood radius
        #[arg(long)]
        eps: Option<f64>,
        /// Minimum neighbors (self included) for a core point
        #[arg(long)]
        min_samples: Option<usize>,
        /// Raster cell size
        #[arg(long)]
        cell_size: Option<f64>,
        /// Footprint estimator (convex_hull or bounding_box)
        #[arg(long)]
        footprint: Option<FootprintMethod>,
    },

    /// Generate a seeded synthetic plot and run the full pipeline on it
    Demo {
        /// Output directory (defaults to output.artifacts_dir)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
        /// Number of synthetic crowns
        #[arg(long, default_value_t = 20)]
        clusters: usize,
        /// Returns per crown
        #[arg(long, default_value_t = 80)]
        points_per_cluster: usize,
        /// Generator seed
        #[arg(long, default_value_t = 123)]
        seed: u64,
        /// Planar neighborhood radius
        #[arg(long)]
        eps: Option<f64>,
        /// Minimum neighbors (self included) for a core point
        #[arg(long)]
        min_samples: Option<usize>,
    },

    /// Render a labels CSV as a top-down PNG colored by crown
    Visualize {
        /// Labels CSV written by `segment` (x,y,z,label)
        labels_csv: PathBuf,
        /// Output PNG file path (defaults to same name with .png extension)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Maximum number of points to plot
        #[arg(long, default_value_t = 1_000_000)]
        max_points: usize,
    },

    /// Summarize a tree records JSON file
    Summary {
        /// Tree records JSON written by `features` or `demo`
        features_json: PathBuf,
    },
}

/// Create a spinner for indeterminate operations
fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

/// Print a summary box
fn print_summary(title: &str, items: &[(&str, String)]) {
    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║ {:<60} ║", title);
    println!("╠══════════════════════════════════════════════════════════════╣");
    for (key, value) in items {
        let display_value = if value.chars().count() > 38 {
            let head: String = value.chars().take(35).collect();
            format!("{}...", head)
        } else {
            value.clone()
        };
        println!("║ {:<20}: {:<38} ║", key, display_value);
    }
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();
}

/// Log the failure and exit with status 1.
fn fail(spinner: Option<&ProgressBar>, what: &str, e: impl std::fmt::Display) -> ! {
    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }
    error!("{} failed: {:#}", what, e);
    std::process::exit(1);
}

fn stem_of(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "plot".to_string())
}

pub fn run() {
    let cli = Cli::parse();

    // Initialize logging based on verbosity (must come first)
    env_logger::Builder::new()
        .filter_level(match cli.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .format_timestamp_secs()
        .init();

    // Load config
    let config = match &cli.config {
        Some(path) => match PipelineConfig::from_yaml(path) {
            Ok(cfg) => {
                info!("Loaded config from: {}", path.display());
                cfg
            }
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}, using defaults",
                    path.display(),
                    e
                );
                PipelineConfig::default()
            }
        },
        None => PipelineConfig::default(),
    };

    // Dispatch to subcommands
    match cli.command {
        Commands::Segment {
            input,
            output_dir,
            eps,
            min_samples,
            max_points,
            ply,
        } => {
            let seg = SegmentationConfig {
                eps: eps.unwrap_or(config.segmentation.eps),
                min_samples: min_samples.unwrap_or(config.segmentation.min_samples),
                max_points: max_points.unwrap_or(config.segmentation.max_points),
                seed: config.segmentation.seed,
            };
            cmd_segment(&input, output_dir.as_deref(), &seg, ply, &config);
        }
        Commands::Chm {
            input,
            output,
            cell_size,
            png,
        } => {
            let cell_size = cell_size.unwrap_or(config.chm.cell_size);
            cmd_chm(&input, output, cell_size, png, &config);
        }
        Commands::Features {
            input,
            output_dir,
            eps,
            min_samples,
            cell_size,
            footprint,
        } => {
            let mut config = config;
            if let Some(v) = eps {
                config.segmentation.eps = v;
            }
            if let Some(v) = min_samples {
                config.segmentation.min_samples = v;
            }
            if let Some(v) = cell_size {
                config.chm.cell_size = v;
            }
            if let Some(v) = footprint {
                config.features.footprint = v;
            }
            cmd_features(&input, output_dir.as_deref(), &config);
        }
        Commands::Demo {
            output_dir,
            clusters,
            points_per_cluster,
            seed,
            eps,
            min_samples,
        } => {
            let mut config = config;
            if let Some(v) = eps {
                config.segmentation.eps = v;
            }
            if let Some(v) = min_samples {
                config.segmentation.min_samples = v;
            }
            cmd_demo(output_dir, clusters, points_per_cluster, seed, &config);
        }
        Commands::Visualize {
            labels_csv,
            output,
            max_points,
        } => {
            cmd_visualize(&labels_csv, output, max_points);
        }
        Commands::Summary { features_json } => {
            cmd_summary(&features_json);
        }
    }
}

fn cmd_segment(
    input: &Path,
    output_dir: Option<&Path>,
    seg: &SegmentationConfig,
    ply: bool,
    config: &PipelineConfig,
) {
    use crate::core::loaders::PointCloud;
    use crate::core::writers::write_ply;
    use crate::processors::segmentation::{count_clusters, noise_count, process_segmentation};
    use crate::visualization::label_color;

    let start = Instant::now();

    println!("Running crown segmentation...");
    println!("Input: {}", input.display());
    println!("Parameters:");
    println!("  eps: {}", seg.eps);
    println!("  min_samples: {}", seg.min_samples);
    println!("  max_points: {}", seg.max_points);

    let spinner = create_spinner("Segmenting point cloud...");

    let (csv_path, segmented) = match process_segmentation(input, output_dir, seg, &config.input)
    {
        Ok(result) => result,
        Err(e) => fail(Some(&spinner), "Segmentation", e),
    };

    let mut items = vec![
        ("Input file", input.display().to_string()),
        ("Output CSV", csv_path.display().to_string()),
        ("Points segmented", segmented.points.len().to_string()),
        ("Crowns found", count_clusters(&segmented.labels).to_string()),
        ("Noise points", noise_count(&segmented.labels).to_string()),
        ("Stride", segmented.stride.to_string()),
    ];

    if ply {
        spinner.set_message("Writing colored PLY...");
        let ply_path = csv_path.with_extension("ply");
        let mut cloud = PointCloud::from_points(&segmented.points);
        cloud.colors = Some(segmented.labels.iter().map(|&l| label_color(l)).collect());
        if let Err(e) = write_ply(&ply_path, &cloud) {
            fail(Some(&spinner), "Writing PLY", e);
        }
        items.push(("Output PLY", ply_path.display().to_string()));
    }

    spinner.finish_and_clear();
    items.push(("Duration", format!("{:.2?}", start.elapsed())));
    print_summary("Segmentation Complete", &items);
}

fn cmd_chm(
    input: &Path,
    output: Option<PathBuf>,
    cell_size: f64,
    png: bool,
    config: &PipelineConfig,
) {
    use crate::core::loaders::load_points;
    use crate::core::writers::write_chm_csv;
    use crate::processors::chm::compute_chm;
    use crate::visualization::plot_chm;

    let start = Instant::now();

    let output_path = output.unwrap_or_else(|| {
        input.with_file_name(format!("{}_chm.csv", stem_of(input)))
    });

    println!("Computing canopy height model...");
    println!("Input: {}", input.display());
    println!("Cell size: {}", cell_size);

    let spinner = create_spinner("Loading point file...");

    let cloud = match load_points(input, &config.input) {
        Ok(c) => c,
        Err(e) => fail(Some(&spinner), "Loading", e),
    };

    spinner.set_message("Rasterizing...");
    let grid = match compute_chm(&cloud.to_points(), cell_size) {
        Ok(g) => g,
        Err(e) => fail(Some(&spinner), "CHM", e),
    };

    if let Err(e) = write_chm_csv(&output_path, &grid) {
        fail(Some(&spinner), "Writing CHM", e);
    }

    let mut items = vec![
        ("Input file", input.display().to_string()),
        ("Output CSV", output_path.display().to_string()),
        ("Grid", format!("{} x {}", grid.nx(), grid.ny())),
        ("Covered cells", grid.covered_cells().to_string()),
        ("Max height", format!("{:.2}", grid.max_height())),
    ];

    if png {
        spinner.set_message("Rendering heatmap...");
        let png_path = output_path.with_extension("png");
        if let Err(e) = plot_chm(&png_path, &grid) {
            fail(Some(&spinner), "Rendering CHM", e);
        }
        items.push(("Output PNG", png_path.display().to_string()));
    }

    spinner.finish_and_clear();
    items.push(("Duration", format!("{:.2?}", start.elapsed())));
    print_summary("CHM Complete", &items);
}

fn cmd_features(input: &Path, output_dir: Option<&Path>, config: &PipelineConfig) {
    use crate::processors::pipeline::process_plot;

    let start = Instant::now();

    if let Err(e) = config.validate() {
        fail(None, "Configuration", e);
    }

    println!("Running plot analysis...");
    println!("Input: {}", input.display());

    let spinner = create_spinner("Segmenting and extracting tree features...");

    let (paths, analysis) = match process_plot(input, output_dir, config) {
        Ok(result) => result,
        Err(e) => fail(Some(&spinner), "Plot analysis", e),
    };

    spinner.finish_and_clear();

    let s = &analysis.summary;
    print_summary(
        "Plot Analysis Complete",
        &[
            ("Input file", input.display().to_string()),
            ("Trees", s.num_trees.to_string()),
            ("Avg height", format!("{:.2}", s.avg_height)),
            ("Max height", format!("{:.2}", s.max_height)),
            ("Avg footprint", format!("{:.2}", s.avg_footprint)),
            ("Tree records", paths.features_json.display().to_string()),
            ("GeoJSON", paths.geojson.display().to_string()),
            ("CHM", paths.chm_csv.display().to_string()),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );
}

fn cmd_demo(
    output_dir: Option<PathBuf>,
    clusters: usize,
    points_per_cluster: usize,
    seed: u64,
    config: &PipelineConfig,
) {
    use crate::core::loaders::PointCloud;
    use crate::core::writers::write_ply;
    use crate::processors::pipeline::{analyze_plot, write_artifacts};
    use crate::processors::summary::narrative;
    use crate::processors::synthetic::{synthetic_plot, SyntheticPlotConfig};
    use crate::visualization::{plot_chm, plot_labeled_points};

    let start = Instant::now();

    if let Err(e) = config.validate() {
        fail(None, "Configuration", e);
    }

    let out_dir = output_dir.unwrap_or_else(|| config.output.artifacts_dir.clone());
    let plot_config = SyntheticPlotConfig {
        clusters,
        points_per_cluster,
        seed,
        ..SyntheticPlotConfig::default()
    };

    println!("Running demo on a synthetic plot...");
    println!("Crowns: {} x {} points (seed {})", clusters, points_per_cluster, seed);
    println!("Output directory: {}", out_dir.display());

    let spinner = create_spinner("Generating synthetic plot...");
    let points = synthetic_plot(&plot_config);

    let points_path = out_dir.join("demo_points.ply");
    if let Err(e) = write_ply(&points_path, &PointCloud::from_points(&points)) {
        fail(Some(&spinner), "Writing demo points", e);
    }

    spinner.set_message("Analyzing plot...");
    let analysis = match analyze_plot(&points, config) {
        Ok(a) => a,
        Err(e) => fail(Some(&spinner), "Plot analysis", e),
    };

    let paths = match write_artifacts(&analysis, &out_dir, "demo") {
        Ok(p) => p,
        Err(e) => fail(Some(&spinner), "Writing artifacts", e),
    };

    spinner.set_message("Rendering images...");
    let crowns_png = out_dir.join("demo_crowns.png");
    let chm_png = out_dir.join("demo_chm.png");
    // rendering failures only warn
    if let Err(e) = plot_labeled_points(&crowns_png, &analysis.points, &analysis.labels, 1_000_000)
    {
        warn!("Crown plot skipped: {}", e);
    }
    if let Err(e) = plot_chm(&chm_png, &analysis.chm) {
        warn!("CHM plot skipped: {}", e);
    }

    spinner.finish_and_clear();

    let s = &analysis.summary;
    print_summary(
        "Demo Complete",
        &[
            ("Points", points.len().to_string()),
            ("Trees", s.num_trees.to_string()),
            ("Avg height", format!("{:.2}", s.avg_height)),
            ("Avg footprint", format!("{:.2}", s.avg_footprint)),
            ("Tree records", paths.features_json.display().to_string()),
            ("GeoJSON", paths.geojson.display().to_string()),
            ("Crown plot", crowns_png.display().to_string()),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );
    println!("{}", narrative(s));
}

fn cmd_visualize(labels_csv: &Path, output: Option<PathBuf>, max_points: usize) {
    use crate::core::loaders::load_labels_csv;
    use crate::processors::segmentation::count_clusters;
    use crate::visualization::plot_labeled_points;

    let start = Instant::now();

    let output_path = output.unwrap_or_else(|| labels_csv.with_extension("png"));

    println!("Visualizing segmented plot...");
    println!("Input: {}", labels_csv.display());
    println!("Output: {}", output_path.display());

    let spinner = create_spinner("Loading labels CSV...");

    let (points, labels) = match load_labels_csv(labels_csv) {
        Ok(r) => r,
        Err(e) => fail(Some(&spinner), "Loading labels", e),
    };

    spinner.set_message("Generating plot...");
    if let Err(e) = plot_labeled_points(&output_path, &points, &labels, max_points) {
        fail(Some(&spinner), "Visualization", e);
    }

    spinner.finish_and_clear();

    print_summary(
        "Visualization Complete",
        &[
            ("Input file", labels_csv.display().to_string()),
            ("Output PNG", output_path.display().to_string()),
            ("Points", points.len().to_string()),
            ("Crowns", count_clusters(&labels).to_string()),
            ("Max points plotted", max_points.to_string()),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );
}

fn cmd_summary(features_json: &Path) {
    use crate::core::loaders::load_features_json;
    use crate::processors::summary::{narrative, summarize};

    let features = match load_features_json(features_json) {
        Ok(f) => f,
        Err(e) => fail(None, "Loading tree records", e),
    };

    let s = summarize(&features);
    print_summary(
        "Plot Summary",
        &[
            ("Input file", features_json.display().to_string()),
            ("Trees", s.num_trees.to_string()),
            ("Avg height", format!("{:.2}", s.avg_height)),
            ("Max height", format!("{:.2}", s.max_height)),
            ("Avg footprint", format!("{:.2}", s.avg_footprint)),
            ("Total points", s.total_points.to_string()),
            ("Degenerate crowns", s.degenerate_trees.to_string()),
        ],
    );
    println!("{}", narrative(&s));
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_features_overrides() {
        let cli = Cli::try_parse_from([
            "canopy-pipeline",
            "-vv",
            "features",
            "plot.csv",
            "--eps",
            "1.5",
            "--footprint",
            "bounding_box",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Features {
                input,
                eps,
                footprint,
                min_samples,
                ..
            } => {
                assert_eq!(input, PathBuf::from("plot.csv"));
                assert_eq!(eps, Some(1.5));
                assert_eq!(footprint, Some(FootprintMethod::BoundingBox));
                assert_eq!(min_samples, None);
            }
            _ => panic!("Expected features subcommand"),
        }
    }

    #[test]
    fn test_parse_demo_defaults() {
        let cli = Cli::try_parse_from(["canopy-pipeline", "demo"]).unwrap();
        match cli.command {
            Commands::Demo {
                clusters,
                points_per_cluster,
                seed,
                output_dir,
                eps,
                min_samples,
            } => {
                assert_eq!((clusters, points_per_cluster, seed), (20, 80, 123));
                assert!(output_dir.is_none());
                assert_eq!((eps, min_samples), (None, None));
            }
            _ => panic!("Expected demo subcommand"),
        }
    }

    #[test]
    fn test_parse_demo_segmentation_overrides() {
        let cli = Cli::try_parse_from([
            "canopy-pipeline",
            "demo",
            "--eps",
            "2.5",
            "--min-samples",
            "8",
            "--seed",
            "7",
        ])
        .unwrap();

        match cli.command {
            Commands::Demo {
                eps,
                min_samples,
                seed,
                ..
            } => {
                assert_eq!(eps, Some(2.5));
                assert_eq!(min_samples, Some(8));
                assert_eq!(seed, 7);
            }
            _ => panic!("Expected demo subcommand"),
        }
    }

    #[test]
    fn test_stem_of() {
        assert_eq!(stem_of(Path::new("/data/stand_04.ply")), "stand_04");
    }
}
