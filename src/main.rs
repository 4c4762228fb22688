use anyhow::Result;
use clap::builder::styling::{AnsiColor, Effects, Styles};
use clap::{ColorChoice, Parser, ValueHint};
use std::path::PathBuf;
use std::process;

use bundlefix::fallback::{FallbackConfig, FallbackEntry};
use bundlefix::fixpoint::{DEFAULT_LIBRARY_DIR, DEFAULT_MAX_PASSES};
use bundlefix::{process_bundle, report, FixOptions, NativeTool, RunReport};

const STYLES: Styles = Styles::styled()
    .header(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Cyan.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());

#[derive(Parser, Debug)]
#[command(
    name = "bundlefix",
    version,
    about = "Make every Mach-O binary in a .app bundle load its libraries from inside the bundle",
    long_about = "bundlefix rewrites the install names recorded in every Mach-O \
                  executable and library of a macOS .app bundle so that they are \
                  relative to the loading binary (@loader_path) instead of absolute \
                  paths on the build machine.\n\n\
                  Libraries referenced from outside the bundle are copied into \
                  Contents/Frameworks, install ids are made self-relative, and rpaths \
                  under developer prefixes such as /usr/local are removed. Newly \
                  copied libraries are processed in turn until nothing changes.",
    after_long_help = "\x1b[1;32mExamples:\x1b[0m\n  \
                       Fix a bundle in place:\n    \
                       $ bundlefix build/MyApp.app\n\n  \
                       Supply a donor for a framework that is no longer at its build path:\n    \
                       $ bundlefix build/MyApp.app \\\n      \
                              --fallback QtHttpServer=/opt/qt/lib/QtHttpServer.framework\n\n  \
                       JSON output for CI:\n    \
                       $ bundlefix build/MyApp.app --format json",
    styles = STYLES,
)]
struct Cli {
    #[arg(
        required = true,
        value_name = "BUNDLE",
        value_hint = ValueHint::DirPath,
        help = "Path(s) to .app bundles to fix in place",
    )]
    bundles: Vec<PathBuf>,

    #[arg(
        long = "fallback",
        value_name = "NAME=PATH",
        help = "Donor framework bundle to copy when a framework's build path is gone",
        long_help = "Donor framework bundle to copy when a framework's build path is \
                     gone. NAME is the framework name, with or without the .framework \
                     suffix; PATH is the donor .framework directory. May be repeated; \
                     overrides entries from --fallback-config.",
        display_order = 1
    )]
    fallbacks: Vec<FallbackEntry>,

    #[arg(
        long,
        value_name = "FILE",
        value_hint = ValueHint::FilePath,
        help = "JSON file of fallback donors: {\"frameworks\": {NAME: PATH}}",
        display_order = 2
    )]
    fallback_config: Option<PathBuf>,

    #[arg(
        long,
        value_name = "DIR",
        default_value = DEFAULT_LIBRARY_DIR,
        help = "Directory under Contents/ that receives copied libraries",
        display_order = 3
    )]
    library_dir: PathBuf,

    #[arg(
        long = "strip-rpath-prefix",
        value_name = "PREFIX",
        help = "Additional rpath prefix to delete (besides /usr/local and /opt/local)",
        display_order = 4
    )]
    strip_rpath_prefixes: Vec<String>,

    #[arg(
        long,
        value_name = "N",
        default_value_t = DEFAULT_MAX_PASSES,
        help = "Give up on a bundle that still changes after N passes",
        display_order = 5
    )]
    max_passes: usize,

    #[arg(
        long,
        short,
        help = "Enable verbose output",
        long_help = "Enable verbose output. Logs every copy and rewrite and lists \
                     copied files in the summary.",
        display_order = 6
    )]
    verbose: bool,

    #[arg(
        long,
        default_value = "text",
        help = "Output format",
        display_order = 7
    )]
    format: report::OutputFormat,

    #[arg(
        long,
        value_name = "WHEN",
        default_value = "auto",
        help = "Control colored output",
        long_help = "Control colored output. 'auto' enables color when stderr \
                     is a terminal, 'always' forces color on, 'never' disables it.",
        display_order = 8
    )]
    color: ColorChoice,
}

impl Cli {
    fn options(&self) -> Result<FixOptions> {
        let mut fallbacks = match &self.fallback_config {
            Some(path) => FallbackConfig::from_json_file(path)?,
            None => FallbackConfig::default(),
        };
        fallbacks.extend(self.fallbacks.iter().cloned());

        let mut options = FixOptions {
            library_dir: self.library_dir.clone(),
            fallbacks,
            max_passes: self.max_passes,
            ..FixOptions::default()
        };
        options
            .stale_rpath_prefixes
            .extend(self.strip_rpath_prefixes.iter().cloned());
        options.validate()?;
        Ok(options)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let default_level = if cli.verbose { "info" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let color_choice = match cli.color {
        ColorChoice::Auto => report::ColorMode::Auto,
        ColorChoice::Always => report::ColorMode::Always,
        ColorChoice::Never => report::ColorMode::Never,
    };

    let options = cli.options()?;
    let tool = NativeTool;

    let mut run = RunReport::default();
    for bundle in &cli.bundles {
        report::stage(
            &format!("Processing {}", bundle.display()),
            color_choice,
        );
        run.bundles.push(process_bundle(&tool, bundle, &options)?);
    }

    match cli.format {
        report::OutputFormat::Text => report::print_text(&run, cli.verbose, color_choice),
        report::OutputFormat::Json => report::print_json(&run)?,
    }

    process::exit(run.exit_code());
}
