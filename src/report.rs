use crate::RunReport;
use anyhow::Result;
use std::fmt;
use std::io::Write;
use std::str::FromStr;

#[derive(Debug, Clone, Copy)]
pub enum OutputFormat {
    Text,
    Json,
}

impl FromStr for OutputFormat {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("unknown format: {}", s)),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum ColorMode {
    Auto,
    Always,
    Never,
}

fn use_color(mode: ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => std::io::IsTerminal::is_terminal(&std::io::stderr()),
    }
}

struct StylePalette {
    error: &'static str,
    warn: &'static str,
    stage: &'static str,
    path: &'static str,
    dim: &'static str,
    complete: &'static str,
    incomplete: &'static str,
    reset: &'static str,
}

const COLORED: StylePalette = StylePalette {
    error: "\x1b[1;31m",      // bold red
    warn: "\x1b[1;33m",       // bold yellow
    stage: "\x1b[1;34m",      // bold blue
    path: "\x1b[36m",         // cyan
    dim: "\x1b[2m",           // dim
    complete: "\x1b[1;32m",   // bold green
    incomplete: "\x1b[1;31m", // bold red
    reset: "\x1b[0m",
};

const PLAIN: StylePalette = StylePalette {
    error: "",
    warn: "",
    stage: "",
    path: "",
    dim: "",
    complete: "",
    incomplete: "",
    reset: "",
};

fn palette(color_mode: ColorMode) -> &'static StylePalette {
    if use_color(color_mode) {
        &COLORED
    } else {
        &PLAIN
    }
}

/// Announce a unit of work on stderr.
pub fn stage(name: &str, color_mode: ColorMode) {
    let s = palette(color_mode);
    eprintln!("{}==>{} {}", s.stage, s.reset, name);
}

pub fn print_text(report: &RunReport, verbose: bool, color_mode: ColorMode) {
    let s = palette(color_mode);
    let mut stderr = std::io::stderr().lock();

    let _ = writeln!(stderr);
    for bundle in &report.bundles {
        if let Some(error) = &bundle.error {
            let _ = writeln!(
                stderr,
                "{}ERROR{} {}{}{}: {}",
                s.error, s.reset, s.path, bundle.bundle, s.reset, error
            );
            continue;
        }

        let _ = writeln!(
            stderr,
            "{}{}{}: {} pass(es), {} rewrite(s), {} file(s) copied",
            s.path,
            bundle.bundle,
            s.reset,
            bundle.passes,
            bundle.rewritten_binaries,
            bundle.copied.len(),
        );
        if verbose {
            for copied in &bundle.copied {
                let _ = writeln!(stderr, "  {}copied{} {}", s.dim, s.reset, copied);
            }
        }
    }

    if report.bundles.iter().any(|b| !b.unresolved.is_empty()) {
        let _ = writeln!(
            stderr,
            "{}Unresolved external references remain:{}",
            s.warn, s.reset
        );
        for bundle in &report.bundles {
            for dep in &bundle.unresolved {
                let _ = writeln!(stderr, "{}: {}", bundle.bundle, dep);
            }
        }
    }

    let (verdict, style) = if report.is_clean() {
        ("COMPLETE", s.complete)
    } else {
        ("INCOMPLETE", s.incomplete)
    };
    let _ = writeln!(stderr, "Result: {style}{verdict}{reset}", reset = s.reset);
}

pub fn print_json(report: &RunReport) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    println!("{}", json);
    Ok(())
}
