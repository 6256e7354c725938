//! inkframe command-line tool
//!
//! Loads saved drawings headlessly:
//!
//! ```text
//! inkframe validate <drawing.json>
//! inkframe export <drawing.json> <out.svg|out.png> [--background #rrggbb]
//! ```

use inkframe_core::shapes::SerializableColor;
use inkframe_core::{to_png, to_svg, DrawingDocument, ExportError, StorageError};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use thiserror::Error;

const USAGE: &str = "usage:
  inkframe validate <drawing.json>
  inkframe export <drawing.json> <out.svg|out.png> [--background #rrggbb]";

#[derive(Debug, Error)]
enum CliError {
    #[error("{0}\n{USAGE}")]
    Usage(String),
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid drawing: {0}")]
    Drawing(#[from] StorageError),
    #[error(transparent)]
    Export(#[from] ExportError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Svg,
    Png,
}

#[derive(Debug, PartialEq)]
enum Command {
    Validate {
        input: PathBuf,
    },
    Export {
        input: PathBuf,
        output: PathBuf,
        format: Format,
        background: SerializableColor,
    },
}

fn format_for(path: &Path) -> Result<Format, CliError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("svg") => Ok(Format::Svg),
        Some("png") => Ok(Format::Png),
        _ => Err(CliError::Usage(format!(
            "cannot infer export format from {}",
            path.display()
        ))),
    }
}

fn parse_args(args: &[String]) -> Result<Command, CliError> {
    let mut positional = Vec::new();
    let mut background = SerializableColor::white();
    let mut i = 0;
    while i < args.len() {
        if args[i] == "--background" {
            let value = args
                .get(i + 1)
                .ok_or_else(|| CliError::Usage("--background needs a color".into()))?;
            background = SerializableColor::from_hex(value)
                .ok_or_else(|| CliError::Usage(format!("invalid color {value}")))?;
            i += 2;
        } else {
            positional.push(args[i].as_str());
            i += 1;
        }
    }

    match positional.as_slice() {
        ["validate", input] => Ok(Command::Validate {
            input: PathBuf::from(input),
        }),
        ["export", input, output] => {
            let output = PathBuf::from(output);
            Ok(Command::Export {
                input: PathBuf::from(input),
                format: format_for(&output)?,
                output,
                background,
            })
        }
        [] => Err(CliError::Usage("missing command".into())),
        [other, ..] => Err(CliError::Usage(format!("unexpected arguments starting at {other}"))),
    }
}

fn load(path: &Path) -> Result<DrawingDocument, CliError> {
    let json = std::fs::read_to_string(path).map_err(|source| CliError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let doc = DrawingDocument::from_json(&json)?;
    log::info!(
        "loaded {} ({} shapes, version {})",
        doc.name,
        doc.shapes.len(),
        doc.version
    );
    Ok(doc)
}

fn run(command: Command) -> Result<(), CliError> {
    match command {
        Command::Validate { input } => {
            let doc = load(&input)?;
            println!("{}: ok, {} shapes", input.display(), doc.shapes.len());
        }
        Command::Export {
            input,
            output,
            format,
            background,
        } => {
            let doc = load(&input)?;
            let bytes = match format {
                Format::Svg => to_svg(&doc.shapes, doc.canvas_width, doc.canvas_height).into_bytes(),
                Format::Png => to_png(&doc.shapes, doc.canvas_width, doc.canvas_height, background)?,
            };
            std::fs::write(&output, &bytes).map_err(|source| CliError::Io {
                path: output.clone(),
                source,
            })?;
            log::info!("wrote {} bytes to {}", bytes.len(), output.display());
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    match parse_args(&args).and_then(run) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            eprintln!("inkframe: {e}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_export() {
        let cmd = parse_args(&args(&["export", "a.json", "out.PNG", "--background", "#000000"])).unwrap();
        assert_eq!(
            cmd,
            Command::Export {
                input: PathBuf::from("a.json"),
                output: PathBuf::from("out.PNG"),
                format: Format::Png,
                background: SerializableColor::black(),
            }
        );
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(parse_args(&[]), Err(CliError::Usage(_))));
        assert!(matches!(
            parse_args(&args(&["export", "a.json", "out.bmp"])),
            Err(CliError::Usage(_))
        ));
        assert!(matches!(
            parse_args(&args(&["validate", "a.json", "--background"])),
            Err(CliError::Usage(_))
        ));
        assert!(matches!(
            parse_args(&args(&["frobnicate"])),
            Err(CliError::Usage(_))
        ));
    }

    #[test]
    fn test_missing_input_is_io_error() {
        let cmd = Command::Validate {
            input: PathBuf::from("/nonexistent/drawing.json"),
        };
        assert!(matches!(run(cmd), Err(CliError::Io { .. })));
    }
}
