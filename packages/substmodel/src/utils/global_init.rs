use color_eyre::owo_colors::{OwoColorize, Style};
use env_logger::Env;
use log::{debug, Level, LevelFilter, Record};
use smart_default::SmartDefault;
use std::io::Write;
use std::path::Path;

/// Process-wide diagnostics settings for programs built on this crate
#[derive(Copy, Clone, Debug, PartialEq, Eq, SmartDefault)]
pub struct InitOptions {
  /// Verbosity of log messages. `RUST_LOG`, when set, takes precedence.
  #[default(LevelFilter::Warn)]
  pub log_level: LevelFilter,

  /// Whether log lines and error reports are colored
  #[default = true]
  pub color: bool,
}

/// Installs the error report hook and the logger.
///
/// Call it once, early in `main()` of a program that uses this crate: model construction failures are then printed
/// with their full context chain and with frames of the standard library and of the thread pool hidden, and
/// warnings of the transition matrix cache become visible. Only the first call has an effect.
pub fn global_init(options: &InitOptions) {
  let theme = if options.color {
    color_eyre::config::Theme::dark()
      .dependency_code(Style::new().dimmed())
      .file(Style::new().green())
      .line_number(Style::new().yellow())
      .panic_message(Style::new().bright_red().bold())
      .hidden_frames(Style::new().dimmed())
      .code_hash(Style::new().hidden())
  } else {
    color_eyre::config::Theme::new()
  };

  let hook = color_eyre::config::HookBuilder::default()
    .theme(theme)
    .panic_section(format!(
      "If you think it's a bug, consider reporting at: '{}/issues'",
      env!("CARGO_PKG_REPOSITORY"),
    ))
    .add_frame_filter(Box::new(|frames| {
      frames.retain(|frame| !is_hidden_frame(frame.name.as_deref(), frame.filename.as_deref()));
    }))
    .install();

  let color = options.color;
  let logger = env_logger::Builder::new()
    .filter_level(options.log_level)
    .parse_env(Env::default())
    .format(move |buf, record| {
      let date = buf.timestamp_millis().to_string();
      writeln!(buf, "{}", format_log_line(&date, record, color))
    })
    .try_init();

  if hook.is_err() || logger.is_err() {
    debug!("Diagnostics were initialized before. Keeping the existing error hook and logger.");
  }
}

/// One log line: `<date> [<level letter>] <file>:<line>: <message>`
fn format_log_line(date: &str, record: &Record, color: bool) -> String {
  let paint = |text: &str, style: Style| {
    if color {
      text.style(style).to_string()
    } else {
      text.to_owned()
    }
  };

  let level_style = match record.level() {
    Level::Error => Style::new().red(),
    Level::Warn => Style::new().yellow(),
    Level::Info => Style::new().cyan().dimmed(),
    Level::Debug => Style::new().green().dimmed(),
    Level::Trace => Style::new().dimmed(),
  };
  let mut level = record.level().to_string();
  level.truncate(1);

  let file = record
    .file()
    .and_then(|file| Path::new(file).file_name())
    .map(|file| file.to_string_lossy().to_string());
  let file_line = match (file, record.line()) {
    (Some(file), None) => format!("{file}:"),
    (Some(file), Some(line)) => format!("{file}:{line}:"),
    _ => String::new(),
  };

  format!(
    "{} {}{}{} {} {}",
    paint(date, Style::new().dimmed()),
    paint("[", Style::new().dimmed()),
    paint(&level, level_style),
    paint("]", Style::new().dimmed()),
    paint(&file_line, Style::new().dimmed()),
    record.args()
  )
}

/// Whether a backtrace frame belongs to the standard library or to a dependency rather than to user code
fn is_hidden_frame(name: Option<&str>, filename: Option<&Path>) -> bool {
  let hidden_name = name.map_or(true, |name| {
    HIDDEN_CRATE_NAME_PREFIXES
      .iter()
      .any(|&prefix| name.starts_with(prefix) || name.starts_with(&format!("<{prefix}")))
  });

  let hidden_file = filename.map_or(false, |filename| {
    HIDDEN_CRATE_PATH_PREFIXES
      .iter()
      .any(|&prefix| filename.starts_with(prefix))
  });

  hidden_name || hidden_file
}

const HIDDEN_CRATE_NAME_PREFIXES: &[&str] = &[
  "__rust_try",
  "alloc::",
  "color_eyre::",
  "core::",
  "eyre::",
  "ndarray::",
  "rayon::",
  "rayon_core::",
  "rustc::",
  "std::",
];

const HIDDEN_CRATE_PATH_PREFIXES: &[&str] = &["/rustc/"];
