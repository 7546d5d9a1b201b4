//! OS collaborators: window lookup and capture, the OCR engine, and reply
//! injection. The desktop implementations drive macOS through `osascript`,
//! `screencapture` and `pbcopy`; the OCR engine is any external program that
//! prints PaddleOCR-shaped JSON.

use anyhow::{anyhow, bail, Context, Result};
use image::{ImageFormat, RgbaImage};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::Write;
use std::process::{Command, Stdio};

use crate::error::WatchError;
use crate::models::{OcrFragment, Point, Quad};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowBounds {
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowInfo {
    pub title: String,
    pub bounds: WindowBounds,
    pub visible: bool,
}

pub struct CapturedWindow {
    pub image: RgbaImage,
    pub bounds: WindowBounds,
}

pub trait WindowCapture: Send + Sync {
    fn list_windows(&self) -> Result<Vec<WindowInfo>, WatchError>;

    /// Screenshot the first window whose title starts with `title_prefix`.
    /// `Ok(None)` means the window exists but is not visible right now.
    fn capture(&self, title_prefix: &str) -> Result<Option<CapturedWindow>, WatchError>;
}

pub trait OcrEngine: Send + Sync {
    /// Recognize text in reading order. An empty list is a valid result.
    fn recognize(&self, image: &RgbaImage) -> Result<Vec<OcrFragment>, WatchError>;
}

pub trait ReplyDispatcher: Send + Sync {
    /// Paste `text` into the input box at `at` and send it. Best-effort.
    fn dispatch(&self, text: &str, at: Point) -> Result<()>;
}

/// Window whose title starts with `prefix`, preferring the first visible one.
pub fn find_window<'a>(windows: &'a [WindowInfo], prefix: &str) -> Option<&'a WindowInfo> {
    let mut matching = windows
        .iter()
        .filter(|window| window.title.starts_with(prefix));
    let first = matching.next()?;
    if first.visible {
        return Some(first);
    }
    matching.find(|window| window.visible).or(Some(first))
}

const LIST_WINDOWS_SCRIPT: &str = r#"
set output to ""
tell application "System Events"
    repeat with proc in (every process whose background only is false)
        set procVisible to visible of proc
        repeat with win in (every window of proc)
            try
                set {winX, winY} to position of win
                set {winW, winH} to size of win
                set output to output & (name of win) & tab & winX & tab & winY & tab & winW & tab & winH & tab & procVisible & linefeed
            end try
        end repeat
    end repeat
end tell
return output
"#;

fn run_osascript(script: &str) -> Result<String> {
    let output = Command::new("osascript")
        .arg("-e")
        .arg(script)
        .output()
        .context("failed to spawn osascript")?;

    if !output.status.success() {
        bail!(
            "osascript failed with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Parse `title \t x \t y \t w \t h \t visible` rows. Titles may contain tabs,
/// so fields are taken from the right.
fn parse_window_rows(raw: &str) -> Vec<WindowInfo> {
    raw.lines()
        .filter_map(|line| {
            let mut fields = line.rsplitn(6, '\t');
            let visible = fields.next()?.trim() == "true";
            let height = fields.next()?.trim().parse().ok()?;
            let width = fields.next()?.trim().parse().ok()?;
            let y = fields.next()?.trim().parse().ok()?;
            let x = fields.next()?.trim().parse().ok()?;
            let title = fields.next()?.to_string();
            Some(WindowInfo {
                title,
                bounds: WindowBounds { x, y, width, height },
                visible,
            })
        })
        .collect()
}

#[derive(Debug, Default)]
pub struct DesktopWindowCapture;

impl DesktopWindowCapture {
    pub fn new() -> Self {
        Self
    }

    fn screenshot_region(&self, bounds: WindowBounds) -> Result<RgbaImage> {
        let file = tempfile::Builder::new()
            .prefix("chatwatch-")
            .suffix(".png")
            .tempfile()
            .context("failed to create screenshot file")?;

        let region = format!("{},{},{},{}", bounds.x, bounds.y, bounds.width, bounds.height);
        let status = Command::new("screencapture")
            .arg("-x")
            .arg("-R")
            .arg(&region)
            .arg(file.path())
            .status()
            .context("failed to spawn screencapture")?;
        if !status.success() {
            bail!("screencapture exited with {status} for region {region}");
        }

        let image = image::open(file.path())
            .with_context(|| format!("failed to decode screenshot {}", file.path().display()))?;
        Ok(image.to_rgba8())
    }
}

impl WindowCapture for DesktopWindowCapture {
    fn list_windows(&self) -> Result<Vec<WindowInfo>, WatchError> {
        if !cfg!(target_os = "macos") {
            return Err(WatchError::Capture(
                "window queries require macOS System Events".into(),
            ));
        }

        let raw = run_osascript(LIST_WINDOWS_SCRIPT)
            .map_err(|err| WatchError::Capture(format!("{err:#}")))?;
        Ok(parse_window_rows(&raw))
    }

    fn capture(&self, title_prefix: &str) -> Result<Option<CapturedWindow>, WatchError> {
        let windows = self.list_windows()?;
        let window = find_window(&windows, title_prefix).ok_or_else(|| {
            WatchError::WindowNotFound {
                prefix: title_prefix.to_string(),
            }
        })?;

        if !window.visible || window.bounds.width <= 0 || window.bounds.height <= 0 {
            return Ok(None);
        }

        let image = self
            .screenshot_region(window.bounds)
            .map_err(|err| WatchError::Capture(format!("{err:#}")))?;

        Ok(Some(CapturedWindow {
            image,
            bounds: window.bounds,
        }))
    }
}

/// Runs an external OCR program on a temporary PNG and parses its stdout.
pub struct CommandOcrEngine {
    program: String,
    args: Vec<String>,
}

impl CommandOcrEngine {
    /// `command` is the program followed by its leading arguments.
    pub fn new(command: &[String]) -> Result<Self, WatchError> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| WatchError::Settings("ocr_command is empty".into()))?;
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }

    fn run(&self, image: &RgbaImage) -> Result<String> {
        let file = tempfile::Builder::new()
            .prefix("chatwatch-ocr-")
            .suffix(".png")
            .tempfile()
            .context("failed to create OCR input file")?;
        image
            .save_with_format(file.path(), ImageFormat::Png)
            .context("failed to encode OCR input")?;

        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(file.path())
            .output()
            .with_context(|| format!("failed to spawn OCR command '{}'", self.program))?;

        if !output.status.success() {
            bail!(
                "'{}' exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        String::from_utf8(output.stdout).map_err(|err| anyhow!("OCR output is not UTF-8: {err}"))
    }
}

impl OcrEngine for CommandOcrEngine {
    fn recognize(&self, image: &RgbaImage) -> Result<Vec<OcrFragment>, WatchError> {
        let stdout = self
            .run(image)
            .map_err(|err| WatchError::OcrEngineFailure(format!("{err:#}")))?;
        parse_paddle_output(&stdout)
    }
}

/// `[[x, y] x4], [text, confidence]`
type RawLine = (Vec<[f64; 2]>, (String, f64));

fn looks_like_line(value: &Value) -> bool {
    value
        .get(0)
        .and_then(|quad| quad.get(0))
        .and_then(|point| point.get(0))
        .map_or(false, Value::is_number)
}

/// Parse PaddleOCR output: a list of lines, optionally wrapped in a list of
/// pages (only the first page is used). `null` pages mean no text.
pub fn parse_paddle_output(raw: &str) -> Result<Vec<OcrFragment>, WatchError> {
    let malformed = |detail: String| WatchError::OcrEngineFailure(format!("malformed OCR output: {detail}"));

    let value: Value = serde_json::from_str(raw.trim()).map_err(|err| malformed(err.to_string()))?;
    let mut items = match value {
        Value::Null => return Ok(Vec::new()),
        Value::Array(items) => items,
        other => return Err(malformed(format!("expected a list, got {other}"))),
    };

    if let Some(first) = items.first() {
        if first.is_null() || (first.is_array() && !looks_like_line(first)) {
            items = match items.swap_remove(0) {
                Value::Array(page) => page,
                _ => Vec::new(),
            };
        }
    }

    items
        .into_iter()
        .map(|item| {
            let (points, (text, confidence)): RawLine =
                serde_json::from_value(item).map_err(|err| malformed(err.to_string()))?;
            let corners: [[f64; 2]; 4] = points
                .try_into()
                .map_err(|points: Vec<[f64; 2]>| malformed(format!("quad has {} points", points.len())))?;
            let quad = Quad(corners.map(|[x, y]| Point::new(x, y)));
            Ok(OcrFragment::new(quad, text, confidence))
        })
        .collect()
}

#[derive(Debug, Default)]
pub struct DesktopReplyDispatcher;

impl DesktopReplyDispatcher {
    pub fn new() -> Self {
        Self
    }

    fn copy_to_clipboard(&self, text: &str) -> Result<()> {
        let mut child = Command::new("pbcopy")
            .stdin(Stdio::piped())
            .spawn()
            .context("failed to spawn pbcopy")?;
        child
            .stdin
            .take()
            .ok_or_else(|| anyhow!("pbcopy stdin unavailable"))?
            .write_all(text.as_bytes())
            .context("failed to write to pbcopy")?;
        let status = child.wait().context("failed to wait for pbcopy")?;
        if !status.success() {
            bail!("pbcopy exited with {status}");
        }
        Ok(())
    }
}

impl ReplyDispatcher for DesktopReplyDispatcher {
    fn dispatch(&self, text: &str, at: Point) -> Result<()> {
        self.copy_to_clipboard(text)?;

        let script = format!(
            r#"tell application "System Events"
    click at {{{x}, {y}}}
    delay 0.2
    keystroke "v" using command down
    delay 0.2
    key code 36
end tell"#,
            x = at.x.round() as i64,
            y = at.y.round() as i64
        );
        run_osascript(&script)?;
        Ok(())
    }
}
