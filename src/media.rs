use std::ffi::{OsStr, OsString};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use serde::Deserialize;
use tracing::debug;

use crate::atomic::produce_atomically;
use crate::error::DatasetError;

const FFMPEG: &str = "ffmpeg";
const FFPROBE: &str = "ffprobe";
const FFMPEG_BASE_ARGS: [&str; 4] = ["-y", "-hide_banner", "-loglevel", "error"];
const EVEN_PAD_FILTER: &str = "pad=ceil(iw/2)*2:ceil(ih/2)*2";

/// Default end padding for crops; end timestamps are exclusive in ffmpeg.
pub const DEFAULT_END_PAD_MS: u64 = 1;

/// External media operations. Every output-producing call writes its result
/// atomically: on error, `output` is left untouched.
pub trait MediaTool: Send + Sync {
    /// Frame rate of the first video stream. Doubles as a readability check.
    fn probe_fps(&self, path: &Path) -> Result<f64, DatasetError>;
    fn convert(
        &self,
        input: &Path,
        output: &Path,
        options: &ConvertOptions,
    ) -> Result<(), DatasetError>;
    fn crop(&self, input: &Path, output: &Path, window: &CropWindow) -> Result<(), DatasetError>;
    /// Builds a video from `frames` in the given order.
    fn assemble_images(
        &self,
        frames: &[PathBuf],
        fps: f64,
        output: &Path,
    ) -> Result<(), DatasetError>;
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConvertOptions {
    pub fps: Option<f64>,
    /// Re-time through the `fps` filter instead of `-r`.
    pub fps_filter: bool,
    pub crf: Option<u8>,
    pub stream_copy: bool,
}

impl ConvertOptions {
    pub fn stream_copy() -> Self {
        Self {
            stream_copy: true,
            ..Self::default()
        }
    }

    pub fn resample_with_filter(fps: f64) -> Self {
        Self {
            fps: Some(fps),
            fps_filter: true,
            ..Self::default()
        }
    }
}

/// Time window `[start_ms, end_ms)` plus `end_pad_ms` of slack at the end.
#[derive(Debug, Clone, PartialEq)]
pub struct CropWindow {
    pub start_ms: u64,
    pub end_ms: u64,
    pub end_pad_ms: u64,
    pub fps: Option<f64>,
}

impl CropWindow {
    pub fn new(start_ms: u64, end_ms: u64) -> Self {
        Self {
            start_ms,
            end_ms,
            end_pad_ms: DEFAULT_END_PAD_MS,
            fps: None,
        }
    }

    pub fn with_end_pad(mut self, end_pad_ms: u64) -> Self {
        self.end_pad_ms = end_pad_ms;
        self
    }

    pub fn with_fps(mut self, fps: f64) -> Self {
        self.fps = Some(fps);
        self
    }

    pub fn duration_ms(&self) -> u64 {
        (self.end_ms + self.end_pad_ms).saturating_sub(self.start_ms)
    }
}

pub fn convert_args(input: &Path, options: &ConvertOptions) -> Vec<OsString> {
    let mut args = base_args();
    args.push("-i".into());
    args.push(input.into());
    if let Some(crf) = options.crf {
        push_args(&mut args, &["-crf", crf.to_string().as_str()]);
    }
    if options.stream_copy {
        push_args(&mut args, &["-c", "copy"]);
    }
    if let Some(fps) = options.fps {
        if options.fps_filter {
            push_args(&mut args, &["-filter:v", format!("fps={}", format_fps(fps)).as_str()]);
        } else {
            push_args(&mut args, &["-r", format_fps(fps).as_str()]);
        }
    }
    // Large queue avoids "too many packets buffered" on some inputs.
    push_args(&mut args, &["-max_muxing_queue_size", "99999"]);
    args
}

pub fn crop_args(input: &Path, window: &CropWindow) -> Vec<OsString> {
    let mut args = base_args();
    // Some inputs fail to seek to zero, so only seek when needed.
    if window.start_ms > 0 {
        push_args(&mut args, &["-ss", format_secs(window.start_ms).as_str()]);
    }
    args.push("-i".into());
    args.push(input.into());
    push_args(&mut args, &["-t", format_secs(window.duration_ms()).as_str()]);
    if let Some(fps) = window.fps {
        push_args(&mut args, &["-r", format_fps(fps).as_str()]);
    }
    push_args(&mut args, &["-strict", "experimental"]);
    args
}

pub fn assemble_args(fps: f64) -> Vec<OsString> {
    let mut args = base_args();
    push_args(&mut args, &["-f", "concat", "-safe", "0"]);
    push_args(&mut args, &["-r", format_fps(fps).as_str()]);
    push_args(&mut args, &["-i", "/dev/stdin", "-vf", EVEN_PAD_FILTER]);
    args
}

/// Concat-demuxer list, one `file '<path>'` line per frame, order preserved.
pub fn concat_list(frames: &[PathBuf]) -> String {
    let mut list = String::new();
    for frame in frames {
        let escaped = frame.to_string_lossy().replace('\'', r"'\''");
        list.push_str("file '");
        list.push_str(&escaped);
        list.push_str("'\n");
    }
    list
}

/// Parses an ffprobe rational such as `30000/1001`.
pub fn parse_frame_rate(value: &str) -> Option<f64> {
    let (num, den) = value.trim().split_once('/')?;
    let num: u64 = num.parse().ok()?;
    let den: u64 = den.parse().ok()?;
    if den == 0 || num == 0 {
        return None;
    }
    Some(num as f64 / den as f64)
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    r_frame_rate: Option<String>,
}

pub fn parse_probe_output(path: &Path, stdout: &[u8]) -> Result<f64, DatasetError> {
    let probe_err = |message: String| DatasetError::Probe {
        path: path.to_path_buf(),
        message,
    };
    let output: ProbeOutput =
        serde_json::from_slice(stdout).map_err(|err| probe_err(err.to_string()))?;
    let rate = output
        .streams
        .first()
        .and_then(|stream| stream.r_frame_rate.as_deref())
        .ok_or_else(|| probe_err("no video stream".to_string()))?;
    parse_frame_rate(rate).ok_or_else(|| probe_err(format!("unparsable frame rate `{rate}`")))
}

fn base_args() -> Vec<OsString> {
    FFMPEG_BASE_ARGS.iter().map(OsString::from).collect()
}

fn push_args(args: &mut Vec<OsString>, values: &[&str]) {
    args.extend(values.iter().map(|value| OsStr::new(value).to_os_string()));
}

fn format_secs(ms: u64) -> String {
    format!("{}.{:03}", ms / 1000, ms % 1000)
}

fn format_fps(fps: f64) -> String {
    format!("{fps}")
}

/// [`MediaTool`] backed by the `ffmpeg` and `ffprobe` binaries.
#[derive(Debug, Clone)]
pub struct Ffmpeg {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
}

impl Ffmpeg {
    /// Locates both binaries on `PATH`.
    pub fn new() -> Result<Self, DatasetError> {
        let ffmpeg =
            find_in_path(FFMPEG).ok_or_else(|| DatasetError::MissingTool(FFMPEG.to_string()))?;
        let ffprobe =
            find_in_path(FFPROBE).ok_or_else(|| DatasetError::MissingTool(FFPROBE.to_string()))?;
        Ok(Self { ffmpeg, ffprobe })
    }

    pub fn with_paths(ffmpeg: PathBuf, ffprobe: PathBuf) -> Self {
        Self { ffmpeg, ffprobe }
    }

    fn run_ffmpeg(
        &self,
        args: Vec<OsString>,
        output: &Path,
        stdin: Option<&str>,
    ) -> Result<(), DatasetError> {
        produce_atomically(output, |scratch| {
            let mut cmd = Command::new(&self.ffmpeg);
            cmd.args(&args).arg(scratch);
            let result = run_cmd(cmd, stdin).map_err(transform_err)?;
            check_status(&self.ffmpeg, result)
                .map(|_| ())
                .map_err(transform_err)
        })
    }
}

impl MediaTool for Ffmpeg {
    fn probe_fps(&self, path: &Path) -> Result<f64, DatasetError> {
        let mut cmd = Command::new(&self.ffprobe);
        cmd.args(["-v", "error", "-select_streams", "v", "-of", "json"])
            .args(["-show_entries", "stream=r_frame_rate"])
            .arg(path);
        let probe_err = |message: String| DatasetError::Probe {
            path: path.to_path_buf(),
            message,
        };
        let output = run_cmd(cmd, None).map_err(probe_err)?;
        let output = check_status(&self.ffprobe, output).map_err(probe_err)?;
        parse_probe_output(path, &output.stdout)
    }

    fn convert(
        &self,
        input: &Path,
        output: &Path,
        options: &ConvertOptions,
    ) -> Result<(), DatasetError> {
        self.run_ffmpeg(convert_args(input, options), output, None)
    }

    fn crop(&self, input: &Path, output: &Path, window: &CropWindow) -> Result<(), DatasetError> {
        self.run_ffmpeg(crop_args(input, window), output, None)
    }

    fn assemble_images(
        &self,
        frames: &[PathBuf],
        fps: f64,
        output: &Path,
    ) -> Result<(), DatasetError> {
        if frames.is_empty() {
            return Err(DatasetError::MissingAsset(format!(
                "no frames to assemble into {}",
                output.display()
            )));
        }
        let list = concat_list(frames);
        self.run_ffmpeg(assemble_args(fps), output, Some(list.as_str()))
    }
}

fn transform_err(message: String) -> DatasetError {
    DatasetError::Transform {
        tool: FFMPEG.to_string(),
        message,
    }
}

fn run_cmd(mut cmd: Command, stdin: Option<&str>) -> Result<Output, String> {
    debug!("executing {cmd:?}");
    cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
    let Some(input) = stdin else {
        return cmd.output().map_err(|err| err.to_string());
    };

    cmd.stdin(Stdio::piped());
    let mut child = cmd.spawn().map_err(|err| err.to_string())?;
    if let Some(mut pipe) = child.stdin.take() {
        pipe.write_all(input.as_bytes())
            .map_err(|err| format!("writing stdin: {err}"))?;
    }
    child.wait_with_output().map_err(|err| err.to_string())
}

fn check_status(program: &Path, output: Output) -> Result<Output, String> {
    if output.status.success() {
        return Ok(output);
    }
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    if stderr.is_empty() {
        Err(format!("{} exited with {}", program.display(), output.status))
    } else {
        Err(stderr)
    }
}

pub(crate) fn find_in_path(name: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    for path in std::env::split_paths(&path_var) {
        let exe = path.join(format!("{name}.exe"));
        if exe.exists() {
            return Some(exe);
        }
        let plain = path.join(name);
        if plain.exists() {
            return Some(plain);
        }
    }
    None
}
