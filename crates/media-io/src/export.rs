use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use tracing::{debug, warn};

use crate::{ExportClip, MediaError, MediaKind};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExportEvent {
    Progress(f32),
    Finished(PathBuf),
    Failed(String),
    /// Acknowledges a `cancel()` request once the encoder has stopped.
    Canceled,
}

impl ExportEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ExportEvent::Progress(_))
    }
}

/// Output format for the export encoder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportSettings {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub video_codec: String,
    pub preset: String,
    pub audio_bitrate_kbps: u32,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            fps: 30,
            video_codec: "libx264".to_string(),
            preset: "medium".to_string(),
            audio_bitrate_kbps: 192,
        }
    }
}

/// Handle to a running export. Progress arrives on `events`.
pub struct ExportJob {
    pub events: Receiver<ExportEvent>,
    child: Arc<Mutex<Option<Child>>>,
    canceled: Arc<AtomicBool>,
}

/// Producer half for exports that are not backed by a child process.
#[derive(Clone)]
pub struct ExportReporter {
    tx: Sender<ExportEvent>,
    canceled: Arc<AtomicBool>,
}

impl ExportReporter {
    pub fn send(&self, event: ExportEvent) {
        let _ = self.tx.send(event);
    }

    pub fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::SeqCst)
    }
}

impl ExportJob {
    /// A job whose events are produced by the caller.
    pub fn channel() -> (ExportReporter, ExportJob) {
        let (tx, rx) = unbounded();
        let canceled = Arc::new(AtomicBool::new(false));
        (
            ExportReporter {
                tx,
                canceled: canceled.clone(),
            },
            ExportJob {
                events: rx,
                child: Arc::new(Mutex::new(None)),
                canceled,
            },
        )
    }

    /// Runs an ffmpeg command that writes `-progress pipe:1` to stdout.
    pub(crate) fn spawn(
        mut cmd: Command,
        total_seconds: f64,
        output: PathBuf,
    ) -> Result<ExportJob, MediaError> {
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        let mut child = cmd.spawn()?;
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let (reporter, job) = ExportJob::channel();
        *job.child.lock() = Some(child);
        let child = job.child.clone();

        // stderr must drain while stdout is read or a chatty encoder stalls.
        let stderr_reader = thread::spawn(move || {
            let mut text = String::new();
            if let Some(mut stderr) = stderr {
                let _ = stderr.read_to_string(&mut text);
            }
            text
        });

        thread::spawn(move || {
            let mut last = 0.0f32;
            if let Some(stdout) = stdout {
                for line in BufReader::new(stdout).lines() {
                    let Ok(line) = line else { break };
                    match parse_progress_line(&line) {
                        ProgressLine::OutTime(secs) => {
                            let pct = progress_percent(secs, total_seconds);
                            if pct > last {
                                last = pct;
                                reporter.send(ExportEvent::Progress(pct));
                            }
                        }
                        ProgressLine::End => reporter.send(ExportEvent::Progress(100.0)),
                        ProgressLine::Continue | ProgressLine::Other => {}
                    }
                }
            }
            let err_text = stderr_reader.join().unwrap_or_default();
            let status = child.lock().take().map(|mut c| c.wait());

            if reporter.is_canceled() {
                debug!("export canceled: {}", output.display());
                reporter.send(ExportEvent::Canceled);
                return;
            }
            match status {
                Some(Ok(s)) if s.success() => reporter.send(ExportEvent::Finished(output)),
                Some(Ok(s)) => {
                    warn!("ffmpeg export exited with {s}");
                    reporter.send(ExportEvent::Failed(last_lines(&err_text, 5)));
                }
                Some(Err(e)) => reporter.send(ExportEvent::Failed(e.to_string())),
                None => reporter.send(ExportEvent::Failed("encoder vanished".into())),
            }
        });
        Ok(job)
    }

    /// Requests an abort. The job acknowledges with `ExportEvent::Canceled`.
    pub fn cancel(&self) {
        self.canceled.store(true, Ordering::SeqCst);
        if let Some(child) = self.child.lock().as_mut() {
            if let Err(e) = child.kill() {
                warn!("failed to kill export process: {e}");
            }
        }
    }

    pub fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::SeqCst)
    }

    /// Blocks until a terminal event arrives, invoking `on_progress` along the way.
    pub fn wait(&self, mut on_progress: impl FnMut(f32)) -> ExportEvent {
        loop {
            match self.events.recv() {
                Ok(ExportEvent::Progress(p)) => on_progress(p),
                Ok(event) => return event,
                Err(_) => return ExportEvent::Failed("export channel closed".into()),
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProgressLine {
    OutTime(f64),
    Continue,
    End,
    Other,
}

pub fn parse_progress_line(line: &str) -> ProgressLine {
    let Some((key, value)) = line.trim().split_once('=') else {
        return ProgressLine::Other;
    };
    match key {
        // Both are microseconds despite the name of the second.
        "out_time_us" | "out_time_ms" => value
            .parse::<f64>()
            .map(|us| ProgressLine::OutTime(us / 1_000_000.0))
            .unwrap_or(ProgressLine::Other),
        "out_time" => parse_clock(value)
            .map(ProgressLine::OutTime)
            .unwrap_or(ProgressLine::Other),
        "progress" if value == "end" => ProgressLine::End,
        "progress" => ProgressLine::Continue,
        _ => ProgressLine::Other,
    }
}

fn parse_clock(value: &str) -> Option<f64> {
    let mut parts = value.trim().split(':');
    let h: f64 = parts.next()?.parse().ok()?;
    let m: f64 = parts.next()?.parse().ok()?;
    let s: f64 = parts.next()?.parse().ok()?;
    Some(h * 3600.0 + m * 60.0 + s)
}

/// Capped at 99 until the encoder reports the end marker.
fn progress_percent(out_seconds: f64, total_seconds: f64) -> f32 {
    if total_seconds <= 0.0 || !out_seconds.is_finite() {
        return 0.0;
    }
    ((out_seconds / total_seconds) * 100.0).clamp(0.0, 99.0) as f32
}

fn last_lines(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    lines[lines.len().saturating_sub(n)..].join("\n")
}

/// ffmpeg arguments compositing `clips` into `output`.
///
/// Visual clips are overlaid on a black canvas, highest `layer` first so the
/// lowest layer ends up on top. Audio clips are delayed to their start and mixed.
pub fn build_export_args(
    clips: &[ExportClip],
    output: &Path,
    settings: &ExportSettings,
) -> Result<Vec<String>, MediaError> {
    let total = clips
        .iter()
        .map(|c| c.start + c.duration)
        .fold(0.0f64, f64::max);
    if clips.is_empty() || total <= 0.0 {
        return Err(MediaError::EmptyExport);
    }

    let mut args: Vec<String> = vec!["-hide_banner".into(), "-loglevel".into(), "error".into()];
    for clip in clips {
        if clip.kind == MediaKind::Image {
            args.extend(["-loop".into(), "1".into(), "-t".into(), fmt_secs(clip.duration)]);
        }
        args.push("-i".into());
        args.push(clip.path.to_string_lossy().into_owned());
    }

    let (w, h, fps) = (settings.width, settings.height, settings.fps);
    let mut graph = String::new();
    let _ = write!(
        graph,
        "color=c=black:s={w}x{h}:r={fps}:d={}[base]",
        fmt_secs(total)
    );

    let mut visual: Vec<(usize, &ExportClip)> = clips
        .iter()
        .enumerate()
        .filter(|(_, c)| c.kind.is_visual())
        .collect();
    visual.sort_by(|a, b| b.1.layer.cmp(&a.1.layer).then(a.1.start.total_cmp(&b.1.start)));

    let mut prev = "base".to_string();
    for (step, (idx, clip)) in visual.iter().enumerate() {
        let start = fmt_secs(clip.start);
        let end = fmt_secs(clip.start + clip.duration);
        let trim = if clip.kind == MediaKind::Image {
            String::new()
        } else {
            format!(
                "trim=start={}:duration={},",
                fmt_secs(clip.source_in),
                fmt_secs(clip.duration)
            )
        };
        let _ = write!(
            graph,
            ";[{idx}:v]{trim}setpts=PTS-STARTPTS+{start}/TB,\
             scale={w}:{h}:force_original_aspect_ratio=decrease,\
             pad={w}:{h}:(ow-iw)/2:(oh-ih)/2,format=yuv420p[v{idx}]"
        );
        let out = if step + 1 == visual.len() {
            "vout".to_string()
        } else {
            format!("o{idx}")
        };
        let _ = write!(
            graph,
            ";[{prev}][v{idx}]overlay=eof_action=pass:enable='between(t,{start},{end})'[{out}]"
        );
        prev = out;
    }
    if visual.is_empty() {
        graph.push_str(";[base]null[vout]");
    }

    let audio: Vec<(usize, &ExportClip)> = clips
        .iter()
        .enumerate()
        .filter(|(_, c)| c.kind == MediaKind::Audio)
        .collect();
    for (idx, clip) in &audio {
        let delay = (clip.start * 1000.0).round() as u64;
        let _ = write!(
            graph,
            ";[{idx}:a]atrim=start={}:duration={},asetpts=PTS-STARTPTS,adelay={delay}|{delay}[a{idx}]",
            fmt_secs(clip.source_in),
            fmt_secs(clip.duration)
        );
    }
    if !audio.is_empty() {
        graph.push(';');
        for (idx, _) in &audio {
            let _ = write!(graph, "[a{idx}]");
        }
        let _ = write!(
            graph,
            "amix=inputs={}:duration=longest:normalize=0[aout]",
            audio.len()
        );
    }

    args.extend(["-filter_complex".into(), graph, "-map".into(), "[vout]".into()]);
    if audio.is_empty() {
        args.push("-an".into());
    } else {
        args.extend([
            "-map".into(),
            "[aout]".into(),
            "-c:a".into(),
            "aac".into(),
            "-b:a".into(),
            format!("{}k", settings.audio_bitrate_kbps),
        ]);
    }
    args.extend([
        "-c:v".into(),
        settings.video_codec.clone(),
        "-preset".into(),
        settings.preset.clone(),
        "-pix_fmt".into(),
        "yuv420p".into(),
        "-r".into(),
        fps.to_string(),
        "-t".into(),
        fmt_secs(total),
        "-progress".into(),
        "pipe:1".into(),
        "-nostats".into(),
        "-y".into(),
        output.to_string_lossy().into_owned(),
    ]);
    Ok(args)
}

fn fmt_secs(v: f64) -> String {
    format!("{:.3}", v.max(0.0))
}
