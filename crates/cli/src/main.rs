use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use media_io::{ExportEvent, FfmpegService, MediaService};
use project::{AutoSaver, ProjectHandle, ProjectStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use timeline::{
    format_time, parse_time, Clip, EditCommand, Editor, EditorConfig, FrameRequest,
    FrameResponse, PlaybackSync, SilentAudio, Viewport,
};
use tokio::sync::mpsc;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "cutline")]
#[command(about = "Cutline - headless timeline editing")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long, global = true)]
    verbose: bool,

    /// Editor settings (JSON); missing fields use defaults
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Folder holding the projects
    #[arg(long, global = true)]
    root: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new project
    New { name: String },

    /// List projects, or the snapshots of one project
    List {
        #[arg(short, long)]
        project: Option<String>,
    },

    /// Copy media files into a project's library
    Import {
        #[arg(short, long)]
        project: String,

        files: Vec<PathBuf>,
    },

    /// Import files and drop them onto the timeline at a screen point
    Drop {
        #[arg(short, long)]
        project: String,

        /// Screen x, in pixels from the left edge of the timeline
        #[arg(long)]
        x: f64,

        /// Screen y, in pixels from the top of the first track
        #[arg(long)]
        y: f64,

        /// Pixels per second
        #[arg(long)]
        zoom: Option<f64>,

        #[arg(long, default_value_t = 0.0)]
        scroll_x: f64,

        files: Vec<PathBuf>,
    },

    /// Run a JSON list of edit commands against a project
    Apply {
        #[arg(short, long)]
        project: String,

        script: PathBuf,

        /// Report results without saving
        #[arg(long)]
        dry_run: bool,
    },

    /// Print tracks and clips
    Inspect {
        #[arg(short, long)]
        project: String,

        #[arg(long)]
        json: bool,
    },

    /// Rename a library file and every clip using it
    RenameAsset {
        #[arg(short, long)]
        project: String,

        old: String,
        new: String,
    },

    /// Delete library files and their clips
    RemoveAsset {
        #[arg(short, long)]
        project: String,

        names: Vec<String>,
    },

    /// Play the timeline headlessly, rendering frames as it goes
    Preview {
        #[arg(short, long)]
        project: String,

        /// Start time (seconds or MM:SS.cc)
        #[arg(long, default_value = "0")]
        from: String,

        /// How long to play, in seconds
        #[arg(long, default_value_t = 5.0)]
        seconds: f64,
    },

    /// Render the timeline to a video file
    Export {
        #[arg(short, long)]
        project: String,

        /// Output file (defaults to the project's exports folder)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[arg(long)]
        width: Option<u32>,

        #[arg(long)]
        height: Option<u32>,

        #[arg(long)]
        fps: Option<u32>,
    },
}

struct App {
    config: EditorConfig,
    store: ProjectStore,
}

/// An open project with its editor loaded from the latest snapshot.
struct Session {
    handle: ProjectHandle,
    editor: Editor,
    saver: AutoSaver,
}

impl App {
    fn open(&self, name: &str) -> Result<Session> {
        let handle = self
            .store
            .open(name)
            .with_context(|| format!("opening project {name}"))?;
        let doc = handle
            .load_latest()
            .with_context(|| format!("loading {name}"))?;
        let mut editor = Editor::new(self.config.clone());
        let saver = AutoSaver::new(editor.subscribe(), AutoSaver::DEFAULT_QUIET);
        editor.load(doc.into_state())?;
        Ok(Session {
            handle,
            editor,
            saver,
        })
    }
}

impl Session {
    fn project_dir(&self) -> &Path {
        self.handle.dir()
    }

    /// Writes a snapshot if anything changed.
    fn finish(mut self) -> Result<()> {
        self.editor.flush_pending_capture();
        if let Some(path) = self.saver.flush(&self.handle, &self.editor)? {
            info!("saved {}", path.display());
        }
        Ok(())
    }
}

fn load_config(path: Option<&Path>) -> Result<EditorConfig> {
    let Some(path) = path else {
        return Ok(EditorConfig::default());
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    let ctx = App {
        config: load_config(cli.config.as_deref())?,
        store: ProjectStore::new(cli.root.unwrap_or_else(project::default_projects_root)),
    };

    match cli.command {
        Commands::New { name } => new_command(&ctx, &name),
        Commands::List { project } => list_command(&ctx, project.as_deref()),
        Commands::Import { project, files } => import_command(&ctx, &project, &files),
        Commands::Drop {
            project,
            x,
            y,
            zoom,
            scroll_x,
            files,
        } => drop_command(&ctx, &project, (x, y), zoom, scroll_x, &files),
        Commands::Apply {
            project,
            script,
            dry_run,
        } => apply_command(&ctx, &project, &script, dry_run),
        Commands::Inspect { project, json } => inspect_command(&ctx, &project, json),
        Commands::RenameAsset { project, old, new } => rename_command(&ctx, &project, &old, &new),
        Commands::RemoveAsset { project, names } => remove_command(&ctx, &project, names),
        Commands::Preview {
            project,
            from,
            seconds,
        } => preview_command(&ctx, &project, &from, seconds).await,
        Commands::Export {
            project,
            output,
            width,
            height,
            fps,
        } => export_command(&ctx, &project, output, width, height, fps).await,
    }
}

fn new_command(ctx: &App, name: &str) -> Result<()> {
    let handle = ctx.store.create(name)?;
    info!("project ready at {}", handle.dir().display());
    Ok(())
}

fn list_command(ctx: &App, project: Option<&str>) -> Result<()> {
    match project {
        Some(name) => {
            for snapshot in ctx.store.open(name)?.list_snapshots()? {
                println!("{snapshot}");
            }
        }
        None => {
            for p in ctx.store.list_projects()? {
                println!("{}\t{}", p.name, p.path.display());
            }
        }
    }
    Ok(())
}

fn media_service() -> Result<FfmpegService> {
    if !FfmpegService::available() {
        bail!("ffmpeg and ffprobe must be installed and on PATH");
    }
    Ok(FfmpegService::new())
}

fn import_command(ctx: &App, project: &str, files: &[PathBuf]) -> Result<()> {
    let media = media_service()?;
    let mut session = ctx.open(project)?;
    let dir = session.project_dir().to_path_buf();
    for file in files {
        match session.editor.import_file(&media, &dir, file) {
            Ok(name) => info!("imported {name}"),
            Err(e) => warn!("skipping {}: {e}", file.display()),
        }
    }
    session.finish()
}

fn drop_command(
    ctx: &App,
    project: &str,
    point: (f64, f64),
    zoom: Option<f64>,
    scroll_x: f64,
    files: &[PathBuf],
) -> Result<()> {
    let media = media_service()?;
    let mut session = ctx.open(project)?;
    let mut viewport = Viewport::new(&ctx.config.viewport);
    if let Some(pps) = zoom {
        viewport.set_zoom(pps);
    }
    viewport.scroll_x = scroll_x;

    let dir = session.project_dir().to_path_buf();
    let report = session.editor.import_drop(&media, &dir, &viewport, point, files);
    for (file, reason) in &report.failed {
        warn!("{}: {reason}", file.display());
    }
    info!("placed {} clips", report.placed.len());
    session.finish()
}

fn apply_command(ctx: &App, project: &str, script: &Path, dry_run: bool) -> Result<()> {
    let raw = std::fs::read_to_string(script)
        .with_context(|| format!("reading script {}", script.display()))?;
    let commands: Vec<EditCommand> =
        serde_json::from_str(&raw).with_context(|| format!("parsing script {}", script.display()))?;

    let mut session = ctx.open(project)?;
    let count = commands.len();
    let outputs = match session.editor.execute_all(commands) {
        Ok(outputs) => outputs,
        Err((index, e)) => bail!("command {} of {count} failed: {e}", index + 1),
    };
    println!("{}", serde_json::to_string_pretty(&outputs)?);

    if dry_run {
        info!("dry run, nothing saved");
        return Ok(());
    }
    session.finish()
}

fn inspect_command(ctx: &App, project: &str, json: bool) -> Result<()> {
    let session = ctx.open(project)?;
    let state = session.editor.state();
    if json {
        println!("{}", serde_json::to_string_pretty(state)?);
        return Ok(());
    }

    println!("project {}", session.handle.name());
    println!("assets:");
    for asset in &state.assets {
        println!("  {:<24} {:?} {}", asset.name, asset.kind, format_time(asset.duration));
    }
    for track in state.ordered_tracks() {
        println!("track {} ({})", track.id, track.kind);
        for clip in state.sorted_track_clips(track.id) {
            println!(
                "  {} - {}  {}  [{}]",
                format_time(clip.start),
                format_time(clip.end()),
                clip.asset_name,
                clip.id
            );
        }
    }
    Ok(())
}

fn rename_command(ctx: &App, project: &str, old: &str, new: &str) -> Result<()> {
    let media = media_service()?;
    let mut session = ctx.open(project)?;
    session
        .editor
        .rename_asset(&media, old, new)
        .with_context(|| format!("renaming {old} to {new}"))?;
    session.finish()
}

fn remove_command(ctx: &App, project: &str, names: Vec<String>) -> Result<()> {
    let media = media_service()?;
    let mut session = ctx.open(project)?;
    session.editor.select_assets(names)?;
    let removed = session.editor.delete_selection(&media)?;
    info!("removed {removed} clips");
    session.finish()
}

fn spawn_render(
    media: Arc<dyn MediaService>,
    request: FrameRequest,
    tx: mpsc::UnboundedSender<FrameResponse>,
) {
    tokio::task::spawn_blocking(move || {
        match media.render_frame(&request.path, request.at_millis) {
            Ok(frame) => {
                let _ = tx.send(FrameResponse {
                    clip_id: request.clip_id,
                    generation: request.generation,
                    frame,
                });
            }
            Err(e) => warn!("frame at {}ms failed: {e}", request.at_millis),
        }
    });
}

async fn preview_command(ctx: &App, project: &str, from: &str, seconds: f64) -> Result<()> {
    let media: Arc<dyn MediaService> = Arc::new(media_service()?);
    let session = ctx.open(project)?;
    let start = parse_time(from).with_context(|| format!("bad start time {from:?}"))?;
    let timeline = session.editor.state().clone();
    let end = (start + seconds).min(
        timeline
            .clips
            .iter()
            .map(Clip::end)
            .fold(0.0, f64::max),
    );

    let mut sync = PlaybackSync::new(ctx.config.playback.clone(), Box::new(SilentAudio))
        .with_project_root(session.project_dir());
    let (tx, mut rx) = mpsc::unbounded_channel();
    if let Some(request) = sync.seek(&timeline, start) {
        spawn_render(media.clone(), request, tx.clone());
    }
    if let Some(request) = sync.play(&timeline) {
        spawn_render(media.clone(), request, tx.clone());
    }

    let mut interval = tokio::time::interval(Duration::from_millis(16));
    let mut last = Instant::now();
    let mut shown = 0usize;
    loop {
        tokio::select! {
            _ = interval.tick() => {
                let now = Instant::now();
                let outcome = sync.tick(&timeline, now - last);
                last = now;
                if let Some(t) = outcome.published {
                    info!(
                        "{} top={} audio={}",
                        format_time(t),
                        sync.top_clip().map_or_else(|| "-".to_string(), |id| id.to_string()),
                        sync.active_audio().len()
                    );
                }
                if let Some(request) = outcome.frame {
                    spawn_render(media.clone(), request, tx.clone());
                }
                if sync.current_time() >= end {
                    break;
                }
            }
            Some(response) = rx.recv() => {
                if sync.accept_frame(&timeline, response) {
                    shown += 1;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                warn!("interrupted");
                break;
            }
        }
    }
    sync.pause(&timeline);
    info!("played {}, showed {shown} frames", format_time(sync.current_time() - start));
    Ok(())
}

async fn export_command(
    ctx: &App,
    project: &str,
    output: Option<PathBuf>,
    width: Option<u32>,
    height: Option<u32>,
    fps: Option<u32>,
) -> Result<()> {
    let mut media = media_service()?;
    if let Some(w) = width {
        media.export.width = w;
    }
    if let Some(h) = height {
        media.export.height = h;
    }
    if let Some(f) = fps {
        media.export.fps = f;
    }

    let session = ctx.open(project)?;
    let clips = session.editor.export_clips(Some(session.project_dir()));
    let output = output.unwrap_or_else(|| {
        session
            .handle
            .exports_dir()
            .join(format!("{}.mp4", session.handle.name()))
    });
    info!("exporting {} clips to {}", clips.len(), output.display());

    let job = Arc::new(media.export_video(session.project_dir(), &output, clips)?);
    let waiter = job.clone();
    let mut wait = tokio::task::spawn_blocking(move || {
        waiter.wait(|p| info!("export {p:.0}%"))
    });

    let event = tokio::select! {
        event = &mut wait => event?,
        _ = tokio::signal::ctrl_c() => {
            warn!("canceling export");
            job.cancel();
            wait.await?
        }
    };
    match event {
        ExportEvent::Finished(path) => info!("export written to {}", path.display()),
        ExportEvent::Canceled => warn!("export canceled"),
        ExportEvent::Failed(reason) => bail!("export failed: {reason}"),
        ExportEvent::Progress(_) => {}
    }
    Ok(())
}
