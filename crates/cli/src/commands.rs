use crate::engine::SimulatedEngine;
use crate::library::LibraryManifest;
use anyhow::{bail, Context, Result};
use console::style;
use earshot_config::{Config, ConfigManager, MAX_SPEED, MIN_SPEED};
use earshot_core::{AppError, BookId, ErrorSeverity, StoredBook};
use earshot_network::{Client, ClientConfig};
use earshot_playback::memory::{MemoryProgressStore, StaticTokenProvider};
use earshot_playback::{
    spawn_engine_driver, spawn_sleep_timer, BookStore, ChapterList, ConfigSettings,
    DownloadService, HttpNegotiationApi, OutputEngine, PlaybackOrchestrator, PlaybackTimeline,
    PrepareResult, Services, SettingsStore, SleepTimer,
};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Bearer token used when talking to the server
pub const ENV_TOKEN: &str = "EARSHOT_TOKEN";

const CLOCK_TICK: Duration = Duration::from_millis(250);

/// Everything a command needs from the library and config
struct Workspace {
    manifest: LibraryManifest,
    settings: Arc<ConfigSettings>,
    progress: Arc<MemoryProgressStore>,
    services: Services,
}

impl Workspace {
    fn open(library: &Path, config: ConfigManager) -> Result<Self> {
        let manifest = LibraryManifest::load(library)?;
        let settings =
            Arc::new(ConfigSettings::load(config).context("Failed to load configuration")?);
        let progress = Arc::new(manifest.progress_store());
        let token = std::env::var(ENV_TOKEN).ok();

        let services = Services {
            books: Arc::new(manifest.book_store()),
            progress: progress.clone(),
            settings: settings.clone(),
            tokens: Arc::new(StaticTokenProvider::new(token.as_deref())),
            downloads: Arc::new(manifest.download_service()),
        };

        Ok(Self {
            manifest,
            settings,
            progress,
            services,
        })
    }

    fn book(&self, book_id: &BookId) -> Result<StoredBook> {
        self.services
            .books
            .book(book_id)
            .with_context(|| format!("Book {} is not in the library", book_id))
    }

    fn base_url(&self) -> Result<String> {
        self.settings
            .base_url()
            .context("No server base URL configured; set server.base_url in the config file")
    }

    /// Timeline from cached files and direct URLs only
    fn local_timeline(&self, book_id: &BookId) -> Result<PlaybackTimeline> {
        let book = self.book(book_id)?;
        let files = book.audio_files()?;
        let base_url = self.base_url()?;
        let downloads = &self.services.downloads;

        Ok(PlaybackTimeline::build_local(
            book_id,
            &files,
            &base_url,
            |file_id| downloads.local_path(file_id),
        )?)
    }

    fn orchestrator(&self, negotiate: bool) -> Result<PlaybackOrchestrator> {
        let mut orchestrator = PlaybackOrchestrator::new(self.services.clone())
            .with_poll_policy(self.settings.poll_policy());

        if negotiate && self.settings.negotiation_enabled() {
            let server = self.settings.config().server;
            let client = Client::with_config(ClientConfig::from_limits(
                server.request_timeout_secs,
                server.max_retries,
            ))
            .context("Failed to create HTTP client")?;
            let api = HttpNegotiationApi::new(client, &self.base_url()?, self.services.tokens.clone());
            orchestrator = orchestrator.with_negotiation(Arc::new(api));
        }

        Ok(orchestrator)
    }

    fn save_progress(mut self, library: &Path) -> Result<()> {
        self.manifest.absorb_progress(&self.progress);
        self.manifest.save(library)
    }
}

/// List every book in the library manifest
pub fn list_books(library: &Path) -> Result<()> {
    let manifest = LibraryManifest::load(library)?;

    if manifest.books.is_empty() {
        println!("No books in {}", library.display());
        return Ok(());
    }

    println!("\n{} Books in Library", style(manifest.books.len()).bold().cyan());
    println!("{}", "=".repeat(60));
    for book in &manifest.books {
        let progress = manifest.progress.get(&book.id);
        let status = match progress {
            Some(p) if p.is_finished => "finished".to_string(),
            Some(p) => format!("at {}", format_ms(p.position_ms.max(0) as u64)),
            None => "not started".to_string(),
        };
        println!("{}  {}", style(&book.id).dim(), style(&book.title).bold());
        if let Some(author) = &book.author {
            println!("    by {}", author);
        }
        println!("    {}", status);
    }

    Ok(())
}

/// Print the book's timeline as built from cached files and direct URLs
pub fn show_timeline(library: &Path, config: ConfigManager, book_id: &BookId) -> Result<()> {
    let workspace = Workspace::open(library, config)?;
    let timeline = workspace.local_timeline(book_id)?;
    print!("{}", render_timeline(&timeline));
    Ok(())
}

/// Map a book-relative position to a file and an offset inside it
pub fn resolve_position(
    library: &Path,
    config: ConfigManager,
    book_id: &BookId,
    position_ms: i64,
) -> Result<()> {
    let workspace = Workspace::open(library, config)?;
    let book = workspace.book(book_id)?;
    let timeline = workspace.local_timeline(book_id)?;
    let chapters = ChapterList::new(book.chapters);

    print!("{}", render_resolved(&timeline, &chapters, position_ms));
    Ok(())
}

/// Run a full preparation, negotiating streams unless `direct` is set
pub async fn prepare_book(
    library: &Path,
    config: ConfigManager,
    book_id: &BookId,
    direct: bool,
) -> Result<()> {
    let workspace = Workspace::open(library, config)?;
    let orchestrator = workspace.orchestrator(!direct)?;

    let prepared = orchestrator
        .prepare(book_id)
        .await
        .with_context(|| format!("Failed to prepare book {}", book_id))?;

    print!("{}", render_prepared(&prepared));
    Ok(())
}

/// Options for a simulated listening session
#[derive(Debug, Clone)]
pub struct ListenOptions {
    /// Wall time to listen for
    pub duration: Duration,
    pub speed: Option<f32>,
    /// Speed steps to apply on top of the resume speed
    pub speed_steps: i32,
    pub sleep_minutes: Option<u32>,
    pub sleep_end_of_chapter: bool,
    pub direct: bool,
}

/// Listen to a book on a simulated engine, saving progress back to the library
pub async fn listen(
    library: &Path,
    config: ConfigManager,
    book_id: &BookId,
    options: ListenOptions,
) -> Result<()> {
    let workspace = Workspace::open(library, config)?;
    let player = workspace.settings.config().player;

    let engine = SimulatedEngine::new();
    let orchestrator = Arc::new(workspace.orchestrator(!options.direct)?.with_engine(engine.clone()));
    let driver = spawn_engine_driver(orchestrator.clone(), engine.subscribe());
    let clock = engine.spawn_clock(CLOCK_TICK);

    let prepared = orchestrator
        .start_playback(book_id)
        .await
        .with_context(|| format!("Failed to start book {}", book_id))?;
    println!(
        "{} {} ({})",
        style("▶").green().bold(),
        style(&prepared.book_title).bold(),
        format_ms(prepared.timeline.total_duration_ms())
    );

    if let Some(speed) = target_speed(
        prepared.resume_speed,
        options.speed,
        options.speed_steps,
        player.speed_step,
    ) {
        orchestrator.set_speed(speed).await?;
        println!("Speed set to {:.2}x", speed);
    }

    let timer = Arc::new(Mutex::new(SleepTimer::new(Duration::from_secs(
        player.sleep_fade_secs,
    ))));
    let sleep_task = start_sleep_timer(&timer, &orchestrator, &options);

    let mut session = orchestrator.subscribe();
    let mut autosave =
        tokio::time::interval(Duration::from_secs(player.autosave_interval_secs.max(1)));
    let mut status = tokio::time::interval(Duration::from_secs(1));
    let deadline = tokio::time::sleep(options.duration);
    tokio::pin!(deadline);
    // Skip the immediate first tick so the driver settles before the first check
    status.tick().await;

    loop {
        tokio::select! {
            _ = &mut deadline => break,
            _ = tokio::signal::ctrl_c() => {
                println!();
                break;
            }
            _ = autosave.tick() => {
                if let Err(e) = orchestrator.save_progress() {
                    log::warn!("Autosave failed: {}", e);
                }
            }
            _ = status.tick() => {
                let state = orchestrator.snapshot();
                if state.has_book() && !state.is_playing {
                    println!("{} Paused", style("❚❚").yellow());
                    break;
                }
                let sleep = {
                    let timer = match timer.lock() {
                        Ok(guard) => guard,
                        Err(poisoned) => poisoned.into_inner(),
                    };
                    timer.is_active().then(|| timer.format_remaining())
                };
                println!(
                    "{}",
                    render_status(
                        state.position_ms,
                        state.duration_ms,
                        state.speed,
                        state.chapters.as_deref(),
                        sleep.as_deref()
                    )
                );
            }
            changed = session.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = session.borrow_and_update().clone();
                if !state.has_book() {
                    println!("{} Finished", style("■").cyan());
                    break;
                }
            }
        }
    }

    orchestrator.stop().await.context("Failed to stop playback")?;
    if let Some(task) = sleep_task {
        task.abort();
    }
    clock.abort();
    driver.abort();

    workspace.save_progress(library)?;
    println!("Progress saved to {}", library.display());
    Ok(())
}

fn start_sleep_timer(
    timer: &Arc<Mutex<SleepTimer>>,
    orchestrator: &Arc<PlaybackOrchestrator>,
    options: &ListenOptions,
) -> Option<tokio::task::JoinHandle<()>> {
    {
        let mut timer = match timer.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(minutes) = options.sleep_minutes {
            timer.start_duration(minutes);
        } else if options.sleep_end_of_chapter {
            let boundary = orchestrator.end_of_chapter_ms()?;
            timer.start_end_of_chapter(orchestrator.snapshot().position_ms, boundary);
        } else {
            return None;
        }
    }

    Some(spawn_sleep_timer(
        timer.clone(),
        orchestrator.clone(),
        Duration::from_secs(1),
    ))
}

/// Print the effective configuration
pub fn config_show(config: &ConfigManager) -> Result<()> {
    let loaded: Config = config
        .load_with_env_overrides()
        .context("Failed to load configuration")?;
    let text = toml::to_string_pretty(&loaded).context("Failed to render configuration")?;

    println!("# {}", config.config_path().display());
    print!("{}", text);
    Ok(())
}

/// Write a default config file if none exists
pub fn config_init(config: &ConfigManager) -> Result<()> {
    let created = config
        .initialize()
        .context("Failed to initialize configuration")?;
    let path = config.config_path();

    if created {
        println!("{} Created {}", style("✓").green().bold(), path.display());
    } else {
        println!("Config already exists at {}", path.display());
    }
    Ok(())
}

/// Report problems in the config file; fails when there are any
pub fn config_check(config: &ConfigManager) -> Result<()> {
    let problems = config
        .validate()
        .context("Failed to load configuration")?;
    let path = config.config_path();

    if problems.is_empty() {
        println!("{} {} is valid", style("✓").green().bold(), path.display());
        return Ok(());
    }
    for problem in &problems {
        println!("{} {}", style("✗").red().bold(), problem);
    }
    bail!("{} has {} problem(s)", path.display(), problems.len())
}

pub fn config_reset(config: &ConfigManager) -> Result<()> {
    config.reset().context("Failed to reset configuration")?;
    println!(
        "{} Reset {} to defaults",
        style("✓").green().bold(),
        config.config_path().display()
    );
    Ok(())
}

/// Resume speed adjusted by an explicit speed or by `steps` increments
///
/// Returns `None` when nothing should change.
pub fn target_speed(resume: f32, explicit: Option<f32>, steps: i32, step: f32) -> Option<f32> {
    if let Some(speed) = explicit {
        return Some(speed);
    }
    if steps == 0 {
        return None;
    }
    let speed = (resume + steps as f32 * step).clamp(MIN_SPEED, MAX_SPEED);
    Some((speed * 100.0).round() / 100.0)
}

/// `H:MM:SS`, or `M:SS` under an hour
pub fn format_ms(ms: u64) -> String {
    let seconds = ms / 1_000;
    let (h, m, s) = (seconds / 3_600, (seconds % 3_600) / 60, seconds % 60);
    if h > 0 {
        format!("{}:{:02}:{:02}", h, m, s)
    } else {
        format!("{}:{:02}", m, s)
    }
}

pub fn render_timeline(timeline: &PlaybackTimeline) -> String {
    let mut out = format!(
        "Book {}: {} segments, {} total, {}/{} cached\n",
        timeline.book_id(),
        timeline.len(),
        format_ms(timeline.total_duration_ms()),
        timeline.local_segment_count(),
        timeline.len()
    );
    for (index, segment) in timeline.segments().iter().enumerate() {
        out.push_str(&format!(
            "{:>3}  {:<12} {:>9} - {:<9} {}\n",
            index,
            segment.file_id.as_str(),
            format_ms(segment.offset_ms),
            format_ms(segment.end_ms()),
            segment.playable_source()
        ));
    }
    out
}

pub fn render_resolved(timeline: &PlaybackTimeline, chapters: &ChapterList, position_ms: i64) -> String {
    let resolved = timeline.resolve(position_ms);
    let mut out = String::new();

    let clamped = timeline.clamp(position_ms);
    if clamped as i64 != position_ms {
        out.push_str(&format!(
            "Position {}ms is outside the book; using {}ms\n",
            position_ms, clamped
        ));
    }

    if let Some(segment) = timeline.segment(resolved.segment_index) {
        out.push_str(&format!(
            "Segment {} ({}) at {} ({}ms into the file)\n",
            resolved.segment_index,
            segment.file_id,
            format_ms(resolved.position_in_segment_ms),
            resolved.position_in_segment_ms
        ));
    }

    if let Some(chapter) = chapters.chapter_at(clamped) {
        out.push_str(&format!(
            "Chapter {}: {}\n",
            chapters.progress_label(clamped),
            chapter.title
        ));
    }
    out
}

pub fn render_prepared(prepared: &PrepareResult) -> String {
    let mut out = format!(
        "Prepared \"{}\": resume at {} ({}ms), speed {:.2}x\n",
        prepared.book_title,
        format_ms(prepared.resume_position_ms.max(0) as u64),
        prepared.resume_position_ms,
        prepared.resume_speed
    );
    out.push_str(&render_timeline(&prepared.timeline));
    out
}

/// Listener-facing line for a failed command, when a playback error caused it
pub fn failure_hint(err: &anyhow::Error) -> Option<String> {
    let app = err.chain().find_map(|cause| cause.downcast_ref::<AppError>())?;
    if app.severity() == ErrorSeverity::Fatal {
        log::error!("{}", app);
    }
    Some(format!("{} ({})", app.user_message(), app.recovery_action()))
}

pub fn render_status(
    position_ms: i64,
    duration_ms: u64,
    speed: f32,
    chapters: Option<&ChapterList>,
    sleep_remaining: Option<&str>,
) -> String {
    let position = position_ms.max(0) as u64;
    let mut line = format!(
        "{} / {}  {:.2}x",
        format_ms(position),
        format_ms(duration_ms),
        speed
    );
    if let Some(chapters) = chapters.filter(|c| !c.is_empty()) {
        line.push_str(&format!("  ch {}", chapters.progress_label(position)));
    }
    if let Some(remaining) = sleep_remaining {
        line.push_str(&format!("  sleep {}", remaining));
    }
    line
}

/// Parse a position given as milliseconds or as `[H:]M:SS`
pub fn parse_position(input: &str) -> Result<i64> {
    let input = input.trim();
    if !input.contains(':') {
        return input
            .parse::<i64>()
            .with_context(|| format!("Invalid position '{}'", input));
    }

    let mut seconds: i64 = 0;
    for part in input.split(':') {
        let value: i64 = part
            .parse()
            .with_context(|| format!("Invalid position '{}'", input))?;
        if value < 0 {
            bail!("Invalid position '{}'", input);
        }
        seconds = seconds
            .checked_mul(60)
            .and_then(|s| s.checked_add(value))
            .with_context(|| format!("Position '{}' is too large", input))?;
    }
    seconds
        .checked_mul(1_000)
        .with_context(|| format!("Position '{}' is too large", input))
}

#[cfg(test)]
mod tests;
