use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::atomic::Ordering;

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Deserialize;
use tracing_subscriber::EnvFilter;

use typist::config::{load_config, parse_typo_flag, validate_config};
use typist::editor::{CodeEditorConfig, CodeEditorSession};
use typist::engine::TypingEngine;
use typist::machine::Effect;
use typist::model::TypingConfig;
use typist::planner::{event_for_effect, generate_timeline};
use typist::presets::Preset;
use typist::scheduler::RealtimeLoop;
use typist::scroll_spy::{
    BandObserver, IntersectionSource, ScrollSpy, SectionRect, SelectionPolicy, ViewportBand,
};
use typist::sections::SectionRegistry;
use typist::sim;
use typist::trace::PhaseTracer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum PresetArg {
    Fast,
    Normal,
    Slow,
    Beginner,
    Coding,
}

impl PresetArg {
    fn to_library(self) -> Preset {
        match self {
            PresetArg::Fast => Preset::Fast,
            PresetArg::Normal => Preset::Normal,
            PresetArg::Slow => Preset::Slow,
            PresetArg::Beginner => Preset::Beginner,
            PresetArg::Coding => Preset::Coding,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum PolicyArg {
    /// Section that most recently entered the band.
    Last,
    /// Visible section earliest in the page.
    Topmost,
}

impl PolicyArg {
    fn to_library(self) -> SelectionPolicy {
        match self {
            PolicyArg::Last => SelectionPolicy::LastObservedWins,
            PolicyArg::Topmost => SelectionPolicy::Topmost,
        }
    }
}

#[derive(Debug, Args, Clone)]
struct TypingArgs {
    /// Input text file, or '-' for stdin
    #[arg(long, value_name = "PATH")]
    input: Option<PathBuf>,

    /// JSON typing config; flags below override it
    #[arg(long, value_name = "PATH", conflicts_with = "preset")]
    config: Option<PathBuf>,

    /// Start from a named preset
    #[arg(long, value_enum)]
    preset: Option<PresetArg>,

    /// Nominal delay between chars (ms)
    #[arg(long)]
    speed: Option<u64>,

    /// Delay before the first char (ms)
    #[arg(long)]
    start_delay: Option<u64>,

    /// Jitter half-width as a fraction of speed (0.0-1.0)
    #[arg(long)]
    jitter: Option<f64>,

    /// Scripted typo, AT:WRONG[:PAUSE_MS]; repeatable
    #[arg(long = "typo", value_name = "SPEC")]
    typos: Vec<String>,

    /// Optional RNG seed
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Debug, Parser)]
#[command(name = "typist")]
#[command(about = "Human-like typing animations with scripted typos", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Record a typing run as a JSON timeline
    Plan {
        #[command(flatten)]
        typing: TypingArgs,

        /// Output timeline file (defaults to stdout)
        #[arg(long, value_name = "PATH")]
        output: Option<PathBuf>,
    },

    /// Animate a typing run in this terminal
    Play {
        #[command(flatten)]
        typing: TypingArgs,

        /// Print phase trace lines to stderr
        #[arg(long)]
        trace: bool,
    },

    /// Type a code snippet, then reveal its output
    Editor {
        /// JSON code editor config
        #[arg(long, value_name = "PATH")]
        config: PathBuf,

        /// Optional RNG seed
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Report the active section for a series of scroll offsets
    Spy {
        /// JSON page layout: viewport height and section rectangles
        #[arg(long, value_name = "PATH")]
        layout: PathBuf,

        /// JSON sections list (defaults to the built-in CV chapters)
        #[arg(long, value_name = "PATH")]
        sections: Option<PathBuf>,

        #[arg(long, value_enum, default_value_t = PolicyArg::Last)]
        policy: PolicyArg,

        /// Scroll offsets to visit, in order
        #[arg(long = "scroll", value_name = "PX", required = true)]
        scrolls: Vec<f64>,
    },
}

#[derive(Debug, Deserialize)]
struct PageLayout {
    viewport_height: f64,
    #[serde(default)]
    band: ViewportBand,
    sections: Vec<LaidOutSection>,
}

#[derive(Debug, Deserialize)]
struct LaidOutSection {
    id: String,
    #[serde(flatten)]
    rect: SectionRect,
}

fn read_input(path: &PathBuf) -> Result<String> {
    if path.as_os_str() == std::ffi::OsStr::new("-") {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read stdin")?;
        return Ok(buf);
    }

    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn write_output(path: &PathBuf, contents: &str) -> Result<()> {
    fs::write(path, contents).with_context(|| format!("failed to write {}", path.display()))
}

fn build_config(args: &TypingArgs) -> Result<TypingConfig> {
    let mut cfg = match (&args.config, args.preset) {
        (Some(path), _) => load_config(path)?,
        (None, Some(preset)) => preset.to_library().config(String::new()),
        (None, None) => TypingConfig::default(),
    };

    if let Some(input) = &args.input {
        cfg.text = read_input(input)?;
    }
    if let Some(speed) = args.speed {
        cfg.speed_ms = speed;
    }
    if let Some(start_delay) = args.start_delay {
        cfg.start_delay_ms = start_delay;
    }
    if let Some(jitter) = args.jitter {
        cfg.jitter_ratio = jitter;
    }
    for spec in &args.typos {
        cfg.typos.push(parse_typo_flag(spec)?);
    }

    validate_config(&cfg)?;
    Ok(cfg)
}

fn print_trace_line(line: &str) {
    const RESET: &str = "\x1b[0m";
    const TYPING: &str = "\x1b[34m";
    const TYPO: &str = "\x1b[31m";
    const ERASE: &str = "\x1b[33m";

    if let Some(rest) = line.strip_prefix("Typing") {
        eprintln!("{TYPING}Typing{RESET}{rest}");
    } else if let Some(rest) = line.strip_prefix("Typo") {
        eprintln!("{TYPO}Typo{RESET}{rest}");
    } else if let Some(rest) = line.strip_prefix("Erase") {
        eprintln!("{ERASE}Erase{RESET}{rest}");
    } else {
        eprintln!("{line}");
    }
}

fn render_effect(out: &mut impl Write, effect: &Effect) {
    match effect {
        Effect::Typed { ch, .. } | Effect::TypoTyped { ch } => {
            let _ = write!(out, "{ch}");
        }
        Effect::Erased { .. } => {
            let _ = write!(out, "\x08 \x08");
        }
        Effect::Completed => {
            let _ = writeln!(out);
        }
    }
    let _ = out.flush();
}

fn install_ctrlc(rt: &RealtimeLoop) -> Result<()> {
    let stop = rt.stop_flag();
    ctrlc::set_handler(move || {
        stop.store(true, Ordering::SeqCst);
    })
    .context("failed to install Ctrl+C handler")
}

/// Drive `rt` to idle. On Ctrl+C, `stop` runs before the `aborted` error is returned.
fn run_until_done(rt: &RealtimeLoop, stop: impl FnOnce()) -> Result<()> {
    if let Err(err) = rt.run() {
        stop();
        println!();
        eprintln!("Aborted.");
        return Err(err);
    }
    Ok(())
}

fn play(cfg: &TypingConfig, seed: Option<u64>, trace: bool) -> Result<()> {
    let rt = Rc::new(RealtimeLoop::new());
    install_ctrlc(&rt)?;

    let mut tracer = PhaseTracer::new(cfg);
    let engine = match seed {
        Some(seed) => TypingEngine::with_seed(rt.clone(), seed),
        None => TypingEngine::new(rt.clone()),
    }
    .on_change(move |effect, _| {
        if trace {
            if let Some(line) = tracer.observe(&event_for_effect(effect)) {
                print_trace_line(&line);
            }
        }
        render_effect(&mut io::stdout().lock(), effect);
    });

    engine.start(cfg)?;
    run_until_done(&rt, || engine.cancel())
}

fn run_editor(path: &PathBuf, seed: Option<u64>) -> Result<()> {
    let json =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let cfg: CodeEditorConfig =
        serde_json::from_str(&json).context("failed to parse code editor config JSON")?;

    let rt = Rc::new(RealtimeLoop::new());
    install_ctrlc(&rt)?;

    let engine = match seed {
        Some(seed) => TypingEngine::with_seed(rt.clone(), seed),
        None => TypingEngine::new(rt.clone()),
    }
    .on_change(|effect, _| render_effect(&mut io::stdout().lock(), effect));
    let session = CodeEditorSession::with_engine(rt.clone(), engine);

    eprintln!("-- {} ({}) --", cfg.file_name, cfg.language);
    session.start(&cfg)?;
    if !cfg.show_typing {
        println!("{}", session.display_code());
    }

    run_until_done(&rt, || session.cancel())?;
    if session.output_visible() {
        println!("-> {}", cfg.output);
    }
    Ok(())
}

fn run_spy(
    layout_path: &PathBuf,
    sections_path: Option<&PathBuf>,
    policy: PolicyArg,
    scrolls: &[f64],
) -> Result<()> {
    let registry = match sections_path {
        Some(path) => SectionRegistry::load(path)?,
        None => SectionRegistry::builtin(),
    };
    if registry.enabled().next().is_none() {
        return Err(anyhow!("no enabled sections to track"));
    }

    let json = fs::read_to_string(layout_path)
        .with_context(|| format!("failed to read {}", layout_path.display()))?;
    let layout: PageLayout = serde_json::from_str(&json).context("failed to parse layout JSON")?;

    let mut observer = BandObserver::new(layout.viewport_height, layout.band);
    for section in &layout.sections {
        observer.set_layout(&section.id, section.rect);
    }

    let spy = ScrollSpy::new(&registry, policy.to_library());
    spy.connect(&mut observer);

    for &y in scrolls {
        observer.scroll_to(y);
        let active = spy.active_section();
        println!(
            "scroll {y:>8.1} -> {active} ({}%)",
            registry.progress_percent(&active)
        );
    }
    observer.disconnect();
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Command::Plan { typing, output } => {
            let cfg = build_config(&typing)?;
            let seed = typing.seed.unwrap_or_else(rand::random);
            let timeline = generate_timeline(cfg, seed)?;

            let stats = sim::stats(&timeline);
            eprintln!(
                "Planned: {} events, {} chars, {} typo chars, ~{:.1} s (seed {seed})",
                stats.events,
                stats.typed,
                stats.typo_chars,
                (stats.total_wait_ms as f64) / 1000.0
            );

            let json =
                serde_json::to_string_pretty(&timeline).context("failed to serialize timeline")?;
            if let Some(out) = output {
                write_output(&out, &json)?;
            } else {
                println!("{json}");
            }
        }
        Command::Play { typing, trace } => {
            let cfg = build_config(&typing)?;
            play(&cfg, typing.seed, trace)?;
        }
        Command::Editor { config, seed } => {
            run_editor(&config, seed)?;
        }
        Command::Spy {
            layout,
            sections,
            policy,
            scrolls,
        } => {
            run_spy(&layout, sections.as_ref(), policy, &scrolls)?;
        }
    }

    Ok(())
}
