//! rmg-player command line
//!
//! Plays, inspects and exports binary chiptune scores.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rmg_player::score::Score;
use rmg_player::visualization::{create_block_strip, format_time, note_name};
use rmg_player::{load_score, PlayerConfig};

#[derive(Parser)]
#[command(name = "rmg-player")]
#[command(about = "Play and export binary chiptune scores")]
#[command(version)]
struct Cli {
    /// Player configuration (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Play a score on the default audio device
    Play {
        /// Score file
        file: PathBuf,
    },
    /// Print what a score contains
    Info {
        /// Score file
        file: PathBuf,
    },
    /// Render a score to a WAV file
    ExportWav {
        /// Score file
        file: PathBuf,
        /// Output WAV file
        output: PathBuf,
        /// Normalize the mixdown to prevent clipping
        #[arg(long)]
        normalize: bool,
        /// Fade out over the last N seconds
        #[arg(long, default_value_t = 0.0)]
        fade_out: f32,
    },
    /// Export every block and the chord loop as MIDI files
    ExportMidi {
        /// Score file
        file: PathBuf,
        /// Output directory
        #[arg(long, default_value = "midi_output")]
        dir: PathBuf,
    },
}

fn read_score(path: &Path) -> Result<Arc<Score>> {
    let score = load_score(path).with_context(|| format!("loading {}", path.display()))?;
    Ok(Arc::new(score))
}

fn print_info(path: &Path, score: &Score) {
    let names = |notes: &[u8]| {
        notes
            .iter()
            .map(|&n| note_name(n))
            .collect::<Vec<_>>()
            .join(" ")
    };

    println!("File:              {}", path.display());
    println!("Tempo:             {} bpm", score.tempo());
    println!(
        "Duration:          {} ({} ticks)",
        format_time(score.total_duration()),
        score.total_ticks()
    );
    println!("Sequence:          {}", create_block_strip(score.block_sequence(), None));
    for group in 0..4 {
        println!("Chord {}:           {}", group + 1, names(score.chord(group)));
    }
    println!("Chord pattern:     {:?}", score.chord_pattern());
    println!("Bass notes:        {}", names(&score.bass_notes()[..]));
    println!("Bass pattern:      {:?}", score.bass_pattern());
    println!("Beat pattern:      {:?}", score.beat_pattern());
    for (index, block) in score.blocks().iter().enumerate() {
        let onsets = block.onsets().count();
        let accents = (0..block.steps().len()).filter(|&s| block.is_accent(s)).count();
        println!("Block {index}:           {onsets} notes, {accents} accented");
    }
}

#[cfg(feature = "streaming")]
fn play(score: Arc<Score>, config: &PlayerConfig) -> Result<()> {
    use rmg_player::replayer::{DriverExit, MonotonicClock, PlaybackDriver};
    use rmg_player::visualization::format_status_line;
    use rmg_player::AudioDevice;
    use std::io::{self, BufRead, Write};
    use std::sync::atomic::{AtomicBool, Ordering};

    let device = AudioDevice::new(config).context("opening audio device")?;

    let stop = Arc::new(AtomicBool::new(false));
    let stop_clone = Arc::clone(&stop);
    std::thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(line) if line.trim().eq_ignore_ascii_case("q") => {
                    stop_clone.store(true, Ordering::Relaxed);
                    break;
                }
                Ok(_) => {}
                Err(_) => break,
            }
        }
    });

    println!("Playing. Press [q] then Enter to stop.\n");
    let mut driver = PlaybackDriver::new(Arc::clone(&score), device, MonotonicClock::new())
        .with_frame_interval(config.frame_interval())
        .with_stop_flag(stop);
    let exit = driver.run(|snapshot| {
        print!("\x1B[2K\r{}", format_status_line(snapshot, &score));
        io::stdout().flush().ok();
    });
    println!();

    match exit {
        DriverExit::Finished => println!("Playback complete!"),
        DriverExit::Interrupted => println!("Stopped."),
    }
    Ok(())
}

#[cfg(not(feature = "streaming"))]
fn play(_score: Arc<Score>, _config: &PlayerConfig) -> Result<()> {
    anyhow::bail!("playback requires the \"streaming\" feature. Rebuild with `--features streaming`.")
}

#[cfg(feature = "export-wav")]
fn export_wav(
    score: Arc<Score>,
    output: &Path,
    normalize: bool,
    fade_out: f32,
    config: &PlayerConfig,
) -> Result<()> {
    use rmg_player::export::{export_to_wav_with_config, ExportConfig};

    let export_config = ExportConfig::from_player_config(config)
        .normalize(normalize)
        .fade_out(fade_out);
    let summary = export_to_wav_with_config(score, output, &export_config)
        .with_context(|| format!("writing {}", output.display()))?;
    println!(
        "Wrote {} ({}, {} triggers)",
        output.display(),
        format_time(summary.duration_secs()),
        summary.triggers
    );
    Ok(())
}

#[cfg(not(feature = "export-wav"))]
fn export_wav(_: Arc<Score>, _: &Path, _: bool, _: f32, _: &PlayerConfig) -> Result<()> {
    anyhow::bail!("WAV export requires the \"export-wav\" feature")
}

#[cfg(feature = "export-midi")]
fn export_midi(score: &Score, dir: &Path, config: &PlayerConfig) -> Result<()> {
    let written = rmg_player::export::export_midi(score, dir, config.midi_ticks_per_beat)
        .with_context(|| format!("writing MIDI files to {}", dir.display()))?;
    for path in written {
        println!("Wrote {}", path.display());
    }
    Ok(())
}

#[cfg(not(feature = "export-midi"))]
fn export_midi(_: &Score, _: &Path, _: &PlayerConfig) -> Result<()> {
    anyhow::bail!("MIDI export requires the \"export-midi\" feature")
}

fn main() -> Result<()> {
    env_logger::init(); // Log to stderr (if you run with `RUST_LOG=debug`).
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => PlayerConfig::from_json_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => PlayerConfig::default(),
    };

    match cli.command {
        Command::Play { file } => play(read_score(&file)?, &config),
        Command::Info { file } => {
            let score = read_score(&file)?;
            print_info(&file, &score);
            Ok(())
        }
        Command::ExportWav {
            file,
            output,
            normalize,
            fade_out,
        } => export_wav(read_score(&file)?, &output, normalize, fade_out, &config),
        Command::ExportMidi { file, dir } => {
            let score = read_score(&file)?;
            export_midi(&score, &dir, &config)
        }
    }
}
