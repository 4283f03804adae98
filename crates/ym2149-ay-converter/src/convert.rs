//! Per-song conversion pipeline: load, classify, render, encode, write.
//!
//! Every song gets a fresh [`AyMachine`] and CPU instance. A song that
//! cannot be rendered never aborts the others; only a broken container makes
//! [`convert_file`] return `Err`.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use log::{info, warn};
use tempfile::NamedTempFile;

use crate::classifier::PortUsage;
use crate::config::ConvertConfig;
use crate::cpu_backend::{DefaultCpu, Z80Core};
use crate::driver::{EmulationDriver, RenderSetup, StopReason};
use crate::error::{AyError, Result};
use crate::format::{AyFile, AySong};
use crate::machine::AyMachine;
use crate::memory::{install_trampoline, load_blocks, reset_layout};
use crate::parser::load_ay;
use crate::platform::{FRAME_RATE, Platform};
use crate::ym::{YmAttributes, YmDocument, YmMetadata, encode_ym6};

/// Extension of written files.
pub const YM_EXTENSION: &str = "ym";

/// What happened to one song.
#[derive(Debug)]
pub enum SongOutcome {
    /// A YM file was written.
    Written {
        /// Output file.
        path: PathBuf,
        /// Frames stored after trimming trailing silence.
        frames: usize,
        /// Platform the song was emulated as.
        platform: Platform,
        /// Why emulation stopped.
        stop: StopReason,
    },
    /// No platform could be determined; nothing was emulated.
    UnknownPlatform {
        /// Whether a stale output file was deleted.
        removed: bool,
    },
    /// The render produced only silence.
    Empty {
        /// Whether a stale output file was deleted.
        removed: bool,
    },
    /// The song record is unusable.
    Skipped {
        /// Human-readable reason.
        reason: String,
    },
    /// Rendering or writing failed.
    Failed {
        /// Underlying error.
        error: AyError,
    },
}

/// Outcome of one song, tagged with its position and name.
#[derive(Debug)]
pub struct SongReport {
    /// Zero-based index in the song table.
    pub index: usize,
    /// Song name (or placeholder).
    pub name: String,
    /// Result of the conversion.
    pub outcome: SongOutcome,
}

/// Decides where a song's YM file goes.
pub trait OutputNaming {
    /// Output path for `song`.
    fn output_path(&self, song: &AySong) -> PathBuf;
}

/// Names outputs `"<stem> - <song>.ym"` inside one directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryNaming {
    directory: PathBuf,
    stem: String,
}

impl DirectoryNaming {
    /// Place files in `directory`, prefixed with `stem`.
    pub fn new(directory: impl Into<PathBuf>, stem: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            stem: stem.into(),
        }
    }

    /// Name outputs after `input`, in `output_dir` or next to the input.
    pub fn for_input(input: &Path, output_dir: Option<&Path>) -> Self {
        let directory = match output_dir {
            Some(dir) => dir.to_path_buf(),
            None => input
                .parent()
                .filter(|parent| !parent.as_os_str().is_empty())
                .map_or_else(|| PathBuf::from("."), Path::to_path_buf),
        };
        let stem = input
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "song".to_string());
        Self::new(directory, stem)
    }
}

impl OutputNaming for DirectoryNaming {
    fn output_path(&self, song: &AySong) -> PathBuf {
        let file_name = sanitize_file_name(&format!("{} - {}", self.stem, song.name));
        self.directory.join(format!("{file_name}.{YM_EXTENSION}"))
    }
}

/// Replace characters that are not allowed in file names with `_`.
pub fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}

/// Convert every selected song of an AY container using the default CPU.
pub fn convert_file(
    data: &[u8],
    config: &ConvertConfig,
    naming: &dyn OutputNaming,
) -> Result<Vec<SongReport>> {
    convert_file_with::<DefaultCpu>(data, config, naming)
}

/// Convert every selected song of an AY container with CPU backend `C`.
pub fn convert_file_with<C: Z80Core>(
    data: &[u8],
    config: &ConvertConfig,
    naming: &dyn OutputNaming,
) -> Result<Vec<SongReport>> {
    let ay = load_ay(data)?;
    info!(
        "{} song(s), author '{}', first song {}",
        ay.songs.len(),
        ay.header.author,
        ay.header.first_song_index
    );

    let reports = ay
        .songs
        .iter()
        .filter(|song| config.selects(song.index))
        .map(|song| {
            let outcome = convert_song::<C>(data, &ay, song, config, naming);
            log_outcome(song, &outcome);
            SongReport {
                index: song.index,
                name: song.name.clone(),
                outcome,
            }
        })
        .collect();
    Ok(reports)
}

/// Read `input` and convert it, writing next to it or into `output_dir`.
pub fn convert_path(
    input: &Path,
    output_dir: Option<&Path>,
    config: &ConvertConfig,
) -> Result<Vec<SongReport>> {
    let data = fs::read(input)?;
    let naming = DirectoryNaming::for_input(input, output_dir);
    convert_file(&data, config, &naming)
}

fn convert_song<C: Z80Core>(
    data: &[u8],
    ay: &AyFile,
    song: &AySong,
    config: &ConvertConfig,
    naming: &dyn OutputNaming,
) -> SongOutcome {
    let Some(song_data) = song.data.as_ref() else {
        return SongOutcome::Skipped {
            reason: "invalid song record".to_string(),
        };
    };
    let Some(points) = song_data.points else {
        return SongOutcome::Skipped {
            reason: "missing or truncated points block".to_string(),
        };
    };
    let path = naming.output_path(song);

    let mut machine = AyMachine::new(Platform::Unknown);
    let mut usage = PortUsage::new();
    {
        let memory = machine.memory_mut();
        reset_layout(memory);
        install_trampoline(memory, &points);
        let summary = load_blocks(memory, data, &song_data.blocks, &mut usage);
        if summary.halted {
            warn!(
                "song {}: block loading stopped after {} block(s)",
                song.index + 1,
                summary.loaded
            );
        }
    }

    let platform = usage.resolve(points.init);
    if platform == Platform::Unknown {
        return match remove_artifact(&path) {
            Ok(removed) => SongOutcome::UnknownPlatform { removed },
            Err(error) => SongOutcome::Failed { error },
        };
    }
    machine.set_platform(platform);

    let setup = RenderSetup::new(song_data, points, config);
    let render = match EmulationDriver::new(C::new(), &machine, setup)
        .and_then(|driver| driver.run(&mut machine))
    {
        Ok(render) => render,
        Err(error) => return failed(&path, error),
    };

    let mut frames = render.frames;
    frames.trim_trailing_silence();
    if frames.is_empty() {
        return match remove_artifact(&path) {
            Ok(removed) => SongOutcome::Empty { removed },
            Err(error) => SongOutcome::Failed { error },
        };
    }

    let doc = YmDocument {
        attributes: if config.interleaved {
            YmAttributes::INTERLEAVED
        } else {
            YmAttributes::empty()
        },
        master_clock: platform.psg_clock(),
        frame_rate: FRAME_RATE,
        loop_frame: 0,
        metadata: YmMetadata {
            title: song.name.clone(),
            author: ay.header.author.clone(),
            comment: config.comment.clone(),
        },
        frames: frames.into_frames(),
    };
    let frame_count = doc.frames.len();
    if let Err(error) = write_atomic(&path, &encode_ym6(&doc)) {
        return failed(&path, error);
    }

    SongOutcome::Written {
        path,
        frames: frame_count,
        platform,
        stop: render.report.stop,
    }
}

/// Report `error`, dropping any output left over from an earlier run.
fn failed(path: &Path, error: AyError) -> SongOutcome {
    if let Err(cleanup) = remove_artifact(path) {
        warn!("could not remove stale {}: {cleanup}", path.display());
    }
    SongOutcome::Failed { error }
}

fn log_outcome(song: &AySong, outcome: &SongOutcome) {
    let n = song.index + 1;
    match outcome {
        SongOutcome::Written {
            path,
            frames,
            platform,
            stop,
        } => info!(
            "song {n} '{}': {platform}, {frames} frames ({stop:?}) -> {}",
            song.name,
            path.display()
        ),
        SongOutcome::UnknownPlatform { .. } => {
            warn!("song {n} '{}': unknown platform, skipped", song.name)
        }
        SongOutcome::Empty { .. } => warn!("song {n} '{}': render is silent", song.name),
        SongOutcome::Skipped { reason } => warn!("song {n} '{}': {reason}", song.name),
        SongOutcome::Failed { error } => warn!("song {n} '{}': {error}", song.name),
    }
}

/// Write `bytes` to `path` through a temporary file in the same directory,
/// so readers never observe a partial file.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let directory = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut file = NamedTempFile::new_in(directory)?;
    file.write_all(bytes)?;
    file.flush()?;
    file.persist(path).map_err(|err| AyError::Io(err.error))?;
    Ok(())
}

/// Delete a previously written output. Returns whether a file was removed.
pub fn remove_artifact(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn song(name: &str) -> AySong {
        AySong {
            index: 0,
            name: name.to_string(),
            data: None,
        }
    }

    #[test]
    fn names_follow_input_stem() {
        let naming = DirectoryNaming::for_input(Path::new("/music/Tune.final.ay"), None);
        assert_eq!(
            naming.output_path(&song("Intro")),
            PathBuf::from("/music/Tune.final - Intro.ym")
        );

        let naming = DirectoryNaming::for_input(Path::new(".ay"), Some(Path::new("out")));
        assert_eq!(
            naming.output_path(&song("A")),
            PathBuf::from("out/.ay - A.ym")
        );

        let naming = DirectoryNaming::for_input(Path::new("plain.ay"), None);
        assert_eq!(
            naming.output_path(&song("A")),
            PathBuf::from("./plain - A.ym")
        );
    }

    #[test]
    fn sanitizes_reserved_characters() {
        assert_eq!(sanitize_file_name("a/b\\c:d*e?f\"g<h>i|j"), "a_b_c_d_e_f_g_h_i_j");
        assert_eq!(sanitize_file_name("tab\there\n"), "tab_here_");
        assert_eq!(sanitize_file_name("Ünïcode ok"), "Ünïcode ok");
    }

    #[test]
    fn atomic_write_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.ym");
        fs::write(&path, b"old contents that are longer").unwrap();
        write_atomic(&path, b"new").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"new");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn remove_artifact_reports_presence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gone.ym");
        assert!(!remove_artifact(&path).unwrap());
        fs::write(&path, b"x").unwrap();
        assert!(remove_artifact(&path).unwrap());
        assert!(!path.exists());
    }

    #[test]
    fn failed_song_drops_stale_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tune - Song.ym");
        fs::write(&path, b"old render").unwrap();
        let outcome = failed(&path, AyError::Allocation { frames: 10 });
        assert!(matches!(
            outcome,
            SongOutcome::Failed {
                error: AyError::Allocation { frames: 10 }
            }
        ));
        assert!(!path.exists());

        // Nothing to clean up is still a plain failure.
        let outcome = failed(&path, AyError::from("write failed"));
        assert!(matches!(outcome, SongOutcome::Failed { .. }));
    }

    #[test]
    fn broken_container_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let naming = DirectoryNaming::new(dir.path(), "x");
        let err = convert_file(b"ZXAYEMUL", &ConvertConfig::default(), &naming).unwrap_err();
        assert!(err.is_format_error());
    }
}
