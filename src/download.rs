// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Asset fetching: the validation image archive and both checkpoints.
//!
//! Every download streams into a `.part` file next to its destination and is
//! renamed into place only once complete. Failures are never retried.

use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::error::{DetectError, Result};

/// Published location of the validation image archive.
pub const DATASET_URL: &str = "https://www.dropbox.com/s/yj942v71dtqg1ua/val2019p.zip?dl=1";

/// Connection timeout in seconds.
const CONNECT_TIMEOUT: u64 = 30;

/// Read timeout in seconds.
const READ_TIMEOUT: u64 = 300;

/// Width of the progress bar in characters.
const BAR_WIDTH: usize = 12;

/// Minimum seconds between progress redraws.
const MIN_UPDATE_INTERVAL: f64 = 0.1;

/// What the fetcher downloads and where it puts it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetPlan {
    /// Dataset archive URL.
    pub dataset_url: String,
    /// Local path of the downloaded archive.
    pub archive_path: PathBuf,
    /// Directory the archive is extracted into. Must not exist yet.
    pub extract_dir: PathBuf,
    /// `(url, destination)` of every checkpoint.
    pub checkpoints: Vec<(String, PathBuf)>,
}

/// Download and unpack everything listed in `plan`.
///
/// # Errors
///
/// Returns [`DetectError::ArchiveError`] if the extraction directory already
/// exists or the archive is malformed, and [`DetectError::DownloadError`] on
/// any network or write failure.
pub fn fetch_assets(plan: &AssetPlan) -> Result<()> {
    if plan.extract_dir.exists() {
        return Err(DetectError::ArchiveError(format!(
            "Extraction directory {} already exists (pass --skip_download to reuse it)",
            plan.extract_dir.display()
        )));
    }

    crate::section!("Downloading images...");
    download_file(&plan.dataset_url, &plan.archive_path)?;
    extract_archive(&plan.archive_path, &plan.extract_dir)?;
    crate::success!("Done!");

    crate::section!("Downloading models...");
    for (url, dest) in &plan.checkpoints {
        download_file(url, dest)?;
    }
    crate::success!("Done!");
    Ok(())
}

/// Unpack a zip archive into a directory that is created here.
///
/// # Errors
///
/// Returns [`DetectError::ArchiveError`] if `dest` exists, cannot be
/// created, or the archive cannot be read.
pub fn extract_archive(archive: &Path, dest: &Path) -> Result<()> {
    let file = File::open(archive).map_err(|e| {
        DetectError::ArchiveError(format!("Failed to open {}: {e}", archive.display()))
    })?;
    let mut zip = zip::ZipArchive::new(file)
        .map_err(|e| DetectError::ArchiveError(format!("{}: {e}", archive.display())))?;

    fs::create_dir(dest).map_err(|e| {
        DetectError::ArchiveError(format!("Failed to create {}: {e}", dest.display()))
    })?;
    zip.extract(dest)
        .map_err(|e| DetectError::ArchiveError(format!("{}: {e}", archive.display())))?;

    crate::verbose!(
        "Extracted {} entries from '{}' to '{}'",
        zip.len(),
        archive.display(),
        dest.display()
    );
    Ok(())
}

/// Download a file from URL to the specified path with progress bar.
///
/// # Errors
///
/// Returns [`DetectError::DownloadError`] on connection, HTTP, read, write
/// or size-mismatch failures. The partial file is removed in every case.
pub fn download_file(url: &str, dest: &Path) -> Result<()> {
    let config = ureq::Agent::config_builder()
        .timeout_connect(Some(Duration::from_secs(CONNECT_TIMEOUT)))
        .timeout_recv_body(Some(Duration::from_secs(READ_TIMEOUT)))
        .build();
    let agent = ureq::Agent::new_with_config(config);

    let response = agent.get(url).call().map_err(|e| {
        let msg = match &e {
            ureq::Error::Timeout(_) => format!("Connection timed out while downloading {url}"),
            ureq::Error::StatusCode(code) => format!("HTTP {code} while downloading {url}"),
            ureq::Error::Io(io_err) => format!("Network error downloading {url}: {io_err}"),
            _ => format!("Failed to download {url}: {e}"),
        };
        DetectError::DownloadError(msg)
    })?;

    let content_length: Option<u64> = response
        .headers()
        .get("content-length")
        .and_then(|v| v.to_str().ok())
        .and_then(|s: &str| s.parse().ok());

    let temp_path = partial_path(dest);
    let _ = fs::remove_file(&temp_path);

    let reader = response.into_body().into_reader();
    let desc = format!("Downloading {url} to '{}'", dest.display());

    let downloaded = match stream_to_file(reader, &temp_path, content_length, &desc) {
        Ok(n) => n,
        Err(e) => {
            let _ = fs::remove_file(&temp_path);
            return Err(e);
        }
    };

    if let Some(expected) = content_length {
        if downloaded != expected {
            let _ = fs::remove_file(&temp_path);
            return Err(DetectError::DownloadError(format!(
                "Incomplete download of {url}: got {downloaded} of {expected} bytes"
            )));
        }
    }

    fs::rename(&temp_path, dest).map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        DetectError::DownloadError(format!(
            "Failed to move downloaded file to {}: {e}",
            dest.display()
        ))
    })
}

/// `<dest>.part`, keeping any existing extension (`model.onnx.part`).
fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_os_string();
    name.push(".part");
    PathBuf::from(name)
}

/// Copy `reader` into a new file at `path`, drawing progress on stderr.
fn stream_to_file(
    mut reader: impl Read,
    path: &Path,
    total: Option<u64>,
    desc: &str,
) -> Result<u64> {
    let file = File::create(path).map_err(|e| {
        DetectError::DownloadError(format!(
            "Failed to create temp file {}: {e}",
            path.display()
        ))
    })?;
    let mut writer = BufWriter::new(file);
    let mut progress = Progress::new(desc, total);
    let mut buffer = [0u8; 65536];

    loop {
        let bytes_read = reader.read(&mut buffer).map_err(|e| {
            DetectError::DownloadError(format!("Failed to read from network: {e}"))
        })?;
        if bytes_read == 0 {
            break;
        }
        writer.write_all(&buffer[..bytes_read]).map_err(|e| {
            DetectError::DownloadError(format!("Failed to write to temp file: {e}"))
        })?;
        progress.advance(bytes_read as u64);
    }

    writer
        .flush()
        .map_err(|e| DetectError::DownloadError(format!("Failed to flush temp file: {e}")))?;
    progress.finish();
    Ok(progress.downloaded)
}

/// Single-line progress display.
struct Progress<'a> {
    desc: &'a str,
    total: Option<u64>,
    downloaded: u64,
    start: Instant,
    last_draw: Instant,
}

impl<'a> Progress<'a> {
    fn new(desc: &'a str, total: Option<u64>) -> Self {
        let now = Instant::now();
        Self {
            desc,
            total: total.filter(|&t| t > 0),
            downloaded: 0,
            start: now,
            last_draw: now,
        }
    }

    fn advance(&mut self, bytes: u64) {
        self.downloaded += bytes;
        let now = Instant::now();
        if now.duration_since(self.last_draw).as_secs_f64() < MIN_UPDATE_INTERVAL {
            return;
        }
        self.last_draw = now;
        eprint!("\r\x1b[K{}", self.line(false));
        io::stderr().flush().ok();
    }

    fn finish(&self) {
        eprintln!("\r\x1b[K{}", self.line(true));
    }

    fn line(&self, done: bool) -> String {
        let elapsed = self.start.elapsed().as_secs_f64();
        let rate = if elapsed > 0.0 {
            self.downloaded as f64 / elapsed
        } else {
            0.0
        };
        match self.total {
            Some(total) => {
                let fraction = if done {
                    1.0
                } else {
                    (self.downloaded as f64 / total as f64).min(1.0)
                };
                format!(
                    "{}: {}% {} {}/{} {}/s {}",
                    self.desc,
                    (fraction * 100.0) as u8,
                    generate_bar(fraction, BAR_WIDTH),
                    format_bytes(self.downloaded as f64),
                    format_bytes(total as f64),
                    format_bytes(rate),
                    format_time(elapsed)
                )
            }
            None => format!(
                "{}: {} {}/s {}",
                self.desc,
                format_bytes(self.downloaded as f64),
                format_bytes(rate),
                format_time(elapsed)
            ),
        }
    }
}

/// Format bytes as human-readable string (e.g., "10.4MB").
fn format_bytes(bytes: f64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    const GB: f64 = MB * 1024.0;

    if bytes >= GB {
        format!("{:.1}GB", bytes / GB)
    } else if bytes >= MB {
        format!("{:.1}MB", bytes / MB)
    } else if bytes >= KB {
        format!("{:.1}KB", bytes / KB)
    } else {
        format!("{bytes:.0}B")
    }
}

/// Format time duration.
fn format_time(seconds: f64) -> String {
    if seconds < 60.0 {
        format!("{seconds:.1}s")
    } else {
        let mins = (seconds / 60.0) as u32;
        format!("{mins}:{:04.1}", seconds % 60.0)
    }
}

/// Generate progress bar string.
fn generate_bar(progress: f64, width: usize) -> String {
    let filled = (progress * width as f64) as usize;
    let mut bar = "━".repeat(filled);
    bar.push_str(&"─".repeat(width.saturating_sub(filled)));
    bar
}
