use std::{
    fs::File,
    io::{self, Read, Seek, SeekFrom},
    path::Path,
};

/// Bytes read from the end of a log when looking for its last lines.
const TAIL_WINDOW: u64 = 64 * 1024;

/// Last `lines` lines of a log file. A missing or unreadable log yields nothing.
#[must_use]
pub fn tail(path: &Path, lines: usize) -> Vec<String> {
    match read_tail(path, lines) {
        Ok(tail) => tail,
        Err(err) => {
            tracing::debug!("Cannot read {}: {err}", path.display());
            Vec::new()
        }
    }
}

fn read_tail(path: &Path, lines: usize) -> io::Result<Vec<String>> {
    let mut file = File::open(path)?;
    let len = file.metadata()?.len();
    let start = len.saturating_sub(TAIL_WINDOW);
    file.seek(SeekFrom::Start(start))?;

    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;
    let text = String::from_utf8_lossy(&bytes);

    let mut all: Vec<&str> = text.lines().collect();
    // The first line is likely cut by the window.
    if start > 0 && !all.is_empty() {
        all.remove(0);
    }
    let skip = all.len().saturating_sub(lines);
    Ok(all[skip..].iter().map(|l| (*l).to_owned()).collect())
}
