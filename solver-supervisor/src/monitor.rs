use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Owns a per-run temp directory holding the four files produced for every
/// command dispatched to a solver child: `<name>.log` (human-readable
/// trace), `<name>.events.jsonl` (structured event log), `<name>.stdout`
/// (a transcript of notifications received), and `<name>.stderr` (the
/// child's raw standard-error stream). Names are distinguished by an
/// incrementing counter so the "latest file of each kind" accessors below
/// have something to pick between.
pub struct ProcessMonitor {
    dir: PathBuf,
    counter: u32,
}

impl ProcessMonitor {
    pub fn create(log_directory_root: Option<&Path>) -> std::io::Result<Self> {
        let dir = match log_directory_root {
            Some(root) => {
                std::fs::create_dir_all(root)?;
                tempfile::Builder::new().prefix("solver-run-").tempdir_in(root)?.into_path()
            }
            None => tempfile::Builder::new().prefix("solver-run-").tempdir()?.into_path(),
        };
        Ok(ProcessMonitor { dir, counter: 0 })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Allocate a fresh basename for the next command's log quartet.
    pub fn begin_command(&mut self, command_name: &str) -> String {
        self.counter += 1;
        format!("{:04}-{}", self.counter, command_name.to_ascii_lowercase())
    }

    pub fn log_path(&self, run_name: &str) -> PathBuf {
        self.dir.join(format!("{run_name}.log"))
    }

    pub fn events_path(&self, run_name: &str) -> PathBuf {
        self.dir.join(format!("{run_name}.events.jsonl"))
    }

    pub fn stdout_path(&self, run_name: &str) -> PathBuf {
        self.dir.join(format!("{run_name}.stdout"))
    }

    pub fn stderr_path(&self, run_name: &str) -> PathBuf {
        self.dir.join(format!("{run_name}.stderr"))
    }

    pub fn append_stdout_line(&self, run_name: &str, line: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(self.stdout_path(run_name))?;
        writeln!(file, "{line}")
    }

    fn latest_with_suffix(&self, suffix: &str) -> Option<PathBuf> {
        let mut candidates: Vec<PathBuf> = std::fs::read_dir(&self.dir)
            .ok()?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| name.ends_with(suffix))
            })
            .collect();
        candidates.sort_by_key(|path| {
            std::fs::metadata(path)
                .and_then(|meta| meta.modified())
                .unwrap_or(std::time::SystemTime::UNIX_EPOCH)
        });
        candidates.pop()
    }

    pub fn last_log_path(&self) -> Option<PathBuf> {
        self.latest_with_suffix(".log")
    }

    pub fn last_event_log_path(&self) -> Option<PathBuf> {
        self.latest_with_suffix(".events.jsonl")
    }

    pub fn last_stdout_path(&self) -> Option<PathBuf> {
        self.latest_with_suffix(".stdout")
    }

    pub fn last_stderr_path(&self) -> Option<PathBuf> {
        self.latest_with_suffix(".stderr")
    }

    pub fn log_lines(&self) -> std::io::Result<Vec<String>> {
        read_lines_or_empty(self.last_log_path())
    }

    pub fn output_lines(&self) -> std::io::Result<Vec<String>> {
        read_lines_or_empty(self.last_stdout_path())
    }

    pub fn error_lines(&self) -> std::io::Result<Vec<String>> {
        read_lines_or_empty(self.last_stderr_path())
    }

    pub fn event_records(&self) -> std::io::Result<Vec<serde_json::Value>> {
        let lines = read_lines_or_empty(self.last_event_log_path())?;
        Ok(lines.iter().filter_map(|line| serde_json::from_str(line).ok()).collect())
    }

    pub fn finalize(self) -> std::io::Result<()> {
        std::fs::remove_dir_all(&self.dir)
    }
}

fn read_lines_or_empty(path: Option<PathBuf>) -> std::io::Result<Vec<String>> {
    match path {
        Some(path) => Ok(std::fs::read_to_string(path)?.lines().map(str::to_string).collect()),
        None => Ok(Vec::new()),
    }
}
