//! Streaming literal search/replace
//!
//! Input is read in fixed-size chunks so a file never has to be resident in
//! memory. Output goes to a temporary file next to the target, and that file
//! is only renamed over the original when at least one occurrence was found.

use crate::error::TaskError;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Default read size for each chunk of input.
pub const DEFAULT_CHUNK_SIZE: usize = 16 * 1024;

const WRITE_BUFFER_SIZE: usize = 4096;

/// Outcome of running a job over one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileResult {
    pub path: PathBuf,
    pub match_count: usize,
    /// True only when the file was actually rewritten.
    pub mutated: bool,
}

/// One find/replace pass over a set of target files.
#[derive(Debug, Clone)]
pub struct ReplaceJob {
    pattern: Vec<u8>,
    replacement: Vec<u8>,
    verbose: bool,
    dry_run: bool,
    chunk_size: usize,
}

impl ReplaceJob {
    /// Create a job. The pattern must be non-empty; the replacement may be empty.
    pub fn new(pattern: impl Into<Vec<u8>>, replacement: impl Into<Vec<u8>>) -> Result<Self, TaskError> {
        let pattern = pattern.into();
        if pattern.is_empty() {
            return Err(TaskError::configuration("find pattern must not be empty"));
        }

        Ok(Self {
            pattern,
            replacement: replacement.into(),
            verbose: false,
            dry_run: false,
            chunk_size: DEFAULT_CHUNK_SIZE,
        })
    }

    /// Build a job from possibly-unset task parameters.
    pub fn from_parameters(find: Option<&str>, replace: Option<&str>) -> Result<Self, TaskError> {
        match (find, replace) {
            (Some(find), Some(replace)) => Self::new(find, replace),
            (None, _) => Err(TaskError::configuration("find is not set")),
            (_, None) => Err(TaskError::configuration("replace is not set")),
        }
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Count matches without ever promoting the rewritten output.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Override the read size. Values below 1 are clamped to 1.
    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Copy `input` to `output`, replacing every non-overlapping occurrence
    /// of the pattern, leftmost first. Returns the number of replacements.
    ///
    /// At most `pattern.len() - 1` bytes are carried between reads, since a
    /// longer unmatched tail cannot hold the start of an occurrence.
    pub fn replace_stream<R: Read, W: Write>(&self, input: R, output: &mut W) -> io::Result<usize> {
        self.stream(input, &mut Passthrough(output))
    }

    fn stream<R: Read, O: RewriteOutput>(&self, mut input: R, output: &mut O) -> io::Result<usize> {
        let len = self.pattern.len();
        let mut chunk = vec![0u8; self.chunk_size];
        let mut pending: Vec<u8> = Vec::with_capacity(self.chunk_size + len);
        let mut match_count = 0;

        loop {
            let n = match input.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            pending.extend_from_slice(&chunk[..n]);

            let mut start = 0;
            while let Some(idx) = find(&pending[start..], &self.pattern) {
                if match_count == 0 {
                    output.first_match()?;
                }
                output.write_all(&pending[start..start + idx])?;
                output.write_all(&self.replacement)?;
                start += idx + len;
                match_count += 1;
            }

            let tail = pending.len() - start;
            if tail > len {
                let flush = tail - (len - 1);
                output.write_all(&pending[start..start + flush])?;
                start += flush;
            }
            pending.drain(..start);
        }

        output.write_all(&pending)?;
        Ok(match_count)
    }

    /// Run the job over a file on disk.
    ///
    /// The file is first searched without writing anything, so files without
    /// an occurrence (and every file in a dry run) only need to be readable.
    /// Matching files are then streamed a second time into the rewrite.
    pub fn replace_file(&self, path: &Path) -> Result<FileResult, TaskError> {
        let input = File::open(path).map_err(|e| TaskError::io(path, e))?;
        let match_count = self
            .replace_stream(input, &mut io::sink())
            .map_err(|e| TaskError::io(path, e))?;

        if match_count == 0 || self.dry_run {
            return Ok(untouched(path, match_count));
        }

        let input = File::open(path).map_err(|e| TaskError::io(path, e))?;
        let output = TempOutput::create(parent_dir(path)).map_err(|e| TaskError::io(path, e))?;
        self.rewrite(path, input, output)
    }

    /// Stream `input` through the job and, if anything matched, atomically
    /// replace `target` with the result.
    ///
    /// The temporary output is created in `target`'s directory when the first
    /// occurrence is found; the bytes before it are held in memory until then.
    /// It is removed on every path that does not promote it, so a failed read
    /// or write never leaves `target` partially written.
    pub fn replace_into<R: Read>(&self, target: &Path, input: R) -> Result<FileResult, TaskError> {
        if self.dry_run {
            let match_count = self
                .replace_stream(input, &mut io::sink())
                .map_err(|e| TaskError::io(target, e))?;
            return Ok(untouched(target, match_count));
        }

        self.rewrite(target, input, TempOutput::deferred(parent_dir(target)))
    }

    fn rewrite<R: Read>(&self, target: &Path, input: R, mut output: TempOutput) -> Result<FileResult, TaskError> {
        let match_count = self
            .stream(input, &mut output)
            .map_err(|e| TaskError::io(target, e))?;

        let Some(writer) = output.file else {
            return Ok(untouched(target, match_count));
        };
        // On failure the IntoInnerError still owns the temp file and deletes it on drop.
        let temp_file = writer.into_inner().map_err(|e| TaskError::io(target, e.into_error()))?;

        if match_count == 0 {
            temp_file.close().map_err(|e| TaskError::io(target, e))?;
            return Ok(untouched(target, 0));
        }

        // Temp files are created 0600; keep the original's mode.
        if let Ok(metadata) = fs::metadata(target) {
            temp_file
                .as_file()
                .set_permissions(metadata.permissions())
                .map_err(|e| TaskError::io(target, e))?;
        }

        // On failure the PersistError still owns the temp file and deletes it on drop.
        temp_file.persist(target).map_err(|e| TaskError::io(target, e.error))?;

        Ok(FileResult {
            path: target.to_path_buf(),
            match_count,
            mutated: true,
        })
    }
}

fn untouched(path: &Path, match_count: usize) -> FileResult {
    FileResult {
        path: path.to_path_buf(),
        match_count,
        mutated: false,
    }
}

fn parent_dir(target: &Path) -> &Path {
    match target.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    }
}

/// Output that is told when the first occurrence is found.
trait RewriteOutput: Write {
    fn first_match(&mut self) -> io::Result<()> {
        Ok(())
    }
}

struct Passthrough<'w, W: Write>(&'w mut W);

impl<W: Write> Write for Passthrough<'_, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.flush()
    }
}

impl<W: Write> RewriteOutput for Passthrough<'_, W> {}

/// Temporary file next to the target, possibly not created yet.
///
/// A deferred output buffers what it is given and only creates the file on
/// the first occurrence, so a directory that cannot be written to never
/// fails a file that has nothing to replace.
struct TempOutput {
    dir: PathBuf,
    prefix: Vec<u8>,
    file: Option<BufWriter<NamedTempFile>>,
}

impl TempOutput {
    fn deferred(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
            prefix: Vec::new(),
            file: None,
        }
    }

    fn create(dir: &Path) -> io::Result<Self> {
        let mut output = Self::deferred(dir);
        output.open()?;
        Ok(output)
    }

    fn open(&mut self) -> io::Result<()> {
        if self.file.is_some() {
            return Ok(());
        }
        let temp_file = NamedTempFile::new_in(&self.dir)?;
        let mut writer = BufWriter::with_capacity(WRITE_BUFFER_SIZE, temp_file);
        writer.write_all(&self.prefix)?;
        self.prefix = Vec::new();
        self.file = Some(writer);
        Ok(())
    }
}

impl Write for TempOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.file.as_mut() {
            Some(writer) => writer.write(buf),
            None => {
                self.prefix.extend_from_slice(buf);
                Ok(buf.len())
            }
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.file.as_mut() {
            Some(writer) => writer.flush(),
            None => Ok(()),
        }
    }
}

impl RewriteOutput for TempOutput {
    fn first_match(&mut self) -> io::Result<()> {
        self.open()
    }
}

/// Position of the first occurrence of `needle` in `haystack`.
fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|window| window == needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tempfile::TempDir;

    fn run(job: &ReplaceJob, input: &str) -> (String, usize) {
        let mut out = Vec::new();
        let count = job.replace_stream(Cursor::new(input.as_bytes()), &mut out).unwrap();
        (String::from_utf8(out).unwrap(), count)
    }

    /// Reader that yields some bytes and then fails.
    struct FailingReader {
        data: Cursor<Vec<u8>>,
    }

    impl Read for FailingReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.data.read(buf)? {
                0 => Err(io::Error::other("simulated read failure")),
                n => Ok(n),
            }
        }
    }

    #[test]
    fn test_empty_pattern_rejected() {
        let err = ReplaceJob::new("", "x").unwrap_err();
        assert!(matches!(err, TaskError::Configuration(_)));
    }

    #[test]
    fn test_unset_parameters_rejected() {
        assert!(matches!(
            ReplaceJob::from_parameters(None, Some("x")),
            Err(TaskError::Configuration(_))
        ));
        assert!(matches!(
            ReplaceJob::from_parameters(Some("x"), None),
            Err(TaskError::Configuration(_))
        ));
        assert!(ReplaceJob::from_parameters(Some("x"), Some("")).is_ok());
    }

    #[test]
    fn test_simple_replacement() {
        let job = ReplaceJob::new("foo", "baz").unwrap();
        assert_eq!(run(&job, "foo bar foo"), ("baz bar baz".to_string(), 2));
    }

    #[test]
    fn test_non_overlapping_leftmost_first() {
        let job = ReplaceJob::new("aa", "b").unwrap();
        assert_eq!(run(&job, "aaa"), ("ba".to_string(), 1));
        assert_eq!(run(&job, "aaaa"), ("bb".to_string(), 2));
    }

    #[test]
    fn test_match_across_chunk_boundary() {
        for chunk_size in 1..=8 {
            let job = ReplaceJob::new("XYc", "Z").unwrap().chunk_size(chunk_size);
            assert_eq!(
                run(&job, "abXYcd"),
                ("abZd".to_string(), 1),
                "chunk size {}",
                chunk_size
            );
        }
    }

    #[test]
    fn test_pattern_longer_than_chunk() {
        let job = ReplaceJob::new("needle-in-haystack", "N").unwrap().chunk_size(3);
        let (out, count) = run(&job, "hay needle-in-haystack hay needle-in-hay");
        assert_eq!(out, "hay N hay needle-in-hay");
        assert_eq!(count, 1);
    }

    #[test]
    fn test_empty_replacement_deletes() {
        let job = ReplaceJob::new("-", "").unwrap().chunk_size(2);
        assert_eq!(run(&job, "a-b-c-"), ("abc".to_string(), 3));
    }

    #[test]
    fn test_no_match_passes_input_through() {
        let job = ReplaceJob::new("zzz", "y").unwrap().chunk_size(4);
        assert_eq!(run(&job, "zz z zz"), ("zz z zz".to_string(), 0));
        assert_eq!(run(&job, ""), (String::new(), 0));
    }

    #[test]
    fn test_binary_content_preserved() {
        let job = ReplaceJob::new(vec![0u8, 1], vec![9u8]).unwrap().chunk_size(3);
        let input = vec![0xffu8, 0, 1, 0xfe, 0, 0, 1];
        let mut out = Vec::new();
        let count = job.replace_stream(Cursor::new(input), &mut out).unwrap();
        assert_eq!(count, 2);
        assert_eq!(out, vec![0xff, 9, 0xfe, 0, 9]);
    }

    #[test]
    fn test_replace_file_rewrites_on_match() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.txt");
        fs::write(&path, "foo bar foo").unwrap();

        let job = ReplaceJob::new("foo", "baz").unwrap();
        let result = job.replace_file(&path).unwrap();

        assert_eq!(result.match_count, 2);
        assert!(result.mutated);
        assert_eq!(fs::read_to_string(&path).unwrap(), "baz bar baz");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1, "temp file left behind");
    }

    #[test]
    fn test_replace_file_untouched_without_match() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("b.txt");
        fs::write(&path, "nothing here").unwrap();
        let before = fs::metadata(&path).unwrap().modified().unwrap();

        let job = ReplaceJob::new("foo", "baz").unwrap();
        let result = job.replace_file(&path).unwrap();

        assert_eq!(result.match_count, 0);
        assert!(!result.mutated);
        assert_eq!(fs::read_to_string(&path).unwrap(), "nothing here");
        assert_eq!(fs::metadata(&path).unwrap().modified().unwrap(), before);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_dry_run_counts_without_rewriting() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.txt");
        fs::write(&path, "foo foo").unwrap();

        let job = ReplaceJob::new("foo", "x").unwrap().dry_run(true);
        let result = job.replace_file(&path).unwrap();

        assert_eq!(result.match_count, 2);
        assert!(!result.mutated);
        assert_eq!(fs::read_to_string(&path).unwrap(), "foo foo");
    }

    #[test]
    fn test_failed_read_leaves_original_intact() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.txt");
        fs::write(&path, "foo original foo").unwrap();

        let job = ReplaceJob::new("foo", "baz").unwrap().chunk_size(4);
        let reader = FailingReader {
            data: Cursor::new(b"foo partial".to_vec()),
        };
        let err = job.replace_into(&path, reader).unwrap_err();

        assert!(matches!(err, TaskError::Io { .. }));
        assert_eq!(fs::read_to_string(&path).unwrap(), "foo original foo");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1, "temp file left behind");
    }

    /// Writer that accepts `limit` bytes and then fails.
    struct FullWriter {
        written: Vec<u8>,
        limit: usize,
    }

    impl Write for FullWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            let room = self.limit - self.written.len();
            if room == 0 {
                return Err(io::Error::other("no space left"));
            }
            let n = room.min(buf.len());
            self.written.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_failed_write_stops_the_stream() {
        let job = ReplaceJob::new("foo", "bar").unwrap().chunk_size(4);
        let mut out = FullWriter {
            written: Vec::new(),
            limit: 5,
        };

        let err = job
            .replace_stream(Cursor::new(b"foo foo foo foo".to_vec()), &mut out)
            .unwrap_err();

        assert_eq!(err.to_string(), "no space left");
        assert_eq!(out.written, b"bar b");
    }

    #[test]
    fn test_deferred_output_buffers_until_first_match() {
        let dir = TempDir::new().unwrap();
        let job = ReplaceJob::new("foo", "bar").unwrap().chunk_size(2);

        let mut output = TempOutput::deferred(dir.path());
        assert_eq!(job.stream(Cursor::new(b"no match".to_vec()), &mut output).unwrap(), 0);
        assert!(output.file.is_none());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);

        let mut output = TempOutput::deferred(dir.path());
        assert_eq!(job.stream(Cursor::new(b"xx foo".to_vec()), &mut output).unwrap(), 1);
        let temp_file = output.file.take().unwrap().into_inner().unwrap();
        assert_eq!(fs::read(temp_file.path()).unwrap(), b"xx bar");
    }

    /// Make `dir` read-only. Returns false when the current user can still
    /// write to it (e.g. root), in which case the caller should skip.
    #[cfg(unix)]
    fn make_read_only(dir: &Path) -> bool {
        use std::os::unix::fs::PermissionsExt;

        fs::set_permissions(dir, fs::Permissions::from_mode(0o555)).unwrap();
        let check_path = dir.join(".write-check");
        if fs::write(&check_path, "").is_ok() {
            fs::remove_file(&check_path).unwrap();
            restore_writable(dir);
            return false;
        }
        true
    }

    #[cfg(unix)]
    fn restore_writable(dir: &Path) {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(dir, fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn test_read_only_directory_without_match() {
        let dir = TempDir::new().unwrap();
        let ro = dir.path().join("ro");
        fs::create_dir(&ro).unwrap();
        let path = ro.join("b.txt");
        fs::write(&path, "nothing here").unwrap();
        if !make_read_only(&ro) {
            return;
        }

        let job = ReplaceJob::new("foo", "baz").unwrap();
        let from_file = job.replace_file(&path);
        let from_reader = job.replace_into(&path, File::open(&path).unwrap());
        restore_writable(&ro);

        for result in [from_file.unwrap(), from_reader.unwrap()] {
            assert_eq!(result.match_count, 0);
            assert!(!result.mutated);
        }
        assert_eq!(fs::read_to_string(&path).unwrap(), "nothing here");
        assert_eq!(fs::read_dir(&ro).unwrap().count(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_read_only_directory_dry_run_counts() {
        let dir = TempDir::new().unwrap();
        let ro = dir.path().join("ro");
        fs::create_dir(&ro).unwrap();
        let path = ro.join("b.txt");
        fs::write(&path, "nothing here, nothing").unwrap();
        if !make_read_only(&ro) {
            return;
        }

        let job = ReplaceJob::new("nothing", "x").unwrap().dry_run(true);
        let from_file = job.replace_file(&path);
        let from_reader = job.replace_into(&path, File::open(&path).unwrap());
        restore_writable(&ro);

        for result in [from_file.unwrap(), from_reader.unwrap()] {
            assert_eq!(result.match_count, 2);
            assert!(!result.mutated);
        }
        assert_eq!(fs::read_to_string(&path).unwrap(), "nothing here, nothing");
    }

    #[cfg(unix)]
    #[test]
    fn test_read_only_directory_with_match_fails_cleanly() {
        let dir = TempDir::new().unwrap();
        let ro = dir.path().join("ro");
        fs::create_dir(&ro).unwrap();
        let path = ro.join("a.txt");
        fs::write(&path, "foo bar foo").unwrap();
        if !make_read_only(&ro) {
            return;
        }

        let job = ReplaceJob::new("foo", "baz").unwrap();
        let from_file = job.replace_file(&path);
        let from_reader = job.replace_into(&path, File::open(&path).unwrap());
        restore_writable(&ro);

        assert!(matches!(from_file, Err(TaskError::Io { .. })));
        assert!(matches!(from_reader, Err(TaskError::Io { .. })));
        assert_eq!(fs::read_to_string(&path).unwrap(), "foo bar foo");
        assert_eq!(fs::read_dir(&ro).unwrap().count(), 1);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let job = ReplaceJob::new("foo", "baz").unwrap();
        let err = job.replace_file(&dir.path().join("missing.txt")).unwrap_err();
        assert!(matches!(err, TaskError::Io { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_rewrite_keeps_file_mode() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("run.sh");
        fs::write(&path, "echo foo").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();

        let job = ReplaceJob::new("foo", "bar").unwrap();
        job.replace_file(&path).unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o755);
        assert_eq!(fs::read_to_string(&path).unwrap(), "echo bar");
    }
}
