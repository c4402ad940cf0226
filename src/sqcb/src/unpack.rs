//! Unpacking banks to disk
//!
//! Drives a [`Bank`] to exhaustion and writes every entry next to the bank
//! file (or under an output root). Progress is reported through
//! [`Listener`]s, invoked in registration order.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::{Component, Path, PathBuf};

use crate::{Bank, Entry, Error, Result, TagWidth, EXTENSION};

/// Default copy buffer size (16 KiB)
pub const DEFAULT_BUFFER_SIZE: usize = 16384;

/// Progress notifications from the unpacker
///
/// All methods default to doing nothing.
pub trait Listener {
    /// A bank file is about to be unpacked
    fn before_container(&self, _path: &Path) {}

    /// A bank file was unpacked completely
    fn after_container(&self, _path: &Path) {}

    /// An entry is about to be written to `path`
    fn before_entry(&self, _path: &Path) {}

    /// An entry was written to `path`
    fn after_entry(&self, _path: &Path) {}
}

/// Listener that reports progress through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct LogListener;

impl Listener for LogListener {
    fn before_container(&self, path: &Path) {
        tracing::info!("Unpacking {}", path.display());
    }

    fn after_entry(&self, path: &Path) {
        tracing::info!("  {}", path.display());
    }
}

/// Check if a path names an SQCB bank (`*.sqcb`, with a non-empty stem)
pub fn is_container(path: &Path) -> bool {
    let suffix = format!(".{}", EXTENSION);
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.len() > suffix.len() && n.ends_with(&suffix))
        .unwrap_or(false)
}

/// Find all banks below a directory, sorted by path
pub fn find_containers(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in walkdir::WalkDir::new(dir) {
        let entry = entry.map_err(|e| Error::Io(e.into()))?;
        if entry.file_type().is_file() && is_container(entry.path()) {
            files.push(entry.into_path());
        }
    }

    files.sort();
    Ok(files)
}

/// Turn an entry name into a path below `dest_dir`
///
/// Both `/` and `\` separate components. Empty, `.` and `..` components are
/// dropped, so the result never leaves `dest_dir`.
pub fn resolve_entry_path(dest_dir: &Path, name: &str) -> Result<PathBuf> {
    let mut path = dest_dir.to_path_buf();
    let mut pushed = false;

    for part in name.split(['/', '\\']) {
        if part.is_empty() || part == "." || part == ".." {
            continue;
        }
        // Reject anything the platform would treat as a root or prefix
        let mut components = Path::new(part).components();
        if !matches!((components.next(), components.next()), (Some(Component::Normal(_)), None)) {
            continue;
        }
        path.push(part);
        pushed = true;
    }

    if pushed {
        Ok(path)
    } else {
        Err(Error::InvalidEntryName(name.to_string()))
    }
}

/// Writes bank entries to disk
pub struct Unpacker {
    buffer_size: usize,
    tag_width: TagWidth,
    output: Option<PathBuf>,
    listeners: Vec<Box<dyn Listener>>,
    /// Output directories handed out so far, with the bank that claimed each
    claimed: RefCell<HashMap<PathBuf, PathBuf>>,
}

impl Default for Unpacker {
    fn default() -> Self {
        Self::new()
    }
}

impl Unpacker {
    pub fn new() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            tag_width: TagWidth::Narrow,
            output: None,
            listeners: Vec::new(),
            claimed: RefCell::new(HashMap::new()),
        }
    }

    /// Copy buffer size; zero falls back to the default
    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = if buffer_size == 0 {
            DEFAULT_BUFFER_SIZE
        } else {
            buffer_size
        };
        self
    }

    pub fn with_tag_width(mut self, tag_width: TagWidth) -> Self {
        self.tag_width = tag_width;
        self
    }

    /// Unpack each bank into `<output>/<bank stem>` instead of next to the bank
    ///
    /// Banks found by walking a directory keep their path relative to that
    /// directory. Two banks mapping to the same output directory is an error.
    pub fn with_output(mut self, output: impl Into<PathBuf>) -> Self {
        self.output = Some(output.into());
        self
    }

    pub fn with_listener(mut self, listener: impl Listener + 'static) -> Self {
        self.listeners.push(Box::new(listener));
        self
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    pub fn tag_width(&self) -> TagWidth {
        self.tag_width
    }

    /// Unpack files and directories. Paths that are neither are skipped.
    ///
    /// Stops at the first failing bank. Returns the number of entries written.
    pub fn unpack_paths<P: AsRef<Path>>(&self, paths: &[P]) -> Result<usize> {
        let mut total = 0;
        for path in paths {
            let path = path.as_ref();
            if path.is_dir() {
                total += self.unpack_directory(path)?;
            } else if path.is_file() {
                total += self.unpack_file(path)?;
            } else {
                tracing::debug!("Skipping {}: not a file or directory", path.display());
            }
        }
        Ok(total)
    }

    /// Unpack every `*.sqcb` file below a directory
    pub fn unpack_directory(&self, dir: &Path) -> Result<usize> {
        let mut total = 0;
        for file in find_containers(dir)? {
            total += self.unpack_file_in(&file, dir)?;
        }
        Ok(total)
    }

    /// Directory a bank's entries are written to
    pub fn destination(&self, bank_path: &Path) -> PathBuf {
        let base = bank_path.parent().unwrap_or(Path::new(""));
        self.destination_in(bank_path, base)
    }

    /// Directory a bank found below `base` is written to
    ///
    /// With an output root, `base/a/x.sqcb` maps to `<output>/a/x`.
    pub fn destination_in(&self, bank_path: &Path, base: &Path) -> PathBuf {
        let parent = bank_path.parent().unwrap_or(Path::new(""));
        let Some(root) = &self.output else {
            return parent.to_path_buf();
        };

        let stem = bank_path
            .file_stem()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(EXTENSION));
        let relative = parent.strip_prefix(base).unwrap_or(Path::new(""));
        root.join(relative).join(stem)
    }

    /// Unpack a single bank file
    pub fn unpack_file(&self, path: &Path) -> Result<usize> {
        let base = path.parent().unwrap_or(Path::new(""));
        self.unpack_file_in(path, base)
    }

    /// Unpack a bank file that was found below `base`
    pub fn unpack_file_in(&self, path: &Path, base: &Path) -> Result<usize> {
        let dest_dir = self.destination_in(path, base);
        if self.output.is_some() {
            self.claim(&dest_dir, path)?;
        }

        self.notify(|l| l.before_container(path));
        let file = File::open(path)?;
        let source = fs::canonicalize(path)?;
        let count = self.unpack_bank(BufReader::new(file), &dest_dir, Some(&source))?;
        self.notify(|l| l.after_container(path));

        Ok(count)
    }

    /// Reserve `dest_dir` for `bank`, failing if another bank already has it
    fn claim(&self, dest_dir: &Path, bank: &Path) -> Result<()> {
        let bank = fs::canonicalize(bank).unwrap_or_else(|_| bank.to_path_buf());
        let mut claimed = self.claimed.borrow_mut();

        match claimed.get(dest_dir) {
            Some(other) if *other != bank => Err(Error::DuplicateDestination {
                dest: dest_dir.to_path_buf(),
                other: other.clone(),
            }),
            Some(_) => Ok(()),
            None => {
                claimed.insert(dest_dir.to_path_buf(), bank);
                Ok(())
            }
        }
    }

    /// Unpack a bank read from `reader` into `dest_dir`
    pub fn unpack_stream<R: Read>(&self, reader: R, dest_dir: &Path) -> Result<usize> {
        self.unpack_bank(reader, dest_dir, None)
    }

    /// `source` is the canonical path of the bank file, if there is one. No
    /// entry is allowed to resolve to it.
    fn unpack_bank<R: Read>(
        &self,
        reader: R,
        dest_dir: &Path,
        source: Option<&Path>,
    ) -> Result<usize> {
        let mut bank = Bank::with_tag_width(reader, self.tag_width);
        let mut count = 0;

        while bank.has_next()? {
            let mut entry = bank.next()?;
            let dest = resolve_entry_path(dest_dir, &entry.name().to_string_lossy())?;
            if let Some(source) = source {
                if fs::canonicalize(&dest).is_ok_and(|d| d == source) {
                    return Err(Error::OverwritesSource(dest));
                }
            }
            self.unpack_entry(&mut entry, &dest)?;
            count += 1;
        }

        Ok(count)
    }

    /// Drain one entry into `dest`, creating parent directories as needed
    ///
    /// If the entry cannot be read to its declared size, the partial file is
    /// removed again, unless it existed before this call.
    pub fn unpack_entry<R: Read>(&self, entry: &mut Entry<'_, R>, dest: &Path) -> Result<u64> {
        self.notify(|l| l.before_entry(dest));

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }

        let existed = fs::symlink_metadata(dest).is_ok();
        let written = match self.copy_entry(entry, dest) {
            Ok(written) => written,
            Err(e) => {
                if !existed {
                    let _ = fs::remove_file(dest);
                }
                return Err(e);
            }
        };

        self.notify(|l| l.after_entry(dest));
        Ok(written)
    }

    fn copy_entry<R: Read>(&self, entry: &mut Entry<'_, R>, dest: &Path) -> Result<u64> {
        let mut out = BufWriter::new(File::create(dest)?);
        let mut block = vec![0u8; self.buffer_size];
        let mut written = 0u64;

        loop {
            let n = match entry.read(&mut block) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };
            out.write_all(&block[..n])?;
            written += n as u64;
        }
        out.flush()?;

        if written != u64::from(entry.record().size()) {
            return Err(Error::Truncated {
                field: "entry payload",
            });
        }
        Ok(written)
    }

    fn notify(&self, f: impl Fn(&dyn Listener)) {
        for listener in &self.listeners {
            f(listener.as_ref());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::Builder;
    use std::cell::RefCell;
    use std::io::Cursor;
    use std::rc::Rc;

    /// Listener recording every call
    #[derive(Clone, Default)]
    struct Recorder {
        events: Rc<RefCell<Vec<String>>>,
        tag: &'static str,
    }

    impl Recorder {
        fn push(&self, what: &str, path: &Path) {
            let name = path.file_name().unwrap().to_string_lossy();
            self.events
                .borrow_mut()
                .push(format!("{}:{}:{}", self.tag, what, name));
        }
    }

    impl Listener for Recorder {
        fn before_container(&self, path: &Path) {
            self.push("before_container", path);
        }
        fn after_container(&self, path: &Path) {
            self.push("after_container", path);
        }
        fn before_entry(&self, path: &Path) {
            self.push("before_entry", path);
        }
        fn after_entry(&self, path: &Path) {
            self.push("after_entry", path);
        }
    }

    #[test]
    fn test_is_container() {
        assert!(is_container(Path::new("a.sqcb")));
        assert!(is_container(Path::new("dir/textures.sqcb")));
        assert!(!is_container(Path::new(".sqcb")));
        assert!(!is_container(Path::new("a.sqcb.bak")));
        assert!(!is_container(Path::new("a.pak")));
    }

    #[test]
    fn test_resolve_entry_path() {
        let root = Path::new("out");
        assert_eq!(
            resolve_entry_path(root, "a.txt").unwrap(),
            PathBuf::from("out/a.txt")
        );
        assert_eq!(
            resolve_entry_path(root, "dir\\sub/b.dds").unwrap(),
            Path::new("out").join("dir").join("sub").join("b.dds")
        );
        assert_eq!(
            resolve_entry_path(root, "../../etc/passwd").unwrap(),
            Path::new("out").join("etc").join("passwd")
        );
        assert_eq!(
            resolve_entry_path(root, "/abs/./x").unwrap(),
            Path::new("out").join("abs").join("x")
        );
        assert!(matches!(
            resolve_entry_path(root, "../.."),
            Err(Error::InvalidEntryName(_))
        ));
        assert!(resolve_entry_path(root, "").is_err());
    }

    #[test]
    fn test_unpack_stream_writes_entries() {
        let dir = tempfile::tempdir().unwrap();
        let data = Builder::new()
            .entry("a.txt", &[10, 20, 30])
            .entry("sub\\b.bin", &[1, 2])
            .entry("empty", &[])
            .build();

        let unpacker = Unpacker::new().with_buffer_size(1);
        let count = unpacker.unpack_stream(Cursor::new(data), dir.path()).unwrap();

        assert_eq!(count, 3);
        assert_eq!(fs::read(dir.path().join("a.txt")).unwrap(), [10, 20, 30]);
        assert_eq!(
            fs::read(dir.path().join("sub").join("b.bin")).unwrap(),
            [1, 2]
        );
        assert!(fs::read(dir.path().join("empty")).unwrap().is_empty());
    }

    #[test]
    fn test_unpack_stream_stops_on_broken_file() {
        let dir = tempfile::tempdir().unwrap();
        let data = Builder::new()
            .entry("first", &[1, 2, 3])
            .entry("second", &[4])
            .skew_offset(1, 1)
            .build();

        let err = Unpacker::new()
            .unpack_stream(Cursor::new(data), dir.path())
            .unwrap_err();

        assert!(matches!(err, Error::BrokenFile { .. }));
        assert!(dir.path().join("first").exists());
        assert!(!dir.path().join("second").exists());
    }

    #[test]
    fn test_unpack_truncated_payload() {
        let dir = tempfile::tempdir().unwrap();
        let data = Builder::new().entry("a", &[1, 2, 3, 4]).build();
        let cut = &data[..data.len() - 1];

        let err = Unpacker::new()
            .unpack_stream(Cursor::new(cut), dir.path())
            .unwrap_err();
        assert!(matches!(err, Error::Truncated { field: "entry payload" }));
        assert!(!dir.path().join("a").exists());
    }

    #[test]
    fn test_unpack_paths_with_listeners() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("nested");
        fs::create_dir_all(&nested).unwrap();

        let bank = Builder::new().entry("x.txt", b"hello").build();
        fs::write(nested.join("one.sqcb"), &bank).unwrap();
        fs::write(nested.join("notes.txt"), b"not a bank").unwrap();

        let events = Rc::new(RefCell::new(Vec::new()));
        let first = Recorder {
            events: events.clone(),
            tag: "1",
        };
        let second = Recorder {
            events: events.clone(),
            tag: "2",
        };
        let unpacker = Unpacker::new().with_listener(first).with_listener(second);

        let missing = dir.path().join("missing.sqcb");
        let count = unpacker
            .unpack_paths(&[dir.path().to_path_buf(), missing])
            .unwrap();

        assert_eq!(count, 1);
        assert_eq!(fs::read(nested.join("x.txt")).unwrap(), b"hello");
        assert_eq!(
            *events.borrow(),
            vec![
                "1:before_container:one.sqcb",
                "2:before_container:one.sqcb",
                "1:before_entry:x.txt",
                "2:before_entry:x.txt",
                "1:after_entry:x.txt",
                "2:after_entry:x.txt",
                "1:after_container:one.sqcb",
                "2:after_container:one.sqcb",
            ]
        );
    }

    #[test]
    fn test_unpack_file_with_output_root() {
        let dir = tempfile::tempdir().unwrap();
        let bank_path = dir.path().join("sounds.sqcb");
        fs::write(
            &bank_path,
            Builder::new().entry("beep.wav", &[1, 2, 3]).build(),
        )
        .unwrap();

        let out = dir.path().join("out");
        let unpacker = Unpacker::new().with_output(&out);
        assert_eq!(unpacker.destination(&bank_path), out.join("sounds"));

        unpacker.unpack_file(&bank_path).unwrap();
        assert_eq!(
            fs::read(out.join("sounds").join("beep.wav")).unwrap(),
            [1, 2, 3]
        );
    }

    #[test]
    fn test_entry_resolving_to_its_bank_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let bank_path = dir.path().join("x.sqcb");
        let data = Builder::new().entry("x.sqcb", &[0x5a; 65536]).build();
        fs::write(&bank_path, &data).unwrap();

        let err = Unpacker::new().unpack_file(&bank_path).unwrap_err();
        assert!(matches!(err, Error::OverwritesSource(ref p) if *p == bank_path));
        assert_eq!(err.kind(), crate::ErrorKind::Destination);
        assert_eq!(fs::read(&bank_path).unwrap(), data);
    }

    #[test]
    fn test_failed_entry_keeps_preexisting_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a"), b"old").unwrap();
        let data = Builder::new().entry("a", &[1, 2, 3, 4]).build();
        let cut = &data[..data.len() - 1];

        let err = Unpacker::new()
            .unpack_stream(Cursor::new(cut), dir.path())
            .unwrap_err();
        assert!(matches!(err, Error::Truncated { .. }));
        assert!(dir.path().join("a").exists());
    }

    #[test]
    fn test_output_root_keeps_relative_layout() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in");
        for (sub, payload) in [("a", 1u8), ("b", 2u8)] {
            fs::create_dir_all(input.join(sub)).unwrap();
            fs::write(
                input.join(sub).join("x.sqcb"),
                Builder::new().entry("f", &[payload]).build(),
            )
            .unwrap();
        }

        let out = dir.path().join("out");
        let unpacker = Unpacker::new().with_output(&out);
        assert_eq!(
            unpacker.destination_in(&input.join("a").join("x.sqcb"), &input),
            out.join("a").join("x")
        );

        assert_eq!(unpacker.unpack_paths(&[&input]).unwrap(), 2);
        assert_eq!(fs::read(out.join("a").join("x").join("f")).unwrap(), [1]);
        assert_eq!(fs::read(out.join("b").join("x").join("f")).unwrap(), [2]);
    }

    #[test]
    fn test_reused_destination_fails() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("a").join("x.sqcb");
        let second = dir.path().join("b").join("x.sqcb");
        for (path, payload) in [(&first, 1u8), (&second, 2u8)] {
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, Builder::new().entry("f", &[payload]).build()).unwrap();
        }

        let out = dir.path().join("out");
        let unpacker = Unpacker::new().with_output(&out);
        let err = unpacker.unpack_paths(&[&first, &second]).unwrap_err();

        match err {
            Error::DuplicateDestination { dest, other } => {
                assert_eq!(dest, out.join("x"));
                assert_eq!(other, fs::canonicalize(&first).unwrap());
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert_eq!(fs::read(out.join("x").join("f")).unwrap(), [1]);

        // The same bank may be unpacked again
        assert_eq!(unpacker.unpack_file(&first).unwrap(), 1);
    }

    #[test]
    fn test_failed_container_skips_after_notification() {
        let dir = tempfile::tempdir().unwrap();
        let bank_path = dir.path().join("bad.sqcb");
        fs::write(&bank_path, b"NOPE1.00\0\0\0\0").unwrap();

        let events = Rc::new(RefCell::new(Vec::new()));
        let unpacker = Unpacker::new().with_listener(Recorder {
            events: events.clone(),
            tag: "r",
        });

        let err = unpacker.unpack_file(&bank_path).unwrap_err();
        assert!(matches!(err, Error::InvalidHeader(_)));
        assert_eq!(*events.borrow(), vec!["r:before_container:bad.sqcb"]);
    }

    #[test]
    fn test_find_containers_sorted() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("b")).unwrap();
        fs::write(dir.path().join("b").join("z.sqcb"), b"").unwrap();
        fs::write(dir.path().join("a.sqcb"), b"").unwrap();
        fs::write(dir.path().join("c.txt"), b"").unwrap();

        let found = find_containers(dir.path()).unwrap();
        assert_eq!(
            found,
            vec![dir.path().join("a.sqcb"), dir.path().join("b").join("z.sqcb")]
        );
    }

    #[test]
    fn test_zero_buffer_size_uses_default() {
        assert_eq!(Unpacker::new().with_buffer_size(0).buffer_size(), DEFAULT_BUFFER_SIZE);
    }
}
