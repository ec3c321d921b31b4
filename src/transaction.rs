//! Runs the requested actions on one book without losing the original.

use crate::action::{ActionContext, ActionKind};
use crate::book::BookMetadata;
use crate::config::Config;
use crate::{EbookError, Result, RunOptions};
use std::ffi::{OsStr, OsString};
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

/// What a transaction did to its file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// No action produced a new file.
    Unchanged,
    /// The result was written to `path`; the original was moved to `backup`.
    Committed { path: PathBuf, backup: PathBuf },
}

/// The actions for one book file.
///
/// Intermediate files live in a scratch directory that is removed when the
/// transaction ends. Only when some action produced a new file is the
/// original moved to a free backup name (`<file>.bak`, `<file>.1.bak`, ...)
/// and the result copied into the original's directory.
#[derive(Debug)]
pub struct Transaction {
    original: PathBuf,
    config: Config,
    actions: Vec<ActionKind>,
    dry_run: bool,
}

impl Transaction {
    /// Set up a transaction for `path` using the closest config file.
    ///
    /// Actions come from `options`, else from the config, else just
    /// [`ActionKind::Print`].
    pub fn new<P: AsRef<Path>>(path: P, options: &RunOptions) -> Result<Self> {
        let path = path.as_ref();
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let config = Config::closest(dir)?.unwrap_or_default();
        Ok(Self::with_config(path, config, options))
    }

    pub fn with_config<P: AsRef<Path>>(path: P, mut config: Config, options: &RunOptions) -> Self {
        if let Some(key) = &options.adobe_key_file {
            config.adobe_key_files.insert(0, key.clone());
        }
        let requested = options
            .actions
            .clone()
            .or_else(|| config.actions.clone())
            .unwrap_or_else(|| vec![ActionKind::Print]);
        Self {
            original: path.as_ref().to_path_buf(),
            actions: ActionKind::canonical_order(&requested),
            config,
            dry_run: options.dry_run,
        }
    }

    pub fn path(&self) -> &Path {
        &self.original
    }

    /// The actions in the order they will run.
    pub fn actions(&self) -> &[ActionKind] {
        &self.actions
    }

    pub fn perform(self) -> Result<Outcome> {
        let mut file_name = self
            .original
            .file_name()
            .map(OsStr::to_os_string)
            .ok_or_else(|| not_a_file(&self.original))?;
        let scratch = tempfile::Builder::new()
            .prefix(&file_name)
            .tempdir()?;
        log::debug!("Processing {} with actions {:?}", self.original.display(), self.actions);

        let mut metadata: Option<BookMetadata> = None;
        let mut current = self.original.clone();
        let mut applied = Vec::new();

        for &action in self.actions.iter().filter(|&&a| a != ActionKind::None) {
            let after = {
                let mut context = ActionContext {
                    original: &self.original,
                    file: &current,
                    scratch: scratch.path(),
                    config: &self.config,
                    dry_run: self.dry_run,
                    metadata: &mut metadata,
                };
                action.perform(&mut context)?
            };
            if after == current {
                continue;
            }
            log::debug!("Action {action} produced {}", after.display());
            applied.push(action);

            if action == ActionKind::Rename {
                file_name = after
                    .file_name()
                    .map(OsStr::to_os_string)
                    .ok_or_else(|| not_a_file(&after))?;
            } else if after.extension() != current.extension() {
                file_name = with_extension(&file_name, after.extension());
            }

            let next = scratch.path().join(&file_name);
            if after != next {
                fs::rename(&after, &next)?;
            }
            current = next;
        }

        if current == self.original {
            log::info!("Skipped all actions for {}.", self.original.display());
            return Ok(Outcome::Unchanged);
        }

        let target = self.original.with_file_name(&file_name);
        let backup = commit(&current, &self.original, &target)?;

        let applied: Vec<&str> = applied.iter().map(|a| a.as_str()).collect();
        log::info!(
            "Successfully executed {} for {}. {} has been backed up to {}.",
            applied.join(", "),
            target.display(),
            self.original.display(),
            backup.display()
        );
        Ok(Outcome::Committed { path: target, backup })
    }
}

/// The first of `<file>.bak`, `<file>.1.bak`, `<file>.2.bak`, ... that does
/// not exist yet.
pub fn backup_path(original: &Path) -> PathBuf {
    let with_suffix = |suffix: &str| {
        let mut name = original.as_os_str().to_os_string();
        name.push(suffix);
        PathBuf::from(name)
    };

    let mut candidate = with_suffix(".bak");
    let mut i = 0;
    while candidate.exists() {
        i += 1;
        candidate = with_suffix(&format!(".{i}.bak"));
    }
    candidate
}

/// Put `result` at `target` and move `original` to its backup name.
///
/// A different `target` is created exclusively, so a file that appears there
/// first (another book with the same metadata) is never overwritten. On
/// failure the file system is left as it was before the call.
fn commit(result: &Path, original: &Path, target: &Path) -> Result<PathBuf> {
    let backup = backup_path(original);

    // The original's name stays taken throughout.
    if target == original {
        write_new(original, &backup)?;
        if let Err(e) = fs::copy(result, original) {
            if let Err(restore) = fs::rename(&backup, original) {
                log::error!("Could not restore {} from {}: {restore}", original.display(), backup.display());
            }
            return Err(e.into());
        }
        return Ok(backup);
    }

    write_new(result, target)?;
    if let Err(e) = fs::rename(original, &backup) {
        if let Err(cleanup) = fs::remove_file(target) {
            log::error!("Could not remove {}: {cleanup}", target.display());
        }
        return Err(e.into());
    }
    Ok(backup)
}

/// Copy `source` to `target`, which must not exist yet.
fn write_new(source: &Path, target: &Path) -> Result<()> {
    let mut out = match OpenOptions::new().write(true).create_new(true).open(target) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            return Err(EbookError::IoError(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("{} already exists", target.display()),
            )));
        }
        Err(e) => return Err(e.into()),
    };

    let copied = File::open(source)
        .and_then(|mut input| io::copy(&mut input, &mut out))
        .and_then(|_| out.sync_all());
    drop(out);
    if let Err(e) = copied {
        if let Err(cleanup) = fs::remove_file(target) {
            log::error!("Could not remove {}: {cleanup}", target.display());
        }
        return Err(e.into());
    }
    Ok(())
}

fn with_extension(file_name: &OsStr, extension: Option<&OsStr>) -> OsString {
    Path::new(file_name)
        .with_extension(extension.unwrap_or_default())
        .into_os_string()
}

fn not_a_file(path: &Path) -> EbookError {
    EbookError::IoError(io::Error::new(
        io::ErrorKind::InvalidInput,
        format!("{} is not a file path", path.display()),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::tests::sample_pdf;
    use lopdf::{dictionary, Object};

    fn options(actions: &[ActionKind], dry_run: bool) -> RunOptions {
        RunOptions {
            dry_run,
            actions: Some(actions.to_vec()),
            ..Default::default()
        }
    }

    fn titled_pdf(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        let bytes = sample_pdf(Some(dictionary! {
            "Title" => Object::string_literal("Emotions"),
            "Author" => Object::string_literal("Ann Author"),
        }));
        std::fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn backup_names_count_up() {
        let dir = tempfile::tempdir().unwrap();
        let book = dir.path().join("book.epub");
        assert_eq!(backup_path(&book), dir.path().join("book.epub.bak"));

        std::fs::write(dir.path().join("book.epub.bak"), b"").unwrap();
        assert_eq!(backup_path(&book), dir.path().join("book.epub.1.bak"));

        std::fs::write(dir.path().join("book.epub.1.bak"), b"").unwrap();
        assert_eq!(backup_path(&book), dir.path().join("book.epub.2.bak"));
    }

    #[test]
    fn actions_fall_back_to_config_then_print() {
        let config = Config {
            actions: Some(vec![ActionKind::Json, ActionKind::Rename]),
            ..Default::default()
        };
        let from_config = Transaction::with_config("a.pdf", config.clone(), &RunOptions::default());
        assert_eq!(from_config.actions(), [ActionKind::Rename, ActionKind::Json]);

        let from_cli = Transaction::with_config("a.pdf", config, &options(&[ActionKind::None], false));
        assert_eq!(from_cli.actions(), [ActionKind::None]);

        let default = Transaction::with_config("a.pdf", Config::default(), &RunOptions::default());
        assert_eq!(default.actions(), [ActionKind::Print]);
    }

    #[test]
    fn rename_backs_up_original() {
        let dir = tempfile::tempdir().unwrap();
        let original = titled_pdf(dir.path(), "scan.pdf");
        let bytes = std::fs::read(&original).unwrap();

        let outcome = Transaction::with_config(&original, Config::default(), &options(&[ActionKind::Rename], false))
            .perform()
            .unwrap();

        let renamed = dir.path().join("Ann Author - Emotions.pdf");
        assert_eq!(
            outcome,
            Outcome::Committed {
                path: renamed.clone(),
                backup: dir.path().join("scan.pdf.bak"),
            }
        );
        assert!(!original.exists());
        assert_eq!(std::fs::read(renamed).unwrap(), bytes);
        assert_eq!(std::fs::read(dir.path().join("scan.pdf.bak")).unwrap(), bytes);
    }

    #[test]
    fn correctly_named_file_is_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let book = titled_pdf(dir.path(), "Ann Author - Emotions.pdf");

        let outcome = Transaction::with_config(&book, Config::default(), &options(&[ActionKind::Rename], false))
            .perform()
            .unwrap();
        assert_eq!(outcome, Outcome::Unchanged);
        assert!(book.exists());
        assert!(!dir.path().join("Ann Author - Emotions.pdf.bak").exists());
    }

    #[test]
    fn dry_run_touches_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let book = titled_pdf(dir.path(), "scan.pdf");

        let outcome = Transaction::with_config(&book, Config::default(), &options(&[ActionKind::Rename], true))
            .perform()
            .unwrap();
        assert_eq!(outcome, Outcome::Unchanged);
        let names: Vec<_> = std::fs::read_dir(dir.path()).unwrap().map(|e| e.unwrap().file_name()).collect();
        assert_eq!(names, [OsString::from("scan.pdf")]);
    }

    #[test]
    fn second_commit_to_one_target_fails() {
        let dir = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let target = dir.path().join("Ann Author - Emotions.pdf");
        for name in ["download.pdf", "download (1).pdf"] {
            std::fs::write(dir.path().join(name), name).unwrap();
            std::fs::write(scratch.path().join(name), format!("result of {name}")).unwrap();
        }

        let first = dir.path().join("download.pdf");
        let backup = commit(&scratch.path().join("download.pdf"), &first, &target).unwrap();
        assert_eq!(backup, dir.path().join("download.pdf.bak"));
        assert!(!first.exists());

        let second = dir.path().join("download (1).pdf");
        let result = commit(&scratch.path().join("download (1).pdf"), &second, &target);
        assert!(matches!(result, Err(EbookError::IoError(e)) if e.kind() == io::ErrorKind::AlreadyExists));
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "result of download.pdf");
        assert_eq!(std::fs::read_to_string(&second).unwrap(), "download (1).pdf");
        assert!(!dir.path().join("download (1).pdf.bak").exists());
    }

    #[test]
    fn commit_in_place_keeps_backup() {
        let dir = tempfile::tempdir().unwrap();
        let original = dir.path().join("book.pdf");
        let result = dir.path().join("result.pdf");
        std::fs::write(&original, b"old").unwrap();
        std::fs::write(&result, b"new").unwrap();

        let backup = commit(&result, &original, &original).unwrap();
        assert_eq!(std::fs::read(&original).unwrap(), b"new");
        assert_eq!(std::fs::read(backup).unwrap(), b"old");
    }

    #[test]
    fn failed_copy_restores_original() {
        let dir = tempfile::tempdir().unwrap();
        let original = dir.path().join("book.pdf");
        std::fs::write(&original, b"old").unwrap();

        let missing = dir.path().join("no-such-result.pdf");
        assert!(commit(&missing, &original, &original).is_err());
        assert_eq!(std::fs::read(&original).unwrap(), b"old");
        assert!(!dir.path().join("book.pdf.bak").exists());

        let target = dir.path().join("renamed.pdf");
        assert!(commit(&missing, &original, &target).is_err());
        assert!(!target.exists());
        assert!(original.exists());
    }

    #[test]
    fn existing_target_is_not_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let book = titled_pdf(dir.path(), "scan.pdf");
        std::fs::write(dir.path().join("Ann Author - Emotions.pdf"), b"other").unwrap();

        let result = Transaction::with_config(&book, Config::default(), &options(&[ActionKind::Rename], false))
            .perform();
        assert!(matches!(result, Err(EbookError::IoError(e)) if e.kind() == io::ErrorKind::AlreadyExists));
        assert!(book.exists());
    }
}
