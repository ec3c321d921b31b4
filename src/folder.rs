//! Walking a folder of books and processing each one.

use crate::book::BookFormat;
use crate::transaction::{Outcome, Transaction};
use crate::{EbookError, Result, RunOptions};
use rayon::prelude::*;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Result of processing a folder.
#[derive(Debug, Default)]
pub struct Report {
    pub processed: usize,
    /// New paths of files that were rewritten or renamed.
    pub changed: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, EbookError)>,
}

impl Report {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Every EPUB and PDF below `folder`, sorted. Symlinks are not followed and
/// backups (`*.bak`) are skipped.
pub fn find_books(folder: &Path) -> Result<Vec<PathBuf>> {
    if !folder.is_dir() {
        return Err(EbookError::IoError(io::Error::new(
            io::ErrorKind::NotFound,
            format!("{} is not a folder", folder.display()),
        )));
    }

    let mut books: Vec<PathBuf> = WalkDir::new(folder)
        .follow_links(false)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                log::warn!("Skipping unreadable entry: {e}");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(walkdir::DirEntry::into_path)
        .filter(|path| BookFormat::from_path(path).is_some())
        .collect();
    books.sort();
    Ok(books)
}

/// Run a [`Transaction`] for every book below `folder`, in parallel.
///
/// A failing book is logged and recorded; the others are still processed.
pub fn process_folder(folder: &Path, options: &RunOptions) -> Result<Report> {
    let books = find_books(folder)?;
    log::debug!("Found {} books in {}", books.len(), folder.display());

    let results: Vec<(PathBuf, Result<Outcome>)> = books
        .into_par_iter()
        .map(|path| {
            let outcome = Transaction::new(&path, options).and_then(Transaction::perform);
            (path, outcome)
        })
        .collect();

    let mut report = Report::default();
    for (path, outcome) in results {
        report.processed += 1;
        match outcome {
            Ok(Outcome::Committed { path: new_path, .. }) => report.changed.push(new_path),
            Ok(Outcome::Unchanged) => {}
            Err(e) => {
                log::error!("Failed to process {}: {e}", path.display());
                report.failed.push((path, e));
            }
        }
    }
    Ok(report)
}
