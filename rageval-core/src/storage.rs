//! Rotation of generated test sets and pipeline responses on disk.
//!
//! Each kind of file lives in a "current" directory holding the latest
//! version; writing a new one first moves whatever is current into the
//! archive directory.

use chrono::Local;
use rand::seq::SliceRandom;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::config::FilesConfig;
use crate::dataset::{EvaluationRow, TestSetRow, write_csv};
use crate::error::{EvalError, Result};
use crate::responses::write_responses;

const ARCHIVE_SUFFIX_FORMAT: &str = "%Y_%m_%d-%I_%M_%S_%p";

/// Move every file in `current` into `archive`, appending `suffix` to the
/// file name when given. Returns the new paths.
fn archive_current(current: &Path, archive: &Path, suffix: Option<&str>) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(current)?;
    fs::create_dir_all(archive)?;

    let mut moved = Vec::new();
    for entry in fs::read_dir(current)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let mut name = entry.file_name().to_string_lossy().into_owned();
        if let Some(suffix) = suffix {
            name = format!("{}_{}", name, suffix);
        }
        let target = archive.join(name);
        fs::rename(entry.path(), &target)?;
        info!(from = %entry.path().display(), to = %target.display(), "Archived file");
        moved.push(target);
    }
    Ok(moved)
}

/// The part of a model id after its first `/`, up to the next one.
fn model_tail(model: &str) -> Result<&str> {
    model
        .split('/')
        .nth(1)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            EvalError::invalid_input(format!("model id '{}' has no organization prefix", model))
        })
}

/// Archive the current test set and save `rows`, shuffled, as the new one.
///
/// The file is named after the last path segment of the synthesizer model.
pub fn save_testset(rows: &[TestSetRow], files: &FilesConfig, model: &str) -> Result<PathBuf> {
    let suffix = Local::now().format(ARCHIVE_SUFFIX_FORMAT).to_string();
    archive_current(&files.current_dir, &files.archive_dir, Some(&suffix))?;

    let model_name = model.rsplit('/').next().unwrap_or(model);
    let path = files
        .current_dir
        .join(format!("NASA_history_QA__{}__generated.csv", model_name));

    let mut shuffled = rows.to_vec();
    shuffled.shuffle(&mut rand::thread_rng());
    write_csv(&path, &shuffled)?;

    info!(path = %path.display(), rows = rows.len(), "Evaluation set saved");
    Ok(path)
}

/// Archive the current responses file and save `rows` as
/// `<rag_type>__<llm>__<emb>__<rank>.csv` under `responses_dir/current`.
///
/// Model ids must look like `org/name`; only `name` goes into the file name.
/// The new file is staged next to `current` before anything is archived, so a
/// failed write leaves the previous responses in place.
pub fn save_results(
    rows: &[EvaluationRow],
    responses_dir: &Path,
    rag_type: &str,
    llm_model: &str,
    emb_model: &str,
    rank_model: &str,
) -> Result<PathBuf> {
    let file_name = format!(
        "{}__{}__{}__{}.csv",
        rag_type,
        model_tail(llm_model)?,
        model_tail(emb_model)?,
        model_tail(rank_model)?
    );
    fs::create_dir_all(responses_dir)?;
    let staged = responses_dir.join(format!(".{}.partial", file_name));
    if let Err(e) = write_responses(&staged, rows) {
        let _ = fs::remove_file(&staged);
        return Err(e);
    }

    let current = responses_dir.join("current");
    archive_current(&current, &responses_dir.join("archive"), None)?;

    let path = current.join(file_name);
    fs::rename(&staged, &path)?;
    info!(rag_type, path = %path.display(), "Pipeline responses saved");
    Ok(path)
}
