//! Iteration artifacts.
//!
//! Each build step produces a full snapshot directory under `iterations/`:
//! the scaffold is `iter_00_scaffold/`, later steps copy their predecessor into
//! `iter_NN_<slug>/` and add a notes file. `FINAL/` is a copy of the last snapshot.
//! No code is generated; the notes record what each step was asked to do.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::money::Usd;
use crate::util::slugify;

/// Budget check and recorded cost for the scaffold step.
pub const SCAFFOLD_COST: Usd = Usd::cents(10);
/// Reported cost of one build iteration.
pub const ITERATION_COST: Usd = Usd::cents(50);

pub const ITERATIONS_DIR: &str = "iterations";
pub const FINAL_DIR: &str = "FINAL";

/// Record of one build step. Never mutated after it is appended to the build state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IterationOutcome {
    pub success: bool,
    pub iteration_num: u32,
    pub files_created: Vec<String>,
    pub files_modified: Vec<String>,
    pub tests_passed: bool,
    pub cost: Usd,
    pub path: PathBuf,
    pub summary: String,
}

impl IterationOutcome {
    /// Created and modified files, in that order.
    pub fn changed_files(&self) -> Vec<String> {
        self.files_created
            .iter()
            .chain(&self.files_modified)
            .cloned()
            .collect()
    }
}

/// The finished artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalArtifact {
    pub path: PathBuf,
    pub files: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct IterationBuilder {
    build_dir: PathBuf,
    project_name: String,
}

impl IterationBuilder {
    pub fn new(build_dir: &Path, project_name: &str) -> Self {
        Self {
            build_dir: build_dir.to_path_buf(),
            project_name: project_name.to_string(),
        }
    }

    fn iterations_dir(&self) -> PathBuf {
        self.build_dir.join(ITERATIONS_DIR)
    }

    /// Iteration 0: project skeleton plus a copy of the approved plan.
    pub fn create_scaffold(&self, plan: &str) -> Result<IterationOutcome> {
        let dir = self.iterations_dir().join("iter_00_scaffold");
        reset_dir(&dir)?;

        let files: [(&str, String); 4] = [
            (
                "README.md",
                format!(
                    "# {}\n\nGenerated scaffold. See PLAN.md for the implementation plan.\n",
                    self.project_name
                ),
            ),
            ("PLAN.md", plan.to_string()),
            (
                "src/main.py",
                format!(
                    "\"\"\"{} entry point.\"\"\"\n\n\ndef main():\n    pass\n\n\nif __name__ == \"__main__\":\n    main()\n",
                    self.project_name
                ),
            ),
            ("tests/__init__.py", String::new()),
        ];
        let mut created = Vec::with_capacity(files.len());
        for (relative, content) in &files {
            write_file(&dir.join(relative), content)?;
            created.push(relative.to_string());
        }

        tracing::info!(path = %dir.display(), "Scaffold created");
        Ok(IterationOutcome {
            success: true,
            iteration_num: 0,
            files_created: created,
            files_modified: Vec::new(),
            tests_passed: true,
            cost: SCAFFOLD_COST,
            path: dir,
            summary: "Project scaffold created".to_string(),
        })
    }

    /// Iteration `index`: copy `previous` forward and record the task (and any fix note).
    pub fn build_iteration(
        &self,
        index: u32,
        task: &str,
        previous: &Path,
        fix_note: Option<&str>,
    ) -> Result<IterationOutcome> {
        let dir = self
            .iterations_dir()
            .join(format!("iter_{:02}_{}", index, slugify(task)));
        reset_dir(&dir)?;
        if previous.is_dir() {
            copy_dir(previous, &dir)?;
        } else {
            tracing::warn!(previous = %previous.display(), "Previous iteration missing, starting empty");
        }

        let notes_rel = format!("notes/iteration_{:02}.md", index);
        let mut notes = format!("# Iteration {}: {}\n\n## Task\n{}\n", index, task, task);
        if let Some(note) = fix_note {
            notes.push_str(&format!("\n## Fix requested\n{}\n", note));
        }
        write_file(&dir.join(&notes_rel), &notes)?;

        let summary = match fix_note {
            Some(note) => format!("Iteration {}: {} (fix: {})", index, task, note),
            None => format!("Iteration {}: {}", index, task),
        };
        tracing::info!(index, task, path = %dir.display(), "Iteration built");
        Ok(IterationOutcome {
            success: true,
            iteration_num: index,
            files_created: vec![notes_rel],
            files_modified: Vec::new(),
            tests_passed: true,
            cost: ITERATION_COST,
            path: dir,
            summary,
        })
    }

    /// Copy `source` into `FINAL/`, replacing any previous final artifact.
    pub fn create_final(&self, source: &Path) -> Result<FinalArtifact> {
        let dest = self.build_dir.join(FINAL_DIR);
        reset_dir(&dest)?;
        copy_dir(source, &dest)?;
        let files = list_files(&dest)?;
        tracing::info!(path = %dest.display(), files = files.len(), "Final artifact created");
        Ok(FinalArtifact { path: dest, files })
    }
}

fn write_file(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))
}

/// Remove `dir` if present and recreate it empty.
fn reset_dir(dir: &Path) -> Result<()> {
    if dir.exists() {
        fs::remove_dir_all(dir).with_context(|| format!("Failed to remove {}", dir.display()))?;
    }
    fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))
}

fn copy_dir(src: &Path, dest: &Path) -> Result<()> {
    for entry in WalkDir::new(src).follow_links(false) {
        let entry = entry?;
        let path = entry.path();
        let rel = path.strip_prefix(src).unwrap_or(path);
        let target = dest.join(rel);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)
                .with_context(|| format!("Failed to create {}", target.display()))?;
        } else if entry.file_type().is_file() {
            fs::copy(path, &target).with_context(|| {
                format!("Failed to copy {} to {}", path.display(), target.display())
            })?;
        }
    }
    Ok(())
}

/// Files under `root`, relative and `/`-separated, sorted.
fn list_files(root: &Path) -> Result<Vec<String>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry?;
        if entry.file_type().is_file() {
            let rel = entry.path().strip_prefix(root).unwrap_or(entry.path());
            files.push(rel.to_string_lossy().replace('\\', "/"));
        }
    }
    Ok(files)
}
