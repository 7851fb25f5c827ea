//! Archive persistence: one JSON file per retained brain.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use bevy::log::{debug, info};
use thiserror::Error;

use crate::archive::{Archive, ArchiveEntry};

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("checkpoint i/o failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed checkpoint {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> CheckpointError + '_ {
    move |source| CheckpointError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn json_error(path: &Path) -> impl FnOnce(serde_json::Error) -> CheckpointError + '_ {
    move |source| CheckpointError::Json {
        path: path.to_path_buf(),
        source,
    }
}

/// File name for the entry at `rank`, keyed by its fitness.
pub fn entry_file_name(rank: usize, fitness: f32) -> String {
    format!("goopie_{rank}_{fitness:.4}.json")
}

/// Replace the contents of `dir` with the archive. Returns how many files were written.
pub fn write_archive(dir: &Path, archive: &Archive) -> Result<usize, CheckpointError> {
    if dir.exists() {
        fs::remove_dir_all(dir).map_err(io_error(dir))?;
    }
    fs::create_dir_all(dir).map_err(io_error(dir))?;

    for (rank, entry) in archive.entries().iter().enumerate() {
        let path = dir.join(entry_file_name(rank, entry.fitness));
        let file = File::create(&path).map_err(io_error(&path))?;
        serde_json::to_writer_pretty(BufWriter::new(file), entry).map_err(json_error(&path))?;
    }
    info!(
        "wrote {} archived brains to {}",
        archive.len(),
        dir.display()
    );
    Ok(archive.len())
}

/// Load every `.json` entry in `dir` into a fresh archive of `capacity`.
pub fn read_archive(dir: &Path, capacity: usize) -> Result<Archive, CheckpointError> {
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_error(dir))? {
        let path = entry.map_err(io_error(dir))?.path();
        if path.extension().is_some_and(|ext| ext == "json") {
            paths.push(path);
        } else {
            debug!("skipping {} while reading checkpoints", path.display());
        }
    }
    paths.sort();

    let mut archive = Archive::new(capacity);
    for path in paths {
        let file = File::open(&path).map_err(io_error(&path))?;
        let entry: ArchiveEntry =
            serde_json::from_reader(BufReader::new(file)).map_err(json_error(&path))?;
        archive.submit(entry.brain, entry.fitness);
    }
    info!(
        "resumed {} archived brains from {}",
        archive.len(),
        dir.display()
    );
    Ok(archive)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brain::{Brain, ConvBrain};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn filled(fitnesses: &[f32]) -> Archive {
        let mut rng = StdRng::seed_from_u64(31);
        let mut archive = Archive::new(10);
        for f in fitnesses {
            archive.submit(ConvBrain::random(10, &mut rng).snapshot(), *f);
        }
        archive
    }

    #[test]
    fn archive_survives_a_write_and_read() {
        let dir = tempfile::tempdir().expect("tempdir");
        let archive = filled(&[0.7, 2.5, 1.25]);

        assert_eq!(write_archive(dir.path(), &archive).expect("write"), 3);
        let restored = read_archive(dir.path(), 10).expect("read");
        assert_eq!(restored.entries(), archive.entries());
    }

    #[test]
    fn files_are_named_by_rank_and_fitness() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_archive(dir.path(), &filled(&[2.5, 0.7])).expect("write");
        let mut names: Vec<String> = fs::read_dir(dir.path())
            .expect("list")
            .map(|e| e.expect("entry").file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec!["goopie_0_2.5000.json", "goopie_1_0.7000.json"]);
    }

    #[test]
    fn writing_clears_the_directory_first() {
        let dir = tempfile::tempdir().expect("tempdir");
        let target = dir.path().join("checkpoints");
        write_archive(&target, &filled(&[1.0, 2.0, 3.0])).expect("first write");
        fs::write(target.join("notes.txt"), "stale").expect("stray file");

        write_archive(&target, &filled(&[4.0])).expect("second write");
        let count = fs::read_dir(&target).expect("list").count();
        assert_eq!(count, 1);
    }

    #[test]
    fn foreign_files_are_ignored_and_bad_json_is_reported() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_archive(dir.path(), &filled(&[1.0])).expect("write");
        fs::write(dir.path().join("README"), "not a brain").expect("readme");
        assert_eq!(read_archive(dir.path(), 10).expect("read").len(), 1);

        fs::write(dir.path().join("broken.json"), "{ nope").expect("broken");
        assert!(matches!(
            read_archive(dir.path(), 10),
            Err(CheckpointError::Json { .. })
        ));
    }

    #[test]
    fn missing_directory_is_an_io_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(matches!(
            read_archive(&dir.path().join("absent"), 10),
            Err(CheckpointError::Io { .. })
        ));
    }
}
