use std::fs;
use std::io::{self, Write};
use std::path::Path;

use tempfile::NamedTempFile;

/// Writes `bytes` to a uniquely named file beside `path`, then renames it over `path`.
///
/// The rename replaces any previous file in one step, so `path` always holds either the old
/// or the new contents. A failed write leaves the old file untouched.
pub fn write_artifact(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;

    let mut staging = NamedTempFile::new_in(parent)?;
    staging.write_all(bytes)?;
    staging.flush()?;
    staging.persist(path).map_err(|error| error.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entries(dir: &Path) -> Vec<String> {
        let mut names = fs::read_dir(dir)
            .expect("list")
            .map(|entry| entry.expect("entry").file_name().to_string_lossy().into_owned())
            .collect::<Vec<_>>();
        names.sort();
        names
    }

    #[test]
    fn creates_missing_output_directory() {
        let temp = TempDir::new().expect("temp");
        let path = temp.path().join("verification").join("initial.png");

        write_artifact(&path, b"first").expect("write");

        assert_eq!(fs::read(&path).expect("read"), b"first");
    }

    #[test]
    fn overwrites_existing_file_and_leaves_no_staging_file() {
        let temp = TempDir::new().expect("temp");
        let path = temp.path().join("verification.png");

        write_artifact(&path, b"first run").expect("first");
        write_artifact(&path, b"second").expect("second");

        assert_eq!(fs::read(&path).expect("read"), b"second");
        assert_eq!(entries(temp.path()), vec!["verification.png"]);
    }

    #[test]
    fn other_files_in_the_output_dir_are_left_alone() {
        let temp = TempDir::new().expect("temp");
        let path = temp.path().join("initial.png");
        let foreign = temp.path().join(".initial.png.partial");
        fs::write(&foreign, b"another run").expect("foreign");

        write_artifact(&path, b"png").expect("write");

        assert_eq!(fs::read(&foreign).expect("read foreign"), b"another run");
        assert_eq!(fs::read(&path).expect("read"), b"png");
        assert_eq!(entries(temp.path()), vec![".initial.png.partial", "initial.png"]);
    }

    #[cfg(unix)]
    #[test]
    fn replacement_keeps_readers_of_the_old_file_whole() {
        use std::os::unix::fs::MetadataExt;

        let temp = TempDir::new().expect("temp");
        let path = temp.path().join("verification.png");
        write_artifact(&path, b"old frame").expect("first");
        let old_inode = fs::metadata(&path).expect("meta").ino();
        let mut reader = fs::File::open(&path).expect("open old");

        write_artifact(&path, b"new frame").expect("second");

        let mut seen = Vec::new();
        io::Read::read_to_end(&mut reader, &mut seen).expect("read old");
        assert_eq!(seen, b"old frame");
        assert_ne!(fs::metadata(&path).expect("meta").ino(), old_inode);
        assert_eq!(fs::read(&path).expect("read"), b"new frame");
    }

    #[test]
    fn failed_replacement_keeps_the_previous_file() {
        let temp = TempDir::new().expect("temp");
        let path = temp.path().join("verification.png");
        fs::create_dir(&path).expect("dir in the way");
        fs::write(path.join("keep"), b"x").expect("keep");

        assert!(write_artifact(&path, b"png").is_err());

        assert!(path.join("keep").exists());
        assert_eq!(entries(temp.path()), vec!["verification.png"]);
    }
}
