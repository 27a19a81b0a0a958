use std::{env, io, path::PathBuf};

use anyhow::{anyhow, Result};

pub const APPLICATION_NAME: &str = "chronify";

/// Per-user application data directory. Doesn't touch the filesystem.
pub fn application_default_path() -> Result<PathBuf> {
    let mut path = {
        #[cfg(windows)]
        {
            env::var("APPDATA")
                .map(PathBuf::from)
                .map_err(|_| anyhow!("APPDATA should be present on Windows"))?
        }
        #[cfg(target_os = "linux")]
        {
            env::var("XDG_DATA_HOME")
                .map(PathBuf::from)
                .or_else(|_| {
                    env::var("HOME").map(|home| {
                        let mut path = PathBuf::from(home);
                        path.push(".local/share");
                        path
                    })
                })
                .map_err(|_| anyhow!("Couldn't find neither XDG_DATA_HOME nor HOME"))?
        }
        #[cfg(not(any(windows, target_os = "linux")))]
        {
            dirs::data_dir().ok_or_else(|| anyhow!("No data directory on this platform"))?
        }
    };
    path.push(APPLICATION_NAME);
    Ok(path)
}

/// Makes sure `path` exists as a directory.
pub fn ensure_dir(path: PathBuf) -> Result<PathBuf> {
    match std::fs::create_dir_all(&path) {
        Ok(_) => Ok(path),
        Err(v) if v.kind() == io::ErrorKind::AlreadyExists => Ok(path),
        Err(v) => Err(v.into()),
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn default_path_ends_with_application_name() {
        let path = application_default_path().unwrap();
        assert_eq!(path.file_name().unwrap(), APPLICATION_NAME);
    }

    #[test]
    fn ensure_dir_creates_nested_directories() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        let created = ensure_dir(nested.clone()).unwrap();
        assert_eq!(created, nested);
        assert!(nested.is_dir());
        ensure_dir(nested.clone()).unwrap();
    }
}
