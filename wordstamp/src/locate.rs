//! Locating the ffmpeg binary.
//!
//! The locator never touches the process environment. It hands back a
//! directory, and the decoder prepends it to the `PATH` of the ffmpeg child
//! process only.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

#[cfg(windows)]
const FFMPEG_BINARY: &str = "ffmpeg.exe";
#[cfg(not(windows))]
const FFMPEG_BINARY: &str = "ffmpeg";

/// Package directories under the WinGet root are named like
/// `Gyan.FFmpeg_Microsoft.Winget.Source_8wekyb3d8bbwe`.
const WINGET_PACKAGE_PATTERN: &str = "FFmpeg";

/// Finds the directory holding an ffmpeg executable.
///
/// An explicit directory takes precedence; scanning an install tree is the
/// fallback.
#[derive(Debug, Clone)]
pub struct FfmpegLocator {
    explicit_dir: Option<PathBuf>,
    search_root: Option<PathBuf>,
    package_pattern: String,
    binary_name: String,
}

impl FfmpegLocator {
    /// Locator for this platform's package manager install tree.
    ///
    /// On Windows this scans `%LOCALAPPDATA%\Microsoft\WinGet\Packages`.
    /// Elsewhere there is nothing to scan and ffmpeg is expected on `PATH`.
    pub fn platform_default() -> Self {
        Self {
            explicit_dir: None,
            search_root: default_search_root(),
            package_pattern: WINGET_PACKAGE_PATTERN.to_string(),
            binary_name: FFMPEG_BINARY.to_string(),
        }
    }

    /// Locator that scans `search_root` for packages whose name contains
    /// `package_pattern`.
    pub fn scanning(
        search_root: impl Into<PathBuf>,
        package_pattern: impl Into<String>,
        binary_name: impl Into<String>,
    ) -> Self {
        Self {
            explicit_dir: None,
            search_root: Some(search_root.into()),
            package_pattern: package_pattern.into(),
            binary_name: binary_name.into(),
        }
    }

    /// Prefer `dir` over any scan result.
    pub fn with_explicit_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.explicit_dir = dir;
        self
    }

    /// Return the directory containing the binary, or `None`.
    pub fn locate(&self) -> Option<PathBuf> {
        if let Some(dir) = &self.explicit_dir {
            if dir.join(&self.binary_name).is_file() {
                return Some(dir.clone());
            }
            warn!(dir = %dir.display(), "configured ffmpeg dir has no {}", self.binary_name);
        }

        let root = self.search_root.as_deref()?;
        let entries = match std::fs::read_dir(root) {
            Ok(entries) => entries,
            Err(e) => {
                debug!(root = %root.display(), error = %e, "ffmpeg search root unreadable");
                return None;
            }
        };

        // First package in directory order wins
        for entry in entries.filter_map(|e| e.ok()) {
            if !entry.file_name().to_string_lossy().contains(&self.package_pattern) {
                continue;
            }
            if let Some(dir) = self.find_in_package(&entry.path()) {
                return Some(dir);
            }
        }
        None
    }

    fn find_in_package(&self, package_dir: &Path) -> Option<PathBuf> {
        WalkDir::new(package_dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .find(|e| e.file_type().is_file() && e.file_name() == self.binary_name.as_str())
            .and_then(|e| e.path().parent().map(Path::to_path_buf))
    }
}

fn default_search_root() -> Option<PathBuf> {
    if cfg!(windows) {
        dirs::data_local_dir().map(|d| d.join("Microsoft").join("WinGet").join("Packages"))
    } else {
        None
    }
}

/// Program to spawn for ffmpeg: inside `dir` when known, else bare name via `PATH`.
pub fn ffmpeg_program(dir: Option<&Path>) -> PathBuf {
    match dir {
        Some(dir) => dir.join(FFMPEG_BINARY),
        None => PathBuf::from(FFMPEG_BINARY),
    }
}

/// A `PATH` value with `dir` in front of `current`.
pub fn search_path_with(dir: &Path, current: Option<OsString>) -> Option<OsString> {
    let mut paths = vec![dir.to_path_buf()];
    if let Some(current) = current {
        paths.extend(std::env::split_paths(&current));
    }
    std::env::join_paths(paths).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"").unwrap();
    }

    #[test]
    fn test_locate_finds_nested_binary() {
        let tmp = TempDir::new().unwrap();
        let bin_dir = tmp
            .path()
            .join("Gyan.FFmpeg_Microsoft.Winget.Source_8wekyb3d8bbwe")
            .join("ffmpeg-7.1-full_build")
            .join("bin");
        touch(&bin_dir.join("ffmpeg.exe"));

        let locator = FfmpegLocator::scanning(tmp.path(), "FFmpeg", "ffmpeg.exe");
        assert_eq!(locator.locate(), Some(bin_dir));
    }

    #[test]
    fn test_locate_skips_non_matching_packages() {
        let tmp = TempDir::new().unwrap();
        touch(&tmp.path().join("Other.Tool").join("ffmpeg.exe"));

        let locator = FfmpegLocator::scanning(tmp.path(), "FFmpeg", "ffmpeg.exe");
        assert_eq!(locator.locate(), None);
    }

    #[test]
    fn test_locate_pattern_is_case_sensitive() {
        let tmp = TempDir::new().unwrap();
        touch(&tmp.path().join("gyan.ffmpeg").join("bin").join("ffmpeg.exe"));

        let locator = FfmpegLocator::scanning(tmp.path(), "FFmpeg", "ffmpeg.exe");
        assert_eq!(locator.locate(), None);
    }

    #[test]
    fn test_locate_package_without_binary() {
        let tmp = TempDir::new().unwrap();
        touch(&tmp.path().join("Gyan.FFmpeg").join("README.txt"));

        let locator = FfmpegLocator::scanning(tmp.path(), "FFmpeg", "ffmpeg.exe");
        assert_eq!(locator.locate(), None);
    }

    #[test]
    fn test_locate_missing_root() {
        let locator = FfmpegLocator::scanning("/nonexistent/winget", "FFmpeg", "ffmpeg.exe");
        assert_eq!(locator.locate(), None);
    }

    #[test]
    fn test_locate_multiple_packages_returns_one_of_them() {
        let tmp = TempDir::new().unwrap();
        let a = tmp.path().join("A.FFmpeg").join("bin");
        let b = tmp.path().join("B.FFmpeg").join("bin");
        touch(&a.join("ffmpeg"));
        touch(&b.join("ffmpeg"));

        let locator = FfmpegLocator::scanning(tmp.path(), "FFmpeg", "ffmpeg");
        let found = locator.locate().unwrap();
        assert!(found == a || found == b);
    }

    #[test]
    fn test_explicit_dir_takes_precedence() {
        let tmp = TempDir::new().unwrap();
        let scanned = tmp.path().join("root").join("Gyan.FFmpeg").join("bin");
        let explicit = tmp.path().join("custom");
        touch(&scanned.join("ffmpeg"));
        touch(&explicit.join("ffmpeg"));

        let locator = FfmpegLocator::scanning(tmp.path().join("root"), "FFmpeg", "ffmpeg")
            .with_explicit_dir(Some(explicit.clone()));
        assert_eq!(locator.locate(), Some(explicit));
    }

    #[test]
    fn test_explicit_dir_without_binary_falls_back_to_scan() {
        let tmp = TempDir::new().unwrap();
        let scanned = tmp.path().join("root").join("Gyan.FFmpeg").join("bin");
        touch(&scanned.join("ffmpeg"));
        let empty = tmp.path().join("empty");
        fs::create_dir_all(&empty).unwrap();

        let locator = FfmpegLocator::scanning(tmp.path().join("root"), "FFmpeg", "ffmpeg")
            .with_explicit_dir(Some(empty));
        assert_eq!(locator.locate(), Some(scanned));
    }

    #[test]
    fn test_ffmpeg_program() {
        assert_eq!(ffmpeg_program(None), PathBuf::from(FFMPEG_BINARY));
        assert_eq!(
            ffmpeg_program(Some(Path::new("/opt/ffmpeg/bin"))),
            Path::new("/opt/ffmpeg/bin").join(FFMPEG_BINARY)
        );
    }

    #[test]
    fn test_search_path_with_prepends() {
        let current = std::env::join_paths([PathBuf::from("/usr/bin"), PathBuf::from("/bin")]).unwrap();
        let joined = search_path_with(Path::new("/opt/ffmpeg/bin"), Some(current)).unwrap();
        let parts: Vec<PathBuf> = std::env::split_paths(&joined).collect();
        assert_eq!(
            parts,
            vec![
                PathBuf::from("/opt/ffmpeg/bin"),
                PathBuf::from("/usr/bin"),
                PathBuf::from("/bin")
            ]
        );
    }

    #[test]
    fn test_search_path_with_no_current() {
        let joined = search_path_with(Path::new("/opt/ffmpeg/bin"), None).unwrap();
        assert_eq!(joined, OsString::from("/opt/ffmpeg/bin"));
    }
}
