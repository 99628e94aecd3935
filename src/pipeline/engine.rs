//! Process-wide pdfium library discovery.
//!
//! Locating libpdfium means probing the filesystem and `dlopen`ing candidate
//! files, which is far too slow to repeat on every request. The outcome of
//! the first lookup (success *or* failure) is stored in a [`OnceLock`] and every
//! later render binds straight from the cached location.
//!
//! A fresh [`Pdfium`] handle is still created per render.
//!
//! Discovery order:
//! 1. `PDFIUM_LIB_PATH`, an explicit path to the library file
//! 2. next to the running executable
//! 3. the `pdfium-auto` cache directory
//! 4. the system library search path
//!
//! Discovery never touches the network. [`prepare_library`] fills the
//! `pdfium-auto` cache (download, or extraction with the `bundled` feature)
//! and must run before the first render for that copy to be picked up.

use crate::error::VisualError;
use pdfium_render::prelude::*;
use std::path::PathBuf;
use std::sync::OnceLock;
use tracing::{debug, info};

/// Where libpdfium was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LibraryLocation {
    Path(PathBuf),
    System,
}

static LOCATION: OnceLock<Result<LibraryLocation, String>> = OnceLock::new();

/// Resolve (once) where libpdfium lives.
pub fn library_location() -> Result<&'static LibraryLocation, VisualError> {
    LOCATION
        .get_or_init(discover)
        .as_ref()
        .map_err(|e| VisualError::PdfiumBindingFailed(e.clone()))
}

/// True when pdfium can be bound in this process.
pub fn is_available() -> bool {
    library_location().is_ok()
}

/// Bind a new [`Pdfium`] handle from the cached location.
pub fn bind() -> Result<Pdfium, VisualError> {
    match library_location()? {
        LibraryLocation::Path(path) => pdfium_auto::bind_pdfium_from_path(path)
            .map_err(|e| VisualError::PdfiumBindingFailed(e.to_string())),
        LibraryLocation::System => Pdfium::bind_to_system_library()
            .map(Pdfium::new)
            .map_err(|e| VisualError::PdfiumBindingFailed(e.to_string())),
    }
}

/// Make sure a pdfium library sits in the `pdfium-auto` cache, downloading
/// it on first use. Blocking; `on_progress` gets `(downloaded, total)`.
pub fn prepare_library(
    on_progress: Option<&dyn Fn(u64, Option<u64>)>,
) -> Result<PathBuf, VisualError> {
    #[cfg(feature = "bundled")]
    pdfium_auto::ensure_pdfium_bundled()
        .map_err(|e| VisualError::PdfiumBindingFailed(e.to_string()))?;

    let path = pdfium_auto::ensure_pdfium_library(on_progress)
        .map_err(|e| VisualError::PdfiumBindingFailed(e.to_string()))?;
    info!("pdfium library ready at {}", path.display());
    Ok(path)
}

/// True when [`prepare_library`] has nothing to fetch.
pub fn is_prepared() -> bool {
    pdfium_auto::is_pdfium_cached()
}

fn discover() -> Result<LibraryLocation, String> {
    if let Ok(path) = std::env::var("PDFIUM_LIB_PATH") {
        let path = PathBuf::from(path);
        return match Pdfium::bind_to_library(&path) {
            Ok(_) => {
                info!("Using pdfium from PDFIUM_LIB_PATH: {}", path.display());
                Ok(LibraryLocation::Path(path))
            }
            Err(e) => Err(format!(
                "PDFIUM_LIB_PATH is set to '{}' but it could not be loaded: {e}",
                path.display()
            )),
        };
    }

    if let Some(dir) = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|p| p.to_path_buf()))
    {
        let candidate = PathBuf::from(Pdfium::pdfium_platform_library_name_at_path(
            dir.to_string_lossy().as_ref(),
        ));
        if candidate.exists() && Pdfium::bind_to_library(&candidate).is_ok() {
            info!("Using pdfium next to executable: {}", candidate.display());
            return Ok(LibraryLocation::Path(candidate));
        }
        debug!("No pdfium next to executable in {}", dir.display());
    }

    if let Some(cached) = pdfium_auto::cached_pdfium_path() {
        if Pdfium::bind_to_library(&cached).is_ok() {
            info!("Using cached pdfium: {}", cached.display());
            return Ok(LibraryLocation::Path(cached));
        }
        debug!("Cached pdfium at {} could not be loaded", cached.display());
    }

    match Pdfium::bind_to_system_library() {
        Ok(_) => {
            info!("Using system pdfium library");
            Ok(LibraryLocation::System)
        }
        Err(e) => Err(format!(
            "pdfium library not found (checked PDFIUM_LIB_PATH, the executable's directory, \
             {} and the system search path): {e}",
            pdfium_auto::pdfium_cache_dir().display()
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_is_resolved_once() {
        let first = library_location().map(|l| l as *const LibraryLocation);
        let second = library_location().map(|l| l as *const LibraryLocation);
        match (first, second) {
            (Ok(a), Ok(b)) => assert_eq!(a, b),
            (Err(a), Err(b)) => assert_eq!(a.to_string(), b.to_string()),
            _ => panic!("library discovery result changed between calls"),
        }
    }

    #[test]
    fn bind_agrees_with_discovery() {
        assert_eq!(bind().is_ok(), is_available());
    }

    #[test]
    fn cache_dir_is_versioned() {
        let dir = pdfium_auto::pdfium_cache_dir();
        assert!(
            dir.to_string_lossy().contains(pdfium_auto::PDFIUM_VERSION),
            "got {}",
            dir.display()
        );
    }
}
