use std::path::Path;

use tracing::trace;

use crate::{error::Result, store::StorePaths};

/// Hands out fresh file pairs for intermediate automata.
///
/// The backing directory is created on first use and removed again by [`TempContext::clear`]
/// or when the context is dropped. Automata created from paths of this context must be
/// closed before the context is cleared.
#[derive(Debug, Default)]
pub struct TempContext {
    dir: Option<tempfile::TempDir>,
    counter: u64,
}

impl TempContext {
    /// Creates an empty context, no directory is created yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a pair of paths that has not been handed out before.
    pub fn next_paths(&mut self) -> Result<StorePaths> {
        let dir = match self.dir.take() {
            Some(dir) => dir,
            None => tempfile::Builder::new().prefix("automata-").tempdir()?,
        };
        self.counter += 1;
        let paths = StorePaths::in_dir(dir.path(), &format!("temp{}", self.counter));
        self.dir = Some(dir);
        trace!("handing out temporary store {}", paths.header.display());
        Ok(paths)
    }

    /// The directory temporary files are placed in, if it has been created already.
    pub fn directory(&self) -> Option<&Path> {
        self.dir.as_ref().map(|dir| dir.path())
    }

    /// Number of file pairs handed out since the context was created or last cleared.
    pub fn handed_out(&self) -> u64 {
        self.counter
    }

    /// Removes the directory and everything in it.
    pub fn clear(&mut self) -> Result<()> {
        if let Some(dir) = self.dir.take() {
            trace!("clearing temporary directory {}", dir.path().display());
            dir.close()?;
        }
        self.counter = 0;
        Ok(())
    }
}
