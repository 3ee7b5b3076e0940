// Core loaders
//
// Loading (reading, compiling, instantiating) runs off the frame loop on a
// loader thread, so a loader must be `Send + 'static`.

use super::{CoreError, CoreModule, ExportNames, WasmCore};
use std::path::PathBuf;

/// Produces a fresh core module instance
pub trait CoreLoader: Send + 'static {
    fn load(&self) -> Result<Box<dyn CoreModule>, CoreError>;
}

/// Loads a core from a `.wasm` file on disk
#[derive(Debug, Clone)]
pub struct WasmCoreLoader {
    path: PathBuf,
    names: ExportNames,
}

impl WasmCoreLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            names: ExportNames::nes(),
        }
    }

    /// Bind a different export table
    pub fn with_exports(mut self, names: ExportNames) -> Self {
        self.names = names;
        self
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

impl CoreLoader for WasmCoreLoader {
    fn load(&self) -> Result<Box<dyn CoreModule>, CoreError> {
        let core = WasmCore::from_file(&self.path, &self.names)?;
        Ok(Box::new(core))
    }
}
