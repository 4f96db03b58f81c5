use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use statechart_typegen_extract::{Dialect, ExtractorSettings};
use tracing::trace;

use crate::analyze::{AnalyzeError, MachineAnalysis, analyze_source, read_source};

/// Analyses of source files, keyed by path.
///
/// A file is re-analyzed only when its content changes. The cache is owned
/// by its caller and holds nothing beyond what was put in it.
#[derive(Debug, Default)]
pub struct ExtractionCache {
    settings: ExtractorSettings,
    entries: BTreeMap<PathBuf, Entry>,
}

#[derive(Debug)]
struct Entry {
    source: String,
    analyses: Vec<MachineAnalysis>,
}

impl ExtractionCache {
    pub fn new(settings: ExtractorSettings) -> Self {
        Self {
            settings,
            entries: BTreeMap::new(),
        }
    }

    pub fn settings(&self) -> &ExtractorSettings {
        &self.settings
    }

    /// Reads `path` and returns its analyses, re-analyzing only if the
    /// content differs from the cached one.
    ///
    /// A file that fails to read or analyze is dropped from the cache.
    pub fn refresh(&mut self, path: &Path) -> Result<&[MachineAnalysis], AnalyzeError> {
        match read_source(path) {
            Ok(source) => self.insert_source(path, source),
            Err(err) => {
                self.invalidate(path);
                Err(err)
            }
        }
    }

    /// Like [`refresh`](Self::refresh), with the content supplied by the
    /// caller, e.g. an unsaved editor buffer.
    pub fn insert_source(
        &mut self,
        path: impl Into<PathBuf>,
        source: String,
    ) -> Result<&[MachineAnalysis], AnalyzeError> {
        let path = path.into();
        let unchanged = self
            .entries
            .get(&path)
            .is_some_and(|entry| entry.source == source);

        if unchanged {
            trace!(path = %path.display(), "extraction cache hit");
        } else {
            trace!(path = %path.display(), "extraction cache miss");
            match analyze_source(&source, Dialect::from_path(&path), &self.settings) {
                Ok(analyses) => {
                    self.entries.insert(path.clone(), Entry { source, analyses });
                }
                Err(err) => {
                    self.invalidate(&path);
                    return Err(err);
                }
            }
        }
        Ok(self.get(&path).unwrap_or_default())
    }

    pub fn get(&self, path: &Path) -> Option<&[MachineAnalysis]> {
        self.entries.get(path).map(|entry| entry.analyses.as_slice())
    }

    /// Forgets `path`. Returns whether it was cached.
    pub fn invalidate(&mut self, path: &Path) -> bool {
        let removed = self.entries.remove(path).is_some();
        if removed {
            trace!(path = %path.display(), "extraction cache entry invalidated");
        }
        removed
    }

    pub fn clear(&mut self) {
        trace!(entries = self.entries.len(), "extraction cache cleared");
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every cached machine with the file it came from, ordered by path and
    /// then by position in the file.
    pub fn machines(&self) -> impl Iterator<Item = (&Path, &MachineAnalysis)> {
        self.entries.iter().flat_map(|(path, entry)| {
            entry
                .analyses
                .iter()
                .map(move |analysis| (path.as_path(), analysis))
        })
    }
}
