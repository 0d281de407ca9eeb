/*
    fluxforge
    https://github.com/fluxforge/fluxforge

    Copyright 2025 the fluxforge authors

    Permission is hereby granted, free of charge, to any person obtaining a
    copy of this software and associated documentation files (the “Software”),
    to deal in the Software without restriction, including without limitation
    the rights to use, copy, modify, merge, publish, distribute, sublicense,
    and/or sell copies of the Software, and to permit persons to whom the
    Software is furnished to do so, subject to the following conditions:

    The above copyright notice and this permission notice shall be included in
    all copies or substantial portions of the Software.

    THE SOFTWARE IS PROVIDED “AS IS”, WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
    IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
    FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
    AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
    LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING
    FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER
    DEALINGS IN THE SOFTWARE.

    --------------------------------------------------------------------------

    src/source/kryoflux.rs

    KryoFlux-style capture sets: a directory of one stream file per
    (track, side), named `<prefix>NN.S.raw`. Case varies between imaging
    runs, so matching is case-insensitive.
*/

use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
};

use regex::Regex;

use crate::{
    fluxmap::Fluxmap,
    source::{stream, FluxSink, FluxSource},
    FluxError,
};

pub struct KryofluxSource {
    dir: PathBuf,
}

impl KryofluxSource {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        KryofluxSource {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    fn find_file(&self, track: u16, side: u8) -> Result<PathBuf, FluxError> {
        let suffix = format!("{:02}.{}.raw", track, side);
        let mut found: Option<PathBuf> = None;

        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            let matches = path
                .file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.to_ascii_lowercase().ends_with(&suffix))
                .unwrap_or(false);
            if matches {
                if found.is_some() {
                    return Err(FluxError::Source(format!(
                        "capture set is ambiguous: multiple files end in {suffix}"
                    )));
                }
                found = Some(path);
            }
        }

        found.ok_or_else(|| {
            FluxError::Source(format!(
                "no capture file matching *{} in {}",
                suffix,
                self.dir.display()
            ))
        })
    }
}

impl FluxSource for KryofluxSource {
    fn read_flux(&self, track: u16, side: u8) -> Result<Fluxmap, FluxError> {
        let path = self.find_file(track, side)?;
        log::debug!("KryofluxSource::read_flux(): reading {}", path.display());
        let data = fs::read(path)?;
        stream::read_stream(&data)
    }

    fn is_reentrant(&self) -> bool {
        true
    }
}

/// Derive the (cylinder count, side count) a capture set covers from a
/// directory listing. Accepts the listing rather than a path so archive
/// contents can be scanned without extraction.
pub fn scan_set(listing: &[PathBuf]) -> (u16, u8) {
    let re = Regex::new(r"(?i)(\d{2})\.(\d)\.raw$").unwrap();

    let mut tracks: HashSet<u16> = HashSet::new();
    let mut sides: HashSet<u8> = HashSet::new();

    for path in listing {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if let Some(caps) = re.captures(name) {
            if let (Ok(track), Ok(side)) = (caps[1].parse::<u16>(), caps[2].parse::<u8>()) {
                tracks.insert(track);
                sides.insert(side);
            }
        }
    }

    (tracks.len() as u16, sides.len().max(1) as u8)
}

/// Writes one stream file per track, in the same shape [`KryofluxSource`]
/// reads. Used for the diagnostic flux mirror.
pub struct StreamFluxSink {
    dir: PathBuf,
}

impl StreamFluxSink {
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self, FluxError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(StreamFluxSink { dir })
    }
}

impl FluxSink for StreamFluxSink {
    fn write_flux(&self, track: u16, side: u8, fluxmap: &Fluxmap) -> Result<(), FluxError> {
        let path = self.dir.join(format!("track{:02}.{}.raw", track, side));
        log::debug!("StreamFluxSink::write_flux(): writing {}", path.display());
        fs::write(path, stream::write_stream(fluxmap))?;
        Ok(())
    }
}
