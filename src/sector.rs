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

    src/sector.rs

    Decoded sector records and the per-track aggregation that merges
    repeated reads across revolutions.
*/

use std::{
    collections::{btree_map::Entry, BTreeMap},
    fmt::{self, Display, Formatter},
};

/// A physical (cylinder, head) address on the medium.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TrackLocation {
    pub track: u16,
    pub side:  u8,
}

impl TrackLocation {
    pub fn new(track: u16, side: u8) -> Self {
        TrackLocation { track, side }
    }
}

impl Display for TrackLocation {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "[t:{:2} s:{}]", self.track, self.side)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SectorStatus {
    /// Payload present and checksum verified.
    Ok,
    /// Payload present but the data checksum disagreed.
    BadChecksum,
    /// A header was read but its data record never arrived.
    DataMissing,
    /// The sector was expected on this track but never seen.
    Missing,
    /// Two verified reads of the same sector disagreed.
    Conflict,
}

impl Display for SectorStatus {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            SectorStatus::Ok => write!(f, "OK"),
            SectorStatus::BadChecksum => write!(f, "bad checksum"),
            SectorStatus::DataMissing => write!(f, "data missing"),
            SectorStatus::Missing => write!(f, "missing"),
            SectorStatus::Conflict => write!(f, "conflict"),
        }
    }
}

/// One decoded sector. The payload is copied out of the raw cell buffer at
/// assembly time, so a Sector owns its bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Sector {
    pub logical_track:  u16,
    pub logical_side:   u8,
    pub logical_sector: u8,
    pub payload: Vec<u8>,
    pub status:  SectorStatus,
}

impl Sector {
    pub fn missing(logical_track: u16, logical_side: u8, logical_sector: u8) -> Self {
        Sector {
            logical_track,
            logical_side,
            logical_sector,
            payload: Vec::new(),
            status: SectorStatus::Missing,
        }
    }
}

impl Display for Sector {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(
            f,
            "[c:{:2} h:{} s:{:3}] {} ({} bytes)",
            self.logical_track,
            self.logical_side,
            self.logical_sector,
            self.status,
            self.payload.len()
        )
    }
}

/// Counts of sectors by status for one track.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub ok: usize,
    pub bad_checksum: usize,
    pub data_missing: usize,
    pub missing: usize,
    pub conflict: usize,
}

impl StatusCounts {
    pub fn add(&mut self, other: &StatusCounts) {
        self.ok += other.ok;
        self.bad_checksum += other.bad_checksum;
        self.data_missing += other.data_missing;
        self.missing += other.missing;
        self.conflict += other.conflict;
    }
}

impl Display for StatusCounts {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(
            f,
            "OK: {} Bad: {} NoData: {} Missing: {} Conflict: {}",
            self.ok, self.bad_checksum, self.data_missing, self.missing, self.conflict
        )
    }
}

/// The sectors recovered from one (track, side), keyed by logical sector
/// id. Repeated reads of the same sector merge: a verified read wins and is
/// never downgraded, two verified reads with different payloads become a
/// conflict, and unverified reads only fill empty slots.
#[derive(Clone, Debug)]
pub struct TrackSectors {
    pub location: TrackLocation,
    sectors: BTreeMap<u8, Sector>,
}

impl TrackSectors {
    pub fn new(location: TrackLocation) -> Self {
        TrackSectors {
            location,
            sectors: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, sector: Sector) {
        use SectorStatus::*;

        match self.sectors.entry(sector.logical_sector) {
            Entry::Vacant(slot) => {
                slot.insert(sector);
            }
            Entry::Occupied(mut slot) => {
                let current = slot.get_mut();
                match (current.status, sector.status) {
                    // Conflicts are sticky.
                    (Conflict, _) => {}
                    (Ok, Ok) => {
                        if current.payload != sector.payload {
                            log::warn!(
                                "TrackSectors::insert(): {} sector {} has two verified reads with different payloads",
                                self.location,
                                sector.logical_sector
                            );
                            current.status = Conflict;
                        }
                    }
                    (Ok, _) => {}
                    (_, Ok) => *current = sector,
                    (BadChecksum, _) => {}
                    (_, BadChecksum) => *current = sector,
                    (DataMissing, _) => {}
                    (_, DataMissing) => *current = sector,
                    (Missing, Missing) => {}
                    (Missing, Conflict) => *current = sector,
                }
            }
        }
    }

    /// Record `count` sectors starting at id `first` as missing unless a
    /// read produced them.
    pub fn fill_missing(&mut self, first: u8, count: u8) {
        for id in first..first.saturating_add(count) {
            self.sectors.entry(id).or_insert_with(|| {
                Sector::missing(self.location.track, self.location.side, id)
            });
        }
    }

    pub fn get(&self, logical_sector: u8) -> Option<&Sector> {
        self.sectors.get(&logical_sector)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Sector> {
        self.sectors.values()
    }

    pub fn len(&self) -> usize {
        self.sectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sectors.is_empty()
    }

    pub fn summary(&self) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for sector in self.sectors.values() {
            match sector.status {
                SectorStatus::Ok => counts.ok += 1,
                SectorStatus::BadChecksum => counts.bad_checksum += 1,
                SectorStatus::DataMissing => counts.data_missing += 1,
                SectorStatus::Missing => counts.missing += 1,
                SectorStatus::Conflict => counts.conflict += 1,
            }
        }
        counts
    }
}
