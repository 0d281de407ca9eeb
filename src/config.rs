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

    src/config.rs

    Decoder configuration. A Config is an immutable value assembled once:
    a per-variant base profile, then option groups (the first group to
    provide a field wins), then user overrides (the last override wins).
*/

use std::{path::PathBuf, str::FromStr};

use crate::{decoder::DecoderVariant, fluxmap::NS_PER_TICK, FluxError};

/// Ticks in a 2 µs bit cell, the double-density nominal.
const CELL_2US_TICKS: f64 = 2_000.0 / NS_PER_TICK;

pub const DEFAULT_MAX_RECORDS_PER_TRACK: usize = 256;

#[derive(Clone, Debug)]
pub struct Config {
    pub decoder: DecoderConfig,
}

#[derive(Clone, Debug)]
pub struct DecoderConfig {
    pub variant: DecoderVariant,

    /// Fraction of the observed period error applied per pulse.
    pub pll_phase_gain: f64,
    pub nominal_cell_ticks: f64,
    pub min_cell_ticks: f64,
    pub max_cell_ticks: f64,

    pub first_track: u16,
    pub last_track:  u16,
    pub sides: u8,

    /// (first id, count) of the sectors a healthy track carries, used to
    /// mark never-seen sectors as missing. `None` disables the check.
    pub expected_sectors: Option<(u8, u8)>,

    pub max_records_per_track: usize,

    /// Decode distinct tracks on worker threads when the flux source
    /// permits it.
    pub parallel: bool,

    /// Mirror every Fluxmap read into stream files under this directory.
    pub copy_flux_to: Option<PathBuf>,
}

/// A partial configuration; unset fields defer to lower-priority layers.
#[derive(Clone, Debug, Default)]
pub struct ConfigPatch {
    pub pll_phase_gain: Option<f64>,
    pub nominal_cell_ticks: Option<f64>,
    pub min_cell_ticks: Option<f64>,
    pub max_cell_ticks: Option<f64>,
    pub first_track: Option<u16>,
    pub last_track:  Option<u16>,
    pub sides: Option<u8>,
    pub expected_sectors: Option<(u8, u8)>,
    pub max_records_per_track: Option<usize>,
    pub parallel: Option<bool>,
    pub copy_flux_to: Option<PathBuf>,
}

impl ConfigPatch {
    /// Take fields from `other` only where this patch has none.
    fn fill_from(&mut self, other: &ConfigPatch) {
        fill_scalar(&mut self.pll_phase_gain, &other.pll_phase_gain);
        fill_scalar(&mut self.nominal_cell_ticks, &other.nominal_cell_ticks);
        fill_scalar(&mut self.min_cell_ticks, &other.min_cell_ticks);
        fill_scalar(&mut self.max_cell_ticks, &other.max_cell_ticks);
        fill_scalar(&mut self.first_track, &other.first_track);
        fill_scalar(&mut self.last_track, &other.last_track);
        fill_scalar(&mut self.sides, &other.sides);
        fill_scalar(&mut self.expected_sectors, &other.expected_sectors);
        fill_scalar(&mut self.max_records_per_track, &other.max_records_per_track);
        fill_scalar(&mut self.parallel, &other.parallel);
        if self.copy_flux_to.is_none() {
            self.copy_flux_to = other.copy_flux_to.clone();
        }
    }

    /// Overwrite `config` with every field this patch sets. Optional target
    /// fields can be set by a patch but not cleared.
    fn apply_over(&self, config: &mut DecoderConfig) {
        apply_scalar(&self.pll_phase_gain, &mut config.pll_phase_gain);
        apply_scalar(&self.nominal_cell_ticks, &mut config.nominal_cell_ticks);
        apply_scalar(&self.min_cell_ticks, &mut config.min_cell_ticks);
        apply_scalar(&self.max_cell_ticks, &mut config.max_cell_ticks);
        apply_scalar(&self.first_track, &mut config.first_track);
        apply_scalar(&self.last_track, &mut config.last_track);
        apply_scalar(&self.sides, &mut config.sides);
        apply_scalar(&self.max_records_per_track, &mut config.max_records_per_track);
        apply_scalar(&self.parallel, &mut config.parallel);
        if let Some(expected) = self.expected_sectors {
            config.expected_sectors = Some(expected);
        }
        if let Some(path) = &self.copy_flux_to {
            config.copy_flux_to = Some(path.clone());
        }
    }
}

fn fill_scalar<T: Copy>(dst: &mut Option<T>, src: &Option<T>) {
    if dst.is_none() {
        *dst = *src;
    }
}

fn apply_scalar<T: Copy>(src: &Option<T>, dst: &mut T) {
    if let Some(value) = src {
        *dst = *value;
    }
}

pub struct ConfigBuilder {
    variant: DecoderVariant,
    groups: Vec<ConfigPatch>,
    overrides: Vec<ConfigPatch>,
}

impl ConfigBuilder {
    pub fn for_variant(variant: DecoderVariant) -> Self {
        ConfigBuilder {
            variant,
            groups: Vec::new(),
            overrides: Vec::new(),
        }
    }

    /// Resolve a textual variant selector ("aeslanier", "ibm", ...).
    pub fn from_selector(selector: &str) -> Result<Self, FluxError> {
        let variant = DecoderVariant::from_str(selector)
            .map_err(|_| FluxError::Config(format!("unknown decoder variant '{selector}'")))?;
        Ok(Self::for_variant(variant))
    }

    /// Add an option group. Across groups, the first one to provide a
    /// field wins.
    pub fn group(mut self, patch: ConfigPatch) -> Self {
        self.groups.push(patch);
        self
    }

    /// Add a user override. Across overrides, the last one to provide a
    /// field wins.
    pub fn set(mut self, patch: ConfigPatch) -> Self {
        self.overrides.push(patch);
        self
    }

    pub fn build(self) -> Result<Config, FluxError> {
        let mut decoder = profile(self.variant);

        let mut from_groups = ConfigPatch::default();
        for group in &self.groups {
            from_groups.fill_from(group);
        }
        from_groups.apply_over(&mut decoder);

        for patch in &self.overrides {
            patch.apply_over(&mut decoder);
        }

        validate(&decoder)?;
        Ok(Config { decoder })
    }
}

/// The base profile for a variant. Values are what the original hardware
/// wrote: AES Lanier machines formatted 77 single-sided tracks of 32
/// 256-byte sectors; the IBM profile matches a 3.5" double-density disk.
fn profile(variant: DecoderVariant) -> DecoderConfig {
    match variant {
        DecoderVariant::AesLanier => DecoderConfig {
            variant,
            pll_phase_gain: 0.05,
            nominal_cell_ticks: CELL_2US_TICKS,
            min_cell_ticks: CELL_2US_TICKS * 0.75,
            max_cell_ticks: CELL_2US_TICKS * 1.25,
            first_track: 0,
            last_track: 76,
            sides: 1,
            expected_sectors: Some((0, 32)),
            max_records_per_track: DEFAULT_MAX_RECORDS_PER_TRACK,
            parallel: false,
            copy_flux_to: None,
        },
        DecoderVariant::Ibm => DecoderConfig {
            variant,
            pll_phase_gain: 0.05,
            nominal_cell_ticks: CELL_2US_TICKS,
            min_cell_ticks: CELL_2US_TICKS * 0.75,
            max_cell_ticks: CELL_2US_TICKS * 1.25,
            first_track: 0,
            last_track: 79,
            sides: 2,
            expected_sectors: Some((1, 9)),
            max_records_per_track: DEFAULT_MAX_RECORDS_PER_TRACK,
            parallel: false,
            copy_flux_to: None,
        },
    }
}

fn validate(config: &DecoderConfig) -> Result<(), FluxError> {
    if !(0.01..=0.2).contains(&config.pll_phase_gain) {
        return Err(FluxError::Config(format!(
            "pll_phase_gain {} outside [0.01, 0.2]",
            config.pll_phase_gain
        )));
    }
    if !(config.min_cell_ticks <= config.nominal_cell_ticks
        && config.nominal_cell_ticks <= config.max_cell_ticks)
    {
        return Err(FluxError::Config(format!(
            "cell clock window [{}, {}] does not contain the nominal {}",
            config.min_cell_ticks, config.max_cell_ticks, config.nominal_cell_ticks
        )));
    }
    if config.min_cell_ticks <= 0.0 {
        return Err(FluxError::Config("min_cell_ticks must be positive".into()));
    }
    if config.first_track > config.last_track {
        return Err(FluxError::Config(format!(
            "track range {}..={} is empty",
            config.first_track, config.last_track
        )));
    }
    if config.sides == 0 || config.sides > 2 {
        return Err(FluxError::Config(format!("side count {} invalid", config.sides)));
    }
    if config.max_records_per_track == 0 {
        return Err(FluxError::Config("max_records_per_track must be nonzero".into()));
    }
    Ok(())
}
