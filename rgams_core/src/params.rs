//! Fetch-once cache for slow-changing head parameters.
//!
//! Multiplier presence and the maximum mass are physically fixed for the
//! life of a session; the noise floor is only changed through
//! [`ParameterCache::set_noise_floor`], which writes through. Nothing is
//! re-queried until the cache is cleared.

use rgams_traits::SerialLink;
use tracing::debug;

use crate::channel::CommandChannel;
use crate::error::Result;

/// Highest noise-floor index the head accepts.
pub const NF_MAX: i32 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKey {
    MultiplierInstalled,
    MzMax,
    NoiseFloor,
}

impl ParamKey {
    pub fn label(self) -> &'static str {
        match self {
            ParamKey::MultiplierInstalled => "multiplier-installed",
            ParamKey::MzMax => "mz-max",
            ParamKey::NoiseFloor => "noise-floor",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ParameterCache {
    multiplier: Option<bool>,
    mz_max: Option<u32>,
    noise_floor: Option<i32>,
}

/// Return the cached value or fill it from `fetch`; failures leave the slot empty.
fn fetch_once<T: Copy>(slot: &mut Option<T>, key: ParamKey, fetch: impl FnOnce() -> Result<T>) -> Result<T> {
    if let Some(v) = *slot {
        return Ok(v);
    }
    let v = fetch()?;
    debug!(key = key.label(), "parameter cached");
    *slot = Some(v);
    Ok(v)
}

impl ParameterCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// `MO?`; any non-zero reply means a multiplier is installed.
    pub fn multiplier_installed<L: SerialLink>(&mut self, ch: &mut CommandChannel<L>) -> Result<bool> {
        fetch_once(&mut self.multiplier, ParamKey::MultiplierInstalled, || {
            let flag: f64 = ch.query("MO?")?.parse("MO?")?;
            Ok(flag != 0.0)
        })
    }

    /// Highest mass the head supports.
    ///
    /// The head only reports it as the default of the upper scan bound, so the
    /// current bound is read, reset to its default, read back and restored.
    pub fn mz_max<L: SerialLink>(&mut self, ch: &mut CommandChannel<L>) -> Result<u32> {
        fetch_once(&mut self.mz_max, ParamKey::MzMax, || {
            let previous: u32 = ch.query("MF?")?.parse("MF?")?;
            ch.send("MF*")?;
            let max: u32 = ch.query("MF?")?.parse("MF?")?;
            ch.send(&format!("MF{previous}"))?;
            Ok(max)
        })
    }

    pub fn noise_floor<L: SerialLink>(&mut self, ch: &mut CommandChannel<L>) -> Result<i32> {
        fetch_once(&mut self.noise_floor, ParamKey::NoiseFloor, || {
            ch.query("NF?")?.parse("NF?")
        })
    }

    /// Clamp `nf` to `0..=NF_MAX` and write it unless it is already set.
    ///
    /// Returns the value in effect afterwards.
    pub fn set_noise_floor<L: SerialLink>(&mut self, ch: &mut CommandChannel<L>, nf: i32) -> Result<i32> {
        let nf = if nf > NF_MAX {
            ch.warn(&format!("NF parameter must be {NF_MAX} or less. Using NF = {NF_MAX}..."));
            NF_MAX
        } else if nf < 0 {
            ch.warn("NF parameter must be 0 or higher. Using NF = 0...");
            0
        } else {
            nf
        };
        if self.noise_floor(ch)? != nf {
            ch.send(&format!("NF{nf}"))?;
            self.noise_floor = Some(nf);
        }
        Ok(nf)
    }

    pub fn is_cached(&self, key: ParamKey) -> bool {
        match key {
            ParamKey::MultiplierInstalled => self.multiplier.is_some(),
            ParamKey::MzMax => self.mz_max.is_some(),
            ParamKey::NoiseFloor => self.noise_floor.is_some(),
        }
    }

    pub fn invalidate(&mut self, key: ParamKey) {
        match key {
            ParamKey::MultiplierInstalled => self.multiplier = None,
            ParamKey::MzMax => self.mz_max = None,
            ParamKey::NoiseFloor => self.noise_floor = None,
        }
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
