//! Process-wide tunings, loaded once at startup and treated as constants
//! thereafter (spec. 5: "no mutable global state is required by the core").

use serde::{Deserialize, Serialize};

use crate::{err_at, Error, Result};

/// Pipeline and resource tunings enumerated in spec. 4.2.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Producer-side parallelism, 1..=num_cpus.
    pub num_procs: usize,
    /// Worker-pool size, 1..=128.
    pub num_serve: usize,
    /// Bounded channel depth between producer and workers.
    pub chan_depth: usize,
    /// Unshuffler reorder-heap capacity, 8..=64.
    pub heap_size: usize,
    /// Per-worker scratch buffer size, 4..=2048.
    pub farm_size: usize,
    /// Allocator-pressure knob, loosely modelled on Go's GOGC, 50..=1000.
    pub gogc: usize,

    /// Reserved flags. The source exposes these but treats them as no-ops;
    /// implementers must not invent semantics for them (spec. 9).
    #[serde(flatten)]
    pub reserved: ReservedFlags,
}

/// Flags documented only as "reserved" in spec. 9. Parsed so round-tripping a
/// config file does not lose them, never read by any operation in this crate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReservedFlags {
    pub debug: bool,
    pub unicode: bool,
    pub script: bool,
    pub mathml: bool,
}

impl Default for Config {
    fn default() -> Config {
        let num_procs = num_cpus::get();
        Config {
            num_procs,
            num_serve: num_procs,
            chan_depth: num_procs,
            heap_size: 16,
            farm_size: 256,
            gogc: 100,
            reserved: ReservedFlags::default(),
        }
    }
}

impl Config {
    pub fn from_toml(text: &str) -> Result<Config> {
        let config: Config = err_at!(InvalidInput, toml::from_str(text))?;
        config.validate()
    }

    pub fn validate(self) -> Result<Config> {
        if !(1..=128).contains(&self.num_procs) {
            return err_at!(InvalidInput, msg: "num_procs {} out of range 1..=128", self.num_procs);
        }
        if !(1..=128).contains(&self.num_serve) {
            return err_at!(InvalidInput, msg: "num_serve {} out of range 1..=128", self.num_serve);
        }
        if self.chan_depth < self.num_procs.max(1) || self.chan_depth > 128 {
            return err_at!(
                InvalidInput, msg: "chan_depth {} out of range ncpu..=128", self.chan_depth
            );
        }
        if !(8..=64).contains(&self.heap_size) {
            return err_at!(InvalidInput, msg: "heap_size {} out of range 8..=64", self.heap_size);
        }
        if !(4..=2048).contains(&self.farm_size) {
            return err_at!(InvalidInput, msg: "farm_size {} out of range 4..=2048", self.farm_size);
        }
        if !(50..=1000).contains(&self.gogc) {
            return err_at!(InvalidInput, msg: "gogc {} out of range 50..=1000", self.gogc);
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_from_toml_round_trip() {
        let toml = "num_procs = 4\nnum_serve = 8\nchan_depth = 8\nheap_size = 16\n\
                    farm_size = 256\ngogc = 100\n";
        let cfg = Config::from_toml(toml).unwrap();
        assert_eq!(cfg.num_serve, 8);
        assert!(!cfg.reserved.unicode);
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let mut cfg = Config::default();
        cfg.heap_size = 4;
        assert!(cfg.validate().is_err());
    }
}
