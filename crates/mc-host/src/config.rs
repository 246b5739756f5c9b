//! Configuration Loading
//!
//! Parses the host's INI-style configuration file into (a) the ambient
//! settings the host itself needs (serial port, baud rate) and (b) the
//! config-token registry (§6): a flat table of short tokens (`xvm`, `1mi`,
//! `g54x`, ...), each carrying a display name, type, flags, and default,
//! the same surface `mc-firmware`'s `ConfigGet`/`ConfigSet` commands read
//! and write through `mc-proto`.

use anyhow::{Context, Result};
use configparser::ini::Ini;
use mc_proto::commands::ConfigValue;
use std::collections::BTreeMap;
use std::path::Path;

/// The `[mcu]` section: how the host reaches the MCU.
#[derive(Debug, Clone)]
pub struct McuConfig {
    pub serial_port: String,
    pub baud_rate: u32,
}

/// Flags carried by a config-token entry (§6): persisted across reboots,
/// read-only (status-derived, e.g. a probe result), or reset to its default
/// on every boot rather than restored from the persistence layer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenFlags {
    pub persistent: bool,
    pub read_only: bool,
    pub init_from_default: bool,
}

/// One entry in the config-token registry.
#[derive(Debug, Clone)]
pub struct TokenEntry {
    pub display_name: &'static str,
    pub value: ConfigValue,
    pub flags: TokenFlags,
}

/// The full config-token surface, keyed by the 2-4 character wire token.
/// Seeded with built-in defaults and overridden section-by-section from the
/// `[tokens]` section of the config file (`xvm = 1200.0`, `g54x = 0.0`, ...).
#[derive(Debug, Clone)]
pub struct ConfigRegistry {
    entries: BTreeMap<String, TokenEntry>,
}

impl ConfigRegistry {
    /// Built-in defaults, grounded on the token families `g2core`'s
    /// `settings.h` exposes: per-axis velocity/jerk (`xvm`, `xjm`), per-motor
    /// microstepping/steps-per-unit (`1mi`, `1sa`), and coordinate-system
    /// offsets (`g54x`..`g59z`).
    pub fn with_defaults() -> Self {
        let mut entries = BTreeMap::new();
        let mut insert = |token: &str, display_name: &'static str, value: ConfigValue, flags: TokenFlags| {
            entries.insert(token.to_string(), TokenEntry { display_name, value, flags });
        };

        for axis in ['x', 'y', 'z', 'a'] {
            insert(
                &format!("{axis}vm"),
                "axis velocity maximum",
                ConfigValue::Float(1200.0),
                TokenFlags { persistent: true, ..Default::default() },
            );
            insert(
                &format!("{axis}jm"),
                "axis jerk maximum",
                ConfigValue::Float(20_000_000.0),
                TokenFlags { persistent: true, ..Default::default() },
            );
            insert(
                &format!("{axis}tn"),
                "axis travel minimum",
                ConfigValue::Float(0.0),
                TokenFlags { persistent: true, ..Default::default() },
            );
            insert(
                &format!("{axis}tm"),
                "axis travel maximum",
                ConfigValue::Float(200.0),
                TokenFlags { persistent: true, ..Default::default() },
            );
        }

        for motor in 1..=4 {
            insert(
                &format!("{motor}mi"),
                "motor microsteps",
                ConfigValue::Int(16),
                TokenFlags { persistent: true, ..Default::default() },
            );
            insert(
                &format!("{motor}sa"),
                "motor steps per unit",
                ConfigValue::Float(200.0),
                TokenFlags { persistent: true, ..Default::default() },
            );
            insert(
                &format!("{motor}po"),
                "motor polarity",
                ConfigValue::Bool(false),
                TokenFlags { persistent: true, ..Default::default() },
            );
        }

        for coord in 4..=9 {
            // g54..g59
            for axis in ['x', 'y', 'z'] {
                insert(
                    &format!("g{coord}{axis}"),
                    "coordinate system offset",
                    ConfigValue::Float(0.0),
                    TokenFlags { persistent: true, ..Default::default() },
                );
            }
        }

        insert(
            "stat",
            "machine status",
            ConfigValue::Int(0),
            TokenFlags { read_only: true, ..Default::default() },
        );
        insert(
            "line",
            "last line number",
            ConfigValue::Int(0),
            TokenFlags { read_only: true, ..Default::default() },
        );

        Self { entries }
    }

    pub fn get(&self, token: &str) -> Option<&TokenEntry> {
        self.entries.get(token)
    }

    /// Validates and applies a setter, refusing writes to read-only tokens.
    /// Range validation and side effects (resyncing steps-per-unit through
    /// kinematics, recomputing `max_junction_accel`) are the caller's job
    /// once the token family is known; this only guards the flag.
    pub fn set(&mut self, token: &str, value: ConfigValue) -> Result<(), &'static str> {
        let entry = self.entries.get_mut(token).ok_or("unknown config token")?;
        if entry.flags.read_only {
            return Err("token is read-only");
        }
        entry.value = value;
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TokenEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Overrides defaults from the config file's `[tokens]` section.
    fn apply_overrides(&mut self, ini: &Ini) {
        let Some(section) = ini.get_map_ref().get("tokens") else {
            return;
        };
        for (token, raw) in section {
            let Some(raw) = raw else { continue };
            let Some(entry) = self.entries.get_mut(token) else { continue };
            let parsed = match entry.value {
                ConfigValue::Int(_) => raw.parse::<i32>().ok().map(ConfigValue::Int),
                ConfigValue::Float(_) => raw.parse::<f32>().ok().map(ConfigValue::Float),
                ConfigValue::Bool(_) => raw.parse::<bool>().ok().map(ConfigValue::Bool),
            };
            if let Some(parsed) = parsed {
                entry.value = parsed;
            }
        }
    }
}

/// Holds everything loaded from the configuration file.
#[derive(Debug, Clone)]
pub struct PrinterConfig {
    pub mcu: McuConfig,
    pub tokens: ConfigRegistry,
}

impl PrinterConfig {
    /// Loads and parses the configuration file from the given path.
    pub fn load(path: &Path) -> Result<Self> {
        let mut ini = Ini::new();
        ini.load(path)
            .map_err(|e| anyhow::anyhow!(e))
            .with_context(|| format!("failed to load configuration file: {:?}", path))?;

        let mcu = McuConfig {
            serial_port: ini.get("mcu", "serial").ok_or_else(|| anyhow::anyhow!("[mcu] serial not found"))?,
            baud_rate: ini
                .getuint("mcu", "baud")
                .map_err(|e| anyhow::anyhow!(e))?
                .ok_or_else(|| anyhow::anyhow!("[mcu] baud not found"))? as u32,
        };

        let mut tokens = ConfigRegistry::with_defaults();
        tokens.apply_overrides(&ini);

        Ok(Self { mcu, tokens })
    }
}
