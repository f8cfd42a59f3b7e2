//! Settings store
//!
//! Process-wide configuration: loaded once at boot, mutated through
//! `set`, written back to its durable record on every accepted
//! mutation. Values are validated against their declared kind and
//! bounds before the in-memory copy changes, so an in-memory setting is
//! always within bounds.
//!
//! The durable form is `name=value` lines inside a single storage
//! record. Loading feeds each line back through `set`, which means a
//! record written by an older firmware heals naturally: unknown names
//! are dropped, missing names keep their defaults, out-of-bounds values
//! are rejected, and any healing triggers an immediate rewrite.

use core::fmt::{self, Write};

use heapless::String;

use crate::storage::{write_with_retry, RecordKey, RecordStore, StorageError, RECORD_BUF};
use crate::store::{MAX_LOCAL_MESSAGES, MAX_NEWS_MESSAGES};

/// Maximum hostname length
pub const HOSTNAME_MAX: usize = 20;

/// Maximum feed auth token length
pub const TOKEN_MAX: usize = 40;

/// Fastest scroll-speed step
pub const SPEED_MAX: u8 = 50;

/// Panel intensity ceiling (hardware register range)
pub const INTENSITY_MAX: u8 = 15;

/// Full scale of the ambient-light reading
pub const LDR_RAW_MAX: u16 = 1023;

/// Declared kind and bounds of a setting.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SettingKind {
    Integer { min: i32, max: i32 },
    Float { min: f32, max: f32 },
    Text { max_len: usize },
}

/// A named setting with its declared kind.
#[derive(Debug, Clone, Copy)]
pub struct SettingDef {
    pub name: &'static str,
    pub kind: SettingKind,
}

/// Every setting the device carries, in presentation order.
///
/// The integer bounds double as the defensive clamp against the
/// compile-time capacity ceilings: the operator-configurable maxima can
/// never exceed them.
pub const SETTING_DEFS: &[SettingDef] = &[
    SettingDef {
        name: "hostname",
        kind: SettingKind::Text { max_len: HOSTNAME_MAX },
    },
    SettingDef {
        name: "newsAuthToken",
        kind: SettingKind::Text { max_len: TOKEN_MAX },
    },
    SettingDef {
        name: "weerLiveAuthToken",
        kind: SettingKind::Text { max_len: TOKEN_MAX },
    },
    SettingDef {
        name: "localMaxMsg",
        kind: SettingKind::Integer {
            min: 1,
            max: MAX_LOCAL_MESSAGES as i32,
        },
    },
    SettingDef {
        name: "textSpeed",
        kind: SettingKind::Integer {
            min: 1,
            max: SPEED_MAX as i32,
        },
    },
    SettingDef {
        name: "maxIntensity",
        kind: SettingKind::Integer {
            min: 0,
            max: INTENSITY_MAX as i32,
        },
    },
    SettingDef {
        name: "LDRlowOffset",
        kind: SettingKind::Integer {
            min: 0,
            max: LDR_RAW_MAX as i32,
        },
    },
    SettingDef {
        name: "LDRhighOffset",
        kind: SettingKind::Integer {
            min: 0,
            max: LDR_RAW_MAX as i32,
        },
    },
    SettingDef {
        name: "newsInterval",
        kind: SettingKind::Integer { min: 2, max: 120 },
    },
    SettingDef {
        name: "newsMaxMsg",
        kind: SettingKind::Integer {
            min: 1,
            max: MAX_NEWS_MESSAGES as i32,
        },
    },
    SettingDef {
        name: "weerLiveInterval",
        kind: SettingKind::Integer { min: 2, max: 120 },
    },
];

/// Errors from a settings mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SettingsError {
    /// No setting with this name
    Unknown,
    /// Parse failure or out-of-bounds value; stored value unchanged
    InvalidValue,
}

/// In-memory settings. Intervals are minutes.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Settings {
    pub hostname: String<HOSTNAME_MAX>,
    pub news_auth_token: String<TOKEN_MAX>,
    pub weerlive_auth_token: String<TOKEN_MAX>,
    pub local_max_msg: u8,
    pub text_speed: u8,
    pub max_intensity: u8,
    pub ldr_low_offset: u16,
    pub ldr_high_offset: u16,
    pub news_interval_min: u8,
    pub news_max_msg: u8,
    pub weerlive_interval_min: u8,
}

impl Default for Settings {
    fn default() -> Self {
        let mut hostname = String::new();
        // "marquee" always fits HOSTNAME_MAX
        let _ = hostname.push_str("marquee");
        Self {
            hostname,
            news_auth_token: String::new(),
            weerlive_auth_token: String::new(),
            local_max_msg: 10,
            text_speed: 25,
            max_intensity: 6,
            ldr_low_offset: 50,
            ldr_high_offset: 700,
            news_interval_min: 30,
            news_max_msg: 10,
            weerlive_interval_min: 10,
        }
    }
}

/// Parsed, bounds-checked value ready to apply.
enum Validated<'a> {
    Int(i32),
    Float(f32),
    Text(&'a str),
}

impl Settings {
    /// Look up a setting's declaration.
    pub fn def(name: &str) -> Option<&'static SettingDef> {
        SETTING_DEFS.iter().find(|d| d.name == name)
    }

    /// Parse `raw` against the declared kind and bounds without
    /// touching any state.
    fn validate<'a>(def: &SettingDef, raw: &'a str) -> Result<Validated<'a>, SettingsError> {
        match def.kind {
            SettingKind::Integer { min, max } => {
                let v: i32 = raw
                    .trim()
                    .parse()
                    .map_err(|_| SettingsError::InvalidValue)?;
                if v < min || v > max {
                    return Err(SettingsError::InvalidValue);
                }
                Ok(Validated::Int(v))
            }
            SettingKind::Float { min, max } => {
                let v: f32 = raw
                    .trim()
                    .parse()
                    .map_err(|_| SettingsError::InvalidValue)?;
                if !v.is_finite() || v < min || v > max {
                    return Err(SettingsError::InvalidValue);
                }
                Ok(Validated::Float(v))
            }
            SettingKind::Text { max_len } => {
                if raw.len() > max_len {
                    return Err(SettingsError::InvalidValue);
                }
                Ok(Validated::Text(raw))
            }
        }
    }

    /// Apply one raw value. Rejection leaves the stored value unchanged.
    ///
    /// Persistence is the caller's job (`persist` after an accepted
    /// mutation); splitting the two keeps load-time replay from
    /// rewriting the record once per line.
    pub fn set(&mut self, name: &str, raw: &str) -> Result<(), SettingsError> {
        let def = Self::def(name).ok_or(SettingsError::Unknown)?;
        match Self::validate(def, raw)? {
            Validated::Int(v) => self.apply_int(name, v),
            Validated::Float(_) => Err(SettingsError::Unknown),
            Validated::Text(v) => self.apply_text(name, v),
        }
    }

    fn apply_int(&mut self, name: &str, v: i32) -> Result<(), SettingsError> {
        match name {
            "localMaxMsg" => self.local_max_msg = v as u8,
            "textSpeed" => self.text_speed = v as u8,
            "maxIntensity" => self.max_intensity = v as u8,
            "LDRlowOffset" => self.ldr_low_offset = v as u16,
            "LDRhighOffset" => self.ldr_high_offset = v as u16,
            "newsInterval" => self.news_interval_min = v as u8,
            "newsMaxMsg" => self.news_max_msg = v as u8,
            "weerLiveInterval" => self.weerlive_interval_min = v as u8,
            _ => return Err(SettingsError::Unknown),
        }
        Ok(())
    }

    fn apply_text(&mut self, name: &str, v: &str) -> Result<(), SettingsError> {
        match name {
            "hostname" => {
                self.hostname.clear();
                self.hostname.push_str(v).map_err(|_| SettingsError::InvalidValue)?;
            }
            "newsAuthToken" => {
                self.news_auth_token.clear();
                self.news_auth_token
                    .push_str(v)
                    .map_err(|_| SettingsError::InvalidValue)?;
            }
            "weerLiveAuthToken" => {
                self.weerlive_auth_token.clear();
                self.weerlive_auth_token
                    .push_str(v)
                    .map_err(|_| SettingsError::InvalidValue)?;
            }
            _ => return Err(SettingsError::Unknown),
        }
        Ok(())
    }

    /// Write the current value of `name` into `w`, as it appears in the
    /// durable record.
    fn format_value<W: Write>(&self, name: &str, w: &mut W) -> fmt::Result {
        match name {
            "hostname" => w.write_str(&self.hostname),
            "newsAuthToken" => w.write_str(&self.news_auth_token),
            "weerLiveAuthToken" => w.write_str(&self.weerlive_auth_token),
            "localMaxMsg" => write!(w, "{}", self.local_max_msg),
            "textSpeed" => write!(w, "{}", self.text_speed),
            "maxIntensity" => write!(w, "{}", self.max_intensity),
            "LDRlowOffset" => write!(w, "{}", self.ldr_low_offset),
            "LDRhighOffset" => write!(w, "{}", self.ldr_high_offset),
            "newsInterval" => write!(w, "{}", self.news_interval_min),
            "newsMaxMsg" => write!(w, "{}", self.news_max_msg),
            "weerLiveInterval" => write!(w, "{}", self.weerlive_interval_min),
            _ => Err(fmt::Error),
        }
    }

    fn to_record(&self) -> Result<String<RECORD_BUF>, fmt::Error> {
        let mut out: String<RECORD_BUF> = String::new();
        for def in SETTING_DEFS {
            out.write_str(def.name)?;
            out.write_char('=')?;
            self.format_value(def.name, &mut out)?;
            out.write_char('\n')?;
        }
        Ok(out)
    }

    /// Persist the full settings record. Atomicity comes from the
    /// record store (single keyed item, previous content held until the
    /// new write completes).
    pub fn persist<S: RecordStore>(&self, store: &mut S) -> Result<(), StorageError> {
        let record = self.to_record().map_err(|_| StorageError::BufferTooSmall)?;
        write_with_retry(store, RecordKey::Settings, record.as_bytes())
    }

    /// Load settings from the durable record.
    ///
    /// A missing or unreadable record falls back to all defaults; a
    /// readable record with gaps or rejected lines keeps the defaults
    /// for those names. Either way the healed record is rewritten so
    /// storage and memory never stay divergent.
    pub fn load<S: RecordStore>(store: &mut S) -> Self {
        let mut settings = Settings::default();
        let mut buf = [0u8; RECORD_BUF];
        let mut needs_heal = true;

        if let Ok(len) = store.read(RecordKey::Settings, &mut buf) {
            if let Ok(text) = core::str::from_utf8(&buf[..len]) {
                let mut seen = 0usize;
                let mut rejected = false;
                for line in text.lines() {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    match line.split_once('=') {
                        Some((name, value)) => match settings.set(name.trim(), value) {
                            Ok(()) => seen += 1,
                            Err(_) => rejected = true,
                        },
                        None => rejected = true,
                    }
                }
                needs_heal = rejected || seen != SETTING_DEFS.len();
            }
        }

        if needs_heal {
            // Best effort: a failing heal leaves defaults in memory and
            // the device functional.
            let _ = settings.persist(store);
        }
        settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::MemStore;
    use proptest::prelude::*;

    #[test]
    fn test_defaults_within_bounds() {
        let s = Settings::default();
        for def in SETTING_DEFS {
            let mut value: String<64> = String::new();
            s.format_value(def.name, &mut value).unwrap();
            // Every default must round-trip through its own validator.
            let mut probe = Settings::default();
            probe.set(def.name, &value).unwrap();
        }
    }

    #[test]
    fn test_set_rejects_out_of_bounds() {
        let mut s = Settings::default();
        assert_eq!(s.set("textSpeed", "0"), Err(SettingsError::InvalidValue));
        assert_eq!(s.set("textSpeed", "51"), Err(SettingsError::InvalidValue));
        assert_eq!(s.set("textSpeed", "abc"), Err(SettingsError::InvalidValue));
        assert_eq!(s.text_speed, 25);
        assert_eq!(s.set("textSpeed", "40"), Ok(()));
        assert_eq!(s.text_speed, 40);
    }

    #[test]
    fn test_set_rejects_unknown_name() {
        let mut s = Settings::default();
        assert_eq!(s.set("noSuchSetting", "1"), Err(SettingsError::Unknown));
    }

    #[test]
    fn test_operator_maxima_clamped_to_ceilings() {
        let mut s = Settings::default();
        assert_eq!(s.set("localMaxMsg", "26"), Err(SettingsError::InvalidValue));
        assert_eq!(s.set("localMaxMsg", "25"), Ok(()));
        assert_eq!(s.set("newsMaxMsg", "21"), Err(SettingsError::InvalidValue));
        assert_eq!(s.set("newsMaxMsg", "20"), Ok(()));
    }

    #[test]
    fn test_text_setting_length_bound() {
        let mut s = Settings::default();
        let long = "x".repeat(HOSTNAME_MAX + 1);
        assert_eq!(
            s.set("hostname", &long),
            Err(SettingsError::InvalidValue)
        );
        assert_eq!(s.hostname.as_str(), "marquee");
        assert_eq!(s.set("hostname", "ticker1"), Ok(()));
    }

    #[test]
    fn test_persist_load_round_trip() {
        let mut store = MemStore::new();
        let mut s = Settings::default();
        s.set("textSpeed", "33").unwrap();
        s.set("hostname", "hall-display").unwrap();
        s.set("newsInterval", "45").unwrap();
        s.persist(&mut store).unwrap();

        let loaded = Settings::load(&mut store);
        assert_eq!(loaded, s);
    }

    #[test]
    fn test_load_missing_record_heals_defaults() {
        let mut store = MemStore::new();
        let loaded = Settings::load(&mut store);
        assert_eq!(loaded, Settings::default());
        // The gap was healed: a second load reads the written record.
        assert!(store.contains(crate::storage::RecordKey::Settings));
    }

    #[test]
    fn test_load_partial_record_keeps_defaults_for_gaps() {
        let mut store = MemStore::new();
        store
            .write(
                crate::storage::RecordKey::Settings,
                b"textSpeed=12\nmaxIntensity=999\ngarbage line\n",
            )
            .unwrap();

        let loaded = Settings::load(&mut store);
        assert_eq!(loaded.text_speed, 12);
        // Out-of-bounds line rejected, default kept.
        assert_eq!(loaded.max_intensity, Settings::default().max_intensity);
        // Healed record now parses cleanly.
        let reloaded = Settings::load(&mut store);
        assert_eq!(reloaded, loaded);
    }

    #[test]
    fn test_float_kind_validates() {
        let def = SettingDef {
            name: "calibration",
            kind: SettingKind::Float { min: -1.0, max: 1.0 },
        };
        assert!(matches!(
            Settings::validate(&def, "0.25"),
            Ok(Validated::Float(_))
        ));
        assert!(Settings::validate(&def, "1.5").is_err());
        assert!(Settings::validate(&def, "NaN").is_err());
    }

    proptest! {
        #[test]
        fn prop_integer_round_trip(speed in 1i32..=50) {
            let mut store = MemStore::new();
            let mut s = Settings::default();
            let mut raw: String<8> = String::new();
            core::write!(raw, "{}", speed).unwrap();
            s.set("textSpeed", &raw).unwrap();
            s.persist(&mut store).unwrap();
            prop_assert_eq!(Settings::load(&mut store).text_speed, speed as u8);
        }

        #[test]
        fn prop_out_of_bounds_never_applies(v in proptest::sample::select(
            std::vec![-1i32, 0, 51, 1000, i32::MAX, i32::MIN]
        )) {
            let mut s = Settings::default();
            let mut raw: String<16> = String::new();
            core::write!(raw, "{}", v).unwrap();
            prop_assert_eq!(s.set("textSpeed", &raw), Err(SettingsError::InvalidValue));
            prop_assert_eq!(s.text_speed, Settings::default().text_speed);
        }
    }
}
