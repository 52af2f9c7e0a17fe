//! Preset registry
//!
//! Maps a client-supplied preset name to an immutable [`PresetConfig`].
//! Resolution is total: unknown or absent names fall back to [`Preset::Ultra`]
//! instead of failing the job.

pub mod naming;

use serde::Serialize;

pub use naming::NamingStrategy;
use naming::{ARABIC_GLYPHS, HIRAGANA_ARABIC_GLYPHS, HIRAGANA_GLYPHS};

/// A transformation knob that is either a plain switch or an application probability
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Knob {
    Flag(bool),
    Probability(f64),
}

const ON: Knob = Knob::Flag(true);
const OFF: Knob = Knob::Flag(false);

/// Self-defense features injected into the output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LockConfig {
    pub self_defending: bool,
    pub anti_debug: bool,
    pub integrity: bool,
    pub tamper_protection: bool,
}

impl LockConfig {
    const FULL: LockConfig = LockConfig {
        self_defending: true,
        anti_debug: true,
        integrity: true,
        tamper_protection: true,
    };
}

/// Full set of transformation knobs handed to the engine
///
/// Serializes with the engine's option names. Knobs a preset leaves unset are
/// omitted so the engine applies its own default.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PresetConfig {
    /// Canonical preset this config came from (not sent to the engine)
    #[serde(skip)]
    pub preset: Preset,
    pub target: &'static str,
    pub compact: bool,
    pub rename_variables: bool,
    pub rename_globals: bool,
    pub identifier_generator: NamingStrategy,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub string_encoding: Option<Knob>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub string_concealing: Option<Knob>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub string_compression: Option<Knob>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub string_splitting: Option<Knob>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub control_flow_flattening: Option<Knob>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flatten: Option<Knob>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shuffle: Option<Knob>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rgf: Option<Knob>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dead_code: Option<Knob>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opaque_predicates: Option<Knob>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dispatcher: Option<Knob>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub global_concealing: Option<Knob>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_extraction: Option<Knob>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duplicate_literals_removal: Option<Knob>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calculator: Option<Knob>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hexadecimal_numbers: Option<Knob>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minify: Option<Knob>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub moved_declarations: Option<Knob>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<Knob>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lock: Option<LockConfig>,
}

impl PresetConfig {
    /// Baseline every preset starts from: node target, compact, renaming on
    fn base(preset: Preset, identifier_generator: NamingStrategy) -> Self {
        Self {
            preset,
            target: "node",
            compact: true,
            rename_variables: true,
            rename_globals: true,
            identifier_generator,
            string_encoding: None,
            string_concealing: None,
            string_compression: None,
            string_splitting: None,
            control_flow_flattening: None,
            flatten: None,
            shuffle: None,
            rgf: None,
            dead_code: None,
            opaque_predicates: None,
            dispatcher: None,
            global_concealing: None,
            object_extraction: None,
            duplicate_literals_removal: None,
            calculator: None,
            hexadecimal_numbers: None,
            minify: None,
            moved_declarations: None,
            stack: None,
            lock: None,
        }
    }
}

/// Canonical presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    /// Maximally defensive; engine-builtin zero-width identifiers
    #[default]
    Ultra,
    /// `var_`-prefixed identifiers, lighter string handling, lock enabled
    Nova,
    /// `NX`-prefixed identifiers, heavy structural obfuscation, full lock
    Nebula,
    /// Arabic-script identifiers
    Arab,
    /// Hiragana identifiers
    Japan,
    /// Mixed Hiragana/Arabic identifiers
    JapanArab,
}

impl Preset {
    /// All canonical presets
    pub const ALL: [Preset; 6] = [
        Preset::Ultra,
        Preset::Nova,
        Preset::Nebula,
        Preset::Arab,
        Preset::Japan,
        Preset::JapanArab,
    ];

    /// Match a client-supplied name, case-insensitively and ignoring surrounding whitespace
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "ultra" | "ultra enc" | "hard" => Some(Preset::Ultra),
            "nova" => Some(Preset::Nova),
            "nebula" => Some(Preset::Nebula),
            "arab" => Some(Preset::Arab),
            "japan" => Some(Preset::Japan),
            "xa" | "japanxarab" | "arabxjapan" => Some(Preset::JapanArab),
            _ => None,
        }
    }

    /// Canonical name
    pub fn name(&self) -> &'static str {
        match self {
            Preset::Ultra => "ultra",
            Preset::Nova => "nova",
            Preset::Nebula => "nebula",
            Preset::Arab => "arab",
            Preset::Japan => "japan",
            Preset::JapanArab => "xa",
        }
    }

    /// Build the immutable configuration for this preset
    pub fn config(&self) -> PresetConfig {
        use Knob::Probability;

        match self {
            Preset::Ultra => PresetConfig {
                calculator: Some(ON),
                hexadecimal_numbers: Some(ON),
                control_flow_flattening: Some(Probability(1.0)),
                dead_code: Some(Probability(1.0)),
                dispatcher: Some(ON),
                duplicate_literals_removal: Some(Probability(1.0)),
                flatten: Some(ON),
                global_concealing: Some(ON),
                minify: Some(ON),
                moved_declarations: Some(ON),
                object_extraction: Some(ON),
                opaque_predicates: Some(Probability(0.75)),
                string_concealing: Some(ON),
                string_compression: Some(ON),
                string_encoding: Some(ON),
                string_splitting: Some(Probability(0.75)),
                rgf: Some(OFF),
                ..PresetConfig::base(*self, NamingStrategy::Builtin("zeroWidth"))
            },
            Preset::Nova => PresetConfig {
                calculator: Some(OFF),
                control_flow_flattening: Some(Probability(1.0)),
                dead_code: Some(Probability(1.0)),
                dispatcher: Some(ON),
                duplicate_literals_removal: Some(Probability(1.0)),
                flatten: Some(ON),
                global_concealing: Some(ON),
                hexadecimal_numbers: Some(Probability(1.0)),
                lock: Some(LockConfig {
                    tamper_protection: false,
                    ..LockConfig::FULL
                }),
                minify: Some(ON),
                moved_declarations: Some(ON),
                object_extraction: Some(ON),
                opaque_predicates: Some(ON),
                shuffle: Some(ON),
                stack: Some(ON),
                string_compression: Some(ON),
                string_concealing: Some(ON),
                ..PresetConfig::base(*self, NamingStrategy::var_prefixed())
            },
            Preset::Nebula => PresetConfig {
                string_compression: Some(ON),
                string_concealing: Some(OFF),
                string_encoding: Some(ON),
                string_splitting: Some(OFF),
                control_flow_flattening: Some(Probability(1.0)),
                flatten: Some(ON),
                shuffle: Some(ON),
                rgf: Some(ON),
                dead_code: Some(ON),
                opaque_predicates: Some(ON),
                dispatcher: Some(ON),
                global_concealing: Some(ON),
                object_extraction: Some(ON),
                duplicate_literals_removal: Some(ON),
                lock: Some(LockConfig::FULL),
                ..PresetConfig::base(*self, NamingStrategy::nebula())
            },
            Preset::Arab => Self::script_config(*self, ARABIC_GLYPHS),
            Preset::Japan => PresetConfig {
                flatten: Some(ON),
                ..Self::script_config(*self, HIRAGANA_GLYPHS)
            },
            Preset::JapanArab => PresetConfig {
                string_compression: Some(ON),
                string_concealing: Some(ON),
                flatten: Some(ON),
                rgf: Some(OFF),
                dispatcher: Some(ON),
                ..Self::script_config(*self, HIRAGANA_ARABIC_GLYPHS)
            },
        }
    }

    /// Shared feature set of the foreign-script presets
    fn script_config(preset: Preset, alphabet: &'static str) -> PresetConfig {
        use Knob::Probability;

        PresetConfig {
            string_encoding: Some(ON),
            string_splitting: Some(ON),
            control_flow_flattening: Some(Probability(1.0)),
            shuffle: Some(ON),
            duplicate_literals_removal: Some(ON),
            dead_code: Some(ON),
            calculator: Some(ON),
            opaque_predicates: Some(ON),
            lock: Some(LockConfig::FULL),
            ..PresetConfig::base(preset, NamingStrategy::glyphs(alphabet))
        }
    }
}

/// Resolve a preset name to its configuration
///
/// Never fails: unrecognized or absent names resolve to the ultra preset.
pub fn resolve(name: Option<&str>) -> PresetConfig {
    let preset = match name.and_then(Preset::from_name) {
        Some(preset) => preset,
        None => {
            tracing::debug!(requested = ?name, "Unrecognized preset, using default");
            Preset::default()
        }
    };
    preset.config()
}
