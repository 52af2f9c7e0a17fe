//! Identifier naming strategies
//!
//! A strategy is plain data. It can generate names locally from any injected
//! [`rand::Rng`] (seed it for deterministic tests), and it serializes to a
//! descriptor the engine bridge turns into a generator function.

use rand::Rng;
use serde::{Serialize, Serializer};

const ASCII_LETTERS: &str = "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";
const BASE36: &str = "0123456789abcdefghijklmnopqrstuvwxyz";

/// Arabic letters
pub const ARABIC_GLYPHS: &str = "أبتثجحخدذرزسشصضطظعغفقكلمنهوي";

/// Hiragana syllables
pub const HIRAGANA_GLYPHS: &str =
    "あいうえおかきくけこさしすせそたちつてとなにぬねのはひふへほまみむめもやゆよらりるれろわをん";

/// Hiragana (あ–よ), then Arabic, then the remaining Hiragana (ら–ん)
pub const HIRAGANA_ARABIC_GLYPHS: &str =
    "あいうえおかきくけこさしすせそたちつてとなにぬねのはひふへほまみむめもやゆよ\
     أبتثجحخدذرزسشصضطظعغفقكلمنهوي\
     らりるれろわをん";

/// How the engine invents replacement identifiers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NamingStrategy {
    /// One of the engine's own generators, by name (e.g. `zeroWidth`)
    Builtin(&'static str),

    /// Fixed prefix followed by random characters drawn from `alphabet`
    Prefixed {
        prefix: &'static str,
        alphabet: &'static str,
        length: usize,
    },

    /// Random run of `min_len..=max_len` glyphs from a script alphabet
    Glyphs {
        alphabet: &'static str,
        min_len: usize,
        max_len: usize,
    },
}

impl NamingStrategy {
    /// `var_` plus five base-36 characters
    pub const fn var_prefixed() -> Self {
        NamingStrategy::Prefixed {
            prefix: "var_",
            alphabet: BASE36,
            length: 5,
        }
    }

    /// `NX` plus four ASCII letters
    pub const fn nebula() -> Self {
        NamingStrategy::Prefixed {
            prefix: "NX",
            alphabet: ASCII_LETTERS,
            length: 4,
        }
    }

    /// Three to six glyphs from `alphabet`
    pub const fn glyphs(alphabet: &'static str) -> Self {
        NamingStrategy::Glyphs {
            alphabet,
            min_len: 3,
            max_len: 6,
        }
    }

    /// Produce one fresh name, or `None` for engine-builtin strategies
    pub fn generate<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<String> {
        match self {
            NamingStrategy::Builtin(_) => None,
            NamingStrategy::Prefixed {
                prefix,
                alphabet,
                length,
            } => {
                let chars: Vec<char> = alphabet.chars().collect();
                let mut name = String::with_capacity(prefix.len() + length);
                name.push_str(prefix);
                for _ in 0..*length {
                    name.push(chars[rng.gen_range(0..chars.len())]);
                }
                Some(name)
            }
            NamingStrategy::Glyphs {
                alphabet,
                min_len,
                max_len,
            } => {
                let chars: Vec<char> = alphabet.chars().collect();
                let length = rng.gen_range(*min_len..=*max_len);
                Some(
                    (0..length)
                        .map(|_| chars[rng.gen_range(0..chars.len())])
                        .collect(),
                )
            }
        }
    }
}

/// Wire descriptor understood by the engine bridge
#[derive(Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
enum Descriptor<'a> {
    Builtin {
        name: &'a str,
    },
    #[serde(rename_all = "camelCase")]
    Prefixed {
        prefix: &'a str,
        alphabet: &'a str,
        length: usize,
    },
    #[serde(rename_all = "camelCase")]
    Glyphs {
        alphabet: &'a str,
        min_len: usize,
        max_len: usize,
    },
}

impl Serialize for NamingStrategy {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let descriptor = match self {
            NamingStrategy::Builtin(name) => Descriptor::Builtin { name },
            NamingStrategy::Prefixed {
                prefix,
                alphabet,
                length,
            } => Descriptor::Prefixed {
                prefix,
                alphabet,
                length: *length,
            },
            NamingStrategy::Glyphs {
                alphabet,
                min_len,
                max_len,
            } => Descriptor::Glyphs {
                alphabet,
                min_len: *min_len,
                max_len: *max_len,
            },
        };
        descriptor.serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn glyph_tables_have_expected_sizes() {
        assert_eq!(ARABIC_GLYPHS.chars().count(), 28);
        assert_eq!(HIRAGANA_GLYPHS.chars().count(), 46);
        assert_eq!(HIRAGANA_ARABIC_GLYPHS.chars().count(), 74);
    }

    #[test]
    fn var_prefixed_names_are_base36() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let name = NamingStrategy::var_prefixed().generate(&mut rng).unwrap();
            let suffix = name.strip_prefix("var_").expect("var_ prefix");
            assert_eq!(suffix.len(), 5);
            assert!(suffix.chars().all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
        }
    }

    #[test]
    fn nebula_names_are_nx_plus_four_letters() {
        let mut rng = StdRng::seed_from_u64(11);
        let name = NamingStrategy::nebula().generate(&mut rng).unwrap();

        assert!(name.starts_with("NX"));
        assert_eq!(name.chars().count(), 6);
        assert!(name[2..].chars().all(|c| c.is_ascii_alphabetic()));
    }

    #[test]
    fn glyph_names_stay_within_alphabet_and_length() {
        let mut rng = StdRng::seed_from_u64(3);
        let strategy = NamingStrategy::glyphs(ARABIC_GLYPHS);
        for _ in 0..100 {
            let name = strategy.generate(&mut rng).unwrap();
            let len = name.chars().count();
            assert!((3..=6).contains(&len), "length {} out of range", len);
            assert!(name.chars().all(|c| ARABIC_GLYPHS.contains(c)));
        }
    }

    #[test]
    fn same_seed_gives_same_names() {
        let strategy = NamingStrategy::glyphs(HIRAGANA_GLYPHS);
        let a: Vec<_> = {
            let mut rng = StdRng::seed_from_u64(42);
            (0..5).map(|_| strategy.generate(&mut rng)).collect()
        };
        let b: Vec<_> = {
            let mut rng = StdRng::seed_from_u64(42);
            (0..5).map(|_| strategy.generate(&mut rng)).collect()
        };
        assert_eq!(a, b);
    }

    #[test]
    fn builtin_serializes_as_named_descriptor() {
        let value = serde_json::to_value(NamingStrategy::Builtin("zeroWidth")).unwrap();
        assert_eq!(value, serde_json::json!({"kind": "builtin", "name": "zeroWidth"}));
        assert!(NamingStrategy::Builtin("zeroWidth")
            .generate(&mut StdRng::seed_from_u64(1))
            .is_none());
    }

    #[test]
    fn glyphs_serialize_with_camel_case_bounds() {
        let value = serde_json::to_value(NamingStrategy::glyphs("ab")).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"kind": "glyphs", "alphabet": "ab", "minLen": 3, "maxLen": 6})
        );
    }
}
