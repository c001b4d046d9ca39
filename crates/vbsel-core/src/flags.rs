//! Working-point flags attached to reconstructed objects.
//!
//! Every object carries one [`ObjectFlags`] bitset; electrons, muons, taus
//! and jets only differ in which bits the event source sets. Flags are
//! serialized by name (`["ETightLH", "EIsoBoosted"]`) so event files and
//! configuration stay readable.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use serde::de::{self, Deserializer, SeqAccess, Visitor};
use serde::ser::{SerializeSeq, Serializer};
use serde::{Deserialize, Serialize};

/// Bitset of boolean working-point decisions.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ObjectFlags(u32);

impl ObjectFlags {
    /// No flag set.
    pub const EMPTY: ObjectFlags = ObjectFlags(0);

    /// Electron: loose likelihood identification.
    pub const E_LOOSE_LH: ObjectFlags = ObjectFlags(1 << 0);
    /// Electron: medium likelihood identification.
    pub const E_MEDIUM_LH: ObjectFlags = ObjectFlags(1 << 1);
    /// Electron: tight likelihood identification.
    pub const E_TIGHT_LH: ObjectFlags = ObjectFlags(1 << 2);
    /// Electron: transverse impact-parameter significance below 5.
    pub const E_D0_SIGMA5: ObjectFlags = ObjectFlags(1 << 3);
    /// Electron: longitudinal impact parameter below 0.5 mm.
    pub const E_Z0_05MM: ObjectFlags = ObjectFlags(1 << 4);
    /// Electron: boosted-topology isolation.
    pub const E_ISO_BOOSTED: ObjectFlags = ObjectFlags(1 << 5);

    /// Muon: medium identification.
    pub const MU_MEDIUM: ObjectFlags = ObjectFlags(1 << 6);
    /// Muon: transverse impact-parameter significance below 3.
    pub const MU_D0_SIGMA3: ObjectFlags = ObjectFlags(1 << 7);
    /// Muon: longitudinal impact parameter below 0.5 mm.
    pub const MU_Z0_05MM: ObjectFlags = ObjectFlags(1 << 8);
    /// Muon: boosted-topology isolation.
    pub const MU_ISO_BOOSTED: ObjectFlags = ObjectFlags(1 << 9);
    /// Muon: not compatible with a cosmic-ray muon.
    pub const MU_NOT_COSMIC: ObjectFlags = ObjectFlags(1 << 10);

    /// Tau: loose RNN identification.
    pub const TAU_RNN_LOOSE: ObjectFlags = ObjectFlags(1 << 11);

    /// Jet: passes the loose cleaning criteria (a jet *without* it is bad).
    pub const LOOSE_BAD_JET: ObjectFlags = ObjectFlags(1 << 12);
    /// Jet: passes the 50% jet-vertex-tagger working point.
    pub const JVT50_JET: ObjectFlags = ObjectFlags(1 << 13);
    /// Jet: b-tagged at the 77% efficiency working point.
    pub const BTAG77_MV2C10: ObjectFlags = ObjectFlags(1 << 14);
    /// Jet: fewer than three associated tracks.
    pub const LESS_THAN_3_TRACKS: ObjectFlags = ObjectFlags(1 << 15);

    /// Truth: jet matched to a b hadron.
    pub const TRUE_B_JET: ObjectFlags = ObjectFlags(1 << 16);
    /// Truth: jet matched to a c hadron.
    pub const TRUE_C_JET: ObjectFlags = ObjectFlags(1 << 17);
    /// Truth: object matched to a hadronic tau.
    pub const TRUE_TAU: ObjectFlags = ObjectFlags(1 << 18);

    const NAMED: &'static [(&'static str, ObjectFlags)] = &[
        ("ELooseLH", Self::E_LOOSE_LH),
        ("EMediumLH", Self::E_MEDIUM_LH),
        ("ETightLH", Self::E_TIGHT_LH),
        ("ED0Sigma5", Self::E_D0_SIGMA5),
        ("EZ05mm", Self::E_Z0_05MM),
        ("EIsoBoosted", Self::E_ISO_BOOSTED),
        ("MuMedium", Self::MU_MEDIUM),
        ("MuD0Sigma3", Self::MU_D0_SIGMA3),
        ("MuZ05mm", Self::MU_Z0_05MM),
        ("MuIsoBoosted", Self::MU_ISO_BOOSTED),
        ("MuNotCosmic", Self::MU_NOT_COSMIC),
        ("TauRNNLoose", Self::TAU_RNN_LOOSE),
        ("LooseBadJet", Self::LOOSE_BAD_JET),
        ("JVT50Jet", Self::JVT50_JET),
        ("BTag77MV2c10", Self::BTAG77_MV2C10),
        ("LessThan3Tracks", Self::LESS_THAN_3_TRACKS),
        ("TrueBJet", Self::TRUE_B_JET),
        ("TrueCJet", Self::TRUE_C_JET),
        ("TrueTau", Self::TRUE_TAU),
    ];

    /// Bits set in either operand; usable in constant contexts.
    pub const fn union(self, other: ObjectFlags) -> ObjectFlags {
        ObjectFlags(self.0 | other.0)
    }

    /// Whether no bit is set.
    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Whether every bit of `other` is set in `self`.
    pub const fn contains(self, other: ObjectFlags) -> bool {
        self.0 & other.0 == other.0
    }

    /// Whether any bit of `other` is set in `self`.
    pub const fn intersects(self, other: ObjectFlags) -> bool {
        self.0 & other.0 != 0
    }

    /// Look up a single flag by its serialized name.
    pub fn from_name(name: &str) -> Option<ObjectFlags> {
        Self::NAMED.iter().find(|(n, _)| *n == name).map(|(_, f)| *f)
    }

    /// Names of all set flags, in bit order.
    pub fn names(self) -> impl Iterator<Item = &'static str> {
        Self::NAMED.iter().filter(move |(_, f)| self.contains(*f)).map(|(n, _)| *n)
    }
}

impl BitOr for ObjectFlags {
    type Output = ObjectFlags;

    fn bitor(self, rhs: ObjectFlags) -> ObjectFlags {
        ObjectFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for ObjectFlags {
    fn bitor_assign(&mut self, rhs: ObjectFlags) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for ObjectFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.names()).finish()
    }
}

impl Serialize for ObjectFlags {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(None)?;
        for name in self.names() {
            seq.serialize_element(name)?;
        }
        seq.end()
    }
}

impl<'de> Deserialize<'de> for ObjectFlags {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct FlagsVisitor;

        impl<'de> Visitor<'de> for FlagsVisitor {
            type Value = ObjectFlags;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a list of working-point flag names")
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<ObjectFlags, A::Error> {
                let mut flags = ObjectFlags::EMPTY;
                while let Some(name) = seq.next_element::<String>()? {
                    let flag = ObjectFlags::from_name(&name).ok_or_else(|| {
                        de::Error::custom(format!("unknown working-point flag '{name}'"))
                    })?;
                    flags |= flag;
                }
                Ok(flags)
            }
        }

        deserializer.deserialize_seq(FlagsVisitor)
    }
}

/// Flag requirement: every `require` bit set and no `reject` bit set.
///
/// `FlagMask::NONE` accepts every object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FlagMask {
    /// Bits that must all be set.
    #[serde(default, skip_serializing_if = "ObjectFlags::is_empty")]
    pub require: ObjectFlags,
    /// Bits that must all be unset.
    #[serde(default, skip_serializing_if = "ObjectFlags::is_empty")]
    pub reject: ObjectFlags,
}

impl FlagMask {
    /// No requirement.
    pub const NONE: FlagMask = FlagMask { require: ObjectFlags::EMPTY, reject: ObjectFlags::EMPTY };

    /// Require every bit in `flags`.
    pub const fn all(flags: ObjectFlags) -> Self {
        FlagMask { require: flags, reject: ObjectFlags::EMPTY }
    }

    /// Require every bit in `flags` to be unset.
    pub const fn not(flags: ObjectFlags) -> Self {
        FlagMask { require: ObjectFlags::EMPTY, reject: flags }
    }

    /// Whether this mask imposes no requirement.
    pub const fn is_none(&self) -> bool {
        self.require.is_empty() && self.reject.is_empty()
    }

    /// Whether `flags` satisfies the mask.
    pub const fn matches(&self, flags: ObjectFlags) -> bool {
        flags.contains(self.require) && !flags.intersects(self.reject)
    }
}
