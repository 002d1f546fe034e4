//! Transaction format identifiers for Zcash network upgrades

/// Label used for identifiers this crate does not know about.
pub const UNKNOWN_LABEL: &str = "Unknown";

/// Overwinter (v3) version group id.
pub const OVERWINTER_VERSION_GROUP_ID: u32 = 0x03C4_8270;
/// Sapling (v4) version group id.
pub const SAPLING_VERSION_GROUP_ID: u32 = 0x892F_2085;
/// NU5 (v5) version group id.
pub const NU5_VERSION_GROUP_ID: u32 = 0x26A7_270A;

/// Network upgrades that define a consensus branch id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NetworkUpgrade {
    /// Overwinter
    Overwinter,
    /// Sapling
    Sapling,
    /// Blossom
    Blossom,
    /// Heartwood
    Heartwood,
    /// Canopy
    Canopy,
    /// NU5 (Orchard)
    Nu5,
    /// NU6
    Nu6,
    /// NU6.1
    Nu6_1,
}

impl NetworkUpgrade {
    /// All known upgrades in activation order
    pub const ALL: [NetworkUpgrade; 8] = [
        Self::Overwinter,
        Self::Sapling,
        Self::Blossom,
        Self::Heartwood,
        Self::Canopy,
        Self::Nu5,
        Self::Nu6,
        Self::Nu6_1,
    ];

    /// Consensus branch id committed to by transactions of this upgrade
    pub const fn branch_id(&self) -> u32 {
        match self {
            Self::Overwinter => 0x5ba8_1b19,
            Self::Sapling => 0x76b8_09bb,
            Self::Blossom => 0x2bb4_0e60,
            Self::Heartwood => 0xf5b9_230b,
            Self::Canopy => 0xe9ff_75a6,
            Self::Nu5 => 0xc2d6_d0b4,
            Self::Nu6 => 0xc8e7_1055,
            Self::Nu6_1 => 0x4dec_4df0,
        }
    }

    /// Display name
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Overwinter => "Overwinter",
            Self::Sapling => "Sapling",
            Self::Blossom => "Blossom",
            Self::Heartwood => "Heartwood",
            Self::Canopy => "Canopy",
            Self::Nu5 => "NU5",
            Self::Nu6 => "NU6",
            Self::Nu6_1 => "NU6.1",
        }
    }

    /// Look up an upgrade by its consensus branch id
    pub fn from_branch_id(id: u32) -> Option<Self> {
        Self::ALL.iter().copied().find(|u| u.branch_id() == id)
    }
}

/// Label for a transaction version group id; unknown ids are not an error.
pub fn version_group_label(id: u32) -> &'static str {
    match id {
        OVERWINTER_VERSION_GROUP_ID => "Overwinter",
        SAPLING_VERSION_GROUP_ID => "Sapling",
        NU5_VERSION_GROUP_ID => "NU5",
        _ => UNKNOWN_LABEL,
    }
}

/// Label for a consensus branch id; unknown ids are not an error.
pub fn consensus_branch_label(id: u32) -> &'static str {
    NetworkUpgrade::from_branch_id(id)
        .map(|u| u.name())
        .unwrap_or(UNKNOWN_LABEL)
}
