//! Function family keys and the opaque blobs keyed by them.

use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};

/// A trainable function family, the only ones that carry gradients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Base {
    V,
    Q,
    P,
}

/// Any function family an agent may hold, base families and their targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Family {
    V,
    Q,
    P,
    TargetV,
    TargetQ,
    TargetP,
}

impl Base {
    pub const ALL: [Base; 3] = [Base::V, Base::Q, Base::P];

    /// The non target `Family` for this base.
    pub fn family(self) -> Family {
        match self {
            Base::V => Family::V,
            Base::Q => Family::Q,
            Base::P => Family::P,
        }
    }

    /// The target `Family` paired with this base.
    pub fn target(self) -> Family {
        match self {
            Base::V => Family::TargetV,
            Base::Q => Family::TargetQ,
            Base::P => Family::TargetP,
        }
    }
}

impl Family {
    pub const ALL: [Family; 6] = [
        Family::V,
        Family::Q,
        Family::P,
        Family::TargetV,
        Family::TargetQ,
        Family::TargetP,
    ];

    /// Returns the base family, or `None` for target families.
    pub fn base(self) -> Option<Base> {
        match self {
            Family::V => Some(Base::V),
            Family::Q => Some(Base::Q),
            Family::P => Some(Base::P),
            _ => None,
        }
    }

    pub fn is_target(self) -> bool {
        self.base().is_none()
    }
}

impl fmt::Display for Base {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.family(), f)
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Family::V => "v_func",
            Family::Q => "q_func",
            Family::P => "p_func",
            Family::TargetV => "target_v_func",
            Family::TargetQ => "target_q_func",
            Family::TargetP => "target_p_func",
        };

        f.write_str(name)
    }
}

/// Wire key byte for a family map entry.
pub(crate) trait Key: Copy + Ord {
    fn to_byte(self) -> u8;
    fn from_byte(byte: u8) -> Option<Self>;
}

impl Key for Family {
    fn to_byte(self) -> u8 {
        match self {
            Family::V => 0,
            Family::Q => 1,
            Family::P => 2,
            Family::TargetV => 3,
            Family::TargetQ => 4,
            Family::TargetP => 5,
        }
    }

    fn from_byte(byte: u8) -> Option<Self> {
        Family::ALL.get(byte as usize).copied()
    }
}

impl Key for Base {
    fn to_byte(self) -> u8 {
        self.family().to_byte()
    }

    fn from_byte(byte: u8) -> Option<Self> {
        Base::ALL.get(byte as usize).copied()
    }
}

/// An opaque serialized value, the weights or the gradient of one family.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Blob(Vec<u8>);

impl Blob {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<u8>> for Blob {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl fmt::Debug for Blob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Blob({} bytes)", self.0.len())
    }
}

/// Parameter reply payload, one blob per present family.
pub type ParamMap = BTreeMap<Family, Blob>;

/// Gradient upload payload, one blob per present base family.
pub type GradMap = BTreeMap<Base, Blob>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_bytes_are_stable() {
        for (i, family) in Family::ALL.into_iter().enumerate() {
            assert_eq!(family.to_byte() as usize, i);
            assert_eq!(Family::from_byte(i as u8), Some(family));
        }

        assert_eq!(Family::from_byte(6), None);
        assert_eq!(Base::from_byte(3), None);
        assert_eq!(Base::Q.to_byte(), Family::Q.to_byte());
    }

    #[test]
    fn base_and_target_pairing() {
        for base in Base::ALL {
            assert_eq!(base.family().base(), Some(base));
            assert!(base.target().is_target());
            assert!(!base.family().is_target());
        }

        assert_eq!(Family::TargetP.to_string(), "target_p_func");
    }
}
