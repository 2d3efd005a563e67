//! Detection data model.
//!
//! A [`Detection`] is one bounding region reported by the vision sensor for a
//! single frame. Detections are immutable once polled; the tracker only reads
//! them.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Highest signature number that is a plain color signature.
///
/// Anything above this is a color code, whose signature packs several
/// 3-bit signature digits.
pub const CCC_MAX_SIGNATURE: u16 = 7;

/// One object reported by the sensor in the current frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Detection {
    /// Tracking index, stable for a physical blob while it stays in view
    pub id: u32,
    /// Color signature (1-7) or color code (> 7)
    pub signature: u16,
    /// Center x in sensor pixels
    pub x: u16,
    /// Center y in sensor pixels
    pub y: u16,
    /// Bounding box width in pixels
    pub width: u16,
    /// Bounding box height in pixels
    pub height: u16,
    /// Rotation in degrees, only meaningful for color codes
    #[serde(default)]
    pub angle: i16,
    /// Number of consecutive frames this id has been seen
    pub age: u32,
}

impl Detection {
    /// Create a detection with zero angle.
    pub fn new(id: u32, signature: u16, x: u16, y: u16, width: u16, height: u16, age: u32) -> Self {
        Self {
            id,
            signature,
            x,
            y,
            width,
            height,
            angle: 0,
            age,
        }
    }

    /// Whether this detection is a color code rather than a single signature.
    pub fn is_color_code(&self) -> bool {
        self.signature > CCC_MAX_SIGNATURE
    }
}

impl fmt::Display for Detection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_color_code() {
            write!(
                f,
                "CC block sig: {:o} ({} decimal) x: {} y: {} width: {} height: {} angle: {} index: {} age: {}",
                self.signature,
                self.signature,
                self.x,
                self.y,
                self.width,
                self.height,
                self.angle,
                self.id,
                self.age
            )
        } else {
            // Angle is always zero for regular blocks
            write!(
                f,
                "sig: {} x: {} y: {} width: {} height: {} index: {} age: {}",
                self.signature, self.x, self.y, self.width, self.height, self.id, self.age
            )
        }
    }
}

/// Bitmask selecting which signatures the tracker will consider.
///
/// Bit `n - 1` enables signature `n` (1-7); bit 7 enables all color codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SignatureMap(pub u8);

impl SignatureMap {
    /// Accept every signature and every color code.
    pub const ALL: SignatureMap = SignatureMap(0xff);
    /// Bit that enables color codes.
    pub const COLOR_CODES: u8 = 0x80;

    /// Map accepting a single plain signature (1-7).
    pub fn signature(sig: u16) -> Self {
        if (1..=CCC_MAX_SIGNATURE).contains(&sig) {
            SignatureMap(1 << (sig - 1))
        } else {
            SignatureMap(0)
        }
    }

    /// Union of two maps.
    pub fn with(self, other: SignatureMap) -> Self {
        SignatureMap(self.0 | other.0)
    }

    pub fn matches(&self, detection: &Detection) -> bool {
        if detection.is_color_code() {
            return self.0 & Self::COLOR_CODES != 0;
        }
        match detection.signature {
            0 => false,
            sig => self.0 & (1 << (sig - 1)) != 0,
        }
    }
}

impl Default for SignatureMap {
    fn default() -> Self {
        Self::ALL
    }
}
