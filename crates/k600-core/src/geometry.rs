// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Detector geometry constants and copy-number decoding.
//!
//! Changing the array layout should only ever touch this module.

/// Number of TIARA silicon detectors.
pub const TIARA_DETECTORS: usize = 5;
/// Rows (rings) per TIARA detector.
pub const TIARA_ROWS: usize = 16;
/// Sectors per TIARA row.
pub const TIARA_SECTORS: usize = 8;
/// Readout channels per TIARA detector.
pub const TIARA_CHANNELS_PER_DETECTOR: usize = TIARA_ROWS * TIARA_SECTORS;

/// Number of plastic paddles.
pub const PADDLES: usize = 3;

/// Number of clover detectors.
pub const CLOVERS: usize = 9;
/// HPGe crystals per clover.
pub const CLOVER_CRYSTALS: usize = 4;
/// BGO shield segments per clover.
pub const CLOVER_SHIELD_SEGMENTS: usize = 16;

/// Number of LEPS detectors.
pub const LEPS_DETECTORS: usize = 8;
/// HPGe crystals per LEPS detector.
pub const LEPS_CRYSTALS: usize = 4;

/// Number of NaI detectors.
pub const NAI_DETECTORS: usize = 5;

/// One TIARA readout pad.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TiaraChannel {
    /// Detector number.
    pub detector: usize,
    /// Row (ring) number.
    pub row: usize,
    /// Sector number.
    pub sector: usize,
}

impl TiaraChannel {
    /// Decodes a flat channel id (`detector * 128 + row * 8 + sector`).
    pub const fn from_channel_id(id: usize) -> Self {
        let detector = id / TIARA_CHANNELS_PER_DETECTOR;
        let within = id % TIARA_CHANNELS_PER_DETECTOR;
        Self {
            detector,
            row: within / TIARA_SECTORS,
            sector: within % TIARA_SECTORS,
        }
    }

    /// Flat channel id.
    pub const fn channel_id(&self) -> usize {
        self.detector * TIARA_CHANNELS_PER_DETECTOR + self.row * TIARA_SECTORS + self.sector
    }

    /// Pad index inside its detector (`row * 8 + sector`).
    pub const fn pad(&self) -> usize {
        self.row * TIARA_SECTORS + self.sector
    }

    /// `true` when the channel belongs to the instrumented array.
    pub const fn in_array(&self) -> bool {
        self.detector < TIARA_DETECTORS
    }
}

/// Splits a copy number into `(element, sub)` for arrays of `per_element`
/// sub-volumes (`copy / n`, `copy % n`).
pub const fn split_copy_number(copy: usize, per_element: usize) -> (usize, usize) {
    (copy / per_element, copy % per_element)
}

/// Wire orientation of a drift-chamber plane.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum WireKind {
    /// Wires perpendicular to the dispersive axis.
    X,
    /// Stereo wires inclined at 50 degrees.
    U,
}

/// Number of X-plane cells.
pub const VDC_X_CELLS: u32 = 198;
/// Number of U-plane cells.
pub const VDC_U_CELLS: u32 = 143;
/// X-plane cell width (mm).
pub const VDC_X_CELL_WIDTH: f64 = 4.0;
/// Lower edge of X cell 0, in cell widths.
pub const VDC_X_FIRST_EDGE: f64 = -99.0;
/// Lower edge of U cell 0, in U pitches.
pub const VDC_U_FIRST_EDGE: f64 = -71.5;
/// U wire inclination (degrees).
pub const VDC_U_WIRE_ANGLE_DEG: f64 = 50.0;
/// Steps further than this from the wire plane (mm) are not assigned to a cell.
pub const VDC_MAX_DRIFT: f64 = 8.0;
/// Number of wire planes (two chambers, X and U each).
pub const VDC_PLANES: usize = 4;

/// One of the four wire planes, decoded from the sense-region copy number.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct WirePlane {
    copy: usize,
}

impl WirePlane {
    const LAYOUT: [(WireKind, u32, f64); VDC_PLANES] = [
        (WireKind::X, 0, 4.0),
        (WireKind::U, 198, -4.0),
        (WireKind::X, 341, 4.0),
        (WireKind::U, 539, -4.0),
    ];

    /// Plane for a sense-region copy number, if it is one of the four.
    pub fn from_copy_number(copy: u32) -> Option<Self> {
        let copy = usize::try_from(copy).ok()?;
        (copy < VDC_PLANES).then_some(Self { copy })
    }

    /// Plane index `0..4` (chamber 1 X, chamber 1 U, chamber 2 X, chamber 2 U).
    pub const fn index(&self) -> usize {
        self.copy
    }

    /// Wire orientation.
    pub const fn kind(&self) -> WireKind {
        Self::LAYOUT[self.copy].0
    }

    /// Offset added to the cell number to form the global channel id.
    pub const fn channel_offset(&self) -> u32 {
        Self::LAYOUT[self.copy].1
    }

    /// Shift applied to the local z coordinate so the wire plane sits at `z = 0`.
    pub const fn z_offset(&self) -> f64 {
        Self::LAYOUT[self.copy].2
    }
}
