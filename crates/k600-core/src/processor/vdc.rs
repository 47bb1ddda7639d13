// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Vertical drift chambers: wire-cell search, digitiser slots and the
//! primary track's plane crossings.

use tracing::{debug, trace, warn};

use super::Processor;
use crate::config::{ShearConvention, VdcConfig};
use crate::geometry::{
    WireKind, WirePlane, VDC_MAX_DRIFT, VDC_PLANES, VDC_U_CELLS, VDC_U_FIRST_EDGE, VDC_X_CELLS,
    VDC_X_CELL_WIDTH, VDC_X_FIRST_EDGE,
};
use crate::math::Vec3;
use crate::resolution::GaussianSource;
use crate::ring::{Assignment, HitRingBuffer};
use crate::sink::Row;
use crate::step::{StepRecord, Volume};

/// A sense-region step resolved to a wire cell.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct CellHit {
    /// Global channel id (cell number plus the plane's offset).
    pub channel: u32,
    /// Drift coordinate relative to the wire plane (mm).
    pub drift: f64,
}

/// Finds the wire cell under `local` in `plane`.
///
/// X planes use fixed 4 mm cells from `-99 * 4`. U planes first shear local x
/// by `slope * y`, then search cells of width `|u_pitch|` from
/// `-71.5 * |u_pitch|`. Each cell is the half-open interval `(lo, hi]`.
/// Steps further than [`VDC_MAX_DRIFT`] from the plane have no cell.
pub fn locate_cell(
    plane: WirePlane,
    local: Vec3,
    u_pitch: f64,
    shear: ShearConvention,
) -> Option<CellHit> {
    let drift = local.z() + plane.z_offset();
    if drift.abs() > VDC_MAX_DRIFT {
        return None;
    }
    let x = local.x();
    let cell = match plane.kind() {
        WireKind::X => (0..VDC_X_CELLS).find(|&c| {
            let lo = (VDC_X_FIRST_EDGE + f64::from(c)) * VDC_X_CELL_WIDTH;
            x > lo && x <= lo + VDC_X_CELL_WIDTH
        }),
        WireKind::U => {
            let pitch = u_pitch.abs();
            let offset = shear.slope() * local.y();
            (0..VDC_U_CELLS).find(|&c| {
                let lo = (VDC_U_FIRST_EDGE + f64::from(c)) * pitch + offset;
                x > lo && x <= (VDC_U_FIRST_EDGE + 1.0 + f64::from(c)) * pitch + offset
            })
        }
    }?;
    Some(CellHit {
        channel: cell + plane.channel_offset(),
        drift,
    })
}

/// Primary-track points either side of one wire plane.
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct WireplaneTraversal {
    /// Last primary point with drift `< 0` (overwritten by every such step).
    pub pre: Option<Vec3>,
    /// First primary point with drift `> 0` (latched once).
    pub post: Option<Vec3>,
}

impl WireplaneTraversal {
    fn observe(&mut self, point: Vec3) {
        if point.z() < 0.0 {
            self.pre = Some(point);
        } else if point.z() > 0.0 && self.post.is_none() {
            self.post = Some(point);
        }
    }

    /// Linear interpolation of the crossing at drift `0`, when both points
    /// are present and straddle the plane.
    pub fn crossing(&self) -> Option<Vec3> {
        let (pre, post) = (self.pre?, self.post?);
        let dz = post.z() - pre.z();
        if dz <= 0.0 {
            return None;
        }
        let t = -pre.z() / dz;
        Some(Vec3::new(
            pre.x() + t * (post.x() - pre.x()),
            pre.y() + t * (post.y() - pre.y()),
            0.0,
        ))
    }
}

/// Wire chambers for one event. Produces no rows; downstream track
/// reconstruction reads [`VdcArray::hits`] and [`VdcArray::traversal`].
#[derive(Debug, Clone)]
pub struct VdcArray {
    config: VdcConfig,
    hits: HitRingBuffer,
    traversals: [WireplaneTraversal; VDC_PLANES],
}

impl VdcArray {
    /// Builds an empty array.
    pub fn new(config: VdcConfig) -> Self {
        if config.shear == ShearConvention::LegacyRadians {
            warn!("vdc: U-plane shear uses tan(50 rad); set vdc.shear = \"degrees\" for tan(50°)");
        }
        Self {
            hits: HitRingBuffer::new(config.hit_buffer_size),
            traversals: [WireplaneTraversal::default(); VDC_PLANES],
            config,
        }
    }

    /// Digitiser slots.
    pub fn hits(&self) -> &HitRingBuffer {
        &self.hits
    }

    /// Crossing points of plane `index` (`0..4`).
    pub fn traversal(&self, index: usize) -> Option<&WireplaneTraversal> {
        self.traversals.get(index)
    }
}

impl Processor for VdcArray {
    fn name(&self) -> &'static str {
        "vdc"
    }

    fn reset(&mut self) {
        self.hits.reset();
        self.traversals = [WireplaneTraversal::default(); VDC_PLANES];
    }

    fn ingest(&mut self, step: &StepRecord) -> bool {
        if step.volume != Volume::VdcSenseRegion {
            return false;
        }
        if !(step.time >= 0.0 && step.time < self.config.total_sampled_time) {
            trace!(time = step.time, "vdc step outside sampled window");
            return false;
        }
        let Some(plane) = WirePlane::from_copy_number(step.copy_number) else {
            trace!(copy = step.copy_number, "unknown wire plane");
            return false;
        };
        let local = step.local_position;
        if step.is_primary() {
            let shifted = Vec3::new(local.x(), local.y(), local.z() + plane.z_offset());
            self.traversals[plane.index()].observe(shifted);
        }
        let Some(hit) = locate_cell(plane, local, self.config.u_cell_pitch, self.config.shear)
        else {
            return false;
        };
        let e = step.energy_deposit;
        match self.hits.assign(hit.channel, e, hit.drift, step.time) {
            Assignment::Slot(_) => true,
            Assignment::Dropped => {
                trace!(channel = hit.channel, "vdc hit dropped, digitiser full");
                false
            }
        }
    }

    fn reduce(&mut self, _rng: &mut dyn GaussianSource) -> Vec<Row> {
        debug!(
            occupied = self.hits.occupied().count(),
            dropped = self.hits.dropped(),
            "vdc digitiser"
        );
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plane(copy: u32) -> WirePlane {
        WirePlane::from_copy_number(copy).expect("plane")
    }

    #[test]
    fn x_cells_are_half_open_four_millimetre_bins() {
        let at = |x: f64| locate_cell(plane(0), Vec3::new(x, 0.0, -4.0), 5.0, ShearConvention::Degrees);
        assert_eq!(at(-395.9).map(|h| h.channel), Some(0));
        assert_eq!(at(-392.0).map(|h| h.channel), Some(0));
        assert_eq!(at(-391.9).map(|h| h.channel), Some(1));
        assert_eq!(at(-396.0), None);
        assert_eq!(at(396.0).map(|h| h.channel), Some(197));
        assert_eq!(at(396.1), None);
    }

    #[test]
    fn second_chamber_offsets_channels() {
        let x = locate_cell(plane(2), Vec3::new(0.5, 0.0, 0.0), 5.0, ShearConvention::Degrees);
        assert_eq!(x.map(|h| h.channel), Some(99 + 341));
        let u = locate_cell(plane(3), Vec3::new(0.5, 0.0, 0.0), 4.0, ShearConvention::Degrees);
        assert_eq!(u.map(|h| h.channel), Some(71 + 539));
    }

    #[test]
    fn drift_window_applies_after_plane_offset() {
        let u = plane(1);
        assert!(locate_cell(u, Vec3::new(0.0, 0.0, 12.0), 5.0, ShearConvention::Degrees).is_some());
        assert!(locate_cell(u, Vec3::new(0.0, 0.0, -4.1), 5.0, ShearConvention::Degrees).is_none());
        let hit = locate_cell(u, Vec3::new(0.0, 0.0, 6.0), 5.0, ShearConvention::Degrees);
        assert_eq!(hit.map(|h| h.drift), Some(2.0));
    }

    #[test]
    fn u_shear_moves_cell_with_y() {
        let pitch = 4.0;
        let shear = ShearConvention::Degrees;
        let flat = locate_cell(plane(1), Vec3::new(3.0, 0.0, 4.0), pitch, shear);
        // slope is about -0.839, so y = 10 moves the grid by about -8.4 mm.
        let sheared = locate_cell(plane(1), Vec3::new(3.0, 10.0, 4.0), pitch, shear);
        assert_eq!(flat.map(|h| h.channel), Some(198 + 72));
        assert_eq!(sheared.map(|h| h.channel), Some(198 + 74));
    }

    #[test]
    fn legacy_shear_moves_cells_the_other_way() {
        let shear = ShearConvention::LegacyRadians;
        let at = |y: f64| locate_cell(plane(1), Vec3::new(3.0, y, 4.0), 4.0, shear);
        // slope is -1 / tan(50 rad), about +3.678, so the grid shifts up with y.
        assert_eq!(at(0.0).map(|h| h.channel), Some(198 + 72));
        assert_eq!(at(2.0).map(|h| h.channel), Some(198 + 70));
        assert_eq!(at(10.0).map(|h| h.channel), Some(198 + 63));
    }

    #[test]
    fn traversal_keeps_last_pre_and_first_post() {
        let mut vdc = VdcArray::new(VdcConfig::default());
        let step = |z: f64, x: f64| {
            StepRecord::new(Volume::VdcSenseRegion, 0)
                .with_deposit(1.0)
                .at_local(Vec3::new(x, 0.0, z - 4.0))
        };
        vdc.ingest(&step(-3.0, 1.0));
        vdc.ingest(&step(-1.0, 2.0));
        vdc.ingest(&step(1.0, 4.0));
        vdc.ingest(&step(3.0, 9.0));
        vdc.ingest(&step(2.0, 7.0).with_parent(3));
        let t = vdc.traversal(0).copied().unwrap_or_default();
        assert_eq!(t.pre, Some(Vec3::new(2.0, 0.0, -1.0)));
        assert_eq!(t.post, Some(Vec3::new(4.0, 0.0, 1.0)));
        assert_eq!(t.crossing(), Some(Vec3::new(3.0, 0.0, 0.0)));
        assert_eq!(WireplaneTraversal::default().crossing(), None);
    }

    #[test]
    fn hits_fill_slots_and_reset_clears_them() {
        let mut vdc = VdcArray::new(VdcConfig {
            hit_buffer_size: 1,
            ..VdcConfig::default()
        });
        let hit = |x: f64| {
            StepRecord::new(Volume::VdcSenseRegion, 0)
                .with_deposit(2.0)
                .at_local(Vec3::new(x, 0.0, -3.0))
                .at_time(10.0)
        };
        assert!(vdc.ingest(&hit(1.0)));
        assert!(vdc.ingest(&hit(2.0)));
        assert!(!vdc.ingest(&hit(50.0)));
        assert_eq!(vdc.hits().dropped(), 1);
        let slot = vdc.hits().slots()[0];
        assert_eq!(slot.channel(), Some(99));
        assert_eq!(slot.mean_z(), Some(1.0));
        assert_eq!(slot.mean_time(), Some(10.0));

        vdc.reset();
        assert_eq!(vdc.hits().slots()[0].channel_column(), -1);
        assert_eq!(vdc.hits().dropped(), 0);
        assert_eq!(vdc.traversal(0).copied(), Some(WireplaneTraversal::default()));
    }
}
