// Auxiliary Data Module
// Phase groups, travel-time statistics, ellipticity tables and topography,
// read once per process and immutable afterwards

pub mod ellip;
pub mod groups;
pub mod stats;
pub mod topo;

pub use ellip::{EllipTables, ELLIP_DEPTHS};
pub use groups::PhaseGroups;
pub use stats::{PhaseStats, StatSegment, TtStats};
pub use topo::TopoGrid;

use std::path::Path;

use log::{info, warn};

use crate::errors::AuxDataResult;

#[derive(Debug, Clone)]
pub struct AuxData {
    pub groups: PhaseGroups,
    pub stats: TtStats,
    pub ellip: EllipTables,
    /// Absent topography degrades bounce-point corrections to sea level.
    pub topo: Option<TopoGrid>,
}

impl AuxData {
    /// Read groups.txt, ttstats.txt and ellip.txt from a directory, plus the
    /// binary topo.grd when present.
    pub fn load<P: AsRef<Path>>(dir: P) -> AuxDataResult<Self> {
        let dir = dir.as_ref();
        let groups = PhaseGroups::parse(&std::fs::read_to_string(dir.join("groups.txt"))?)?;
        let stats = TtStats::parse(&std::fs::read_to_string(dir.join("ttstats.txt"))?)?;
        let ellip = EllipTables::parse(&std::fs::read_to_string(dir.join("ellip.txt"))?)?;
        let topo_path = dir.join("topo.grd");
        let topo = if topo_path.exists() {
            Some(TopoGrid::from_file(&topo_path)?)
        } else {
            warn!("no topography grid at {:?}; bounce points assume sea level", topo_path);
            None
        };
        info!(
            "auxiliary data: {} stat phases, {} ellipticity tables, topo: {}",
            stats.phases.len(),
            ellip.tables.len(),
            topo.is_some()
        );
        Ok(Self {
            groups,
            stats,
            ellip,
            topo,
        })
    }

    /// Assemble from in-memory text, for tests and embedded defaults.
    pub fn from_strs(groups: &str, stats: &str, ellip: &str) -> AuxDataResult<Self> {
        Ok(Self {
            groups: PhaseGroups::parse(groups)?,
            stats: TtStats::parse(stats)?,
            ellip: EllipTables::parse(ellip)?,
            topo: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{TOY_ELLIP, TOY_GROUPS, TOY_STATS};

    #[test]
    fn test_from_strs() {
        let aux = AuxData::from_strs(TOY_GROUPS, TOY_STATS, TOY_ELLIP).unwrap();
        assert!(aux.groups.can_use("P"));
        assert!(aux.stats.find("Lg").is_some());
        assert!(aux.ellip.find("S").is_some());
        assert!(aux.topo.is_none());
    }
}
