// Phase Groups
// Ordered phase-group lists: flag groups first, then primary/auxiliary pairs

use crate::errors::{AuxDataError, AuxDataResult};

/// One named, ordered phase list.
#[derive(Debug, Clone)]
pub struct Group {
    pub name: String,
    pub phases: Vec<String>,
}

impl Group {
    pub fn contains(&self, code: &str) -> bool {
        self.phases.iter().any(|p| p == code)
    }
}

/// The five fixed flag groups plus the primary/auxiliary pairs, kept as
/// ordered sequences because lookup order is part of the contract.
#[derive(Debug, Clone)]
pub struct PhaseGroups {
    pub regional: Group,
    pub depth: Group,
    pub down_weight: Group,
    pub can_use: Group,
    pub chaff: Group,
    pub pairs: Vec<(Group, Group)>,
}

impl PhaseGroups {
    pub fn parse(text: &str) -> AuxDataResult<Self> {
        let mut groups: Vec<Group> = Vec::new();
        let mut tokens = text.split_whitespace().peekable();
        while let Some(tok) = tokens.next() {
            let name = tok
                .strip_suffix(':')
                .ok_or_else(|| AuxDataError::Malformed {
                    file: "groups".into(),
                    reason: format!("expected group name, got '{}'", tok),
                })?
                .to_string();
            let mut phases = Vec::new();
            for ph in tokens.by_ref() {
                if ph == "-" {
                    break;
                }
                phases.push(ph.to_string());
            }
            groups.push(Group { name, phases });
        }
        if groups.len() < 5 {
            return Err(AuxDataError::Malformed {
                file: "groups".into(),
                reason: format!("need at least 5 groups, got {}", groups.len()),
            });
        }
        for (i, want) in ["Regional", "Depth", "DownWeight", "CanUse", "Chaff"]
            .iter()
            .enumerate()
        {
            if groups[i].name != *want {
                return Err(AuxDataError::MissingGroup((*want).to_string()));
            }
        }
        let mut it = groups.into_iter();
        let regional = it.next().unwrap();
        let depth = it.next().unwrap();
        let down_weight = it.next().unwrap();
        let can_use = it.next().unwrap();
        let chaff = it.next().unwrap();
        let rest: Vec<Group> = it.collect();
        let mut pairs = Vec::new();
        let mut rest_it = rest.into_iter();
        while let Some(primary) = rest_it.next() {
            let aux = rest_it.next().unwrap_or_else(|| Group {
                name: primary.name.clone(),
                phases: Vec::new(),
            });
            pairs.push((primary, aux));
        }
        Ok(Self {
            regional,
            depth,
            down_weight,
            can_use,
            chaff,
            pairs,
        })
    }

    pub fn is_regional(&self, code: &str) -> bool {
        self.regional.contains(code)
    }

    pub fn is_depth_sensitive(&self, code: &str) -> bool {
        self.depth.contains(code)
    }

    pub fn should_down_weight(&self, code: &str) -> bool {
        self.down_weight.contains(code)
    }

    pub fn can_use(&self, code: &str) -> bool {
        self.can_use.contains(code)
    }

    pub fn is_chaff(&self, code: &str) -> bool {
        self.chaff.contains(code)
    }

    /// Primary and auxiliary group names for a phase, first pair wins.
    pub fn phase_group(&self, code: &str) -> (Option<&str>, Option<&str>) {
        for (primary, aux) in &self.pairs {
            if primary.contains(code) {
                return (Some(primary.name.as_str()), Some(aux.name.as_str()));
            }
            if aux.contains(code) {
                return (Some(aux.name.as_str()), Some(primary.name.as_str()));
            }
        }
        (None, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::TOY_GROUPS;

    #[test]
    fn test_parse_groups() {
        let g = PhaseGroups::parse(TOY_GROUPS).unwrap();
        assert!(g.is_regional("Pg"));
        assert!(!g.is_regional("P"));
        assert!(g.is_depth_sensitive("pP"));
        assert!(g.can_use("PKPdf"));
        assert!(g.is_chaff("LR"));
        assert!(g.should_down_weight("PP"));
    }

    #[test]
    fn test_phase_group_pairs() {
        let g = PhaseGroups::parse(TOY_GROUPS).unwrap();
        let (primary, aux) = g.phase_group("Pg");
        assert_eq!(primary, Some("P"));
        assert_eq!(aux, Some("PKP"));
        let (primary, aux) = g.phase_group("SKSac");
        assert_eq!(primary, Some("S"));
        assert_eq!(aux, Some("SKS"));
    }

    #[test]
    fn test_missing_fixed_group_rejected() {
        let bad = "Regional: Pg -\nDepth: pP -\n";
        assert!(PhaseGroups::parse(bad).is_err());
    }
}
