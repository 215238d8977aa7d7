//! Reference emission lines.
//!
//! Lines are grouped per element and family (`Fe_K`, `Pb_L`, `Pb_M`); a
//! [`LineGroup`] is the unit the identifier proposes and the fit model
//! assigns one area to. The built-in table is shared read-only through
//! [`LineTable::global`].

mod table;

use crate::error::{Result, XrfError};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

/// Shell of the vacancy that produces a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum LineFamily {
    K,
    L,
    M,
}

impl fmt::Display for LineFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LineFamily::K => "K",
            LineFamily::L => "L",
            LineFamily::M => "M",
        };
        f.write_str(name)
    }
}

/// Individual transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LineKind {
    Ka1,
    Ka2,
    Kb1,
    La1,
    Lb1,
    Lg1,
    Ma1,
}

impl LineKind {
    /// Column order of the static table.
    pub const ALL: [LineKind; 7] = [
        LineKind::Ka1,
        LineKind::Ka2,
        LineKind::Kb1,
        LineKind::La1,
        LineKind::Lb1,
        LineKind::Lg1,
        LineKind::Ma1,
    ];

    pub fn family(self) -> LineFamily {
        match self {
            LineKind::Ka1 | LineKind::Ka2 | LineKind::Kb1 => LineFamily::K,
            LineKind::La1 | LineKind::Lb1 | LineKind::Lg1 => LineFamily::L,
            LineKind::Ma1 => LineFamily::M,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            LineKind::Ka1 => "ka1",
            LineKind::Ka2 => "ka2",
            LineKind::Kb1 => "kb1",
            LineKind::La1 => "la1",
            LineKind::Lb1 => "lb1",
            LineKind::Lg1 => "lg1",
            LineKind::Ma1 => "ma1",
        }
    }

    fn weight(self, z: u32) -> f64 {
        match self {
            LineKind::Ka1 | LineKind::La1 | LineKind::Ma1 => 1.0,
            LineKind::Ka2 => table::KA2_WEIGHT,
            LineKind::Kb1 => table::kb1_weight(z),
            LineKind::Lb1 => table::LB1_WEIGHT,
            LineKind::Lg1 => table::LG1_WEIGHT,
        }
    }
}

/// One emission line of one element.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ElementLine {
    pub element: &'static str,
    pub z: u32,
    pub kind: LineKind,
    /// Nominal energy (keV).
    pub energy: f64,
    /// Intensity relative to the strongest line of its family.
    pub weight: f64,
}

impl ElementLine {
    pub fn family(&self) -> LineFamily {
        self.kind.family()
    }
}

/// All lines of one element and family, e.g. `Fe_K`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineGroup {
    name: String,
    element: &'static str,
    z: u32,
    family: LineFamily,
    lines: Vec<ElementLine>,
}

impl LineGroup {
    /// Build a group. Every line must belong to `element` and `family`.
    pub fn new(
        element: &'static str,
        z: u32,
        family: LineFamily,
        lines: Vec<ElementLine>,
    ) -> Result<Self> {
        if lines.is_empty() {
            return Err(XrfError::UnknownElement(format!(
                "{}_{} has no lines",
                element, family
            )));
        }
        if let Some(line) = lines
            .iter()
            .find(|l| l.element != element || l.family() != family)
        {
            return Err(XrfError::InvalidConfig(format!(
                "line {} {:?} does not belong to {}_{}",
                line.element, line.kind, element, family
            )));
        }
        if let Some(line) = lines
            .iter()
            .find(|l| !(l.energy.is_finite() && l.energy > 0.0 && l.weight > 0.0))
        {
            return Err(XrfError::InvalidConfig(format!(
                "line {} {:?} has invalid energy or weight",
                line.element, line.kind
            )));
        }
        Ok(Self {
            name: format!("{}_{}", element, family),
            element,
            z,
            family,
            lines,
        })
    }

    /// Group name, e.g. `Fe_K`.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn element(&self) -> &'static str {
        self.element
    }

    pub fn z(&self) -> u32 {
        self.z
    }

    pub fn family(&self) -> LineFamily {
        self.family
    }

    pub fn lines(&self) -> &[ElementLine] {
        &self.lines
    }

    pub fn lines_in_range(&self, low: f64, high: f64) -> impl Iterator<Item = &ElementLine> {
        self.lines
            .iter()
            .filter(move |l| l.energy >= low && l.energy <= high)
    }

    /// Strongest line inside `[low, high]`.
    pub fn primary_line(&self, low: f64, high: f64) -> Option<&ElementLine> {
        self.lines_in_range(low, high).fold(None, |best, line| match best {
            Some(b) if b.weight >= line.weight => Some(b),
            _ => Some(line),
        })
    }
}

/// Pile-up of two photons arriving within the detector's shaping time,
/// e.g. `Si_K-Si_K`. It shows as one peak at the sum of the two groups'
/// strongest line energies.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PileupPeak {
    name: String,
    energy: f64,
}

impl PileupPeak {
    pub fn new(first: &LineGroup, second: &LineGroup) -> Result<Self> {
        let strongest = |group: &LineGroup| {
            group
                .primary_line(0.0, f64::INFINITY)
                .map(|line| line.energy)
                .ok_or_else(|| XrfError::UnknownElement(format!("{} has no lines", group.name())))
        };
        Ok(Self {
            name: format!("{}-{}", first.name(), second.name()),
            energy: strongest(first)? + strongest(second)?,
        })
    }

    /// Name, e.g. `Si_K-Si_K`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Peak energy (keV).
    pub fn energy(&self) -> f64 {
        self.energy
    }
}

/// Read-only table of line groups.
#[derive(Debug, Clone)]
pub struct LineTable {
    groups: Vec<LineGroup>,
    index: HashMap<String, usize>,
}

static GLOBAL_TABLE: OnceLock<LineTable> = OnceLock::new();

impl LineTable {
    /// The built-in table, created on first use and shared by all threads.
    pub fn global() -> &'static LineTable {
        GLOBAL_TABLE.get_or_init(Self::builtin)
    }

    fn builtin() -> Self {
        let mut groups = Vec::new();
        for &(element, z, energies) in table::ELEMENTS {
            for family in [LineFamily::K, LineFamily::L, LineFamily::M] {
                let lines: Vec<ElementLine> = LineKind::ALL
                    .iter()
                    .zip(energies.iter())
                    .filter(|(kind, energy)| kind.family() == family && **energy > 0.0)
                    .map(|(&kind, &energy)| ElementLine {
                        element,
                        z,
                        kind,
                        energy,
                        weight: kind.weight(z),
                    })
                    .collect();
                if !lines.is_empty() {
                    groups.push(LineGroup {
                        name: format!("{}_{}", element, family),
                        element,
                        z,
                        family,
                        lines,
                    });
                }
            }
        }
        let index = groups
            .iter()
            .enumerate()
            .map(|(i, g)| (g.name.clone(), i))
            .collect();
        Self { groups, index }
    }

    /// A table holding only `groups`. Names must be unique.
    pub fn from_groups(groups: Vec<LineGroup>) -> Result<Self> {
        let mut index = HashMap::with_capacity(groups.len());
        for (i, group) in groups.iter().enumerate() {
            if index.insert(group.name.clone(), i).is_some() {
                return Err(XrfError::InvalidConfig(format!(
                    "duplicate line group {}",
                    group.name
                )));
            }
        }
        Ok(Self { groups, index })
    }

    pub fn groups(&self) -> &[LineGroup] {
        &self.groups
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Look up a group by name (`Fe_K`). A bare symbol (`Fe`) resolves to its
    /// K group, or to its L group for elements whose K lines are absent.
    pub fn group(&self, name: &str) -> Result<&LineGroup> {
        if let Some(&i) = self.index.get(name) {
            return Ok(&self.groups[i]);
        }
        ["K", "L", "M"]
            .iter()
            .find_map(|family| self.index.get(&format!("{}_{}", name, family)))
            .map(|&i| &self.groups[i])
            .ok_or_else(|| XrfError::UnknownElement(name.to_string()))
    }

    /// Resolve several names, in order.
    pub fn resolve<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<LineGroup>> {
        let mut seen = std::collections::HashSet::new();
        let mut groups = Vec::with_capacity(names.len());
        for name in names {
            let group = self.group(name.as_ref())?;
            if seen.insert(group.name()) {
                groups.push(group.clone());
            }
        }
        Ok(groups)
    }

    /// Resolve a pile-up name of two groups joined by `-`, e.g. `Si_K-Si_K`
    /// or `Fe-Ca`.
    pub fn pileup(&self, name: &str) -> Result<PileupPeak> {
        let (first, second) = name
            .split_once('-')
            .filter(|(a, b)| !a.is_empty() && !b.is_empty() && !b.contains('-'))
            .ok_or_else(|| {
                XrfError::InvalidConfig(format!(
                    "pile-up '{}' must name two line groups joined by '-'",
                    name
                ))
            })?;
        PileupPeak::new(self.group(first)?, self.group(second)?)
    }

    /// Groups of one element.
    pub fn element_groups(&self, symbol: &str) -> Vec<&LineGroup> {
        self.groups.iter().filter(|g| g.element == symbol).collect()
    }

    /// Groups with at least one line inside `[low, high]`.
    pub fn groups_in_range(&self, low: f64, high: f64) -> Vec<&LineGroup> {
        self.groups
            .iter()
            .filter(|g| g.lines_in_range(low, high).next().is_some())
            .collect()
    }
}
